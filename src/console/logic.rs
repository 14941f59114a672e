//! Presentación mínima por consola.
//!
//! Registra los cambios de la vista y las notificaciones, y traduce órdenes de línea
//! de `stdin` en cambios del contexto de selección o comandos del dashboard.


use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{error, info, warn};
use crate::console::domain::ConsoleCommand;
use crate::context::domain::AppContext;
use crate::dashboard::domain::{DashboardHandle, DashboardView};
use crate::message::domain::NotificationMessage;
use crate::selection::domain::{SelectionContext, SensorClass};


/// Resume la vista en una línea de log.
pub fn describe_view(view: &DashboardView) -> String {
    let Some(farm_id) = view.farm_id.as_deref() else {
        return "sin granja seleccionada".to_string();
    };

    let mut parts = vec![format!("granja {farm_id}"), format!("modo {:?}", view.chart_mode)];

    if let Some(summary) = &view.summary {
        let avg = &summary.average_environment;
        parts.push(format!("online {}/{}", summary.online_devices, summary.total_devices));
        parts.push(format!(
            "T {} H {} SM {} pH {} L {}",
            fmt_value(avg.avg_temperature),
            fmt_value(avg.avg_humidity),
            fmt_value(avg.avg_soil_moisture),
            fmt_value(avg.avg_soil_ph),
            fmt_value(avg.avg_light_intensity),
        ));
    }

    parts.push(format!("{} filas", view.chart_rows.len()));

    if view.loading.initial || view.loading.chart {
        parts.push("cargando".to_string());
    }
    if let Some(e) = &view.errors.initial {
        parts.push(format!("error inicial: {e}"));
    }
    if let Some(e) = &view.errors.chart {
        parts.push(format!("error gráfico: {e}"));
    }

    parts.join(" | ")
}


fn fmt_value(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}")).unwrap_or_else(|| "--".to_string())
}


fn log_devices(view: &DashboardView) {
    for class in SensorClass::ALL {
        let devices: Vec<_> = view
            .devices_of(class)
            .into_iter()
            .map(|d| d.display_name().to_string())
            .collect();
        info!("Info: {} [{}] seleccionado: {}",
              class,
              devices.join(", "),
              view.selection.get(class).unwrap_or("--"));
    }
}


/// Ejecuta la consola hasta `quit`, fin de `stdin` o Ctrl-C.
pub async fn run_console(handle: DashboardHandle,
                         selection: &SelectionContext,
                         mut rx_from_notification: mpsc::Receiver<NotificationMessage>,
                         app_context: AppContext) {

    let mut lines = LinesStream::new(BufReader::new(stdin()).lines());
    let mut view_rx = handle.watch();

    info!("Info: consola lista (farm <id>|none, farms, user <id>, mode env|soil, device env|soil|ph <id>, reload, show, logout, quit)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Info: Ctrl-C recibido");
                break;
            }

            changed = view_rx.changed() => {
                if changed.is_err() {
                    warn!("Warning: el dashboard finalizó");
                    break;
                }
                let summary = describe_view(&view_rx.borrow_and_update());
                info!("Info: {}", summary);
            }

            Some(notification) = rx_from_notification.recv() => {
                info!("Info: 🔔 {} - {}", notification.title, notification.message);
            }

            line = lines.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        error!("Error: leyendo stdin: {}", e);
                        break;
                    }
                    None => break,
                };
                if line.trim().is_empty() {
                    continue;
                }

                match line.parse::<ConsoleCommand>() {
                    Ok(command) => {
                        if !execute(command, &handle, selection, &app_context).await {
                            break;
                        }
                    }
                    Err(e) => warn!("Warning: {}", e),
                }
            }
        }
    }
}


/// Aplica una orden. Devuelve `false` cuando la consola debe terminar.
pub async fn execute(command: ConsoleCommand,
                     handle: &DashboardHandle,
                     selection: &SelectionContext,
                     app_context: &AppContext) -> bool {
    match command {
        ConsoleCommand::Farm(farm_id) => { selection.set_farm(farm_id); }
        ConsoleCommand::User(user_id) => { selection.set_user(Some(user_id)); }
        ConsoleCommand::ListFarms => match app_context.api.farms().await {
            Ok(farms) => {
                for farm in farms {
                    info!("Info: granja {} - {}", farm.id, farm.name);
                }
            }
            Err(e) => error!("Error: {}", e),
        },
        ConsoleCommand::Mode(mode) => handle.set_chart_mode(mode).await,
        ConsoleCommand::Device(class, device_id) => handle.select_device(class, device_id).await,
        ConsoleCommand::Reload => handle.reload_chart().await,
        ConsoleCommand::Show => {
            let view = handle.view();
            info!("Info: {}", describe_view(&view));
            log_devices(&view);
        }
        ConsoleCommand::Logout => selection.logout(),
        ConsoleCommand::Quit => return false,
    }
    true
}
