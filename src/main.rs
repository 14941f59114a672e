use tracing::{error, info};
use crate::channels::domain::Channels;
use crate::console::logic::run_console;
use crate::context::domain::AppContext;
use crate::dashboard::domain::DashboardHandle;
use crate::dashboard::logic::start_dashboard;
use crate::notification::logic::start_notifications;
use crate::selection::domain::SelectionContext;
use crate::system::domain::{init_tracing, System};

mod aggregation;
mod api;
mod channels;
mod chart;
mod config;
mod console;
mod context;
mod dashboard;
mod live;
mod message;
mod notification;
mod push;
mod selection;
mod stomp;
mod system;


#[tokio::main(flavor = "current_thread")]
async fn main() {

    let system = match System::new() {
        Ok(system) => system,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&system);
    info!("Info: configuración cargada para {} ({})", system.api_base_url, system.environment);

    let selection = SelectionContext::new(system.farm_id.clone(), system.user_id.clone());

    let app_context = match AppContext::new(system) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let channels = Channels::new();

    let notifications = start_notifications(channels.notification_to_presentation,
                                            selection.user_receiver(),
                                            &app_context);

    let (dashboard, view) = start_dashboard(channels.dashboard_from_presentation,
                                            channels.dashboard_from_live,
                                            channels.live_to_dashboard,
                                            selection.farm_receiver(),
                                            app_context.clone());

    let handle = DashboardHandle::new(channels.presentation_to_dashboard, view);

    run_console(handle,
                &selection,
                channels.presentation_from_notification,
                app_context).await;

    drop(selection);

    if let Err(e) = dashboard.await {
        error!("Error: tarea del dashboard: {}", e);
    }
    if let Err(e) = notifications.await {
        error!("Error: tarea de notificaciones: {}", e);
    }

    info!("Info: servicio finalizado");
}
