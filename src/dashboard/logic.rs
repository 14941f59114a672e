//! Orquestador del dashboard.
//!
//! Único dueño del resumen y de las filas del gráfico. Atiende, en una sola tarea:
//! * cambios de granja del contexto de selección (abre/cierra el canal en vivo y recarga),
//! * comandos de la presentación (modo de gráfico, selección de dispositivos, recarga),
//! * parches del canal en vivo,
//! * resultados de las consultas lanzadas en segundo plano.
//!
//! Cada consulta lleva una etiqueta (`generation` + selección); un resultado cuya etiqueta
//! ya no es la vigente se descarta sin tocar la vista.


use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use crate::aggregation::logic::fetch_chart;
use crate::chart::domain::ChartRequest;
use crate::config::channels::COMPLETION_CAPACITY;
use crate::context::domain::AppContext;
use crate::dashboard::domain::{ChartTag, Completion, DashboardCommand, DashboardView, SummaryUpdate};
use crate::live::logic::LiveSummaryChannel;


pub struct DashboardOrchestrator {
    app_context: AppContext,
    view: DashboardView,
    view_tx: watch::Sender<DashboardView>,
    completions_tx: mpsc::Sender<Completion>,
    generation: u64,
    farm_load: Option<u64>,
    chart_tag: Option<ChartTag>,
    live: LiveSummaryChannel,
}


impl DashboardOrchestrator {
    pub fn new(app_context: AppContext,
               view_tx: watch::Sender<DashboardView>,
               completions_tx: mpsc::Sender<Completion>,
               live: LiveSummaryChannel) -> Self {
        Self {
            app_context,
            view: DashboardView::default(),
            view_tx,
            completions_tx,
            generation: 0,
            farm_load: None,
            chart_tag: None,
            live,
        }
    }

    /// Bucle principal. Termina cuando se descarta el contexto de selección o todos los
    /// `DashboardHandle`; en ese momento cierra el canal en vivo.
    #[instrument(name = "dashboard_task", skip_all)]
    pub async fn run(mut self,
                     mut rx_commands: mpsc::Receiver<DashboardCommand>,
                     mut rx_updates: mpsc::Receiver<SummaryUpdate>,
                     mut rx_completions: mpsc::Receiver<Completion>,
                     mut farm_rx: watch::Receiver<Option<String>>) {

        info!("Info: dashboard task creada");

        let farm = farm_rx.borrow_and_update().clone();
        self.on_farm_changed(farm).await;

        loop {
            tokio::select! {
                changed = farm_rx.changed() => {
                    if changed.is_err() {
                        info!("Info: contexto de selección cerrado");
                        break;
                    }
                    let farm = farm_rx.borrow_and_update().clone();
                    self.on_farm_changed(farm).await;
                }

                command = rx_commands.recv() => {
                    match command {
                        Some(command) => self.on_command(command),
                        None => {
                            info!("Info: canal de comandos cerrado");
                            break;
                        }
                    }
                }

                Some(update) = rx_updates.recv() => self.on_summary_update(update),

                Some(completion) = rx_completions.recv() => self.on_completion(completion),
            }
        }

        self.live.stop().await;
        info!("Info: dashboard task finalizada");
    }

    async fn on_farm_changed(&mut self, farm: Option<String>) {
        if farm == self.view.farm_id {
            return;
        }
        info!("Info: granja activa {:?} -> {:?}", self.view.farm_id, farm);

        // El canal de la granja anterior queda cerrado antes de abrir el siguiente.
        self.live.stop().await;

        self.view = DashboardView {
            farm_id: farm.clone(),
            chart_mode: self.view.chart_mode,
            ..DashboardView::default()
        };
        self.farm_load = None;
        self.chart_tag = None;

        if let Some(farm_id) = farm {
            self.live.start(&farm_id).await;
            self.begin_farm_load(farm_id);
        }

        self.publish();
    }

    fn begin_farm_load(&mut self, farm_id: String) {
        self.generation += 1;
        let generation = self.generation;
        self.farm_load = Some(generation);
        self.view.loading.initial = true;

        let api = self.app_context.api.clone();
        let tx = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = tokio::try_join!(api.devices(&farm_id), api.summary(&farm_id));
            if tx.send(Completion::FarmLoaded { generation, farm_id, result }).await.is_err() {
                debug!("Debug: dashboard finalizado, carga inicial descartada");
            }
        });
    }

    fn on_command(&mut self, command: DashboardCommand) {
        debug!("Debug: comando {:?}", command);
        match command {
            DashboardCommand::SetChartMode(mode) => {
                if mode != self.view.chart_mode {
                    self.view.chart_mode = mode;
                    self.refresh_chart(false);
                }
            }
            DashboardCommand::SelectDevice(class, device_id) => {
                self.view.selection.select(class, device_id);
                self.refresh_chart(false);
            }
            DashboardCommand::ReloadChart => self.refresh_chart(true),
        }
        self.publish();
    }

    /// Lanza el fetch del gráfico si la petición vigente cambió (o si `force`).
    fn refresh_chart(&mut self, force: bool) {
        let Some(farm_id) = self.view.farm_id.clone() else {
            return;
        };

        let Some(request) = ChartRequest::for_selection(self.view.chart_mode, &self.view.selection) else {
            if self.chart_tag.take().is_some() {
                debug!("Debug: selección incompleta para {:?}, gráfico vacío", self.view.chart_mode);
            }
            self.view.chart_rows.clear();
            self.view.loading.chart = false;
            self.view.errors.chart = None;
            return;
        };

        let unchanged = self.chart_tag.as_ref().is_some_and(|tag| tag.request == request);
        if unchanged && !force {
            return;
        }
        if !unchanged {
            self.view.chart_rows.clear();
        }

        self.generation += 1;
        let tag = ChartTag { generation: self.generation, farm_id, request };
        self.chart_tag = Some(tag.clone());
        self.view.loading.chart = true;

        let api = self.app_context.api.clone();
        let tz = self.app_context.system.display_timezone;
        let tx = self.completions_tx.clone();

        tokio::spawn(async move {
            let result = fetch_chart(api.as_ref(), &tag.request, &tz).await;
            if tx.send(Completion::ChartLoaded { tag, result }).await.is_err() {
                debug!("Debug: dashboard finalizado, gráfico descartado");
            }
        });
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::FarmLoaded { generation, farm_id, result } => {
                if self.farm_load != Some(generation) || self.view.farm_id.as_deref() != Some(farm_id.as_str()) {
                    debug!("Debug: carga inicial obsoleta de {} descartada", farm_id);
                    return;
                }
                self.farm_load = None;
                self.view.loading.initial = false;

                match result {
                    Ok((devices, summary)) => {
                        info!("Info: granja {} cargada ({} dispositivos)", farm_id, devices.len());
                        self.view.devices = devices;
                        self.view.summary = summary;
                        self.view.selection.apply_defaults(&self.view.devices);
                        self.view.errors.initial = None;
                        self.refresh_chart(false);
                    }
                    Err(e) => {
                        warn!("Warning: carga inicial de {} fallida: {}", farm_id, e);
                        self.view.errors.initial = Some(e.to_string());
                    }
                }
            }

            Completion::ChartLoaded { tag, result } => {
                if self.chart_tag.as_ref() != Some(&tag) {
                    debug!("Debug: resultado obsoleto (generación {}) descartado", tag.generation);
                    return;
                }
                self.view.loading.chart = false;

                match result {
                    Ok(rows) => {
                        self.view.chart_rows = rows;
                        self.view.errors.chart = None;
                    }
                    Err(e) => {
                        warn!("Warning: gráfico no disponible: {}", e);
                        self.view.errors.chart = Some(e.to_string());
                    }
                }
            }
        }
        self.publish();
    }

    fn on_summary_update(&mut self, update: SummaryUpdate) {
        if self.view.farm_id.as_deref() != Some(update.farm_id.as_str()) {
            debug!("Debug: parche de granja inactiva {} descartado", update.farm_id);
            return;
        }

        match self.view.summary.as_mut() {
            Some(summary) => {
                let patched = summary.apply(&update.patch);
                debug!("Debug: {} campos del resumen actualizados", patched);
                self.publish();
            }
            None => debug!("Debug: parche recibido sin resumen cargado"),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view.clone());
    }
}


/// Crea el orquestador y lo ejecuta en segundo plano.
///
/// Devuelve la tarea y el receptor de la vista.
pub fn start_dashboard(rx_from_presentation: mpsc::Receiver<DashboardCommand>,
                       rx_from_live: mpsc::Receiver<SummaryUpdate>,
                       tx_live_to_dashboard: mpsc::Sender<SummaryUpdate>,
                       farm_rx: watch::Receiver<Option<String>>,
                       app_context: AppContext) -> (JoinHandle<()>, watch::Receiver<DashboardView>) {

    let (view_tx, view_rx) = watch::channel(DashboardView::default());
    let (completions_tx, completions_rx) = mpsc::channel(COMPLETION_CAPACITY);
    let live = LiveSummaryChannel::new(tx_live_to_dashboard, &app_context);
    let orchestrator = DashboardOrchestrator::new(app_context, view_tx, completions_tx, live);

    let task = tokio::spawn(async move {
        orchestrator.run(rx_from_presentation,
                         rx_from_live,
                         completions_rx,
                         farm_rx
        ).await;
    });

    (task, view_rx)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::{TimeZone, Utc};
    use crate::api::testing::FakeApi;
    use crate::chart::domain::ChartMode;
    use crate::context::domain::test_context;
    use crate::dashboard::domain::DashboardHandle;
    use crate::message::domain::{AggregatedPoint, AverageEnvironment, Device, DeviceType, SensorDataMessage, Summary};
    use crate::push::domain::ChannelState;
    use crate::push::testing::FakeConnector;
    use crate::selection::domain::{SelectionContext, SensorClass};

    struct Fixture {
        orchestrator: DashboardOrchestrator,
        completions: mpsc::Receiver<Completion>,
        view: watch::Receiver<DashboardView>,
        api: Arc<FakeApi>,
        connector: Arc<FakeConnector>,
        _updates: mpsc::Receiver<SummaryUpdate>,
    }

    impl Fixture {
        fn new() -> Self {
            let api = Arc::new(FakeApi::default());
            let connector = Arc::new(FakeConnector::default());
            let ctx = test_context(api.clone(), connector.clone());

            let (view_tx, view) = watch::channel(DashboardView::default());
            let (completions_tx, completions) = mpsc::channel(COMPLETION_CAPACITY);
            let (updates_tx, updates) = mpsc::channel(8);
            let live = LiveSummaryChannel::new(updates_tx, &ctx);

            Self {
                orchestrator: DashboardOrchestrator::new(ctx, view_tx, completions_tx, live),
                completions,
                view,
                api,
                connector,
                _updates: updates,
            }
        }

        async fn complete_next(&mut self) {
            let completion = self.completions.recv().await.unwrap();
            self.orchestrator.on_completion(completion);
        }

        fn view(&self) -> DashboardView {
            self.view.borrow().clone()
        }
    }

    fn device(id: &str, device_type: DeviceType) -> Device {
        Device { device_id: id.into(), name: None, device_type, farm_id: None }
    }

    fn point(minute: u32, value: f64) -> AggregatedPoint {
        AggregatedPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
            average_value: Some(value),
        }
    }

    fn summary() -> Summary {
        Summary {
            online_devices: 2,
            total_devices: 3,
            average_environment: AverageEnvironment {
                avg_temperature: Some(19.0),
                avg_humidity: Some(50.0),
                avg_soil_moisture: Some(35.0),
                avg_soil_ph: Some(6.5),
                avg_light_intensity: Some(900.0),
            },
        }
    }

    fn seed_farm(api: &FakeApi, farm_id: &str) {
        api.with_farm(farm_id, vec![
            device("d1", DeviceType::Dht22),
            device("d2", DeviceType::Dht22),
            device("s1", DeviceType::SoilMoisture),
        ], summary());
        api.with_series("d1", "temperature", vec![point(0, 21.0)]);
        api.with_series("d1", "humidity", vec![point(0, 60.0)]);
        api.with_series("d2", "temperature", vec![point(10, 25.0)]);
        api.with_series("d2", "humidity", vec![point(10, 40.0)]);
    }

    #[tokio::test]
    async fn farm_activation_loads_and_charts_default_device() {
        let mut fx = Fixture::new();
        seed_farm(&fx.api, "f1");

        fx.orchestrator.on_farm_changed(Some("f1".into())).await;
        assert!(fx.view().loading.initial);

        fx.complete_next().await;
        let view = fx.view();
        assert!(!view.loading.initial);
        assert!(view.loading.chart);
        assert_eq!(view.selection.environment.as_deref(), Some("d1"));
        assert_eq!(view.summary, Some(summary()));

        fx.complete_next().await;
        let view = fx.view();
        assert!(!view.loading.chart);
        assert_eq!(view.chart_rows.len(), 1);
        assert_eq!(view.chart_rows[0].time_label, "09:00");
        assert_eq!(view.chart_rows[0].get("temperature"), Some(21.0));
        assert_eq!(view.chart_rows[0].get("humidity"), Some(60.0));
    }

    #[tokio::test]
    async fn late_result_for_superseded_selection_is_dropped() {
        let mut fx = Fixture::new();
        seed_farm(&fx.api, "f1");
        let gate = fx.api.hold_series("d1", "temperature");

        fx.orchestrator.on_farm_changed(Some("f1".into())).await;
        fx.complete_next().await;

        fx.orchestrator.on_command(DashboardCommand::SelectDevice(SensorClass::Environment, Some("d2".into())));
        fx.complete_next().await;
        assert_eq!(fx.view().chart_rows[0].get("temperature"), Some(25.0));

        gate.notify_one();
        fx.complete_next().await;

        let view = fx.view();
        assert_eq!(view.chart_rows.len(), 1);
        assert_eq!(view.chart_rows[0].get("temperature"), Some(25.0));
        assert_eq!(view.chart_rows[0].get("humidity"), Some(40.0));
        assert!(!view.loading.chart);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_rows() {
        let mut fx = Fixture::new();
        seed_farm(&fx.api, "f1");

        fx.orchestrator.on_farm_changed(Some("f1".into())).await;
        fx.complete_next().await;
        fx.complete_next().await;

        fx.api.fail_series("d1", "humidity");
        fx.orchestrator.on_command(DashboardCommand::ReloadChart);
        assert!(fx.view().loading.chart);
        assert_eq!(fx.view().chart_rows.len(), 1);

        fx.complete_next().await;
        let view = fx.view();
        assert!(view.errors.chart.is_some());
        assert_eq!(view.chart_rows.len(), 1);
        assert!(!view.loading.chart);
    }

    #[tokio::test]
    async fn incomplete_soil_selection_is_empty_not_error() {
        let mut fx = Fixture::new();
        seed_farm(&fx.api, "f1");

        fx.orchestrator.on_farm_changed(Some("f1".into())).await;
        fx.complete_next().await;
        fx.complete_next().await;

        fx.orchestrator.on_command(DashboardCommand::SelectDevice(SensorClass::Environment, Some("d2".into())));
        fx.complete_next().await;

        fx.orchestrator.on_command(DashboardCommand::SetChartMode(ChartMode::Soil));
        let view = fx.view();
        assert!(view.chart_rows.is_empty());
        assert!(view.errors.chart.is_none());
        assert!(!view.loading.chart);
        assert!(!fx.api.calls().iter().any(|c| c.contains("soil_moisture")));

        fx.orchestrator.on_command(DashboardCommand::SetChartMode(ChartMode::Environment));
        assert_eq!(fx.view().selection.environment.as_deref(), Some("d2"));
        fx.complete_next().await;
        assert_eq!(fx.view().chart_rows[0].get("temperature"), Some(25.0));
    }

    #[tokio::test]
    async fn summary_patch_only_for_active_farm_and_field() {
        let mut fx = Fixture::new();
        seed_farm(&fx.api, "f1");

        fx.orchestrator.on_farm_changed(Some("f1".into())).await;
        fx.complete_next().await;

        let patch = SensorDataMessage { temperature: Some(21.5), ..Default::default() };
        fx.orchestrator.on_summary_update(SummaryUpdate { farm_id: "f9".into(), patch: patch.clone() });
        assert_eq!(fx.view().summary, Some(summary()));

        fx.orchestrator.on_summary_update(SummaryUpdate { farm_id: "f1".into(), patch });
        let avg = fx.view().summary.unwrap().average_environment;
        assert_eq!(avg.avg_temperature, Some(21.5));
        assert_eq!(avg.avg_humidity, Some(50.0));
        assert_eq!(avg.avg_soil_moisture, Some(35.0));
        assert_eq!(avg.avg_soil_ph, Some(6.5));
        assert_eq!(avg.avg_light_intensity, Some(900.0));
    }

    #[tokio::test]
    async fn farm_switch_resets_view_and_reopens_channel() {
        let mut fx = Fixture::new();
        seed_farm(&fx.api, "f1");
        seed_farm(&fx.api, "f2");

        fx.orchestrator.on_farm_changed(Some("f1".into())).await;
        fx.complete_next().await;
        fx.orchestrator.on_command(DashboardCommand::SelectDevice(SensorClass::Environment, Some("d2".into())));
        fx.complete_next().await;
        fx.complete_next().await;
        fx.orchestrator.live.watch_state().wait_for(|s| *s == ChannelState::Connected).await.unwrap();
        assert!(!fx.view().chart_rows.is_empty());

        fx.orchestrator.on_farm_changed(Some("f2".into())).await;
        let view = fx.view();
        assert_eq!(view.farm_id.as_deref(), Some("f2"));
        assert_eq!(view.selection, Default::default());
        assert!(view.chart_rows.is_empty());
        assert!(view.summary.is_none());
        assert!(view.loading.initial);

        fx.orchestrator.live.watch_state().wait_for(|s| *s == ChannelState::Connected).await.unwrap();
        let log = fx.connector.log();
        let f1_close = log.iter().position(|l| l == "close").unwrap();
        let f2_subscribe = log.iter().position(|l| l == "subscribe /topic/farm/f2/sensor-data").unwrap();
        assert!(log.contains(&"unsubscribe sub-0".to_string()));
        assert!(f1_close < f2_subscribe);
        assert_eq!(fx.orchestrator.app_context.subscriptions.len(), 1);

        let stale = Completion::FarmLoaded { generation: 1, farm_id: "f1".into(), result: Ok((vec![], None)) };
        fx.orchestrator.on_completion(stale);
        assert!(fx.view().loading.initial);

        fx.complete_next().await;
        assert_eq!(fx.view().selection.environment.as_deref(), Some("d1"));
    }

    #[tokio::test]
    async fn clearing_farm_tears_everything_down() {
        let mut fx = Fixture::new();
        seed_farm(&fx.api, "f1");

        fx.orchestrator.on_farm_changed(Some("f1".into())).await;
        fx.complete_next().await;
        fx.orchestrator.on_command(DashboardCommand::SetChartMode(ChartMode::Soil));

        fx.orchestrator.on_farm_changed(None).await;

        let view = fx.view();
        assert_eq!(view, DashboardView { chart_mode: ChartMode::Soil, ..Default::default() });
        assert_eq!(fx.orchestrator.live.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn initial_load_failure_sets_error_flag() {
        let mut fx = Fixture::new();
        fx.api.fail_farm("f1");

        fx.orchestrator.on_farm_changed(Some("f1".into())).await;
        fx.complete_next().await;

        let view = fx.view();
        assert!(!view.loading.initial);
        assert!(view.errors.initial.is_some());
        assert!(view.chart_rows.is_empty());
    }

    #[tokio::test]
    async fn running_dashboard_merges_polls_and_pushes() {
        let api = Arc::new(FakeApi::default());
        let connector = Arc::new(FakeConnector::default());
        seed_farm(&api, "f1");
        let ctx = test_context(api.clone(), connector.clone());
        let selection = SelectionContext::new(None, None);

        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (updates_tx, updates_rx) = mpsc::channel(8);
        let (task, view_rx) = start_dashboard(commands_rx, updates_rx, updates_tx, selection.farm_receiver(), ctx);
        let handle = DashboardHandle::new(commands_tx, view_rx);

        selection.set_farm(Some("f1".into()));
        let mut view = handle.watch();
        view.wait_for(|v| !v.chart_rows.is_empty()).await.unwrap();

        while connector.connects() == 0 {
            tokio::task::yield_now().await;
        }
        connector.push("/topic/farm/f1/sensor-data", r#"{"lightIntensity": 1200}"#);
        let patched = view
            .wait_for(|v| v.summary.as_ref().and_then(|s| s.average_environment.avg_light_intensity) == Some(1200.0))
            .await
            .unwrap()
            .clone();
        assert_eq!(patched.summary.unwrap().average_environment.avg_temperature, Some(19.0));

        handle.set_chart_mode(ChartMode::Soil).await;
        view.wait_for(|v| v.chart_mode == ChartMode::Soil).await.unwrap();
        assert!(handle.view().chart_rows.is_empty());

        drop(selection);
        task.await.unwrap();
        assert_eq!(connector.log().last().map(String::as_str), Some("close"));
    }
}
