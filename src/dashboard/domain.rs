use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::error;
use crate::chart::domain::{ChartMode, ChartRequest, ChartRow};
use crate::message::domain::{Device, SensorDataMessage, Summary};
use crate::selection::domain::{devices_of_class, DeviceSelection, SensorClass};
use crate::system::domain::ErrorType;


/// Parche incremental del resumen producido por el canal en vivo.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryUpdate {
    pub farm_id: String,
    pub patch: SensorDataMessage,
}


/// Acciones que la presentación puede pedir al dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardCommand {
    SetChartMode(ChartMode),
    SelectDevice(SensorClass, Option<String>),
    ReloadChart,
}


#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct LoadingFlags {
    /// Carga inicial de dispositivos y resumen.
    pub initial: bool,
    pub chart: bool,
}


#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct ErrorFlags {
    pub initial: Option<String>,
    pub chart: Option<String>,
}


/// Vista de solo lectura expuesta a la presentación.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub farm_id: Option<String>,
    pub summary: Option<Summary>,
    pub chart_mode: ChartMode,
    pub chart_rows: Vec<ChartRow>,
    pub devices: Vec<Device>,
    pub selection: DeviceSelection,
    pub loading: LoadingFlags,
    pub errors: ErrorFlags,
}


impl DashboardView {
    pub fn devices_of(&self, class: SensorClass) -> Vec<&Device> {
        devices_of_class(&self.devices, class).collect()
    }
}


/// Etiqueta de obsolescencia: identifica la selección para la que se lanzó un fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartTag {
    pub generation: u64,
    pub farm_id: String,
    pub request: ChartRequest,
}


/// Resultados de las tareas de fondo lanzadas por el orquestador.
#[derive(Debug)]
pub enum Completion {
    FarmLoaded {
        generation: u64,
        farm_id: String,
        result: Result<(Vec<Device>, Option<Summary>), ErrorType>,
    },
    ChartLoaded {
        tag: ChartTag,
        result: Result<Vec<ChartRow>, ErrorType>,
    },
}


/// Punto de acceso de la presentación: setters y vista. Nunca expone conexiones.
#[derive(Clone, Debug)]
pub struct DashboardHandle {
    commands: mpsc::Sender<DashboardCommand>,
    view: watch::Receiver<DashboardView>,
}


impl DashboardHandle {
    pub fn new(commands: mpsc::Sender<DashboardCommand>, view: watch::Receiver<DashboardView>) -> Self {
        Self { commands, view }
    }

    pub async fn set_chart_mode(&self, mode: ChartMode) {
        self.send(DashboardCommand::SetChartMode(mode)).await;
    }

    pub async fn select_device(&self, class: SensorClass, device_id: Option<String>) {
        self.send(DashboardCommand::SelectDevice(class, device_id)).await;
    }

    pub async fn reload_chart(&self) {
        self.send(DashboardCommand::ReloadChart).await;
    }

    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    async fn send(&self, command: DashboardCommand) {
        if self.commands.send(command).await.is_err() {
            error!("Error: el dashboard ya no recibe comandos");
        }
    }
}
