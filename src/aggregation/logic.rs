//! Obtención de series agregadas para el gráfico.
//!
//! Las dos consultas de un ciclo se lanzan en paralelo y deben completarse ambas
//! antes de unirlas. Si cualquiera falla, el ciclo completo falla: nunca se
//! produce un gráfico parcial.


use chrono_tz::Tz;
use tracing::{debug, instrument};
use crate::api::domain::TelemetryApi;
use crate::chart::domain::{ChartRequest, ChartRow};
use crate::chart::logic::merge_series;
use crate::config::aggregation::WINDOW;
use crate::system::domain::ErrorType;


#[instrument(name = "fetch_chart", skip(api, tz), fields(mode = ?request.mode))]
pub async fn fetch_chart(api: &dyn TelemetryApi,
                         request: &ChartRequest,
                         tz: &Tz) -> Result<Vec<ChartRow>, ErrorType> {

    let [first, second] = &request.series;

    let (series_a, series_b) = tokio::try_join!(
        api.aggregated(&first.device_id, first.field, WINDOW),
        api.aggregated(&second.device_id, second.field, WINDOW),
    )?;

    debug!("Debug: series recibidas ({} / {} puntos)", series_a.len(), series_b.len());

    Ok(merge_series(&series_a, &series_b, first.key, second.key, tz))
}
