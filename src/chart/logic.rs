use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crate::chart::domain::ChartRow;
use crate::config::aggregation::LABEL_FORMAT;
use crate::message::domain::AggregatedPoint;


pub fn format_label(timestamp: &DateTime<Utc>, tz: &Tz) -> String {
    timestamp.with_timezone(tz).format(LABEL_FORMAT).to_string()
}


/// Une dos series agregadas en filas alineadas por etiqueta de tiempo.
///
/// * Una fila por etiqueta distinta, ordenadas de forma ascendente por la etiqueta.
/// * Una etiqueta presente en una sola serie deja la otra clave ausente (sin interpolar).
/// * Dentro de una misma serie, el último punto con la misma etiqueta gana.
pub fn merge_series(series_a: &[AggregatedPoint],
                    series_b: &[AggregatedPoint],
                    key_a: &str,
                    key_b: &str,
                    tz: &Tz) -> Vec<ChartRow> {

    let mut rows: BTreeMap<String, ChartRow> = BTreeMap::new();

    for (series, key) in [(series_a, key_a), (series_b, key_b)] {
        for point in series {
            let label = format_label(&point.timestamp, tz);
            let row = rows
                .entry(label)
                .or_insert_with_key(|label| ChartRow::new(label.clone()));

            match point.average_value {
                Some(value) => { row.values.insert(key.to_string(), value); }
                None => { row.values.remove(key); }
            }
        }
    }

    rows.into_values().collect()
}
