use crate::api::wire::{DailySeries, RawRow};
use crate::model::{fields, PeriodReading};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keys that label a row rather than measure something.
const PERIOD_KEYS: [&str; 4] = ["mes_ano", "data", "dataColeta", "data_coleta"];
const IGNORED_KEYS: [&str; 4] = ["id", "cdPiezometro", "idPiezometro", "idPonto"];

/// Turn a date label into a zero-padded sortable key.
///
/// - `DD/MM/YYYY` -> `YYYY-MM-DD`
/// - `MM/YYYY` -> `YYYY-MM`
/// - `YYYY-MM-DDTHH:MM:SS` -> `YYYY-MM-DD`
/// - anything else is returned trimmed
pub fn period_key(raw: &str) -> String {
    let raw = raw.trim();

    if raw.contains('/') {
        let parts: Vec<&str> = raw.split('/').map(str::trim).collect();
        match parts.as_slice() {
            [day, month, year] => return format!("{}-{:0>2}-{:0>2}", year, month, day),
            [month, year] => return format!("{}-{:0>2}", year, month),
            _ => return raw.to_string(),
        }
    }

    if let Some((date, _time)) = raw.split_once('T') {
        return date.to_string();
    }

    raw.to_string()
}

/// Numeric value of a JSON field; numeric strings (comma or dot decimal) count.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn row_period(row: &RawRow) -> Option<String> {
    PERIOD_KEYS
        .iter()
        .find_map(|key| row.get(*key).and_then(Value::as_str))
        .map(period_key)
}

fn merge_row(merged: &mut BTreeMap<String, PeriodReading>, period: String, row: &RawRow) {
    let reading = merged
        .entry(period.clone())
        .or_insert_with(|| PeriodReading::new(period));

    for (key, value) in row {
        if PERIOD_KEYS.contains(&key.as_str()) || IGNORED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(v) = numeric(value) {
            reading.values.insert(key.clone(), v);
        }
    }
}

/// Flat rows (monthly shape): one reading per period, ascending, merged on
/// duplicate periods. Rows without a period label are dropped.
pub fn normalize_rows(rows: &[RawRow]) -> Vec<PeriodReading> {
    let mut merged = BTreeMap::new();
    for row in rows {
        if let Some(period) = row_period(row) {
            merge_row(&mut merged, period, row);
        }
    }
    merged.into_values().collect()
}

/// Raw rows ordered by period key, rows without a period label dropped.
/// Columns are left untouched.
pub fn sorted_rows(rows: &[RawRow]) -> Vec<RawRow> {
    let mut keyed: Vec<(String, &RawRow)> = rows
        .iter()
        .filter_map(|row| row_period(row).map(|period| (period, row)))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, row)| row.clone()).collect()
}

/// Per-measurement lists (daily shape): merged by day, ascending. The
/// elevation constants are stamped on every merged day.
pub fn normalize_daily(series: &DailySeries) -> Vec<PeriodReading> {
    let mut merged: BTreeMap<String, PeriodReading> = BTreeMap::new();

    for (field, list) in series.lists() {
        for entry in list {
            let period = period_key(&entry.data);
            let reading = merged
                .entry(period.clone())
                .or_insert_with(|| PeriodReading::new(period));
            if let Some(v) = entry.values.get(field).and_then(numeric) {
                reading.values.insert(field.to_string(), v);
            }
        }
    }

    merged
        .into_values()
        .map(|mut reading| {
            if let Some(v) = series.cota_superficie {
                reading.values.insert(fields::SURFACE_ELEVATION.to_string(), v);
            }
            if let Some(v) = series.cota_base {
                reading.values.insert(fields::BASE_ELEVATION.to_string(), v);
            }
            reading
        })
        .collect()
}

/// Water-quality samples: numeric columns and `{parametro, valor}` lists
/// both become fields of the sample's day.
pub fn normalize_samples(samples: &[Value]) -> Vec<PeriodReading> {
    let mut merged = BTreeMap::new();

    for sample in samples {
        let Some(row) = sample.as_object() else {
            continue;
        };
        let Some(period) = row_period(row) else {
            continue;
        };
        merge_row(&mut merged, period.clone(), row);

        for list_key in ["parametros", "resultados"] {
            let Some(items) = row.get(list_key).and_then(Value::as_array) else {
                continue;
            };
            for item in items {
                let name = item
                    .get("parametro")
                    .or_else(|| item.get("nome"))
                    .and_then(Value::as_str);
                let value = item.get("valor").and_then(numeric);
                if let (Some(name), Some(value), Some(reading)) =
                    (name, value, merged.get_mut(&period))
                {
                    reading.values.insert(name.to_string(), value);
                }
            }
        }
    }

    merged.into_values().collect()
}
