use crate::model::{PeriodReading, SummaryStatistics};
use std::collections::BTreeMap;

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean of every field seen in at least one reading, divided by the total
/// reading count (a reading missing the field contributes 0).
pub fn summarize(readings: &[PeriodReading]) -> SummaryStatistics {
    let count = readings.len();
    if count == 0 {
        return SummaryStatistics::default();
    }

    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for reading in readings {
        for (field, value) in &reading.values {
            *sums.entry(field.clone()).or_insert(0.0) += value;
        }
    }

    let means = sums
        .into_iter()
        .map(|(field, sum)| (field, round_one_decimal(sum / count as f64)))
        .collect();

    SummaryStatistics { means, count }
}
