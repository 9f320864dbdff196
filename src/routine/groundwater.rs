use super::{EntityRoutine, RoutineRequest};
use crate::api::{MonitoringApi, NarrativeRequest, NarrativeService, SeriesRows};
use crate::error::Result;
use crate::model::{EntityResult, Granularity, InspectionPhoto, Narrative, Variant};
use crate::normalize::{normalize_daily, normalize_rows, sorted_rows};
use crate::stats::summarize;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Static-level routine: series, narrative, summary and inspection photos.
pub struct GroundwaterRoutine {
    api: Arc<dyn MonitoringApi>,
    narrative: Arc<dyn NarrativeService>,
}

impl GroundwaterRoutine {
    pub fn new(api: Arc<dyn MonitoringApi>, narrative: Arc<dyn NarrativeService>) -> Self {
        Self { api, narrative }
    }

    async fn photos(&self, request: &RoutineRequest) -> Vec<InspectionPhoto> {
        let (start, end) = match request.granularity {
            Granularity::Daily => (request.range.start(), request.range.end()),
            Granularity::Monthly => request.range.month_bounds(),
        };

        match self.api.inspection_photos(request.id, start, end).await {
            Ok(photos) => photos,
            Err(e) => {
                warn!("Inspection photos unavailable for point {}: {}", request.id, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl EntityRoutine for GroundwaterRoutine {
    fn variant(&self) -> Variant {
        Variant::Groundwater
    }

    async fn run(&self, request: &RoutineRequest) -> Result<EntityResult> {
        let (start, end) = request.range.format(request.granularity);
        info!(
            "Fetching point {} ({}) from {} to {}",
            request.id, request.label, start, end
        );

        let fetch = match request.granularity {
            Granularity::Daily => self.api.daily_series(request.id, &start, &end).await?,
            Granularity::Monthly => self.api.monthly_series(request.id, &start, &end).await?,
        };

        let (readings, narrative_input) = match &fetch.rows {
            SeriesRows::Monthly(rows) => {
                let readings = normalize_rows(rows);
                // narrative reads the raw rows, in period order
                let input = (!readings.is_empty()).then(|| {
                    Value::Array(sorted_rows(rows).into_iter().map(Value::Object).collect())
                });
                (readings, input)
            }
            SeriesRows::Daily(series) => {
                let input = if series.is_empty() {
                    None
                } else {
                    serde_json::to_value(series).ok()
                };
                (normalize_daily(series), input)
            }
        };
        debug!("Point {} normalized to {} readings", request.id, readings.len());

        let narrative = match narrative_input {
            Some(data) => {
                let body = NarrativeRequest {
                    data,
                    entity_id: request.id,
                    history: fetch.history.clone(),
                    parameters: Vec::new(),
                };
                match self.narrative.analyze(Variant::Groundwater, &body).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Narrative failed for point {}: {}", request.id, e);
                        None
                    }
                }
            }
            None => {
                debug!("No data for point {}, skipping narrative", request.id);
                None
            }
        };

        let summary = summarize(&readings);
        let photos = self.photos(request).await;

        info!(
            "Point {} ready: {} readings, narrative={}, {} photos",
            request.id,
            readings.len(),
            narrative.is_some(),
            photos.len()
        );

        Ok(EntityResult {
            id: request.id,
            label: request.label.clone(),
            category: request.category(),
            readings,
            narrative: Narrative::generated(narrative),
            photos: Some(photos),
            summary,
            raw: None,
        })
    }
}
