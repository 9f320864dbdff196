use super::{EntityRoutine, RoutineRequest};
use crate::api::{MonitoringApi, NarrativeRequest, NarrativeService};
use crate::error::Result;
use crate::model::{EntityResult, Granularity, Narrative, Variant};
use crate::normalize::normalize_samples;
use crate::stats::summarize;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Water-quality routine: collection samples, history-backed narrative.
/// Always month-granular; has no inspection photos.
pub struct WaterQualityRoutine {
    api: Arc<dyn MonitoringApi>,
    narrative: Arc<dyn NarrativeService>,
}

impl WaterQualityRoutine {
    pub fn new(api: Arc<dyn MonitoringApi>, narrative: Arc<dyn NarrativeService>) -> Self {
        Self { api, narrative }
    }

    async fn narrative(&self, request: &RoutineRequest, collection: &Value) -> Option<String> {
        let history = match self.api.water_quality_history(request.id).await {
            Ok(history) => history,
            Err(e) => {
                warn!("History unavailable for point {}, no narrative: {}", request.id, e);
                return None;
            }
        };

        let body = NarrativeRequest {
            data: collection.clone(),
            entity_id: request.id,
            history,
            parameters: request.parameters.clone(),
        };
        match self.narrative.analyze(Variant::WaterQuality, &body).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Narrative failed for point {}: {}", request.id, e);
                None
            }
        }
    }
}

#[async_trait]
impl EntityRoutine for WaterQualityRoutine {
    fn variant(&self) -> Variant {
        Variant::WaterQuality
    }

    async fn run(&self, request: &RoutineRequest) -> Result<EntityResult> {
        let (start, end) = request.range.format(Granularity::Monthly);
        info!(
            "Fetching collection for point {} ({}) from {} to {}",
            request.id, request.label, start, end
        );

        let collection = self
            .api
            .water_quality_collection(request.id, &start, &end, &request.parameters)
            .await?;

        let samples = collection
            .get("amostras")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let readings = normalize_samples(samples);

        let narrative = if samples.is_empty() {
            debug!("No samples for point {}, skipping narrative", request.id);
            None
        } else {
            self.narrative(request, &collection).await
        };

        let summary = summarize(&readings);
        info!(
            "Point {} ready: {} samples, narrative={}",
            request.id,
            readings.len(),
            narrative.is_some()
        );

        Ok(EntityResult {
            id: request.id,
            label: request.label.clone(),
            category: request.category(),
            readings,
            narrative: Narrative::generated(narrative),
            photos: None,
            summary,
            raw: Some(collection),
        })
    }
}
