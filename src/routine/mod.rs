//! Per-entity fetch-and-aggregate routines.
//!
//! A routine turns one point and one date range into a complete
//! [`EntityResult`]. Only the primary fetch is fatal; narrative, history and
//! photo calls degrade to empty values.

pub mod groundwater;
pub mod water_quality;

use crate::api::{MonitoringApi, NarrativeService};
use crate::error::Result;
use crate::model::{Category, DateRange, Entity, EntityId, EntityResult, Granularity, Variant};
use async_trait::async_trait;
use std::sync::Arc;

pub use groundwater::GroundwaterRoutine;
pub use water_quality::WaterQualityRoutine;

/// Everything a routine needs for one point.
#[derive(Debug, Clone)]
pub struct RoutineRequest {
    pub id: EntityId,
    pub label: String,
    pub range: DateRange,
    pub granularity: Granularity,
    pub parameters: Vec<String>,
    /// Catalog snapshot taken when the search started.
    pub catalog: Arc<Vec<Entity>>,
}

impl RoutineRequest {
    pub fn category(&self) -> Option<Category> {
        self.catalog
            .iter()
            .find(|e| e.id == self.id)
            .and_then(|e| e.category.clone())
    }
}

#[async_trait]
pub trait EntityRoutine: Send + Sync {
    fn variant(&self) -> Variant;

    async fn run(&self, request: &RoutineRequest) -> Result<EntityResult>;
}

/// Routine matching a dashboard variant.
pub fn for_variant(
    variant: Variant,
    api: Arc<dyn MonitoringApi>,
    narrative: Arc<dyn NarrativeService>,
) -> Arc<dyn EntityRoutine> {
    match variant {
        Variant::Groundwater => Arc::new(GroundwaterRoutine::new(api, narrative)),
        Variant::WaterQuality => Arc::new(WaterQualityRoutine::new(api, narrative)),
    }
}
