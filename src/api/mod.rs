//! Remote collaborators of the orchestration core.

pub mod http;
pub mod wire;

use crate::error::Result;
use crate::model::{Category, Entity, EntityId, InspectionPhoto, Status, Variant};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

pub use http::{HttpApi, HttpNarrative};
pub use wire::{FeedbackRecord, NarrativeRequest, SeriesFetch, SeriesRows};

/// Catalog filter sent to the point listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub variant: Variant,
    pub category: Option<Category>,
    pub status: Option<Status>,
}

/// Monitoring API used by the filter manager and the per-entity routines.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    async fn list_entities(&self, query: &CatalogQuery) -> Result<Vec<Entity>>;

    /// Monthly rows (`MM/YYYY` bounds) plus the full history.
    async fn monthly_series(&self, id: EntityId, start: &str, end: &str) -> Result<SeriesFetch>;

    /// Daily per-measurement lists (`DD/MM/YYYY` bounds) plus the full history.
    async fn daily_series(&self, id: EntityId, start: &str, end: &str) -> Result<SeriesFetch>;

    async fn inspection_photos(
        &self,
        id: EntityId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InspectionPhoto>>;

    /// Water-quality collection (samples and legislation limits) for a month range.
    async fn water_quality_collection(
        &self,
        id: EntityId,
        start: &str,
        end: &str,
        parameters: &[String],
    ) -> Result<Value>;

    async fn water_quality_history(&self, id: EntityId) -> Result<Value>;

    async fn submit_feedback(&self, record: &FeedbackRecord) -> Result<()>;
}

/// AI narrative generator. `Ok(None)` means the service answered without a
/// usable narrative.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    async fn analyze(&self, variant: Variant, request: &NarrativeRequest) -> Result<Option<String>>;
}
