#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use piezo_monitor::api::wire::{DailySeries, RawRow};
use piezo_monitor::api::{
    CatalogQuery, FeedbackRecord, MonitoringApi, NarrativeRequest, NarrativeService, SeriesFetch,
    SeriesRows,
};
use piezo_monitor::error::{AppError, Result};
use piezo_monitor::model::{Category, Entity, EntityId, EntityResult, InspectionPhoto, Status, Variant};
use piezo_monitor::routine::{EntityRoutine, RoutineRequest};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn row(value: Value) -> RawRow {
    value.as_object().cloned().unwrap()
}

pub fn entity(id: EntityId, name: &str, category: Category) -> Entity {
    Entity {
        id,
        label: format!("{} - {} ({})", id, name, category),
        category: Some(category),
        status: Some(Status::Active),
    }
}

/// Monthly static-level rows, one per `(MM/YYYY, value)`.
pub fn monthly_rows(values: &[(&str, f64)]) -> Vec<RawRow> {
    values
        .iter()
        .map(|(period, v)| row(json!({ "mes_ano": period, "nivel_estatico": v })))
        .collect()
}

/// In-memory monitoring API with a call log.
#[derive(Default)]
pub struct FakeApi {
    pub catalog: Mutex<Vec<Entity>>,
    pub catalog_fails: AtomicBool,
    pub monthly: Mutex<HashMap<EntityId, Vec<RawRow>>>,
    pub daily: Mutex<HashMap<EntityId, DailySeries>>,
    pub collections: Mutex<HashMap<EntityId, Value>>,
    pub failing: Mutex<HashSet<EntityId>>,
    pub photos_fail: AtomicBool,
    pub history_fails: AtomicBool,
    pub calls: Mutex<Vec<String>>,
    pub catalog_queries: Mutex<Vec<CatalogQuery>>,
    pub feedback: Mutex<Vec<FeedbackRecord>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(self, entities: Vec<Entity>) -> Self {
        *self.catalog.lock().unwrap() = entities;
        self
    }

    pub fn with_monthly(self, id: EntityId, rows: Vec<RawRow>) -> Self {
        self.monthly.lock().unwrap().insert(id, rows);
        self
    }

    pub fn with_daily(self, id: EntityId, series: DailySeries) -> Self {
        self.daily.lock().unwrap().insert(id, series);
        self
    }

    pub fn with_collection(self, id: EntityId, collection: Value) -> Self {
        self.collections.lock().unwrap().insert(id, collection);
        self
    }

    pub fn failing_for(self, id: EntityId) -> Self {
        self.failing.lock().unwrap().insert(id);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of logged calls whose name starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failing(&self, id: EntityId) -> Result<()> {
        if self.failing.lock().unwrap().contains(&id) {
            return Err(AppError::Api {
                status: 500,
                url: format!("http://fake/{}", id),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MonitoringApi for FakeApi {
    async fn list_entities(&self, query: &CatalogQuery) -> Result<Vec<Entity>> {
        self.log("catalog".to_string());
        self.catalog_queries.lock().unwrap().push(query.clone());
        if self.catalog_fails.load(Ordering::SeqCst) {
            return Err(AppError::Api {
                status: 503,
                url: "http://fake/catalog".to_string(),
            });
        }
        let entities = self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|e| query.category.is_none() || e.category == query.category)
            .cloned()
            .collect();
        Ok(entities)
    }

    async fn monthly_series(&self, id: EntityId, start: &str, end: &str) -> Result<SeriesFetch> {
        self.log(format!("monthly:{}:{}-{}", id, start, end));
        tokio::task::yield_now().await;
        self.check_failing(id)?;
        let rows = self.monthly.lock().unwrap().get(&id).cloned().unwrap_or_default();
        Ok(SeriesFetch {
            rows: SeriesRows::Monthly(rows),
            history: json!([{ "mes_ano": "10/2008", "nivel_estatico": 4.0 }]),
        })
    }

    async fn daily_series(&self, id: EntityId, start: &str, end: &str) -> Result<SeriesFetch> {
        self.log(format!("daily:{}:{}-{}", id, start, end));
        self.check_failing(id)?;
        let series = self.daily.lock().unwrap().get(&id).cloned().unwrap_or_default();
        Ok(SeriesFetch {
            rows: SeriesRows::Daily(series),
            history: json!([]),
        })
    }

    async fn inspection_photos(
        &self,
        id: EntityId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InspectionPhoto>> {
        self.log(format!("photos:{}:{}:{}", id, start, end));
        if self.photos_fail.load(Ordering::SeqCst) {
            return Err(AppError::Api {
                status: 404,
                url: "http://fake/photos".to_string(),
            });
        }
        Ok(vec![InspectionPhoto {
            path: format!("/fotos/{}.jpg", id),
            taken_at: Some(start.to_string()),
            entity_id: Some(id),
        }])
    }

    async fn water_quality_collection(
        &self,
        id: EntityId,
        start: &str,
        end: &str,
        parameters: &[String],
    ) -> Result<Value> {
        self.log(format!("collection:{}:{}-{}:{}", id, start, end, parameters.join(",")));
        self.check_failing(id)?;
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| json!({ "amostras": [] })))
    }

    async fn water_quality_history(&self, id: EntityId) -> Result<Value> {
        self.log(format!("history:{}", id));
        if self.history_fails.load(Ordering::SeqCst) {
            return Err(AppError::Api {
                status: 500,
                url: "http://fake/history".to_string(),
            });
        }
        Ok(json!({ "amostras": [] }))
    }

    async fn submit_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        self.log(format!("feedback:{}", record.entity_id));
        self.feedback.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Narrative service answering with a fixed text, or failing.
pub struct FakeNarrative {
    pub reply: Mutex<Option<String>>,
    pub fails: AtomicBool,
    pub requests: Mutex<Vec<(Variant, NarrativeRequest)>>,
}

impl Default for FakeNarrative {
    fn default() -> Self {
        Self {
            reply: Mutex::new(Some("Static level stable over the period.".to_string())),
            fails: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl FakeNarrative {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let narrative = Self::default();
        narrative.fails.store(true, Ordering::SeqCst);
        narrative
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl NarrativeService for FakeNarrative {
    async fn analyze(&self, variant: Variant, request: &NarrativeRequest) -> Result<Option<String>> {
        self.requests.lock().unwrap().push((variant, request.clone()));
        if self.fails.load(Ordering::SeqCst) {
            return Err(AppError::Api {
                status: 502,
                url: "http://fake/webhook".to_string(),
            });
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

/// Wraps a routine and records start/end events and peak concurrency.
/// With a gate installed, the first run waits on it after signalling
/// `started`.
pub struct RecordingRoutine {
    inner: Arc<dyn EntityRoutine>,
    pub events: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub started: Arc<Notify>,
    gate: Option<Arc<Notify>>,
    gated_once: AtomicBool,
}

impl RecordingRoutine {
    pub fn new(inner: Arc<dyn EntityRoutine>) -> Self {
        Self {
            inner,
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: Arc::new(Notify::new()),
            gate: None,
            gated_once: AtomicBool::new(false),
        }
    }

    pub fn gated(inner: Arc<dyn EntityRoutine>, gate: Arc<Notify>) -> Self {
        let mut routine = Self::new(inner);
        routine.gate = Some(gate);
        routine
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityRoutine for RecordingRoutine {
    fn variant(&self) -> Variant {
        self.inner.variant()
    }

    async fn run(&self, request: &RoutineRequest) -> Result<EntityResult> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("start:{}", request.id));
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            if !self.gated_once.swap(true, Ordering::SeqCst) {
                gate.notified().await;
            }
        }
        tokio::task::yield_now().await;

        let result = self.inner.run(request).await;

        self.events.lock().unwrap().push(format!("end:{}", request.id));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
