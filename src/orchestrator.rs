//! Multi-entity search orchestration.
//!
//! [`Dashboard`] owns the filter state and the per-point result cache. A
//! search validates the filter, then runs the per-entity routine once (single
//! point) or strictly one point at a time (several points), publishing
//! progress after each point settles. Filter changes clear the cache and
//! supersede any search still in flight: its late results are discarded.

use crate::alert::{Alert, AlertSink};
use crate::api::MonitoringApi;
use crate::cache::ResultCache;
use crate::error::{AppError, Result, ValidationError};
use crate::feedback::feedback_record;
use crate::filter::{CatalogRefresh, FilterChange, FilterPatch, FilterState, QueryFilter};
use crate::model::{DateRange, Entity, EntityId, EntityResult, Granularity, Variant};
use crate::routine::{EntityRoutine, RoutineRequest};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Validating,
    SingleFetch,
    MultiFetchSequential,
}

/// "N of M ready" readout for the running search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchProgress {
    pub generation: u64,
    pub completed: usize,
    pub total: usize,
    /// Label of the point being fetched, if any.
    pub current: Option<String>,
}

impl SearchProgress {
    pub fn message(&self) -> String {
        format!("{}/{} points ready", self.completed, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    pub id: EntityId,
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Completed {
        ready: usize,
        failed: usize,
        empty: bool,
    },
    /// A filter change landed while the search ran; its results were dropped.
    Superseded,
}

/// Read-only view of the dashboard for consumers.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub state: SearchState,
    pub filter: QueryFilter,
    pub results: Vec<Arc<EntityResult>>,
    pub failures: Vec<EntityFailure>,
    /// Last search finished without failures and every point came back
    /// without readings.
    pub last_search_empty: bool,
    pub analysis_loading: bool,
}

impl DashboardSnapshot {
    pub fn loading(&self) -> bool {
        self.state != SearchState::Idle
    }

    pub fn result(&self, id: EntityId) -> Option<&Arc<EntityResult>> {
        self.results.iter().find(|r| r.id == id)
    }

    /// Ready points as (id, label), one per tab.
    pub fn tabs(&self) -> Vec<(EntityId, &str)> {
        self.results.iter().map(|r| (r.id, r.label.as_str())).collect()
    }
}

/// Check a filter before any network call.
pub fn validate_search(
    filter: &QueryFilter,
) -> std::result::Result<(Vec<EntityId>, DateRange), ValidationError> {
    if filter.selected.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let (Some(start), Some(end)) = (filter.start, filter.end) else {
        return Err(ValidationError::IncompleteDateRange);
    };
    let range = DateRange::new(start, end).ok_or(ValidationError::InvertedDateRange { start, end })?;
    Ok((filter.selected.clone(), range))
}

struct DashboardState {
    filters: FilterState,
    search: SearchState,
    generation: u64,
    results: ResultCache,
    failures: Vec<EntityFailure>,
    last_search_empty: bool,
    analysis_loading: bool,
    auto_applied: bool,
}

impl DashboardState {
    fn clear_results(&mut self) {
        self.results.clear();
        self.failures.clear();
        self.last_search_empty = false;
    }

    /// Any filter change invalidates shown results and in-flight searches.
    fn on_filter_changed(&mut self) {
        self.clear_results();
        self.generation += 1;
        if self.search != SearchState::Idle {
            info!("Filter changed during search, superseding it");
            self.search = SearchState::Idle;
            self.analysis_loading = false;
        }
    }

    fn finish(&mut self) {
        self.search = SearchState::Idle;
        self.analysis_loading = false;
    }
}

struct SearchPlan {
    generation: u64,
    requests: Vec<RoutineRequest>,
}

struct Inner {
    api: Arc<dyn MonitoringApi>,
    routine: Arc<dyn EntityRoutine>,
    alerts: Arc<dyn AlertSink>,
    state: Mutex<DashboardState>,
    progress: watch::Sender<SearchProgress>,
}

/// Cloneable handle to one dashboard (groundwater or water quality).
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Inner>,
}

impl Dashboard {
    pub fn new(
        api: Arc<dyn MonitoringApi>,
        routine: Arc<dyn EntityRoutine>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let filters = FilterState::new(routine.variant());
        Self::with_filters(api, routine, alerts, filters)
    }

    /// Dashboard seeded with an initial filter, e.g. opened from another view.
    pub fn with_filter(
        api: Arc<dyn MonitoringApi>,
        routine: Arc<dyn EntityRoutine>,
        alerts: Arc<dyn AlertSink>,
        filter: QueryFilter,
    ) -> Self {
        let filters = FilterState::with_filter(routine.variant(), filter);
        Self::with_filters(api, routine, alerts, filters)
    }

    fn with_filters(
        api: Arc<dyn MonitoringApi>,
        routine: Arc<dyn EntityRoutine>,
        alerts: Arc<dyn AlertSink>,
        filters: FilterState,
    ) -> Self {
        let (progress, _) = watch::channel(SearchProgress::default());
        let state = DashboardState {
            filters,
            search: SearchState::Idle,
            generation: 0,
            results: ResultCache::new(),
            failures: Vec::new(),
            last_search_empty: false,
            analysis_loading: false,
            auto_applied: false,
        };

        Self {
            inner: Arc::new(Inner {
                api,
                routine,
                alerts,
                state: Mutex::new(state),
                progress,
            }),
        }
    }

    pub fn variant(&self) -> Variant {
        self.inner.routine.variant()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<SearchProgress> {
        self.inner.progress.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let st = self.inner.state.lock().await;
        DashboardSnapshot {
            state: st.search,
            filter: st.filters.filter().clone(),
            results: st.results.iter().cloned().collect(),
            failures: st.failures.clone(),
            last_search_empty: st.last_search_empty,
            analysis_loading: st.analysis_loading,
        }
    }

    pub async fn catalog(&self) -> Vec<Entity> {
        self.inner.state.lock().await.filters.catalog().to_vec()
    }

    /// Fetch the selectable points for the current category and status.
    /// On failure the previous catalog is kept and an alert is raised.
    pub async fn load_catalog(&self) -> Result<CatalogRefresh> {
        let query = self.inner.state.lock().await.filters.catalog_query();

        let entities = match self.inner.api.list_entities(&query).await {
            Ok(entities) => entities,
            Err(e) => {
                self.inner.alerts.raise(Alert::error(
                    "Error",
                    format!("Could not load the list of monitoring points: {}", e),
                ));
                return Err(e);
            }
        };

        let mut st = self.inner.state.lock().await;
        if st.filters.catalog_query() != query {
            debug!("Catalog response for an outdated filter discarded");
            return Ok(CatalogRefresh::default());
        }

        let refresh = st.filters.apply_catalog(entities);
        if !refresh.dropped.is_empty() {
            st.on_filter_changed();
        }
        Ok(refresh)
    }

    /// Merge `patch` into the filter, clearing results when anything changed
    /// and reloading the catalog when category or status changed.
    pub async fn update_filter(&self, patch: FilterPatch) -> Result<FilterChange> {
        let change = {
            let mut st = self.inner.state.lock().await;
            let change = st.filters.update_filter(patch);
            if change.changed {
                st.on_filter_changed();
            }
            change
        };

        if change.needs_catalog_refresh {
            self.load_catalog().await?;
        }
        Ok(change)
    }

    pub async fn select_entities(&self, ids: Option<Vec<EntityId>>) -> Result<FilterChange> {
        self.update_filter(FilterPatch::selection(ids)).await
    }

    /// Run a search for the current filter.
    pub async fn search(&self) -> Result<SearchOutcome> {
        let plan = {
            let mut st = self.inner.state.lock().await;
            if st.search != SearchState::Idle {
                return Err(AppError::Busy);
            }
            st.search = SearchState::Validating;

            let (ids, range) = match validate_search(st.filters.filter()) {
                Ok(valid) => valid,
                Err(e) => {
                    st.search = SearchState::Idle;
                    drop(st);
                    self.inner
                        .alerts
                        .raise(Alert::warning("Incomplete search", e.to_string()));
                    return Err(e.into());
                }
            };

            st.generation += 1;
            st.clear_results();

            let catalog = Arc::new(st.filters.catalog().to_vec());
            let granularity = Granularity::from_daily_flag(st.filters.filter().daily);
            let parameters = st.filters.filter().parameters.clone();
            let requests: Vec<RoutineRequest> = ids
                .iter()
                .map(|id| RoutineRequest {
                    id: *id,
                    label: st.filters.label_of(*id),
                    range,
                    granularity,
                    parameters: parameters.clone(),
                    catalog: Arc::clone(&catalog),
                })
                .collect();

            let single = requests.len() == 1;
            st.search = if single {
                SearchState::SingleFetch
            } else {
                SearchState::MultiFetchSequential
            };
            st.analysis_loading = single;

            info!(
                "Search {} started: {} point(s), {:?}",
                st.generation,
                requests.len(),
                granularity
            );
            self.inner.progress.send_replace(SearchProgress {
                generation: st.generation,
                completed: 0,
                total: requests.len(),
                current: None,
            });

            SearchPlan {
                generation: st.generation,
                requests,
            }
        };

        if plan.requests.len() == 1 {
            self.run_single(plan).await
        } else {
            self.run_sequential(plan).await
        }
    }

    /// Search once, the first time the filter is complete.
    pub async fn auto_apply(&self) -> Result<Option<SearchOutcome>> {
        {
            let mut st = self.inner.state.lock().await;
            if st.auto_applied || validate_search(st.filters.filter()).is_err() {
                return Ok(None);
            }
            st.auto_applied = true;
        }
        self.search().await.map(Some)
    }

    async fn run_single(&self, plan: SearchPlan) -> Result<SearchOutcome> {
        let request = &plan.requests[0];
        self.publish(plan.generation, 0, 1, Some(request.label.clone())).await;

        let outcome = self.inner.routine.run(request).await;

        let mut st = self.inner.state.lock().await;
        if st.generation != plan.generation {
            info!("Discarding stale result for point {}", request.id);
            return Ok(SearchOutcome::Superseded);
        }
        st.finish();
        // settled either way
        self.inner.progress.send_replace(SearchProgress {
            generation: plan.generation,
            completed: 1,
            total: 1,
            current: None,
        });

        match outcome {
            Ok(result) => {
                let empty = result.is_empty();
                st.results.insert(result);
                st.last_search_empty = empty;
                Ok(SearchOutcome::Completed {
                    ready: 1,
                    failed: 0,
                    empty,
                })
            }
            Err(e) => {
                drop(st);
                self.inner.alerts.raise(Alert::error(
                    "Search failed",
                    format!("Could not load data for {}: {}", request.label, e),
                ));
                Err(e)
            }
        }
    }

    /// One point at a time: each routine settles before the next starts.
    async fn run_sequential(&self, plan: SearchPlan) -> Result<SearchOutcome> {
        let total = plan.requests.len();
        let mut failures = Vec::new();

        for (index, request) in plan.requests.iter().enumerate() {
            if !self
                .publish(plan.generation, index, total, Some(request.label.clone()))
                .await
            {
                info!("Search {} superseded after {}/{} points", plan.generation, index, total);
                return Ok(SearchOutcome::Superseded);
            }

            let outcome = self.inner.routine.run(request).await;

            let mut st = self.inner.state.lock().await;
            if st.generation != plan.generation {
                info!("Discarding stale result for point {}", request.id);
                return Ok(SearchOutcome::Superseded);
            }
            match outcome {
                Ok(result) => st.results.insert(result),
                Err(e) => {
                    warn!("Point {} failed: {}", request.id, e);
                    failures.push(EntityFailure {
                        id: request.id,
                        label: request.label.clone(),
                        message: e.to_string(),
                    });
                }
            }
            self.inner.progress.send_replace(SearchProgress {
                generation: plan.generation,
                completed: index + 1,
                total,
                current: None,
            });
            debug!("Search {}: {}/{} points ready", plan.generation, index + 1, total);
        }

        let mut st = self.inner.state.lock().await;
        if st.generation != plan.generation {
            return Ok(SearchOutcome::Superseded);
        }
        st.finish();
        // a failed point is not "no data"
        let empty = failures.is_empty() && st.results.all_empty();
        st.last_search_empty = empty;
        st.failures = failures.clone();
        let ready = st.results.len();
        drop(st);

        if !failures.is_empty() {
            let names: Vec<&str> = failures.iter().map(|f| f.label.as_str()).collect();
            self.inner.alerts.raise(Alert::warning(
                "Some points could not be loaded",
                format!("{} of {} points failed: {}", failures.len(), total, names.join(", ")),
            ));
        }

        info!(
            "Search {} complete: {} ready, {} failed",
            plan.generation,
            ready,
            failures.len()
        );
        Ok(SearchOutcome::Completed {
            ready,
            failed: failures.len(),
            empty,
        })
    }

    /// Publish progress if `generation` is still current.
    async fn publish(
        &self,
        generation: u64,
        completed: usize,
        total: usize,
        current: Option<String>,
    ) -> bool {
        let st = self.inner.state.lock().await;
        if st.generation != generation {
            return false;
        }
        self.inner.progress.send_replace(SearchProgress {
            generation,
            completed,
            total,
            current,
        });
        true
    }

    /// Replace the narrative of one point; nothing else in the cache changes.
    pub async fn update_narrative(&self, id: EntityId, text: Option<String>) -> Result<bool> {
        let mut st = self.inner.state.lock().await;
        if st.search != SearchState::Idle {
            return Err(AppError::Busy);
        }
        Ok(st.results.modify(id, |r| r.narrative.edit(text)))
    }

    /// Restore the generated narrative of one point.
    pub async fn revert_narrative(&self, id: EntityId) -> Result<bool> {
        let mut st = self.inner.state.lock().await;
        if st.search != SearchState::Idle {
            return Err(AppError::Busy);
        }
        Ok(st.results.modify(id, |r| r.narrative.revert()))
    }

    /// Record the user's rating of a point's narrative.
    pub async fn submit_feedback(&self, id: EntityId, rating: u8, comment: &str) -> Result<()> {
        let result = self
            .inner
            .state
            .lock()
            .await
            .results
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::InvalidData(format!("No result for point {}", id)))?;

        let record = feedback_record(&result, rating, comment)?;
        self.inner.api.submit_feedback(&record).await
    }
}
