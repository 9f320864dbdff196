//! Query parameters and the catalog of selectable points.

use crate::api::CatalogQuery;
use crate::model::{Category, Entity, EntityId, Status, Variant};
use chrono::NaiveDate;
use tracing::{debug, info};

/// Current search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    /// Selected points in selection order, without duplicates.
    pub selected: Vec<EntityId>,
    /// Category of the first selected point.
    pub primary_category: Option<Category>,
    pub category: Option<Category>,
    pub status: Option<Status>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub daily: bool,
    /// Water-quality analysis parameters; ignored by groundwater searches.
    pub parameters: Vec<String>,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            selected: Vec::new(),
            primary_category: None,
            category: None,
            status: Some(Status::Active),
            start: None,
            end: None,
            daily: false,
            parameters: Vec::new(),
        }
    }
}

/// Partial update; `None` leaves a field alone, `Some(None)` clears a
/// nullable one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub selected: Option<Vec<EntityId>>,
    pub category: Option<Option<Category>>,
    pub status: Option<Option<Status>>,
    pub start: Option<Option<NaiveDate>>,
    pub end: Option<Option<NaiveDate>>,
    pub daily: Option<bool>,
    pub parameters: Option<Vec<String>>,
}

impl FilterPatch {
    pub fn selection(ids: Option<Vec<EntityId>>) -> Self {
        Self {
            selected: Some(ids.unwrap_or_default()),
            ..Self::default()
        }
    }

    pub fn dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }
}

/// What an update did to the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterChange {
    pub changed: bool,
    pub needs_catalog_refresh: bool,
}

/// Outcome of applying a refreshed catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogRefresh {
    pub entities: usize,
    /// Selected ids that disappeared from the catalog.
    pub dropped: Vec<EntityId>,
}

pub struct FilterState {
    variant: Variant,
    filter: QueryFilter,
    catalog: Vec<Entity>,
}

impl FilterState {
    pub fn new(variant: Variant) -> Self {
        Self::with_filter(variant, QueryFilter::default())
    }

    /// Start from a pre-filled filter (e.g. a point opened from another view).
    pub fn with_filter(variant: Variant, mut filter: QueryFilter) -> Self {
        filter.selected = dedup(std::mem::take(&mut filter.selected));
        let mut state = Self {
            variant,
            filter,
            catalog: Vec::new(),
        };
        state.filter.primary_category = state.category_of_first();
        state
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    pub fn catalog(&self) -> &[Entity] {
        &self.catalog
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.catalog.iter().find(|e| e.id == id)
    }

    /// Display label for a point; falls back to the bare id.
    pub fn label_of(&self, id: EntityId) -> String {
        self.entity(id)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Shallow-merge `patch` into the filter. No validation happens here.
    pub fn update_filter(&mut self, patch: FilterPatch) -> FilterChange {
        let before = self.filter.clone();

        if let Some(ids) = patch.selected {
            self.filter.selected = dedup(ids);
            self.filter.primary_category = self.category_of_first();
        }
        if let Some(category) = patch.category {
            self.filter.category = category;
        }
        if let Some(status) = patch.status {
            self.filter.status = status;
        }
        if let Some(start) = patch.start {
            self.filter.start = start;
        }
        if let Some(end) = patch.end {
            self.filter.end = end;
        }
        if let Some(daily) = patch.daily {
            self.filter.daily = daily;
        }
        if let Some(parameters) = patch.parameters {
            self.filter.parameters = parameters;
        }

        let change = FilterChange {
            changed: self.filter != before,
            needs_catalog_refresh: self.filter.category != before.category
                || self.filter.status != before.status,
        };
        debug!("Filter updated: {:?}", change);
        change
    }

    /// Replace the selection (`None` clears it).
    pub fn select_entities(&mut self, ids: Option<Vec<EntityId>>) -> FilterChange {
        self.update_filter(FilterPatch::selection(ids))
    }

    /// Query matching the current category and status filters.
    pub fn catalog_query(&self) -> CatalogQuery {
        CatalogQuery {
            variant: self.variant,
            category: self.filter.category.clone(),
            status: self.filter.status,
        }
    }

    /// Install a freshly fetched catalog, dropping selected ids it no longer
    /// contains.
    pub fn apply_catalog(&mut self, entities: Vec<Entity>) -> CatalogRefresh {
        self.catalog = entities;

        let (kept, dropped): (Vec<EntityId>, Vec<EntityId>) = self
            .filter
            .selected
            .iter()
            .copied()
            .partition(|id| self.catalog.iter().any(|e| e.id == *id));

        if !dropped.is_empty() {
            info!("Dropping {} selected points missing from catalog: {:?}", dropped.len(), dropped);
            self.filter.selected = kept;
        }
        // a selection made before the catalog arrived gets its category now
        self.filter.primary_category = self.category_of_first();

        CatalogRefresh {
            entities: self.catalog.len(),
            dropped,
        }
    }

    fn category_of_first(&self) -> Option<Category> {
        let first = self.filter.selected.first()?;
        self.entity(*first).and_then(|e| e.category.clone())
    }
}

fn dedup(ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}
