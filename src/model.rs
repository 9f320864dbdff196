use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type EntityId = i64;

/// Field names used by groundwater readings, as served by the API.
pub mod fields {
    pub const STATIC_LEVEL: &str = "nivel_estatico";
    pub const SURFACE_ELEVATION: &str = "cota_superficie";
    pub const BASE_ELEVATION: &str = "cota_base";
    pub const PRECIPITATION: &str = "precipitacao";
    pub const PUMPED_FLOW: &str = "vazao_bombeamento";
    pub const CHANNEL_FLOW: &str = "vazao_calha";

    /// Every groundwater measurement, in display order.
    pub const GROUNDWATER: [&str; 6] = [
        STATIC_LEVEL,
        SURFACE_ELEVATION,
        BASE_ELEVATION,
        PRECIPITATION,
        PUMPED_FLOW,
        CHANNEL_FLOW,
    ];
}

/// Instrument type of a monitored point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// PP - depth piezometer
    #[serde(rename = "PP")]
    DepthPiezometer,
    /// PR - staff gauge
    #[serde(rename = "PR")]
    StaffGauge,
    /// PV - flow point
    #[serde(rename = "PV")]
    FlowPoint,
    /// PC - flume
    #[serde(rename = "PC")]
    Flume,
    /// PB - basin piezometer
    #[serde(rename = "PB")]
    BasinPiezometer,
    #[serde(untagged)]
    Other(String),
}

impl Category {
    pub fn code(&self) -> &str {
        match self {
            Category::DepthPiezometer => "PP",
            Category::StaffGauge => "PR",
            Category::FlowPoint => "PV",
            Category::Flume => "PC",
            Category::BasinPiezometer => "PB",
            Category::Other(code) => code,
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "PP" => Category::DepthPiezometer,
            "PR" => Category::StaffGauge,
            "PV" => Category::FlowPoint,
            "PC" => Category::Flume,
            "PB" => Category::BasinPiezometer,
            _ => Category::Other(code.trim().to_string()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "I")]
    Inactive,
}

impl Status {
    pub fn code(&self) -> &'static str {
        match self {
            Status::Active => "A",
            Status::Inactive => "I",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "A" => Some(Status::Active),
            "I" => Some(Status::Inactive),
            _ => None,
        }
    }
}

/// A monitored point (piezometer or water-quality collection point).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub label: String,
    pub category: Option<Category>,
    pub status: Option<Status>,
}

/// Which dashboard a search runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Groundwater,
    WaterQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub fn from_daily_flag(daily: bool) -> Self {
        if daily {
            Granularity::Daily
        } else {
            Granularity::Monthly
        }
    }

    /// Date format the API expects for this granularity.
    pub fn date_format(&self) -> &'static str {
        match self {
            Granularity::Daily => "%d/%m/%Y",
            Granularity::Monthly => "%m/%Y",
        }
    }
}

/// Inclusive date range; `start <= end` holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// October 2008 through the month containing `today`.
    pub fn full_history(today: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(2008, 10, 1).unwrap_or(today);
        Self {
            start: start.min(today),
            end: today,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn format(&self, granularity: Granularity) -> (String, String) {
        let fmt = granularity.date_format();
        (
            self.start.format(fmt).to_string(),
            self.end.format(fmt).to_string(),
        )
    }

    /// Day-granular bounds covering whole months, used for photo lookups
    /// when the range was picked by month.
    pub fn month_bounds(&self) -> (NaiveDate, NaiveDate) {
        let first = self.start.with_day(1).unwrap_or(self.start);
        let last = last_day_of_month(self.end);
        (first, last)
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// One normalized row of time-series data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReading {
    /// Zero-padded, lexicographically sortable (`YYYY-MM` or `YYYY-MM-DD`).
    pub period: String,
    pub values: BTreeMap<String, f64>,
}

impl PeriodReading {
    pub fn new(period: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: f64) -> Self {
        self.values.insert(field.to_string(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// Per-field means (one decimal) plus the reading count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub means: BTreeMap<String, f64>,
    pub count: usize,
}

impl SummaryStatistics {
    /// Mean of `field`, or 0 when the field never appeared.
    pub fn mean(&self, field: &str) -> f64 {
        self.means.get(field).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionPhoto {
    #[serde(alias = "caminho", alias = "path")]
    pub path: String,
    #[serde(default, alias = "dataHora", alias = "data")]
    pub taken_at: Option<String>,
    #[serde(default, alias = "cdPiezometro")]
    pub entity_id: Option<EntityId>,
}

/// AI narrative with an immutable-once-set baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Narrative {
    current: Option<String>,
    original: Option<String>,
}

impl Narrative {
    pub fn generated(text: Option<String>) -> Self {
        Self {
            current: text.clone(),
            original: text,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// Replace the visible text. The baseline is only set if none existed.
    pub fn edit(&mut self, text: Option<String>) {
        if self.original.is_none() {
            if let Some(t) = &text {
                self.original = Some(t.clone());
            }
        }
        self.current = text;
    }

    pub fn revert(&mut self) {
        self.current = self.original.clone();
    }

    pub fn is_edited(&self) -> bool {
        self.current != self.original
    }
}

/// Output of one per-entity routine run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityResult {
    pub id: EntityId,
    pub label: String,
    pub category: Option<Category>,
    pub readings: Vec<PeriodReading>,
    pub narrative: Narrative,
    /// `None` for variants without inspection photos.
    pub photos: Option<Vec<InspectionPhoto>>,
    pub summary: SummaryStatistics,
    /// Untouched collection payload for chart and report consumers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl EntityResult {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
