//! Response and request shapes exchanged with the monitoring API.

use crate::model::{Category, Entity, EntityId, Status};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub type RawRow = Map<String, Value>;

/// One entry of the point catalog endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "cdPiezometro")]
    pub id: EntityId,
    #[serde(rename = "idPiezometro", default, deserialize_with = "deserialize_code")]
    pub code: Option<String>,
    #[serde(rename = "nomePiezometro", default)]
    pub name: Option<String>,
    #[serde(rename = "tipoPiezometro", default)]
    pub category: Option<String>,
    #[serde(rename = "situacao", default)]
    pub status: Option<String>,
}

/// Custom deserializer that accepts the display code as number or string
///
/// Accepts:
/// - `"idPiezometro": 12`
/// - `"idPiezometro": "PZ-12"`
/// - `"idPiezometro": null`
fn deserialize_code<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CodeValue {
        Number(i64),
        String(String),
    }

    Ok(match Option::<CodeValue>::deserialize(deserializer)? {
        Some(CodeValue::Number(n)) => Some(n.to_string()),
        Some(CodeValue::String(s)) => Some(s),
        None => None,
    })
}

impl CatalogEntry {
    pub fn into_entity(self) -> Entity {
        let category = self
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(Category::from_code);
        let code = self.code.unwrap_or_else(|| self.id.to_string());
        let name = self.name.unwrap_or_default();
        let label = format!(
            "{} - {} ({})",
            code,
            name,
            category.as_ref().map(|c| c.code()).unwrap_or("N/A")
        );

        Entity {
            id: self.id,
            label,
            category,
            status: self.status.as_deref().and_then(Status::from_code),
        }
    }
}

/// Time-series payload: primary rows plus the full history used by the
/// narrative service.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesResponse<T> {
    #[serde(rename = "dadosFiltrados", default)]
    pub primary: Option<T>,
    #[serde(rename = "historicoCompleto", default)]
    pub history: Option<Value>,
}

/// A dated value inside a daily per-measurement list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DailyEntry {
    pub data: String,
    #[serde(flatten)]
    pub values: RawRow,
}

/// Daily series keyed by measurement type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DailySeries {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub precipitacao: Vec<DailyEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nivel_estatico: Vec<DailyEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vazao_bombeamento: Vec<DailyEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vazao_calha: Vec<DailyEntry>,
    #[serde(default)]
    pub cota_superficie: Option<f64>,
    #[serde(default)]
    pub cota_base: Option<f64>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<DailyEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<DailyEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

impl DailySeries {
    /// Per-measurement lists paired with their field name.
    pub fn lists(&self) -> [(&'static str, &[DailyEntry]); 4] {
        [
            ("precipitacao", &self.precipitacao),
            ("nivel_estatico", &self.nivel_estatico),
            ("vazao_bombeamento", &self.vazao_bombeamento),
            ("vazao_calha", &self.vazao_calha),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.lists().iter().all(|(_, list)| list.is_empty())
    }
}

/// Primary rows as returned by the endpoint picked for the granularity.
#[derive(Debug, Clone)]
pub enum SeriesRows {
    Monthly(Vec<RawRow>),
    Daily(DailySeries),
}

/// Time-series fetch result handed to the per-entity routine.
#[derive(Debug, Clone)]
pub struct SeriesFetch {
    pub rows: SeriesRows,
    pub history: Value,
}

/// Narrative service request body.
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeRequest {
    #[serde(rename = "dados")]
    pub data: Value,
    #[serde(rename = "idPonto")]
    pub entity_id: EntityId,
    #[serde(rename = "historico")]
    pub history: Value,
    #[serde(rename = "parametros", skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

/// Extract the narrative from a service reply: first element's `output`.
pub fn narrative_output(reply: &Value) -> Option<String> {
    reply
        .as_array()?
        .first()?
        .get("output")?
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Water-quality collection request body.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRequest<'a> {
    #[serde(rename = "mesAnoInicio")]
    pub start: &'a str,
    #[serde(rename = "mesAnoFim")]
    pub end: &'a str,
    #[serde(rename = "itens")]
    pub parameters: &'a [String],
}

/// Narrative quality feedback body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    #[serde(rename = "idZeus")]
    pub entity_id: EntityId,
    #[serde(rename = "editouAnalise")]
    pub edited: bool,
    #[serde(rename = "analiseOriginal")]
    pub original: Option<String>,
    #[serde(rename = "analiseEditada", skip_serializing_if = "Option::is_none")]
    pub edited_text: Option<String>,
    #[serde(rename = "nota")]
    pub rating: u8,
    #[serde(rename = "comentario")]
    pub comment: String,
}
