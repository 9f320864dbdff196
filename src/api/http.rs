use super::wire::{
    narrative_output, CatalogEntry, CollectionRequest, DailySeries, FeedbackRecord,
    NarrativeRequest, RawRow, SeriesFetch, SeriesResponse, SeriesRows,
};
use super::{CatalogQuery, MonitoringApi, NarrativeService};
use crate::config::{ApiConfig, Endpoints, NarrativeConfig};
use crate::error::{AppError, Result};
use crate::model::{Entity, EntityId, InspectionPhoto, Variant};
use crate::session::SessionContext;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "piezo-monitor/0.1.0";

fn build_client(timeout: Duration, session: Option<&SessionContext>) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(session) = session {
        let user = HeaderValue::from_str(session.user_id())
            .map_err(|e| AppError::InvalidData(format!("Invalid user id header: {}", e)))?;
        let sess = HeaderValue::from_str(session.session_id())
            .map_err(|e| AppError::InvalidData(format!("Invalid session id header: {}", e)))?;
        headers.insert("X-User-Id", user);
        headers.insert("X-Session-Id", sess);
    }

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .default_headers(headers)
        .build()?;
    Ok(client)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Api {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}

/// HTTP implementation of [`MonitoringApi`].
pub struct HttpApi {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
    max_retries: u32,
    backoff_base: Duration,
}

impl HttpApi {
    pub fn new(config: &ApiConfig, session: Option<&SessionContext>) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_seconds), session)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Shorten the wait between retries.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn url(&self, template: &str, id: Option<EntityId>) -> String {
        let path = match id {
            Some(id) => template.replace("{id}", &id.to_string()),
            None => template.to_string(),
        };
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_json<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let build = &build;
        retry_with_backoff(self.max_retries, self.backoff_base, || async move {
            let response = check_status(build().send().await?).await?;
            let body = response.json::<T>().await?;
            Ok(body)
        })
        .await
    }
}

#[async_trait]
impl MonitoringApi for HttpApi {
    async fn list_entities(&self, query: &CatalogQuery) -> Result<Vec<Entity>> {
        let template = match query.variant {
            Variant::Groundwater => &self.endpoints.groundwater_catalog,
            Variant::WaterQuality => &self.endpoints.water_quality_catalog,
        };
        let url = self.url(template, None);

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(status) = query.status {
            params.push(("situacao", status.code().to_string()));
        }
        if let Some(category) = &query.category {
            params.push(("tipos", category.code().to_string()));
        }

        debug!("Fetching catalog from {} ({:?})", url, params);
        let entries: Option<Vec<CatalogEntry>> = self
            .send_json(|| self.client.get(&url).query(&params))
            .await?;

        let entities: Vec<Entity> = entries
            .unwrap_or_default()
            .into_iter()
            .map(CatalogEntry::into_entity)
            .collect();
        info!("Catalog returned {} points", entities.len());
        Ok(entities)
    }

    async fn monthly_series(&self, id: EntityId, start: &str, end: &str) -> Result<SeriesFetch> {
        let url = self.url(&self.endpoints.monthly_series, Some(id));
        debug!("Fetching monthly series for {} ({} - {})", id, start, end);

        let response: SeriesResponse<Vec<RawRow>> = self
            .send_json(|| {
                self.client
                    .get(&url)
                    .query(&[("mesAnoInicio", start), ("mesAnoFim", end)])
            })
            .await?;

        Ok(SeriesFetch {
            rows: SeriesRows::Monthly(response.primary.unwrap_or_default()),
            history: response.history.unwrap_or(Value::Array(Vec::new())),
        })
    }

    async fn daily_series(&self, id: EntityId, start: &str, end: &str) -> Result<SeriesFetch> {
        let url = self.url(&self.endpoints.daily_series, Some(id));
        debug!("Fetching daily series for {} ({} - {})", id, start, end);

        let response: SeriesResponse<DailySeries> = self
            .send_json(|| {
                self.client
                    .get(&url)
                    .query(&[("dataInicio", start), ("dataFim", end)])
            })
            .await?;

        Ok(SeriesFetch {
            rows: SeriesRows::Daily(response.primary.unwrap_or_default()),
            history: response.history.unwrap_or(Value::Array(Vec::new())),
        })
    }

    async fn inspection_photos(
        &self,
        id: EntityId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<InspectionPhoto>> {
        let url = self.url(&self.endpoints.inspection_photos, Some(id));
        let start = start.format("%d/%m/%Y").to_string();
        let end = end.format("%d/%m/%Y").to_string();

        let photos: Option<Vec<InspectionPhoto>> = self
            .send_json(|| {
                self.client
                    .get(&url)
                    .query(&[("dataInicio", &start), ("dataFim", &end)])
            })
            .await?;
        Ok(photos.unwrap_or_default())
    }

    async fn water_quality_collection(
        &self,
        id: EntityId,
        start: &str,
        end: &str,
        parameters: &[String],
    ) -> Result<Value> {
        let url = self.url(&self.endpoints.water_quality_collection, Some(id));
        let body = CollectionRequest {
            start,
            end,
            parameters,
        };
        debug!("Fetching water quality collection for {} ({} - {})", id, start, end);

        self.send_json(|| self.client.post(&url).json(&body)).await
    }

    async fn water_quality_history(&self, id: EntityId) -> Result<Value> {
        let url = self.url(&self.endpoints.water_quality_history, Some(id));
        self.send_json(|| self.client.get(&url)).await
    }

    async fn submit_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        let url = self.url(&self.endpoints.narrative_feedback, None);
        let response = self.client.post(&url).json(record).send().await?;
        check_status(response).await?;
        info!("Narrative feedback stored for point {}", record.entity_id);
        Ok(())
    }
}

/// Webhook-backed [`NarrativeService`]. Calls are never retried: each one is
/// a paid model invocation.
pub struct HttpNarrative {
    client: Client,
    groundwater_url: String,
    water_quality_url: String,
}

impl HttpNarrative {
    pub fn new(config: &NarrativeConfig, session: Option<&SessionContext>) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.timeout_seconds), session)?,
            groundwater_url: config.groundwater_url.clone(),
            water_quality_url: config.water_quality_url.clone(),
        })
    }
}

#[async_trait]
impl NarrativeService for HttpNarrative {
    async fn analyze(&self, variant: Variant, request: &NarrativeRequest) -> Result<Option<String>> {
        let url = match variant {
            Variant::Groundwater => &self.groundwater_url,
            Variant::WaterQuality => &self.water_quality_url,
        };
        debug!("Requesting narrative for point {}", request.entity_id);

        let response = check_status(self.client.post(url).json(request).send().await?).await?;
        let reply: Value = response.json().await?;

        let narrative = narrative_output(&reply);
        if narrative.is_none() {
            warn!(
                "Narrative service reply for point {} had no usable output",
                request.entity_id
            );
        }
        Ok(narrative)
    }
}

/// Retry a future with exponential backoff
async fn retry_with_backoff<F, Fut, T>(max_retries: u32, base: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                retries += 1;

                if retries > max_retries || !e.is_transient() {
                    return Err(e);
                }

                let delay = base * 2u32.pow(retries.saturating_sub(1));
                warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    retries, max_retries, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
