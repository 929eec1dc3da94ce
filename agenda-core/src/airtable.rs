//! Airtable appointment backend.
//!
//! Records live in one table with the columns `Phone`, `Service`, `DateTime`,
//! `ColorCurrent`, `ColorDesired` and `Status`. Listing filters on `Phone`
//! with an Airtable formula and follows `offset` pagination.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::AirtableConfig;
use crate::gateway::{AppointmentGateway, GatewayError};
use crate::models::AppointmentRecord;

// ============================================================================
// Airtable API structs (private)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Default)]
struct AirtableFields {
    #[serde(rename = "Phone", default)]
    phone: String,
    #[serde(rename = "Service", default)]
    service: String,
    #[serde(rename = "DateTime", default)]
    date_time: String,
    #[serde(rename = "ColorCurrent", default, skip_serializing_if = "Option::is_none")]
    color_current: Option<String>,
    #[serde(rename = "ColorDesired", default, skip_serializing_if = "Option::is_none")]
    color_desired: Option<String>,
    #[serde(rename = "Status", default)]
    status: String,
}

impl From<&AppointmentRecord> for AirtableFields {
    fn from(r: &AppointmentRecord) -> Self {
        Self {
            phone: r.phone.clone(),
            service: r.service.clone(),
            date_time: r.date_time.clone(),
            color_current: r.color_current.clone(),
            color_desired: r.color_desired.clone(),
            status: r.status.clone(),
        }
    }
}

impl From<AirtableFields> for AppointmentRecord {
    fn from(f: AirtableFields) -> Self {
        Self {
            phone: f.phone,
            service: f.service,
            date_time: f.date_time,
            color_current: f.color_current,
            color_desired: f.color_desired,
            status: f.status,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateRequest {
    fields: AirtableFields,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: AirtableFields,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

// ============================================================================
// AirtableGateway
// ============================================================================

#[derive(Debug, Clone)]
pub struct AirtableGateway {
    client: Client,
    config: AirtableConfig,
    table_url: Url,
}

impl AirtableGateway {
    pub fn new(config: AirtableConfig) -> Result<Self, GatewayError> {
        if config.api_key.is_empty() || config.base_id.is_empty() {
            return Err(GatewayError::NotConfigured);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let table_url = table_url(&config)?;

        Ok(Self {
            client,
            config,
            table_url,
        })
    }

    async fn query_once(&self, phone: &str) -> Result<Vec<AppointmentRecord>, GatewayError> {
        let formula = format!("{{Phone}} = '{}'", phone.replace('\'', "\\'"));
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut params = vec![("filterByFormula", formula.clone())];
            if let Some(o) = &offset {
                params.push(("offset", o.clone()));
            }

            let response = self
                .client
                .get(self.table_url.clone())
                .bearer_auth(&self.config.api_key)
                .query(&params)
                .send()
                .await?;

            let page: ListResponse = read_json(response).await?;
            records.extend(page.records.into_iter().map(|r| AppointmentRecord::from(r.fields)));

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl AppointmentGateway for AirtableGateway {
    async fn create(&self, record: &AppointmentRecord) -> Result<String, GatewayError> {
        let body = CreateRequest {
            fields: AirtableFields::from(record),
        };

        let response = self
            .client
            .post(self.table_url.clone())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let created: AirtableRecord = read_json(response).await?;
        tracing::info!(id = %created.id, service = %record.service, "Appointment stored in Airtable");
        Ok(created.id)
    }

    async fn query(&self, phone: &str) -> Result<Vec<AppointmentRecord>, GatewayError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || async {
            self.query_once(phone).await.map_err(|e| {
                tracing::warn!(error = %e, "Airtable query failed");
                e
            })
        })
        .await;

        result.map_err(|e| match e {
            GatewayError::Api { .. } | GatewayError::Http(_) => {
                tracing::error!(
                    attempts = self.config.max_retries + 1,
                    error = %e,
                    "All Airtable query attempts failed"
                );
                GatewayError::RetryExhausted {
                    attempts: self.config.max_retries + 1,
                    last: Box::new(e),
                }
            }
            other => other,
        })
    }

    fn name(&self) -> &str {
        "airtable"
    }
}

fn table_url(config: &AirtableConfig) -> Result<Url, GatewayError> {
    let mut url = Url::parse(&config.base_url)
        .map_err(|e| GatewayError::InvalidResponse(format!("bad Airtable base_url: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| GatewayError::InvalidResponse("bad Airtable base_url".to_string()))?
        .pop_if_empty()
        .extend(["v0", config.base_id.as_str(), config.table.as_str()]);
    Ok(url)
}

/// Decode a success body, or turn an error status into [`GatewayError::Api`].
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| match &v["error"] {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(o) => o
                    .get("message")
                    .or_else(|| o.get("type"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string),
                _ => None,
            })
            .unwrap_or(body);

        tracing::error!(code = status.as_u16(), message = %message, "Airtable API error");
        return Err(GatewayError::Api {
            code: status.as_u16(),
            message,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> AirtableConfig {
        AirtableConfig {
            api_key: "test-key".to_string(),
            base_id: "appBASE".to_string(),
            table: "Appointments".to_string(),
            base_url: base_url.to_string(),
            max_retries: 2,
            retry_delay_ms: 10,
        }
    }

    fn record() -> AppointmentRecord {
        AppointmentRecord {
            phone: "+5511999999999".to_string(),
            service: "Corte".to_string(),
            date_time: "2025-10-02T14:00:00".to_string(),
            color_current: None,
            color_desired: None,
            status: "Agendado".to_string(),
        }
    }

    #[test]
    fn test_missing_credentials_is_not_configured() {
        let mut config = test_config("https://api.airtable.com");
        config.api_key.clear();
        assert!(matches!(
            AirtableGateway::new(config),
            Err(GatewayError::NotConfigured)
        ));
    }

    #[test]
    fn test_table_url_encodes_segments() {
        let mut config = test_config("https://api.airtable.com/");
        config.table = "Agenda Studio".to_string();
        let url = table_url(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/appBASE/Agenda%20Studio"
        );
    }

    #[tokio::test]
    async fn test_create_posts_fields_and_returns_id() {
        let mock_server = MockServer::start().await;
        let gateway = AirtableGateway::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(path("/v0/appBASE/Appointments"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_json(serde_json::json!({
                "fields": {
                    "Phone": "+5511999999999",
                    "Service": "Corte",
                    "DateTime": "2025-10-02T14:00:00",
                    "Status": "Agendado"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "recABC123",
                "createdTime": "2025-10-01T10:00:00.000Z",
                "fields": {}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let id = gateway.create(&record()).await.unwrap();
        assert_eq!(id, "recABC123");
    }

    #[tokio::test]
    async fn test_create_surfaces_api_error_without_retry() {
        let mock_server = MockServer::start().await;
        let gateway = AirtableGateway::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "error": { "type": "INVALID_VALUE_FOR_COLUMN", "message": "Field \"Service\" cannot accept the provided value" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        match gateway.create(&record()).await {
            Err(GatewayError::Api { code, message }) => {
                assert_eq!(code, 422);
                assert!(message.contains("cannot accept"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_follows_pagination() {
        let mock_server = MockServer::start().await;
        let gateway = AirtableGateway::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("GET"))
            .and(path("/v0/appBASE/Appointments"))
            .and(query_param("filterByFormula", "{Phone} = '+5511999999999'"))
            .and(query_param_is_missing("offset"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [
                    { "id": "rec1", "fields": { "Phone": "+5511999999999", "Service": "Corte", "DateTime": "2025-10-02T14:00:00", "Status": "Agendado" } }
                ],
                "offset": "itrPAGE2"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v0/appBASE/Appointments"))
            .and(query_param("offset", "itrPAGE2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [
                    { "id": "rec2", "fields": { "Phone": "+5511999999999", "Service": "Escova" } }
                ]
            })))
            .mount(&mock_server)
            .await;

        let records = gateway.query("+5511999999999").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].service, "Corte");
        assert_eq!(records[1].service, "Escova");
        assert_eq!(records[1].date_time, "");
    }

    #[tokio::test]
    async fn test_query_retries_then_succeeds() {
        let mock_server = MockServer::start().await;
        let gateway = AirtableGateway::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "records": [] })),
            )
            .mount(&mock_server)
            .await;

        let records = gateway.query("+5511999999999").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_query_gives_up_after_retries() {
        let mock_server = MockServer::start().await;
        let gateway = AirtableGateway::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": "SERVER_ERROR"
            })))
            .expect(3)
            .mount(&mock_server)
            .await;

        match gateway.query("+5511999999999").await {
            Err(e @ GatewayError::RetryExhausted { .. }) => {
                let text = e.to_string();
                assert!(text.contains("SERVER_ERROR"), "last error kept: {}", text);
                assert!(text.contains("3 tentativas"));
                if let GatewayError::RetryExhausted { attempts, last } = e {
                    assert_eq!(attempts, 3);
                    assert!(matches!(*last, GatewayError::Api { code: 500, .. }));
                }
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }
}
