//! Appointment gateway — where confirmed bookings are persisted and listed.
//!
//! Provides an `AppointmentGateway` trait with implementations for:
//! - **Airtable** — the studio's appointments table over the REST API
//! - **Postgres** — an `appointments` table via sqlx
//! - **Memory** — process-local, for development and tests
//! - **Disabled** — every call fails with [`GatewayError::NotConfigured`]
//!
//! The conversation never retries a failed create: the error text is shown to
//! the user and the draft is dropped.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppointmentsConfig, Backend};
use crate::models::AppointmentRecord;

// ============================================================================
// AppointmentGateway trait
// ============================================================================

#[async_trait]
pub trait AppointmentGateway: Send + Sync {
    /// Persist a record, returning the backend's identifier for it.
    async fn create(&self, record: &AppointmentRecord) -> Result<String, GatewayError>;

    /// All records stored for `phone`.
    async fn query(&self, phone: &str) -> Result<Vec<AppointmentRecord>, GatewayError>;

    /// Backend name for logging and health output.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("sistema de agendamentos não configurado.")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{last} (após {attempts} tentativas)")]
    RetryExhausted {
        attempts: usize,
        last: Box<GatewayError>,
    },
}

// ============================================================================
// Factory
// ============================================================================

/// Build the configured backend. Missing credentials degrade to
/// [`DisabledGateway`] instead of failing startup.
pub async fn create_gateway(config: &AppointmentsConfig) -> Box<dyn AppointmentGateway> {
    match config.backend {
        Backend::Airtable => match crate::airtable::AirtableGateway::new(config.airtable.clone()) {
            Ok(g) => Box::new(g),
            Err(e) => {
                tracing::warn!(error = %e, "Airtable backend unavailable — bookings disabled");
                Box::new(DisabledGateway)
            }
        },
        Backend::Postgres => match crate::db::create_pool(&config.postgres).await {
            Ok(pool) => Box::new(crate::postgres::PostgresGateway::new(pool)),
            Err(e) => {
                tracing::warn!(error = %e, "Postgres backend unavailable — bookings disabled");
                Box::new(DisabledGateway)
            }
        },
        Backend::Memory => Box::new(MemoryGateway::new()),
        Backend::None => Box::new(DisabledGateway),
    }
}

// ============================================================================
// MemoryGateway
// ============================================================================

/// Keeps records in a Vec for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    records: Mutex<Vec<(String, AppointmentRecord)>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, AppointmentRecord)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AppointmentGateway for MemoryGateway {
    async fn create(&self, record: &AppointmentRecord) -> Result<String, GatewayError> {
        let id = format!("rec{}", &Uuid::new_v4().simple().to_string()[..14]);
        let mut records = self
            .records
            .lock()
            .map_err(|_| GatewayError::InvalidResponse("record list poisoned".to_string()))?;
        records.push((id.clone(), record.clone()));
        Ok(id)
    }

    async fn query(&self, phone: &str) -> Result<Vec<AppointmentRecord>, GatewayError> {
        let records = self
            .records
            .lock()
            .map_err(|_| GatewayError::InvalidResponse("record list poisoned".to_string()))?;
        Ok(records
            .iter()
            .filter(|(_, r)| r.phone == phone)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// DisabledGateway
// ============================================================================

/// Stand-in when no backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGateway;

#[async_trait]
impl AppointmentGateway for DisabledGateway {
    async fn create(&self, _record: &AppointmentRecord) -> Result<String, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn query(&self, _phone: &str) -> Result<Vec<AppointmentRecord>, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    fn name(&self) -> &str {
        "none"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AirtableConfig;

    fn record(phone: &str, service: &str) -> AppointmentRecord {
        AppointmentRecord {
            phone: phone.to_string(),
            service: service.to_string(),
            date_time: "2025-10-02T14:00:00".to_string(),
            color_current: None,
            color_desired: None,
            status: "Agendado".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_gateway_create_then_query_by_phone() {
        let gateway = MemoryGateway::new();
        let id = gateway.create(&record("+5511", "Corte")).await.unwrap();
        gateway.create(&record("+5522", "Escova")).await.unwrap();

        assert!(id.starts_with("rec"));
        let mine = gateway.query("+5511").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].service, "Corte");
        assert_eq!(gateway.records().len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_gateway_fails_every_call() {
        let gateway = DisabledGateway;
        assert!(matches!(
            gateway.create(&record("+5511", "Corte")).await,
            Err(GatewayError::NotConfigured)
        ));
        assert!(matches!(
            gateway.query("+5511").await,
            Err(GatewayError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_factory_degrades_without_airtable_credentials() {
        let config = AppointmentsConfig {
            backend: Backend::Airtable,
            airtable: AirtableConfig {
                api_key: String::new(),
                ..AirtableConfig::default()
            },
            ..AppointmentsConfig::default()
        };
        let gateway = create_gateway(&config).await;
        assert_eq!(gateway.name(), "none");
    }

    #[tokio::test]
    async fn test_factory_memory_backend() {
        let config = AppointmentsConfig {
            backend: Backend::Memory,
            ..AppointmentsConfig::default()
        };
        assert_eq!(create_gateway(&config).await.name(), "memory");
    }
}
