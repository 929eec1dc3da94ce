pub mod airtable;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod models;
pub mod normalize;
pub mod postgres;
pub mod replies;
pub mod schedule;
pub mod store;

pub use config::{AgendaConfig, Backend};
pub use engine::{step, Effect, Inbound, Rules, Transition};
pub use error::AgendaError;
pub use gateway::{create_gateway, AppointmentGateway, DisabledGateway, GatewayError, MemoryGateway};
pub use models::{AppointmentRecord, Session, SessionState};
pub use store::{write_back, MemorySessionStore, SessionStore, TurnLocks};
