//! Per-turn orchestration: identity → lock → load session → engine step →
//! backend effect → write-back → reply text.

use std::sync::Arc;

use agenda_core::config::StudioConfig;
use agenda_core::engine::{self, Effect, Inbound, Rules, Transition};
use agenda_core::normalize::normalize_identity;
use agenda_core::replies;
use agenda_core::store::{write_back, SessionStore, TurnLocks};
use agenda_core::AppointmentGateway;
use chrono::NaiveDateTime;

/// Source of the studio's local "now".
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct Assistant {
    rules: Rules,
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn AppointmentGateway>,
    locks: TurnLocks,
    clock: Clock,
}

impl Assistant {
    pub fn new(
        rules: Rules,
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn AppointmentGateway>,
        studio: &StudioConfig,
    ) -> Self {
        let studio = studio.clone();
        Self {
            rules,
            store,
            gateway,
            locks: TurnLocks::new(),
            clock: Arc::new(move || studio.now()),
        }
    }

    /// Replace the wall clock, e.g. to pin "now" in tests.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn gateway(&self) -> &dyn AppointmentGateway {
        self.gateway.as_ref()
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    /// Run one turn for the raw sender address `from` and return the reply text.
    pub async fn handle_message(&self, from: &str, body: &str) -> String {
        let identity = normalize_identity(from);
        let inbound = Inbound::new(body);
        tracing::debug!(identity = %identity, body = %inbound.raw, "Inbound message");

        let _turn = self.locks.acquire(&identity).await;

        let session = self.store.get(&identity).await;
        let previous = session.state.name();
        let Transition { session, effect } =
            engine::step(&self.rules, session, &inbound, (self.clock)());

        tracing::info!(
            identity = %identity,
            from = previous,
            to = session.state.name(),
            effect = effect_kind(&effect),
            "Turn handled"
        );

        let reply = self.run_effect(effect).await;
        write_back(self.store.as_ref(), session).await;
        reply
    }

    async fn run_effect(&self, effect: Effect) -> String {
        match effect {
            Effect::Reply(text) => text,
            Effect::CreateAppointment(record) => match self.gateway.create(&record).await {
                Ok(id) => {
                    tracing::info!(
                        id = %id,
                        backend = self.gateway.name(),
                        service = %record.service,
                        date_time = %record.date_time,
                        "Appointment created"
                    );
                    replies::booking_confirmed(&id)
                }
                Err(e) => {
                    tracing::error!(backend = self.gateway.name(), error = %e, "Appointment create failed");
                    replies::booking_failed(&e)
                }
            },
            Effect::ListAppointments(identity) => match self.gateway.query(&identity).await {
                Ok(records) => {
                    tracing::info!(count = records.len(), "Appointments listed");
                    replies::bookings(&records)
                }
                Err(e) => {
                    tracing::warn!(backend = self.gateway.name(), error = %e, "Appointment query failed");
                    replies::bookings_failed(&e)
                }
            },
        }
    }
}

fn effect_kind(effect: &Effect) -> &'static str {
    match effect {
        Effect::Reply(_) => "reply",
        Effect::CreateAppointment(_) => "create",
        Effect::ListAppointments(_) => "list",
    }
}
