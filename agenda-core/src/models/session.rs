use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::appointment::Draft;

/// What ASK_DATE expects from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateMode {
    /// A full date and time, validated against every business rule.
    #[default]
    DateTime,
    /// Only the day; the hour is picked afterwards from the opening hours.
    DayOnly,
}

/// Conversation state. Each variant carries exactly the data collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Menu,
    AskService,
    AskColorCurrent {
        service: String,
    },
    AskColorDesired {
        service: String,
        color_current: String,
    },
    AskDate {
        draft: Draft,
        #[serde(default)]
        mode: DateMode,
    },
    AskHour {
        draft: Draft,
        date: NaiveDate,
        available_hours: Vec<String>,
    },
    Confirm {
        draft: Draft,
        date_time: NaiveDateTime,
    },
    /// A persisted state this build does not know about.
    #[serde(other)]
    Unknown,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Menu => "menu",
            SessionState::AskService => "ask_service",
            SessionState::AskColorCurrent { .. } => "ask_color_current",
            SessionState::AskColorDesired { .. } => "ask_color_desired",
            SessionState::AskDate { .. } => "ask_date",
            SessionState::AskHour { .. } => "ask_hour",
            SessionState::Confirm { .. } => "confirm",
            SessionState::Unknown => "unknown",
        }
    }
}

/// One conversation, keyed by the sender's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: String,
    #[serde(flatten)]
    pub state: SessionState,
}

impl Session {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: SessionState::Menu,
        }
    }

    pub fn with_state(identity: impl Into<String>, state: SessionState) -> Self {
        Self {
            identity: identity.into(),
            state,
        }
    }

    /// True for the entry/terminal state, which never carries data.
    pub fn is_initial(&self) -> bool {
        self.state == SessionState::Menu
    }
}
