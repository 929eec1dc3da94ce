use chrono::{FixedOffset, NaiveDateTime, NaiveTime, Utc, Weekday};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::engine::{
    Rules, ServiceOption, DEFAULT_AFFIRMATIVES, DEFAULT_GREETINGS, DEFAULT_RESET_KEYWORDS,
    DEFAULT_SERVICES, DEFAULT_STUDIO_NAME,
};
use crate::error::AgendaError;
use crate::normalize::{normalize, GreetingMatch, GreetingMatcher};
use crate::schedule::{BusinessRules, HoursPolicy, LunchBreak, SeasonalHours};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AgendaConfig {
    #[serde(default)]
    pub studio: StudioConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub appointments: AppointmentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StudioConfig {
    pub name: String,
    /// Offset of the studio's local time from UTC, in minutes.
    pub utc_offset_minutes: i32,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_STUDIO_NAME.to_string(),
            utc_offset_minutes: -180,
        }
    }
}

impl StudioConfig {
    /// Current wall-clock time at the studio.
    pub fn now(&self) -> NaiveDateTime {
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
            None => Utc::now().naive_utc(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub webhook_path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            webhook_path: "/whatsapp".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default)]
    pub color_change: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConversationConfig {
    pub greeting_match: GreetingMatch,
    pub greetings: Vec<String>,
    pub reset_keywords: Vec<String>,
    pub affirmatives: Vec<String>,
    pub services: Vec<ServiceConfig>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting_match: GreetingMatch::default(),
            greetings: owned(DEFAULT_GREETINGS),
            reset_keywords: owned(DEFAULT_RESET_KEYWORDS),
            affirmatives: owned(DEFAULT_AFFIRMATIVES),
            services: DEFAULT_SERVICES
                .iter()
                .map(|&(name, color_change)| ServiceConfig {
                    name: name.to_string(),
                    color_change,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LunchBreakConfig {
    pub enabled: bool,
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`, exclusive
    pub end: String,
}

impl Default for LunchBreakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start: "12:00".to_string(),
            end: "13:30".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    pub closed_weekday: Weekday,
    pub lunch_break: LunchBreakConfig,
    pub dynamic_hours: bool,
    pub hours: Vec<SeasonalHours>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            closed_weekday: Weekday::Sun,
            lunch_break: LunchBreakConfig::default(),
            dynamic_hours: false,
            hours: HoursPolicy::default().seasons,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Airtable,
    Postgres,
    Memory,
    None,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AirtableConfig {
    pub api_key: String,
    pub base_id: String,
    pub table: String,
    pub base_url: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_id: String::new(),
            table: "Appointments".to_string(),
            base_url: "https://api.airtable.com".to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppointmentsConfig {
    pub backend: Backend,
    pub airtable: AirtableConfig,
    pub postgres: PostgresConfig,
}

impl AgendaConfig {
    /// Load `path` (TOML, optional), overlay `AGENDA__SECTION__KEY` variables,
    /// then fill secrets from their conventional variables. A bare `PORT`
    /// replaces the built-in port default only.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        let bare_port = std::env::var("PORT").ok().and_then(|p| p.trim().parse::<u16>().ok());
        if let Some(port) = bare_port {
            builder = builder.set_default("http.port", i64::from(port))?;
        }

        let s = builder
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("AGENDA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let mut config: Self = s.try_deserialize()?;
        config.apply_env_secrets();
        Ok(config)
    }

    fn apply_env_secrets(&mut self) {
        let airtable = &mut self.appointments.airtable;
        fill_from_env(&mut airtable.api_key, "AIRTABLE_API_KEY");
        fill_from_env(&mut airtable.base_id, "AIRTABLE_BASE_ID");
        if let Ok(table) = std::env::var("AIRTABLE_TABLE_NAME") {
            airtable.table = table;
        }
        fill_from_env(&mut self.appointments.postgres.url, "DATABASE_URL");
    }

    /// Engine rules assembled from the conversation and schedule sections.
    pub fn rules(&self) -> Result<Rules, AgendaError> {
        let conversation = &self.conversation;
        let lunch_break = if self.schedule.lunch_break.enabled {
            Some(parse_lunch_break(&self.schedule.lunch_break)?)
        } else {
            None
        };

        Ok(Rules {
            studio_name: self.studio.name.clone(),
            greetings: GreetingMatcher::new(&conversation.greetings, conversation.greeting_match),
            reset_keywords: conversation.reset_keywords.iter().map(|k| normalize(k)).collect(),
            affirmatives: conversation.affirmatives.iter().map(|k| normalize(k)).collect(),
            services: conversation
                .services
                .iter()
                .map(|s| ServiceOption::new(s.name.clone(), s.color_change))
                .collect(),
            business: BusinessRules {
                closed_weekday: self.schedule.closed_weekday,
                lunch_break,
            },
            hours: HoursPolicy {
                seasons: self.schedule.hours.clone(),
            },
            dynamic_hours: self.schedule.dynamic_hours,
        })
    }
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn fill_from_env(value: &mut String, var: &str) {
    if value.is_empty() {
        if let Ok(v) = std::env::var(var) {
            *value = v;
        }
    }
}

fn parse_lunch_break(cfg: &LunchBreakConfig) -> Result<LunchBreak, ConfigError> {
    let parse = |s: &str| {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|e| ConfigError::Message(format!("invalid lunch_break time {:?}: {}", s, e)))
    };
    let start = parse(&cfg.start)?;
    let end = parse(&cfg.end)?;
    if start >= end {
        return Err(ConfigError::Message(format!(
            "lunch_break start {} must be before end {}",
            cfg.start, cfg.end
        )));
    }
    Ok(LunchBreak { start, end })
}
