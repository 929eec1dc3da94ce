//! Conversation engine — the booking state machine.
//!
//! [`step`] is a pure, synchronous function of the current session, the
//! inbound message and the current local time. It returns the next session
//! and an [`Effect`]: either a finished reply, or a request the caller must
//! run against the appointment backend before rendering the reply with
//! [`crate::replies`].
//!
//! ```text
//! MENU ──1──▶ ASK_SERVICE ──service──▶ ASK_DATE ──ok──▶ CONFIRM ──sim──▶ MENU (+create)
//!   │              └──colour service──▶ ASK_COLOR_CURRENT ▶ ASK_COLOR_DESIRED ▶ ASK_DATE
//!   ├──4──▶ ASK_DATE (date+time)        or, with dynamic hours, ASK_DATE (day) ▶ ASK_HOUR ▶ CONFIRM
//!   ├──2──▶ MENU (attendant)
//!   └──3──▶ MENU (+list)
//! ```
//!
//! A greeting or reset keyword returns to MENU from any state.

use chrono::NaiveDateTime;
use regex::Regex;

use crate::models::{AppointmentRecord, ColorChange, DateMode, Draft, Session, SessionState};
use crate::normalize::{normalize, GreetingMatcher};
use crate::replies;
use crate::schedule::{self, BusinessRules, HoursPolicy};

/// Service name stored for the dedicated manicure/pedicure menu entry.
pub const MANICURE_SERVICE: &str = "Manicure/Pedicure";

const HOUR_PATTERN: &str = r"^(\d{1,2})\s*(?::\s*00|h\s*(?:00)?|hs|horas?)?$";

/// One inbound message, already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Normalized text used for matching.
    pub text: String,
    /// Trimmed original text, kept verbatim for free-form answers.
    pub raw: String,
}

impl Inbound {
    pub fn new(body: &str) -> Self {
        Self {
            text: normalize(body),
            raw: body.trim().to_string(),
        }
    }
}

/// What the caller must do to finish the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Reply(String),
    CreateAppointment(AppointmentRecord),
    ListAppointments(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    pub effect: Effect,
}

impl Transition {
    fn reply(session: Session, text: String) -> Self {
        Self {
            session,
            effect: Effect::Reply(text),
        }
    }
}

/// A bookable service offered at ASK_SERVICE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOption {
    pub name: String,
    /// Colour services ask for the current and desired colour first.
    pub color_change: bool,
}

impl ServiceOption {
    pub fn new(name: impl Into<String>, color_change: bool) -> Self {
        Self {
            name: name.into(),
            color_change,
        }
    }
}

/// Main-menu choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    Schedule,
    HumanAgent,
    ViewBookings,
    Manicure,
}

impl MenuOption {
    /// Number or keyword match, checked in menu order so that "agendar"
    /// selects scheduling even though it also contains "agenda".
    pub fn parse(text: &str) -> Option<Self> {
        if text == "1" || text.starts_with("agend") {
            Some(MenuOption::Schedule)
        } else if text == "2" || text.contains("atendente") {
            Some(MenuOption::HumanAgent)
        } else if text == "3" || text.contains("agenda") {
            Some(MenuOption::ViewBookings)
        } else if text == "4" || text.contains("manicure") {
            Some(MenuOption::Manicure)
        } else {
            None
        }
    }
}

/// Vocabulary and policies the engine runs with.
#[derive(Debug, Clone)]
pub struct Rules {
    pub studio_name: String,
    pub greetings: GreetingMatcher,
    /// Normalized words that reset the conversation on exact match.
    pub reset_keywords: Vec<String>,
    /// Normalized words accepted as "yes" at CONFIRM.
    pub affirmatives: Vec<String>,
    pub services: Vec<ServiceOption>,
    pub business: BusinessRules,
    pub hours: HoursPolicy,
    /// Manicure/pedicure picks a day first, then an hour from the opening hours.
    pub dynamic_hours: bool,
}

/// Greeting vocabulary matched anywhere in a message.
pub const DEFAULT_GREETINGS: &[&str] = &["oi", "olá", "hello", "bom dia", "boa tarde", "boa noite"];

/// Words that reset the conversation when sent on their own.
pub const DEFAULT_RESET_KEYWORDS: &[&str] = &["menu", "início"];

pub const DEFAULT_AFFIRMATIVES: &[&str] = &["sim", "s", "confirmar"];

/// Service catalogue: name and whether it is a colour change.
pub const DEFAULT_SERVICES: &[(&str, bool)] = &[
    ("Corte", false),
    ("Escova", false),
    ("Coloração", true),
    ("Mechas", false),
    ("Progressiva", false),
    ("Manicure", false),
    ("Pedicure", false),
];

pub const DEFAULT_STUDIO_NAME: &str = "Studio Kelly d’Paula";

impl Default for Rules {
    fn default() -> Self {
        Self {
            studio_name: DEFAULT_STUDIO_NAME.to_string(),
            greetings: GreetingMatcher::new(DEFAULT_GREETINGS, Default::default()),
            reset_keywords: DEFAULT_RESET_KEYWORDS.iter().map(|k| normalize(k)).collect(),
            affirmatives: DEFAULT_AFFIRMATIVES.iter().map(|k| normalize(k)).collect(),
            services: DEFAULT_SERVICES
                .iter()
                .map(|&(name, color_change)| ServiceOption::new(name, color_change))
                .collect(),
            business: BusinessRules::default(),
            hours: HoursPolicy::default(),
            dynamic_hours: false,
        }
    }
}

impl Rules {
    /// Greeting or reset keyword: the conversation starts over.
    pub fn is_reset(&self, text: &str) -> bool {
        self.reset_keywords.iter().any(|k| k == text) || self.greetings.is_greeting(text)
    }

    pub fn is_affirmative(&self, text: &str) -> bool {
        self.affirmatives.iter().any(|k| k == text)
    }

    /// Exact match against the normalized service names.
    pub fn find_service(&self, text: &str) -> Option<&ServiceOption> {
        self.services.iter().find(|s| normalize(&s.name) == text)
    }

    fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|s| s.name.as_str())
    }
}

/// Run one conversation turn.
pub fn step(rules: &Rules, session: Session, inbound: &Inbound, now: NaiveDateTime) -> Transition {
    let identity = session.identity;

    if rules.is_reset(&inbound.text) {
        return Transition::reply(Session::new(identity), replies::menu(&rules.studio_name));
    }

    match session.state {
        SessionState::Menu => on_menu(rules, identity, inbound),
        SessionState::AskService => on_ask_service(rules, identity, inbound),
        SessionState::AskColorCurrent { service } => {
            if inbound.raw.is_empty() {
                let state = SessionState::AskColorCurrent { service };
                return Transition::reply(
                    Session::with_state(identity, state),
                    replies::ask_color_current(),
                );
            }
            let state = SessionState::AskColorDesired {
                service,
                color_current: inbound.raw.clone(),
            };
            Transition::reply(
                Session::with_state(identity, state),
                replies::ask_color_desired(),
            )
        }
        SessionState::AskColorDesired {
            service,
            color_current,
        } => {
            if inbound.raw.is_empty() {
                let state = SessionState::AskColorDesired {
                    service,
                    color_current,
                };
                return Transition::reply(
                    Session::with_state(identity, state),
                    replies::ask_color_desired(),
                );
            }
            let draft = Draft {
                service,
                color: Some(ColorChange {
                    current: color_current,
                    desired: inbound.raw.clone(),
                }),
            };
            let state = SessionState::AskDate {
                draft,
                mode: DateMode::DateTime,
            };
            Transition::reply(
                Session::with_state(identity, state),
                replies::ask_date_time_after_colors(),
            )
        }
        SessionState::AskDate { draft, mode } => match mode {
            DateMode::DateTime => on_ask_date_time(rules, identity, draft, inbound, now),
            DateMode::DayOnly => on_ask_day(rules, identity, draft, inbound, now),
        },
        SessionState::AskHour {
            draft,
            date,
            available_hours,
        } => on_ask_hour(rules, identity, draft, date, available_hours, inbound, now),
        SessionState::Confirm { draft, date_time } => {
            if rules.is_affirmative(&inbound.text) {
                let record = AppointmentRecord::scheduled(&identity, &draft, &date_time);
                Transition {
                    session: Session::new(identity),
                    effect: Effect::CreateAppointment(record),
                }
            } else {
                Transition::reply(Session::new(identity), replies::cancelled())
            }
        }
        SessionState::Unknown => Transition::reply(Session::new(identity), replies::fallback()),
    }
}

fn on_menu(rules: &Rules, identity: String, inbound: &Inbound) -> Transition {
    match MenuOption::parse(&inbound.text) {
        Some(MenuOption::Schedule) => Transition::reply(
            Session::with_state(identity, SessionState::AskService),
            replies::service_menu(rules.service_names()),
        ),
        Some(MenuOption::HumanAgent) => {
            Transition::reply(Session::new(identity), replies::human_agent())
        }
        Some(MenuOption::ViewBookings) => Transition {
            effect: Effect::ListAppointments(identity.clone()),
            session: Session::new(identity),
        },
        Some(MenuOption::Manicure) => {
            let (mode, prompt) = if rules.dynamic_hours {
                (DateMode::DayOnly, replies::manicure_day())
            } else {
                (DateMode::DateTime, replies::manicure_date_time())
            };
            let state = SessionState::AskDate {
                draft: Draft::new(MANICURE_SERVICE),
                mode,
            };
            Transition::reply(Session::with_state(identity, state), prompt)
        }
        None => Transition::reply(Session::new(identity), replies::invalid_option()),
    }
}

fn on_ask_service(rules: &Rules, identity: String, inbound: &Inbound) -> Transition {
    let Some(service) = rules.find_service(&inbound.text) else {
        return Transition::reply(
            Session::with_state(identity, SessionState::AskService),
            replies::unknown_service(rules.service_names()),
        );
    };

    if service.color_change {
        let state = SessionState::AskColorCurrent {
            service: service.name.clone(),
        };
        Transition::reply(
            Session::with_state(identity, state),
            replies::ask_color_current(),
        )
    } else {
        let state = SessionState::AskDate {
            draft: Draft::new(service.name.clone()),
            mode: DateMode::DateTime,
        };
        Transition::reply(Session::with_state(identity, state), replies::ask_date_time())
    }
}

fn on_ask_date_time(
    rules: &Rules,
    identity: String,
    draft: Draft,
    inbound: &Inbound,
    now: NaiveDateTime,
) -> Transition {
    let stay = |identity: String, draft: Draft, text: String| {
        let state = SessionState::AskDate {
            draft,
            mode: DateMode::DateTime,
        };
        Transition::reply(Session::with_state(identity, state), text)
    };

    let Some(date_time) = schedule::parse(&inbound.raw) else {
        return stay(identity, draft, replies::invalid_date_time());
    };
    if let Err(rejection) = rules.business.validate(&date_time, &now) {
        return stay(identity, draft, rejection.to_string());
    }
    to_confirm(identity, draft, date_time)
}

fn on_ask_day(
    rules: &Rules,
    identity: String,
    draft: Draft,
    inbound: &Inbound,
    now: NaiveDateTime,
) -> Transition {
    let stay = |identity: String, draft: Draft, text: String| {
        let state = SessionState::AskDate {
            draft,
            mode: DateMode::DayOnly,
        };
        Transition::reply(Session::with_state(identity, state), text)
    };

    let Some(parsed) = schedule::parse(&inbound.raw) else {
        return stay(identity, draft, replies::invalid_day());
    };
    let date = parsed.date();
    if let Err(rejection) = rules.business.validate_date(date, now.date()) {
        return stay(identity, draft, rejection.to_string());
    }

    let availability = rules.hours.availability(date, rules.business.closed_weekday);
    if availability.is_closed() {
        return stay(identity, draft, availability.prompt);
    }
    let state = SessionState::AskHour {
        draft,
        date,
        available_hours: availability.slots,
    };
    Transition::reply(Session::with_state(identity, state), availability.prompt)
}

fn on_ask_hour(
    rules: &Rules,
    identity: String,
    draft: Draft,
    date: chrono::NaiveDate,
    available_hours: Vec<String>,
    inbound: &Inbound,
    now: NaiveDateTime,
) -> Transition {
    let chosen = parse_hour(&inbound.text)
        .and_then(|h| date.and_hms_opt(h, 0, 0))
        .filter(|dt| {
            schedule::slot_label(dt).is_some_and(|label| available_hours.contains(&label))
        });

    let Some(date_time) = chosen else {
        let reply = replies::invalid_hour(&available_hours);
        let state = SessionState::AskHour {
            draft,
            date,
            available_hours,
        };
        return Transition::reply(Session::with_state(identity, state), reply);
    };

    if let Err(rejection) = rules.business.validate(&date_time, &now) {
        let state = SessionState::AskHour {
            draft,
            date,
            available_hours,
        };
        return Transition::reply(Session::with_state(identity, state), rejection.to_string());
    }
    to_confirm(identity, draft, date_time)
}

fn to_confirm(identity: String, draft: Draft, date_time: NaiveDateTime) -> Transition {
    let summary = replies::confirmation_summary(&identity, &draft, &date_time);
    let state = SessionState::Confirm { draft, date_time };
    Transition::reply(Session::with_state(identity, state), summary)
}

/// Hour from answers like `14`, `14h`, `14:00` or `9 horas`.
pub fn parse_hour(text: &str) -> Option<u32> {
    let re = Regex::new(HOUR_PATTERN).ok()?;
    let caps = re.captures(text.trim())?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    (hour < 24).then_some(hour)
}
