//! Date/time parsing and the studio's scheduling rules.
//!
//! Users type dates the Brazilian way (`dd/mm/aa hh:mm`). Parsing is strict:
//! the whole trimmed string must match one of [`LAYOUTS`], tried in order.
//! A two-digit year follows chrono's `%y` pivot: `00`–`69` → 2000–2069,
//! `70`–`99` → 1970–1999.
//!
//! Business rules are evaluated in a fixed precedence (closed weekday, lunch
//! break, past date) so that a user always sees the most fundamental reason
//! first.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::Deserialize;
use thiserror::Error;

/// Accepted textual layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    ShortYearWithTime,
    LongYearWithTime,
    ShortYear,
    LongYear,
}

/// Layouts in the order they are attempted.
pub const LAYOUTS: [Layout; 4] = [
    Layout::ShortYearWithTime,
    Layout::LongYearWithTime,
    Layout::ShortYear,
    Layout::LongYear,
];

impl Layout {
    pub fn pattern(self) -> &'static str {
        match self {
            Layout::ShortYearWithTime => "%d/%m/%y %H:%M",
            Layout::LongYearWithTime => "%d/%m/%Y %H:%M",
            Layout::ShortYear => "%d/%m/%y",
            Layout::LongYear => "%d/%m/%Y",
        }
    }

    pub fn has_time(self) -> bool {
        matches!(self, Layout::ShortYearWithTime | Layout::LongYearWithTime)
    }

    pub fn format(self, dt: &NaiveDateTime) -> String {
        dt.format(self.pattern()).to_string()
    }
}

/// Parse user text, reporting which layout matched. Date-only layouts default
/// to midnight.
pub fn parse_with_layout(text: &str) -> Option<(NaiveDateTime, Layout)> {
    let text = text.trim();
    LAYOUTS.iter().find_map(|&layout| {
        let parsed = if layout.has_time() {
            NaiveDateTime::parse_from_str(text, layout.pattern()).ok()
        } else {
            NaiveDate::parse_from_str(text, layout.pattern())
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        };
        parsed.map(|dt| (dt, layout))
    })
}

pub fn parse(text: &str) -> Option<NaiveDateTime> {
    parse_with_layout(text).map(|(dt, _)| dt)
}

/// Display format used in confirmation summaries.
pub fn display(dt: &NaiveDateTime) -> String {
    dt.format("%d/%m/%Y %H:%M").to_string()
}

// ============================================================================
// Business rules
// ============================================================================

/// Half-open `[start, end)` interval during which nobody is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LunchBreak {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl LunchBreak {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t < self.end
    }
}

impl Default for LunchBreak {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(13, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusinessRules {
    pub closed_weekday: Weekday,
    /// `None` disables the lunch rule.
    pub lunch_break: Option<LunchBreak>,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            closed_weekday: Weekday::Sun,
            lunch_break: Some(LunchBreak::default()),
        }
    }
}

/// Why an otherwise well-formed date/time cannot be booked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Desculpe, não atendemos {}. Escolha outra data, por favor.", weekday_plural(.0))]
    ClosedDay(Weekday),

    #[error(
        "O horário de almoço ({} - {}) não está disponível. Escolha outro horário, por favor.",
        .0.start.format("%H:%M"),
        .0.end.format("%H:%M")
    )]
    LunchBreak(LunchBreak),

    #[error("Essa data/hora já passou. Escolha uma data futura, por favor.")]
    Past,
}

impl BusinessRules {
    /// Check a full date-time against the rules, first failure wins.
    pub fn validate(&self, dt: &NaiveDateTime, now: &NaiveDateTime) -> Result<(), Rejection> {
        if dt.weekday() == self.closed_weekday {
            return Err(Rejection::ClosedDay(self.closed_weekday));
        }
        if let Some(lunch) = self.lunch_break {
            if lunch.contains(dt.time()) {
                return Err(Rejection::LunchBreak(lunch));
            }
        }
        if dt < now {
            return Err(Rejection::Past);
        }
        Ok(())
    }

    /// Day-level check used before offering hour slots: only the closed
    /// weekday and days before today are rejected.
    pub fn validate_date(&self, date: NaiveDate, today: NaiveDate) -> Result<(), Rejection> {
        if date.weekday() == self.closed_weekday {
            return Err(Rejection::ClosedDay(self.closed_weekday));
        }
        if date < today {
            return Err(Rejection::Past);
        }
        Ok(())
    }
}

fn weekday_plural(day: &Weekday) -> &'static str {
    match day {
        Weekday::Mon => "às segundas-feiras",
        Weekday::Tue => "às terças-feiras",
        Weekday::Wed => "às quartas-feiras",
        Weekday::Thu => "às quintas-feiras",
        Weekday::Fri => "às sextas-feiras",
        Weekday::Sat => "aos sábados",
        Weekday::Sun => "aos domingos",
    }
}

// ============================================================================
// Opening hours (dynamic availability)
// ============================================================================

/// Whole-hour opening range; `close` is the last bookable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HourRange {
    pub open: u32,
    pub close: u32,
}

impl HourRange {
    pub const fn new(open: u32, close: u32) -> Self {
        Self { open, close }
    }
}

/// Opening hours in effect from `from_month` until the next season starts.
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonalHours {
    pub from_month: u32,
    pub default: HourRange,
    pub saturday: HourRange,
    pub short_day: Weekday,
    pub short_day_hours: HourRange,
}

#[derive(Debug, Clone)]
pub struct HoursPolicy {
    pub seasons: Vec<SeasonalHours>,
}

impl Default for HoursPolicy {
    fn default() -> Self {
        Self {
            seasons: vec![
                SeasonalHours {
                    from_month: 1,
                    default: HourRange::new(9, 18),
                    saturday: HourRange::new(8, 14),
                    short_day: Weekday::Wed,
                    short_day_hours: HourRange::new(9, 13),
                },
                SeasonalHours {
                    from_month: 12,
                    default: HourRange::new(8, 20),
                    saturday: HourRange::new(8, 18),
                    short_day: Weekday::Wed,
                    short_day_hours: HourRange::new(9, 18),
                },
            ],
        }
    }
}

/// Bookable hours for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub slots: Vec<String>,
    pub prompt: String,
}

impl Availability {
    pub fn is_closed(&self) -> bool {
        self.slots.is_empty()
    }
}

impl HoursPolicy {
    fn season_for(&self, month: u32) -> Option<&SeasonalHours> {
        self.seasons
            .iter()
            .filter(|s| s.from_month <= month)
            .max_by_key(|s| s.from_month)
            .or_else(|| self.seasons.iter().max_by_key(|s| s.from_month))
    }

    /// Opening range for `date`, `None` when the studio does not open.
    pub fn range_for(&self, date: NaiveDate, closed_weekday: Weekday) -> Option<HourRange> {
        let weekday = date.weekday();
        if weekday == closed_weekday {
            return None;
        }
        let season = self.season_for(date.month())?;
        let range = if weekday == Weekday::Sat {
            season.saturday
        } else if weekday == season.short_day {
            season.short_day_hours
        } else {
            season.default
        };
        (range.open <= range.close && range.close < 24).then_some(range)
    }

    /// On-the-hour slots between opening and closing (inclusive) and the prompt
    /// that lists them.
    pub fn availability(&self, date: NaiveDate, closed_weekday: Weekday) -> Availability {
        let Some(range) = self.range_for(date, closed_weekday) else {
            let prompt = if date.weekday() == closed_weekday {
                Rejection::ClosedDay(closed_weekday).to_string()
            } else {
                "Não há horários disponíveis nessa data. Escolha outra data, por favor.".to_string()
            };
            return Availability {
                slots: Vec::new(),
                prompt,
            };
        };

        let slots: Vec<String> = (range.open..=range.close)
            .map(|h| format!("{:02}:00", h))
            .collect();
        let prompt = format!(
            "Horários disponíveis em {}:\n{}\n\nResponda com o horário desejado (ex: {}). \
             Horários após as {:02}:00 precisam ser confirmados com uma atendente.",
            date.format("%d/%m/%Y"),
            slots.join(", "),
            slots[0],
            range.close
        );
        Availability { slots, prompt }
    }
}

/// Slot label (`"HH:00"`) for a date-time that falls exactly on the hour.
pub fn slot_label(dt: &NaiveDateTime) -> Option<String> {
    (dt.minute() == 0).then(|| format!("{:02}:00", dt.hour()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_short_year_with_time() {
        assert_eq!(parse("02/10/25 14:00"), Some(dt(2025, 10, 2, 14, 0)));
    }

    #[test]
    fn test_parse_long_year_and_date_only_layouts() {
        assert_eq!(parse("02/10/2025 09:30"), Some(dt(2025, 10, 2, 9, 30)));
        assert_eq!(parse("02/10/25"), Some(dt(2025, 10, 2, 0, 0)));
        assert_eq!(parse("  02/10/2025  "), Some(dt(2025, 10, 2, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_partial_and_garbage() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("amanhã às 14h"), None);
        assert_eq!(parse("02/10/25 14:00 por favor"), None);
        assert_eq!(parse("31/02/25"), None);
        assert_eq!(parse("2025-10-02 14:00"), None);
    }

    #[test]
    fn test_parse_round_trips_through_matching_layout() {
        let cases = [
            ("05/10/25 14:00", Layout::ShortYearWithTime),
            ("05/10/2025 14:00", Layout::LongYearWithTime),
            ("05/10/25", Layout::ShortYear),
            ("05/10/2025", Layout::LongYear),
        ];
        for (text, expected_layout) in cases {
            let (parsed, layout) = parse_with_layout(text).unwrap();
            assert_eq!(layout, expected_layout, "layout for {}", text);
            assert_eq!(layout.format(&parsed), text);
        }
    }

    #[test]
    fn test_two_digit_year_pivot() {
        assert_eq!(parse("01/01/69").unwrap().year(), 2069);
        assert_eq!(parse("01/01/70").unwrap().year(), 1970);
    }

    #[test]
    fn test_validate_sunday_takes_precedence() {
        let rules = BusinessRules::default();
        let now = dt(2026, 1, 1, 0, 0);
        // 2025-10-05 is a Sunday, inside lunch and in the past.
        let result = rules.validate(&dt(2025, 10, 5, 12, 30), &now);
        assert_eq!(result, Err(Rejection::ClosedDay(Weekday::Sun)));
        assert!(result.unwrap_err().to_string().contains("domingos"));
    }

    #[test]
    fn test_validate_lunch_before_past() {
        let rules = BusinessRules::default();
        let now = dt(2026, 1, 1, 0, 0);
        let result = rules.validate(&dt(2025, 10, 6, 12, 30), &now);
        assert!(matches!(result, Err(Rejection::LunchBreak(_))));
        assert!(result.unwrap_err().to_string().contains("12:00 - 13:30"));
    }

    #[test]
    fn test_validate_lunch_window_is_half_open() {
        let rules = BusinessRules::default();
        let now = dt(2025, 1, 1, 0, 0);
        assert!(rules.validate(&dt(2025, 10, 6, 11, 59), &now).is_ok());
        assert!(rules.validate(&dt(2025, 10, 6, 12, 0), &now).is_err());
        assert!(rules.validate(&dt(2025, 10, 6, 13, 29), &now).is_err());
        assert!(rules.validate(&dt(2025, 10, 6, 13, 30), &now).is_ok());
    }

    #[test]
    fn test_validate_past_and_future() {
        let rules = BusinessRules::default();
        let now = dt(2025, 10, 1, 10, 0);
        assert_eq!(rules.validate(&dt(2025, 9, 30, 14, 0), &now), Err(Rejection::Past));
        assert!(rules.validate(&dt(2025, 10, 2, 14, 0), &now).is_ok());
    }

    #[test]
    fn test_validate_without_lunch_rule() {
        let rules = BusinessRules {
            lunch_break: None,
            ..BusinessRules::default()
        };
        let now = dt(2025, 1, 1, 0, 0);
        assert!(rules.validate(&dt(2025, 10, 6, 12, 30), &now).is_ok());
    }

    #[test]
    fn test_validate_date_ignores_time_rules() {
        let rules = BusinessRules::default();
        let today = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();
        assert!(rules.validate_date(today, today).is_ok());
        assert_eq!(
            rules.validate_date(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(), today),
            Err(Rejection::Past)
        );
        assert!(rules
            .validate_date(NaiveDate::from_ymd_opt(2025, 10, 5).unwrap(), today)
            .is_err());
    }

    #[test]
    fn test_hours_policy_by_weekday() {
        let policy = HoursPolicy::default();
        let sun = Weekday::Sun;
        // October 2025: Mon 6, Wed 8, Sat 11, Sun 12.
        let day = |d| NaiveDate::from_ymd_opt(2025, 10, d).unwrap();
        assert_eq!(policy.range_for(day(6), sun), Some(HourRange::new(9, 18)));
        assert_eq!(policy.range_for(day(8), sun), Some(HourRange::new(9, 13)));
        assert_eq!(policy.range_for(day(11), sun), Some(HourRange::new(8, 14)));
        assert_eq!(policy.range_for(day(12), sun), None);
    }

    #[test]
    fn test_hours_policy_month_cutover() {
        let policy = HoursPolicy::default();
        // 2025-12-06 is a Saturday, 2025-12-08 a Monday.
        let sat = NaiveDate::from_ymd_opt(2025, 12, 6).unwrap();
        let mon = NaiveDate::from_ymd_opt(2025, 12, 8).unwrap();
        assert_eq!(policy.range_for(sat, Weekday::Sun), Some(HourRange::new(8, 18)));
        assert_eq!(policy.range_for(mon, Weekday::Sun), Some(HourRange::new(8, 20)));
    }

    #[test]
    fn test_season_wraps_to_latest_rule() {
        let policy = HoursPolicy {
            seasons: vec![SeasonalHours {
                from_month: 3,
                default: HourRange::new(10, 16),
                saturday: HourRange::new(10, 12),
                short_day: Weekday::Thu,
                short_day_hours: HourRange::new(10, 11),
            }],
        };
        let jan_monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(
            policy.range_for(jan_monday, Weekday::Sun),
            Some(HourRange::new(10, 16))
        );
    }

    #[test]
    fn test_availability_lists_inclusive_slots() {
        let policy = HoursPolicy::default();
        let wed = NaiveDate::from_ymd_opt(2025, 10, 8).unwrap();
        let availability = policy.availability(wed, Weekday::Sun);
        assert_eq!(
            availability.slots,
            vec!["09:00", "10:00", "11:00", "12:00", "13:00"]
        );
        assert!(availability.prompt.contains("08/10/2025"));
        assert!(availability.prompt.contains("após as 13:00"));
    }

    #[test]
    fn test_availability_closed_on_sunday() {
        let policy = HoursPolicy::default();
        let sun = NaiveDate::from_ymd_opt(2025, 10, 12).unwrap();
        let availability = policy.availability(sun, Weekday::Sun);
        assert!(availability.is_closed());
        assert!(availability.prompt.contains("domingos"));
    }

    #[test]
    fn test_slot_label() {
        assert_eq!(slot_label(&dt(2025, 10, 6, 9, 0)), Some("09:00".to_string()));
        assert_eq!(slot_label(&dt(2025, 10, 6, 9, 30)), None);
    }
}
