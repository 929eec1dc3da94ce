use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Status tag written on every newly confirmed appointment.
pub const STATUS_SCHEDULED: &str = "Agendado";

/// Hair colour change requested alongside a colouring service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorChange {
    pub current: String,
    pub desired: String,
}

/// Booking data collected so far; lives inside the session until confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorChange>,
}

impl Draft {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            color: None,
        }
    }
}

/// A persisted appointment as exchanged with the appointment backend.
///
/// `date_time` is kept as text: records written by this service use ISO-8601
/// (`2025-10-02T14:00:00`), but rows entered by hand in the backend may hold
/// anything, and listing must still show them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub phone: String,
    pub service: String,
    pub date_time: String,
    pub color_current: Option<String>,
    pub color_desired: Option<String>,
    pub status: String,
}

impl AppointmentRecord {
    /// Build the record for a confirmed draft.
    pub fn scheduled(phone: &str, draft: &Draft, date_time: &NaiveDateTime) -> Self {
        Self {
            phone: phone.to_string(),
            service: draft.service.clone(),
            date_time: date_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            color_current: draft.color.as_ref().map(|c| c.current.clone()),
            color_desired: draft.color.as_ref().map(|c| c.desired.clone()),
            status: STATUS_SCHEDULED.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_scheduled_record_uses_iso_date_time() {
        let mut draft = Draft::new("Coloração");
        draft.color = Some(ColorChange {
            current: "Castanho".to_string(),
            desired: "Loiro Mel".to_string(),
        });
        let dt = NaiveDate::from_ymd_opt(2025, 10, 2)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();

        let record = AppointmentRecord::scheduled("+5511999999999", &draft, &dt);
        assert_eq!(record.date_time, "2025-10-02T14:00:00");
        assert_eq!(record.status, "Agendado");
        assert_eq!(record.color_current.as_deref(), Some("Castanho"));
        assert_eq!(record.color_desired.as_deref(), Some("Loiro Mel"));
    }

    #[test]
    fn test_scheduled_record_without_color() {
        let dt = NaiveDate::from_ymd_opt(2025, 10, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let record = AppointmentRecord::scheduled("+55", &Draft::new("Corte"), &dt);
        assert_eq!(record.service, "Corte");
        assert!(record.color_current.is_none());
        assert!(record.color_desired.is_none());
    }
}
