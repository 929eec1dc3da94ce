pub mod appointment;
pub mod session;

pub use appointment::{AppointmentRecord, ColorChange, Draft, STATUS_SCHEDULED};
pub use session::{DateMode, Session, SessionState};
