//! Calendar Module
//!
//! Tenant calendar events: bookings, recurring series, and their sync to
//! Google and Outlook calendars.

mod handlers;
pub mod recurrence;
pub mod service;
pub mod sync;
pub mod types;

pub use handlers::calendar_routes;
pub use recurrence::{Frequency, RecurrenceRule, TimeShift};
pub use sync::{CalendarProvider, CalendarSync, SyncError, SyncFailure, SyncReport, SyncTarget};
pub use types::{
    group_index_key, Attendee, CalendarEvent, EventStatus, LocationType, RefundRecord,
    RefundStatus,
};
