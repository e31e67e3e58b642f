use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::integrations::IntegrationProvider;
use crate::storage::Entity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    #[default]
    Video,
    InPerson,
    Phone,
}

/// The visitor who booked the slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefundRecord {
    pub status: RefundStatus,
    #[serde(default)]
    pub refund_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl RefundRecord {
    pub fn succeeded(&self) -> bool {
        self.status == RefundStatus::Succeeded
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub location_type: LocationType,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub attendee: Option<Attendee>,
    #[serde(default)]
    pub recurrence_group_id: Option<String>,
    #[serde(default)]
    pub video_room_id: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub stripe_payment_intent_id: Option<String>,
    #[serde(default)]
    pub refund: Option<RefundRecord>,
    #[serde(default)]
    pub google_event_id: Option<String>,
    #[serde(default)]
    pub outlook_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for CalendarEvent {
    const KIND: &'static str = "EVENT";

    fn entity_id(&self) -> String {
        self.id.clone()
    }

    fn index_key(&self) -> Option<String> {
        self.recurrence_group_id
            .as_deref()
            .map(|group| group_index_key(&self.tenant_id, group))
    }
}

pub fn group_index_key(tenant_id: &str, group_id: &str) -> String {
    format!("GROUP#{tenant_id}#{group_id}")
}

impl CalendarEvent {
    pub fn new(
        tenant_id: &str,
        title: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            title: title.to_string(),
            description: None,
            start_time,
            end_time,
            status: EventStatus::default(),
            location_type: LocationType::default(),
            location: None,
            notes: None,
            color: None,
            attendee: None,
            recurrence_group_id: None,
            video_room_id: None,
            meeting_link: None,
            stripe_payment_intent_id: None,
            refund: None,
            google_event_id: None,
            outlook_event_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn external_id(&self, provider: IntegrationProvider) -> Option<&str> {
        match provider {
            IntegrationProvider::Google => self.google_event_id.as_deref(),
            IntegrationProvider::Outlook => self.outlook_event_id.as_deref(),
            IntegrationProvider::Zoom => None,
        }
    }

    pub fn set_external_id(&mut self, provider: IntegrationProvider, id: Option<String>) {
        match provider {
            IntegrationProvider::Google => self.google_event_id = id,
            IntegrationProvider::Outlook => self.outlook_event_id = id,
            IntegrationProvider::Zoom => {}
        }
    }

    /// Description pushed to external calendars: the owner's description plus
    /// the meeting link when there is one.
    pub fn sync_description(&self) -> String {
        let mut text = self.description.clone().unwrap_or_default();
        if let Some(link) = &self.meeting_link {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str("Join: ");
            text.push_str(link);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_group_index_key() {
        let start = Utc::now();
        let mut event = CalendarEvent::new("t1", "Yoga", start, start + Duration::hours(1));
        assert_eq!(event.index_key(), None);

        event.recurrence_group_id = Some("g1".to_string());
        assert_eq!(event.index_key().as_deref(), Some("GROUP#t1#g1"));
    }

    #[test]
    fn test_overlaps() {
        let start = Utc::now();
        let event = CalendarEvent::new("t1", "Yoga", start, start + Duration::hours(1));
        assert!(event.overlaps(start - Duration::minutes(30), start + Duration::minutes(1)));
        assert!(!event.overlaps(start + Duration::hours(1), start + Duration::hours(2)));
        assert_eq!(event.duration_minutes(), 60);
    }

    #[test]
    fn test_serde_shape() {
        let start = Utc::now();
        let mut event = CalendarEvent::new("t1", "Yoga", start, start + Duration::hours(1));
        event.location_type = LocationType::InPerson;
        event.status = EventStatus::Cancelled;

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["locationType"], "in_person");
        assert_eq!(json["status"], "cancelled");
        assert!(json.get("startTime").is_some());
    }

    #[test]
    fn test_sync_description_includes_link() {
        let start = Utc::now();
        let mut event = CalendarEvent::new("t1", "Yoga", start, start + Duration::hours(1));
        event.description = Some("Bring a mat".to_string());
        event.meeting_link = Some("https://app.callygo.com/app/live/r1".to_string());
        assert_eq!(
            event.sync_description(),
            "Bring a mat\n\nJoin: https://app.callygo.com/app/live/r1"
        );
    }
}
