use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::Entity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Recording,
    Uploading,
    Transcribing,
    Summarizing,
    Completed,
    Failed,
}

impl TranscriptStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Recording => 0,
            Self::Uploading => 1,
            Self::Transcribing => 2,
            Self::Summarizing => 3,
            Self::Completed | Self::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Status only moves forward. A new recording may restart from any state
    /// and a non-terminal transcript may fail.
    pub fn can_advance_to(self, next: TranscriptStatus) -> bool {
        match next {
            Self::Recording => true,
            Self::Failed => !self.is_terminal(),
            _ if self.is_terminal() => false,
            _ => next.rank() >= self.rank(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub speaker: Option<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingTranscript {
    /// Same as the calendar event id.
    pub id: String,
    pub tenant_id: String,
    pub room_id: String,
    pub status: TranscriptStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for MeetingTranscript {
    const KIND: &'static str = "TRANSCRIPT";

    fn entity_id(&self) -> String {
        self.id.clone()
    }

    fn index_key(&self) -> Option<String> {
        Some(room_index_key(&self.room_id))
    }
}

pub fn room_index_key(room_id: &str) -> String {
    format!("ROOM#{room_id}")
}

impl MeetingTranscript {
    pub fn recording(tenant_id: &str, event_id: &str, room_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: event_id.to_string(),
            tenant_id: tenant_id.to_string(),
            room_id: room_id.to_string(),
            status: TranscriptStatus::Recording,
            text: None,
            summary: None,
            segments: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next` when allowed; returns whether the status changed.
    pub fn advance(&mut self, next: TranscriptStatus) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        if next == TranscriptStatus::Recording {
            self.text = None;
            self.summary = None;
            self.segments.clear();
            self.error = None;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TranscriptStatus::*;

    #[test]
    fn test_forward_only() {
        assert!(Recording.can_advance_to(Uploading));
        assert!(Uploading.can_advance_to(Summarizing));
        assert!(Transcribing.can_advance_to(Transcribing));
        assert!(!Summarizing.can_advance_to(Transcribing));
        assert!(!Completed.can_advance_to(Summarizing));
    }

    #[test]
    fn test_failure_and_restart() {
        assert!(Transcribing.can_advance_to(Failed));
        assert!(!Completed.can_advance_to(Failed));
        assert!(Completed.can_advance_to(Recording));
        assert!(Failed.can_advance_to(Recording));
    }

    #[test]
    fn test_restart_clears_previous_output() {
        let mut transcript = MeetingTranscript::recording("t1", "e1", "room_1");
        transcript.status = Completed;
        transcript.text = Some("hello".to_string());

        assert!(!transcript.advance(Uploading));
        assert!(transcript.advance(Recording));
        assert_eq!(transcript.status, Recording);
        assert!(transcript.text.is_none());
        assert_eq!(transcript.index_key().as_deref(), Some("ROOM#room_1"));
    }
}
