//! Live sessions: 100ms rooms, recordings and their transcripts.

mod handlers;
pub mod hms;
pub mod links;
pub mod transcripts;

pub use handlers::{meet_routes, webhook_status};
pub use hms::{HmsClient, HmsError, VideoProvider};
pub use links::{ensure_meeting_link, live_room_url};
pub use transcripts::{MeetingTranscript, TranscriptSegment, TranscriptStatus};
