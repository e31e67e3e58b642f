use chrono::Utc;
use log::info;

use crate::calendar::{CalendarEvent, LocationType};
use crate::core::shared::state::AppState;
use crate::tenants::{self, Tenant, VideoPreference};

/// Gives a video booking a meeting link.
///
/// Zoom is used when the tenant prefers it and has connected an account,
/// otherwise a 100ms room is created. Returns `Ok(true)` when the tenant was
/// modified (a refreshed Zoom token) and needs saving.
pub async fn ensure_meeting_link(
    state: &AppState,
    tenant: &mut Tenant,
    event: &mut CalendarEvent,
) -> Result<bool, String> {
    if event.meeting_link.is_some() || event.location_type != LocationType::Video {
        return Ok(false);
    }

    let booking = tenants::booking_config(&state.repo, &tenant.id)
        .await
        .map_err(|e| e.to_string())?;

    match (booking.video_provider, tenant.zoom.clone()) {
        (VideoPreference::None, _) => Ok(false),
        (VideoPreference::Zoom, Some(mut connection)) => {
            let mut tenant_changed = false;
            if connection.needs_refresh(Utc::now()) {
                connection = state
                    .oauth
                    .zoom
                    .refresh(&connection)
                    .await
                    .map_err(|e| format!("Zoom token refresh failed: {e}"))?;
                tenant.zoom = Some(connection.clone());
                tenant_changed = true;
            }

            let meeting = state
                .zoom
                .create_meeting(
                    &connection,
                    &event.title,
                    event.start_time,
                    event.duration_minutes(),
                )
                .await
                .map_err(|e| format!("Zoom meeting creation failed: {e}"))?;
            info!("Created Zoom meeting {} for event {}", meeting.id, event.id);
            event.meeting_link = Some(meeting.join_url);
            Ok(tenant_changed)
        }
        _ => {
            let room_id = state
                .video
                .create_room(&format!("{}-{}", tenant.slug, event.id))
                .await
                .map_err(|e| format!("Video room creation failed: {e}"))?;
            info!("Created 100ms room {room_id} for event {}", event.id);
            event.meeting_link = Some(live_room_url(&state.config.server.base_url, &room_id));
            event.video_room_id = Some(room_id);
            Ok(false)
        }
    }
}

pub fn live_room_url(base_url: &str, room_id: &str) -> String {
    format!("{}/app/live/{room_id}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_room_url() {
        assert_eq!(
            live_room_url("https://app.callygo.com/", "room_1"),
            "https://app.callygo.com/app/live/room_1"
        );
    }
}
