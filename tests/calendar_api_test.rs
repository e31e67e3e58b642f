mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use std::sync::Arc;

use cally::calendar::EventStatus;
use cally::core::shared::test_utils::{FakePayments, FakeVideo, FlakyStore, TestApp};
use cally::storage::Repository;
use cally::waitlist::WaitlistEntry;
use common::{send, time, Harness};

const EVENTS: &str = "/api/data/app/calendar/events";

#[tokio::test]
async fn test_requests_without_session_are_rejected() {
    let h = Harness::new().await;
    for (method, uri) in [
        (Method::GET, EVENTS.to_string()),
        (Method::PUT, format!("{EVENTS}/abc")),
        (Method::DELETE, format!("{EVENTS}/abc")),
        (Method::POST, format!("{EVENTS}/abc/recording/start")),
        (Method::GET, "/api/data/app/ads/credits".to_string()),
    ] {
        let (status, body) = send(&h.router, method, &uri, None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["success"], json!(false));
    }

    let (status, _) = send(&h.router, Method::GET, EVENTS, Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_rejects_end_before_start() {
    let h = Harness::new().await;
    let event = h.booking(EventStatus::Scheduled);
    h.store_event(&event).await;

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", event.id),
            Some(json!({ "endTime": (event.start_time - Duration::minutes(5)).to_rfc3339() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let same = event.start_time.to_rfc3339();
    let (status, _) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", event.id),
            Some(json!({ "startTime": same, "endTime": same })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(h.load_event(&event.id).await, Some(event));
}

#[tokio::test]
async fn test_malformed_input_is_400_in_envelope() {
    let h = Harness::new().await;
    let event = h.booking(EventStatus::Scheduled);
    h.store_event(&event).await;
    let uri = format!("{EVENTS}/{}", event.id);

    for body in [
        json!({ "status": "bogus" }),
        json!({ "startTime": "not-a-date" }),
    ] {
        let (status, reply) = h.call(Method::PUT, &uri, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{reply}");
        assert_eq!(reply["success"], json!(false));
        assert!(reply["error"].is_string());
    }

    let (status, reply) = h
        .call(Method::DELETE, &format!("{uri}?deleteAll=yes"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["success"], json!(false));

    assert_eq!(h.load_event(&event.id).await, Some(event));
}

#[tokio::test]
async fn test_update_missing_event_is_404() {
    let h = Harness::new().await;
    let (status, _) = h
        .call(Method::PUT, &format!("{EVENTS}/missing"), Some(json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_future_shifts_only_later_siblings() {
    let h = Harness::new().await;
    let start = (Utc::now() + Duration::days(1))
        .date_naive()
        .and_hms_opt(9, 0, 0)
        .expect("valid time")
        .and_utc();

    let (status, created) = h
        .call(
            Method::POST,
            EVENTS,
            Some(json!({
                "title": "Morning flow",
                "startTime": start.to_rfc3339(),
                "endTime": (start + Duration::hours(1)).to_rfc3339(),
                "recurrence": { "frequency": "weekly", "count": 4 }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    let events = created["data"]["events"].as_array().expect("events").clone();
    assert_eq!(events.len(), 4);

    let edited = &events[1];
    let new_start = time(&edited["startTime"]) + Duration::minutes(30);
    let new_end = time(&edited["endTime"]) + Duration::minutes(90);

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", edited["id"].as_str().expect("id")),
            Some(json!({
                "startTime": new_start.to_rfc3339(),
                "endTime": new_end.to_rfc3339(),
                "title": "Slow flow",
                "updateFuture": true
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(time(&body["data"]["event"]["startTime"]), new_start);

    let shifted = body["data"]["shiftedEvents"].as_array().expect("shifted");
    assert_eq!(shifted.len(), 2);
    for before in &events[2..] {
        let after = shifted
            .iter()
            .find(|e| e["id"] == before["id"])
            .expect("later occurrence shifted");
        assert_eq!(
            time(&after["startTime"]),
            time(&before["startTime"]) + Duration::minutes(30)
        );
        assert_eq!(
            time(&after["endTime"]),
            time(&before["endTime"]) + Duration::minutes(90)
        );
        assert_eq!(after["title"], json!("Slow flow"));
    }

    let first = h
        .load_event(events[0]["id"].as_str().expect("id"))
        .await
        .expect("first occurrence");
    assert_eq!(first.start_time, start);
    assert_eq!(first.title, "Morning flow");

    // Every changed occurrence went to the connected calendar.
    assert_eq!(body["data"]["sync"]["failures"], json!([]));
}

#[tokio::test]
async fn test_update_future_rejects_shift_that_inverts_a_sibling() {
    let h = Harness::new().await;
    let group = "series".to_string();
    let mut edited = h.booking(EventStatus::Scheduled);
    edited.recurrence_group_id = Some(group.clone());
    let mut later = h.booking(EventStatus::Scheduled);
    later.recurrence_group_id = Some(group);
    later.start_time = edited.start_time + Duration::days(7);
    later.end_time = later.start_time + Duration::minutes(30);
    h.store_event(&edited).await;
    h.store_event(&later).await;

    // Valid for the edited hour-long event, but the 30-minute sibling would
    // end 20 minutes before it starts.
    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", edited.id),
            Some(json!({
                "startTime": (edited.start_time + Duration::minutes(50)).to_rfc3339(),
                "updateFuture": true
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["success"], json!(false));

    assert_eq!(h.load_event(&edited.id).await, Some(edited));
    assert_eq!(h.load_event(&later.id).await, Some(later));
}

#[tokio::test]
async fn test_update_without_future_flag_leaves_series_alone() {
    let h = Harness::new().await;
    let group = "group-1".to_string();
    let mut first = h.booking(EventStatus::Scheduled);
    first.recurrence_group_id = Some(group.clone());
    let mut second = h.booking(EventStatus::Scheduled);
    second.recurrence_group_id = Some(group);
    second.start_time = first.start_time + Duration::days(7);
    second.end_time = first.end_time + Duration::days(7);
    h.store_event(&first).await;
    h.store_event(&second).await;

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", first.id),
            Some(json!({ "startTime": (first.start_time + Duration::hours(1)).to_rfc3339(),
                         "endTime": (first.end_time + Duration::hours(1)).to_rfc3339() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["shiftedEvents"], json!([]));
    assert_eq!(h.load_event(&second.id).await, Some(second));
}

#[tokio::test]
async fn test_delete_all_without_group_deletes_single_event() {
    let h = Harness::new().await;
    let lone = h.booking(EventStatus::Scheduled);
    let other = h.booking(EventStatus::Scheduled);
    h.store_event(&lone).await;
    h.store_event(&other).await;

    let (status, body) = h
        .call(
            Method::DELETE,
            &format!("{EVENTS}/{}?deleteAll=true", lone.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], json!([lone.id]));
    assert!(h.load_event(&lone.id).await.is_none());
    assert!(h.load_event(&other.id).await.is_some());
}

#[tokio::test]
async fn test_delete_all_removes_group_from_calendars() {
    let h = Harness::new().await;
    let mut tenant = h.tenant.clone();
    tenant.set_calendar_connection(
        cally::integrations::IntegrationProvider::Google,
        Some(cally::tenants::CalendarConnection::new(
            cally::core::shared::test_utils::oauth_connection(Utc::now() + Duration::hours(2)),
        )),
    );
    h.app.seed_tenant(&tenant).await;

    let mut ids = Vec::new();
    for week in 0..3 {
        let mut event = h.booking(EventStatus::Scheduled);
        event.recurrence_group_id = Some("series".to_string());
        event.start_time += Duration::weeks(week);
        event.end_time += Duration::weeks(week);
        event.google_event_id = Some(format!("g-{week}"));
        h.store_event(&event).await;
        ids.push(event.id);
    }

    let (status, body) = h
        .call(
            Method::DELETE,
            &format!("{EVENTS}/{}?deleteAll=true", ids[1]),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["data"]["sync"]["removed"], json!(3));

    let mut removed = h.app.google.deleted();
    removed.sort();
    assert_eq!(removed, vec!["g-0", "g-1", "g-2"]);
}

#[tokio::test]
async fn test_failed_delete_keeps_calendar_copy() {
    let h = Harness::with(
        TestApp::builder()
            .repo(Repository::new(Arc::new(FlakyStore::failing_deletes("EVENT#"))))
            .build(),
    )
    .await;
    let mut tenant = h.tenant.clone();
    tenant.set_calendar_connection(
        cally::integrations::IntegrationProvider::Google,
        Some(cally::tenants::CalendarConnection::new(
            cally::core::shared::test_utils::oauth_connection(Utc::now() + Duration::hours(2)),
        )),
    );
    h.app.seed_tenant(&tenant).await;

    let mut event = h.booking(EventStatus::Scheduled);
    event.google_event_id = Some("g-keep".to_string());
    h.store_event(&event).await;

    let (status, body) = h
        .call(Method::DELETE, &format!("{EVENTS}/{}", event.id), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert!(h.app.google.deleted().is_empty());
    assert_eq!(h.load_event(&event.id).await, Some(event));
}

#[tokio::test]
async fn test_cancellation_refunds_then_emails_attendee() {
    let h = Harness::new().await;
    let mut event = h.booking(EventStatus::Scheduled);
    event.stripe_payment_intent_id = Some("pi_paid".to_string());
    h.store_event(&event).await;

    let waiting = WaitlistEntry {
        id: "w1".to_string(),
        event_id: Some(event.id.clone()),
        name: "Sam".to_string(),
        email: "sam@visitor.test".to_string(),
        note: None,
        created_at: Utc::now(),
        notified_at: None,
    };
    h.app
        .state
        .repo
        .put(&h.tenant.id, &waiting)
        .await
        .expect("seed waitlist");

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", event.id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["refund"]["status"], json!("succeeded"));
    assert_eq!(body["data"]["warnings"], json!([]));
    assert_eq!(h.app.payments.refund_keys(), vec![format!("refund-{}", event.id)]);

    let stored = h.load_event(&event.id).await.expect("event");
    assert_eq!(stored.status, EventStatus::Cancelled);
    assert!(stored.refund.as_ref().is_some_and(|r| r.succeeded()));

    let sent = h.app.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "dana@visitor.test");
    assert!(sent[0].subject.starts_with("Cancelled"));
    assert!(sent[0].body.contains("refund"));
    assert_eq!(sent[1].to, "sam@visitor.test");

    // Cancelling again neither refunds nor emails twice.
    let (status, _) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", event.id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.app.payments.refund_keys().len(), 1);
    assert_eq!(h.app.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_failed_refund_is_persisted_and_reported() {
    let h = Harness::with(
        TestApp::builder()
            .payments(FakePayments::failing_refunds())
            .build(),
    )
    .await;
    let mut event = h.booking(EventStatus::Pending);
    event.stripe_payment_intent_id = Some("pi_paid".to_string());
    h.store_event(&event).await;

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", event.id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["refund"]["status"], json!("failed"));
    assert!(body["data"]["warnings"][0]
        .as_str()
        .is_some_and(|w| w.starts_with("Refund failed")));

    let stored = h.load_event(&event.id).await.expect("event");
    assert!(stored.refund.is_some_and(|r| !r.succeeded()));
}

#[tokio::test]
async fn test_declining_unpaid_request_sends_decline() {
    let h = Harness::new().await;
    let event = h.booking(EventStatus::Pending);
    h.store_event(&event).await;

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", event.id),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("refund").is_none());
    assert!(h.app.payments.refund_keys().is_empty());

    let sent = h.app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].subject.starts_with("Cancelled"));
}

#[tokio::test]
async fn test_confirming_request_creates_room_and_confirms() {
    let h = Harness::new().await;
    let event = h.booking(EventStatus::Pending);
    h.store_event(&event).await;

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", event.id),
            Some(json!({ "status": "scheduled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["event"]["videoRoomId"], json!("room-1"));
    assert!(body["data"]["event"]["meetingLink"]
        .as_str()
        .is_some_and(|l| l.ends_with("/app/live/room-1")));
    assert_eq!(h.app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_email_failure_becomes_warning() {
    let h = Harness::with(
        TestApp::builder()
            .mailer(cally::core::shared::test_utils::RecordingMailer::failing())
            .build(),
    )
    .await;
    let event = h.booking(EventStatus::Pending);
    h.store_event(&event).await;

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("{EVENTS}/{}", event.id),
            Some(json!({ "status": "scheduled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["warnings"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        h.load_event(&event.id).await.map(|e| e.status),
        Some(EventStatus::Scheduled)
    );
}

#[tokio::test]
async fn test_recording_requires_video_room() {
    let h = Harness::new().await;
    let event = h.booking(EventStatus::Scheduled);
    h.store_event(&event).await;

    let (status, body) = h
        .call(
            Method::POST,
            &format!("{EVENTS}/{}/recording/start", event.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(h.app.video.started().is_empty());
}

#[tokio::test]
async fn test_recording_start_creates_transcript() {
    let h = Harness::new().await;
    let mut event = h.booking(EventStatus::Scheduled);
    event.video_room_id = Some("room-9".to_string());
    h.store_event(&event).await;

    let (status, body) = h
        .call(
            Method::POST,
            &format!("{EVENTS}/{}/recording/start", event.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], json!("recording"));
    assert_eq!(body["data"]["roomId"], json!("room-9"));
    assert_eq!(h.app.video.started(), vec!["room-9"]);
    assert!(h.app.video.stopped().is_empty());

    let (status, body) = h
        .call(Method::GET, &format!("{EVENTS}/{}/transcript", event.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("recording"));
}

#[tokio::test]
async fn test_recording_is_stopped_when_transcript_write_fails() {
    let h = Harness::with(
        TestApp::builder()
            .repo(Repository::new(Arc::new(FlakyStore::failing_writes(
                "TRANSCRIPT#",
            ))))
            .build(),
    )
    .await;
    let mut event = h.booking(EventStatus::Scheduled);
    event.video_room_id = Some("room-3".to_string());
    h.store_event(&event).await;

    let (status, body) = h
        .call(
            Method::POST,
            &format!("{EVENTS}/{}/recording/start", event.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert_eq!(h.app.video.started(), vec!["room-3"]);
    assert_eq!(h.app.video.stopped(), vec!["room-3"]);
}

#[tokio::test]
async fn test_recording_provider_failure_writes_nothing() {
    let h = Harness::with(TestApp::builder().video(FakeVideo::failing_start()).build()).await;
    let mut event = h.booking(EventStatus::Scheduled);
    event.video_room_id = Some("room-4".to_string());
    h.store_event(&event).await;

    let (status, _) = h
        .call(
            Method::POST,
            &format!("{EVENTS}/{}/recording/start", event.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = h
        .call(Method::GET, &format!("{EVENTS}/{}/transcript", event.id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
