//! Plain-text transactional emails sent to visitors on behalf of a tenant.

use crate::calendar::{CalendarEvent, RefundRecord, RefundStatus};
use crate::tenants::Tenant;

use super::mailer::EmailMessage;

fn when(event: &CalendarEvent) -> String {
    event
        .start_time
        .format("%A, %B %-d, %Y at %H:%M UTC")
        .to_string()
}

fn format_amount(amount: i64, currency: &str) -> String {
    format!(
        "{}.{:02} {}",
        amount / 100,
        amount % 100,
        currency.to_uppercase()
    )
}

/// `None` when the event has no attendee to write to.
pub fn booking_confirmation(
    tenant: &Tenant,
    event: &CalendarEvent,
    from: &str,
) -> Option<EmailMessage> {
    let attendee = event.attendee.as_ref()?;
    let mut body = format!(
        "Hi {},\n\nYour booking \"{}\" with {} is confirmed for {}.\n",
        attendee.name,
        event.title,
        tenant.name,
        when(event)
    );
    if let Some(link) = &event.meeting_link {
        body.push_str(&format!("\nJoin the meeting: {link}\n"));
    } else if let Some(location) = &event.location {
        body.push_str(&format!("\nLocation: {location}\n"));
    }
    body.push_str(&format!("\nSee you soon,\n{}", tenant.name));

    Some(EmailMessage {
        from: from.to_string(),
        to: attendee.email.clone(),
        subject: format!("Confirmed: {}", event.title),
        body,
    })
}

pub fn booking_cancellation(
    tenant: &Tenant,
    event: &CalendarEvent,
    refund: Option<&RefundRecord>,
    from: &str,
) -> Option<EmailMessage> {
    let attendee = event.attendee.as_ref()?;
    let refund_line = match refund {
        Some(r) if r.status == RefundStatus::Succeeded => match (r.amount, &r.currency) {
            (Some(amount), Some(currency)) => format!(
                "A full refund of {} has been issued to your original payment method. It usually arrives within 5-10 business days.",
                format_amount(amount, currency)
            ),
            _ => "A full refund has been issued to your original payment method.".to_string(),
        },
        _ => format!(
            "Your payment will be refunded. If you do not see it within 10 business days, reply to this email and {} will follow up.",
            tenant.name
        ),
    };

    Some(EmailMessage {
        from: from.to_string(),
        to: attendee.email.clone(),
        subject: format!("Cancelled: {}", event.title),
        body: format!(
            "Hi {},\n\nYour booking \"{}\" on {} has been cancelled.\n\n{}\n\n{}",
            attendee.name,
            event.title,
            when(event),
            refund_line,
            tenant.name
        ),
    })
}

pub fn booking_declined(
    tenant: &Tenant,
    event: &CalendarEvent,
    from: &str,
) -> Option<EmailMessage> {
    let attendee = event.attendee.as_ref()?;
    Some(EmailMessage {
        from: from.to_string(),
        to: attendee.email.clone(),
        subject: format!("Booking request declined: {}", event.title),
        body: format!(
            "Hi {},\n\nUnfortunately {} is unable to accept your booking request \"{}\" for {}.\n\nYou are welcome to pick another time.\n\n{}",
            attendee.name,
            tenant.name,
            event.title,
            when(event),
            tenant.name
        ),
    })
}

pub fn waitlist_spot_opened(
    tenant: &Tenant,
    event: &CalendarEvent,
    name: &str,
    email: &str,
    booking_url: &str,
    from: &str,
) -> EmailMessage {
    EmailMessage {
        from: from.to_string(),
        to: email.to_string(),
        subject: format!("A spot opened up: {}", event.title),
        body: format!(
            "Hi {name},\n\nA spot just opened for \"{}\" on {}.\n\nBook it here before it is gone: {booking_url}\n\n{}",
            event.title,
            when(event),
            tenant.name
        ),
    }
}

pub fn feedback_request(
    tenant: &Tenant,
    name: &str,
    email: &str,
    message: Option<&str>,
    response_url: &str,
    from: &str,
) -> EmailMessage {
    let intro = message
        .map(|m| format!("{m}\n\n"))
        .unwrap_or_default();
    EmailMessage {
        from: from.to_string(),
        to: email.to_string(),
        subject: format!("How was your experience with {}?", tenant.name),
        body: format!(
            "Hi {name},\n\n{intro}We would love to hear how it went. It takes less than a minute:\n{response_url}\n\nThank you,\n{}",
            tenant.name
        ),
    }
}
