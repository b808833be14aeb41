use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use serde_json::json;
use uuid::Uuid;

use gatekeep_auth_schema::outbox_events;

use crate::domain::clock::SharedClock;
use crate::domain::repository::Notifier;
use crate::error::AuthServiceError;

/// Outbox event kind consumed by the mail relay.
pub const EMAIL_EVENT_KIND: &str = "email";

fn email_event(to: &str, subject: &str, body: &str, now: DateTime<Utc>) -> outbox_events::ActiveModel {
    let id = Uuid::now_v7();
    outbox_events::ActiveModel {
        id: Set(id),
        kind: Set(EMAIL_EVENT_KIND.to_owned()),
        payload: Set(json!({ "to": to, "subject": subject, "body": body })),
        idempotency_key: Set(format!("{EMAIL_EVENT_KIND}:{id}")),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(now),
        next_attempt_at: Set(now),
        processed_at: Set(None),
    }
}

/// Hands emails to the relay worker by writing an outbox row.
/// A failed insert is reported to the caller; delivery retries are the relay's job.
#[derive(Clone)]
pub struct OutboxNotifier {
    pub db: DatabaseConnection,
    pub clock: SharedClock,
}

impl Notifier for OutboxNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AuthServiceError> {
        email_event(to, subject, body, self.clock.now())
            .insert(&self.db)
            .await
            .context("enqueue email")?;
        Ok(())
    }
}
