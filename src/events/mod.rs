use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::users::repo_types::Account;

mod nats;

pub use nats::NatsPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UserEventKind {
    #[serde(rename = "user.registered")]
    Registered,
    #[serde(rename = "user.logged_in")]
    LoggedIn,
    #[serde(rename = "user.profile_updated")]
    ProfileUpdated,
}

impl UserEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UserEventKind::Registered => "user.registered",
            UserEventKind::LoggedIn => "user.logged_in",
            UserEventKind::ProfileUpdated => "user.profile_updated",
        }
    }
}

/// Identity fields carried by every user event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEventData {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_fields: Option<Vec<&'static str>>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Envelope written to the topic, keyed by the account id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEvent {
    pub event_type: UserEventKind,
    pub data: UserEventData,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl UserEvent {
    pub fn new(kind: UserEventKind, account: &Account) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            event_type: kind,
            data: UserEventData {
                user_id: account.id,
                email: account.email.clone(),
                first_name: account.first_name.clone(),
                last_name: account.last_name.clone(),
                updated_fields: None,
                timestamp: now,
            },
            timestamp: now,
        }
    }

    pub fn profile_updated(account: &Account, fields: Vec<&'static str>) -> Self {
        let mut event = Self::new(UserEventKind::ProfileUpdated, account);
        event.data.updated_fields = Some(fields);
        event
    }

    pub fn key(&self) -> String {
        self.data.user_id.to_string()
    }
}

/// Sink for domain events. Errors reach the caller; nothing retries.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &UserEvent) -> anyhow::Result<()>;

    /// Flush anything buffered. Called once before the process exits.
    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes each event as a structured log record on the configured topic.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    topic: String,
}

impl LogPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &UserEvent) -> anyhow::Result<()> {
        let value = serde_json::to_string(event)?;
        info!(
            topic = %self.topic,
            key = %event.key(),
            event_type = event.event_type.as_str(),
            %value,
            "user event published"
        );
        Ok(())
    }
}

/// Counts every publish attempt in `event_messages_total`.
pub struct MeteredPublisher {
    inner: Arc<dyn EventPublisher>,
    topic: String,
}

impl MeteredPublisher {
    pub fn new(inner: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            inner,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for MeteredPublisher {
    async fn publish(&self, event: &UserEvent) -> anyhow::Result<()> {
        let result = self.inner.publish(event).await;
        crate::observability::record_event_message(&self.topic, result.is_ok());
        result
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every published event; optionally fails instead.
    #[derive(Debug, Default)]
    pub struct RecordingPublisher {
        pub events: Mutex<Vec<UserEvent>>,
        pub fail: bool,
    }

    impl RecordingPublisher {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn kinds(&self) -> Vec<UserEventKind> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event_type)
                .collect()
        }

        pub fn last(&self) -> Option<UserEvent> {
            self.events.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &UserEvent) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("broker unavailable");
            }
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::NewAccount;

    fn account() -> Account {
        NewAccount {
            email: "test@example.com".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            password_hash: "hash".into(),
        }
        .into_account(OffsetDateTime::now_utc())
    }

    #[test]
    fn envelope_shape() {
        let a = account();
        let event = UserEvent::new(UserEventKind::Registered, &a);
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["eventType"], "user.registered");
        assert_eq!(v["data"]["userId"], a.id.to_string());
        assert_eq!(v["data"]["firstName"], "Test");
        assert!(v["data"].get("updatedFields").is_none());
        assert!(v["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(event.key(), a.id.to_string());
    }

    #[test]
    fn profile_update_carries_field_names() {
        let event = UserEvent::profile_updated(&account(), vec!["bio"]);
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["eventType"], "user.profile_updated");
        assert_eq!(v["data"]["updatedFields"], serde_json::json!(["bio"]));
    }

    #[tokio::test]
    async fn metered_publisher_counts_outcomes() {
        use super::testing::RecordingPublisher;

        let handle = crate::observability::init_metrics().unwrap();
        let ok = MeteredPublisher::new(Arc::new(RecordingPublisher::default()), "metered-ok");
        ok.publish(&UserEvent::new(UserEventKind::Registered, &account()))
            .await
            .unwrap();
        let failing = MeteredPublisher::new(Arc::new(RecordingPublisher::failing()), "metered-err");
        assert!(failing
            .publish(&UserEvent::new(UserEventKind::LoggedIn, &account()))
            .await
            .is_err());

        let rendered = handle.render();
        assert!(rendered
            .lines()
            .any(|l| l.starts_with("event_messages_total")
                && l.contains(r#"topic="metered-ok""#)
                && l.contains(r#"status="success""#)));
        assert!(rendered
            .lines()
            .any(|l| l.starts_with("event_messages_total")
                && l.contains(r#"topic="metered-err""#)
                && l.contains(r#"status="error""#)));
    }

    #[tokio::test]
    async fn log_publisher_accepts_events() {
        let publisher = LogPublisher::new("user-events");
        publisher
            .publish(&UserEvent::new(UserEventKind::LoggedIn, &account()))
            .await
            .unwrap();
    }
}
