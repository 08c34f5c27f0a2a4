use anyhow::Context;
use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::{EventPublisher, UserEvent};

/// Header carrying the account id, so consumers can partition by user.
pub(crate) const KEY_HEADER: &str = "Event-Key";
pub(crate) const TYPE_HEADER: &str = "Event-Type";

/// Publishes events to a NATS subject named after the configured topic.
pub struct NatsPublisher {
    client: Client,
    subject: String,
}

impl NatsPublisher {
    pub async fn connect(url: &str, subject: impl Into<String>) -> anyhow::Result<Self> {
        let client = async_nats::ConnectOptions::new()
            .name("accountd")
            .connect(url)
            .await
            .with_context(|| format!("connect to NATS at {url}"))?;
        info!(%url, "event broker connected");

        Ok(Self {
            client,
            subject: subject.into(),
        })
    }
}

pub(crate) fn encode(event: &UserEvent) -> anyhow::Result<(HeaderMap, Vec<u8>)> {
    let mut headers = HeaderMap::new();
    headers.insert(KEY_HEADER, event.key().as_str());
    headers.insert(TYPE_HEADER, event.event_type.as_str());
    let payload = serde_json::to_vec(event).context("encode user event")?;
    Ok((headers, payload))
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    #[instrument(skip(self, event), fields(subject = %self.subject, event_type = event.event_type.as_str()))]
    async fn publish(&self, event: &UserEvent) -> anyhow::Result<()> {
        let (headers, payload) = encode(event)?;
        self.client
            .publish_with_headers(self.subject.clone(), headers, payload.into())
            .await
            .context("publish user event")?;

        debug!(key = %event.key(), "user event published");
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.client.flush().await.context("flush event broker")?;
        info!("event broker flushed");
        Ok(())
    }
}
