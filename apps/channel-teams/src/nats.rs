use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use tb_core::{BusEvent, Direction, Dispatch, EventBus, MiddlewareChain, Subject};
use tracing::{debug, error, info, warn};

/// Publishes bus events to NATS under `{prefix}.{bot_id}.events.{direction}`.
#[derive(Clone)]
pub struct NatsEventBus {
    client: async_nats::Client,
    prefix: String,
}

impl NatsEventBus {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn send_event(&self, event: BusEvent) -> Result<()> {
        let subject = match event.direction {
            Direction::Incoming => Subject::incoming(&self.prefix, &event.bot_id),
            Direction::Outgoing => Subject::outgoing(&self.prefix, &event.bot_id),
        };
        let payload = serde_json::to_vec(&event)?;
        self.client
            .publish(subject.as_str().to_string(), payload.into())
            .await?;
        debug!(subject = subject.as_str(), kind = %event.kind, "event published");
        Ok(())
    }
}

/// Consumes outgoing events for every bot and runs each through the middleware chain.
///
/// Events are dispatched concurrently; no ordering is kept between them.
pub async fn run_outgoing_loop(
    client: async_nats::Client,
    prefix: String,
    chain: Arc<MiddlewareChain>,
) -> Result<()> {
    let subject = Subject::outgoing_all(&prefix);
    let mut sub = client.subscribe(subject.as_str().to_string()).await?;
    info!(subject = subject.as_str(), "subscribed to outgoing events");

    while let Some(msg) = sub.next().await {
        let event: BusEvent = match serde_json::from_slice(&msg.payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(subject = %msg.subject, error = %err, "undecodable outgoing event");
                continue;
            }
        };
        if event.direction != Direction::Outgoing {
            continue;
        }

        let chain = Arc::clone(&chain);
        tokio::spawn(async move {
            let event_id = event.id.clone();
            match chain.dispatch(event).await {
                Ok(Dispatch::Unhandled(event)) => {
                    debug!(%event_id, channel = %event.channel, "no middleware handled event");
                }
                Ok(_) => {}
                Err(err) => error!(%event_id, error = %format_args!("{err:#}"), "outgoing event failed"),
            }
        });
    }

    warn!("outgoing subscription closed");
    Ok(())
}
