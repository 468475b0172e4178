use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer, AckKind, Message};
use futures::{future::BoxFuture, StreamExt};
use processor_domain::{DeliveryContext, Disposition};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Type alias for the per-message handler function
///
/// Takes the raw message body plus delivery metadata and resolves to the
/// disposition the consumer must apply. The handler owns all parsing and
/// business logic.
pub type MessageHandler =
    Box<dyn Fn(Vec<u8>, DeliveryContext) -> BoxFuture<'static, Disposition> + Send + Sync>;

/// JetStream pull consumer processing one message at a time
///
/// Prefetch is capped at a single unacknowledged message (`max_ack_pending
/// = 1`): a delivery runs to exactly one of ack, terminal rejection or
/// negative acknowledgment before the next fetch, which bounds in-flight
/// work and keeps per-consumer side effects strictly ordered.
pub struct JobConsumer {
    consumer: PullConsumer,
    max_wait: Duration,
    redelivery_delay: Option<Duration>,
    handler: MessageHandler,
}

impl JobConsumer {
    pub async fn new(
        jetstream: &jetstream::Context,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        max_wait_secs: u64,
        redelivery_delay: Option<Duration>,
        handler: MessageHandler,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    max_ack_pending: 1,
                    ..Default::default()
                },
                stream_name,
            )
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            consumer,
            max_wait: Duration::from_secs(max_wait_secs),
            redelivery_delay,
            handler,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("Starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_one() => {
                    if let Err(e) = result {
                        // Per-message failures never escape the loop
                        error!(error = %e, "Error fetching message");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_one(&self) -> Result<()> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(1)
            .expires(self.max_wait)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let message = match messages.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!(error = %e, "Error receiving message");
                return Ok(());
            }
            None => {
                debug!("No message available");
                return Ok(());
            }
        };

        let delivery = delivery_context(&message);
        debug!(
            subject = %message.subject,
            redelivered = delivery.redelivered,
            delivery_count = delivery.delivery_count,
            "Received message"
        );

        let disposition = (self.handler)(message.payload.to_vec(), delivery).await;
        self.resolve(&message, disposition).await;
        Ok(())
    }

    /// Apply exactly one acknowledgment outcome to the delivery
    async fn resolve(&self, message: &Message, disposition: Disposition) {
        let result = match disposition {
            Disposition::Ack => message.ack().await,
            Disposition::RejectPermanent { ref reason } => {
                warn!(
                    subject = %message.subject,
                    reason = %reason,
                    "Terminating message without redelivery"
                );
                message.ack_with(AckKind::Term).await
            }
            Disposition::RejectTransient { ref reason } => {
                warn!(
                    subject = %message.subject,
                    reason = %reason,
                    "Rejecting message for redelivery"
                );
                message.ack_with(AckKind::Nak(self.redelivery_delay)).await
            }
        };

        if let Err(e) = result {
            // The broker will redeliver an unresolved message after the ack
            // wait expires
            error!(error = %e, subject = %message.subject, "Failed to resolve delivery");
        }
    }
}

fn delivery_context(message: &Message) -> DeliveryContext {
    match message.info() {
        Ok(info) => DeliveryContext {
            redelivered: info.delivered > 1,
            delivery_count: info.delivered,
        },
        Err(e) => {
            warn!(error = %e, "Could not read delivery info");
            DeliveryContext::default()
        }
    }
}
