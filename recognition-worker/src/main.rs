pub(crate) mod analyzer;
pub(crate) mod config;
pub(crate) mod recognizer;

use std::sync::Arc;

use analyzer::AzureVisionAnalyzer;
use anyhow::Context;
use async_nats::jetstream::{self, AckKind};
use config::RecognitionConfig;
use entity_common::{JetStreamQueue, PostgresEntityTable, Storage, queue::decode_message};
use futures::StreamExt as _;
use recognizer::{Outcome, RecognitionWorker};
use tokio_util::task::TaskTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let RecognitionConfig {
        database_url,
        nats_url,
        vision,
        s3,
        queue,
    } = config::parse_config()?;

    let storage = Storage::from_config(s3).context("Failed to build storage")?;
    storage
        .check()
        .await
        .context("Failed to access the photo storage")?;

    let table = PostgresEntityTable::connect(&database_url)
        .await
        .context("Failed to connect to the entity table")?;
    table
        .ensure()
        .await
        .context("Failed to create the entity table")?;

    let max_deliver = queue.max_deliver;
    let queue = JetStreamQueue::connect(&nats_url, queue)
        .await
        .context("Failed to connect to the photo queue")?;

    let analyzer = AzureVisionAnalyzer::new(&vision.endpoint, vision.key);

    let worker = RecognitionWorker::new(Arc::new(table), Arc::new(storage), Arc::new(analyzer));

    let mut messages = queue
        .consumer()
        .await
        .context("Failed to create the photo consumer")?
        .messages()
        .await
        .context("Failed to receive the queued photos")?;

    let task_tracker = TaskTracker::new();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            message = messages.next() => message,
            _ = &mut shutdown => {
                tracing::info!("Shutting down; waiting for the photos in progress.");
                break;
            }
        };

        let Some(message) = message else {
            tracing::warn!("The photo queue is closed.");
            break;
        };

        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Failed to receive a message: {:?}; skipping.", e);
                continue;
            }
        };

        let worker = worker.clone(); // cheap clone

        task_tracker.spawn(async move {
            handle_message(&worker, message, max_deliver).await;
        });
    }

    task_tracker.close();
    task_tracker.wait().await;

    Ok(())
}

/// Recognize the queued photo and settle the message accordingly.
async fn handle_message(
    worker: &RecognitionWorker,
    message: jetstream::Message,
    max_deliver: i64,
) {
    let result = match decode_message(&message.payload) {
        Ok(id) => worker.recognize(id).await,
        Err(e) => Err(e.context("malformed message")),
    };

    let delivered = message.info().map(|info| info.delivered).unwrap_or(1);
    let ack_kind = acknowledgement(&result, delivered, max_deliver);

    match &result {
        Ok(outcome) => tracing::info!("Handled the message: {outcome:?}"),
        Err(e) => tracing::error!("Failed to recognize the photo: {e:?}; settling with {ack_kind:?}."),
    }

    if let Err(e) = message.ack_with(ack_kind).await {
        tracing::error!("Failed to settle the message: {:?}", e);
    }
}

/// How a message is settled after it was handled.
///
/// A failed recognition is redelivered by the queue, until its delivery limit.
/// On its last delivery it is terminated, since the work-queue stream would
/// otherwise keep it forever. A malformed message will never succeed, so it is
/// terminated right away.
fn acknowledgement(
    result: &anyhow::Result<Outcome>,
    delivered: i64,
    max_deliver: i64,
) -> AckKind {
    match result {
        Ok(_) => AckKind::Ack,
        Err(e) if e.downcast_ref::<uuid::Error>().is_some() => AckKind::Term,
        Err(e) if e.downcast_ref::<std::str::Utf8Error>().is_some() => AckKind::Term,
        Err(_) if max_deliver > 0 && delivered >= max_deliver => AckKind::Term,
        Err(_) => AckKind::Nak(None),
    }
}
