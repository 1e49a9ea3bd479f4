//! Event dispatcher - hands verified webhook events to a bounded worker pool
//!
//! Each webhook request becomes one [`EventBatch`]. A batch is processed by a
//! single worker, event by event in payload order; batches from different
//! requests run concurrently up to the worker count. The queue in front of
//! the workers is bounded, so a flood of webhooks cannot spawn unbounded work.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::pipeline::{EventContext, EventOutcome, process_events};
use crate::types::Event;

/// Events of one webhook request
#[derive(Debug)]
pub struct EventBatch {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    pub events: Vec<Event>,
}

impl EventBatch {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            events,
        }
    }
}

/// Dispatcher state
#[derive(Clone)]
pub struct EventDispatcher {
    queue_tx: mpsc::Sender<EventBatch>,
    workers: Arc<Vec<JoinHandle<()>>>,
}

impl EventDispatcher {
    /// Spawn `worker_count` workers sharing a queue of `queue_capacity` batches
    pub fn start(ctx: EventContext, worker_count: usize, queue_capacity: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity.max(1));
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let ctx = Arc::new(ctx);

        let workers: Vec<JoinHandle<()>> = (0..worker_count.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(worker_id, ctx.clone(), queue_rx.clone()))
            })
            .collect();

        info!(
            "Event dispatcher started: {} workers, queue capacity {}",
            worker_count.max(1),
            queue_capacity.max(1)
        );

        Self {
            queue_tx,
            workers: Arc::new(workers),
        }
    }

    /// Queue a request's events without waiting.
    ///
    /// Fails when the queue is full or the workers are gone.
    pub fn submit(&self, events: Vec<Event>) -> Result<Uuid> {
        let batch = EventBatch::new(events);
        let id = batch.id;
        let count = batch.events.len();

        self.queue_tx.try_send(batch).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => anyhow!("Event queue is full"),
            mpsc::error::TrySendError::Closed(_) => anyhow!("Event queue is closed"),
        })?;

        debug!("Queued batch {} with {} event(s)", id, count);
        Ok(id)
    }

    /// Stop all workers
    pub fn shutdown(&self) {
        for worker in self.workers.iter() {
            worker.abort();
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    ctx: Arc<EventContext>,
    queue_rx: Arc<Mutex<mpsc::Receiver<EventBatch>>>,
) {
    loop {
        // Only the lock holder waits on the queue; the guard drops before processing
        let next = queue_rx.lock().await.recv().await;
        let Some(batch) = next else {
            debug!("Worker {} exiting, queue closed", worker_id);
            break;
        };

        let span = info_span!("batch", id = %batch.id, worker = worker_id);
        async {
            let waited_ms = (Utc::now() - batch.received_at).num_milliseconds();
            debug!(
                "Processing {} event(s) after {}ms in queue",
                batch.events.len(),
                waited_ms
            );

            let outcomes = process_events(&ctx, &batch.events).await;
            let translated = outcomes
                .iter()
                .filter(|o| **o == EventOutcome::Translated)
                .count();
            let failed = outcomes
                .iter()
                .filter(|o| matches!(o, EventOutcome::TranslationFailed | EventOutcome::ReplyFailed))
                .count();
            if failed > 0 {
                warn!(
                    "Batch done: {} translated, {} failed, {} skipped",
                    translated,
                    failed,
                    outcomes.len() - translated - failed
                );
            } else {
                debug!("Batch done: {} translated", translated);
            }
        }
        .instrument(span)
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_api::ReplySender;
    use crate::pipeline::TRANSLATION_ERROR_TEXT;
    use crate::pipeline::tests::{FakeTranslator, GatedTranslator, text_event};
    use crate::types::WebhookPayload;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Forwards every reply to a channel
    struct ChannelReplier(mpsc::UnboundedSender<(String, String)>);

    #[async_trait]
    impl ReplySender for ChannelReplier {
        async fn reply_text(&self, reply_token: &str, text: &str) -> anyhow::Result<()> {
            self.0
                .send((reply_token.to_string(), text.to_string()))
                .map_err(|_| anyhow!("receiver dropped"))
        }
    }

    fn events(values: Vec<serde_json::Value>) -> Vec<Event> {
        let payload: WebhookPayload =
            serde_json::from_value(serde_json::json!({ "events": values })).unwrap();
        payload.events
    }

    #[tokio::test]
    async fn test_batch_processed_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = EventContext::new(
            Arc::new(FakeTranslator::default()),
            Arc::new(ChannelReplier(tx)),
        );
        let dispatcher = EventDispatcher::start(ctx, 4, 8);

        dispatcher
            .submit(events(vec![
                text_event("t1", "one"),
                text_event("t2", "fail"),
                text_event("t3", "three"),
            ]))
            .unwrap();

        let mut replies = Vec::new();
        for _ in 0..3 {
            let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            replies.push(reply);
        }
        assert_eq!(
            replies,
            [
                ("t1".to_string(), "[en→th] <one>".to_string()),
                ("t2".to_string(), TRANSLATION_ERROR_TEXT.to_string()),
                ("t3".to_string(), "[en→th] <three>".to_string()),
            ]
        );
        dispatcher.shutdown();
    }

    #[tokio::test]
    async fn test_full_queue_rejects_batch() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = EventContext::new(
            Arc::new(GatedTranslator::new(gate.clone())),
            Arc::new(ChannelReplier(tx)),
        );
        let dispatcher = EventDispatcher::start(ctx, 1, 1);

        // First batch occupies the only worker
        dispatcher.submit(events(vec![text_event("t1", "a")])).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Second waits in the queue, third has nowhere to go
        dispatcher.submit(events(vec![text_event("t2", "b")])).unwrap();
        let err = dispatcher
            .submit(events(vec![text_event("t3", "c")]))
            .unwrap_err();
        assert!(err.to_string().contains("full"));

        gate.add_permits(2);
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.0, "t1");
        assert_eq!(second.0, "t2");
        dispatcher.shutdown();
    }
}
