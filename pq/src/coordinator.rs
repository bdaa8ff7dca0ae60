//! Coordinator - owns one queue session and every participant bound to it
//!
//! The Coordinator is responsible for:
//! - Creating the shared queue and the session-wide cancellation token
//! - Building producers and consumers bound to both
//! - Starting them, stopping producers ahead of a drain, and waiting for the drain
//! - Graceful shutdown: cancel everything, then join every task

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tokio_util::sync::CancellationToken;
use crate::config::Config;
use crate::consumer::{ConsumeStrategy, Consumer};
use crate::error::Result;
use crate::participant::{ParticipantId, ParticipantReport, Role};
use crate::producer::{Producer, ValueSource};
use crate::queue::{QueueStats, SafeQueue};
use crate::sink::Sink;

/// How often `wait_for_drain` re-checks the queue
const DRAIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// What a finished session did
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub reports: Vec<ParticipantReport>,
    pub produced: u64,
    pub consumed: u64,
    pub left_in_queue: usize,
    pub stats: QueueStats,
}

/// Owner of a queue session
pub struct Coordinator<T> {
    queue: Arc<SafeQueue<T>>,
    cancel: CancellationToken,
    producers: Vec<Producer<T>>,
    consumers: Vec<Consumer<T>>,
}

impl<T> Coordinator<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        debug!("Coordinator::new: called");
        Self {
            queue: Arc::new(SafeQueue::new()),
            cancel: CancellationToken::new(),
            producers: Vec::new(),
            consumers: Vec::new(),
        }
    }

    /// Build a session from config; `source_for` gets each producer's index
    pub fn from_config(
        config: &Config,
        mut source_for: impl FnMut(usize) -> ValueSource<T>,
        produced: Option<Arc<dyn Sink<T>>>,
        consumed: Option<Arc<dyn Sink<T>>>,
    ) -> Result<Self> {
        debug!(?config, "Coordinator::from_config: called");
        config.validate()?;

        let mut coordinator = Self::new();
        for index in 0..config.producers {
            coordinator.add_producer(source_for(index), config.producer_interval(), produced.clone())?;
        }
        for _ in 0..config.consumers {
            coordinator.add_consumer(config.consumer_interval(), config.strategy, consumed.clone())?;
        }
        Ok(coordinator)
    }

    pub fn queue(&self) -> &Arc<SafeQueue<T>> {
        &self.queue
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn producers(&self) -> &[Producer<T>] {
        &self.producers
    }

    pub fn consumers(&self) -> &[Consumer<T>] {
        &self.consumers
    }

    pub fn add_producer(
        &mut self,
        source: ValueSource<T>,
        interval: Duration,
        sink: Option<Arc<dyn Sink<T>>>,
    ) -> Result<ParticipantId> {
        let mut builder = Producer::builder(self.queue.clone(), source)
            .interval(interval)
            .cancel_on(&self.cancel);
        if let Some(sink) = sink {
            builder = builder.shared_sink(sink);
        }

        let producer = builder.build()?;
        let id = producer.id();
        self.producers.push(producer);
        Ok(id)
    }

    pub fn add_consumer(
        &mut self,
        interval: Duration,
        strategy: ConsumeStrategy,
        sink: Option<Arc<dyn Sink<T>>>,
    ) -> Result<ParticipantId> {
        let mut builder = Consumer::builder(self.queue.clone())
            .interval(interval)
            .strategy(strategy)
            .cancel_on(&self.cancel);
        if let Some(sink) = sink {
            builder = builder.shared_sink(sink);
        }

        let consumer = builder.build()?;
        let id = consumer.id();
        self.consumers.push(consumer);
        Ok(id)
    }

    /// Start every participant not yet started; returns how many started
    pub fn start_all(&self) -> usize {
        let started = self.producers.iter().filter(|p| p.start()).count()
            + self.consumers.iter().filter(|c| c.start()).count();
        info!(
            started,
            producers = self.producers.len(),
            consumers = self.consumers.len(),
            "Session started"
        );
        started
    }

    /// Stop producing while consumers keep draining
    pub fn stop_producers(&self) {
        info!(count = self.producers.len(), "Stopping producers");
        for producer in &self.producers {
            producer.stop();
        }
    }

    /// Wait until the queue is empty; false if `timeout` elapses first
    ///
    /// Only meaningful once producers are stopped, otherwise the queue may
    /// never stay empty.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        debug!(?timeout, "Coordinator::wait_for_drain: called");
        let deadline = Instant::now() + timeout;

        while !self.queue.is_empty() {
            if Instant::now() >= deadline {
                warn!(left = self.queue.len(), "Drain timed out");
                return false;
            }
            tokio::time::sleep(DRAIN_CHECK_INTERVAL).await;
        }

        debug!("Coordinator::wait_for_drain: queue empty");
        true
    }

    /// Signal every participant at once
    pub fn cancel(&self) {
        info!("Cancelling session");
        self.cancel.cancel();
    }

    /// Cancel the session and join every task
    pub async fn shutdown(&self) -> SessionSummary {
        info!(
            producers = self.producers.len(),
            consumers = self.consumers.len(),
            "Shutting down session"
        );
        self.cancel();

        let mut reports: Vec<ParticipantReport> = join_all(self.producers.iter().map(|p| p.join()))
            .await
            .into_iter()
            .flatten()
            .collect();
        reports.extend(
            join_all(self.consumers.iter().map(|c| c.join()))
                .await
                .into_iter()
                .flatten(),
        );

        let total = |role: Role| -> u64 {
            reports
                .iter()
                .filter(|r| r.role == role)
                .map(|r| r.processed)
                .sum()
        };
        let summary = SessionSummary {
            produced: total(Role::Producer),
            consumed: total(Role::Consumer),
            left_in_queue: self.queue.len(),
            stats: self.queue.stats(),
            reports,
        };

        info!(
            produced = summary.produced,
            consumed = summary.consumed,
            left_in_queue = summary.left_in_queue,
            "Session shut down"
        );
        summary
    }
}

impl<T> Default for Coordinator<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
