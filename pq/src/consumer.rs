//! Consumer - takes values off the queue and hands them to a sink
//!
//! Two strategies share one contract (FIFO, nothing lost or duplicated):
//!
//! - [`ConsumeStrategy::Poll`]: `try_dequeue`, then sleep one interval. An
//!   empty queue costs one idle interval.
//! - [`ConsumeStrategy::Block`]: wait on the queue's notifier, raced against
//!   cancellation. The interval is not used.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DEFAULT_INTERVAL;
use tokio_util::sync::CancellationToken;
use crate::error::{Error, Result};
use crate::participant::{Lifecycle, ParticipantId, ParticipantReport, ParticipantState, Role};
use crate::queue::SafeQueue;
use crate::sink::{Sink, deliver_isolated};

/// How a consumer waits for work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumeStrategy {
    #[default]
    Poll,
    Block,
}

impl std::fmt::Display for ConsumeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumeStrategy::Poll => write!(f, "poll"),
            ConsumeStrategy::Block => write!(f, "block"),
        }
    }
}

impl std::str::FromStr for ConsumeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "block" => Ok(Self::Block),
            _ => Err(format!("Unknown strategy: {}. Use: poll or block", s)),
        }
    }
}

/// Builder for [`Consumer`]; polls once a second unless told otherwise
pub struct ConsumerBuilder<T> {
    queue: Arc<SafeQueue<T>>,
    interval: Duration,
    strategy: ConsumeStrategy,
    sink: Option<Arc<dyn Sink<T>>>,
    cancel: Option<CancellationToken>,
}

impl<T> ConsumerBuilder<T>
where
    T: Send + 'static,
{
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn strategy(mut self, strategy: ConsumeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Called with (consumer id, value) for each dequeued value
    pub fn sink(mut self, sink: impl Sink<T> + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn shared_sink(mut self, sink: Arc<dyn Sink<T>>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn cancel_on(mut self, token: &CancellationToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    pub fn build(self) -> Result<Consumer<T>> {
        if self.interval.is_zero() {
            return Err(Error::InvalidInterval { role: Role::Consumer });
        }

        let lifecycle = Lifecycle::new(Role::Consumer, self.cancel.as_ref());
        debug!(
            id = %lifecycle.id(),
            interval = ?self.interval,
            strategy = %self.strategy,
            "ConsumerBuilder::build: built"
        );

        Ok(Consumer {
            queue: self.queue,
            interval: self.interval,
            strategy: self.strategy,
            sink: self.sink,
            lifecycle,
        })
    }
}

/// Background task that drains a [`SafeQueue`]
pub struct Consumer<T> {
    queue: Arc<SafeQueue<T>>,
    interval: Duration,
    strategy: ConsumeStrategy,
    sink: Option<Arc<dyn Sink<T>>>,
    lifecycle: Lifecycle,
}

impl<T> Consumer<T>
where
    T: Send + 'static,
{
    pub fn builder(queue: Arc<SafeQueue<T>>) -> ConsumerBuilder<T> {
        ConsumerBuilder {
            queue,
            interval: DEFAULT_INTERVAL,
            strategy: ConsumeStrategy::default(),
            sink: None,
            cancel: None,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.lifecycle.id()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn strategy(&self) -> ConsumeStrategy {
        self.strategy
    }

    pub fn state(&self) -> ParticipantState {
        self.lifecycle.state()
    }

    /// Spawn the consuming task; false if already started or stopped
    pub fn start(&self) -> bool {
        self.lifecycle.launch(|token| {
            let worker = Worker {
                id: self.id(),
                queue: self.queue.clone(),
                sink: self.sink.clone(),
                token,
                consumed: 0,
            };
            let (strategy, interval) = (self.strategy, self.interval);
            async move {
                match strategy {
                    ConsumeStrategy::Poll => worker.poll(interval).await,
                    ConsumeStrategy::Block => worker.block().await,
                }
            }
        })
    }

    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    pub async fn join(&self) -> Option<ParticipantReport> {
        self.lifecycle.join().await
    }
}

struct Worker<T> {
    id: ParticipantId,
    queue: Arc<SafeQueue<T>>,
    sink: Option<Arc<dyn Sink<T>>>,
    token: CancellationToken,
    consumed: u64,
}

impl<T: Send + 'static> Worker<T> {
    fn accept(&mut self, value: T) {
        self.consumed += 1;
        if let Some(sink) = &self.sink {
            deliver_isolated(sink.as_ref(), &self.id, Role::Consumer, &value);
        }
    }

    async fn poll(mut self, interval: Duration) -> ParticipantReport {
        while !self.token.is_cancelled() {
            if let Some(value) = self.queue.try_dequeue() {
                self.accept(value);
            }

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        self.finish()
    }

    async fn block(mut self) -> ParticipantReport {
        loop {
            // Cancellation wins ties so nothing is dequeued once it is observed
            let value = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                value = self.queue.dequeue() => value,
            };
            self.accept(value);
        }
        self.finish()
    }

    fn finish(self) -> ParticipantReport {
        debug!(id = %self.id, consumed = self.consumed, "Worker::finish: loop exited");
        ParticipantReport {
            id: self.id,
            role: Role::Consumer,
            processed: self.consumed,
        }
    }
}
