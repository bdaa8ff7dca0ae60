//! Producer - enqueues a value every interval until cancelled

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::DEFAULT_INTERVAL;
use tokio_util::sync::CancellationToken;
use crate::error::{Error, Result};
use crate::participant::{Lifecycle, ParticipantId, ParticipantReport, ParticipantState, Role};
use crate::queue::SafeQueue;
use crate::sink::{Sink, deliver_isolated};

/// Where a producer's values come from
pub enum ValueSource<T> {
    /// The same value every time
    Fixed(T),
    /// A fresh value per call
    Generator(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T> ValueSource<T> {
    pub fn from_fn(f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::Generator(Arc::new(f))
    }
}

impl<T: Clone> ValueSource<T> {
    fn next_value(&self) -> T {
        match self {
            ValueSource::Fixed(value) => value.clone(),
            ValueSource::Generator(generate) => generate(),
        }
    }
}

impl ValueSource<u64> {
    /// start, start + 1, start + 2, ...
    pub fn counter(start: u64) -> Self {
        let next = Arc::new(AtomicU64::new(start));
        Self::from_fn(move || next.fetch_add(1, Ordering::Relaxed))
    }
}

impl<T: Clone> Clone for ValueSource<T> {
    fn clone(&self) -> Self {
        match self {
            ValueSource::Fixed(value) => ValueSource::Fixed(value.clone()),
            ValueSource::Generator(generate) => ValueSource::Generator(generate.clone()),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ValueSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            ValueSource::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// Builder for [`Producer`]; the interval defaults to one second
pub struct ProducerBuilder<T> {
    queue: Arc<SafeQueue<T>>,
    source: ValueSource<T>,
    interval: Duration,
    sink: Option<Arc<dyn Sink<T>>>,
    cancel: Option<CancellationToken>,
}

impl<T> ProducerBuilder<T>
where
    T: Clone + Send + 'static,
{
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Called with (producer id, value) after each enqueue
    pub fn sink(mut self, sink: impl Sink<T> + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn shared_sink(mut self, sink: Arc<dyn Sink<T>>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Session-wide signal; the producer also stops when it fires
    pub fn cancel_on(mut self, token: &CancellationToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    pub fn build(self) -> Result<Producer<T>> {
        if self.interval.is_zero() {
            return Err(Error::InvalidInterval { role: Role::Producer });
        }

        let lifecycle = Lifecycle::new(Role::Producer, self.cancel.as_ref());
        debug!(id = %lifecycle.id(), interval = ?self.interval, "ProducerBuilder::build: built");

        Ok(Producer {
            queue: self.queue,
            source: self.source,
            interval: self.interval,
            sink: self.sink,
            lifecycle,
        })
    }
}

/// Background task that feeds a [`SafeQueue`]
pub struct Producer<T> {
    queue: Arc<SafeQueue<T>>,
    source: ValueSource<T>,
    interval: Duration,
    sink: Option<Arc<dyn Sink<T>>>,
    lifecycle: Lifecycle,
}

impl<T> Producer<T>
where
    T: Clone + Send + 'static,
{
    pub fn builder(queue: Arc<SafeQueue<T>>, source: ValueSource<T>) -> ProducerBuilder<T> {
        ProducerBuilder {
            queue,
            source,
            interval: DEFAULT_INTERVAL,
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

    pub fn state(&self) -> ParticipantState {
        self.lifecycle.state()
    }

    /// Spawn the producing task; false if already started or stopped
    pub fn start(&self) -> bool {
        self.lifecycle.launch(|token| {
            produce(
                self.id(),
                self.queue.clone(),
                self.source.clone(),
                self.sink.clone(),
                self.interval,
                token,
            )
        })
    }

    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    pub async fn join(&self) -> Option<ParticipantReport> {
        self.lifecycle.join().await
    }
}

async fn produce<T>(
    id: ParticipantId,
    queue: Arc<SafeQueue<T>>,
    source: ValueSource<T>,
    sink: Option<Arc<dyn Sink<T>>>,
    interval: Duration,
    token: CancellationToken,
) -> ParticipantReport
where
    T: Clone + Send + 'static,
{
    let mut produced = 0u64;

    while !token.is_cancelled() {
        let value = source.next_value();
        match &sink {
            Some(sink) => {
                queue.enqueue(value.clone());
                deliver_isolated(sink.as_ref(), &id, Role::Producer, &value);
            }
            None => queue.enqueue(value),
        }
        produced += 1;

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!(%id, produced, "produce: loop exited");
    ParticipantReport {
        id,
        role: Role::Producer,
        processed: produced,
    }
}
