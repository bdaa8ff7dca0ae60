//! pcqueue - lock-guarded FIFO queue shared by polling producer and consumer tasks
//!
//! Producers push values into a [`SafeQueue`] every interval, consumers pull
//! them off and hand them to a [`Sink`], and a [`CancellationToken`] stops everyone.
//! A [`Coordinator`] owns one such session.
//!
//! # Architecture
//!
//! ```text
//! Producer ─┐                          ┌─ Consumer ─▶ Sink
//! Producer ─┼─▶ SafeQueue (one Mutex) ─┼─ Consumer ─▶ Sink
//! Producer ─┘                          └─ ...
//!                ▲
//!   Coordinator ─┴─ CancellationToken (root) ─▶ child token per participant
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pcqueue::{ConsumeStrategy, Coordinator, ValueSource};
//!
//! let mut session = Coordinator::new();
//! session.add_producer(ValueSource::counter(0), Duration::from_millis(500), None)?;
//! session.add_consumer(Duration::from_secs(1), ConsumeStrategy::Poll, None)?;
//! session.start_all();
//! // ...
//! session.stop_producers();
//! session.wait_for_drain(Duration::from_secs(10)).await;
//! let summary = session.shutdown().await;
//! ```

pub mod cli;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod error;
pub mod participant;
pub mod producer;
pub mod queue;
pub mod sink;

use std::time::Duration;

pub use config::Config;
pub use consumer::{ConsumeStrategy, Consumer, ConsumerBuilder};
pub use coordinator::{Coordinator, SessionSummary};
pub use error::{Error, Result};
pub use participant::{ParticipantId, ParticipantReport, ParticipantState, Role};
pub use producer::{Producer, ProducerBuilder, ValueSource};
pub use queue::{QueueStats, SafeQueue};
pub use sink::{LogSink, Sink};
pub use tokio_util::sync::CancellationToken;

/// Default polling interval for producers and consumers (1s)
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
