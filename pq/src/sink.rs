//! Sinks receive each produced or consumed value
//!
//! A sink runs inline on the participant's task, so it should return quickly.
//! Failures never end the loop: an `Err` is logged at warn, a panic at error.

use std::any::Any;
use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};

use eyre::Result;
use tracing::{error, info, warn};

use crate::participant::{ParticipantId, Role};

/// Receives (participant id, value) after each enqueue or dequeue
pub trait Sink<T>: Send + Sync {
    fn deliver(&self, id: &ParticipantId, value: &T) -> Result<()>;
}

impl<T, F> Sink<T> for F
where
    F: Fn(&ParticipantId, &T) -> Result<()> + Send + Sync,
{
    fn deliver(&self, id: &ParticipantId, value: &T) -> Result<()> {
        self(id, value)
    }
}

/// Logs every value at info level
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    action: &'static str,
}

impl LogSink {
    pub fn produced() -> Self {
        Self { action: "produced" }
    }

    pub fn consumed() -> Self {
        Self { action: "consumed" }
    }
}

impl<T: Debug> Sink<T> for LogSink {
    fn deliver(&self, id: &ParticipantId, value: &T) -> Result<()> {
        info!(id = %id.short(), ?value, "{} value", self.action);
        Ok(())
    }
}

/// Run a sink, containing errors and panics; true if it succeeded
pub(crate) fn deliver_isolated<T>(sink: &dyn Sink<T>, id: &ParticipantId, role: Role, value: &T) -> bool {
    match catch_unwind(AssertUnwindSafe(|| sink.deliver(id, value))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(%id, %role, error = %e, "Sink returned an error, continuing");
            false
        }
        Err(payload) => {
            error!(%id, %role, panic = %panic_message(payload.as_ref()), "Sink panicked, continuing");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_is_a_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_sink = seen.clone();
        let sink = move |_: &ParticipantId, v: &u32| -> Result<()> {
            seen_by_sink.lock().unwrap().push(*v);
            Ok(())
        };

        let id = ParticipantId::new();
        assert!(deliver_isolated(&sink, &id, Role::Consumer, &5u32));
        assert!(deliver_isolated(&sink, &id, Role::Consumer, &6u32));
        assert_eq!(*seen.lock().unwrap(), vec![5, 6]);
    }

    #[test]
    fn test_sink_error_is_contained() {
        let sink = |_: &ParticipantId, _: &u32| -> Result<()> { Err(eyre::eyre!("disk full")) };
        assert!(!deliver_isolated(&sink, &ParticipantId::new(), Role::Producer, &1u32));
    }

    #[test]
    fn test_sink_panic_is_contained() {
        let sink = |_: &ParticipantId, _: &u32| -> Result<()> { panic!("boom") };
        assert!(!deliver_isolated(&sink, &ParticipantId::new(), Role::Consumer, &1u32));
    }

    #[test]
    fn test_log_sink_accepts_debug_values() {
        let id = ParticipantId::new();
        assert!(deliver_isolated(&LogSink::produced(), &id, Role::Producer, &"hello"));
        assert!(deliver_isolated(&LogSink::consumed(), &id, Role::Consumer, &vec![1, 2]));
    }

    #[test]
    fn test_panic_message_extraction() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
