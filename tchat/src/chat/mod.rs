//! Chat pipeline: the dispatch channel and its single consumer.
//!
//! Both producers (the [`send`] path echoing local messages and the
//! [`SyncEngine`](crate::sync::SyncEngine) forwarding peer messages) push
//! [`DispatchUnit`]s into one FIFO channel. A single consumer formats each
//! unit and hands it to a [`DisplaySink`]. Units reach the sink in exactly
//! the order they were enqueued; nothing is reordered or resequenced.

pub mod format;
pub mod send;

use std::fmt;

use tchat_proto::message::{Message, SYSTEM_SERVICE_ID};
use tokio::sync::mpsc;

/// Producer half of the dispatch channel.
pub type DispatchSender = mpsc::UnboundedSender<DispatchUnit>;

/// Consumer half of the dispatch channel.
pub type DispatchReceiver = mpsc::UnboundedReceiver<DispatchUnit>;

/// Create the dispatch channel shared by all producers and the consumer.
#[must_use]
pub fn dispatch_channel() -> (DispatchSender, DispatchReceiver) {
    mpsc::unbounded_channel()
}

/// A value placed on the dispatch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchUnit {
    /// A chat message (peer-received or locally echoed).
    Chat(Message),
    /// An infrastructure notice, shown under [`SYSTEM_SERVICE_ID`].
    System(String),
}

impl DispatchUnit {
    /// Build a system notice from any displayable error.
    pub fn system(err: impl fmt::Display) -> Self {
        Self::System(err.to_string())
    }

    /// The author id the unit is displayed under.
    #[must_use]
    pub fn author(&self) -> &str {
        match self {
            Self::Chat(msg) => &msg.service_id,
            Self::System(_) => SYSTEM_SERVICE_ID,
        }
    }

    /// The unformatted body.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Chat(msg) => &msg.content,
            Self::System(text) => text,
        }
    }

    /// Returns `true` for infrastructure notices.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }
}

/// Receives formatted, attributed lines in arrival order.
///
/// Implementors own all display state; only the dispatch consumer calls
/// into a sink.
pub trait DisplaySink {
    /// Append one line. `body` has already been passed through
    /// [`format::wrap`].
    fn push_line(&mut self, author: &str, body: &str);
}

/// Format one unit and deliver it to `sink`.
pub fn deliver<D: DisplaySink + ?Sized>(unit: &DispatchUnit, sink: &mut D) {
    let body = format::wrap(unit.content());
    sink.push_line(unit.author(), &body);
}

/// Deliver every unit currently queued, without waiting.
///
/// Returns the number of units delivered. Meant to be called once per UI
/// tick by the task that owns the display.
pub fn drain<D: DisplaySink + ?Sized>(rx: &mut DispatchReceiver, sink: &mut D) -> usize {
    let mut delivered = 0;
    while let Ok(unit) = rx.try_recv() {
        deliver(&unit, sink);
        delivered += 1;
    }
    delivered
}

/// Deliver units until every producer has been dropped.
///
/// This is the dedicated-task form of the consumer.
pub async fn consume<D: DisplaySink + ?Sized>(mut rx: DispatchReceiver, sink: &mut D) -> usize {
    let mut delivered = 0;
    while let Some(unit) = rx.recv().await {
        deliver(&unit, sink);
        delivered += 1;
    }
    tracing::debug!(delivered, "dispatch channel closed");
    delivered
}
