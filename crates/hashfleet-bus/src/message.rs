//! Message marker traits.
//!
//! A type becomes routable by implementing [`Command`] or [`Event`]. The bus
//! keys its registry by the concrete type, so there is no runtime matching on
//! names.

/// A request for exactly one handler to do something.
pub trait Command: Send + Sync + 'static {}

/// A notification that something happened, delivered to every subscriber.
pub trait Event: Send + Sync + 'static {}

/// Whether a path handles commands or events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// 1:1 command dispatch.
    Command,
    /// 1:N event fan-out.
    Event,
}

impl MessageKind {
    /// Returns the lowercase name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Event => "event",
        }
    }
}
