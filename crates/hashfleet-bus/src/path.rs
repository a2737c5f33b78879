//! Message path definitions.
//!
//! A path binds one message type to one handler, together with the metadata
//! the bus needs for diagnostics and for `Once`/`ViaTimesLimit` accounting.

use std::any::Any;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::message::MessageKind;

/// Unique identifier of a registered path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId(pub(crate) u64);

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path-{}", self.0)
    }
}

/// A set of paths created together and toggled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathGroup(pub(crate) u64);

impl fmt::Display for PathGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// How chatty the bus is when it dispatches to this path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// No dispatch log line.
    None,
    /// Dispatch logged at debug level.
    #[default]
    Debug,
    /// Dispatch logged at info level.
    Info,
}

/// Dispatch mode of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMode {
    /// Fires on every message.
    #[default]
    Normal,
    /// Fires once, then the path is removed.
    Once,
    /// Fires `n` times, then the path is removed.
    ViaTimesLimit(u32),
}

impl PathMode {
    /// Number of dispatches allowed, or `None` when unlimited.
    #[must_use]
    pub const fn limit(&self) -> Option<u32> {
        match self {
            Self::Normal => None,
            Self::Once => Some(1),
            Self::ViaTimesLimit(n) => Some(*n),
        }
    }
}

/// Registration options for a path.
///
/// ```
/// use hashfleet_bus::{LogLevel, PathMode, PathOptions};
///
/// let opts = PathOptions::new("refresh gpu state")
///     .log_level(LogLevel::None)
///     .mode(PathMode::ViaTimesLimit(3));
/// assert_eq!(opts.mode_value(), PathMode::ViaTimesLimit(3));
/// ```
#[derive(Debug, Clone)]
pub struct PathOptions {
    pub(crate) description: String,
    pub(crate) log_level: LogLevel,
    pub(crate) mode: PathMode,
    pub(crate) group: Option<PathGroup>,
}

impl PathOptions {
    /// Options with the given description, debug logging and `Normal` mode.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            log_level: LogLevel::default(),
            mode: PathMode::default(),
            group: None,
        }
    }

    /// Set the dispatch log level.
    #[must_use]
    pub const fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the dispatch mode.
    #[must_use]
    pub const fn mode(mut self, mode: PathMode) -> Self {
        self.mode = mode;
        self
    }

    /// Record the path in a group.
    #[must_use]
    pub const fn group(mut self, group: PathGroup) -> Self {
        self.group = Some(group);
        self
    }

    /// The configured dispatch mode.
    #[must_use]
    pub const fn mode_value(&self) -> PathMode {
        self.mode
    }
}

pub(crate) type ErasedHandler = Box<dyn Fn(&dyn Any) + Send + Sync>;

/// A registered subscription.
pub(crate) struct MessagePath {
    pub(crate) id: PathId,
    pub(crate) kind: MessageKind,
    pub(crate) type_name: &'static str,
    pub(crate) description: String,
    pub(crate) log_level: LogLevel,
    pub(crate) location: &'static Location<'static>,
    pub(crate) group: Option<PathGroup>,
    pub(crate) mode: PathMode,
    enabled: AtomicBool,
    remaining: AtomicU32,
    handler: ErasedHandler,
}

impl MessagePath {
    pub(crate) fn new(
        id: PathId,
        kind: MessageKind,
        type_name: &'static str,
        options: PathOptions,
        location: &'static Location<'static>,
        handler: ErasedHandler,
    ) -> Self {
        Self {
            id,
            kind,
            type_name,
            description: options.description,
            log_level: options.log_level,
            location,
            group: options.group,
            mode: options.mode,
            enabled: AtomicBool::new(true),
            remaining: AtomicU32::new(options.mode.limit().unwrap_or(0)),
            handler,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Claims one dispatch slot.
    ///
    /// Returns `None` when the path is exhausted, otherwise whether this claim
    /// took the last slot.
    pub(crate) fn try_claim(&self) -> Option<bool> {
        if self.mode.limit().is_none() {
            return Some(false);
        }
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|previous| previous == 1)
    }

    pub(crate) fn invoke(&self, message: &dyn Any) {
        (self.handler)(message);
    }

    pub(crate) fn info(&self) -> PathInfo {
        PathInfo {
            id: self.id,
            kind: self.kind,
            type_name: self.type_name,
            description: self.description.clone(),
            log_level: self.log_level,
            mode: self.mode,
            group: self.group,
            enabled: self.is_enabled(),
            remaining: self
                .mode
                .limit()
                .map(|_| self.remaining.load(Ordering::Acquire)),
            location: format!("{}:{}", self.location.file(), self.location.line()),
        }
    }
}

/// Read-only snapshot of a path, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    /// Path identifier.
    pub id: PathId,
    /// Command or event.
    pub kind: MessageKind,
    /// Rust type name of the message.
    pub type_name: &'static str,
    /// Human-readable description.
    pub description: String,
    /// Dispatch log level.
    pub log_level: LogLevel,
    /// Dispatch mode.
    pub mode: PathMode,
    /// Owning group, if any.
    pub group: Option<PathGroup>,
    /// Whether the path currently receives messages.
    pub enabled: bool,
    /// Remaining dispatches for limited paths.
    pub remaining: Option<u32>,
    /// Declaration site as `file:line`.
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(mode: PathMode) -> MessagePath {
        MessagePath::new(
            PathId(1),
            MessageKind::Event,
            "Test",
            PathOptions::new("test").mode(mode),
            Location::caller(),
            Box::new(|_| {}),
        )
    }

    #[test]
    fn normal_path_never_exhausts() {
        let p = path(PathMode::Normal);
        for _ in 0..100 {
            assert_eq!(p.try_claim(), Some(false));
        }
    }

    #[test]
    fn once_claims_a_single_last_slot() {
        let p = path(PathMode::Once);
        assert_eq!(p.try_claim(), Some(true));
        assert_eq!(p.try_claim(), None);
    }

    #[test]
    fn limit_counts_down() {
        let p = path(PathMode::ViaTimesLimit(3));
        assert_eq!(p.try_claim(), Some(false));
        assert_eq!(p.try_claim(), Some(false));
        assert_eq!(p.try_claim(), Some(true));
        assert_eq!(p.try_claim(), None);
        assert_eq!(p.info().remaining, Some(0));
    }
}
