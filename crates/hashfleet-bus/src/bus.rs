//! The message bus service.
//!
//! [`MessageBus`] is an explicitly constructed service, shared as
//! `Arc<MessageBus>` by every component that publishes or subscribes.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{BusError, Result};
use crate::message::{Command, Event, MessageKind};
use crate::path::{LogLevel, MessagePath, PathGroup, PathId, PathInfo, PathOptions};

type RouteKey = (MessageKind, TypeId);

/// Process-wide command and event router.
#[derive(Default)]
pub struct MessageBus {
    routes: RwLock<HashMap<RouteKey, Vec<Arc<MessagePath>>>>,
    next_path: AtomicU64,
    next_group: AtomicU64,
}

impl MessageBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register the single handler for command type `C`.
    ///
    /// A previously registered path that has been disabled through its group
    /// is replaced.
    ///
    /// # Errors
    ///
    /// Returns `BusError::DuplicateRegistration` if an enabled path already
    /// handles `C`, or `BusError::InvalidLimit` for `ViaTimesLimit(0)`.
    #[track_caller]
    pub fn register_command_path<C, F>(&self, options: PathOptions, handler: F) -> Result<PathId>
    where
        C: Command,
        F: Fn(&C) + Send + Sync + 'static,
    {
        let location = Location::caller();
        let path = self.build_path::<C, F>(MessageKind::Command, options, location, handler)?;
        let key = (MessageKind::Command, TypeId::of::<C>());

        let mut routes = self.routes.write();
        let slot = routes.entry(key).or_default();
        if slot.iter().any(|p| p.is_enabled()) {
            return Err(BusError::DuplicateRegistration {
                type_name: std::any::type_name::<C>(),
            });
        }
        slot.clear();
        let id = path.id;
        slot.push(Arc::new(path));
        drop(routes);

        tracing::debug!(
            path_id = %id,
            command = std::any::type_name::<C>(),
            location = %location,
            "Registered command path"
        );
        Ok(id)
    }

    /// Register an additional subscriber for event type `E`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::InvalidLimit` for `ViaTimesLimit(0)`.
    #[track_caller]
    pub fn register_event_path<E, F>(&self, options: PathOptions, handler: F) -> Result<PathId>
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let location = Location::caller();
        let path = self.build_path::<E, F>(MessageKind::Event, options, location, handler)?;
        let id = path.id;
        self.routes
            .write()
            .entry((MessageKind::Event, TypeId::of::<E>()))
            .or_default()
            .push(Arc::new(path));

        tracing::debug!(
            path_id = %id,
            event = std::any::type_name::<E>(),
            location = %location,
            "Registered event path"
        );
        Ok(id)
    }

    fn build_path<M, F>(
        &self,
        kind: MessageKind,
        options: PathOptions,
        location: &'static Location<'static>,
        handler: F,
    ) -> Result<MessagePath>
    where
        M: Send + Sync + 'static,
        F: Fn(&M) + Send + Sync + 'static,
    {
        if options.mode.limit() == Some(0) {
            return Err(BusError::InvalidLimit);
        }
        let id = PathId(self.next_path.fetch_add(1, Ordering::Relaxed) + 1);
        let erased = Box::new(move |message: &dyn Any| {
            if let Some(message) = message.downcast_ref::<M>() {
                handler(message);
            }
        });
        Ok(MessagePath::new(
            id,
            kind,
            std::any::type_name::<M>(),
            options,
            location,
            erased,
        ))
    }

    /// Remove a single path.
    ///
    /// # Errors
    ///
    /// Returns `BusError::PathNotFound` if no such path is registered.
    pub fn remove_path(&self, id: PathId) -> Result<()> {
        let mut routes = self.routes.write();
        for paths in routes.values_mut() {
            if let Some(pos) = paths.iter().position(|p| p.id == id) {
                paths.remove(pos);
                return Ok(());
            }
        }
        Err(BusError::PathNotFound(id))
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Allocate a new path group.
    #[must_use]
    pub fn new_group(&self) -> PathGroup {
        PathGroup(self.next_group.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Enable every path of a group. Returns how many paths were touched.
    pub fn enable_paths(&self, group: PathGroup) -> usize {
        self.set_group_enabled(group, true)
    }

    /// Disable every path of a group. Returns how many paths were touched.
    pub fn disable_paths(&self, group: PathGroup) -> usize {
        self.set_group_enabled(group, false)
    }

    /// Remove every path of a group. Returns how many paths were removed.
    pub fn remove_paths(&self, group: PathGroup) -> usize {
        let mut routes = self.routes.write();
        let mut removed = 0;
        for paths in routes.values_mut() {
            let before = paths.len();
            paths.retain(|p| p.group != Some(group));
            removed += before - paths.len();
        }
        removed
    }

    fn set_group_enabled(&self, group: PathGroup, enabled: bool) -> usize {
        let routes = self.routes.read();
        let mut touched = 0;
        for path in routes.values().flatten().filter(|p| p.group == Some(group)) {
            path.set_enabled(enabled);
            touched += 1;
        }
        tracing::debug!(group = %group, enabled, touched, "Toggled path group");
        touched
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Execute a command on its registered handler.
    ///
    /// Returns false, after logging a warning, when no enabled handler exists.
    pub fn execute<C: Command>(&self, command: &C) -> bool {
        let invoked = self.dispatch((MessageKind::Command, TypeId::of::<C>()), command);
        if invoked == 0 {
            tracing::warn!(
                command = std::any::type_name::<C>(),
                "No handler registered for command"
            );
        }
        invoked > 0
    }

    /// Raise an event to every enabled subscriber, in registration order.
    ///
    /// Returns the number of handlers invoked.
    pub fn raise_event<E: Event>(&self, event: &E) -> usize {
        self.dispatch((MessageKind::Event, TypeId::of::<E>()), event)
    }

    fn dispatch(&self, key: RouteKey, message: &dyn Any) -> usize {
        let snapshot: Vec<Arc<MessagePath>> = match self.routes.read().get(&key) {
            Some(paths) => paths.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for path in snapshot {
            if !path.is_enabled() {
                continue;
            }
            let Some(last) = path.try_claim() else {
                continue;
            };

            match path.log_level {
                LogLevel::None => {}
                LogLevel::Debug => tracing::debug!(
                    kind = path.kind.as_str(),
                    message = path.type_name,
                    path = %path.description,
                    "Dispatching"
                ),
                LogLevel::Info => tracing::info!(
                    kind = path.kind.as_str(),
                    message = path.type_name,
                    path = %path.description,
                    "Dispatching"
                ),
            }

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| path.invoke(message))) {
                tracing::error!(
                    message = path.type_name,
                    path = %path.description,
                    location = %path.location,
                    panic = %panic_message(payload.as_ref()),
                    "Message handler panicked"
                );
            }
            invoked += 1;

            if last {
                // Already unclaimable; removal only tidies the registry.
                let _ = self.remove_path(path.id);
            }
        }
        invoked
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of paths registered for message type `M`, of either kind.
    #[must_use]
    pub fn path_count<M: 'static>(&self) -> usize {
        let routes = self.routes.read();
        [MessageKind::Command, MessageKind::Event]
            .iter()
            .filter_map(|kind| routes.get(&(*kind, TypeId::of::<M>())))
            .map(Vec::len)
            .sum()
    }

    /// Snapshot of every registered path, ordered by ID.
    #[must_use]
    pub fn paths(&self) -> Vec<PathInfo> {
        let mut infos: Vec<PathInfo> = self
            .routes
            .read()
            .values()
            .flatten()
            .map(|p| p.info())
            .collect();
        infos.sort_by_key(|i| i.id);
        infos
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("paths", &self.routes.read().values().map(Vec::len).sum::<usize>())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathMode;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct Ping(u32);
    impl Command for Ping {}

    struct Tick;
    impl Event for Tick {}

    struct Other;
    impl Event for Other {}

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&c), c)
    }

    #[test]
    fn second_command_path_is_rejected() {
        let bus = MessageBus::new();
        bus.register_command_path::<Ping, _>(PathOptions::new("first"), |_| {})
            .unwrap();
        let result = bus.register_command_path::<Ping, _>(PathOptions::new("second"), |_| {});
        assert!(matches!(
            result,
            Err(BusError::DuplicateRegistration { .. })
        ));
    }

    #[test]
    fn command_path_can_be_registered_after_removal() {
        let bus = MessageBus::new();
        let id = bus
            .register_command_path::<Ping, _>(PathOptions::new("first"), |_| {})
            .unwrap();
        bus.remove_path(id).unwrap();
        assert!(bus
            .register_command_path::<Ping, _>(PathOptions::new("second"), |_| {})
            .is_ok());
    }

    #[test]
    fn disabled_command_path_is_replaced() {
        let bus = MessageBus::new();
        let group = bus.new_group();
        let (seen, c) = counter();
        bus.register_command_path::<Ping, _>(PathOptions::new("old").group(group), |_| {
            panic!("disabled path must not run");
        })
        .unwrap();
        bus.disable_paths(group);
        bus.register_command_path::<Ping, _>(PathOptions::new("new"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(bus.execute(&Ping(1)));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.path_count::<Ping>(), 1);
    }

    #[test]
    fn execute_without_handler_returns_false() {
        let bus = MessageBus::new();
        assert!(!bus.execute(&Ping(7)));
    }

    #[test]
    fn execute_passes_the_command() {
        let bus = MessageBus::new();
        let got = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&got);
        bus.register_command_path::<Ping, _>(PathOptions::new("store"), move |p| {
            *sink.lock() = p.0;
        })
        .unwrap();
        bus.execute(&Ping(42));
        assert_eq!(*got.lock(), 42);
    }

    #[test]
    fn events_fan_out_in_registration_order() {
        let bus = MessageBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = Arc::clone(&order);
            bus.register_event_path::<Tick, _>(PathOptions::new(format!("h{i}")), move |_| {
                order.lock().push(i);
            })
            .unwrap();
        }
        assert_eq!(bus.raise_event(&Tick), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn events_only_reach_their_own_type() {
        let bus = MessageBus::new();
        let (seen, c) = counter();
        bus.register_event_path::<Tick, _>(PathOptions::new("tick"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(bus.raise_event(&Other), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn once_fires_exactly_once() {
        let bus = MessageBus::new();
        let (seen, c) = counter();
        bus.register_event_path::<Tick, _>(PathOptions::new("once").mode(PathMode::Once), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        for _ in 0..10 {
            bus.raise_event(&Tick);
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.path_count::<Tick>(), 0);
    }

    #[test]
    fn via_times_limit_fires_n_times() {
        let bus = MessageBus::new();
        let (seen, c) = counter();
        bus.register_event_path::<Tick, _>(
            PathOptions::new("limited").mode(PathMode::ViaTimesLimit(3)),
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        for _ in 0..10 {
            bus.raise_event(&Tick);
        }
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(bus.path_count::<Tick>(), 0);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let bus = MessageBus::new();
        let result = bus.register_event_path::<Tick, _>(
            PathOptions::new("never").mode(PathMode::ViaTimesLimit(0)),
            |_| {},
        );
        assert_eq!(result, Err(BusError::InvalidLimit));
    }

    #[test]
    fn once_is_exact_under_concurrent_raises() {
        let bus = Arc::new(MessageBus::new());
        let (seen, c) = counter();
        bus.register_event_path::<Tick, _>(PathOptions::new("once").mode(PathMode::Once), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        bus.raise_event(&Tick);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_stop_delivery() {
        let bus = MessageBus::new();
        let (seen, c) = counter();
        bus.register_event_path::<Tick, _>(PathOptions::new("boom"), |_| panic!("boom"))
            .unwrap();
        bus.register_event_path::<Tick, _>(PathOptions::new("after"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(bus.raise_event(&Tick), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_remove_itself_mid_dispatch() {
        let bus = Arc::new(MessageBus::new());
        let (seen, c) = counter();
        let id_slot: Arc<Mutex<Option<PathId>>> = Arc::new(Mutex::new(None));

        let inner_bus = Arc::clone(&bus);
        let inner_slot = Arc::clone(&id_slot);
        let id = bus
            .register_event_path::<Tick, _>(PathOptions::new("self-removing"), move |_| {
                if let Some(id) = *inner_slot.lock() {
                    let _ = inner_bus.remove_path(id);
                }
            })
            .unwrap();
        *id_slot.lock() = Some(id);
        bus.register_event_path::<Tick, _>(PathOptions::new("survivor"), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(bus.raise_event(&Tick), 2);
        assert_eq!(bus.raise_event(&Tick), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn group_toggle_is_reversible() {
        let bus = MessageBus::new();
        let group = bus.new_group();
        let (seen, c) = counter();
        bus.register_event_path::<Tick, _>(PathOptions::new("grouped").group(group), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(bus.disable_paths(group), 1);
        bus.raise_event(&Tick);
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        assert_eq!(bus.enable_paths(group), 1);
        bus.raise_event(&Tick);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        assert_eq!(bus.remove_paths(group), 1);
        assert_eq!(bus.path_count::<Tick>(), 0);
    }

    #[test]
    fn paths_reports_declaration_site() {
        let bus = MessageBus::new();
        bus.register_event_path::<Tick, _>(PathOptions::new("where"), |_| {})
            .unwrap();
        let infos = bus.paths();
        assert_eq!(infos.len(), 1);
        assert!(infos[0].location.contains("bus.rs"));
        assert_eq!(infos[0].description, "where");
        assert_eq!(infos[0].kind, MessageKind::Event);
    }
}
