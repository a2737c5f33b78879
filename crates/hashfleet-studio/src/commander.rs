//! Fleet commands issued from the studio.
//!
//! Per-node commands fan out concurrently, one request per selected client.
//! Every run ends with a [`FleetCommandCompletedEvent`] whatever the result.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use hashfleet_bus::MessageBus;
use hashfleet_core::{ClientId, LocalIpsRequest, UpgradeRequest, VirtualMemoryRequest, WorkId};

use crate::client::FleetClient;
use crate::error::StudioError;
use crate::events::{CommandOutcome, FleetCommandCompletedEvent};

/// A command the studio can send to selected nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetCommand {
    /// Start mining, optionally under a work.
    StartMine {
        /// Work to mine, `None` for the node's own profile.
        work_id: Option<WorkId>,
    },
    /// Stop mining.
    StopMine,
    /// Upgrade the node software.
    Upgrade(UpgradeRequest),
    /// Resize paging files.
    SetVirtualMemory(VirtualMemoryRequest),
    /// Reconfigure network adapters.
    SetLocalIps(LocalIpsRequest),
    /// Switch Radeon cards between compute and graphics mode.
    SwitchRadeonGpu {
        /// True for compute mode.
        compute_mode: bool,
    },
    /// Remove the records from the fleet server.
    Remove,
    /// Set one record property on every target.
    UpdateProperty {
        /// Property name.
        property: String,
        /// New value.
        value: serde_json::Value,
    },
}

impl FleetCommand {
    /// Short name used in logs and events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartMine { .. } => "start_mine",
            Self::StopMine => "stop_mine",
            Self::Upgrade(_) => "upgrade",
            Self::SetVirtualMemory(_) => "set_virtual_memory",
            Self::SetLocalIps(_) => "set_local_ips",
            Self::SwitchRadeonGpu { .. } => "switch_radeon_gpu",
            Self::Remove => "remove_clients",
            Self::UpdateProperty { .. } => "update_property",
        }
    }
}

/// Runs [`FleetCommand`]s through a [`FleetClient`].
pub struct Commander {
    client: Arc<dyn FleetClient>,
    bus: Arc<MessageBus>,
}

impl Commander {
    /// Create a commander.
    #[must_use]
    pub fn new(client: Arc<dyn FleetClient>, bus: Arc<MessageBus>) -> Self {
        Self { client, bus }
    }

    /// Run `command` against `client_ids` and raise the completion event.
    pub async fn run(&self, command: FleetCommand, client_ids: Vec<ClientId>) -> CommandOutcome {
        let name = command.name();
        let outcome = if client_ids.is_empty() {
            CommandOutcome::Failed("no client selected".into())
        } else {
            self.dispatch(&command, &client_ids).await
        };

        match &outcome {
            CommandOutcome::Ok => {
                tracing::info!(command = name, clients = client_ids.len(), "Fleet command done");
            }
            CommandOutcome::Failed(message) => {
                tracing::warn!(command = name, clients = client_ids.len(), error = %message, "Fleet command failed");
            }
        }
        self.bus.raise_event(&FleetCommandCompletedEvent {
            command: name,
            client_ids,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn dispatch(&self, command: &FleetCommand, client_ids: &[ClientId]) -> CommandOutcome {
        match command {
            FleetCommand::Remove => single(self.client.remove_clients(client_ids).await),
            FleetCommand::UpdateProperty { property, value } => {
                if let [id] = client_ids {
                    single(self.client.update_client(*id, property, value.clone()).await)
                } else {
                    let values: HashMap<ClientId, serde_json::Value> =
                        client_ids.iter().map(|id| (*id, value.clone())).collect();
                    single(self.client.update_clients(property, values).await)
                }
            }
            per_node => {
                let results = join_all(
                    client_ids
                        .iter()
                        .map(|id| async move { (*id, self.send(per_node, *id).await) }),
                )
                .await;
                aggregate(&results)
            }
        }
    }

    async fn send(&self, command: &FleetCommand, client_id: ClientId) -> crate::Result<()> {
        match command {
            FleetCommand::StartMine { work_id } => self.client.start_mine(client_id, *work_id).await,
            FleetCommand::StopMine => self.client.stop_mine(client_id).await,
            FleetCommand::Upgrade(request) => self.client.upgrade(client_id, request).await,
            FleetCommand::SetVirtualMemory(request) => {
                self.client.set_virtual_memory(client_id, request).await
            }
            FleetCommand::SetLocalIps(request) => self.client.set_local_ips(client_id, request).await,
            FleetCommand::SwitchRadeonGpu { compute_mode } => {
                self.client.switch_radeon_gpu(client_id, *compute_mode).await
            }
            FleetCommand::Remove | FleetCommand::UpdateProperty { .. } => Err(
                StudioError::Internal(format!("{} is not a per-node command", command.name())),
            ),
        }
    }
}

impl std::fmt::Debug for Commander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commander").finish_non_exhaustive()
    }
}

fn single(result: crate::Result<()>) -> CommandOutcome {
    match result {
        Ok(()) => CommandOutcome::Ok,
        Err(e) => CommandOutcome::Failed(e.to_string()),
    }
}

fn aggregate(results: &[(ClientId, crate::Result<()>)]) -> CommandOutcome {
    let failures: Vec<String> = results
        .iter()
        .filter_map(|(id, r)| r.as_ref().err().map(|e| format!("{id}: {e}")))
        .collect();
    match failures.as_slice() {
        [] => CommandOutcome::Ok,
        [only] if results.len() == 1 => CommandOutcome::Failed(only.clone()),
        [first, ..] => CommandOutcome::Failed(format!(
            "{} of {} failed: {first}",
            failures.len(),
            results.len()
        )),
    }
}

#[cfg(test)]
mod tests {
    use hashfleet_bus::PathOptions;
    use parking_lot::Mutex;

    use super::*;
    use crate::mock::MockFleetClient;

    fn setup() -> (Arc<MockFleetClient>, Arc<MessageBus>, Commander) {
        let client = Arc::new(MockFleetClient::new());
        let bus = Arc::new(MessageBus::new());
        let commander = Commander::new(client.clone(), Arc::clone(&bus));
        (client, bus, commander)
    }

    #[tokio::test]
    async fn fans_out_to_every_client() {
        let (client, _bus, commander) = setup();
        let ids = vec![ClientId::generate(), ClientId::generate(), ClientId::generate()];

        let outcome = commander.run(FleetCommand::StopMine, ids.clone()).await;

        assert!(outcome.is_ok());
        let mut called: Vec<ClientId> = client.calls().into_iter().map(|(_, id)| id).collect();
        let mut expected = ids;
        called.sort();
        expected.sort();
        assert_eq!(called, expected);
    }

    #[tokio::test]
    async fn partial_failure_is_reported() {
        let (client, _bus, commander) = setup();
        let ids = vec![ClientId::generate(), ClientId::generate(), ClientId::generate()];
        client.set_offline(ids[1]);

        let outcome = commander
            .run(FleetCommand::StartMine { work_id: None }, ids.clone())
            .await;

        match outcome {
            CommandOutcome::Failed(message) => {
                assert!(message.starts_with("1 of 3 failed"), "{message}");
                assert!(message.contains(&ids[1].to_string()));
            }
            CommandOutcome::Ok => panic!("expected failure"),
        }
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn empty_selection_fails_without_calls() {
        let (client, bus, commander) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.register_event_path::<FleetCommandCompletedEvent, _>(PathOptions::new("test"), move |e| {
            sink.lock().push(e.outcome.clone());
        })
        .unwrap();

        let outcome = commander.run(FleetCommand::Remove, Vec::new()).await;

        assert_eq!(outcome, CommandOutcome::Failed("no client selected".into()));
        assert!(client.calls().is_empty());
        assert_eq!(*seen.lock(), vec![outcome]);
    }

    #[tokio::test]
    async fn property_update_picks_single_or_batch() {
        let (client, _bus, commander) = setup();
        let one = ClientId::generate();
        let command = FleetCommand::UpdateProperty {
            property: "work_id".into(),
            value: serde_json::Value::Null,
        };

        commander.run(command.clone(), vec![one]).await;
        commander
            .run(command, vec![ClientId::generate(), ClientId::generate()])
            .await;

        let names: Vec<&str> = client.calls().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["update_client", "update_clients", "update_clients"]);
    }

    #[tokio::test]
    async fn completion_event_names_the_command() {
        let (_client, bus, commander) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.register_event_path::<FleetCommandCompletedEvent, _>(PathOptions::new("test"), move |e| {
            sink.lock().push((e.command, e.client_ids.len()));
        })
        .unwrap();

        commander
            .run(
                FleetCommand::SwitchRadeonGpu { compute_mode: true },
                vec![ClientId::generate()],
            )
            .await;

        assert_eq!(*seen.lock(), vec![("switch_radeon_gpu", 1)]);
    }
}
