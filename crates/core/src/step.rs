//! Claim creation progress.
//!
//! While a claim is being created the orchestrator reports its progress as a
//! sequence of [`CreateStep`]s. Steps are delivered over a [`step_channel`]
//! so consumers can observe them as a [`Stream`], or replay a literal sequence
//! of steps in tests. [`StepOrder`] checks that a sequence never regresses.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
    Stream, StreamExt,
};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::claim::ProviderClaimData;

/// A step in the creation of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum CreateStep {
    /// The claim is being created with the given witnesses.
    #[serde(rename_all = "camelCase")]
    Creating {
        /// Timestamp of the claim.
        timestamp_s: u64,
        /// Epoch of the witness set.
        epoch: u32,
        /// Hosts of the witnesses asked to sign.
        witness_hosts: Vec<String>,
    },
    /// A witness signed the claim.
    #[serde(rename_all = "camelCase")]
    WitnessDone {
        /// Timestamp of the claim.
        timestamp_s: u64,
        /// Epoch of the witness set.
        epoch: u32,
        /// Hosts of the witnesses which have yet to sign.
        witness_hosts_left: Vec<String>,
        /// The claim being signed.
        claim_data: ProviderClaimData,
        /// Signatures collected so far.
        signatures_done: Vec<String>,
    },
}

impl CreateStep {
    /// Returns the timestamp of the claim.
    pub fn timestamp_s(&self) -> u64 {
        match self {
            CreateStep::Creating { timestamp_s, .. } => *timestamp_s,
            CreateStep::WitnessDone { timestamp_s, .. } => *timestamp_s,
        }
    }

    /// Returns the epoch of the claim.
    pub fn epoch(&self) -> u32 {
        match self {
            CreateStep::Creating { epoch, .. } => *epoch,
            CreateStep::WitnessDone { epoch, .. } => *epoch,
        }
    }

    /// Returns the witnesses which have yet to sign.
    pub fn pending_witnesses(&self) -> &[String] {
        match self {
            CreateStep::Creating { witness_hosts, .. } => witness_hosts,
            CreateStep::WitnessDone {
                witness_hosts_left, ..
            } => witness_hosts_left,
        }
    }

    /// Returns `true` if this is the last step, ie. every witness has signed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CreateStep::WitnessDone { witness_hosts_left, .. } if witness_hosts_left.is_empty()
        )
    }
}

/// Creates a channel over which claim creation steps are delivered.
pub fn step_channel() -> (StepSender, StepReceiver) {
    let (sender, receiver) = mpsc::unbounded();

    (StepSender { sender }, StepReceiver { receiver })
}

/// Sending half of a [`step_channel`].
#[derive(Debug, Clone)]
pub struct StepSender {
    sender: UnboundedSender<CreateStep>,
}

impl StepSender {
    /// Reports a step.
    ///
    /// Never blocks. If the receiver is gone the step is dropped, progress
    /// reporting must not fail claim creation.
    pub fn send(&self, step: CreateStep) {
        trace!("sending step: {:?}", step);

        if self.sender.unbounded_send(step).is_err() {
            warn!("step receiver dropped, discarding step");
        }
    }
}

/// Receiving half of a [`step_channel`].
#[derive(Debug)]
pub struct StepReceiver {
    receiver: UnboundedReceiver<CreateStep>,
}

impl StepReceiver {
    /// Collects steps until the terminal step, or until all senders are
    /// dropped.
    pub async fn collect_until_terminal(mut self) -> Vec<CreateStep> {
        let mut steps = Vec::new();
        while let Some(step) = self.next().await {
            let terminal = step.is_terminal();
            steps.push(step);

            if terminal {
                break;
            }
        }

        steps
    }
}

impl Stream for StepReceiver {
    type Item = CreateStep;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// Checks that a sequence of steps describes monotonic progress.
///
/// The timestamp and epoch are fixed by the first step, `witness-done` is
/// never followed by `creating`, the set of pending witnesses never grows,
/// collected signatures never shrink and nothing follows the terminal step.
#[derive(Debug, Default)]
pub struct StepOrder {
    last: Option<CreateStep>,
}

impl StepOrder {
    /// Creates a new checker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the next step of the sequence.
    pub fn check(&mut self, step: &CreateStep) -> Result<(), StepOrderError> {
        if let Some(last) = &self.last {
            if last.is_terminal() {
                return Err(StepOrderError("step received after the terminal step".into()));
            }

            if last.timestamp_s() != step.timestamp_s() || last.epoch() != step.epoch() {
                return Err(StepOrderError(format!(
                    "claim changed from timestamp {} epoch {} to timestamp {} epoch {}",
                    last.timestamp_s(),
                    last.epoch(),
                    step.timestamp_s(),
                    step.epoch()
                )));
            }

            if step.pending_witnesses().len() > last.pending_witnesses().len() {
                return Err(StepOrderError(format!(
                    "pending witnesses grew from {} to {}",
                    last.pending_witnesses().len(),
                    step.pending_witnesses().len()
                )));
            }

            match (last, step) {
                (CreateStep::WitnessDone { .. }, CreateStep::Creating { .. }) => {
                    return Err(StepOrderError(
                        "creating step received after a witness signed".into(),
                    ));
                }
                (
                    CreateStep::WitnessDone {
                        signatures_done: before,
                        ..
                    },
                    CreateStep::WitnessDone {
                        signatures_done: after,
                        ..
                    },
                ) if after.len() < before.len() => {
                    return Err(StepOrderError(format!(
                        "signatures shrank from {} to {}",
                        before.len(),
                        after.len()
                    )));
                }
                _ => {}
            }
        }

        self.last = Some(step.clone());

        Ok(())
    }

    /// Checks a whole sequence of steps.
    pub fn check_all<'a>(
        steps: impl IntoIterator<Item = &'a CreateStep>,
    ) -> Result<(), StepOrderError> {
        let mut order = Self::new();
        steps.into_iter().try_for_each(|step| order.check(step))
    }
}

/// Error for a step sequence which regresses.
#[derive(Debug, thiserror::Error)]
#[error("invalid step order: {0}")]
pub struct StepOrderError(String);

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::fixtures::claim_fixture;

    fn creating(hosts: &[&str]) -> CreateStep {
        CreateStep::Creating {
            timestamp_s: 1700000000,
            epoch: 1,
            witness_hosts: hosts.iter().map(|h| h.to_string()).collect(),
        }
    }

    fn witness_done(left: &[&str], done: usize) -> CreateStep {
        CreateStep::WitnessDone {
            timestamp_s: 1700000000,
            epoch: 1,
            witness_hosts_left: left.iter().map(|h| h.to_string()).collect(),
            claim_data: claim_fixture(),
            signatures_done: vec!["0x00".to_string(); done],
        }
    }

    fn replay() -> Vec<CreateStep> {
        vec![
            creating(&["a", "b"]),
            creating(&["a", "b"]),
            witness_done(&["b"], 1),
            witness_done(&[], 2),
        ]
    }

    #[test]
    fn test_serde_tag() {
        let json = serde_json::to_value(creating(&["a"])).unwrap();
        assert_eq!(json["name"], "creating");
        assert_eq!(json["timestampS"], 1700000000);
        assert_eq!(json["witnessHosts"][0], "a");

        let json = serde_json::to_value(witness_done(&[], 1)).unwrap();
        assert_eq!(json["name"], "witness-done");
        assert!(json["witnessHostsLeft"].as_array().unwrap().is_empty());

        let step: CreateStep = serde_json::from_value(json).unwrap();
        assert!(step.is_terminal());
    }

    #[test]
    fn test_channel_delivers_in_order() {
        let (sender, receiver) = step_channel();

        for step in replay() {
            sender.send(step);
        }
        // Sent after the terminal step, never observed.
        sender.send(creating(&["c"]));

        let steps = block_on(receiver.collect_until_terminal());

        assert_eq!(steps, replay());
    }

    #[test]
    fn test_channel_ends_when_sender_dropped() {
        let (sender, receiver) = step_channel();
        sender.send(creating(&["a"]));
        drop(sender);

        let steps = block_on(receiver.collect_until_terminal());

        assert_eq!(steps, vec![creating(&["a"])]);
    }

    #[test]
    fn test_send_without_receiver() {
        let (sender, receiver) = step_channel();
        drop(receiver);

        sender.send(creating(&["a"]));
    }

    #[test]
    fn test_step_order_accepts_replay() {
        StepOrder::check_all(&replay()).unwrap();
    }

    #[test]
    fn test_step_order_rejects_regressions() {
        assert!(StepOrder::check_all(&[witness_done(&["b"], 1), creating(&["b"])]).is_err());
        assert!(StepOrder::check_all(&[creating(&["a"]), creating(&["a", "b"])]).is_err());
        assert!(StepOrder::check_all(&[witness_done(&["b"], 2), witness_done(&[], 1)]).is_err());
        assert!(StepOrder::check_all(&[witness_done(&[], 1), witness_done(&[], 1)]).is_err());

        let mut other_epoch = creating(&["a"]);
        if let CreateStep::Creating { epoch, .. } = &mut other_epoch {
            *epoch = 2;
        }
        assert!(StepOrder::check_all(&[creating(&["a"]), other_epoch]).is_err());
    }
}
