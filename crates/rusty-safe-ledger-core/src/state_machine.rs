use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Where a queued transaction stands relative to its Safe's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxLifecycle {
    Queued,
    ReadyToBroadcast,
    Broadcast,
}

/// Queued and ready are derived from the signature count with [`lifecycle_for`];
/// submission is the only explicit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    Broadcast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: TxLifecycle,
    pub to: TxLifecycle,
    pub reason: &'static str,
}

/// A threshold of zero is read as one; a Safe always needs a signature.
pub fn lifecycle_for(signature_count: usize, threshold: u64) -> TxLifecycle {
    let threshold = threshold.max(1);
    if signature_count as u64 >= threshold {
        TxLifecycle::ReadyToBroadcast
    } else {
        TxLifecycle::Queued
    }
}

pub fn tx_transition(
    state: TxLifecycle,
    action: TxAction,
) -> Result<(TxLifecycle, StateTransition), CoreError> {
    use TxAction as A;
    use TxLifecycle as L;

    let (to, reason) = match (state, action) {
        (L::ReadyToBroadcast, A::Broadcast) => (L::Broadcast, "broadcast submitted"),
        (from, action) => {
            return Err(CoreError::IllegalTransition(format!(
                "{from:?} on {action:?}"
            )))
        }
    };

    Ok((
        to,
        StateTransition {
            from: state,
            to,
            reason,
        },
    ))
}
