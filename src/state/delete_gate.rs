use super::{AppState, MutationOutcome};
use crate::api::Gateway;
use std::collections::HashSet;

/// Two-step delete confirmation, tracked per bookmark id.
///
/// `idle -> armed` on the first press, `armed -> idle` plus a delete on the
/// second. Releasing (the row lost hover or focus) drops back to idle without
/// deleting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteGate {
    armed: HashSet<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Armed,
    Confirmed,
}

impl DeleteGate {
    pub fn press(&mut self, id: &str) -> GateOutcome {
        if self.armed.remove(id) {
            GateOutcome::Confirmed
        } else {
            self.armed.insert(id.to_string());
            GateOutcome::Armed
        }
    }

    /// Returns whether the id was armed.
    pub fn release(&mut self, id: &str) -> bool {
        self.armed.remove(id)
    }

    pub fn is_armed(&self, id: &str) -> bool {
        self.armed.contains(id)
    }

    pub fn clear(&mut self) {
        self.armed.clear();
    }
}

impl<G: Gateway> AppState<G> {
    /// One delete interaction on a row. Returns the delete outcome when this
    /// press confirmed a previously armed row, `None` when it only armed it.
    pub async fn press_delete(&self, id: &str) -> Option<MutationOutcome> {
        match self.mutate(|s| s.delete_gate.press(id)) {
            GateOutcome::Armed => {
                tracing::debug!(id, "delete armed");
                None
            }
            GateOutcome::Confirmed => Some(self.delete(id).await),
        }
    }

    pub fn release_delete(&self, id: &str) {
        // Skip the notification when nothing was armed; rows fire this a lot.
        if self.read(|s| s.delete_gate.is_armed(id)) {
            self.mutate(|s| s.delete_gate.release(id));
        }
    }

    pub fn is_delete_armed(&self, id: &str) -> bool {
        self.read(|s| s.delete_gate.is_armed(id))
    }
}
