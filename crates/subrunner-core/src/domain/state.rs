//! Handle state machine.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use super::outcome::Outcome;

/// State of one ack handle.
///
/// Transitions:
/// - Pending -> Acked
/// - Pending -> Nacked
/// - Pending -> Expired
///
/// Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleState {
    Pending,
    Acked,
    Nacked,
    Expired,
}

impl HandleState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, HandleState::Pending)
    }

    fn to_u8(self) -> u8 {
        match self {
            HandleState::Pending => 0,
            HandleState::Acked => 1,
            HandleState::Nacked => 2,
            HandleState::Expired => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => HandleState::Acked,
            2 => HandleState::Nacked,
            3 => HandleState::Expired,
            _ => HandleState::Pending,
        }
    }
}

impl From<Outcome> for HandleState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Acked => HandleState::Acked,
            Outcome::Nacked => HandleState::Nacked,
            Outcome::Expired => HandleState::Expired,
        }
    }
}

/// Shared cell holding a handle's state.
///
/// Clones of an `AckHandle` and the tracker's registry entry point at the same
/// cell, so every reader agrees on the terminal state.
#[derive(Debug)]
pub struct HandleCell(AtomicU8);

impl HandleCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(HandleState::Pending.to_u8()))
    }

    pub fn get(&self) -> HandleState {
        HandleState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move Pending -> `to`. Returns the state that was observed when the
    /// transition was refused.
    pub fn finish(&self, to: HandleState) -> Result<(), HandleState> {
        self.0
            .compare_exchange(
                HandleState::Pending.to_u8(),
                to.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(HandleState::from_u8)
    }
}

impl Default for HandleCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_finishes_once() {
        let cell = HandleCell::new();
        assert_eq!(cell.get(), HandleState::Pending);

        cell.finish(HandleState::Acked).unwrap();
        assert_eq!(cell.finish(HandleState::Expired), Err(HandleState::Acked));
        assert_eq!(cell.get(), HandleState::Acked);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!HandleState::Pending.is_terminal());
        assert!(HandleState::Expired.is_terminal());
    }
}
