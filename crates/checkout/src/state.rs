//! Checkout run state machine.

use common::{ProductId, UserId};
use domain::Quantity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CheckoutError, Result};

/// The state of one checkout attempt.
///
/// State transitions:
/// ```text
/// Validating ──┬──► Reserving ──┬──► Committed
///              │                └──► RolledBack
///              └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// Cart lines are being checked against fresh catalog reads.
    #[default]
    Validating,

    /// Stock is being decremented line by line.
    Reserving,

    /// The order is durable (terminal state).
    Committed,

    /// Validation failed before anything was mutated (terminal state).
    Rejected,

    /// Reservation or commit failed and decrements were reversed (terminal state).
    RolledBack,
}

impl CheckoutState {
    /// Returns true if the run may move to `next`.
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        matches!(
            (self, next),
            (CheckoutState::Validating, CheckoutState::Reserving)
                | (CheckoutState::Validating, CheckoutState::Rejected)
                | (CheckoutState::Reserving, CheckoutState::Committed)
                | (CheckoutState::Reserving, CheckoutState::RolledBack)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Committed | CheckoutState::Rejected | CheckoutState::RolledBack
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Validating => "Validating",
            CheckoutState::Reserving => "Reserving",
            CheckoutState::Committed => "Committed",
            CheckoutState::Rejected => "Rejected",
            CheckoutState::RolledBack => "RolledBack",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bookkeeping for a single checkout attempt.
///
/// Tracks the state and every stock decrement applied so far, which is
/// exactly what a rollback has to reverse.
#[derive(Debug, Clone)]
pub struct CheckoutRun {
    id: Uuid,
    user_id: UserId,
    state: CheckoutState,
    reserved: Vec<(ProductId, Quantity)>,
}

impl CheckoutRun {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            state: CheckoutState::default(),
            reserved: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// Decrements applied so far, in the order they were applied.
    pub fn reserved(&self) -> &[(ProductId, Quantity)] {
        &self.reserved
    }

    /// Moves the run to `next`.
    pub fn advance(&mut self, next: CheckoutState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(CheckoutError::InvalidState(format!(
                "checkout run {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }

        tracing::debug!(run_id = %self.id, from = %self.state, to = %next, "checkout state changed");
        self.state = next;
        Ok(())
    }

    /// Records a successful decrement so it can be reversed later.
    pub fn record_reservation(&mut self, product_id: ProductId, quantity: Quantity) {
        self.reserved.push((product_id, quantity));
    }
}
