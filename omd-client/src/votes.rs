use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use omd_types::{VoteCounts, VoteValue};

use crate::api::{ApiError, ApiResult, Degrade};
use crate::drops::Drops;

/// Counters and the viewer's own vote as shown in a pin popup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub up: i64,
    pub down: i64,
    pub mine: VoteValue,
}

/// One optimistic transition, reversible with [`VoteTally::revert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteChange {
    pub previous: VoteValue,
    pub next: VoteValue,
}

impl VoteTally {
    pub fn new(counts: VoteCounts, mine: VoteValue) -> Self {
        Self {
            up: counts.up,
            down: counts.down,
            mine,
        }
    }

    fn bump(&mut self, value: VoteValue, delta: i64) {
        match value {
            VoteValue::Up => self.up += delta,
            VoteValue::Down => self.down += delta,
            VoteValue::Clear => {}
        }
    }

    /// Apply the result of pressing `pressed` and return the change made.
    pub fn toggle(&mut self, pressed: VoteValue) -> VoteChange {
        let previous = self.mine;
        let next = previous.toggled(pressed);

        self.bump(previous, -1);
        self.bump(next, 1);
        self.mine = next;

        VoteChange { previous, next }
    }

    /// Undo a change previously returned by [`VoteTally::toggle`].
    pub fn revert(&mut self, change: VoteChange) {
        self.bump(change.next, -1);
        self.bump(change.previous, 1);
        self.mine = change.previous;
    }
}

/// Vote state for one pin, reconciled against the backend.
#[derive(Debug, Clone)]
pub struct VoteSession {
    pin_id: Uuid,
    tally: VoteTally,
}

impl VoteSession {
    pub fn new(pin_id: Uuid, tally: VoteTally) -> Self {
        Self { pin_id, tally }
    }

    /// Load counts and (when signed in) the viewer's vote. Failures degrade
    /// to zero counts and no vote.
    pub async fn load(drops: &Drops, pin_id: Uuid, cancel: &CancellationToken) -> Self {
        let counts = drops
            .get_vote_counts(pin_id, cancel)
            .await
            .or_degrade("getVoteCounts");

        let mine = match drops.client().current_user_id() {
            Some(user_id) => drops
                .get_vote(pin_id, user_id, cancel)
                .await
                .or_degrade("getVote")
                .unwrap_or_default(),
            None => VoteValue::Clear,
        };

        Self::new(pin_id, VoteTally::new(counts, mine))
    }

    pub fn pin_id(&self) -> Uuid {
        self.pin_id
    }

    pub fn tally(&self) -> VoteTally {
        self.tally
    }

    /// Optimistically apply `pressed`, persist it, and roll back on failure.
    pub async fn vote(
        &mut self,
        drops: &Drops,
        pressed: VoteValue,
        cancel: &CancellationToken,
    ) -> ApiResult<VoteValue> {
        if drops.client().current_user_id().is_none() {
            return Err(ApiError::NotSignedIn);
        }

        let change = self.tally.toggle(pressed);
        match drops.set_vote(self.pin_id, change.next, cancel).await {
            Ok(()) => Ok(change.next),
            Err(e) => {
                tracing::warn!("Failed to vote on {}: {}", self.pin_id, e);
                self.tally.revert(change);
                Err(e)
            }
        }
    }
}
