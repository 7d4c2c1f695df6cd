use std::collections::HashMap;

use uuid::Uuid;

use crate::bidding::bid::{BidStatus, ShiftBid};
use crate::error::{Result, RosterError};
use crate::outcome::Outcome;

/// All bids, keyed by bid id.
///
/// The book enforces the per-(shift, member) single-active-bid rule and the
/// settle-on-award rule: exactly one AWARDED bid per shift, every other
/// active bid marked LOST in the same operation.
#[derive(Debug, Default)]
pub struct BidBook {
    bids: HashMap<Uuid, ShiftBid>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<&ShiftBid> {
        self.bids.get(&id)
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    /// Record a new ACTIVE bid. The caller has already verified the shift is
    /// open for bidding and the bidder is not the vacating member.
    pub fn place(
        &mut self,
        shift_id: Uuid,
        member_id: Uuid,
        note: Option<String>,
    ) -> Result<ShiftBid> {
        if self.active_bid_for(shift_id, member_id).is_some() {
            return Err(RosterError::DuplicateBid {
                shift_id,
                member_id,
            });
        }
        let bid = ShiftBid::new(shift_id, member_id, note);
        tracing::info!(bid_id = %bid.id, shift_id = %shift_id, member_id = %member_id, "Bid placed");
        self.bids.insert(bid.id, bid.clone());
        Ok(bid)
    }

    /// Bidder-initiated withdrawal of an ACTIVE bid.
    pub fn retract(&mut self, bid_id: Uuid, actor: Uuid) -> Result<Outcome<ShiftBid>> {
        let bid = self
            .bids
            .get(&bid_id)
            .ok_or_else(|| RosterError::not_found("bid", bid_id))?;
        if bid.member_id != actor {
            return Err(RosterError::Unauthorized { actor });
        }
        match bid.status {
            BidStatus::Retracted => Ok(Outcome::already(bid.clone())),
            BidStatus::Active => {
                if let Some(bid) = self.bids.get_mut(&bid_id) {
                    bid.status = BidStatus::Retracted;
                    tracing::info!(bid_id = %bid_id, "Bid retracted");
                    Ok(Outcome::applied(bid.clone()))
                } else {
                    Err(RosterError::not_found("bid", bid_id))
                }
            }
            status => Err(RosterError::invalid_transition("ACTIVE", status)),
        }
    }

    /// Mark the winning bid AWARDED and every other ACTIVE bid on the shift
    /// LOST. Returns the winner and the losing members, for notification.
    ///
    /// The caller validates the winner and confirms the shift in the same
    /// critical section; this method assumes the winner is ACTIVE.
    pub fn settle_award(&mut self, shift_id: Uuid, bid_id: Uuid) -> Result<(ShiftBid, Vec<Uuid>)> {
        if !self.bids.contains_key(&bid_id) {
            return Err(RosterError::not_found("bid", bid_id));
        }

        let mut losers = Vec::new();
        for bid in self.bids.values_mut() {
            if bid.shift_id != shift_id || bid.status != BidStatus::Active {
                continue;
            }
            if bid.id == bid_id {
                bid.status = BidStatus::Awarded;
            } else {
                bid.status = BidStatus::Lost;
                losers.push(bid.member_id);
            }
        }

        match self.bids.get(&bid_id) {
            Some(winner) if winner.status == BidStatus::Awarded => {
                tracing::info!(
                    bid_id = %bid_id,
                    shift_id = %shift_id,
                    losers = losers.len(),
                    "Bid awarded"
                );
                Ok((winner.clone(), losers))
            }
            Some(bid) => Err(RosterError::invalid_transition("ACTIVE", bid.status)),
            None => Err(RosterError::not_found("bid", bid_id)),
        }
    }

    /// Retire the shift's AWARDED bid from a previous bidding round, so a
    /// shift vacated again never carries two awards. Returns the retired
    /// bid id, if any.
    pub fn retire_awarded(&mut self, shift_id: Uuid) -> Option<Uuid> {
        let bid = self
            .bids
            .values_mut()
            .find(|b| b.shift_id == shift_id && b.status == BidStatus::Awarded)?;
        bid.status = BidStatus::Lost;
        tracing::debug!(bid_id = %bid.id, shift_id = %shift_id, "Prior awarded bid retired");
        Some(bid.id)
    }

    pub fn active_bid_for(&self, shift_id: Uuid, member_id: Uuid) -> Option<&ShiftBid> {
        self.bids.values().find(|b| {
            b.shift_id == shift_id && b.member_id == member_id && b.status == BidStatus::Active
        })
    }

    /// Bids on a shift, newest first.
    pub fn bids_for_shift(&self, shift_id: Uuid) -> Vec<&ShiftBid> {
        let mut bids: Vec<&ShiftBid> = self
            .bids
            .values()
            .filter(|b| b.shift_id == shift_id)
            .collect();
        bids.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        bids
    }

    /// A member's own bids across all shifts, newest first.
    pub fn member_bids(&self, member_id: Uuid) -> Vec<&ShiftBid> {
        let mut bids: Vec<&ShiftBid> = self
            .bids
            .values()
            .filter(|b| b.member_id == member_id)
            .collect();
        bids.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        bids
    }
}
