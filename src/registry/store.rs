use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::directory::Directory;
use crate::error::{Result, RosterError};
use crate::outcome::Outcome;
use crate::registry::shift::{Shift, ShiftStatus};

/// Canonical owner of every shift's occupancy.
///
/// All transitions are conditional compare-and-set operations on the current
/// status; callers serialize access through the store's lock, so concurrent
/// commands observe linearizable shift state. Shifts are never removed while
/// a bid or change request references them.
#[derive(Debug, Default)]
pub struct ShiftStore {
    shifts: HashMap<Uuid, Shift>,
}

impl ShiftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, shift: Shift) {
        self.shifts.insert(shift.id, shift);
    }

    pub fn get(&self, id: Uuid) -> Option<&Shift> {
        self.shifts.get(&id)
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    /// Shifts within `[start, end]`, ordered by date then start time.
    pub fn in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<&Shift> {
        let mut shifts: Vec<&Shift> = self
            .shifts
            .values()
            .filter(|s| s.date >= start && s.date <= end)
            .collect();
        shifts.sort_by_key(|s| (s.date, s.start_time));
        shifts
    }

    /// Shifts currently accepting bids.
    pub fn open_for_bidding_shifts(&self) -> Vec<&Shift> {
        let mut shifts: Vec<&Shift> = self
            .shifts
            .values()
            .filter(|s| s.status == ShiftStatus::Bidding)
            .collect();
        shifts.sort_by_key(|s| (s.date, s.start_time));
        shifts
    }

    /// Assign an OPEN shift to a member, checking the required qualification.
    ///
    /// Retrying an assignment that already landed returns the current shift
    /// with `applied = false` and no side effect.
    pub fn assign(
        &mut self,
        shift_id: Uuid,
        member_id: Uuid,
        directory: &dyn Directory,
    ) -> Result<Outcome<Shift>> {
        let shift = self
            .shifts
            .get(&shift_id)
            .ok_or_else(|| RosterError::not_found("shift", shift_id))?;

        if shift.status == ShiftStatus::Confirmed && shift.assignee == Some(member_id) {
            return Ok(Outcome::already(shift.clone()));
        }
        if shift.status != ShiftStatus::Open {
            return Err(RosterError::invalid_transition("OPEN", shift.status));
        }
        if !directory.is_member(member_id) {
            return Err(RosterError::not_found("member", member_id));
        }
        if let Some(qualification_id) = shift.required_qualification {
            if !directory.has_qualification(member_id, qualification_id) {
                return Err(RosterError::QualificationMismatch {
                    member_id,
                    qualification_id,
                });
            }
        }

        if let Some(shift) = self.shifts.get_mut(&shift_id) {
            shift.status = ShiftStatus::Confirmed;
            shift.assignee = Some(member_id);
            tracing::info!(shift_id = %shift_id, member_id = %member_id, "Shift assigned");
            Ok(Outcome::applied(shift.clone()))
        } else {
            Err(RosterError::not_found("shift", shift_id))
        }
    }

    /// Vacate a CONFIRMED shift and open it to bids. The prior assignee is
    /// recorded on the shift and may not bid on it.
    pub fn open_for_bidding(&mut self, shift_id: Uuid) -> Result<Outcome<Shift>> {
        let shift = self
            .shifts
            .get(&shift_id)
            .ok_or_else(|| RosterError::not_found("shift", shift_id))?;

        if shift.status == ShiftStatus::Bidding {
            return Ok(Outcome::already(shift.clone()));
        }
        if shift.status != ShiftStatus::Confirmed {
            return Err(RosterError::invalid_transition("CONFIRMED", shift.status));
        }

        if let Some(shift) = self.shifts.get_mut(&shift_id) {
            shift.vacated_by = shift.assignee.take();
            shift.status = ShiftStatus::Bidding;
            tracing::info!(
                shift_id = %shift_id,
                vacated_by = ?shift.vacated_by,
                "Shift opened for bidding"
            );
            Ok(Outcome::applied(shift.clone()))
        } else {
            Err(RosterError::not_found("shift", shift_id))
        }
    }

    /// Confirm a BIDDING shift to the winning bidder. The caller settles the
    /// bid book in the same critical section, so exactly one award per shift
    /// can succeed.
    pub fn confirm_from_bid(&mut self, shift_id: Uuid, member_id: Uuid) -> Result<Shift> {
        let shift = self
            .shifts
            .get(&shift_id)
            .ok_or_else(|| RosterError::not_found("shift", shift_id))?;

        if shift.status != ShiftStatus::Bidding {
            return Err(RosterError::invalid_transition("BIDDING", shift.status));
        }

        if let Some(shift) = self.shifts.get_mut(&shift_id) {
            shift.status = ShiftStatus::Confirmed;
            shift.assignee = Some(member_id);
            tracing::info!(shift_id = %shift_id, member_id = %member_id, "Shift confirmed from bid");
            Ok(shift.clone())
        } else {
            Err(RosterError::not_found("shift", shift_id))
        }
    }

    /// Exchange the assignees of two CONFIRMED shifts, both-or-neither.
    ///
    /// Ownership is checked at commit time; a precondition that no longer
    /// holds fails the whole swap with `StaleOwnership` and leaves both
    /// shifts untouched.
    pub fn swap(
        &mut self,
        shift_a: Uuid,
        member_a: Uuid,
        shift_b: Uuid,
        member_b: Uuid,
    ) -> Result<(Shift, Shift)> {
        if shift_a == shift_b {
            return Err(RosterError::invalid_transition(
                "two distinct shifts",
                "the same shift on both sides",
            ));
        }
        self.check_owned(shift_a, member_a)?;
        self.check_owned(shift_b, member_b)?;

        // Both preconditions verified under the same lock; apply in place.
        if let Some(a) = self.shifts.get_mut(&shift_a) {
            a.assignee = Some(member_b);
        }
        if let Some(b) = self.shifts.get_mut(&shift_b) {
            b.assignee = Some(member_a);
        }
        tracing::info!(
            shift_a = %shift_a,
            shift_b = %shift_b,
            member_a = %member_a,
            member_b = %member_b,
            "Shifts swapped"
        );

        match (self.shifts.get(&shift_a), self.shifts.get(&shift_b)) {
            (Some(a), Some(b)) => Ok((a.clone(), b.clone())),
            _ => Err(RosterError::not_found("shift", shift_a)),
        }
    }

    fn check_owned(&self, shift_id: Uuid, member_id: Uuid) -> Result<()> {
        let shift = self
            .shifts
            .get(&shift_id)
            .ok_or_else(|| RosterError::not_found("shift", shift_id))?;
        if !shift.is_owned_by(member_id) {
            return Err(RosterError::StaleOwnership {
                shift_id,
                detail: format!(
                    "expected CONFIRMED with assignee {member_id}, found {} with assignee {:?}",
                    shift.status, shift.assignee
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use chrono::NaiveTime;

    fn shift_on(date: &str, qualification: Option<Uuid>) -> Shift {
        Shift::new(
            date.parse().unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            qualification,
        )
    }

    fn directory_with(member: Uuid, qualifications: Vec<Uuid>) -> InMemoryDirectory {
        InMemoryDirectory::new().with_member(member, "Test Member", false, qualifications)
    }

    #[test]
    fn assign_confirms_open_shift() {
        let member = Uuid::new_v4();
        let dir = directory_with(member, vec![]);
        let mut store = ShiftStore::new();
        let shift = shift_on("2026-11-03", None);
        let id = shift.id;
        store.insert(shift);

        let outcome = store.assign(id, member, &dir).unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.value.status, ShiftStatus::Confirmed);
        assert_eq!(outcome.value.assignee, Some(member));
    }

    #[test]
    fn assign_retry_is_idempotent() {
        let member = Uuid::new_v4();
        let dir = directory_with(member, vec![]);
        let mut store = ShiftStore::new();
        let shift = shift_on("2026-11-03", None);
        let id = shift.id;
        store.insert(shift);

        store.assign(id, member, &dir).unwrap();
        let retry = store.assign(id, member, &dir).unwrap();
        assert!(!retry.applied);
        assert_eq!(retry.value.assignee, Some(member));
    }

    #[test]
    fn assign_rejects_confirmed_shift_for_other_member() {
        let member = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut dir = directory_with(member, vec![]);
        dir.insert(crate::directory::MemberRecord {
            id: other,
            full_name: "Other".into(),
            manager: false,
            qualifications: Default::default(),
        });
        let mut store = ShiftStore::new();
        let shift = shift_on("2026-11-03", None);
        let id = shift.id;
        store.insert(shift);

        store.assign(id, member, &dir).unwrap();
        let err = store.assign(id, other, &dir).unwrap_err();
        assert!(matches!(err, RosterError::InvalidTransition { .. }));
    }

    #[test]
    fn assign_checks_qualification() {
        let member = Uuid::new_v4();
        let qual = Uuid::new_v4();
        let dir = directory_with(member, vec![]);
        let mut store = ShiftStore::new();
        let shift = shift_on("2026-11-03", Some(qual));
        let id = shift.id;
        store.insert(shift);

        let err = store.assign(id, member, &dir).unwrap_err();
        assert_eq!(
            err,
            RosterError::QualificationMismatch {
                member_id: member,
                qualification_id: qual
            }
        );
    }

    #[test]
    fn open_for_bidding_clears_assignee_and_records_vacating_member() {
        let member = Uuid::new_v4();
        let dir = directory_with(member, vec![]);
        let mut store = ShiftStore::new();
        let shift = shift_on("2026-11-03", None);
        let id = shift.id;
        store.insert(shift);
        store.assign(id, member, &dir).unwrap();

        let outcome = store.open_for_bidding(id).unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.value.status, ShiftStatus::Bidding);
        assert_eq!(outcome.value.assignee, None);
        assert_eq!(outcome.value.vacated_by, Some(member));
    }

    #[test]
    fn open_for_bidding_requires_confirmed() {
        let mut store = ShiftStore::new();
        let shift = shift_on("2026-11-03", None);
        let id = shift.id;
        store.insert(shift);

        let err = store.open_for_bidding(id).unwrap_err();
        assert!(matches!(err, RosterError::InvalidTransition { .. }));
    }

    #[test]
    fn confirm_from_bid_requires_bidding() {
        let member = Uuid::new_v4();
        let mut store = ShiftStore::new();
        let shift = shift_on("2026-11-03", None);
        let id = shift.id;
        store.insert(shift);

        let err = store.confirm_from_bid(id, member).unwrap_err();
        assert!(matches!(err, RosterError::InvalidTransition { .. }));
    }

    #[test]
    fn swap_exchanges_assignees_atomically() {
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut dir = directory_with(m1, vec![]);
        dir.insert(crate::directory::MemberRecord {
            id: m2,
            full_name: "M2".into(),
            manager: false,
            qualifications: Default::default(),
        });
        let mut store = ShiftStore::new();
        let (a, b) = (shift_on("2026-11-03", None), shift_on("2026-11-04", None));
        let (ida, idb) = (a.id, b.id);
        store.insert(a);
        store.insert(b);
        store.assign(ida, m1, &dir).unwrap();
        store.assign(idb, m2, &dir).unwrap();

        let (sa, sb) = store.swap(ida, m1, idb, m2).unwrap();
        assert_eq!(sa.assignee, Some(m2));
        assert_eq!(sb.assignee, Some(m1));
    }

    #[test]
    fn swap_fails_stale_when_ownership_changed() {
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut dir = directory_with(m1, vec![]);
        dir.insert(crate::directory::MemberRecord {
            id: m2,
            full_name: "M2".into(),
            manager: false,
            qualifications: Default::default(),
        });
        let mut store = ShiftStore::new();
        let (a, b) = (shift_on("2026-11-03", None), shift_on("2026-11-04", None));
        let (ida, idb) = (a.id, b.id);
        store.insert(a);
        store.insert(b);
        store.assign(ida, m1, &dir).unwrap();
        store.assign(idb, m2, &dir).unwrap();

        // B is vacated out from under the pending swap.
        store.open_for_bidding(idb).unwrap();

        let err = store.swap(ida, m1, idb, m2).unwrap_err();
        assert!(matches!(err, RosterError::StaleOwnership { shift_id, .. } if shift_id == idb));

        // Neither side was touched.
        assert_eq!(store.get(ida).unwrap().assignee, Some(m1));
        assert_eq!(store.get(idb).unwrap().assignee, None);
    }

    #[test]
    fn swap_rejects_same_shift() {
        let m1 = Uuid::new_v4();
        let mut store = ShiftStore::new();
        let a = shift_on("2026-11-03", None);
        let ida = a.id;
        store.insert(a);

        let err = store.swap(ida, m1, ida, m1).unwrap_err();
        assert!(matches!(err, RosterError::InvalidTransition { .. }));
    }

    #[test]
    fn in_range_sorted_by_date_then_time() {
        let mut store = ShiftStore::new();
        let mut early = shift_on("2026-11-04", None);
        early.start_time = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        let late = shift_on("2026-11-04", None);
        let other_day = shift_on("2026-11-03", None);
        let outside = shift_on("2026-12-01", None);
        let (e, l, o) = (early.id, late.id, other_day.id);
        store.insert(early);
        store.insert(late);
        store.insert(other_day);
        store.insert(outside);

        let range = store.in_range("2026-11-01".parse().unwrap(), "2026-11-30".parse().unwrap());
        let ids: Vec<Uuid> = range.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![o, e, l]);
    }
}
