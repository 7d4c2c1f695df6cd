//! Races the engine must win: concurrent awards, overlapping swap
//! approvals, and solver replay against manual commands.


use harness::TestEngine;
use rosterd::error::RosterError;
use rosterd::exchange::{ChangeStatus, ResolveAction, RespondAction};

/// Two awards race on one BIDDING shift: exactly one succeeds, the other
/// observes the already-settled state.
#[tokio::test]
async fn concurrent_awards_exactly_one_wins() {
    for _ in 0..20 {
        let t = TestEngine::new();
        let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
        t.engine
            .open_for_bidding(shift_id, t.manager)
            .await
            .unwrap();
        let bid_b = t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();
        let bid_c = t.engine.place_bid(shift_id, t.worker_c, None).await.unwrap();

        let (e1, e2) = (t.engine.clone(), t.engine.clone());
        let manager = t.manager;
        let h1 =
            tokio::spawn(async move { e1.award(shift_id, bid_b.id, manager).await });
        let h2 =
            tokio::spawn(async move { e2.award(shift_id, bid_c.id, manager).await });
        let r1 = h1.await.unwrap();
        let r2 = h2.await.unwrap();

        let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one award must succeed");
        let loser = if r1.is_err() { r1.unwrap_err() } else { r2.unwrap_err() };
        assert!(
            matches!(loser, RosterError::InvalidTransition { .. }),
            "loser saw {loser:?}"
        );

        // The shift belongs to exactly the winning bidder.
        let shift = t.engine.shift(shift_id).await.unwrap();
        let bids = t.engine.bids_for_shift(shift_id).await.unwrap();
        let awarded: Vec<_> = bids
            .iter()
            .filter(|b| b.status == rosterd::bidding::BidStatus::Awarded)
            .collect();
        assert_eq!(awarded.len(), 1);
        assert_eq!(shift.assignee, Some(awarded[0].member_id));
    }
}

/// Two approved swaps share shift B: the second approval re-validates
/// ownership, observes the first swap's effect, and rejects.
#[tokio::test]
async fn overlapping_swap_approvals_reject_the_loser() {
    for _ in 0..20 {
        let t = TestEngine::new();
        let shift_a = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
        let shift_b = t.seed_confirmed_shift("2099-11-04", t.worker_b).await;
        let shift_c = t.seed_confirmed_shift("2099-11-05", t.worker_c).await;

        let req_ab = t
            .engine
            .create_change_request(shift_a, shift_b, t.worker_a, None)
            .await
            .unwrap();
        t.engine
            .respond_change_request(req_ab.id, RespondAction::Accept, t.worker_b)
            .await
            .unwrap();
        let req_cb = t
            .engine
            .create_change_request(shift_c, shift_b, t.worker_c, None)
            .await
            .unwrap();
        t.engine
            .respond_change_request(req_cb.id, RespondAction::Accept, t.worker_b)
            .await
            .unwrap();

        let (e1, e2) = (t.engine.clone(), t.engine.clone());
        let manager = t.manager;
        let h1 = tokio::spawn(async move {
            e1.resolve_change_request(req_ab.id, ResolveAction::Approve, manager, None)
                .await
        });
        let h2 = tokio::spawn(async move {
            e2.resolve_change_request(req_cb.id, ResolveAction::Approve, manager, None)
                .await
        });
        let r1 = h1.await.unwrap().unwrap();
        let r2 = h2.await.unwrap().unwrap();

        let approved = [&r1, &r2]
            .iter()
            .filter(|r| r.value.status == ChangeStatus::Approved)
            .count();
        let rejected = [&r1, &r2]
            .iter()
            .filter(|r| r.value.status == ChangeStatus::Rejected)
            .count();
        assert_eq!((approved, rejected), (1, 1));

        // The rejected one carries the stale-ownership note and left its
        // shifts alone: worker_b ended up with exactly one new shift.
        let loser = if r1.value.status == ChangeStatus::Rejected {
            &r1
        } else {
            &r2
        };
        assert!(loser
            .value
            .resolution_notes
            .as_deref()
            .unwrap_or_default()
            .contains("ownership"));

        let a = t.engine.shift(shift_a).await.unwrap();
        let b = t.engine.shift(shift_b).await.unwrap();
        let c = t.engine.shift(shift_c).await.unwrap();
        if r1.value.status == ChangeStatus::Approved {
            assert_eq!(a.assignee, Some(t.worker_b));
            assert_eq!(b.assignee, Some(t.worker_a));
            assert_eq!(c.assignee, Some(t.worker_c));
        } else {
            assert_eq!(a.assignee, Some(t.worker_a));
            assert_eq!(b.assignee, Some(t.worker_c));
            assert_eq!(c.assignee, Some(t.worker_b));
        }
    }
}

/// Concurrent duplicate bids from the same member: only one is recorded.
#[tokio::test]
async fn concurrent_duplicate_bids_keep_one_active() {
    for _ in 0..20 {
        let t = TestEngine::new();
        let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
        t.engine
            .open_for_bidding(shift_id, t.manager)
            .await
            .unwrap();

        let (e1, e2) = (t.engine.clone(), t.engine.clone());
        let member = t.worker_b;
        let h1 = tokio::spawn(async move { e1.place_bid(shift_id, member, None).await });
        let h2 = tokio::spawn(async move { e2.place_bid(shift_id, member, None).await });
        let results = [h1.await.unwrap(), h2.await.unwrap()];

        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1, "exactly one placement must win");
        assert!(results.iter().any(|r| matches!(
            r,
            Err(RosterError::DuplicateBid { .. })
        )));

        let active = t
            .engine
            .bids_for_shift(shift_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|b| b.status == rosterd::bidding::BidStatus::Active)
            .count();
        assert_eq!(active, 1);
    }
}
