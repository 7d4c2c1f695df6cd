//! Bidding market flows: placing, retracting, and the exclusive award.


use harness::TestEngine;
use rosterd::bidding::BidStatus;
use rosterd::error::RosterError;
use rosterd::notify::NotificationKind;
use rosterd::registry::ShiftStatus;

/// Full market round: assign, vacate, two bids, one award.
#[tokio::test]
async fn market_round_awards_one_bid_and_loses_the_rest() {
    let t = TestEngine::new();
    let shift_id = t.seed_open_shift("2099-11-03", None).await;

    t.engine
        .assign(shift_id, t.worker_a, t.manager)
        .await
        .unwrap();
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();

    let bid_b = t
        .engine
        .place_bid(shift_id, t.worker_b, Some("happy to cover".into()))
        .await
        .unwrap();
    let bid_c = t.engine.place_bid(shift_id, t.worker_c, None).await.unwrap();
    assert_eq!(bid_b.status, BidStatus::Active);
    assert_eq!(bid_c.status, BidStatus::Active);

    let outcome = t.engine.award(shift_id, bid_b.id, t.manager).await.unwrap();
    assert!(outcome.applied);
    let (shift, winner) = outcome.value;
    assert_eq!(shift.status, ShiftStatus::Confirmed);
    assert_eq!(shift.assignee, Some(t.worker_b));
    assert_eq!(winner.status, BidStatus::Awarded);

    let bids = t.engine.bids_for_shift(shift_id).await.unwrap();
    let statuses: Vec<_> = bids.iter().map(|b| (b.member_id, b.status)).collect();
    assert!(statuses.contains(&(t.worker_b, BidStatus::Awarded)));
    assert!(statuses.contains(&(t.worker_c, BidStatus::Lost)));

    // Winner and loser each heard about it.
    let b_kinds: Vec<_> = t
        .engine
        .notifications_for(t.worker_b)
        .await
        .iter()
        .map(|n| n.kind)
        .collect();
    assert!(b_kinds.contains(&NotificationKind::BidAwarded));
    let c_kinds: Vec<_> = t
        .engine
        .notifications_for(t.worker_c)
        .await
        .iter()
        .map(|n| n.kind)
        .collect();
    assert!(c_kinds.contains(&NotificationKind::BidLost));
}

#[tokio::test]
async fn vacating_member_cannot_bid_on_own_shift() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();

    let err = t
        .engine
        .place_bid(shift_id, t.worker_a, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RosterError::InvalidTransition { .. }));
}

#[tokio::test]
async fn duplicate_active_bid_is_rejected() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();

    t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();
    let err = t
        .engine
        .place_bid(shift_id, t.worker_b, None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RosterError::DuplicateBid {
            shift_id,
            member_id: t.worker_b
        }
    );
}

#[tokio::test]
async fn bids_require_a_bidding_shift() {
    let t = TestEngine::new();
    let shift_id = t.seed_open_shift("2099-11-03", None).await;

    let err = t
        .engine
        .place_bid(shift_id, t.worker_b, None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, RosterError::InvalidTransition { ref expected, .. } if expected == "BIDDING")
    );
}

#[tokio::test]
async fn retract_then_rebid() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();

    let bid = t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();
    let retracted = t.engine.retract_bid(bid.id, t.worker_b).await.unwrap();
    assert!(retracted.applied);
    assert_eq!(retracted.value.status, BidStatus::Retracted);

    // The member may bid again after retracting.
    t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();
}

#[tokio::test]
async fn retract_requires_the_bidder() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();
    let bid = t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();

    let err = t.engine.retract_bid(bid.id, t.worker_c).await.unwrap_err();
    assert_eq!(err, RosterError::Unauthorized { actor: t.worker_c });
}

#[tokio::test]
async fn award_requires_manager_capability() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();
    let bid = t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();

    let err = t
        .engine
        .award(shift_id, bid.id, t.worker_b)
        .await
        .unwrap_err();
    assert_eq!(err, RosterError::Unauthorized { actor: t.worker_b });
}

#[tokio::test]
async fn award_retry_returns_existing_award() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();
    let bid = t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();

    t.engine.award(shift_id, bid.id, t.manager).await.unwrap();
    let retry = t.engine.award(shift_id, bid.id, t.manager).await.unwrap();
    assert!(!retry.applied);
    let (shift, winner) = retry.value;
    assert_eq!(shift.assignee, Some(t.worker_b));
    assert_eq!(winner.status, BidStatus::Awarded);
}

#[tokio::test]
async fn award_of_settled_bid_fails() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();
    let bid_b = t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();
    let bid_c = t.engine.place_bid(shift_id, t.worker_c, None).await.unwrap();

    t.engine.award(shift_id, bid_b.id, t.manager).await.unwrap();

    // The losing bid can no longer be awarded.
    let err = t
        .engine
        .award(shift_id, bid_c.id, t.manager)
        .await
        .unwrap_err();
    assert!(matches!(err, RosterError::InvalidTransition { .. }));
}

#[tokio::test]
async fn award_checks_bid_belongs_to_shift() {
    let t = TestEngine::new();
    let shift_1 = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    let shift_2 = t.seed_confirmed_shift("2099-11-04", t.worker_b).await;
    t.engine.open_for_bidding(shift_1, t.manager).await.unwrap();
    t.engine.open_for_bidding(shift_2, t.manager).await.unwrap();
    let bid = t.engine.place_bid(shift_1, t.worker_c, None).await.unwrap();

    let err = t.engine.award(shift_2, bid.id, t.manager).await.unwrap_err();
    assert!(matches!(err, RosterError::InvalidTransition { .. }));
}

#[tokio::test]
async fn reopened_shift_retires_previous_award() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();
    let bid = t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();
    t.engine.award(shift_id, bid.id, t.manager).await.unwrap();

    // Second round: the round-one award is retired when the shift reopens.
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();
    let awarded = t
        .engine
        .bids_for_shift(shift_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|b| b.status == BidStatus::Awarded)
        .count();
    assert_eq!(awarded, 0);
}

#[tokio::test]
async fn my_bids_includes_shift_summary() {
    let t = TestEngine::new();
    let shift_id = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.engine
        .open_for_bidding(shift_id, t.manager)
        .await
        .unwrap();
    t.engine.place_bid(shift_id, t.worker_b, None).await.unwrap();

    let my_bids = t.engine.my_bids(t.worker_b).await;
    assert_eq!(my_bids.len(), 1);
    assert_eq!(my_bids[0].1.id, shift_id);

    assert!(t.engine.my_bids(t.worker_c).await.is_empty());
}

#[tokio::test]
async fn open_bidding_shifts_query() {
    let t = TestEngine::new();
    let bidding = t.seed_confirmed_shift("2099-11-03", t.worker_a).await;
    t.seed_open_shift("2099-11-04", None).await;
    t.engine.open_for_bidding(bidding, t.manager).await.unwrap();

    let open = t.engine.open_bidding_shifts().await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, bidding);
}
