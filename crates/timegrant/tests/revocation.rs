//! Revocation paths racing each other: external removal, expiry, ephemeral
//! cleanup, and the command front end.

use std::sync::Arc;
use std::time::Duration;

use timegrant::{
    assign_new, temp_role, GrantService, ReplyStatus, RevocationReason, RevokeOutcome, RoleQuery,
};
use timegrant_testkit::fixtures::{ALICE, BOB, GUEST, MUTED, OTHER_SCOPE, SCOPE, VIP};
use timegrant_testkit::{init_tracing, TestFixture};

/// Let spawned tasks drain the event feed.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn revoke_side_effects_happen_once_for_any_reasons() -> anyhow::Result<()> {
    let reasons = [
        RevocationReason::Expired,
        RevocationReason::Cancelled,
        RevocationReason::Stale,
    ];

    for first in reasons {
        for second in reasons {
            let fixture = TestFixture::new();
            fixture.directory.grant_directly(ALICE, MUTED);
            let manager = fixture.manager();
            manager.grant(SCOPE, ALICE, MUTED, "1h", false).await?;
            let grant = manager.grants_for(SCOPE, ALICE)[0].clone();

            let a = manager.revoke(&grant, first).await?;
            let b = manager.revoke(&grant, second).await?;

            assert!(a.resolved());
            assert_eq!(b, RevokeOutcome::AlreadyTerminal);
            assert_eq!(grant.reason(), Some(first));
            assert_eq!(fixture.directory.remove_calls(ALICE, MUTED), 1);
        }
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_revocations_remove_once() -> anyhow::Result<()> {
    let fixture = TestFixture::new();
    fixture.directory.grant_directly(ALICE, MUTED);
    let manager = fixture.manager();
    manager.grant(SCOPE, ALICE, MUTED, "1h", false).await?;
    let grant = manager.grants_for(SCOPE, ALICE)[0].clone();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let manager = Arc::clone(&manager);
        let grant = Arc::clone(&grant);
        let reason = if i % 2 == 0 {
            RevocationReason::Expired
        } else {
            RevocationReason::Cancelled
        };
        tasks.push(tokio::spawn(async move { manager.revoke(&grant, reason).await }));
    }

    let mut resolved = 0;
    for task in tasks {
        if task.await??.resolved() {
            resolved += 1;
        }
    }

    assert_eq!(resolved, 1);
    assert_eq!(fixture.directory.remove_calls(ALICE, MUTED), 1);
    Ok(())
}

#[tokio::test]
async fn external_removal_cancels_every_grant_of_the_attribute() -> anyhow::Result<()> {
    init_tracing();
    let mut fixture = TestFixture::new();
    let feed = fixture.take_feed();
    fixture.directory.grant_directly(ALICE, MUTED);
    fixture.directory.grant_directly(ALICE, VIP);
    fixture.directory.grant_directly(BOB, MUTED);

    let manager = fixture.manager();
    let service = GrantService::start(Arc::clone(&manager), feed).await?;

    manager.grant(SCOPE, ALICE, MUTED, "1h", false).await?;
    manager.grant(OTHER_SCOPE, ALICE, MUTED, "2h", false).await?;
    manager.grant(SCOPE, ALICE, VIP, "1h", false).await?;
    manager.grant(SCOPE, BOB, MUTED, "1h", false).await?;
    assert_eq!(manager.pending_timers(), 4);

    fixture.directory.remove_externally(SCOPE, ALICE, MUTED);
    settle().await;

    let muted: Vec<_> = [
        manager.grants_for(SCOPE, ALICE),
        manager.grants_for(OTHER_SCOPE, ALICE),
        manager.grants_for(SCOPE, BOB),
    ]
    .into_iter()
    .flatten()
    .filter(|g| g.record().attribute == MUTED)
    .collect();
    assert_eq!(muted.len(), 3);
    for grant in &muted {
        assert_eq!(grant.reason(), Some(RevocationReason::Cancelled));
    }

    // Bob's MUTED grant goes too; Alice's VIP is untouched.
    assert!(!fixture.directory.holds(BOB, MUTED));
    assert_eq!(fixture.directory.remove_calls(BOB, MUTED), 1);
    assert_eq!(manager.live_count(), 1);
    assert_eq!(manager.pending_timers(), 1);
    assert!(fixture.directory.holds(ALICE, VIP));

    // The removal was already done externally; the manager only makes
    // idempotent calls on top, one per cancelled grant at most.
    assert!(fixture.directory.remove_calls(ALICE, MUTED) <= 2);

    service.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn own_removals_echo_harmlessly() -> anyhow::Result<()> {
    let mut fixture = TestFixture::new();
    let feed = fixture.take_feed();
    fixture.directory.grant_directly(ALICE, MUTED);

    let manager = fixture.manager();
    let service = GrantService::start(Arc::clone(&manager), feed).await?;

    manager.grant(SCOPE, ALICE, MUTED, "1h", false).await?;
    let grant = manager.grants_for(SCOPE, ALICE)[0].clone();
    manager.revoke(&grant, RevocationReason::Expired).await?;
    settle().await;

    assert_eq!(grant.reason(), Some(RevocationReason::Expired));
    assert_eq!(fixture.directory.remove_calls(ALICE, MUTED), 1);

    service.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn ephemeral_attribute_is_destroyed_with_last_holder() -> anyhow::Result<()> {
    let fixture = TestFixture::new();
    let manager = fixture.manager();

    let reply = assign_new(&manager, SCOPE, ALICE, "Party", "1h", None).await?;
    assert!(reply.is_success());
    let alice_grant = manager.grants_for(SCOPE, ALICE)[0].clone();
    let party = alice_grant.record().attribute;

    // Bob gets the same attribute for longer.
    fixture.directory.grant_directly(BOB, party);
    manager.grant(SCOPE, BOB, party, "2h", true).await?;
    let bob_grant = manager.grants_for(SCOPE, BOB)[0].clone();

    let first = manager.revoke(&alice_grant, RevocationReason::Expired).await?;
    assert_eq!(first, RevokeOutcome::Revoked { destroyed: false });
    assert!(fixture.directory.exists(party));

    let last = manager.revoke(&bob_grant, RevocationReason::Expired).await?;
    assert_eq!(last, RevokeOutcome::Revoked { destroyed: true });
    assert!(!fixture.directory.exists(party));
    assert_eq!(fixture.directory.destroyed(), vec![party]);
    Ok(())
}

#[tokio::test]
async fn non_ephemeral_attribute_survives_last_holder() -> anyhow::Result<()> {
    let fixture = TestFixture::new();
    let manager = fixture.manager();

    let reply = temp_role(&manager, SCOPE, ALICE, &RoleQuery::Id(MUTED), "30m").await?;
    assert!(reply.is_success());

    let grant = manager.grants_for(SCOPE, ALICE)[0].clone();
    manager.revoke(&grant, RevocationReason::Expired).await?;

    assert!(fixture.directory.exists(MUTED));
    assert!(fixture.directory.destroyed().is_empty());
    Ok(())
}

#[tokio::test]
async fn commands_validate_before_touching_anything() -> anyhow::Result<()> {
    let fixture = TestFixture::new();
    let manager = fixture.manager();

    let duplicate = temp_role(&manager, SCOPE, ALICE, &"muted".parse::<RoleQuery>()?, "5m5m").await?;
    let unknown_unit = temp_role(&manager, SCOPE, ALICE, &"muted".parse::<RoleQuery>()?, "5x").await?;
    let wrong_scope = temp_role(&manager, SCOPE, ALICE, &RoleQuery::Id(GUEST), "5m").await?;
    let overlong = temp_role(&manager, SCOPE, ALICE, &RoleQuery::Id(MUTED), "20000000w").await?;
    let overlong_new = assign_new(&manager, SCOPE, ALICE, "Forever", "20000000w", None).await?;

    assert_eq!(duplicate.status, ReplyStatus::Warning);
    assert_eq!(unknown_unit.status, ReplyStatus::Warning);
    assert_eq!(wrong_scope.status, ReplyStatus::Failure);
    assert_eq!(overlong.status, ReplyStatus::Warning);
    assert_eq!(overlong_new.status, ReplyStatus::Warning);
    assert!(!fixture.directory.holds(ALICE, MUTED));
    assert!(!fixture.directory.holds(ALICE, GUEST));
    assert!(fixture.directory.destroyed().is_empty());
    assert_eq!(manager.indexed_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn temp_role_expires_through_the_timer() -> anyhow::Result<()> {
    let fixture = TestFixture::new();
    let manager = fixture.manager();

    let reply = temp_role(&manager, SCOPE, BOB, &"vip".parse::<RoleQuery>()?, "10s").await?;
    assert!(reply.is_success());
    assert!(fixture.directory.holds(BOB, VIP));

    tokio::time::sleep(Duration::from_secs(11)).await;

    assert!(!fixture.directory.holds(BOB, VIP));
    assert_eq!(manager.live_count(), 0);
    Ok(())
}
