mod common;

use std::time::Duration;

use common::{T0, config, harness};
use ledger_guard::alert::IP_BLOCKED;
use ledger_guard::crypto::MasterKey;
use shared::models::SecurityEventType;

const HOUR_MS: i64 = 3_600_000;

#[tokio::test]
async fn five_events_in_ten_seconds_block_the_address() {
    let h = harness(&config(MasterKey::generate(), None));
    let monitor = &h.state.monitor;

    for i in 0..5 {
        let outcome = monitor
            .record_event("1.2.3.4", SecurityEventType::AuthFailure, Some(format!("attempt {i}")))
            .await
            .unwrap();
        assert_eq!(outcome.window_count, i + 1);
        h.clock.advance(Duration::from_secs(2));
    }

    let blocks = h.store.blocked_ips();
    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.ip_address, "1.2.3.4");
    assert_eq!(block.reason, "Excessive security events (5 in 60s)");
    // Fifth event was recorded at T0 + 8s
    assert_eq!(block.expires_at, T0 + 8_000 + HOUR_MS);
    assert!(monitor.is_blocked("1.2.3.4").await.unwrap());
    assert_eq!(h.channel.sent_kinds(), vec![IP_BLOCKED.to_string()]);

    // Sixth event refreshes the same row
    let outcome = monitor
        .record_event("1.2.3.4", SecurityEventType::AuthFailure, None)
        .await
        .unwrap();
    assert_eq!(outcome.window_count, 6);
    let blocks = h.store.blocked_ips();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].expires_at, T0 + 10_000 + HOUR_MS);
    assert_eq!(blocks[0].reason, "Excessive security events (6 in 60s)");
    assert_eq!(blocks[0].created_at, T0 + 8_000);

    h.state.shutdown().await;
}

#[tokio::test]
async fn four_events_neither_block_nor_alert() {
    let h = harness(&config(MasterKey::generate(), None));

    for _ in 0..4 {
        let outcome = h
            .state
            .monitor
            .record_event("5.6.7.8", SecurityEventType::InvalidInput, None)
            .await
            .unwrap();
        assert!(outcome.block.is_none());
    }

    assert!(h.store.blocked_ips().is_empty());
    assert!(h.channel.sent().is_empty());
    assert!(!h.state.monitor.is_blocked("5.6.7.8").await.unwrap());
    assert_eq!(h.store.security_events().len(), 4);
}

#[tokio::test]
async fn single_critical_event_alerts_immediately() {
    let h = harness(&config(MasterKey::generate(), None));

    let outcome = h
        .state
        .monitor
        .record_event(
            "203.0.113.7",
            SecurityEventType::SqliAttempt,
            Some("' OR 1=1 --".into()),
        )
        .await
        .unwrap();

    assert_eq!(outcome.window_count, 1);
    assert!(outcome.block.is_none());
    let sent = h.channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, "SQLI_ATTEMPT");
    assert_eq!(sent[0].details, "IP: 203.0.113.7\nDetails: ' OR 1=1 --");
}

#[tokio::test]
async fn block_lapses_after_expiry() {
    let h = harness(&config(MasterKey::generate(), None));

    for _ in 0..5 {
        h.state
            .monitor
            .record_event("1.2.3.4", SecurityEventType::PathTraversal, None)
            .await
            .unwrap();
    }
    assert!(h.state.blocks.is_blocked("1.2.3.4").await.unwrap());

    h.clock.advance(Duration::from_secs(3_600) + Duration::from_millis(1));
    assert!(!h.state.blocks.is_blocked("1.2.3.4").await.unwrap());

    // The row is still there, only expired
    let row = h.state.blocks.lookup("1.2.3.4").await.unwrap().unwrap();
    assert!(row.expires_at < T0 + HOUR_MS + 1);
}

#[tokio::test]
async fn addresses_are_counted_independently() {
    let h = harness(&config(MasterKey::generate(), None));

    for i in 0..8 {
        let ip = if i % 2 == 0 { "10.0.0.1" } else { "10.0.0.2" };
        h.state
            .monitor
            .record_event(ip, SecurityEventType::CsrfViolation, None)
            .await
            .unwrap();
    }

    assert!(h.store.blocked_ips().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_escalations_leave_one_block_row() {
    const TASKS: usize = 50;
    let h = harness(&config(MasterKey::generate(), None));

    let mut handles = Vec::with_capacity(TASKS);
    for i in 0..TASKS {
        let monitor = h.state.monitor.clone();
        handles.push(tokio::spawn(async move {
            monitor
                .record_event(
                    "1.2.3.4",
                    SecurityEventType::SuspiciousActivity,
                    Some(format!("burst {i}")),
                )
                .await
        }));
    }

    let mut escalated = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.window_count >= 1);
        if outcome.block.is_some() {
            escalated += 1;
        }
    }

    assert_eq!(h.store.security_events().len(), TASKS);
    let blocks = h.store.blocked_ips();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].ip_address, "1.2.3.4");
    assert_eq!(blocks[0].expires_at, T0 + HOUR_MS);
    assert!(escalated >= TASKS - 4);
    assert!(h.state.monitor.is_blocked("1.2.3.4").await.unwrap());
}
