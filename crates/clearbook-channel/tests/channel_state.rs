//! Integration test: channel state progression and adjudication.
//!
//! Walks a channel through its life (open with equal allocations, apply
//! two trades, transmit each state) and checks the monotonic-version and
//! conservation properties, then feeds the resulting states through the
//! adjudicator.

use std::collections::HashMap;

use clearbook_channel::{adjudicate, Allocations, ChannelConfig, SignedState, WireAllocation};
use clearbook_types::ChannelId;

fn wire(participant: &str, amount: u64) -> WireAllocation {
    WireAllocation {
        participant: participant.to_string(),
        asset: "USDC".to_string(),
        amount: amount.to_string(),
    }
}

fn signed(version: u64, allocations: Vec<WireAllocation>, signatures: usize) -> SignedState {
    SignedState {
        version,
        allocations,
        signatures: (0..signatures).map(|i| format!("0xsig{i}")).collect(),
    }
}

#[test]
fn trades_progress_allocations_conservatively() {
    // =====================================================================
    // OPEN: A and B each stake 100
    // =====================================================================
    let allocations = Allocations::new(
        ChannelId::new("ch-s6"),
        "USDC",
        HashMap::from([("A".to_string(), 100), ("B".to_string(), 100)]),
    );
    assert_eq!(allocations.total(), 200);
    assert_eq!(allocations.version(), 0);

    // =====================================================================
    // TRADE 1: A buys 100 shares at 2000bp -> pays B 20
    // =====================================================================
    allocations.apply_trade("A", "B", 2000, 100).unwrap();
    assert_eq!(allocations.balance("A"), 80);
    assert_eq!(allocations.balance("B"), 120);
    assert_eq!(allocations.version(), 1);

    // =====================================================================
    // TRADE 2: same again -> {A:60, B:140}
    // =====================================================================
    allocations.apply_trade("A", "B", 2000, 100).unwrap();
    assert_eq!(allocations.balance("A"), 60);
    assert_eq!(allocations.balance("B"), 140);
    assert_eq!(allocations.version(), 2);

    let snapshot = allocations.snapshot();
    let sum: u64 = snapshot.balances.values().sum();
    assert_eq!(sum, 200, "total conserved across every update");

    let wire_form = allocations.to_wire();
    assert_eq!(wire_form, vec![wire("A", 60), wire("B", 140)]);
}

#[test]
fn adjudicator_rejects_replayed_version() {
    let config = ChannelConfig {
        participants: vec!["A".to_string(), "B".to_string()],
    };

    // Transmitted states: open (1), after trade 1 (2), after trade 2 (3).
    let proofs = vec![
        signed(1, vec![wire("A", 100), wire("B", 100)], 2),
        signed(2, vec![wire("A", 80), wire("B", 120)], 2),
    ];

    // A candidate reusing version 2, even with the freshest balances,
    // must be rejected against a version-2 proof.
    let replay = signed(2, vec![wire("A", 60), wire("B", 140)], 2);
    assert!(!adjudicate(&config, &replay, &proofs));

    // The genuine next state passes.
    let next = signed(3, vec![wire("A", 60), wire("B", 140)], 2);
    assert!(adjudicate(&config, &next, &proofs));

    // Same version but a leaky total also fails on conservation.
    let leaky = signed(3, vec![wire("A", 60), wire("B", 150)], 2);
    assert!(!adjudicate(&config, &leaky, &proofs));

    // Under-signed states never pass, proofs or not.
    let undersigned = signed(3, vec![wire("A", 60), wire("B", 140)], 1);
    assert!(!adjudicate(&config, &undersigned, &proofs));
    assert!(!adjudicate(&config, &undersigned, &[]));
}
