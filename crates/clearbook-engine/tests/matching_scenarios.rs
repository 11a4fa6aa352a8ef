//! Integration tests: matching engine against the ledger.
//!
//! Exercises the admission → matching → application sequence the way the
//! orchestration layer drives it, and checks the conservation properties
//! that must hold across any run.

use clearbook_engine::{Ledger, LevelSnapshot, OrderBook};
use clearbook_types::{MarketId, Order, Outcome, Side, UserId};

fn user(name: &str) -> UserId {
    UserId::from(name)
}

fn order(market: MarketId, who: &str, side: Side, price: u64, qty: u64) -> Order {
    Order::new(user(who), market, Outcome::Yes, side, price, qty)
}

/// Drive one order through admission, matching, and trade application.
fn submit(ledger: &Ledger, book: &mut OrderBook, order: Order) -> clearbook_engine::Placement {
    ledger.admit(&order).expect("admission");
    let placement = book.place(order).expect("placement");
    for trade in &placement.trades {
        ledger.apply(trade).expect("application");
    }
    placement
}

#[test]
fn full_cross_settles_balances_and_positions() {
    // =====================================================================
    // SETUP: Alice mints 100 pairs, Bob funds a bid
    // =====================================================================
    let market = MarketId::new();
    let ledger = Ledger::new();
    let mut book = OrderBook::new(market, Outcome::Yes);

    ledger.deposit(&user("alice"), 1_000_000).unwrap();
    ledger.mint(&user("alice"), market, 100).unwrap();
    ledger.deposit(&user("bob"), 1_000_000).unwrap();

    // =====================================================================
    // TRADE: Alice offers YES at 6000, Bob lifts at 7000
    // =====================================================================
    submit(&ledger, &mut book, order(market, "alice", Side::Sell, 6000, 100));
    let placement = submit(&ledger, &mut book, order(market, "bob", Side::Buy, 7000, 100));

    assert_eq!(placement.trades.len(), 1);
    let trade = &placement.trades[0];
    assert_eq!(trade.buyer_id, user("bob"));
    assert_eq!(trade.seller_id, user("alice"));
    assert_eq!(trade.price, 6000, "executes at the resting price");
    assert_eq!(trade.quantity, 100);

    // =====================================================================
    // VERIFY: balances and share holdings
    // =====================================================================
    assert_eq!(ledger.balance_of(&user("alice")), 600_000);
    assert_eq!(ledger.balance_of(&user("bob")), 400_000);

    let alice = ledger.position(&user("alice"), market);
    assert_eq!((alice.yes_shares, alice.no_shares), (0, 100));
    let bob = ledger.position(&user("bob"), market);
    assert_eq!((bob.yes_shares, bob.no_shares), (100, 0));
}

#[test]
fn partial_fill_respects_fifo_and_rests_remainder() {
    let market = MarketId::new();
    let ledger = Ledger::new();
    let mut book = OrderBook::new(market, Outcome::Yes);

    for name in ["maker1", "maker2"] {
        ledger.deposit(&user(name), 400_000).unwrap();
        ledger.mint(&user(name), market, 40).unwrap();
    }
    ledger.deposit(&user("taker"), 1_000_000).unwrap();

    let first = order(market, "maker1", Side::Sell, 5000, 40);
    let first_id = first.id;
    submit(&ledger, &mut book, first);
    let second = order(market, "maker2", Side::Sell, 5000, 40);
    let second_id = second.id;
    submit(&ledger, &mut book, second);

    let placement = submit(&ledger, &mut book, order(market, "taker", Side::Buy, 5000, 100));

    assert_eq!(placement.trades.len(), 2);
    assert_eq!(placement.trades[0].sell_order_id, first_id, "older order first");
    assert_eq!(placement.trades[1].sell_order_id, second_id);
    assert_eq!(placement.order.remaining(), 20);

    let snap = book.snapshot();
    assert_eq!(
        snap.bids,
        vec![LevelSnapshot { price: 5000, quantity: 20, count: 1 }],
        "remainder rests as a bid level"
    );
    assert!(snap.asks.is_empty());
}

#[test]
fn no_cross_leaves_spread() {
    let market = MarketId::new();
    let ledger = Ledger::new();
    let mut book = OrderBook::new(market, Outcome::Yes);

    ledger.deposit(&user("buyer"), 100_000).unwrap();
    ledger.deposit(&user("seller"), 100_000).unwrap();
    ledger.mint(&user("seller"), market, 10).unwrap();

    let buy = submit(&ledger, &mut book, order(market, "buyer", Side::Buy, 4000, 10));
    let sell = submit(&ledger, &mut book, order(market, "seller", Side::Sell, 6000, 10));
    assert!(buy.trades.is_empty());
    assert!(sell.trades.is_empty());

    let snap = book.snapshot();
    assert_eq!(snap.bids, vec![LevelSnapshot { price: 4000, quantity: 10, count: 1 }]);
    assert_eq!(snap.asks, vec![LevelSnapshot { price: 6000, quantity: 10, count: 1 }]);
    assert_eq!(book.spread(), Some(2000));
}

#[test]
fn cancelled_order_is_never_selected() {
    let market = MarketId::new();
    let ledger = Ledger::new();
    let mut book = OrderBook::new(market, Outcome::Yes);

    ledger.deposit(&user("seller"), 100_000).unwrap();
    ledger.mint(&user("seller"), market, 10).unwrap();
    ledger.deposit(&user("buyer"), 100_000).unwrap();

    let sell = order(market, "seller", Side::Sell, 5000, 10);
    let sell_id = sell.id;
    submit(&ledger, &mut book, sell);
    book.cancel(&sell_id).unwrap();

    let placement = submit(&ledger, &mut book, order(market, "buyer", Side::Buy, 5000, 10));
    assert!(
        placement.trades.is_empty(),
        "a cancelled order must never be top of book"
    );
    assert_eq!(ledger.balance_of(&user("buyer")), 100_000, "no funds moved");
}

// =====================================================================
// Properties over a mixed run
// =====================================================================

#[test]
fn conservation_and_nonnegativity_over_mixed_run() {
    let market = MarketId::new();
    let ledger = Ledger::new();
    let mut book = OrderBook::new(market, Outcome::Yes);

    let users = ["u1", "u2", "u3"];
    for name in users {
        ledger.deposit(&user(name), 2_000_000).unwrap();
    }
    ledger.mint(&user("u1"), market, 80).unwrap();
    ledger.mint(&user("u2"), market, 40).unwrap();

    let script: &[(&str, Side, u64, u64)] = &[
        ("u1", Side::Sell, 5500, 30),
        ("u3", Side::Buy, 5500, 20),
        ("u2", Side::Sell, 5200, 25),
        ("u3", Side::Buy, 6000, 40),
        ("u1", Side::Sell, 4800, 10),
        ("u3", Side::Buy, 4500, 5),
    ];
    for &(who, side, price, qty) in script {
        submit(&ledger, &mut book, order(market, who, side, price, qty));
    }
    ledger.redeem(&user("u1"), market, 10).unwrap();

    // Outcome conservation: every YES share has a NO twin somewhere.
    let positions = ledger.list_positions(market);
    let yes_total: u64 = positions.iter().map(|p| p.yes_shares).sum();
    let no_total: u64 = positions.iter().map(|p| p.no_shares).sum();
    assert_eq!(yes_total, no_total);
    assert_eq!(yes_total, 110, "120 minted minus 10 redeemed");

    // Value conservation: deposits in, nothing out yet except redemption
    // which converts pairs back 1:1, so cash + pair value is constant.
    let cash: u64 = users.iter().map(|name| ledger.balance_of(&user(name))).sum();
    assert_eq!(cash + yes_total * 10_000, 6_000_000);
}

#[test]
fn price_improvement_always_executes_at_resting_price() {
    let market = MarketId::new();
    let ledger = Ledger::new();
    let mut book = OrderBook::new(market, Outcome::Yes);

    ledger.deposit(&user("maker"), 500_000).unwrap();
    ledger.mint(&user("maker"), market, 50).unwrap();
    ledger.deposit(&user("taker"), 500_000).unwrap();

    submit(&ledger, &mut book, order(market, "maker", Side::Sell, 3000, 10));
    submit(&ledger, &mut book, order(market, "maker", Side::Sell, 3500, 10));

    let placement = submit(&ledger, &mut book, order(market, "taker", Side::Buy, 9000, 20));
    assert_eq!(placement.trades.len(), 2);
    for trade in &placement.trades {
        assert_ne!(trade.price, 9000, "taker's limit never leaks into the fill");
    }
    assert_eq!(placement.trades[0].price, 3000);
    assert_eq!(placement.trades[1].price, 3500);

    // Taker paid the improved prices.
    assert_eq!(
        ledger.balance_of(&user("taker")),
        500_000 - (3000 * 10 + 3500 * 10)
    );
}
