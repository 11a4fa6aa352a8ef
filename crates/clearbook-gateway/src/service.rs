//! Orchestration: the typed operation surface the edge exposes.
//!
//! Every request flows the same way: validate the market and the user's
//! capacity, run the matching engine, settle the trades against the ledger,
//! fan the updates out, and finally nudge the settlement channel. Each step
//! takes and releases its own lock; nothing here holds two component locks
//! at once.
//!
//! Channel updates are deliberately fire-and-forget: the in-memory ledger
//! is authoritative, and a clearinghouse hiccup must never undo a matched
//! trade or fail the submitter's request.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clearbook_channel::{Allocations, SessionManager, WireAllocation};
use clearbook_engine::{fanout_factory, BookRegistry, BookSnapshot, Ledger};
use clearbook_market::MarketBoard;
use clearbook_types::{
    constants, ChannelId, Error, Market, MarketId, Order, OrderId, Outcome, Position, Result,
    ServiceConfig, Side, Trade, UserId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::event::{Event, OrderbookEvent};
use crate::hub::Hub;

// ---------------------------------------------------------------------------
// Request / response shapes (the REST surface, minus the HTTP framing)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMarketRequest {
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    /// RFC3339.
    pub resolves_at: String,
    pub creator_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveMarketRequest {
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveMarketResponse {
    pub market: Market,
    pub total_payout: u64,
    pub positions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub user_id: String,
    /// Basis points.
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub user_id: UserId,
    pub balance: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MintRequest {
    pub user_id: String,
    pub market_id: MarketId,
    /// Share pairs.
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharesResponse {
    pub user_id: UserId,
    pub market_id: MarketId,
    pub yes_shares: u64,
    pub no_shares: u64,
    pub balance: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub market_id: MarketId,
    pub outcome_id: String,
    pub side: String,
    /// Basis points, 0..=10 000.
    pub price: u64,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderResponse {
    pub order: Order,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderbookResponse {
    pub outcome: Outcome,
    #[serde(flatten)]
    pub book: BookSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderResponse {
    pub status: String,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionResponse {
    pub user_id: UserId,
    pub balance: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub participants: Vec<String>,
    #[serde(default)]
    pub allocations: Vec<WireAllocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    pub channel_id: ChannelId,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettleRequest {
    pub channel_id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettleResponse {
    pub status: String,
    pub channel_id: ChannelId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// One market's settlement-channel mirror: the channel it reports into and
/// the allocation state governing what gets transmitted. The allocation
/// total is fixed when the channel opens; trades only move value inside it.
struct MarketChannel {
    channel_id: ChannelId,
    allocations: Arc<Allocations>,
}

/// The orchestration layer. Owns nothing exclusively; composes the engine,
/// market board, hub, and (optionally) the channel subsystem.
pub struct Service {
    config: ServiceConfig,
    markets: Arc<MarketBoard>,
    books: Arc<BookRegistry>,
    ledger: Arc<Ledger>,
    hub: Arc<Hub>,
    sessions: Option<Arc<SessionManager>>,
    /// Which channel mirrors which market.
    market_channels: Arc<Mutex<HashMap<MarketId, MarketChannel>>>,
}

impl Service {
    /// Assemble the service and wire trade fan-out into the hub: every
    /// match on any book is pushed the moment it executes, before the
    /// post-place orderbook event.
    #[must_use]
    pub fn new(
        config: ServiceConfig,
        markets: Arc<MarketBoard>,
        books: Arc<BookRegistry>,
        ledger: Arc<Ledger>,
        hub: Arc<Hub>,
        sessions: Option<Arc<SessionManager>>,
    ) -> Arc<Self> {
        let fanout_hub = Arc::clone(&hub);
        books.set_global_trade_callback(fanout_factory(move |trade: &Trade| {
            fanout_hub.broadcast(&Event::Trade(trade.clone()));
        }));

        Arc::new(Self {
            config,
            markets,
            books,
            ledger,
            hub,
            sessions,
            market_channels: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    #[must_use]
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // =================================================================
    // Markets
    // =================================================================

    pub fn create_market(&self, req: CreateMarketRequest) -> Result<Market> {
        if req.question.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "question is required".into(),
            });
        }
        let resolves_at = DateTime::parse_from_rfc3339(&req.resolves_at)
            .map_err(|_| Error::InvalidRequest {
                reason: "invalid resolves_at format, use RFC3339".into(),
            })?
            .with_timezone(&Utc);

        let market = self.markets.create(
            req.question,
            req.description,
            resolves_at,
            UserId::new(req.creator_id),
        );
        info!(market_id = %market.id, "market created");
        Ok(market)
    }

    #[must_use]
    pub fn list_markets(&self) -> Vec<Market> {
        self.markets.list()
    }

    pub fn get_market(&self, id: MarketId) -> Result<Market> {
        self.markets.get(id)
    }

    /// Resolve a market and pay out every winning position. Locks first if
    /// the market is still trading (manual resolution may beat the
    /// auto-lock sweep).
    pub fn resolve_market(&self, id: MarketId, req: ResolveMarketRequest) -> Result<ResolveMarketResponse> {
        let outcome = Outcome::parse(&req.outcome)?;

        match self.markets.lock(id) {
            Ok(_) => {}
            // Already locked is fine; anything else is the caller's problem.
            Err(Error::InvalidTransition) => {}
            Err(err) => return Err(err),
        }
        let market = self.markets.resolve(id, outcome)?;

        let positions = self.ledger.list_positions(id);
        let mut total_payout = 0;
        for position in &positions {
            total_payout += self.ledger.payout(&position.user_id, id, outcome);
        }
        info!(
            market_id = %id,
            %outcome,
            total_payout,
            holders = positions.len(),
            "market resolved"
        );

        Ok(ResolveMarketResponse {
            market,
            total_payout,
            positions: positions.len(),
        })
    }

    // =================================================================
    // Funds & shares
    // =================================================================

    pub fn deposit(&self, req: DepositRequest) -> Result<BalanceResponse> {
        let user_id = UserId::new(req.user_id);
        let balance = self.ledger.deposit(&user_id, req.amount)?;
        Ok(BalanceResponse { user_id, balance })
    }

    pub fn mint(&self, req: MintRequest) -> Result<SharesResponse> {
        self.markets.get(req.market_id)?;
        let user_id = UserId::new(req.user_id);
        let position = self.ledger.mint(&user_id, req.market_id, req.amount)?;
        Ok(self.shares_response(user_id, position))
    }

    pub fn redeem(&self, req: MintRequest) -> Result<SharesResponse> {
        self.markets.get(req.market_id)?;
        let user_id = UserId::new(req.user_id);
        let position = self.ledger.redeem(&user_id, req.market_id, req.amount)?;
        Ok(self.shares_response(user_id, position))
    }

    fn shares_response(&self, user_id: UserId, position: Position) -> SharesResponse {
        SharesResponse {
            balance: self.ledger.balance_of(&user_id),
            market_id: position.market_id,
            yes_shares: position.yes_shares,
            no_shares: position.no_shares,
            user_id,
        }
    }

    #[must_use]
    pub fn position(&self, user_id: &str, market_id: Option<MarketId>) -> PositionResponse {
        let user_id = UserId::new(user_id);
        PositionResponse {
            balance: self.ledger.balance_of(&user_id),
            position: market_id.map(|m| self.ledger.position(&user_id, m)),
            user_id,
        }
    }

    // =================================================================
    // Orders
    // =================================================================

    /// The full submission sequence: market gate, admission, matching,
    /// ledger settlement, fan-out, channel update.
    pub async fn place_order(&self, req: PlaceOrderRequest) -> Result<PlaceOrderResponse> {
        let market = self.markets.get(req.market_id)?;
        if !market.is_trading() {
            return Err(Error::MarketNotTrading);
        }
        let outcome = Outcome::parse(&req.outcome_id)?;
        let side = Side::parse(&req.side)?;

        let order = Order::new(
            UserId::new(req.user_id),
            req.market_id,
            outcome,
            side,
            req.price,
            req.quantity,
        );
        self.ledger.admit(&order)?;

        let book = self.books.book(req.market_id, outcome);
        let placement = book.lock().place(order)?;

        for trade in &placement.trades {
            // Admission ran under a different lock than matching, so a
            // pathological interleaving surfaces here as Internal.
            self.ledger.apply(trade)?;
        }

        self.broadcast_orderbook(req.market_id);

        if !placement.trades.is_empty() {
            self.spawn_channel_update(req.market_id, placement.trades.clone());
        }

        Ok(PlaceOrderResponse {
            order: placement.order,
            trades: placement.trades,
        })
    }

    pub fn cancel_order(
        &self,
        order_id: OrderId,
        market_id: MarketId,
        outcome: Outcome,
    ) -> Result<CancelOrderResponse> {
        let book = self.books.book(market_id, outcome);
        book.lock().cancel(&order_id)?;
        self.broadcast_orderbook(market_id);
        Ok(CancelOrderResponse {
            status: "cancelled".to_string(),
            order_id,
        })
    }

    #[must_use]
    pub fn orderbook(&self, market_id: MarketId, outcome: Outcome) -> OrderbookResponse {
        let book = self.books.book(market_id, outcome);
        let snapshot = book.lock().snapshot();
        OrderbookResponse {
            outcome,
            book: snapshot,
        }
    }

    #[must_use]
    pub fn trades(&self, market_id: MarketId, outcome: Outcome) -> Vec<Trade> {
        let book = self.books.book(market_id, outcome);
        let trades = book
            .lock()
            .recent_trades(constants::RECENT_TRADES_DEFAULT);
        trades
    }

    // =================================================================
    // Sessions & settlement
    // =================================================================

    pub async fn create_session(&self, req: CreateSessionRequest) -> Result<CreateSessionResponse> {
        let sessions = self.sessions()?;
        if req.participants.len() < 2 {
            return Err(Error::InvalidRequest {
                reason: "at least 2 participants required".into(),
            });
        }
        let session = sessions.create(req.participants, req.allocations).await?;
        Ok(CreateSessionResponse {
            channel_id: session.channel_id().clone(),
            status: "created".to_string(),
        })
    }

    pub async fn close_session(&self, channel_id: &ChannelId) -> Result<SettleResponse> {
        self.sessions()?.close(channel_id).await?;
        Ok(SettleResponse {
            status: "closed".to_string(),
            channel_id: channel_id.clone(),
            tx_hash: None,
        })
    }

    /// Settle a channel: `cooperative` closes the session (the
    /// clearinghouse finalizes on-chain); `dispute` records the intent.
    /// Submitting the latest signed state to the adjudicator contract
    /// happens outside this service.
    pub async fn settle(&self, req: SettleRequest) -> Result<SettleResponse> {
        let channel_id = ChannelId::new(req.channel_id);
        match req.kind.as_str() {
            "cooperative" => {
                if let Ok(sessions) = self.sessions() {
                    sessions.close(&channel_id).await?;
                }
                Ok(SettleResponse {
                    status: "settled".to_string(),
                    channel_id,
                    tx_hash: None,
                })
            }
            "dispute" => Ok(SettleResponse {
                status: "dispute_initiated".to_string(),
                channel_id,
                tx_hash: None,
            }),
            _ => Err(Error::InvalidRequest {
                reason: "type must be 'cooperative' or 'dispute'".into(),
            }),
        }
    }

    fn sessions(&self) -> Result<&Arc<SessionManager>> {
        self.sessions.as_ref().ok_or(Error::NotConnected {
            reason: "session manager not initialized".into(),
        })
    }

    // =================================================================
    // Fan-out & channel mirroring
    // =================================================================

    /// Push the bi-outcome snapshot for a market to every client.
    pub fn broadcast_orderbook(&self, market_id: MarketId) {
        let books = self.books.get_or_create(market_id);
        let yes = books.yes.lock().snapshot();
        let no = books.no.lock().snapshot();
        self.hub.broadcast(&Event::Orderbook(OrderbookEvent {
            market_id,
            yes,
            no,
        }));
    }

    /// Mirror a batch of matched trades onto the market's settlement
    /// channel in the background. Best effort by design.
    fn spawn_channel_update(&self, market_id: MarketId, trades: Vec<Trade>) {
        let Some(sessions) = self.sessions.clone() else {
            return;
        };
        let ledger = Arc::clone(&self.ledger);
        let books = Arc::clone(&self.books);
        let channels = Arc::clone(&self.market_channels);
        let asset = self.config.default_asset.clone();

        tokio::spawn(async move {
            if let Err(err) =
                update_channel(sessions, ledger, books, channels, asset, market_id, trades).await
            {
                warn!(market_id = %market_id, error = %err, "channel update failed; will retry on next trade");
            }
        });
    }
}

/// Transmit the market's next channel state. The first batch opens the
/// session and seeds its allocation state from the ledger; afterwards the
/// channel's view evolves only by applying trades to that state, so the
/// total staked on the channel never drifts from its opening value.
async fn update_channel(
    sessions: Arc<SessionManager>,
    ledger: Arc<Ledger>,
    books: Arc<BookRegistry>,
    channels: Arc<Mutex<HashMap<MarketId, MarketChannel>>>,
    asset: String,
    market_id: MarketId,
    trades: Vec<Trade>,
) -> Result<()> {
    let existing = channels.lock().get(&market_id).map(|mirror| {
        (mirror.channel_id.clone(), Arc::clone(&mirror.allocations))
    });

    let (session, allocations) = match existing {
        Some((channel_id, allocations)) => {
            let Some(session) = sessions.get(&channel_id) else {
                // Session closed out from under the mirror; forget it so
                // the next batch opens a fresh channel.
                channels.lock().remove(&market_id);
                return Err(Error::SessionNotFound(channel_id));
            };

            // The seed already reflects the opening batch; later batches
            // move value between participants, conserving the total.
            for trade in &trades {
                if let Err(err) = allocations.apply_trade(
                    trade.buyer_id.as_str(),
                    trade.seller_id.as_str(),
                    trade.price,
                    trade.quantity,
                ) {
                    warn!(
                        market_id = %market_id,
                        trade_id = %trade.id,
                        error = %err,
                        "trade not representable on channel; allocation unchanged"
                    );
                }
            }
            (session, allocations)
        }
        None => {
            // First trades for this market: stake each holder's combined
            // share count and open the session on that total.
            let positions = ledger.list_positions(market_id);
            if positions.is_empty() {
                return Ok(());
            }
            let initial: HashMap<String, u64> = positions
                .iter()
                .map(|p| (p.user_id.to_string(), p.yes_shares + p.no_shares))
                .collect();
            let mut participants: Vec<String> = initial.keys().cloned().collect();
            participants.sort();

            let seed: Vec<WireAllocation> = participants
                .iter()
                .map(|participant| WireAllocation {
                    participant: participant.clone(),
                    asset: asset.clone(),
                    amount: initial[participant].to_string(),
                })
                .collect();

            let session = sessions.create(participants, seed).await?;
            let allocations = Arc::new(Allocations::new(
                session.channel_id().clone(),
                asset.clone(),
                initial,
            ));
            channels.lock().insert(
                market_id,
                MarketChannel {
                    channel_id: session.channel_id().clone(),
                    allocations: Arc::clone(&allocations),
                },
            );
            (session, allocations)
        }
    };

    // The signed app data is the book state the allocations were drawn from.
    let app_data = match books.get(market_id) {
        Some(pair) => {
            let yes = pair.yes.lock().snapshot();
            let no = pair.no.lock().snapshot();
            serde_json::to_string(&serde_json::json!({
                "market_id": market_id,
                "YES": yes,
                "NO": no,
            }))?
        }
        None => String::new(),
    };

    session.update(allocations.to_wire(), app_data).await
}
