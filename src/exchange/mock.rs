//! Paper trading venue for dry runs and tests.
//!
//! Fills orders immediately against the latest known top of book. Market data
//! either comes from a scripted snapshot sequence or is forwarded to a live
//! feed client.

use super::error::VenueError;
use super::traits::{VenueClient, VenueResult};
use super::types::*;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Simulated position for one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperPosition {
    pub side: PositionSide,
    pub size: Decimal,
    pub entry_price: Decimal,
}

/// Simulated account state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperAccountState {
    /// `None` simulates a venue that reports no collateral entry
    pub balance: Option<Decimal>,
    pub positions: HashMap<String, PaperPosition>,
    pub open_orders: Vec<OrderAck>,
    pub realized_pnl: Decimal,
    pub order_count: u64,
}

impl Default for PaperAccountState {
    fn default() -> Self {
        Self {
            balance: Some(dec!(1000)),
            positions: HashMap::new(),
            open_orders: Vec::new(),
            realized_pnl: Decimal::ZERO,
            order_count: 0,
        }
    }
}

#[derive(Debug, Default)]
struct PaperMarket {
    /// Snapshots served in order before falling back to `last`
    script: VecDeque<Option<MarketSnapshot>>,
    last: Option<MarketSnapshot>,
    metadata: HashMap<String, InstrumentMetadata>,
}

/// Paper trading client implementing [`VenueClient`].
pub struct PaperVenueClient {
    state: Arc<RwLock<PaperAccountState>>,
    market: Arc<RwLock<PaperMarket>>,
    feed: Option<Arc<dyn VenueClient>>,
    order_id_counter: AtomicU64,
    /// Orders to reject before accepting again
    failing_orders: AtomicUsize,
    /// Snapshot reads to fail before succeeding again
    failing_reads: AtomicUsize,
    snapshot_requests: AtomicU64,
    auth_calls: AtomicU64,
    /// Leave limit orders resting instead of filling them
    rest_limit_orders: bool,
}

impl PaperVenueClient {
    /// Create a paper client with a starting balance and scripted market data.
    pub fn new(initial_balance: Decimal) -> Self {
        let state = PaperAccountState {
            balance: Some(initial_balance),
            ..Default::default()
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            market: Arc::new(RwLock::new(PaperMarket::default())),
            feed: None,
            order_id_counter: AtomicU64::new(1),
            failing_orders: AtomicUsize::new(0),
            failing_reads: AtomicUsize::new(0),
            snapshot_requests: AtomicU64::new(0),
            auth_calls: AtomicU64::new(0),
            rest_limit_orders: false,
        }
    }

    /// Create a paper client whose market data comes from a live feed.
    pub fn with_feed(initial_balance: Decimal, feed: Arc<dyn VenueClient>) -> Self {
        Self {
            feed: Some(feed),
            ..Self::new(initial_balance)
        }
    }

    /// Leave limit orders resting on the book instead of filling them.
    pub fn resting_limit_orders(mut self) -> Self {
        self.rest_limit_orders = true;
        self
    }

    /// Replace the current top of book.
    pub async fn set_snapshot(&self, snapshot: Option<MarketSnapshot>) {
        let mut market = self.market.write().await;
        market.script.clear();
        market.last = snapshot;
    }

    /// Queue snapshots to be served one per request.
    pub async fn push_snapshots(&self, snapshots: impl IntoIterator<Item = Option<MarketSnapshot>>) {
        self.market.write().await.script.extend(snapshots);
    }

    pub async fn set_metadata(&self, market: &str, metadata: InstrumentMetadata) {
        self.market
            .write()
            .await
            .metadata
            .insert(market.to_string(), metadata);
    }

    pub async fn set_balance(&self, balance: Option<Decimal>) {
        self.state.write().await.balance = balance;
    }

    pub async fn set_position(&self, market: &str, position: Option<PaperPosition>) {
        let mut state = self.state.write().await;
        match position {
            Some(p) => state.positions.insert(market.to_string(), p),
            None => state.positions.remove(market),
        };
    }

    /// Reject the next `count` order submissions.
    pub fn fail_next_orders(&self, count: usize) {
        self.failing_orders.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` snapshot reads with a transport error.
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Number of snapshot requests served so far.
    pub fn snapshot_requests(&self) -> u64 {
        self.snapshot_requests.load(Ordering::SeqCst)
    }

    pub fn auth_calls(&self) -> u64 {
        self.auth_calls.load(Ordering::SeqCst)
    }

    /// Get a copy of the simulated account state.
    pub async fn get_state(&self) -> PaperAccountState {
        self.state.read().await.clone()
    }

    fn next_order_id(&self) -> String {
        format!("paper-{}", self.order_id_counter.fetch_add(1, Ordering::SeqCst))
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn last_snapshot(&self) -> Option<MarketSnapshot> {
        self.market.read().await.last
    }

    /// Apply a fill to the simulated position and realize PnL on reductions.
    fn apply_fill(
        state: &mut PaperAccountState,
        market: &str,
        side: OrderSide,
        size: Decimal,
        price: Decimal,
    ) {
        let fill_side = match side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        };

        let mut realized = Decimal::ZERO;
        let updated = match state.positions.remove(market) {
            None => Some(PaperPosition {
                side: fill_side,
                size,
                entry_price: price,
            }),
            Some(pos) if pos.side == fill_side => {
                let total = pos.size + size;
                let entry_price = (pos.entry_price * pos.size + price * size) / total;
                Some(PaperPosition {
                    side: fill_side,
                    size: total,
                    entry_price,
                })
            }
            Some(pos) => {
                let closed = size.min(pos.size);
                realized = match pos.side {
                    PositionSide::Long => (price - pos.entry_price) * closed,
                    PositionSide::Short => (pos.entry_price - price) * closed,
                };
                if size < pos.size {
                    Some(PaperPosition {
                        size: pos.size - size,
                        ..pos
                    })
                } else if size > pos.size {
                    Some(PaperPosition {
                        side: fill_side,
                        size: size - pos.size,
                        entry_price: price,
                    })
                } else {
                    None
                }
            }
        };

        if let Some(position) = updated {
            state.positions.insert(market.to_string(), position);
        }
        state.realized_pnl += realized;
        if let Some(balance) = state.balance.as_mut() {
            *balance += realized;
        }
        state.order_count += 1;
    }
}

#[async_trait]
impl VenueClient for PaperVenueClient {
    async fn authenticate(&self) -> VenueResult<()> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_balance(&self) -> VenueResult<Option<Decimal>> {
        Ok(self.state.read().await.balance)
    }

    async fn get_market_snapshot(&self, market: &str) -> VenueResult<Option<MarketSnapshot>> {
        self.snapshot_requests.fetch_add(1, Ordering::SeqCst);

        if Self::take_failure(&self.failing_reads) {
            return Err(VenueError::Connection("simulated read failure".to_string()));
        }

        if let Some(feed) = &self.feed {
            let snapshot = feed.get_market_snapshot(market).await?;
            if snapshot.is_some() {
                self.market.write().await.last = snapshot;
            }
            return Ok(snapshot);
        }

        let mut state = self.market.write().await;
        if let Some(next) = state.script.pop_front() {
            if next.is_some() {
                state.last = next;
            }
            return Ok(next);
        }
        Ok(state.last)
    }

    async fn get_instrument_metadata(
        &self,
        market: &str,
    ) -> VenueResult<Option<InstrumentMetadata>> {
        if let Some(meta) = self.market.read().await.metadata.get(market) {
            return Ok(Some(*meta));
        }
        match &self.feed {
            Some(feed) => feed.get_instrument_metadata(market).await,
            None => Ok(None),
        }
    }

    async fn get_open_position(&self, market: &str) -> VenueResult<Option<Position>> {
        Ok(self
            .state
            .read()
            .await
            .positions
            .get(market)
            .filter(|p| p.size > Decimal::ZERO)
            .map(|p| Position {
                market: market.to_string(),
                side: p.side,
                size: p.size,
            }))
    }

    async fn submit_limit_order(&self, order: &LimitOrder) -> VenueResult<OrderAck> {
        if Self::take_failure(&self.failing_orders) {
            return Err(VenueError::Rejected("simulated order rejection".to_string()));
        }
        if order.size <= Decimal::ZERO || order.price <= Decimal::ZERO {
            return Err(VenueError::Rejected("size and price must be positive".to_string()));
        }

        let ack = OrderAck {
            order_id: self.next_order_id(),
            client_id: format!("paper_{}", order.market),
            market: order.market.clone(),
            side: order.side,
            size: order.size,
            price: Some(order.price),
        };

        let mut state = self.state.write().await;
        if self.rest_limit_orders {
            state.open_orders.push(ack.clone());
        } else {
            Self::apply_fill(&mut state, &order.market, order.side, order.size, order.price);
        }

        info!(
            order_id = %ack.order_id,
            market = %order.market,
            side = %order.side,
            size = %order.size,
            price = %order.price,
            resting = self.rest_limit_orders,
            "Paper limit order accepted"
        );
        Ok(ack)
    }

    async fn submit_market_order(&self, order: &MarketOrder) -> VenueResult<OrderAck> {
        if Self::take_failure(&self.failing_orders) {
            return Err(VenueError::Rejected("simulated order rejection".to_string()));
        }

        let snapshot = self
            .last_snapshot()
            .await
            .ok_or_else(|| VenueError::Rejected("no market price available".to_string()))?;
        let price = match order.side {
            OrderSide::Buy => snapshot.ask,
            OrderSide::Sell => snapshot.bid,
        };

        let mut state = self.state.write().await;
        let mut size = order.size;
        if order.reduce_only {
            let reducible = state
                .positions
                .get(&order.market)
                .filter(|p| p.side.closing_side() == order.side)
                .map(|p| p.size)
                .unwrap_or(Decimal::ZERO);
            if reducible <= Decimal::ZERO {
                return Err(VenueError::Rejected(
                    "reduce-only order would open a position".to_string(),
                ));
            }
            size = size.min(reducible);
        }

        Self::apply_fill(&mut state, &order.market, order.side, size, price);

        let ack = OrderAck {
            order_id: self.next_order_id(),
            client_id: format!("paper_mkt_{}", order.market),
            market: order.market.clone(),
            side: order.side,
            size,
            price: Some(price),
        };

        info!(
            order_id = %ack.order_id,
            market = %order.market,
            side = %order.side,
            size = %size,
            price = %price,
            reduce_only = order.reduce_only,
            "Paper market order filled"
        );
        Ok(ack)
    }

    async fn cancel_all_orders(&self, market: &str) -> VenueResult<usize> {
        let mut state = self.state.write().await;
        let before = state.open_orders.len();
        state.open_orders.retain(|o| o.market != market);
        let cancelled = before - state.open_orders.len();
        debug!(%market, cancelled, "Paper orders cancelled");
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET: &str = "BTC-USD-PERP";

    fn snapshot(bid: Decimal, ask: Decimal) -> MarketSnapshot {
        MarketSnapshot::new(bid, ask, dec!(10), dec!(10))
    }

    async fn client_with_book(bid: Decimal, ask: Decimal) -> PaperVenueClient {
        let client = PaperVenueClient::new(dec!(1000));
        client.set_snapshot(Some(snapshot(bid, ask))).await;
        client
    }

    fn limit_buy(size: Decimal, price: Decimal) -> LimitOrder {
        LimitOrder {
            market: MARKET.to_string(),
            side: OrderSide::Buy,
            size,
            price,
            time_in_force: TimeInForce::Gtc,
        }
    }

    #[tokio::test]
    async fn test_limit_buy_opens_long() {
        let client = client_with_book(dec!(100), dec!(101)).await;
        client
            .submit_limit_order(&limit_buy(dec!(2), dec!(100)))
            .await
            .unwrap();

        let position = client.get_open_position(MARKET).await.unwrap().unwrap();
        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.size, dec!(2));
        assert_eq!(client.get_state().await.order_count, 1);
    }

    #[tokio::test]
    async fn test_reduce_only_close_realizes_pnl() {
        let client = client_with_book(dec!(110), dec!(111)).await;
        client
            .set_position(
                MARKET,
                Some(PaperPosition {
                    side: PositionSide::Long,
                    size: dec!(2),
                    entry_price: dec!(100),
                }),
            )
            .await;

        let ack = client
            .submit_market_order(&MarketOrder {
                market: MARKET.to_string(),
                side: OrderSide::Sell,
                size: dec!(5),
                reduce_only: true,
            })
            .await
            .unwrap();

        assert_eq!(ack.size, dec!(2));
        assert!(client.get_open_position(MARKET).await.unwrap().is_none());
        let state = client.get_state().await;
        assert_eq!(state.realized_pnl, dec!(20));
        assert_eq!(state.balance, Some(dec!(1020)));
    }

    #[tokio::test]
    async fn test_reduce_only_without_position_rejected() {
        let client = client_with_book(dec!(100), dec!(101)).await;
        let result = client
            .submit_market_order(&MarketOrder {
                market: MARKET.to_string(),
                side: OrderSide::Sell,
                size: dec!(1),
                reduce_only: true,
            })
            .await;
        assert!(matches!(result, Err(VenueError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_scripted_snapshots_then_last() {
        let client = PaperVenueClient::new(dec!(1000));
        client
            .push_snapshots(vec![
                Some(snapshot(dec!(100), dec!(102))),
                None,
                Some(snapshot(dec!(100), dec!(101))),
            ])
            .await;

        let first = client.get_market_snapshot(MARKET).await.unwrap();
        assert_eq!(first.unwrap().ask, dec!(102));
        assert!(client.get_market_snapshot(MARKET).await.unwrap().is_none());
        let third = client.get_market_snapshot(MARKET).await.unwrap();
        assert_eq!(third.unwrap().ask, dec!(101));
        // Script exhausted: last valid snapshot repeats
        let fourth = client.get_market_snapshot(MARKET).await.unwrap();
        assert_eq!(fourth.unwrap().ask, dec!(101));
        assert_eq!(client.snapshot_requests(), 4);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let client = client_with_book(dec!(100), dec!(101)).await;
        client.fail_next_orders(1);
        client.fail_next_reads(1);

        assert!(client
            .submit_limit_order(&limit_buy(dec!(1), dec!(100)))
            .await
            .is_err());
        assert!(client
            .submit_limit_order(&limit_buy(dec!(1), dec!(100)))
            .await
            .is_ok());

        assert!(client.get_market_snapshot(MARKET).await.is_err());
        assert!(client.get_market_snapshot(MARKET).await.is_ok());
    }

    #[tokio::test]
    async fn test_resting_orders_cancelled() {
        let client = PaperVenueClient::new(dec!(1000)).resting_limit_orders();
        client
            .submit_limit_order(&limit_buy(dec!(1), dec!(100)))
            .await
            .unwrap();
        client
            .submit_limit_order(&limit_buy(dec!(1), dec!(99)))
            .await
            .unwrap();

        assert!(client.get_open_position(MARKET).await.unwrap().is_none());
        assert_eq!(client.cancel_all_orders(MARKET).await.unwrap(), 2);
        assert_eq!(client.cancel_all_orders(MARKET).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_all_positions_flattens_short() {
        let client = client_with_book(dec!(100), dec!(101)).await;
        client
            .set_position(
                MARKET,
                Some(PaperPosition {
                    side: PositionSide::Short,
                    size: dec!(0.5),
                    entry_price: dec!(105),
                }),
            )
            .await;

        assert_eq!(client.close_all_positions(MARKET).await.unwrap(), 1);
        assert!(client.get_open_position(MARKET).await.unwrap().is_none());
        assert_eq!(client.close_all_positions(MARKET).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_feed_forwards_market_data() {
        let feed = Arc::new(client_with_book(dec!(200), dec!(201)).await);
        feed.set_metadata(
            MARKET,
            InstrumentMetadata {
                tick_size: dec!(0.1),
                size_increment: dec!(0.001),
                min_notional: dec!(10),
            },
        )
        .await;

        let client = PaperVenueClient::with_feed(dec!(500), feed);
        let snapshot = client.get_market_snapshot(MARKET).await.unwrap().unwrap();
        assert_eq!(snapshot.bid, dec!(200));
        assert!(client
            .get_instrument_metadata(MARKET)
            .await
            .unwrap()
            .is_some());
        assert_eq!(client.get_balance().await.unwrap(), Some(dec!(500)));
    }
}
