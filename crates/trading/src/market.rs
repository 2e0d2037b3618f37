//! A group's market: exchange callbacks plus the single-active-order rule.
//!
//! Every player has at most one ACTIVE order per side. Entering an order
//! on a side cancels whatever else the player has active on that side,
//! either before the new order reaches the exchange or right after the
//! exchange confirms it (see [`ReplacePolicy`]). Accepting someone else's
//! order counts as an order on the opposite side. Trade confirmations
//! reconcile the tracked references against what the exchange still holds.

use chrono::{DateTime, Duration, Utc};
use markets_core::{
    Error, MarketConfig, Order, OrderId, ReplacePolicy, Result, Side, Trade,
};
use tracing::{debug, info, warn};

use crate::exchange::{Exchange, OrderFilter, OrderRequest};
use crate::trader::{Shortfall, TrackedOrder, Trader};

/// Why a player event was refused without touching any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The round already has an end timestamp.
    RoundEnded,
    /// Non-positive volume or negative price.
    InvalidOrder,
    InsufficientCash,
    InsufficientAssets,
    /// A player tried to accept their own order.
    OwnOrder,
    /// The order to accept is missing or no longer active.
    OrderNotActive,
}

impl From<Shortfall> for RejectReason {
    fn from(s: Shortfall) -> Self {
        match s {
            Shortfall::Cash => RejectReason::InsufficientCash,
            Shortfall::Assets => RejectReason::InsufficientAssets,
        }
    }
}

/// Result of a player-initiated order event.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome<T> {
    Accepted(T),
    Rejected(RejectReason),
}

impl<T> OrderOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, OrderOutcome::Accepted(_))
    }

    /// The accepted value, if any.
    pub fn accepted(self) -> Option<T> {
        match self {
            OrderOutcome::Accepted(v) => Some(v),
            OrderOutcome::Rejected(_) => None,
        }
    }
}

/// Per-round trading rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketRules {
    pub policy: ReplacePolicy,
    pub allow_short: bool,
    /// Trading period in seconds.
    pub period_length: u64,
}

impl MarketRules {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            policy: config.order_replacement,
            allow_short: config.allow_short,
            period_length: config.period_length,
        }
    }
}

impl Default for MarketRules {
    fn default() -> Self {
        Self {
            policy: ReplacePolicy::default(),
            allow_short: false,
            period_length: 120,
        }
    }
}

/// One group's market.
pub struct Market<E: Exchange> {
    exchange: E,
    /// Traders in group order.
    traders: Vec<Trader>,
    rules: MarketRules,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl<E: Exchange> Market<E> {
    /// Create a market over an exchange.
    pub fn new(exchange: E, traders: Vec<Trader>, rules: MarketRules) -> Self {
        Self {
            exchange,
            traders,
            rules,
            start_time: None,
            end_time: None,
        }
    }

    pub fn rules(&self) -> MarketRules {
        self.rules
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut E {
        &mut self.exchange
    }

    pub fn traders(&self) -> &[Trader] {
        &self.traders
    }

    pub fn trader(&self, pcode: &str) -> Option<&Trader> {
        self.traders.iter().find(|t| t.pcode == pcode)
    }

    fn trader_index(&self, pcode: &str) -> Result<usize> {
        self.traders
            .iter()
            .position(|t| t.pcode == pcode)
            .ok_or_else(|| Error::UnknownTrader(pcode.to_string()))
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }

    /// Open the market.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_none() {
            self.start_time = Some(now);
            info!(traders = self.traders.len(), "market started");
        }
    }

    /// Close the market. Later player events are dropped.
    pub fn end(&mut self, now: DateTime<Utc>) {
        if self.end_time.is_none() {
            self.end_time = Some(now);
            info!(elapsed_secs = ?self.start_time.map(|s| (now - s).num_seconds()), "market ended");
        }
    }

    /// End the market once the trading period has elapsed. Returns whether
    /// the market is ended afterwards.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if let (Some(start), None) = (self.start_time, self.end_time) {
            let period = Duration::seconds(self.rules.period_length as i64);
            if now - start >= period {
                self.end(now);
            }
        }
        self.is_ended()
    }

    /// Active orders of a player on one side.
    pub fn active_orders(&self, pcode: &str, side: Side) -> Vec<Order> {
        self.exchange.orders(&OrderFilter::active(pcode, side))
    }

    /// Handle a player's new order.
    pub fn enter_order(
        &mut self,
        pcode: &str,
        side: Side,
        price: i64,
        volume: i64,
        now: DateTime<Utc>,
    ) -> Result<OrderOutcome<Order>> {
        if let Some(end) = self.end_time {
            warn!(
                pcode,
                ?side,
                price,
                volume,
                ended_at = %end,
                "order entered after round end, dropping"
            );
            return Ok(OrderOutcome::Rejected(RejectReason::RoundEnded));
        }
        let idx = self.trader_index(pcode)?;
        if price < 0 || volume <= 0 {
            return Ok(OrderOutcome::Rejected(RejectReason::InvalidOrder));
        }
        if !self.rules.allow_short {
            if let Err(shortfall) = self.traders[idx].check_available(side, price, volume) {
                debug!(pcode, ?side, price, volume, ?shortfall, "order not funded");
                return Ok(OrderOutcome::Rejected(shortfall.into()));
            }
        }

        let request = OrderRequest {
            pcode: pcode.to_string(),
            side,
            price,
            volume,
            timestamp: now,
        };
        let order = match self.rules.policy {
            ReplacePolicy::CancelBeforeEnter => {
                self.cancel_active(pcode, side, None)?;
                self.exchange.enter_order(request)?
            }
            ReplacePolicy::CancelAfterConfirm => {
                let order = self.exchange.enter_order(request)?;
                self.cancel_active(pcode, side, Some(order.id))?;
                order
            }
        };

        self.traders[idx].set_current(
            side,
            Some(TrackedOrder {
                id: order.id,
                price: order.price,
            }),
        );
        debug!(pcode, order_id = order.id, ?side, price, volume, "order entered");
        Ok(OrderOutcome::Accepted(order))
    }

    /// Handle a player taking someone else's resting order in full.
    ///
    /// The acceptance is an implicit order on the opposite side of the
    /// resting one, so the accepting player's active order on that side is
    /// cancelled.
    pub fn accept_order(
        &mut self,
        pcode: &str,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<OrderOutcome<Trade>> {
        if let Some(end) = self.end_time {
            warn!(pcode, order_id, ended_at = %end, "order accepted after round end, dropping");
            return Ok(OrderOutcome::Rejected(RejectReason::RoundEnded));
        }
        let idx = self.trader_index(pcode)?;
        let resting = match self.exchange.order(order_id) {
            Some(o) if o.is_active() => o,
            _ => return Ok(OrderOutcome::Rejected(RejectReason::OrderNotActive)),
        };
        if resting.pcode == pcode {
            return Ok(OrderOutcome::Rejected(RejectReason::OwnOrder));
        }

        let side = resting.side().opposite();
        if !self.rules.allow_short {
            if let Err(shortfall) =
                self.traders[idx].check_available(side, resting.price, resting.volume)
            {
                debug!(pcode, order_id, ?shortfall, "acceptance not funded");
                return Ok(OrderOutcome::Rejected(shortfall.into()));
            }
        }

        if self.rules.policy == ReplacePolicy::CancelBeforeEnter {
            self.cancel_active(pcode, side, None)?;
        }
        let trade = self.exchange.accept_order(order_id, pcode, now)?;
        if self.rules.policy == ReplacePolicy::CancelAfterConfirm {
            self.cancel_active(pcode, side, None)?;
        }

        self.confirm_trade(&trade)?;
        Ok(OrderOutcome::Accepted(trade))
    }

    /// Handle a player's cancel request. Cancelling a missing, inactive or
    /// foreign order is a no-op.
    pub fn cancel_order(&mut self, pcode: &str, order_id: OrderId) -> Result<Option<Order>> {
        if let Some(end) = self.end_time {
            warn!(pcode, order_id, ended_at = %end, "cancel after round end, dropping");
            return Ok(None);
        }
        match self.exchange.order(order_id) {
            Some(o) if o.pcode == pcode => {}
            _ => return Ok(None),
        }
        let canceled = self.exchange.cancel_order(order_id)?;
        if let Some(order) = &canceled {
            self.confirm_cancel(order);
        }
        Ok(canceled)
    }

    /// Cancel every active order of a player on a side except `keep`.
    fn cancel_active(&mut self, pcode: &str, side: Side, keep: Option<OrderId>) -> Result<usize> {
        let mut canceled = 0;
        for order in self.active_orders(pcode, side) {
            if Some(order.id) == keep {
                continue;
            }
            if let Some(order) = self.exchange.cancel_order(order.id)? {
                debug!(pcode, order_id = order.id, ?side, "replaced order canceled");
                self.confirm_cancel(&order);
                canceled += 1;
            }
        }
        Ok(canceled)
    }

    /// Exchange callback: an order was cancelled.
    pub fn confirm_cancel(&mut self, order: &Order) {
        let side = order.side();
        if let Some(trader) = self.traders.iter_mut().find(|t| t.pcode == order.pcode) {
            if trader.current(side).map(|t| t.id) == Some(order.id) {
                trader.set_current(side, None);
            }
        }
    }

    /// Exchange callback: a trade was executed.
    ///
    /// Settles every touched player's holdings, then reconciles tracked
    /// references: a fully consumed order is cleared; a residual at the
    /// tracked price stays tracked; a residual at any other price is stale
    /// and gets cancelled.
    pub fn confirm_trade(&mut self, trade: &Trade) -> Result<()> {
        let taker = &trade.taking_order;
        for maker in &trade.making_orders {
            let (price, volume) = (maker.price, maker.traded_volume);
            for (pcode, side) in [(&maker.pcode, maker.side()), (&taker.pcode, taker.side())] {
                match self.traders.iter_mut().find(|t| &t.pcode == pcode) {
                    Some(trader) => trader.settled.apply_fill(side, price, volume),
                    None => debug!(%pcode, trade_id = trade.id, "trade party outside this market"),
                }
            }
        }
        info!(
            trade_id = trade.id,
            volume = trade.volume(),
            taker = %taker.pcode,
            "trade confirmed"
        );

        for order in trade.touched_orders() {
            self.reconcile(order)?;
        }
        Ok(())
    }

    fn reconcile(&mut self, order: &Order) -> Result<()> {
        let Some(idx) = self.traders.iter().position(|t| t.pcode == order.pcode) else {
            return Ok(());
        };
        let side = order.side();
        let tracked = match self.traders[idx].current(side) {
            Some(t) if t.id == order.id => t,
            _ => return Ok(()),
        };

        let mut kept = None;
        for residual in self.active_orders(&order.pcode, side) {
            if kept.is_none() && residual.price == tracked.price {
                kept = Some(TrackedOrder {
                    id: residual.id,
                    price: residual.price,
                });
            } else {
                warn!(
                    pcode = %order.pcode,
                    order_id = residual.id,
                    price = residual.price,
                    tracked_price = tracked.price,
                    "stale order after trade, canceling"
                );
                self.exchange.cancel_order(residual.id)?;
            }
        }

        if kept.is_none() {
            debug!(pcode = %order.pcode, order_id = order.id, "tracked order consumed");
        }
        self.traders[idx].set_current(side, kept);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryExchange;
    use chrono::TimeZone;
    use markets_core::{Holdings, OrderStatus};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_market(policy: ReplacePolicy) -> Market<InMemoryExchange> {
        let traders = vec![
            Trader::new("alice", 1, Holdings::new(10, 1000)),
            Trader::new("bob", 2, Holdings::new(10, 1000)),
        ];
        let rules = MarketRules {
            policy,
            ..Default::default()
        };
        let mut market = Market::new(InMemoryExchange::new(), traders, rules);
        market.start(t(0));
        market
    }

    fn enter(
        m: &mut Market<InMemoryExchange>,
        pcode: &str,
        side: Side,
        price: i64,
        volume: i64,
    ) -> Order {
        m.enter_order(pcode, side, price, volume, t(1))
            .unwrap()
            .accepted()
            .unwrap()
    }

    #[test]
    fn test_second_order_replaces_first() {
        for policy in [ReplacePolicy::CancelBeforeEnter, ReplacePolicy::CancelAfterConfirm] {
            let mut m = make_market(policy);
            let first = enter(&mut m, "alice", Side::Bid, 20, 2);
            let second = enter(&mut m, "alice", Side::Bid, 25, 1);

            let active = m.active_orders("alice", Side::Bid);
            assert_eq!(active.len(), 1, "{policy:?}");
            assert_eq!(active[0].id, second.id);
            assert_eq!(m.exchange().order(first.id).unwrap().status, OrderStatus::Canceled);
            assert_eq!(m.trader("alice").unwrap().current_bid.unwrap().id, second.id);
        }
    }

    #[test]
    fn test_sides_are_independent() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        let bid = enter(&mut m, "alice", Side::Bid, 20, 2);
        let ask = enter(&mut m, "alice", Side::Ask, 30, 2);

        let alice = m.trader("alice").unwrap();
        assert_eq!(alice.current_bid.unwrap().id, bid.id);
        assert_eq!(alice.current_ask.unwrap().id, ask.id);
    }

    #[test]
    fn test_order_after_end_dropped() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        m.end(t(5));

        let outcome = m.enter_order("alice", Side::Bid, 20, 1, t(6)).unwrap();
        assert_eq!(outcome, OrderOutcome::Rejected(RejectReason::RoundEnded));
        assert!(m.active_orders("alice", Side::Bid).is_empty());
        assert!(m.trader("alice").unwrap().current_bid.is_none());
    }

    #[test]
    fn test_unfunded_order_rejected_without_cancel() {
        let mut m = make_market(ReplacePolicy::CancelBeforeEnter);
        let bid = enter(&mut m, "alice", Side::Bid, 20, 2);

        let outcome = m.enter_order("alice", Side::Bid, 500, 3, t(2)).unwrap();
        assert_eq!(outcome, OrderOutcome::Rejected(RejectReason::InsufficientCash));
        assert_eq!(m.active_orders("alice", Side::Bid)[0].id, bid.id);

        let outcome = m.enter_order("alice", Side::Ask, 10, 11, t(2)).unwrap();
        assert_eq!(outcome, OrderOutcome::Rejected(RejectReason::InsufficientAssets));
    }

    #[test]
    fn test_overflowing_bid_cost_rejected() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);

        let outcome = m
            .enter_order("alice", Side::Bid, i64::MAX / 2 + 1, 2, t(1))
            .unwrap();
        assert_eq!(outcome, OrderOutcome::Rejected(RejectReason::InsufficientCash));
        assert!(m.active_orders("alice", Side::Bid).is_empty());
    }

    #[test]
    fn test_allow_short_skips_availability() {
        let traders = vec![Trader::new("alice", 1, Holdings::new(0, 0))];
        let rules = MarketRules {
            allow_short: true,
            ..Default::default()
        };
        let mut m = Market::new(InMemoryExchange::new(), traders, rules);

        assert!(m.enter_order("alice", Side::Ask, 10, 5, t(0)).unwrap().is_accepted());
    }

    #[test]
    fn test_unknown_trader_is_error() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        assert!(matches!(
            m.enter_order("carol", Side::Bid, 1, 1, t(1)),
            Err(Error::UnknownTrader(_))
        ));
    }

    #[test]
    fn test_accept_settles_and_clears() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        let ask = enter(&mut m, "bob", Side::Ask, 20, 2);
        let alice_bid = enter(&mut m, "alice", Side::Bid, 15, 1);

        let trade = m.accept_order("alice", ask.id, t(3)).unwrap().accepted().unwrap();

        assert_eq!(trade.volume(), 2);
        assert_eq!(m.trader("alice").unwrap().settled, Holdings::new(12, 960));
        assert_eq!(m.trader("bob").unwrap().settled, Holdings::new(8, 1040));
        // bob's ask was consumed
        assert!(m.trader("bob").unwrap().current_ask.is_none());
        // accepting an ask is an implicit bid: alice's resting bid goes away
        assert_eq!(m.exchange().order(alice_bid.id).unwrap().status, OrderStatus::Canceled);
        assert!(m.trader("alice").unwrap().current_bid.is_none());
    }

    #[test]
    fn test_accept_own_order_rejected() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        let ask = enter(&mut m, "bob", Side::Ask, 20, 2);
        let outcome = m.accept_order("bob", ask.id, t(2)).unwrap();
        assert_eq!(outcome, OrderOutcome::Rejected(RejectReason::OwnOrder));
    }

    #[test]
    fn test_accept_inactive_rejected() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        let ask = enter(&mut m, "bob", Side::Ask, 20, 2);
        m.cancel_order("bob", ask.id).unwrap();

        let outcome = m.accept_order("alice", ask.id, t(2)).unwrap();
        assert_eq!(outcome, OrderOutcome::Rejected(RejectReason::OrderNotActive));
    }

    #[test]
    fn test_partial_fill_keeps_tracking() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        let ask = enter(&mut m, "bob", Side::Ask, 20, 5);
        let bid = enter(&mut m, "alice", Side::Bid, 20, 2);

        let trade = m.exchange_mut().execute(bid.id, &[(ask.id, 2)], t(4)).unwrap();
        m.confirm_trade(&trade).unwrap();

        let bob = m.trader("bob").unwrap();
        assert_eq!(bob.current_ask, Some(TrackedOrder { id: ask.id, price: 20 }));
        assert_eq!(bob.settled, Holdings::new(8, 1040));
        assert!(m.trader("alice").unwrap().current_bid.is_none());
    }

    #[test]
    fn test_stale_residual_canceled() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        let ask = enter(&mut m, "bob", Side::Ask, 20, 2);
        // an order the overlay never saw, at a different price
        let stray = m
            .exchange_mut()
            .enter_order(OrderRequest {
                pcode: "bob".into(),
                side: Side::Ask,
                price: 35,
                volume: 1,
                timestamp: t(2),
            })
            .unwrap();
        let bid = enter(&mut m, "alice", Side::Bid, 20, 2);

        let trade = m.exchange_mut().execute(bid.id, &[(ask.id, 2)], t(4)).unwrap();
        m.confirm_trade(&trade).unwrap();

        assert!(m.trader("bob").unwrap().current_ask.is_none());
        assert_eq!(m.exchange().order(stray.id).unwrap().status, OrderStatus::Canceled);
        assert!(m.active_orders("bob", Side::Ask).is_empty());
    }

    #[test]
    fn test_cancel_clears_tracking() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        let bid = enter(&mut m, "alice", Side::Bid, 20, 2);

        // bob cannot cancel alice's order
        assert!(m.cancel_order("bob", bid.id).unwrap().is_none());
        assert!(m.cancel_order("alice", bid.id).unwrap().is_some());
        assert!(m.trader("alice").unwrap().current_bid.is_none());
        // second cancel is a no-op
        assert!(m.cancel_order("alice", bid.id).unwrap().is_none());
    }

    #[test]
    fn test_expire_after_period() {
        let mut m = make_market(ReplacePolicy::CancelAfterConfirm);
        assert!(!m.expire(t(119)));
        assert!(m.expire(t(120)));
        assert_eq!(m.end_time(), Some(t(120)));
    }
}
