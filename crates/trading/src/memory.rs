//! Recording in-memory exchange.
//!
//! Keeps orders and a trade log but never matches on entry: trades happen
//! only through [`Exchange::accept_order`] or [`InMemoryExchange::execute`].
//! Partially filled orders keep their id and price and stay active with the
//! remaining volume.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use markets_core::{Error, Order, OrderId, OrderStatus, Result, Trade};
use tracing::debug;

use crate::exchange::{Exchange, OrderFilter, OrderRequest};

/// In-memory exchange for a single group.
#[derive(Debug, Default)]
pub struct InMemoryExchange {
    orders: BTreeMap<OrderId, Order>,
    trades: Vec<Trade>,
    next_order_id: OrderId,
    next_trade_id: u64,
}

impl InMemoryExchange {
    /// Create an empty exchange.
    pub fn new() -> Self {
        Self {
            next_order_id: 1,
            next_trade_id: 1,
            ..Default::default()
        }
    }

    /// Trades recorded so far, in execution order.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    fn active_order_mut(&mut self, order_id: OrderId) -> Result<&mut Order> {
        match self.orders.get_mut(&order_id) {
            Some(order) if order.is_active() => Ok(order),
            Some(_) => Err(Error::exchange(format!("order {order_id} is not active"))),
            None => Err(Error::exchange(format!("order {order_id} not found"))),
        }
    }

    /// Consume `volume` of an active order and return the trade snapshot.
    fn fill(&mut self, order_id: OrderId, volume: i64) -> Result<Order> {
        let order = self.active_order_mut(order_id)?;
        if volume <= 0 || volume > order.volume {
            return Err(Error::exchange(format!(
                "cannot fill {volume} of order {order_id} with {} remaining",
                order.volume
            )));
        }
        order.volume -= volume;
        if order.volume == 0 {
            order.status = OrderStatus::Filled;
        }

        let mut snapshot = order.clone();
        snapshot.traded_volume = volume;
        Ok(snapshot)
    }

    fn record_trade(
        &mut self,
        timestamp: DateTime<Utc>,
        making_orders: Vec<Order>,
        taking_order: Order,
    ) -> Trade {
        let trade = Trade {
            id: self.next_trade_id,
            timestamp,
            making_orders,
            taking_order,
        };
        self.next_trade_id += 1;
        self.trades.push(trade.clone());
        trade
    }

    /// Execute a trade between an active taking order and resting makers.
    ///
    /// Each `(making_id, volume)` pair consumes that much of the maker; the
    /// taker is consumed by the total.
    pub fn execute(
        &mut self,
        taking_id: OrderId,
        fills: &[(OrderId, i64)],
        timestamp: DateTime<Utc>,
    ) -> Result<Trade> {
        let taker = self.active_order_mut(taking_id)?.clone();
        if fills.is_empty() {
            return Err(Error::exchange(format!("no making orders for order {taking_id}")));
        }

        // Nothing is mutated until every fill is known to succeed.
        let mut total: i64 = 0;
        for (i, &(making_id, volume)) in fills.iter().enumerate() {
            if fills[..i].iter().any(|(id, _)| *id == making_id) {
                return Err(Error::exchange(format!("order {making_id} matched twice")));
            }
            let maker = self.active_order_mut(making_id)?;
            if maker.is_bid == taker.is_bid || maker.pcode == taker.pcode {
                return Err(Error::exchange(format!(
                    "order {making_id} cannot be matched against order {taking_id}"
                )));
            }
            if volume <= 0 || volume > maker.volume {
                return Err(Error::exchange(format!(
                    "cannot fill {volume} of order {making_id} with {} remaining",
                    maker.volume
                )));
            }
            total = total
                .checked_add(volume)
                .ok_or_else(|| Error::exchange("trade volume overflows"))?;
        }
        if total > taker.volume {
            return Err(Error::exchange(format!(
                "taking order {taking_id} cannot absorb {total} units"
            )));
        }

        let mut making_orders = Vec::with_capacity(fills.len());
        for &(making_id, volume) in fills {
            making_orders.push(self.fill(making_id, volume)?);
        }
        let taking_order = self.fill(taking_id, total)?;

        debug!(taking_id, total, makers = fills.len(), "executed trade");
        Ok(self.record_trade(timestamp, making_orders, taking_order))
    }
}

impl Exchange for InMemoryExchange {
    fn enter_order(&mut self, request: OrderRequest) -> Result<Order> {
        if request.price < 0 || request.volume <= 0 {
            return Err(Error::exchange(format!(
                "invalid order: price {} volume {}",
                request.price, request.volume
            )));
        }

        let order = Order {
            id: self.next_order_id,
            pcode: request.pcode,
            is_bid: request.side.is_bid(),
            price: request.price,
            volume: request.volume,
            traded_volume: 0,
            status: OrderStatus::Active,
            timestamp: request.timestamp,
        };
        self.next_order_id += 1;
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    fn accept_order(
        &mut self,
        order_id: OrderId,
        pcode: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Trade> {
        let resting = self.active_order_mut(order_id)?.clone();
        if resting.pcode == pcode {
            return Err(Error::exchange(format!("{pcode} cannot accept own order {order_id}")));
        }

        let taker = self.enter_order(OrderRequest {
            pcode: pcode.to_string(),
            side: resting.side().opposite(),
            price: resting.price,
            volume: resting.volume,
            timestamp,
        })?;
        self.execute(taker.id, &[(order_id, resting.volume)], timestamp)
    }

    fn cancel_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        match self.orders.get_mut(&order_id) {
            Some(order) if order.is_active() => {
                order.status = OrderStatus::Canceled;
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    fn order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).cloned()
    }

    fn orders(&self, filter: &OrderFilter) -> Vec<Order> {
        self.orders.values().filter(|o| filter.matches(o)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markets_core::Side;

    fn make_request(pcode: &str, side: Side, price: i64, volume: i64) -> OrderRequest {
        OrderRequest {
            pcode: pcode.to_string(),
            side,
            price,
            volume,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_enter_and_query() {
        let mut ex = InMemoryExchange::new();
        let bid = ex.enter_order(make_request("a", Side::Bid, 20, 2)).unwrap();
        ex.enter_order(make_request("b", Side::Ask, 25, 1)).unwrap();

        assert_eq!(bid.id, 1);
        assert_eq!(ex.orders(&OrderFilter::active("a", Side::Bid)).len(), 1);
        assert_eq!(ex.orders(&OrderFilter::default()).len(), 2);
    }

    #[test]
    fn test_invalid_order_rejected() {
        let mut ex = InMemoryExchange::new();
        assert!(ex.enter_order(make_request("a", Side::Bid, 20, 0)).is_err());
        assert!(ex.enter_order(make_request("a", Side::Bid, -1, 1)).is_err());
    }

    #[test]
    fn test_cancel_missing_is_noop() {
        let mut ex = InMemoryExchange::new();
        assert!(ex.cancel_order(42).unwrap().is_none());

        let ask = ex.enter_order(make_request("a", Side::Ask, 20, 2)).unwrap();
        assert!(ex.cancel_order(ask.id).unwrap().is_some());
        assert!(ex.cancel_order(ask.id).unwrap().is_none());
    }

    #[test]
    fn test_accept_fills_in_full() {
        let mut ex = InMemoryExchange::new();
        let ask = ex.enter_order(make_request("b", Side::Ask, 20, 2)).unwrap();

        let trade = ex.accept_order(ask.id, "a", DateTime::<Utc>::UNIX_EPOCH).unwrap();

        assert_eq!(trade.making_orders[0].traded_volume, 2);
        assert_eq!(trade.taking_order.pcode, "a");
        assert!(trade.taking_order.is_bid);
        assert_eq!(ex.order(ask.id).unwrap().status, OrderStatus::Filled);
        assert_eq!(ex.trades().len(), 1);
    }

    #[test]
    fn test_accept_own_order_rejected() {
        let mut ex = InMemoryExchange::new();
        let ask = ex.enter_order(make_request("b", Side::Ask, 20, 2)).unwrap();
        assert!(ex.accept_order(ask.id, "b", DateTime::<Utc>::UNIX_EPOCH).is_err());
    }

    #[test]
    fn test_partial_fill_keeps_order_active() {
        let mut ex = InMemoryExchange::new();
        let ask = ex.enter_order(make_request("b", Side::Ask, 20, 5)).unwrap();
        let bid = ex.enter_order(make_request("a", Side::Bid, 20, 2)).unwrap();

        let trade = ex.execute(bid.id, &[(ask.id, 2)], DateTime::<Utc>::UNIX_EPOCH).unwrap();

        let resting = ex.order(ask.id).unwrap();
        assert!(resting.is_active());
        assert_eq!(resting.volume, 3);
        assert_eq!(trade.taking_order.status, OrderStatus::Filled);
        assert_eq!(trade.volume(), 2);
    }

    #[test]
    fn test_execute_same_side_rejected() {
        let mut ex = InMemoryExchange::new();
        let b1 = ex.enter_order(make_request("a", Side::Bid, 20, 2)).unwrap();
        let b2 = ex.enter_order(make_request("b", Side::Bid, 20, 2)).unwrap();
        assert!(ex.execute(b1.id, &[(b2.id, 1)], DateTime::<Utc>::UNIX_EPOCH).is_err());
    }

    #[test]
    fn test_failed_execute_leaves_book_untouched() {
        let mut ex = InMemoryExchange::new();
        let a1 = ex.enter_order(make_request("b", Side::Ask, 20, 5)).unwrap();
        let a2 = ex.enter_order(make_request("c", Side::Ask, 21, 5)).unwrap();
        let bid = ex.enter_order(make_request("a", Side::Bid, 21, 10)).unwrap();
        let ts = DateTime::<Utc>::UNIX_EPOCH;

        assert!(ex.execute(bid.id, &[(a1.id, 3), (a2.id, 0)], ts).is_err());
        assert!(ex.execute(bid.id, &[(a1.id, 3), (a1.id, 2)], ts).is_err());
        assert!(ex.execute(bid.id, &[(a1.id, 3), (a2.id, 6)], ts).is_err());

        assert_eq!(ex.order(a1.id).unwrap().volume, 5);
        assert_eq!(ex.order(a2.id).unwrap().volume, 5);
        assert_eq!(ex.order(bid.id).unwrap().volume, 10);
        assert!(ex.trades().is_empty());
    }
}
