//! Port to the market exchange.
//!
//! Matching, order book state and settlement belong to the exchange; this
//! crate only drives it through [`Exchange`] and reacts to its callbacks.

use chrono::{DateTime, Utc};
use markets_core::{Order, OrderId, OrderStatus, Pcode, Result, Side, Trade};

/// A new order to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub pcode: Pcode,
    pub side: Side,
    pub price: i64,
    pub volume: i64,
    pub timestamp: DateTime<Utc>,
}

/// Query over the exchange's orders. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub pcode: Option<Pcode>,
    pub side: Option<Side>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    /// Active orders of one player on one side.
    pub fn active(pcode: &str, side: Side) -> Self {
        Self {
            pcode: Some(pcode.to_string()),
            side: Some(side),
            status: Some(OrderStatus::Active),
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.pcode.as_deref().map_or(true, |p| p == order.pcode)
            && self.side.map_or(true, |s| s == order.side())
            && self.status.map_or(true, |s| s == order.status)
    }
}

/// The exchange as seen from a group's market.
pub trait Exchange {
    /// Submit an order. Returns the order as confirmed by the exchange.
    fn enter_order(&mut self, request: OrderRequest) -> Result<Order>;

    /// Take an existing order in full on behalf of `pcode`.
    fn accept_order(
        &mut self,
        order_id: OrderId,
        pcode: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Trade>;

    /// Cancel an order. `Ok(None)` when the order is missing or no longer active.
    fn cancel_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Look up an order by id.
    fn order(&self, order_id: OrderId) -> Option<Order>;

    /// Orders matching a filter, oldest first.
    fn orders(&self, filter: &OrderFilter) -> Vec<Order>;
}
