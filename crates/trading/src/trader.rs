//! Per-player trading state.

use markets_core::{Holdings, OrderId, Pcode, Side};
use serde::{Deserialize, Serialize};

/// Reference to a player's current order on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedOrder {
    pub id: OrderId,
    pub price: i64,
}

/// Why an order could not be funded from settled holdings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortfall {
    Cash,
    Assets,
}

/// A player in a group's market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trader {
    pub pcode: Pcode,
    pub id_in_group: usize,
    /// Endowment the round started from.
    pub endowment: Holdings,
    /// Confirmed post-trade holdings.
    pub settled: Holdings,
    pub current_bid: Option<TrackedOrder>,
    pub current_ask: Option<TrackedOrder>,
}

impl Trader {
    /// Create a trader holding its endowment.
    pub fn new(pcode: impl Into<Pcode>, id_in_group: usize, endowment: Holdings) -> Self {
        Self {
            pcode: pcode.into(),
            id_in_group,
            endowment,
            settled: endowment,
            current_bid: None,
            current_ask: None,
        }
    }

    /// Tracked order on a side.
    pub fn current(&self, side: Side) -> Option<TrackedOrder> {
        match side {
            Side::Bid => self.current_bid,
            Side::Ask => self.current_ask,
        }
    }

    pub fn set_current(&mut self, side: Side, order: Option<TrackedOrder>) {
        match side {
            Side::Bid => self.current_bid = order,
            Side::Ask => self.current_ask = order,
        }
    }

    /// Check that settled holdings cover a new order.
    ///
    /// A bid needs `price * volume` cash and an ask needs `volume` assets.
    /// Funds committed to the other side's order are not deducted: at most
    /// one order per side is ever outstanding. A cost that overflows `i64`
    /// can never be funded.
    pub fn check_available(&self, side: Side, price: i64, volume: i64) -> Result<(), Shortfall> {
        match side {
            Side::Bid => match price.checked_mul(volume) {
                Some(cost) if self.settled.cash >= cost => Ok(()),
                _ => Err(Shortfall::Cash),
            },
            Side::Ask if self.settled.assets < volume => Err(Shortfall::Assets),
            Side::Ask => Ok(()),
        }
    }
}
