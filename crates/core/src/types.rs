//! Core data types for the visual-markets system.
//!
//! Prices, volumes and holdings are integers in internal (currency-scaled)
//! units; see [`crate::config::MarketConfig`] for the scales.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Participant code, the stable per-player identifier.
pub type Pcode = String;

/// Exchange-assigned order identifier.
pub type OrderId = u64;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Side of an order given its `is_bid` flag.
    #[inline]
    pub fn from_is_bid(is_bid: bool) -> Self {
        if is_bid {
            Side::Bid
        } else {
            Side::Ask
        }
    }

    #[inline]
    pub fn is_bid(self) -> bool {
        self == Side::Bid
    }

    /// The counter side.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Resting in the book.
    Active,
    /// Fully consumed by trades.
    Filled,
    /// Withdrawn before being fully consumed.
    Canceled,
}

/// An order as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub pcode: Pcode,
    pub is_bid: bool,
    /// Limit price in internal units.
    pub price: i64,
    /// Remaining (unfilled) volume.
    pub volume: i64,
    /// Volume consumed by the trade this snapshot belongs to.
    #[serde(default)]
    pub traded_volume: i64,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn side(&self) -> Side {
        Side::from_is_bid(self.is_bid)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }
}

/// A trade: one taking order crossing one or more making orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    /// Resting orders matched, in matching order.
    pub making_orders: Vec<Order>,
    /// The incoming order that triggered the match.
    pub taking_order: Order,
}

impl Trade {
    /// All orders touched by this trade: makers first, then the taker.
    pub fn touched_orders(&self) -> impl Iterator<Item = &Order> {
        self.making_orders.iter().chain(std::iter::once(&self.taking_order))
    }

    /// Total volume exchanged.
    pub fn volume(&self) -> i64 {
        self.making_orders.iter().map(|o| o.traded_volume).sum()
    }
}

/// Settled (confirmed post-trade) holdings of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Holdings {
    /// Asset quantity (x).
    pub assets: i64,
    /// Cash quantity (y).
    pub cash: i64,
}

impl Holdings {
    pub fn new(assets: i64, cash: i64) -> Self {
        Self { assets, cash }
    }

    /// Apply one fill on the given side.
    ///
    /// A bid gains `volume` assets and pays `price * volume` cash; an ask
    /// does the inverse. Amounts saturate at the `i64` bounds.
    pub fn apply_fill(&mut self, side: Side, price: i64, volume: i64) {
        let cost = price.saturating_mul(volume);
        match side {
            Side::Bid => {
                self.assets = self.assets.saturating_add(volume);
                self.cash = self.cash.saturating_sub(cost);
            }
            Side::Ask => {
                self.assets = self.assets.saturating_sub(volume);
                self.cash = self.cash.saturating_add(cost);
            }
        }
    }
}
