//! Payoff computation.
//!
//! payoff = initial_utility * initial_multiplier
//!        + max(final_utility - initial_utility, -initial_utility) * gain_multiplier
//!
//! Both components are stored as integers scaled by [`PAYOFF_SCALE`].

use markets_core::{Holdings, MarketConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utility::UtilityFunction;

/// Fixed-point factor for stored payoffs.
pub const PAYOFF_SCALE: i64 = 1000;

/// Multipliers applied to the utility components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffParams {
    pub initial_multiplier: f64,
    pub gain_multiplier: f64,
}

impl PayoffParams {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            initial_multiplier: config.payoff_initial_multiplier,
            gain_multiplier: config.payoff_gain_multiplier,
        }
    }
}

impl Default for PayoffParams {
    fn default() -> Self {
        Self {
            initial_multiplier: 1.0,
            gain_multiplier: 1.0,
        }
    }
}

/// A player's payoff for one round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Payoff {
    pub initial_utility: f64,
    pub final_utility: f64,
    /// Scaled by [`PAYOFF_SCALE`].
    pub initial_payoff: i64,
    /// Scaled by [`PAYOFF_SCALE`].
    pub gains_payoff: i64,
}

impl Payoff {
    /// Payoff from the two utility values.
    ///
    /// The gain is floored at `-initial_utility`.
    pub fn from_utilities(initial_utility: f64, final_utility: f64, params: PayoffParams) -> Self {
        let gain = (final_utility - initial_utility).max(-initial_utility);
        Self {
            initial_utility,
            final_utility,
            initial_payoff: to_stored(initial_utility * params.initial_multiplier),
            gains_payoff: to_stored(gain * params.gain_multiplier),
        }
    }

    /// Stored total, scaled by [`PAYOFF_SCALE`].
    pub fn total(&self) -> i64 {
        self.initial_payoff + self.gains_payoff
    }

    pub fn initial_payoff_display(&self) -> f64 {
        from_stored(self.initial_payoff)
    }

    pub fn gains_payoff_display(&self) -> f64 {
        from_stored(self.gains_payoff)
    }

    pub fn total_display(&self) -> f64 {
        from_stored(self.total())
    }
}

fn to_stored(value: f64) -> i64 {
    (value * PAYOFF_SCALE as f64).round() as i64
}

fn from_stored(value: i64) -> f64 {
    value as f64 / PAYOFF_SCALE as f64
}

/// Evaluates payoffs for one round's configuration.
#[derive(Debug, Clone)]
pub struct PayoffCalculator {
    utility: UtilityFunction,
    params: PayoffParams,
}

impl PayoffCalculator {
    pub fn new(utility: UtilityFunction, params: PayoffParams) -> Self {
        Self { utility, params }
    }

    /// Build from a round's config. Fails if the utility text is malformed.
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        Ok(Self::new(
            UtilityFunction::from_config(config)?,
            PayoffParams::from_config(config),
        ))
    }

    pub fn utility(&self) -> &UtilityFunction {
        &self.utility
    }

    /// Payoff of moving from `endowment` to `settled` (internal units).
    pub fn compute(&self, endowment: Holdings, settled: Holdings) -> Result<Payoff> {
        let initial = self.utility.at_holdings(endowment)?;
        let fin = self.utility.at_holdings(settled)?;
        let payoff = Payoff::from_utilities(initial, fin, self.params);
        debug!(initial, final_utility = fin, total = payoff.total(), "payoff computed");
        Ok(payoff)
    }
}
