//! Utility and payoff computation for the visual-markets system.
//!
//! This crate handles:
//! - Parsing player utility functions in a closed arithmetic grammar
//! - Evaluating utility at endowment and settled holdings
//! - Scaled payoff storage

pub mod expr;
pub mod payoff;
pub mod utility;

pub use expr::Expr;
pub use payoff::{Payoff, PayoffCalculator, PayoffParams, PAYOFF_SCALE};
pub use utility::UtilityFunction;
