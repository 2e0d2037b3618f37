//! Utility functions over (asset, cash) holdings.

use markets_core::{Error, Holdings, MarketConfig, Result};

use crate::expr::Expr;

/// A parsed utility expression plus the currency scales its inputs are
/// divided by.
#[derive(Debug, Clone)]
pub struct UtilityFunction {
    source: String,
    expr: Expr,
    x_scale: f64,
    y_scale: f64,
}

impl UtilityFunction {
    /// Parse a utility expression.
    pub fn new(source: &str, x_scale: i64, y_scale: i64) -> Result<Self> {
        let expr = Expr::parse(source)
            .map_err(|e| Error::expression(format!("utility function {source:?}: {e}")))?;
        Ok(Self {
            source: source.to_string(),
            expr,
            x_scale: x_scale as f64,
            y_scale: y_scale as f64,
        })
    }

    /// The round's utility function.
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        Self::new(
            &config.utility_function,
            config.x_currency_scale,
            config.y_currency_scale,
        )
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Utility at a point given in display units.
    pub fn evaluate(&self, x: f64, y: f64) -> Result<f64> {
        let u = self.expr.eval(x, y);
        if u.is_finite() {
            Ok(u)
        } else {
            Err(Error::expression(format!(
                "utility function {:?} is undefined at x={x}, y={y}",
                self.source
            )))
        }
    }

    /// Utility of holdings given in internal units.
    pub fn at_holdings(&self, holdings: Holdings) -> Result<f64> {
        self.evaluate(
            holdings.assets as f64 / self.x_scale,
            holdings.cash as f64 / self.y_scale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scaled_holdings() {
        let u = UtilityFunction::new("x * y", 10, 100).unwrap();
        // 50 / 10 = 5 assets, 2000 / 100 = 20 cash
        assert_relative_eq!(u.at_holdings(Holdings::new(50, 2000)).unwrap(), 100.0);
    }

    #[test]
    fn test_undefined_point_is_error() {
        let u = UtilityFunction::new("log(x) + y", 1, 1).unwrap();
        assert!(u.evaluate(0.0, 1.0).is_err());
        assert!(u.evaluate(-1.0, 1.0).is_err());
    }

    #[test]
    fn test_malformed_source_is_error() {
        let err = UtilityFunction::new("x *", 1, 1).unwrap_err();
        assert!(matches!(err, Error::Expression(_)));
    }
}
