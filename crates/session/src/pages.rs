//! Page sequence shown to players each round.

use markets_core::{MarketConfig, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::subsession::Subsession;

/// A page in the round's sequence.
pub trait Page {
    fn name(&self) -> &'static str;

    /// Whether the page is shown this round.
    fn is_displayed(&self, subsession: &Subsession<'_>) -> Result<bool>;

    /// Variables injected into the page template for one player.
    fn vars_for_template(
        &self,
        _subsession: &Subsession<'_>,
        _id_in_group: usize,
    ) -> Result<Value> {
        Ok(Value::Object(Map::new()))
    }
}

/// Template variables for the trading page.
#[derive(Debug, Clone, Serialize)]
pub struct MarketTemplateVars {
    pub config: MarketConfig,
    pub x_bounds: Vec<f64>,
    pub y_bounds: Vec<f64>,
    pub x_bounds_grid: Vec<f64>,
    pub y_bounds_grid: Vec<f64>,
}

impl MarketTemplateVars {
    /// Bounds are converted to internal units by the currency scales.
    pub fn new(config: MarketConfig) -> Self {
        let x_scale = config.x_currency_scale as f64;
        let y_scale = config.y_currency_scale as f64;
        let x_bounds: Vec<f64> = config.x_bounds.iter().map(|b| b * x_scale).collect();
        let y_bounds: Vec<f64> = config.y_bounds.iter().map(|b| b * y_scale).collect();
        Self {
            x_bounds_grid: x_bounds.clone(),
            y_bounds_grid: y_bounds.clone(),
            x_bounds,
            y_bounds,
            config,
        }
    }
}

/// The trading page.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketPage;

impl Page for MarketPage {
    fn name(&self) -> &'static str {
        "Market"
    }

    fn is_displayed(&self, subsession: &Subsession<'_>) -> Result<bool> {
        subsession.is_active()
    }

    fn vars_for_template(&self, subsession: &Subsession<'_>, id_in_group: usize) -> Result<Value> {
        let vars = MarketTemplateVars::new(subsession.player_config(id_in_group)?);
        Ok(serde_json::to_value(vars)?)
    }
}

/// Pause screen after a practice round.
#[derive(Debug, Clone, Copy, Default)]
pub struct PracticeRoundPauseScreen;

impl Page for PracticeRoundPauseScreen {
    fn name(&self) -> &'static str {
        "PracticeRoundPauseScreen"
    }

    fn is_displayed(&self, subsession: &Subsession<'_>) -> Result<bool> {
        Ok(subsession.is_active()? && subsession.config()?.is_practice)
    }
}

/// Pages in display order.
pub fn page_sequence() -> Vec<Box<dyn Page>> {
    vec![Box::new(MarketPage), Box::new(PracticeRoundPauseScreen)]
}

/// Names of the pages shown this round.
pub fn displayed_pages(subsession: &Subsession<'_>) -> Result<Vec<&'static str>> {
    let mut names = Vec::new();
    for page in page_sequence() {
        if page.is_displayed(subsession)? {
            names.push(page.name());
        }
    }
    Ok(names)
}
