//! Market configuration for the visual-markets system.
//!
//! A session config file holds the experiment length, default market
//! parameters, and optional per-round overrides. [`ConfigStore`] resolves a
//! `(config name, round number[, id in group])` triple into a
//! [`MarketConfig`]; nothing is cached across calls.

use std::collections::HashMap;
use std::fs;
use std::ops::Deref;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// An endowment: one value for everybody, or one value per in-group position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endowment {
    Scalar(i64),
    PerPlayer(Vec<i64>),
}

impl Endowment {
    /// Endowment of the player with this `id_in_group`.
    ///
    /// List endowments wrap around: `list[id_in_group % list.len()]`.
    pub fn for_player(&self, id_in_group: usize) -> Result<i64> {
        match self {
            Endowment::Scalar(v) => Ok(*v),
            Endowment::PerPlayer(values) if values.is_empty() => {
                Err(Error::config("endowment list is empty"))
            }
            Endowment::PerPlayer(values) => Ok(values[id_in_group % values.len()]),
        }
    }
}

impl Default for Endowment {
    fn default() -> Self {
        Endowment::Scalar(0)
    }
}

/// How the single-active-order-per-side rule is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// Check availability, cancel the previous order on that side, then enter.
    CancelBeforeEnter,
    /// Enter, then cancel the previous order on that side once the exchange
    /// has confirmed the new one.
    #[default]
    CancelAfterConfirm,
}

/// Market parameters for a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundSettings {
    /// Group size; `None` puts every player in one group.
    pub players_per_group: Option<usize>,
    /// Skip the cash/asset availability check on order entry.
    pub allow_short: bool,
    /// Trading period in seconds.
    pub period_length: u64,
    /// Pause after the trading period in seconds.
    pub post_round_delay: u64,
    /// Practice round flag.
    pub is_practice: bool,
    /// Asset (x) endowment.
    pub x_endowment: Endowment,
    /// Cash (y) endowment.
    pub y_endowment: Endowment,
    /// Divisor from internal asset units to display units.
    pub x_currency_scale: i64,
    /// Divisor from internal cash units to display units.
    pub y_currency_scale: i64,
    /// Display bounds of the asset axis.
    pub x_bounds: [f64; 2],
    /// Display bounds of the cash axis.
    pub y_bounds: [f64; 2],
    /// Utility expression over `x` and `y`.
    pub utility_function: String,
    pub payoff_initial_multiplier: f64,
    pub payoff_gain_multiplier: f64,
    pub order_replacement: ReplacePolicy,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            players_per_group: None,
            allow_short: false,
            period_length: 120,
            post_round_delay: 1,
            is_practice: false,
            x_endowment: Endowment::default(),
            y_endowment: Endowment::default(),
            x_currency_scale: 1,
            y_currency_scale: 1,
            x_bounds: [0.0, 100.0],
            y_bounds: [0.0, 100.0],
            utility_function: "x * y".to_string(),
            payoff_initial_multiplier: 1.0,
            payoff_gain_multiplier: 1.0,
            order_replacement: ReplacePolicy::default(),
        }
    }
}

impl RoundSettings {
    fn validate(&self) -> Result<()> {
        if self.players_per_group == Some(0) {
            return Err(Error::config("players_per_group must be positive"));
        }
        if self.x_currency_scale <= 0 || self.y_currency_scale <= 0 {
            return Err(Error::config("currency scales must be positive"));
        }
        for (name, e) in [("x_endowment", &self.x_endowment), ("y_endowment", &self.y_endowment)] {
            if matches!(e, Endowment::PerPlayer(v) if v.is_empty()) {
                return Err(Error::config(format!("{name} list is empty")));
            }
        }
        Ok(())
    }
}

/// A session config file as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfigFile {
    /// Experiment length; later rounds are skipped entirely.
    pub num_rounds: u32,
    /// Parameters shared by every round.
    #[serde(flatten)]
    pub defaults: RoundSettings,
    /// Per-round overrides: entry `i` applies to round `i + 1`.
    pub rounds: Vec<Map<String, Value>>,
}

impl Default for SessionConfigFile {
    fn default() -> Self {
        Self {
            num_rounds: 1,
            defaults: RoundSettings::default(),
            rounds: Vec::new(),
        }
    }
}

impl SessionConfigFile {
    /// Parse a config file from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Settings for a round, with that round's overrides applied.
    fn settings_for(&self, round_number: u32) -> Result<RoundSettings> {
        let overrides = (round_number as usize)
            .checked_sub(1)
            .and_then(|i| self.rounds.get(i));

        let settings = match overrides {
            Some(o) if !o.is_empty() => {
                let mut merged = match serde_json::to_value(&self.defaults)? {
                    Value::Object(map) => map,
                    _ => return Err(Error::config("round defaults are not an object")),
                };
                for (k, v) in o {
                    merged.insert(k.clone(), v.clone());
                }
                serde_json::from_value(Value::Object(merged))?
            }
            _ => self.defaults.clone(),
        };

        settings.validate()?;
        Ok(settings)
    }
}

/// Fully resolved market configuration for one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketConfig {
    pub round_number: u32,
    pub num_rounds: u32,
    #[serde(flatten)]
    pub settings: RoundSettings,
}

impl Deref for MarketConfig {
    type Target = RoundSettings;

    fn deref(&self) -> &RoundSettings {
        &self.settings
    }
}

impl MarketConfig {
    /// Asset endowment for a player.
    pub fn asset_endowment(&self, id_in_group: usize) -> Result<i64> {
        self.settings.x_endowment.for_player(id_in_group)
    }

    /// Cash endowment for a player.
    pub fn cash_endowment(&self, id_in_group: usize) -> Result<i64> {
        self.settings.y_endowment.for_player(id_in_group)
    }

    /// The same config with list endowments collapsed to this player's values.
    pub fn for_player(&self, id_in_group: usize) -> Result<MarketConfig> {
        let mut config = self.clone();
        config.settings.x_endowment = Endowment::Scalar(self.asset_endowment(id_in_group)?);
        config.settings.y_endowment = Endowment::Scalar(self.cash_endowment(id_in_group)?);
        Ok(config)
    }

    /// Price divisor converting internal price units to display units.
    pub fn price_scale(&self) -> f64 {
        self.settings.y_currency_scale as f64 / self.settings.x_currency_scale as f64
    }
}

/// Session config files keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    files: HashMap<String, SessionConfigFile>,
}

impl ConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a config file under a name, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, file: SessionConfigFile) {
        self.files.insert(name.into(), file);
    }

    /// Parse and register a config file from JSON text.
    pub fn insert_json(&mut self, name: impl Into<String>, text: &str) -> Result<()> {
        self.insert(name, SessionConfigFile::from_json_str(text)?);
        Ok(())
    }

    /// Load every `*.json` file in a directory, keyed by file stem.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut store = Self::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = fs::read_to_string(&path)?;
            let file = SessionConfigFile::from_json_str(&text)
                .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
            store.insert(name, file);
        }
        Ok(store)
    }

    /// Registered config names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    fn file(&self, name: &str) -> Result<&SessionConfigFile> {
        self.files
            .get(name)
            .ok_or_else(|| Error::UnknownConfig(name.to_string()))
    }

    /// Experiment length of a config.
    pub fn num_rounds(&self, name: &str) -> Result<u32> {
        Ok(self.file(name)?.num_rounds)
    }

    /// Whether a round falls inside the configured experiment length.
    pub fn is_round_active(&self, name: &str, round_number: u32) -> Result<bool> {
        Ok(round_number <= self.num_rounds(name)?)
    }

    /// Resolve the market config for a round.
    ///
    /// With `id_in_group` set, list endowments are collapsed to that
    /// player's values. Rounds beyond `num_rounds` fail with
    /// [`Error::RoundOutOfRange`].
    pub fn resolve(
        &self,
        name: &str,
        round_number: u32,
        id_in_group: Option<usize>,
    ) -> Result<MarketConfig> {
        let file = self.file(name)?;
        if round_number > file.num_rounds {
            return Err(Error::RoundOutOfRange {
                round: round_number,
                num_rounds: file.num_rounds,
            });
        }

        let config = MarketConfig {
            round_number,
            num_rounds: file.num_rounds,
            settings: file.settings_for(round_number)?,
        };

        match id_in_group {
            Some(id) => config.for_player(id),
            None => Ok(config),
        }
    }
}
