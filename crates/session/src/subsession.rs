//! Rounds and group formation.
//!
//! A subsession is one round of a session. Rounds past the configured
//! experiment length are inactive: no groups are formed and no pages shown.

use markets_core::{ConfigStore, MarketConfig, Pcode, Result};
use markets_payoff::UtilityFunction;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A participant as known to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub pcode: Pcode,
}

impl Participant {
    pub fn new(pcode: impl Into<Pcode>) -> Self {
        Self { pcode: pcode.into() }
    }
}

/// A participant placed in a group. `id_in_group` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub pcode: Pcode,
    pub id_in_group: usize,
}

/// A group formed for one round. `id_in_subsession` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub id_in_subsession: usize,
    pub members: Vec<Member>,
}

/// Split players into consecutive chunks of `players_per_group` in list
/// order; the last chunk may be short. `None` yields a single group.
pub fn group_matrix<T: Clone>(players: &[T], players_per_group: Option<usize>) -> Vec<Vec<T>> {
    if players.is_empty() {
        return Vec::new();
    }
    match players_per_group {
        Some(n) if n > 0 => players.chunks(n).map(<[T]>::to_vec).collect(),
        _ => vec![players.to_vec()],
    }
}

/// One round of a session.
#[derive(Debug, Clone)]
pub struct Subsession<'a> {
    store: &'a ConfigStore,
    config_name: String,
    round_number: u32,
}

impl<'a> Subsession<'a> {
    pub fn new(store: &'a ConfigStore, config_name: impl Into<String>, round_number: u32) -> Self {
        Self {
            store,
            config_name: config_name.into(),
            round_number,
        }
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Whether this round is within the experiment length.
    pub fn is_active(&self) -> Result<bool> {
        self.store.is_round_active(&self.config_name, self.round_number)
    }

    /// The round's market config.
    pub fn config(&self) -> Result<MarketConfig> {
        self.store.resolve(&self.config_name, self.round_number, None)
    }

    /// The round's market config for one player.
    pub fn player_config(&self, id_in_group: usize) -> Result<MarketConfig> {
        self.store
            .resolve(&self.config_name, self.round_number, Some(id_in_group))
    }

    pub fn allow_short(&self) -> Result<bool> {
        Ok(self.config()?.allow_short)
    }

    /// Evaluate the round's utility function at a point in display units.
    pub fn utility(&self, x: f64, y: f64) -> Result<f64> {
        UtilityFunction::from_config(&self.config()?)?.evaluate(x, y)
    }

    /// Form the round's groups. Inactive rounds get none.
    pub fn creating_session(&self, participants: &[Participant]) -> Result<Vec<GroupAssignment>> {
        if !self.is_active()? {
            debug!(round = self.round_number, "round beyond experiment length, skipping setup");
            return Ok(Vec::new());
        }

        let config = self.config()?;
        let groups: Vec<GroupAssignment> = group_matrix(participants, config.players_per_group)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| GroupAssignment {
                id_in_subsession: i + 1,
                members: chunk
                    .into_iter()
                    .enumerate()
                    .map(|(j, p)| Member {
                        pcode: p.pcode,
                        id_in_group: j + 1,
                    })
                    .collect(),
            })
            .collect();

        info!(round = self.round_number, groups = groups.len(), "groups formed");
        Ok(groups)
    }
}
