//! Recorded session data consumed by the output generators.

use chrono::{DateTime, Utc};
use markets_core::{Pcode, Trade};
use serde::{Deserialize, Serialize};

/// A whole session: one subsession per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    /// Name of the session config file.
    pub config_name: String,
    pub subsessions: Vec<SubsessionExport>,
}

/// One round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsessionExport {
    pub round_number: u32,
    #[serde(default)]
    pub groups: Vec<GroupExport>,
}

/// One group's market in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupExport {
    pub id_in_subsession: usize,
    pub start_time: DateTime<Utc>,
    /// Players in group order.
    pub players: Vec<PlayerExport>,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerExport {
    pub pcode: Pcode,
    pub id_in_group: usize,
}

impl GroupExport {
    /// Seconds from the market start to `timestamp`, to the microsecond.
    pub fn elapsed_secs(&self, timestamp: DateTime<Utc>) -> f64 {
        let elapsed = timestamp - self.start_time;
        match elapsed.num_microseconds() {
            Some(us) => us as f64 / 1e6,
            None => elapsed.num_milliseconds() as f64 / 1e3,
        }
    }
}

impl SessionExport {
    /// Parse a session dump.
    pub fn from_json_str(text: &str) -> markets_core::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
