//! Generic JSON dump of every group's market.

use std::io::Write;

use markets_core::{Pcode, Result, Trade};
use serde::Serialize;

use crate::model::SessionExport;
use crate::OutputGenerator;

#[derive(Debug, Serialize)]
struct GroupRecord<'a> {
    round_number: u32,
    group_id: usize,
    start_time: String,
    players: Vec<&'a Pcode>,
    trades: Vec<TradeRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct TradeRecord<'a> {
    elapsed_secs: f64,
    #[serde(flatten)]
    trade: &'a Trade,
}

/// Writes every group's players and trades as pretty JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarketOutputGenerator;

impl OutputGenerator for JsonMarketOutputGenerator {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write(&self, session: &SessionExport, out: &mut dyn Write) -> Result<()> {
        let mut records = Vec::new();
        for sub in &session.subsessions {
            for group in &sub.groups {
                records.push(GroupRecord {
                    round_number: sub.round_number,
                    group_id: group.id_in_subsession,
                    start_time: group.start_time.to_rfc3339(),
                    players: group.players.iter().map(|p| &p.pcode).collect(),
                    trades: group
                        .trades
                        .iter()
                        .map(|trade| TradeRecord {
                            elapsed_secs: group.elapsed_secs(trade.timestamp),
                            trade,
                        })
                        .collect(),
                });
            }
        }
        serde_json::to_writer_pretty(&mut *out, &records)?;
        writeln!(out)?;
        Ok(())
    }
}
