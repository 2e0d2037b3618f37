//! Allocation CSV: each player's (x, y) holdings after every trade.
//!
//! Each group starts from its players' raw endowments at t=0, then trades
//! are replayed in timestamp order. Every maker and the taker move by the
//! maker's traded volume at the maker's price, converted out of the
//! currency scales. Columns follow the group's player order.

use std::io::Write;

use markets_core::{ConfigStore, Error, Order, Result};
use tracing::debug;

use crate::model::{GroupExport, SessionExport};
use crate::OutputGenerator;

/// Fixed leading columns.
const BASE_HEADER: [&str; 3] = ["round_number", "group_id", "timestamp"];

/// Time column of a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowTime {
    /// The endowment row.
    Start,
    /// Seconds since the group's market started.
    Elapsed(f64),
}

/// One CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRow {
    pub round_number: u32,
    pub group_id: usize,
    pub time: RowTime,
    /// (x, y) per player, in group order.
    pub allocations: Vec<(f64, f64)>,
}

impl AllocationRow {
    /// Render as CSV fields.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = vec![
            self.round_number.to_string(),
            self.group_id.to_string(),
            match self.time {
                RowTime::Start => "0".to_string(),
                RowTime::Elapsed(secs) => format_seconds(secs),
            },
        ];
        for (x, y) in &self.allocations {
            record.push(format_quantity(*x));
            record.push(format_quantity(*y));
        }
        record
    }
}

fn format_seconds(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{secs:.1}")
    } else {
        secs.to_string()
    }
}

fn format_quantity(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        (v as i64).to_string()
    } else {
        v.to_string()
    }
}

/// Running (x, y) per player, in first-seen order.
struct Ledger {
    entries: Vec<(String, (f64, f64))>,
}

impl Ledger {
    fn apply(&mut self, order: &Order, price: f64, volume: f64) {
        let Some((_, (x, y))) = self.entries.iter_mut().find(|(p, _)| *p == order.pcode) else {
            debug!(pcode = %order.pcode, "trade party not in group");
            return;
        };
        if order.is_bid {
            *x += volume;
            *y -= price * volume;
        } else {
            *x -= volume;
            *y += price * volume;
        }
    }

    fn snapshot(&self) -> Vec<(f64, f64)> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }
}

/// Generates the allocation CSV.
pub struct AllocationCsvGenerator<'a> {
    store: &'a ConfigStore,
}

impl<'a> AllocationCsvGenerator<'a> {
    pub fn new(store: &'a ConfigStore) -> Self {
        Self { store }
    }

    /// Header sized to the largest in-scope group.
    ///
    /// With no in-scope groups only the fixed columns are returned.
    pub fn header(&self, session: &SessionExport) -> Result<Vec<String>> {
        let mut max_players = 0;
        for sub in &session.subsessions {
            if !self.store.is_round_active(&session.config_name, sub.round_number)? {
                continue;
            }
            for group in &sub.groups {
                max_players = max_players.max(group.players.len());
            }
        }

        let mut header: Vec<String> = BASE_HEADER.iter().map(|s| s.to_string()).collect();
        for n in 1..=max_players {
            header.push(format!("p{n}x"));
            header.push(format!("p{n}y"));
        }
        Ok(header)
    }

    /// Rows for one group: the endowment row then one row per trade.
    /// Groups in rounds past the experiment length produce nothing.
    pub fn group_rows(
        &self,
        config_name: &str,
        round_number: u32,
        group: &GroupExport,
    ) -> Result<Vec<AllocationRow>> {
        if !self.store.is_round_active(config_name, round_number)? {
            return Ok(Vec::new());
        }
        let config = self.store.resolve(config_name, round_number, None)?;
        let price_scale = config.price_scale();
        let x_scale = config.x_currency_scale as f64;

        let mut ledger = Ledger {
            entries: Vec::with_capacity(group.players.len()),
        };
        for player in &group.players {
            let x = config.asset_endowment(player.id_in_group)? as f64;
            let y = config.cash_endowment(player.id_in_group)? as f64;
            ledger.entries.push((player.pcode.clone(), (x, y)));
        }

        let mut rows = vec![AllocationRow {
            round_number,
            group_id: group.id_in_subsession,
            time: RowTime::Start,
            allocations: ledger.snapshot(),
        }];

        let mut trades: Vec<_> = group.trades.iter().collect();
        trades.sort_by_key(|t| t.timestamp);

        for trade in trades {
            for maker in &trade.making_orders {
                let price = maker.price as f64 / price_scale;
                let volume = maker.traded_volume as f64 / x_scale;
                ledger.apply(maker, price, volume);
                ledger.apply(&trade.taking_order, price, volume);
            }

            rows.push(AllocationRow {
                round_number,
                group_id: group.id_in_subsession,
                time: RowTime::Elapsed(group.elapsed_secs(trade.timestamp)),
                allocations: ledger.snapshot(),
            });
        }

        Ok(rows)
    }
}

impl OutputGenerator for AllocationCsvGenerator<'_> {
    fn name(&self) -> &'static str {
        "allocation_csv"
    }

    fn write(&self, session: &SessionExport, out: &mut dyn Write) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
        let csv_err = |e: csv::Error| Error::output(e.to_string());

        writer.write_record(self.header(session)?).map_err(csv_err)?;
        for sub in &session.subsessions {
            for group in &sub.groups {
                for row in self.group_rows(&session.config_name, sub.round_number, group)? {
                    writer.write_record(row.to_record()).map_err(csv_err)?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}
