//! Data export for recorded market sessions.
//!
//! This crate handles:
//! - The recorded session model (rounds, groups, players, trades)
//! - The allocation CSV replaying trades over endowments
//! - A plain JSON dump of every group's market

pub mod allocation;
pub mod json;
pub mod model;

use std::io::Write;

use markets_core::{ConfigStore, Result};

pub use allocation::{AllocationCsvGenerator, AllocationRow, RowTime};
pub use json::JsonMarketOutputGenerator;
pub use model::{GroupExport, PlayerExport, SessionExport, SubsessionExport};

/// Something that renders a session to a file.
pub trait OutputGenerator {
    /// Short name used to select the generator.
    fn name(&self) -> &'static str;

    fn write(&self, session: &SessionExport, out: &mut dyn Write) -> Result<()>;
}

/// All generators, allocation CSV first.
pub fn output_generators(store: &ConfigStore) -> Vec<Box<dyn OutputGenerator + '_>> {
    vec![
        Box::new(AllocationCsvGenerator::new(store)),
        Box::new(JsonMarketOutputGenerator),
    ]
}

/// Find a generator by name.
pub fn find_generator<'a>(
    store: &'a ConfigStore,
    name: &str,
) -> Option<Box<dyn OutputGenerator + 'a>> {
    output_generators(store).into_iter().find(|g| g.name() == name)
}
