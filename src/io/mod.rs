//! CSV import of schedules and rosters, CSV export of run results.

pub mod export;
pub mod import;
