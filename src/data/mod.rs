//! Shot data tables
//!
//! Header-named event tables loaded from the season CSV deposited by the
//! download step, plus the literal column names of that file.

pub mod schema;
pub mod table;

pub use table::EventTable;
