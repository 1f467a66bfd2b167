//! hp-core: quantities, grid helpers and graph handles shared by the heat
//! pump crates.

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{HpError, HpResult};
pub use ids::{BusId, CompId, ConnId};
pub use numeric::{arange_inclusive, linspace, round_to};
