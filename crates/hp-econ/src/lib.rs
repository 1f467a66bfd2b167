//! hp-econ: equipment cost of a designed heat pump.
//!
//! Component costs follow power laws in a design-relevant extensive
//! variable, scaled from a reference year by the Chemical Engineering Plant
//! Cost Index (CEPCI).

pub mod cepci;
pub mod cost;
pub mod error;

pub use cepci::CepciTable;
pub use cost::{CostBreakdown, CostFunction, CostItem, CostSettings, breakdown, cost_items, evaluate};
pub use error::{CostError, CostResult};
