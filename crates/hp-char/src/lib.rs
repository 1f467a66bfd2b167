//! hp-char: post-processing of part-load operating maps.
//!
//! - [`interpolate`]: multilinear refinement of a swept map onto a dense grid
//! - [`linearize`]: per temperature pair linear models between heat output
//!   and electrical input
//! - [`timeseries`]: alignment of linear models to a temperature series

pub mod error;
pub mod interpolate;
pub mod linearize;
pub mod timeseries;

pub use error::{CharError, CharResult};
pub use interpolate::{MapInterpolator, interpolate_map};
pub use linearize::{FitMethod, LinearForm, LinearModel, LinearizeOptions, Variable, linearize};
pub use timeseries::{AlignedRow, TemperatureSample, arrange_timeseries};
