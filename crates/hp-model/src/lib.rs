//! hp-model: heat pump cycle model runtime.
//!
//! A [`HeatPump`] turns a parameter set into a topology-specific network,
//! drives a [`hp_engine::FlowsheetEngine`] through the init and design phases,
//! sweeps the part-load operating map and derives characteristics from it.
//!
//! ```text
//! run_model -> generate_components -> generate_connections
//!           -> init_simulation -> design_simulation
//!           -> check_consistency -> perform_exergy_analysis
//! offdesign_simulation -> calc_partload_char -> linearize_partload_char
//!                      -> arrange_char_timeseries
//! ```

pub mod characteristics;
pub mod defaults;
pub mod error;
pub mod exergy;
pub mod levels;
pub mod model;
pub mod network;
pub mod parameterize;
pub mod plotting;
pub mod sweep;
pub mod topology;

pub use defaults::{default_params, default_refrigerants, econ_type};
pub use error::{ModelError, ModelResult};
pub use exergy::{ComponentRow, ExergyReport, SankeyData, SankeyLink, WaterfallBar};
pub use levels::{BoundaryTemps, PressureLevels, cascade_mid_temperature};
pub use model::{ConnectionRow, DesignPoint, HeatPump, RESIDUAL_LIMIT, source_return_temperature};
pub use network::Network;
pub use sweep::{AxisPoint, SweepSummary, grid_axis, stable_range, sweep_axes};
pub use topology::{Injection, Layout, LoopFeatures, REGISTRY, Staging};
