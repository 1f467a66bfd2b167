//! hp-fluids: refrigerant properties for heat pump cycles.
//!
//! The cycle model talks to [`EosService`] only. [`CoolPropEos`] backs it with
//! CoolProp through `rfluids`; tests swap in an analytic fluid. Values crossing
//! the trait are SI. [`RefrigerantCatalog`] maps the display names used in
//! parameter files to backend identifiers and carries safety class and GWP.
//!
//! ```no_run
//! use hp_core::units::{celsius, to_bar};
//! use hp_fluids::{CoolPropEos, EosService};
//!
//! let eos = CoolPropEos::new();
//! let p_evap = eos.p_sat("R1234ze(E)", celsius(10.0)).unwrap();
//! println!("evaporating at {:.3} bar", to_bar(p_evap));
//! ```

pub mod catalog;
pub mod coolprop;
pub mod error;
pub mod model;

pub use catalog::{RefrigerantCatalog, RefrigerantInfo};
pub use coolprop::CoolPropEos;
pub use error::{FluidError, FluidResult};
pub use model::{CriticalPoint, EosService};
