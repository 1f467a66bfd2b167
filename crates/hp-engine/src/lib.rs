//! hp-engine: narrow interface to an external flowsheet engine.
//!
//! The engine assembles components and connections into a network and solves
//! the coupled steady-state equations in design or off-design mode. The cycle
//! model drives it exclusively through [`FlowsheetEngine`]; everything that
//! crosses that boundary is defined here.
//!
//! Units on this interface: pressure bar, temperature °C, specific enthalpy
//! J/kg, specific entropy J/(kg·K), mass flow kg/s, power W.

pub mod engine;
pub mod error;
pub mod exergy;
pub mod spec;
pub mod state;

pub use engine::{FlowsheetEngine, SolveMode, SolveOptions};
pub use error::{EngineError, EngineResult};
pub use exergy::{ComponentExergy, ExergyRequest, ExergyResults};
pub use spec::{
    ComponentAttr, ComponentUpdate, KaChar, KaCharKind, StateSpec, StateVar, Value,
};
pub use state::{ConnectionState, CurveProperty, ProcessCurve};
