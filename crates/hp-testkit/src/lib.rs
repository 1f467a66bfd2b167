//! hp-testkit: deterministic stand-ins for the external collaborators.
//!
//! - [`ClausiusFluid`]: analytic equation of state built on the
//!   Clausius-Clapeyron relation with real critical constants.
//! - [`ScriptedEngine`]: flowsheet engine that records every call and
//!   produces Carnot-fraction performance, scripted residuals and scripted
//!   failures.

pub mod clausius;
pub mod scripted;

pub use clausius::ClausiusFluid;
pub use scripted::{EngineCall, OperatingPoint, ScriptedEngine};

/// Install a fmt subscriber writing through the test harness. Safe to call
/// from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
