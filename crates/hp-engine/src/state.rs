//! Solved values read back from the engine.

use serde::{Deserialize, Serialize};

/// Converged state of one connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Mass flow [kg/s].
    pub m: f64,
    /// Pressure [bar].
    pub p: f64,
    /// Specific enthalpy [J/kg].
    pub h: f64,
    /// Temperature [°C].
    pub t: f64,
    /// Specific entropy [J/(kg·K)].
    pub s: f64,
    /// Vapor quality; NaN outside the two-phase region.
    pub x: f64,
    /// Specific volume [m³/kg].
    pub v: f64,
    pub fluid: String,
}

impl ConnectionState {
    /// Volumetric flow [m³/s].
    pub fn volumetric_flow(&self) -> f64 {
        self.m * self.v
    }
}

/// Property a process curve is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveProperty {
    P,
    H,
    S,
    T,
    V,
}

/// Sampled change of state through one side of a component, for diagrams.
///
/// The curve follows an isoline of `isoline` (from `isoline_value` to
/// `isoline_value_end`) while `start` runs from `starting_point_value` to
/// `ending_point_value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessCurve {
    pub isoline: CurveProperty,
    pub isoline_value: f64,
    pub isoline_value_end: f64,
    pub start: CurveProperty,
    pub starting_point_value: f64,
    pub ending_point_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volumetric_flow_from_specific_volume() {
        let state = ConnectionState {
            m: 2.0,
            p: 3.0,
            h: 4.0e5,
            t: 10.0,
            s: 1.7e3,
            x: f64::NAN,
            v: 0.05,
            fluid: "R1234ze(E)".into(),
        };
        assert!((state.volumetric_flow() - 0.1).abs() < 1e-12);
    }
}
