//! Exergy analysis request and results.

use serde::{Deserialize, Serialize};

/// Which buses count as fuel, product and loss, plus the dead state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExergyRequest {
    pub fuel: Vec<String>,
    pub product: Vec<String>,
    pub loss: Vec<String>,
    /// Ambient pressure [bar].
    pub p_amb: f64,
    /// Ambient temperature [°C].
    pub t_amb: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentExergy {
    pub label: String,
    /// Component group the engine reports (kind name).
    pub group: String,
    pub e_f: f64,
    pub e_p: f64,
    pub e_d: f64,
    /// NaN when the component has no defined product.
    pub epsilon: f64,
}

/// Network-level exergy balance [W] and the per-component breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExergyResults {
    pub epsilon: f64,
    pub e_f: f64,
    pub e_p: f64,
    pub e_d: f64,
    pub e_l: f64,
    pub components: Vec<ComponentExergy>,
}
