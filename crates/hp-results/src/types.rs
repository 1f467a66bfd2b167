//! Result data types.

use serde::{Deserialize, Serialize};

/// One row of the long-form operating map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartloadRecord {
    #[serde(rename = "T_hs_ff")]
    pub t_hs_ff: f64,
    #[serde(rename = "T_cons_ff")]
    pub t_cons_ff: f64,
    pub pl: f64,
    /// Heat output [W], positive.
    #[serde(rename = "Q")]
    pub q: f64,
    /// Electrical input [W].
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "COP")]
    pub cop: f64,
    pub epsilon: f64,
    pub residual: f64,
}

/// Values stored in one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellValues {
    pub q: f64,
    pub p: f64,
    pub epsilon: f64,
    pub residual: f64,
}

impl CellValues {
    pub const EMPTY: CellValues = CellValues {
        q: f64::NAN,
        p: f64::NAN,
        epsilon: f64::NAN,
        residual: f64::NAN,
    };

    pub fn cop(&self) -> f64 {
        self.q / self.p
    }

    pub fn is_empty(&self) -> bool {
        self.residual.is_nan()
    }
}

/// One line of the per-attempt sweep log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// RFC 3339 local time of the attempt.
    pub timestamp: String,
    pub converged: bool,
    #[serde(rename = "T_hs_ff")]
    pub t_hs_ff: f64,
    #[serde(rename = "T_cons_ff")]
    pub t_cons_ff: f64,
    pub pl: f64,
    pub residual: f64,
}
