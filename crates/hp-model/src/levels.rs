//! Pressure levels from boundary temperatures.
//!
//! Evaporation sits at the saturation pressure of the source return minus the
//! evaporator pinch, condensation at the saturation pressure of the sink feed
//! plus the condenser pinch. Transcritical loops take their high side from
//! `A0.p` and the gas cooler outlet enthalpy from the sink return plus pinch.

use hp_core::units::{bar, celsius, to_bar, to_celsius};
use hp_fluids::EosService;
use hp_project::{Field, Params};

use crate::error::{ModelError, ModelResult};
use crate::topology::Layout;

/// Source and sink temperatures the levels are computed from [°C].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryTemps {
    /// Source return (`B2`).
    pub t_hs_bf: f64,
    /// Sink feed (`C3`).
    pub t_cons_ff: f64,
    /// Sink return (`C0`).
    pub t_cons_bf: f64,
}

impl BoundaryTemps {
    pub fn design(params: &Params) -> Self {
        Self {
            t_hs_bf: params.b2.t,
            t_cons_ff: params.c3.t,
            t_cons_bf: params.c0.t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HighSide {
    /// Condensation pressure [bar].
    Condensing { p_cond: f64 },
    /// Fixed high-side pressure [bar] and gas cooler outlet enthalpy [J/kg].
    Transcritical { p_hi: f64, h_out: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeLevels {
    /// Intermediate temperature [°C].
    pub t_mid: f64,
    /// Condensation pressure of the low-temperature loop [bar].
    pub p_lt_cond: f64,
    /// Evaporation pressure of the high-temperature loop [bar].
    pub p_ht_evap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureLevels {
    /// Evaporation pressure of the loop facing the source [bar].
    pub p_evap: f64,
    pub high: HighSide,
    /// Intermediate pressure of a staged high-temperature loop [bar].
    pub p_mid: Option<f64>,
    pub cascade: Option<CascadeLevels>,
}

impl PressureLevels {
    /// High-side pressure of the loop facing the sink [bar].
    pub fn p_hi(&self) -> f64 {
        match self.high {
            HighSide::Condensing { p_cond } => p_cond,
            HighSide::Transcritical { p_hi, .. } => p_hi,
        }
    }

    /// Low-side pressure of the loop facing the sink [bar].
    pub fn p_lo_high_loop(&self) -> f64 {
        self.cascade.map_or(self.p_evap, |c| c.p_ht_evap)
    }
}

/// Working fluids in loop order, low-temperature loop first.
pub fn working_fluids(params: &Params, layout: &Layout) -> ModelResult<Vec<String>> {
    if layout.is_cascade() {
        let (lt, ht) = params.wf_cascade()?;
        Ok(vec![lt.to_string(), ht.to_string()])
    } else {
        Ok(vec![params.wf()?.to_string()])
    }
}

/// Midpoint between source return and sink feed.
pub fn cascade_mid_temperature(t_hs_bf: f64, t_cons_ff: f64) -> f64 {
    (t_hs_bf + t_cons_ff) / 2.0
}

pub fn pressure_levels(
    eos: &dyn EosService,
    params: &Params,
    layout: &Layout,
    temps: BoundaryTemps,
) -> ModelResult<PressureLevels> {
    let fluids = working_fluids(params, layout)?;
    let (low, high) = match fluids.as_slice() {
        [only] => (only.as_str(), only.as_str()),
        [lt, ht] => (lt.as_str(), ht.as_str()),
        _ => return Err(ModelError::configuration("expected one or two working fluids")),
    };

    let evap_ttd_l = params.value("evap", Field::TtdL)?;
    let t_evap = temps.t_hs_bf - evap_ttd_l;
    let p_evap = to_bar(eos.p_sat(low, celsius(t_evap))?);

    let cascade = if layout.is_cascade() {
        let t_mid = cascade_mid_temperature(temps.t_hs_bf, temps.t_cons_ff);
        let t_crit = to_celsius(eos.critical_point(low)?.t);
        if t_mid >= t_crit {
            return Err(ModelError::ConstraintViolation {
                connection: "D0".into(),
                what: format!("intermediate temperature at or above the critical temperature of {low}"),
                value: t_mid,
                limit: t_crit,
            });
        }
        let half_pinch = params.value("inter", Field::TtdU)? / 2.0;
        Some(CascadeLevels {
            t_mid,
            p_lt_cond: to_bar(eos.p_sat(low, celsius(t_mid + half_pinch))?),
            p_ht_evap: to_bar(eos.p_sat(high, celsius(t_mid - half_pinch))?),
        })
    } else {
        None
    };

    let high_side = if layout.is_transcritical() {
        let p_hi = params.a0_p()?;
        let t_out = temps.t_cons_bf + params.value("gc", Field::TtdL)?;
        HighSide::Transcritical {
            p_hi,
            h_out: eos.h_pt(high, bar(p_hi), celsius(t_out))?,
        }
    } else {
        let t_cond = temps.t_cons_ff + params.value("cond", Field::TtdU)?;
        HighSide::Condensing {
            p_cond: to_bar(eos.p_sat(high, celsius(t_cond))?),
        }
    };

    let mut levels = PressureLevels {
        p_evap,
        high: high_side,
        p_mid: None,
        cascade,
    };
    if layout.high_loop().is_staged() {
        levels.p_mid = Some((levels.p_lo_high_loop() * levels.p_hi()).sqrt());
    }
    tracing::debug!(
        p_evap = levels.p_evap,
        p_hi = levels.p_hi(),
        p_mid = ?levels.p_mid,
        t_mid = ?levels.cascade.map(|c| c.t_mid),
        "pressure levels"
    );
    Ok(levels)
}
