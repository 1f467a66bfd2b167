//! Analytic equation of state for tests.
//!
//! Saturation follows `ln(p/pc) = A (1 - Tc/T)` with the Edmister slope
//! `A = 7/3 ln(10) (1 + ω)`. Liquid and vapor have constant heat capacities,
//! the latent heat follows a Watson-type decay to zero at the critical point,
//! and vapor volume is ideal gas. Above the critical pressure there is no
//! two-phase region; the fluid switches from liquid to gas at `Tc`.

use hp_core::units::{Density, Pressure, SpecEnthalpy, SpecEntropy, Temperature, k, pa};
use hp_fluids::model::validation;
use hp_fluids::{CriticalPoint, EosService, FluidError, FluidResult};
use uom::si::mass_density::kilogram_per_cubic_meter;

const T_REF: f64 = 273.15;
const R_UNIVERSAL: f64 = 8.314_462;

#[derive(Clone, Copy, Debug)]
struct FluidConstants {
    names: &'static [&'static str],
    /// Critical temperature [K].
    tc: f64,
    /// Critical pressure [Pa].
    pc: f64,
    /// Acentric factor.
    omega: f64,
    /// Molar mass [kg/mol].
    molar_mass: f64,
    cp_l: f64,
    cp_v: f64,
    rho_l: f64,
}

const FLUIDS: &[FluidConstants] = &[
    FluidConstants {
        names: &["R1234ze(E)", "R1234ZE(E)"],
        tc: 382.51,
        pc: 3.6349e6,
        omega: 0.313,
        molar_mass: 0.114_04,
        cp_l: 1400.0,
        cp_v: 1000.0,
        rho_l: 1150.0,
    },
    FluidConstants {
        names: &["R1234yf"],
        tc: 367.85,
        pc: 3.3822e6,
        omega: 0.276,
        molar_mass: 0.114_04,
        cp_l: 1350.0,
        cp_v: 1000.0,
        rho_l: 1100.0,
    },
    FluidConstants {
        names: &["R1233zd(E)"],
        tc: 439.6,
        pc: 3.5709e6,
        omega: 0.305,
        molar_mass: 0.130_5,
        cp_l: 1250.0,
        cp_v: 900.0,
        rho_l: 1250.0,
    },
    FluidConstants {
        names: &["R134a"],
        tc: 374.21,
        pc: 4.0593e6,
        omega: 0.327,
        molar_mass: 0.102_03,
        cp_l: 1420.0,
        cp_v: 1000.0,
        rho_l: 1200.0,
    },
    FluidConstants {
        names: &["n-Propane", "R290", "Propane"],
        tc: 369.89,
        pc: 4.2512e6,
        omega: 0.152,
        molar_mass: 0.044_10,
        cp_l: 2600.0,
        cp_v: 1900.0,
        rho_l: 500.0,
    },
    FluidConstants {
        names: &["IsoButane", "R600a"],
        tc: 407.81,
        pc: 3.629e6,
        omega: 0.184,
        molar_mass: 0.058_12,
        cp_l: 2400.0,
        cp_v: 1800.0,
        rho_l: 550.0,
    },
    FluidConstants {
        names: &["Ammonia", "R717", "NH3"],
        tc: 405.4,
        pc: 1.1333e7,
        omega: 0.256,
        molar_mass: 0.017_031,
        cp_l: 4700.0,
        cp_v: 2900.0,
        rho_l: 600.0,
    },
    FluidConstants {
        names: &["CO2", "R744"],
        tc: 304.13,
        pc: 7.3773e6,
        omega: 0.224,
        molar_mass: 0.044_01,
        cp_l: 2500.0,
        cp_v: 1200.0,
        rho_l: 900.0,
    },
    FluidConstants {
        names: &["Water", "R718", "H2O"],
        tc: 647.096,
        pc: 2.2064e7,
        omega: 0.344,
        molar_mass: 0.018_015,
        cp_l: 4186.0,
        cp_v: 2000.0,
        rho_l: 1000.0,
    },
];

impl FluidConstants {
    fn slope(&self) -> f64 {
        7.0 / 3.0 * std::f64::consts::LN_10 * (1.0 + self.omega)
    }

    fn r_specific(&self) -> f64 {
        R_UNIVERSAL / self.molar_mass
    }

    fn p_sat(&self, t: f64) -> f64 {
        self.pc * (self.slope() * (1.0 - self.tc / t)).exp()
    }

    fn t_sat(&self, p: f64) -> f64 {
        self.tc / (1.0 - (p / self.pc).ln() / self.slope())
    }

    fn latent_heat(&self, t: f64) -> f64 {
        let tr = (t / self.tc).min(1.0);
        self.r_specific() * self.slope() * self.tc * ((1.0 - tr) / 0.3).powf(0.38)
    }

    fn h_liq(&self, t: f64) -> f64 {
        self.cp_l * (t - T_REF)
    }

    fn s_liq(&self, t: f64) -> f64 {
        self.cp_l * (t / T_REF).ln()
    }

    fn subcritical(&self, p: f64) -> bool {
        p < self.pc
    }

    /// Saturated liquid and vapor `(T, h_l, h_v, s_l, s_v)` at `p < pc`.
    fn dome(&self, p: f64) -> (f64, f64, f64, f64, f64) {
        let ts = self.t_sat(p);
        let l = self.latent_heat(ts);
        let hl = self.h_liq(ts);
        let sl = self.s_liq(ts);
        (ts, hl, hl + l, sl, sl + l / ts)
    }

    fn t_ph(&self, p: f64, h: f64) -> f64 {
        if self.subcritical(p) {
            let (ts, hl, hv, _, _) = self.dome(p);
            if h < hl {
                T_REF + h / self.cp_l
            } else if h <= hv {
                ts
            } else {
                ts + (h - hv) / self.cp_v
            }
        } else {
            let hc = self.h_liq(self.tc);
            if h <= hc {
                T_REF + h / self.cp_l
            } else {
                self.tc + (h - hc) / self.cp_v
            }
        }
    }

    fn h_pt(&self, p: f64, t: f64) -> f64 {
        if self.subcritical(p) {
            let (ts, _, hv, _, _) = self.dome(p);
            if t < ts {
                self.h_liq(t)
            } else {
                hv + self.cp_v * (t - ts)
            }
        } else if t <= self.tc {
            self.h_liq(t)
        } else {
            self.h_liq(self.tc) + self.cp_v * (t - self.tc)
        }
    }

    fn s_ph(&self, p: f64, h: f64) -> f64 {
        if self.subcritical(p) {
            let (ts, hl, hv, sl, sv) = self.dome(p);
            if h < hl {
                self.s_liq(T_REF + h / self.cp_l)
            } else if h <= hv {
                sl + (h - hl) / ts
            } else {
                sv + self.cp_v * ((ts + (h - hv) / self.cp_v) / ts).ln()
            }
        } else {
            let hc = self.h_liq(self.tc);
            if h <= hc {
                self.s_liq(T_REF + h / self.cp_l)
            } else {
                let t = self.tc + (h - hc) / self.cp_v;
                self.s_liq(self.tc) + self.cp_v * (t / self.tc).ln()
            }
        }
    }

    fn h_ps(&self, p: f64, s: f64) -> f64 {
        if self.subcritical(p) {
            let (ts, hl, hv, sl, sv) = self.dome(p);
            if s < sl {
                self.h_liq(T_REF * (s / self.cp_l).exp())
            } else if s <= sv {
                hl + (s - sl) * ts
            } else {
                let t = ts * ((s - sv) / self.cp_v).exp();
                hv + self.cp_v * (t - ts)
            }
        } else {
            let sc = self.s_liq(self.tc);
            if s <= sc {
                self.h_liq(T_REF * (s / self.cp_l).exp())
            } else {
                let t = self.tc * ((s - sc) / self.cp_v).exp();
                self.h_liq(self.tc) + self.cp_v * (t - self.tc)
            }
        }
    }

    fn specific_volume(&self, p: f64, h: f64) -> f64 {
        let v_liq = 1.0 / self.rho_l;
        let t = self.t_ph(p, h);
        let v_gas = self.r_specific() * t / p;
        if self.subcritical(p) {
            let (_, hl, hv, _, _) = self.dome(p);
            let x = ((h - hl) / (hv - hl)).clamp(0.0, 1.0);
            if h > hv { v_gas } else { x * v_gas + (1.0 - x) * v_liq }
        } else if t <= self.tc {
            v_liq
        } else {
            v_gas
        }
    }
}

/// Clausius-Clapeyron equation of state with real critical constants.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClausiusFluid;

impl ClausiusFluid {
    pub fn new() -> Self {
        Self
    }

    fn constants(fluid: &str) -> FluidResult<&'static FluidConstants> {
        FLUIDS
            .iter()
            .find(|c| c.names.iter().any(|n| n.eq_ignore_ascii_case(fluid)))
            .ok_or_else(|| FluidError::UnknownFluid {
                name: fluid.to_string(),
            })
    }
}

fn require_subcritical(c: &FluidConstants, fluid: &str, p: f64) -> FluidResult<()> {
    if c.subcritical(p) {
        Ok(())
    } else {
        Err(FluidError::OutOfRange {
            what: format!("{fluid}: no saturation state above the critical pressure ({p} Pa)"),
        })
    }
}

impl EosService for ClausiusFluid {
    fn name(&self) -> &str {
        "Clausius"
    }

    fn critical_point(&self, fluid: &str) -> FluidResult<CriticalPoint> {
        let c = Self::constants(fluid)?;
        Ok(CriticalPoint {
            t: k(c.tc),
            p: pa(c.pc),
        })
    }

    fn p_sat(&self, fluid: &str, t: Temperature) -> FluidResult<Pressure> {
        validation::validate_temperature(t)?;
        let c = Self::constants(fluid)?;
        if t.value >= c.tc {
            return Err(FluidError::OutOfRange {
                what: format!("{fluid}: no saturation state above {} K", c.tc),
            });
        }
        Ok(pa(c.p_sat(t.value)))
    }

    fn t_sat(&self, fluid: &str, p: Pressure) -> FluidResult<Temperature> {
        validation::validate_pressure(p)?;
        let c = Self::constants(fluid)?;
        require_subcritical(c, fluid, p.value)?;
        Ok(k(c.t_sat(p.value)))
    }

    fn h_px(&self, fluid: &str, p: Pressure, x: f64) -> FluidResult<SpecEnthalpy> {
        validation::validate_pressure(p)?;
        validation::validate_quality(x)?;
        let c = Self::constants(fluid)?;
        require_subcritical(c, fluid, p.value)?;
        let (_, hl, hv, _, _) = c.dome(p.value);
        Ok(hl + x * (hv - hl))
    }

    fn h_pt(&self, fluid: &str, p: Pressure, t: Temperature) -> FluidResult<SpecEnthalpy> {
        validation::validate_pressure(p)?;
        validation::validate_temperature(t)?;
        let c = Self::constants(fluid)?;
        Ok(c.h_pt(p.value, t.value))
    }

    fn t_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<Temperature> {
        validation::validate_pressure(p)?;
        validation::validate_enthalpy(h)?;
        let c = Self::constants(fluid)?;
        Ok(k(c.t_ph(p.value, h)))
    }

    fn s_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<SpecEntropy> {
        validation::validate_pressure(p)?;
        validation::validate_enthalpy(h)?;
        let c = Self::constants(fluid)?;
        Ok(c.s_ph(p.value, h))
    }

    fn h_ps(&self, fluid: &str, p: Pressure, s: SpecEntropy) -> FluidResult<SpecEnthalpy> {
        validation::validate_pressure(p)?;
        let c = Self::constants(fluid)?;
        Ok(c.h_ps(p.value, s))
    }

    fn rho_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<Density> {
        validation::validate_pressure(p)?;
        validation::validate_enthalpy(h)?;
        let c = Self::constants(fluid)?;
        Ok(Density::new::<kilogram_per_cubic_meter>(
            1.0 / c.specific_volume(p.value, h),
        ))
    }
}
