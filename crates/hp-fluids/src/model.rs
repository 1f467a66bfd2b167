//! Equation-of-state service used by the cycle model.

use crate::error::{FluidError, FluidResult};
use hp_core::units::{Density, Pressure, SpecEnthalpy, SpecEntropy, Temperature};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CriticalPoint {
    pub t: Temperature,
    pub p: Pressure,
}

/// Pure-fluid property lookups.
///
/// Fluids are named by backend identifier (`"R1234ze(E)"`, `"R717"`, `"CO2"`,
/// `"water"`). Saturation queries refer to the dew line. A heat pump shares
/// one service between its parameterization code and the engine adapter, so
/// implementations are `Send + Sync`.
pub trait EosService: Send + Sync {
    fn name(&self) -> &str;

    fn critical_point(&self, fluid: &str) -> FluidResult<CriticalPoint>;

    fn p_sat(&self, fluid: &str, t: Temperature) -> FluidResult<Pressure>;

    fn t_sat(&self, fluid: &str, p: Pressure) -> FluidResult<Temperature>;

    /// Enthalpy on the two-phase line at quality `x`.
    fn h_px(&self, fluid: &str, p: Pressure, x: f64) -> FluidResult<SpecEnthalpy>;

    fn h_pt(&self, fluid: &str, p: Pressure, t: Temperature) -> FluidResult<SpecEnthalpy>;

    fn t_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<Temperature>;

    fn s_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<SpecEntropy>;

    fn h_ps(&self, fluid: &str, p: Pressure, s: SpecEntropy) -> FluidResult<SpecEnthalpy>;

    fn rho_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<Density>;

    /// Discharge temperature of an ideal compressor taking `(p_in, h_in)` to
    /// `p_out`. Used to bound the transcritical high pressure.
    fn t_isentropic_out(
        &self,
        fluid: &str,
        p_in: Pressure,
        h_in: SpecEnthalpy,
        p_out: Pressure,
    ) -> FluidResult<Temperature> {
        let s = self.s_ph(fluid, p_in, h_in)?;
        let h_out = self.h_ps(fluid, p_out, s)?;
        self.t_ph(fluid, p_out, h_out)
    }
}

/// Input checks shared by property backends.
pub mod validation {
    use super::*;

    fn non_physical(ok: bool, what: &'static str) -> FluidResult<()> {
        if ok {
            Ok(())
        } else {
            Err(FluidError::NonPhysical { what })
        }
    }

    pub fn validate_pressure(p: Pressure) -> FluidResult<()> {
        non_physical(p.value.is_finite() && p.value > 0.0, "pressure must be above 0 Pa")
    }

    pub fn validate_temperature(t: Temperature) -> FluidResult<()> {
        non_physical(t.value.is_finite() && t.value > 0.0, "temperature must be above 0 K")
    }

    pub fn validate_enthalpy(h: SpecEnthalpy) -> FluidResult<()> {
        non_physical(h.is_finite(), "enthalpy is not finite")
    }

    /// Quality is a range problem rather than a physics one: the caller asked
    /// for a point off the saturation dome.
    pub fn validate_quality(x: f64) -> FluidResult<()> {
        if (0.0..=1.0).contains(&x) {
            Ok(())
        } else {
            Err(FluidError::OutOfRange {
                what: format!("vapour quality {x} is not in [0, 1]"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use crate::FluidError;
    use hp_core::units::{bar, celsius, k, pa};

    #[test]
    fn pressure_and_temperature_must_be_positive() {
        assert!(validate_pressure(bar(12.0)).is_ok());
        for p in [0.0, -1.0e3, f64::NAN] {
            assert!(validate_pressure(pa(p)).is_err(), "{p}");
        }
        assert!(validate_temperature(celsius(-40.0)).is_ok());
        assert!(validate_temperature(k(0.0)).is_err());
    }

    #[test]
    fn quality_outside_the_dome_is_out_of_range() {
        assert!(validate_quality(0.0).is_ok() && validate_quality(1.0).is_ok());
        assert!(matches!(
            validate_quality(1.05),
            Err(FluidError::OutOfRange { .. })
        ));
        assert!(validate_quality(f64::NAN).is_err());
    }

    #[test]
    fn negative_enthalpy_is_allowed() {
        assert!(validate_enthalpy(-1.5e5).is_ok());
        assert!(validate_enthalpy(f64::NEG_INFINITY).is_err());
    }
}
