//! CoolProp-based equation-of-state service.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{FluidError, FluidResult};
use crate::model::{CriticalPoint, EosService, validation};
use hp_core::units::{Density, Pressure, SpecEnthalpy, SpecEntropy, Temperature, k, pa};
use rfluids::io::{FluidInputPair, FluidParam, FluidTrivialParam};
use rfluids::native::AbstractState;
use uom::si::mass_density::kilogram_per_cubic_meter;
use uom::si::pressure::pascal;
use uom::si::thermodynamic_temperature::kelvin;

const BACKEND: &str = "HEOS";

/// CoolProp backend for pure refrigerants.
///
/// One `AbstractState` is created per fluid on first use and kept for the
/// lifetime of the service. The map sits behind a mutex so an update and the
/// outputs read from it stay paired.
pub struct CoolPropEos {
    states: Mutex<HashMap<String, AbstractState>>,
}

impl Default for CoolPropEos {
    fn default() -> Self {
        Self::new()
    }
}

impl CoolPropEos {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> FluidResult<MutexGuard<'_, HashMap<String, AbstractState>>> {
        self.states.lock().map_err(|_| FluidError::Backend {
            message: "CoolProp abstract state mutex poisoned".into(),
        })
    }

    /// Update the fluid's state from an input pair and read `outputs`.
    fn query<const N: usize>(
        &self,
        fluid: &str,
        pair: FluidInputPair,
        input1: f64,
        input2: f64,
        outputs: [FluidParam; N],
    ) -> FluidResult<[f64; N]> {
        let mut states = self.lock()?;
        let state = state_for(&mut states, fluid)?;
        state
            .update(pair, input1, input2)
            .map_err(|e| map_backend_error(fluid, &e.to_string()))?;

        let mut values = [0.0; N];
        for (slot, param) in values.iter_mut().zip(outputs) {
            *slot = state
                .keyed_output(param)
                .map_err(|e| map_backend_error(fluid, &e.to_string()))?;
        }
        Ok(values)
    }

    fn trivial(&self, fluid: &str, param: FluidTrivialParam) -> FluidResult<f64> {
        let mut states = self.lock()?;
        let state = state_for(&mut states, fluid)?;
        state
            .keyed_output(param)
            .map_err(|e| map_backend_error(fluid, &e.to_string()))
    }
}

fn state_for<'a>(
    states: &'a mut HashMap<String, AbstractState>,
    fluid: &str,
) -> FluidResult<&'a mut AbstractState> {
    if !states.contains_key(fluid) {
        let state = AbstractState::new(BACKEND, fluid).map_err(|_| FluidError::UnknownFluid {
            name: fluid.to_string(),
        })?;
        tracing::debug!(fluid, backend = BACKEND, "created CoolProp abstract state");
        states.insert(fluid.to_string(), state);
    }
    states
        .get_mut(fluid)
        .ok_or_else(|| FluidError::UnknownFluid {
            name: fluid.to_string(),
        })
}

/// Classify a CoolProp error message.
///
/// CoolProp reports failures as free text; range problems are split out so
/// callers can tell a state outside the fluid's validity from a backend fault.
fn map_backend_error(fluid: &str, message: &str) -> FluidError {
    const OUT_OF_RANGE_MARKERS: &[&str] = &[
        "out of range",
        "not in range",
        "outside the range of validity",
        "must be between",
        "must be in range",
        "above critical",
    ];
    let lowered = message.to_lowercase();
    if OUT_OF_RANGE_MARKERS.iter().any(|m| lowered.contains(m)) {
        FluidError::OutOfRange {
            what: format!("{fluid}: {message}"),
        }
    } else {
        FluidError::Backend {
            message: format!("{fluid}: {message}"),
        }
    }
}

impl EosService for CoolPropEos {
    fn name(&self) -> &str {
        "CoolProp"
    }

    fn critical_point(&self, fluid: &str) -> FluidResult<CriticalPoint> {
        let t = self.trivial(fluid, FluidTrivialParam::TCritical)?;
        let p = self.trivial(fluid, FluidTrivialParam::PCritical)?;
        Ok(CriticalPoint { t: k(t), p: pa(p) })
    }

    fn p_sat(&self, fluid: &str, t: Temperature) -> FluidResult<Pressure> {
        validation::validate_temperature(t)?;
        let [p] = self.query(
            fluid,
            FluidInputPair::QT,
            1.0,
            t.get::<kelvin>(),
            [FluidParam::P],
        )?;
        let p = pa(p);
        validation::validate_pressure(p)?;
        Ok(p)
    }

    fn t_sat(&self, fluid: &str, p: Pressure) -> FluidResult<Temperature> {
        validation::validate_pressure(p)?;
        let [t] = self.query(
            fluid,
            FluidInputPair::PQ,
            p.get::<pascal>(),
            1.0,
            [FluidParam::T],
        )?;
        Ok(k(t))
    }

    fn h_px(&self, fluid: &str, p: Pressure, x: f64) -> FluidResult<SpecEnthalpy> {
        validation::validate_pressure(p)?;
        validation::validate_quality(x)?;
        let [h] = self.query(
            fluid,
            FluidInputPair::PQ,
            p.get::<pascal>(),
            x,
            [FluidParam::HMass],
        )?;
        Ok(h)
    }

    fn h_pt(&self, fluid: &str, p: Pressure, t: Temperature) -> FluidResult<SpecEnthalpy> {
        validation::validate_pressure(p)?;
        validation::validate_temperature(t)?;
        let [h] = self.query(
            fluid,
            FluidInputPair::PT,
            p.get::<pascal>(),
            t.get::<kelvin>(),
            [FluidParam::HMass],
        )?;
        validation::validate_enthalpy(h)?;
        Ok(h)
    }

    fn t_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<Temperature> {
        validation::validate_pressure(p)?;
        validation::validate_enthalpy(h)?;
        let [t] = self.query(
            fluid,
            FluidInputPair::HMassP,
            h,
            p.get::<pascal>(),
            [FluidParam::T],
        )?;
        Ok(k(t))
    }

    fn s_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<SpecEntropy> {
        validation::validate_pressure(p)?;
        validation::validate_enthalpy(h)?;
        let [s] = self.query(
            fluid,
            FluidInputPair::HMassP,
            h,
            p.get::<pascal>(),
            [FluidParam::SMass],
        )?;
        Ok(s)
    }

    fn h_ps(&self, fluid: &str, p: Pressure, s: SpecEntropy) -> FluidResult<SpecEnthalpy> {
        validation::validate_pressure(p)?;
        let [h] = self.query(
            fluid,
            FluidInputPair::PSMass,
            p.get::<pascal>(),
            s,
            [FluidParam::HMass],
        )?;
        Ok(h)
    }

    fn rho_ph(&self, fluid: &str, p: Pressure, h: SpecEnthalpy) -> FluidResult<Density> {
        validation::validate_pressure(p)?;
        validation::validate_enthalpy(h)?;
        let [rho] = self.query(
            fluid,
            FluidInputPair::HMassP,
            h,
            p.get::<pascal>(),
            [FluidParam::DMass],
        )?;
        if !rho.is_finite() || rho <= 0.0 {
            return Err(FluidError::NonPhysical {
                what: "density must be positive and finite",
            });
        }
        Ok(Density::new::<kilogram_per_cubic_meter>(rho))
    }
}
