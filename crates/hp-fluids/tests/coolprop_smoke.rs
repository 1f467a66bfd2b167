//! CoolProp integration tests.
//!
//! Broad tolerances keep these stable across backend versions while still
//! enforcing physical plausibility.

use hp_core::units::{bar, celsius, to_bar, to_celsius};
use hp_fluids::{CoolPropEos, EosService, FluidError};

#[test]
fn water_saturation_at_100c() {
    let eos = CoolPropEos::new();
    let p = eos.p_sat("water", celsius(100.0)).unwrap();
    assert!((to_bar(p) - 1.01325).abs() < 0.01, "p_sat = {} bar", to_bar(p));
}

#[test]
fn saturation_lookups_are_inverse() {
    let eos = CoolPropEos::new();
    let t = celsius(10.0);
    let p = eos.p_sat("R1234ze(E)", t).unwrap();
    let t_back = eos.t_sat("R1234ze(E)", p).unwrap();
    assert!((to_celsius(t_back) - 10.0).abs() < 1e-3);
}

#[test]
fn r1234ze_critical_point() {
    let eos = CoolPropEos::new();
    let crit = eos.critical_point("R1234ze(E)").unwrap();
    assert!((to_celsius(crit.t) - 109.36).abs() < 0.5);
    assert!((to_bar(crit.p) - 36.35).abs() < 0.5);
}

#[test]
fn isentropic_compression_heats_the_gas() {
    let eos = CoolPropEos::new();
    let fluid = "R1234ze(E)";
    let p_in = eos.p_sat(fluid, celsius(5.0)).unwrap();
    let h_in = eos.h_px(fluid, p_in, 1.0).unwrap();
    let p_out = p_in * 3.0;
    let t_out = eos.t_isentropic_out(fluid, p_in, h_in, p_out).unwrap();
    let t_sat_out = eos.t_sat(fluid, p_out).unwrap();
    assert!(t_out.value > t_sat_out.value);
}

#[test]
fn enthalpy_temperature_round_trip() {
    let eos = CoolPropEos::new();
    let p = bar(90.0);
    let h = eos.h_pt("CO2", p, celsius(35.0)).unwrap();
    let t = eos.t_ph("CO2", p, h).unwrap();
    assert!((to_celsius(t) - 35.0).abs() < 1e-3);
    let rho = eos.rho_ph("CO2", p, h).unwrap();
    assert!(rho.value > 100.0 && rho.value < 1200.0);
}

#[test]
fn unknown_fluid_is_rejected() {
    let eos = CoolPropEos::new();
    let err = eos.p_sat("NotARefrigerant", celsius(0.0)).unwrap_err();
    assert!(matches!(err, FluidError::UnknownFluid { .. }));
}
