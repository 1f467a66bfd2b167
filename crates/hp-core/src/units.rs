//! SI quantities for cycle states.
//!
//! Parameters and fluid properties carry `uom` quantities. The flowsheet
//! engine speaks bar and °C, so the two `to_*` helpers mark that boundary.

use uom::si::f64::{MassDensity, Pressure as SiPressure, ThermodynamicTemperature};
use uom::si::pressure::{bar as bar_unit, pascal};
use uom::si::thermodynamic_temperature::{degree_celsius, kelvin};

pub type Pressure = SiPressure;
pub type Temperature = ThermodynamicTemperature;
pub type Density = MassDensity;

/// J/kg
pub type SpecEnthalpy = f64;
/// J/(kg K)
pub type SpecEntropy = f64;

pub mod constants {
    pub const ZERO_CELSIUS_K: f64 = 273.15;
}

pub fn pa(value: f64) -> Pressure {
    Pressure::new::<pascal>(value)
}

pub fn bar(value: f64) -> Pressure {
    Pressure::new::<bar_unit>(value)
}

pub fn k(value: f64) -> Temperature {
    Temperature::new::<kelvin>(value)
}

pub fn celsius(value: f64) -> Temperature {
    Temperature::new::<degree_celsius>(value)
}

pub fn to_bar(p: Pressure) -> f64 {
    p.get::<bar_unit>()
}

pub fn to_celsius(t: Temperature) -> f64 {
    t.get::<degree_celsius>()
}
