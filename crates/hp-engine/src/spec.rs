//! Parameter assignments sent to the engine.
//!
//! A parameterization step is a list of partial updates: every variable a
//! step does not mention keeps its previous assignment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Assignment for one variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Fixed at a number (engine units).
    Fixed(f64),
    /// `factor · (same variable at conn) + delta`.
    Ref { conn: String, factor: f64, delta: f64 },
    /// Released: the engine solves for it.
    Free,
}

impl Value {
    pub fn reference(conn: impl Into<String>, factor: f64, delta: f64) -> Self {
        Value::Ref {
            conn: conn.into(),
            factor,
            delta,
        }
    }

    pub fn as_fixed(&self) -> Option<f64> {
        match self {
            Value::Fixed(v) => Some(*v),
            _ => None,
        }
    }
}

/// Connection state variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateVar {
    /// Mass flow [kg/s].
    M,
    /// Pressure [bar].
    P,
    /// Specific enthalpy [J/kg].
    H,
    /// Temperature [°C].
    T,
    /// Vapor quality [-].
    X,
    /// Volumetric flow [m³/s].
    V,
    /// Temperature difference to the boiling point [K].
    TdBp,
}

/// Settings for one connection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    pub values: BTreeMap<StateVar, Value>,
    /// Pure working fluid carried by the connection.
    pub fluid: Option<String>,
    /// Variables held fixed in design mode only.
    pub design: Option<Vec<StateVar>>,
    /// Variables held fixed in off-design mode only.
    pub offdesign: Option<Vec<StateVar>>,
}

impl StateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(mut self, var: StateVar, value: f64) -> Self {
        self.values.insert(var, Value::Fixed(value));
        self
    }

    pub fn reference(mut self, var: StateVar, conn: &str, factor: f64, delta: f64) -> Self {
        self.values
            .insert(var, Value::reference(conn, factor, delta));
        self
    }

    pub fn free(mut self, var: StateVar) -> Self {
        self.values.insert(var, Value::Free);
        self
    }

    pub fn fluid(mut self, name: impl Into<String>) -> Self {
        self.fluid = Some(name.into());
        self
    }

    pub fn design(mut self, vars: &[StateVar]) -> Self {
        self.design = Some(vars.to_vec());
        self
    }

    pub fn offdesign(mut self, vars: &[StateVar]) -> Self {
        self.offdesign = Some(vars.to_vec());
        self
    }

    pub fn get(&self, var: StateVar) -> Option<&Value> {
        self.values.get(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.fluid.is_none()
            && self.design.is_none()
            && self.offdesign.is_none()
    }
}

/// Component attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentAttr {
    /// Isentropic efficiency.
    EtaS,
    /// Pressure ratio of a one-sided component.
    Pr,
    /// Pressure ratio, hot side.
    Pr1,
    /// Pressure ratio, cold side.
    Pr2,
    /// Upper terminal temperature difference [K].
    TtdU,
    /// Lower terminal temperature difference [K].
    TtdL,
    /// Heat duty [W].
    Q,
    /// Heat transfer coefficient times area [W/K].
    KA,
    /// Pressure loss coefficient.
    Zeta,
    /// Power [W].
    P,
    /// Efficiency follows the part-load characteristic.
    EtaSChar,
    /// kA follows the part-load characteristic.
    KaChar,
}

/// Which stock kA characteristic a heat exchanger side follows off design.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KaCharKind {
    Default,
    CondensingFluid,
    EvaporatingFluid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KaChar {
    pub hot: KaCharKind,
    pub cold: KaCharKind,
}

/// Settings for one component.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentUpdate {
    pub values: BTreeMap<ComponentAttr, Value>,
    pub design: Option<Vec<ComponentAttr>>,
    pub offdesign: Option<Vec<ComponentAttr>>,
    pub ka_char: Option<KaChar>,
}

impl ComponentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(mut self, attr: ComponentAttr, value: f64) -> Self {
        self.values.insert(attr, Value::Fixed(value));
        self
    }

    pub fn free(mut self, attr: ComponentAttr) -> Self {
        self.values.insert(attr, Value::Free);
        self
    }

    pub fn design(mut self, attrs: &[ComponentAttr]) -> Self {
        self.design = Some(attrs.to_vec());
        self
    }

    pub fn offdesign(mut self, attrs: &[ComponentAttr]) -> Self {
        self.offdesign = Some(attrs.to_vec());
        self
    }

    pub fn ka_char(mut self, hot: KaCharKind, cold: KaCharKind) -> Self {
        self.ka_char = Some(KaChar { hot, cold });
        self
    }

    pub fn get(&self, attr: ComponentAttr) -> Option<&Value> {
        self.values.get(&attr)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.design.is_none()
            && self.offdesign.is_none()
            && self.ka_char.is_none()
    }
}
