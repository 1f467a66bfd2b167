//! Parameter schema definitions.
//!
//! Temperatures are °C, pressures bar, heat duties W. Heat delivered to the
//! consumer carries a negative sign (`cons.Q`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ProjectError, ProjectResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Params {
    pub setup: SetupDef,
    pub fluids: FluidsDef,
    #[serde(rename = "B1")]
    pub b1: StreamDef,
    #[serde(rename = "B2")]
    pub b2: StreamDef,
    #[serde(rename = "C0")]
    pub c0: StreamDef,
    #[serde(rename = "C3")]
    pub c3: StreamDef,
    /// High-side pressure of transcritical cycles.
    #[serde(rename = "A0", default, skip_serializing_if = "Option::is_none")]
    pub a0: Option<PressureDef>,
    pub ambient: StreamDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offdesign: Option<OffdesignDef>,
    /// Per-component design numbers keyed by component label.
    #[serde(flatten)]
    pub components: BTreeMap<String, ComponentParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetupDef {
    /// Topology tag (`simple`, `ihx_pc_econ_closed`, `cascade_trans`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refrig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refrig1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refrig2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub econ: Option<EconType>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EconType {
    Open,
    Closed,
}

impl EconType {
    pub fn as_str(self) -> &'static str {
        match self {
            EconType::Open => "open",
            EconType::Closed => "closed",
        }
    }
}

/// Working fluids (EOS identifiers) plus sink and source media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FluidsDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf: Option<String>,
    /// Low-temperature loop of a cascade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf1: Option<String>,
    /// High-temperature loop of a cascade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf2: Option<String>,
    pub si: String,
    pub so: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamDef {
    #[serde(rename = "T")]
    pub t: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PressureDef {
    pub p: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OffdesignDef {
    #[serde(rename = "T_hs_ff_start")]
    pub t_hs_ff_start: f64,
    #[serde(rename = "T_hs_ff_end")]
    pub t_hs_ff_end: f64,
    #[serde(rename = "T_hs_ff_steps")]
    pub t_hs_ff_steps: usize,
    #[serde(rename = "T_cons_ff_start")]
    pub t_cons_ff_start: f64,
    #[serde(rename = "T_cons_ff_end")]
    pub t_cons_ff_end: f64,
    #[serde(rename = "T_cons_ff_steps")]
    pub t_cons_ff_steps: usize,
    pub partload_min: f64,
    pub partload_max: f64,
    pub partload_steps: usize,
    /// Write the per-attempt CSV log.
    #[serde(default)]
    pub save_results: bool,
}

/// Design numbers for one component; which ones are required depends on
/// the component's role in the topology.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttd_u: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttd_l: Option<f64>,
    #[serde(rename = "dT_sh", default, skip_serializing_if = "Option::is_none")]
    pub dt_sh: Option<f64>,
    #[serde(rename = "dT_ic", default, skip_serializing_if = "Option::is_none")]
    pub dt_ic: Option<f64>,
    #[serde(rename = "Q", default, skip_serializing_if = "Option::is_none")]
    pub q: Option<f64>,
}

/// Names a field of [`ComponentParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    EtaS,
    Pr,
    Pr1,
    Pr2,
    TtdU,
    TtdL,
    DtSh,
    DtIc,
    Q,
}

impl Field {
    /// Key as spelled in parameter files.
    pub fn key(self) -> &'static str {
        match self {
            Field::EtaS => "eta_s",
            Field::Pr => "pr",
            Field::Pr1 => "pr1",
            Field::Pr2 => "pr2",
            Field::TtdU => "ttd_u",
            Field::TtdL => "ttd_l",
            Field::DtSh => "dT_sh",
            Field::DtIc => "dT_ic",
            Field::Q => "Q",
        }
    }
}

impl ComponentParams {
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::EtaS => self.eta_s,
            Field::Pr => self.pr,
            Field::Pr1 => self.pr1,
            Field::Pr2 => self.pr2,
            Field::TtdU => self.ttd_u,
            Field::TtdL => self.ttd_l,
            Field::DtSh => self.dt_sh,
            Field::DtIc => self.dt_ic,
            Field::Q => self.q,
        }
    }

    pub fn set(&mut self, field: Field, value: f64) {
        let slot = match field {
            Field::EtaS => &mut self.eta_s,
            Field::Pr => &mut self.pr,
            Field::Pr1 => &mut self.pr1,
            Field::Pr2 => &mut self.pr2,
            Field::TtdU => &mut self.ttd_u,
            Field::TtdL => &mut self.ttd_l,
            Field::DtSh => &mut self.dt_sh,
            Field::DtIc => &mut self.dt_ic,
            Field::Q => &mut self.q,
        };
        *slot = Some(value);
    }
}

fn missing(key: impl Into<String>) -> ProjectError {
    ProjectError::MissingKey { key: key.into() }
}

impl Params {
    /// Required design number of a component.
    pub fn value(&self, component: &str, field: Field) -> ProjectResult<f64> {
        self.optional_value(component, field)
            .ok_or_else(|| missing(format!("{component}.{}", field.key())))
    }

    pub fn optional_value(&self, component: &str, field: Field) -> Option<f64> {
        self.components.get(component).and_then(|c| c.get(field))
    }

    /// Set a component's design number, creating the section if needed.
    pub fn set_value(&mut self, component: &str, field: Field, value: f64) {
        self.components
            .entry(component.to_string())
            .or_default()
            .set(field, value);
    }

    pub fn stream_p(&self, label: &str) -> ProjectResult<f64> {
        let stream = match label {
            "B1" => &self.b1,
            "B2" => &self.b2,
            "C0" => &self.c0,
            "C3" => &self.c3,
            "ambient" => &self.ambient,
            other => return Err(missing(other)),
        };
        stream.p.ok_or_else(|| missing(format!("{label}.p")))
    }

    /// Working fluid of a single-refrigerant cycle.
    pub fn wf(&self) -> ProjectResult<&str> {
        self.fluids.wf.as_deref().ok_or_else(|| missing("fluids.wf"))
    }

    /// Working fluids of a cascade (low-temperature, high-temperature).
    pub fn wf_cascade(&self) -> ProjectResult<(&str, &str)> {
        let lt = self.fluids.wf1.as_deref().ok_or_else(|| missing("fluids.wf1"))?;
        let ht = self.fluids.wf2.as_deref().ok_or_else(|| missing("fluids.wf2"))?;
        Ok((lt, ht))
    }

    /// High-side pressure of transcritical cycles [bar].
    pub fn a0_p(&self) -> ProjectResult<f64> {
        self.a0.as_ref().map(|a| a.p).ok_or_else(|| missing("A0.p"))
    }

    pub fn offdesign(&self) -> ProjectResult<&OffdesignDef> {
        self.offdesign.as_ref().ok_or_else(|| missing("offdesign"))
    }

    /// Refrigerant display names in loop order (low to high temperature).
    pub fn refrigerants(&self) -> ProjectResult<Vec<&str>> {
        match (&self.setup.refrig, &self.setup.refrig1, &self.setup.refrig2) {
            (_, Some(r1), Some(r2)) => Ok(vec![r1.as_str(), r2.as_str()]),
            (Some(r), _, _) => Ok(vec![r.as_str()]),
            (None, Some(r1), None) => Ok(vec![r1.as_str()]),
            (None, None, _) => Err(missing("setup.refrig")),
        }
    }

    /// `{type}_{refrig1}[_{refrig2}]`, the stem of every persisted artifact.
    pub fn subdirname(&self) -> ProjectResult<String> {
        let refrigerants = self.refrigerants()?;
        Ok(format!("{}_{}", self.setup.kind, refrigerants.join("_")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        let json = r#"{
            "setup": {"type": "simple", "refrig": "R1234ZE(E)"},
            "fluids": {"wf": "R1234ze(E)", "si": "water", "so": "water"},
            "B1": {"T": 25.0, "p": 1.0},
            "B2": {"T": 15.0, "p": 1.0},
            "C0": {"T": 40.0, "p": 10.0},
            "C3": {"T": 70.0, "p": 10.0},
            "ambient": {"T": 10.0, "p": 1.013},
            "comp": {"eta_s": 0.85},
            "cons": {"Q": -1.0e6, "pr": 0.99}
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn flattened_components_parse() {
        let p = params();
        assert_eq!(p.value("comp", Field::EtaS).unwrap(), 0.85);
        assert_eq!(p.value("cons", Field::Q).unwrap(), -1.0e6);
        assert_eq!(p.components.len(), 2);
    }

    #[test]
    fn missing_key_names_component_and_field() {
        let p = params();
        let err = p.value("evap", Field::TtdL).unwrap_err();
        assert_eq!(err.to_string(), "Missing parameter: evap.ttd_l");
        let err = p.a0_p().unwrap_err();
        assert!(err.to_string().contains("A0.p"));
    }

    #[test]
    fn subdirname_joins_refrigerants() {
        let mut p = params();
        assert_eq!(p.subdirname().unwrap(), "simple_R1234ZE(E)");
        p.setup.kind = "cascade".into();
        p.setup.refrig = None;
        p.setup.refrig1 = Some("R1234ZE(E)".into());
        p.setup.refrig2 = Some("R717".into());
        assert_eq!(p.subdirname().unwrap(), "cascade_R1234ZE(E)_R717");
    }

    #[test]
    fn set_value_creates_section() {
        let mut p = params();
        p.set_value("ihx", Field::DtSh, 5.0);
        assert_eq!(p.optional_value("ihx", Field::DtSh), Some(5.0));
    }

    #[test]
    fn econ_type_lowercase() {
        let e: EconType = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(e, EconType::Closed);
        assert_eq!(serde_json::to_string(&EconType::Open).unwrap(), "\"open\"");
    }
}
