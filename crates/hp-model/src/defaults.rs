//! Default parameter sets for every registry topology.

use std::collections::BTreeMap;

use hp_fluids::RefrigerantCatalog;
use hp_graph::{ComponentKind, ComponentRole};
use hp_project::{
    ComponentParams, EconType, Field, FluidsDef, OffdesignDef, Params, PressureDef, ProjectError,
    SetupDef, StreamDef, validate_params,
};

use crate::error::{ModelError, ModelResult};
use crate::network::ComponentDraft;
use crate::topology::{Injection, Layout, Staging};

const ETA_S_COMPRESSOR: f64 = 0.85;
const ETA_S_PUMP: f64 = 0.7;
const PRESSURE_RATIO: f64 = 0.99;
const PINCH: f64 = 5.0;
const SUPERHEAT: f64 = 5.0;
const INTERCOOLING: f64 = 15.0;
const HEAT_OUTPUT: f64 = -1.0e6;
/// Transcritical high-side pressure [bar].
const HIGH_SIDE_P: f64 = 140.0;
/// Half-width of the default off-design temperature ranges [K].
const SWEEP_SPAN: f64 = 10.0;

fn stream(t: f64, p: Option<f64>) -> StreamDef {
    StreamDef { t, p }
}

/// A complete, validated parameter set for `tag` with the given
/// refrigerants (display names, low-temperature loop first).
pub fn default_params(tag: &str, refrigerants: &[&str]) -> ModelResult<Params> {
    let layout = Layout::parse(tag, None)?;
    let catalog = RefrigerantCatalog::builtin()?;

    let wanted = if layout.is_cascade() { 2 } else { 1 };
    if refrigerants.len() != wanted {
        return Err(ModelError::configuration(format!(
            "topology '{tag}' needs {wanted} refrigerant(s), got {}",
            refrigerants.len()
        )));
    }
    let ids = refrigerants
        .iter()
        .map(|name| catalog.engine_id(name).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?;

    let econ = econ_type(&layout);
    let (setup, fluids) = if let [lt, ht] = refrigerants {
        (
            SetupDef {
                kind: tag.to_string(),
                name: Some(format!("Heat pump {tag}")),
                refrig: None,
                refrig1: Some(lt.to_string()),
                refrig2: Some(ht.to_string()),
                econ,
            },
            FluidsDef {
                wf: None,
                wf1: Some(ids[0].clone()),
                wf2: Some(ids[1].clone()),
                si: "water".into(),
                so: "water".into(),
            },
        )
    } else {
        (
            SetupDef {
                kind: tag.to_string(),
                name: Some(format!("Heat pump {tag}")),
                refrig: Some(refrigerants[0].to_string()),
                refrig1: None,
                refrig2: None,
                econ,
            },
            FluidsDef {
                wf: Some(ids[0].clone()),
                wf1: None,
                wf2: None,
                si: "water".into(),
                so: "water".into(),
            },
        )
    };

    // (B1, B2, C0, C3) in °C
    let transcritical = layout.is_transcritical();
    let staged = layout.high_loop().is_staged();
    let temps = match (layout.is_cascade(), transcritical) {
        (true, true) => (-5.0, -15.0, 20.0, 60.0),
        (true, false) => (20.0, 10.0, 60.0, 120.0),
        (false, true) if staged => (10.0, 0.0, 30.0, 90.0),
        (false, true) => (25.0, 15.0, 30.0, 90.0),
        (false, false) => (25.0, 15.0, 40.0, 70.0),
    };
    let (t_b1, t_b2, t_c0, t_c3) = temps;

    let mut params = Params {
        setup,
        fluids,
        b1: stream(t_b1, Some(1.0)),
        b2: stream(t_b2, Some(1.0)),
        c0: stream(t_c0, Some(10.0)),
        c3: stream(t_c3, Some(10.0)),
        a0: transcritical.then_some(PressureDef { p: HIGH_SIDE_P }),
        ambient: stream(10.0, Some(1.013)),
        offdesign: Some(OffdesignDef {
            t_hs_ff_start: t_b1 - SWEEP_SPAN,
            t_hs_ff_end: t_b1 + SWEEP_SPAN,
            t_hs_ff_steps: 3,
            t_cons_ff_start: t_c3 - SWEEP_SPAN,
            t_cons_ff_end: t_c3 + SWEEP_SPAN,
            t_cons_ff_steps: 3,
            partload_min: 0.5,
            partload_max: 1.0,
            partload_steps: 6,
            save_results: false,
        }),
        components: BTreeMap::new(),
    };

    let draft = ComponentDraft::from_layout(layout);
    for comp in &draft.components {
        let label = comp.label.as_str();
        let mut section = ComponentParams::default();
        match (comp.kind, comp.role) {
            (ComponentKind::Compressor, _) => section.set(Field::EtaS, ETA_S_COMPRESSOR),
            (ComponentKind::Pump, _) => section.set(Field::EtaS, ETA_S_PUMP),
            (ComponentKind::SimpleHeatExchanger, ComponentRole::Consumer) => {
                section.set(Field::Q, HEAT_OUTPUT);
                section.set(Field::Pr, PRESSURE_RATIO);
            }
            (ComponentKind::HeatExchanger | ComponentKind::Condenser, role) => {
                section.set(Field::Pr1, PRESSURE_RATIO);
                section.set(Field::Pr2, PRESSURE_RATIO);
                match role {
                    ComponentRole::Evaporator
                    | ComponentRole::GasCooler
                    | ComponentRole::Economizer => section.set(Field::TtdL, PINCH),
                    ComponentRole::Condenser | ComponentRole::CascadeHx => {
                        section.set(Field::TtdU, PINCH)
                    }
                    ComponentRole::InternalHx => section.set(Field::DtSh, SUPERHEAT),
                    ComponentRole::Intercooler => section.set(Field::DtIc, INTERCOOLING),
                    _ => {}
                }
            }
            _ => continue,
        }
        params.components.insert(label.to_string(), section);
    }

    validate_params(&params).map_err(ProjectError::from)?;
    Ok(params)
}

/// Refrigerants the registry topologies are exercised with.
pub fn default_refrigerants(layout: &Layout) -> &'static [&'static str] {
    match (layout.is_cascade(), layout.is_transcritical()) {
        (true, true) => &["R290", "R744"],
        (true, false) => &["R1234ZE(E)", "R717"],
        (false, true) => &["R744"],
        (false, false) => &["R1234ZE(E)"],
    }
}

/// The econ type a tag implies, if any.
pub fn econ_type(layout: &Layout) -> Option<EconType> {
    match layout.high_loop().staging {
        Staging::Injected {
            injection: Injection::Economizer(kind),
            ..
        } => Some(kind),
        _ => None,
    }
}
