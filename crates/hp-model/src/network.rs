//! Components, connections and buses of a cycle.
//!
//! [`ComponentDraft::from_layout`] declares every component of a topology;
//! [`ComponentDraft::wire`] allocates the connection labels and returns the
//! [`Network`], which knows where each loop keeps the connections the
//! parameterization steps address.
//!
//! Each refrigerant loop is wired as a main chain that starts at the outlet
//! of its heat-rejecting side and ends at that side's inlet, followed by the
//! injection branch labelled upstream from the point where it rejoins the
//! main chain.

use hp_graph::{BusBase, BusRole, CharLine, ComponentKind, ComponentRole, Graph, GraphBuilder};

use crate::error::{ModelError, ModelResult};
use crate::topology::{Injection, Layout, LoopFeatures, Staging};
use hp_project::EconType;

pub const BUS_POWER: &str = "power input";
pub const BUS_HEAT_IN: &str = "heat input";
pub const BUS_HEAT_OUT: &str = "heat output";

pub const SOURCE_FEED: &str = "B1";
pub const SOURCE_RETURN: &str = "B2";
pub const SOURCE_OUT: &str = "B3";
pub const SINK_RETURN: &str = "C0";
pub const SINK_CLOSER_OUT: &str = "C1";
pub const SINK_PUMP_OUT: &str = "C2";
pub const SINK_FEED: &str = "C3";
pub const SINK_INTERCOOLED: &str = "C4";

/// Connection whose mass flow scales the part load.
pub const REFERENCE_FLOW: &str = SINK_FEED;

/// Load fraction of the shared motor/inverter characteristic.
const MOTOR_LOAD: [f64; 26] = [
    0.0, 0.0625, 0.125, 0.1875, 0.25, 0.3125, 0.375, 0.4375, 0.5, 0.5625, 0.6375, 0.7125, 0.7875,
    0.9, 0.9875, 1.0, 1.0625, 1.125, 1.1875, 1.25, 1.3125, 1.375, 1.4375, 1.5, 1.5625, 2.0,
];

/// Motor efficiency at [`MOTOR_LOAD`]; the inverter adds a flat 0.98.
const MOTOR_ETA: [f64; 26] = [
    0.01, 0.3148, 0.5346, 0.6843, 0.7835, 0.8477, 0.8885, 0.9145, 0.9318, 0.9443, 0.9546, 0.9638,
    0.9724, 0.9806, 0.9878, 0.9938, 0.9982, 1.0009, 1.002, 1.0013, 0.9985, 0.9934, 0.9855,
    0.9745, 0.9603, 0.9427,
];
const INVERTER_ETA: f64 = 0.98;

/// Inverse drive efficiency over load fraction.
pub fn motor_char() -> ModelResult<CharLine> {
    let y = MOTOR_ETA.iter().map(|eta| 1.0 / (eta * INVERTER_ETA)).collect();
    Ok(CharLine::new(MOTOR_LOAD.to_vec(), y)?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftComponent {
    pub label: String,
    pub kind: ComponentKind,
    pub role: ComponentRole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftConnection {
    pub label: String,
    pub source: String,
    pub source_port: u8,
    pub target: String,
    pub target_port: u8,
}

/// One side of a component as seen by a refrigerant loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    pub label: String,
    pub port: u8,
}

impl Side {
    fn new(label: &str, port: u8) -> Self {
        Self {
            label: label.to_string(),
            port,
        }
    }
}

/// Position of a loop within the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStage {
    Only,
    Low,
    High,
}

impl LoopStage {
    /// Component label prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            LoopStage::Only => "",
            LoopStage::Low => "LT_",
            LoopStage::High => "HT_",
        }
    }

    fn conn_letter(self) -> char {
        match self {
            LoopStage::Low => 'D',
            LoopStage::Only | LoopStage::High => 'A',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSkeleton {
    pub stage: LoopStage,
    pub features: LoopFeatures,
    /// Heat-rejecting side (condenser, gas cooler or cascade HX hot side).
    pub hot: Side,
    /// Heat-absorbing side (evaporator or cascade HX cold side).
    pub cold: Side,
}

impl LoopSkeleton {
    pub fn name(&self, base: &str) -> String {
        format!("{}{base}", self.stage.prefix())
    }
}

/// Components of a topology, before wiring.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDraft {
    pub layout: Layout,
    pub components: Vec<DraftComponent>,
    pub loops: Vec<LoopSkeleton>,
    pub rejector: String,
    pub evaporator: String,
    pub cascade_hx: Option<String>,
}

impl ComponentDraft {
    pub fn from_layout(layout: Layout) -> Self {
        let mut draft = ComponentDraft {
            layout,
            components: Vec::new(),
            loops: Vec::new(),
            rejector: String::new(),
            evaporator: "evap".to_string(),
            cascade_hx: None,
        };

        if layout.is_transcritical() {
            draft.add("gc", ComponentKind::HeatExchanger, ComponentRole::GasCooler);
            draft.rejector = "gc".into();
        } else {
            draft.add("cond", ComponentKind::Condenser, ComponentRole::Condenser);
            draft.rejector = "cond".into();
        }
        draft.add("evap", ComponentKind::HeatExchanger, ComponentRole::Evaporator);

        match layout {
            Layout::Single(features) => {
                let skeleton = LoopSkeleton {
                    stage: LoopStage::Only,
                    features,
                    hot: Side::new(&draft.rejector, 1),
                    cold: Side::new("evap", 2),
                };
                draft.add_loop(skeleton);
            }
            Layout::Cascade { lt, ht } => {
                draft.add("inter", ComponentKind::Condenser, ComponentRole::CascadeHx);
                draft.cascade_hx = Some("inter".into());
                draft.add_loop(LoopSkeleton {
                    stage: LoopStage::Low,
                    features: lt,
                    hot: Side::new("inter", 1),
                    cold: Side::new("evap", 2),
                });
                let rejector = draft.rejector.clone();
                draft.add_loop(LoopSkeleton {
                    stage: LoopStage::High,
                    features: ht,
                    hot: Side::new(&rejector, 1),
                    cold: Side::new("inter", 2),
                });
            }
        }

        draft.add("hs_ff", ComponentKind::Source, ComponentRole::Plain);
        draft.add("hs_pump", ComponentKind::Pump, ComponentRole::Plain);
        draft.add("hs_bf", ComponentKind::Sink, ComponentRole::Plain);
        draft.add("cons", ComponentKind::SimpleHeatExchanger, ComponentRole::Consumer);
        draft.add("cons_cc", ComponentKind::CycleCloser, ComponentRole::Plain);
        draft.add("cons_pump", ComponentKind::Pump, ComponentRole::Plain);
        draft
    }

    fn add(&mut self, label: impl Into<String>, kind: ComponentKind, role: ComponentRole) {
        self.components.push(DraftComponent {
            label: label.into(),
            kind,
            role,
        });
    }

    fn add_loop(&mut self, skeleton: LoopSkeleton) {
        use ComponentKind as K;
        use ComponentRole as R;

        let n = |base: &str| skeleton.name(base);
        self.add(n("cc"), K::CycleCloser, R::Plain);
        self.add(n("valve"), K::Valve, R::Plain);
        if skeleton.features.ihx {
            self.add(n("ihx"), K::HeatExchanger, R::InternalHx);
        }
        match skeleton.features.staging {
            Staging::Single => self.add(n("comp"), K::Compressor, R::Plain),
            Staging::Intercooled => {
                self.add(n("comp1"), K::Compressor, R::Plain);
                self.add(n("ic"), K::HeatExchanger, R::Intercooler);
                self.add(n("comp2"), K::Compressor, R::Plain);
            }
            Staging::Injected {
                injection,
                parallel,
            } => {
                if parallel {
                    self.add(n("comp"), K::Compressor, R::Plain);
                    self.add(n("comp_pc"), K::Compressor, R::Plain);
                } else {
                    self.add(n("comp1"), K::Compressor, R::Plain);
                    self.add(n("comp2"), K::Compressor, R::Plain);
                }
                self.add(n("merge"), K::Merge, R::Plain);
                match injection {
                    Injection::Economizer(EconType::Closed) => {
                        self.add(n("split"), K::Splitter, R::Plain);
                        self.add(n("econ"), K::HeatExchanger, R::Economizer);
                        self.add(n("valve_inj"), K::Valve, R::Plain);
                    }
                    Injection::Economizer(EconType::Open) => {
                        self.add(n("valve_mid"), K::Valve, R::Plain);
                        self.add(n("econ"), K::DropletSeparator, R::Economizer);
                    }
                    Injection::Flash => {
                        self.add(n("valve_mid"), K::Valve, R::Plain);
                        self.add(n("flash"), K::DropletSeparator, R::FlashTank);
                    }
                }
            }
        }
        self.loops.push(skeleton);
    }

    pub fn component(&self, label: &str) -> Option<&DraftComponent> {
        self.components.iter().find(|c| c.label == label)
    }

    /// Allocate connections for every loop plus the source and sink streams.
    pub fn wire(self) -> Network {
        let mut connections = Vec::new();
        let mut loops = Vec::with_capacity(self.loops.len());
        for skeleton in &self.loops {
            loops.push(wire_loop(skeleton, &mut connections));
        }

        let mut link = |label: &str, source: &str, sp: u8, target: &str, tp: u8| {
            connections.push(self::link(label, source, sp, target, tp));
        };

        link(SOURCE_FEED, "hs_ff", 1, &self.evaporator, 1);
        link(SOURCE_RETURN, &self.evaporator, 1, "hs_pump", 1);
        link(SOURCE_OUT, "hs_pump", 1, "hs_bf", 1);

        let intercooler = loops
            .last()
            .and_then(|l: &LoopPlan| l.intercooler.as_ref())
            .map(|stage| stage.label.clone());
        link(SINK_RETURN, "cons", 1, "cons_cc", 1);
        link(SINK_CLOSER_OUT, "cons_cc", 1, "cons_pump", 1);
        match &intercooler {
            Some(ic) => {
                link(SINK_PUMP_OUT, "cons_pump", 1, ic, 2);
                link(SINK_INTERCOOLED, ic, 2, &self.rejector, 2);
            }
            None => link(SINK_PUMP_OUT, "cons_pump", 1, &self.rejector, 2),
        }
        link(SINK_FEED, &self.rejector, 2, "cons", 1);

        let mut segments: Vec<Segment> = loops.iter().flat_map(|l| l.segments.clone()).collect();
        segments.push(Segment::new("evap", &self.evaporator, 2));
        if let Some(inter) = &self.cascade_hx {
            segments.push(Segment::new("inter_hot", inter, 1));
            segments.push(Segment::new("inter_cold", inter, 2));
        }
        segments.push(Segment::new(&self.rejector, &self.rejector, 1));

        Network {
            layout: self.layout,
            components: self.components,
            connections,
            loops,
            rejector: self.rejector,
            evaporator: self.evaporator,
            cascade_hx: self.cascade_hx,
            intercooler,
            segments,
        }
    }
}

/// A compressor, valve or heat exchanger side with its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub label: String,
    pub inlet: String,
    pub outlet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub label: String,
    pub inlet: String,
    /// Outlet that stays on the main chain.
    pub main: String,
}

/// One sampled process curve for diagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub key: String,
    pub component: String,
    pub side: u8,
}

impl Segment {
    fn new(key: &str, component: &str, side: u8) -> Self {
        Self {
            key: key.to_string(),
            component: component.to_string(),
            side,
        }
    }
}

/// Where a wired loop keeps the connections its parameterization addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopPlan {
    pub skeleton: LoopSkeleton,
    /// Leaves the heat-rejecting side.
    pub hot_out: String,
    /// Leaves the heat-absorbing side.
    pub cold_out: String,
    /// Enters the first compressor.
    pub suction: String,
    /// In flow order; a parallel compressor comes last.
    pub compressors: Vec<Stage>,
    pub valves: Vec<Stage>,
    /// Hot side (liquid line) and cold side (suction line) of the IHX.
    pub ihx: Option<(Stage, Stage)>,
    pub intercooler: Option<Stage>,
    pub split: Option<SplitPlan>,
    /// Closed economizer heat exchanger.
    pub economizer: Option<String>,
    /// Saturated vapor leaving the economizer or separator.
    pub injection: Option<String>,
    /// Connection carrying the intermediate pressure.
    pub mid: Option<String>,
    pub segments: Vec<Segment>,
}

impl LoopPlan {
    pub fn stage(&self) -> LoopStage {
        self.skeleton.stage
    }

    pub fn features(&self) -> &LoopFeatures {
        &self.skeleton.features
    }

    pub fn first_compressor(&self) -> Option<&Stage> {
        self.compressors.first()
    }
}

struct Station {
    label: String,
    inlet: u8,
    outlet: u8,
}

fn station(label: String, port: u8) -> Station {
    Station {
        label,
        inlet: port,
        outlet: port,
    }
}

fn wire_loop(skeleton: &LoopSkeleton, out: &mut Vec<DraftConnection>) -> LoopPlan {
    let features = skeleton.features;
    let n = |base: &str| skeleton.name(base);
    let letter = skeleton.stage.conn_letter();
    let label = |i: usize| format!("{letter}{i}");

    let mut chain = vec![
        station(skeleton.hot.label.clone(), skeleton.hot.port),
        station(n("cc"), 1),
    ];
    if features.ihx {
        chain.push(station(n("ihx"), 1));
    }
    let injection = match features.staging {
        Staging::Injected { injection, .. } => Some(injection),
        _ => None,
    };
    let parallel = matches!(features.staging, Staging::Injected { parallel: true, .. });
    let separator = match injection {
        Some(Injection::Economizer(EconType::Closed)) => {
            chain.push(station(n("split"), 1));
            chain.push(station(n("econ"), 1));
            None
        }
        Some(Injection::Economizer(EconType::Open)) => {
            chain.push(station(n("valve_mid"), 1));
            chain.push(station(n("econ"), 1));
            Some(n("econ"))
        }
        Some(Injection::Flash) => {
            chain.push(station(n("valve_mid"), 1));
            chain.push(station(n("flash"), 1));
            Some(n("flash"))
        }
        None => None,
    };
    chain.push(station(n("valve"), 1));
    chain.push(station(skeleton.cold.label.clone(), skeleton.cold.port));
    if features.ihx {
        chain.push(station(n("ihx"), 2));
    }
    let compressors: Vec<String> = match features.staging {
        Staging::Single => vec![n("comp")],
        Staging::Intercooled => vec![n("comp1"), n("comp2")],
        Staging::Injected { parallel: true, .. } => vec![n("comp")],
        Staging::Injected { .. } => vec![n("comp1"), n("comp2")],
    };
    match features.staging {
        Staging::Single => chain.push(station(n("comp"), 1)),
        Staging::Intercooled => {
            chain.push(station(n("comp1"), 1));
            chain.push(station(n("ic"), 1));
            chain.push(station(n("comp2"), 1));
        }
        Staging::Injected { parallel: true, .. } => {
            chain.push(station(n("comp"), 1));
            chain.push(station(n("merge"), 1));
        }
        Staging::Injected { .. } => {
            chain.push(station(n("comp1"), 1));
            chain.push(station(n("merge"), 1));
            chain.push(station(n("comp2"), 1));
        }
    }

    // Main chain: connection i leaves station i.
    let len = chain.len();
    let main: Vec<String> = (0..len).map(label).collect();
    for (i, from) in chain.iter().enumerate() {
        let to = &chain[(i + 1) % len];
        out.push(DraftConnection {
            label: main[i].clone(),
            source: from.label.clone(),
            source_port: from.outlet,
            target: to.label.clone(),
            target_port: to.inlet,
        });
    }
    let position = |name: &str, port: u8| {
        chain
            .iter()
            .position(|s| s.label == name && s.inlet == port)
            .unwrap_or(0)
    };
    let leaving = |name: &str, port: u8| main[position(name, port)].clone();
    let entering = |name: &str, port: u8| main[(position(name, port) + len - 1) % len].clone();
    let stage_at = |name: String, port: u8| Stage {
        inlet: entering(&name, port),
        outlet: leaving(&name, port),
        label: name,
    };

    let mut plan = LoopPlan {
        skeleton: skeleton.clone(),
        hot_out: main[0].clone(),
        cold_out: leaving(&skeleton.cold.label, skeleton.cold.port),
        suction: entering(&compressors[0], 1),
        compressors: compressors.iter().map(|c| stage_at(c.clone(), 1)).collect(),
        valves: vec![stage_at(n("valve"), 1)],
        ihx: features
            .ihx
            .then(|| (stage_at(n("ihx"), 1), stage_at(n("ihx"), 2))),
        intercooler: matches!(features.staging, Staging::Intercooled).then(|| stage_at(n("ic"), 1)),
        split: None,
        economizer: None,
        injection: None,
        mid: None,
        segments: Vec::new(),
    };
    if matches!(features.staging, Staging::Intercooled) {
        plan.mid = Some(leaving(&n("comp1"), 1));
    }

    // Injection branch, labelled upstream from where it rejoins the chain.
    if let Some(injection) = injection {
        let mut next = len;
        let mut take = || {
            let l = label(next);
            next += 1;
            l
        };
        let merge = n("merge");
        let vapor_target = if parallel {
            let into_merge = take();
            let into_pc = take();
            out.push(link(&into_merge, &n("comp_pc"), 1, &merge, 2));
            plan.compressors.push(Stage {
                label: n("comp_pc"),
                inlet: into_pc.clone(),
                outlet: into_merge,
            });
            (into_pc, n("comp_pc"), 1)
        } else {
            (take(), merge.clone(), 2)
        };
        let (vapor, target, target_port) = vapor_target;

        match injection {
            Injection::Economizer(EconType::Closed) => {
                let econ = n("econ");
                let split = n("split");
                let valve_inj = n("valve_inj");
                out.push(link(&vapor, &econ, 2, &target, target_port));
                let into_econ = take();
                out.push(link(&into_econ, &valve_inj, 1, &econ, 2));
                let into_valve = take();
                out.push(link(&into_valve, &split, 2, &valve_inj, 1));
                plan.valves.push(Stage {
                    label: valve_inj.clone(),
                    inlet: into_valve,
                    outlet: into_econ.clone(),
                });
                plan.split = Some(SplitPlan {
                    label: split.clone(),
                    inlet: entering(&split, 1),
                    main: leaving(&split, 1),
                });
                plan.economizer = Some(econ.clone());
                plan.segments.push(Segment::new(&format!("{econ}_hot"), &econ, 1));
                plan.segments.push(Segment::new(&format!("{econ}_cold"), &econ, 2));
                plan.segments.push(Segment::new(&valve_inj, &valve_inj, 1));
            }
            Injection::Economizer(EconType::Open) | Injection::Flash => {
                let sep = separator.unwrap_or_else(|| n("econ"));
                out.push(link(&vapor, &sep, 2, &target, target_port));
                let valve_mid = n("valve_mid");
                plan.valves.push(stage_at(valve_mid.clone(), 1));
                plan.segments.push(Segment::new(&valve_mid, &valve_mid, 1));
            }
        }
        plan.mid = Some(if parallel {
            vapor.clone()
        } else {
            leaving(&n("comp1"), 1)
        });
        plan.injection = Some(vapor);
    }

    for stage in &plan.compressors {
        plan.segments.push(Segment::new(&stage.label, &stage.label, 1));
    }
    if let Some(ic) = &plan.intercooler {
        plan.segments.push(Segment::new(&ic.label, &ic.label, 1));
    }
    if let Some((hot, _)) = &plan.ihx {
        plan.segments.push(Segment::new(&format!("{}_hot", hot.label), &hot.label, 1));
        plan.segments.push(Segment::new(&format!("{}_cold", hot.label), &hot.label, 2));
    }
    let valve = n("valve");
    plan.segments.push(Segment::new(&valve, &valve, 1));
    plan
}

fn link(label: &str, source: &str, source_port: u8, target: &str, target_port: u8) -> DraftConnection {
    DraftConnection {
        label: label.to_string(),
        source: source.to_string(),
        source_port,
        target: target.to_string(),
        target_port,
    }
}

/// A wired cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub layout: Layout,
    pub components: Vec<DraftComponent>,
    pub connections: Vec<DraftConnection>,
    /// Low-temperature loop first in a cascade.
    pub loops: Vec<LoopPlan>,
    pub rejector: String,
    pub evaporator: String,
    pub cascade_hx: Option<String>,
    pub intercooler: Option<String>,
    pub segments: Vec<Segment>,
}

impl Network {
    /// Loop that rejects heat to the sink.
    pub fn high_loop(&self) -> Option<&LoopPlan> {
        self.loops.last()
    }

    /// Loop that absorbs heat from the source.
    pub fn low_loop(&self) -> Option<&LoopPlan> {
        self.loops.first()
    }

    pub fn compressors(&self) -> impl Iterator<Item = &Stage> {
        self.loops.iter().flat_map(|l| l.compressors.iter())
    }

    pub fn valves(&self) -> impl Iterator<Item = &Stage> {
        self.loops.iter().flat_map(|l| l.valves.iter())
    }

    /// Validate the topology and freeze it into a graph with its three buses.
    pub fn build_graph(&self) -> ModelResult<Graph> {
        let mut builder = GraphBuilder::new();
        for comp in &self.components {
            builder.add_component(comp.label.clone(), comp.kind, comp.role);
        }
        let id = |builder: &GraphBuilder, label: &str| {
            builder.component_id(label).ok_or_else(|| {
                ModelError::configuration(format!("connection refers to unknown component '{label}'"))
            })
        };
        for conn in &self.connections {
            let source = id(&builder, &conn.source)?;
            let target = id(&builder, &conn.target)?;
            builder.connect(
                conn.label.clone(),
                source,
                conn.source_port,
                target,
                conn.target_port,
            );
        }

        let motor = motor_char()?;
        let power = builder.add_bus(BUS_POWER, BusRole::PowerInput);
        let driven: Vec<String> = self
            .compressors()
            .map(|c| c.label.clone())
            .chain(["hs_pump".to_string(), "cons_pump".to_string()])
            .collect();
        for label in &driven {
            let comp = id(&builder, label)?;
            builder.add_bus_member(power, comp, Some(motor.clone()), BusBase::Bus);
        }

        let heat_in = builder.add_bus(BUS_HEAT_IN, BusRole::HeatInput);
        let hs_ff = id(&builder, "hs_ff")?;
        let hs_bf = id(&builder, "hs_bf")?;
        builder.add_bus_member(heat_in, hs_ff, None, BusBase::Bus);
        builder.add_bus_member(heat_in, hs_bf, None, BusBase::Component);

        let heat_out = builder.add_bus(BUS_HEAT_OUT, BusRole::HeatOutput);
        let cons = id(&builder, "cons")?;
        builder.add_bus_member(heat_out, cons, None, BusBase::Component);

        Ok(builder.build()?)
    }
}
