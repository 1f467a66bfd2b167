//! Parameter assignments for each solve phase.
//!
//! Initialization fixes pressures from saturation lookups and uses mass-flow
//! and enthalpy ratios where the true constraints are temperature
//! differences. The design step releases those starting values and imposes
//! the terminal temperature differences instead. The off-design switch
//! moves components onto their characteristics.

use hp_core::units::{bar, celsius, to_celsius};
use hp_engine::{
    ComponentAttr, ComponentUpdate, EngineResult, FlowsheetEngine, KaCharKind, StateSpec,
    StateVar,
};
use hp_fluids::EosService;
use hp_graph::{ComponentKind, ComponentRole};
use hp_project::{Field, Params};

use crate::error::ModelResult;
use crate::levels::{HighSide, PressureLevels};
use crate::network::{
    LoopPlan, LoopStage, Network, SINK_FEED, SINK_RETURN, SOURCE_FEED, SOURCE_OUT, SOURCE_RETURN,
};

/// Enthalpy ratio across compressors while the network is initialized.
const COMPRESSOR_H_RATIO: f64 = 1.15;
/// Share of the closed-economizer inlet that stays on the main line.
const ECON_MAIN_SHARE: f64 = 0.9;
/// Intercooler outlet distance to the dew point when the configured
/// cooling would reach the two-phase region [K].
const IC_MIN_SUPERHEAT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Component { label: String, update: ComponentUpdate },
    State { conn: String, spec: StateSpec },
}

impl Assignment {
    fn component(label: &str, update: ComponentUpdate) -> Self {
        Assignment::Component {
            label: label.to_string(),
            update,
        }
    }

    fn state(conn: &str, spec: StateSpec) -> Self {
        Assignment::State {
            conn: conn.to_string(),
            spec,
        }
    }
}

/// Send assignments to the engine in order.
pub fn apply(engine: &mut dyn FlowsheetEngine, steps: &[Assignment]) -> EngineResult<()> {
    for step in steps {
        match step {
            Assignment::Component { label, update } => engine.set_component(label, update)?,
            Assignment::State { conn, spec } => engine.set_state(conn, spec)?,
        }
    }
    Ok(())
}

/// Everything the parameterization steps read.
pub struct Parameterizer<'a> {
    pub params: &'a Params,
    pub network: &'a Network,
    /// Working fluids in loop order.
    pub fluids: &'a [String],
    pub eos: &'a dyn EosService,
}

impl Parameterizer<'_> {
    fn value(&self, label: &str, field: Field) -> ModelResult<f64> {
        Ok(self.params.value(label, field)?)
    }

    fn fluid(&self, index: usize) -> &str {
        self.fluids
            .get(index)
            .or_else(|| self.fluids.last())
            .map_or("", String::as_str)
    }

    fn is_transcritical_loop(&self, plan: &LoopPlan) -> bool {
        plan.features().transcritical && plan.stage() != LoopStage::Low
    }

    /// Pressure the loop evaporates at [bar].
    fn low_pressure(plan: &LoopPlan, levels: &PressureLevels) -> f64 {
        match (plan.stage(), levels.cascade) {
            (LoopStage::High, Some(c)) => c.p_ht_evap,
            _ => levels.p_evap,
        }
    }

    /// Pressure the loop rejects heat at [bar].
    fn high_pressure(plan: &LoopPlan, levels: &PressureLevels) -> f64 {
        match (plan.stage(), levels.cascade) {
            (LoopStage::Low, Some(c)) => c.p_lt_cond,
            _ => levels.p_hi(),
        }
    }

    /// Starting values; the network is then solved in design mode.
    pub fn init(&self, levels: &PressureLevels) -> ModelResult<Vec<Assignment>> {
        let p = self.params;
        let mut steps = vec![
            Assignment::state(
                SOURCE_FEED,
                StateSpec::new()
                    .fluid(&p.fluids.so)
                    .fixed(StateVar::T, p.b1.t)
                    .fixed(StateVar::P, p.stream_p("B1")?),
            ),
            Assignment::state(SOURCE_RETURN, StateSpec::new().fixed(StateVar::T, p.b2.t)),
            Assignment::state(
                SOURCE_OUT,
                StateSpec::new().fixed(StateVar::P, p.stream_p("B1")?),
            ),
            Assignment::state(
                SINK_RETURN,
                StateSpec::new()
                    .fluid(&p.fluids.si)
                    .fixed(StateVar::T, p.c0.t)
                    .fixed(StateVar::P, p.stream_p("C0")?),
            ),
            Assignment::state(SINK_FEED, StateSpec::new().fixed(StateVar::T, p.c3.t)),
        ];

        for pump in ["hs_pump", "cons_pump"] {
            steps.push(Assignment::component(
                pump,
                ComponentUpdate::new().fixed(ComponentAttr::EtaS, self.value(pump, Field::EtaS)?),
            ));
        }
        steps.push(Assignment::component(
            "cons",
            ComponentUpdate::new()
                .fixed(ComponentAttr::Q, self.value("cons", Field::Q)?)
                .fixed(ComponentAttr::Pr, self.value("cons", Field::Pr)?),
        ));

        let net = self.network;
        let mut two_sided = vec![net.evaporator.clone(), net.rejector.clone()];
        two_sided.extend(net.cascade_hx.clone());
        for plan in &net.loops {
            two_sided.extend(plan.ihx.as_ref().map(|(hot, _)| hot.label.clone()));
            two_sided.extend(plan.economizer.clone());
            two_sided.extend(plan.intercooler.as_ref().map(|ic| ic.label.clone()));
        }
        for label in &two_sided {
            steps.push(Assignment::component(
                label,
                ComponentUpdate::new()
                    .fixed(ComponentAttr::Pr1, self.value(label, Field::Pr1)?)
                    .fixed(ComponentAttr::Pr2, self.value(label, Field::Pr2)?),
            ));
        }

        for (index, plan) in net.loops.iter().enumerate() {
            self.init_loop(index, plan, levels, &mut steps)?;
        }
        Ok(steps)
    }

    fn init_loop(
        &self,
        index: usize,
        plan: &LoopPlan,
        levels: &PressureLevels,
        steps: &mut Vec<Assignment>,
    ) -> ModelResult<()> {
        let fluid = self.fluid(index);
        let p_lo = Self::low_pressure(plan, levels);

        let mut hot = StateSpec::new().fluid(fluid);
        match levels.high {
            HighSide::Transcritical { p_hi, h_out } if self.is_transcritical_loop(plan) => {
                hot = hot.fixed(StateVar::P, p_hi).fixed(StateVar::H, h_out);
            }
            _ => hot = hot.fixed(StateVar::P, Self::high_pressure(plan, levels)),
        }
        steps.push(Assignment::state(&plan.hot_out, hot));

        steps.push(Assignment::state(
            &plan.cold_out,
            StateSpec::new().fixed(StateVar::P, p_lo).fixed(StateVar::X, 1.0),
        ));

        for stage in &plan.compressors {
            steps.push(Assignment::component(
                &stage.label,
                ComponentUpdate::new()
                    .fixed(ComponentAttr::EtaS, self.value(&stage.label, Field::EtaS)?),
            ));
            steps.push(Assignment::state(
                &stage.outlet,
                StateSpec::new().reference(StateVar::H, &stage.inlet, COMPRESSOR_H_RATIO, 0.0),
            ));
        }

        if let Some((hot_side, cold_side)) = &plan.ihx {
            let dt_sh = self.value(&hot_side.label, Field::DtSh)?;
            let t_sat = to_celsius(self.eos.t_sat(fluid, bar(p_lo))?);
            steps.push(Assignment::state(
                &cold_side.outlet,
                StateSpec::new().fixed(StateVar::T, t_sat + dt_sh),
            ));
        }

        if let (Some(mid), Some(p_mid)) = (&plan.mid, levels.p_mid) {
            steps.push(Assignment::state(mid, StateSpec::new().fixed(StateVar::P, p_mid)));
        }
        if let Some(step) = self.intercooler_outlet(index, plan, levels)? {
            steps.push(step);
        }
        if let Some(split) = &plan.split {
            steps.push(Assignment::state(
                &split.main,
                StateSpec::new().reference(StateVar::M, &split.inlet, ECON_MAIN_SHARE, 0.0),
            ));
        }
        if let Some(injection) = &plan.injection {
            steps.push(Assignment::state(
                injection,
                StateSpec::new().fixed(StateVar::X, 1.0),
            ));
        }
        Ok(())
    }

    /// Intercooler outlet as a distance to the dew point at the intermediate
    /// pressure: the configured cooling below the isentropic compressor
    /// outlet, or [`IC_MIN_SUPERHEAT`] when that would not stay above it.
    fn intercooler_outlet(
        &self,
        index: usize,
        plan: &LoopPlan,
        levels: &PressureLevels,
    ) -> ModelResult<Option<Assignment>> {
        let (Some(ic), Some(p_mid)) = (&plan.intercooler, levels.p_mid) else {
            return Ok(None);
        };
        let fluid = self.fluid(index);
        let p_lo = Self::low_pressure(plan, levels);
        let dt_ic = self.value(&ic.label, Field::DtIc)?.abs();

        let h_suction = match &plan.ihx {
            Some((hot, _)) => {
                let t_sat = to_celsius(self.eos.t_sat(fluid, bar(p_lo))?);
                let dt_sh = self.value(&hot.label, Field::DtSh)?;
                self.eos.h_pt(fluid, bar(p_lo), celsius(t_sat + dt_sh))?
            }
            None => self.eos.h_px(fluid, bar(p_lo), 1.0)?,
        };
        let t_is = to_celsius(
            self.eos
                .t_isentropic_out(fluid, bar(p_lo), h_suction, bar(p_mid))?,
        );
        let t_dew = to_celsius(self.eos.t_sat(fluid, bar(p_mid))?);

        let td_bp = if t_is - t_dew > dt_ic {
            t_is - dt_ic - t_dew
        } else {
            IC_MIN_SUPERHEAT
        };
        tracing::debug!(ic = %ic.label, t_is, t_dew, td_bp, "intercooler outlet");
        Ok(Some(Assignment::state(
            &ic.outlet,
            StateSpec::new().fixed(StateVar::TdBp, td_bp),
        )))
    }

    /// Replace starting values with the design constraints.
    pub fn design(&self, levels: &PressureLevels) -> ModelResult<Vec<Assignment>> {
        let net = self.network;
        let mut steps = vec![Assignment::component(
            &net.evaporator,
            ComponentUpdate::new()
                .fixed(ComponentAttr::TtdL, self.value(&net.evaporator, Field::TtdL)?),
        )];
        let rejector_update = if net.layout.is_transcritical() {
            ComponentUpdate::new().fixed(ComponentAttr::TtdL, self.value(&net.rejector, Field::TtdL)?)
        } else {
            ComponentUpdate::new().fixed(ComponentAttr::TtdU, self.value(&net.rejector, Field::TtdU)?)
        };
        steps.push(Assignment::component(&net.rejector, rejector_update));
        if let Some(inter) = &net.cascade_hx {
            steps.push(Assignment::component(
                inter,
                ComponentUpdate::new().fixed(ComponentAttr::TtdU, self.value(inter, Field::TtdU)?),
            ));
        }

        for (index, plan) in net.loops.iter().enumerate() {
            let hot = if self.is_transcritical_loop(plan) {
                StateSpec::new().free(StateVar::H)
            } else {
                StateSpec::new().free(StateVar::P)
            };
            steps.push(Assignment::state(&plan.hot_out, hot));

            // The cascade HX couples the loops at the high loop's evaporation pressure.
            if plan.stage() != LoopStage::High {
                steps.push(Assignment::state(
                    &plan.cold_out,
                    StateSpec::new().free(StateVar::P),
                ));
            }

            for stage in &plan.compressors {
                steps.push(Assignment::state(
                    &stage.outlet,
                    StateSpec::new().free(StateVar::H),
                ));
            }

            if let Some((hot_side, cold_side)) = &plan.ihx {
                let dt_sh = self.value(&hot_side.label, Field::DtSh)?;
                steps.push(Assignment::state(
                    &cold_side.outlet,
                    StateSpec::new().reference(StateVar::T, &plan.cold_out, 1.0, dt_sh),
                ));
            }

            if let Some(split) = &plan.split {
                steps.push(Assignment::state(&split.main, StateSpec::new().free(StateVar::M)));
            }
            if let Some(econ) = &plan.economizer {
                steps.push(Assignment::component(
                    econ,
                    ComponentUpdate::new().fixed(ComponentAttr::TtdL, self.value(econ, Field::TtdL)?),
                ));
            }

            if let (Some(mid), Some(p_mid)) = (&plan.mid, levels.p_mid) {
                steps.push(Assignment::state(mid, StateSpec::new().fixed(StateVar::P, p_mid)));
            }
            if let Some(step) = self.intercooler_outlet(index, plan, levels)? {
                steps.push(step);
            }
        }
        Ok(steps)
    }

    /// Move components onto their off-design characteristics.
    pub fn offdesign_switch(&self) -> Vec<Assignment> {
        let mut steps = Vec::new();
        for comp in &self.network.components {
            let update = match comp.kind {
                ComponentKind::Compressor | ComponentKind::Pump => ComponentUpdate::new()
                    .design(&[ComponentAttr::EtaS])
                    .offdesign(&[ComponentAttr::EtaSChar]),
                ComponentKind::HeatExchanger | ComponentKind::Condenser => {
                    let (design, hot, cold): (&[ComponentAttr], _, _) = match comp.role {
                        ComponentRole::Evaporator => (
                            &[ComponentAttr::TtdL],
                            KaCharKind::Default,
                            KaCharKind::EvaporatingFluid,
                        ),
                        ComponentRole::Condenser => (
                            &[ComponentAttr::TtdU],
                            KaCharKind::CondensingFluid,
                            KaCharKind::Default,
                        ),
                        ComponentRole::CascadeHx => (
                            &[ComponentAttr::TtdU],
                            KaCharKind::CondensingFluid,
                            KaCharKind::EvaporatingFluid,
                        ),
                        ComponentRole::GasCooler | ComponentRole::Economizer => {
                            (&[ComponentAttr::TtdL], KaCharKind::Default, KaCharKind::Default)
                        }
                        _ => (&[], KaCharKind::Default, KaCharKind::Default),
                    };
                    ComponentUpdate::new()
                        .design(design)
                        .offdesign(&[ComponentAttr::KaChar])
                        .ka_char(hot, cold)
                }
                ComponentKind::SimpleHeatExchanger => ComponentUpdate::new()
                    .design(&[ComponentAttr::Pr])
                    .offdesign(&[ComponentAttr::Zeta]),
                _ => continue,
            };
            steps.push(Assignment::component(&comp.label, update));
        }
        steps.push(Assignment::state(
            SOURCE_FEED,
            StateSpec::new().offdesign(&[StateVar::V]),
        ));
        steps
    }

    /// Re-impose the intermediate levels for new boundary temperatures.
    pub fn intermediate(&self, levels: &PressureLevels) -> ModelResult<Vec<Assignment>> {
        let mut steps = Vec::new();
        for (index, plan) in self.network.loops.iter().enumerate() {
            if let (LoopStage::High, Some(c)) = (plan.stage(), levels.cascade) {
                steps.push(Assignment::state(
                    &plan.cold_out,
                    StateSpec::new().fixed(StateVar::P, c.p_ht_evap),
                ));
            }
            if let (Some(mid), Some(p_mid)) = (&plan.mid, levels.p_mid) {
                steps.push(Assignment::state(mid, StateSpec::new().fixed(StateVar::P, p_mid)));
            }
            if let Some(step) = self.intercooler_outlet(index, plan, levels)? {
                steps.push(step);
            }
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::defaults::default_params;
    use crate::levels::{BoundaryTemps, pressure_levels, working_fluids};
    use crate::network::ComponentDraft;
    use crate::topology::Layout;
    use hp_engine::Value;
    use hp_testkit::ClausiusFluid;

    struct Fixture {
        params: Params,
        network: Network,
        fluids: Vec<String>,
        eos: ClausiusFluid,
    }

    impl Fixture {
        fn new(tag: &str, refrigerants: &[&str]) -> Self {
            let params = default_params(tag, refrigerants).unwrap();
            let layout = Layout::parse(tag, params.setup.econ).unwrap();
            let fluids = working_fluids(&params, &layout).unwrap();
            Self {
                network: ComponentDraft::from_layout(layout).wire(),
                params,
                fluids,
                eos: ClausiusFluid::new(),
            }
        }

        fn run(&self) -> (PressureLevels, Vec<Assignment>, Vec<Assignment>) {
            let p = Parameterizer {
                params: &self.params,
                network: &self.network,
                fluids: &self.fluids,
                eos: &self.eos,
            };
            let levels = pressure_levels(
                &self.eos,
                &self.params,
                &self.network.layout,
                BoundaryTemps::design(&self.params),
            )
            .unwrap();
            (levels, p.init(&levels).unwrap(), p.design(&levels).unwrap())
        }
    }

    fn state<'a>(steps: &'a [Assignment], conn: &str) -> Vec<&'a StateSpec> {
        steps
            .iter()
            .filter_map(|s| match s {
                Assignment::State { conn: c, spec } if c == conn => Some(spec),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn init_fixes_pressures_and_compressor_ratio() {
        let fx = Fixture::new("simple", &["R1234ZE(E)"]);
        let (levels, init, _) = fx.run();
        let hot = state(&init, "A0");
        assert_eq!(hot[0].get(StateVar::P), Some(&Value::Fixed(levels.p_hi())));
        assert_eq!(hot[0].fluid.as_deref(), Some("R1234ze(E)"));
        let comp_out = state(&init, "A4");
        assert_eq!(
            comp_out[0].get(StateVar::H),
            Some(&Value::reference("A3", COMPRESSOR_H_RATIO, 0.0))
        );
    }

    #[test]
    fn design_releases_starting_values() {
        let fx = Fixture::new("ihx", &["R1234ZE(E)"]);
        let (_, _, design) = fx.run();
        assert_eq!(state(&design, "A0")[0].get(StateVar::P), Some(&Value::Free));
        let plan = &fx.network.loops[0];
        let (_, cold) = plan.ihx.as_ref().unwrap();
        let suction = state(&design, &cold.outlet);
        assert_eq!(
            suction[0].get(StateVar::T),
            Some(&Value::reference(&plan.cold_out, 1.0, 5.0))
        );
    }

    #[test]
    fn closed_economizer_split_ratio_is_released() {
        let fx = Fixture::new("econ_closed", &["R1234ZE(E)"]);
        let (_, init, design) = fx.run();
        let split = fx.network.loops[0].split.clone().unwrap();
        assert_eq!(
            state(&init, &split.main)[0].get(StateVar::M),
            Some(&Value::reference(&split.inlet, ECON_MAIN_SHARE, 0.0))
        );
        assert_eq!(state(&design, &split.main)[0].get(StateVar::M), Some(&Value::Free));
    }

    #[test]
    fn transcritical_keeps_high_pressure() {
        let fx = Fixture::new("simple_trans", &["R744"]);
        let (_, init, design) = fx.run();
        let a0 = fx.params.a0_p().unwrap();
        assert_eq!(state(&init, "A0")[0].get(StateVar::P), Some(&Value::Fixed(a0)));
        let released = state(&design, "A0");
        assert_eq!(released[0].get(StateVar::P), None);
        assert_eq!(released[0].get(StateVar::H), Some(&Value::Free));
    }

    #[test]
    fn intercooler_outlet_stays_superheated() {
        let fx = Fixture::new("ic", &["R1234ZE(E)"]);
        let (_, init, _) = fx.run();
        let ic = fx.network.loops[0].intercooler.clone().unwrap();
        let spec = state(&init, &ic.outlet);
        let Some(Value::Fixed(td)) = spec[0].get(StateVar::TdBp) else {
            panic!("intercooler outlet not fixed against the dew point");
        };
        assert!(*td > 0.0);
    }

    fn intercooler_td(fx: &Fixture) -> f64 {
        let p = Parameterizer {
            params: &fx.params,
            network: &fx.network,
            fluids: &fx.fluids,
            eos: &fx.eos,
        };
        let levels = pressure_levels(
            &fx.eos,
            &fx.params,
            &fx.network.layout,
            BoundaryTemps::design(&fx.params),
        )
        .unwrap();
        match p.intercooler_outlet(0, &fx.network.loops[0], &levels).unwrap() {
            Some(Assignment::State { spec, .. }) => match spec.get(StateVar::TdBp) {
                Some(Value::Fixed(td)) => *td,
                other => panic!("intercooler outlet assigned {other:?}"),
            },
            other => panic!("no intercooler outlet assignment: {other:?}"),
        }
    }

    #[test]
    fn intercooler_removes_the_configured_difference() {
        let mut fx = Fixture::new("ic", &["R1234ZE(E)"]);
        fx.params.set_value("ic", Field::DtIc, 0.0);
        let superheat = intercooler_td(&fx);
        assert!(superheat > 0.0, "isentropic outlet {superheat} K above dew");
        assert_ne!(superheat, IC_MIN_SUPERHEAT);

        let dt_ic = superheat / 2.0;
        fx.params.set_value("ic", Field::DtIc, dt_ic);
        assert_relative_eq!(intercooler_td(&fx), superheat - dt_ic, max_relative = 1e-9);
        // Sign is ignored.
        fx.params.set_value("ic", Field::DtIc, -dt_ic);
        assert_relative_eq!(intercooler_td(&fx), superheat - dt_ic, max_relative = 1e-9);
    }

    #[test]
    fn intercooler_falls_back_near_the_dew_point() {
        let mut fx = Fixture::new("ic", &["R1234ZE(E)"]);
        fx.params.set_value("ic", Field::DtIc, 0.0);
        let superheat = intercooler_td(&fx);

        fx.params.set_value("ic", Field::DtIc, superheat + 0.5);
        assert_eq!(intercooler_td(&fx), IC_MIN_SUPERHEAT);
        fx.params.set_value("ic", Field::DtIc, superheat);
        assert_eq!(intercooler_td(&fx), IC_MIN_SUPERHEAT);
    }

    #[test]
    fn offdesign_switch_covers_every_machine() {
        let fx = Fixture::new("cascade_ic", &["R1234ZE(E)", "R717"]);
        let p = Parameterizer {
            params: &fx.params,
            network: &fx.network,
            fluids: &fx.fluids,
            eos: &fx.eos,
        };
        let steps = p.offdesign_switch();
        let switched: Vec<&str> = steps
            .iter()
            .filter_map(|s| match s {
                Assignment::Component { label, update }
                    if update.offdesign.as_deref() == Some(&[ComponentAttr::EtaSChar][..]) =>
                {
                    Some(label.as_str())
                }
                _ => None,
            })
            .collect();
        for label in ["LT_comp", "HT_comp1", "HT_comp2", "hs_pump", "cons_pump"] {
            assert!(switched.contains(&label), "{label} not switched");
        }
        let inter = steps.iter().find_map(|s| match s {
            Assignment::Component { label, update } if label == "inter" => update.ka_char,
            _ => None,
        });
        let inter = inter.unwrap();
        assert_eq!(inter.hot, KaCharKind::CondensingFluid);
        assert_eq!(inter.cold, KaCharKind::EvaporatingFluid);
    }
}
