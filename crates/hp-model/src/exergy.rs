//! Exergy reporting: component table, Sankey links and waterfall bars.

use std::collections::BTreeMap;

use hp_engine::ExergyResults;
use serde::Serialize;

/// Destruction below this is left out of the waterfall [W].
const WATERFALL_MIN: f64 = 1.0;

pub const COLOR_FUEL: &str = "#EC6707";
pub const COLOR_PRODUCT: &str = "#B54036";
pub const COLOR_DESTRUCTION: &str = "#00395B";
pub const COLOR_LOSS: &str = "#74ADC0";
pub const COLOR_NEUTRAL: &str = "#BFBFBF";

pub const NODE_POWER: &str = "power input";
pub const NODE_HEAT: &str = "heat input";
pub const NODE_FUEL: &str = "E_F";
pub const NODE_PRODUCT: &str = "E_P";
pub const NODE_LOSS: &str = "E_L";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentRow {
    pub label: String,
    pub group: String,
    pub e_f: f64,
    pub e_p: f64,
    pub e_d: f64,
    pub epsilon: f64,
    /// Share of the network fuel destroyed in this component.
    pub y_d: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyData {
    pub nodes: Vec<String>,
    pub links: Vec<SankeyLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallBar {
    pub label: String,
    /// Signed contribution [W]; destruction and loss are negative.
    pub value: f64,
    /// Level the bar starts from [W].
    pub base: f64,
    pub color: &'static str,
}

/// Exergy balance of one solved state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExergyReport {
    results: ExergyResults,
    /// Electrical share of the fuel [W].
    power_input: f64,
}

impl ExergyReport {
    pub fn new(results: ExergyResults, power_input: f64) -> Self {
        Self {
            results,
            power_input,
        }
    }

    pub fn results(&self) -> &ExergyResults {
        &self.results
    }

    pub fn epsilon(&self) -> f64 {
        self.results.epsilon
    }

    pub fn e_f(&self) -> f64 {
        self.results.e_f
    }

    pub fn e_p(&self) -> f64 {
        self.results.e_p
    }

    pub fn e_d(&self) -> f64 {
        self.results.e_d
    }

    pub fn e_l(&self) -> f64 {
        self.results.e_l
    }

    pub fn component_table(&self) -> Vec<ComponentRow> {
        let e_f = self.results.e_f;
        self.results
            .components
            .iter()
            .map(|c| ComponentRow {
                label: c.label.clone(),
                group: c.group.clone(),
                e_f: c.e_f,
                e_p: c.e_p,
                e_d: c.e_d,
                epsilon: c.epsilon,
                y_d: if e_f > 0.0 { c.e_d / e_f } else { f64::NAN },
            })
            .collect()
    }

    /// Destruction summed per component group, largest first.
    pub fn group_destruction(&self) -> Vec<(String, f64)> {
        let mut groups: BTreeMap<&str, f64> = BTreeMap::new();
        for c in &self.results.components {
            *groups.entry(c.group.as_str()).or_default() += c.e_d;
        }
        let mut out: Vec<(String, f64)> = groups
            .into_iter()
            .map(|(g, e_d)| (g.to_string(), e_d))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }

    /// Flows from the two fuel buses through the network fuel into product,
    /// loss and the destruction of each component group.
    pub fn sankey(&self) -> SankeyData {
        let r = &self.results;
        let groups = self.group_destruction();

        let mut nodes: Vec<String> = vec![NODE_POWER.into(), NODE_HEAT.into(), NODE_FUEL.into()];
        nodes.extend(groups.iter().map(|(g, _)| g.clone()));
        nodes.push(NODE_PRODUCT.into());
        nodes.push(NODE_LOSS.into());
        let product = nodes.len() - 2;
        let loss = nodes.len() - 1;

        let mut links = vec![
            SankeyLink {
                source: 0,
                target: 2,
                value: self.power_input,
                color: COLOR_FUEL,
            },
            SankeyLink {
                source: 1,
                target: 2,
                value: (r.e_f - self.power_input).max(0.0),
                color: COLOR_FUEL,
            },
        ];
        for (offset, (_, e_d)) in groups.iter().enumerate() {
            links.push(SankeyLink {
                source: 2,
                target: 3 + offset,
                value: *e_d,
                color: COLOR_DESTRUCTION,
            });
        }
        links.push(SankeyLink {
            source: 2,
            target: product,
            value: r.e_p,
            color: COLOR_PRODUCT,
        });
        links.push(SankeyLink {
            source: 2,
            target: loss,
            value: r.e_l,
            color: COLOR_LOSS,
        });
        links.retain(|l| l.value > 0.0);
        SankeyData { nodes, links }
    }

    /// Fuel, then every component destruction above 1 W in descending
    /// order, then loss, ending at the product.
    pub fn waterfall(&self) -> Vec<WaterfallBar> {
        let r = &self.results;
        let mut destroyed: Vec<(&str, f64)> = r
            .components
            .iter()
            .filter(|c| c.e_d > WATERFALL_MIN)
            .map(|c| (c.label.as_str(), c.e_d))
            .collect();
        destroyed.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut bars = vec![WaterfallBar {
            label: NODE_FUEL.into(),
            value: r.e_f,
            base: 0.0,
            color: COLOR_FUEL,
        }];
        let mut level = r.e_f;
        for (label, e_d) in destroyed {
            level -= e_d;
            bars.push(WaterfallBar {
                label: label.to_string(),
                value: -e_d,
                base: level,
                color: COLOR_DESTRUCTION,
            });
        }
        if r.e_l > 0.0 {
            level -= r.e_l;
            bars.push(WaterfallBar {
                label: NODE_LOSS.into(),
                value: -r.e_l,
                base: level,
                color: COLOR_LOSS,
            });
        }
        bars.push(WaterfallBar {
            label: NODE_PRODUCT.into(),
            value: r.e_p,
            base: 0.0,
            color: COLOR_PRODUCT,
        });
        bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hp_engine::ComponentExergy;

    fn component(label: &str, group: &str, e_d: f64) -> ComponentExergy {
        ComponentExergy {
            label: label.into(),
            group: group.into(),
            e_f: 2.0 * e_d,
            e_p: e_d,
            e_d,
            epsilon: 0.5,
        }
    }

    fn report() -> ExergyReport {
        ExergyReport::new(
            ExergyResults {
                epsilon: 0.5,
                e_f: 1000.0,
                e_p: 500.0,
                e_d: 500.0,
                e_l: 0.0,
                components: vec![
                    component("comp", "Compressor", 200.0),
                    component("cond", "Condenser", 250.0),
                    component("valve", "Valve", 49.5),
                    component("cc", "CycleCloser", 0.5),
                ],
            },
            800.0,
        )
    }

    #[test]
    fn waterfall_sorts_and_filters() {
        let bars = report().waterfall();
        let labels: Vec<&str> = bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["E_F", "cond", "comp", "valve", "E_P"]);
        assert_relative_eq!(bars[3].base, 500.5);
    }

    #[test]
    fn sankey_balances_fuel() {
        let sankey = report().sankey();
        let into_fuel: f64 = sankey.links.iter().filter(|l| l.target == 2).map(|l| l.value).sum();
        let out_of_fuel: f64 = sankey.links.iter().filter(|l| l.source == 2).map(|l| l.value).sum();
        assert_relative_eq!(into_fuel, 1000.0);
        assert_relative_eq!(out_of_fuel, 1000.0);
        assert_eq!(sankey.nodes[3], "Condenser");
    }

    #[test]
    fn yield_ratio_is_share_of_fuel() {
        let rows = report().component_table();
        assert_relative_eq!(rows[1].y_d, 0.25);
    }
}
