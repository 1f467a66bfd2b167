//! Sampled process curves for state diagrams.

use hp_engine::{FlowsheetEngine, ProcessCurve};
use hp_graph::ComponentKind;

use crate::error::ModelResult;
use crate::model::HeatPump;

/// Keeps compressor curves off the saturated vapor line.
const COMPRESSOR_START_SHIFT: f64 = 0.999_999;

impl<E: FlowsheetEngine> HeatPump<E> {
    /// One curve per refrigerant-side segment, in loop order.
    pub fn get_plotting_states(&self) -> ModelResult<Vec<(String, ProcessCurve)>> {
        let network = self.require_network()?;
        let mut states = Vec::with_capacity(network.segments.len());
        for segment in &network.segments {
            let mut curve = self.engine().sample_curve(&segment.component, segment.side)?;
            let is_compressor = network
                .components
                .iter()
                .any(|c| c.label == segment.component && c.kind == ComponentKind::Compressor);
            if is_compressor {
                curve.starting_point_value *= COMPRESSOR_START_SHIFT;
            }
            states.push((segment.key.clone(), curve));
        }
        Ok(states)
    }
}
