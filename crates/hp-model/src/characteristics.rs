//! Part-load characteristics derived from the swept operating map.

use hp_char::{
    AlignedRow, LinearModel, LinearizeOptions, TemperatureSample, arrange_timeseries,
    interpolate::{PL_STEP, T_STEP},
    interpolate_map, linearize,
};
use hp_engine::FlowsheetEngine;
use hp_results::OperatingMap;

use crate::error::{ModelError, ModelResult};
use crate::model::HeatPump;

impl<E: FlowsheetEngine> HeatPump<E> {
    /// Dense characteristic of the last sweep, if computed.
    pub fn partload_char(&self) -> Option<&OperatingMap> {
        self.partload_char.as_ref()
    }

    /// Refine the swept map onto a 1 K by 0.01 grid. Without a sweep in this
    /// process the map is read back from `output/{subdirname}_partload.csv`.
    pub fn calc_partload_char(&mut self) -> ModelResult<&OperatingMap> {
        let map = match self.partload.take() {
            Some(map) => map,
            None => {
                let map = self.store().load_partload(self.subdirname())?;
                tracing::info!(cells = map.filled(), "operating map loaded from disk");
                map
            }
        };
        let dense = interpolate_map(&map, T_STEP, PL_STEP);
        self.partload = Some(map);
        let dense = dense?;
        Ok(self.partload_char.insert(dense))
    }

    /// Linear models per temperature pair, from the dense characteristic when
    /// available and the swept map otherwise.
    pub fn linearize_partload_char(
        &self,
        options: &LinearizeOptions,
    ) -> ModelResult<Vec<LinearModel>> {
        let map = match (&self.partload_char, &self.partload) {
            (Some(dense), _) => dense,
            (None, Some(swept)) => swept,
            (None, None) => {
                return Err(ModelError::configuration(
                    "linearization needs an off-design sweep",
                ));
            }
        };
        Ok(linearize(map, options)?)
    }

    pub fn arrange_char_timeseries(
        &self,
        models: &[LinearModel],
        series: &[TemperatureSample],
    ) -> ModelResult<Vec<AlignedRow>> {
        let rows = arrange_timeseries(models, series)?;
        tracing::info!(
            samples = series.len(),
            rows = rows.len(),
            clamped = rows.iter().filter(|r| r.clamped).count(),
            "characteristic aligned to time series"
        );
        Ok(rows)
    }
}
