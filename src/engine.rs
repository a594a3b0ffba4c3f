use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::{ConfigError, GenerationConfig},
    dataset::{AssemblyError, BeachDataset, InvariantViolation, Run, RunAssembler},
    grains::{DailyParameterSampler, GrainPopulationEvolver},
    rng::{RngManager, CLIMATE_STREAM, GRAINS_STREAM, GRID_STREAM, SCHEDULE_STREAM},
    scenario::BeachInfo,
    spatial::{GridSampler, Location},
};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("run {day} has {actual} locations but the master list has {expected}")]
    IndexDrift {
        day: u32,
        expected: usize,
        actual: usize,
    },
    #[error("generated dataset is inconsistent: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Generates a beach dataset day by day from one fixed set of locations.
pub struct BeachDatasetBuilder {
    config: GenerationConfig,
    rng: RngManager,
}

impl BeachDatasetBuilder {
    /// Uses the config's seed, or OS entropy when it has none.
    pub fn new(config: GenerationConfig) -> Self {
        let rng = RngManager::new(config.seed);
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: GenerationConfig, rng: RngManager) -> Self {
        Self { config, rng }
    }

    pub fn build(&mut self, beach: &BeachInfo) -> Result<BeachDataset, GenerationError> {
        self.build_with_hook(beach, |_| {})
    }

    /// Like [`build`](Self::build), calling `hook` on every run before it is
    /// appended to the dataset.
    pub fn build_with_hook<F>(
        &mut self,
        beach: &BeachInfo,
        mut hook: F,
    ) -> Result<BeachDataset, GenerationError>
    where
        F: FnMut(&Run),
    {
        let master = self.master_locations(beach)?;

        let climate = DailyParameterSampler::new(self.config.tendency);
        let evolver = GrainPopulationEvolver::new(self.config.grains_per_location);
        let assembler = RunAssembler::new(self.config.start_date);
        let mut dataset = BeachDataset::new(beach.id.clone(), beach.name.clone());

        for day in 0..self.config.num_runs {
            let params = climate.sample(&mut self.rng.stream(CLIMATE_STREAM));
            if params.chances_out_of_range() {
                debug!(
                    day,
                    add_chance = params.add_chance,
                    remove_chance = params.remove_chance,
                    "daily chances outside [0, 1], clamping on use"
                );
            }
            let time = RunAssembler::sample_time(&mut self.rng.stream(SCHEDULE_STREAM));

            let previous = if day == 0 { None } else { dataset.runs.last() };
            if let Some(run) = previous {
                if run.locations.len() != master.len() {
                    return Err(GenerationError::IndexDrift {
                        day,
                        expected: master.len(),
                        actual: run.locations.len(),
                    });
                }
            }

            info!(
                run = day + 1,
                locations = master.len(),
                mean = params.mean,
                "processing locations"
            );
            let mut grains_rng = self.rng.stream(GRAINS_STREAM);
            let grain_sets: Vec<_> = (0..master.len())
                .map(|index| {
                    let prior = previous.map(|run| run.locations[index].grains.as_slice());
                    evolver.next(prior, params, &mut grains_rng)
                })
                .collect();

            let run = assembler.assemble(day, time, &master, grain_sets)?;
            debug!(
                operation_id = %run.operation_id,
                grains = run.grain_count(),
                "run assembled"
            );
            hook(&run);
            dataset.runs.push(run);
        }

        dataset.check_invariants()?;
        Ok(dataset)
    }

    /// Validates the config and draws the master location list for a beach.
    pub fn master_locations(&mut self, beach: &BeachInfo) -> Result<Vec<Location>, GenerationError> {
        let bounds = self.config.bounding_box(beach.lat, beach.lon)?;
        let sampler = GridSampler::new(bounds, self.config.grid);
        let (cell_width, cell_height) = sampler.cell_size();
        info!(
            cell_width,
            cell_height,
            lon_extent = bounds.lon_extent(),
            lat_extent = bounds.lat_extent(),
            "grid geometry"
        );

        let range = self.config.locations_per_run;
        let mut grid_rng = self.rng.stream(GRID_STREAM);
        let target = grid_rng.gen_range(range.min..=range.max) as usize;
        let master = sampler.sample(target, &mut grid_rng);
        info!(locations = master.len(), "master location list created");
        Ok(master)
    }
}
