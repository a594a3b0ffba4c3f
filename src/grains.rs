//! Grain populations and the daily climate that drives them.

use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{config::ConfigError, config::CountRange, round_decimals};

/// Decimal digits kept on grain measurements.
pub const GRAIN_DECIMALS: i32 = 5;
pub const INITIAL_DIAMETER: RangeInclusive<f64> = 0.5..=1.5;
pub const INITIAL_AREA: RangeInclusive<f64> = 0.2..=2.0;
/// Number of grains deposited when the accretion gate opens.
pub const ACCRETION_BATCH: RangeInclusive<u32> = 1..=7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grain {
    pub diameter: f64,
    pub area: f64,
}

impl Grain {
    /// Fresh grain drawn from the initial size distribution.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let diameter = rng.gen_range(INITIAL_DIAMETER);
        let area = rng.gen_range(INITIAL_AREA);
        Self::measured(diameter, area)
    }

    fn measured(diameter: f64, area: f64) -> Self {
        Self {
            diameter: round_decimals(diameter, GRAIN_DECIMALS).abs(),
            area: round_decimals(area, GRAIN_DECIMALS).abs(),
        }
    }

    /// Area moves by the same linear factor as the diameter.
    pub fn scaled(self, factor: f64) -> Self {
        Self::measured(self.diameter * factor, self.area * factor)
    }
}

fn default_mean() -> f64 {
    1.0
}

fn default_dev() -> f64 {
    0.05
}

fn default_chance() -> f64 {
    0.05
}

fn default_mean_jitter() -> f64 {
    0.02
}

fn default_chance_jitter() -> f64 {
    0.03
}

/// Beach-wide tendency that every day's climate is perturbed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateTendency {
    /// Size change factor; 1.0 is stable.
    #[serde(default = "default_mean")]
    pub mean: f64,
    #[serde(default = "default_dev")]
    pub dev: f64,
    #[serde(default = "default_chance")]
    pub add_chance: f64,
    #[serde(default = "default_chance")]
    pub remove_chance: f64,
    #[serde(default = "default_mean_jitter")]
    pub mean_jitter: f64,
    #[serde(default = "default_chance_jitter")]
    pub chance_jitter: f64,
}

impl Default for ClimateTendency {
    fn default() -> Self {
        Self {
            mean: default_mean(),
            dev: default_dev(),
            add_chance: default_chance(),
            remove_chance: default_chance(),
            mean_jitter: default_mean_jitter(),
            chance_jitter: default_chance_jitter(),
        }
    }
}

impl ClimateTendency {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("tendency.mean", self.mean),
            ("tendency.dev", self.dev),
            ("tendency.add_chance", self.add_chance),
            ("tendency.remove_chance", self.remove_chance),
            ("tendency.mean_jitter", self.mean_jitter),
            ("tendency.chance_jitter", self.chance_jitter),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name });
            }
        }
        for (name, value) in [
            ("tendency.dev", self.dev),
            ("tendency.mean_jitter", self.mean_jitter),
            ("tendency.chance_jitter", self.chance_jitter),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NonPositive { name });
            }
        }
        Ok(())
    }
}

/// One day's climate, shared by every location that day.
///
/// Chances hold the raw perturbed values and may fall outside `[0, 1]`;
/// consumers clamp at the point of use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyParameters {
    pub mean: f64,
    pub dev: f64,
    pub add_chance: f64,
    pub remove_chance: f64,
}

impl DailyParameters {
    pub fn effective_add_chance(&self) -> f64 {
        self.add_chance.max(0.0)
    }

    /// Only the lower bound is clamped: a value above one removes every grain.
    pub fn effective_remove_chance(&self) -> f64 {
        self.remove_chance.max(0.0)
    }

    pub fn chances_out_of_range(&self) -> bool {
        let unit = 0.0..=1.0;
        !unit.contains(&self.add_chance) || !unit.contains(&self.remove_chance)
    }

    fn change_factor_range(&self) -> RangeInclusive<f64> {
        let spread = self.dev.abs();
        (self.mean - spread)..=(self.mean + spread)
    }
}

pub struct DailyParameterSampler {
    tendency: ClimateTendency,
}

impl DailyParameterSampler {
    pub fn new(tendency: ClimateTendency) -> Self {
        Self { tendency }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DailyParameters {
        let t = &self.tendency;
        let mean_jitter = t.mean_jitter.abs();
        let chance_jitter = t.chance_jitter.abs();
        DailyParameters {
            mean: t.mean + rng.gen_range(-mean_jitter..=mean_jitter),
            dev: t.dev,
            add_chance: t.add_chance + rng.gen_range(-chance_jitter..=chance_jitter),
            remove_chance: t.remove_chance + rng.gen_range(-chance_jitter..=chance_jitter),
        }
    }
}

/// Day-to-day state transition for the grains of a single location.
pub struct GrainPopulationEvolver {
    grains_per_location: CountRange,
}

impl GrainPopulationEvolver {
    pub fn new(grains_per_location: CountRange) -> Self {
        Self {
            grains_per_location,
        }
    }

    /// First-day population, built from scratch.
    pub fn initial<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Grain> {
        let range = self.grains_per_location;
        let count = rng.gen_range(range.min..=range.max);
        (0..count).map(|_| Grain::sample(rng)).collect()
    }

    /// Survivors of `previous`, resized, followed by any accreted grains.
    pub fn evolve<R: Rng + ?Sized>(
        &self,
        previous: &[Grain],
        params: DailyParameters,
        rng: &mut R,
    ) -> Vec<Grain> {
        let remove_chance = params.effective_remove_chance();
        let factor_range = params.change_factor_range();

        let mut next = Vec::with_capacity(previous.len());
        for grain in previous {
            if rng.gen::<f64>() > remove_chance {
                let factor = rng.gen_range(factor_range.clone());
                next.push(grain.scaled(factor));
            }
        }

        if rng.gen::<f64>() < params.effective_add_chance() {
            let batch = rng.gen_range(ACCRETION_BATCH);
            next.extend((0..batch).map(|_| Grain::sample(rng)));
        }
        next
    }

    pub fn next<R: Rng + ?Sized>(
        &self,
        previous: Option<&[Grain]>,
        params: DailyParameters,
        rng: &mut R,
    ) -> Vec<Grain> {
        match previous {
            Some(previous) => self.evolve(previous, params, rng),
            None => self.initial(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn params(mean: f64, dev: f64, add_chance: f64, remove_chance: f64) -> DailyParameters {
        DailyParameters {
            mean,
            dev,
            add_chance,
            remove_chance,
        }
    }

    fn population(n: usize) -> Vec<Grain> {
        vec![
            Grain {
                diameter: 1.25,
                area: 0.5,
            };
            n
        ]
    }

    #[test]
    fn initial_population_respects_bounds() {
        let evolver = GrainPopulationEvolver::new(CountRange::fixed(3));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let grains = evolver.initial(&mut rng);

        assert_eq!(grains.len(), 3);
        for grain in grains {
            assert!((0.5..=1.5).contains(&grain.diameter));
            assert!((0.2..=2.0).contains(&grain.area));
        }
    }

    #[test]
    fn no_removal_and_closed_gate_keeps_count() {
        let evolver = GrainPopulationEvolver::new(CountRange::new(5, 20));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let previous = population(12);

        for _ in 0..50 {
            let next = evolver.evolve(&previous, params(1.0, 0.05, -0.2, 0.0), &mut rng);
            assert_eq!(next.len(), previous.len());
        }
    }

    #[test]
    fn removal_above_one_empties_location() {
        let evolver = GrainPopulationEvolver::new(CountRange::new(5, 20));
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let next = evolver.evolve(&population(20), params(1.0, 0.05, 0.0, 1.5), &mut rng);

        assert!(next.is_empty());
    }

    #[test]
    fn open_gate_appends_fresh_batch_after_survivors() {
        let evolver = GrainPopulationEvolver::new(CountRange::new(5, 20));
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let previous = population(4);

        let next = evolver.evolve(&previous, params(1.0, 0.0, 1.5, -0.1), &mut rng);

        assert!(next.len() >= previous.len() + 1);
        assert!(next.len() <= previous.len() + 7);
        assert_eq!(&next[..previous.len()], previous.as_slice());
        for grain in &next[previous.len()..] {
            assert!((0.5..=1.5).contains(&grain.diameter));
        }
    }

    #[test]
    fn resize_scales_diameter_and_area_by_same_factor() {
        let evolver = GrainPopulationEvolver::new(CountRange::new(5, 20));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let previous = vec![Grain {
            diameter: 1.2,
            area: 0.8,
        }];

        let next = evolver.evolve(&previous, params(2.0, 0.0, 0.0, 0.0), &mut rng);

        assert_eq!(next, vec![Grain { diameter: 2.4, area: 1.6 }]);
    }

    #[test]
    fn negative_factor_still_yields_positive_sizes() {
        let grain = Grain {
            diameter: 1.0,
            area: 1.0,
        }
        .scaled(-0.75);
        assert_eq!(grain, Grain { diameter: 0.75, area: 0.75 });
    }

    #[test]
    fn daily_parameters_stay_within_jitter_and_keep_dev() {
        let sampler = DailyParameterSampler::new(ClimateTendency::default());
        let mut rng = ChaCha8Rng::seed_from_u64(6);

        for _ in 0..200 {
            let day = sampler.sample(&mut rng);
            assert!((day.mean - 1.0).abs() <= 0.02 + 1e-12);
            assert!((day.add_chance - 0.05).abs() <= 0.03 + 1e-12);
            assert!((day.remove_chance - 0.05).abs() <= 0.03 + 1e-12);
            assert_eq!(day.dev, 0.05);
        }
    }

    #[test]
    fn raw_chances_are_kept_and_clamped_on_use() {
        let tendency = ClimateTendency {
            add_chance: -0.5,
            remove_chance: 1.4,
            chance_jitter: 0.0,
            ..ClimateTendency::default()
        };
        let day = DailyParameterSampler::new(tendency).sample(&mut ChaCha8Rng::seed_from_u64(7));

        assert_eq!(day.add_chance, -0.5);
        assert_eq!(day.effective_add_chance(), 0.0);
        assert_eq!(day.effective_remove_chance(), 1.4);
        assert!(day.chances_out_of_range());
    }

    #[test]
    fn tendency_rejects_negative_dev() {
        let tendency = ClimateTendency {
            dev: -0.1,
            ..ClimateTendency::default()
        };
        assert_eq!(
            tendency.validate(),
            Err(ConfigError::NonPositive { name: "tendency.dev" })
        );
    }
}
