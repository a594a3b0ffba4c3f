use beachgen::{
    config::CountRange,
    grains::{DailyParameters, Grain, GrainPopulationEvolver},
    spatial::{allocate, BoundingBox, GridSampler, GridSpec},
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

proptest! {
    #[test]
    fn allocation_sums_to_total(total in 0usize..20_000, cols in 1u32..40, rows in 1u32..40) {
        let cells = GridSpec::new(cols, rows).cell_count();
        let counts = allocate(total, cells);

        prop_assert_eq!(counts.len(), cells);
        prop_assert_eq!(counts.iter().sum::<usize>(), total);
        let min = counts.iter().min().copied().unwrap_or(0);
        let max = counts.iter().max().copied().unwrap_or(0);
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn sampler_returns_exactly_total(
        total in 0usize..600,
        cols in 1u32..25,
        rows in 1u32..25,
        seed in any::<u64>(),
    ) {
        let bounds = BoundingBox::around(-8.4, 115.2, 0.0025).unwrap();
        let sampler = GridSampler::new(bounds, GridSpec::new(cols, rows));
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let locations = sampler.sample(total, &mut rng);

        prop_assert_eq!(locations.len(), total);
    }

    #[test]
    fn evolved_grains_stay_positive(
        mean in -2.0f64..3.0,
        dev in 0.0f64..0.5,
        add_chance in -0.5f64..1.5,
        remove_chance in -0.5f64..1.5,
        seed in any::<u64>(),
    ) {
        let evolver = GrainPopulationEvolver::new(CountRange::new(5, 20));
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let previous = evolver.initial(&mut rng);
        let params = DailyParameters { mean, dev, add_chance, remove_chance };

        let next = evolver.evolve(&previous, params, &mut rng);

        for grain in next {
            prop_assert!(grain.diameter >= 0.0 && grain.area >= 0.0);
        }
    }

    #[test]
    fn inverted_boxes_are_rejected(lat in -80.0f64..80.0, span in 0.0f64..1.0) {
        prop_assert!(BoundingBox::new(lat + span, lat, 0.0, 1.0).is_err());
    }
}

#[test]
fn scaled_grain_rounds_to_five_decimals() {
    let grain = Grain {
        diameter: 1.123456789,
        area: 0.987654321,
    }
    .scaled(1.0);
    assert_eq!(grain.diameter, 1.12346);
    assert_eq!(grain.area, 0.98765);
}
