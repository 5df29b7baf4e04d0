mod common;

use approx::assert_relative_eq;
use common::{
    assert_elements_close, bounds_around, prior_record, track_times, truth, PinholeCamera,
};
use rand::{rngs::StdRng, SeedableRng};

use tlefit::{
    objective::FitProblem,
    observations::TrackExt,
    optimizer::least_squares::Termination,
    pipeline::run_once,
    FitSeed, OrbitalElements, RefineParams, Refiner,
};

fn quick_params() -> RefineParams {
    RefineParams::builder()
        .n_hops(5)
        .local_max_iters(100)
        .max_evaluations(100)
        .build()
        .unwrap()
}

#[test]
fn test_seed_at_truth_is_recovered() {
    let prior = prior_record(&truth());
    let times = track_times(5);
    let camera = PinholeCamera::looking_at(&prior, &times[2]);
    let track = camera.track(&prior, &times);

    let seed = FitSeed::new(truth(), bounds_around(&truth()), prior.clone()).unwrap();
    let refiner = Refiner::new(camera, seed, quick_params());
    let fit = refiner.fit(&track).unwrap();

    assert_elements_close(&fit.elements, &truth(), 1e-3);
    assert_eq!(fit.termination, Termination::ZeroCost);
    assert_eq!(fit.cost, 0.0);
    assert!(fit.stats.total_rms < 1e-6);
    assert_eq!(fit.record, prior);
    assert_eq!(&fit.record.line1[20..32], "100.50000000");
    assert_relative_eq!(fit.epoch_record.epoch_day, 100.5, epsilon = 1e-9);
    assert_relative_eq!(fit.epoch_record.mean_anomaly, 10.0, epsilon = 1e-9);
}

#[test]
fn test_perturbed_seed_is_improved() {
    let prior = prior_record(&truth());
    let times = track_times(5);
    let camera = PinholeCamera::looking_at(&prior, &times[2]);
    let track = camera.track(&prior, &times);

    let perturbed = OrbitalElements {
        raan: 250.3,
        arg_of_perigee: 79.8,
        ..truth()
    };
    let seed = FitSeed::new(perturbed, bounds_around(&truth()), prior.clone()).unwrap();

    let (x, y) = (track.pixels_x(), track.pixels_y());
    let template = seed.template().unwrap();
    let problem = FitProblem::new(&camera, template, &prior.line1, &times, &x, &y).unwrap();
    let seed_cost = problem.evaluate(&perturbed).unwrap();
    assert!(seed_cost > 0.0);

    let mut rng = StdRng::seed_from_u64(7);
    let fit = run_once(&camera, &track, &seed, &quick_params(), false, &mut rng).unwrap();

    assert!(fit.stage_a_cost < seed_cost);
    assert!(fit.cost <= fit.stage_a_cost);
    assert!(fit.is_finite());
    assert_eq!(fit.predicted_x.len(), 5);
}

#[test]
fn test_production_fit_is_reproducible() {
    let prior = prior_record(&truth());
    let times = track_times(6);
    let camera = PinholeCamera::looking_at(&prior, &times[3]);
    let track = camera.track(&prior, &times);

    let perturbed = OrbitalElements {
        raan: 249.8,
        ..truth()
    };
    let seed = FitSeed::new(perturbed, bounds_around(&truth()), prior).unwrap();
    let refiner = Refiner::new(camera, seed, quick_params());

    assert_eq!(refiner.fit(&track).unwrap(), refiner.fit(&track).unwrap());
}
