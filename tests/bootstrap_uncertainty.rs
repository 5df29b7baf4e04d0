mod common;

use common::{bounds_around, prior_record, track_times, truth, BrokenProjector, PinholeCamera};

use tlefit::{bootstrap::run_bootstrap, FitSeed, RefineParams, Refiner, TlefitError};

fn params(n_bootstrap: usize) -> RefineParams {
    RefineParams::builder()
        .n_hops(3)
        .local_max_iters(60)
        .max_evaluations(60)
        .n_bootstrap(n_bootstrap)
        .bootstrap_sigma_px(0.5)
        .build()
        .unwrap()
}

#[test]
fn test_single_replica_has_zero_spread() {
    let prior = prior_record(&truth());
    let times = track_times(5);
    let camera = PinholeCamera::looking_at(&prior, &times[2]);
    let track = camera.track(&prior, &times);
    let seed = FitSeed::from_prior(prior, bounds_around(&truth())).unwrap();

    let summary = run_bootstrap(&camera, &track, &seed, &params(1)).unwrap();

    assert_eq!(summary.n_iterations, 1);
    assert_eq!(summary.n_successful(), 1);
    assert_eq!(summary.std_dev, [0.0; 6]);
}

#[test]
fn test_failing_projector_exhausts_the_bootstrap() {
    let prior = prior_record(&truth());
    let times = track_times(5);
    let camera = PinholeCamera::looking_at(&prior, &times[2]);
    let track = camera.track(&prior, &times);
    let seed = FitSeed::from_prior(prior, bounds_around(&truth())).unwrap();

    assert_eq!(
        run_bootstrap(&BrokenProjector, &track, &seed, &params(3)),
        Err(TlefitError::BootstrapExhausted(3))
    );
}

#[test]
fn test_report_gathers_fit_and_uncertainty() {
    let prior = prior_record(&truth());
    let times = track_times(5);
    let camera = PinholeCamera::looking_at(&prior, &times[2]);
    let track = camera.track(&prior, &times);
    let seed = FitSeed::from_prior(prior, bounds_around(&truth())).unwrap();

    let refiner = Refiner::new(camera, seed, params(3));
    let report = refiner.report(&track).unwrap();

    assert_eq!(report.uncertainty.n_iterations, 3);
    assert_eq!(
        report.uncertainty.n_successful() + report.uncertainty.n_failed,
        3
    );
    assert!(report.uncertainty.std_dev.iter().all(|s| *s >= 0.0));

    let summary = format!("{report}");
    assert!(summary.contains(&report.fit.record.line1));
    assert!(summary.contains(&report.fit.record.line2));
    assert!(summary.contains("inclination"));
    assert!(!summary.contains("x obs"));
    assert!(format!("{report:#}").contains("x obs"));

    let mut buffer = Vec::new();
    report.write_track_csv(&mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("index,time_utc,observed_x,observed_y,fitted_x,fitted_y,along_track,cross_track")
    );
    assert_eq!(lines.count(), 5);
}
