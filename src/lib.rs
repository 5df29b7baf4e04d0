//! # tlefit
//!
//! Refinement of a two-line element record from a short pixel track of a satellite seen by a
//! fixed camera.
//!
//! ## Workflow
//!
//! 1. Ingest timestamped pixel detections ([`observations::ingest`],
//!    [`observations::csv_reader::ingest_csv_file`]).
//! 2. Describe the starting point: seed elements, element bounds and the prior record
//!    ([`refine_params::FitSeed`]).
//! 3. Plug the physical model in through the [`projection::Projector`] trait.
//! 4. Refine with [`pipeline::Refiner`]: a global search over the weakly constrained angles
//!    followed by a bounded least-squares fit of all six elements
//!    ([`optimizer::two_stage`]).
//! 5. Estimate the element uncertainties by bootstrap ([`bootstrap::run_bootstrap`]) and
//!    render a [`report::FitReport`].
//!
//! ## Features
//!
//! * `parallel` – bootstrap replicas run on the rayon thread pool.
//! * `progress` – indicatif progress bar over the bootstrap replicas.

pub mod bootstrap;
pub mod constants;
pub mod elements;
pub mod epoch;
pub mod objective;
pub mod observations;
pub mod optimizer;
pub mod pipeline;
pub mod projection;
pub mod record;
pub mod refine_params;
pub mod report;
pub mod residuals;
pub mod time;
pub mod tlefit_errors;

#[cfg(feature = "progress")]
pub mod progress_bar;

pub use elements::{Bound, ElementBounds, OrbitalElements};
pub use observations::{Observation, Observations, RawDetection};
pub use pipeline::{FitResult, Refiner};
pub use projection::{PixelTrack, Projector};
pub use record::ElementRecord;
pub use refine_params::{FitSeed, RefineParams};
pub use tlefit_errors::TlefitError;
