use thiserror::Error;

#[derive(Error, Debug)]
pub enum TlefitError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Malformed element record: {0}")]
    MalformedRecord(String),

    #[error("Eccentricity {0} cannot be encoded in the 7-digit record field")]
    InvalidEccentricity(f64),

    #[error("No observation available")]
    EmptyObservations,

    #[error("Observation {0} is earlier than the one before it")]
    UnorderedObservations(usize),

    #[error("At least {required} observations are required, got {found}")]
    InsufficientObservations { required: usize, found: usize },

    #[error("Projection adapter failure: {0}")]
    ProjectionFailed(String),

    #[error("Projection returned {found_x}/{found_y} pixels for {expected} timestamps")]
    ProjectionLengthMismatch {
        expected: usize,
        found_x: usize,
        found_y: usize,
    },

    #[error("Invalid refinement parameter: {0}")]
    InvalidRefineParameter(String),

    #[error("Initial guess lies outside the solver bounds: {0}")]
    InfeasibleStart(String),

    #[error("Local constrained minimization failed: {0}")]
    LocalSolverFailed(String),

    #[error("Normal equations are singular and could not be regularized")]
    SingularNormalEquations,

    #[error("Every one of the {0} bootstrap iterations failed")]
    BootstrapExhausted(usize),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Gaussian noise generation failed: {0:?}")]
    NoiseInjectionError(rand_distr::NormalError),
}

impl From<rand_distr::NormalError> for TlefitError {
    fn from(err: rand_distr::NormalError) -> Self {
        TlefitError::NoiseInjectionError(err)
    }
}

impl PartialEq for TlefitError {
    fn eq(&self, other: &Self) -> bool {
        use TlefitError::*;
        match (self, other) {
            (InvalidTimestamp(a), InvalidTimestamp(b)) => a == b,
            (MalformedRecord(a), MalformedRecord(b)) => a == b,
            (InvalidEccentricity(a), InvalidEccentricity(b)) => a == b,
            (UnorderedObservations(a), UnorderedObservations(b)) => a == b,
            (
                InsufficientObservations {
                    required: r1,
                    found: f1,
                },
                InsufficientObservations {
                    required: r2,
                    found: f2,
                },
            ) => r1 == r2 && f1 == f2,
            (ProjectionFailed(a), ProjectionFailed(b)) => a == b,
            (
                ProjectionLengthMismatch {
                    expected: e1,
                    found_x: x1,
                    found_y: y1,
                },
                ProjectionLengthMismatch {
                    expected: e2,
                    found_x: x2,
                    found_y: y2,
                },
            ) => e1 == e2 && x1 == x2 && y1 == y2,
            (InvalidRefineParameter(a), InvalidRefineParameter(b)) => a == b,
            (InfeasibleStart(a), InfeasibleStart(b)) => a == b,
            (LocalSolverFailed(a), LocalSolverFailed(b)) => a == b,
            (BootstrapExhausted(a), BootstrapExhausted(b)) => a == b,
            (NoiseInjectionError(a), NoiseInjectionError(b)) => a == b,

            // Not comparable: equal when the variant matches
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (EmptyObservations, EmptyObservations) => true,
            (SingularNormalEquations, SingularNormalEquations) => true,

            _ => false,
        }
    }
}
