use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The result type of the fgsm crate.
pub type Result<T> = std::result::Result<T, FgsmErr>;

/// Attack, evaluation and configuration failures.
#[derive(Debug)]
pub enum FgsmErr {
    InvalidEpsilon(f32),
    LabelCount { got: usize, expected: usize },
    EmptyEvaluation,
    Config { var: &'static str, value: String },
    Ml(MlErr),
}

impl fmt::Display for FgsmErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FgsmErr::InvalidEpsilon(epsilon) => write!(
                f,
                "invalid epsilon {epsilon}: must be a finite, non negative number"
            ),
            FgsmErr::LabelCount { got, expected } => {
                write!(f, "expected {expected} labels, got {got}")
            }
            FgsmErr::EmptyEvaluation => write!(f, "no samples to evaluate"),
            FgsmErr::Config { var, value } => write!(f, "invalid value for {var}: {value:?}"),
            FgsmErr::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for FgsmErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FgsmErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for FgsmErr {
    fn from(e: MlErr) -> Self {
        FgsmErr::Ml(e)
    }
}

impl From<io::Error> for FgsmErr {
    fn from(e: io::Error) -> Self {
        FgsmErr::Ml(MlErr::Io(e))
    }
}
