use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    UnknownParamGroup {
        name: String,
    },
    MissingTensor {
        name: String,
    },
    TensorShape {
        name: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    LabelOutOfRange {
        label: usize,
        num_classes: usize,
    },
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    InvalidDistribution(String),
    NonFiniteLoss {
        epoch: usize,
        batch: usize,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => {
                format!("There's a size mismatch in {what}, got {got} and expected {expected}")
            }
            MlErr::UnknownParamGroup { name } => {
                format!("The model has no parameter group named {name:?}")
            }
            MlErr::MissingTensor { name } => format!("The tensor {name:?} is missing"),
            MlErr::TensorShape {
                name,
                got,
                expected,
            } => format!("The tensor {name:?} has shape {got:?}, expected {expected:?}"),
            MlErr::LabelOutOfRange { label, num_classes } => {
                format!("Found label {label} but there are only {num_classes} classes")
            }
            MlErr::IndexOutOfRange { index, len } => {
                format!("Index {index} is out of range for a dataset of {len} samples")
            }
            MlErr::InvalidDistribution(msg) => {
                format!("Failed to build the initialization distribution: {msg}")
            }
            MlErr::NonFiniteLoss { epoch, batch } => {
                format!("The loss diverged to a non finite value on epoch {epoch}, batch {batch}")
            }
        };

        write!(f, "{s}")
    }
}

impl Error for MlErr {}

impl From<rand::distr::uniform::Error> for MlErr {
    fn from(e: rand::distr::uniform::Error) -> Self {
        Self::InvalidDistribution(e.to_string())
    }
}
