pub mod activations;
pub mod layers;
pub mod loss;
mod model;
mod sequential;
mod tensor;

pub use model::{ENC, EncoderMode, LIN, LinModel, ParamGroup};
pub use sequential::Sequential;
pub use tensor::Tensor;
