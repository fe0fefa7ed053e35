pub mod activation;
pub mod checkpoint;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod validation;

// Convenience re-exports
pub use checkpoint::{Checkpoint, CodecConfig};
pub use error::{ArchitectureError, CheckpointError, FormatError, ParameterMismatch, ShapeMismatch};
pub use math::tensor::{Tensor, TensorError};
pub use network::{ArchitectureDescriptor, Network, ParameterSet};
pub use validation::{validate, ValidationStats};
