pub mod checkpoint;
pub mod codec;

pub use checkpoint::Checkpoint;
pub use codec::{CodecConfig, FORMAT_TAG, FORMAT_VERSION};
