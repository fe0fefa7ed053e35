pub mod architecture;
pub mod network;
pub mod parameters;

pub use architecture::ArchitectureDescriptor;
pub use network::Network;
pub use parameters::ParameterSet;
