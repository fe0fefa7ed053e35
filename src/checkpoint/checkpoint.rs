use log::debug;

use crate::error::ShapeMismatch;
use crate::network::{ArchitectureDescriptor, Network, ParameterSet};

/// Architecture and parameter values bundled so a network can be rebuilt
/// exactly.
///
/// The parameters always have precisely the keys and shapes implied by the
/// architecture, which is what makes [`Checkpoint::restore`] infallible.
/// A checkpoint owns its tensors and never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    architecture: ArchitectureDescriptor,
    parameters: ParameterSet,
}

impl Checkpoint {
    /// Bundles a caller-assembled architecture and parameter set.
    pub fn new(
        architecture: ArchitectureDescriptor,
        parameters: ParameterSet,
    ) -> Result<Checkpoint, ShapeMismatch> {
        parameters.check_layout(&architecture.parameter_layout())?;
        Ok(Checkpoint { architecture, parameters })
    }

    /// Snapshots a network's descriptor and current parameter values.
    ///
    /// The copy is deep: training the network further does not affect the
    /// returned checkpoint.
    pub fn capture(network: &Network) -> Checkpoint {
        let checkpoint = Checkpoint {
            architecture: network.describe(),
            parameters: network.parameters(),
        };
        debug!(
            "captured checkpoint: {} tensors, {} values",
            checkpoint.parameters.len(),
            checkpoint.parameters.value_count()
        );
        checkpoint
    }

    /// Builds a new network from the stored architecture around copies of
    /// the stored parameters. The network starts in eval mode.
    pub fn restore(&self) -> Network {
        Network::from_checked_parameters(self.architecture.clone(), self.parameters.clone())
    }

    pub fn architecture(&self) -> &ArchitectureDescriptor {
        &self.architecture
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn into_parts(self) -> (ArchitectureDescriptor, ParameterSet) {
        (self.architecture, self.parameters)
    }

    /// Assembles a checkpoint whose layout has already been checked.
    pub(crate) fn from_checked_parts(
        architecture: ArchitectureDescriptor,
        parameters: ParameterSet,
    ) -> Checkpoint {
        Checkpoint { architecture, parameters }
    }
}
