//! hubctl Cloud - cluster provisioning as a pipeline of provider stacks
//!
//! A cluster is built by a fixed, ordered list of [`ResourceStep`]s, each
//! owning one stack named `{cluster}-{suffix}`. The [`Pipeline`]:
//! - skips steps whose stack is already complete, so a failed run resumes
//! - feeds each step the outputs of the steps before it
//! - tears stacks down in reverse order, best effort
//!
//! Provider access goes through the [`StackManager`] and [`ClusterDirectory`]
//! traits. [`MemoryStackManager`] backs both in tests; the `aws` CLI backs them
//! for real clusters.

pub mod aws;
pub mod directory;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod stack;
pub mod step;

#[cfg(test)]
mod testing;

pub use aws::AwsCli;
pub use directory::{AwsDirectory, ClusterDirectory, ControlPlane, Principal};
pub use error::{CloudError, Result};
pub use pipeline::{Backends, Pipeline, StepResults, TeardownEntry, TeardownReport};
pub use progress::{NoProgress, ProgressObserver, StepOutcome};
pub use provider::{ClusterProvider, EksOptions, EksProvider, NetworkOptions, NodeOptions, ProviderKind};
pub use stack::{
    AwsStackManager, MemoryStackManager, OperationCounts, Parameters, StackManager, StackOperation,
    WaitPolicy,
};
pub use step::{OutputSource, ParamValue, ResourceStep};
