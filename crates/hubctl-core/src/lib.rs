//! hubctl Core - Core types and utilities shared by every hubctl crate
//!
//! This crate provides:
//! - `Stack`: Provider-side resource group with status and outputs
//! - `Cluster`: The externally visible result of a provisioning run
//! - `Values`: Configuration values with deep merge support
//! - `CommandRunner`: Execution of external tools (`aws`, `kubectl`, `helm`)
//! - `Registry`: Kubeconfig-backed record of clusters and contexts

pub mod cluster;
pub mod command;
pub mod error;
pub mod registry;
pub mod stack;
pub mod values;

pub use cluster::{AuthExec, Cluster};
pub use command::{
    CommandOutput, CommandRunner, Invocation, ProcessRunner, RecordedCall, ScriptedRunner, Tool,
};
pub use error::{CoreError, Result};
pub use registry::{Registry, RegistryEntry};
pub use stack::{Capability, Stack, StackStatus};
pub use values::{Values, parse_set_values};
