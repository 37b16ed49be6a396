//! hubctl Engine - template rendering for stacks and cluster manifests
//!
//! This crate provides a MiniJinja-based renderer with:
//! - Embedded CloudFormation templates for every provisioning step
//! - Embedded Kubernetes manifests (auth ConfigMap, storage classes)
//! - An optional override directory taking precedence over embedded templates
//! - Strict parameter checking: every variable a template uses must be supplied

pub mod error;
pub mod filters;
pub mod renderer;
pub mod templates;

pub use error::{EngineError, Result};
pub use renderer::{Renderer, RendererBuilder};
