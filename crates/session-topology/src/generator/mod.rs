//! Template generators for deployment descriptions.
//!
//! This module renders a [`DeploymentDescription`] into the format the apply
//! engine consumes.

pub mod cloudformation;

use crate::topology::DeploymentDescription;
use anyhow::Result;

/// Trait for template generators.
pub trait TemplateGenerator {
    /// Render the description.
    fn generate(&self, description: &DeploymentDescription) -> Result<String>;

    /// Output filename for the description's stack.
    fn filename(&self, description: &DeploymentDescription) -> String;
}

pub use cloudformation::{CloudFormationGenerator, TemplateFormat};
