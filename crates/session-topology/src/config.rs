//! Configuration types for session stacks.
//!
//! An app configuration lists one or more stacks (typically one per region).
//! Each stack carries its instance count and the settings every instance is
//! built from.

use crate::cluster::ComputeStrategy;
use crate::error::ConfigError;
use crate::network::DEFAULT_VPC_CIDR;
use crate::service::ServiceImages;
use crate::topology::{InstanceCount, TopologyGenerator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Name of the stack deployed to the account's default region.
pub const DEFAULT_STACK_NAME: &str = "SessionStack";

/// Settings shared by every instance of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSettings {
    /// VPC address block
    #[serde(default = "default_vpc_cidr")]
    pub vpc_cidr: String,
    /// Number of availability zones to place public subnets in
    #[serde(default = "default_availability_zones")]
    pub availability_zones: u8,
    /// EC2 instance type of the container instances
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    /// Compute strategy (only `ec2` is supported)
    #[serde(default)]
    pub compute: ComputeStrategy,
    /// Container images
    #[serde(default)]
    pub images: ServiceImages,
    /// S3 bucket holding the backup archive, readable by every instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_bucket: Option<String>,
    /// Desired task count per service
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
    /// Log retention in days
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

fn default_vpc_cidr() -> String {
    DEFAULT_VPC_CIDR.to_string()
}

fn default_availability_zones() -> u8 {
    2
}

fn default_instance_type() -> String {
    "t3.medium".to_string()
}

fn default_desired_count() -> u32 {
    1
}

fn default_log_retention_days() -> u32 {
    30
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            vpc_cidr: default_vpc_cidr(),
            availability_zones: default_availability_zones(),
            instance_type: default_instance_type(),
            compute: ComputeStrategy::default(),
            images: ServiceImages::default(),
            backup_bucket: None,
            desired_count: default_desired_count(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

/// One stack of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack name
    pub name: String,
    /// Target account; falls back to the CLI default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Target region; falls back to the CLI default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Number of parallel instances
    #[serde(default = "default_instance_count")]
    pub instance_count: i64,
    #[serde(flatten)]
    pub settings: StackSettings,
}

fn default_instance_count() -> i64 {
    1
}

impl StackConfig {
    pub fn new(name: impl Into<String>, region: Option<String>) -> Self {
        Self {
            name: name.into(),
            account: None,
            region,
            instance_count: default_instance_count(),
            settings: StackSettings::default(),
        }
    }

    /// Generator for this stack, filling account and region from defaults.
    pub fn generator(
        &self,
        default_account: Option<&str>,
        default_region: Option<&str>,
    ) -> TopologyGenerator {
        TopologyGenerator::new(&self.name, self.settings.clone()).with_env(
            self.account
                .clone()
                .or_else(|| default_account.map(str::to_string)),
            self.region
                .clone()
                .or_else(|| default_region.map(str::to_string)),
        )
    }
}

/// All stacks of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub stacks: Vec<StackConfig>,
}

impl Default for AppConfig {
    /// The default region plus Israel, one instance each.
    fn default() -> Self {
        Self {
            stacks: vec![
                StackConfig::new(DEFAULT_STACK_NAME, None),
                StackConfig::new(
                    "SessionStack-il-central-1-1",
                    Some("il-central-1".to_string()),
                ),
            ],
        }
    }
}

impl AppConfig {
    /// Load from a `.toml`, `.yaml` or `.yml` file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let config: AppConfig = match extension.as_str() {
            "toml" => toml::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate stack names and invalid instance counts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for stack in &self.stacks {
            if !seen.insert(stack.name.as_str()) {
                return Err(ConfigError::DuplicateStack(stack.name.clone()));
            }
            InstanceCount::try_from(stack.instance_count)?;
        }
        Ok(())
    }

    pub fn stack(&self, name: &str) -> Result<&StackConfig, ConfigError> {
        self.stacks
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ConfigError::StackNotFound(name.to_string()))
    }
}
