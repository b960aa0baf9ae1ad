//! Multi-instance topology generation.
//!
//! [`TopologyGenerator::generate`] turns an instance count into a
//! [`DeploymentDescription`]: one shared [`NetworkContext`] plus one
//! [`InstanceBlueprint`] per index. Generation is pure; nothing is
//! provisioned here.

use crate::cluster::{ClusterRef, ComputeStrategy};
use crate::config::StackSettings;
use crate::error::TopologyError;
use crate::iam::{self, Role};
use crate::naming::{logical_id, ResourceNames};
use crate::network::NetworkContext;
use crate::service::ServiceSet;
use crate::storage::StorageMount;
use crate::token::Token;
use tracing::{debug, warn};

/// A validated, positive instance count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstanceCount(u32);

impl InstanceCount {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for InstanceCount {
    type Error = TopologyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 1 {
            return Err(TopologyError::InvalidTopologyRequest(format!(
                "instance count must be at least 1, got {value}"
            )));
        }
        u32::try_from(value).map(InstanceCount).map_err(|_| {
            TopologyError::InvalidTopologyRequest(format!("instance count {value} is too large"))
        })
    }
}

impl std::str::FromStr for InstanceCount {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.trim().parse().map_err(|_| {
            TopologyError::InvalidTopologyRequest(format!(
                "instance count must be an integer, got '{s}'"
            ))
        })?;
        InstanceCount::try_from(value)
    }
}

impl std::fmt::Display for InstanceCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CloudWatch log group shared by an instance's containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroup {
    pub name: String,
    pub logical_id: String,
    pub retention_days: u32,
}

/// Everything one sub-builder needs for instance `index`.
///
/// Built once per index after the cluster and storage mount exist, then
/// only read.
#[derive(Debug, Clone)]
pub struct BuildParams<'a> {
    pub index: u32,
    pub names: &'a ResourceNames,
    pub region: Token,
    pub settings: &'a StackSettings,
    pub network: &'a NetworkContext,
    pub cluster: &'a ClusterRef,
    pub storage_mount: &'a StorageMount,
}

/// One instance's complete set of derived resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceBlueprint {
    pub index: u32,
    pub names: ResourceNames,
    pub cluster: ClusterRef,
    pub storage_mount: StorageMount,
    pub task_role: Role,
    pub execution_role: Role,
    pub instance_role: Role,
    pub log_group: LogGroup,
    pub services: ServiceSet,
}

impl InstanceBlueprint {
    /// Every identifier derived for this instance that must be unique
    /// across the deployment: physical names, logical IDs, task families
    /// and container names.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .names
            .deployment_scoped()
            .into_iter()
            .map(str::to_string)
            .collect();
        ids.extend(self.cluster.logical_ids().into_iter().map(str::to_string));
        ids.push(self.storage_mount.logical_id.clone());
        ids.push(self.storage_mount.security_group.logical_id.clone());
        ids.push(self.task_role.logical_id.clone());
        ids.push(self.execution_role.logical_id.clone());
        ids.push(self.log_group.logical_id.clone());
        for service in self.services.iter() {
            ids.push(service.service_name.clone());
            ids.push(service.service_logical_id.clone());
            ids.push(service.task_definition_logical_id.clone());
            ids.push(service.family.clone());
            ids.push(service.container_name.clone());
        }
        ids.sort();
        ids.dedup();
        ids
    }

    /// Roles owned by this instance.
    pub fn roles(&self) -> [&Role; 3] {
        [&self.task_role, &self.execution_role, &self.instance_role]
    }
}

/// The full description handed to the apply engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDescription {
    pub stack_name: String,
    pub account: Option<String>,
    pub region: Option<String>,
    pub network: NetworkContext,
    pub blueprints: Vec<InstanceBlueprint>,
}

impl DeploymentDescription {
    pub fn instance_count(&self) -> usize {
        self.blueprints.len()
    }

    /// Over-broad permissions carried in the description.
    pub fn security_findings(&self) -> Vec<String> {
        self.blueprints
            .iter()
            .flat_map(|b| b.storage_mount.security_findings())
            .collect()
    }
}

/// Builds deployment descriptions for one stack.
#[derive(Debug, Clone)]
pub struct TopologyGenerator {
    pub stack_name: String,
    pub account: Option<String>,
    pub region: Option<String>,
    pub settings: StackSettings,
}

impl Default for TopologyGenerator {
    fn default() -> Self {
        Self::new("SessionStack", StackSettings::default())
    }
}

impl TopologyGenerator {
    pub fn new(stack_name: impl Into<String>, settings: StackSettings) -> Self {
        Self {
            stack_name: stack_name.into(),
            account: None,
            region: None,
            settings,
        }
    }

    pub fn with_env(mut self, account: Option<String>, region: Option<String>) -> Self {
        self.account = account;
        self.region = region;
        self
    }

    /// Build the description for `instance_count` instances.
    ///
    /// Fails with [`TopologyError::InvalidTopologyRequest`] before building
    /// anything when the count is not positive, the compute strategy is
    /// unsupported, or the VPC block is malformed, has host bits set, falls
    /// outside /16 to /28 or cannot hold its subnets.
    pub fn generate(&self, instance_count: i64) -> Result<DeploymentDescription, TopologyError> {
        let count = InstanceCount::try_from(instance_count)?;
        self.generate_count(count)
    }

    pub fn generate_count(
        &self,
        count: InstanceCount,
    ) -> Result<DeploymentDescription, TopologyError> {
        if self.settings.compute == ComputeStrategy::Fargate {
            return Err(TopologyError::InvalidTopologyRequest(
                "fargate compute strategy is not supported; use ec2".to_string(),
            ));
        }

        let network =
            NetworkContext::new(&self.settings.vpc_cidr, self.settings.availability_zones)?;

        let region = match &self.region {
            Some(region) => Token::literal(region.clone()),
            None => Token::region(),
        };

        let blueprints = (1..=count.get())
            .map(|index| self.build_instance(index, &network, &region))
            .collect();

        Ok(DeploymentDescription {
            stack_name: self.stack_name.clone(),
            account: self.account.clone(),
            region: self.region.clone(),
            network,
            blueprints,
        })
    }

    fn build_instance(
        &self,
        index: u32,
        network: &NetworkContext,
        region: &Token,
    ) -> InstanceBlueprint {
        let names = ResourceNames::for_index(index);
        let cluster = ClusterRef::new(&names, &self.settings.instance_type);
        let storage_mount = StorageMount::new(&names, network);

        for finding in storage_mount.security_findings() {
            warn!(stack = %self.stack_name, "Security finding: {finding}");
        }

        let params = BuildParams {
            index,
            names: &names,
            region: region.clone(),
            settings: &self.settings,
            network,
            cluster: &cluster,
            storage_mount: &storage_mount,
        };

        let backup_bucket = self.settings.backup_bucket.as_deref();
        let storage_arn = storage_mount.arn();
        let task_role = iam::task_role(
            &names.task_role,
            &names.role_policy,
            &storage_arn,
            backup_bucket,
        );
        let execution_role = iam::execution_role(
            &names.execution_role,
            &names.role_policy,
            &storage_arn,
            backup_bucket,
        );
        let instance_role = iam::instance_role(&names.instance_role);
        let services = ServiceSet::build(&params);

        debug!(
            stack = %self.stack_name,
            index,
            cluster = %cluster.name,
            storage_mount = %storage_mount.name,
            "Built instance blueprint"
        );

        InstanceBlueprint {
            index,
            log_group: LogGroup {
                name: names.log_group.clone(),
                logical_id: logical_id(&names.log_group),
                retention_days: self.settings.log_retention_days,
            },
            cluster,
            storage_mount,
            task_role,
            execution_role,
            instance_role,
            services,
            names,
        }
    }
}

/// Generate a description with default settings.
pub fn generate(instance_count: i64) -> Result<DeploymentDescription, TopologyError> {
    TopologyGenerator::default().generate(instance_count)
}

/// Describe a deployment for logging and the `describe` command.
pub fn describe_topology(description: &DeploymentDescription) -> String {
    let mut lines = Vec::new();
    let network = &description.network;
    lines.push(format!(
        "Stack {} ({} instance{}, region {})",
        description.stack_name,
        description.instance_count(),
        if description.instance_count() == 1 { "" } else { "s" },
        description.region.as_deref().unwrap_or("<default>"),
    ));
    lines.push(format!("  Network: {} {}", network.vpc_name, network.cidr));
    for rule in &network.service_security_group.ingress {
        lines.push(format!("    ingress {}", rule.describe()));
    }

    for blueprint in &description.blueprints {
        lines.push(format!(
            "  Instance {}: cluster={} storage={} roles={},{}",
            blueprint.index,
            blueprint.cluster.name,
            blueprint.storage_mount.name,
            blueprint.task_role.name,
            blueprint.execution_role.name,
        ));
        for service in blueprint.services.iter() {
            let ports = service
                .port_mappings
                .iter()
                .map(|m| format!("{}/{}", m.port, m.protocol))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!(
                "    {} {} ({}) [{}]",
                service.kind, service.service_name, service.image, ports
            ));
        }
    }

    let findings = description.security_findings();
    if !findings.is_empty() {
        lines.push("  Security findings:".to_string());
        for finding in findings {
            lines.push(format!("    {finding}"));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_count_validation() {
        assert!(InstanceCount::try_from(0).is_err());
        assert!(InstanceCount::try_from(-1).is_err());
        assert_eq!(InstanceCount::try_from(3).map(|c| c.get()), Ok(3));
        assert!(InstanceCount::try_from(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_instance_count_from_str() {
        assert_eq!("2".parse::<InstanceCount>().map(|c| c.get()), Ok(2));
        assert!(matches!(
            "1.5".parse::<InstanceCount>(),
            Err(TopologyError::InvalidTopologyRequest(_))
        ));
        assert!("abc".parse::<InstanceCount>().is_err());
        assert!("0".parse::<InstanceCount>().is_err());
    }

    #[test]
    fn test_fargate_rejected() {
        let settings = StackSettings {
            compute: ComputeStrategy::Fargate,
            ..Default::default()
        };
        let result = TopologyGenerator::new("SessionStack", settings).generate(1);
        assert!(matches!(result, Err(TopologyError::InvalidTopologyRequest(_))));
    }

    #[test]
    fn test_invalid_vpc_block_rejected() {
        for cidr in ["10.0.0.0/29", "10.0.69.5/24", "10.0.0.0/8", "10.0.69.0"] {
            let settings = StackSettings {
                vpc_cidr: cidr.to_string(),
                ..Default::default()
            };
            let result = TopologyGenerator::new("SessionStack", settings).generate(1);
            assert!(
                matches!(result, Err(TopologyError::InvalidTopologyRequest(_))),
                "{cidr} should be rejected"
            );
        }
    }

    #[test]
    fn test_vpc_block_used_consistently() {
        let settings = StackSettings {
            vpc_cidr: "10.2.0.0/16".to_string(),
            ..Default::default()
        };
        let description = TopologyGenerator::new("SessionStack", settings)
            .generate(2)
            .unwrap();

        assert_eq!(description.network.cidr.to_string(), "10.2.0.0/16");
        assert!(description
            .network
            .subnets
            .iter()
            .all(|subnet| description.network.cidr.contains(subnet)));
        for blueprint in &description.blueprints {
            assert_eq!(
                blueprint.storage_mount.security_group.ingress[0].peer.cidr(),
                "10.2.0.0/16"
            );
        }
    }

    #[test]
    fn test_region_token() {
        let unpinned = generate(1).unwrap();
        let env = unpinned.blueprints[0]
            .services
            .service_node
            .env(crate::service::ENV_REGION)
            .cloned();
        assert_eq!(env, Some(Token::region()));

        let pinned = TopologyGenerator::default()
            .with_env(None, Some("il-central-1".to_string()))
            .generate(1)
            .unwrap();
        let env = pinned.blueprints[0]
            .services
            .overlay_router
            .env(crate::service::ENV_REGION)
            .cloned();
        assert_eq!(env, Some(Token::literal("il-central-1")));
    }

    #[test]
    fn test_describe_topology() {
        let description = generate(2).unwrap();
        let text = describe_topology(&description);

        assert!(text.contains("Stack SessionStack (2 instances"));
        assert!(text.contains("Instance 1: cluster=sessionCluster storage=sessionEfs"));
        assert!(text.contains("Instance 2: cluster=sessionCluster-2 storage=sessionEfs-2"));
        assert!(text.contains("ingress UDP 1090 from 0.0.0.0/0"));
        assert!(text.contains("Security findings:"));
    }
}
