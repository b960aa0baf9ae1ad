//! ECS cluster identity and its EC2 capacity.

use crate::naming::{logical_id, ResourceNames};
use serde::{Deserialize, Serialize};

/// SSM parameter resolving to the current ECS-optimized Amazon Linux 2023 AMI.
pub const ECS_AMI_PARAMETER: &str =
    "/aws/service/ecs/optimized-ami/amazon-linux-2023/recommended/image_id";

/// Managed policy container instances need to register with ECS.
pub const CONTAINER_INSTANCE_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonEC2ContainerServiceforEC2Role";

/// Where tasks get their compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeStrategy {
    /// Auto scaling group of ECS container instances.
    #[default]
    Ec2,
    /// Serverless tasks. Never worked end to end for these containers (the
    /// overlay router needs host devices Fargate does not expose), so the
    /// generator refuses it.
    Fargate,
}

impl std::fmt::Display for ComputeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeStrategy::Ec2 => write!(f, "ec2"),
            ComputeStrategy::Fargate => write!(f, "fargate"),
        }
    }
}

impl std::str::FromStr for ComputeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ec2" => Ok(ComputeStrategy::Ec2),
            "fargate" => Ok(ComputeStrategy::Fargate),
            _ => Err(format!("Unknown compute strategy: {s}")),
        }
    }
}

/// EC2 capacity backing one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2Capacity {
    pub instance_type: String,
    pub desired_capacity: u32,
    pub launch_template_id: String,
    pub auto_scaling_group_id: String,
    pub capacity_provider_id: String,
    pub capacity_provider_name: String,
    pub instance_role_id: String,
    pub instance_profile_id: String,
}

impl Ec2Capacity {
    /// User data registering the container instance with its cluster.
    pub fn user_data(&self, cluster_name: &str) -> String {
        format!("#!/bin/bash\necho ECS_CLUSTER={cluster_name} >> /etc/ecs/ecs.config\n")
    }
}

/// One instance's ECS cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRef {
    pub name: String,
    pub logical_id: String,
    pub capacity: Ec2Capacity,
}

impl ClusterRef {
    pub fn new(names: &ResourceNames, instance_type: &str) -> Self {
        Self {
            name: names.cluster.clone(),
            logical_id: logical_id(&names.cluster),
            capacity: Ec2Capacity {
                instance_type: instance_type.to_string(),
                desired_capacity: 1,
                launch_template_id: logical_id(&names.launch_template),
                auto_scaling_group_id: logical_id(&names.auto_scaling_group),
                capacity_provider_id: logical_id(&names.capacity_provider),
                capacity_provider_name: names.capacity_provider.clone(),
                instance_role_id: logical_id(&names.instance_role),
                instance_profile_id: logical_id(&names.instance_profile),
            },
        }
    }

    /// Logical IDs this cluster owns, cluster first.
    pub fn logical_ids(&self) -> Vec<&str> {
        vec![
            self.logical_id.as_str(),
            self.capacity.instance_role_id.as_str(),
            self.capacity.instance_profile_id.as_str(),
            self.capacity.launch_template_id.as_str(),
            self.capacity.auto_scaling_group_id.as_str(),
            self.capacity.capacity_provider_id.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_strategy_from_str() {
        assert_eq!("ec2".parse::<ComputeStrategy>(), Ok(ComputeStrategy::Ec2));
        assert_eq!("Fargate".parse::<ComputeStrategy>(), Ok(ComputeStrategy::Fargate));
        assert!("lambda".parse::<ComputeStrategy>().is_err());
    }

    #[test]
    fn test_cluster_for_second_instance() {
        let cluster = ClusterRef::new(&ResourceNames::for_index(2), "t3.medium");
        assert_eq!(cluster.name, "sessionCluster-2");
        assert_eq!(cluster.logical_id, "sessionCluster2");
        assert_eq!(cluster.capacity.auto_scaling_group_id, "sessionAutoScalingGroup2");
        assert_eq!(cluster.capacity.capacity_provider_name, "sessionCapacityProvider-2");
    }

    #[test]
    fn test_user_data_registers_cluster() {
        let cluster = ClusterRef::new(&ResourceNames::for_index(1), "t3.medium");
        let user_data = cluster.capacity.user_data(&cluster.name);
        assert!(user_data.contains("ECS_CLUSTER=sessionCluster >> /etc/ecs/ecs.config"));
    }
}
