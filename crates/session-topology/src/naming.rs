//! Identifier derivation for per-instance resources.
//!
//! Every name a blueprint carries goes through [`suffix`], so uniqueness
//! across instances holds by construction: index 1 keeps the legacy
//! unsuffixed names, every other index gets `-{i}`.

/// Prefix shared by every derived identifier.
pub const PREFIX: &str = "session";

/// Naming suffix for instance `index` (1-based).
pub fn suffix(index: u32) -> String {
    if index <= 1 {
        String::new()
    } else {
        format!("-{index}")
    }
}

/// Convert a derived name into a CloudFormation logical ID.
///
/// Logical IDs must be alphanumeric, so separators are dropped:
/// `sessionCluster-2` becomes `sessionCluster2`.
pub fn logical_id(name: &str) -> String {
    name.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// All identifiers derived for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub suffix: String,
    pub cluster: String,
    pub storage_mount: String,
    pub storage_security_group: String,
    pub task_role: String,
    pub execution_role: String,
    pub instance_role: String,
    pub instance_profile: String,
    pub launch_template: String,
    pub auto_scaling_group: String,
    pub capacity_provider: String,
    pub log_group: String,
    pub volume: String,
    /// Inline policy name shared by task and execution role. Roles are
    /// distinct resources, so the policy name only needs to be unique per role.
    pub role_policy: String,
}

impl ResourceNames {
    pub fn for_index(index: u32) -> Self {
        let s = suffix(index);
        Self {
            cluster: format!("{PREFIX}Cluster{s}"),
            storage_mount: format!("{PREFIX}Efs{s}"),
            storage_security_group: format!("{PREFIX}EfsSecurityGroup{s}"),
            task_role: format!("{PREFIX}TaskRole{s}"),
            execution_role: format!("{PREFIX}ExecutionRole{s}"),
            instance_role: format!("{PREFIX}InstanceRole{s}"),
            instance_profile: format!("{PREFIX}InstanceProfile{s}"),
            launch_template: format!("{PREFIX}LaunchTemplate{s}"),
            auto_scaling_group: format!("{PREFIX}AutoScalingGroup{s}"),
            capacity_provider: format!("{PREFIX}CapacityProvider{s}"),
            log_group: format!("{PREFIX}LogGroup{s}"),
            volume: format!("efsVolume{s}"),
            role_policy: format!("{PREFIX}Role{s}"),
            suffix: s,
        }
    }

    /// Every name that must be unique across the whole deployment.
    ///
    /// `volume` and `role_policy` are scoped to a single task definition or
    /// role and are left out.
    pub fn deployment_scoped(&self) -> Vec<&str> {
        vec![
            self.cluster.as_str(),
            self.storage_mount.as_str(),
            self.storage_security_group.as_str(),
            self.task_role.as_str(),
            self.execution_role.as_str(),
            self.instance_role.as_str(),
            self.instance_profile.as_str(),
            self.launch_template.as_str(),
            self.auto_scaling_group.as_str(),
            self.capacity_provider.as_str(),
            self.log_group.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix() {
        assert_eq!(suffix(1), "");
        assert_eq!(suffix(2), "-2");
        assert_eq!(suffix(17), "-17");
    }

    #[test]
    fn test_legacy_names_for_first_index() {
        let names = ResourceNames::for_index(1);
        assert_eq!(names.cluster, "sessionCluster");
        assert_eq!(names.storage_mount, "sessionEfs");
        assert_eq!(names.task_role, "sessionTaskRole");
        assert_eq!(names.execution_role, "sessionExecutionRole");
        assert_eq!(names.log_group, "sessionLogGroup");
        assert_eq!(names.role_policy, "sessionRole");
    }

    #[test]
    fn test_suffixed_names() {
        let names = ResourceNames::for_index(3);
        assert_eq!(names.cluster, "sessionCluster-3");
        assert_eq!(names.storage_mount, "sessionEfs-3");
        assert_eq!(names.execution_role, "sessionExecutionRole-3");
        assert_eq!(names.volume, "efsVolume-3");
    }

    #[test]
    fn test_logical_id_strips_separators() {
        assert_eq!(logical_id("sessionCluster-2"), "sessionCluster2");
        assert_eq!(logical_id("sn-session-12"), "snsession12");
        assert_eq!(logical_id("sessionVpc"), "sessionVpc");
    }

    #[test]
    fn test_names_within_instance_are_distinct() {
        let names = ResourceNames::for_index(4);
        let scoped = names.deployment_scoped();
        let unique: std::collections::HashSet<_> = scoped.iter().collect();
        assert_eq!(unique.len(), scoped.len());
    }
}
