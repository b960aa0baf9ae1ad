//! EFS storage mount shared by an instance's containers.

use crate::iam::{PolicyDocument, PolicyStatement, Principal};
use crate::naming::{logical_id, ResourceNames};
use crate::network::{NetworkContext, Peer, Rule, SecurityGroup};
use crate::token::Token;

/// Path the storage mount appears at inside every container.
pub const CONTAINER_MOUNT_PATH: &str = "/efs";

/// One instance's EFS filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageMount {
    pub name: String,
    pub logical_id: String,
    pub security_group: SecurityGroup,
    /// Resource policy attached to the filesystem.
    ///
    /// Grants every action to every principal. Kept as deployed; see
    /// [`StorageMount::security_findings`].
    pub resource_policy: PolicyDocument,
}

impl StorageMount {
    pub fn new(names: &ResourceNames, network: &NetworkContext) -> Self {
        Self {
            name: names.storage_mount.clone(),
            logical_id: logical_id(&names.storage_mount),
            security_group: SecurityGroup {
                logical_id: logical_id(&names.storage_security_group),
                description: format!("NFS access to {}", names.storage_mount),
                ingress: vec![network.storage_mount_ingress()],
                egress: vec![Rule::all_traffic(Peer::AnyIpv4)],
            },
            resource_policy: PolicyDocument::new(vec![
                PolicyStatement::allow(&["*"], Vec::new()).with_principal(Principal::Any)
            ]),
        }
    }

    /// Filesystem ID, resolved at deploy time.
    pub fn id(&self) -> Token {
        Token::reference(&self.logical_id)
    }

    pub fn arn(&self) -> Token {
        Token::attr(&self.logical_id, "Arn")
    }

    /// Logical ID of the mount target in the given subnet.
    pub fn mount_target_id(&self, subnet_logical_id: &str) -> String {
        format!("{}MountTarget{}", self.logical_id, subnet_logical_id)
    }

    /// Over-broad grants in the resource policy, one line each.
    pub fn security_findings(&self) -> Vec<String> {
        self.resource_policy
            .statements
            .iter()
            .filter(|s| s.is_unrestricted())
            .map(|_| {
                format!(
                    "{}: resource policy allows all actions to any principal",
                    self.name
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::DEFAULT_VPC_CIDR;

    #[test]
    fn test_storage_mount_names() {
        let network = NetworkContext::new(DEFAULT_VPC_CIDR, 1).unwrap();
        let mount = StorageMount::new(&ResourceNames::for_index(2), &network);

        assert_eq!(mount.name, "sessionEfs-2");
        assert_eq!(mount.logical_id, "sessionEfs2");
        assert_eq!(mount.security_group.logical_id, "sessionEfsSecurityGroup2");
        assert_eq!(mount.arn(), Token::attr("sessionEfs2", "Arn"));
        assert_eq!(mount.id(), Token::reference("sessionEfs2"));
    }

    #[test]
    fn test_storage_ingress_only_from_vpc() {
        let network = NetworkContext::new(DEFAULT_VPC_CIDR, 1).unwrap();
        let mount = StorageMount::new(&ResourceNames::for_index(1), &network);

        assert_eq!(
            mount.security_group.ingress,
            vec![Rule::tcp(Peer::Cidr("10.0.69.0/24".to_string()), 2049)]
        );
    }

    #[test]
    fn test_permissive_policy_is_reported() {
        let network = NetworkContext::new(DEFAULT_VPC_CIDR, 1).unwrap();
        let mount = StorageMount::new(&ResourceNames::for_index(1), &network);

        assert!(mount.resource_policy.statements[0].is_unrestricted());
        assert_eq!(
            mount.security_findings(),
            vec!["sessionEfs: resource policy allows all actions to any principal"]
        );
    }
}
