//! IAM roles and policy documents for one instance.
//!
//! Roles are declared without a physical `RoleName`: IAM names are
//! account-global and the same instance index is deployed to several regions.
//! The derived name is used as the construct identity and logical ID only.

use crate::cluster::CONTAINER_INSTANCE_POLICY_ARN;
use crate::naming::logical_id;
use crate::token::Token;
use serde_json::{json, Value};

pub const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
pub const EC2_PRINCIPAL: &str = "ec2.amazonaws.com";

pub const TASK_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

/// Actions a container needs to mount and write the storage mount.
pub const STORAGE_MOUNT_ACTIONS: [&str; 2] = [
    "elasticfilesystem:ClientMount",
    "elasticfilesystem:ClientWrite",
];

/// Cluster introspection used by containers to discover their peers.
pub const CLUSTER_INTROSPECTION_ACTIONS: [&str; 3] = [
    "ecs:ListTasks",
    "ecs:DescribeTasks",
    "ec2:DescribeNetworkInterfaces",
];

/// Read-only access to the backup archive.
pub const BACKUP_READ_ACTIONS: [&str; 2] = ["s3:GetObject", "s3:ListBucket"];

/// Who a statement applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Any principal (`*`).
    Any,
    Service(String),
}

impl Principal {
    fn to_cfn(&self) -> Value {
        match self {
            Principal::Any => json!({ "AWS": "*" }),
            Principal::Service(service) => json!({ "Service": service }),
        }
    }
}

/// A single `Allow` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    pub sid: Option<String>,
    pub principal: Option<Principal>,
    pub actions: Vec<String>,
    /// Empty for resource policies, which apply to the owning resource.
    pub resources: Vec<Token>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: Vec<Token>) -> Self {
        Self {
            sid: None,
            principal: None,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
        }
    }

    pub fn with_sid(mut self, sid: &str) -> Self {
        self.sid = Some(sid.to_string());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Whether this statement grants every action to every principal.
    pub fn is_unrestricted(&self) -> bool {
        self.principal == Some(Principal::Any) && self.actions.iter().any(|a| a == "*")
    }

    pub fn to_cfn(&self) -> Value {
        let mut statement = json!({
            "Effect": "Allow",
            "Action": self.actions,
        });
        if let Some(sid) = &self.sid {
            statement["Sid"] = json!(sid);
        }
        if let Some(principal) = &self.principal {
            statement["Principal"] = principal.to_cfn();
        }
        if !self.resources.is_empty() {
            let resources: Vec<Value> = self.resources.iter().map(Token::to_cfn).collect();
            statement["Resource"] = if resources.len() == 1 {
                resources[0].clone()
            } else {
                Value::Array(resources)
            };
        }
        statement
    }
}

/// A policy document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self { statements }
    }

    /// Every resource token referenced by any statement.
    pub fn resources(&self) -> impl Iterator<Item = &Token> {
        self.statements.iter().flat_map(|s| s.resources.iter())
    }

    pub fn to_cfn(&self) -> Value {
        json!({
            "Version": "2012-10-17",
            "Statement": self.statements.iter().map(PolicyStatement::to_cfn).collect::<Vec<_>>(),
        })
    }
}

/// An IAM role with inline policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub logical_id: String,
    pub assumed_by: String,
    pub inline_policies: Vec<(String, PolicyDocument)>,
    pub managed_policy_arns: Vec<String>,
}

impl Role {
    fn new(name: &str, assumed_by: &str) -> Self {
        Self {
            name: name.to_string(),
            logical_id: logical_id(name),
            assumed_by: assumed_by.to_string(),
            inline_policies: Vec::new(),
            managed_policy_arns: Vec::new(),
        }
    }

    pub fn arn(&self) -> Token {
        Token::attr(&self.logical_id, "Arn")
    }

    /// Every resource token referenced by the role's inline policies.
    pub fn policy_resources(&self) -> impl Iterator<Item = &Token> {
        self.inline_policies.iter().flat_map(|(_, doc)| doc.resources())
    }

    pub fn assume_role_policy(&self) -> Value {
        PolicyDocument::new(vec![PolicyStatement {
            sid: None,
            principal: Some(Principal::Service(self.assumed_by.clone())),
            actions: vec!["sts:AssumeRole".to_string()],
            resources: Vec::new(),
        }])
        .to_cfn()
    }
}

/// ARNs of the backup archive bucket and its objects.
pub fn backup_bucket_arns(bucket: &str) -> Vec<Token> {
    vec![
        Token::literal(format!("arn:aws:s3:::{bucket}")),
        Token::literal(format!("arn:aws:s3:::{bucket}/*")),
    ]
}

fn shared_statements(backup_bucket: Option<&str>) -> Vec<PolicyStatement> {
    let mut statements = vec![PolicyStatement::allow(
        &CLUSTER_INTROSPECTION_ACTIONS,
        vec![Token::literal("*")],
    )
    .with_sid("ClusterIntrospection")];

    if let Some(bucket) = backup_bucket {
        statements.push(
            PolicyStatement::allow(&BACKUP_READ_ACTIONS, backup_bucket_arns(bucket))
                .with_sid("BackupArchiveRead"),
        );
    }
    statements
}

/// Role assumed by the running containers.
///
/// Full filesystem access, but only on this instance's storage mount.
pub fn task_role(
    name: &str,
    policy_name: &str,
    storage_mount_arn: &Token,
    backup_bucket: Option<&str>,
) -> Role {
    let mut statements = vec![PolicyStatement::allow(
        &["elasticfilesystem:*"],
        vec![storage_mount_arn.clone()],
    )
    .with_sid("StorageMountAccess")];
    statements.extend(shared_statements(backup_bucket));

    let mut role = Role::new(name, ECS_TASKS_PRINCIPAL);
    role.inline_policies
        .push((policy_name.to_string(), PolicyDocument::new(statements)));
    role
}

/// Role ECS uses to pull images, write logs and mount the storage.
pub fn execution_role(
    name: &str,
    policy_name: &str,
    storage_mount_arn: &Token,
    backup_bucket: Option<&str>,
) -> Role {
    let mut statements = vec![PolicyStatement::allow(
        &STORAGE_MOUNT_ACTIONS,
        vec![storage_mount_arn.clone()],
    )
    .with_sid("StorageMountClient")];
    statements.extend(shared_statements(backup_bucket));

    let mut role = Role::new(name, ECS_TASKS_PRINCIPAL);
    role.inline_policies
        .push((policy_name.to_string(), PolicyDocument::new(statements)));
    role.managed_policy_arns
        .push(TASK_EXECUTION_POLICY_ARN.to_string());
    role
}

/// Role of the EC2 container instances.
pub fn instance_role(name: &str) -> Role {
    let mut role = Role::new(name, EC2_PRINCIPAL);
    role.managed_policy_arns
        .push(CONTAINER_INSTANCE_POLICY_ARN.to_string());
    role
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_role_scoped_to_storage_mount() {
        let arn = Token::attr("sessionEfs2", "Arn");
        let role = execution_role("sessionExecutionRole-2", "sessionRole-2", &arn, None);

        assert_eq!(role.logical_id, "sessionExecutionRole2");
        let targets: Vec<_> = role.policy_resources().filter_map(Token::target).collect();
        assert_eq!(targets, vec!["sessionEfs2"]);
        assert_eq!(role.managed_policy_arns, vec![TASK_EXECUTION_POLICY_ARN]);
    }

    #[test]
    fn test_backup_statement_is_read_only() {
        let arn = Token::attr("sessionEfs", "Arn");
        let role = task_role("sessionTaskRole", "sessionRole", &arn, Some("session-backups"));
        let (_, doc) = &role.inline_policies[0];

        let backup = doc
            .statements
            .iter()
            .find(|s| s.sid.as_deref() == Some("BackupArchiveRead"))
            .expect("backup statement");
        assert_eq!(backup.actions, vec!["s3:GetObject", "s3:ListBucket"]);
        assert_eq!(
            backup.resources,
            vec![
                Token::literal("arn:aws:s3:::session-backups"),
                Token::literal("arn:aws:s3:::session-backups/*"),
            ]
        );
    }

    #[test]
    fn test_no_backup_statement_without_bucket() {
        let arn = Token::attr("sessionEfs", "Arn");
        let role = task_role("sessionTaskRole", "sessionRole", &arn, None);
        let (_, doc) = &role.inline_policies[0];
        assert_eq!(doc.statements.len(), 2);
    }

    #[test]
    fn test_statement_to_cfn() {
        let statement = PolicyStatement::allow(
            &STORAGE_MOUNT_ACTIONS,
            vec![Token::attr("sessionEfs", "Arn")],
        );
        assert_eq!(
            statement.to_cfn(),
            json!({
                "Effect": "Allow",
                "Action": ["elasticfilesystem:ClientMount", "elasticfilesystem:ClientWrite"],
                "Resource": { "Fn::GetAtt": ["sessionEfs", "Arn"] },
            })
        );
    }

    #[test]
    fn test_assume_role_policy() {
        let role = instance_role("sessionInstanceRole");
        let policy = role.assume_role_policy();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            json!("ec2.amazonaws.com")
        );
        assert_eq!(policy["Statement"][0]["Action"], json!(["sts:AssumeRole"]));
    }

    #[test]
    fn test_unrestricted_statement() {
        let statement = PolicyStatement::allow(&["*"], vec![]).with_principal(Principal::Any);
        assert!(statement.is_unrestricted());
        assert!(!PolicyStatement::allow(&["*"], vec![]).is_unrestricted());
    }
}
