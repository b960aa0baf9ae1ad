//! CloudFormation template generator.
//!
//! Resources are emitted in dependency order: the shared network first, then
//! for each instance its cluster and capacity, storage mount, roles, log
//! group and services.

use super::TemplateGenerator;
use crate::cluster::{ClusterRef, ECS_AMI_PARAMETER};
use crate::iam::Role;
use crate::network::{NetworkContext, Rule, SecurityGroup};
use crate::service::{ServiceDescriptor, ENV_REGION, LOG_STREAM_PREFIX};
use crate::storage::StorageMount;
use crate::token::Token;
use crate::topology::{DeploymentDescription, InstanceBlueprint, LogGroup};
use anyhow::{bail, Result};
use serde_json::{json, Map, Value};

/// Output encoding of the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "json",
            TemplateFormat::Yaml => "yaml",
        }
    }
}

/// Generator for CloudFormation templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudFormationGenerator {
    pub format: TemplateFormat,
}

impl CloudFormationGenerator {
    pub fn new(format: TemplateFormat) -> Self {
        Self { format }
    }
}

impl TemplateGenerator for CloudFormationGenerator {
    fn generate(&self, description: &DeploymentDescription) -> Result<String> {
        let template = build_template(description)?;
        let rendered = match self.format {
            TemplateFormat::Json => serde_json::to_string_pretty(&template)?,
            TemplateFormat::Yaml => serde_yaml::to_string(&template)?,
        };
        Ok(rendered)
    }

    fn filename(&self, description: &DeploymentDescription) -> String {
        format!(
            "{}.template.{}",
            description.stack_name,
            self.format.extension()
        )
    }
}

/// Ordered resource map under construction.
///
/// Logical IDs seen twice are collected instead of overwriting the earlier
/// resource, and reported once the template is complete.
#[derive(Default)]
struct Resources {
    map: Map<String, Value>,
    duplicates: Vec<String>,
}

impl Resources {
    fn insert(&mut self, logical_id: &str, resource: Value) {
        if self.map.insert(logical_id.to_string(), resource).is_some() {
            self.duplicates.push(logical_id.to_string());
        }
    }

    fn add(&mut self, logical_id: &str, resource_type: &str, properties: Value) {
        self.insert(
            logical_id,
            json!({ "Type": resource_type, "Properties": properties }),
        );
    }

    fn add_with_deps(
        &mut self,
        logical_id: &str,
        resource_type: &str,
        properties: Value,
        depends_on: &[&str],
    ) {
        self.insert(
            logical_id,
            json!({
                "Type": resource_type,
                "DependsOn": depends_on,
                "Properties": properties,
            }),
        );
    }
}

/// Build the CloudFormation template as a JSON value.
///
/// Fails if two resources share a logical ID.
pub fn build_template(description: &DeploymentDescription) -> Result<Value> {
    let mut resources = Resources::default();
    let mut outputs = Map::new();

    add_network(&mut resources, &description.network);

    for blueprint in &description.blueprints {
        add_instance(&mut resources, &description.network, blueprint);

        outputs.insert(
            format!("{}Name", blueprint.cluster.logical_id),
            json!({ "Value": blueprint.cluster.name }),
        );
        outputs.insert(
            format!("{}Id", blueprint.storage_mount.logical_id),
            json!({ "Value": blueprint.storage_mount.id().to_cfn() }),
        );
    }

    if !resources.duplicates.is_empty() {
        bail!(
            "Duplicate logical IDs in stack {}: {}",
            description.stack_name,
            resources.duplicates.join(", ")
        );
    }

    Ok(json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Description": format!(
            "Session deployment {} ({} instance{})",
            description.stack_name,
            description.instance_count(),
            if description.instance_count() == 1 { "" } else { "s" },
        ),
        "Resources": Value::Object(resources.map),
        "Outputs": Value::Object(outputs),
    }))
}

fn rule_to_cfn(rule: &Rule) -> Value {
    let mut value = json!({
        "CidrIp": rule.peer.cidr(),
        "IpProtocol": rule.protocol.ip_protocol(),
        "Description": rule.describe(),
    });
    if let Some(port) = rule.port {
        value["FromPort"] = json!(port);
        value["ToPort"] = json!(port);
    }
    value
}

fn security_group_to_cfn(group: &SecurityGroup, vpc_id: &str) -> Value {
    json!({
        "GroupDescription": group.description,
        "VpcId": { "Ref": vpc_id },
        "SecurityGroupIngress": group.ingress.iter().map(rule_to_cfn).collect::<Vec<_>>(),
        "SecurityGroupEgress": group.egress.iter().map(rule_to_cfn).collect::<Vec<_>>(),
    })
}

fn add_network(resources: &mut Resources, network: &NetworkContext) {
    let vpc = &network.vpc_logical_id;
    let igw = format!("{vpc}IGW");
    let attachment = format!("{vpc}VPCGW");

    resources.add(
        vpc,
        "AWS::EC2::VPC",
        json!({
            "CidrBlock": network.cidr.to_string(),
            "EnableDnsSupport": network.enable_dns_support,
            "EnableDnsHostnames": true,
            "Tags": [{ "Key": "Name", "Value": network.vpc_name }],
        }),
    );
    resources.add(
        &igw,
        "AWS::EC2::InternetGateway",
        json!({ "Tags": [{ "Key": "Name", "Value": network.vpc_name }] }),
    );
    resources.add(
        &attachment,
        "AWS::EC2::VPCGatewayAttachment",
        json!({ "VpcId": { "Ref": vpc }, "InternetGatewayId": { "Ref": igw } }),
    );

    for (az, (subnet, cidr)) in network
        .subnet_logical_ids()
        .iter()
        .zip(&network.subnets)
        .enumerate()
    {
        let route_table = format!("{subnet}RouteTable");
        resources.add(
            subnet,
            "AWS::EC2::Subnet",
            json!({
                "VpcId": { "Ref": vpc },
                "CidrBlock": cidr.to_string(),
                "AvailabilityZone": { "Fn::Select": [az, { "Fn::GetAZs": "" }] },
                "MapPublicIpOnLaunch": true,
                "Tags": [{ "Key": "Name", "Value": format!("{}/{subnet}", network.vpc_name) }],
            }),
        );
        resources.add(
            &route_table,
            "AWS::EC2::RouteTable",
            json!({ "VpcId": { "Ref": vpc } }),
        );
        resources.add(
            &format!("{subnet}RouteTableAssociation"),
            "AWS::EC2::SubnetRouteTableAssociation",
            json!({ "RouteTableId": { "Ref": route_table }, "SubnetId": { "Ref": subnet } }),
        );
        resources.add_with_deps(
            &format!("{subnet}DefaultRoute"),
            "AWS::EC2::Route",
            json!({
                "RouteTableId": { "Ref": route_table },
                "DestinationCidrBlock": "0.0.0.0/0",
                "GatewayId": { "Ref": igw },
            }),
            &[attachment.as_str()],
        );
    }

    let group = &network.service_security_group;
    resources.add(
        &group.logical_id,
        "AWS::EC2::SecurityGroup",
        security_group_to_cfn(group, vpc),
    );
}

fn subnet_refs(network: &NetworkContext) -> Vec<Value> {
    network
        .subnet_logical_ids()
        .iter()
        .map(|id| json!({ "Ref": id }))
        .collect()
}

fn association_id(cluster: &ClusterRef) -> String {
    format!("{}CapacityProviderAssociations", cluster.logical_id)
}

fn add_instance(resources: &mut Resources, network: &NetworkContext, blueprint: &InstanceBlueprint) {
    add_cluster(resources, network, &blueprint.cluster, &blueprint.instance_role);
    add_storage_mount(resources, network, &blueprint.storage_mount);
    add_role(resources, &blueprint.task_role);
    add_role(resources, &blueprint.execution_role);
    add_log_group(resources, &blueprint.log_group);
    for service in blueprint.services.iter() {
        add_service(resources, blueprint, service);
    }
}

fn add_cluster(
    resources: &mut Resources,
    network: &NetworkContext,
    cluster: &ClusterRef,
    instance_role: &Role,
) {
    let capacity = &cluster.capacity;

    resources.add(
        &cluster.logical_id,
        "AWS::ECS::Cluster",
        json!({ "ClusterName": cluster.name }),
    );
    add_role(resources, instance_role);
    resources.add(
        &capacity.instance_profile_id,
        "AWS::IAM::InstanceProfile",
        json!({ "Roles": [{ "Ref": instance_role.logical_id }] }),
    );
    resources.add(
        &capacity.launch_template_id,
        "AWS::EC2::LaunchTemplate",
        json!({
            "LaunchTemplateData": {
                "ImageId": format!("{{{{resolve:ssm:{ECS_AMI_PARAMETER}}}}}"),
                "InstanceType": capacity.instance_type,
                "IamInstanceProfile": {
                    "Arn": { "Fn::GetAtt": [capacity.instance_profile_id, "Arn"] }
                },
                "SecurityGroupIds": [
                    { "Fn::GetAtt": [network.service_security_group.logical_id, "GroupId"] }
                ],
                "UserData": { "Fn::Base64": capacity.user_data(&cluster.name) },
            }
        }),
    );
    resources.add(
        &capacity.auto_scaling_group_id,
        "AWS::AutoScaling::AutoScalingGroup",
        json!({
            "MinSize": "0",
            "MaxSize": capacity.desired_capacity.to_string(),
            "DesiredCapacity": capacity.desired_capacity.to_string(),
            "VPCZoneIdentifier": subnet_refs(network),
            "LaunchTemplate": {
                "LaunchTemplateId": { "Ref": capacity.launch_template_id },
                "Version": { "Fn::GetAtt": [capacity.launch_template_id, "LatestVersionNumber"] },
            },
        }),
    );
    resources.add(
        &capacity.capacity_provider_id,
        "AWS::ECS::CapacityProvider",
        json!({
            "Name": capacity.capacity_provider_name,
            "AutoScalingGroupProvider": {
                "AutoScalingGroupArn": { "Ref": capacity.auto_scaling_group_id },
                "ManagedTerminationProtection": "DISABLED",
            },
        }),
    );
    resources.add(
        &association_id(cluster),
        "AWS::ECS::ClusterCapacityProviderAssociations",
        json!({
            "Cluster": { "Ref": cluster.logical_id },
            "CapacityProviders": [{ "Ref": capacity.capacity_provider_id }],
            "DefaultCapacityProviderStrategy": [
                { "CapacityProvider": { "Ref": capacity.capacity_provider_id }, "Weight": 1 }
            ],
        }),
    );
}

fn add_storage_mount(resources: &mut Resources, network: &NetworkContext, mount: &StorageMount) {
    let group = &mount.security_group;
    resources.add(
        &group.logical_id,
        "AWS::EC2::SecurityGroup",
        security_group_to_cfn(group, &network.vpc_logical_id),
    );
    resources.add(
        &mount.logical_id,
        "AWS::EFS::FileSystem",
        json!({
            "Encrypted": true,
            "FileSystemPolicy": mount.resource_policy.to_cfn(),
            "FileSystemTags": [{ "Key": "Name", "Value": mount.name }],
        }),
    );
    for subnet in network.subnet_logical_ids() {
        resources.add(
            &mount.mount_target_id(&subnet),
            "AWS::EFS::MountTarget",
            json!({
                "FileSystemId": mount.id().to_cfn(),
                "SubnetId": { "Ref": subnet },
                "SecurityGroups": [{ "Fn::GetAtt": [group.logical_id, "GroupId"] }],
            }),
        );
    }
}

fn add_role(resources: &mut Resources, role: &Role) {
    let mut properties = json!({
        "AssumeRolePolicyDocument": role.assume_role_policy(),
    });
    if !role.inline_policies.is_empty() {
        properties["Policies"] = role
            .inline_policies
            .iter()
            .map(|(name, doc)| json!({ "PolicyName": name, "PolicyDocument": doc.to_cfn() }))
            .collect();
    }
    if !role.managed_policy_arns.is_empty() {
        properties["ManagedPolicyArns"] = json!(role.managed_policy_arns);
    }
    resources.add(&role.logical_id, "AWS::IAM::Role", properties);
}

fn add_log_group(resources: &mut Resources, log_group: &LogGroup) {
    resources.add(
        &log_group.logical_id,
        "AWS::Logs::LogGroup",
        json!({
            "LogGroupName": log_group.name,
            "RetentionInDays": log_group.retention_days,
        }),
    );
}

fn container_definition(blueprint: &InstanceBlueprint, service: &ServiceDescriptor) -> Value {
    let region = service
        .env(ENV_REGION)
        .cloned()
        .unwrap_or_else(Token::region);

    let mut container = json!({
        "Name": service.container_name,
        "Image": service.image,
        "Essential": service.essential,
        "Privileged": false,
        "Cpu": service.cpu,
        "Memory": service.memory_mib,
        "PortMappings": service.port_mappings.iter().map(|m| json!({
            "ContainerPort": m.port,
            "HostPort": m.port,
            "Protocol": m.protocol.ip_protocol(),
        })).collect::<Vec<_>>(),
        "Environment": service.environment.iter().map(|(name, value)| json!({
            "Name": name,
            "Value": value.to_cfn(),
        })).collect::<Vec<_>>(),
        "MountPoints": [{
            "SourceVolume": service.volume_name,
            "ContainerPath": service.mount_path,
            "ReadOnly": false,
        }],
        "LogConfiguration": {
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-group": { "Ref": blueprint.log_group.logical_id },
                "awslogs-stream-prefix": LOG_STREAM_PREFIX,
                "awslogs-region": region.to_cfn(),
            },
        },
    });

    if !service.capabilities.is_empty() || !service.devices.is_empty() {
        container["LinuxParameters"] = json!({
            "Capabilities": { "Add": service.capabilities },
            "Devices": service.devices.iter().map(|d| json!({
                "HostPath": d,
                "ContainerPath": d,
                "Permissions": ["read", "write", "mknod"],
            })).collect::<Vec<_>>(),
        });
    }
    container
}

fn add_service(resources: &mut Resources, blueprint: &InstanceBlueprint, service: &ServiceDescriptor) {
    let cluster = &blueprint.cluster;

    resources.add(
        &service.task_definition_logical_id,
        "AWS::ECS::TaskDefinition",
        json!({
            "Family": service.family,
            "NetworkMode": "host",
            "RequiresCompatibilities": ["EC2"],
            "Cpu": service.cpu.to_string(),
            "Memory": service.memory_mib.to_string(),
            "TaskRoleArn": blueprint.task_role.arn().to_cfn(),
            "ExecutionRoleArn": blueprint.execution_role.arn().to_cfn(),
            "Volumes": [{
                "Name": service.volume_name,
                "EFSVolumeConfiguration": {
                    "FilesystemId": blueprint.storage_mount.id().to_cfn(),
                    "RootDirectory": "/",
                },
            }],
            "ContainerDefinitions": [container_definition(blueprint, service)],
        }),
    );
    resources.add_with_deps(
        &service.service_logical_id,
        "AWS::ECS::Service",
        json!({
            "Cluster": { "Ref": cluster.logical_id },
            "ServiceName": service.service_name,
            "TaskDefinition": { "Ref": service.task_definition_logical_id },
            "DesiredCount": service.desired_count,
            "CapacityProviderStrategy": [
                { "CapacityProvider": { "Ref": cluster.capacity.capacity_provider_id }, "Weight": 1 }
            ],
        }),
        &[association_id(cluster).as_str()],
    );
}
