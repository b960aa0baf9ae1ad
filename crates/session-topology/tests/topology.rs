//! Integration tests for multi-instance topology generation.
//!
//! These tests verify that:
//! 1. Single-instance deployments keep the unsuffixed names
//! 2. Identifiers never collide across instances
//! 3. Every role is scoped to its own storage mount
//! 4. The shared network is emitted once, whatever the instance count

use serde_json::Value;
use session_topology::generator::cloudformation::build_template;
use session_topology::token::Token;
use session_topology::{
    generate, CloudFormationGenerator, StackSettings, TemplateFormat, TemplateGenerator,
    TopologyError, TopologyGenerator,
};
use std::collections::HashSet;

fn resource_ids_of_type(template: &Value, resource_type: &str) -> Vec<String> {
    template["Resources"]
        .as_object()
        .unwrap()
        .iter()
        .filter(|(_, r)| r["Type"] == resource_type)
        .map(|(id, _)| id.clone())
        .collect()
}

#[test]
fn test_single_instance_uses_legacy_names() {
    let description = generate(1).unwrap();
    assert_eq!(description.blueprints.len(), 1);

    let blueprint = &description.blueprints[0];
    assert_eq!(blueprint.index, 1);
    assert_eq!(blueprint.cluster.name, "sessionCluster");
    assert_eq!(blueprint.storage_mount.name, "sessionEfs");
    assert_eq!(blueprint.task_role.name, "sessionTaskRole");
    assert_eq!(blueprint.execution_role.name, "sessionExecutionRole");
    assert_eq!(blueprint.services.service_node.container_name, "sn-session");
    assert_eq!(blueprint.services.storage_server.container_name, "ss-session");
    assert_eq!(
        blueprint.services.overlay_router.container_name,
        "lokinet-session"
    );
}

#[test]
fn test_three_instances_are_suffixed() {
    let description = generate(3).unwrap();
    assert_eq!(description.blueprints.len(), 3);

    let clusters: Vec<_> = description
        .blueprints
        .iter()
        .map(|b| b.cluster.name.as_str())
        .collect();
    assert_eq!(
        clusters,
        vec!["sessionCluster", "sessionCluster-2", "sessionCluster-3"]
    );

    for blueprint in &description.blueprints[1..] {
        let suffix = format!("-{}", blueprint.index);
        assert!(blueprint.storage_mount.name.ends_with(&suffix));
        assert!(blueprint.task_role.name.ends_with(&suffix));
        assert!(blueprint.execution_role.name.ends_with(&suffix));
        assert!(blueprint.log_group.name.ends_with(&suffix));
        for service in blueprint.services.iter() {
            assert!(service.service_name.ends_with(&suffix));
            assert!(service.container_name.ends_with(&suffix));
            assert!(service.family.ends_with(&suffix));
            assert!(service
                .task_definition_logical_id
                .ends_with(&blueprint.index.to_string()));
        }
    }
}

#[test]
fn test_identifiers_pairwise_distinct() {
    for count in [2, 3, 11, 25] {
        let description = generate(count).unwrap();
        let mut seen = HashSet::new();
        for blueprint in &description.blueprints {
            for id in blueprint.identifiers() {
                assert!(seen.insert(id.clone()), "{id} repeated for count {count}");
            }
        }
    }
}

#[test]
fn test_roles_scoped_to_own_storage_mount() {
    let settings = StackSettings {
        backup_bucket: Some("session-backups".to_string()),
        ..Default::default()
    };
    let description = TopologyGenerator::new("SessionStack", settings)
        .generate(4)
        .unwrap();

    for blueprint in &description.blueprints {
        let own = blueprint.storage_mount.logical_id.as_str();
        for role in [&blueprint.task_role, &blueprint.execution_role] {
            let targets: HashSet<_> = role.policy_resources().filter_map(Token::target).collect();
            assert_eq!(targets, HashSet::from([own]), "{} leaks access", role.name);

            let storage_arns: Vec<_> = role
                .policy_resources()
                .filter(|t| matches!(t, Token::GetAtt { .. }))
                .collect();
            assert_eq!(storage_arns, vec![&blueprint.storage_mount.arn()]);
        }
    }
}

#[test]
fn test_backup_archive_shared_by_all_instances() {
    let settings = StackSettings {
        backup_bucket: Some("session-backups".to_string()),
        ..Default::default()
    };
    let description = TopologyGenerator::new("SessionStack", settings)
        .generate(2)
        .unwrap();

    for blueprint in &description.blueprints {
        let literals: Vec<_> = blueprint
            .execution_role
            .policy_resources()
            .filter_map(|t| match t {
                Token::Literal(s) if s.starts_with("arn:aws:s3") => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            literals,
            vec!["arn:aws:s3:::session-backups", "arn:aws:s3:::session-backups/*"]
        );
    }
}

#[test]
fn test_shared_ingress_invariant_under_instance_count() {
    let one = generate(1).unwrap();
    for count in [2, 5, 9] {
        let many = generate(count).unwrap();
        assert_eq!(many.network, one.network);
        assert_eq!(many.network.service_security_group.ingress.len(), 7);
    }
}

#[test]
fn test_network_emitted_once() {
    let template = build_template(&generate(3).unwrap()).unwrap();

    assert_eq!(resource_ids_of_type(&template, "AWS::EC2::VPC"), vec!["sessionVpc"]);
    assert_eq!(resource_ids_of_type(&template, "AWS::ECS::Cluster").len(), 3);
    assert_eq!(resource_ids_of_type(&template, "AWS::EFS::FileSystem").len(), 3);
    assert_eq!(resource_ids_of_type(&template, "AWS::ECS::Service").len(), 9);

    // One shared service group plus one storage group per instance.
    let groups = resource_ids_of_type(&template, "AWS::EC2::SecurityGroup");
    assert_eq!(groups.len(), 4);
    let with_seven_rules: Vec<_> = groups
        .iter()
        .filter(|id| {
            template["Resources"][id.as_str()]["Properties"]["SecurityGroupIngress"]
                .as_array()
                .map(|rules| rules.len() == 7)
                .unwrap_or(false)
        })
        .collect();
    assert_eq!(with_seven_rules, vec!["sessionEcsSecurityGroup"]);
}

#[test]
fn test_logical_ids_alphanumeric() {
    let template = build_template(&generate(12).unwrap()).unwrap();
    for id in template["Resources"].as_object().unwrap().keys() {
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()), "{id}");
    }
}

#[test]
fn test_invalid_counts_rejected() {
    for count in [0, -1, -100] {
        assert!(matches!(
            generate(count),
            Err(TopologyError::InvalidTopologyRequest(_))
        ));
    }
}

#[test]
fn test_generation_is_deterministic() {
    let generator = CloudFormationGenerator::new(TemplateFormat::Json);
    let first = generator.generate(&generate(3).unwrap()).unwrap();
    let second = generator.generate(&generate(3).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_security_findings_per_instance() {
    let description = generate(2).unwrap();
    assert_eq!(
        description.security_findings(),
        vec![
            "sessionEfs: resource policy allows all actions to any principal",
            "sessionEfs-2: resource policy allows all actions to any principal",
        ]
    );
}
