//! Service descriptors for the three session containers.

use crate::naming::logical_id;
use crate::network::Protocol;
use crate::storage::CONTAINER_MOUNT_PATH;
use crate::token::Token;
use crate::topology::BuildParams;
use serde::{Deserialize, Serialize};

/// Environment variable names every container receives.
pub const ENV_STORAGE_MOUNT_ID: &str = "EFS_FILE_SYSTEM_ID";
pub const ENV_SERVICE_NAME: &str = "ECS_SERVICE_NAME";
pub const ENV_CLUSTER_NAME: &str = "ECS_CLUSTER_NAME";
pub const ENV_REGION: &str = "AWS_REGION";

/// Log stream prefix for the awslogs driver.
pub const LOG_STREAM_PREFIX: &str = "ecs";

/// The three containers of a session instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    ServiceNode,
    StorageServer,
    OverlayRouter,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [
        ServiceKind::ServiceNode,
        ServiceKind::StorageServer,
        ServiceKind::OverlayRouter,
    ];

    /// Container name before suffixing.
    fn container_base(&self) -> &'static str {
        match self {
            ServiceKind::ServiceNode => "sn-session",
            ServiceKind::StorageServer => "ss-session",
            ServiceKind::OverlayRouter => "lokinet-session",
        }
    }

    fn service_base(&self) -> &'static str {
        match self {
            ServiceKind::ServiceNode => "sessionServiceNode",
            ServiceKind::StorageServer => "sessionStorageServer",
            ServiceKind::OverlayRouter => "sessionOverlayRouter",
        }
    }

    fn family_base(&self) -> &'static str {
        match self {
            ServiceKind::ServiceNode => "session-sn",
            ServiceKind::StorageServer => "session-ss",
            ServiceKind::OverlayRouter => "session-lokinet",
        }
    }

    /// Published ports. Fixed by the container's protocol.
    pub fn ports(&self) -> &'static [(Protocol, u16)] {
        match self {
            ServiceKind::ServiceNode => &[(Protocol::Tcp, 22022), (Protocol::Tcp, 22025)],
            ServiceKind::StorageServer => &[
                (Protocol::Tcp, 22020),
                (Protocol::Udp, 22020),
                (Protocol::Tcp, 22021),
                (Protocol::Udp, 22021),
            ],
            ServiceKind::OverlayRouter => &[(Protocol::Udp, 1090)],
        }
    }

    /// CPU units and memory (MiB). Together they fill one 1 vCPU / 3 GiB slot.
    pub fn allocation(&self) -> (u32, u32) {
        match self {
            ServiceKind::ServiceNode => (512, 1536),
            ServiceKind::StorageServer => (256, 1024),
            ServiceKind::OverlayRouter => (256, 512),
        }
    }

    /// Linux capabilities added to the container.
    pub fn capabilities(&self) -> &'static [&'static str] {
        match self {
            ServiceKind::OverlayRouter => &["NET_ADMIN"],
            _ => &[],
        }
    }

    /// Host devices exposed to the container.
    pub fn devices(&self) -> &'static [&'static str] {
        match self {
            ServiceKind::OverlayRouter => &["/dev/net/tun"],
            _ => &[],
        }
    }

    /// Only the service node keeps the task alive.
    pub fn essential(&self) -> bool {
        matches!(self, ServiceKind::ServiceNode)
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::ServiceNode => write!(f, "service-node"),
            ServiceKind::StorageServer => write!(f, "storage-server"),
            ServiceKind::OverlayRouter => write!(f, "overlay-router"),
        }
    }
}

/// Container images, one per service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceImages {
    #[serde(default = "default_service_node_image")]
    pub service_node: String,
    #[serde(default = "default_storage_server_image")]
    pub storage_server: String,
    #[serde(default = "default_overlay_router_image")]
    pub overlay_router: String,
}

fn default_service_node_image() -> String {
    "b0bl0blawslawbl0g/session-sn-aws".to_string()
}

fn default_storage_server_image() -> String {
    "b0bl0blawslawbl0g/session-ss-aws".to_string()
}

fn default_overlay_router_image() -> String {
    "b0bl0blawslawbl0g/session-lokinet-aws".to_string()
}

impl Default for ServiceImages {
    fn default() -> Self {
        Self {
            service_node: default_service_node_image(),
            storage_server: default_storage_server_image(),
            overlay_router: default_overlay_router_image(),
        }
    }
}

impl ServiceImages {
    pub fn for_kind(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::ServiceNode => &self.service_node,
            ServiceKind::StorageServer => &self.storage_server,
            ServiceKind::OverlayRouter => &self.overlay_router,
        }
    }
}

/// Container port mapping. Host mode networking, so host and container
/// ports are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub port: u16,
    pub protocol: Protocol,
}

/// One ECS service with its task definition and single container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub kind: ServiceKind,
    pub service_name: String,
    pub service_logical_id: String,
    pub task_definition_logical_id: String,
    pub family: String,
    pub container_name: String,
    pub image: String,
    pub cpu: u32,
    pub memory_mib: u32,
    pub essential: bool,
    pub port_mappings: Vec<PortMapping>,
    pub environment: Vec<(String, Token)>,
    pub capabilities: Vec<String>,
    pub devices: Vec<String>,
    pub volume_name: String,
    pub mount_path: String,
    pub desired_count: u32,
}

impl ServiceDescriptor {
    pub fn build(kind: ServiceKind, params: &BuildParams<'_>) -> Self {
        let suffix = &params.names.suffix;
        let service_name = format!("{}{suffix}", kind.service_base());
        let (cpu, memory_mib) = kind.allocation();

        let environment = vec![
            (ENV_STORAGE_MOUNT_ID.to_string(), params.storage_mount.id()),
            (
                ENV_SERVICE_NAME.to_string(),
                Token::literal(service_name.clone()),
            ),
            (
                ENV_CLUSTER_NAME.to_string(),
                Token::literal(params.cluster.name.clone()),
            ),
            (ENV_REGION.to_string(), params.region.clone()),
        ];

        Self {
            kind,
            service_logical_id: logical_id(&service_name),
            task_definition_logical_id: logical_id(&format!(
                "{}TaskDefinition{suffix}",
                kind.service_base()
            )),
            family: format!("{}{suffix}", kind.family_base()),
            container_name: format!("{}{suffix}", kind.container_base()),
            image: params.settings.images.for_kind(kind).to_string(),
            cpu,
            memory_mib,
            essential: kind.essential(),
            port_mappings: kind
                .ports()
                .iter()
                .map(|&(protocol, port)| PortMapping { port, protocol })
                .collect(),
            environment,
            capabilities: kind.capabilities().iter().map(|c| c.to_string()).collect(),
            devices: kind.devices().iter().map(|d| d.to_string()).collect(),
            volume_name: params.names.volume.clone(),
            mount_path: CONTAINER_MOUNT_PATH.to_string(),
            desired_count: params.settings.desired_count,
            service_name,
        }
    }

    /// Look up an environment variable.
    pub fn env(&self, name: &str) -> Option<&Token> {
        self.environment
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// The three services of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSet {
    pub service_node: ServiceDescriptor,
    pub storage_server: ServiceDescriptor,
    pub overlay_router: ServiceDescriptor,
}

impl ServiceSet {
    pub fn build(params: &BuildParams<'_>) -> Self {
        Self {
            service_node: ServiceDescriptor::build(ServiceKind::ServiceNode, params),
            storage_server: ServiceDescriptor::build(ServiceKind::StorageServer, params),
            overlay_router: ServiceDescriptor::build(ServiceKind::OverlayRouter, params),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        [&self.service_node, &self.storage_server, &self.overlay_router].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SERVICE_PORTS;
    use std::collections::BTreeSet;

    #[test]
    fn test_service_ports_are_covered_by_shared_ingress() {
        let declared: BTreeSet<_> = ServiceKind::ALL
            .iter()
            .flat_map(|k| k.ports().iter().copied())
            .collect();
        let shared: BTreeSet<_> = SERVICE_PORTS.iter().copied().collect();
        assert_eq!(declared, shared);
    }

    #[test]
    fn test_allocation_fills_one_slot() {
        let (cpu, memory): (u32, u32) = ServiceKind::ALL
            .iter()
            .map(|k| k.allocation())
            .fold((0, 0), |(c, m), (kc, km)| (c + kc, m + km));
        assert_eq!((cpu, memory), (1024, 3072));
    }

    #[test]
    fn test_only_overlay_router_is_elevated() {
        assert_eq!(ServiceKind::OverlayRouter.capabilities(), &["NET_ADMIN"]);
        assert!(ServiceKind::ServiceNode.capabilities().is_empty());
        assert!(ServiceKind::StorageServer.capabilities().is_empty());
    }

    #[test]
    fn test_default_images() {
        let images = ServiceImages::default();
        assert_eq!(
            images.for_kind(ServiceKind::OverlayRouter),
            "b0bl0blawslawbl0g/session-lokinet-aws"
        );
    }
}
