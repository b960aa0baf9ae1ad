//! Shared network context: VPC, subnets and the service security group.

use crate::error::TopologyError;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// Default VPC address block.
pub const DEFAULT_VPC_CIDR: &str = "10.0.69.0/24";

/// Public subnet mask inside the VPC.
pub const SUBNET_CIDR_MASK: u8 = 28;

/// Prefix lengths EC2 accepts for a VPC block.
pub const VPC_PREFIX_RANGE: std::ops::RangeInclusive<u8> = 16..=28;

/// Port the storage mount (NFS) listens on.
pub const STORAGE_MOUNT_PORT: u16 = 2049;

pub const VPC_NAME: &str = "Session VPC";
pub const VPC_ID: &str = "sessionVpc";
pub const SUBNET_GROUP: &str = "session";
pub const SERVICE_SECURITY_GROUP_ID: &str = "sessionEcsSecurityGroup";

/// Transport protocol of a port rule or mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    /// Every protocol and port; only used for egress.
    All,
}

impl Protocol {
    /// CloudFormation `IpProtocol` value.
    pub fn ip_protocol(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::All => "-1",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::All => write!(f, "ALL"),
        }
    }
}

/// Source or destination of a security group rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Peer {
    AnyIpv4,
    Cidr(String),
}

impl Peer {
    pub fn cidr(&self) -> &str {
        match self {
            Peer::AnyIpv4 => "0.0.0.0/0",
            Peer::Cidr(cidr) => cidr,
        }
    }
}

/// A single ingress or egress rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rule {
    pub peer: Peer,
    pub protocol: Protocol,
    /// `None` for all-traffic rules.
    pub port: Option<u16>,
}

impl Rule {
    pub fn tcp(peer: Peer, port: u16) -> Self {
        Self {
            peer,
            protocol: Protocol::Tcp,
            port: Some(port),
        }
    }

    pub fn udp(peer: Peer, port: u16) -> Self {
        Self {
            peer,
            protocol: Protocol::Udp,
            port: Some(port),
        }
    }

    pub fn all_traffic(peer: Peer) -> Self {
        Self {
            peer,
            protocol: Protocol::All,
            port: None,
        }
    }

    pub fn describe(&self) -> String {
        match self.port {
            Some(port) => format!("{} {} from {}", self.protocol, port, self.peer.cidr()),
            None => format!("all traffic to {}", self.peer.cidr()),
        }
    }
}

/// Security group description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub logical_id: String,
    pub description: String,
    pub ingress: Vec<Rule>,
    pub egress: Vec<Rule>,
}

/// Ports any service publishes, as `(protocol, port)`.
///
/// These are protocol constants of the containers, never derived from an
/// instance index.
pub const SERVICE_PORTS: [(Protocol, u16); 7] = [
    (Protocol::Udp, 1090),
    (Protocol::Tcp, 22020),
    (Protocol::Udp, 22020),
    (Protocol::Tcp, 22021),
    (Protocol::Udp, 22021),
    (Protocol::Tcp, 22022),
    (Protocol::Tcp, 22025),
];

/// The single VPC and service security group every instance shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    pub vpc_logical_id: String,
    pub vpc_name: String,
    pub cidr: Ipv4Net,
    pub subnet_group: String,
    pub enable_dns_support: bool,
    /// Public subnet blocks, one per availability zone.
    pub subnets: Vec<Ipv4Net>,
    pub service_security_group: SecurityGroup,
}

/// Parse and validate a VPC block.
///
/// The block must be canonical (no host bits set) with a prefix length in
/// [`VPC_PREFIX_RANGE`].
pub fn parse_vpc_block(cidr: &str) -> Result<Ipv4Net, TopologyError> {
    let net: Ipv4Net = cidr.trim().parse().map_err(|_| {
        TopologyError::InvalidTopologyRequest(format!("VPC block '{cidr}' is not an IPv4 CIDR"))
    })?;
    if net != net.trunc() {
        return Err(TopologyError::InvalidTopologyRequest(format!(
            "VPC block '{cidr}' has host bits set; use '{}'",
            net.trunc()
        )));
    }
    if !VPC_PREFIX_RANGE.contains(&net.prefix_len()) {
        return Err(TopologyError::InvalidTopologyRequest(format!(
            "VPC block '{cidr}' must have a prefix between /{} and /{}",
            VPC_PREFIX_RANGE.start(),
            VPC_PREFIX_RANGE.end()
        )));
    }
    Ok(net)
}

impl NetworkContext {
    /// Build the shared network for `cidr`, with one public subnet in each of
    /// `availability_zones` zones (at least one).
    pub fn new(cidr: &str, availability_zones: u8) -> Result<Self, TopologyError> {
        let cidr = parse_vpc_block(cidr)?;
        let zones = usize::from(availability_zones.max(1));
        let subnets: Vec<Ipv4Net> = cidr
            .subnets(SUBNET_CIDR_MASK)
            .map_err(|e| TopologyError::InvalidTopologyRequest(e.to_string()))?
            .take(zones)
            .collect();
        if subnets.len() < zones {
            return Err(TopologyError::InvalidTopologyRequest(format!(
                "VPC block '{cidr}' cannot hold {zones} /{SUBNET_CIDR_MASK} subnets"
            )));
        }

        let ingress = SERVICE_PORTS
            .iter()
            .map(|&(protocol, port)| Rule {
                peer: Peer::AnyIpv4,
                protocol,
                port: Some(port),
            })
            .collect();

        Ok(Self {
            vpc_logical_id: VPC_ID.to_string(),
            vpc_name: VPC_NAME.to_string(),
            cidr,
            subnet_group: SUBNET_GROUP.to_string(),
            enable_dns_support: true,
            subnets,
            service_security_group: SecurityGroup {
                logical_id: SERVICE_SECURITY_GROUP_ID.to_string(),
                description: "Session service ports".to_string(),
                ingress,
                egress: vec![Rule::all_traffic(Peer::AnyIpv4)],
            },
        })
    }

    /// Logical IDs of the public subnets, one per availability zone.
    pub fn subnet_logical_ids(&self) -> Vec<String> {
        (1..=self.subnets.len())
            .map(|az| format!("{}{}Subnet{az}", self.vpc_logical_id, capitalize(&self.subnet_group)))
            .collect()
    }

    /// Ingress rule for the storage mount: VPC block only, NFS port only.
    pub fn storage_mount_ingress(&self) -> Rule {
        Rule::tcp(Peer::Cidr(self.cidr.to_string()), STORAGE_MOUNT_PORT)
    }

    /// Whether the shared ingress covers `(protocol, port)`.
    pub fn allows(&self, protocol: Protocol, port: u16) -> bool {
        self.service_security_group
            .ingress
            .iter()
            .any(|rule| rule.protocol == protocol && rule.port == Some(port))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
