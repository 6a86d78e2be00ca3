use std::net::{Ipv4Addr, Ipv6Addr};

pub const VPC_CIDR_BLOCK: &str = "10.0.0.0/28";
pub const SUBNET_CIDR_BLOCK: &str = "10.0.0.0/28";
pub const SECURITY_GROUP_NAME: &str = "SSH-ONLY";
pub const SECURITY_GROUP_DESCRIPTION: &str = "Security group for SSH access";
pub const SSH_PORT: i32 = 22;
pub const OPENVPN_PORT: i32 = 1194;
pub const RESOURCE_NAME_TAG: &str = "lazy-vpn";
pub const LAUNCH_ID_TAG_KEY: &str = "lazyvpn:launch-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDestination {
    AnyIpv4,
    AnyIpv6,
}

impl RouteDestination {
    pub fn cidr(self) -> &'static str {
        match self {
            Self::AnyIpv4 => "0.0.0.0/0",
            Self::AnyIpv6 => "::/0",
        }
    }
}

/// Default routes installed in the route table, in creation order.
pub const DEFAULT_ROUTES: [RouteDestination; 2] =
    [RouteDestination::AnyIpv4, RouteDestination::AnyIpv6];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressSource {
    Ipv4Cidr(String),
    Ipv6Cidr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    /// Provider protocol name; `-1` means every protocol.
    pub protocol: &'static str,
    pub port_range: Option<(i32, i32)>,
    pub source: IngressSource,
    pub description: Option<&'static str>,
}

pub fn ingress_rules(public_ip_v4: Ipv4Addr, public_ip_v6: Ipv6Addr) -> Vec<IngressRule> {
    let host_v4 = format!("{public_ip_v4}/32");
    vec![
        IngressRule {
            protocol: "tcp",
            port_range: Some((SSH_PORT, SSH_PORT)),
            source: IngressSource::Ipv4Cidr(host_v4.clone()),
            description: Some("SSH access from my IP"),
        },
        IngressRule {
            protocol: "udp",
            port_range: Some((OPENVPN_PORT, OPENVPN_PORT)),
            source: IngressSource::Ipv4Cidr(host_v4),
            description: Some("OpenVPN access"),
        },
        IngressRule {
            protocol: "-1",
            port_range: None,
            source: IngressSource::Ipv6Cidr(format!("{public_ip_v6}/128")),
            description: None,
        },
    ]
}

/// Tags applied to every resource of one launch.
pub fn resource_tags(launch_id: &str) -> Vec<(String, String)> {
    vec![
        ("Name".to_string(), RESOURCE_NAME_TAG.to_string()),
        (LAUNCH_ID_TAG_KEY.to_string(), launch_id.to_string()),
    ]
}
