use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::regions::{lookup_region, RegionConfig};

pub const LAUNCH_ID_LENGTH: usize = 12;

/// Event payload accepted by the launch function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub instance_type: String,
    pub region: String,
    pub public_ip_v4: String,
    pub public_ip_v6: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLaunchRequest {
    pub instance_type: String,
    pub region: String,
    pub region_config: RegionConfig,
    pub public_ip_v4: Ipv4Addr,
    pub public_ip_v6: Ipv6Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn normalize_request(
    payload: LaunchRequest,
) -> Result<NormalizedLaunchRequest, ValidationError> {
    let region = payload.region.trim().to_string();
    let Some(region_config) = lookup_region(&region) else {
        return Err(ValidationError::new(format!(
            "region not supported: {region}"
        )));
    };

    let instance_type = payload.instance_type.trim().to_string();
    if instance_type.is_empty() {
        return Err(ValidationError::new("instanceType cannot be empty"));
    }

    let public_ip_v4 = payload
        .public_ip_v4
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| {
            ValidationError::new(format!(
                "publicIpV4 '{}' is not an IPv4 address",
                payload.public_ip_v4
            ))
        })?;

    let public_ip_v6 = payload
        .public_ip_v6
        .trim()
        .parse::<Ipv6Addr>()
        .map_err(|_| {
            ValidationError::new(format!(
                "publicIpV6 '{}' is not an IPv6 address",
                payload.public_ip_v6
            ))
        })?;

    Ok(NormalizedLaunchRequest {
        instance_type,
        region,
        region_config: *region_config,
        public_ip_v4,
        public_ip_v6,
    })
}

/// Short identifier tagged onto every resource created by one invocation.
pub fn launch_id(request: &NormalizedLaunchRequest, invocation_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.region.as_bytes());
    hasher.update(b"\n");
    hasher.update(request.instance_type.as_bytes());
    hasher.update(b"\n");
    hasher.update(request.public_ip_v4.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(request.public_ip_v6.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(invocation_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..LAUNCH_ID_LENGTH].to_string()
}
