//! First-boot script for the VPN instance.
//!
//! The script installs OpenVPN through the upstream `openvpn-install.sh`
//! headless mode and copies the generated client profile into the export
//! bucket. The instance role must allow `s3:PutObject` on that bucket.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

pub const INSTALLER_URL: &str =
    "https://raw.githubusercontent.com/angristan/openvpn-install/master/openvpn-install.sh";
pub const CLIENT_NAME: &str = "openvpn";
pub const CLIENT_PROFILE_FILE: &str = "openvpn.ovpn";

// Answers for the installer prompts: auto endpoint detection, IPv6 enabled,
// default UDP port 1194, system DNS resolvers, no compression, default
// encryption, passwordless client.
const INSTALLER_ANSWERS: &[(&str, &str)] = &[
    ("APPROVE_INSTALL", "y"),
    ("ENDPOINT", "$(curl -4 ifconfig.co)"),
    ("APPROVE_IP", "y"),
    ("IPV6_SUPPORT", "y"),
    ("PORT_CHOICE", "1"),
    ("PROTOCOL_CHOICE", "1"),
    ("DNS", "1"),
    ("COMPRESSION_ENABLED", "n"),
    ("CUSTOMIZE_ENC", "n"),
    ("CLIENT", CLIENT_NAME),
    ("PASS", "1"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootScript {
    pub bucket: String,
}

impl BootScript {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    pub fn render(&self) -> String {
        let answers = INSTALLER_ANSWERS
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");

        let mut lines = vec![
            "#!/bin/bash".to_string(),
            "apt-get update".to_string(),
            "apt-get install awscli -y".to_string(),
            String::new(),
            format!("curl -O {INSTALLER_URL}"),
            "chmod +x openvpn-install.sh".to_string(),
            format!("{answers} ./openvpn-install.sh"),
            String::new(),
        ];
        // The installer writes the profile with the endpoint it detected;
        // line 4 is rewritten to the address clients should dial.
        lines.extend([
            format!("mv /root/{CLIENT_PROFILE_FILE} /tmp/"),
            format!("chmod 777 /tmp/{CLIENT_PROFILE_FILE}"),
            "export PUBLIC_IP=$(curl -s https://api.ipify.org)".to_string(),
            format!("sed \"4s#.*#remote $PUBLIC_IP#\" /tmp/{CLIENT_PROFILE_FILE} -i"),
            format!("aws s3 cp /tmp/{CLIENT_PROFILE_FILE} s3://{}/", self.bucket),
        ]);

        let mut script = lines.join("\n");
        script.push('\n');
        script
    }

    /// Base64 form expected by the instance user-data field.
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.render())
    }
}

pub fn client_profile_uri(bucket: &str) -> String {
    format!("s3://{bucket}/{CLIENT_PROFILE_FILE}")
}
