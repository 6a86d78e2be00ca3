use std::time::Duration;

pub const DEFAULT_EXPORT_BUCKET: &str = "lazy-vpn-art";
pub const DEFAULT_BUCKET_REGION: &str = "sa-east-1";
pub const DEFAULT_KEY_NAME: &str = "LazyVPN";
pub const DEFAULT_INSTANCE_PROFILE: &str = "LazyVpnEc2Role";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub export_bucket: String,
    pub bucket_region: String,
    pub key_name: String,
    pub instance_profile: String,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            export_bucket: DEFAULT_EXPORT_BUCKET.to_string(),
            bucket_region: DEFAULT_BUCKET_REGION.to_string(),
            key_name: DEFAULT_KEY_NAME.to_string(),
            instance_profile: DEFAULT_INSTANCE_PROFILE.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

impl LaunchSettings {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Self::default();
        let text = |key: &str, fallback: String| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(fallback)
        };

        let poll_interval_secs = positive_number(
            "LAZYVPN_IPV6_POLL_INTERVAL_SECS",
            lookup("LAZYVPN_IPV6_POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let poll_max_attempts = positive_number(
            "LAZYVPN_IPV6_POLL_MAX_ATTEMPTS",
            lookup("LAZYVPN_IPV6_POLL_MAX_ATTEMPTS"),
            u64::from(DEFAULT_POLL_MAX_ATTEMPTS),
        )?;
        let poll_max_attempts = u32::try_from(poll_max_attempts)
            .map_err(|_| "LAZYVPN_IPV6_POLL_MAX_ATTEMPTS is out of range".to_string())?;

        Ok(Self {
            export_bucket: text("LAZYVPN_EXPORT_BUCKET", defaults.export_bucket),
            bucket_region: text("LAZYVPN_BUCKET_REGION", defaults.bucket_region),
            key_name: text("LAZYVPN_KEY_NAME", defaults.key_name),
            instance_profile: text("LAZYVPN_INSTANCE_PROFILE", defaults.instance_profile),
            poll_interval: Duration::from_secs(poll_interval_secs),
            poll_max_attempts,
        })
    }
}

fn positive_number(key: &str, raw: Option<String>, fallback: u64) -> Result<u64, String> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(fallback);
    };

    match raw.trim().parse::<u64>() {
        Ok(0) => Err(format!("{key} must be a positive integer")),
        Ok(value) => Ok(value),
        Err(_) => Err(format!("{key} must be a positive integer, got '{raw}'")),
    }
}
