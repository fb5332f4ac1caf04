use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection and retry policy for one mount. Callers build this from
/// whatever configuration surface they have; the driver never reads the
/// environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MountConfig {
    pub host: String,
    pub port: u16,
    /// Per-command reply deadline.
    pub reply_timeout: Duration,
    /// Backoff between initialization attempts.
    pub init_backoff: Duration,
    /// Cap on initialization attempts. `None` retries until the mount
    /// answers, which matches a mount that is still powering up.
    pub init_max_attempts: Option<u32>,
    /// Interval between polls while waiting for an axis to stop.
    pub poll_interval: Duration,
    /// Backoff between `refresh` retries after a transport failure.
    pub refresh_backoff: Duration,
    /// How many times `refresh` retries before the error propagates. Keeps
    /// a transient UDP drop from aborting an in-progress goto without
    /// letting a dead link block forever.
    pub refresh_max_retries: u32,
}

impl Default for MountConfig {
    fn default() -> Self {
        MountConfig {
            host: "192.168.4.1".to_string(),
            port: 11880,
            reply_timeout: Duration::from_secs(2),
            init_backoff: Duration::from_secs(2),
            init_max_attempts: None,
            poll_interval: Duration::from_secs(1),
            refresh_backoff: Duration::from_secs(2),
            refresh_max_retries: 5,
        }
    }
}
