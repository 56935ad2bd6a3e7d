//! Identity of the station and process claiming a lock.

use crate::config::Config;
use std::fmt;

/// Who is asking to hold a work unit.
///
/// Host, user and process id together identify one running packer; the
/// optional worker fields name the operator for humans reading lock files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderIdentity {
    pub host: String,
    pub user: String,
    pub process_id: u32,
    pub worker_id: Option<String>,
    pub worker_name: Option<String>,
}

impl HolderIdentity {
    pub fn new(host: impl Into<String>, user: impl Into<String>, process_id: u32) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            process_id,
            worker_id: None,
            worker_name: None,
        }
    }

    /// Identity of the current process, with worker fields from config.
    pub fn current(config: &Config) -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            host,
            user,
            process_id: std::process::id(),
            worker_id: config.worker_id.clone(),
            worker_name: config.worker_name.clone(),
        }
    }

    pub fn with_worker(mut self, worker_id: Option<String>, worker_name: Option<String>) -> Self {
        self.worker_id = worker_id;
        self.worker_name = worker_name;
        self
    }
}

impl fmt::Display for HolderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} (pid {})", self.user, self.host, self.process_id)
    }
}
