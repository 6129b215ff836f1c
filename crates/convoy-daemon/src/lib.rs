//! # convoy-daemon
//!
//! Local multi-service supervisor: launches a registry of sibling service
//! processes, polls them for readiness, captures their output, and exposes
//! start/stop/restart/status/log operations over a small HTTP surface.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use convoy_core::types::{HealthCheckKind, ServiceDefinition};
//! use convoy_daemon::{Supervisor, SupervisorConfig};
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut registry = BTreeMap::new();
//! registry.insert("web".to_string(), ServiceDefinition {
//!     id: "web".into(),
//!     label: "Web".into(),
//!     description: String::new(),
//!     command: vec!["sh".into(), "-c".into(), "./run.sh".into()],
//!     cwd: "/srv/web".into(),
//!     port: 8001,
//!     health_check: HealthCheckKind::Tcp,
//!     health_url: None,
//!     managed: true,
//!     boot_retries: None,
//! });
//!
//! let sup = Supervisor::new(registry, SupervisorConfig {
//!     boot_retries: 20,
//!     poll_interval: Duration::from_millis(500),
//! });
//! sup.start("web").await.unwrap();
//! # }
//! ```

pub mod api;
pub mod health;
pub mod output;
pub mod supervisor;

pub use health::HealthChecker;
pub use output::LogBuffer;
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorError};
