use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a service's readiness is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckKind {
	Http,
	Tcp,
}

/// One entry in the service registry. Immutable once loaded; the supervisor
/// only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
	pub id: String,
	pub label: String,
	#[serde(default)]
	pub description: String,
	pub command: Vec<String>,
	pub cwd: PathBuf,
	pub port: u16,
	pub health_check: HealthCheckKind,
	pub health_url: Option<String>,
	#[serde(default)]
	pub managed: bool,
	/// Per-service health-poll budget; falls back to the supervisor default.
	pub boot_retries: Option<u32>,
}

/// Status derived on demand from the runtime state plus a live probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
	Starting,
	Stopping,
	Online,
	Unhealthy,
	Offline,
}

/// One row of `GET /services`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceReport {
	pub id: String,
	pub label: String,
	pub description: String,
	pub port: u16,
	pub managed: bool,
	pub health_check: HealthCheckKind,
	pub status: ServiceState,
	pub pid: Option<u32>,
}

/// Result of a start (or restart) request. Business-level failures are
/// reported here with `ok: false`, never as protocol errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOutcome {
	pub ok: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pid: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub warning: Option<String>,
}

impl StartOutcome {
	pub fn ready(pid: u32) -> Self {
		Self { ok: true, pid: Some(pid), reason: None, code: None, warning: None }
	}

	/// Process is alive but never confirmed healthy. Soft success.
	pub fn health_timeout(pid: u32) -> Self {
		Self {
			ok: true,
			pid: Some(pid),
			reason: None,
			code: None,
			warning: Some("health_timeout".to_string()),
		}
	}

	pub fn died(code: i32) -> Self {
		Self {
			ok: false,
			pid: None,
			reason: Some("process_died".to_string()),
			code: Some(code),
			warning: None,
		}
	}

	pub fn rejected(reason: impl Into<String>) -> Self {
		Self { ok: false, pid: None, reason: Some(reason.into()), code: None, warning: None }
	}
}

/// Result of a stop request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopOutcome {
	pub ok: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

impl StopOutcome {
	pub fn stopped(code: i32) -> Self {
		Self { ok: true, code: Some(code), reason: None }
	}

	pub fn rejected(reason: impl Into<String>) -> Self {
		Self { ok: false, code: None, reason: Some(reason.into()) }
	}
}
