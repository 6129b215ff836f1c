use crate::runtime;
use crate::types::{HealthCheckKind, ServiceDefinition};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("failed to parse {path}: {source}")]
	Parse {
		path: PathBuf,
		source: toml::de::Error,
	},
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSettings {
	#[serde(default = "default_port")]
	pub port: u16,
	#[serde(default = "default_boot_retries")]
	pub boot_retries: u32,
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
}

impl Default for SupervisorSettings {
	fn default() -> Self {
		Self {
			port: default_port(),
			boot_retries: default_boot_retries(),
			poll_interval_ms: default_poll_interval_ms(),
		}
	}
}

fn default_port() -> u16 {
	8003
}
fn default_boot_retries() -> u32 {
	20
}
fn default_poll_interval_ms() -> u64 {
	500
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RegistryFile {
	#[serde(default)]
	supervisor: SupervisorSettings,
	#[serde(default)]
	services: BTreeMap<String, RawServiceDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawServiceDef {
	label: String,
	#[serde(default)]
	description: String,
	#[serde(default)]
	command: Vec<String>,
	cwd: Option<PathBuf>,
	port: u16,
	health_check: HealthCheckKind,
	health_url: Option<String>,
	#[serde(default)]
	managed: bool,
	/// Named isolated environment whose interpreter replaces a leading
	/// `python`/`python3` in `command`.
	runtime_env: Option<String>,
	boot_retries: Option<u32>,
}

impl RawServiceDef {
	fn into_definition(self, id: String, base: &Path) -> ServiceDefinition {
		let mut command = self.command;
		if let Some(env) = &self.runtime_env {
			if let Some(first) = command.first_mut() {
				if first == "python" || first == "python3" {
					*first = runtime::resolve_python(env).to_string_lossy().into_owned();
				}
			}
		}

		let cwd = match self.cwd {
			Some(dir) if dir.is_absolute() => dir,
			Some(dir) => base.join(dir),
			None => base.to_path_buf(),
		};

		ServiceDefinition {
			id,
			label: self.label,
			description: self.description,
			command,
			cwd,
			port: self.port,
			health_check: self.health_check,
			health_url: self.health_url,
			managed: self.managed,
			boot_retries: self.boot_retries,
		}
	}
}

/// Load the service registry. Relative `cwd` entries resolve against the
/// registry file's directory, so sibling service folders work out of the box.
pub fn load_registry(
	path: &Path,
) -> Result<(SupervisorSettings, BTreeMap<String, ServiceDefinition>), ConfigError> {
	let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	let file: RegistryFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	})?;

	let base = path.parent().unwrap_or_else(|| Path::new("."));
	let services = file
		.services
		.into_iter()
		.map(|(id, raw)| {
			let def = raw.into_definition(id.clone(), base);
			(id, def)
		})
		.collect();

	Ok((file.supervisor, services))
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r#"
[supervisor]
port = 9100
boot_retries = 10

[services.web]
label = "Web"
description = "frontend"
command = ["sh", "-c", "./run.sh"]
cwd = "web"
port = 9001
health_check = "http"
health_url = "http://localhost:9001/health"
managed = true
boot_retries = 30

[services.metrics]
label = "Metrics"
port = 9002
health_check = "tcp"
"#;

	fn write_sample(name: &str) -> PathBuf {
		let dir = std::env::temp_dir().join(format!("convoy-config-{}", name));
		let _ = std::fs::create_dir_all(&dir);
		let path = dir.join("services.toml");
		std::fs::write(&path, SAMPLE).unwrap();
		path
	}

	#[test]
	fn parses_registry() {
		let path = write_sample("parse");
		let (settings, services) = load_registry(&path).unwrap();

		assert_eq!(settings.port, 9100);
		assert_eq!(settings.boot_retries, 10);
		assert_eq!(settings.poll_interval_ms, 500);
		assert_eq!(services.len(), 2);

		let web = &services["web"];
		assert!(web.managed);
		assert_eq!(web.health_check, HealthCheckKind::Http);
		assert_eq!(web.boot_retries, Some(30));
		assert!(web.cwd.ends_with("web"));

		let metrics = &services["metrics"];
		assert!(!metrics.managed);
		assert_eq!(metrics.health_check, HealthCheckKind::Tcp);
		assert!(metrics.command.is_empty());
	}

	#[test]
	fn missing_file_is_an_error() {
		let err = load_registry(Path::new("/nonexistent/services.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Read { .. }));
	}

	#[test]
	fn bad_toml_is_an_error() {
		let dir = std::env::temp_dir().join("convoy-config-bad");
		let _ = std::fs::create_dir_all(&dir);
		let path = dir.join("services.toml");
		std::fs::write(&path, "services = 3").unwrap();

		let err = load_registry(&path).unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
	}

	#[test]
	fn defaults_when_supervisor_section_missing() {
		let dir = std::env::temp_dir().join("convoy-config-defaults");
		let _ = std::fs::create_dir_all(&dir);
		let path = dir.join("services.toml");
		std::fs::write(&path, "").unwrap();

		let (settings, services) = load_registry(&path).unwrap();
		assert_eq!(settings.port, 8003);
		assert_eq!(settings.boot_retries, 20);
		assert!(services.is_empty());
	}
}
