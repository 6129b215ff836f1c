use crate::health::HealthChecker;
use crate::output::{self, LogBuffer};
use convoy_core::types::{
	ServiceDefinition, ServiceReport, ServiceState, StartOutcome, StopOutcome,
};
use nix::sys::signal::Signal;
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;
use tokio::task::JoinSet;

pub const RESTART_DELAY: Duration = Duration::from_millis(500);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STOP_POLL_BUDGET: u32 = 50;
const KILL_GRACE: Duration = Duration::from_millis(200);

/// Identifier and permission errors surface as protocol errors; everything
/// else resolves to a structured soft result.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
	#[error("unknown service: {0}")]
	UnknownService(String),
	#[error("service '{0}' is not managed")]
	NotManaged(String),
}

/// Per-service mutual-exclusion gate: at most one start or stop may be in
/// flight for a service at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
	Idle,
	Starting,
	Stopping,
}

struct ServiceRuntime {
	/// Present iff a process was spawned and has not been confirmed exited.
	child: Option<Child>,
	marker: Lifecycle,
	logs: LogBuffer,
}

impl ServiceRuntime {
	fn new() -> Self {
		Self {
			child: None,
			marker: Lifecycle::Idle,
			logs: LogBuffer::new(),
		}
	}
}

pub struct SupervisorConfig {
	/// Default health-poll budget; definitions may override per service.
	pub boot_retries: u32,
	pub poll_interval: Duration,
}

pub struct Supervisor {
	registry: BTreeMap<String, ServiceDefinition>,
	checker: HealthChecker,
	config: SupervisorConfig,
	states: RwLock<HashMap<String, ServiceRuntime>>,
}

impl Supervisor {
	pub fn new(registry: BTreeMap<String, ServiceDefinition>, config: SupervisorConfig) -> Arc<Self> {
		let states = registry
			.keys()
			.map(|id| (id.clone(), ServiceRuntime::new()))
			.collect();
		Arc::new(Self {
			registry,
			checker: HealthChecker::new(),
			config,
			states: RwLock::new(states),
		})
	}

	fn definition(&self, id: &str) -> Result<&ServiceDefinition, SupervisorError> {
		self.registry
			.get(id)
			.ok_or_else(|| SupervisorError::UnknownService(id.to_string()))
	}

	fn managed_definition(&self, id: &str) -> Result<&ServiceDefinition, SupervisorError> {
		let def = self.definition(id)?;
		if !def.managed {
			return Err(SupervisorError::NotManaged(id.to_string()));
		}
		Ok(def)
	}

	pub async fn start(self: &Arc<Self>, id: &str) -> Result<StartOutcome, SupervisorError> {
		let def = self.managed_definition(id)?;

		// Claim the lifecycle marker before doing anything slow.
		let logs = {
			let mut states = self.states.write().await;
			let rt = states
				.get_mut(id)
				.ok_or_else(|| SupervisorError::UnknownService(id.to_string()))?;

			if let Some(child) = rt.child.as_mut() {
				match child.try_wait() {
					Ok(Some(status)) => {
						// Exited since we last looked; clear the handle.
						let code = status.code().unwrap_or(-1);
						rt.child = None;
						rt.logs
							.append(&format!("process exited with code {}", code))
							.await;
					}
					_ => return Ok(StartOutcome::rejected("already_running")),
				}
			}
			match rt.marker {
				Lifecycle::Starting => return Ok(StartOutcome::rejected("already_starting")),
				Lifecycle::Stopping => return Ok(StartOutcome::rejected("already_stopping")),
				Lifecycle::Idle => {}
			}
			rt.marker = Lifecycle::Starting;
			rt.logs.clone()
		};

		let (outcome, child) = self.run_start(def, &logs).await;

		// Marker is reset on every exit path; the handle is stored only while
		// the process is believed alive.
		let mut states = self.states.write().await;
		if let Some(rt) = states.get_mut(id) {
			rt.child = child;
			rt.marker = Lifecycle::Idle;
		}
		Ok(outcome)
	}

	async fn run_start(
		&self,
		def: &ServiceDefinition,
		logs: &LogBuffer,
	) -> (StartOutcome, Option<Child>) {
		if def.command.is_empty() {
			let msg = format!("no command configured for {}", def.id);
			logs.append(&msg).await;
			return (StartOutcome::rejected(msg), None);
		}
		if let Some(entry) = def.command.last() {
			// Script-path entry points are checked up front; flag-style
			// entries (e.g. `-m pkg.main`) are left to the spawn.
			if entry.contains('/') && !std::path::Path::new(entry).exists() {
				let msg = format!("entry point not found: {}", entry);
				logs.append(&msg).await;
				return (StartOutcome::rejected(msg), None);
			}
		}

		logs.append(&format!("--- starting {} ---", def.label)).await;
		logs.append(&format!("    cmd: {}", def.command.join(" "))).await;
		logs.append(&format!("    cwd: {}", def.cwd.display())).await;

		let mut child = match spawn_service(def) {
			Ok(c) => c,
			Err(e) => {
				tracing::error!("failed to spawn {}: {}", def.id, e);
				logs.append(&format!("failed to start: {}", e)).await;
				return (StartOutcome::rejected(e.to_string()), None);
			}
		};
		let pid = child.id().unwrap_or(0);

		if let Some(stdout) = child.stdout.take() {
			let buf = logs.clone();
			tokio::spawn(async move {
				output::collect_lines(stdout, buf).await;
			});
		}
		if let Some(stderr) = child.stderr.take() {
			let buf = logs.clone();
			tokio::spawn(async move {
				output::collect_lines(stderr, buf).await;
			});
		}

		let retries = def.boot_retries.unwrap_or(self.config.boot_retries);
		let interval = self.config.poll_interval;

		let ready = tokio::select! {
			status = child.wait() => {
				let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
				logs.append(&format!("process exited with code {}", code)).await;
				return (StartOutcome::died(code), None);
			}
			ready = self.checker.await_ready(def, retries, interval) => ready,
		};

		if ready {
			logs.append(&format!("{} healthy on port {}", def.label, def.port))
				.await;
			return (StartOutcome::ready(pid), Some(child));
		}

		// Budget exhausted; distinguish a dead process from a slow one.
		match child.try_wait() {
			Ok(Some(status)) => {
				let code = status.code().unwrap_or(-1);
				logs.append(&format!("process exited with code {}", code)).await;
				(StartOutcome::died(code), None)
			}
			_ => {
				logs.append("running but health check timed out").await;
				(StartOutcome::health_timeout(pid), Some(child))
			}
		}
	}

	pub async fn stop(&self, id: &str) -> Result<StopOutcome, SupervisorError> {
		let def = self.managed_definition(id)?;

		let (mut child, logs) = {
			let mut states = self.states.write().await;
			let rt = states
				.get_mut(id)
				.ok_or_else(|| SupervisorError::UnknownService(id.to_string()))?;

			if rt.marker == Lifecycle::Stopping {
				return Ok(StopOutcome::rejected("already_stopping"));
			}
			let Some(mut child) = rt.child.take() else {
				return Ok(StopOutcome::rejected("not_running"));
			};
			if let Ok(Some(_)) = child.try_wait() {
				// Already exited; handle stays cleared.
				return Ok(StopOutcome::rejected("not_running"));
			}
			rt.marker = Lifecycle::Stopping;
			(child, rt.logs.clone())
		};

		logs.append(&format!("--- stopping {} ---", def.label)).await;
		if let Some(pid) = child.id() {
			signal_group(pid, Signal::SIGTERM);
		}

		let mut status = None;
		for _ in 0..STOP_POLL_BUDGET {
			tokio::time::sleep(STOP_POLL_INTERVAL).await;
			if let Ok(Some(s)) = child.try_wait() {
				status = Some(s);
				break;
			}
		}
		if status.is_none() {
			logs.append("did not exit gracefully, killing").await;
			if let Some(pid) = child.id() {
				signal_group(pid, Signal::SIGKILL);
			}
			let _ = child.kill().await;
			tokio::time::sleep(KILL_GRACE).await;
			status = child.try_wait().ok().flatten();
		}

		let code = status.and_then(|s| s.code()).unwrap_or(-1);
		logs.append(&format!("stopped (exit code {})", code)).await;

		let mut states = self.states.write().await;
		if let Some(rt) = states.get_mut(id) {
			rt.marker = Lifecycle::Idle;
		}
		Ok(StopOutcome::stopped(code))
	}

	/// Stop, short pause, then start. Not atomic: a status query in between
	/// may observe `offline`.
	pub async fn restart(self: &Arc<Self>, id: &str) -> Result<StartOutcome, SupervisorError> {
		let _ = self.stop(id).await?;
		tokio::time::sleep(RESTART_DELAY).await;
		self.start(id).await
	}

	pub async fn list_status(self: &Arc<Self>) -> Vec<ServiceReport> {
		// Snapshot liveness under the lock, probe health outside it.
		let mut snapshot: Vec<(ServiceDefinition, Lifecycle, Option<u32>)> = Vec::new();
		{
			let mut states = self.states.write().await;
			for (id, def) in &self.registry {
				let Some(rt) = states.get_mut(id) else { continue };
				let pid = match rt.child.as_mut() {
					Some(child) => match child.try_wait() {
						Ok(Some(_)) => {
							rt.child = None;
							None
						}
						_ => child.id(),
					},
					None => None,
				};
				snapshot.push((def.clone(), rt.marker, pid));
			}
		}

		let mut probes = JoinSet::new();
		for (i, (def, _, _)) in snapshot.iter().enumerate() {
			let checker = self.checker.clone();
			let def = def.clone();
			probes.spawn(async move { (i, checker.probe(&def).await) });
		}
		let mut healthy = vec![false; snapshot.len()];
		while let Some(res) = probes.join_next().await {
			if let Ok((i, ok)) = res {
				healthy[i] = ok;
			}
		}

		snapshot
			.into_iter()
			.enumerate()
			.map(|(i, (def, marker, pid))| {
				let status = match marker {
					Lifecycle::Starting => ServiceState::Starting,
					Lifecycle::Stopping => ServiceState::Stopping,
					Lifecycle::Idle if healthy[i] => ServiceState::Online,
					Lifecycle::Idle if pid.is_some() => ServiceState::Unhealthy,
					Lifecycle::Idle => ServiceState::Offline,
				};
				ServiceReport {
					id: def.id,
					label: def.label,
					description: def.description,
					port: def.port,
					managed: def.managed,
					health_check: def.health_check,
					status,
					pid,
				}
			})
			.collect()
	}

	pub async fn tail_logs(&self, id: &str, last: usize) -> Result<Vec<String>, SupervisorError> {
		let states = self.states.read().await;
		let rt = states
			.get(id)
			.ok_or_else(|| SupervisorError::UnknownService(id.to_string()))?;
		Ok(rt.logs.tail(last).await)
	}

	/// Best-effort SIGTERM to every live child; used only while the daemon
	/// itself is shutting down, so no exit confirmation.
	pub async fn shutdown(&self) {
		let mut states = self.states.write().await;
		for (id, rt) in states.iter_mut() {
			if let Some(child) = rt.child.as_mut() {
				if let Ok(None) = child.try_wait() {
					if let Some(pid) = child.id() {
						tracing::info!("terminating {} (pid {})", id, pid);
						signal_group(pid, Signal::SIGTERM);
					}
				}
			}
		}
	}
}

fn spawn_service(def: &ServiceDefinition) -> std::io::Result<Child> {
	let (program, args) = def
		.command
		.split_first()
		.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"))?;

	let mut cmd = Command::new(program);
	cmd.args(args)
		.current_dir(&def.cwd)
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		// New process group so termination signals reach the whole tree.
		.process_group(0);
	cmd.spawn()
}

fn signal_group(pid: u32, signal: Signal) {
	use nix::sys::signal::killpg;
	use nix::unistd::Pid;
	let _ = killpg(Pid::from_raw(pid as i32), signal);
}
