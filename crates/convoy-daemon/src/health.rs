use convoy_core::types::{HealthCheckKind, ServiceDefinition};
use std::time::Duration;
use tokio::net::TcpStream;

const HTTP_TIMEOUT: Duration = Duration::from_secs(2);
const TCP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Readiness prober. One strategy per service, selected by the definition's
/// `health_check` kind; probes never mix strategies and never error.
#[derive(Clone)]
pub struct HealthChecker {
	client: reqwest::Client,
}

impl HealthChecker {
	pub fn new() -> Self {
		let client = reqwest::Client::builder()
			.timeout(HTTP_TIMEOUT)
			.build()
			.expect("failed to build HTTP probe client");
		Self { client }
	}

	/// One probe. Any transport error, timeout, or refused connection is a
	/// plain `false`.
	pub async fn probe(&self, def: &ServiceDefinition) -> bool {
		match def.health_check {
			HealthCheckKind::Http => {
				let Some(url) = def.health_url.as_deref() else {
					return false;
				};
				match self.client.get(url).send().await {
					Ok(resp) => resp.status().as_u16() < 500,
					Err(_) => false,
				}
			}
			HealthCheckKind::Tcp => {
				let addr = format!("127.0.0.1:{}", def.port);
				// Connection established is enough; drop it without sending.
				matches!(
					tokio::time::timeout(TCP_TIMEOUT, TcpStream::connect(&addr)).await,
					Ok(Ok(_))
				)
			}
		}
	}

	/// Poll `probe` at a fixed interval until it succeeds or the retry budget
	/// runs out.
	pub async fn await_ready(
		&self,
		def: &ServiceDefinition,
		retries: u32,
		interval: Duration,
	) -> bool {
		for _ in 0..retries {
			if self.probe(def).await {
				return true;
			}
			tokio::time::sleep(interval).await;
		}
		false
	}
}

impl Default for HealthChecker {
	fn default() -> Self {
		Self::new()
	}
}
