use convoy_core::config;
use convoy_daemon::{api, supervisor};
use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt().init();

	let args: Vec<String> = std::env::args().skip(1).collect();
	let config_path = args
		.iter()
		.position(|a| a == "--config" || a == "-c")
		.and_then(|i| args.get(i + 1))
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from("services.toml"));

	let (settings, registry) = match config::load_registry(&config_path) {
		Ok(loaded) => loaded,
		Err(e) => {
			tracing::error!("{}", e);
			std::process::exit(1);
		}
	};
	tracing::info!(
		"loaded {} service(s) from {}",
		registry.len(),
		config_path.display()
	);

	let supervisor = supervisor::Supervisor::new(
		registry,
		supervisor::SupervisorConfig {
			boot_retries: settings.boot_retries,
			poll_interval: Duration::from_millis(settings.poll_interval_ms),
		},
	);

	let addr = std::net::SocketAddr::from(([127, 0, 0, 1], settings.port));
	let listener = match tokio::net::TcpListener::bind(addr).await {
		Ok(l) => l,
		Err(e) => {
			tracing::error!("failed to bind {}: {}", addr, e);
			std::process::exit(1);
		}
	};
	tracing::info!("supervisor listening on {}", addr);

	let app = api::router(Arc::clone(&supervisor));
	tokio::select! {
		result = axum::serve(listener, app).into_future() => {
			if let Err(e) = result {
				tracing::error!("server error: {}", e);
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("shutting down");
			supervisor.shutdown().await;
		}
	}
}
