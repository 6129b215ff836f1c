use convoy_core::types::{HealthCheckKind, ServiceDefinition};
use convoy_daemon::{api, Supervisor, SupervisorConfig};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::net::TcpListener;

fn definition(id: &str, command: &[&str], port: u16, managed: bool) -> ServiceDefinition {
	ServiceDefinition {
		id: id.to_string(),
		label: id.to_string(),
		description: String::new(),
		command: command.iter().map(|s| s.to_string()).collect(),
		cwd: std::env::temp_dir(),
		port,
		health_check: HealthCheckKind::Tcp,
		health_url: None,
		managed,
		boot_retries: None,
	}
}

/// Serve the control surface on an ephemeral port, returning its base URL.
async fn serve(defs: Vec<ServiceDefinition>) -> String {
	let registry: BTreeMap<String, ServiceDefinition> =
		defs.into_iter().map(|d| (d.id.clone(), d)).collect();
	let sup = Supervisor::new(
		registry,
		SupervisorConfig {
			boot_retries: 2,
			poll_interval: Duration::from_millis(50),
		},
	);

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let app = api::router(sup);
	tokio::spawn(async move {
		let _ = axum::serve(listener, app).await;
	});
	format!("http://{}", addr)
}

async fn closed_port() -> u16 {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	drop(listener);
	port
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
	let base = serve(vec![]).await;
	let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
	assert_eq!(resp.status(), 200);
	let body: Value = resp.json().await.unwrap();
	assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_service_is_404() {
	let base = serve(vec![]).await;
	let client = reqwest::Client::new();

	let resp = client
		.post(format!("{}/services/ghost/start", base))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 404);

	let resp = reqwest::get(format!("{}/services/ghost/logs", base)).await.unwrap();
	assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn unmanaged_start_is_400() {
	let port = closed_port().await;
	let base = serve(vec![definition("observed", &[], port, false)]).await;
	let client = reqwest::Client::new();

	let resp = client
		.post(format!("{}/services/observed/start", base))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 400);

	let resp = client
		.post(format!("{}/services/observed/stop", base))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn list_services_reports_registry_entries() {
	let port = closed_port().await;
	let base = serve(vec![definition("svc", &["sh", "-c", "sleep 60"], port, true)]).await;

	let resp = reqwest::get(format!("{}/services", base)).await.unwrap();
	assert_eq!(resp.status(), 200);
	let body: Value = resp.json().await.unwrap();

	let entries = body.as_array().unwrap();
	assert_eq!(entries.len(), 1);
	let entry = &entries[0];
	assert_eq!(entry["id"], "svc");
	assert_eq!(entry["managed"], true);
	assert_eq!(entry["health_check"], "tcp");
	assert_eq!(entry["status"], "offline");
	assert_eq!(entry["pid"], Value::Null);
}

#[tokio::test]
async fn business_failure_is_200_with_ok_false() {
	let port = closed_port().await;
	let base = serve(vec![definition("doomed", &["sh", "-c", "exit 1"], port, true)]).await;
	let client = reqwest::Client::new();

	let resp = client
		.post(format!("{}/services/doomed/start", base))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 200);
	let body: Value = resp.json().await.unwrap();
	assert_eq!(body["ok"], false);
	assert_eq!(body["reason"], "process_died");
	assert_eq!(body["code"], 1);
}

#[tokio::test]
async fn logs_endpoint_honors_last() {
	let port = closed_port().await;
	let base = serve(vec![definition(
		"svc",
		&["python3", "/definitely/missing/main.py"],
		port,
		true,
	)]).await;
	let client = reqwest::Client::new();

	// Produces one "entry point not found" log line.
	let resp = client
		.post(format!("{}/services/svc/start", base))
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), 200);

	let resp = reqwest::get(format!("{}/services/svc/logs?last=1", base)).await.unwrap();
	assert_eq!(resp.status(), 200);
	let body: Value = resp.json().await.unwrap();
	let lines = body["lines"].as_array().unwrap();
	assert_eq!(lines.len(), 1);
	assert!(lines[0].as_str().unwrap().contains("entry point not found"));
}
