use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Mutex;

/// Most recent lines kept per service; older entries are silently dropped.
pub const LOG_CAPACITY: usize = 400;

/// Bounded ring of timestamped log lines for one service. Cheap to clone;
/// the output collector appends while log queries read concurrently.
#[derive(Clone)]
pub struct LogBuffer {
	lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogBuffer {
	pub fn new() -> Self {
		Self {
			lines: Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY))),
		}
	}

	pub async fn append(&self, line: &str) {
		let stamped = format!("[{}] {}", timestamp_hms(), line.trim_end());
		let mut lines = self.lines.lock().await;
		if lines.len() >= LOG_CAPACITY {
			lines.pop_front();
		}
		lines.push_back(stamped);
	}

	/// Last `n` lines, oldest first. `n` may exceed the buffer size.
	pub async fn tail(&self, n: usize) -> Vec<String> {
		let lines = self.lines.lock().await;
		let skip = lines.len().saturating_sub(n);
		lines.iter().skip(skip).cloned().collect()
	}
}

impl Default for LogBuffer {
	fn default() -> Self {
		Self::new()
	}
}

/// Drain one of a child's output streams into its log buffer, line by line.
/// Exits silently when the stream closes or errors; never blocks the caller.
pub async fn collect_lines<R: AsyncRead + Unpin>(reader: R, buffer: LogBuffer) {
	let mut lines = BufReader::new(reader).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		buffer.append(&line).await;
	}
}

/// Wall-clock HH:MM:SS (UTC), second resolution.
pub fn timestamp_hms() -> String {
	let secs = std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0);
	let time_of_day = secs % 86400;
	format!(
		"{:02}:{:02}:{:02}",
		time_of_day / 3600,
		(time_of_day % 3600) / 60,
		time_of_day % 60
	)
}
