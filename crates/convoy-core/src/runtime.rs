use std::path::{Path, PathBuf};

/// Resolve the Python interpreter for a named conda-style environment.
/// Falls back to plain `python3` on PATH if the environment can't be found,
/// so a missing env degrades to a spawn-time error instead of a config error.
pub fn resolve_python(env_name: &str) -> PathBuf {
	resolve_python_in(&conda_root(), env_name)
}

fn resolve_python_in(root: &Path, env_name: &str) -> PathBuf {
	let env_dir = root.join("envs").join(env_name);
	if !env_dir.is_dir() {
		eprintln!(
			"warning: env '{}' not found at {}, falling back to python3",
			env_name,
			env_dir.display()
		);
		return PathBuf::from("python3");
	}

	// Prefer the framework build on macOS so tkinter-based services work.
	#[cfg(target_os = "macos")]
	{
		let framework = env_dir.join("python.app/Contents/MacOS/python");
		if framework.exists() {
			return framework;
		}
	}

	for name in ["python", "python3"] {
		let candidate = env_dir.join("bin").join(name);
		if candidate.exists() {
			return candidate;
		}
	}

	eprintln!("warning: no python found in env '{}', falling back to python3", env_name);
	PathBuf::from("python3")
}

fn conda_root() -> PathBuf {
	if let Ok(exe) = std::env::var("CONDA_EXE") {
		if let Some(root) = Path::new(&exe).parent().and_then(|p| p.parent()) {
			return root.to_path_buf();
		}
	}
	if let Ok(prefix) = std::env::var("CONDA_PREFIX") {
		// An activated env prefix looks like <root>/envs/<name>.
		if let Some(pos) = prefix.find("/envs/") {
			return PathBuf::from(&prefix[..pos]);
		}
		return PathBuf::from(prefix);
	}
	let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
	let miniconda = Path::new(&home).join("miniconda3");
	if miniconda.is_dir() {
		miniconda
	} else {
		Path::new(&home).join("anaconda3")
	}
}
