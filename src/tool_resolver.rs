//! # Tool Path Resolver
//!
//! Questo modulo trova i binari esterni (ffmpeg, ffprobe) ed esegue le invocazioni
//! con timeout.
//!
//! ## Strategia di risoluzione (in ordine):
//! 1. Variabile d'ambiente specifica (`FFMPEG_PATH`, `FFPROBE_PATH`)
//! 2. Directory `TOOLS_DIR` (tool distribuiti insieme al servizio)
//! 3. `PATH` di sistema
//!
//! ## Esecuzione:
//! - `run_tool()` avvia il processo con stdout/stderr catturati
//! - Ogni invocazione ha un timeout: allo scadere il processo viene terminato
//!   (`kill_on_drop`) e la chiamata ritorna `ToolFailure::TimedOut`

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Resolves external tool binaries
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    /// Directory where tools are bundled
    tools_dir: Option<PathBuf>,
}

impl ToolResolver {
    pub fn new() -> Self {
        let tools_dir = env::var_os("TOOLS_DIR")
            .map(PathBuf::from)
            .filter(|dir| dir.is_dir());
        Self { tools_dir }
    }

    pub fn with_tools_dir(tools_dir: PathBuf) -> Self {
        Self {
            tools_dir: Some(tools_dir),
        }
    }

    /// Resolve the path to a specific tool
    pub fn resolve(&self, tool_name: &str) -> Option<PathBuf> {
        let override_var = format!("{}_PATH", tool_name.to_uppercase());
        if let Some(path) = env::var_os(&override_var).map(PathBuf::from) {
            if path.is_file() {
                debug!("Using {} from {}: {:?}", tool_name, override_var, path);
                return Some(path);
            }
            warn!("{} points to a missing file: {:?}", override_var, path);
        }

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = tools_dir.join(executable_name(tool_name));
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        let found = find_in_system_path(tool_name);
        if found.is_none() {
            warn!("Tool not found: {}", tool_name);
        }
        found
    }

    /// Check if a specific tool is available
    pub fn is_available(&self, tool_name: &str) -> bool {
        self.resolve(tool_name).is_some()
    }
}

fn executable_name(tool_name: &str) -> String {
    let extension = if cfg!(windows) { ".exe" } else { "" };
    format!("{}{}", tool_name, extension)
}

/// Find tool in system PATH
fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
    let tool_with_ext = executable_name(tool_name);
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(&tool_with_ext))
        .find(|path| path.is_file())
}

/// Captured result of a finished tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Invocation that never produced an exit status
#[derive(Debug, thiserror::Error)]
pub enum ToolFailure {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

/// Run `program` with `args`, capturing output, bounded by `timeout`
pub async fn run_tool<I, S>(program: &Path, args: I, timeout: Duration) -> Result<ToolOutput, ToolFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program_name = program.display().to_string();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Command: {:?}", cmd.as_std());

    let start_time = Instant::now();
    let child = cmd.spawn().map_err(|source| ToolFailure::Spawn {
        program: program_name.clone(),
        source,
    })?;

    // dropping the future on timeout kills the child
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ToolFailure::Spawn {
            program: program_name.clone(),
            source,
        })?,
        Err(_) => {
            warn!("{} timed out after {:?}", program_name, timeout);
            return Err(ToolFailure::TimedOut {
                program: program_name,
                timeout,
            });
        }
    };

    let elapsed = start_time.elapsed();
    debug!("{} finished in {:.1}s ({})", program_name, elapsed.as_secs_f64(), output.status);

    Ok(ToolOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bundled_tool_is_preferred_over_path() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join(executable_name("definitely-not-a-real-tool"));
        std::fs::write(&fake, b"").unwrap();

        let resolver = ToolResolver::with_tools_dir(dir.path().to_path_buf());
        assert_eq!(resolver.resolve("definitely-not-a-real-tool"), Some(fake));
        assert!(!ToolResolver::default().is_available("definitely-not-a-real-tool"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_captures_output() {
        let output = run_tool(Path::new("sh"), ["-c", "echo out; echo err >&2"], Duration::from_secs(10))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_times_out() {
        let result = run_tool(Path::new("sh"), ["-c", "sleep 5"], Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ToolFailure::TimedOut { .. })));
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let result = run_tool(
            Path::new("/nonexistent/bin/definitely-not-a-real-tool"),
            Vec::<String>::new(),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(ToolFailure::Spawn { .. })));
    }
}
