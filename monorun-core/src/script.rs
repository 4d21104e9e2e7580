//! Script runner seam and the default child-process implementation.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::output::SinkHandle;
use crate::package::Package;

/// One script invocation as handed to the runner.
#[derive(Debug, Clone)]
pub struct ScriptInvocation {
    pub script: String,
    pub args: Vec<String>,
    pub client: String,
}

/// What the runner observed from the finished child.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes a named script inside a package directory.
///
/// When `sink` is `Some`, output lines are forwarded as they arrive in
/// addition to being captured; otherwise output is only captured.
pub trait ScriptRunner: Send + Sync {
    fn run(
        &self,
        package: &Package,
        invocation: &ScriptInvocation,
        sink: Option<&SinkHandle>,
    ) -> Result<ScriptOutput>;
}

/// Default runner: spawns `<client> run <script> [-- args…]` in the
/// package's directory.
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(&self, package: &Package, invocation: &ScriptInvocation) -> Command {
        let mut command = Command::new(&invocation.client);
        command.arg("run").arg(&invocation.script);
        if !invocation.args.is_empty() {
            command.arg("--").args(&invocation.args);
        }
        command.current_dir(&package.location);
        command
    }

    fn run_buffered(&self, package: &Package, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        let output = self
            .command(package, invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::Spawn {
                package: package.name.clone(),
                message: format!("failed to spawn '{}': {}", invocation.client, e),
            })?;

        Ok(ScriptOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn run_streamed(
        &self,
        package: &Package,
        invocation: &ScriptInvocation,
        sink: &SinkHandle,
    ) -> Result<ScriptOutput> {
        let spawn_err = |message: String| Error::Spawn {
            package: package.name.clone(),
            message,
        };

        let mut child = self
            .command(package, invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_err(format!("failed to spawn '{}': {}", invocation.client, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_err("failed to capture stderr".to_string()))?;

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stderr_buf_clone = Arc::clone(&stderr_buf);
        let stderr_sink = sink.clone();
        let stderr_package = package.name.clone();

        // stderr drains on a helper thread while this thread drains stdout;
        // the sink serializes the interleaving.
        let stderr_reader = std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                let trimmed = line.trim_end();
                stderr_sink.send_line(&stderr_package, trimmed, true);
                if let Ok(mut buf) = stderr_buf_clone.lock() {
                    buf.push_str(trimmed);
                    buf.push('\n');
                }
            }
        });

        let mut stdout_buf = String::new();
        for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
            let trimmed = line.trim_end();
            sink.send_line(&package.name, trimmed, false);
            stdout_buf.push_str(trimmed);
            stdout_buf.push('\n');
        }

        let _ = stderr_reader.join();

        let status = child
            .wait()
            .map_err(|e| spawn_err(format!("failed to wait for child: {e}")))?;

        let stderr_out = stderr_buf
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default();

        Ok(ScriptOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: stdout_buf,
            stderr: stderr_out,
        })
    }
}

impl ScriptRunner for ProcessRunner {
    fn run(
        &self,
        package: &Package,
        invocation: &ScriptInvocation,
        sink: Option<&SinkHandle>,
    ) -> Result<ScriptOutput> {
        match sink {
            Some(sink) => self.run_streamed(package, invocation, sink),
            None => self.run_buffered(package, invocation),
        }
    }
}
