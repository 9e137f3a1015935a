use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An external invocation: program plus arguments, before any launcher prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// Seam between the engine adapters and the operating system.
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &ToolCommand) -> Result<()>;
}

/// Runs commands as child processes, optionally behind a launcher prefix
/// (an isolated environment such as `uv run`).
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    pub launcher: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub keep_stderr: bool,
}

impl ProcessRunner {
    pub fn new(launcher: Vec<String>, timeout_seconds: u64) -> Self {
        Self {
            launcher,
            env: BTreeMap::new(),
            timeout: (timeout_seconds > 0).then(|| Duration::from_secs(timeout_seconds)),
            keep_stderr: true,
        }
    }

    fn build(&self, cmd: &ToolCommand) -> Command {
        let mut command = match self.launcher.split_first() {
            Some((head, rest)) => {
                let mut c = Command::new(head);
                c.args(rest).arg(&cmd.program);
                c
            }
            None => Command::new(&cmd.program),
        };
        command.args(&cmd.args);
        for (k, v) in &self.env {
            command.env(k, v);
        }
        command
    }

    /// Run with `stdin` piped in and return the captured output of a
    /// successful exit.
    pub fn run_with_input(&self, cmd: &ToolCommand, stdin: &[u8]) -> Result<Output> {
        debug!("run {cmd} timeout={:?}", self.timeout);
        let mut command = self.build(cmd);
        // own process group, so a timeout also reaches what a launcher forked
        #[cfg(unix)]
        if self.timeout.is_some() {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command.spawn()?;
        {
            let mut pipe = child.stdin.take().ok_or_else(|| {
                PipelineError::Io(std::io::Error::other("child stdin unavailable"))
            })?;
            pipe.write_all(stdin)?;
            pipe.flush().ok();
        }

        let output = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout, &cmd.program)?,
            None => child.wait_with_output()?,
        };

        if !output.status.success() {
            return Err(PipelineError::ExternalToolFailure {
                tool: cmd.program.clone(),
                status: output.status.to_string(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), 4000),
            });
        }

        if self.keep_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} stderr: {}", cmd.program, stderr.trim());
        }
        Ok(output)
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &ToolCommand) -> Result<()> {
        self.run_with_input(cmd, &[]).map(|_| ())
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration, tool: &str) -> Result<Output> {
    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let join = |h: std::thread::JoinHandle<std::io::Result<Vec<u8>>>| -> Result<Vec<u8>> {
        h.join()
            .map_err(|_| PipelineError::Io(std::io::Error::other("pipe reader thread panicked")))?
            .map_err(PipelineError::from)
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            let stdout = join(stdout_thread)?;
            let stderr = join(stderr_thread)?;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("{tool} timed out after {:?}", timeout);
            kill_tree(child);
            child.wait()?;
            // a descendant outside the group may still hold the pipes; leave
            // the reader threads detached instead of waiting on them
            drop(stdout_thread);
            drop(stderr_thread);
            return Err(PipelineError::Timeout {
                tool: tool.to_string(),
                seconds: timeout.as_secs(),
            });
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Kill the child and its process group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let status = Command::new("kill")
            .args(["-s", "KILL", "--", group.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = status {
            warn!("could not kill process group {group}: {e}");
        }
    }
    let _ = child.kill();
}

fn tail(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &s[start..])
}
