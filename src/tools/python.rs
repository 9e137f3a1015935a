use super::DocumentTools;
use crate::{
    config::{Config, DualLayout},
    error::{PipelineError, Result},
    process::{ProcessRunner, ToolCommand},
    stage::PipelineStage,
};
use anyhow::anyhow;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const SCRIPT: &str = "pdf_tools.py";

/// Runs `scripts/pdf_tools.py` with a JSON request on stdin and reads a JSON
/// reply from stdout.
pub struct PythonTools {
    python_exe: String,
    script: PathBuf,
    runner: ProcessRunner,
}

#[derive(Debug, Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    page_count: Option<u32>,
}

impl PythonTools {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let script = PathBuf::from(&cfg.paths.scripts_dir).join(SCRIPT);
        if !script.exists() {
            return Err(anyhow!("missing script: {}", script.display()));
        }
        let mut runner = ProcessRunner::new(Vec::new(), cfg.tools.timeout_seconds);
        runner.keep_stderr = cfg.debug.keep_tool_stderr;
        Ok(Self {
            python_exe: cfg.tools.python_exe.clone(),
            script,
            runner,
        })
    }

    fn run_json<O: for<'de> Deserialize<'de>>(&self, req: &serde_json::Value) -> Result<O> {
        let cmd_name = req["cmd"].as_str().unwrap_or("?");
        let tool = format!("{SCRIPT} {cmd_name}");
        debug!("{tool} {req}");

        let mut cmd = ToolCommand::new(&self.python_exe);
        cmd.arg(self.script.display().to_string());
        let input = serde_json::to_vec(req).map_err(std::io::Error::other)?;
        let output = self.runner.run_with_input(&cmd, &input)?;

        serde_json::from_slice(&output.stdout).map_err(|e| PipelineError::ExternalToolFailure {
            tool,
            status: "invalid reply".into(),
            stderr: e.to_string(),
        })
    }

    fn call(&self, req: serde_json::Value) -> Result<Reply> {
        let reply: Reply = self.run_json(&req)?;
        if !reply.ok {
            return Err(PipelineError::ExternalToolFailure {
                tool: format!("{SCRIPT} {}", req["cmd"].as_str().unwrap_or("?")),
                status: "ok=false".into(),
                stderr: reply.error.unwrap_or_default(),
            });
        }
        Ok(reply)
    }

    /// Interpreter and pypdf versions, as reported by the helper.
    pub fn doctor(&self) -> Result<serde_json::Value> {
        self.run_json(&serde_json::json!({"cmd": "doctor"}))
    }
}

impl DocumentTools for PythonTools {
    fn page_count(&self, input: &Path) -> Result<u32> {
        let reply = self.call(serde_json::json!({"cmd": "page_count", "input_pdf": input}))?;
        reply.page_count.ok_or_else(|| PipelineError::ExternalToolFailure {
            tool: format!("{SCRIPT} page_count"),
            status: "invalid reply".into(),
            stderr: "missing page_count".into(),
        })
    }

    fn crop(
        &self,
        input: &Path,
        from: PipelineStage,
        output: &Path,
        to: PipelineStage,
    ) -> Result<()> {
        self.call(serde_json::json!({
            "cmd": "crop",
            "input_pdf": input,
            "input_type": from,
            "output_pdf": output,
            "output_type": to,
        }))
        .map(|_| ())
    }

    fn merge(&self, input: &Path, output: &Path) -> Result<()> {
        self.call(serde_json::json!({
            "cmd": "merge",
            "input_pdf": input,
            "output_pdf": output,
        }))
        .map(|_| ())
    }

    fn relayout(
        &self,
        input: &Path,
        from: DualLayout,
        output: &Path,
        to: DualLayout,
    ) -> Result<()> {
        self.call(serde_json::json!({
            "cmd": "relayout",
            "input_pdf": input,
            "from": from,
            "output_pdf": output,
            "to": to,
        }))
        .map(|_| ())
    }
}
