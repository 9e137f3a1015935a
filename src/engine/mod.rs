pub mod pdf2zh;
pub mod pdf2zh_next;

use crate::{
    artifact::{format_mb, verify_artifact, ArtifactSet},
    config::TranslationConfig,
    error::{PipelineError, Result},
    process::{CommandRunner, ToolCommand},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

pub use pdf2zh::Pdf2zh;
pub use pdf2zh_next::Pdf2zhNext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    #[serde(rename = "pdf2zh")]
    Pdf2zh,
    #[serde(rename = "pdf2zh_next")]
    Pdf2zhNext,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Pdf2zh => "pdf2zh",
            EngineKind::Pdf2zhNext => "pdf2zh_next",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "pdf2zh" => Ok(EngineKind::Pdf2zh),
            "pdf2zh_next" => Ok(EngineKind::Pdf2zhNext),
            other => Err(PipelineError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// Pages handed to the engine, 1-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start_page: u32,
    pub end_page: u32,
}

impl PageRange {
    /// `[1, total - skip_last]`, or `None` when nothing is skipped.
    pub fn trimmed(total_pages: u32, skip_last: u32) -> Result<Option<Self>> {
        if skip_last == 0 {
            return Ok(None);
        }
        if skip_last >= total_pages {
            return Err(PipelineError::InvalidRequest(format!(
                "skip_last_pages={skip_last} leaves no pages of {total_pages}"
            )));
        }
        Ok(Some(Self {
            start_page: 1,
            end_page: total_pages - skip_last,
        }))
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_page, self.end_page)
    }
}

/// Everything an adapter needs for one run; flags are already resolved.
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    pub config: &'a TranslationConfig,
    pub pages: Option<PageRange>,
    /// Allow the single retry with the adapter's `retry_flag`.
    pub retry: bool,
}

pub trait TranslationEngine {
    fn kind(&self) -> EngineKind;

    /// Files a successful run writes for `input`, mono first. Known before
    /// the run so later steps can be named up front.
    fn expected_outputs(&self, input: &Path, cfg: &TranslationConfig) -> Vec<PathBuf>;

    /// Produce the base mono/dual artifacts for `input`.
    fn translate(&self, input: &Path, req: &EngineRequest<'_>) -> Result<ArtifactSet>;
}

/// Run once; on a non-zero exit run again with `retry_flag` added, unless
/// `retry_flag` is `None`. Timeouts and spawn failures propagate immediately.
pub(crate) fn run_with_retry(
    runner: &dyn CommandRunner,
    cmd: &ToolCommand,
    retry_flag: Option<&str>,
) -> Result<()> {
    let Some(retry_flag) = retry_flag else {
        return runner.run(cmd);
    };
    match runner.run(cmd) {
        Ok(()) => Ok(()),
        Err(err @ PipelineError::ExternalToolFailure { .. }) => {
            warn!("{} failed, retrying with {retry_flag}: {err}", cmd.program);
            let mut retry = cmd.clone();
            if !retry_flag.is_empty() && !retry.has_arg(retry_flag) {
                retry.arg(retry_flag);
            }
            runner.run(&retry)
        }
        Err(err) => Err(err),
    }
}

/// Verify every expected output, logging sizes the way a user would want
/// to see them.
pub(crate) fn collect_outputs(engine: EngineKind, expected: Vec<PathBuf>) -> Result<ArtifactSet> {
    let mut set = ArtifactSet::new();
    for path in expected {
        let size = verify_artifact(&path)?;
        info!("{engine} produced {} ({})", path.display(), format_mb(size));
        set.push(path);
    }
    Ok(set)
}

/// Input file name without `.pdf`, used as the stem of engine outputs.
pub(crate) fn document_stem(input: &Path) -> String {
    let name = crate::stage::file_name(input);
    crate::naming::strip_pdf_extension(&name).to_string()
}
