use super::{
    collect_outputs, document_stem, run_with_retry, EngineKind, EngineRequest, TranslationEngine,
};
use crate::{
    artifact::ArtifactSet,
    config::{EngineSettings, TranslationConfig},
    error::Result,
    process::{CommandRunner, ToolCommand},
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Adapter for pdf2zh 1.x. Always writes `<stem>-mono.pdf` and
/// `<stem>-dual.pdf` into the output directory.
pub struct Pdf2zh {
    settings: EngineSettings,
    out_dir: PathBuf,
    runner: Box<dyn CommandRunner>,
}

impl Pdf2zh {
    pub fn new(settings: EngineSettings, out_dir: impl Into<PathBuf>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            settings,
            out_dir: out_dir.into(),
            runner,
        }
    }

    pub fn command(&self, input: &Path, req: &EngineRequest<'_>) -> ToolCommand {
        let cfg = req.config;
        let mut cmd = ToolCommand::new(&self.settings.program);
        cmd.arg(input.display().to_string())
            .args(["--t".to_string(), cfg.thread_num.to_string()])
            .args(["--output".to_string(), self.out_dir.display().to_string()])
            .args(["--service", cfg.service.as_str()])
            .args(["--lang-in", legacy_lang(&cfg.source_lang)])
            .args(["--lang-out", legacy_lang(&cfg.target_lang)]);
        if !self.settings.config_file.is_empty() {
            cmd.args(["--config", self.settings.config_file.as_str()]);
        }
        if let Some(pages) = req.pages {
            cmd.args(["-p".to_string(), pages.to_string()]);
        }
        if cfg.skip_font_subsets {
            cmd.arg(self.settings.retry_flag.as_str());
        }
        if cfg.babeldoc {
            cmd.arg("--babeldoc");
        }
        cmd
    }
}

/// pdf2zh 1.x only understands `zh` for simplified Chinese.
fn legacy_lang(code: &str) -> &str {
    if code == "zh-CN" { "zh" } else { code }
}

impl TranslationEngine for Pdf2zh {
    fn kind(&self) -> EngineKind {
        EngineKind::Pdf2zh
    }

    /// pdf2zh has no output suppression: always mono and dual.
    fn expected_outputs(&self, input: &Path, _cfg: &TranslationConfig) -> Vec<PathBuf> {
        let stem = document_stem(input);
        vec![
            self.out_dir.join(format!("{stem}-mono.pdf")),
            self.out_dir.join(format!("{stem}-dual.pdf")),
        ]
    }

    fn translate(&self, input: &Path, req: &EngineRequest<'_>) -> Result<ArtifactSet> {
        let cmd = self.command(input, req);
        info!("pdf2zh translating {}", input.display());
        let retry_flag = req.retry.then_some(self.settings.retry_flag.as_str());
        run_with_retry(self.runner.as_ref(), &cmd, retry_flag)?;
        collect_outputs(self.kind(), self.expected_outputs(input, req.config))
    }
}
