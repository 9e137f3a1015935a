use super::{
    collect_outputs, document_stem, run_with_retry, EngineKind, EngineRequest, TranslationEngine,
};
use crate::{
    artifact::ArtifactSet,
    config::{DualLayout, EngineSettings, TranslationConfig},
    error::Result,
    process::{CommandRunner, ToolCommand},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Feature flags that map one-to-one onto a command line token.
const FLAG_TOKENS: &[(fn(&TranslationConfig) -> bool, &str)] = &[
    (|c: &TranslationConfig| c.trans_first, "--dual-translate-first"),
    (|c: &TranslationConfig| c.skip_clean, "--skip-clean"),
    (|c: &TranslationConfig| c.disable_rich_text_translate, "--disable-rich-text-translate"),
    (|c: &TranslationConfig| c.enhance_compatibility, "--enhance-compatibility"),
    (|c: &TranslationConfig| c.save_auto_extracted_glossary, "--save-auto-extracted-glossary"),
    (|c: &TranslationConfig| c.disable_glossary, "--no-auto-extract-glossary"),
    (|c: &TranslationConfig| c.dual_mode == DualLayout::Tb, "--use-alternating-pages-dual"),
    (|c: &TranslationConfig| c.translate_table_text, "--translate-table-text"),
    (|c: &TranslationConfig| c.ocr, "--ocr-workaround"),
    (|c: &TranslationConfig| c.auto_ocr, "--auto-enable-ocr-workaround"),
];

/// Adapter for pdf2zh_next. Which files it writes depends on the resolved
/// `no_mono`/`no_dual` flags, and their names carry the watermark mode and
/// target language: `<stem>[.no_watermark].<lang>.{mono,dual}.pdf`.
pub struct Pdf2zhNext {
    settings: EngineSettings,
    out_dir: PathBuf,
    runner: Box<dyn CommandRunner>,
}

impl Pdf2zhNext {
    pub fn new(settings: EngineSettings, out_dir: impl Into<PathBuf>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            settings,
            out_dir: out_dir.into(),
            runner,
        }
    }

    /// Provider id the engine expects for a user-facing service name.
    pub fn provider<'a>(&'a self, service: &'a str) -> &'a str {
        self.settings
            .service_map
            .get(service)
            .map(String::as_str)
            .unwrap_or(service)
    }

    pub fn command(&self, input: &Path, req: &EngineRequest<'_>) -> ToolCommand {
        let cfg = req.config;
        let mut cmd = ToolCommand::new(&self.settings.program);
        cmd.arg(input.display().to_string())
            .arg(format!("--{}", self.provider(&cfg.service)))
            .args(["--qps".to_string(), cfg.thread_num.to_string()])
            .args(["--output".to_string(), self.out_dir.display().to_string()])
            .args(["--lang-in", cfg.source_lang.as_str()])
            .args(["--lang-out", cfg.target_lang.as_str()]);
        if !self.settings.config_file.is_empty() {
            cmd.args(["--config", self.settings.config_file.as_str()]);
        }
        let watermark = if cfg.no_watermark { "no_watermark" } else { "watermarked" };
        cmd.args(["--watermark-output-mode", watermark]);
        if let Some(pages) = req.pages {
            cmd.args(["--pages".to_string(), pages.to_string()]);
        }
        if cfg.no_dual {
            cmd.arg("--no-dual");
        } else if cfg.no_mono {
            cmd.arg("--no-mono");
        }
        for (enabled, token) in FLAG_TOKENS {
            if enabled(cfg) {
                cmd.arg(*token);
            }
        }
        if cfg.skip_font_subsets {
            cmd.arg(self.settings.retry_flag.as_str());
        }
        cmd
    }
}

impl TranslationEngine for Pdf2zhNext {
    fn kind(&self) -> EngineKind {
        EngineKind::Pdf2zhNext
    }

    /// Follows the resolved `no_mono`/`no_dual`; names carry the watermark
    /// mode and the target language.
    fn expected_outputs(&self, input: &Path, cfg: &TranslationConfig) -> Vec<PathBuf> {
        let stem = document_stem(input);
        let watermark = if cfg.no_watermark { ".no_watermark" } else { "" };
        let lang = &cfg.target_lang;
        let mut out = Vec::new();
        if !cfg.no_mono {
            out.push(self.out_dir.join(format!("{stem}{watermark}.{lang}.mono.pdf")));
        }
        if !cfg.no_dual {
            out.push(self.out_dir.join(format!("{stem}{watermark}.{lang}.dual.pdf")));
        }
        out
    }

    fn translate(&self, input: &Path, req: &EngineRequest<'_>) -> Result<ArtifactSet> {
        let expected = self.expected_outputs(input, req.config);
        debug!(?expected, "pdf2zh_next expected outputs");
        let cmd = self.command(input, req);
        info!("pdf2zh_next translating {}", input.display());
        let retry_flag = req.retry.then_some(self.settings.retry_flag.as_str());
        run_with_retry(self.runner.as_ref(), &cmd, retry_flag)?;
        collect_outputs(self.kind(), expected)
    }
}
