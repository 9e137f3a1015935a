use crate::{engine::EngineKind, error::PipelineError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub engines: Engines,
    #[serde(default)]
    pub tools: Tools,
    #[serde(default)]
    pub security: Security,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    /// Request used when the command line does not supply one.
    #[serde(default)]
    pub request: TranslationConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Flat directory holding inbound documents and every produced artifact.
    pub out_dir: String,
    pub scripts_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "translated".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engines {
    #[serde(default = "EngineSettings::pdf2zh")]
    pub pdf2zh: EngineSettings,
    #[serde(default = "EngineSettings::pdf2zh_next")]
    pub pdf2zh_next: EngineSettings,
}
impl Default for Engines {
    fn default() -> Self {
        Self {
            pdf2zh: EngineSettings::pdf2zh(),
            pdf2zh_next: EngineSettings::pdf2zh_next(),
        }
    }
}
impl Engines {
    pub fn settings(&self, kind: EngineKind) -> &EngineSettings {
        match kind {
            EngineKind::Pdf2zh => &self.pdf2zh,
            EngineKind::Pdf2zhNext => &self.pdf2zh_next,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub program: String,
    /// Prefix that runs the program inside an isolated environment,
    /// e.g. `["uv", "run", "--project", "venvs/pdf2zh"]`. Empty runs it directly.
    #[serde(default)]
    pub launcher: Vec<String>,
    /// Passed as `--config` when non-empty.
    #[serde(default)]
    pub config_file: String,
    /// 0 disables the timeout.
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Token appended on the single retry after a failed run.
    #[serde(default = "default_retry_flag")]
    pub retry_flag: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// User-facing service name → engine provider id.
    #[serde(default)]
    pub service_map: BTreeMap<String, String>,
}
fn default_retry_flag() -> String {
    "--skip-subset-fonts".into()
}

impl EngineSettings {
    pub fn pdf2zh() -> Self {
        Self {
            program: "pdf2zh".into(),
            launcher: Vec::new(),
            config_file: String::new(),
            timeout_seconds: 0,
            retry_flag: default_retry_flag(),
            env: Default::default(),
            service_map: Default::default(),
        }
    }

    pub fn pdf2zh_next() -> Self {
        let service_map = [
            ("ModelScope", "modelscope"),
            ("openailiked", "openaicompatible"),
            ("tencent", "tencentmechinetranslation"),
            ("silicon", "siliconflow"),
            ("qwen-mt", "qwenmt"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            program: "pdf2zh_next".into(),
            launcher: Vec::new(),
            config_file: String::new(),
            timeout_seconds: 0,
            retry_flag: default_retry_flag(),
            env: Default::default(),
            service_map,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tools {
    pub python_exe: String,
    pub timeout_seconds: u64,
}
impl Default for Tools {
    fn default() -> Self {
        Self {
            python_exe: "python3".into(),
            timeout_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
    pub max_document_bytes: u64,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
            max_document_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_tool_stderr: bool,
    /// Log the resolved plan before executing it.
    pub dump_plan: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_tool_stderr: true,
            dump_plan: false,
        }
    }
}

/// Dual file layout produced by pdf2zh_next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DualLayout {
    /// Original and translation side by side on one page.
    #[serde(rename = "LR")]
    Lr,
    /// Original and translation on alternating pages.
    #[serde(rename = "TB")]
    Tb,
}

impl DualLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            DualLayout::Lr => "LR",
            DualLayout::Tb => "TB",
        }
    }
}

/// Per-request translation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub engine: String,
    pub service: String,
    #[serde(alias = "sourceLang")]
    pub source_lang: String,
    #[serde(alias = "targetLang")]
    pub target_lang: String,
    pub thread_num: u32,

    pub mono_cut: bool,
    pub dual_cut: bool,
    pub crop_compare: bool,
    pub compare: bool,

    pub no_mono: bool,
    pub no_dual: bool,
    pub no_watermark: bool,

    pub trans_first: bool,
    pub skip_clean: bool,
    pub skip_font_subsets: bool,
    pub disable_rich_text_translate: bool,
    pub enhance_compatibility: bool,
    pub translate_table_text: bool,
    pub ocr: bool,
    pub auto_ocr: bool,
    pub disable_glossary: bool,
    pub save_auto_extracted_glossary: bool,
    pub babeldoc: bool,

    pub dual_mode: DualLayout,
    pub skip_last_pages: u32,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Pdf2zh.as_str().into(),
            service: "bing".into(),
            source_lang: "en".into(),
            target_lang: "zh-CN".into(),
            thread_num: 4,
            mono_cut: false,
            dual_cut: false,
            crop_compare: false,
            compare: false,
            no_mono: false,
            no_dual: false,
            no_watermark: false,
            trans_first: false,
            skip_clean: false,
            skip_font_subsets: false,
            disable_rich_text_translate: false,
            enhance_compatibility: false,
            translate_table_text: false,
            ocr: false,
            auto_ocr: false,
            disable_glossary: false,
            save_auto_extracted_glossary: false,
            babeldoc: false,
            dual_mode: DualLayout::Lr,
            skip_last_pages: 0,
        }
    }
}

impl TranslationConfig {
    /// Read a request file; `.json` is parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading request: {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let req = if is_json {
            serde_json::from_str(&raw).with_context(|| "parsing request JSON")?
        } else {
            toml::from_str(&raw).with_context(|| "parsing request TOML")?
        };
        Ok(req)
    }

    pub fn engine_kind(&self) -> Result<EngineKind, PipelineError> {
        self.engine.parse()
    }
}
