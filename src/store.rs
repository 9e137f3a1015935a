use crate::{
    config::Config,
    error::PipelineError,
    naming::strip_pdf_extension,
    util::{ensure_dir, hash_file, looks_like_url},
};
use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap());

/// The flat output directory: inbound documents land here and every
/// artifact is written and fetched from here, by bare file name.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
    max_document_bytes: u64,
    reject_url_inputs: bool,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_document_bytes: u64::MAX,
            reject_url_inputs: true,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            root: PathBuf::from(&cfg.paths.out_dir),
            max_document_bytes: cfg.security.max_document_bytes,
            reject_url_inputs: cfg.security.reject_url_inputs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `src` into the store under its (normalized) file name, or under
    /// `name` when given. Returns the stored path.
    pub fn persist(&self, src: &Path, name: Option<&str>) -> Result<PathBuf> {
        let src_str = src.display().to_string();
        if self.reject_url_inputs && looks_like_url(&src_str) {
            bail!("URL inputs are disabled: {src_str}");
        }
        let meta = std::fs::metadata(src).with_context(|| format!("stat input: {src_str}"))?;
        if !meta.is_file() {
            bail!("input is not a file: {src_str}");
        }
        if meta.len() > self.max_document_bytes {
            bail!(
                "input exceeds max_document_bytes ({} > {})",
                meta.len(),
                self.max_document_bytes
            );
        }

        let raw_name = match name {
            Some(n) => n.to_string(),
            None => src
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("input has no file name: {src_str}"))?,
        };
        let file_name = sanitize_document_name(&raw_name)?;

        ensure_dir(&self.root)?;
        let dest = self.root.join(&file_name);
        if dest.exists() {
            let same_file = match (src.canonicalize(), dest.canonicalize()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
            if same_file {
                debug!("input already in output dir: {}", dest.display());
                return Ok(dest);
            }
            if hash_file(src)? == hash_file(&dest)? {
                debug!("identical document already stored: {}", dest.display());
                return Ok(dest);
            }
            warn!("replacing stored document {}", dest.display());
        }

        std::fs::copy(src, &dest)
            .with_context(|| format!("copy {} -> {}", src_str, dest.display()))?;
        info!("stored document {}", dest.display());
        Ok(dest)
    }

    /// Path of an artifact by bare name; anything that is not a plain file
    /// directly under the store is `NotFound`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, PipelineError> {
        let not_found = || PipelineError::NotFound(name.to_string());
        let plain = Path::new(name)
            .file_name()
            .is_some_and(|f| f == std::ffi::OsStr::new(name));
        if !plain || name == "." || name == ".." {
            return Err(not_found());
        }
        let path = self.root.join(name);
        if path.is_file() { Ok(path) } else { Err(not_found()) }
    }

    pub fn fetch(&self, name: &str) -> Result<Vec<u8>, PipelineError> {
        let path = self.resolve(name)?;
        Ok(std::fs::read(path)?)
    }
}

/// NFC-normalize a document name and replace characters that would escape
/// the output directory or break the engines' command lines.
pub fn sanitize_document_name(raw: &str) -> Result<String> {
    let nfc: String = raw.trim().nfc().collect();
    let cleaned = UNSAFE_NAME_CHARS.replace_all(&nfc, "_").into_owned();
    let stem = strip_pdf_extension(&cleaned);
    if stem.trim_matches(|c| c == '.' || c == '_').is_empty() {
        bail!("invalid document name: {raw:?}");
    }
    if stem.len() == cleaned.len() {
        bail!("document name must end with .pdf: {raw:?}");
    }
    Ok(cleaned)
}
