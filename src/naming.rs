//! Output file naming.
//!
//! Each engine names its artifacts with its own grammar: pdf2zh joins stage
//! segments with `-` (`paper-mono.pdf`), pdf2zh_next with `.`
//! (`paper.mono.pdf`). Derivation classifies the input first and then swaps
//! only the matched stage marker, so a derived name always classifies as the
//! requested stage.

use crate::{
    config::DualLayout,
    engine::EngineKind,
    error::{PipelineError, Result},
    stage::{classify_name, file_name, PipelineStage},
};
use std::path::{Path, PathBuf};

pub trait NamingScheme: Send + Sync {
    fn separator(&self) -> char;

    /// Stage segment placed before `.pdf`. `None` for `origin`.
    fn segment(&self, stage: PipelineStage) -> Option<&'static str>;

    fn join(&self, stem: &str, segment: &str) -> String {
        format!("{stem}{}{segment}.pdf", self.separator())
    }
}

/// pdf2zh: `paper-mono.pdf`, `paper-dual-cut.pdf`, `paper-cut.pdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HyphenScheme;

/// pdf2zh_next: `paper.mono.pdf`, `paper.dual.cut.pdf`, `paper.cut.pdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotScheme;

impl NamingScheme for HyphenScheme {
    fn separator(&self) -> char {
        '-'
    }

    fn segment(&self, stage: PipelineStage) -> Option<&'static str> {
        Some(match stage {
            PipelineStage::Origin => return None,
            // shorthand, not "origin-cut"
            PipelineStage::OriginCut => "cut",
            PipelineStage::Mono => "mono",
            PipelineStage::Dual => "dual",
            PipelineStage::MonoCut => "mono-cut",
            PipelineStage::DualCut => "dual-cut",
            PipelineStage::Compare => "compare",
            PipelineStage::CropCompare => "crop-compare",
        })
    }
}

impl NamingScheme for DotScheme {
    fn separator(&self) -> char {
        '.'
    }

    fn segment(&self, stage: PipelineStage) -> Option<&'static str> {
        Some(match stage {
            PipelineStage::Origin => return None,
            PipelineStage::OriginCut => "cut",
            PipelineStage::Mono => "mono",
            PipelineStage::Dual => "dual",
            PipelineStage::MonoCut => "mono.cut",
            PipelineStage::DualCut => "dual.cut",
            PipelineStage::Compare => "compare",
            PipelineStage::CropCompare => "crop.compare",
        })
    }
}

pub fn scheme_for(engine: EngineKind) -> &'static dyn NamingScheme {
    match engine {
        EngineKind::Pdf2zh => &HyphenScheme,
        EngineKind::Pdf2zhNext => &DotScheme,
    }
}

/// Name of `input` once it has been processed into `target` by `engine`.
pub fn derive(input: &Path, target: PipelineStage, engine: EngineKind) -> Result<PathBuf> {
    derive_with(input, target, scheme_for(engine))
}

pub fn derive_with(
    input: &Path,
    target: PipelineStage,
    scheme: &dyn NamingScheme,
) -> Result<PathBuf> {
    let segment = scheme.segment(target).ok_or_else(|| {
        PipelineError::InvalidRequest(format!("'{target}' is not a derivable stage"))
    })?;

    let name = file_name(input);
    let classified = classify_name(&name);
    let out_name = match classified.marker {
        None => scheme.join(strip_pdf_extension(&name), segment),
        Some(marker) => format!("{}{segment}.pdf", &name[..name.len() - marker.len()]),
    };

    // A stem ending in "crop-" would make "compare" read back as "crop-compare".
    let read_back = classify_name(&out_name).stage;
    if read_back != target {
        return Err(PipelineError::InvalidRequest(format!(
            "derived name {out_name} would classify as '{read_back}', not '{target}'"
        )));
    }
    Ok(input.with_file_name(out_name))
}

/// `x.dual.pdf` → `x.LR_dual.pdf` / `x.TB_dual.pdf`.
pub fn layout_variant(dual: &Path, layout: DualLayout) -> Result<PathBuf> {
    let name = file_name(dual);
    let classified = classify_name(&name);
    if classified.stage != PipelineStage::Dual {
        return Err(PipelineError::InvalidRequest(format!(
            "layout variant requested for non-dual file: {name}"
        )));
    }
    let stem = &name[..name.len() - "dual.pdf".len()];
    Ok(dual.with_file_name(format!("{stem}{}_dual.pdf", layout.as_str())))
}

/// File name without a trailing `.pdf` (any case).
pub fn strip_pdf_extension(name: &str) -> &str {
    let n = name.len();
    if n >= 4 && name.is_char_boundary(n - 4) && name[n - 4..].eq_ignore_ascii_case(".pdf") {
        &name[..n - 4]
    } else {
        name
    }
}
