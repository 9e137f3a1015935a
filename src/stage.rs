use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Position of an artifact in the pipeline.
///
/// Stages travel through the crate as this enum. File names are only parsed
/// back into a stage at the output-directory boundary, see [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Origin,
    OriginCut,
    Mono,
    Dual,
    MonoCut,
    DualCut,
    Compare,
    CropCompare,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 8] = [
        PipelineStage::Origin,
        PipelineStage::OriginCut,
        PipelineStage::Mono,
        PipelineStage::Dual,
        PipelineStage::MonoCut,
        PipelineStage::DualCut,
        PipelineStage::Compare,
        PipelineStage::CropCompare,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Origin => "origin",
            PipelineStage::OriginCut => "origin-cut",
            PipelineStage::Mono => "mono",
            PipelineStage::Dual => "dual",
            PipelineStage::MonoCut => "mono-cut",
            PipelineStage::DualCut => "dual-cut",
            PipelineStage::Compare => "compare",
            PipelineStage::CropCompare => "crop-compare",
        }
    }

    /// Every stage except `origin` can be the output of a pipeline step.
    pub fn is_producible(self) -> bool {
        self != PipelineStage::Origin
    }

    /// Stage a plain crop turns this stage into, if any.
    pub fn crop_target(self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Origin => Some(PipelineStage::OriginCut),
            PipelineStage::Mono => Some(PipelineStage::MonoCut),
            PipelineStage::Dual => Some(PipelineStage::DualCut),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suffix markers in precedence order. Some markers are suffixes of others
/// (`compare.pdf` of `crop-compare.pdf`, `cut.pdf` of every cut marker), so
/// the order is load-bearing.
const MARKERS: &[(&str, PipelineStage)] = &[
    ("mono.pdf", PipelineStage::Mono),
    ("dual.pdf", PipelineStage::Dual),
    ("dual-cut.pdf", PipelineStage::DualCut),
    ("dual.cut.pdf", PipelineStage::DualCut),
    ("mono-cut.pdf", PipelineStage::MonoCut),
    ("mono.cut.pdf", PipelineStage::MonoCut),
    ("crop-compare.pdf", PipelineStage::CropCompare),
    ("crop.compare.pdf", PipelineStage::CropCompare),
    ("compare.pdf", PipelineStage::Compare),
    ("cut.pdf", PipelineStage::OriginCut),
];

/// Result of matching a file name against the stage markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub stage: PipelineStage,
    /// The suffix that matched; `None` for `origin`.
    pub marker: Option<&'static str>,
}

/// Classify a path by its file name. Total: anything unrecognised is `origin`.
pub fn classify(path: impl AsRef<Path>) -> PipelineStage {
    classify_name(&file_name(path.as_ref())).stage
}

pub fn classify_name(name: &str) -> Classified {
    for &(marker, stage) in MARKERS {
        if name.ends_with(marker) {
            return Classified {
                stage,
                marker: Some(marker),
            };
        }
    }
    Classified {
        stage: PipelineStage::Origin,
        marker: None,
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
