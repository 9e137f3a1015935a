pub mod python;

use crate::{config::DualLayout, error::Result, stage::PipelineStage};
use std::path::Path;

pub use python::PythonTools;

/// Page-level PDF operations the pipeline delegates to an external helper.
pub trait DocumentTools {
    fn page_count(&self, input: &Path) -> Result<u32>;

    /// Crop `input` (currently `from`) into `output` (stage `to`). Cropping a
    /// dual straight into `crop-compare` also merges the cropped pages.
    fn crop(&self, input: &Path, from: PipelineStage, output: &Path, to: PipelineStage)
        -> Result<()>;

    /// Place each original/translation page pair side by side.
    fn merge(&self, input: &Path, output: &Path) -> Result<()>;

    fn relayout(&self, input: &Path, from: DualLayout, output: &Path, to: DualLayout)
        -> Result<()>;
}
