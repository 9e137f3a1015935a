//! Request planning.
//!
//! [`build`] turns an operation, the classified input stage and the raw
//! request into a [`Plan`]: the request with every flag interaction
//! resolved, an audit trail of what was changed, and the ordered steps the
//! pipeline will execute. Nothing here touches the filesystem, so every
//! rejection happens before an engine or helper is started.

use crate::{
    config::{DualLayout, TranslationConfig},
    engine::EngineKind,
    error::{PipelineError, Result},
    stage::PipelineStage,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Translate,
    Crop,
    CropCompare,
    Compare,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Translate => "translate",
            Operation::Crop => "crop",
            Operation::CropCompare => "crop-compare",
            Operation::Compare => "compare",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a step reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// The document the request was made with.
    Input,
    Mono,
    /// The dual file later steps should work on (for pdf2zh_next after
    /// relayout, the alternating-page one).
    Dual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Which files the engine writes follows the resolved `no_mono`/`no_dual`
    /// in [`Plan::request`]. Only the primary translation is retried.
    Translate {
        emit_mono: bool,
        emit_dual: bool,
        retry: bool,
    },
    /// pdf2zh_next: give the dual its directional name (`LR_dual`/`TB_dual`)
    /// and list it. With `alternating_copy`, an LR dual is also converted
    /// into a TB working copy for the crop steps.
    Relayout {
        layout: DualLayout,
        alternating_copy: bool,
    },
    Crop {
        from: Source,
        to: PipelineStage,
        optional: bool,
    },
    Merge {
        from: Source,
        to: PipelineStage,
        optional: bool,
    },
    /// The dual already is the target artifact; rename it into that stage.
    AdoptDual { as_stage: PipelineStage },
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub flag: &'static str,
    pub value: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub operation: Operation,
    pub engine: EngineKind,
    pub source: PipelineStage,
    pub request: TranslationConfig,
    pub resolutions: Vec<Resolution>,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn runs_engine(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, Step::Translate { .. }))
    }
}

struct Resolver {
    request: TranslationConfig,
    trail: Vec<Resolution>,
}

impl Resolver {
    fn set_flag(
        &mut self,
        flag: &'static str,
        field: fn(&mut TranslationConfig) -> &mut bool,
        value: bool,
        reason: &'static str,
    ) {
        let slot = field(&mut self.request);
        if *slot != value {
            *slot = value;
            self.trail.push(Resolution {
                flag,
                value: value.to_string(),
                reason,
            });
        }
    }

    fn set_layout(&mut self, layout: DualLayout, reason: &'static str) {
        if self.request.dual_mode != layout {
            self.request.dual_mode = layout;
            self.trail.push(Resolution {
                flag: "dual_mode",
                value: layout.as_str().to_string(),
                reason,
            });
        }
    }

    fn note(&mut self, flag: &'static str, value: &str, reason: &'static str) {
        self.trail.push(Resolution {
            flag,
            value: value.to_string(),
            reason,
        });
    }

    /// pdf2zh has no output suppression; it always writes both files.
    fn clear_suppression(&mut self) {
        const WHY: &str = "pdf2zh always writes mono and dual";
        self.set_flag("no_mono", |c| &mut c.no_mono, false, WHY);
        self.set_flag("no_dual", |c| &mut c.no_dual, false, WHY);
    }

    /// Engine run whose only purpose is a dual file for a later step.
    fn dual_only(&mut self, engine: EngineKind, layout: Option<DualLayout>) -> Step {
        match engine {
            EngineKind::Pdf2zh => {
                self.clear_suppression();
                Step::Translate {
                    emit_mono: false,
                    emit_dual: false,
                    retry: false,
                }
            }
            EngineKind::Pdf2zhNext => {
                if let Some(layout) = layout {
                    self.set_layout(layout, "cropping needs an alternating-page dual");
                }
                self.set_flag("no_dual", |c| &mut c.no_dual, false, "operation needs a dual file");
                self.set_flag("no_mono", |c| &mut c.no_mono, true, "only the dual file is used");
                Step::Translate {
                    emit_mono: false,
                    emit_dual: false,
                    retry: false,
                }
            }
        }
    }

    fn translate(&mut self, engine: EngineKind) -> Vec<Step> {
        let mut steps = Vec::new();
        let wants_dual_derivative =
            self.request.dual_cut || self.request.crop_compare || self.request.compare;

        match engine {
            EngineKind::Pdf2zh => {
                self.clear_suppression();
                steps.push(Step::Translate {
                    emit_mono: true,
                    emit_dual: true,
                    retry: true,
                });
            }
            EngineKind::Pdf2zhNext => {
                if self.request.mono_cut {
                    self.set_flag("no_mono", |c| &mut c.no_mono, false, "mono_cut needs the mono file");
                }
                if wants_dual_derivative {
                    self.set_flag(
                        "no_dual",
                        |c| &mut c.no_dual,
                        false,
                        "dual_cut/crop_compare/compare need the dual file",
                    );
                }
                if self.request.no_dual {
                    self.set_flag(
                        "no_mono",
                        |c| &mut c.no_mono,
                        false,
                        "pdf2zh_next writes mono when dual is suppressed",
                    );
                }
                steps.push(Step::Translate {
                    emit_mono: true,
                    emit_dual: !wants_dual_derivative,
                    retry: true,
                });
                if wants_dual_derivative {
                    let layout = self.request.dual_mode;
                    steps.push(Step::Relayout {
                        layout,
                        alternating_copy: layout == DualLayout::Lr
                            && (self.request.dual_cut || self.request.crop_compare),
                    });
                }
            }
        }

        if self.request.mono_cut {
            steps.push(Step::Crop {
                from: Source::Mono,
                to: PipelineStage::MonoCut,
                optional: true,
            });
        }
        if self.request.dual_cut {
            steps.push(Step::Crop {
                from: Source::Dual,
                to: PipelineStage::DualCut,
                optional: true,
            });
        }
        if self.request.crop_compare {
            steps.push(Step::Crop {
                from: Source::Dual,
                to: PipelineStage::CropCompare,
                optional: true,
            });
        }
        if self.request.compare {
            if engine == EngineKind::Pdf2zhNext && self.request.dual_mode == DualLayout::Lr {
                self.note("compare", "LR_dual", "an LR dual already shows pages side by side");
            } else {
                steps.push(Step::Merge {
                    from: Source::Dual,
                    to: PipelineStage::Compare,
                    optional: true,
                });
            }
        }
        steps
    }
}

/// Resolve `request` for `operation` on a document currently at `source`.
pub fn build(
    operation: Operation,
    source: PipelineStage,
    request: &TranslationConfig,
) -> Result<Plan> {
    let engine = request.engine_kind()?;
    let reject = PipelineError::InvalidSourceStage {
        operation,
        stage: source,
    };
    let mut r = Resolver {
        request: request.clone(),
        trail: Vec::new(),
    };

    let steps = match (operation, source) {
        (Operation::Translate, PipelineStage::Origin) => r.translate(engine),
        (Operation::Translate, _) => return Err(reject),

        (Operation::Crop, _) => {
            let to = source.crop_target().ok_or(reject)?;
            vec![Step::Crop {
                from: Source::Input,
                to,
                optional: false,
            }]
        }

        (Operation::CropCompare, PipelineStage::Origin) => vec![
            r.dual_only(engine, Some(DualLayout::Tb)),
            Step::Crop {
                from: Source::Dual,
                to: PipelineStage::CropCompare,
                optional: false,
            },
        ],
        (Operation::CropCompare, PipelineStage::Dual) => vec![Step::Crop {
            from: Source::Input,
            to: PipelineStage::CropCompare,
            optional: false,
        }],
        // already cropped: only the side-by-side merge is left
        (Operation::CropCompare, PipelineStage::DualCut) => vec![Step::Merge {
            from: Source::Input,
            to: PipelineStage::CropCompare,
            optional: false,
        }],
        (Operation::CropCompare, _) => return Err(reject),

        (Operation::Compare, PipelineStage::Origin) => {
            let translate = r.dual_only(engine, None);
            let lr = r.request.dual_mode == DualLayout::Lr;
            if engine == EngineKind::Pdf2zhNext {
                let reason = if lr {
                    "requested layout kept: an LR dual already is the compare view"
                } else {
                    "requested layout kept: the TB dual is merged side by side"
                };
                let layout = r.request.dual_mode.as_str();
                r.note("dual_mode", layout, reason);
            }
            let finish = if engine == EngineKind::Pdf2zhNext && lr {
                Step::AdoptDual {
                    as_stage: PipelineStage::Compare,
                }
            } else {
                Step::Merge {
                    from: Source::Dual,
                    to: PipelineStage::Compare,
                    optional: false,
                }
            };
            vec![translate, finish]
        }
        (Operation::Compare, PipelineStage::Dual) => vec![Step::Merge {
            from: Source::Input,
            to: PipelineStage::Compare,
            optional: false,
        }],
        (Operation::Compare, _) => return Err(reject),
    };

    Ok(Plan {
        operation,
        engine,
        source,
        request: r.request,
        resolutions: r.trail,
        steps,
    })
}
