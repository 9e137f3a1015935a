use crate::{
    artifact::{format_mb, verify_artifact, ArtifactSet},
    config::{Config, DualLayout, TranslationConfig},
    engine::{EngineKind, EngineRequest, PageRange, Pdf2zh, Pdf2zhNext, TranslationEngine},
    error::{PipelineError, Result},
    naming::{derive, layout_variant},
    plan::{self, Operation, Plan, Source, Step},
    process::ProcessRunner,
    stage::{classify, PipelineStage},
    tools::{DocumentTools, PythonTools},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct Pipeline {
    engines: Vec<Box<dyn TranslationEngine>>,
    tools: Box<dyn DocumentTools>,
    dump_plan: bool,
}

impl Pipeline {
    pub fn new(tools: Box<dyn DocumentTools>) -> Self {
        Self {
            engines: Vec::new(),
            tools,
            dump_plan: false,
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn TranslationEngine>) -> Self {
        self.engines.retain(|e| e.kind() != engine.kind());
        self.engines.push(engine);
        self
    }

    /// Both engine adapters as child processes plus the Python page helper.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let out_dir = PathBuf::from(&cfg.paths.out_dir);
        let runner = |kind: EngineKind| {
            let settings = cfg.engines.settings(kind);
            let mut r = ProcessRunner::new(settings.launcher.clone(), settings.timeout_seconds);
            r.env = settings.env.clone();
            r.keep_stderr = cfg.debug.keep_tool_stderr;
            Box::new(r)
        };
        let mut pipeline = Pipeline::new(Box::new(PythonTools::new(cfg)?))
            .with_engine(Box::new(Pdf2zh::new(
                cfg.engines.pdf2zh.clone(),
                &out_dir,
                runner(EngineKind::Pdf2zh),
            )))
            .with_engine(Box::new(Pdf2zhNext::new(
                cfg.engines.pdf2zh_next.clone(),
                &out_dir,
                runner(EngineKind::Pdf2zhNext),
            )));
        pipeline.dump_plan = cfg.debug.dump_plan;
        Ok(pipeline)
    }

    fn engine(&self, kind: EngineKind) -> Result<&dyn TranslationEngine> {
        self.engines
            .iter()
            .find(|e| e.kind() == kind)
            .map(|e| e.as_ref())
            .ok_or(PipelineError::UnknownEngine(kind))
    }

    pub fn plan(&self, operation: Operation, input: &Path, request: &TranslationConfig) -> Result<Plan> {
        plan::build(operation, classify(input), request)
    }

    pub fn translate(&self, input: &Path, request: &TranslationConfig) -> Result<ArtifactSet> {
        self.run(Operation::Translate, input, request)
    }

    pub fn crop(&self, input: &Path, request: &TranslationConfig) -> Result<ArtifactSet> {
        self.run(Operation::Crop, input, request)
    }

    pub fn crop_compare(&self, input: &Path, request: &TranslationConfig) -> Result<ArtifactSet> {
        self.run(Operation::CropCompare, input, request)
    }

    pub fn compare(&self, input: &Path, request: &TranslationConfig) -> Result<ArtifactSet> {
        self.run(Operation::Compare, input, request)
    }

    pub fn run(&self, operation: Operation, input: &Path, request: &TranslationConfig) -> Result<ArtifactSet> {
        let plan = self.plan(operation, input, request)?;
        info!(
            "{operation} {} stage={} engine={} steps={}",
            input.display(),
            plan.source,
            plan.engine,
            plan.steps.len()
        );
        for r in &plan.resolutions {
            info!("resolved {}={} ({})", r.flag, r.value, r.reason);
        }
        if self.dump_plan {
            info!(plan = ?plan, "plan");
        } else {
            debug!(?plan, "plan");
        }

        let engine = if plan.runs_engine() {
            Some(self.engine(plan.engine)?)
        } else {
            None
        };
        preflight(&plan, input, engine)?;

        let mut run = Run {
            plan: &plan,
            input: input.to_path_buf(),
            mono: None,
            dual: None,
            artifacts: ArtifactSet::new(),
        };
        for step in &plan.steps {
            self.execute(&mut run, engine, step)?;
        }

        if run.artifacts.is_empty() {
            return Err(PipelineError::InvalidRequest(format!(
                "{operation} produced no artifacts for {}",
                input.display()
            )));
        }
        Ok(run.artifacts)
    }

    fn execute(&self, run: &mut Run<'_>, engine: Option<&dyn TranslationEngine>, step: &Step) -> Result<()> {
        let kind = run.plan.engine;
        match *step {
            Step::Translate {
                emit_mono,
                emit_dual,
                retry,
            } => {
                let engine = engine.ok_or(PipelineError::UnknownEngine(kind))?;
                let pages = match run.plan.request.skip_last_pages {
                    0 => None,
                    skip => PageRange::trimmed(self.tools.page_count(&run.input)?, skip)?,
                };
                let req = EngineRequest {
                    config: &run.plan.request,
                    pages,
                    retry,
                };
                for path in engine.translate(&run.input, &req)? {
                    match classify(&path) {
                        PipelineStage::Mono => {
                            if emit_mono {
                                run.artifacts.push(path.clone());
                            }
                            run.mono = Some(path);
                        }
                        PipelineStage::Dual => {
                            if emit_dual {
                                run.artifacts.push(path.clone());
                            }
                            run.dual = Some(path);
                        }
                        other => warn!("{kind} produced unexpected {other} file {}", path.display()),
                    }
                }
            }

            Step::Relayout {
                layout,
                alternating_copy,
            } => {
                let dual = run.require(Source::Dual)?;
                let directional = layout_variant(&dual, layout)?;
                std::fs::rename(&dual, &directional)?;
                verify_artifact(&directional)?;
                run.artifacts.push(directional.clone());
                let mut working = directional.clone();
                if alternating_copy && layout == DualLayout::Lr {
                    let tb = layout_variant(&dual, DualLayout::Tb)?;
                    self.tools
                        .relayout(&directional, DualLayout::Lr, &tb, DualLayout::Tb)?;
                    verify_artifact(&tb)?;
                    working = tb;
                }
                debug!("working dual {}", working.display());
                run.dual = Some(working);
            }

            Step::Crop { from, to, optional } => {
                let Some(src) = run.source(from, optional)? else {
                    return Ok(());
                };
                let out = derive(&src, to, kind)?;
                let from_stage = classify(&src);
                info!("crop {} ({from_stage}) -> {} ({to})", src.display(), out.display());
                self.tools.crop(&src, from_stage, &out, to)?;
                run.emit(out)?;
            }

            Step::Merge { from, to, optional } => {
                let Some(src) = run.source(from, optional)? else {
                    return Ok(());
                };
                let out = derive(&src, to, kind)?;
                info!("merge {} -> {} ({to})", src.display(), out.display());
                self.tools.merge(&src, &out)?;
                run.emit(out)?;
            }

            Step::AdoptDual { as_stage } => {
                let dual = run.require(Source::Dual)?;
                let out = derive(&dual, as_stage, kind)?;
                info!("{} already is the {as_stage} view, renaming to {}", dual.display(), out.display());
                std::fs::rename(&dual, &out)?;
                run.dual = None;
                run.emit(out)?;
            }
        }
        Ok(())
    }
}

/// Walk the plan on file names alone, from the engine's expected outputs
/// onwards, so a name that cannot be derived is rejected before any
/// external call.
fn preflight(plan: &Plan, input: &Path, engine: Option<&dyn TranslationEngine>) -> Result<()> {
    let kind = plan.engine;
    let mut mono: Option<PathBuf> = None;
    let mut dual: Option<PathBuf> = None;
    for step in &plan.steps {
        match *step {
            Step::Translate { .. } => {
                let engine = engine.ok_or(PipelineError::UnknownEngine(kind))?;
                for path in engine.expected_outputs(input, &plan.request) {
                    match classify(&path) {
                        PipelineStage::Mono => mono = Some(path),
                        PipelineStage::Dual => dual = Some(path),
                        _ => {}
                    }
                }
            }
            Step::Relayout {
                layout,
                alternating_copy,
            } => {
                if let Some(d) = dual.take() {
                    let directional = layout_variant(&d, layout)?;
                    dual = Some(if alternating_copy && layout == DualLayout::Lr {
                        layout_variant(&d, DualLayout::Tb)?
                    } else {
                        directional
                    });
                }
            }
            Step::Crop { from, to, .. } | Step::Merge { from, to, .. } => {
                let src = match from {
                    Source::Input => Some(input.to_path_buf()),
                    Source::Mono => mono.clone(),
                    Source::Dual => dual.clone(),
                };
                if let Some(src) = src {
                    derive(&src, to, kind)?;
                }
            }
            Step::AdoptDual { as_stage } => {
                if let Some(d) = &dual {
                    derive(d, as_stage, kind)?;
                }
            }
        }
    }
    Ok(())
}

struct Run<'a> {
    plan: &'a Plan,
    input: PathBuf,
    mono: Option<PathBuf>,
    dual: Option<PathBuf>,
    artifacts: ArtifactSet,
}

impl Run<'_> {
    fn slot(&self, from: Source) -> Option<&PathBuf> {
        match from {
            Source::Input => Some(&self.input),
            Source::Mono => self.mono.as_ref(),
            Source::Dual => self.dual.as_ref(),
        }
    }

    fn require(&self, from: Source) -> Result<PathBuf> {
        self.source(from, false)?
            .ok_or_else(|| PipelineError::ArtifactMissing {
                path: self.input.clone(),
            })
    }

    /// Existing source file for a step. A missing optional source skips
    /// the step (`Ok(None)`); a missing required one is an error.
    fn source(&self, from: Source, optional: bool) -> Result<Option<PathBuf>> {
        match self.slot(from) {
            Some(p) if p.exists() => Ok(Some(p.clone())),
            missing if optional => {
                warn!(
                    "skipping step: {:?} source {} not available",
                    from,
                    missing.map(|p| p.display().to_string()).unwrap_or_default()
                );
                Ok(None)
            }
            missing => Err(PipelineError::ArtifactMissing {
                path: missing.cloned().unwrap_or_else(|| self.input.clone()),
            }),
        }
    }

    fn emit(&mut self, out: PathBuf) -> Result<()> {
        let size = verify_artifact(&out)?;
        info!("{} produced {} ({})", self.plan.operation, out.display(), format_mb(size));
        self.artifacts.push(out);
        Ok(())
    }
}
