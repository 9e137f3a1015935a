use crate::{
    config::{Config, DualLayout, TranslationConfig},
    pipeline::Pipeline,
    plan::{self, Operation},
    process::{CommandRunner, ProcessRunner, ToolCommand},
    stage::classify,
    store::OutputStore,
    tools::PythonTools,
    util::{ensure_dir, now_rfc3339},
    EngineKind,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "pdf2zh-pipeline")]
#[command(about = "Deterministic artifact orchestrator for pdf2zh / pdf2zh_next")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./pdf2zh-pipeline.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the engines and the page helper can be started.
    Doctor {},
    /// Print the pipeline stage a file name belongs to.
    Classify {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print the resolved plan for an operation without running it.
    Plan {
        #[arg(value_enum)]
        operation: Operation,
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        request: RequestArgs,
    },
    Translate(OperationArgs),
    Crop(OperationArgs),
    CropCompare(OperationArgs),
    Compare(OperationArgs),
    /// Copy an artifact out of the output directory (stdout without --dest).
    Fetch {
        name: String,
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
pub struct OperationArgs {
    #[arg(long)]
    pub input: PathBuf,
    /// Store the document under this file name instead of the input's.
    #[arg(long)]
    pub name: Option<String>,
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(clap::Args, Debug, Default)]
pub struct RequestArgs {
    /// Request file (TOML, or JSON by extension). Defaults to [request] in the config.
    #[arg(long)]
    pub request: Option<PathBuf>,
    #[arg(long)]
    pub engine: Option<String>,
    #[arg(long)]
    pub service: Option<String>,
    #[arg(long)]
    pub lang_in: Option<String>,
    #[arg(long)]
    pub lang_out: Option<String>,
    /// Dual layout for pdf2zh_next: LR or TB.
    #[arg(long)]
    pub dual_mode: Option<String>,
}

impl RequestArgs {
    pub fn resolve(&self, cfg: &Config) -> Result<TranslationConfig> {
        let mut req = match &self.request {
            Some(path) => TranslationConfig::load(path)?,
            None => cfg.request.clone(),
        };
        if let Some(engine) = &self.engine {
            req.engine = engine.clone();
        }
        if let Some(service) = &self.service {
            req.service = service.clone();
        }
        if let Some(lang) = &self.lang_in {
            req.source_lang = lang.clone();
        }
        if let Some(lang) = &self.lang_out {
            req.target_lang = lang.clone();
        }
        if let Some(mode) = &self.dual_mode {
            req.dual_mode = match mode.to_ascii_uppercase().as_str() {
                "LR" => DualLayout::Lr,
                "TB" => DualLayout::Tb,
                other => return Err(anyhow!("unknown dual mode: {other} (expected LR or TB)")),
            };
        }
        Ok(req)
    }
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Classify { input } => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "input": input,
                    "stage": classify(input),
                }))?
            );
            Ok(())
        }
        Command::Plan {
            operation,
            input,
            request,
        } => {
            let req = request.resolve(&cfg)?;
            let plan = plan::build(*operation, classify(input), &req)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Command::Translate(op) => run_operation(&cfg, Operation::Translate, op),
        Command::Crop(op) => run_operation(&cfg, Operation::Crop, op),
        Command::CropCompare(op) => run_operation(&cfg, Operation::CropCompare, op),
        Command::Compare(op) => run_operation(&cfg, Operation::Compare, op),
        Command::Fetch { name, dest } => fetch(&cfg, name, dest.as_deref()),
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    for candidate in ["pdf2zh-pipeline.toml", "pdf2zh-pipeline.example.toml"] {
        let p = Path::new(candidate);
        if p.exists() {
            return Config::load(p);
        }
    }
    Ok(Config::default())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON result, so logs go to stderr
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.out_dir).join("pdf2zh-pipeline.log"))
}

fn run_operation(cfg: &Config, operation: Operation, args: &OperationArgs) -> Result<()> {
    let request = args.request.resolve(cfg)?;
    let store = OutputStore::from_config(cfg);
    let started = now_rfc3339();

    let input = store.persist(&args.input, args.name.as_deref())?;
    let pipeline = Pipeline::from_config(cfg)?;
    let artifacts = pipeline
        .run(operation, &input, &request)
        .with_context(|| format!("{operation} failed for {}", input.display()))?;

    info!("{operation} done: {:?}", artifacts.names());
    let mut summary = serde_json::json!({
        "status": "success",
        "fileList": artifacts.names(),
    });
    if cfg.global.print_summary {
        summary["operation"] = serde_json::json!(operation);
        summary["out_dir"] = serde_json::json!(store.root());
        summary["started"] = serde_json::json!(started);
        summary["finished"] = serde_json::json!(now_rfc3339());
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn fetch(cfg: &Config, name: &str, dest: Option<&Path>) -> Result<()> {
    let store = OutputStore::from_config(cfg);
    let bytes = store.fetch(name)?;
    match dest {
        Some(dest) => std::fs::write(dest, &bytes)
            .with_context(|| format!("write {}", dest.display()))?,
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(&bytes)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let mut engines = serde_json::Map::new();
    for kind in [EngineKind::Pdf2zh, EngineKind::Pdf2zhNext] {
        let settings = cfg.engines.settings(kind);
        let runner = ProcessRunner::new(settings.launcher.clone(), 60);
        let mut cmd = ToolCommand::new(&settings.program);
        cmd.arg("--version");
        let status = match runner.run(&cmd) {
            Ok(()) => serde_json::json!({"ok": true}),
            Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
        };
        engines.insert(kind.to_string(), status);
    }

    let tools = match PythonTools::new(cfg) {
        Ok(t) => t
            .doctor()
            .unwrap_or_else(|e| serde_json::json!({"ok": false, "error": e.to_string()})),
        Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "engines": engines,
            "tools": tools,
            "out_dir": cfg.paths.out_dir,
        }))?
    );
    Ok(())
}
