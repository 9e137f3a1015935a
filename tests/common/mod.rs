#![allow(dead_code)]

use pdf2zh_pipeline::{
    config::{DualLayout, EngineSettings},
    engine::{Pdf2zh, Pdf2zhNext},
    error::{PipelineError, Result},
    process::{CommandRunner, ToolCommand},
    stage::PipelineStage,
    tools::DocumentTools,
    Pipeline,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const FAKE_PDF: &[u8] = b"%PDF-1.7 fake";

/// Stands in for the engine processes: records each command and writes the
/// files the real engine would write for it.
pub struct FakeRunner {
    pub commands: Arc<Mutex<Vec<ToolCommand>>>,
    pub failures: Mutex<usize>,
    pub produce: bool,
}

impl FakeRunner {
    pub fn new(commands: Arc<Mutex<Vec<ToolCommand>>>) -> Self {
        Self {
            commands,
            failures: Mutex::new(0),
            produce: true,
        }
    }
}

fn value_after<'a>(cmd: &'a ToolCommand, flag: &str) -> Option<&'a str> {
    let pos = cmd.args.iter().position(|a| a == flag)?;
    cmd.args.get(pos + 1).map(String::as_str)
}

fn simulate(cmd: &ToolCommand) {
    let input = PathBuf::from(&cmd.args[0]);
    let name = input.file_name().unwrap().to_string_lossy().into_owned();
    let stem = name.trim_end_matches(".pdf");
    let out = PathBuf::from(value_after(cmd, "--output").unwrap());

    let mut files = Vec::new();
    if cmd.program == "pdf2zh_next" {
        let lang = value_after(cmd, "--lang-out").unwrap();
        let wm = match value_after(cmd, "--watermark-output-mode") {
            Some("no_watermark") => ".no_watermark",
            _ => "",
        };
        let no_dual = cmd.has_arg("--no-dual");
        let no_mono = cmd.has_arg("--no-mono");
        if no_dual || !no_mono {
            files.push(out.join(format!("{stem}{wm}.{lang}.mono.pdf")));
        }
        if !no_dual {
            files.push(out.join(format!("{stem}{wm}.{lang}.dual.pdf")));
        }
    } else {
        files.push(out.join(format!("{stem}-mono.pdf")));
        files.push(out.join(format!("{stem}-dual.pdf")));
    }
    for f in files {
        std::fs::write(f, FAKE_PDF).unwrap();
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, cmd: &ToolCommand) -> Result<()> {
        self.commands.lock().unwrap().push(cmd.clone());
        {
            let mut left = self.failures.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(PipelineError::ExternalToolFailure {
                    tool: cmd.program.clone(),
                    status: "exit status: 1".into(),
                    stderr: "font subsetting failed".into(),
                });
            }
        }
        if self.produce {
            simulate(cmd);
        }
        Ok(())
    }
}

/// Records crop/merge/relayout calls and writes their outputs.
pub struct FakeTools {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub pages: u32,
}

impl DocumentTools for FakeTools {
    fn page_count(&self, _input: &Path) -> Result<u32> {
        Ok(self.pages)
    }

    fn crop(&self, input: &Path, from: PipelineStage, output: &Path, to: PipelineStage) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("crop {} {from} -> {} {to}", fname(input), fname(output)));
        std::fs::write(output, FAKE_PDF)?;
        Ok(())
    }

    fn merge(&self, input: &Path, output: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("merge {} -> {}", fname(input), fname(output)));
        std::fs::write(output, FAKE_PDF)?;
        Ok(())
    }

    fn relayout(&self, input: &Path, from: DualLayout, output: &Path, to: DualLayout) -> Result<()> {
        self.calls.lock().unwrap().push(format!(
            "relayout {} {} -> {} {}",
            fname(input),
            from.as_str(),
            fname(output),
            to.as_str()
        ));
        std::fs::write(output, FAKE_PDF)?;
        Ok(())
    }
}

pub fn fname(p: &Path) -> String {
    p.file_name().unwrap().to_string_lossy().into_owned()
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub pipeline: Pipeline,
    pub commands: Arc<Mutex<Vec<ToolCommand>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_runner(|commands| FakeRunner::new(commands))
    }

    pub fn with_runner(make: impl Fn(Arc<Mutex<Vec<ToolCommand>>>) -> FakeRunner) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tools = FakeTools {
            calls: calls.clone(),
            pages: 10,
        };
        let pipeline = Pipeline::new(Box::new(tools))
            .with_engine(Box::new(Pdf2zh::new(
                EngineSettings::pdf2zh(),
                dir.path(),
                Box::new(make(commands.clone())),
            )))
            .with_engine(Box::new(Pdf2zhNext::new(
                EngineSettings::pdf2zh_next(),
                dir.path(),
                Box::new(make(commands.clone())),
            )));
        Self {
            dir,
            pipeline,
            commands,
            calls,
        }
    }

    /// Write a document into the output directory and return its path.
    pub fn document(&self, name: &str) -> PathBuf {
        let p = self.dir.path().join(name);
        std::fs::write(&p, FAKE_PDF).unwrap();
        p
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}
