pub mod artifact;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod plan;
pub mod process;
pub mod stage;
pub mod store;
pub mod tools;
pub mod util;

pub use artifact::ArtifactSet;
pub use config::{Config, DualLayout, TranslationConfig};
pub use engine::EngineKind;
pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use plan::Operation;
pub use stage::{classify, PipelineStage};
