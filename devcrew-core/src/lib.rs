//! devcrew-core: requirements → architecture → validated modules → assembled system.
//!
//! The core never touches the network or the filesystem. It talks to three
//! collaborators through traits:
//!   - `CodeSynthesisOracle`: text in, text out
//!   - `InterfaceAnalyzer`: reads interfaces out of generated source
//!   - `ArtifactSink`: stores what the run produced

pub mod analyzer;
pub mod assembler;
mod attempt;
pub mod config;
pub mod creator;
pub mod error;
pub mod model;
pub mod oracle;
pub mod parse;
pub mod pipeline;
pub mod planner;
pub mod policy;
pub mod runlog;
pub mod sink;
pub mod validate;

pub use analyzer::{InterfaceAnalyzer, PythonAnalyzer};
pub use assembler::SystemAssembler;
pub use config::{CoreConfig, TargetNaming};
pub use creator::ModuleCreator;
pub use model::{ArtifactSet, ModuleCreationState, ModuleResult, Outcome, SystemArchitecture, UnitStatus};
pub use oracle::{CodeSynthesisOracle, OracleRequest, Role};
pub use pipeline::{Phase, Pipeline, PipelineError};
pub use planner::ArchitecturePlanner;
pub use policy::PresentationPolicy;
pub use runlog::RunLog;
pub use sink::{ArtifactKind, ArtifactSink, SinkError};
