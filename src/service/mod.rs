pub mod aggregator;
pub mod cancel;
pub mod classifier;
pub mod diagnostics;
pub mod engine;
pub mod loader;
pub mod normalizer;
pub mod pipeline;
pub mod quality;
pub mod scoring;

pub use cancel::CancelToken;
pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticLevel, DiagnosticStage, DiagnosticsSink, TracingSink,
};
pub use engine::ReconciliationEngine;
pub use pipeline::{MatchingPipeline, PipelineOutcome};
pub use quality::{QualityAssessor, QualityInputs};
