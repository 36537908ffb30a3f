// src/services/mod.rs
pub mod analyzer;
pub mod compiler;
pub mod figma_client;
pub mod image_processor;
pub mod markup;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod synthesizer;
pub mod validator;

pub use analyzer::ElementAnalyzer;
pub use compiler::{CompilationResult, CompileOptions, Compiler, MjmlApiCompiler, MjmlCliCompiler};
pub use figma_client::{FigmaClient, FigmaError};
pub use image_processor::{ImageMetadata, ImageProcessor};
pub use orchestrator::FallbackOrchestrator;
pub use pipeline::{ConversionOutcome, ConversionPipeline};
pub use providers::{ProviderAdapter, ProviderError};
pub use synthesizer::TemplateSynthesizer;
pub use validator::DocumentValidator;
