//! Collaborators used by the executors
//!
//! Each engine sits behind a trait so executors can be driven by test
//! doubles; the concrete clients talk to sidecar HTTP services and Ollama.

mod aligner;
mod analyzer;
mod cache;
mod fetcher;
mod forced_aligner;
mod http;
mod transcriber;

pub use aligner::{LyricsAligner, OllamaLyricsAligner};
pub use analyzer::{AnalyzerClient, AudioAnalysis, AudioAnalyzer};
pub(crate) use cache::scratch_path;
pub use cache::{AssetCache, ANALYSIS_ENTRY, LRC_ENTRY};
pub use fetcher::{AssetFetcher, HttpAssetFetcher};
pub use forced_aligner::{ForcedAligner, ForcedAlignerClient};
pub use transcriber::{Transcriber, Transcription, WhisperClient};
