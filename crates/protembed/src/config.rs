use std::path::PathBuf;

use clap::ValueEnum;
use strum::Display;

/// The embedding artifacts a run can produce. The `Display` form doubles as
/// the artifact subdirectory name and the tensor key inside each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Display)]
#[strum(serialize_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum EmbeddingKind {
    MeanPooled,
    PerToken,
    SubstringPooled,
    AttentionHead,
}

/// A fully validated extraction request.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub experiment_name: String,
    pub model_name: String,
    pub fasta_path: PathBuf,
    pub output_path: PathBuf,
    pub substring_path: Option<PathBuf>,
    /// Requested kinds, deduplicated, in the order given on the command line.
    pub kinds: Vec<EmbeddingKind>,
    pub streaming_output: bool,
    pub cpu: bool,
}

impl ExtractConfig {
    pub fn wants(&self, kind: EmbeddingKind) -> bool {
        self.kinds.contains(&kind)
    }
}
