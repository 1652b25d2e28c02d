use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{EmbeddingKind, ExtractConfig};
use crate::error::ExtractError;

/// Extract protein language model embeddings from FASTA files.
#[derive(Debug, Parser)]
#[command(name = "protembed", version, about, rename_all = "snake_case")]
pub struct Cli {
    /// Name for this run; artifacts land under `<output_path>/<experiment_name>/`
    #[arg(long)]
    pub experiment_name: String,

    /// Model checkpoint, e.g. `esm2_t33_650M_UR50D` or `amplify_120M`
    #[arg(long)]
    pub model_name: String,

    /// Input FASTA file
    #[arg(long)]
    pub fasta_path: PathBuf,

    /// Directory artifacts are written into
    #[arg(long)]
    pub output_path: PathBuf,

    /// CSV of `sequence_id,start,end` rows, required for substring_pooled
    #[arg(long)]
    pub substring_path: Option<PathBuf>,

    /// One or more embedding kinds to extract
    #[arg(long, num_args = 1.., required = true, value_enum)]
    pub extract_embeddings: Vec<EmbeddingKind>,

    /// Write each sequence's artifacts as soon as it is embedded instead of
    /// buffering the whole run in memory
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    pub streaming_output: bool,

    /// Force CPU even when an accelerator is available
    #[arg(long, action = ArgAction::SetTrue)]
    pub cpu: bool,
}

impl Cli {
    /// Validate flag combinations and build the run configuration.
    pub fn into_config(self) -> Result<ExtractConfig, ExtractError> {
        if self.experiment_name.trim().is_empty() {
            return Err(ExtractError::Validation(
                "experiment_name must not be empty".to_string(),
            ));
        }
        let mut kinds = Vec::new();
        for kind in self.extract_embeddings {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.contains(&EmbeddingKind::SubstringPooled) && self.substring_path.is_none() {
            return Err(ExtractError::Validation(
                "extracting substring_pooled requires --substring_path".to_string(),
            ));
        }
        Ok(ExtractConfig {
            experiment_name: self.experiment_name,
            model_name: self.model_name,
            fasta_path: self.fasta_path,
            output_path: self.output_path,
            substring_path: self.substring_path,
            kinds,
            streaming_output: self.streaming_output,
            cpu: self.cpu,
        })
    }
}
