use candle_core::Tensor;
use log::{info, warn};

use protembed_plms::SequenceEmbeddings;

use crate::config::{EmbeddingKind, ExtractConfig};
use crate::error::ExtractError;
use crate::fasta::{read_fasta, SeqRecord};
use crate::registry::ModelKey;
use crate::substring::{load_ranges, SubstringMap};
use crate::writer::{EmbeddingResult, OutputWriter};

/// Seam between the extraction loop and the model families. `embed`
/// returns per-residue embeddings with special tokens already stripped.
pub trait ProteinLanguageModel {
    fn hidden_size(&self) -> usize;
    fn embed(&self, sequence: &str, with_attentions: bool) -> anyhow::Result<SequenceEmbeddings>;
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub embedded: usize,
    pub skipped: usize,
    pub artifacts: usize,
}

/// One extraction over a FASTA file with a loaded model.
pub struct ExtractionRun {
    config: ExtractConfig,
    model: Box<dyn ProteinLanguageModel>,
}

impl ExtractionRun {
    /// Resolve the model name and load its checkpoint. Name resolution
    /// happens first so an unknown model fails before anything is fetched.
    pub fn new(config: ExtractConfig) -> Result<Self, ExtractError> {
        let key = ModelKey::parse(&config.model_name)?;
        let device = protembed_plms::device::device(config.cpu)
            .map_err(|e| ExtractError::ModelLoad(e.to_string()))?;
        info!("loading {} on {:?}", config.model_name, device);
        let model = key.load(&device)?;
        Ok(Self { config, model })
    }

    /// Run with an already constructed model.
    pub fn with_model(config: ExtractConfig, model: Box<dyn ProteinLanguageModel>) -> Self {
        Self { config, model }
    }

    pub fn run(&self) -> Result<RunSummary, ExtractError> {
        let writer = OutputWriter::create(
            &self.config.output_path,
            &self.config.experiment_name,
            &self.config.kinds,
        )?;
        let records = read_fasta(&self.config.fasta_path)?;
        let ranges = match &self.config.substring_path {
            Some(path) => Some(load_ranges(path)?),
            None => None,
        };
        info!(
            "embedding {} sequence(s) into {} kind(s), hidden size {}",
            records.len(),
            self.config.kinds.len(),
            self.model.hidden_size()
        );

        let with_attentions = self.config.wants(EmbeddingKind::AttentionHead);
        let mut summary = RunSummary {
            embedded: 0,
            skipped: 0,
            artifacts: 0,
        };
        let mut buffered: Vec<EmbeddingResult> = Vec::new();
        for record in &records {
            let embeddings = match self.model.embed(&record.sequence, with_attentions) {
                Ok(embeddings) => embeddings,
                Err(err) => {
                    warn!("skipping '{}': {}", record.id, err);
                    summary.skipped += 1;
                    continue;
                }
            };
            let result = self.build_result(record, &embeddings, ranges.as_ref())?;
            info!("embedded '{}' ({} residues)", record.id, record.sequence.len());
            summary.embedded += 1;
            if self.config.streaming_output {
                summary.artifacts += writer.write(&result)?;
            } else {
                buffered.push(result);
            }
        }
        for result in &buffered {
            summary.artifacts += writer.write(result)?;
        }
        info!(
            "embedded {} sequence(s), skipped {}, wrote {} artifact(s)",
            summary.embedded, summary.skipped, summary.artifacts
        );
        Ok(summary)
    }

    fn build_result(
        &self,
        record: &SeqRecord,
        embeddings: &SequenceEmbeddings,
        ranges: Option<&SubstringMap>,
    ) -> Result<EmbeddingResult, ExtractError> {
        let mut tensors = Vec::new();
        for kind in &self.config.kinds {
            let tensor = match kind {
                EmbeddingKind::PerToken => Some(embeddings.per_token.clone()),
                EmbeddingKind::MeanPooled => {
                    Some(mean_pool(&embeddings.per_token).map_err(tensor_err)?)
                }
                EmbeddingKind::SubstringPooled => match ranges {
                    Some(map) => self.substring_pool(record, &embeddings.per_token, map)?,
                    None => None,
                },
                EmbeddingKind::AttentionHead => match &embeddings.attentions {
                    Some(attentions) => Some(attentions.clone()),
                    None => {
                        warn!("model returned no attention weights for '{}'", record.id);
                        None
                    }
                },
            };
            if let Some(tensor) = tensor {
                tensors.push((*kind, tensor));
            }
        }
        Ok(EmbeddingResult {
            id: record.id.clone(),
            tensors,
        })
    }

    /// Mean-pool each requested range; rows of the result follow the range
    /// order in the table. Missing or out-of-bounds ranges degrade to a
    /// warning rather than failing the run.
    fn substring_pool(
        &self,
        record: &SeqRecord,
        per_token: &Tensor,
        map: &SubstringMap,
    ) -> Result<Option<Tensor>, ExtractError> {
        let Some(spans) = map.get(&record.id) else {
            warn!(
                "no substring ranges for '{}', skipping its substring_pooled output",
                record.id
            );
            return Ok(None);
        };
        let residues = per_token.dim(0).map_err(tensor_err)?;
        let mut pooled = Vec::new();
        for span in spans {
            if span.end > residues {
                warn!(
                    "range {}..{} exceeds '{}' length {}, skipping",
                    span.start, span.end, record.id, residues
                );
                continue;
            }
            let window = per_token
                .narrow(0, span.start, span.end - span.start)
                .map_err(tensor_err)?;
            pooled.push(mean_pool(&window).map_err(tensor_err)?);
        }
        if pooled.is_empty() {
            warn!("no usable substring ranges for '{}'", record.id);
            return Ok(None);
        }
        Tensor::stack(&pooled, 0).map(Some).map_err(tensor_err)
    }
}

fn mean_pool(per_token: &Tensor) -> candle_core::Result<Tensor> {
    per_token.mean(0)
}

fn tensor_err(err: candle_core::Error) -> ExtractError {
    ExtractError::Tensor(err.to_string())
}
