use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use candle_core::Tensor;

use crate::config::EmbeddingKind;
use crate::error::ExtractError;

/// Everything extracted for one sequence, ready to be written.
pub struct EmbeddingResult {
    pub id: String,
    pub tensors: Vec<(EmbeddingKind, Tensor)>,
}

/// Writes artifacts under `<output_path>/<experiment_name>/<kind>/`.
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    /// Create the per-kind directories up front so a run that embeds
    /// nothing still leaves the expected layout behind.
    pub fn create(
        output_path: &Path,
        experiment_name: &str,
        kinds: &[EmbeddingKind],
    ) -> Result<Self, ExtractError> {
        let root = output_path.join(experiment_name);
        for kind in kinds {
            fs::create_dir_all(root.join(kind.to_string()))?;
        }
        Ok(Self { root })
    }

    /// Write one safetensors file per (kind, tensor) pair and return how
    /// many were written. Existing artifacts are overwritten, which makes
    /// re-running an extraction idempotent.
    pub fn write(&self, result: &EmbeddingResult) -> Result<usize, ExtractError> {
        let file_name = format!("{}.safetensors", sanitize_id(&result.id));
        let mut written = 0;
        for (kind, tensor) in &result.tensors {
            let path = self.root.join(kind.to_string()).join(&file_name);
            let tensors = HashMap::from([(kind.to_string(), tensor.clone())]);
            candle_core::safetensors::save(&tensors, &path)
                .map_err(|e| ExtractError::Io(format!("{}: {}", path.display(), e)))?;
            written += 1;
        }
        Ok(written)
    }
}

// FASTA ids can contain path separators and pipes (e.g. sp|P69905|HBA_HUMAN).
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn sanitizes_awkward_ids() {
        assert_eq!(sanitize_id("sp|P69905|HBA_HUMAN"), "sp_P69905_HBA_HUMAN");
        assert_eq!(sanitize_id("../evil"), ".._evil");
        assert_eq!(sanitize_id("plain-id_1.2"), "plain-id_1.2");
    }

    #[test]
    fn writes_one_file_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::create(
            dir.path(),
            "exp",
            &[EmbeddingKind::MeanPooled, EmbeddingKind::PerToken],
        )
        .unwrap();
        let tensor = Tensor::zeros((3, 4), DType::F32, &Device::Cpu).unwrap();
        let result = EmbeddingResult {
            id: "p1".to_string(),
            tensors: vec![
                (EmbeddingKind::MeanPooled, tensor.mean(0).unwrap()),
                (EmbeddingKind::PerToken, tensor),
            ],
        };
        let written = writer.write(&result).unwrap();
        assert_eq!(written, 2);
        let mean_path = dir.path().join("exp/mean_pooled/p1.safetensors");
        let per_token_path = dir.path().join("exp/per_token/p1.safetensors");
        assert!(mean_path.exists());
        assert!(per_token_path.exists());

        let loaded = candle_core::safetensors::load(&per_token_path, &Device::Cpu).unwrap();
        assert_eq!(loaded["per_token"].dims(), &[3, 4]);
    }

    #[test]
    fn rewriting_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let writer =
            OutputWriter::create(dir.path(), "exp", &[EmbeddingKind::MeanPooled]).unwrap();
        let make = |value: f32| EmbeddingResult {
            id: "p1".to_string(),
            tensors: vec![(
                EmbeddingKind::MeanPooled,
                Tensor::full(value, (4,), &Device::Cpu).unwrap(),
            )],
        };
        writer.write(&make(1.0)).unwrap();
        writer.write(&make(2.0)).unwrap();
        let path = dir.path().join("exp/mean_pooled/p1.safetensors");
        let loaded = candle_core::safetensors::load(&path, &Device::Cpu).unwrap();
        let values = loaded["mean_pooled"].to_vec1::<f32>().unwrap();
        assert_eq!(values, vec![2.0; 4]);
    }
}
