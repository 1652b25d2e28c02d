use candle_core::{bail, Result, Tensor};

/// Raw forward-pass output of a protein language model.
///
/// Shapes use the model's own token axis, so special tokens added by the
/// tokenizer (cls/bos, eos, padding) are still present.
pub struct ModelOutput {
    /// Final hidden states, `[1, tokens, hidden]`.
    pub last_hidden_state: Tensor,
    /// Per-layer attention weights, each `[1, heads, tokens, tokens]`.
    pub attentions: Option<Vec<Tensor>>,
}

/// Embeddings for one sequence with special tokens stripped.
pub struct SequenceEmbeddings {
    /// Per-residue hidden states, `[residues, hidden]`.
    pub per_token: Tensor,
    /// Stacked attention weights, `[layers, heads, residues, residues]`.
    pub attentions: Option<Tensor>,
}

impl ModelOutput {
    /// Drop the rows and columns belonging to special tokens.
    ///
    /// `special_mask` is the tokenizer's special-tokens mask over the same
    /// token axis as `last_hidden_state`: 1 for special tokens, 0 for
    /// residues.
    pub fn residue_embeddings(&self, special_mask: &[u32]) -> Result<SequenceEmbeddings> {
        let keep: Vec<u32> = special_mask
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == 0)
            .map(|(i, _)| i as u32)
            .collect();
        if keep.is_empty() {
            bail!("no residue tokens remain after stripping special tokens");
        }
        let hidden = self.last_hidden_state.squeeze(0)?;
        let idx = Tensor::new(keep.as_slice(), hidden.device())?;
        let per_token = hidden.index_select(&idx, 0)?;
        let attentions = match &self.attentions {
            Some(layers) => {
                let mut stripped = Vec::with_capacity(layers.len());
                for layer in layers {
                    let layer = layer.squeeze(0)?;
                    let layer = layer.index_select(&idx, 1)?.index_select(&idx, 2)?;
                    stripped.push(layer);
                }
                Some(Tensor::stack(&stripped, 0)?)
            }
            None => None,
        };
        Ok(SequenceEmbeddings {
            per_token,
            attentions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn strips_special_token_rows() -> Result<()> {
        let device = Device::Cpu;
        let hidden = Tensor::arange(0f32, 10., &device)?.reshape((1, 5, 2))?;
        let output = ModelOutput {
            last_hidden_state: hidden,
            attentions: None,
        };
        let embeddings = output.residue_embeddings(&[1, 0, 0, 0, 1])?;
        assert_eq!(embeddings.per_token.dims(), &[3, 2]);
        let rows = embeddings.per_token.to_vec2::<f32>()?;
        assert_eq!(rows[0], vec![2., 3.]);
        assert_eq!(rows[2], vec![6., 7.]);
        Ok(())
    }

    #[test]
    fn strips_attention_rows_and_columns() -> Result<()> {
        let device = Device::Cpu;
        let hidden = Tensor::zeros((1, 4, 2), DType::F32, &device)?;
        let layer = Tensor::arange(0f32, 32., &device)?.reshape((1, 2, 4, 4))?;
        let output = ModelOutput {
            last_hidden_state: hidden,
            attentions: Some(vec![layer.clone(), layer]),
        };
        let embeddings = output.residue_embeddings(&[1, 0, 0, 1])?;
        let attentions = embeddings.attentions.unwrap();
        assert_eq!(attentions.dims(), &[2, 2, 2, 2]);
        let head = attentions.get(0)?.get(0)?.to_vec2::<f32>()?;
        assert_eq!(head[0], vec![5., 6.]);
        assert_eq!(head[1], vec![9., 10.]);
        Ok(())
    }

    #[test]
    fn all_special_tokens_is_an_error() {
        let device = Device::Cpu;
        let hidden = Tensor::zeros((1, 2, 2), DType::F32, &device).unwrap();
        let output = ModelOutput {
            last_hidden_state: hidden,
            attentions: None,
        };
        assert!(output.residue_embeddings(&[1, 1]).is_err());
    }
}
