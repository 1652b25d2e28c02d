use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{embedding, rms_norm, Embedding, Module, RmsNorm, VarBuilder};

use super::config::AMPLIFYConfig;
use super::encoder::EncoderBlock;
use super::rotary::precompute_freqs_cis;
use crate::outputs::ModelOutput;
use crate::tokenizer::ProteinTokenizer;

/// AMPLIFY encoder trunk.
///
/// Weight names follow the chandar-lab checkpoints: an `encoder` token
/// embedding, `transformer_encoder.{i}` blocks and a final `layer_norm_2`
/// RMSNorm. The masked-LM decoder head is never loaded.
pub struct AMPLIFY {
    encoder: Embedding,
    transformer_encoder: Vec<EncoderBlock>,
    layer_norm_2: RmsNorm,
    freqs_cis: Tensor,
    hidden_size: usize,
    device: Device,
}

impl AMPLIFY {
    pub fn load(vb: VarBuilder, config: &AMPLIFYConfig) -> Result<Self> {
        let encoder = embedding(config.vocab_size, config.hidden_size, vb.pp("encoder"))?;
        let mut transformer_encoder = Vec::with_capacity(config.num_hidden_layers);
        for layer in 0..config.num_hidden_layers {
            transformer_encoder.push(EncoderBlock::load(
                vb.pp("transformer_encoder"),
                config,
                layer,
            )?);
        }
        let layer_norm_2 = rms_norm(config.hidden_size, config.norm_eps, vb.pp("layer_norm_2"))?;
        let head_dim = config.hidden_size / config.num_attention_heads;
        let freqs_cis = precompute_freqs_cis(head_dim, config.max_length, vb.device())?;
        Ok(Self {
            encoder,
            transformer_encoder,
            layer_norm_2,
            freqs_cis,
            hidden_size: config.hidden_size,
            device: vb.device().clone(),
        })
    }

    /// Fetch config, tokenizer and weights from the Hub and load on `device`.
    pub fn from_hub(repo_id: &str, device: &Device) -> anyhow::Result<(Self, ProteinTokenizer)> {
        let api = hf_hub::api::sync::Api::new()?;
        let repo = api.model(repo_id.to_string());
        let config_path = repo.get("config.json")?;
        let config: AMPLIFYConfig = serde_json::from_slice(&std::fs::read(config_path)?)?;
        let tokenizer = ProteinTokenizer::from_file(repo.get("tokenizer.json")?)?;
        let weights = repo.get("model.safetensors")?;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)? };
        let model = Self::load(vb, &config)?;
        Ok((model, tokenizer))
    }

    /// Run the trunk over a `[1, tokens]` id tensor.
    pub fn forward(&self, tokens: &Tensor, output_attentions: bool) -> Result<ModelOutput> {
        let mut x = self.encoder.forward(tokens)?;
        let mut attentions = output_attentions.then(Vec::new);
        for block in &self.transformer_encoder {
            let (next, probs) = block.forward(&x, &self.freqs_cis, output_attentions)?;
            x = next;
            if let (Some(all), Some(probs)) = (attentions.as_mut(), probs) {
                all.push(probs);
            }
        }
        let x = self.layer_norm_2.forward(&x)?;
        Ok(ModelOutput {
            last_hidden_state: x,
            attentions,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> AMPLIFYConfig {
        AMPLIFYConfig {
            vocab_size: 27,
            hidden_size: 8,
            num_hidden_layers: 2,
            num_attention_heads: 2,
            intermediate_size: 16,
            norm_eps: 1e-5,
            max_length: 32,
        }
    }

    #[test]
    fn forward_shapes() -> Result<()> {
        let config = tiny_config();
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = AMPLIFY::load(vb, &config)?;
        let tokens = Tensor::new(&[[3u32, 10, 12, 4]], &Device::Cpu)?;
        let output = model.forward(&tokens, true)?;
        assert_eq!(output.last_hidden_state.dims(), &[1, 4, 8]);
        let attentions = output.attentions.unwrap();
        assert_eq!(attentions.len(), 2);
        assert_eq!(attentions[0].dims(), &[1, 2, 4, 4]);
        Ok(())
    }

    #[test]
    fn no_attentions_unless_requested() -> Result<()> {
        let config = tiny_config();
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = AMPLIFY::load(vb, &config)?;
        let tokens = Tensor::new(&[[3u32, 10, 4]], &Device::Cpu)?;
        let output = model.forward(&tokens, false)?;
        assert!(output.attentions.is_none());
        Ok(())
    }
}
