use candle_core::{DType, Device, Result, Tensor, D};
use candle_nn::ops::softmax_last_dim;
use candle_nn::{embedding, layer_norm, linear, Embedding, LayerNorm, Linear, Module, VarBuilder};

use super::rotary::RotaryEmbedding;
use super::ESM2Config;
use crate::outputs::ModelOutput;
use crate::tokenizer::ProteinTokenizer;

const MASK_TOKEN_ID: u32 = 32;
const MASK_RATIO_TRAIN: f64 = 0.15 * 0.8;

struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    num_heads: usize,
    head_dim: usize,
}

impl SelfAttention {
    fn load(vb: VarBuilder, config: &ESM2Config) -> Result<Self> {
        let hidden = config.hidden_size;
        Ok(Self {
            query: linear(hidden, hidden, vb.pp("query"))?,
            key: linear(hidden, hidden, vb.pp("key"))?,
            value: linear(hidden, hidden, vb.pp("value"))?,
            num_heads: config.num_attention_heads,
            head_dim: hidden / config.num_attention_heads,
        })
    }

    fn split_heads(&self, x: Tensor, b: usize, seq_len: usize) -> Result<Tensor> {
        x.reshape((b, seq_len, self.num_heads, self.head_dim))?
            .permute((0, 2, 1, 3))?
            .contiguous()
    }

    fn forward(
        &self,
        x: &Tensor,
        rotary: &RotaryEmbedding,
        output_attentions: bool,
    ) -> Result<(Tensor, Option<Tensor>)> {
        let (b, seq_len, hidden) = x.dims3()?;
        let q = self.split_heads(self.query.forward(x)?, b, seq_len)?;
        let k = self.split_heads(self.key.forward(x)?, b, seq_len)?;
        let v = self.split_heads(self.value.forward(x)?, b, seq_len)?;
        let (q, k) = rotary.apply(&q, &k)?;
        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = (q.matmul(&k.transpose(D::Minus2, D::Minus1)?.contiguous()?)? * scale)?;
        let probs = softmax_last_dim(&scores)?;
        let context = probs
            .matmul(&v)?
            .permute((0, 2, 1, 3))?
            .contiguous()?
            .reshape((b, seq_len, hidden))?;
        Ok((context, output_attentions.then_some(probs)))
    }
}

struct TransformerLayer {
    attention: SelfAttention,
    attention_out: Linear,
    attention_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    ffn_norm: LayerNorm,
}

impl TransformerLayer {
    fn load(vb: VarBuilder, config: &ESM2Config) -> Result<Self> {
        Ok(Self {
            attention: SelfAttention::load(vb.pp("attention.self"), config)?,
            attention_out: linear(
                config.hidden_size,
                config.hidden_size,
                vb.pp("attention.output.dense"),
            )?,
            attention_norm: layer_norm(
                config.hidden_size,
                config.layer_norm_eps,
                vb.pp("attention.LayerNorm"),
            )?,
            intermediate: linear(
                config.hidden_size,
                config.intermediate_size,
                vb.pp("intermediate.dense"),
            )?,
            output: linear(
                config.intermediate_size,
                config.hidden_size,
                vb.pp("output.dense"),
            )?,
            ffn_norm: layer_norm(config.hidden_size, config.layer_norm_eps, vb.pp("LayerNorm"))?,
        })
    }

    fn forward(
        &self,
        x: &Tensor,
        rotary: &RotaryEmbedding,
        output_attentions: bool,
    ) -> Result<(Tensor, Option<Tensor>)> {
        let normed = self.attention_norm.forward(x)?;
        let (context, probs) = self.attention.forward(&normed, rotary, output_attentions)?;
        let x = (x + self.attention_out.forward(&context)?)?;
        let normed = self.ffn_norm.forward(&x)?;
        let ffn = self
            .output
            .forward(&self.intermediate.forward(&normed)?.gelu_erf()?)?;
        let x = (x + ffn)?;
        Ok((x, probs))
    }
}

/// ESM2 encoder trunk.
///
/// Layer structure and weight names follow the Hub checkpoints: pre-norm
/// self-attention with rotate-half rotary on q/k, a GELU feed-forward, and
/// a final `emb_layer_norm_after`. The masked-LM head is never loaded.
pub struct ESM2 {
    embeddings: Embedding,
    layers: Vec<TransformerLayer>,
    final_layer_norm: LayerNorm,
    rotary: RotaryEmbedding,
    token_dropout: bool,
    hidden_size: usize,
    device: Device,
}

impl ESM2 {
    pub fn load(vb: VarBuilder, config: &ESM2Config) -> Result<Self> {
        let head_dim = config.hidden_size / config.num_attention_heads;
        let rotary = RotaryEmbedding::new(head_dim, config.max_position_embeddings, vb.device())?;
        let embeddings = embedding(
            config.vocab_size,
            config.hidden_size,
            vb.pp("esm.embeddings.word_embeddings"),
        )?;
        let encoder = vb.pp("esm.encoder");
        let mut layers = Vec::with_capacity(config.num_hidden_layers);
        for i in 0..config.num_hidden_layers {
            layers.push(TransformerLayer::load(encoder.pp("layer").pp(i), config)?);
        }
        let final_layer_norm = layer_norm(
            config.hidden_size,
            config.layer_norm_eps,
            encoder.pp("emb_layer_norm_after"),
        )?;
        Ok(Self {
            embeddings,
            layers,
            final_layer_norm,
            rotary,
            token_dropout: config.token_dropout,
            hidden_size: config.hidden_size,
            device: vb.device().clone(),
        })
    }

    /// Fetch config and weights from the Hub and load the model on `device`.
    pub fn from_hub(repo_id: &str, device: &Device) -> anyhow::Result<(Self, ProteinTokenizer)> {
        let api = hf_hub::api::sync::Api::new()?;
        let repo = api.model(repo_id.to_string());
        let config_path = repo.get("config.json")?;
        let config: ESM2Config = serde_json::from_slice(&std::fs::read(config_path)?)?;
        let weights = repo.get("model.safetensors")?;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)? };
        let model = Self::load(vb, &config)?;
        let tokenizer = ProteinTokenizer::esm2()?;
        Ok((model, tokenizer))
    }

    /// Run the trunk over a `[1, tokens]` id tensor.
    pub fn forward(&self, tokens: &Tensor, output_attentions: bool) -> Result<ModelOutput> {
        let (_b, seq_len) = tokens.dims2()?;
        let mut x = self.embeddings.forward(tokens)?;
        if self.token_dropout {
            // Inference-time half of the token-dropout trick: zero any mask
            // embeddings and rescale by the train/observed mask ratio.
            let not_mask = tokens.ne(MASK_TOKEN_ID)?.to_dtype(x.dtype())?.unsqueeze(2)?;
            x = x.broadcast_mul(&not_mask)?;
            let n_masked = tokens
                .eq(MASK_TOKEN_ID)?
                .to_dtype(DType::F32)?
                .sum_all()?
                .to_scalar::<f32>()? as f64;
            let mask_ratio = n_masked / seq_len as f64;
            x = (x * ((1.0 - MASK_RATIO_TRAIN) / (1.0 - mask_ratio)))?;
        }
        let mut attentions = output_attentions.then(Vec::new);
        for layer in &self.layers {
            let (next, probs) = layer.forward(&x, &self.rotary, output_attentions)?;
            x = next;
            if let (Some(all), Some(probs)) = (attentions.as_mut(), probs) {
                all.push(probs);
            }
        }
        let x = self.final_layer_norm.forward(&x)?;
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
