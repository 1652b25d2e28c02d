use candle_core::{Module, Result, Tensor, D};
use candle_nn::{linear_no_bias, ops::softmax_last_dim, rms_norm, Linear, RmsNorm, VarBuilder};

use super::config::AMPLIFYConfig;
use super::rotary::apply_rotary_emb;

/// One pre-norm AMPLIFY transformer block: RMSNorm, rotary multi-head
/// attention, then an RMSNorm'd SwiGLU feed-forward, with residuals around
/// both halves.
pub struct EncoderBlock {
    q: Linear,
    k: Linear,
    v: Linear,
    wo: Linear,
    w12: Linear,
    w3: Linear,
    attention_norm: RmsNorm,
    ffn_norm: RmsNorm,
    num_heads: usize,
    d_head: usize,
}

impl EncoderBlock {
    pub fn load(vb: VarBuilder, config: &AMPLIFYConfig, layer: usize) -> Result<Self> {
        // The hidden unit count is reduced by 2/3 and rounded up to a
        // multiple of 8 to keep the SwiGLU parameter count in line with a
        // plain FFN (https://arxiv.org/pdf/2002.05202.pdf).
        let multiple_of = 8;
        let intermediate_size = (config.intermediate_size * 2) / 3;
        let intermediate_size = multiple_of * ((intermediate_size + multiple_of - 1) / multiple_of);
        let vb = vb.pp(layer);
        Ok(Self {
            q: linear_no_bias(config.hidden_size, config.hidden_size, vb.pp("q"))?,
            k: linear_no_bias(config.hidden_size, config.hidden_size, vb.pp("k"))?,
            v: linear_no_bias(config.hidden_size, config.hidden_size, vb.pp("v"))?,
            wo: linear_no_bias(config.hidden_size, config.hidden_size, vb.pp("wo"))?,
            w12: linear_no_bias(config.hidden_size, intermediate_size * 2, vb.pp("ffn.w12"))?,
            w3: linear_no_bias(intermediate_size, config.hidden_size, vb.pp("ffn.w3"))?,
            attention_norm: rms_norm(config.hidden_size, config.norm_eps, vb.pp("attention_norm"))?,
            ffn_norm: rms_norm(config.hidden_size, config.norm_eps, vb.pp("ffn_norm"))?,
            num_heads: config.num_attention_heads,
            d_head: config.hidden_size / config.num_attention_heads,
        })
    }

    pub fn forward(
        &self,
        x: &Tensor,
        freqs_cis: &Tensor,
        output_attentions: bool,
    ) -> Result<(Tensor, Option<Tensor>)> {
        let normed = self.attention_norm.forward(x)?;
        let (attn, probs) = self.attention_block(&normed, freqs_cis, output_attentions)?;
        let x = x.add(&attn)?;
        let normed = self.ffn_norm.forward(&x)?;
        let x = x.add(&self.ffn_forward(&normed)?)?;
        Ok((x, probs))
    }

    // SwiGLU with the packed w1/w2 projection the checkpoints ship.
    fn ffn_forward(&self, x: &Tensor) -> Result<Tensor> {
        let w12_out = self.w12.forward(x)?;
        let chunks = w12_out.chunk(2, D::Minus1)?;
        let hidden = chunks[0].silu()?.mul(&chunks[1])?;
        self.w3.forward(&hidden)
    }

    fn attention_block(
        &self,
        x: &Tensor,
        freqs_cis: &Tensor,
        output_attentions: bool,
    ) -> Result<(Tensor, Option<Tensor>)> {
        let (batch_size, seq_len, hidden) = x.dims3()?;
        let xq = self
            .q
            .forward(x)?
            .reshape((batch_size, seq_len, self.num_heads, self.d_head))?;
        let xk = self
            .k
            .forward(x)?
            .reshape((batch_size, seq_len, self.num_heads, self.d_head))?;
        let xv = self
            .v
            .forward(x)?
            .reshape((batch_size, seq_len, self.num_heads, self.d_head))?;
        let (xq, xk) = apply_rotary_emb(&xq, &xk, freqs_cis)?;

        let xq = xq.permute((0, 2, 1, 3))?.contiguous()?;
        let xk = xk.permute((0, 2, 1, 3))?.contiguous()?;
        let xv = xv.permute((0, 2, 1, 3))?.contiguous()?;

        let scaling = 1.0 / (self.d_head as f64).sqrt();
        let scores = (xq.matmul(&xk.transpose(D::Minus2, D::Minus1)?.contiguous()?)? * scaling)?;
        let probs = softmax_last_dim(&scores)?;
        let attn = probs
            .matmul(&xv)?
            .permute((0, 2, 1, 3))?
            .contiguous()?
            .reshape((batch_size, seq_len, hidden))?;
        let output = self.wo.forward(&attn)?;
        Ok((output, output_attentions.then_some(probs)))
    }
}
