use candle_core::{Device, Result, Tensor, D};

/// Precompute the rotary table as stacked cos/sin pairs,
/// shape `[max_len, head_dim / 2, 2]`.
pub fn precompute_freqs_cis(head_dim: usize, max_len: usize, device: &Device) -> Result<Tensor> {
    let theta: f32 = 10000.0;
    let freqs = (0..head_dim / 2).map(|i| 1.0 / theta.powf((2 * i) as f32 / head_dim as f32));
    let freqs = Tensor::from_iter(freqs, device)?;
    let t = Tensor::from_iter((0..max_len).map(|x| x as f32), device)?;
    let freqs = t.unsqueeze(1)?.matmul(&freqs.unsqueeze(0)?)?;
    let freqs_cos = freqs.cos()?;
    let freqs_sin = freqs.sin()?;
    Tensor::stack(&[freqs_cos, freqs_sin], D::Minus1)
}

/// Rotate `[batch, seq, heads, head_dim]` queries and keys, treating each
/// adjacent pair of features as a complex number.
pub fn apply_rotary_emb(xq: &Tensor, xk: &Tensor, freqs_cis: &Tensor) -> Result<(Tensor, Tensor)> {
    let (b_sz, seq_len, h, head_dim) = xq.dims4()?;
    let half = head_dim / 2;
    let xq = xq.reshape((b_sz, seq_len, h, half, 2))?;
    let xk = xk.reshape((b_sz, seq_len, h, half, 2))?;

    let freqs_cis = freqs_cis
        .narrow(0, 0, seq_len)?
        .unsqueeze(0)?
        .unsqueeze(2)?
        .expand((b_sz, seq_len, h, half, 2))?;
    let cos = freqs_cis.narrow(4, 0, 1)?.squeeze(4)?;
    let sin = freqs_cis.narrow(4, 1, 1)?.squeeze(4)?;

    let rotate = |x: &Tensor| -> Result<Tensor> {
        let real = x.narrow(4, 0, 1)?.squeeze(4)?;
        let imag = x.narrow(4, 1, 1)?.squeeze(4)?;
        let out_real = real.mul(&cos)?.sub(&imag.mul(&sin)?)?;
        let out_imag = real.mul(&sin)?.add(&imag.mul(&cos)?)?;
        Tensor::stack(&[out_real, out_imag], 4)
    };

    let xq_out = rotate(&xq)?.reshape((b_sz, seq_len, h, head_dim))?;
    let xk_out = rotate(&xk)?.reshape((b_sz, seq_len, h, head_dim))?;
    Ok((xq_out, xk_out))
}
