//! Protein language models for embedding extraction.
//!
//! This crate bundles the model families `protembed` can run locally with
//! [candle](https://github.com/huggingface/candle):
//!
//! - **ESM2**: the Meta ESM2 series, from 8M to 15B parameters.
//! - **AMPLIFY**: the chandar-lab AMPLIFY models at 120M and 350M parameters.
//!
//! Each model exposes a `from_hub` constructor that fetches the checkpoint
//! and tokenizer from the Hugging Face Hub and a `forward` that returns the
//! final hidden states, optionally with per-layer attention weights.

pub mod amplify;
pub mod device;
pub mod esm2;
mod outputs;
mod tokenizer;

pub use amplify::{AMPLIFYConfig, AMPLIFY};
pub use esm2::{ESM2Config, ESM2};
pub use outputs::{ModelOutput, SequenceEmbeddings};
pub use tokenizer::{ProteinTokenizer, TokenizedSequence};
