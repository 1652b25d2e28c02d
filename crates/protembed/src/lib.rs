//! Extract protein language model embeddings from FASTA files.
//!
//! The pipeline reads a FASTA file, embeds every sequence with a pretrained
//! model from [`protembed_plms`], derives the requested embedding kinds
//! (mean pooled, per token, substring pooled, attention heads) and writes
//! one safetensors artifact per sequence and kind under
//! `<output_path>/<experiment_name>/<kind>/`.

pub mod cli;
pub mod config;
pub mod error;
pub mod fasta;
pub mod pipeline;
pub mod registry;
pub mod substring;
pub mod writer;
