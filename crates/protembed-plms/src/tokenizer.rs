use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use tokenizers::models::wordlevel::WordLevel;
use tokenizers::pre_tokenizers::whitespace::WhitespaceSplit;
use tokenizers::processors::template::TemplateProcessing;
use tokenizers::Tokenizer;

/// ESM2 vocabulary in id order.
const ESM2_VOCAB: [&str; 33] = [
    "<cls>", "<pad>", "<eos>", "<unk>", "L", "A", "G", "V", "S", "E", "R", "T",
    "I", "D", "P", "K", "Q", "N", "F", "Y", "M", "H", "W", "C", "X", "B", "U",
    "Z", "O", ".", "-", "<null_1>", "<mask>",
];

/// Residue-level tokenizer shared by the model families.
///
/// Sequences are encoded one residue per token. Special tokens added by the
/// post-processor (cls/bos, eos) are tracked in the special-tokens mask so
/// they can be stripped from the model output later.
pub struct ProteinTokenizer {
    tokenizer: Tokenizer,
}

/// Token ids for one sequence plus the special-tokens mask over the same axis.
pub struct TokenizedSequence {
    pub ids: Vec<u32>,
    pub special_mask: Vec<u32>,
}

impl ProteinTokenizer {
    /// Build the ESM2 tokenizer from its fixed 33-token vocabulary.
    ///
    /// The checkpoints on the Hub ship a `vocab.txt` in this exact order, so
    /// the table is inlined rather than fetched.
    pub fn esm2() -> Result<Self> {
        let vocab: HashMap<String, u32> = ESM2_VOCAB
            .iter()
            .enumerate()
            .map(|(id, token)| (token.to_string(), id as u32))
            .collect();
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("<unk>".to_string())
            .build()
            .map_err(anyhow::Error::msg)?;
        let mut tokenizer = Tokenizer::new(model);
        tokenizer.with_pre_tokenizer(Some(WhitespaceSplit));
        let template = TemplateProcessing::builder()
            .try_single("<cls> $A <eos>")
            .map_err(anyhow::Error::msg)?
            .special_tokens(vec![("<cls>", 0), ("<eos>", 2)])
            .build()
            .map_err(anyhow::Error::msg)?;
        tokenizer.with_post_processor(Some(template));
        Ok(Self { tokenizer })
    }

    /// Load a `tokenizer.json`, e.g. one fetched from the Hub.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_file(path).map_err(anyhow::Error::msg)?;
        tokenizer.with_pre_tokenizer(Some(WhitespaceSplit));
        Ok(Self { tokenizer })
    }

    /// Encode a residue string, adding the model's special tokens.
    pub fn encode(&self, sequence: &str) -> Result<TokenizedSequence> {
        let spaced = sequence
            .chars()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let encoding = self
            .tokenizer
            .encode(spaced, true)
            .map_err(anyhow::Error::msg)?;
        Ok(TokenizedSequence {
            ids: encoding.get_ids().to_vec(),
            special_mask: encoding.get_special_tokens_mask().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esm2_ids_and_mask() {
        let tokenizer = ProteinTokenizer::esm2().unwrap();
        let tokens = tokenizer.encode("MKT").unwrap();
        assert_eq!(tokens.ids, vec![0, 20, 15, 11, 2]);
        assert_eq!(tokens.special_mask, vec![1, 0, 0, 0, 1]);
    }

    #[test]
    fn unknown_residue_maps_to_unk() {
        let tokenizer = ProteinTokenizer::esm2().unwrap();
        let tokens = tokenizer.encode("MJM").unwrap();
        assert_eq!(tokens.ids, vec![0, 20, 3, 20, 2]);
    }

    #[test]
    fn mask_length_matches_ids() {
        let tokenizer = ProteinTokenizer::esm2().unwrap();
        let tokens = tokenizer.encode("ACDEFGHIKLMNPQRSTVWY").unwrap();
        assert_eq!(tokens.ids.len(), 22);
        assert_eq!(tokens.special_mask.len(), tokens.ids.len());
    }
}
