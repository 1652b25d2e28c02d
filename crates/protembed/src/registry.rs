use candle_core::{Device, Tensor};

use protembed_plms::{ProteinTokenizer, SequenceEmbeddings, AMPLIFY, ESM2};

use crate::error::ExtractError;
use crate::pipeline::ProteinLanguageModel;

/// All model names the CLI accepts, in checkpoint order.
pub const MODEL_NAMES: [&str; 8] = [
    "esm2_t6_8M_UR50D",
    "esm2_t12_35M_UR50D",
    "esm2_t30_150M_UR50D",
    "esm2_t33_650M_UR50D",
    "esm2_t36_3B_UR50D",
    "esm2_t48_15B_UR50D",
    "amplify_120M",
    "amplify_350M",
];

/// Closed set of supported checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKey {
    Esm2T6,
    Esm2T12,
    Esm2T30,
    Esm2T33,
    Esm2T36,
    Esm2T48,
    Amplify120M,
    Amplify350M,
}

impl ModelKey {
    /// Resolve a command-line model name. Pure, so unknown names are
    /// rejected before any network or filesystem access.
    pub fn parse(name: &str) -> Result<Self, ExtractError> {
        match name {
            "esm2_t6_8M_UR50D" => Ok(Self::Esm2T6),
            "esm2_t12_35M_UR50D" => Ok(Self::Esm2T12),
            "esm2_t30_150M_UR50D" => Ok(Self::Esm2T30),
            "esm2_t33_650M_UR50D" => Ok(Self::Esm2T33),
            "esm2_t36_3B_UR50D" => Ok(Self::Esm2T36),
            "esm2_t48_15B_UR50D" => Ok(Self::Esm2T48),
            "amplify_120M" => Ok(Self::Amplify120M),
            "amplify_350M" => Ok(Self::Amplify350M),
            _ => Err(ExtractError::UnknownModel(name.to_string())),
        }
    }

    pub fn hub_repo(&self) -> &'static str {
        match self {
            Self::Esm2T6 => "facebook/esm2_t6_8M_UR50D",
            Self::Esm2T12 => "facebook/esm2_t12_35M_UR50D",
            Self::Esm2T30 => "facebook/esm2_t30_150M_UR50D",
            Self::Esm2T33 => "facebook/esm2_t33_650M_UR50D",
            Self::Esm2T36 => "facebook/esm2_t36_3B_UR50D",
            Self::Esm2T48 => "facebook/esm2_t48_15B_UR50D",
            Self::Amplify120M => "chandar-lab/AMPLIFY_120M",
            Self::Amplify350M => "chandar-lab/AMPLIFY_350M",
        }
    }

    /// Fetch and load the checkpoint behind the boxed model seam.
    pub fn load(&self, device: &Device) -> Result<Box<dyn ProteinLanguageModel>, ExtractError> {
        let repo = self.hub_repo();
        match self {
            Self::Amplify120M | Self::Amplify350M => {
                let (model, tokenizer) = AMPLIFY::from_hub(repo, device)
                    .map_err(|e| ExtractError::ModelLoad(format!("{}: {}", repo, e)))?;
                Ok(Box::new(AmplifyEmbedder {
                    model,
                    tokenizer,
                    device: device.clone(),
                }))
            }
            _ => {
                let (model, tokenizer) = ESM2::from_hub(repo, device)
                    .map_err(|e| ExtractError::ModelLoad(format!("{}: {}", repo, e)))?;
                Ok(Box::new(Esm2Embedder {
                    model,
                    tokenizer,
                    device: device.clone(),
                }))
            }
        }
    }
}

struct Esm2Embedder {
    model: ESM2,
    tokenizer: ProteinTokenizer,
    device: Device,
}

impl ProteinLanguageModel for Esm2Embedder {
    fn hidden_size(&self) -> usize {
        self.model.hidden_size()
    }

    fn embed(&self, sequence: &str, with_attentions: bool) -> anyhow::Result<SequenceEmbeddings> {
        let tokens = self.tokenizer.encode(sequence)?;
        let ids = Tensor::new(tokens.ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let output = self.model.forward(&ids, with_attentions)?;
        Ok(output.residue_embeddings(&tokens.special_mask)?)
    }
}

struct AmplifyEmbedder {
    model: AMPLIFY,
    tokenizer: ProteinTokenizer,
    device: Device,
}

impl ProteinLanguageModel for AmplifyEmbedder {
    fn hidden_size(&self) -> usize {
        self.model.hidden_size()
    }

    fn embed(&self, sequence: &str, with_attentions: bool) -> anyhow::Result<SequenceEmbeddings> {
        let tokens = self.tokenizer.encode(sequence)?;
        let ids = Tensor::new(tokens.ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let output = self.model.forward(&ids, with_attentions)?;
        Ok(output.residue_embeddings(&tokens.special_mask)?)
    }
}
