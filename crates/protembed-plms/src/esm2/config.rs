use serde::Deserialize;

fn default_layer_norm_eps() -> f64 {
    1e-5
}

fn default_max_position_embeddings() -> usize {
    1026
}

fn default_token_dropout() -> bool {
    true
}

/// Hyperparameters of an ESM2 checkpoint, parsed from its `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ESM2Config {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(default = "default_token_dropout")]
    pub token_dropout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hub_config_json() {
        let raw = r#"{
            "architectures": ["EsmForMaskedLM"],
            "vocab_size": 33,
            "hidden_size": 320,
            "num_hidden_layers": 6,
            "num_attention_heads": 20,
            "intermediate_size": 1280,
            "position_embedding_type": "rotary"
        }"#;
        let config: ESM2Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.hidden_size, 320);
        assert_eq!(config.num_hidden_layers, 6);
        assert_eq!(config.layer_norm_eps, 1e-5);
        assert!(config.token_dropout);
    }
}
