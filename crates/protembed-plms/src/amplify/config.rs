use serde::Deserialize;

fn default_norm_eps() -> f64 {
    1e-5
}

fn default_max_length() -> usize {
    2048
}

/// Hyperparameters of an AMPLIFY checkpoint, parsed from its `config.json`.
///
/// The checkpoints use SwiGLU feed-forwards and RMSNorm throughout, so the
/// activation and norm choices are fixed in the encoder rather than read
/// from the config.
#[derive(Debug, Clone, Deserialize)]
pub struct AMPLIFYConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default = "default_norm_eps")]
    pub norm_eps: f64,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hub_config_json() {
        let raw = r#"{
            "hidden_act": "SwiGLU",
            "vocab_size": 27,
            "hidden_size": 640,
            "num_hidden_layers": 24,
            "num_attention_heads": 10,
            "intermediate_size": 2560,
            "dropout_prob": 0,
            "norm_eps": 1e-05,
            "max_length": 2048
        }"#;
        let config: AMPLIFYConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.hidden_size, 640);
        assert_eq!(config.num_hidden_layers, 24);
        assert_eq!(config.max_length, 2048);
    }
}
