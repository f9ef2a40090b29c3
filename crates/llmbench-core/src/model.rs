use serde::{Deserialize, Serialize};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A model that becomes the default once the host has at least
/// `min_memory_gb` of physical memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTier {
    pub min_memory_gb: f64,
    pub model: String,
}

/// Memory-keyed lookup table used to pick a default model for the host.
///
/// Tiers are checked in order and the first one whose threshold is met wins,
/// so they should be listed largest first. Hosts below every threshold get
/// `fallback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTierTable {
    pub tiers: Vec<ModelTier>,
    pub fallback: String,
}

impl Default for ModelTierTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                ModelTier {
                    min_memory_gb: 32.0,
                    model: "deepseek-r1:14b".to_string(),
                },
                ModelTier {
                    min_memory_gb: 16.0,
                    model: "deepseek-r1:8b".to_string(),
                },
            ],
            fallback: "deepseek-coder:6.7b".to_string(),
        }
    }
}

impl ModelTierTable {
    pub fn select(&self, total_memory_bytes: u64) -> &str {
        let total_gb = total_memory_bytes as f64 / BYTES_PER_GB;

        self.tiers
            .iter()
            .find(|tier| total_gb >= tier.min_memory_gb)
            .map(|tier| tier.model.as_str())
            .unwrap_or(&self.fallback)
    }
}
