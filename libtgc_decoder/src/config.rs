use serde::{Deserialize, Serialize};
use std::path::Path;

use super::constants::CUT_DROP_PRD_WITH_ZERO_WIDTH;
use super::error::ConfigError;

/// Decode policy knobs. Serializable to YAML with serde and serde_yaml so a
/// driver can persist and reload them alongside its own settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Convert coincidence words in addition to hits. Forced off when the
    /// cabling map uses the legacy 8-fold scheme, which predates the
    /// coincidence readout.
    pub fill_coincidences: bool,
    /// Drop candidate records whose measured channel width is below
    /// `min_channel_width` instead of keeping them with a warning.
    pub drop_zero_width_records: bool,
    /// Width sanity threshold in mm.
    pub min_channel_width: f64,
    /// Log known spuriously-firing channels at warn level instead of debug.
    pub warn_known_dead_channels: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            fill_coincidences: true,
            drop_zero_width_records: true,
            min_channel_width: CUT_DROP_PRD_WITH_ZERO_WIDTH,
            warn_known_dead_channels: false,
        }
    }
}

impl DecoderConfig {
    /// Read the configuration from a YAML file
    /// Returns a DecoderConfig if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let config = DecoderConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: DecoderConfig = serde_yaml::from_str(&yaml).unwrap();
        assert!(back.fill_coincidences);
        assert!(back.drop_zero_width_records);
        assert!((back.min_channel_width - CUT_DROP_PRD_WITH_ZERO_WIDTH).abs() < 1e-12);
    }
}
