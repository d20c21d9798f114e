//! Arena configuration, read from environment variables with fallback to
//! defaults

use crate::game::constants::{assets, tick, world};
use crate::game::systems::ai::HeadingBias;

/// Arena configuration
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// World extent (toroidal)
    pub world_width: f32,
    pub world_height: f32,
    /// Ticks per second
    pub frame_rate: u32,
    /// AI roamers spawned at startup
    pub ai_roamers: usize,
    /// Local display name; a guest name is generated when unset
    pub player_name: Option<String>,
    pub player_asset: String,
    pub roamer_asset: String,
    pub heading_bias: HeadingBias,
    /// Fixed seed for the steering RNG (reproducible roaming)
    pub rng_seed: Option<u64>,
    /// Simulated peers run by the demo binary
    pub peer_count: usize,
    /// Metrics endpoint port, disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            world_width: world::WIDTH,
            world_height: world::HEIGHT,
            frame_rate: tick::FRAME_RATE,
            ai_roamers: 1,
            player_name: None,
            player_asset: assets::DEFAULT_PLAYER.to_string(),
            roamer_asset: assets::DEFAULT_ROAMER.to_string(),
            heading_bias: HeadingBias::default(),
            rng_seed: None,
            peer_count: 2,
            metrics_port: None,
        }
    }
}

impl ArenaConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `load_or_default` with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(width) = lookup("WORLD_WIDTH") {
            match width.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed > 0.0 => config.world_width = parsed,
                _ => tracing::warn!("Invalid WORLD_WIDTH '{}', using default", width),
            }
        }

        if let Some(height) = lookup("WORLD_HEIGHT") {
            match height.parse::<f32>() {
                Ok(parsed) if parsed.is_finite() && parsed > 0.0 => config.world_height = parsed,
                _ => tracing::warn!("Invalid WORLD_HEIGHT '{}', using default", height),
            }
        }

        if let Some(rate) = lookup("FRAME_RATE") {
            if let Ok(parsed) = rate.parse::<u32>() {
                if parsed > 0 && parsed <= tick::MAX_FRAME_RATE {
                    config.frame_rate = parsed;
                } else {
                    tracing::warn!("FRAME_RATE must be 1-{}, using default", tick::MAX_FRAME_RATE);
                }
            } else {
                tracing::warn!("Invalid FRAME_RATE '{}', using default", rate);
            }
        }

        if let Some(roamers) = lookup("AI_ROAMERS") {
            if let Ok(parsed) = roamers.parse::<usize>() {
                if parsed <= 1000 {
                    config.ai_roamers = parsed;
                } else {
                    tracing::warn!("AI_ROAMERS must be 0-1000, using default");
                }
            } else {
                tracing::warn!("Invalid AI_ROAMERS '{}', using default", roamers);
            }
        }

        if let Some(name) = lookup("PLAYER_NAME") {
            let name = name.trim();
            if !name.is_empty() {
                config.player_name = Some(name.to_string());
            }
        }

        if let Some(asset) = lookup("PLAYER_ASSET") {
            if !asset.trim().is_empty() {
                config.player_asset = asset.trim().to_string();
            }
        }

        if let Some(asset) = lookup("ROAMER_ASSET") {
            if !asset.trim().is_empty() {
                config.roamer_asset = asset.trim().to_string();
            }
        }

        if let Some(bias) = lookup("HEADING_BIAS") {
            match bias.parse::<HeadingBias>() {
                Ok(parsed) => config.heading_bias = parsed,
                Err(e) => tracing::warn!("Invalid HEADING_BIAS: {}, using default", e),
            }
        }

        if let Some(seed) = lookup("RNG_SEED") {
            match seed.parse::<u64>() {
                Ok(parsed) => config.rng_seed = Some(parsed),
                Err(_) => tracing::warn!("Invalid RNG_SEED '{}', using entropy", seed),
            }
        }

        if let Some(peers) = lookup("PEER_COUNT") {
            match peers.parse::<usize>() {
                Ok(parsed) if parsed <= 64 => config.peer_count = parsed,
                _ => tracing::warn!("Invalid PEER_COUNT '{}', using default", peers),
            }
        }

        if let Some(port) = lookup("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.metrics_port = Some(parsed),
                _ => tracing::warn!("Invalid METRICS_PORT '{}', metrics endpoint disabled", port),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if !(self.world_width > 0.0 && self.world_height > 0.0) {
            return Err("World extent must be positive".to_string());
        }
        if self.frame_rate == 0 || self.frame_rate > tick::MAX_FRAME_RATE {
            return Err(format!("frame_rate must be 1-{}", tick::MAX_FRAME_RATE));
        }
        if self.player_asset.is_empty() || self.roamer_asset.is_empty() {
            return Err("Asset ids cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ArenaConfig::default();
        assert_eq!(config.world_width, 800.0);
        assert_eq!(config.world_height, 500.0);
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.ai_roamers, 1);
        assert_eq!(config.heading_bias, HeadingBias::Inverse);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_applied() {
        let config = ArenaConfig::from_lookup(lookup_from(&[
            ("WORLD_WIDTH", "1024"),
            ("FRAME_RATE", "30"),
            ("AI_ROAMERS", "5"),
            ("PLAYER_NAME", " Ada "),
            ("HEADING_BIAS", "linear"),
            ("RNG_SEED", "1234"),
            ("METRICS_PORT", "9100"),
        ]));
        assert_eq!(config.world_width, 1024.0);
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.ai_roamers, 5);
        assert_eq!(config.player_name.as_deref(), Some("Ada"));
        assert_eq!(config.heading_bias, HeadingBias::Linear);
        assert_eq!(config.rng_seed, Some(1234));
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ArenaConfig::from_lookup(lookup_from(&[
            ("WORLD_HEIGHT", "-3"),
            ("FRAME_RATE", "1000"),
            ("AI_ROAMERS", "many"),
            ("HEADING_BIAS", "spiral"),
            ("METRICS_PORT", "0"),
        ]));
        assert_eq!(config.world_height, 500.0);
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.ai_roamers, 1);
        assert_eq!(config.heading_bias, HeadingBias::Inverse);
        assert_eq!(config.metrics_port, None);
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let config = ArenaConfig {
            frame_rate: 0,
            ..ArenaConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
