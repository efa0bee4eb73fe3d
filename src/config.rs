// Configuration: the enumerated settings surface of spec.md §6, loaded
// from TOML the way the teacher's `EmulatorConfig` loads
// `emulator_config.toml` — `serde`/`toml`, `load_or_default`/`save`, a
// literal `Default` impl spelling out every default value.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

const CONFIG_FILE: &str = "rasta-opt.toml";

/// How many evaluations between automatic checkpoint saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all = "lowercase")]
pub enum SavePeriod {
    Auto,
    Evaluations(u64),
}

/// `seed:"random"|u64` per spec.md §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all = "lowercase")]
pub enum SeedConfig {
    Random,
    Fixed(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Lahc,
    Dlas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DualStrategyConfig {
    Alternate,
    Staged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DualInitConfig {
    Dup,
    Random,
    Anti,
}

/// Dual-frame co-optimization settings, all under the `[dual]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualConfig {
    pub on: bool,
    pub strategy: DualStrategyConfig,
    pub init: DualInitConfig,
    pub mutate_ratio: f64,
    pub stage_evals: u64,
    pub cross_share_prob: f64,
    pub w_l: f64,
    pub w_c: f64,
    pub w_l_initial: f64,
    pub blink_ramp_evals: u64,
}

impl Default for DualConfig {
    fn default() -> Self {
        DualConfig {
            on: false,
            strategy: DualStrategyConfig::Alternate,
            init: DualInitConfig::Dup,
            mutate_ratio: 0.5,
            stage_evals: 2_000,
            cross_share_prob: 0.05,
            w_l: 1.0,
            w_c: 1.0,
            w_l_initial: 0.6,
            blink_ramp_evals: 50_000,
        }
    }
}

/// Top-level configuration, per spec.md §6 "Configuration (enumerated)".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub threads: usize,
    pub max_evals: u64,
    pub save: SavePeriod,
    pub seed: SeedConfig,
    pub cache_mib: usize,
    pub optimizer: OptimizerKind,
    pub history_length: usize,
    pub dual: DualConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            threads: 4,
            max_evals: 0,
            save: SavePeriod::Auto,
            seed: SeedConfig::Random,
            cache_mib: 256,
            optimizer: OptimizerKind::Lahc,
            history_length: 2_000,
            dual: DualConfig::default(),
        }
    }
}

impl OptimizerConfig {
    /// Validate the enumerated constraints spec.md §6 states inline
    /// (`threads:int>=1`, `history_length:int>=1`, ratios in `[0,1]`).
    pub fn validate(&self) -> Result<(), crate::error::InputError> {
        if self.threads < 1 {
            return Err(crate::error::InputError::Config("threads must be >= 1".to_string()));
        }
        if self.history_length < 1 {
            return Err(crate::error::InputError::Config("history_length must be >= 1".to_string()));
        }
        for (name, value) in [
            ("dual.mutate_ratio", self.dual.mutate_ratio),
            ("dual.cross_share_prob", self.dual.cross_share_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(crate::error::InputError::Config(format!("{name} must be in [0,1]")));
            }
        }
        Ok(())
    }

    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_default()
    }

    pub fn load(path: &str) -> Result<Self, io::Error> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &str) -> Result<(), io::Error> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }
}

impl Default for SavePeriod {
    fn default() -> Self {
        SavePeriod::Auto
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig::Random
    }
}

pub fn default_config_path() -> &'static str {
    CONFIG_FILE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(OptimizerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_threads_is_rejected() {
        let mut config = OptimizerConfig::default();
        config.threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ratio_out_of_range_is_rejected() {
        let mut config = OptimizerConfig::default();
        config.dual.mutate_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = OptimizerConfig::default();
        let text = toml::to_string(&config).expect("serialize");
        let parsed: OptimizerConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(config, parsed);
    }

    #[test]
    fn seed_accepts_random_or_fixed() {
        #[derive(Deserialize)]
        struct Wrapper {
            seed: SeedConfig,
        }
        let random: Wrapper = toml::from_str("seed = \"random\"\n").expect("parse");
        assert_eq!(random.seed, SeedConfig::Random);
        let fixed: Wrapper = toml::from_str("seed = 42\n").expect("parse");
        assert_eq!(fixed.seed, SeedConfig::Fixed(42));
    }
}
