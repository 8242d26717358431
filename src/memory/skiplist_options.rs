use std::env;

use anyhow::{ensure, Context, Result};

pub const DEFAULT_MAX_LEVEL: usize = 16;

const MAX_LEVEL_ENV: &str = "SKIP_INDEX_MAX_LEVEL";
const SEED_ENV: &str = "SKIP_INDEX_SEED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipListOptions {
    // hard ceiling on the number of levels a node can occupy
    pub max_level: usize,
    // fixed seed for level generation; drawn from the OS when absent
    pub seed: Option<u64>,
}

impl SkipListOptions {
    pub fn new_with_defaults() -> Self {
        Self {
            max_level: DEFAULT_MAX_LEVEL,
            seed: None,
        }
    }

    /// Sizes `max_level` as `ceil(log2(expected_size))`, never below one level.
    pub fn for_expected_size(expected_size: usize) -> Self {
        let max_level = expected_size
            .checked_next_power_of_two()
            .map_or(usize::BITS, |n| n.trailing_zeros());
        Self {
            max_level: (max_level as usize).max(1),
            seed: None,
        }
    }

    /// Defaults overridden by `SKIP_INDEX_MAX_LEVEL` and `SKIP_INDEX_SEED`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::new_with_defaults();
        if let Some(raw) = lookup(MAX_LEVEL_ENV) {
            options.max_level = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {}: {:?}", MAX_LEVEL_ENV, raw))?;
        }
        if let Some(raw) = lookup(SEED_ENV) {
            let seed = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {}: {:?}", SEED_ENV, raw))?;
            options.seed = Some(seed);
        }
        options.validate()?;
        Ok(options)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_level > 0,
            "max_level must be a positive integer, got {}",
            self.max_level
        );
        Ok(())
    }
}

impl Default for SkipListOptions {
    fn default() -> Self {
        Self::new_with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::{SkipListOptions, DEFAULT_MAX_LEVEL};

    #[test]
    fn test_defaults() {
        let options = SkipListOptions::new_with_defaults();
        assert_eq!(options.max_level, DEFAULT_MAX_LEVEL);
        assert!(options.seed.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_for_expected_size() {
        // degenerate sizes still get one level
        assert_eq!(SkipListOptions::for_expected_size(0).max_level, 1);
        assert_eq!(SkipListOptions::for_expected_size(1).max_level, 1);
        assert_eq!(SkipListOptions::for_expected_size(2).max_level, 1);
        assert_eq!(SkipListOptions::for_expected_size(3).max_level, 2);
        assert_eq!(SkipListOptions::for_expected_size(1024).max_level, 10);
        assert_eq!(SkipListOptions::for_expected_size(1025).max_level, 11);
        assert_eq!(
            SkipListOptions::for_expected_size(usize::MAX).max_level,
            usize::BITS as usize
        );
    }

    #[test]
    fn test_validate_rejects_zero_levels() {
        let options = SkipListOptions {
            max_level: 0,
            seed: Some(7),
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("max_level"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let options = SkipListOptions::from_lookup(|name| match name {
            "SKIP_INDEX_MAX_LEVEL" => Some(" 8 ".to_string()),
            "SKIP_INDEX_SEED" => Some("42".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(options.max_level, 8);
        assert_eq!(options.seed, Some(42));

        let options = SkipListOptions::from_lookup(|_| None).unwrap();
        assert_eq!(options, SkipListOptions::new_with_defaults());
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = SkipListOptions::from_lookup(|name| {
            (name == "SKIP_INDEX_MAX_LEVEL").then(|| "tall".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("SKIP_INDEX_MAX_LEVEL"));

        let err = SkipListOptions::from_lookup(|name| {
            (name == "SKIP_INDEX_SEED").then(|| "-3".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("SKIP_INDEX_SEED"));

        // parses, but fails validation
        let err = SkipListOptions::from_lookup(|name| {
            (name == "SKIP_INDEX_MAX_LEVEL").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("max_level"));
    }

    #[test]
    fn test_with_seed() {
        let options = SkipListOptions::new_with_defaults().with_seed(42);
        assert_eq!(options.seed, Some(42));
    }
}
