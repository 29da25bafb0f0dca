//! Scenario files: engine config plus the business catalog.

use anyhow::{Context, Result};
use idle_core::{validate_catalog, validate_config, Business, EngineConfig};
use serde::Deserialize;
use std::path::Path;

const CLASSIC: &str = include_str!("../../../scenarios/classic.yaml");

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    pub catalog: Vec<Business>,
}

impl Scenario {
    pub fn parse(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(text).context("invalid scenario yaml")?;
        validate_catalog(&scenario.catalog)?;
        validate_config(&scenario.config)?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&text)
    }

    /// The bundled five-business ladder.
    pub fn classic() -> Result<Self> {
        Self::parse(CLASSIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn classic_scenario_parses() {
        let s = Scenario::classic().unwrap();
        assert_eq!(s.catalog.len(), 5);
        let lemonade = &s.catalog[0];
        assert_eq!(lemonade.name, "Lemonade Stand");
        assert_eq!(lemonade.manager_cost, Decimal::new(500, 0));
        assert_eq!(lemonade.current_level, 0);
        assert_eq!(s.config, EngineConfig::default());
    }

    const SHOP: &str = "  - {name: Shop, base_rewards: 2.0, base_upgrading_price: 5.0, \
                        unlocking_price: 5.0, cooldown: 2.0, manager_cost: 50.0}\n";

    #[test]
    fn config_is_optional() {
        let s = Scenario::parse(&format!("catalog:\n{SHOP}")).unwrap();
        assert_eq!(s.config.tick_ms, 10);
        assert_eq!(s.catalog[0].cooldown_ms(), 2000);
    }

    #[test]
    fn duplicate_names_rejected() {
        let text = format!("catalog:\n{SHOP}{SHOP}");
        assert!(Scenario::parse(&text).is_err());
    }

    #[test]
    fn zero_tick_rejected() {
        let text = format!("config:\n  tick_ms: 0\ncatalog:\n{SHOP}");
        let err = Scenario::parse(&text).unwrap_err();
        assert!(err.to_string().contains("tick_ms"));
    }
}
