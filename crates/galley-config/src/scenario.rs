//! Pipeline scenario.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The mode the pipeline runs in. Plugin hooks are gated on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Live graph with hot reload.
    #[default]
    Dev,
    /// Bundled, versioned output tree.
    Build,
    /// Like dev, but driven by a test runner.
    Test,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Dev => "dev",
            Scenario::Build => "build",
            Scenario::Test => "test",
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Scenario::Dev | Scenario::Test)
    }

    pub fn is_build(&self) -> bool {
        matches!(self, Scenario::Build)
    }
}

impl std::str::FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Scenario::Dev),
            "build" | "production" => Ok(Scenario::Build),
            "test" => Ok(Scenario::Test),
            other => Err(ConfigError::UnknownScenario(other.to_string())),
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_from_str() {
        assert_eq!("dev".parse::<Scenario>().unwrap(), Scenario::Dev);
        assert_eq!("development".parse::<Scenario>().unwrap(), Scenario::Dev);
        assert_eq!("build".parse::<Scenario>().unwrap(), Scenario::Build);
        assert_eq!("production".parse::<Scenario>().unwrap(), Scenario::Build);
        assert_eq!("TEST".parse::<Scenario>().unwrap(), Scenario::Test);
        assert!("staging".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_scenario_display() {
        assert_eq!(Scenario::Dev.to_string(), "dev");
        assert_eq!(Scenario::Build.to_string(), "build");
    }

    #[test]
    fn test_scenario_default() {
        assert_eq!(Scenario::default(), Scenario::Dev);
    }
}
