//! Environment-driven configuration for the data layer.

use std::env;

/// Deployment environment, parsed from `ENVIRONMENT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Test,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value {
            "local" => Self::Local,
            "test" => Self::Test,
            "staging" => Self::Staging,
            _ => Self::Production,
        }
    }
}

/// How the mutation pipeline treats unknown fields: strict raises, lenient
/// logs the offending field and proceeds with the rest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Lenient,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub environment: Environment,
    pub validation: ValidationMode,
}

impl DbConfig {
    /// Reads `ENVIRONMENT` and `UNIT_TESTING` (dotenv-aware). Unit-test runs
    /// get the test environment and strict validation.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        if env_flag("UNIT_TESTING") {
            return Self::for_tests();
        }
        let environment = env::var("ENVIRONMENT")
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Local);
        Self {
            environment,
            validation: ValidationMode::Lenient,
        }
    }

    /// Test environment with strict validation; what the test suite runs with.
    pub fn for_tests() -> Self {
        Self {
            environment: Environment::Test,
            validation: ValidationMode::Strict,
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            validation: ValidationMode::Lenient,
        }
    }
}

fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(v) => !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"),
        Err(_) => false,
    }
}
