use std::path::Path;

use serde::Deserialize;

/// How a non-exhaustive `match` is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exhaustiveness {
    #[default]
    Error,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub exhaustiveness: Exhaustiveness,
    /// Maximum number of evaluation steps; unlimited when absent.
    #[serde(default)]
    pub fuel: Option<u64>,
    /// Maximum nesting of evaluation; `runtime::DEFAULT_MAX_DEPTH` when absent.
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub trace_unification: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_text_gives_defaults() {
        let config = Config::from_toml_str("").expect("config");
        assert_eq!(config, Config::default());
        assert_eq!(config.exhaustiveness, Exhaustiveness::Error);
        assert_eq!(config.fuel, None);
        assert_eq!(config.max_depth, None);
    }

    #[test]
    fn reads_every_field() {
        let config = Config::from_toml_str(
            "exhaustiveness = \"warn\"\nfuel = 5000\nmax_depth = 200\ntrace_unification = true\n",
        )
        .expect("config");
        assert_eq!(config.exhaustiveness, Exhaustiveness::Warn);
        assert_eq!(config.fuel, Some(5000));
        assert_eq!(config.max_depth, Some(200));
        assert!(config.trace_unification);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("colour = \"blue\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "fuel = 12").expect("write");
        let config = Config::load(file.path()).expect("load");
        assert_eq!(config.fuel, Some(12));

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            Config::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
