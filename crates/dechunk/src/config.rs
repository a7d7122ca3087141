//! Dechunk configuration.
//!
//! The whole feature is switched by one flag, set with the directive
//!
//! ```text
//! DechunkEngine On
//! ```
//!
//! Configuration can also be deserialized with serde, e.g. from a JSON or TOML
//! section of the host's settings. Server and directory level configurations are
//! combined with [`DechunkConfig::merge`], where the more specific one wins.

use serde::Deserialize;

use crate::collector::DEFAULT_READ_SIZE;
use crate::error::ConfigError;

pub const ENGINE_DIRECTIVE: &str = "DechunkEngine";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DechunkConfig {
    /// buffer chunked request bodies when set
    pub engine: bool,
    /// upper bound of one read while collecting a body
    pub read_size: u64,
}

impl Default for DechunkConfig {
    fn default() -> Self {
        Self { engine: false, read_size: DEFAULT_READ_SIZE }
    }
}

impl DechunkConfig {
    pub fn enabled() -> Self {
        Self { engine: true, ..Self::default() }
    }

    /// Combines a base configuration with a more specific one; the override wins.
    #[must_use]
    pub fn merge(_base: &Self, overrides: &Self) -> Self {
        *overrides
    }

    /// Applies one directive line, e.g. `DechunkEngine Off`.
    ///
    /// Directive names and flag values are matched case-insensitively.
    pub fn apply_directive(&mut self, line: &str) -> Result<(), ConfigError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(());
        };

        if !name.eq_ignore_ascii_case(ENGINE_DIRECTIVE) {
            return Err(ConfigError::unknown_directive(name));
        }

        let value = words.next().ok_or_else(|| ConfigError::missing_argument(ENGINE_DIRECTIVE))?;
        if let Some(extra) = words.next() {
            return Err(ConfigError::invalid_flag(ENGINE_DIRECTIVE, format!("{value} {extra}")));
        }

        self.engine = parse_flag(value).ok_or_else(|| ConfigError::invalid_flag(ENGINE_DIRECTIVE, value))?;
        Ok(())
    }

    /// Builds a configuration from directive text, one directive per line.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_directives(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for line in text.lines().map(str::trim).filter(|line| !line.is_empty() && !line.starts_with('#')) {
            config.apply_directive(line)?;
        }
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on") {
        Some(true)
    } else if value.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_off() {
        let config = DechunkConfig::default();

        assert!(!config.engine);
        assert_eq!(config.read_size, 8192);
    }

    #[test]
    fn test_apply_directive() {
        let mut config = DechunkConfig::default();

        config.apply_directive("DechunkEngine On").unwrap();
        assert!(config.engine);

        config.apply_directive("  dechunkengine   off ").unwrap();
        assert!(!config.engine);
    }

    #[test]
    fn test_invalid_directives() {
        let mut config = DechunkConfig::default();

        assert_eq!(config.apply_directive("DechunkEngine"), Err(ConfigError::missing_argument("DechunkEngine")));
        assert_eq!(config.apply_directive("DechunkEngine yes"), Err(ConfigError::invalid_flag("DechunkEngine", "yes")));
        assert_eq!(config.apply_directive("DechunkEngine On Off"), Err(ConfigError::invalid_flag("DechunkEngine", "On Off")));
        assert_eq!(config.apply_directive("KeepAlive On"), Err(ConfigError::unknown_directive("KeepAlive")));
        assert!(!config.engine);
    }

    #[test]
    fn test_from_directives() {
        let text = "
            # buffer chunked uploads for the wsgi app
            DechunkEngine On
        ";

        assert_eq!(DechunkConfig::from_directives(text).unwrap(), DechunkConfig::enabled());
        assert_eq!(DechunkConfig::from_directives("").unwrap(), DechunkConfig::default());
    }

    #[test]
    fn test_override_wins() {
        let server = DechunkConfig::enabled();
        let directory = DechunkConfig::default();

        assert_eq!(DechunkConfig::merge(&server, &directory), directory);
        assert_eq!(DechunkConfig::merge(&directory, &server), server);
    }

    #[test]
    fn test_deserialize() {
        let config: DechunkConfig = serde_json::from_str(r#"{"engine": true}"#).unwrap();
        assert_eq!(config, DechunkConfig::enabled());

        let config: DechunkConfig = serde_json::from_str(r#"{"read_size": 1024}"#).unwrap();
        assert_eq!(config, DechunkConfig { engine: false, read_size: 1024 });
    }
}
