// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FleetrunError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FleetrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.pool, raw.interpreter))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_interpreter(cfg)?;
    validate_sentinel(&cfg.interpreter.sentinel)?;
    Ok(())
}

fn validate_interpreter(cfg: &RawConfigFile) -> Result<()> {
    if cfg.interpreter.program.trim().is_empty() {
        return Err(FleetrunError::ConfigError(
            "[interpreter].program must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_sentinel(sentinel: &str) -> Result<()> {
    if sentinel.is_empty() {
        return Err(FleetrunError::ConfigError(
            "[interpreter].sentinel must not be empty".to_string(),
        ));
    }
    if let Some(bad) = sentinel
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '`' | '\\'))
    {
        return Err(FleetrunError::ConfigError(format!(
            "[interpreter].sentinel contains forbidden character {bad:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(src: &str) -> RawConfigFile {
        toml::from_str(src).expect("valid toml")
    }

    #[test]
    fn empty_file_is_valid() {
        let cfg = ConfigFile::try_from(raw("")).expect("valid config");
        assert_eq!(cfg.interpreter.program, "sh");
        assert_eq!(cfg.pool_limits().max_size, 10);
    }

    #[test]
    fn empty_program_is_rejected() {
        let err = ConfigFile::try_from(raw("[interpreter]\nprogram = \"\"\n")).unwrap_err();
        assert!(err.to_string().contains("program must not be empty"));
    }

    #[test]
    fn sentinel_with_space_is_rejected() {
        let err = ConfigFile::try_from(raw("[interpreter]\nsentinel = \"DONE NOW\"\n")).unwrap_err();
        assert!(err.to_string().contains("forbidden character"));
    }

    #[test]
    fn invalid_pool_values_are_corrected_not_rejected() {
        let cfg = ConfigFile::try_from(raw("[pool]\nmax_size = -3\nmax_queue_size = -1\n"))
            .expect("valid config");
        let limits = cfg.pool_limits();
        assert_eq!(limits.max_size, 10);
        assert_eq!(limits.max_queue_size, 1000);
    }
}
