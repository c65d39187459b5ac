use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let relay_dir = home.join(".turnrelay");
        let config_path = relay_dir.join("config.toml");

        if !relay_dir.exists() {
            fs::create_dir_all(&relay_dir).context("Failed to create .turnrelay directory")?;
            fs::create_dir_all(relay_dir.join("workspace"))
                .context("Failed to create workspace directory")?;
        }

        let mut config = if config_path.exists() {
            let mut config = Self::load_from_path(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?;
            config.workspace_dir = relay_dir.join("workspace");
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                workspace_dir: relay_dir.join("workspace"),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> crate::Result<Self> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.proxy.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("proxy.base_url must not be empty".into()));
        }
        if self.proxy.timeout_secs == 0 {
            return Err(ConfigError::Validation("proxy.timeout_secs must be > 0".into()));
        }
        if self.scheduler.owner_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "scheduler.owner_id must not be empty".into(),
            ));
        }
        if self.scheduler.marker_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "scheduler.marker_dir must not be empty".into(),
            ));
        }
        if self.scheduler.due_check_millis == 0 || self.scheduler.reconcile_secs == 0 {
            return Err(ConfigError::Validation(
                "scheduler tick and reconcile intervals must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use tempfile::TempDir;

    #[test]
    fn load_from_path_reads_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "[proxy]\nbase_url = \"http://proxy:9000\"\ntimeout_secs = 30\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.proxy.base_url, "http://proxy:9000");
        assert_eq!(config.proxy.timeout_secs, 30);
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn load_from_path_rejects_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[proxy\nbase_url = 1").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(RelayError::Config(ConfigError::Load(_)))
        ));
    }

    #[test]
    fn load_from_path_reports_missing_file_as_io() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load_from_path(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, RelayError::Config(ConfigError::Io(_))));
        assert!(err.to_string().starts_with("config: io:"));
    }

    #[test]
    fn save_then_load_keeps_values() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config {
            config_path: tmp.path().join("config.toml"),
            ..Config::default()
        };
        config.scheduler.owner_id = "bot-7".into();
        config.save().unwrap();

        let loaded = Config::load_from_path(&config.config_path).unwrap();
        assert_eq!(loaded.scheduler.owner_id, "bot-7");
    }

    #[test]
    fn validate_rejects_empty_owner() {
        let mut config = Config::default();
        config.scheduler.owner_id = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.proxy.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }
}
