use crate::models::{BottleConfig, GeneralConfig};
use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the per-bottle settings inside a prefix
pub const BOTTLE_CONFIG_FILE: &str = ".winecellar.yaml";

/// Prefix for environment overrides of [`GeneralConfig`] fields
pub const ENV_PREFIX: &str = "WINECELLAR";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two kinds of files:
/// - General config (`config.yaml` in the config directory): application preferences
/// - Bottle config (`.winecellar.yaml` in each prefix): description, logging, app shortcuts
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    general_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            general_config_path: config_dir.join("config.yaml"),
            config_dir,
        })
    }

    /// Platform configuration directory, e.g. `~/.config/winecellar`
    pub fn default_config_dir() -> Result<Utf8PathBuf> {
        let base =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        let base = Utf8PathBuf::try_from(base).context("Config directory is not valid UTF-8")?;
        Ok(base.join("winecellar"))
    }

    /// Load the general configuration.
    ///
    /// Layers, lowest priority first: built-in defaults, `config.yaml`
    /// (optional), `WINECELLAR_*` environment variables.
    pub fn load_general_config(&self) -> Result<GeneralConfig> {
        if !self.general_config_path.exists() {
            tracing::warn!(
                "General config file not found at {}, using defaults",
                self.general_config_path
            );
        }

        let settings = config::Config::builder()
            .add_source(
                config::File::new(self.general_config_path.as_str(), config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| {
                format!("Failed to read general config: {}", self.general_config_path)
            })?;

        let config: GeneralConfig = settings
            .try_deserialize()
            .with_context(|| {
                format!("Failed to parse general config: {}", self.general_config_path)
            })?;

        tracing::info!("Loaded general config from {}", self.general_config_path);
        Ok(config)
    }

    /// Save the general configuration file.
    pub fn save_general_config(&self, config: &GeneralConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize general config to YAML")?;

        fs::write(&self.general_config_path, yaml_string).with_context(|| {
            format!("Failed to write general config: {}", self.general_config_path)
        })?;

        tracing::info!("Saved general config to {}", self.general_config_path);
        Ok(())
    }

    /// Resolve the directory holding all bottles.
    ///
    /// An empty `prefixes_dir` falls back to `~/.winecellar/prefixes`.
    pub fn prefixes_dir(config: &GeneralConfig) -> Result<Utf8PathBuf> {
        if !config.prefixes_dir.trim().is_empty() {
            return Ok(Utf8PathBuf::from(config.prefixes_dir.trim()));
        }
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        let home = Utf8PathBuf::try_from(home).context("Home directory is not valid UTF-8")?;
        Ok(home.join(".winecellar").join("prefixes"))
    }

    /// Load the settings file of one bottle, or defaults if it has none.
    pub fn load_bottle_config(prefix: &Utf8Path) -> Result<BottleConfig> {
        let path = prefix.join(BOTTLE_CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No bottle config at {}, using defaults", path);
            return Ok(BottleConfig::default());
        }

        let file_contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read bottle config: {}", path))?;

        let config: BottleConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse bottle config: {}", path))?;

        Ok(config)
    }

    /// Save the settings file of one bottle.
    pub fn save_bottle_config(prefix: &Utf8Path, config: &BottleConfig) -> Result<()> {
        let path = prefix.join(BOTTLE_CONFIG_FILE);
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize bottle config to YAML")?;

        fs::write(&path, yaml_string)
            .with_context(|| format!("Failed to write bottle config: {}", path))?;

        tracing::info!("Saved bottle config to {}", path);
        Ok(())
    }

    /// Directory for rotating log files
    pub fn log_dir(&self) -> Utf8PathBuf {
        self.config_dir.join("logs")
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppShortcut;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.config_dir().exists());
        assert!(manager.log_dir().ends_with("logs"));
    }

    #[test]
    fn test_load_save_general_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let config = GeneralConfig {
            prefixes_dir: "/srv/bottles".to_string(),
            default_bottle: "Games".to_string(),
            command_timeout_secs: 60,
            ..GeneralConfig::default()
        };
        manager.save_general_config(&config).unwrap();

        let loaded = manager.load_general_config().unwrap();
        assert_eq!(loaded.prefixes_dir, "/srv/bottles");
        assert_eq!(loaded.default_bottle, "Games");
        assert_eq!(loaded.command_timeout_secs, 60);
    }

    #[test]
    fn test_prefixes_dir_explicit() {
        let config = GeneralConfig {
            prefixes_dir: "/data/wine".to_string(),
            ..GeneralConfig::default()
        };
        assert_eq!(
            ConfigManager::prefixes_dir(&config).unwrap(),
            Utf8PathBuf::from("/data/wine")
        );
    }

    #[test]
    fn test_bottle_config_roundtrip_with_apps() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        assert_eq!(
            ConfigManager::load_bottle_config(&prefix).unwrap(),
            BottleConfig::default()
        );

        let config = BottleConfig {
            description: "Office suite".to_string(),
            debug_log_level: 3,
            logging_enabled: true,
            apps: vec![AppShortcut {
                name: "Word".to_string(),
                description: "Word processor".to_string(),
                command: r"C:\Program Files\Office\WINWORD.EXE".to_string(),
                icon: String::new(),
            }],
        };
        ConfigManager::save_bottle_config(&prefix, &config).unwrap();

        let loaded = ConfigManager::load_bottle_config(&prefix).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_bottle_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::write(prefix.join(BOTTLE_CONFIG_FILE), "debug_log_level: [not a number").unwrap();

        assert!(ConfigManager::load_bottle_config(&prefix).is_err());
    }
}
