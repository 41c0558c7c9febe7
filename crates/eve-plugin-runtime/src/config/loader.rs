//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults, replaced wholesale by [`ConfigLoader::merge`]
//! 2. The plugin manifest, seeding the `plugin` section
//! 3. Main config file (`eve-plugin.toml` / `plugin.toml`)
//! 4. Its profile variant (`eve-plugin.{profile}.toml`)
//! 5. Environment variables (`EVE_*`)
//! 6. Single-key overrides from [`ConfigLoader::set`], e.g. command line flags
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `EVE_` prefix with `__` as separator:
//!
//! - `EVE_HOST__RPC_PORT=9000` → `host.rpc_port = 9000`
//! - `EVE_PLUGIN__DEBUG=true` → `plugin.debug = true`
//! - `EVE_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use eve_plugin_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .manifest_file("plugin.json")?
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::manifest::PluginManifest;
use super::schema::PluginConfig;
use super::validation::validate_config;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "EVE_";

const CONFIG_FILE_STEMS: [&str; 2] = ["eve-plugin", "plugin"];

const CONFIG_FILE_EXTENSIONS: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "toml",
    #[cfg(feature = "yaml-config")]
    "yaml",
    #[cfg(feature = "yaml-config")]
    "yml",
];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `EVE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("EVE_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
    manifest: Option<PluginManifest>,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
            manifest: None,
            overrides: Figment::new(),
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user config directory (`<config>/eve-plugin`) to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("eve-plugin"))
        } else {
            self
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Seeds the `plugin` section from a manifest.
    pub fn manifest(mut self, manifest: PluginManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Seeds the `plugin` section from a `plugin.json` file.
    pub fn manifest_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        Ok(self.manifest(PluginManifest::from_file(path)?))
    }

    /// Replaces the built-in defaults. Files and environment still apply.
    pub fn merge(mut self, config: PluginConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Overrides one dotted key, e.g. `set("host.rpc_port", 9000)`.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<PluginConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: PluginConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            plugin_id = %config.plugin.id,
            debug_mode = config.plugin.debug,
            logging_level = %config.logging.level,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let programmatic = std::mem::take(&mut self.figment);
        let overrides = std::mem::take(&mut self.overrides);

        let mut figment = Figment::from(Serialized::defaults(PluginConfig::default()))
            .merge(programmatic);
        if let Some(manifest) = &self.manifest {
            figment = figment.merge(Serialized::default("plugin", manifest.plugin_section()));
        }

        let files = match self.config_file.take() {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path)),
            Some(path) => vec![path],
            None => self.discover_files(),
        };
        if files.is_empty() {
            debug!(
                paths = ?self.resolve_search_paths(),
                "No configuration file found, using defaults"
            );
        }
        for path in &files {
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(overrides))
    }

    /// Merges a single config file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("eve-plugin")))
            .collect()
    }

    /// Finds the first `{stem}.{ext}` in the search paths and returns it,
    /// followed by its `{stem}.{profile}.{ext}` variant when that exists.
    fn discover_files(&self) -> Vec<PathBuf> {
        let profile = self.profile.as_str();
        for dir in self.resolve_search_paths() {
            for stem in CONFIG_FILE_STEMS {
                for ext in CONFIG_FILE_EXTENSIONS {
                    let base = dir.join(format!("{stem}.{ext}"));
                    if !base.exists() {
                        continue;
                    }
                    let variant = dir.join(format!("{stem}.{profile}.{ext}"));
                    let mut files = vec![base];
                    if variant.exists() {
                        debug!(path = %variant.display(), "Found profile-specific config");
                        files.push(variant);
                    }
                    return files;
                }
            }
        }
        Vec::new()
    }
}
