use std::path::Path;

use randio_base::{EnvHandle, RandioResult, ResultExt, bail, err};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::path::{PathResolver, PathStyle};
use crate::pool::HandlePool;

/// Settings for the components built by this crate, read from TOML.
///
/// ```
/// use randio::config::Config;
///
/// let config = Config::from_toml_str("[pool]\nmax_open_handles = 4\n").unwrap();
/// assert_eq!(config.pool.max_open_handles, 4);
/// ```
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub path: PathConfig,
}

/// `[pool]` section.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Most descriptors the pool keeps open at once.
    #[serde(default = "default_max_open_handles")]
    pub max_open_handles: usize,
}

fn default_max_open_handles() -> usize {
    16
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open_handles: default_max_open_handles(),
        }
    }
}

/// `[path]` section.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    /// Path syntax, `"posix"` or `"windows"`. Defaults to the host's.
    #[serde(default)]
    pub style: PathStyle,
    /// Prefix resolved Windows drive paths with `\\?\`.
    #[serde(default)]
    pub extended_length_prefix: bool,
}

impl Config {
    pub fn from_toml_str(content: &str) -> RandioResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| err!(Argument, "invalid configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> RandioResult<()> {
        if self.pool.max_open_handles == 0 {
            bail!(Argument, "pool.max_open_handles must be at least 1");
        }
        Ok(())
    }

    pub fn build_pool(&self) -> HandlePool {
        HandlePool::new(self.pool.max_open_handles)
    }

    pub fn build_resolver(&self, env: EnvHandle) -> PathResolver {
        PathResolver::new(env)
            .with_style(self.path.style)
            .extended_length_prefix(self.path.extended_length_prefix)
    }
}

/// Reads and parses the configuration file at `path`.
#[instrument(skip(env), fields(path = %path.display()))]
pub fn load_config(env: &EnvHandle, path: &Path) -> RandioResult<Config> {
    let content = env.read_file_to_string(path)?;
    let config = Config::from_toml_str(&content)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    debug!(?config, "loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;
    use randio_base::MockEnvironment;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.pool.max_open_handles, 16);
        assert_eq!(config.path.style, PathStyle::native());
        assert!(!config.path.extended_length_prefix);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [pool]
            max_open_handles = 2

            [path]
            style = "windows"
            extended_length_prefix = true
            "#,
        )
        .unwrap();

        expect![[r#"
            Config {
                pool: PoolConfig {
                    max_open_handles: 2,
                },
                path: PathConfig {
                    style: Windows,
                    extended_length_prefix: true,
                },
            }
        "#]]
        .assert_debug_eq(&config);
        assert_eq!(config.build_pool().max_open_handles(), 2);
    }

    #[test]
    fn test_zero_handles_rejected() {
        let err = Config::from_toml_str("[pool]\nmax_open_handles = 0\n").unwrap_err();
        assert_eq!(err.kind().name(), "ArgumentError");
    }

    #[test]
    fn test_unknown_style_rejected() {
        let err = Config::from_toml_str("[path]\nstyle = \"vms\"\n").unwrap_err();
        assert_eq!(err.kind().name(), "ArgumentError");
    }

    #[test]
    fn test_load_config_through_environment() {
        let env = MockEnvironment::new("/srv");
        env.add_file(
            "/etc/randio.toml",
            "[path]\nstyle = \"posix\"\n[pool]\nmax_open_handles = 3\n",
        );
        let env = EnvHandle::new(env);

        let config = load_config(&env, Path::new("/etc/randio.toml")).unwrap();
        assert_eq!(config.pool.max_open_handles, 3);
        let resolver = config.build_resolver(env);
        assert_eq!(resolver.resolve("data").unwrap().as_str(), "/srv/data");
    }

    #[test]
    fn test_load_config_errors_name_the_file() {
        let env = MockEnvironment::default();
        env.add_file("/bad.toml", "[pool]\nmax_open_handles = \"many\"\n");
        let env = EnvHandle::new(env);

        let err = load_config(&env, Path::new("/bad.toml")).unwrap_err();
        assert!(err.to_string().starts_with(
            "loading configuration from /bad.toml: invalid argument: invalid configuration"
        ));

        let err = load_config(&env, Path::new("/missing.toml")).unwrap_err();
        assert_eq!(err.kind().name(), "IoError");
    }
}
