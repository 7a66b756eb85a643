use crate::error::{DfsUtilError, Result};

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub static CONFIG_FILE_ENV_KEY: &str = "DFSUTIL_CONFIG_FILE";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filesystem: FileSystem,
    pub dfs: Dfs,
    pub client: Client,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Dfs {
    pub block_size: u64,
    pub packet_size: u64,
    pub support_append: bool,
    /// Where writers buffer a block before it is sent to the datanodes.
    pub backup_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Client {
    /// Owner of everything created through the memory filesystem.
    pub user: String,
    /// Group applied when an owner change names no group.
    pub default_group: String,
    pub buffer_size: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum FileSystem {
    #[serde(rename(deserialize = "local"))]
    Local { root: PathBuf },
    #[serde(rename(deserialize = "memory"))]
    Memory {},
    #[serde(rename(deserialize = "udfs"))]
    Udfs { namenode_rpc_address: String },
}

impl Config {
    pub fn load_from_file() -> Result<Self> {
        let path = std::env::var(CONFIG_FILE_ENV_KEY).map_err(|_| {
            DfsUtilError::ConfigError(format!(
                "Could not read {} environment variable.",
                CONFIG_FILE_ENV_KEY
            ))
        })?;
        Self::from_path(path)
    }

    /// Like [`Config::load_from_file`], but falls back to the defaults when
    /// no config file is named in the environment.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_FILE_ENV_KEY) {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DfsUtilError::ConfigError(format!(
                "{} does not exist.",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(DfsUtilError::ConfigError(format!(
                "{} is not a file.",
                path.display()
            )));
        }

        let config = std::fs::read_to_string(path)?;
        Self::from_toml(&config)
    }

    pub fn from_toml(config: &str) -> Result<Self> {
        let config: Self = toml::de::from_str(config)?;
        Ok(config)
    }
}

impl std::default::Default for Dfs {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024 * 1024,
            packet_size: 64 * 1024,
            support_append: true,
            backup_dir: std::env::temp_dir(),
        }
    }
}

impl std::default::Default for Client {
    fn default() -> Self {
        Self {
            user: std::env::var("USER").unwrap_or_else(|_| String::from("root")),
            default_group: String::from("root"),
            buffer_size: 4096,
        }
    }
}

impl std::default::Default for FileSystem {
    fn default() -> Self {
        Self::Udfs {
            namenode_rpc_address: String::from("http://localhost:42000"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = Config::from_toml(
            r#"
            [filesystem]
            type = "local"
            root = "/tmp/dfsutil"

            [dfs]
            support_append = false
            "#,
        )
        .unwrap();

        assert_eq!(
            config.filesystem,
            FileSystem::Local {
                root: PathBuf::from("/tmp/dfsutil")
            }
        );
        assert!(!config.dfs.support_append);
        assert_eq!(config.dfs.packet_size, 64 * 1024);
        assert_eq!(config.dfs.backup_dir, std::env::temp_dir());
        assert_eq!(config.client.default_group, "root");
    }

    #[test]
    fn empty_file_is_the_default_config() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.filesystem, FileSystem::default());
        assert!(config.dfs.support_append);
    }

    #[test]
    fn unknown_filesystem_type_is_a_config_error() {
        let err = Config::from_toml("[filesystem]\ntype = \"s3\"\n").unwrap_err();
        assert!(matches!(err, DfsUtilError::ConfigError(_)));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::from_path("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, DfsUtilError::ConfigError(_)));
    }
}
