use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Server configuration, assembled from the `KEY=VALUE` config file named on
/// the command line plus the `GIS_ROOT` environment variable.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_address: IpAddr,
    pub server_port: u16,
    pub slots_number: usize,
    pub storage_max_size: u64,
    pub html_pages_path: PathBuf,
    pub gis_shid: String,
    pub gis_root: PathBuf,
}

impl Config {
    /// Parses the line-oriented `KEY=VALUE` config file and resolves
    /// `HTML_PAGES_PATH` relative to `GIS_ROOT`.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let gis_root: PathBuf = std::env::var_os("GIS_ROOT")
            .ok_or(ConfigError::MissingGisRoot)?
            .into();

        let content =
            std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
                path: config_path.display().to_string(),
                source,
            })?;

        let mut options: HashMap<String, String> = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, val) = line
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedLine(line.to_string()))?;
            options.insert(key.trim().to_string(), val.trim().to_string());
        }

        let get = |key: &'static str| -> Result<String, ConfigError> {
            options
                .get(key)
                .cloned()
                .ok_or(ConfigError::MissingKey(key))
        };
        let get_usize = |key: &'static str| -> Result<usize, ConfigError> {
            let value = get(key)?;
            value
                .parse()
                .map_err(|source| ConfigError::InvalidValue { key, value, source })
        };
        let get_u64 = |key: &'static str| -> Result<u64, ConfigError> {
            let value = get(key)?;
            value
                .parse()
                .map_err(|source| ConfigError::InvalidValue { key, value, source })
        };

        let server_address = {
            let value = get("SERVER_ADDRESS")?;
            value.parse().map_err(|source| ConfigError::InvalidAddress {
                key: "SERVER_ADDRESS",
                value,
                source,
            })?
        };
        let server_port = get_usize("SERVER_PORT")? as u16;
        let slots_number = get_usize("SLOTS_NUMBER")?;
        let storage_max_size = get_u64("STORAGE_MAX_SIZE")?;
        let html_pages_path = gis_root.join(get("HTML_PAGES_PATH")?);
        let gis_shid = get("GIS_SHID")?;

        Ok(Self {
            server_address,
            server_port,
            slots_number,
            storage_max_size,
            html_pages_path,
            gis_shid,
            gis_root,
        })
    }

    /// `$GIS_ROOT/sbin/gis-buffer-renderer`, the renderer binary invoked per
    /// job.
    pub fn renderer_path(&self) -> PathBuf {
        self.gis_root.join("sbin").join("gis-buffer-renderer")
    }

    /// `$GIS_ROOT/data/logs/gis-map-server/`, recreated at startup.
    pub fn log_dir(&self) -> PathBuf {
        self.gis_root.join("data").join("logs").join("gis-map-server")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join("server.log")
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.server_address, self.server_port)
    }
}
