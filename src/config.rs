use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub data_csv: PathBuf,
}

/// Viewport defaults handed to every map spec.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MapConfig {
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    #[serde(default = "default_style")]
    pub style: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
            style: default_style(),
        }
    }
}

fn default_zoom() -> u8 {
    3
}

fn default_style() -> String {
    "carto-positron".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML configuration: {:?}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn map_section_is_optional() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[input]\ndata_csv = \"dc.csv\"\n\n[server]\nport = 9000\n",
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.input.data_csv, PathBuf::from("dc.csv"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.map, MapConfig::default());
    }

    #[test]
    fn reads_map_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[input]\ndata_csv = \"dc.csv\"\n[map]\nzoom = 5\n[server]\nport = 8050\n",
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.map.zoom, 5);
        assert_eq!(config.map.style, "carto-positron");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = AppConfig::load_from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/config.toml"));
    }
}
