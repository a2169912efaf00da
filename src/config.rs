//! Configuration loader - YAML viewer settings + .env overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Viewer configuration loaded from viewer.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local dataset used in `umb` mode
    pub sample_path: PathBuf,
    /// Host serving `?file=<subject>.json` in `nyu` mode
    pub remote_host: String,
    pub remote_protocol: String,
    pub fetch_timeout_secs: u64,
    /// Offset added to every electrode coordinate
    pub bounding_box_offset: [f64; 3],
    /// Connection annotation sets to offer; empty means detect from the dataset
    pub connection_sets: Vec<String>,
    pub camera_position: [f32; 3],
    pub volume: VolumeConfig,
    pub hemispheres: HemisphereConfig,
}

/// Brain volume files and initial display parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub file: PathBuf,
    pub labelmap_file: PathBuf,
    pub colortable_file: PathBuf,
    pub dimensions: [u32; 3],
    pub min: f32,
    pub max: f32,
    pub opacity: f32,
    pub lower_threshold: f32,
    pub upper_threshold: f32,
    pub window_low: f32,
    pub window_high: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HemisphereConfig {
    pub left: MeshConfig,
    pub right: MeshConfig,
}

/// Cortical surface mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub file: PathBuf,
    pub color: [f32; 3],
    pub opacity: f32,
}

/// Overrides loaded from .env
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub remote_host: Option<String>,
    pub sample_path: Option<PathBuf>,
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_path: PathBuf::from("data/JSON/sample.json"),
            remote_host: "ievappwpdcpvm01.nyumc.org".to_string(),
            remote_protocol: "https".to_string(),
            fetch_timeout_secs: 30,
            bounding_box_offset: [0.0, 0.0, 0.0],
            connection_sets: Vec::new(),
            camera_position: [0.0, 200.0, 0.0],
            volume: VolumeConfig::default(),
            hemispheres: HemisphereConfig::default(),
        }
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("data/volumes/T1_RAS.nii"),
            labelmap_file: PathBuf::from("data/volumes/fsaverage_default_labels.nii"),
            colortable_file: PathBuf::from("data/volumes/colormap_seiztype.txt"),
            dimensions: [256, 256, 256],
            min: 0.0,
            max: 255.0,
            opacity: 1.0,
            lower_threshold: 0.0,
            upper_threshold: 255.0,
            window_low: 0.0,
            window_high: 255.0,
        }
    }
}

impl Default for HemisphereConfig {
    fn default() -> Self {
        Self {
            left: MeshConfig {
                file: PathBuf::from("data/meshes/lh.pial"),
                ..MeshConfig::default()
            },
            right: MeshConfig {
                file: PathBuf::from("data/meshes/rh.pial"),
                ..MeshConfig::default()
            },
        }
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::new(),
            color: [1.0, 1.0, 1.0],
            opacity: 0.5,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading viewer config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing viewer config {}", path.display()))?;
        Ok(config)
    }

    /// Apply .env overrides on top of the file settings
    pub fn apply_secrets(&mut self, secrets: &Secrets) {
        if let Some(host) = &secrets.remote_host {
            self.remote_host = host.clone();
        }
        if let Some(path) = &secrets.sample_path {
            self.sample_path = path.clone();
        }
    }
}

impl Secrets {
    /// Load overrides from .env file
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Secrets {
            remote_host: std::env::var("REMOTE_HOST").ok(),
            sample_path: std::env::var("SAMPLE_PATH").ok().map(PathBuf::from),
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.camera_position, [0.0, 200.0, 0.0]);
        assert_eq!(config.hemispheres.left.opacity, 0.5);
        assert_eq!(config.hemispheres.right.color, [1.0, 1.0, 1.0]);
        assert_eq!(config.volume.dimensions, [256, 256, 256]);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"remote_host: data.example.org\nbounding_box_offset: [10.0, 0.0, -2.5]\nvolume:\n  opacity: 0.3\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.remote_host, "data.example.org");
        assert_eq!(config.bounding_box_offset, [10.0, 0.0, -2.5]);
        assert_eq!(config.volume.opacity, 0.3);
        assert_eq!(config.volume.max, 255.0);
        assert_eq!(config.remote_protocol, "https");
    }

    #[test]
    fn test_secrets_override() {
        let mut config = Config::default();
        let secrets = Secrets {
            remote_host: Some("localhost:9000".to_string()),
            sample_path: None,
            log_dir: "logs".to_string(),
        };
        config.apply_secrets(&secrets);
        assert_eq!(config.remote_host, "localhost:9000");
        assert_eq!(config.sample_path, PathBuf::from("data/JSON/sample.json"));
    }
}
