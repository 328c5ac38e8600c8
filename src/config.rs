//! # Configuration
//!
//! [`Settings`] come from three layers, later ones winning:
//!
//! 1. an optional YAML file (`dio serve --config dio.yaml`),
//! 2. `DIO_*` environment variables,
//! 3. command-line flags (applied by the CLI).
//!
//! ```yaml
//! root: ./app
//! host: 0.0.0.0
//! port: 3131
//! default_format: html
//! show_backtrace: true
//! ```

use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Application root; views, public and controllers live beneath it.
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Format used when the path has no recognized extension.
    pub default_format: String,
    /// Synthesize a body when an action leaves the response untouched.
    pub auto_render: bool,
    /// Append traces to 5xx error pages.
    pub show_backtrace: bool,
    /// Concurrent request workers of the HTTP adapter.
    pub workers: usize,
    pub views_dir: String,
    pub public_dir: String,
    pub controllers_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            host: "localhost".to_string(),
            port: 3131,
            default_format: "html".to_string(),
            auto_render: true,
            show_backtrace: true,
            workers: 8,
            views_dir: "views".to_string(),
            public_dir: "public".to_string(),
            controllers_dir: "controllers".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_yaml::Error },
    InvalidVar { name: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
            ConfigError::InvalidVar { name, value } => {
                write!(f, "invalid value for {name}: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidVar { .. } => None,
        }
    }
}

impl Settings {
    /// Defaults overlaid with the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File (if given), then the process environment.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from either layer.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides(|key| env::var(key).ok())
    }

    /// Apply `DIO_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidVar`] for values that do not parse.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DIO_ROOT") {
            self.root = PathBuf::from(v);
        }
        if let Some(v) = lookup("DIO_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("DIO_PORT") {
            self.port = parse_var("DIO_PORT", &v)?;
        }
        if let Some(v) = lookup("DIO_DEFAULT_FORMAT") {
            self.default_format = v.trim_start_matches('.').to_ascii_lowercase();
        }
        if let Some(v) = lookup("DIO_SHOW_BACKTRACE") {
            self.show_backtrace = parse_flag("DIO_SHOW_BACKTRACE", &v)?;
        }
        if let Some(v) = lookup("DIO_AUTO_RENDER") {
            self.auto_render = parse_flag("DIO_AUTO_RENDER", &v)?;
        }
        if let Some(v) = lookup("DIO_WORKERS") {
            self.workers = parse_var::<usize>("DIO_WORKERS", &v)?.max(1);
        }
        Ok(self)
    }

    #[must_use]
    pub fn views_path(&self) -> PathBuf {
        self.root.join(&self.views_dir)
    }

    #[must_use]
    pub fn public_path(&self) -> PathBuf {
        self.root.join(&self.public_dir)
    }

    #[must_use]
    pub fn controllers_path(&self) -> PathBuf {
        self.root.join(&self.controllers_dir)
    }

    /// `host:port`, bracketing IPv6 hosts.
    #[must_use]
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidVar {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| vars.get(k).cloned()
    }

    #[test]
    fn test_yaml_file_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dio.yaml");
        std::fs::write(&path, "port: 8080\ndefault_format: json\n").unwrap();
        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.default_format, "json");
        assert_eq!(s.host, "localhost");
        assert!(s.auto_render);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dio.yaml");
        std::fs::write(&path, "prot: 8080\n").unwrap();
        assert!(matches!(
            Settings::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let s = Settings::default()
            .with_env_overrides(lookup(&[
                ("DIO_PORT", "9000"),
                ("DIO_SHOW_BACKTRACE", "off"),
                ("DIO_WORKERS", "0"),
                ("DIO_DEFAULT_FORMAT", ".JSON"),
            ]))
            .unwrap();
        assert_eq!(s.port, 9000);
        assert!(!s.show_backtrace);
        assert_eq!(s.workers, 1);
        assert_eq!(s.default_format, "json");
        assert_eq!(s.addr(), "localhost:9000");
        let v6 = Settings {
            host: "::1".to_string(),
            ..s
        };
        assert_eq!(v6.addr(), "[::1]:9000");
    }

    #[test]
    fn test_bad_env_value() {
        let err = Settings::default()
            .with_env_overrides(lookup(&[("DIO_PORT", "many")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value for DIO_PORT: \"many\"");
    }

    #[test]
    fn test_paths() {
        let s = Settings {
            root: PathBuf::from("/srv/app"),
            ..Settings::default()
        };
        assert_eq!(s.views_path(), PathBuf::from("/srv/app/views"));
        assert_eq!(s.controllers_path(), PathBuf::from("/srv/app/controllers"));
    }
}
