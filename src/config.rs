use crate::error::{CatalogError, Result};
use log::warn;
use std::path::PathBuf;

const DEV_COOKIE_KEY: [u8; 32] = [0u8; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Fixtures held in process memory; writes vanish on restart.
    Memory,
    Sled,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub data_dir: PathBuf,
    pub backend: Backend,
    pub sled_path: Option<PathBuf>,
    pub cookie_key: Vec<u8>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let backend = match lookup("MOVIECAT_BACKEND").as_deref() {
            None | Some("memory") => Backend::Memory,
            Some("sled") => Backend::Sled,
            Some(other) => {
                return Err(CatalogError::Validation(format!(
                    "MOVIECAT_BACKEND must be memory or sled, got {:?}",
                    other
                )))
            }
        };
        let cookie_key = match lookup("MOVIECAT_COOKIE_KEY") {
            Some(key) if key.len() >= 32 => key.into_bytes(),
            Some(_) => {
                return Err(CatalogError::Validation(
                    "MOVIECAT_COOKIE_KEY must be at least 32 bytes".to_owned(),
                ))
            }
            None => {
                warn!("MOVIECAT_COOKIE_KEY not set, using the development key");
                DEV_COOKIE_KEY.to_vec()
            }
        };
        Ok(Config {
            bind: lookup("MOVIECAT_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_owned()),
            data_dir: lookup("MOVIECAT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/data"))),
            backend,
            sled_path: lookup("MOVIECAT_SLED_PATH").map(PathBuf::from),
            cookie_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.backend, Backend::Memory);
        assert!(config.data_dir.ends_with("data"));
        assert_eq!(config.cookie_key.len(), 32);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("MOVIECAT_BACKEND", "sled"),
            ("MOVIECAT_SLED_PATH", "/tmp/moviecat"),
            ("MOVIECAT_BIND", "0.0.0.0:9000"),
        ])
        .unwrap();
        assert_eq!(config.backend, Backend::Sled);
        assert_eq!(config.sled_path, Some(PathBuf::from("/tmp/moviecat")));
        assert_eq!(config.bind, "0.0.0.0:9000");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("MOVIECAT_BACKEND", "postgres")]).is_err());
        assert!(config(&[("MOVIECAT_COOKIE_KEY", "short")]).is_err());
    }
}
