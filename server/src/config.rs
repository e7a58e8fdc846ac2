use std::{env, num::NonZeroUsize, path::PathBuf};

use fgsm::config::{DEFAULT_CHECKPOINT, parse_opt_var, parse_var};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Settings of the HTTP server, read from `HOST`, `PORT`, `FGSM_CHECKPOINT`, `SERVER_WORKERS` and
/// `MAX_UPLOAD_BYTES`.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub checkpoint: PathBuf,
    /// Falls back to actix's default when unset.
    pub workers: Option<NonZeroUsize>,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> fgsm::Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> fgsm::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: parse_var(&lookup, "HOST", DEFAULT_HOST.to_string())?,
            port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            checkpoint: parse_var(&lookup, "FGSM_CHECKPOINT", PathBuf::from(DEFAULT_CHECKPOINT))?,
            workers: parse_opt_var(&lookup, "SERVER_WORKERS")?,
            max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.workers, None);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);

        let config = ServerConfig::from_lookup(|var| match var {
            "PORT" => Some("9090".to_string()),
            "SERVER_WORKERS" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.workers.map(NonZeroUsize::get), Some(2));
    }

    #[test]
    fn rejects_bad_port() {
        let err = ServerConfig::from_lookup(|var| (var == "PORT").then(|| "80000".to_string()))
            .unwrap_err();

        assert!(matches!(err, fgsm::FgsmErr::Config { var: "PORT", .. }));
    }
}
