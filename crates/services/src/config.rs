use std::env;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://revise.sqlite3";
pub const DEFAULT_AUDIO_DIR: &str = "./voice-notes";
pub const DEFAULT_LEVEL: &str = "gcse";

/// Remote mnemonic generation endpoint.
#[derive(Clone, Debug)]
pub struct MnemonicConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub callback_url: Option<Url>,
}

impl MnemonicConfig {
    /// Read `REVISE_MNEMONIC_URL` / `REVISE_MNEMONIC_API_KEY`.
    ///
    /// Returns `Ok(None)` when either is unset or blank, which disables the
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if a URL variable does not parse.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = non_blank("REVISE_MNEMONIC_API_KEY") else {
            return Ok(None);
        };
        let Some(endpoint) = non_blank("REVISE_MNEMONIC_URL") else {
            return Ok(None);
        };
        let endpoint = parse_url("REVISE_MNEMONIC_URL", &endpoint)?;
        let callback_url = non_blank("REVISE_MNEMONIC_CALLBACK_URL")
            .map(|raw| parse_url("REVISE_MNEMONIC_CALLBACK_URL", &raw))
            .transpose()?;
        Ok(Some(Self {
            endpoint,
            api_key,
            callback_url,
        }))
    }
}

/// Where recorded audio is written and how it is addressed.
#[derive(Clone, Debug)]
pub struct AudioConfig {
    pub root: PathBuf,
    pub public_base: Url,
}

impl AudioConfig {
    /// Read `REVISE_AUDIO_DIR` / `REVISE_AUDIO_PUBLIC_URL`.
    ///
    /// Without a public URL the objects are addressed by `file://` URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or the directory
    /// cannot be made absolute.
    pub fn from_env() -> Result<Self, ConfigError> {
        let root = PathBuf::from(
            non_blank("REVISE_AUDIO_DIR").unwrap_or_else(|| DEFAULT_AUDIO_DIR.to_string()),
        );
        let public_base = match non_blank("REVISE_AUDIO_PUBLIC_URL") {
            Some(raw) => parse_url("REVISE_AUDIO_PUBLIC_URL", &raw)?,
            None => file_base(&root)?,
        };
        Ok(Self { root, public_base })
    }
}

fn file_base(root: &Path) -> Result<Url, ConfigError> {
    let root: PathBuf = root
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let absolute = if root.is_absolute() {
        root
    } else {
        env::current_dir()
            .map_err(|e| ConfigError::AudioDir(e.to_string()))?
            .join(&root)
    };
    Url::from_directory_path(&absolute)
        .map_err(|()| ConfigError::AudioDir(absolute.display().to_string()))
}

/// Process-wide settings, read from the environment.
#[derive(Clone, Debug)]
pub struct ReviseConfig {
    pub db_url: String,
    pub learner_id: Option<String>,
    pub level: String,
    pub exam_board: Option<String>,
    pub mnemonic: Option<MnemonicConfig>,
    /// The generation backend records request outcomes itself.
    pub server_tracking: bool,
    pub audio: AudioConfig,
}

impl ReviseConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_url = non_blank("REVISE_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_string());
        let learner_id = non_blank("REVISE_LEARNER_ID");
        let level = non_blank("REVISE_LEVEL").unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        let exam_board = non_blank("REVISE_EXAM_BOARD");
        let server_tracking = match non_blank("REVISE_MNEMONIC_SERVER_TRACKING") {
            Some(raw) => parse_flag("REVISE_MNEMONIC_SERVER_TRACKING", &raw)?,
            None => false,
        };

        Ok(Self {
            db_url,
            learner_id,
            level,
            exam_board,
            mnemonic: MnemonicConfig::from_env()?,
            server_tracking,
            audio: AudioConfig::from_env()?,
        })
    }
}

fn non_blank(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { var, source })
}

pub(crate) fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("X", "1").unwrap());
        assert!(parse_flag("X", "TRUE").unwrap());
        assert!(!parse_flag("X", "off").unwrap());
        assert!(matches!(
            parse_flag("X", "maybe"),
            Err(ConfigError::InvalidValue { var: "X", .. })
        ));
    }

    #[test]
    fn relative_audio_dir_becomes_file_url() {
        let url = file_base(Path::new("voice-notes")).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/voice-notes/"));
    }
}
