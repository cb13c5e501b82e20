//! Environment variable overrides.
//!
//! Variables are read once at startup through a lookup function so that the
//! rest of the crate never touches the process environment. Empty values are
//! treated as unset.

use std::path::{Path, PathBuf};

use super::manager::{ConfigError, ConfigResult};
use super::settings::{split_args, Settings};

pub const VSPIPE_NUM_STREAMS: &str = "VSPIPE_NUM_STREAMS";
pub const VISPIPE_MODEL_PATH: &str = "VISPIPE_MODEL_PATH";
pub const VSPIPE_MODEL_NAME: &str = "VSPIPE_MODEL_NAME";
pub const VSPIPE_RIFE: &str = "VSPIPE_RIFE";
pub const VSPIPE_RIFE_MODEL: &str = "VSPIPE_RIFE_MODEL";
pub const VSPIPE_RIFE_NUM_STREAMS: &str = "VSPIPE_RIFE_NUM_STREAMS";
pub const FFMPEG_INPUT_ARGS: &str = "FFMPEG_INPUT_ARGS";
pub const FFMPEG_TRANSCODE_ARGS: &str = "FFMPEG_TRANSCODE_ARGS";
pub const TEMP_DIR: &str = "TEMP_DIR";

/// Values taken from the environment. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub num_streams: Option<u32>,
    pub model_path: Option<PathBuf>,
    pub model_name: Option<String>,
    /// `Some(true)` only when `VSPIPE_RIFE` is exactly `"1"`.
    pub rife_enabled: Option<bool>,
    pub rife_model: Option<String>,
    pub rife_num_streams: Option<u32>,
    pub ffmpeg_input_args: Option<Vec<String>>,
    pub ffmpeg_transcode_args: Option<Vec<String>>,
    pub temp_dir: Option<PathBuf>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            num_streams: parse_count(VSPIPE_NUM_STREAMS, get(VSPIPE_NUM_STREAMS))?,
            model_path: get(VISPIPE_MODEL_PATH).map(PathBuf::from),
            model_name: get(VSPIPE_MODEL_NAME),
            rife_enabled: get(VSPIPE_RIFE).map(|v| v.trim() == "1"),
            rife_model: get(VSPIPE_RIFE_MODEL),
            rife_num_streams: parse_count(VSPIPE_RIFE_NUM_STREAMS, get(VSPIPE_RIFE_NUM_STREAMS))?,
            ffmpeg_input_args: get(FFMPEG_INPUT_ARGS).map(|v| split_args(&v)),
            ffmpeg_transcode_args: get(FFMPEG_TRANSCODE_ARGS).map(|v| split_args(&v)),
            temp_dir: get(TEMP_DIR).map(PathBuf::from),
        })
    }

    /// Whether any override is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write overrides into `settings`. The environment wins over the file.
    pub fn apply(&self, settings: &mut Settings) -> ConfigResult<()> {
        if let Some(n) = self.num_streams {
            settings.upscale.num_streams = n;
        }
        if let Some(path) = &self.model_path {
            settings.upscale.model_path = Some(utf8_path(VISPIPE_MODEL_PATH, path)?);
        }
        if let Some(name) = &self.model_name {
            settings.upscale.model_name = name.clone();
        }
        if let Some(enabled) = self.rife_enabled {
            settings.interpolation.enabled = enabled;
        }
        if let Some(model) = &self.rife_model {
            settings.interpolation.model = model.clone();
        }
        if let Some(n) = self.rife_num_streams {
            settings.interpolation.num_streams = n;
        }
        if let Some(args) = &self.ffmpeg_input_args {
            settings.encode.ffmpeg_input_args = args.join(" ");
        }
        if let Some(args) = &self.ffmpeg_transcode_args {
            settings.encode.ffmpeg_transcode_args = args.join(" ");
        }
        if let Some(dir) = &self.temp_dir {
            settings.paths.temp_root = utf8_path(TEMP_DIR, dir)?;
        }
        Ok(())
    }
}

fn utf8_path(name: &str, path: &Path) -> ConfigResult<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::InvalidEnv {
            name: name.to_string(),
            value: path.display().to_string(),
            message: "path is not valid UTF-8".to_string(),
        })
}

fn parse_count(name: &str, value: Option<String>) -> ConfigResult<Option<u32>> {
    let Some(value) = value else {
        return Ok(None);
    };

    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        Ok(_) => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value,
            message: "must be at least 1".to_string(),
        }),
        Err(e) => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_has_no_overrides() {
        let env = EnvOverrides::from_lookup(lookup(&[])).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn reads_all_variables() {
        let env = EnvOverrides::from_lookup(lookup(&[
            (VSPIPE_NUM_STREAMS, "3"),
            (VISPIPE_MODEL_PATH, "/models/x2.onnx"),
            (VSPIPE_MODEL_NAME, "animevideov3"),
            (VSPIPE_RIFE, "1"),
            (VSPIPE_RIFE_MODEL, "v4_22"),
            (VSPIPE_RIFE_NUM_STREAMS, "2"),
            (FFMPEG_INPUT_ARGS, "-hide_banner"),
            (FFMPEG_TRANSCODE_ARGS, "-c:v libx265  -crf 18"),
            (TEMP_DIR, "/scratch"),
        ]))
        .unwrap();

        assert_eq!(env.num_streams, Some(3));
        assert_eq!(env.model_path, Some(PathBuf::from("/models/x2.onnx")));
        assert_eq!(env.rife_enabled, Some(true));
        assert_eq!(env.rife_num_streams, Some(2));
        assert_eq!(
            env.ffmpeg_transcode_args,
            Some(vec!["-c:v".into(), "libx265".into(), "-crf".into(), "18".into()])
        );
        assert_eq!(env.temp_dir, Some(PathBuf::from("/scratch")));
    }

    #[test]
    fn rife_flag_requires_exact_one() {
        for value in ["0", "true", "yes", "2"] {
            let env = EnvOverrides::from_lookup(lookup(&[(VSPIPE_RIFE, value)])).unwrap();
            assert_eq!(env.rife_enabled, Some(false), "value {value:?}");
        }
    }

    #[test]
    fn malformed_stream_count_is_config_error() {
        let err = EnvOverrides::from_lookup(lookup(&[(VSPIPE_NUM_STREAMS, "four")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref name, .. } if name == VSPIPE_NUM_STREAMS));

        let err = EnvOverrides::from_lookup(lookup(&[(VSPIPE_RIFE_NUM_STREAMS, "0")])).unwrap_err();
        assert!(err.to_string().contains(VSPIPE_RIFE_NUM_STREAMS));
    }

    #[test]
    fn environment_wins_over_file() {
        let mut settings: Settings =
            toml::from_str("[upscale]\nnum_streams = 4\nmodel_name = \"animevideov3\"").unwrap();
        let env = EnvOverrides::from_lookup(lookup(&[
            (VSPIPE_NUM_STREAMS, "2"),
            (VSPIPE_RIFE, "1"),
            (TEMP_DIR, "/scratch"),
        ]))
        .unwrap();

        env.apply(&mut settings).unwrap();
        assert_eq!(settings.upscale.num_streams, 2);
        assert_eq!(settings.upscale.model_name, "animevideov3");
        assert!(settings.interpolation.enabled);
        assert_eq!(settings.paths.temp_root, "/scratch");
    }

    #[test]
    fn blank_values_are_unset() {
        let env = EnvOverrides::from_lookup(lookup(&[(VISPIPE_MODEL_PATH, "  ")])).unwrap();
        assert_eq!(env.model_path, None);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_override_paths_are_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let env = EnvOverrides {
            temp_dir: Some(PathBuf::from(OsStr::from_bytes(b"/scratch/\xff"))),
            ..Default::default()
        };
        let mut settings = Settings::default();
        let err = env.apply(&mut settings).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref name, .. } if name == TEMP_DIR));
        assert_eq!(settings.paths.temp_root, Settings::default().paths.temp_root);
    }
}
