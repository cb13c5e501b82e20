//! Validated, typed configuration for one pipeline run.

use std::path::Path;

use crate::config::{ConfigError, EnvOverrides, Settings};
use crate::models::{
    lookup_rife, BackendOptions, CatalogError, ModelSelector, PixelFormat, RifePreset,
    DEFAULT_UPSCALE_PRESET,
};

use super::align::BLOCK_SIZE;

/// Super-resolution stage settings.
#[derive(Debug, Clone, PartialEq)]
pub struct UpscaleStage {
    pub model: ModelSelector,
    pub backend: BackendOptions,
}

/// Frame interpolation stage settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationStage {
    pub model: &'static RifePreset,
    pub backend: BackendOptions,
    pub ensemble: bool,
    pub scale: f64,
}

impl InterpolationStage {
    pub fn new(model: &'static RifePreset, backend: BackendOptions) -> Self {
        Self {
            model,
            backend,
            ensemble: true,
            scale: 1.0,
        }
    }

    /// Output frames per input frame.
    pub fn frame_multiplier(&self) -> u64 {
        2
    }
}

/// Everything a pipeline run needs, resolved up front.
///
/// Building one performs every lookup and validation; nothing is re-read
/// while frames are processed.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub upscale: UpscaleStage,
    /// `None` disables interpolation entirely.
    pub interpolation: Option<InterpolationStage>,
    pub block_size: u32,
    pub inference_format: PixelFormat,
    pub output_format: PixelFormat,
    /// Colour matrix name used for YUV <-> RGB conversion.
    pub matrix: String,
}

impl PipelineConfig {
    /// Config with the default upscale preset and no interpolation.
    pub fn new(upscale: UpscaleStage) -> Self {
        Self {
            upscale,
            interpolation: None,
            block_size: BLOCK_SIZE,
            inference_format: PixelFormat::RgbH,
            output_format: PixelFormat::Yuv420P10,
            matrix: "709".to_string(),
        }
    }

    pub fn with_interpolation(mut self, stage: InterpolationStage) -> Self {
        self.interpolation = Some(stage);
        self
    }

    /// Merge file settings with environment overrides and validate.
    pub fn from_settings(settings: &Settings, env: &EnvOverrides) -> Result<Self, ConfigError> {
        let mut merged = settings.clone();
        env.apply(&mut merged)?;
        Self::from_merged(&merged)
    }

    fn from_merged(settings: &Settings) -> Result<Self, ConfigError> {
        let up = &settings.upscale;
        if up.num_streams == 0 {
            return Err(invalid("upscale.num_streams", "must be at least 1"));
        }

        let model = ModelSelector::resolve(
            up.model_path.as_deref().map(Path::new),
            Some(up.model_name.as_str()),
            DEFAULT_UPSCALE_PRESET,
        )
        .map_err(|e| catalog_error("upscale.model_name", e))?;

        let mut config = Self::new(UpscaleStage {
            model,
            backend: BackendOptions::with_streams(up.num_streams, up.use_cublas),
        });

        let interp = &settings.interpolation;
        if interp.enabled {
            if interp.num_streams == 0 {
                return Err(invalid("interpolation.num_streams", "must be at least 1"));
            }
            let preset = lookup_rife(&interp.model)
                .map_err(|e| catalog_error("interpolation.model", e))?;
            config = config.with_interpolation(InterpolationStage::new(
                preset,
                BackendOptions::with_streams(interp.num_streams, up.use_cublas),
            ));
        }

        Ok(config)
    }

    /// Total output frames per input frame.
    pub fn frame_multiplier(&self) -> u64 {
        self.interpolation
            .as_ref()
            .map_or(1, InterpolationStage::frame_multiplier)
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn catalog_error(key: &str, source: CatalogError) -> ConfigError {
    ConfigError::Catalog {
        key: key.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defaults_build_upscale_only_config() {
        let config =
            PipelineConfig::from_settings(&Settings::default(), &EnvOverrides::default()).unwrap();

        assert!(config.interpolation.is_none());
        assert_eq!(config.block_size, 16);
        assert_eq!(config.inference_format, PixelFormat::RgbH);
        assert_eq!(config.output_format, PixelFormat::Yuv420P10);
        assert_eq!(config.matrix, "709");
        assert_eq!(config.frame_multiplier(), 1);
        assert!(matches!(config.upscale.model, ModelSelector::Preset(p) if p.id == 5006));
    }

    #[test]
    fn env_enables_rife_with_own_streams() {
        let env = EnvOverrides {
            num_streams: Some(2),
            rife_enabled: Some(true),
            rife_model: Some("v4_22".into()),
            rife_num_streams: Some(3),
            ..Default::default()
        };
        let config = PipelineConfig::from_settings(&Settings::default(), &env).unwrap();

        assert_eq!(config.upscale.backend.num_streams, 2);
        let rife = config.interpolation.as_ref().unwrap();
        assert_eq!(rife.model.value, 422);
        assert_eq!(rife.backend.num_streams, 3);
        assert!(rife.ensemble);
        assert_eq!(rife.scale, 1.0);
        assert_eq!(config.frame_multiplier(), 2);
    }

    #[test]
    fn model_path_skips_name_lookup() {
        let mut settings = Settings::default();
        settings.upscale.model_name = "not-a-preset".into();
        let env = EnvOverrides {
            model_path: Some(PathBuf::from("/models/custom.onnx")),
            ..Default::default()
        };

        let config = PipelineConfig::from_settings(&settings, &env).unwrap();
        assert_eq!(
            config.upscale.model,
            ModelSelector::CustomPath(PathBuf::from("/models/custom.onnx"))
        );
    }

    #[test]
    fn unknown_presets_fail_validation() {
        let mut settings = Settings::default();
        settings.upscale.model_name = "bogus".into();
        let err = PipelineConfig::from_settings(&settings, &EnvOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("upscale.model_name"));
        match err {
            ConfigError::Catalog { key, source } => {
                assert_eq!(key, "upscale.model_name");
                assert!(matches!(
                    source,
                    CatalogError::UnknownPreset { ref name, .. } if name == "bogus"
                ));
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut settings = Settings::default();
        settings.interpolation.enabled = true;
        settings.interpolation.model = "v9_9".into();
        let err = PipelineConfig::from_settings(&settings, &EnvOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("RIFEModel"));
        assert!(matches!(
            err,
            ConfigError::Catalog { source: CatalogError::UnknownPreset { ref name, .. }, .. }
                if name == "v9_9"
        ));
    }

    #[test]
    fn disabled_rife_ignores_bad_model_name() {
        let mut settings = Settings::default();
        settings.interpolation.model = "v9_9".into();
        let config =
            PipelineConfig::from_settings(&settings, &EnvOverrides::default()).unwrap();
        assert!(config.interpolation.is_none());
    }
}
