//! Upscale model selection: a catalog preset or a user-supplied model file.

use std::fmt;
use std::path::{Path, PathBuf};

use super::catalog::{lookup_upscale, CatalogError, UpscalePreset};

/// Which super-resolution network the upscale stage loads.
///
/// Exactly one variant is active. A custom path always wins over a preset
/// name; the name is not looked up at all in that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelector {
    /// Named preset from the fixed catalog.
    Preset(&'static UpscalePreset),
    /// Path to an ONNX model file.
    CustomPath(PathBuf),
}

impl ModelSelector {
    /// Resolve the selector from configuration values.
    ///
    /// `path` overrides everything. Otherwise `name` (or `default_name` when
    /// unset) is looked up in the catalog and lookup failures are returned
    /// as-is.
    pub fn resolve(
        path: Option<&Path>,
        name: Option<&str>,
        default_name: &str,
    ) -> Result<Self, CatalogError> {
        if let Some(path) = path {
            return Ok(ModelSelector::CustomPath(path.to_path_buf()));
        }

        let name = name.unwrap_or(default_name);
        lookup_upscale(name).map(ModelSelector::Preset)
    }

    /// Native scale when known up front (presets only).
    pub fn known_scale(&self) -> Option<u32> {
        match self {
            ModelSelector::Preset(p) => Some(p.scale),
            ModelSelector::CustomPath(_) => None,
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelector::Preset(p) => write!(f, "preset {}", p),
            ModelSelector::CustomPath(path) => write!(f, "model file {}", path.display()),
        }
    }
}
