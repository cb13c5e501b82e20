//! Fixed catalogs of known model presets.
//!
//! Names and ids mirror the `RealESRGANv2Model` and `RIFEModel` enums shipped
//! with vs-mlrt. Lookups are exact; an unknown name is an error and never
//! falls back to a default.

use std::fmt;

use thiserror::Error;

/// Which catalog a lookup was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetKind {
    Upscale,
    Interpolation,
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetKind::Upscale => write!(f, "RealESRGANv2Model"),
            PresetKind::Interpolation => write!(f, "RIFEModel"),
        }
    }
}

/// Errors from catalog lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown {kind} preset '{name}'")]
    UnknownPreset { kind: PresetKind, name: String },
}

/// A super-resolution preset.
#[derive(Debug, PartialEq, Eq)]
pub struct UpscalePreset {
    /// Enum member name, e.g. `animejanaiV2L2`.
    pub name: &'static str,
    /// Numeric enum value passed to vs-mlrt.
    pub id: u32,
    /// Native integer scale factor of the network.
    pub scale: u32,
}

/// A frame interpolation preset.
#[derive(Debug, PartialEq, Eq)]
pub struct RifePreset {
    pub name: &'static str,
    pub value: u32,
}

impl fmt::Display for UpscalePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (x{})", self.name, self.scale)
    }
}

impl fmt::Display for RifePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

macro_rules! upscale {
    ($name:literal, $id:literal, $scale:literal) => {
        UpscalePreset {
            name: $name,
            id: $id,
            scale: $scale,
        }
    };
}

macro_rules! rife {
    ($name:literal, $value:literal) => {
        RifePreset {
            name: $name,
            value: $value,
        }
    };
}

/// Known `RealESRGANv2Model` members.
pub static UPSCALE_PRESETS: &[UpscalePreset] = &[
    upscale!("animevideo_xsx2", 0, 2),
    upscale!("animevideo_xsx4", 1, 4),
    upscale!("animevideov3", 2, 4),
    upscale!("animejanaiV2L1", 5005, 2),
    upscale!("animejanaiV2L2", 5006, 2),
    upscale!("animejanaiV2L3", 5007, 2),
    upscale!("animejanaiV3_HD_L1", 5008, 2),
    upscale!("animejanaiV3_HD_L2", 5009, 2),
    upscale!("animejanaiV3_HD_L3", 5010, 2),
    upscale!("Ani4Kv2_G6i2_Compact", 7000, 2),
    upscale!("Ani4Kv2_G6i2_UltraCompact", 7001, 2),
];

/// Known `RIFEModel` members.
pub static RIFE_PRESETS: &[RifePreset] = &[
    rife!("v4_0", 40),
    rife!("v4_2", 42),
    rife!("v4_3", 43),
    rife!("v4_4", 44),
    rife!("v4_5", 45),
    rife!("v4_6", 46),
    rife!("v4_7", 47),
    rife!("v4_8", 48),
    rife!("v4_9", 49),
    rife!("v4_10", 410),
    rife!("v4_11", 411),
    rife!("v4_12", 412),
    rife!("v4_12_lite", 4121),
    rife!("v4_13", 413),
    rife!("v4_13_lite", 4131),
    rife!("v4_14", 414),
    rife!("v4_14_lite", 4141),
    rife!("v4_15", 415),
    rife!("v4_15_lite", 4151),
    rife!("v4_16_lite", 4161),
    rife!("v4_17", 417),
    rife!("v4_17_lite", 4171),
    rife!("v4_18", 418),
    rife!("v4_19", 419),
    rife!("v4_20", 420),
    rife!("v4_21", 421),
    rife!("v4_22", 422),
    rife!("v4_22_lite", 4221),
    rife!("v4_23", 423),
    rife!("v4_24", 424),
    rife!("v4_25", 425),
    rife!("v4_25_lite", 4251),
    rife!("v4_26", 426),
];

/// Default upscale preset when neither a path nor a name is configured.
pub const DEFAULT_UPSCALE_PRESET: &str = "animejanaiV2L2";

/// Default interpolation preset.
pub const DEFAULT_RIFE_PRESET: &str = "v4_7";

/// Look up an upscale preset by its exact name.
pub fn lookup_upscale(name: &str) -> Result<&'static UpscalePreset, CatalogError> {
    UPSCALE_PRESETS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| CatalogError::UnknownPreset {
            kind: PresetKind::Upscale,
            name: name.to_string(),
        })
}

/// Look up an interpolation preset by its exact name.
pub fn lookup_rife(name: &str) -> Result<&'static RifePreset, CatalogError> {
    RIFE_PRESETS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| CatalogError::UnknownPreset {
            kind: PresetKind::Interpolation,
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn defaults_resolve() {
        let up = lookup_upscale(DEFAULT_UPSCALE_PRESET).unwrap();
        assert_eq!(up.id, 5006);
        assert_eq!(up.scale, 2);

        let rife = lookup_rife(DEFAULT_RIFE_PRESET).unwrap();
        assert_eq!(rife.value, 47);
    }

    #[test]
    fn unknown_preset_is_lookup_error() {
        let err = lookup_upscale("animejanaiV9").unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownPreset {
                kind: PresetKind::Upscale,
                name: "animejanaiV9".to_string()
            }
        );
        assert!(err.to_string().contains("RealESRGANv2Model"));

        assert!(matches!(
            lookup_rife("v5_0"),
            Err(CatalogError::UnknownPreset {
                kind: PresetKind::Interpolation,
                ..
            })
        ));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(lookup_upscale("AnimeJaNaiV2L2").is_err());
        assert!(lookup_rife("V4_7").is_err());
    }

    #[test]
    fn catalog_names_and_ids_are_unique() {
        let names: HashSet<_> = UPSCALE_PRESETS.iter().map(|p| p.name).collect();
        let ids: HashSet<_> = UPSCALE_PRESETS.iter().map(|p| p.id).collect();
        assert_eq!(names.len(), UPSCALE_PRESETS.len());
        assert_eq!(ids.len(), UPSCALE_PRESETS.len());

        let values: HashSet<_> = RIFE_PRESETS.iter().map(|p| p.value).collect();
        assert_eq!(values.len(), RIFE_PRESETS.len());
    }

    #[test]
    fn every_upscale_preset_scales() {
        assert!(UPSCALE_PRESETS.iter().all(|p| p.scale >= 2));
    }
}
