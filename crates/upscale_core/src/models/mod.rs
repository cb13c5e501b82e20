//! Data types shared across the crate.

mod backend;
pub mod catalog;
mod clip;
mod selector;

pub use backend::BackendOptions;
pub use catalog::{
    lookup_rife, lookup_upscale, CatalogError, PresetKind, RifePreset, UpscalePreset,
    DEFAULT_RIFE_PRESET, DEFAULT_UPSCALE_PRESET,
};
pub use clip::{ClipError, ClipInfo, FrameRange, FrameRate, PixelFormat, Resolution};
pub use selector::ModelSelector;
