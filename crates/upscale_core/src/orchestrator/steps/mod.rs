//! Steps of an upscale job, in the order they run.

mod finalize;
mod prepare;
mod probe;
mod upscale_parts;

pub use finalize::{move_file, remove_video_files, FinalizeStep};
pub use prepare::PrepareStep;
pub use probe::ProbeStep;
pub use upscale_parts::UpscalePartsStep;
