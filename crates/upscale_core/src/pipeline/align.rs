//! Alignment arithmetic for inference-friendly frame sizes.
//!
//! Inference networks want dimensions that are a multiple of a block size.
//! Frames are padded up before inference and the result is resized back to
//! the original size times the measured scale factor.

use crate::models::Resolution;

/// Block size both padded axes are rounded to.
pub const BLOCK_SIZE: u32 = 16;

/// Round `value` up to the next multiple of `block`.
///
/// `block` must be non-zero. The result is never smaller than `value` and is
/// less than `value + block`.
pub fn align_up(value: u32, block: u32) -> u32 {
    debug_assert!(block > 0, "block size must be non-zero");
    value.div_ceil(block) * block
}

/// Pad both axes of `res` up to a multiple of `block`.
pub fn pad_resolution(res: Resolution, block: u32) -> Resolution {
    Resolution::new(align_up(res.width, block), align_up(res.height, block))
}

/// Integer scale factor measured on one axis.
pub fn measured_scale(padded: u32, stage_out: u32) -> u32 {
    if padded == 0 {
        return 0;
    }
    stage_out / padded
}

/// Size of the restored frame: `original * (stage_out / padded)` per axis.
///
/// The scale is measured with integer division, so a stage that did not
/// resize (interpolation only) restores the original size.
pub fn restore(original: Resolution, padded: Resolution, stage_out: Resolution) -> Resolution {
    Resolution::new(
        original.width * measured_scale(padded.width, stage_out.width),
        original.height * measured_scale(padded.height, stage_out.height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_bounds_hold() {
        for block in [1u32, 2, 8, 16, 64] {
            for v in 0..=1100u32 {
                let a = align_up(v, block);
                assert!(a >= v, "align_up({v}, {block}) = {a} < {v}");
                assert!(a - v < block, "align_up({v}, {block}) = {a} overshoots");
                assert_eq!(a % block, 0);
            }
        }
    }

    #[test]
    fn already_aligned_values_are_unchanged() {
        assert_eq!(align_up(1920, BLOCK_SIZE), 1920);
        assert_eq!(align_up(0, BLOCK_SIZE), 0);
        assert_eq!(align_up(1080, BLOCK_SIZE), 1088);
    }

    #[test]
    fn pads_odd_sizes() {
        let padded = pad_resolution(Resolution::new(1000, 562), BLOCK_SIZE);
        assert_eq!(padded, Resolution::new(1008, 576));
    }

    #[test]
    fn restore_scales_original_by_measured_factor() {
        let original = Resolution::new(1000, 562);
        let padded = Resolution::new(1008, 576);
        let out = Resolution::new(2016, 1152);
        assert_eq!(restore(original, padded, out), Resolution::new(2000, 1124));
    }

    #[test]
    fn restore_with_unit_scale_is_identity() {
        let original = Resolution::new(1920, 1080);
        let padded = pad_resolution(original, BLOCK_SIZE);
        assert_eq!(restore(original, padded, padded), original);
    }

    #[test]
    fn restore_x4_on_hd() {
        let original = Resolution::new(1920, 1080);
        let padded = pad_resolution(original, BLOCK_SIZE);
        let out = Resolution::new(padded.width * 4, padded.height * 4);
        assert_eq!(restore(original, padded, out), Resolution::new(7680, 4320));
    }
}
