//! morph — 3×3 binary morphology over frame interiors
//!
//! Both passes process only interior pixels (rows 1..h-1, columns 1..w-1) and
//! never write the one-pixel destination border. Because thresholded frames
//! contain only 0 and 255, bitwise OR/AND over the neighborhood behaves as
//! set union/intersection of the foreground predicate, i.e. standard binary
//! dilation/erosion. Note the inverted polarity (foreground = 0): OR grows
//! the *background*, so on this encoding `dilate3x3` shrinks bright areas —
//! it dilates the 255 set — and the pipeline's dilation-then-erosion order is
//! a morphological closing of the background / opening of the foreground.

use crate::frame::GrayFrame;

/// What happens to the untouched one-pixel border of a morphology output.
///
/// The reference device leaves the border holding whatever the destination
/// buffer contained before the pass (stale data across frames). `Preserve`
/// reproduces that; `CopySource` defines the border as a copy-through of the
/// source frame instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderPolicy {
    #[default]
    Preserve,
    CopySource,
}

/// 3×3 dilation: each interior destination pixel becomes the bitwise OR of
/// the full 3×3 source neighborhood (8 neighbors + center).
pub fn dilate3x3(dst: &mut GrayFrame, src: &GrayFrame) {
    assert_eq!(dst.len(), src.len(), "frame geometry mismatch");
    let w = src.width as usize;
    let h = src.height as usize;
    if w < 3 || h < 3 {
        return;
    }

    for r in 1..h - 1 {
        let row = r * w;
        for c in 1..w - 1 {
            let i = row + c;
            let s = &src.data;
            dst.data[i] = s[i - w - 1]
                | s[i - w]
                | s[i - w + 1]
                | s[i - 1]
                | s[i]
                | s[i + 1]
                | s[i + w - 1]
                | s[i + w]
                | s[i + w + 1];
        }
    }
}

/// 3×3 erosion: each interior destination pixel becomes the bitwise AND of
/// the full 3×3 source neighborhood.
pub fn erode3x3(dst: &mut GrayFrame, src: &GrayFrame) {
    assert_eq!(dst.len(), src.len(), "frame geometry mismatch");
    let w = src.width as usize;
    let h = src.height as usize;
    if w < 3 || h < 3 {
        return;
    }

    for r in 1..h - 1 {
        let row = r * w;
        for c in 1..w - 1 {
            let i = row + c;
            let s = &src.data;
            dst.data[i] = s[i - w - 1]
                & s[i - w]
                & s[i - w + 1]
                & s[i - 1]
                & s[i]
                & s[i + 1]
                & s[i + w - 1]
                & s[i + w]
                & s[i + w + 1];
        }
    }
}

/// Copy the one-pixel border of `src` into `dst` (the `CopySource` policy).
pub fn copy_border(dst: &mut GrayFrame, src: &GrayFrame) {
    assert_eq!(dst.len(), src.len(), "frame geometry mismatch");
    let w = src.width as usize;
    let h = src.height as usize;
    if w == 0 || h == 0 {
        return;
    }

    dst.data[..w].copy_from_slice(&src.data[..w]);
    dst.data[(h - 1) * w..].copy_from_slice(&src.data[(h - 1) * w..]);
    for r in 1..h.saturating_sub(1) {
        dst.data[r * w] = src.data[r * w];
        dst.data[r * w + w - 1] = src.data[r * w + w - 1];
    }
}
