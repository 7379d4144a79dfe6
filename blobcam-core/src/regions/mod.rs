//! regions — connected-component collaborator boundary and box overlay
//!
//! Connected-component extraction itself is an external concern: the
//! pipeline hands a binary frame to a [`RegionLabeler`] and gets back a
//! [`RegionSet`]. [`ConnectedComponentLabeler`] is the stock collaborator,
//! backed by `imageproc`'s region labelling. The overlay drawing reproduces
//! the device's original bounding-box routine bit for bit, including its
//! half-open edge conventions.

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::frame::GrayFrame;
use crate::segment::{BACKGROUND, FOREGROUND};

/// Split value used to binarize a filtered frame for the labeler.
pub const BINARY_SPLIT: u8 = 0x80;
/// Grey value of the bounding-box overlay.
pub const MARKER: u8 = 0x80;

/// Axis-aligned bounding box of one foreground region. `right` and `bottom`
/// are exclusive (one past the last foreground column/row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// The labeling collaborator's result for one frame: bounding boxes of the
/// connected foreground regions, in the collaborator's scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSet {
    pub regions: Vec<Region>,
}

impl RegionSet {
    pub fn count(&self) -> u32 {
        self.regions.len() as u32
    }
}

/// External vision-primitives collaborator: given a binary frame
/// (foreground = 0, background = 255), return the connected foreground
/// regions and their bounding rectangles. Assumed correct and atomic; a
/// failure here is surfaced to the pipeline caller, never retried.
pub trait RegionLabeler {
    fn label(&mut self, binary: &GrayFrame) -> Result<RegionSet>;
}

/// Stock collaborator: 8-connected component labeling via `imageproc`,
/// folded into per-label bounding boxes. Regions come out ordered by label
/// id, which is first-appearance order in a row-major scan.
#[derive(Debug, Default)]
pub struct ConnectedComponentLabeler {
    mask: Vec<u8>,
}

impl RegionLabeler for ConnectedComponentLabeler {
    fn label(&mut self, binary: &GrayFrame) -> Result<RegionSet> {
        // connected_components treats one pixel value as background; remap
        // the frame's foreground-is-0 convention onto a 0-background mask.
        self.mask.clear();
        self.mask
            .extend(binary.data.iter().map(|&px| if px == FOREGROUND { 255u8 } else { 0 }));

        let mask = GrayImage::from_raw(binary.width, binary.height, std::mem::take(&mut self.mask))
            .context("binary frame does not match its geometry")?;
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        self.mask = mask.into_raw();

        let mut boxes: Vec<Option<Region>> = Vec::new();
        for (x, y, px) in labels.enumerate_pixels() {
            let label = px.0[0];
            if label == 0 {
                continue;
            }
            let idx = (label - 1) as usize;
            if boxes.len() <= idx {
                boxes.resize(idx + 1, None);
            }
            let entry = boxes[idx].get_or_insert(Region {
                left: x,
                right: x + 1,
                top: y,
                bottom: y + 1,
            });
            entry.left = entry.left.min(x);
            entry.right = entry.right.max(x + 1);
            entry.top = entry.top.min(y);
            entry.bottom = entry.bottom.max(y + 1);
        }

        Ok(RegionSet {
            regions: boxes.into_iter().flatten().collect(),
        })
    }
}

/// Binarize a filtered frame for the labeler: pixels above `split` become
/// [`FOREGROUND`], the rest [`BACKGROUND`] — the same rule shape as the
/// thresholder, applied at the fixed split. On a morphology output this
/// selects the 255-encoded pixels as the regions of interest and maps any
/// stale border bytes below the split to background.
pub fn binarize(dst: &mut GrayFrame, src: &GrayFrame, split: u8) {
    assert_eq!(dst.len(), src.len(), "frame geometry mismatch");
    for (d, &s) in dst.data.iter_mut().zip(&src.data) {
        *d = if s > split { FOREGROUND } else { BACKGROUND };
    }
}

/// Draw every region's bounding rectangle into `frame` at grey value
/// `color`.
///
/// Edge conventions are those of the original device overlay and are load
/// bearing for bit compatibility: horizontal edges run across columns
/// `[left, right)` at rows `top` and `bottom - 1`; vertical edges run across
/// rows `[top, bottom - 1)` at columns `left` and `right` — the right edge
/// lands one pixel outside the exclusive box, exactly as the reference drew
/// it.
pub fn draw_bbox(frame: &mut GrayFrame, regions: &RegionSet, color: u8) {
    let w = frame.width as usize;
    for reg in &regions.regions {
        for x in reg.left..reg.right {
            frame.data[w * reg.top as usize + x as usize] = color;
            frame.data[w * (reg.bottom as usize - 1) + x as usize] = color;
        }
        for y in reg.top..reg.bottom.saturating_sub(1) {
            frame.data[w * y as usize + reg.left as usize] = color;
            frame.data[w * y as usize + reg.right as usize] = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_frame(w: u32, h: u32, fg: &[(u32, u32)]) -> GrayFrame {
        let mut f = GrayFrame::filled(w, h, BACKGROUND);
        for &(x, y) in fg {
            let i = f.idx(x, y);
            f.data[i] = FOREGROUND;
        }
        f
    }

    #[test]
    fn binarize_splits_at_the_fixed_value() {
        let src = GrayFrame::from_raw(4, 1, vec![0, 0x80, 0x81, 255]).unwrap();
        let mut dst = GrayFrame::new(4, 1);
        binarize(&mut dst, &src, BINARY_SPLIT);
        assert_eq!(dst.data, vec![BACKGROUND, BACKGROUND, FOREGROUND, FOREGROUND]);
    }

    #[test]
    fn labeler_finds_isolated_regions_in_scan_order() {
        let frame = binary_frame(
            8,
            6,
            &[
                // 2×2 block with corner at (1,1)
                (1, 1),
                (2, 1),
                (1, 2),
                (2, 2),
                // single pixel at (6,4)
                (6, 4),
            ],
        );
        let mut labeler = ConnectedComponentLabeler::default();
        let set = labeler.label(&frame).unwrap();
        assert_eq!(set.count(), 2);
        assert_eq!(
            set.regions[0],
            Region {
                left: 1,
                right: 3,
                top: 1,
                bottom: 3
            }
        );
        assert_eq!(
            set.regions[1],
            Region {
                left: 6,
                right: 7,
                top: 4,
                bottom: 5
            }
        );
    }

    #[test]
    fn labeler_uses_eight_connectivity() {
        // Two diagonal pixels form one region under 8-connectivity.
        let frame = binary_frame(5, 5, &[(1, 1), (2, 2)]);
        let mut labeler = ConnectedComponentLabeler::default();
        let set = labeler.label(&frame).unwrap();
        assert_eq!(set.count(), 1);
        assert_eq!(
            set.regions[0],
            Region {
                left: 1,
                right: 3,
                top: 1,
                bottom: 3
            }
        );
    }

    #[test]
    fn labeler_sees_no_regions_in_blank_frame() {
        let frame = GrayFrame::filled(6, 6, BACKGROUND);
        let mut labeler = ConnectedComponentLabeler::default();
        assert_eq!(labeler.label(&frame).unwrap().count(), 0);
    }

    #[test]
    fn draw_bbox_edges_follow_the_half_open_conventions() {
        let mut frame = GrayFrame::filled(8, 8, 10);
        let set = RegionSet {
            regions: vec![Region {
                left: 2,
                right: 5,
                top: 2,
                bottom: 5,
            }],
        };
        draw_bbox(&mut frame, &set, MARKER);

        // Top edge: columns 2,3,4 at row 2. Bottom edge: same columns at row 4.
        for x in 2..5u32 {
            assert_eq!(frame.at(x, 2), MARKER);
            assert_eq!(frame.at(x, 4), MARKER);
        }
        assert_eq!(frame.at(5, 2), 10);

        // Left edge: rows 2,3 at column 2. Right edge: rows 2,3 at column 5.
        for y in 2..4u32 {
            assert_eq!(frame.at(2, y), MARKER);
            assert_eq!(frame.at(5, y), MARKER);
        }
        assert_eq!(frame.at(2, 5), 10);
        assert_eq!(frame.at(5, 4), 10);

        // Nothing outside the edges is touched.
        assert_eq!(frame.at(3, 3), 10);
        assert_eq!(frame.at(1, 1), 10);
        assert_eq!(frame.at(6, 6), 10);
    }
}
