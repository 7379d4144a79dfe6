//! frame — grayscale frames and the per-frame buffer set
//!
//! The device runs one fixed working resolution (half the sensor's 752×480
//! maximum). All pipeline buffers are allocated once at that geometry and
//! reused in place every frame; the stage functions themselves accept any
//! geometry so tests can work on small hand-built frames.

/// Working resolution of the orchestrated pipeline.
pub const WIDTH: u32 = 376;
pub const HEIGHT: u32 = 240;
/// Pixel count of a working-resolution frame.
pub const PIXELS: usize = (WIDTH as usize) * (HEIGHT as usize);

/// A row-major 8-bit grayscale frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl GrayFrame {
    /// Zero-filled frame at the given geometry.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    /// Frame at the given geometry with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            data: vec![value; (width as usize) * (height as usize)],
            width,
            height,
        }
    }

    /// Build a frame from raw row-major bytes. Returns `None` when the byte
    /// count does not match the geometry.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    /// Zero-filled frame at the working resolution.
    pub fn working() -> Self {
        Self::new(WIDTH, HEIGHT)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Linear index of pixel (x, y).
    #[inline]
    pub fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Pixel value at (x, y).
    #[inline]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.data[self.idx(x, y)]
    }

    /// Overwrite this frame's pixels from `src`. Geometries must match.
    pub fn copy_from(&mut self, src: &GrayFrame) {
        assert_eq!(
            (self.width, self.height),
            (src.width, src.height),
            "frame geometry mismatch"
        );
        self.data.copy_from_slice(&src.data);
    }
}

/// The explicit owned buffer set of one pipeline instance: one named buffer
/// per stage output, all sharing the same geometry. Allocated once, reused
/// in place every frame — downstream stages read what the previous stage
/// wrote, and morphology border pixels keep whatever the buffer held before
/// the pass (see [`crate::morph::BorderPolicy`]).
#[derive(Debug, Clone)]
pub struct FrameBuffers {
    pub grayscale: GrayFrame,
    pub threshold: GrayFrame,
    pub dilation: GrayFrame,
    pub erosion: GrayFrame,
    pub display: GrayFrame,
}

impl FrameBuffers {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            grayscale: GrayFrame::new(width, height),
            threshold: GrayFrame::new(width, height),
            dilation: GrayFrame::new(width, height),
            erosion: GrayFrame::new(width, height),
            display: GrayFrame::new(width, height),
        }
    }

    pub fn working() -> Self {
        Self::new(WIDTH, HEIGHT)
    }

    pub fn width(&self) -> u32 {
        self.grayscale.width
    }

    pub fn height(&self) -> u32 {
        self.grayscale.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_checks_length() {
        assert!(GrayFrame::from_raw(3, 2, vec![0; 6]).is_some());
        assert!(GrayFrame::from_raw(3, 2, vec![0; 5]).is_none());
    }

    #[test]
    fn buffers_share_geometry() {
        let bufs = FrameBuffers::new(8, 6);
        for f in [
            &bufs.grayscale,
            &bufs.threshold,
            &bufs.dilation,
            &bufs.erosion,
            &bufs.display,
        ] {
            assert_eq!((f.width, f.height), (8, 6));
            assert_eq!(f.len(), 48);
        }
    }

    #[test]
    fn indexing_is_row_major() {
        let mut f = GrayFrame::new(4, 3);
        let i = f.idx(2, 1);
        f.data[i] = 9;
        assert_eq!(f.at(2, 1), 9);
        assert_eq!(i, 6);
    }
}
