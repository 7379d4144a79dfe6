//! segment — histogram, automatic threshold selection, binarization
//!
//! Foreground/background convention: thresholded foreground pixels are 0 and
//! background pixels are 255 (the inverse of the usual convention). The
//! morphology and labeling stages depend on this polarity; do not flip it.

use crate::frame::GrayFrame;

/// Pixel value of thresholded foreground.
pub const FOREGROUND: u8 = 0;
/// Pixel value of thresholded background.
pub const BACKGROUND: u8 = 255;

/// Accumulate the 256-bin intensity histogram of `frame` into `hist`.
///
/// The caller zero-initializes `hist`; this only increments, one increment
/// per pixel, so after a scan over a freshly zeroed array the bin sum equals
/// the pixel count.
pub fn accumulate_histogram(hist: &mut [u32; 256], frame: &GrayFrame) {
    for &px in &frame.data {
        hist[px as usize] += 1;
    }
}

/// Select the threshold maximizing the between-class variance criterion
/// (Otsu's method) over a 256-bin histogram.
///
/// For each candidate k the levels split into class0 = {g <= k} and
/// class1 = {g > k}; the score is w0·w1·(mu0 − mu1)². Running cumulative
/// sums keep this O(256) while the class means stay `f32`, matching the
/// rounding of the naive double-sum formulation. The running maximum uses a
/// strictly-greater comparison, so equal scores keep the lowest k.
///
/// A candidate with an empty class has an undefined mean and scores nothing
/// (the guard below, rather than a division by zero). A histogram where no
/// candidate scores above zero — e.g. a constant image — yields 0.
pub fn otsu_threshold(hist: &[u32; 256]) -> u8 {
    let mut total_w: u32 = 0;
    let mut total_sum: u64 = 0;
    for (g, &n) in hist.iter().enumerate() {
        total_w += n;
        total_sum += u64::from(n) * g as u64;
    }

    let mut w0: u32 = 0;
    let mut sum0: u64 = 0;
    let mut sigma_max = 0.0f32;
    let mut best_k = 0u8;

    for k in 0..256usize {
        w0 += hist[k];
        sum0 += u64::from(hist[k]) * k as u64;
        let w1 = total_w - w0;

        if w0 == 0 || w1 == 0 {
            continue;
        }

        let mu0 = sum0 as f32 / w0 as f32;
        let mu1 = (total_sum - sum0) as f32 / w1 as f32;

        // Class-weight product in f64: the u32 product can wrap above ~128k
        // pixels, well within reach of larger sensors.
        let sigma_b = (f64::from(w0) * f64::from(w1)) as f32 * (mu0 - mu1) * (mu0 - mu1);
        if sigma_b > sigma_max {
            sigma_max = sigma_b;
            best_k = k as u8;
        }
    }

    best_k
}

/// Two-level image from a grayscale frame: pixels above `cut` become
/// [`FOREGROUND`], pixels at or below it become [`BACKGROUND`]. Applies to
/// every pixel, borders included.
pub fn threshold(dst: &mut GrayFrame, src: &GrayFrame, cut: u8) {
    assert_eq!(dst.len(), src.len(), "frame geometry mismatch");
    for (d, &s) in dst.data.iter_mut().zip(&src.data) {
        *d = if s > cut { FOREGROUND } else { BACKGROUND };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist_of(frame: &GrayFrame) -> [u32; 256] {
        let mut hist = [0u32; 256];
        accumulate_histogram(&mut hist, frame);
        hist
    }

    #[test]
    fn histogram_bins_sum_to_pixel_count() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4 * 97).collect();
        let frame = GrayFrame::from_raw(4, 97, data).unwrap();
        let hist = hist_of(&frame);
        assert_eq!(hist.iter().map(|&n| n as usize).sum::<usize>(), frame.len());
    }

    #[test]
    fn histogram_counts_each_level() {
        let frame = GrayFrame::from_raw(3, 2, vec![7, 7, 7, 0, 255, 7]).unwrap();
        let hist = hist_of(&frame);
        assert_eq!(hist[7], 4);
        assert_eq!(hist[0], 1);
        assert_eq!(hist[255], 1);
        assert_eq!(hist[8], 0);
    }

    #[test]
    fn histogram_only_increments() {
        let frame = GrayFrame::filled(2, 2, 10);
        let mut hist = [0u32; 256];
        hist[3] = 5;
        accumulate_histogram(&mut hist, &frame);
        assert_eq!(hist[3], 5);
        assert_eq!(hist[10], 4);
    }

    #[test]
    fn otsu_splits_adjacent_bimodal_mass() {
        // Equal mass at 127 and 128: the only candidate with two non-empty
        // classes is k = 127, and it must beat every other k strictly.
        let mut hist = [0u32; 256];
        hist[127] = 1000;
        hist[128] = 1000;
        assert_eq!(otsu_threshold(&hist), 127);
    }

    #[test]
    fn otsu_tie_keeps_lowest_level() {
        // Mass only at 0 and 255: every k in 0..=254 scores identically, so
        // the strictly-greater rule keeps the first candidate.
        let mut hist = [0u32; 256];
        hist[0] = 500;
        hist[255] = 500;
        assert_eq!(otsu_threshold(&hist), 0);
    }

    #[test]
    fn otsu_is_deterministic() {
        let frame = GrayFrame::from_raw(4, 2, vec![10, 10, 10, 200, 200, 200, 90, 90]).unwrap();
        let hist = hist_of(&frame);
        let first = otsu_threshold(&hist);
        for _ in 0..10 {
            assert_eq!(otsu_threshold(&hist), first);
        }
        // The selected split separates the dark cluster from the bright one.
        assert!((10..200).contains(&i32::from(first)));
    }

    #[test]
    fn otsu_constant_image_scores_nothing() {
        let mut hist = [0u32; 256];
        hist[40] = 10_000;
        assert_eq!(otsu_threshold(&hist), 0);
    }

    #[test]
    fn threshold_polarity_and_borders() {
        let frame = GrayFrame::from_raw(3, 2, vec![0, 128, 129, 255, 64, 200]).unwrap();
        let mut out = GrayFrame::new(3, 2);
        threshold(&mut out, &frame, 128);
        // > cut → foreground (0), <= cut → background (255); no border carve-out.
        assert_eq!(out.data, vec![255, 255, 0, 0, 255, 0]);
    }

    #[test]
    fn rerunning_threshold_on_two_level_output_is_an_involution() {
        // On its own 0/255 output the pass maps 0 → 255 and 255 → 0 for any
        // cut in (0,255), so two further passes return the first result and
        // the image stays two-level throughout.
        let frame = GrayFrame::from_raw(4, 2, vec![3, 250, 128, 129, 0, 255, 77, 180]).unwrap();
        let mut once = GrayFrame::new(4, 2);
        threshold(&mut once, &frame, 128);
        let mut twice = GrayFrame::new(4, 2);
        threshold(&mut twice, &once, 128);
        let mut thrice = GrayFrame::new(4, 2);
        threshold(&mut thrice, &twice, 128);
        assert!(twice.data.iter().all(|&p| p == FOREGROUND || p == BACKGROUND));
        assert_eq!(thrice, once);
    }
}
