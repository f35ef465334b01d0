//! Three-frame double-difference motion detector.
//!
//! The detector compares three temporally ordered frames. It computes the
//! absolute pixel-wise difference across each adjacent pair and keeps only the
//! pixels that changed across *both* transitions (the "double difference").
//! A pixel that flickers for a single frame (sensor noise, transient lighting)
//! shows up in only one of the two difference images and is suppressed; a
//! genuinely moving subject changes the straddled frame on both sides.
//!
//! The changed-pixel ratio is then gated by a band: below the lower bound the
//! change is noise-level, above the upper bound it is a global scene change
//! (lighting shift, camera bump) rather than a discrete moving subject.

use anyhow::Result;

use crate::frame::Frame;

/// Detector tuning.
///
/// The defaults are empirically chosen and deliberately preserved from field
/// use rather than derived; treat them as a starting point.
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    /// Intensity threshold (0-255) above which a double-difference pixel
    /// counts as changed.
    pub binarize_threshold: u8,
    /// Changed-pixel ratio at or below which the signal is noise. Strict:
    /// a ratio exactly at the bound does not fire.
    pub min_changed_ratio: f64,
    /// Changed-pixel ratio at or above which the signal is a global scene
    /// change and is suppressed. Strict at the bound.
    pub max_changed_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: 40,
            min_changed_ratio: 0.01,
            max_changed_ratio: 0.4,
        }
    }
}

/// Outcome of evaluating one frame against the window.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// Grayscale conversion of the newest frame. Always produced, detection
    /// outcome notwithstanding; the loop carries it forward as window state.
    pub gray: Frame,
    /// Whether meaningful motion was detected.
    pub motion_detected: bool,
    /// Changed-pixel ratio that produced the verdict. Zero during warm-up.
    pub changed_ratio: f64,
}

/// Pure three-frame motion detector. Holds no state across calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleDiffDetector {
    config: DetectorConfig,
}

impl DoubleDiffDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Evaluate the newest frame `tp1` against the two previous grayscale
    /// frames.
    ///
    /// `tm1` and `t` are prior grayscale outputs of this method; while either
    /// is absent (warm-up) no detection is attempted. The frames under
    /// comparison must share width, height and color-space stage; a mismatch
    /// is a precondition violation surfaced as `SentryError::ShapeMismatch`.
    pub fn evaluate(
        &self,
        tm1: Option<&Frame>,
        t: Option<&Frame>,
        tp1: &Frame,
    ) -> Result<Evaluation> {
        let gray = tp1.to_gray();

        let (Some(tm1), Some(t)) = (tm1, t) else {
            return Ok(Evaluation {
                gray,
                motion_detected: false,
                changed_ratio: 0.0,
            });
        };

        tm1.check_compatible(t)?;
        t.check_compatible(&gray)?;

        let threshold = self.config.binarize_threshold;
        let mut changed = 0usize;
        for ((&a, &b), &c) in tm1
            .pixels()
            .iter()
            .zip(t.pixels().iter())
            .zip(gray.pixels().iter())
        {
            // A pixel counts only when it changed across both transitions.
            let first = a.abs_diff(b);
            let second = b.abs_diff(c);
            if first.min(second) >= threshold {
                changed += 1;
            }
        }

        let ratio = changed as f64 / gray.pixel_count() as f64;
        let motion_detected =
            ratio > self.config.min_changed_ratio && ratio < self.config.max_changed_ratio;

        Ok(Evaluation {
            gray,
            motion_detected,
            changed_ratio: ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SentryError;
    use crate::frame::PixelFormat;

    const SIDE: u32 = 10;

    fn gray(value: u8) -> Frame {
        Frame::new(
            vec![value; (SIDE * SIDE) as usize],
            SIDE,
            SIDE,
            PixelFormat::Gray,
        )
    }

    /// Grayscale frame with `n` leading pixels set to `value`, rest zero.
    fn gray_with_changed(n: usize, value: u8) -> Frame {
        let mut data = vec![0u8; (SIDE * SIDE) as usize];
        for p in data.iter_mut().take(n) {
            *p = value;
        }
        Frame::new(data, SIDE, SIDE, PixelFormat::Gray)
    }

    #[test]
    fn warm_up_never_fires() {
        let detector = DoubleDiffDetector::default();
        let newest = gray(128);

        let eval = detector.evaluate(None, None, &newest).unwrap();
        assert!(!eval.motion_detected);
        assert_eq!(eval.changed_ratio, 0.0);

        let eval = detector.evaluate(Some(&gray(0)), None, &newest).unwrap();
        assert!(!eval.motion_detected);

        let eval = detector.evaluate(None, Some(&gray(0)), &newest).unwrap();
        assert!(!eval.motion_detected);
    }

    #[test]
    fn warm_up_still_returns_grayscale_of_newest() {
        let detector = DoubleDiffDetector::default();
        let rgb: Vec<u8> = [255u8, 0, 0]
            .iter()
            .copied()
            .cycle()
            .take((SIDE * SIDE * 3) as usize)
            .collect();
        let newest = Frame::new(rgb, SIDE, SIDE, PixelFormat::Rgb);

        let eval = detector.evaluate(None, None, &newest).unwrap();
        assert_eq!(eval.gray.pixels(), newest.to_gray().pixels());
    }

    #[test]
    fn identical_frames_are_quiet() {
        let detector = DoubleDiffDetector::default();
        let eval = detector
            .evaluate(Some(&gray(90)), Some(&gray(90)), &gray(90))
            .unwrap();
        assert!(!eval.motion_detected);
        assert_eq!(eval.changed_ratio, 0.0);
    }

    #[test]
    fn full_frame_change_is_suppressed_as_scene_change() {
        let detector = DoubleDiffDetector::default();
        // Every pixel swings hard on both transitions: ratio 1.0 >= 0.4.
        let eval = detector
            .evaluate(Some(&gray(0)), Some(&gray(200)), &gray(0))
            .unwrap();
        assert!(!eval.motion_detected);
        assert_eq!(eval.changed_ratio, 1.0);
    }

    #[test]
    fn bounded_moving_region_fires() {
        let detector = DoubleDiffDetector::default();
        // 10 of 100 pixels change on both transitions: ratio 0.1.
        let eval = detector
            .evaluate(
                Some(&gray_with_changed(10, 200)),
                Some(&gray(0)),
                &gray_with_changed(10, 200),
            )
            .unwrap();
        assert!(eval.motion_detected);
        assert!((eval.changed_ratio - 0.1).abs() < 1e-12);
    }

    #[test]
    fn ratio_band_is_strict_at_both_bounds() {
        let detector = DoubleDiffDetector::default();

        // Exactly 1 of 100 pixels: ratio 0.01, excluded.
        let eval = detector
            .evaluate(
                Some(&gray_with_changed(1, 200)),
                Some(&gray(0)),
                &gray_with_changed(1, 200),
            )
            .unwrap();
        assert_eq!(eval.changed_ratio, 0.01);
        assert!(!eval.motion_detected);

        // Exactly 40 of 100 pixels: ratio 0.4, excluded.
        let eval = detector
            .evaluate(
                Some(&gray_with_changed(40, 200)),
                Some(&gray(0)),
                &gray_with_changed(40, 200),
            )
            .unwrap();
        assert_eq!(eval.changed_ratio, 0.4);
        assert!(!eval.motion_detected);

        // Just inside: 2 of 100.
        let eval = detector
            .evaluate(
                Some(&gray_with_changed(2, 200)),
                Some(&gray(0)),
                &gray_with_changed(2, 200),
            )
            .unwrap();
        assert!(eval.motion_detected);
    }

    #[test]
    fn single_transition_flicker_is_suppressed() {
        let detector = DoubleDiffDetector::default();
        // Pixels change between t and t+1 only; the first diff is zero, so
        // the double difference stays empty.
        let eval = detector
            .evaluate(Some(&gray(0)), Some(&gray(0)), &gray_with_changed(10, 200))
            .unwrap();
        assert!(!eval.motion_detected);
        assert_eq!(eval.changed_ratio, 0.0);
    }

    #[test]
    fn evaluate_is_pure() {
        let detector = DoubleDiffDetector::default();
        let tm1 = gray_with_changed(10, 200);
        let t = gray(0);
        let tp1 = gray_with_changed(10, 200);

        let first = detector.evaluate(Some(&tm1), Some(&t), &tp1).unwrap();
        let second = detector.evaluate(Some(&tm1), Some(&t), &tp1).unwrap();

        assert_eq!(first.motion_detected, second.motion_detected);
        assert_eq!(first.changed_ratio, second.changed_ratio);
        assert_eq!(first.gray.pixels(), second.gray.pixels());
    }

    #[test]
    fn shape_mismatch_fails_fast() {
        let detector = DoubleDiffDetector::default();
        let small = Frame::new(vec![0u8; 25], 5, 5, PixelFormat::Gray);

        let err = detector
            .evaluate(Some(&small), Some(&gray(0)), &gray(0))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SentryError>(),
            Some(SentryError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let detector = DoubleDiffDetector::new(DetectorConfig {
            binarize_threshold: 100,
            ..DetectorConfig::default()
        });
        // Swing of 50 on both transitions stays under the raised threshold.
        let eval = detector
            .evaluate(
                Some(&gray_with_changed(10, 50)),
                Some(&gray(0)),
                &gray_with_changed(10, 50),
            )
            .unwrap();
        assert!(!eval.motion_detected);
        assert_eq!(eval.changed_ratio, 0.0);
    }
}
