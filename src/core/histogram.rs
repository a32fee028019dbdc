//! HSV color histogram signatures.
//!
//! Pixels are converted to 8-bit HSV (hue in `0..180`, saturation and value
//! in `0..=255`) and counted into an 8x8x8 grid where every axis spans
//! `0..256` in bins of 32. Hue therefore only ever lands in bins `0..=5`.

use image::{DynamicImage, ImageReader, RgbImage};
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bins per HSV axis.
pub const BINS_PER_CHANNEL: usize = 8;

/// Length of a flattened signature (8 hue x 8 saturation x 8 value).
pub const SIGNATURE_LEN: usize = BINS_PER_CHANNEL * BINS_PER_CHANNEL * BINS_PER_CHANNEL;

const BIN_WIDTH: u8 = 32;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Unable to open image '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to read image '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image '{path}' has no pixels")]
    Empty { path: PathBuf },
}

impl SignatureError {
    pub fn path(&self) -> &Path {
        match self {
            SignatureError::Open { path, .. }
            | SignatureError::Decode { path, .. }
            | SignatureError::Empty { path } => path,
        }
    }
}

/// How raw bin counts are scaled so images of different sizes compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Unit Euclidean norm.
    #[default]
    L2,
    /// Largest bin becomes 1.0.
    Max,
}

/// Normalized, flattened HSV histogram. Bin `h * 64 + s * 8 + v`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSignature {
    bins: Box<[f32; SIGNATURE_LEN]>,
}

impl ImageSignature {
    /// Wrap already-normalized bins. Returns `None` if any bin is negative or
    /// not finite.
    pub fn from_bins(bins: [f32; SIGNATURE_LEN]) -> Option<Self> {
        if bins.iter().all(|b| b.is_finite() && *b >= 0.0) {
            Some(Self {
                bins: Box::new(bins),
            })
        } else {
            None
        }
    }

    /// Always [`SIGNATURE_LEN`] entries.
    pub fn bins(&self) -> &[f32] {
        &self.bins[..]
    }
}

impl Serialize for ImageSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.bins.iter())
    }
}

/// Turns image files into [`ImageSignature`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramExtractor {
    normalization: Normalization,
}

impl HistogramExtractor {
    pub fn new(normalization: Normalization) -> Self {
        Self { normalization }
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Decode `path` and reduce it to a signature. The format is sniffed from
    /// the file content; the file handle is dropped before returning.
    pub fn compute_signature(&self, path: &Path) -> Result<ImageSignature, SignatureError> {
        let reader = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|source| SignatureError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let image = reader.decode().map_err(|source| SignatureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        self.signature_of(&image).ok_or_else(|| SignatureError::Empty {
            path: path.to_path_buf(),
        })
    }

    /// Signature of an in-memory image. Grayscale input is replicated across
    /// three channels and alpha is dropped. `None` for a zero-pixel image.
    pub fn signature_of(&self, image: &DynamicImage) -> Option<ImageSignature> {
        let rgb = image.to_rgb8();
        let counts = hsv_histogram(&rgb)?;
        Some(normalize(counts, self.normalization))
    }
}

/// Signature of `path` with the default (L2) normalization.
pub fn compute_signature(path: &Path) -> Result<ImageSignature, SignatureError> {
    HistogramExtractor::default().compute_signature(path)
}

fn hsv_histogram(rgb: &RgbImage) -> Option<[u64; SIGNATURE_LEN]> {
    if rgb.width() == 0 || rgb.height() == 0 {
        return None;
    }

    let mut counts = [0u64; SIGNATURE_LEN];
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        let [h, s, v] = rgb_to_hsv(r, g, b);
        counts[bin_index(h, s, v)] += 1;
    }
    Some(counts)
}

fn bin_index(h: u8, s: u8, v: u8) -> usize {
    let bin = |c: u8| (c / BIN_WIDTH) as usize;
    (bin(h) * BINS_PER_CHANNEL + bin(s)) * BINS_PER_CHANNEL + bin(v)
}

/// 8-bit HSV: hue in half-degrees (`0..180`), saturation and value in
/// `0..=255`. Both hue and saturation round half up.
pub(crate) fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let v = r.max(g).max(b);
    let diff = v - r.min(g).min(b);

    let s = if v == 0 {
        0
    } else {
        round_half_up(diff as f64 * 255.0 / v as f64)
    };

    let h = if diff == 0 {
        0
    } else {
        let sector = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        let h = round_half_up(sector as f64 * 30.0 / diff as f64);
        if h < 0 { h + 180 } else { h }
    };

    [h as u8, s as u8, v as u8]
}

fn round_half_up(x: f64) -> i32 {
    (x + 0.5).floor() as i32
}

fn normalize(counts: [u64; SIGNATURE_LEN], normalization: Normalization) -> ImageSignature {
    let denom = match normalization {
        Normalization::L2 => counts
            .iter()
            .map(|&c| c as f64 * c as f64)
            .sum::<f64>()
            .sqrt(),
        Normalization::Max => counts.iter().copied().max().unwrap_or(0) as f64,
    };
    let scale = if denom > 0.0 { 1.0 / denom } else { 0.0 };

    let mut bins = [0.0f32; SIGNATURE_LEN];
    for (bin, &count) in bins.iter_mut().zip(counts.iter()) {
        *bin = (count as f64 * scale) as f32;
    }
    ImageSignature {
        bins: Box::new(bins),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, Rgba, RgbaImage};
    use std::fs;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(color)))
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
    }

    #[test]
    fn test_hsv_hue_wraps_below_zero() {
        // Magenta-ish red: max is red, blue above green, so the raw hue is negative.
        let [h, _, _] = rgb_to_hsv(255, 0, 128);
        assert!(h >= 150 && h < 180, "hue {h} should wrap into the top of the range");
    }

    #[test]
    fn test_hue_never_reaches_180() {
        for r in (0..=255).step_by(15) {
            for g in (0..=255).step_by(15) {
                for b in (0..=255).step_by(15) {
                    let [h, _, _] = rgb_to_hsv(r as u8, g as u8, b as u8);
                    assert!(h < 180);
                }
            }
        }
    }

    #[test]
    fn test_signature_has_512_non_negative_bins() {
        let signature = HistogramExtractor::default()
            .signature_of(&gradient(64, 48))
            .unwrap();

        assert_eq!(signature.bins().len(), SIGNATURE_LEN);
        assert_eq!(SIGNATURE_LEN, 512);
        assert!(signature.bins().iter().all(|b| *b >= 0.0));
    }

    #[test]
    fn test_l2_normalization_gives_unit_norm() {
        let signature = HistogramExtractor::new(Normalization::L2)
            .signature_of(&gradient(64, 48))
            .unwrap();

        let norm: f64 = signature
            .bins()
            .iter()
            .map(|b| *b as f64 * *b as f64)
            .sum::<f64>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_max_normalization_peaks_at_one() {
        let signature = HistogramExtractor::new(Normalization::Max)
            .signature_of(&gradient(64, 48))
            .unwrap();

        let max = signature.bins().iter().cloned().fold(0.0f32, f32::max);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn test_solid_red_fills_a_single_bin() {
        let signature = HistogramExtractor::default()
            .signature_of(&solid(100, 100, [255, 0, 0]))
            .unwrap();

        // h=0, s=255, v=255 -> bins (0, 7, 7)
        assert_eq!(signature.bins()[63], 1.0);
        assert_eq!(signature.bins().iter().filter(|b| **b > 0.0).count(), 1);
    }

    #[test]
    fn test_size_does_not_change_signature() {
        let extractor = HistogramExtractor::default();
        let small = extractor.signature_of(&solid(10, 10, [0, 0, 255])).unwrap();
        let large = extractor.signature_of(&solid(300, 200, [0, 0, 255])).unwrap();
        assert_eq!(small, large);
    }

    fn red_over_blue(width: u32, height: u32) -> DynamicImage {
        // Top nine tenths red, bottom tenth blue.
        let split = height * 9 / 10;
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |_, y| {
            if y < split { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        }))
    }

    #[test]
    fn test_bins_keep_counting_past_f32_precision() {
        // 18M red pixels in one bin, more than f32 can count exactly.
        let extractor = HistogramExtractor::new(Normalization::Max);
        let large = extractor.signature_of(&red_over_blue(5000, 4000)).unwrap();
        let small = extractor.signature_of(&red_over_blue(50, 40)).unwrap();

        // red -> bin 63, blue -> bin 3 * 64 + 63
        assert_eq!(large.bins()[63], 1.0);
        assert_eq!(large.bins()[255], small.bins()[255]);
        assert_eq!(large, small);
        assert_eq!(crate::core::similarity::similarity(&large, &small), 1.0);
    }

    #[test]
    fn test_grayscale_matches_replicated_rgb() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_fn(32, 32, |x, y| {
            Luma([((x * 8 + y) % 256) as u8])
        }));
        let replicated = DynamicImage::ImageRgb8(ImageBuffer::from_fn(32, 32, |x, y| {
            let l = ((x * 8 + y) % 256) as u8;
            Rgb([l, l, l])
        }));

        let extractor = HistogramExtractor::default();
        assert_eq!(
            extractor.signature_of(&gray).unwrap(),
            extractor.signature_of(&replicated).unwrap()
        );
    }

    #[test]
    fn test_alpha_is_ignored() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 20, Rgba([0, 255, 0, 10])));
        let extractor = HistogramExtractor::default();
        assert_eq!(
            extractor.signature_of(&rgba).unwrap(),
            extractor.signature_of(&solid(20, 20, [0, 255, 0])).unwrap()
        );
    }

    #[test]
    fn test_zero_pixel_image_has_no_signature() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(HistogramExtractor::default().signature_of(&empty).is_none());
    }

    #[test]
    fn test_compute_signature_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gradient.png");
        gradient(40, 30).save(&path).unwrap();

        let first = compute_signature(&path).unwrap();
        let second = compute_signature(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_format_is_sniffed_from_content() {
        let temp_dir = TempDir::new().unwrap();
        let png = temp_dir.path().join("real.png");
        solid(8, 8, [10, 200, 30]).save(&png).unwrap();
        let misnamed = temp_dir.path().join("actually-png.jpg");
        fs::copy(&png, &misnamed).unwrap();

        assert_eq!(
            compute_signature(&png).unwrap(),
            compute_signature(&misnamed).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_not_readable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.png");

        let err = compute_signature(&path).unwrap_err();
        assert!(matches!(err, SignatureError::Open { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn test_corrupt_file_is_not_readable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("corrupt.png");
        fs::write(&path, b"definitely not an image").unwrap();

        let err = compute_signature(&path).unwrap_err();
        assert!(matches!(err, SignatureError::Decode { .. }));
        assert!(err.to_string().contains("corrupt.png"));
    }

    #[test]
    fn test_from_bins_rejects_negative_values() {
        let mut bins = [0.0f32; SIGNATURE_LEN];
        bins[3] = -0.5;
        assert!(ImageSignature::from_bins(bins).is_none());

        bins[3] = 0.5;
        assert!(ImageSignature::from_bins(bins).is_some());
    }

    #[test]
    fn test_signature_serializes_as_array() {
        let signature = HistogramExtractor::default()
            .signature_of(&solid(4, 4, [255, 0, 0]))
            .unwrap();
        let json = serde_json::to_value(&signature).unwrap();
        assert_eq!(json.as_array().unwrap().len(), SIGNATURE_LEN);
    }
}
