//! Damage-per-second reward read off the on-screen counter.
//!
//! The counter region is upscaled, thresholded on the counter's text color,
//! inverted to dark-on-light, lightly blurred and handed to a digit-only OCR
//! pass. Anything that is not a digit is dropped; no digits means reward 0.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};

use anyhow::{bail, Context};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, RgbaImage};

use crate::logger;

pub const UPSCALE: u32 = 5;
/// Counter text color, RGB.
pub const TEXT_COLOR: [u8; 3] = [136, 136, 255];
pub const COLOR_TOLERANCE: u8 = 15;

/// Digit OCR backend.
pub trait DigitRecognizer: Send {
    /// Raw text read from a dark-on-light single-line image.
    fn recognize(&self, image: &GrayImage) -> anyhow::Result<String>;
}

/// Runs the `tesseract` CLI, streaming the image through stdin.
#[derive(Debug, Clone)]
pub struct Tesseract {
    binary: PathBuf,
}

impl Tesseract {
    pub fn new(binary: &Path) -> Self {
        Self { binary: binary.to_path_buf() }
    }
}

impl Default for Tesseract {
    fn default() -> Self {
        Self::new(Path::new("tesseract"))
    }
}

impl DigitRecognizer for Tesseract {
    fn recognize(&self, image: &GrayImage) -> anyhow::Result<String> {
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(image.clone()).write_to(&mut png, ImageOutputFormat::Png)?;

        // psm 7: single text line; dictionaries off, digits only
        let mut child = ProcessCommand::new(&self.binary)
            .args([
                "stdin",
                "stdout",
                "--psm",
                "7",
                "-c",
                "load_system_dawg=0",
                "-c",
                "load_freq_dawg=0",
                "-c",
                "tessedit_char_whitelist=0123456789",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run {}", self.binary.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(png.get_ref())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn is_text_color(px: &[u8]) -> bool {
    TEXT_COLOR
        .iter()
        .zip(px)
        .all(|(want, got)| want.abs_diff(*got) <= COLOR_TOLERANCE)
}

/// Reflect-101 border handling for index `i - 1`.
fn prev_index(i: u32, len: u32) -> u32 {
    match (i, len) {
        (0, 1) => 0,
        (0, _) => 1,
        _ => i - 1,
    }
}

/// 2x2 box filter anchored at the bottom-right pixel of the window.
fn box_blur_2x2(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let (px, py) = (prev_index(x, w), prev_index(y, h));
        let sum: u32 = [(px, py), (x, py), (px, y), (x, y)]
            .iter()
            .map(|&(xx, yy)| img.get_pixel(xx, yy)[0] as u32)
            .sum();
        Luma([((sum + 2) / 4) as u8])
    })
}

/// Turn a cropped counter region into a black-on-white digit image.
pub fn preprocess(region: &RgbaImage) -> GrayImage {
    let (w, h) = region.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(0, 0);
    }
    let big = imageops::resize(region, w * UPSCALE, h * UPSCALE, FilterType::Triangle);
    // Text pixels become black, everything else white
    let inverted = GrayImage::from_fn(big.width(), big.height(), |x, y| {
        if is_text_color(&big.get_pixel(x, y).0[..3]) {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    box_blur_2x2(&inverted)
}

/// Keep the ASCII digits of an OCR result. No digits, or a number that does
/// not fit, reads as 0.
pub fn parse_reward(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(0)
}

pub struct RewardExtractor {
    recognizer: Box<dyn DigitRecognizer>,
}

impl RewardExtractor {
    pub fn new(recognizer: Box<dyn DigitRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Reward shown in `region`. OCR failures degrade to 0.
    pub fn extract(&self, region: &RgbaImage) -> u64 {
        let processed = preprocess(region);
        if processed.width() == 0 || processed.height() == 0 {
            return 0;
        }
        match self.recognizer.recognize(&processed) {
            Ok(text) => parse_reward(&text),
            Err(e) => {
                logger::warn_p("reward", &format!("ocr failed: {:#}", e));
                0
            }
        }
    }
}

/// Save a reward region as `region_<timestamp>.png` for building OCR fixtures.
#[cfg(feature = "debug-capture")]
pub fn dump_region(dir: &Path, timestamp: f64, region: &RgbaImage) -> crate::error::Result<()> {
    std::fs::create_dir_all(dir)?;
    region.save(dir.join(format!("region_{}.png", timestamp)))?;
    Ok(())
}
