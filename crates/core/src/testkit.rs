//! Fakes shared by the unit tests: scripted window, synthetic sprites and
//! canned digit recognizers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{GrayImage, Rgba, RgbaImage};

use crate::automation::{Automation, PollConfig};
use crate::clock::Clock;
use crate::platform::WindowHandle;
use crate::registry::{self, Registry, FRAME_HEIGHT, FRAME_WIDTH};
use crate::reward::DigitRecognizer;
use crate::sprite::{sprite_name_for_region, Sprite};
use crate::types::*;

/// Regions gated by a sprite in the built-in layers, plus the emulator sprite.
pub const SPRITE_REGIONS: [&str; 8] = [
    "ICON_BRAWL_STARS",
    "BUTTON_BRAWLERS",
    "BUTTON_BACK",
    "BUTTON_EXIT",
    "BUTTON_TRY",
    "BUTTON_PLAY",
    "BRAWLER_SHELLY",
    "LDPLAYER",
];

pub const BACKGROUND: Rgba<u8> = Rgba([30, 30, 30, 255]);

pub fn blank_screen(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_pixel(w, h, BACKGROUND)
}

/// 12x12 pattern of 3px blocks; distinct seeds never match each other.
pub fn sprite_image(seed: u16) -> RgbaImage {
    let code = seed.wrapping_mul(0x9E37) ^ 0x5A5A;
    RgbaImage::from_fn(12, 12, |x, y| {
        let k = (y / 3) * 4 + x / 3;
        if (code >> k) & 1 == 1 {
            Rgba([250, 250, 40, 255])
        } else {
            Rgba([20, 20, 200, 255])
        }
    })
}

fn sprite_for(name: &str) -> RgbaImage {
    let seed = SPRITE_REGIONS
        .iter()
        .position(|r| sprite_name_for_region(r) == name)
        .map_or(99, |i| i as u16 + 1);
    sprite_image(seed)
}

/// Built-in layers with one synthetic sprite per gated region.
pub fn registry() -> Registry {
    let mut b = Registry::builder(FRAME_WIDTH, FRAME_HEIGHT);
    for layer in registry::default_layers() {
        b = b.layer(layer);
    }
    for region in SPRITE_REGIONS {
        let name = sprite_name_for_region(region);
        let img = sprite_for(&name);
        b = b.sprite(Sprite::new(name, vec![img]));
    }
    b.build().unwrap()
}

/// Full-size screen showing the sprites of `regions`, each placed 2px inside
/// its region. `LDPLAYER` is drawn near the frame center.
pub fn screen_with(reg: &Registry, regions: &[&str]) -> RgbaImage {
    let mut screen = blank_screen(FRAME_WIDTH, FRAME_HEIGHT);
    for name in regions {
        let sprite = sprite_for(&sprite_name_for_region(name));
        let (x, y) = match reg.region(name) {
            Ok(r) => (r.left + 2, r.top + 2),
            Err(_) => (470, 260),
        };
        image::imageops::replace(&mut screen, &sprite, x as i64, y as i64);
    }
    screen
}

/// Shared record of everything a `FakeWindow` was asked to do.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn kinds(log: &EventLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|e| e.split_whitespace().next().unwrap_or_default().to_string())
        .collect()
}

/// Window serving a list of screens. With `advance_on_click`, each click
/// moves to the next screen (the last one sticks).
pub struct FakeWindow {
    screens: Vec<RgbaImage>,
    current: usize,
    advance_on_click: bool,
    drop_frames: u32,
    grabs: u64,
    log: EventLog,
}

impl FakeWindow {
    pub fn new(screens: Vec<RgbaImage>, advance_on_click: bool) -> (Self, EventLog) {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let win = Self {
            screens,
            current: 0,
            advance_on_click,
            drop_frames: 0,
            grabs: 0,
            log: Arc::clone(&log),
        };
        (win, log)
    }

    /// Return `None` from the next `n` captures.
    pub fn dropping(mut self, n: u32) -> Self {
        self.drop_frames = n;
        self
    }
}

impl WindowHandle for FakeWindow {
    fn id(&self) -> WindowId { 7 }
    fn title(&self) -> &str { "LDPlayer" }
    fn activate(&mut self) {}

    fn grab_frame(&mut self) -> Option<Frame> {
        if self.drop_frames > 0 {
            self.drop_frames -= 1;
            self.log.lock().unwrap().push("miss".into());
            return None;
        }
        self.grabs += 1;
        self.log.lock().unwrap().push(format!("grab {}", self.current));
        let img = self.screens.get(self.current)?.clone();
        Some(Frame::with_timestamp(img, self.grabs as f64))
    }

    fn click_relative(&mut self, x_ratio: f64, y_ratio: f64) {
        self.log.lock().unwrap().push(format!("click {:.4},{:.4}", x_ratio, y_ratio));
        if self.advance_on_click && self.current + 1 < self.screens.len() {
            self.current += 1;
        }
    }

    fn tap(&mut self, key: &str) {
        self.log.lock().unwrap().push(format!("tap {}", key));
    }
}

pub fn poll_config() -> PollConfig {
    PollConfig {
        poll_interval: Duration::from_millis(100),
        frame_backoff: Duration::from_millis(500),
        frame_max_retries: None,
        tolerance: 24,
    }
}

pub fn automation(window: FakeWindow, clock: Arc<dyn Clock>) -> Automation {
    Automation::new(Box::new(window), registry(), clock, poll_config())
}

/// Recognizer returning a fixed string.
pub struct FakeRecognizer(pub String);

impl DigitRecognizer for FakeRecognizer {
    fn recognize(&self, _image: &GrayImage) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

/// Recognizer that always fails, like a missing OCR binary.
pub struct FailingRecognizer;

impl DigitRecognizer for FailingRecognizer {
    fn recognize(&self, _image: &GrayImage) -> anyhow::Result<String> {
        anyhow::bail!("tesseract not installed")
    }
}
