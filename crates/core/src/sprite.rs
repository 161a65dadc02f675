//! Reference sprites and the template search used to spot them.

use std::collections::HashMap;
use std::path::Path;

use image::RgbaImage;

use crate::error::Result;
use crate::logger;
use crate::types::Region;

/// A named reference image, possibly with several variants
/// (`button_try_0.png`, `button_try_1.png`, ...). Any variant counts as a match.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub name: String,
    pub images: Vec<RgbaImage>,
}

impl Sprite {
    pub fn new(name: impl Into<String>, images: Vec<RgbaImage>) -> Self {
        Self { name: name.into(), images }
    }

    /// Top-left corner (x, y) of the first variant found inside `region`.
    pub fn locate(&self, screen: &RgbaImage, region: &Region, tolerance: u8) -> Option<(u32, u32)> {
        self.images
            .iter()
            .find_map(|tpl| find_template(screen, tpl, region, tolerance))
    }
}

/// Registry name of the sprite gating a region: `BUTTON_TRY` -> `SPRITE_BUTTON_TRY`.
pub fn sprite_name_for_region(region: &str) -> String {
    format!("SPRITE_{}", region)
}

/// `button_try_1` -> `SPRITE_BUTTON_TRY`
fn sprite_name_from_stem(stem: &str) -> String {
    let base = match stem.rsplit_once('_') {
        Some((head, tail)) if !head.is_empty() && !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => stem,
    };
    let upper = base.to_uppercase();
    if upper.starts_with("SPRITE_") {
        upper
    } else {
        format!("SPRITE_{}", upper)
    }
}

/// Load every `.png` in `dir` as a sprite, grouping numbered variants.
/// A missing directory yields no sprites.
pub fn discover_sprites(dir: &Path) -> Result<HashMap<String, Sprite>> {
    let mut sprites: HashMap<String, Sprite> = HashMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => {
            logger::warn(&format!("sprite directory {} not found", dir.display()));
            return Ok(sprites);
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
        .collect();
    paths.sort();

    for path in paths {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        let name = sprite_name_from_stem(&stem);
        let img = image::open(&path)?.to_rgba8();
        sprites
            .entry(name.clone())
            .or_insert_with(|| Sprite::new(name, Vec::new()))
            .images
            .push(img);
    }
    Ok(sprites)
}

/// Find `template` fully inside `region` of `screen`, comparing a sampled
/// grid of opaque template pixels per channel within `tolerance`.
pub fn find_template(
    screen: &RgbaImage,
    template: &RgbaImage,
    region: &Region,
    tolerance: u8,
) -> Option<(u32, u32)> {
    let (tpl_w, tpl_h) = template.dimensions();
    if tpl_w == 0 || tpl_h == 0 {
        return None;
    }

    let right = region.right.min(screen.width());
    let bottom = region.bottom.min(screen.height());
    if right < region.left + tpl_w || bottom < region.top + tpl_h {
        return None;
    }
    let end_x = right - tpl_w;
    let end_y = bottom - tpl_h;

    let step = (tpl_w.min(tpl_h) / 8).max(1) as usize;
    let tol = tolerance as i32;

    for sy in region.top..=end_y {
        for sx in region.left..=end_x {
            let mut matches = true;
            let mut checked = 0u32;

            'check: for ty in (0..tpl_h).step_by(step) {
                for tx in (0..tpl_w).step_by(step) {
                    let t = template.get_pixel(tx, ty);
                    // Transparent template pixels are "don't care"
                    if t[3] < 128 {
                        continue;
                    }
                    let s = screen.get_pixel(sx + tx, sy + ty);
                    for c in 0..3 {
                        if (s[c] as i32 - t[c] as i32).abs() > tol {
                            matches = false;
                            break 'check;
                        }
                    }
                    checked += 1;
                }
            }

            if matches && checked > 0 {
                return Some((sx, sy));
            }
        }
    }
    None
}
