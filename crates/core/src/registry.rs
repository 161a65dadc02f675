//! Layered, read-only table of regions, sprites and transition scripts.
//!
//! Each layer (emulator -> app -> event) contributes named regions and
//! scripts plus a sprite folder; later layers override earlier entries.
//! The merged [`Registry`] is immutable once built.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AutomationError, Result};
use crate::logger;
use crate::sprite::{self, Sprite};
use crate::types::Region;

/// Emulator window size the region tables are expressed in.
pub const FRAME_WIDTH: u32 = 960;
pub const FRAME_HEIGHT: u32 = 540;

/// One (region, click?) step of a transition script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionStep {
    pub region: &'static str,
    pub click: bool,
}

const fn click(region: &'static str) -> TransitionStep {
    TransitionStep { region, click: true }
}

const fn wait(region: &'static str) -> TransitionStep {
    TransitionStep { region, click: false }
}

pub const START_APP: &str = "start_app";
pub const START_EVENT: &str = "start_event";
pub const STOP_EVENT: &str = "stop_event";
pub const RESET_EVENT: &str = "reset_event";

/// Static configuration contributed by one automation layer.
#[derive(Debug)]
pub struct Layer {
    pub name: &'static str,
    /// Folder of this layer under the data directory.
    pub dir: &'static [&'static str],
    pub regions: &'static [(&'static str, Region)],
    pub scripts: &'static [(&'static str, &'static [TransitionStep])],
}

impl Layer {
    pub fn sprite_dir(&self, data_dir: &Path) -> PathBuf {
        let mut d = data_dir.to_path_buf();
        for part in self.dir {
            d.push(part);
        }
        d.push("sprites");
        d
    }
}

pub static LDPLAYER: Layer = Layer {
    name: "ldplayer",
    dir: &["ldplayer"],
    regions: &[("FULL_FRAME", Region::full(FRAME_WIDTH, FRAME_HEIGHT))],
    scripts: &[],
};

pub static BRAWL_STARS: Layer = Layer {
    name: "brawl_stars",
    dir: &["ldplayer", "brawl_stars"],
    regions: &[
        ("GAME_SCREEN", Region::new(28, 8, 540, 908)),
        ("ICON_BRAWL_STARS", Region::new(110, 40, 200, 130)),
        ("BUTTON_BRAWLERS", Region::new(200, 8, 260, 110)),
        ("BUTTON_BACK", Region::new(36, 8, 80, 70)),
        ("BUTTON_EXIT", Region::new(476, 497, 522, 566)),
        ("BUTTON_TRY", Region::new(483, 41, 525, 237)),
        ("BUTTON_PLAY", Region::new(345, 539, 384, 688)),
    ],
    scripts: &[(START_APP, &[click("ICON_BRAWL_STARS"), wait("BUTTON_BRAWLERS")])],
};

pub static TRY_BRAWLER: Layer = Layer {
    name: "try_brawler",
    dir: &["ldplayer", "brawl_stars", "try_brawler"],
    regions: &[
        ("BRAWLER_SHELLY", Region::new(120, 150, 260, 300)),
        ("REWARD_TRY_DAMAGE_PER_SECOND", Region::new(67, 848, 89, 900)),
    ],
    scripts: &[
        (
            START_EVENT,
            &[
                click("BUTTON_BRAWLERS"),
                click("BRAWLER_SHELLY"),
                click("BUTTON_TRY"),
                wait("BUTTON_EXIT"),
            ],
        ),
        (STOP_EVENT, &[click("BUTTON_EXIT"), click("BUTTON_BACK"), click("BUTTON_BACK")]),
        (RESET_EVENT, &[click("BUTTON_EXIT"), click("BUTTON_TRY"), wait("BUTTON_EXIT")]),
    ],
};

/// Layers for the try-brawler event, base first.
pub fn default_layers() -> [&'static Layer; 3] {
    [&LDPLAYER, &BRAWL_STARS, &TRY_BRAWLER]
}

#[derive(Debug)]
pub struct Registry {
    frame: (u32, u32),
    regions: HashMap<String, Region>,
    sprites: HashMap<String, Sprite>,
    scripts: HashMap<String, Vec<TransitionStep>>,
}

impl Registry {
    pub fn builder(frame_width: u32, frame_height: u32) -> RegistryBuilder {
        RegistryBuilder {
            frame: (frame_width, frame_height),
            layers: Vec::new(),
            sprites: HashMap::new(),
        }
    }

    /// Merge the default layers and discover their sprites under `data_dir`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut builder = Self::builder(FRAME_WIDTH, FRAME_HEIGHT);
        for layer in default_layers() {
            builder = builder.layer(layer).discover(&layer.sprite_dir(data_dir))?;
        }
        builder.build()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.frame
    }

    pub fn regions(&self) -> &HashMap<String, Region> {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Result<Region> {
        self.regions
            .get(name)
            .copied()
            .ok_or_else(|| AutomationError::UnknownRegion(name.to_string()))
    }

    pub fn sprite(&self, name: &str) -> Result<&Sprite> {
        self.sprites
            .get(name)
            .ok_or_else(|| AutomationError::UnknownSprite(name.to_string()))
    }

    pub fn script(&self, name: &str) -> Result<&[TransitionStep]> {
        self.scripts
            .get(name)
            .map(|s| s.as_slice())
            .ok_or_else(|| AutomationError::UnknownScript(name.to_string()))
    }
}

pub struct RegistryBuilder {
    frame: (u32, u32),
    layers: Vec<&'static Layer>,
    sprites: HashMap<String, Sprite>,
}

impl RegistryBuilder {
    pub fn layer(mut self, layer: &'static Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Add every sprite found in `dir`, replacing same-named ones.
    pub fn discover(mut self, dir: &Path) -> Result<Self> {
        let found = sprite::discover_sprites(dir)?;
        logger::info(&format!("{} sprite(s) in {}", found.len(), dir.display()));
        self.sprites.extend(found);
        Ok(self)
    }

    pub fn sprite(mut self, sprite: Sprite) -> Self {
        self.sprites.insert(sprite.name.clone(), sprite);
        self
    }

    /// Merge layers in order and check every region and script reference.
    pub fn build(self) -> Result<Registry> {
        let (w, h) = self.frame;
        let mut regions: HashMap<String, Region> = HashMap::new();
        let mut scripts: HashMap<String, Vec<TransitionStep>> = HashMap::new();

        for layer in &self.layers {
            for (name, region) in layer.regions {
                region.validate(name, w, h)?;
                if regions.insert(name.to_string(), *region).is_some() {
                    logger::info(&format!("layer {} overrides region {}", layer.name, name));
                }
            }
            for (name, steps) in layer.scripts {
                if scripts.insert(name.to_string(), steps.to_vec()).is_some() {
                    logger::info(&format!("layer {} overrides script {}", layer.name, name));
                }
            }
        }

        for steps in scripts.values() {
            if let Some(step) = steps.iter().find(|s| !regions.contains_key(s.region)) {
                return Err(AutomationError::UnknownRegion(step.region.to_string()));
            }
        }

        Ok(Registry { frame: self.frame, regions, sprites: self.sprites, scripts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static OVERRIDE: Layer = Layer {
        name: "override",
        dir: &["override"],
        regions: &[("BUTTON_TRY", Region::new(10, 10, 40, 60))],
        scripts: &[(RESET_EVENT, &[wait("BUTTON_TRY")])],
    };

    static BROKEN_SCRIPT: Layer = Layer {
        name: "broken",
        dir: &[],
        regions: &[],
        scripts: &[("dangling", &[click("NOWHERE")])],
    };

    static OUT_OF_FRAME: Layer = Layer {
        name: "oob",
        dir: &[],
        regions: &[("TOO_WIDE", Region::new(0, 900, 10, 1000))],
        scripts: &[],
    };

    fn base() -> RegistryBuilder {
        let mut b = Registry::builder(FRAME_WIDTH, FRAME_HEIGHT);
        for layer in default_layers() {
            b = b.layer(layer);
        }
        b
    }

    #[test]
    fn default_layers_merge() {
        let reg = base().build().unwrap();
        assert_eq!(reg.region("GAME_SCREEN").unwrap(), Region::new(28, 8, 540, 908));
        assert_eq!(reg.region("REWARD_TRY_DAMAGE_PER_SECOND").unwrap(), Region::new(67, 848, 89, 900));
        assert_eq!(reg.script(START_EVENT).unwrap().len(), 4);
        assert!(!reg.script(START_EVENT).unwrap()[3].click);
        assert_eq!(reg.script(STOP_EVENT).unwrap().iter().filter(|s| s.click).count(), 3);
        assert!(matches!(reg.region("NOPE"), Err(AutomationError::UnknownRegion(_))));
        assert!(matches!(reg.sprite("SPRITE_NOPE"), Err(AutomationError::UnknownSprite(_))));
    }

    #[test]
    fn later_layers_override() {
        let reg = base().layer(&OVERRIDE).build().unwrap();
        assert_eq!(reg.region("BUTTON_TRY").unwrap(), Region::new(10, 10, 40, 60));
        assert_eq!(reg.script(RESET_EVENT).unwrap(), &[wait("BUTTON_TRY")]);
    }

    #[test]
    fn rejects_dangling_script_regions() {
        let err = base().layer(&BROKEN_SCRIPT).build().unwrap_err();
        assert!(matches!(err, AutomationError::UnknownRegion(ref r) if r == "NOWHERE"));
    }

    #[test]
    fn rejects_regions_outside_frame() {
        let err = base().layer(&OUT_OF_FRAME).build().unwrap_err();
        assert!(matches!(err, AutomationError::InvalidRegion { .. }));
    }

    #[test]
    fn sprite_dirs_follow_layer_folders() {
        assert_eq!(
            TRY_BRAWLER.sprite_dir(Path::new("data")),
            Path::new("data/ldplayer/brawl_stars/try_brawler/sprites")
        );
    }

    #[test]
    fn load_tolerates_missing_sprite_folders() {
        let reg = Registry::load(Path::new("/no/such/data")).unwrap();
        assert_eq!(reg.frame_size(), (960, 540));
        assert!(reg.sprite("SPRITE_LDPLAYER").is_err());
    }
}
