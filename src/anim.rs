//! Animation sheets.
//!
//! A sheet is a text file next to a sprite image describing how the image is divided into a grid
//! of cells and which runs of cells form named animation clips. Every line is a section name
//! followed by `key:value` pairs; `#` starts a comment line.
//!
//! ```text
//! sheet grid_sx:4 grid_sy:2 pivot_x:16 pivot_y:32 scale:1
//! animation name:walk grid_x:0 grid_y:0 frames:4 rate:8 loop:1 loop_start:0
//! trigger frame:2 on:enter action:sound sound:step.wav
//! ```

use std::collections::BTreeMap;

use crate::cache::{LoadTimer, Loader, Resource};
use crate::config::GxConfig;
use crate::errors::GxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    OnEnter,
    OnLeave,
}

/// Free-form `key:value` arguments of a trigger line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerArgs(BTreeMap<String, String>);

impl TriggerArgs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_float(&self, key: &str, default: f32) -> f32 {
        self.get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimTrigger {
    pub kind: TriggerKind,
    pub action: String,
    pub args: TriggerArgs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimClip {
    pub name: String,
    pub first_cell: u32,
    pub frames: u32,
    /// Frames per second, at least 1.
    pub rate: f32,
    pub looping: bool,
    /// Frame the loop jumps back to, below `frames`.
    pub loop_start: u32,
    pub pivot: (i32, i32),
    /// Triggers per frame, indexed by frame.
    pub triggers: Vec<Vec<AnimTrigger>>,
}

impl AnimClip {
    pub fn triggers_for(&self, frame: u32, kind: TriggerKind) -> impl Iterator<Item = &AnimTrigger> {
        self.triggers
            .get(frame as usize)
            .into_iter()
            .flatten()
            .filter(move |trigger| trigger.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimSheet {
    pub name: String,
    /// False when no `sheet` line was read (including a missing file).
    pub has_sheet: bool,
    pub grid: (u32, u32),
    pub pivot: (i32, i32),
    pub scale: f32,
    pub clips: BTreeMap<String, AnimClip>,
    /// Diagnostics for the lines that were skipped.
    pub errors: Vec<String>,
}

impl Default for AnimSheet {
    fn default() -> Self {
        Self {
            name: String::new(),
            has_sheet: false,
            grid: (1, 1),
            pivot: (0, 0),
            scale: 1.0,
            clips: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

impl Resource for AnimSheet {
    type Key = String;
    type Args = ();
}

impl AnimSheet {
    pub fn clip(&self, name: &str) -> Option<&AnimClip> {
        self.clips.get(name)
    }

    pub fn cell_count(&self) -> u32 {
        self.grid.0 * self.grid.1
    }

    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }

    /// Parses sheet text. Malformed lines are logged and skipped; parsing never fails as a whole.
    pub fn parse(name: &str, text: &str) -> AnimSheet {
        let mut sheet = AnimSheet {
            name: name.to_string(),
            ..Default::default()
        };
        let mut current: Option<String> = None;

        for (number, line) in text.lines().enumerate() {
            let line_no = number + 1;
            let parts: Vec<&str> = line.split_whitespace().collect();
            let Some(&section) = parts.first() else {
                continue;
            };
            if section.starts_with('#') {
                continue;
            }
            if parts.len() == 1 {
                sheet.report(line_no, format!("missing parameters: {}", line));
                continue;
            }

            let mut args = TriggerArgs::default();
            for part in &parts[1..] {
                let Some((key, value)) = part.split_once(':') else {
                    sheet.report(line_no, format!("incorrect key:value syntax: {}", part));
                    continue;
                };
                if key.is_empty() || value.is_empty() {
                    sheet.report(line_no, format!("incorrect key:value syntax: {}", part));
                    continue;
                }
                if args.contains(key) {
                    sheet.report(line_no, format!("duplicate key: {}", key));
                    continue;
                }
                args.set(key, value);
            }

            let result = match section {
                "sheet" => sheet.parse_sheet_line(&args),
                "animation" => {
                    current = None;
                    sheet.parse_animation_line(&args).map(|clip| {
                        current = Some(clip);
                    })
                }
                "trigger" => match &current {
                    Some(clip) => sheet.parse_trigger_line(clip, &args, name, line_no),
                    None => Err(
                        "must first define an animation before adding triggers to it".to_string(),
                    ),
                },
                other => Err(format!("unknown section: {}", other)),
            };
            if let Err(message) = result {
                sheet.report(line_no, format!("{}: {}", message, line));
            }
        }
        sheet
    }

    fn report(&mut self, line: usize, message: String) {
        let error = GxError::Sheet {
            path: self.name.clone(),
            line,
            message,
        };
        log::error!("{}", error);
        self.errors.push(error.to_string());
    }

    fn parse_sheet_line(&mut self, args: &TriggerArgs) -> Result<(), String> {
        let grid_x = args.get_int("grid_sx", 1);
        let grid_y = args.get_int("grid_sy", 1);
        if grid_x <= 0 || grid_y <= 0 {
            return Err("grid size must be > 0".to_string());
        }
        if (grid_x as u32).checked_mul(grid_y as u32).is_none() {
            return Err("grid has too many cells".to_string());
        }
        self.has_sheet = true;
        self.grid = (grid_x as u32, grid_y as u32);
        self.pivot = (args.get_int("pivot_x", 0), args.get_int("pivot_y", 0));
        self.scale = args.get_float("scale", 1.0);
        Ok(())
    }

    /// Adds a clip and returns its name.
    fn parse_animation_line(&mut self, args: &TriggerArgs) -> Result<String, String> {
        let name = args.get("name").unwrap_or_default().to_string();
        if name.is_empty() {
            return Err("name not set".to_string());
        }
        let grid_x = args.get_int("grid_x", 0);
        let grid_y = args.get_int("grid_y", 0);
        if grid_x < 0 || grid_y < 0 {
            return Err("grid_x and grid_y must be >= 0".to_string());
        }
        let frames = args.get_int("frames", 1);
        if frames <= 0 {
            return Err("frames must be >= 1".to_string());
        }
        let first_cell = grid_x as u64 + grid_y as u64 * self.grid.0 as u64;
        if first_cell + frames as u64 > self.cell_count() as u64 {
            return Err("animation lies (partially or completely) outside the grid".to_string());
        }
        // Bounded by the cell count, which fits in u32.
        let first_cell = first_cell as u32;
        let rate = args.get_int("rate", 1);
        if rate <= 0 {
            return Err("frame rate must be >= 1".to_string());
        }
        let loop_start = args.get_int("loop_start", 0);
        if loop_start < 0 || loop_start >= frames {
            return Err("loop start must be < 'frames'".to_string());
        }

        let clip = AnimClip {
            name: name.clone(),
            first_cell,
            frames: frames as u32,
            rate: rate as f32,
            looping: args.get_int("loop", 1) != 0,
            loop_start: loop_start as u32,
            pivot: (
                args.get_int("pivot_x", self.pivot.0),
                args.get_int("pivot_y", self.pivot.1),
            ),
            triggers: vec![Vec::new(); frames as usize],
        };
        self.clips.insert(name.clone(), clip);
        Ok(name)
    }

    fn parse_trigger_line(
        &mut self,
        clip_name: &str,
        args: &TriggerArgs,
        file: &str,
        line_no: usize,
    ) -> Result<(), String> {
        let Some(clip) = self.clips.get_mut(clip_name) else {
            return Err("animation for trigger is missing".to_string());
        };
        let frame = args.get_int("frame", 0);
        if frame < 0 || frame as u32 >= clip.frames {
            log::warn!(
                "{}:{}: frame {} is not a key frame within animation {}",
                file,
                line_no,
                frame,
                clip.name
            );
            return Ok(());
        }
        let kind = match args.get("on").unwrap_or("enter") {
            "enter" => TriggerKind::OnEnter,
            "leave" => TriggerKind::OnLeave,
            _ => return Err("invalid value for 'on'".to_string()),
        };
        clip.triggers[frame as usize].push(AnimTrigger {
            kind,
            action: args.get("action").unwrap_or_default().to_string(),
            args: args.clone(),
        });
        Ok(())
    }
}

pub struct AnimSheetLoader<'a> {
    pub config: &'a GxConfig,
}

impl Loader<AnimSheet> for AnimSheetLoader<'_> {
    fn load(&mut self, name: &String, _args: &()) -> AnimSheet {
        let _timer = LoadTimer::new(name);
        let path = self.config.resolve_resource_path(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let sheet = AnimSheet::parse(name, &text);
                log::info!("loaded sheet {} ({} animations)", name, sheet.clips.len());
                sheet
            }
            Err(error) => {
                // Sprites look for a sheet next to every image; most images have none.
                log::debug!("no sheet {}: {}", path.display(), error);
                AnimSheet {
                    name: name.clone(),
                    ..Default::default()
                }
            }
        }
    }
}
