//! Texture cache resources: decoded images split into grid cells.

use std::path::PathBuf;

use image::GenericImageView;

use crate::backend::{DeviceResource, GxBackend, PixelBuffer, TextureId};
use crate::cache::{LoadTimer, Loader, Resource};
use crate::config::GxConfig;
use crate::errors::{GxError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub name: String,
    pub grid_x: u32,
    pub grid_y: u32,
    pub mipmapped: bool,
}

impl TextureKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grid_x: 1,
            grid_y: 1,
            mipmapped: false,
        }
    }

    pub fn with_grid(mut self, grid_x: u32, grid_y: u32) -> Self {
        self.grid_x = grid_x;
        self.grid_y = grid_y;
        self
    }

    pub fn mipmapped(mut self, mipmapped: bool) -> Self {
        self.mipmapped = mipmapped;
        self
    }
}

/// A loaded image. `cells` holds one backend texture per grid cell in row-major order and is
/// empty when loading failed.
#[derive(Debug, Clone, Default)]
pub struct Texture {
    pub name: String,
    pub path: PathBuf,
    /// Size of the whole image in pixels.
    pub width: u32,
    pub height: u32,
    pub grid_x: u32,
    pub grid_y: u32,
    pub mipmapped: bool,
    pub cells: Vec<TextureId>,
}

impl Texture {
    pub fn is_valid(&self) -> bool {
        !self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<TextureId> {
        self.cells.get(index).copied()
    }

    /// First cell, which is the whole image for an ungridded texture.
    pub fn id(&self) -> Option<TextureId> {
        self.cell(0)
    }

    pub fn cell_size(&self) -> (u32, u32) {
        (
            self.width / self.grid_x.max(1),
            self.height / self.grid_y.max(1),
        )
    }
}

impl Resource for Texture {
    type Key = TextureKey;
    type Args = ();
}

pub struct TextureLoader<'a> {
    pub backend: &'a mut dyn GxBackend,
    pub config: &'a GxConfig,
}

impl TextureLoader<'_> {
    fn decode(&mut self, key: &TextureKey, texture: &mut Texture) -> Result<()> {
        let path = texture.path.clone();
        let image = image::open(&path).map_err(|source| GxError::Image {
            path: path.display().to_string(),
            source,
        })?;
        let (width, height) = image.dimensions();
        texture.width = width;
        texture.height = height;

        let (grid_x, grid_y) = (key.grid_x.max(1), key.grid_y.max(1));
        if width % grid_x != 0 || height % grid_y != 0 {
            return Err(GxError::GridMismatch {
                width,
                height,
                grid_x,
                grid_y,
            });
        }

        let rgba = image.to_rgba8();
        let (cell_width, cell_height) = (width / grid_x, height / grid_y);
        let mut cells = Vec::with_capacity((grid_x * grid_y) as usize);
        for cell_y in 0..grid_y {
            for cell_x in 0..grid_x {
                let cell = if grid_x == 1 && grid_y == 1 {
                    rgba.clone()
                } else {
                    image::imageops::crop_imm(
                        &rgba,
                        cell_x * cell_width,
                        cell_y * cell_height,
                        cell_width,
                        cell_height,
                    )
                    .to_image()
                };
                let created = self.backend.create_texture(&PixelBuffer {
                    label: &key.name,
                    width: cell_width,
                    height: cell_height,
                    rgba: cell.as_raw(),
                    mipmapped: key.mipmapped,
                });
                match created {
                    Ok(id) => cells.push(id),
                    Err(error) => {
                        for id in cells.drain(..) {
                            self.backend.release(DeviceResource::Texture(id));
                        }
                        return Err(error);
                    }
                }
            }
        }
        texture.cells = cells;
        Ok(())
    }
}

impl Loader<Texture> for TextureLoader<'_> {
    fn load(&mut self, key: &TextureKey, _args: &()) -> Texture {
        let _timer = LoadTimer::new(&key.name);
        debug_assert!(key.grid_x > 0 && key.grid_y > 0, "texture grid must be > 0");

        let mut texture = Texture {
            name: key.name.clone(),
            path: self.config.resolve_resource_path(&key.name),
            grid_x: key.grid_x.max(1),
            grid_y: key.grid_y.max(1),
            mipmapped: key.mipmapped,
            ..Default::default()
        };
        match self.decode(key, &mut texture) {
            Ok(()) => log::info!(
                "loaded texture {} ({}x{}, {} cells)",
                key.name,
                texture.width,
                texture.height,
                texture.cells.len()
            ),
            Err(error) => log::error!("failed to load texture {}: {}", key.name, error),
        }
        texture
    }

    fn release(&mut self, texture: &mut Texture) {
        for id in texture.cells.drain(..) {
            self.backend.release(DeviceResource::Texture(id));
        }
    }
}
