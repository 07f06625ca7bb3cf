//! Materials and textures attached to meshes

use crate::point::{Rgb, TexCoord};
use image::RgbaImage;

/// A texture image together with the file name it was loaded from or will be saved as
#[derive(Debug, Clone)]
pub struct Texture {
    pub file_name: String,
    pub image: RgbaImage,
}

impl Texture {
    pub fn new<S: Into<String>>(file_name: S, image: RgbaImage) -> Self {
        Self {
            file_name: file_name.into(),
            image,
        }
    }

    /// Nearest-pixel lookup. Coordinates wrap, and `v = 0` is the bottom row.
    pub fn sample(&self, uv: TexCoord) -> Rgb {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return [255, 255, 255];
        }
        let u = uv[0].rem_euclid(1.0);
        let v = uv[1].rem_euclid(1.0);
        let x = ((u * width as f32) as u32).min(width - 1);
        let y = (((1.0 - v) * height as f32) as u32).min(height - 1);
        let pixel = self.image.get_pixel(x, y);
        [pixel[0], pixel[1], pixel[2]]
    }
}

/// Surface appearance: reflectance components and an optional texture
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub emission: [f32; 4],
    pub shininess: f32,
    pub texture: Option<Texture>,
}

impl Material {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [1.0, 1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
            emission: [0.0, 0.0, 0.0, 1.0],
            shininess: 50.0,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: Texture) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_diffuse(mut self, diffuse: [f32; 4]) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Diffuse color quantized to 8 bits per channel
    pub fn diffuse_rgb(&self) -> Rgb {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [
            quantize(self.diffuse[0]),
            quantize(self.diffuse[1]),
            quantize(self.diffuse[2]),
        ]
    }

    /// Color seen at a texture coordinate: the texture if any, else the diffuse color
    pub fn color_at(&self, uv: Option<TexCoord>) -> Rgb {
        match (&self.texture, uv) {
            (Some(texture), Some(uv)) => texture.sample(uv),
            _ => self.diffuse_rgb(),
        }
    }
}

/// Ordered collection of materials referenced by per-triangle indices
#[derive(Debug, Clone, Default)]
pub struct MaterialSet {
    materials: Vec<Material>,
}

impl MaterialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a material and return its index
    pub fn push(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// Index of the first material named `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Material> {
        self.materials.iter()
    }

    /// Number of materials carrying a texture image
    pub fn texture_count(&self) -> usize {
        self.materials.iter().filter(|m| m.has_texture()).count()
    }

    /// First textured material, if any
    pub fn first_textured(&self) -> Option<&Material> {
        self.materials.iter().find(|m| m.has_texture())
    }
}
