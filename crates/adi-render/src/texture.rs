//! Ball face texture: loaded from a PNG or generated.
//!
//! Texture `u` runs around the pitch axis and `v` across the latitude band.
//! At level flight the camera sees `u = 0.5`, which is where the horizon
//! sits; the sky half is `u > 0.5`.

use std::path::Path;

use anyhow::{Context, Result};

const SKY: [u8; 4] = [52, 120, 190, 255];
const GROUND: [u8; 4] = [120, 78, 40, 255];
const MARK: [u8; 4] = [240, 240, 240, 255];

/// Degrees of pitch between ladder marks.
pub const LADDER_STEP_DEG: f32 = 10.0;

/// RGBA8 pixels, row-major, `v` down the rows.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl FaceImage {
    pub fn load_png(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("Failed to load ball texture {}", path.display()))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        tracing::info!("Ball texture {} ({}x{})", path.display(), width, height);
        Ok(Self {
            width,
            height,
            rgba: img.into_raw(),
        })
    }

    /// Sky and ground halves with a horizon line and pitch ladder marks.
    pub fn procedural(width: u32, height: u32) -> Self {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        // widths in texels around the circle
        let mark_half_width = 0.75 / width as f32;
        let horizon_half_width = 1.75 / width as f32;
        let step = LADDER_STEP_DEG / 360.0;

        for y in 0..height {
            let v = (y as f32 + 0.5) / height as f32;
            let across = (v - 0.5).abs();
            for x in 0..width {
                let u = (x as f32 + 0.5) / width as f32;
                let from_horizon = u - 0.5;

                let rungs = from_horizon / step;
                let to_rung = (rungs - rungs.round()).abs() * step;
                let rung = rungs.round().abs() as u32;

                let texel = if from_horizon.abs() <= horizon_half_width {
                    MARK
                } else if rung > 0 && to_rung <= mark_half_width && across <= rung_half_length(rung) {
                    MARK
                } else if from_horizon > 0.0 {
                    SKY
                } else {
                    GROUND
                };
                rgba.extend_from_slice(&texel);
            }
        }

        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> (wgpu::Texture, wgpu::TextureView) {
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Ball Face Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }
}

/// Half-length of a ladder rung, as a fraction of the band; the 30, 60 and
/// 90 degree rungs run longer.
fn rung_half_length(rung: u32) -> f32 {
    if rung % 3 == 0 {
        0.25
    } else {
        0.12
    }
}

/// Bind group for the face texture with a sampler that repeats around the
/// pitch axis.
pub fn face_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
) -> wgpu::BindGroup {
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Ball Face Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Ball Face Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    })
}
