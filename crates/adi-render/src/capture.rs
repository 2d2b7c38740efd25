//! Readback of an offscreen frame into CPU memory.

use std::path::Path;

use anyhow::{Context, Result};

/// Row pitch for a texture-to-buffer copy of `width` RGBA8 texels.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Drop the row padding from a mapped readback buffer.
pub fn strip_row_padding(data: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<u8> {
    let row = (width * 4) as usize;
    let mut rgba = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * padded_row as usize;
        rgba.extend_from_slice(&data[start..start + row]);
    }
    rgba
}

pub struct FrameCapture {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    bytes_per_row: u32,
}

impl FrameCapture {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let bytes_per_row = padded_bytes_per_row(width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Staging Buffer"),
            size: (bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            width,
            height,
            bytes_per_row,
        }
    }

    /// Copy `source` to the CPU. Blocks until the GPU is done.
    pub fn read(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        source: &wgpu::Texture,
    ) -> Result<Vec<u8>> {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Capture Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: source,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = self.buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("Readback callback dropped")?
            .context("Failed to map readback buffer")?;

        let rgba = {
            let data = slice.get_mapped_range();
            strip_row_padding(&data, self.width, self.height, self.bytes_per_row)
        };
        self.buffer.unmap();
        Ok(rgba)
    }

    pub fn save_png(&self, rgba: Vec<u8>, path: &Path) -> Result<()> {
        let img = image::RgbaImage::from_raw(self.width, self.height, rgba)
            .context("Captured frame has the wrong size")?;
        img.save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Saved frame to {}", path.display());
        Ok(())
    }
}
