//! The wgpu implementation of the ball rendering pipeline.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use adi_core::{
    DisplayConfig, FrameInputs, InstrumentMesh, MeshHandle, RenderPipeline, FPS_WINDOW_FRAMES,
};
use anyhow::{Context, Result};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::capture::FrameCapture;
use crate::overlay::OverlayPipeline;
use crate::pipeline::{create_depth_texture, BallPipeline};
use crate::texture::{face_bind_group, FaceImage};

/// Size of the generated face texture: two texels per degree around the
/// pitch axis.
const FACE_WIDTH: u32 = 720;
const FACE_HEIGHT: u32 = 128;

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

const CLEAR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.02,
    a: 1.0,
};

/// A mesh resident on the GPU. One buffer holds every attribute region and
/// the index region.
struct GpuMesh {
    buffer: wgpu::Buffer,
    positions: std::ops::Range<u64>,
    normals: std::ops::Range<u64>,
    tex_coords: std::ops::Range<u64>,
    indexes: std::ops::Range<u64>,
    num_indexes: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, mesh: &InstrumentMesh) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ball Mesh Buffer"),
            contents: mesh.as_bytes(),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX,
        });
        let index_end = mesh.indexes_offset() + mesh.num_indexes() as u64 * 2;
        Self {
            buffer,
            positions: mesh.positions_offset()..mesh.normals_offset(),
            normals: mesh.normals_offset()..mesh.tex_coords_offset(),
            tex_coords: mesh.tex_coords_offset()..mesh.indexes_offset(),
            indexes: mesh.indexes_offset()..index_end,
            num_indexes: mesh.num_indexes(),
        }
    }
}

enum Target {
    Window {
        window: Arc<Window>,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        title: String,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        capture: FrameCapture,
        snapshot: Option<PathBuf>,
    },
}

pub struct BallRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,

    ball: BallPipeline,
    _face_texture: wgpu::Texture,
    face_bind_group: wgpu::BindGroup,
    overlay: OverlayPipeline,

    meshes: HashMap<MeshHandle, GpuMesh>,
    next_handle: u32,
    frames_presented: u64,
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'static>>,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .context("No suitable GPU adapters found")?;
    tracing::info!("Using adapter {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("ADI Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .context("request_device failed")?;

    Ok((adapter, device, queue))
}

fn load_face(display: &DisplayConfig) -> Result<FaceImage> {
    match &display.texture {
        Some(path) => FaceImage::load_png(path),
        None => Ok(FaceImage::procedural(FACE_WIDTH, FACE_HEIGHT)),
    }
}

fn fps_title(title: &str, fps: f32) -> String {
    format!("{} | {:.1} fps", title, fps)
}

impl BallRenderer {
    /// Render into `window`.
    pub async fn windowed(window: Arc<Window>, display: &DisplayConfig) -> Result<Self> {
        let size = window.inner_size();
        let face = load_face(display)?;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("create_surface failed")?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        tracing::info!("Configuring surface: {}x{} {:?}", config.width, config.height, format);
        surface.configure(&device, &config);

        let (width, height) = (config.width, config.height);
        let target = Target::Window {
            window,
            surface,
            config,
            title: display.title.clone(),
        };
        Ok(Self::assemble(device, queue, target, format, width, height, &face, display))
    }

    /// Render into a texture that is never shown. When `snapshot` is set the
    /// last frame is written there as a PNG on shutdown.
    pub async fn offscreen(
        width: u32,
        height: u32,
        display: &DisplayConfig,
        snapshot: Option<PathBuf>,
    ) -> Result<Self> {
        let face = load_face(display)?;
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let (_adapter, device, queue) = request_device(&instance, None).await?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let capture = FrameCapture::new(&device, width, height);
        tracing::info!("Offscreen target {}x{}", width, height);

        let target = Target::Offscreen {
            texture,
            view,
            capture,
            snapshot,
        };
        Ok(Self::assemble(device, queue, target, OFFSCREEN_FORMAT, width, height, &face, display))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target: Target,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        face: &FaceImage,
        display: &DisplayConfig,
    ) -> Self {
        let (depth_texture, depth_view) = create_depth_texture(&device, width, height);
        let ball = BallPipeline::new(&device, format);
        let (face_texture, face_view) = face.upload(&device, &queue);
        let face_bind_group = face_bind_group(&device, &ball.face_layout, &face_view);
        let overlay = OverlayPipeline::new(&device, format, display);

        Self {
            device,
            queue,
            target,
            depth_texture,
            depth_view,
            ball,
            _face_texture: face_texture,
            face_bind_group,
            overlay,
            meshes: HashMap::new(),
            next_handle: 1,
            frames_presented: 0,
        }
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        match &self.target {
            Target::Window { window, .. } => Some(window),
            Target::Offscreen { .. } => None,
        }
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Target::Window {
            surface, config, ..
        } = &mut self.target
        {
            tracing::debug!("Resizing to {}x{}", new_size.width, new_size.height);
            config.width = new_size.width;
            config.height = new_size.height;
            surface.configure(&self.device, config);

            let (depth_texture, depth_view) =
                create_depth_texture(&self.device, new_size.width, new_size.height);
            self.depth_texture = depth_texture;
            self.depth_view = depth_view;
        }
    }

    fn encode(&self, color: &wgpu::TextureView, mesh: &GpuMesh) -> wgpu::CommandBuffer {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Ball Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Ball Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.ball.pipeline);
            pass.set_bind_group(0, &self.ball.uniform_bind_group, &[]);
            pass.set_bind_group(1, &self.face_bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.buffer.slice(mesh.positions.clone()));
            pass.set_vertex_buffer(1, mesh.buffer.slice(mesh.normals.clone()));
            pass.set_vertex_buffer(2, mesh.buffer.slice(mesh.tex_coords.clone()));
            pass.set_index_buffer(
                mesh.buffer.slice(mesh.indexes.clone()),
                wgpu::IndexFormat::Uint16,
            );
            pass.draw_indexed(0..mesh.num_indexes, 0, 0..1);

            self.overlay.draw(&mut pass);
        }

        encoder.finish()
    }
}

impl RenderPipeline for BallRenderer {
    fn upload_mesh(&mut self, mesh: &InstrumentMesh) -> Result<MeshHandle> {
        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;
        self.meshes.insert(handle, GpuMesh::new(&self.device, mesh));
        tracing::debug!("Uploaded mesh {:?} ({} bytes)", handle, mesh.as_bytes().len());
        Ok(handle)
    }

    fn draw(&mut self, mesh: MeshHandle, frame: &FrameInputs) -> Result<()> {
        let gpu_mesh = self
            .meshes
            .get(&mesh)
            .with_context(|| format!("Unknown mesh {:?}", mesh))?;
        self.ball.write_uniforms(&self.queue, frame);

        match &self.target {
            Target::Window {
                window,
                surface,
                config,
                title,
            } => {
                if frame.frame % FPS_WINDOW_FRAMES == 0 {
                    window.set_title(&fps_title(title, frame.fps));
                }
                let output = match surface.get_current_texture() {
                    Ok(output) => output,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        tracing::debug!("Surface lost, reconfiguring");
                        surface.configure(&self.device, config);
                        return Ok(());
                    }
                    Err(e) => anyhow::bail!("Failed to acquire frame: {}", e),
                };
                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let commands = self.encode(&view, gpu_mesh);
                self.queue.submit(Some(commands));
                output.present();
            }
            Target::Offscreen { view, .. } => {
                let commands = self.encode(view, gpu_mesh);
                self.queue.submit(Some(commands));
            }
        }

        self.frames_presented += 1;
        Ok(())
    }

    fn release_mesh(&mut self, mesh: MeshHandle) -> Result<()> {
        let gpu_mesh = self
            .meshes
            .remove(&mesh)
            .with_context(|| format!("Unknown mesh {:?}", mesh))?;
        gpu_mesh.buffer.destroy();
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        for (_, mesh) in self.meshes.drain() {
            mesh.buffer.destroy();
        }
        self.device.poll(wgpu::Maintain::Wait);
        tracing::info!("Renderer stopped after {} frames", self.frames_presented);

        if let Target::Offscreen {
            texture,
            capture,
            snapshot: Some(path),
            ..
        } = &self.target
        {
            let rgba = capture.read(&self.device, &self.queue, texture)?;
            capture.save_png(rgba, path)?;
        }
        Ok(())
    }
}
