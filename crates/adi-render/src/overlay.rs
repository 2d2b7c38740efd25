//! Fixed reference symbol drawn over the ball.
//!
//! The ball moves; the symbol doesn't. Its wings mark the level line the
//! pitch ladder is read against. Geometry is laid out in display inches and
//! converted to clip space once.

use adi_core::DisplayConfig;
use wgpu::util::DeviceExt;

/// Inner and outer ends of each wing, inches from centre
const WING_INNER: f32 = 0.35;
const WING_OUTER: f32 = 1.0;
/// Downward tick at the inner end of each wing
const WING_TICK: f32 = 0.12;
/// Half-size of the centre marker
const CENTRE: f32 = 0.04;

/// Line-list endpoints in clip space.
pub fn reference_lines(display: &DisplayConfig) -> Vec<[f32; 2]> {
    let sx = 2.0 / display.width_in;
    let sy = 2.0 / display.height_in;
    let p = |x: f32, y: f32| [x * sx, y * sy];

    let mut lines = Vec::with_capacity(16);
    for side in [-1.0f32, 1.0] {
        lines.push(p(side * WING_OUTER, 0.0));
        lines.push(p(side * WING_INNER, 0.0));
        lines.push(p(side * WING_INNER, 0.0));
        lines.push(p(side * WING_INNER, -WING_TICK));
    }
    let corners = [
        (-CENTRE, -CENTRE),
        (CENTRE, -CENTRE),
        (CENTRE, CENTRE),
        (-CENTRE, CENTRE),
    ];
    for i in 0..corners.len() {
        let (ax, ay) = corners[i];
        let (bx, by) = corners[(i + 1) % corners.len()];
        lines.push(p(ax, ay));
        lines.push(p(bx, by));
    }
    lines
}

pub struct OverlayPipeline {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
}

impl OverlayPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        display: &DisplayConfig,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/overlay.wgsl"));

        let lines = reference_lines(display);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overlay Vertex Buffer"),
            contents: bytemuck::cast_slice(&lines),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overlay Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Overlay Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            // always on top of the ball
            depth_stencil: Some(wgpu::DepthStencilState {
                format: crate::pipeline::DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex_buffer,
            vertex_count: lines.len() as u32,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..self.vertex_count, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_pairs_inside_clip_space() {
        let lines = reference_lines(&DisplayConfig::default());
        assert_eq!(lines.len() % 2, 0);
        for [x, y] in &lines {
            assert!(x.abs() <= 1.0 && y.abs() <= 1.0);
        }
    }

    #[test]
    fn test_wings_sit_on_level_line() {
        let display = DisplayConfig::default();
        let lines = reference_lines(&display);
        // first segment is the left wing
        assert_eq!(lines[0], [-WING_OUTER * 2.0 / display.width_in, 0.0]);
        assert_eq!(lines[1][1], 0.0);
        // symmetric about the vertical axis
        assert_eq!(lines[4][0], -lines[0][0]);
    }
}
