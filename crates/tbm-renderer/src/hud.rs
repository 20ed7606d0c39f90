//! Text labels drawn as alpha-blended screen-space quads.
//!
//! Static labels (title, hint) are rasterized once and live as long as the
//! compositor. Dynamic labels (roll / pitch / yaw) are rasterized every
//! frame into a [`FrameLabels`] that the caller drops once the frame is
//! submitted.

use crate::frame::HudReadout;
use crate::math;
use crate::pipeline::{HudUniforms, Pipelines};
use ab_glyph::{point, Font, FontArc, Glyph, ScaleFont};
use bytemuck::{Pod, Zeroable};
use tbm_config::HudConfig;
use thiserror::Error;
use wgpu::util::DeviceExt;

#[derive(Debug, Error)]
pub enum HudError {
    #[error("Label text is empty")]
    EmptyText,
    #[error("Label {0:?} has no visible pixels")]
    ZeroSize(String),
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct HudVertex {
    /// Screen pixels, origin bottom-left.
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl HudVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 1, 3, 2];

/// Quad covering `(x, y)..(x + w, y + h)` in bottom-left-origin pixels.
///
/// Texture rows run top-down, so the top edge samples `v = 0`.
pub fn quad_vertices(x: f32, y: f32, w: f32, h: f32) -> [HudVertex; 4] {
    [
        HudVertex {
            position: [x, y],
            uv: [0.0, 1.0],
        },
        HudVertex {
            position: [x + w, y],
            uv: [1.0, 1.0],
        },
        HudVertex {
            position: [x, y + h],
            uv: [0.0, 0.0],
        },
        HudVertex {
            position: [x + w, y + h],
            uv: [1.0, 0.0],
        },
    ]
}

/// RGBA8 image of a label, rows top-down.
#[derive(Debug, Clone)]
pub struct Rasterized {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Render `text` at `px_size` pixels in a solid sRGB color with coverage in alpha.
pub fn rasterize(
    text: &str,
    font: &FontArc,
    px_size: f32,
    color: [u8; 3],
) -> Result<Rasterized, HudError> {
    if text.trim().is_empty() {
        return Err(HudError::EmptyText);
    }

    let scaled = font.as_scaled(px_size);
    let mut glyphs: Vec<Glyph> = Vec::with_capacity(text.len());
    let mut caret = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(px_size, point(caret, scaled.ascent())));
        caret += scaled.h_advance(id);
        previous = Some(id);
    }

    let width = caret.ceil() as u32;
    let height = (scaled.ascent() - scaled.descent()).ceil() as u32;
    if width == 0 || height == 0 {
        return Err(HudError::ZeroSize(text.to_string()));
    }

    // Color everywhere, coverage in alpha: no dark fringes under filtering.
    let [r, g, b] = color;
    let mut pixels: Vec<u8> = std::iter::repeat([r, g, b, 0])
        .take((width * height) as usize)
        .flatten()
        .collect();

    for glyph in glyphs {
        let Some(outline) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outline.px_bounds();
        outline.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i32 + gx as i32;
            let y = bounds.min.y as i32 + gy as i32;
            if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                return;
            }
            let alpha = &mut pixels[(y as usize * width as usize + x as usize) * 4 + 3];
            *alpha = (*alpha).max((coverage.clamp(0.0, 1.0) * 255.0).round() as u8);
        });
    }

    Ok(Rasterized {
        pixels,
        width,
        height,
    })
}

/// DejaVu Sans Mono Bold, embedded so the HUD never depends on system fonts.
const BUNDLED_FONT: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSansMono-Bold.ttf");

pub fn bundled_font() -> Option<FontArc> {
    FontArc::try_from_slice(BUNDLED_FONT).ok()
}

/// Load the HUD font from `path`, falling back to the bundled font.
pub fn load_font(path: Option<&str>) -> Option<FontArc> {
    if let Some(path) = path {
        match std::fs::read(path).map(FontArc::try_from_vec) {
            Ok(Ok(font)) => {
                tracing::info!(path, "Loaded HUD font");
                return Some(font);
            }
            Ok(Err(e)) => tracing::warn!(path, %e, "Configured HUD font invalid, using bundled font"),
            Err(e) => tracing::warn!(path, ?e, "Configured HUD font unreadable, using bundled font"),
        }
    }
    bundled_font()
}

/// A label uploaded to the GPU. The texture is destroyed on drop.
pub struct LabelTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    pub width: u32,
    pub height: u32,
}

impl LabelTexture {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &Pipelines,
        image: &Rasterized,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("label_texture"),
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
            &image.pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        let view = texture.create_view(&Default::default());
        let bind_group = pipelines.create_texture_bind_group(device, &view);

        Self {
            texture,
            bind_group,
            width: image.width,
            height: image.height,
        }
    }
}

impl Drop for LabelTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

/// Dynamic labels of one frame, positioned and ready to draw.
///
/// Dropping this releases every texture it holds; keep it alive until the
/// frame's command buffer is submitted.
#[derive(Default)]
pub struct FrameLabels {
    labels: Vec<(LabelTexture, [f32; 2])>,
}

/// Origin of the title label: centered, 8 px below the top edge.
pub fn title_origin(surface: (u32, u32), label: (u32, u32)) -> [f32; 2] {
    let (sw, sh) = surface;
    let (w, h) = label;
    [(sw / 2) as f32 - (w / 2) as f32, sh as f32 - h as f32 - 8.0]
}

/// Origin of readout line `index`, stacked under the title at 36 px spacing.
pub fn readout_origin(surface_height: u32, title_height: u32, index: usize) -> [f32; 2] {
    let y = surface_height as f32 - title_height as f32 - 22.0 - (index as f32 + 1.0) * 36.0;
    [12.0, y]
}

/// Origin of the hint label: bottom-left corner.
pub const HINT_ORIGIN: [f32; 2] = [12.0, 8.0];

/// Rasterizes and draws the HUD.
pub struct HudCompositor {
    config: HudConfig,
    font: Option<FontArc>,
    title: Option<LabelTexture>,
    hint: Option<LabelTexture>,
    surface: (u32, u32),
    ortho_buffer: wgpu::Buffer,
    ortho_bind_group: wgpu::BindGroup,
    index_buffer: wgpu::Buffer,
}

impl HudCompositor {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &Pipelines,
        config: &HudConfig,
        width: u32,
        height: u32,
    ) -> Self {
        let font = load_font(config.font_path.as_deref());
        if font.is_none() {
            tracing::warn!("No HUD font found, labels disabled");
        }

        let ortho_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("hud_uniform_buffer"),
            contents: bytemuck::cast_slice(&[HudUniforms::new(hud_projection(width, height))]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let ortho_bind_group = pipelines.create_uniform_bind_group(device, &ortho_buffer);
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("hud_index_buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let mut compositor = Self {
            config: config.clone(),
            font,
            title: None,
            hint: None,
            surface: (width, height),
            ortho_buffer,
            ortho_bind_group,
            index_buffer,
        };
        compositor.title = compositor.label(
            device,
            queue,
            pipelines,
            &config.title,
            config.title_px,
            config.title_color,
        );
        compositor.hint = compositor.label(
            device,
            queue,
            pipelines,
            &config.hint,
            config.hint_px,
            config.hint_color,
        );
        compositor
    }

    /// Track a new surface size.
    pub fn resize(&mut self, queue: &wgpu::Queue, width: u32, height: u32) {
        self.surface = (width, height);
        queue.write_buffer(
            &self.ortho_buffer,
            0,
            bytemuck::cast_slice(&[HudUniforms::new(hud_projection(width, height))]),
        );
    }

    /// Rasterize and upload this frame's readouts.
    pub fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &Pipelines,
        readout: &HudReadout,
    ) -> FrameLabels {
        let title_height = self
            .title
            .as_ref()
            .map_or(self.config.title_px.ceil() as u32, |t| t.height);
        let colors = [
            self.config.roll_color,
            self.config.pitch_color,
            self.config.yaw_color,
        ];

        let labels = readout
            .lines()
            .into_iter()
            .zip(colors)
            .enumerate()
            .filter_map(|(i, (text, color))| {
                let texture =
                    self.label(device, queue, pipelines, text, self.config.value_px, color)?;
                Some((texture, readout_origin(self.surface.1, title_height, i)))
            })
            .collect();
        FrameLabels { labels }
    }

    /// Draw the static labels and `frame`'s readouts into an overlay pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, device: &wgpu::Device, frame: &FrameLabels) {
        pass.set_bind_group(0, &self.ortho_bind_group, &[]);
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

        if let Some(title) = &self.title {
            let origin = title_origin(self.surface, (title.width, title.height));
            draw_quad(pass, device, title, origin);
        }
        for (label, origin) in &frame.labels {
            draw_quad(pass, device, label, *origin);
        }
        if let Some(hint) = &self.hint {
            draw_quad(pass, device, hint, HINT_ORIGIN);
        }
    }

    /// Rasterize and upload one label. Failures skip the label.
    fn label(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &Pipelines,
        text: &str,
        px_size: f32,
        color: [u8; 3],
    ) -> Option<LabelTexture> {
        let font = self.font.as_ref()?;
        match rasterize(text, font, px_size, color) {
            Ok(image) => Some(LabelTexture::upload(device, queue, pipelines, &image)),
            Err(e) => {
                tracing::debug!(?e, "Skipping HUD label");
                None
            }
        }
    }
}

fn hud_projection(width: u32, height: u32) -> glam::Mat4 {
    math::orthographic(0.0, width.max(1) as f32, 0.0, height.max(1) as f32)
}

/// Draw `label` with its bottom-left corner at `origin`. Expects the HUD
/// pipeline, ortho bind group and quad index buffer to be bound.
fn draw_quad(
    pass: &mut wgpu::RenderPass<'_>,
    device: &wgpu::Device,
    label: &LabelTexture,
    origin: [f32; 2],
) {
    let [x, y] = origin;
    let vertices = quad_vertices(x, y, label.width as f32, label.height as f32);
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("hud_quad_buffer"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    pass.set_bind_group(1, &label.bind_group, &[]);
    pass.set_vertex_buffer(0, vertex_buffer.slice(..));
    pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_spans_rect_with_top_row_at_v0() {
        let q = quad_vertices(12.0, 8.0, 100.0, 20.0);
        assert_eq!(q[0].position, [12.0, 8.0]);
        assert_eq!(q[3].position, [112.0, 28.0]);
        // Top edge (larger y) samples the first texture row.
        assert_eq!(q[2].uv, [0.0, 0.0]);
        assert_eq!(q[0].uv, [0.0, 1.0]);
    }

    #[test]
    fn quad_indices_cover_two_triangles() {
        let q = quad_vertices(0.0, 0.0, 1.0, 1.0);
        let area: f32 = QUAD_INDICES
            .chunks(3)
            .map(|t| {
                let [a, b, c] = [t[0], t[1], t[2]].map(|i| q[i as usize].position);
                ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs() / 2.0
            })
            .sum();
        assert!((area - 1.0).abs() < 1e-6);
    }

    #[test]
    fn layout_matches_screen_corners() {
        assert_eq!(title_origin((900, 660), (400, 28)), [250.0, 624.0]);
        assert_eq!(readout_origin(660, 28, 0), [12.0, 574.0]);
        assert_eq!(readout_origin(660, 28, 2), [12.0, 502.0]);
        assert_eq!(HINT_ORIGIN, [12.0, 8.0]);
    }

    #[test]
    fn rasterize_fills_alpha_only_inside_glyphs() {
        let font = bundled_font().unwrap();
        let image = rasterize("Yaw +90.0", &font, 22.0, [80, 190, 255]).unwrap();
        assert!(image.width > 0 && image.height > 0);
        assert_eq!(image.pixels.len(), (image.width * image.height * 4) as usize);
        assert!(image.pixels.chunks(4).all(|p| p[..3] == [80, 190, 255]));
        assert!(image.pixels.chunks(4).any(|p| p[3] > 0));
        assert!(image.pixels.chunks(4).any(|p| p[3] == 0));
    }

    #[test]
    fn empty_text_is_rejected() {
        let font = bundled_font().unwrap();
        assert!(matches!(
            rasterize("   ", &font, 22.0, [255, 255, 255]),
            Err(HudError::EmptyText)
        ));
    }

    #[test]
    fn longer_text_is_wider() {
        let font = bundled_font().unwrap();
        let short = rasterize("Roll", &font, 22.0, [255, 255, 255]).unwrap();
        let long = rasterize("Roll   +12.5", &font, 22.0, [255, 255, 255]).unwrap();
        assert!(long.width > short.width);
        assert_eq!(long.height, short.height);
    }

    #[test]
    fn unreadable_font_path_falls_back_to_bundled() {
        let font = load_font(Some("/nonexistent/tbm-hud-font.ttf")).unwrap();
        assert!(rasterize("Pitch", &font, 15.0, [150, 150, 150]).is_ok());
    }
}
