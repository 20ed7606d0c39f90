use crate::camera::Camera;
use crate::frame::FrameInputs;
use crate::geometry::{self, Mesh};
use crate::hud::HudCompositor;
use crate::pipeline::{self, Pipelines, SceneUniforms};
use crate::stages::{self, Layer, Stage, FRAME_STAGES};
use anyhow::{Context, Result};
use bytemuck::Pod;
use glam::Vec3;
use tbm_config::{AppConfig, MaterialConfig};
use wgpu::util::DeviceExt;

/// A mesh uploaded to the GPU as an indexed list.
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload<V: Pod>(device: &wgpu::Device, mesh: &Mesh<V>) -> Self {
        let indices = mesh.list_indices();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(mesh.name),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(mesh.name),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

/// Surface color of a scene stage. Axis lines carry per-vertex colors.
pub fn stage_color(stage: Stage, materials: &MaterialConfig) -> [f32; 3] {
    match stage {
        Stage::Body => materials.steel,
        Stage::BackCap | Stage::FrontCap => materials.cap,
        Stage::CutterRing => materials.cutter,
        Stage::Spokes => materials.spoke,
        Stage::AxisLines | Stage::Hud => [1.0, 1.0, 1.0],
    }
}

/// Clear color of the scene pass.
pub fn clear_color(materials: &MaterialConfig) -> wgpu::Color {
    let [r, g, b] = materials.clear.map(f64::from);
    wgpu::Color { r, g, b, a: 1.0 }
}

struct SceneMeshes {
    body: GpuMesh,
    back: GpuMesh,
    front: GpuMesh,
    ring: GpuMesh,
    spokes: GpuMesh,
    axis: GpuMesh,
}

impl SceneMeshes {
    fn get(&self, stage: Stage) -> Option<&GpuMesh> {
        match stage {
            Stage::Body => Some(&self.body),
            Stage::BackCap => Some(&self.back),
            Stage::FrontCap => Some(&self.front),
            Stage::CutterRing => Some(&self.ring),
            Stage::Spokes => Some(&self.spokes),
            Stage::AxisLines => Some(&self.axis),
            Stage::Hud => None,
        }
    }
}

/// Draws the cutter body and the HUD.
pub struct SceneRenderer {
    pipelines: Pipelines,
    meshes: SceneMeshes,
    hud: HudCompositor,
    camera: Camera,
    depth: wgpu::TextureView,
    materials: MaterialConfig,
    light: Vec3,
    frame_count: u64,
}

impl SceneRenderer {
    /// Build pipelines and upload all static geometry.
    ///
    /// Fails if the frame's draw order is inconsistent or a shader does not
    /// compile.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: &AppConfig,
    ) -> Result<Self> {
        stages::check_order(&FRAME_STAGES).context("Invalid frame stage order")?;
        let pipelines = Pipelines::new(device, color_format)?;

        let set = geometry::build(&config.geometry);
        let meshes = SceneMeshes {
            body: GpuMesh::upload(device, &set.body),
            back: GpuMesh::upload(device, &set.back),
            front: GpuMesh::upload(device, &set.front),
            ring: GpuMesh::upload(device, &set.ring),
            spokes: GpuMesh::upload(device, &set.spokes),
            axis: GpuMesh::upload(device, &set.axis),
        };
        tracing::debug!(
            segments = config.geometry.segments,
            body_indices = meshes.body.index_count,
            "Cutter geometry uploaded"
        );

        let hud = HudCompositor::new(device, queue, &pipelines, &config.hud, width, height);

        Ok(Self {
            pipelines,
            meshes,
            hud,
            camera: Camera::from_config(&config.camera, width, height),
            depth: pipeline::create_depth_texture(device, width, height),
            materials: config.materials.clone(),
            light: config.camera.light,
            frame_count: 0,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Follow a new surface size. Zero sizes are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.camera.set_viewport(width, height);
        self.depth = pipeline::create_depth_texture(device, width, height);
        self.hud.resize(queue, width, height);
    }

    /// Record and submit one frame into `target`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        frame: &FrameInputs,
    ) {
        let labels = self
            .hud
            .prepare(device, queue, &self.pipelines, &frame.readout);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(&self.materials)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let t = &frame.transforms;
            for stage in stages::in_layer(&FRAME_STAGES, Layer::Scene) {
                debug_assert!(stage.depth_tested(), "{} in the scene pass", stage.name());
                let Some(mesh) = self.meshes.get(stage) else {
                    continue;
                };
                let uniforms = SceneUniforms::new(
                    t.mvp,
                    t.model,
                    stage_color(stage, &self.materials),
                    self.light,
                    self.camera.eye,
                );
                let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(stage.name()),
                    contents: bytemuck::cast_slice(&[uniforms]),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let uniform_bind_group = self
                    .pipelines
                    .create_uniform_bind_group(device, &uniform_buffer);

                let pipeline = match stage {
                    Stage::AxisLines => &self.pipelines.line,
                    _ => &self.pipelines.mesh,
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &uniform_bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        // Overlay: drawn over the finished scene, no depth attachment.
        if stages::in_layer(&FRAME_STAGES, Layer::Overlay).any(|s| s == Stage::Hud) {
            debug_assert!(!Stage::Hud.depth_tested());
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("hud_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipelines.hud);
            self.hud.draw(&mut pass, device, &labels);
        }

        queue.submit(std::iter::once(encoder.finish()));
        // Per-frame label textures are released only after submission.
        drop(labels);

        self.frame_count += 1;
        if self.frame_count % 300 == 0 {
            tracing::debug!(
                frames = self.frame_count,
                roll = frame.sample.euler.roll,
                pitch = frame.sample.euler.pitch,
                yaw = frame.sample.euler.yaw,
                "Render heartbeat"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scene_stage_has_a_color() {
        let materials = MaterialConfig::default();
        assert_eq!(stage_color(Stage::Body, &materials), materials.steel);
        assert_eq!(stage_color(Stage::BackCap, &materials), materials.cap);
        assert_eq!(stage_color(Stage::FrontCap, &materials), materials.cap);
        assert_eq!(stage_color(Stage::CutterRing, &materials), materials.cutter);
        assert_eq!(stage_color(Stage::Spokes, &materials), materials.spoke);
    }

    #[test]
    fn clear_color_is_opaque() {
        let materials = MaterialConfig {
            clear: [0.5, 0.25, 0.0],
            ..MaterialConfig::default()
        };
        let c = clear_color(&materials);
        assert_eq!((c.r, c.g, c.b, c.a), (0.5, 0.25, 0.0, 1.0));
    }
}
