use bytemuck::{Pod, Zeroable};
use std::f32::consts::TAU;
use tbm_config::GeometryConfig;

/// Lit vertex: position + normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // normal
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Unlit vertex: position + color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl ColorVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleStrip,
    TriangleFan,
    TriangleList,
    LineList,
}

/// A named mesh in object space.
#[derive(Debug, Clone)]
pub struct Mesh<V> {
    pub name: &'static str,
    pub vertices: Vec<V>,
    pub indices: Option<Vec<u32>>,
    pub topology: Topology,
}

impl<V> Mesh<V> {
    /// Indices that draw this mesh as a plain list (triangle or line).
    ///
    /// wgpu has no fans and a strip pipeline per mesh is not worth it, so
    /// strips and fans are unrolled here. Strip winding alternates per
    /// triangle to keep a consistent orientation.
    pub fn list_indices(&self) -> Vec<u32> {
        let n = self.vertices.len() as u32;
        match (self.topology, &self.indices) {
            (Topology::TriangleList | Topology::LineList, Some(indices)) => indices.clone(),
            (Topology::TriangleList | Topology::LineList, None) => (0..n).collect(),
            (Topology::TriangleStrip, _) => (0..n.saturating_sub(2))
                .flat_map(|i| {
                    if i % 2 == 0 {
                        [i, i + 1, i + 2]
                    } else {
                        [i + 1, i, i + 2]
                    }
                })
                .collect(),
            (Topology::TriangleFan, _) => (1..n.saturating_sub(1))
                .flat_map(|i| [0, i, i + 1])
                .collect(),
        }
    }
}

/// All static geometry of the cutter body.
pub struct MeshSet {
    pub body: Mesh<MeshVertex>,
    pub back: Mesh<MeshVertex>,
    pub front: Mesh<MeshVertex>,
    pub ring: Mesh<MeshVertex>,
    pub spokes: Mesh<MeshVertex>,
    pub axis: Mesh<ColorVertex>,
}

/// Angles of the spoke bars across the cutter face, in degrees.
const SPOKE_ANGLES: [f32; 4] = [0.0, 45.0, 90.0, 135.0];

/// Build the cutter body. The cylinder axis is Z, the cutter head faces +Z.
pub fn build(config: &GeometryConfig) -> MeshSet {
    let segments = config.segments.max(3);
    let r = config.radius;
    let half = config.length / 2.0;

    let body = Mesh {
        name: "body",
        vertices: ring_points(segments)
            .flat_map(|(c, s)| {
                let normal = [c, s, 0.0];
                [
                    MeshVertex {
                        position: [c * r, s * r, -half],
                        normal,
                    },
                    MeshVertex {
                        position: [c * r, s * r, half],
                        normal,
                    },
                ]
            })
            .collect(),
        indices: None,
        topology: Topology::TriangleStrip,
    };

    let back = cap("back", r, -half, -1.0, segments);
    let front = cap("front", r, half, 1.0, segments);

    let cr = r * config.ring_scale;
    let ring = Mesh {
        name: "ring",
        vertices: ring_points(segments)
            .flat_map(|(c, s)| {
                let normal = [c, s, 0.0];
                [
                    MeshVertex {
                        position: [c * cr, s * cr, half - config.ring_depth],
                        normal,
                    },
                    MeshVertex {
                        position: [c * cr, s * cr, half],
                        normal,
                    },
                ]
            })
            .collect(),
        indices: None,
        topology: Topology::TriangleStrip,
    };

    let spoke_r = r * config.spoke_radius_scale;
    let hw = config.spoke_half_width;
    let zf = half + config.spoke_z_offset;
    let mut spoke_vertices = Vec::with_capacity(SPOKE_ANGLES.len() * 4);
    let mut spoke_indices = Vec::with_capacity(SPOKE_ANGLES.len() * 6);
    for (k, deg) in SPOKE_ANGLES.iter().enumerate() {
        let (s, c) = deg.to_radians().sin_cos();
        let b = (k * 4) as u32;
        let corners = [
            [-c * spoke_r - s * hw, -s * spoke_r + c * hw],
            [-c * spoke_r + s * hw, -s * spoke_r - c * hw],
            [c * spoke_r - s * hw, s * spoke_r + c * hw],
            [c * spoke_r + s * hw, s * spoke_r - c * hw],
        ];
        spoke_vertices.extend(corners.iter().map(|&[x, y]| MeshVertex {
            position: [x, y, zf],
            normal: [0.0, 0.0, 1.0],
        }));
        spoke_indices.extend_from_slice(&[b, b + 1, b + 2, b + 1, b + 3, b + 2]);
    }
    let spokes = Mesh {
        name: "spokes",
        vertices: spoke_vertices,
        indices: Some(spoke_indices),
        topology: Topology::TriangleList,
    };

    let a = config.axis_scale;
    let axis = Mesh {
        name: "axis",
        vertices: [
            ([a, 0.0, 0.0], [1.0, 0.0, 0.0]),
            ([0.0, a, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, a], [0.0, 0.0, 1.0]),
        ]
        .into_iter()
        .flat_map(|(tip, color)| {
            [
                ColorVertex {
                    position: [0.0; 3],
                    color,
                },
                ColorVertex {
                    position: tip,
                    color,
                },
            ]
        })
        .collect(),
        indices: None,
        topology: Topology::LineList,
    };

    MeshSet {
        body,
        back,
        front,
        ring,
        spokes,
        axis,
    }
}

/// `(cos, sin)` of `segments + 1` evenly spaced angles; the last repeats the first.
fn ring_points(segments: u32) -> impl Iterator<Item = (f32, f32)> {
    (0..=segments).map(move |i| {
        let (s, c) = (TAU * i as f32 / segments as f32).sin_cos();
        (c, s)
    })
}

/// End cap as a fan: center first, then the perimeter.
fn cap(name: &'static str, r: f32, z: f32, nz: f32, segments: u32) -> Mesh<MeshVertex> {
    let normal = [0.0, 0.0, nz];
    let center = MeshVertex {
        position: [0.0, 0.0, z],
        normal,
    };
    let vertices = std::iter::once(center)
        .chain(ring_points(segments).map(|(c, s)| MeshVertex {
            position: [c * r, s * r, z],
            normal,
        }))
        .collect();
    Mesh {
        name,
        vertices,
        indices: None,
        topology: Topology::TriangleFan,
    }
}
