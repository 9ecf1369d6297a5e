//! Face-list geometry
//!
//! Geometry is authored as shared vertices plus triangular faces. Each face
//! carries its own normal, color and material index, and optionally per-corner
//! normals and colors. Buffer groups expand it into flat GPU arrays.

use crate::foundation::math::{Vec2, Vec3};
use crate::scene::{BoundingSphere, AABB};

/// Triangle referencing three vertices by index
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// First vertex index
    pub a: u32,
    /// Second vertex index
    pub b: u32,
    /// Third vertex index
    pub c: u32,
    /// Face normal, used for flat shading
    pub normal: Vec3,
    /// Per-corner normals, used for smooth shading
    pub vertex_normals: Option<[Vec3; 3]>,
    /// Face color
    pub color: Vec3,
    /// Per-corner colors
    pub vertex_colors: Option<[Vec3; 3]>,
    /// Index into a per-face material list
    pub material_index: u32,
}

impl Face {
    /// Create a white face with material index 0 and no normal yet
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        Self {
            a,
            b,
            c,
            normal: Vec3::zeros(),
            vertex_normals: None,
            color: Vec3::new(1.0, 1.0, 1.0),
            vertex_colors: None,
            material_index: 0,
        }
    }

    /// Set the material index
    pub fn with_material_index(mut self, material_index: u32) -> Self {
        self.material_index = material_index;
        self
    }

    /// Set the face color
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    /// Set per-corner colors
    pub fn with_vertex_colors(mut self, colors: [Vec3; 3]) -> Self {
        self.vertex_colors = Some(colors);
        self
    }

    /// Vertex indices in winding order
    pub fn indices(&self) -> [u32; 3] {
        [self.a, self.b, self.c]
    }
}

/// Vertices, faces and per-face UV layers
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// Shared vertex positions
    pub vertices: Vec<Vec3>,
    /// Triangles
    pub faces: Vec<Face>,
    /// First UV layer, one entry per face (empty when absent)
    pub uvs: Vec<[Vec2; 3]>,
    /// Second UV layer, one entry per face (empty when absent)
    pub uvs2: Vec<[Vec2; 3]>,
    bounding_sphere: Option<BoundingSphere>,
    bounding_box: Option<AABB>,
}

impl Geometry {
    /// Create geometry from vertices and faces
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Face>) -> Self {
        Self {
            vertices,
            faces,
            ..Self::default()
        }
    }

    /// Attach the first UV layer
    pub fn with_uvs(mut self, uvs: Vec<[Vec2; 3]>) -> Self {
        self.uvs = uvs;
        self
    }

    /// Attach the second UV layer
    pub fn with_uvs2(mut self, uvs2: Vec<[Vec2; 3]>) -> Self {
        self.uvs2 = uvs2;
        self
    }

    /// Position of a vertex, origin for out-of-range indices
    pub fn vertex(&self, index: u32) -> Vec3 {
        self.vertices.get(index as usize).copied().unwrap_or_else(Vec3::zeros)
    }

    /// Recompute every face normal from its winding
    pub fn compute_face_normals(&mut self) {
        for i in 0..self.faces.len() {
            let [a, b, c] = self.faces[i].indices().map(|index| self.vertex(index));
            let normal = (c - b).cross(&(a - b));
            self.faces[i].normal = normal.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros);
        }
    }

    /// Compute smooth per-corner normals by averaging the normals of faces sharing a vertex
    pub fn compute_vertex_normals(&mut self) {
        let mut accumulated = vec![Vec3::zeros(); self.vertices.len()];
        for face in &self.faces {
            let [a, b, c] = face.indices().map(|index| self.vertex(index));
            // Area-weighted by leaving the cross product unnormalized
            let normal = (c - b).cross(&(a - b));
            for index in face.indices() {
                if let Some(sum) = accumulated.get_mut(index as usize) {
                    *sum += normal;
                }
            }
        }

        let normalized: Vec<Vec3> = accumulated
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros))
            .collect();
        for face in &mut self.faces {
            face.vertex_normals = Some(face.indices().map(|index| {
                normalized.get(index as usize).copied().unwrap_or_else(Vec3::zeros)
            }));
        }
    }

    /// Compute and cache the bounding box
    pub fn compute_bounding_box(&mut self) -> Option<AABB> {
        self.bounding_box = AABB::from_points(&self.vertices);
        self.bounding_box
    }

    /// Compute and cache the bounding sphere
    pub fn compute_bounding_sphere(&mut self) -> Option<BoundingSphere> {
        self.bounding_sphere = BoundingSphere::from_points(&self.vertices);
        self.bounding_sphere
    }

    /// Cached bounding sphere, computed on first request
    pub fn bounding_sphere(&mut self) -> Option<BoundingSphere> {
        if self.bounding_sphere.is_none() {
            self.compute_bounding_sphere();
        }
        self.bounding_sphere
    }

    /// Cached bounding sphere without computing it
    pub fn cached_bounding_sphere(&self) -> Option<BoundingSphere> {
        self.bounding_sphere
    }

    /// Drop cached bounds after editing vertices
    pub fn invalidate_bounds(&mut self) {
        self.bounding_sphere = None;
        self.bounding_box = None;
    }
}
