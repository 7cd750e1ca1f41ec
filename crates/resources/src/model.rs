//! Model and mesh loading from glTF files.
//!
//! Every triangle primitive reachable from the default scene becomes one
//! [`Mesh`] with its node's world transform baked in, so a model is drawn
//! with a single model matrix. The bounding box is accumulated over the
//! transformed positions and gives the model's normalization scale.

use std::path::Path;

use glam::{Mat3, Mat4, Vec2, Vec3};
use tracing::{debug, info, warn};

use crate::error::{ResourceError, ResourceResult};
use crate::material::{Material, TextureData};

#[derive(Debug, Default, Clone)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub indices: Vec<u32>,
    /// Index into [`Model::materials`].
    pub material: Option<usize>,
}

impl Mesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Default, Clone)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<TextureData>,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
}

impl Model {
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let (document, buffers, images) =
            gltf::import(path).map_err(|source| ResourceError::GltfLoad {
                path: path.to_path_buf(),
                source,
            })?;

        let model = Self::from_gltf(path, &document, &buffers, &images)?;
        info!(
            "Loaded {:?}: {} meshes, {} vertices, {} triangles, {} textures",
            path,
            model.meshes.len(),
            model.total_vertex_count(),
            model.total_triangle_count(),
            model.textures.len()
        );
        Ok(model)
    }

    pub fn from_gltf(
        path: &Path,
        document: &gltf::Document,
        buffers: &[gltf::buffer::Data],
        images: &[gltf::image::Data],
    ) -> ResourceResult<Self> {
        let textures = images
            .iter()
            .enumerate()
            .map(|(index, data)| TextureData::from_gltf(index, data))
            .collect::<ResourceResult<Vec<_>>>()?;
        let materials = document.materials().map(|m| Material::from_gltf(&m)).collect();

        let mut meshes = Vec::new();
        let roots: Vec<gltf::Node<'_>> = match document
            .default_scene()
            .or_else(|| document.scenes().next())
        {
            Some(scene) => scene.nodes().collect(),
            None => Vec::new(),
        };

        if roots.is_empty() {
            // No scene graph: take every mesh untransformed.
            for mesh in document.meshes() {
                read_mesh(&mesh, Mat4::IDENTITY, buffers, &mut meshes)?;
            }
        } else {
            for node in roots {
                visit_node(&node, Mat4::IDENTITY, buffers, &mut meshes)?;
            }
        }

        if meshes.is_empty() {
            return Err(ResourceError::NoMeshes(path.to_path_buf()));
        }

        let (aabb_min, aabb_max) = bounding_box(&meshes);
        Ok(Self {
            meshes,
            materials,
            textures,
            aabb_min,
            aabb_max,
        })
    }

    pub fn total_vertex_count(&self) -> usize {
        self.meshes.iter().map(Mesh::vertex_count).sum()
    }

    pub fn total_triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.aabb_max - self.aabb_min
    }

    /// `1 / largest bounding-box extent`, so the model fits a unit cube.
    /// Degenerate boxes scale by 1.
    pub fn normalize_scale(&self) -> f32 {
        let largest = self.extent().max_element();
        if largest > f32::EPSILON {
            1.0 / largest
        } else {
            1.0
        }
    }

    /// Material for `mesh`, or the default when it has none.
    pub fn material_for(&self, mesh: &Mesh) -> Material {
        mesh.material
            .and_then(|index| self.materials.get(index))
            .cloned()
            .unwrap_or_default()
    }
}

fn visit_node(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    meshes: &mut Vec<Mesh>,
) -> ResourceResult<()> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        read_mesh(&mesh, world, buffers, meshes)?;
    }
    for child in node.children() {
        visit_node(&child, world, buffers, meshes)?;
    }
    Ok(())
}

fn read_mesh(
    mesh: &gltf::Mesh<'_>,
    world: Mat4,
    buffers: &[gltf::buffer::Data],
    meshes: &mut Vec<Mesh>,
) -> ResourceResult<()> {
    let mesh_name = mesh
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh{}", mesh.index()));
    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();

    for primitive in mesh.primitives() {
        let name = format!("{}#{}", mesh_name, primitive.index());
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!("Skipping {}: mode {:?} is not a triangle list", name, primitive.mode());
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or_else(|| ResourceError::NoPositionData(name.clone()))?
            .map(|p| world.transform_point3(Vec3::from_array(p)))
            .collect();

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(normals) => normals
                .map(|n| (normal_matrix * Vec3::from_array(n)).normalize_or_zero())
                .collect(),
            None => {
                debug!("{} has no normals, generating smooth normals", name);
                generate_normals(&positions, &indices)
            }
        };

        let tex_coords: Vec<Vec2> = match reader.read_tex_coords(0) {
            Some(coords) => coords.into_f32().map(Vec2::from_array).collect(),
            None => vec![Vec2::ZERO; positions.len()],
        };

        meshes.push(Mesh {
            name,
            positions,
            normals,
            tex_coords,
            indices,
            material: primitive.material().index(),
        });
    }
    Ok(())
}

/// Area-weighted vertex normals accumulated from the triangle list.
pub fn generate_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals.iter().map(|n| n.normalize_or_zero()).collect()
}

fn bounding_box(meshes: &[Mesh]) -> (Vec3, Vec3) {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for p in meshes.iter().flat_map(|m| m.positions.iter()) {
        min = min.min(*p);
        max = max.max(*p);
    }
    if min.x > max.x {
        (Vec3::ZERO, Vec3::ZERO)
    } else {
        (min, max)
    }
}
