//! Integration tests for model loading.

use std::path::Path;

use glam::Vec3;
use renderer_resources::{Model, ResourceError};

/// Writes a single-triangle glTF with an external `.bin` buffer: three
/// positions, no normals, u16 indices, one material with roughness 0.25,
/// under a node translated by (0, 2, 0) and scaled by 2.
fn write_triangle_gltf(dir: &Path) -> std::path::PathBuf {
    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let indices: [u16; 3] = [0, 1, 2];

    let mut bin = Vec::new();
    for p in positions.iter().flatten() {
        bin.extend_from_slice(&p.to_le_bytes());
    }
    for i in indices {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
    std::fs::write(dir.join("triangle.bin"), &bin).unwrap();

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": [0] }} ],
  "nodes": [ {{ "mesh": 0, "translation": [0.0, 2.0, 0.0], "scale": [2.0, 2.0, 2.0] }} ],
  "meshes": [ {{ "name": "tri", "primitives": [ {{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }} ] }} ],
  "materials": [ {{ "pbrMetallicRoughness": {{ "baseColorFactor": [1.0, 0.5, 0.25, 1.0], "roughnessFactor": 0.25 }} }} ],
  "buffers": [ {{ "uri": "triangle.bin", "byteLength": {len} }} ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
        len = bin.len()
    );
    let path = dir.join("triangle.gltf");
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_load_generated_triangle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_triangle_gltf(dir.path());

    let model = Model::load(&path).expect("Failed to load glTF model");

    assert_eq!(model.meshes.len(), 1);
    let mesh = &model.meshes[0];
    assert_eq!(mesh.name, "tri#0");
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.normals.len(), 3);
    assert_eq!(mesh.tex_coords.len(), 3);
    assert_eq!(mesh.indices, vec![0, 1, 2]);
    assert_eq!(model.total_triangle_count(), 1);

    // Node transform is baked in.
    assert_eq!(mesh.positions[1], Vec3::new(2.0, 2.0, 0.0));
    assert_eq!(model.aabb_min, Vec3::new(0.0, 2.0, 0.0));
    assert_eq!(model.aabb_max, Vec3::new(2.0, 4.0, 0.0));
    assert_eq!(model.normalize_scale(), 0.5);

    // Generated normals point out of the counter-clockwise face.
    assert!((mesh.normals[0] - Vec3::Z).length() < 1e-5);

    let material = model.material_for(mesh);
    assert_eq!(material.base_color_factor.y, 0.5);
    assert!((material.specular - 0.75).abs() < 1e-6);
    assert!(material.base_color_texture.is_none());
}

#[test]
fn test_missing_file_is_reported() {
    let result = Model::load(Path::new("does/not/exist.gltf"));
    assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
}

#[test]
fn test_load_asset_model() {
    let model_path = Path::new("../../assets/models/scene.gltf");

    // CI environments may not ship the asset.
    if !model_path.exists() {
        println!("Skipping test: model file not found at {:?}", model_path);
        return;
    }

    let model = Model::load(model_path).expect("Failed to load glTF model");
    assert!(!model.meshes.is_empty());
    for mesh in &model.meshes {
        assert_eq!(mesh.normals.len(), mesh.positions.len());
        assert_eq!(mesh.tex_coords.len(), mesh.positions.len());
        assert!(!mesh.indices.is_empty());
    }
    assert!(model.normalize_scale() > 0.0);
}
