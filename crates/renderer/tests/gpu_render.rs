//! End-to-end frames on a real GPU.
//!
//! Skipped (with a message) when no Vulkan device is available or the
//! SPIR-V has not been compiled with `shaders/compile.sh`.

use std::path::PathBuf;

use glam::{Vec2, Vec3};

use renderer_renderer::export::f16_to_f32;
use renderer_renderer::programs::required_shader_files;
use renderer_renderer::{
    DeferredRenderer, GBufferChannel, GpuContext, RenderTarget, RendererConfig,
};
use renderer_resources::{Mesh, Model};
use renderer_scene::{Camera, DrawMode, SceneObject, Transform};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shaders/spirv")
}

/// A 10x10 wall at z = -2 facing +Z, white, no texture.
fn wall_model() -> Model {
    let positions = vec![
        Vec3::new(-5.0, -5.0, -2.0),
        Vec3::new(5.0, -5.0, -2.0),
        Vec3::new(5.0, 5.0, -2.0),
        Vec3::new(-5.0, 5.0, -2.0),
    ];
    Model {
        meshes: vec![Mesh {
            name: "wall".into(),
            positions,
            normals: vec![Vec3::Z; 4],
            tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
            indices: vec![0, 1, 2, 0, 2, 3],
            material: None,
        }],
        aabb_min: Vec3::new(-5.0, -5.0, -2.0),
        aabb_max: Vec3::new(5.0, 5.0, -2.0),
        ..Default::default()
    }
}

fn setup() -> Option<DeferredRenderer> {
    let dir = shader_dir();
    if let Some(missing) = required_shader_files()
        .into_iter()
        .find(|file| !dir.join(file).exists())
    {
        eprintln!("Skipping GPU test: {} not compiled", missing);
        return None;
    }

    let context = match GpuContext::headless(false) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Skipping GPU test: {}", e);
            return None;
        }
    };

    let config = RendererConfig {
        shader_dir: dir,
        light_count: 10,
        light_seed: 42,
        near: 0.1,
        far: 30.0,
        ..Default::default()
    };
    Some(DeferredRenderer::new(context, WIDTH, HEIGHT, &config).expect("renderer init"))
}

fn camera() -> Camera {
    Camera::perspective(
        Vec3::new(0.0, 0.0, 5.0),
        60f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
        0.1,
        30.0,
    )
}

fn center_offset(texel: usize) -> usize {
    ((HEIGHT / 2 * WIDTH + WIDTH / 2) as usize) * texel
}

#[test]
fn test_composite_frame_is_lit() {
    let Some(mut renderer) = setup() else {
        return;
    };
    let id = renderer.add_model(&wall_model()).unwrap();
    assert_eq!(renderer.model_count(), 1);
    assert_eq!(renderer.model(id).map(|m| m.mesh_count()), Some(1));
    let scene = [SceneObject::new(id, Transform::new())];

    let plan = renderer.render(0.0, &scene, &camera()).unwrap();
    assert_eq!(plan.mode, DrawMode::CompositeLit);
    assert_eq!(plan.final_target(), RenderTarget::Default);
    assert_eq!(plan.draw_count(), 1);

    let frame = renderer.read_frame().unwrap();
    assert_eq!(frame.len(), (WIDTH * HEIGHT * 4) as usize);
    assert!(frame.chunks_exact(4).any(|px| px[..3] != [0, 0, 0]));
}

#[test]
fn test_gbuffer_holds_wall() {
    let Some(mut renderer) = setup() else {
        return;
    };
    let id = renderer.add_model(&wall_model()).unwrap();
    let scene = [SceneObject::new(id, Transform::new())];
    renderer.render(0.0, &scene, &camera()).unwrap();

    let layout = renderer.gbuffer().layout();
    assert_eq!((layout.width, layout.height), (WIDTH, HEIGHT));

    let position = renderer.read_gbuffer(GBufferChannel::Position).unwrap();
    assert_eq!(position.len(), layout.readback_size(GBufferChannel::Position));
    let at = center_offset(8);
    let z = f16_to_f32(u16::from_le_bytes([position[at + 4], position[at + 5]]));
    assert!((z + 2.0).abs() < 0.01, "z = {}", z);

    let normal = renderer.read_gbuffer(GBufferChannel::Normal).unwrap();
    let nz = f16_to_f32(u16::from_le_bytes([normal[at + 4], normal[at + 5]]));
    assert!((nz - 1.0).abs() < 0.01, "normal z = {}", nz);

    let depth = renderer.read_gbuffer(GBufferChannel::Depth).unwrap();
    let at = center_offset(4);
    let d = f32::from_le_bytes([depth[at], depth[at + 1], depth[at + 2], depth[at + 3]]);
    assert!(d > 0.0 && d < 1.0, "depth = {}", d);
}

#[test]
fn test_every_mode_renders() {
    let Some(mut renderer) = setup() else {
        return;
    };
    let id = renderer.add_model(&wall_model()).unwrap();
    let scene = [SceneObject::new(id, Transform::new())];

    for mode in DrawMode::ALL {
        renderer.set_draw_mode(mode);
        let plan = renderer.render(0.0, &scene, &camera()).unwrap();
        assert_eq!(plan.mode, mode);
        assert_eq!(plan.has_light_volumes(), mode == DrawMode::CompositeLit);
    }
    assert_eq!(renderer.frames_completed(), DrawMode::ALL.len() as u64);
}

#[test]
fn test_export_writes_six_files() {
    let Some(mut renderer) = setup() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();

    let id = renderer.add_model(&wall_model()).unwrap();
    let scene = [SceneObject::new(id, Transform::new())];

    assert!(renderer.export_snapshot(WIDTH, HEIGHT, dir.path()).is_err());
    renderer.render(0.0, &scene, &camera()).unwrap();
    assert!(renderer.export_snapshot(WIDTH / 2, HEIGHT, dir.path()).is_err());

    let report = renderer.export_snapshot(WIDTH, HEIGHT, dir.path()).unwrap();
    assert_eq!(report.files.len(), 6);
    assert!(report.files.iter().all(|f| f.exists()));
}
