//! Headless scene demo
//!
//! Builds a grid of spinning panels under one pivot, renders it through a
//! scene + bloom + copy post-processing chain against the recording backend
//! and logs per-frame statistics.
//!
//! Usage: `scene_demo [config.toml|config.ron]`

use std::f32::consts::TAU;
use std::sync::Arc;

use scene_render::foundation::logging;
use scene_render::prelude::*;

const GRID: i32 = 6;
const FRAMES: u32 = 5;

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] scene_render::config::ConfigError),

    #[error("rendering: {0}")]
    Render(#[from] RenderError),

    #[error("scene: {0}")]
    Scene(#[from] SceneError),
}

/// Unit quad in the XY plane split into two triangles
fn panel() -> Geometry {
    let vertices = vec![
        Vec3::new(-0.4, -0.4, 0.0),
        Vec3::new(0.4, -0.4, 0.0),
        Vec3::new(0.4, 0.4, 0.0),
        Vec3::new(-0.4, 0.4, 0.0),
    ];
    let mut geometry = Geometry::new(vertices, vec![Face::new(0, 1, 2), Face::new(0, 2, 3)]);
    geometry.compute_face_normals();
    geometry
}

fn build_scene(graph: &mut SceneGraph, renderer: &mut Renderer) -> Result<(NodeId, NodeId), DemoError> {
    let program = renderer.backend_mut().create_program("basic")?;
    let solid: Arc<dyn Material> = Arc::new(BasicMaterial::new(program).with_name("solid"));
    let glass: Arc<dyn Material> = Arc::new(
        BasicMaterial::new(program)
            .with_name("glass")
            .with_color(Vec3::new(0.3, 0.6, 1.0))
            .with_opacity(0.5)
            .with_side(Side::Double),
    );

    let root = graph.create_named_node("root");
    let pivot = graph.create_named_node("pivot");
    graph.add_child(root, pivot)?;

    for row in 0..GRID {
        for column in 0..GRID {
            let material = if (row + column) % 3 == 0 { &glass } else { &solid };
            let node = graph.create_mesh_node(Mesh::new(panel(), MeshMaterial::single(Arc::clone(material))));
            graph.add_child(pivot, node)?;
            let offset = (GRID - 1) as f32 * 0.5;
            graph
                .node_mut(node)?
                .set_position(Vec3::new(column as f32 - offset, row as f32 - offset, -(row as f32)));
        }
    }

    Ok((root, pivot))
}

fn build_composer(renderer: &mut Renderer, config: ComposerConfig) -> Result<EffectComposer, DemoError> {
    let backend = renderer.backend_mut();
    let convolution = backend.create_program("convolution")?;
    let copy = backend.create_program("copy")?;

    let mut composer = EffectComposer::new(config);
    composer.add_pass(Box::new(ScenePass::new()));
    composer.add_pass(Box::new(BloomPass::new(convolution, copy, 1.2, 3.0)));
    composer.add_pass(Box::new(ShaderPass::new(ShaderMaterial::new(copy).with_name("copy"))));
    Ok(composer)
}

fn run(config: ApplicationConfig) -> Result<(), DemoError> {
    config.validate()?;

    let mut renderer = Renderer::new(Box::new(RecordingBackend::new()), config.renderer.clone());
    let mut graph = SceneGraph::new();
    let (root, pivot) = build_scene(&mut graph, &mut renderer)?;
    let mut composer = build_composer(&mut renderer, config.composer.clone())?;

    let (width, height) = renderer.output_size();
    let camera = Camera::perspective(Vec3::new(0.0, 2.0, 12.0), 45.0, width as f32 / height as f32, 0.1, 100.0);

    for frame in 0..FRAMES {
        let angle = frame as f32 / FRAMES as f32 * TAU;
        graph
            .node_mut(pivot)?
            .set_rotation(Quat::from_axis_angle(&Vec3::y_axis(), angle));

        composer.render(&mut renderer, &mut graph, root, &camera, 1.0 / 60.0)?;

        let stats = renderer.stats();
        log::info!(
            "Frame {}: {} draws ({} opaque, {} transparent, {} culled), {} state changes, {} uploads / {} bytes, {} passes / {} swaps",
            frame,
            stats.draw_calls,
            stats.opaque,
            stats.transparent,
            stats.culled,
            stats.state_changes,
            stats.buffer_uploads,
            stats.uploaded_bytes,
            composer.stats().passes_run,
            composer.stats().swaps,
        );
    }

    composer.release(&mut renderer);
    renderer.destroy_subtree(&mut graph, root)?;

    if let Some(backend) = renderer.backend_as::<RecordingBackend>() {
        log::info!(
            "Shutdown: {} buffers and {} render targets still live",
            backend.live_buffers(),
            backend.live_targets()
        );
    }
    Ok(())
}

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match ApplicationConfig::load_from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load {path}: {err}");
                std::process::exit(1);
            }
        },
        None => ApplicationConfig::default(),
    };

    logging::init_with_level(&config.engine.log_level);
    log::info!("Starting scene demo");

    if let Err(err) = run(config) {
        log::error!("Demo failed: {err}");
        std::process::exit(1);
    }
}
