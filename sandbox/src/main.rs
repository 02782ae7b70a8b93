use anyhow::{Context, Result};
use ember_core::math::Extent2D;
use ember_core::renderer::{Color, FillMode, ProgramKey, VertexLayout, VertexSource};
use ember_core::{EngineOptions, EngineRegistry};
use ember_device::frame::render_callback;
use ember_infra::{GlCall, HeadlessConfig, HeadlessProvider, ManualScheduler, logging};
use ember_sdk::{ContextSource, Engine, EngineBuilder};
use std::sync::Arc;

const VERTEX: &str = "attribute vec3 position;\nuniform float scale;\nvoid main() {}\n";
const FRAGMENT: &str = "uniform vec4 tint;\nvoid main() {}\n";
const FRAMES: usize = 120;

fn main() -> Result<()> {
    logging::init("info");

    let provider = HeadlessProvider::new(HeadlessConfig::version_2(), Extent2D::new(1280, 720));
    let scheduler = ManualScheduler::with_display_sync();
    let registry = Arc::new(EngineRegistry::new());
    let options = EngineOptions {
        antialias: true,
        deterministic_lockstep: true,
        ..Default::default()
    };

    let mut engine = EngineBuilder::new(ContextSource::surface(provider.clone()))
        .options(options)
        .registry(Arc::clone(&registry))
        .scheduler(scheduler.clone())
        .label("sandbox")
        .build()?;

    let device = engine.device_mut();
    let vertices = device.create_vertex_buffer(&[
        -1.0, -1.0, 0.0, //
        1.0, -1.0, 0.0, //
        1.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0,
    ])?;
    let indices = device.create_index_buffer(&[0, 1, 2, 0, 2, 3], false)?;
    let program = device
        .create_program(
            ProgramKey::new(VERTEX, FRAGMENT),
            &["position"],
            &["scale", "tint"],
        )
        .context("Failed to build the quad program")?;

    engine
        .events_mut()
        .resize
        .add(|size| log::info!("Resized to {}x{}", size.width, size.height));

    let mut elapsed = 0.0_f32;
    engine.run_render_loop(render_callback(move |engine: &mut Engine| {
        elapsed += engine.lockstep_step_ms() as f32 * engine.last_frame().lockstep_steps as f32;
        let device = engine.device_mut();
        device.clear(Some(Color::new(0.1, 0.1, 0.15, 1.0)), true, true, false);
        let sources = [VertexSource::new("position", vertices, VertexLayout::floats(3))];
        device.bind_buffers(&sources, Some(indices), program);
        device.set_float(program, "scale", 1.0 + (elapsed / 1000.0).sin() * 0.5);
        device.set_float4(program, "tint", [1.0, 0.5, 0.2, 1.0]);
        device.draw_indexed(FillMode::TriangleFill, 0, 6, None);
    }));

    for frame in 0..FRAMES {
        let request = scheduler
            .next_due()
            .context("The render loop stopped requesting frames")?;
        engine.render_frame(request);

        if frame == FRAMES / 2 {
            log::info!("Simulating a context loss");
            if let Some(gl) = provider.current() {
                gl.lose_context();
            }
            engine.handle_context_lost();
            let report = engine.handle_context_restored()?;
            log::info!(
                "Restored {} programs, {} buffers",
                report.programs.rebuilt,
                report.buffers.rebuilt
            );
            engine.set_size(1920, 1080);
        }
    }

    let draws = provider
        .current()
        .map_or(0, |gl| gl.count_calls(|call| matches!(call, GlCall::DrawElements { .. })));
    log::info!(
        "{} frames, {} draw calls issued, {} recorded by the backend, {:.1} fps",
        FRAMES,
        engine.device().draw_calls(),
        draws,
        engine.fps()
    );

    engine.dispose();
    Ok(())
}
