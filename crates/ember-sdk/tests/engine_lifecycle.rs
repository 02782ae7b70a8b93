// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine scenarios on the headless backend.

use ember_core::math::Extent2D;
use ember_core::renderer::{
    FillMode, LoadingScreen, LossResponse, PostProcessLink, ProgramKey, SceneLink, VertexLayout,
    VertexSource,
};
use ember_core::{EngineOptions, EngineRegistry};
use ember_device::frame::render_callback;
use ember_device::RenderCallback;
use ember_infra::{GlCall, HeadlessConfig, HeadlessGl, HeadlessProvider, ManualScheduler};
use ember_sdk::{ContextSource, Engine, EngineBuilder};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

const VS: &str = "attribute vec3 position;\nuniform mat4 world;\nvoid main() {}\n";
const FS: &str = "void main() {}\n";

type Journal = Rc<RefCell<Vec<String>>>;

fn entries(journal: &Journal) -> Vec<String> {
    journal.borrow().clone()
}

struct RecordingScene {
    name: &'static str,
    journal: Journal,
}

impl SceneLink for RecordingScene {
    fn reset_render_ids(&mut self) {
        self.journal.borrow_mut().push(format!("{}:reset", self.name));
    }

    fn on_context_restored(&mut self) {
        self.journal.borrow_mut().push(format!("{}:restored", self.name));
    }

    fn dispose(&mut self) {
        self.journal.borrow_mut().push(format!("{}:dispose", self.name));
    }
}

struct RecordingPostProcess(Journal);

impl PostProcessLink for RecordingPostProcess {
    fn dispose(&mut self) {
        self.0.borrow_mut().push("post:dispose".into());
    }
}

struct RecordingLoadingScreen(Journal);

impl LoadingScreen for RecordingLoadingScreen {
    fn display(&mut self) {
        self.0.borrow_mut().push("loading:display".into());
    }

    fn hide(&mut self) {
        self.0.borrow_mut().push("loading:hide".into());
    }

    fn dispose(&mut self) {
        self.0.borrow_mut().push("loading:dispose".into());
    }
}

struct Harness {
    provider: HeadlessProvider,
    scheduler: ManualScheduler,
    registry: Arc<EngineRegistry>,
    engine: Engine,
}

impl Harness {
    fn new(options: EngineOptions) -> Self {
        Self::with_provider(
            HeadlessProvider::new(HeadlessConfig::version_2(), Extent2D::new(800, 600)),
            options,
        )
    }

    fn with_provider(provider: HeadlessProvider, options: EngineOptions) -> Self {
        let scheduler = ManualScheduler::with_display_sync();
        let registry = Arc::new(EngineRegistry::new());
        let engine = EngineBuilder::new(ContextSource::surface(provider.clone()))
            .options(options)
            .registry(Arc::clone(&registry))
            .scheduler(scheduler.clone())
            .label("test")
            .build()
            .unwrap();
        Self {
            provider,
            scheduler,
            registry,
            engine,
        }
    }

    fn gl(&self) -> HeadlessGl {
        self.provider.current().unwrap()
    }

    /// Fires the next scheduled frame.
    fn tick(&mut self) -> bool {
        let id = self.scheduler.next_due().expect("a frame is scheduled");
        self.engine.render_frame(id)
    }
}

fn counting_callback(counter: &Rc<Cell<u32>>) -> RenderCallback<Engine> {
    let counter = Rc::clone(counter);
    render_callback(move |_: &mut Engine| counter.set(counter.get() + 1))
}

#[test]
fn second_identical_set_size_is_a_no_op() {
    let mut h = Harness::new(EngineOptions::default());
    let journal = Journal::default();
    h.engine.add_scene(Box::new(RecordingScene {
        name: "main",
        journal: journal.clone(),
    }));
    let resizes = Rc::new(Cell::new(0));
    let counter = resizes.clone();
    h.engine
        .events_mut()
        .resize
        .add(move |_| counter.set(counter.get() + 1));

    assert!(h.engine.set_size(1024, 768));
    assert!(!h.engine.set_size(1024, 768));

    assert_eq!(h.engine.render_size(), Extent2D::new(1024, 768));
    assert_eq!(resizes.get(), 1);
    assert_eq!(entries(&journal), vec!["main:reset"]);
}

#[test]
fn resize_follows_the_surface_and_device_ratio() {
    let provider = HeadlessProvider::new(HeadlessConfig::version_2(), Extent2D::new(400, 300));
    provider.set_device_pixel_ratio(2.0);
    let options = EngineOptions {
        adapt_to_device_ratio: true,
        ..Default::default()
    };
    let mut h = Harness::with_provider(provider, options);
    assert_eq!(h.engine.render_size(), Extent2D::new(800, 600));

    h.provider.set_surface_size(Extent2D::new(500, 300));
    assert!(h.engine.resize());
    assert_eq!(h.engine.render_size(), Extent2D::new(1000, 600));
    assert!(!h.engine.resize());

    assert!(h.engine.set_hardware_scaling_level(1.0));
    assert_eq!(h.engine.render_size(), Extent2D::new(500, 300));
}

#[test]
fn frames_run_callbacks_between_begin_and_end_events() {
    let mut h = Harness::new(EngineOptions::default());
    let journal = Journal::default();
    let begin = journal.clone();
    h.engine
        .events_mut()
        .begin_frame
        .add(move |info| begin.borrow_mut().push(format!("begin:{}", info.frame)));
    let end = journal.clone();
    h.engine
        .events_mut()
        .end_frame
        .add(move |info| end.borrow_mut().push(format!("end:{}", info.frame)));
    let body = journal.clone();
    h.engine
        .run_render_loop(render_callback(move |_: &mut Engine| {
            body.borrow_mut().push("render".into())
        }));

    assert!(h.tick());
    assert!(h.tick());

    assert_eq!(
        entries(&journal),
        vec!["begin:1", "render", "end:1", "begin:2", "render", "end:2"]
    );
    assert_eq!(h.scheduler.pending_count(), 1);
}

#[test]
fn stopping_every_callback_ends_the_loop() {
    let mut h = Harness::new(EngineOptions::default());
    let counter = Rc::new(Cell::new(0));
    let callback = counting_callback(&counter);
    assert!(h.engine.run_render_loop(callback.clone()));
    assert!(!h.engine.run_render_loop(callback.clone()));

    assert!(h.tick());
    h.engine.stop_render_loop(Some(&callback));

    assert_eq!(h.engine.render_loop_len(), 0);
    assert_eq!(h.scheduler.pending_count(), 0);
    assert_eq!(counter.get(), 1);
}

#[test]
fn callbacks_can_draw_through_the_engine() {
    let mut h = Harness::new(EngineOptions::default());
    let vb = h.engine.device_mut().create_vertex_buffer(&[0.0; 12]).unwrap();
    let ib = h
        .engine
        .device_mut()
        .create_index_buffer(&[0, 1, 2, 0, 2, 3, 1, 2, 3], false)
        .unwrap();
    let program = h
        .engine
        .device_mut()
        .create_program(ProgramKey::new(VS, FS), &["position"], &["world"])
        .unwrap();

    h.engine
        .run_render_loop(render_callback(move |engine: &mut Engine| {
            let device = engine.device_mut();
            let sources = [VertexSource::new("position", vb, VertexLayout::floats(3))];
            device.bind_buffers(&sources, Some(ib), program);
            device.draw_indexed(FillMode::TriangleFill, 0, 9, None);
        }));

    assert!(h.tick());
    assert!(h.tick());

    assert_eq!(h.engine.device().draw_calls(), 2);
    assert_eq!(
        h.gl().count_calls(|c| matches!(c, GlCall::DrawElements { count: 9, .. })),
        2
    );
}

#[test]
fn backgrounded_frames_are_skipped_unless_requested() {
    let options = EngineOptions {
        render_even_in_background: false,
        ..Default::default()
    };
    let mut h = Harness::new(options);
    let counter = Rc::new(Cell::new(0));
    h.engine.run_render_loop(counting_callback(&counter));

    h.engine.set_backgrounded(true);
    assert!(!h.tick());
    assert_eq!(counter.get(), 0);
    assert_eq!(h.scheduler.pending_count(), 1);

    h.engine.set_backgrounded(false);
    assert!(h.tick());
    assert_eq!(counter.get(), 1);
}

#[test]
fn background_rendering_is_on_by_default() {
    let mut h = Harness::new(EngineOptions::default());
    let counter = Rc::new(Cell::new(0));
    h.engine.run_render_loop(counting_callback(&counter));
    h.engine.set_backgrounded(true);
    assert!(h.tick());
    assert_eq!(counter.get(), 1);
}

#[test]
fn end_frame_flushes_when_forced() {
    let options = EngineOptions {
        flush_on_end_frame: Some(true),
        ..Default::default()
    };
    let mut h = Harness::new(options);
    h.engine.run_render_loop(render_callback(|_: &mut Engine| {}));
    h.tick();
    assert_eq!(h.gl().count_calls(|c| matches!(c, GlCall::Flush)), 1);
}

#[test]
fn context_loss_pauses_frames_until_restored() {
    let mut h = Harness::new(EngineOptions::default());
    let journal = Journal::default();
    h.engine.add_scene(Box::new(RecordingScene {
        name: "main",
        journal: journal.clone(),
    }));
    let lost = journal.clone();
    h.engine
        .events_mut()
        .context_lost
        .add(move |_| lost.borrow_mut().push("event:lost".into()));
    let restored = journal.clone();
    h.engine
        .events_mut()
        .context_restored
        .add(move |report| {
            restored
                .borrow_mut()
                .push(format!("event:restored:{}", report.failures()))
        });
    let counter = Rc::new(Cell::new(0));
    h.engine.run_render_loop(counting_callback(&counter));
    h.engine
        .device_mut()
        .create_program(ProgramKey::new(VS, FS), &["position"], &["world"])
        .unwrap();

    h.gl().lose_context();
    assert_eq!(h.engine.handle_context_lost(), Some(LossResponse::PreventDefault));
    assert_eq!(h.engine.handle_context_lost(), Some(LossResponse::PreventDefault));
    assert!(h.engine.is_context_lost());
    assert!(!h.tick());
    assert_eq!(counter.get(), 0);

    let report = h.engine.handle_context_restored().unwrap();
    assert_eq!(report.programs.rebuilt, 1);
    assert!(!h.engine.is_context_lost());
    assert!(h.tick());
    assert_eq!(counter.get(), 1);

    assert_eq!(
        entries(&journal),
        vec!["event:lost", "main:restored", "event:restored:0"]
    );
}

#[test]
fn failed_restore_keeps_the_engine_lost() {
    let mut h = Harness::new(EngineOptions::default());
    let restored = Rc::new(Cell::new(false));
    let flag = restored.clone();
    h.engine
        .events_mut()
        .context_restored
        .add(move |_| flag.set(true));

    h.gl().lose_context();
    h.engine.handle_context_lost();
    h.provider.set_fail_acquire(true);

    assert!(h.engine.handle_context_restored().is_err());
    assert!(h.engine.is_context_lost());
    assert!(!restored.get());

    h.provider.set_fail_acquire(false);
    assert!(h.engine.handle_context_restored().is_ok());
    assert!(restored.get());
}

#[test]
fn loss_signals_are_ignored_when_opted_out() {
    let options = EngineOptions {
        do_not_handle_context_lost: true,
        ..Default::default()
    };
    let mut h = Harness::new(options);
    let lost = Rc::new(Cell::new(false));
    let flag = lost.clone();
    h.engine.events_mut().context_lost.add(move |_| flag.set(true));

    assert_eq!(h.engine.handle_context_lost(), None);
    assert!(!lost.get());
    assert!(h.engine.handle_context_restored().is_err());
}

#[test]
fn bare_contexts_have_no_surface_to_resize() {
    let gl = HeadlessGl::default();
    let registry = Arc::new(EngineRegistry::new());
    let mut engine = Engine::new(
        ContextSource::context(gl.clone(), Extent2D::new(320, 200)),
        EngineOptions::default(),
        &registry,
    )
    .unwrap();

    assert_eq!(engine.render_size(), Extent2D::new(320, 200));
    assert!(!engine.resize());

    gl.lose_context();
    engine.handle_context_lost();
    assert!(engine.handle_context_restored().is_err());
    gl.restore_context();
    assert!(engine.handle_context_restored().is_ok());
}

#[test]
fn surface_refusing_a_context_fails_construction() {
    let provider = HeadlessProvider::new(HeadlessConfig::version_2(), Extent2D::new(8, 8));
    provider.set_fail_acquire(true);
    let registry = Arc::new(EngineRegistry::new());

    let err = Engine::new(
        ContextSource::surface(provider),
        EngineOptions::default(),
        &registry,
    )
    .unwrap_err();

    assert!(err.to_string().contains("graphics device"));
    assert!(registry.is_empty());
}

#[test]
fn touch_action_is_disabled_unless_opted_out() {
    let h = Harness::new(EngineOptions::default());
    assert_eq!(h.provider.touch_action(), Some(false));

    let options = EngineOptions {
        do_not_handle_touch_action: true,
        ..Default::default()
    };
    let h = Harness::new(options);
    assert_eq!(h.provider.touch_action(), None);
}

#[test]
fn webgl2_can_be_disabled() {
    let options = EngineOptions {
        disable_webgl2_support: true,
        ..Default::default()
    };
    let h = Harness::new(options);
    assert!(!h.engine.device().caps().is_version_2());
}

#[test]
fn focus_and_blur_are_forwarded() {
    let mut h = Harness::new(EngineOptions::default());
    let journal = Journal::default();
    let focus = journal.clone();
    h.engine
        .events_mut()
        .canvas_focus
        .add(move |_| focus.borrow_mut().push("focus".into()));
    let blur = journal.clone();
    h.engine
        .events_mut()
        .canvas_blur
        .add(move |_| blur.borrow_mut().push("blur".into()));

    h.engine.handle_focus();
    assert!(h.engine.has_focus());
    h.engine.handle_blur();
    assert!(!h.engine.has_focus());
    assert_eq!(entries(&journal), vec!["focus", "blur"]);
}

#[test]
fn shader_compile_events_reach_engine_observers() {
    let mut h = Harness::new(EngineOptions::default());
    let journal = Journal::default();
    let before = journal.clone();
    h.engine
        .on_before_shader_compile(move |_| before.borrow_mut().push("before".into()));
    let after = journal.clone();
    h.engine.on_after_shader_compile(move |info| {
        after.borrow_mut().push(format!("after:{}", info.succeeded))
    });

    let key = ProgramKey::new(VS, FS);
    h.engine
        .device_mut()
        .create_program(key.clone(), &["position"], &["world"])
        .unwrap();
    h.engine
        .device_mut()
        .create_program(key, &["position"], &["world"])
        .unwrap();

    assert_eq!(entries(&journal), vec!["before", "after:true"]);
}

#[test]
fn lockstep_settings_are_exposed() {
    let options = EngineOptions::from_json_str(
        r#"{ "deterministic_lockstep": true, "lockstep_max_steps": 6 }"#,
    )
    .unwrap();
    let h = Harness::new(options);
    assert!(h.engine.is_deterministic_lockstep());
    assert_eq!(h.engine.lockstep_max_steps(), 6);
    assert!(h.engine.lockstep_step_ms() > 16.0);
}

#[test]
fn dispose_releases_collaborators_in_order() {
    let mut h = Harness::new(EngineOptions::default());
    let journal = Journal::default();
    h.engine
        .set_loading_screen(Box::new(RecordingLoadingScreen(journal.clone())));
    h.engine.display_loading_ui();
    h.engine
        .add_post_process(Box::new(RecordingPostProcess(journal.clone())));
    h.engine.add_scene(Box::new(RecordingScene {
        name: "a",
        journal: journal.clone(),
    }));
    h.engine.add_scene(Box::new(RecordingScene {
        name: "b",
        journal: journal.clone(),
    }));
    h.engine.run_render_loop(render_callback(|_: &mut Engine| {}));
    h.engine.device_mut().empty_texture().unwrap();
    h.engine
        .device_mut()
        .create_program(ProgramKey::new(VS, FS), &["position"], &["world"])
        .unwrap();
    let id = h.engine.id();
    assert_eq!(h.registry.last_created(), Some(id));

    h.engine.dispose();
    h.engine.dispose();

    assert_eq!(
        entries(&journal),
        vec![
            "loading:display",
            "loading:hide",
            "loading:dispose",
            "post:dispose",
            "a:dispose",
            "b:dispose",
        ]
    );
    assert!(h.engine.is_disposed());
    assert_eq!(h.engine.scene_count(), 0);
    assert_eq!(h.scheduler.pending_count(), 0);
    assert!(h.provider.listeners_detached());
    assert!(!h.registry.contains(id));
    assert_eq!(h.gl().live_programs(), 0);
    assert_eq!(h.gl().live_textures(), 0);
    assert!(!h.engine.run_render_loop(render_callback(|_: &mut Engine| {})));
}

#[test]
fn dropping_an_engine_deregisters_it() {
    let registry = Arc::new(EngineRegistry::new());
    let make = |label: &str| {
        EngineBuilder::new(ContextSource::surface(HeadlessProvider::new(
            HeadlessConfig::version_2(),
            Extent2D::new(64, 64),
        )))
        .registry(Arc::clone(&registry))
        .label(label)
        .build()
        .unwrap()
    };
    let first = make("first");
    let second = make("second");
    assert_eq!(registry.last_created(), Some(second.id()));

    drop(second);
    assert_eq!(registry.last_created(), Some(first.id()));
    drop(first);
    assert!(registry.is_empty());
}
