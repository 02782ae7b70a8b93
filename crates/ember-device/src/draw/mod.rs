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

//! Vertex input binding and draw submission.

use crate::context::GpuContext;
use crate::resources::{BufferManager, ProgramManager, RebuildReport};
use ember_core::math::Viewport;
use ember_core::renderer::{
    AttribPointer, BufferId, BufferTarget, ClearMask, Color, FillMode, IndexFormat, float_bytes,
    NativeVertexArray, ProgramId, ResourceError, ResourceKind, VertexArrayId, VertexLayout,
    VertexSource,
};
use std::collections::HashMap;

/// Where the current draw is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawPhase {
    /// No draw in progress.
    #[default]
    Idle,
    /// Pending render state was forwarded.
    StatesApplied,
    /// The draw call was submitted.
    Issued,
}

/// One attribute fed from an instance buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceAttribute {
    /// Attribute slot.
    pub slot: u32,
    /// Layout inside the instance buffer.
    pub layout: VertexLayout,
}

impl InstanceAttribute {
    /// The four column attributes of a per-instance 4x4 float matrix.
    pub fn matrix_columns(slots: [u32; 4]) -> [InstanceAttribute; 4] {
        let mut column = 0;
        slots.map(|slot| {
            let attribute = InstanceAttribute {
                slot,
                layout: VertexLayout {
                    stride: 64,
                    offset: column * 16,
                    ..VertexLayout::floats(4)
                },
            };
            column += 1;
            attribute
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BoundInputs {
    sources: Vec<VertexSource>,
    index: Option<BufferId>,
    program: ProgramId,
    epoch: u64,
}

#[derive(Debug)]
struct RecordedVertexArray {
    native: Option<NativeVertexArray>,
    sources: Vec<VertexSource>,
    index: Option<BufferId>,
    program: ProgramId,
    index_format: Option<IndexFormat>,
}

/// Binds vertex inputs through the state cache and issues draws.
#[derive(Debug, Default)]
pub struct DrawDispatcher {
    bound: Option<BoundInputs>,
    index_format: Option<IndexFormat>,
    instance_slots: Vec<u32>,
    vertex_arrays: HashMap<VertexArrayId, RecordedVertexArray>,
    next_vertex_array: usize,
    phase: DrawPhase,
    draw_calls: u64,
}

impl DrawDispatcher {
    /// Creates an idle dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of draw calls issued since creation.
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    /// The phase reached by the last draw.
    pub fn phase(&self) -> DrawPhase {
        self.phase
    }

    /// Forgets the recorded binding pair so the next bind is forwarded.
    pub fn reset_binding(&mut self) {
        self.bound = None;
    }

    /// Binds vertex sources, an optional index buffer and a program.
    ///
    /// Re-binding the same inputs is a no-op as long as nothing else touched
    /// the vertex input state in between. Sources whose attribute the program
    /// does not use are skipped.
    pub fn bind_buffers(
        &mut self,
        ctx: &mut GpuContext<'_>,
        buffers: &BufferManager,
        programs: &ProgramManager,
        sources: &[VertexSource],
        index: Option<BufferId>,
        program: ProgramId,
    ) {
        if ctx.api.is_context_lost() {
            return;
        }
        let Some(context) = programs.get(program) else {
            log::debug!("bind_buffers: unknown program {program:?}");
            return;
        };
        let Some(native_program) = context.native() else {
            return;
        };
        ctx.cache.use_program(ctx.api, Some(native_program), false);

        let epoch = ctx.cache.attribute_epoch();
        if let Some(bound) = &self.bound {
            if bound.epoch == epoch
                && bound.program == program
                && bound.index == index
                && bound.sources == sources
            {
                return;
            }
        }

        if ctx.caps.vertex_array_object && !ctx.cache.bound_vertex_array().is(&None) {
            ctx.cache.bind_vertex_array(ctx.api, None, false);
        }
        let used = Self::point_attributes(ctx, buffers, programs, sources, program);
        ctx.cache.disable_unused_attributes(ctx.api, &used);
        self.index_format = Self::bind_index(ctx, buffers, index);

        self.bound = Some(BoundInputs {
            sources: sources.to_vec(),
            index,
            program,
            epoch: ctx.cache.attribute_epoch(),
        });
    }

    fn point_attributes(
        ctx: &mut GpuContext<'_>,
        buffers: &BufferManager,
        programs: &ProgramManager,
        sources: &[VertexSource],
        program: ProgramId,
    ) -> Vec<u32> {
        let Some(context) = programs.get(program) else {
            return Vec::new();
        };
        let mut used = Vec::with_capacity(sources.len());
        for source in sources {
            let Some(slot) = context.attribute_slot(&source.attribute) else {
                continue;
            };
            let Some(buffer) = buffers.native(source.buffer) else {
                log::debug!("bind_buffers: buffer {:?} is not ready", source.buffer);
                continue;
            };
            let pointer = AttribPointer {
                buffer,
                layout: source.layout,
            };
            ctx.cache.vertex_attrib_pointer(ctx.api, slot, pointer, false);
            ctx.cache.enable_vertex_attribute(ctx.api, slot, false);
            used.push(slot);
        }
        used
    }

    fn bind_index(
        ctx: &mut GpuContext<'_>,
        buffers: &BufferManager,
        index: Option<BufferId>,
    ) -> Option<IndexFormat> {
        let buffer = buffers.get(index?)?;
        let native = buffer.native()?;
        ctx.cache
            .bind_buffer(ctx.api, BufferTarget::ElementArray, Some(native), false);
        Some(buffer.index_format().unwrap_or_default())
    }

    fn begin_draw(&mut self, ctx: &mut GpuContext<'_>) -> bool {
        self.phase = DrawPhase::Idle;
        if ctx.api.is_context_lost() {
            return false;
        }
        ctx.cache.apply_states(ctx.api);
        self.phase = DrawPhase::StatesApplied;
        true
    }

    fn finish_draw(&mut self) {
        self.phase = DrawPhase::Issued;
        self.draw_calls += 1;
    }

    fn instances(ctx: &GpuContext<'_>, instances: Option<u32>) -> Option<u32> {
        match instances {
            Some(count) if count > 0 && ctx.caps.instanced_arrays => Some(count),
            Some(count) if count > 0 => {
                log::debug!("Instanced draw requested without instancing support");
                None
            }
            _ => None,
        }
    }

    /// Draws `index_count` indices starting at `index_start` from the bound
    /// index buffer. Returns `false` if nothing was submitted.
    pub fn draw_indexed(
        &mut self,
        ctx: &mut GpuContext<'_>,
        fill_mode: FillMode,
        index_start: u32,
        index_count: u32,
        instances: Option<u32>,
    ) -> bool {
        let Some(format) = self.index_format else {
            log::debug!("draw_indexed: no index buffer bound");
            return false;
        };
        if !self.begin_draw(ctx) {
            return false;
        }
        let topology = fill_mode.topology();
        let offset = index_start as usize * format.byte_size();
        match Self::instances(ctx, instances) {
            Some(count) => {
                ctx.api
                    .draw_elements_instanced(topology, index_count, format, offset, count)
            }
            None => ctx.api.draw_elements(topology, index_count, format, offset),
        }
        self.finish_draw();
        true
    }

    /// Draws `vertex_count` vertices starting at `vertex_start`.
    pub fn draw_arrays(
        &mut self,
        ctx: &mut GpuContext<'_>,
        fill_mode: FillMode,
        vertex_start: u32,
        vertex_count: u32,
        instances: Option<u32>,
    ) -> bool {
        if !self.begin_draw(ctx) {
            return false;
        }
        let topology = fill_mode.topology();
        match Self::instances(ctx, instances) {
            Some(count) => ctx
                .api
                .draw_arrays_instanced(topology, vertex_start, vertex_count, count),
            None => ctx.api.draw_arrays(topology, vertex_start, vertex_count),
        }
        self.finish_draw();
        true
    }

    // --- Instancing ---

    /// Uploads per-instance data and points `attributes` at it with a divisor of 1.
    pub fn update_and_bind_instances_buffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        buffers: &mut BufferManager,
        buffer: BufferId,
        data: &[f32],
        attributes: &[InstanceAttribute],
    ) -> Result<(), ResourceError> {
        buffers.update_dynamic_vertex_buffer(ctx, buffer, float_bytes(data), None, None)?;
        let native = buffers.native(buffer).ok_or(ResourceError::Released {
            kind: ResourceKind::Buffer,
            id: buffer.0,
        })?;
        for attribute in attributes {
            let pointer = AttribPointer {
                buffer: native,
                layout: attribute.layout,
            };
            ctx.cache
                .vertex_attrib_pointer(ctx.api, attribute.slot, pointer, false);
            ctx.cache.enable_vertex_attribute(ctx.api, attribute.slot, false);
            ctx.cache.vertex_attrib_divisor(ctx.api, attribute.slot, 1, false);
            if !self.instance_slots.contains(&attribute.slot) {
                self.instance_slots.push(attribute.slot);
            }
        }
        Ok(())
    }

    /// Resets the divisor of every instance attribute and disables it.
    pub fn unbind_instance_attributes(&mut self, ctx: &mut GpuContext<'_>) {
        for slot in self.instance_slots.drain(..) {
            ctx.cache.vertex_attrib_divisor(ctx.api, slot, 0, false);
            ctx.cache.disable_vertex_attribute(ctx.api, slot, false);
        }
    }

    // --- Vertex arrays ---

    /// Records `sources`, `index` and the program's attribute slots into a new
    /// vertex array object. The array stays bound.
    pub fn record_vertex_array(
        &mut self,
        ctx: &mut GpuContext<'_>,
        buffers: &BufferManager,
        programs: &ProgramManager,
        sources: &[VertexSource],
        index: Option<BufferId>,
        program: ProgramId,
    ) -> Result<VertexArrayId, ResourceError> {
        let mut recorded = RecordedVertexArray {
            native: None,
            sources: sources.to_vec(),
            index,
            program,
            index_format: None,
        };
        Self::record(ctx, buffers, programs, &mut recorded)?;
        self.index_format = recorded.index_format;
        self.bound = None;

        let id = VertexArrayId(self.next_vertex_array);
        self.next_vertex_array += 1;
        self.vertex_arrays.insert(id, recorded);
        Ok(id)
    }

    fn record(
        ctx: &mut GpuContext<'_>,
        buffers: &BufferManager,
        programs: &ProgramManager,
        recorded: &mut RecordedVertexArray,
    ) -> Result<(), ResourceError> {
        if !ctx.caps.vertex_array_object {
            return Err(ResourceError::Unsupported("vertex array objects".into()));
        }
        if ctx.api.is_context_lost() {
            return Err(ResourceError::ContextLost);
        }
        let native = ctx
            .api
            .create_vertex_array()
            .ok_or(ResourceError::AllocationFailed(ResourceKind::VertexArray))?;
        ctx.cache.bind_vertex_array(ctx.api, Some(native), false);
        Self::point_attributes(ctx, buffers, programs, &recorded.sources, recorded.program);
        recorded.index_format = Self::bind_index(ctx, buffers, recorded.index);
        recorded.native = Some(native);
        Ok(())
    }

    /// Binds a recorded vertex array.
    pub fn bind_vertex_array(&mut self, ctx: &mut GpuContext<'_>, id: VertexArrayId) {
        let Some(recorded) = self.vertex_arrays.get(&id) else {
            log::debug!("bind_vertex_array: unknown vertex array {id:?}");
            return;
        };
        let Some(native) = recorded.native else {
            return;
        };
        ctx.cache.bind_vertex_array(ctx.api, Some(native), false);
        self.index_format = recorded.index_format;
        self.bound = None;
    }

    /// Deletes a recorded vertex array.
    pub fn release_vertex_array(&mut self, ctx: &mut GpuContext<'_>, id: VertexArrayId) {
        if let Some(native) = self.vertex_arrays.remove(&id).and_then(|r| r.native) {
            ctx.cache.forget_vertex_array(native);
            ctx.api.delete_vertex_array(native);
        }
    }

    /// Number of recorded vertex arrays.
    pub fn vertex_array_count(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Drops every native vertex array after a context loss.
    pub fn mark_context_lost(&mut self) {
        for recorded in self.vertex_arrays.values_mut() {
            recorded.native = None;
        }
        self.bound = None;
        self.index_format = None;
        self.instance_slots.clear();
    }

    /// Re-records every vertex array against the restored buffers and programs.
    pub fn rebuild_vertex_arrays(
        &mut self,
        ctx: &mut GpuContext<'_>,
        buffers: &BufferManager,
        programs: &ProgramManager,
    ) -> RebuildReport {
        let mut report = RebuildReport::default();
        let mut ids: Vec<VertexArrayId> = self.vertex_arrays.keys().copied().collect();
        ids.sort();
        for id in ids {
            let Some(recorded) = self.vertex_arrays.get_mut(&id) else {
                continue;
            };
            match Self::record(ctx, buffers, programs, recorded) {
                Ok(()) => report.rebuilt += 1,
                Err(err) => {
                    log::error!("Failed to rebuild vertex array {id:?}: {err}");
                    report.failed += 1;
                }
            }
        }
        if ctx.caps.vertex_array_object && report.rebuilt > 0 {
            ctx.cache.bind_vertex_array(ctx.api, None, false);
        }
        report
    }

    /// Deletes every vertex array.
    pub fn dispose_all(&mut self, ctx: &mut GpuContext<'_>) {
        for (_, recorded) in self.vertex_arrays.drain() {
            if let Some(native) = recorded.native {
                ctx.cache.forget_vertex_array(native);
                ctx.api.delete_vertex_array(native);
            }
        }
        self.bound = None;
    }

    // --- Framebuffer operations ---

    /// Clears the bound framebuffer.
    ///
    /// The color buffer is cleared only when `back_buffer` is set and a color
    /// is given. Clearing depth turns depth writes on.
    pub fn clear(
        &mut self,
        ctx: &mut GpuContext<'_>,
        color: Option<Color>,
        back_buffer: bool,
        depth: bool,
        stencil: bool,
    ) {
        if ctx.api.is_context_lost() {
            return;
        }
        let mut mask = ClearMask::EMPTY;
        if let (true, Some(color)) = (back_buffer, color) {
            ctx.cache.set_clear_color(ctx.api, color, false);
            mask |= ClearMask::COLOR;
        }
        if depth {
            ctx.cache.depth_culling.set_depth_mask(true);
            ctx.cache.apply_states(ctx.api);
            ctx.api.clear_depth(1.0);
            mask |= ClearMask::DEPTH;
        }
        if stencil {
            ctx.api.clear_stencil(0);
            mask |= ClearMask::STENCIL;
        }
        if !mask.is_empty() {
            ctx.api.clear(mask);
        }
    }

    /// Sets the viewport.
    pub fn set_viewport(&mut self, ctx: &mut GpuContext<'_>, viewport: Viewport) {
        ctx.cache.set_viewport(ctx.api, viewport, false);
    }

    /// Restricts drawing to `rect`, or lifts the restriction with `None`.
    pub fn set_scissor(&mut self, ctx: &mut GpuContext<'_>, rect: Option<Viewport>) {
        match rect {
            Some(rect) => {
                ctx.cache.set_scissor_test(ctx.api, true, false);
                ctx.cache.set_scissor(ctx.api, rect, false);
            }
            None => ctx.cache.set_scissor_test(ctx.api, false, false),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateCache;
    use ember_core::renderer::{BufferUsageHint, Capabilities, PrimitiveTopology, ProgramKey};
    use ember_infra::graphics::headless::{GlCall, HeadlessConfig, HeadlessGl};

    const VS: &str = "attribute vec3 position;\nattribute vec4 world0;\nvoid main() {}\n";
    const FS: &str = "void main() {}\n";

    struct Fixture {
        gl: HeadlessGl,
        cache: StateCache,
        caps: Capabilities,
        buffers: BufferManager,
        programs: ProgramManager,
        draw: DrawDispatcher,
    }

    impl Fixture {
        fn new(config: HeadlessConfig) -> Self {
            let mut gl = HeadlessGl::new(config);
            let caps = crate::capability::probe(&mut gl, Default::default());
            Self {
                gl,
                cache: StateCache::new(),
                caps,
                buffers: BufferManager::new(),
                programs: ProgramManager::new(true),
                draw: DrawDispatcher::new(),
            }
        }

        /// A quad: 12 floats and 9 indices.
        fn quad(&mut self) -> (Vec<VertexSource>, BufferId, ProgramId) {
            let mut ctx = GpuContext::new(&mut self.gl, &mut self.cache, &self.caps);
            let vertices = [0.0f32; 12];
            let vb = self
                .buffers
                .create_vertex_buffer(&mut ctx, float_bytes(&vertices), BufferUsageHint::Static, true)
                .unwrap();
            let ib = self
                .buffers
                .create_index_buffer(&mut ctx, &[0, 1, 2, 0, 2, 3, 1, 2, 3], false, true)
                .unwrap();
            let program = self
                .programs
                .create_program(&mut ctx, ProgramKey::new(VS, FS), &["position", "world0"], &[])
                .unwrap();
            let sources = vec![VertexSource::new("position", vb, VertexLayout::floats(3))];
            (sources, ib, program)
        }

        fn bind(&mut self, sources: &[VertexSource], index: BufferId, program: ProgramId) {
            let mut ctx = GpuContext::new(&mut self.gl, &mut self.cache, &self.caps);
            self.draw
                .bind_buffers(&mut ctx, &self.buffers, &self.programs, sources, Some(index), program);
        }

        fn draw_indexed(&mut self, fill_mode: FillMode, instances: Option<u32>) -> bool {
            let mut ctx = GpuContext::new(&mut self.gl, &mut self.cache, &self.caps);
            self.draw.draw_indexed(&mut ctx, fill_mode, 0, 9, instances)
        }
    }

    #[test]
    fn each_draw_counts_once() {
        let mut f = Fixture::new(HeadlessConfig::version_2());
        let (sources, ib, program) = f.quad();
        f.bind(&sources, ib, program);

        assert!(f.draw_indexed(FillMode::TriangleFill, None));
        assert!(f.draw_indexed(FillMode::TriangleFill, None));
        assert_eq!(f.draw.draw_calls(), 2);
        assert_eq!(f.draw.phase(), DrawPhase::Issued);
        assert_eq!(
            f.gl.count_calls(|c| matches!(c, GlCall::DrawElements { count: 9, .. })),
            2
        );
    }

    #[test]
    fn rebinding_identical_inputs_is_a_no_op() {
        let mut f = Fixture::new(HeadlessConfig::version_2());
        let (sources, ib, program) = f.quad();
        f.bind(&sources, ib, program);
        let before = f.gl.calls().len();

        f.bind(&sources, ib, program);
        assert_eq!(f.gl.calls().len(), before);
    }

    #[test]
    fn rebinding_after_a_light_wipe_is_forwarded() {
        let mut f = Fixture::new(HeadlessConfig::version_2());
        let (sources, ib, program) = f.quad();
        f.bind(&sources, ib, program);

        f.cache.wipe(crate::state::WipeLevel::Light);
        f.draw.reset_binding();
        f.gl.clear_calls();
        f.bind(&sources, ib, program);
        assert_eq!(f.gl.count_calls(|c| matches!(c, GlCall::UseProgram(Some(_)))), 1);
    }

    #[test]
    fn unknown_fill_modes_draw_triangles() {
        let mut f = Fixture::new(HeadlessConfig::version_2());
        let (sources, ib, program) = f.quad();
        f.bind(&sources, ib, program);

        f.draw_indexed(FillMode::from_raw(99), None);
        f.draw_indexed(FillMode::WireFrameFill, None);
        let topologies: Vec<PrimitiveTopology> = f
            .gl
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                GlCall::DrawElements { topology, .. } => Some(topology),
                _ => None,
            })
            .collect();
        assert_eq!(topologies, vec![PrimitiveTopology::Triangles, PrimitiveTopology::Lines]);
    }

    #[test]
    fn draws_while_lost_are_skipped() {
        let mut f = Fixture::new(HeadlessConfig::version_2());
        let (sources, ib, program) = f.quad();
        f.bind(&sources, ib, program);

        f.gl.lose_context();
        assert!(!f.draw_indexed(FillMode::TriangleFill, None));
        assert_eq!(f.draw.draw_calls(), 0);
        assert_eq!(f.draw.phase(), DrawPhase::Idle);
    }

    #[test]
    fn instanced_draws_set_and_reset_divisors() {
        let mut f = Fixture::new(HeadlessConfig::version_2());
        let (sources, ib, program) = f.quad();
        let instances = {
            let mut ctx = GpuContext::new(&mut f.gl, &mut f.cache, &f.caps);
            f.buffers.create_instance_buffer(&mut ctx, 64 * 10).unwrap()
        };
        f.bind(&sources, ib, program);
        let slot = f.programs.get(program).unwrap().attribute_slot("world0").unwrap();
        {
            let mut ctx = GpuContext::new(&mut f.gl, &mut f.cache, &f.caps);
            let columns = InstanceAttribute::matrix_columns([slot, slot + 1, slot + 2, slot + 3]);
            f.draw
                .update_and_bind_instances_buffer(&mut ctx, &mut f.buffers, instances, &[0.0; 160], &columns)
                .unwrap();
        }
        assert!(f.draw_indexed(FillMode::TriangleFill, Some(10)));
        assert_eq!(f.draw.draw_calls(), 1);
        assert_eq!(
            f.gl.count_calls(|c| matches!(c, GlCall::DrawElementsInstanced { instances: 10, .. })),
            1
        );

        {
            let mut ctx = GpuContext::new(&mut f.gl, &mut f.cache, &f.caps);
            f.draw.unbind_instance_attributes(&mut ctx);
        }
        assert_eq!(
            f.gl.count_calls(|c| matches!(c, GlCall::VertexAttribDivisor(_, 0))),
            4
        );
    }

    #[test]
    fn matrix_columns_are_strided() {
        let columns = InstanceAttribute::matrix_columns([4, 5, 6, 7]);
        assert_eq!(columns[2].slot, 6);
        assert_eq!(columns[2].layout.offset, 32);
        assert_eq!(columns[3].layout.stride, 64);
    }

    #[test]
    fn vertex_arrays_record_and_rebind() {
        let mut f = Fixture::new(HeadlessConfig::version_2());
        let (sources, ib, program) = f.quad();
        let mut ctx = GpuContext::new(&mut f.gl, &mut f.cache, &f.caps);
        let vao = f
            .draw
            .record_vertex_array(&mut ctx, &f.buffers, &f.programs, &sources, Some(ib), program)
            .unwrap();
        ctx.cache.bind_vertex_array(ctx.api, None, false);
        f.draw.bind_vertex_array(&mut ctx, vao);
        assert!(f.draw.draw_indexed(&mut ctx, FillMode::TriangleFill, 0, 9, None));

        f.draw.release_vertex_array(&mut ctx, vao);
        assert_eq!(f.draw.vertex_array_count(), 0);
        assert_eq!(f.gl.count_calls(|c| matches!(c, GlCall::DeleteVertexArray(_))), 1);
    }

    #[test]
    fn vertex_arrays_need_the_capability() {
        let mut f = Fixture::new(HeadlessConfig::version_1().without_all_extensions());
        let (sources, ib, program) = f.quad();
        let mut ctx = GpuContext::new(&mut f.gl, &mut f.cache, &f.caps);
        let err = f
            .draw
            .record_vertex_array(&mut ctx, &f.buffers, &f.programs, &sources, Some(ib), program)
            .unwrap_err();
        assert!(matches!(err, ResourceError::Unsupported(_)));
    }

    #[test]
    fn clear_builds_the_mask() {
        let mut f = Fixture::new(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut f.gl, &mut f.cache, &f.caps);
        f.draw
            .clear(&mut ctx, Some(Color::new(0.0, 0.0, 0.0, 1.0)), true, true, false);
        f.draw.clear(&mut ctx, Some(Color::new(0.0, 0.0, 0.0, 1.0)), false, false, true);
        let masks: Vec<ClearMask> = f
            .gl
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                GlCall::Clear(mask) => Some(mask),
                _ => None,
            })
            .collect();
        assert_eq!(masks, vec![ClearMask::COLOR | ClearMask::DEPTH, ClearMask::STENCIL]);
    }
}
