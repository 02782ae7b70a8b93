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

//! Vertex, index, and instance buffers.

use super::RebuildReport;
use crate::context::GpuContext;
use ember_core::renderer::{
    BufferId, BufferKind, BufferTarget, BufferUsageHint, IndexFormat, NativeBuffer, ResourceError,
    ResourceKind,
};
use std::collections::HashMap;

/// A buffer tracked by the [`BufferManager`].
#[derive(Debug)]
pub struct GpuBuffer {
    native: Option<NativeBuffer>,
    capacity: usize,
    ref_count: u32,
    kind: BufferKind,
    usage: BufferUsageHint,
    index_format: Option<IndexFormat>,
    retained: Option<Vec<u8>>,
}

impl GpuBuffer {
    /// The native buffer, `None` while the buffer is not ready.
    pub fn native(&self) -> Option<NativeBuffer> {
        self.native
    }

    /// Storage size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live owners.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// What the buffer holds.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// The usage hint given at creation.
    pub fn usage(&self) -> BufferUsageHint {
        self.usage
    }

    /// Index width, for index buffers.
    pub fn index_format(&self) -> Option<IndexFormat> {
        self.index_format
    }

    /// Returns `true` while a native buffer exists.
    pub fn is_ready(&self) -> bool {
        self.native.is_some()
    }

    /// Returns `true` if a CPU copy is kept for rebuilding.
    pub fn has_retained_source(&self) -> bool {
        self.retained.is_some()
    }
}

/// Creates, updates, and releases GPU buffers.
#[derive(Debug, Default)]
pub struct BufferManager {
    buffers: HashMap<BufferId, GpuBuffer>,
    next_id: usize,
    allocated_bytes: usize,
}

impl BufferManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a buffer.
    pub fn get(&self, id: BufferId) -> Option<&GpuBuffer> {
        self.buffers.get(&id)
    }

    /// The native buffer behind `id`, if ready.
    pub fn native(&self, id: BufferId) -> Option<NativeBuffer> {
        self.buffers.get(&id).and_then(|b| b.native)
    }

    /// Total bytes of native storage currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if no buffer is live.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    fn missing(&self, id: BufferId) -> ResourceError {
        if id.0 < self.next_id {
            ResourceError::Released {
                kind: ResourceKind::Buffer,
                id: id.0,
            }
        } else {
            ResourceError::InvalidHandle {
                kind: ResourceKind::Buffer,
                id: id.0,
            }
        }
    }

    /// Binds `native` to the binding point of `kind`.
    ///
    /// Index buffers are bound with no vertex array active so the binding does
    /// not leak into a recorded vertex array.
    fn bind_for_upload(ctx: &mut GpuContext<'_>, kind: BufferKind, native: NativeBuffer) {
        let target = kind.target();
        if target == BufferTarget::ElementArray && ctx.caps.vertex_array_object {
            ctx.cache.bind_vertex_array(ctx.api, None, false);
        }
        ctx.cache.bind_buffer(ctx.api, target, Some(native), false);
    }

    fn create_native(
        ctx: &mut GpuContext<'_>,
        kind: BufferKind,
        usage: BufferUsageHint,
        contents: BufferContents<'_>,
    ) -> Result<NativeBuffer, ResourceError> {
        if ctx.api.is_context_lost() {
            return Err(ResourceError::ContextLost);
        }
        let native = ctx
            .api
            .create_buffer()
            .ok_or(ResourceError::AllocationFailed(ResourceKind::Buffer))?;
        Self::bind_for_upload(ctx, kind, native);
        match contents {
            BufferContents::Data(data) => ctx.api.buffer_data(kind.target(), data, usage),
            BufferContents::Zeroed(size) => ctx.api.buffer_data_size(kind.target(), size, usage),
        }
        Ok(native)
    }

    fn insert(
        &mut self,
        native: NativeBuffer,
        capacity: usize,
        kind: BufferKind,
        usage: BufferUsageHint,
        index_format: Option<IndexFormat>,
        retained: Option<Vec<u8>>,
    ) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.allocated_bytes += capacity;
        self.buffers.insert(
            id,
            GpuBuffer {
                native: Some(native),
                capacity,
                ref_count: 1,
                kind,
                usage,
                index_format,
                retained,
            },
        );
        log::trace!("Created {kind:?} buffer {id:?} ({capacity} bytes)");
        id
    }

    /// Creates a vertex buffer holding `data`.
    ///
    /// With `keep_source` a CPU copy is retained so the buffer can be rebuilt
    /// after a context loss.
    pub fn create_vertex_buffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        data: &[u8],
        usage: BufferUsageHint,
        keep_source: bool,
    ) -> Result<BufferId, ResourceError> {
        let native = Self::create_native(ctx, BufferKind::Vertex, usage, BufferContents::Data(data))?;
        let retained = keep_source.then(|| data.to_vec());
        Ok(self.insert(native, data.len(), BufferKind::Vertex, usage, None, retained))
    }

    /// Creates a vertex buffer meant to be updated with
    /// [`update_dynamic_vertex_buffer`](Self::update_dynamic_vertex_buffer).
    pub fn create_dynamic_vertex_buffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        data: &[u8],
        keep_source: bool,
    ) -> Result<BufferId, ResourceError> {
        self.create_vertex_buffer(ctx, data, BufferUsageHint::Dynamic, keep_source)
    }

    /// Creates an instance buffer with `capacity` zeroed bytes.
    ///
    /// Instance data is re-uploaded every frame, so no CPU copy is kept and
    /// rebuilding only re-allocates the storage.
    pub fn create_instance_buffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        capacity: usize,
    ) -> Result<BufferId, ResourceError> {
        let usage = BufferUsageHint::Dynamic;
        let native = Self::create_native(
            ctx,
            BufferKind::Instance,
            usage,
            BufferContents::Zeroed(capacity),
        )?;
        Ok(self.insert(native, capacity, BufferKind::Instance, usage, None, None))
    }

    /// Creates an index buffer.
    ///
    /// Indices are stored as 16-bit values unless one of them exceeds 65535
    /// and the context supports 32-bit indices.
    pub fn create_index_buffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        indices: &[u32],
        updatable: bool,
        keep_source: bool,
    ) -> Result<BufferId, ResourceError> {
        let format = IndexFormat::select(indices, ctx.caps.uint_indices);
        let bytes = format.encode(indices);
        let usage = if updatable {
            BufferUsageHint::Dynamic
        } else {
            BufferUsageHint::Static
        };
        let native = Self::create_native(ctx, BufferKind::Index, usage, BufferContents::Data(&bytes))?;
        let capacity = bytes.len();
        let retained = keep_source.then_some(bytes);
        Ok(self.insert(native, capacity, BufferKind::Index, usage, Some(format), retained))
    }

    /// Writes `data` into a vertex or instance buffer.
    ///
    /// `byte_offset` is the destination offset and `byte_length` limits how
    /// much of `data` is written. A whole-buffer write larger than the current
    /// storage re-allocates it; a partial write must fit.
    pub fn update_dynamic_vertex_buffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: BufferId,
        data: &[u8],
        byte_offset: Option<usize>,
        byte_length: Option<usize>,
    ) -> Result<(), ResourceError> {
        let payload = match byte_length {
            Some(len) => &data[..len.min(data.len())],
            None => data,
        };
        self.write(ctx, id, byte_offset, payload)
    }

    /// Replaces indices starting at `index_offset` (in indices, not bytes).
    ///
    /// Values are encoded in the buffer's existing index format.
    pub fn update_dynamic_index_buffer(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: BufferId,
        indices: &[u32],
        index_offset: Option<usize>,
    ) -> Result<(), ResourceError> {
        let format = self
            .buffers
            .get(&id)
            .ok_or_else(|| self.missing(id))?
            .index_format
            .unwrap_or_default();
        let bytes = format.encode(indices);
        let offset = index_offset.map(|o| o * format.byte_size());
        self.write(ctx, id, offset, &bytes)
    }

    fn write(
        &mut self,
        ctx: &mut GpuContext<'_>,
        id: BufferId,
        byte_offset: Option<usize>,
        payload: &[u8],
    ) -> Result<(), ResourceError> {
        if ctx.api.is_context_lost() {
            return Err(ResourceError::ContextLost);
        }
        let missing = self.missing(id);
        let buffer = self.buffers.get_mut(&id).ok_or(missing)?;
        let target = buffer.kind.target();
        let offset = byte_offset.unwrap_or(0);

        let grows = byte_offset.is_none() && payload.len() > buffer.capacity;
        if !grows && offset + payload.len() > buffer.capacity {
            return Err(ResourceError::OutOfBounds {
                offset,
                length: payload.len(),
                capacity: buffer.capacity,
            });
        }

        // A buffer left not ready by a restore is revived by its next update.
        let native = match buffer.native {
            Some(native) => native,
            None => {
                let native = Self::create_native(
                    ctx,
                    buffer.kind,
                    buffer.usage,
                    BufferContents::Zeroed(buffer.capacity),
                )?;
                buffer.native = Some(native);
                self.allocated_bytes += buffer.capacity;
                native
            }
        };
        Self::bind_for_upload(ctx, buffer.kind, native);

        if grows {
            ctx.api.buffer_data(target, payload, buffer.usage);
            self.allocated_bytes += payload.len() - buffer.capacity;
            buffer.capacity = payload.len();
            if let Some(copy) = buffer.retained.as_mut() {
                copy.clear();
                copy.extend_from_slice(payload);
            }
        } else {
            ctx.api.buffer_sub_data(target, offset, payload);
            if let Some(copy) = buffer.retained.as_mut() {
                if copy.len() < offset + payload.len() {
                    copy.resize(offset + payload.len(), 0);
                }
                copy[offset..offset + payload.len()].copy_from_slice(payload);
            }
        }
        Ok(())
    }

    /// Adds an owner. Returns the new reference count.
    pub fn retain(&mut self, id: BufferId) -> Result<u32, ResourceError> {
        let missing = self.missing(id);
        let buffer = self.buffers.get_mut(&id).ok_or(missing)?;
        buffer.ref_count += 1;
        Ok(buffer.ref_count)
    }

    /// Removes an owner, destroying the native buffer when none is left.
    /// Returns `true` if the buffer was destroyed.
    pub fn release(&mut self, ctx: &mut GpuContext<'_>, id: BufferId) -> Result<bool, ResourceError> {
        let missing = self.missing(id);
        let buffer = self.buffers.get_mut(&id).ok_or(missing)?;
        buffer.ref_count -= 1;
        if buffer.ref_count > 0 {
            return Ok(false);
        }
        if let Some(buffer) = self.buffers.remove(&id) {
            self.destroy(ctx, buffer);
        }
        log::trace!("Released buffer {id:?}");
        Ok(true)
    }

    fn destroy(&mut self, ctx: &mut GpuContext<'_>, buffer: GpuBuffer) {
        if let Some(native) = buffer.native {
            ctx.cache.forget_buffer(native);
            ctx.api.delete_buffer(native);
            self.allocated_bytes -= buffer.capacity;
        }
    }

    /// Drops every native handle after a context loss.
    pub fn mark_context_lost(&mut self) {
        for buffer in self.buffers.values_mut() {
            buffer.native = None;
        }
        self.allocated_bytes = 0;
    }

    /// Re-creates every buffer that can be rebuilt, in creation order.
    ///
    /// Buffers with a retained copy are re-uploaded, instance buffers get
    /// fresh zeroed storage, and the rest stay not ready until their next update.
    pub fn rebuild_all(&mut self, ctx: &mut GpuContext<'_>) -> RebuildReport {
        let mut report = RebuildReport::default();
        let mut ids: Vec<BufferId> = self.buffers.keys().copied().collect();
        ids.sort();
        for id in ids {
            let Some(buffer) = self.buffers.get(&id) else {
                continue;
            };
            let contents = match (&buffer.retained, buffer.kind) {
                (Some(data), _) => BufferContents::Data(data),
                (None, BufferKind::Instance) => BufferContents::Zeroed(buffer.capacity),
                (None, _) => {
                    report.pending += 1;
                    continue;
                }
            };
            match Self::create_native(ctx, buffer.kind, buffer.usage, contents) {
                Ok(native) => {
                    let capacity = buffer.capacity;
                    if let Some(buffer) = self.buffers.get_mut(&id) {
                        buffer.native = Some(native);
                    }
                    self.allocated_bytes += capacity;
                    report.rebuilt += 1;
                }
                Err(err) => {
                    log::error!("Failed to rebuild buffer {id:?}: {err}");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Destroys every buffer regardless of reference counts.
    pub fn dispose_all(&mut self, ctx: &mut GpuContext<'_>) {
        let buffers: Vec<GpuBuffer> = self.buffers.drain().map(|(_, b)| b).collect();
        for buffer in buffers {
            self.destroy(ctx, buffer);
        }
    }
}

#[derive(Clone, Copy)]
enum BufferContents<'a> {
    Data(&'a [u8]),
    Zeroed(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateCache;
    use ember_core::renderer::{float_bytes, Capabilities};
    use ember_infra::graphics::headless::{GlCall, HeadlessConfig, HeadlessGl};

    fn setup(config: HeadlessConfig) -> (HeadlessGl, StateCache, Capabilities) {
        let mut gl = HeadlessGl::new(config);
        let caps = crate::capability::probe(&mut gl, Default::default());
        (gl, StateCache::new(), caps)
    }

    #[test]
    fn vertex_buffer_accounts_bytes_and_refcount() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut buffers = BufferManager::new();

        let data = [0.0f32; 12];
        let id = buffers
            .create_vertex_buffer(&mut ctx, float_bytes(&data), BufferUsageHint::Static, false)
            .unwrap();
        assert_eq!(buffers.allocated_bytes(), 48);
        assert_eq!(buffers.retain(id).unwrap(), 2);

        assert!(!buffers.release(&mut ctx, id).unwrap());
        assert!(buffers.release(&mut ctx, id).unwrap());
        assert_eq!(buffers.allocated_bytes(), 0);
        assert_eq!(gl.live_buffers(), 0);
    }

    #[test]
    fn updating_a_released_buffer_fails() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut buffers = BufferManager::new();

        let id = buffers
            .create_dynamic_vertex_buffer(&mut ctx, &[0u8; 16], false)
            .unwrap();
        buffers.release(&mut ctx, id).unwrap();

        let err = buffers
            .update_dynamic_vertex_buffer(&mut ctx, id, &[1u8; 16], None, None)
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::Released {
                kind: ResourceKind::Buffer,
                id: id.0
            }
        );
        let err = buffers.retain(BufferId(99)).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidHandle { .. }));
    }

    #[test]
    fn index_width_depends_on_values_and_capability() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut buffers = BufferManager::new();

        let small = buffers
            .create_index_buffer(&mut ctx, &[0, 1, 2], false, false)
            .unwrap();
        let large = buffers
            .create_index_buffer(&mut ctx, &[0, 1, 70_000], false, false)
            .unwrap();
        assert_eq!(buffers.get(small).unwrap().index_format(), Some(IndexFormat::Uint16));
        assert_eq!(buffers.get(large).unwrap().index_format(), Some(IndexFormat::Uint32));
        assert_eq!(buffers.get(large).unwrap().capacity(), 12);
    }

    #[test]
    fn index_width_stays_16_bit_without_capability() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_1().without_all_extensions());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut buffers = BufferManager::new();

        let id = buffers
            .create_index_buffer(&mut ctx, &[0, 1, 70_000], false, false)
            .unwrap();
        assert_eq!(buffers.get(id).unwrap().index_format(), Some(IndexFormat::Uint16));
    }

    #[test]
    fn partial_update_must_fit_and_whole_update_grows() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut buffers = BufferManager::new();

        let id = buffers
            .create_dynamic_vertex_buffer(&mut ctx, &[0u8; 8], true)
            .unwrap();
        let err = buffers
            .update_dynamic_vertex_buffer(&mut ctx, id, &[1u8; 8], Some(4), None)
            .unwrap_err();
        assert!(matches!(err, ResourceError::OutOfBounds { capacity: 8, .. }));

        buffers
            .update_dynamic_vertex_buffer(&mut ctx, id, &[2u8; 32], None, None)
            .unwrap();
        assert_eq!(buffers.get(id).unwrap().capacity(), 32);
        assert_eq!(buffers.allocated_bytes(), 32);

        buffers
            .update_dynamic_vertex_buffer(&mut ctx, id, &[3u8; 16], Some(8), Some(4))
            .unwrap();
        let native = buffers.native(id).unwrap();
        let contents = gl.buffer_contents(native).unwrap();
        assert_eq!(&contents[8..12], &[3, 3, 3, 3]);
        assert_eq!(contents[12], 2);
    }

    #[test]
    fn rebuild_restores_retained_and_instance_buffers_only() {
        let (mut gl, mut cache, caps) = setup(HeadlessConfig::version_2());
        let mut buffers = BufferManager::new();
        let (kept, dropped, instances) = {
            let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
            (
                buffers
                    .create_vertex_buffer(&mut ctx, &[1u8; 12], BufferUsageHint::Static, true)
                    .unwrap(),
                buffers
                    .create_vertex_buffer(&mut ctx, &[1u8; 12], BufferUsageHint::Static, false)
                    .unwrap(),
                buffers.create_instance_buffer(&mut ctx, 64).unwrap(),
            )
        };

        gl.lose_context();
        buffers.mark_context_lost();
        gl.restore_context();
        cache.wipe(crate::state::WipeLevel::Full);
        gl.clear_calls();

        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let report = buffers.rebuild_all(&mut ctx);
        assert_eq!(report.rebuilt, 2);
        assert_eq!(report.pending, 1);
        assert!(buffers.get(kept).unwrap().is_ready());
        assert!(!buffers.get(dropped).unwrap().is_ready());
        assert!(buffers.get(instances).unwrap().is_ready());
        assert_eq!(
            gl.count_calls(|c| matches!(c, GlCall::CreateBuffer(_))),
            2
        );

        // The next update revives the dropped buffer.
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        buffers
            .update_dynamic_vertex_buffer(&mut ctx, dropped, &[5u8; 12], None, None)
            .unwrap();
        assert!(buffers.get(dropped).unwrap().is_ready());
    }
}
