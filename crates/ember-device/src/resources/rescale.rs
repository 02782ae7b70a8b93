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

//! GPU rescaling pass used to convert NPOT images to POT textures.

use super::program::link_program;
use crate::context::GpuContext;
use ember_core::math::Viewport;
use ember_core::renderer::{
    float_bytes, Attachment, AttribPointer, BufferTarget, BufferUsageHint, FramebufferTarget,
    NativeBuffer, NativeProgram, NativeTexture, PrimitiveTopology, ResourceError, ResourceKind,
    TexImageTarget, TextureBindTarget, UniformLocation, UniformValue, VertexLayout,
};

const RESCALE_VERTEX: &str = "attribute vec2 position;
varying vec2 vUV;
void main(void) {
    vUV = position * 0.5 + 0.5;
    gl_Position = vec4(position, 0.0, 1.0);
}
";

const RESCALE_FRAGMENT: &str = "precision mediump float;
varying vec2 vUV;
uniform sampler2D textureSampler;
void main(void) {
    gl_FragColor = texture2D(textureSampler, vUV);
}
";

const QUAD: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

#[derive(Debug, Clone, Copy)]
struct RescaleProgram {
    native: NativeProgram,
    position_slot: u32,
    sampler: Option<UniformLocation>,
}

/// Draws a texture into another of a different size.
///
/// The program and the quad buffer are created on first use and dropped on
/// context loss.
#[derive(Debug, Default)]
pub struct GpuRescaler {
    program: Option<RescaleProgram>,
    quad: Option<NativeBuffer>,
}

impl GpuRescaler {
    /// Creates a rescaler with no GPU objects yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the GPU objects after a context loss.
    pub fn invalidate(&mut self) {
        self.program = None;
        self.quad = None;
    }

    /// Deletes the GPU objects.
    pub fn dispose(&mut self, ctx: &mut GpuContext<'_>) {
        if let Some(program) = self.program.take() {
            ctx.cache.forget_program(program.native);
            ctx.api.delete_program(program.native);
        }
        if let Some(quad) = self.quad.take() {
            ctx.cache.forget_buffer(quad);
            ctx.api.delete_buffer(quad);
        }
    }

    fn ensure(&mut self, ctx: &mut GpuContext<'_>) -> Result<(RescaleProgram, NativeBuffer), ResourceError> {
        let program = match self.program {
            Some(program) => program,
            None => {
                let native = link_program(ctx.api, RESCALE_VERTEX, RESCALE_FRAGMENT)?;
                let program = RescaleProgram {
                    native,
                    position_slot: ctx.api.get_attrib_location(native, "position").unwrap_or(0),
                    sampler: ctx.api.get_uniform_location(native, "textureSampler"),
                };
                self.program = Some(program);
                program
            }
        };
        let quad = match self.quad {
            Some(quad) => quad,
            None => {
                let quad = ctx
                    .api
                    .create_buffer()
                    .ok_or(ResourceError::AllocationFailed(ResourceKind::Buffer))?;
                ctx.cache.bind_buffer(ctx.api, BufferTarget::Array, Some(quad), false);
                ctx.api
                    .buffer_data(BufferTarget::Array, float_bytes(&QUAD), BufferUsageHint::Static);
                self.quad = Some(quad);
                quad
            }
        };
        Ok((program, quad))
    }

    /// Renders `source` into level 0 of `destination`, which must already
    /// have `width` x `height` storage.
    pub fn rescale(
        &mut self,
        ctx: &mut GpuContext<'_>,
        source: NativeTexture,
        destination: NativeTexture,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        let (program, quad) = self.ensure(ctx)?;
        let framebuffer = ctx
            .api
            .create_framebuffer()
            .ok_or(ResourceError::AllocationFailed(ResourceKind::Framebuffer))?;
        let previous_viewport = ctx.cache.viewport().known().copied();

        ctx.cache.bind_framebuffer(ctx.api, Some(framebuffer), false);
        ctx.api.framebuffer_texture_2d(
            FramebufferTarget::Framebuffer,
            Attachment::Color0,
            TexImageTarget::Texture2D,
            Some(destination),
            0,
        );
        ctx.cache
            .set_viewport(ctx.api, Viewport::new(0, 0, width, height), false);

        ctx.cache.use_program(ctx.api, Some(program.native), false);
        ctx.cache
            .bind_texture(ctx.api, 0, TextureBindTarget::Texture2D, Some(source), false);
        if let Some(sampler) = program.sampler {
            ctx.api.uniform(sampler, &UniformValue::Int(0));
        }

        if ctx.caps.vertex_array_object {
            ctx.cache.bind_vertex_array(ctx.api, None, false);
        }
        let slot = program.position_slot;
        ctx.cache.enable_vertex_attribute(ctx.api, slot, false);
        ctx.cache.vertex_attrib_pointer(
            ctx.api,
            slot,
            AttribPointer {
                buffer: quad,
                layout: VertexLayout::floats(2),
            },
            false,
        );
        ctx.cache.disable_unused_attributes(ctx.api, &[slot]);
        if ctx.caps.instanced_arrays {
            ctx.cache.vertex_attrib_divisor(ctx.api, slot, 0, false);
        }

        // The pass ignores depth and blending; the caller's requests are restored
        // afterwards and forwarded on the next draw.
        let depth_test = ctx.cache.depth_culling.depth_test();
        let cull = ctx.cache.depth_culling.cull();
        let blend = ctx.cache.alpha.blend();
        ctx.cache.depth_culling.set_depth_test(false);
        ctx.cache.depth_culling.set_cull(false);
        ctx.cache.alpha.set_blend(false);
        ctx.cache.apply_states(ctx.api);

        ctx.api.draw_arrays(PrimitiveTopology::TriangleStrip, 0, 4);

        ctx.cache.depth_culling.set_depth_test(depth_test);
        ctx.cache.depth_culling.set_cull(cull);
        ctx.cache.alpha.set_blend(blend);

        ctx.cache.bind_framebuffer(ctx.api, None, false);
        ctx.cache.forget_framebuffer(framebuffer);
        ctx.api.delete_framebuffer(framebuffer);
        if let Some(viewport) = previous_viewport {
            ctx.cache.set_viewport(ctx.api, viewport, false);
        }
        log::debug!("Rescaled texture {source:?} into {destination:?} ({width}x{height})");
        Ok(())
    }
}
