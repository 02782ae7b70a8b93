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

use crate::math::Viewport;
use crate::renderer::api::*;
use std::fmt::Debug;

/// The call surface of a stateful native graphics context.
///
/// The trait mirrors a GLES/WebGL-class API: objects are created as opaque
/// handles, most calls operate on whatever is currently bound, and nothing is
/// cached. Implementations forward every call; suppressing redundant calls is
/// the job of the device layer's state cache.
///
/// Creation methods return `None` when the native object cannot be allocated,
/// which includes every call made while the context is lost. All other methods
/// are silently ignored on a lost context.
pub trait GraphicsApi: Debug {
    // --- Context ---

    /// The major version of this context.
    fn api_version(&self) -> ApiVersion;

    /// Returns `true` once the context has been lost.
    fn is_context_lost(&self) -> bool;

    /// Queries an identification string.
    fn get_string(&self, name: ApiString) -> String;

    /// Queries a numeric limit. Returns 0 when the limit is unavailable.
    fn get_limit(&self, limit: Limit) -> u32;

    /// Returns `true` if the stage supports high float precision.
    fn high_float_precision(&self, stage: ShaderStage) -> bool;

    /// Enables an extension. Returns `false` when it is unavailable.
    fn enable_extension(&mut self, extension: Extension) -> bool;

    /// Routes a group of core entry points to their extension equivalents.
    /// Returns `false` when the backing extension is unavailable.
    fn alias_entry_point(&mut self, alias: EntryPointAlias) -> bool;

    /// Returns and clears the oldest recorded error.
    fn get_error(&mut self) -> ApiError;

    // --- Buffers ---

    /// Allocates a buffer object.
    fn create_buffer(&mut self) -> Option<NativeBuffer>;
    /// Deletes a buffer object.
    fn delete_buffer(&mut self, buffer: NativeBuffer);
    /// Binds a buffer to `target`, or unbinds with `None`.
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<NativeBuffer>);
    /// Replaces the storage of the buffer bound to `target` with `data`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsageHint);
    /// Replaces the storage of the buffer bound to `target` with `size` zeroed bytes.
    fn buffer_data_size(&mut self, target: BufferTarget, size: usize, usage: BufferUsageHint);
    /// Writes `data` at `offset` into the buffer bound to `target`.
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    // --- Vertex input ---

    /// Allocates a vertex array object.
    fn create_vertex_array(&mut self) -> Option<NativeVertexArray>;
    /// Deletes a vertex array object.
    fn delete_vertex_array(&mut self, vao: NativeVertexArray);
    /// Binds a vertex array object, or the default one with `None`.
    fn bind_vertex_array(&mut self, vao: Option<NativeVertexArray>);
    /// Enables an attribute slot.
    fn enable_vertex_attrib_array(&mut self, slot: u32);
    /// Disables an attribute slot.
    fn disable_vertex_attrib_array(&mut self, slot: u32);
    /// Points an attribute slot at the buffer bound to `BufferTarget::Array`.
    fn vertex_attrib_pointer(&mut self, slot: u32, layout: &VertexLayout);
    /// Sets how many instances share one element of an attribute slot.
    fn vertex_attrib_divisor(&mut self, slot: u32, divisor: u32);

    // --- Textures ---

    /// Allocates a texture object.
    fn create_texture(&mut self) -> Option<NativeTexture>;
    /// Deletes a texture object.
    fn delete_texture(&mut self, texture: NativeTexture);
    /// Selects the active texture unit.
    fn active_texture(&mut self, unit: u32);
    /// Binds a texture to the active unit.
    fn bind_texture(&mut self, target: TextureBindTarget, texture: Option<NativeTexture>);
    /// Uploads (or allocates, when `data` is `None`) one image level.
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &mut self,
        target: TexImageTarget,
        level: u32,
        width: u32,
        height: u32,
        format: TextureFormat,
        ty: TextureType,
        data: Option<&[u8]>,
    );
    /// Uploads one level of block-compressed data.
    fn compressed_tex_image_2d(
        &mut self,
        target: TexImageTarget,
        level: u32,
        format: CompressedFormat,
        width: u32,
        height: u32,
        data: &[u8],
    );
    /// Uploads an external frame directly, bypassing CPU pixel access.
    fn tex_image_external(&mut self, target: TexImageTarget, frame: &ExternalFrame);
    /// Sets a sampler parameter on the texture bound to `target`.
    fn tex_parameter(&mut self, target: TextureBindTarget, parameter: TexParameter);
    /// Regenerates the mip chain of the texture bound to `target`.
    fn generate_mipmap(&mut self, target: TextureBindTarget);
    /// Sets an unpack parameter for subsequent uploads.
    fn pixel_store(&mut self, parameter: PixelStore);

    // --- Framebuffers ---

    /// Allocates a framebuffer object.
    fn create_framebuffer(&mut self) -> Option<NativeFramebuffer>;
    /// Deletes a framebuffer object.
    fn delete_framebuffer(&mut self, framebuffer: NativeFramebuffer);
    /// Binds a framebuffer, or the default framebuffer with `None`.
    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<NativeFramebuffer>);
    /// Attaches a texture image to the bound framebuffer.
    fn framebuffer_texture_2d(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        image: TexImageTarget,
        texture: Option<NativeTexture>,
        level: u32,
    );
    /// Allocates a renderbuffer object.
    fn create_renderbuffer(&mut self) -> Option<NativeRenderbuffer>;
    /// Deletes a renderbuffer object.
    fn delete_renderbuffer(&mut self, renderbuffer: NativeRenderbuffer);
    /// Binds a renderbuffer.
    fn bind_renderbuffer(&mut self, renderbuffer: Option<NativeRenderbuffer>);
    /// Allocates storage for the bound renderbuffer; `samples > 1` makes it multisampled.
    fn renderbuffer_storage(
        &mut self,
        format: RenderbufferFormat,
        width: u32,
        height: u32,
        samples: u32,
    );
    /// Attaches a renderbuffer to the bound framebuffer.
    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        renderbuffer: Option<NativeRenderbuffer>,
    );
    /// Copies a region from the read framebuffer to the draw framebuffer.
    fn blit_framebuffer(&mut self, src: Viewport, dst: Viewport, mask: ClearMask, filter: BlitFilter);
    /// Selects how many color attachments fragment outputs write to.
    fn draw_buffers(&mut self, count: u32);

    // --- Shaders and programs ---

    /// Allocates a shader object for `stage`.
    fn create_shader(&mut self, stage: ShaderStage) -> Option<NativeShader>;
    /// Replaces the source of a shader.
    fn shader_source(&mut self, shader: NativeShader, source: &str);
    /// Compiles a shader.
    fn compile_shader(&mut self, shader: NativeShader);
    /// Returns `true` if the last compile succeeded.
    fn shader_compile_status(&self, shader: NativeShader) -> bool;
    /// The compiler log of a shader.
    fn shader_info_log(&self, shader: NativeShader) -> String;
    /// Deletes a shader object.
    fn delete_shader(&mut self, shader: NativeShader);
    /// Allocates a program object.
    fn create_program(&mut self) -> Option<NativeProgram>;
    /// Attaches a compiled shader.
    fn attach_shader(&mut self, program: NativeProgram, shader: NativeShader);
    /// Links a program.
    fn link_program(&mut self, program: NativeProgram);
    /// Returns `true` if the last link succeeded.
    fn program_link_status(&self, program: NativeProgram) -> bool;
    /// The linker log of a program.
    fn program_info_log(&self, program: NativeProgram) -> String;
    /// Deletes a program object.
    fn delete_program(&mut self, program: NativeProgram);
    /// Makes a program current, or clears it with `None`.
    fn use_program(&mut self, program: Option<NativeProgram>);
    /// Looks up a uniform by name in a linked program.
    fn get_uniform_location(&self, program: NativeProgram, name: &str) -> Option<UniformLocation>;
    /// Looks up an attribute slot by name in a linked program.
    fn get_attrib_location(&self, program: NativeProgram, name: &str) -> Option<u32>;
    /// Writes a uniform of the current program.
    fn uniform(&mut self, location: UniformLocation, value: &UniformValue);

    // --- Fixed-function state ---

    /// Enables a capability.
    fn enable(&mut self, capability: Capability);
    /// Disables a capability.
    fn disable(&mut self, capability: Capability);
    /// Sets the viewport rectangle.
    fn viewport(&mut self, viewport: Viewport);
    /// Sets the scissor rectangle.
    fn scissor(&mut self, rect: Viewport);
    /// Sets the color write mask.
    fn color_mask(&mut self, mask: ColorMask);
    /// Sets the color used by `clear`.
    fn clear_color(&mut self, color: Color);
    /// Sets the depth used by `clear`.
    fn clear_depth(&mut self, depth: f32);
    /// Sets the stencil value used by `clear`.
    fn clear_stencil(&mut self, value: i32);
    /// Clears the selected buffers of the bound framebuffer.
    fn clear(&mut self, mask: ClearMask);
    /// Enables or disables depth writes.
    fn depth_mask(&mut self, write: bool);
    /// Sets the depth comparison.
    fn depth_func(&mut self, func: CompareFunction);
    /// Selects which faces are culled.
    fn cull_face(&mut self, face: Face);
    /// Sets the front-face winding.
    fn front_face(&mut self, winding: FrontFace);
    /// Sets the depth bias.
    fn polygon_offset(&mut self, factor: f32, units: f32);
    /// Sets the stencil comparison.
    fn stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32);
    /// Sets the stencil operations.
    fn stencil_op(&mut self, fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);
    /// Sets the stencil write mask.
    fn stencil_mask(&mut self, mask: u32);
    /// Sets separate color/alpha blend factors.
    fn blend_func_separate(&mut self, func: BlendFunc);
    /// Sets the blend equation for color and alpha.
    fn blend_equation(&mut self, equation: BlendEquation);
    /// Sets the constant blend color.
    fn blend_color(&mut self, color: Color);

    // --- Draws ---

    /// Draws indexed primitives from the bound element buffer.
    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        byte_offset: usize,
    );
    /// Draws `instances` copies of indexed primitives.
    fn draw_elements_instanced(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        byte_offset: usize,
        instances: u32,
    );
    /// Draws non-indexed primitives.
    fn draw_arrays(&mut self, topology: PrimitiveTopology, first: u32, count: u32);
    /// Draws `instances` copies of non-indexed primitives.
    fn draw_arrays_instanced(
        &mut self,
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
        instances: u32,
    );
    /// Submits pending commands.
    fn flush(&mut self);
}
