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

use ember_core::math::Viewport;
use ember_core::renderer::*;

/// One recorded state-changing call.
///
/// Queries (`get_limit`, `get_error`, locations, statuses) are not recorded.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum GlCall {
    // Buffers
    CreateBuffer(NativeBuffer),
    DeleteBuffer(NativeBuffer),
    BindBuffer(BufferTarget, Option<NativeBuffer>),
    BufferData {
        target: BufferTarget,
        size: usize,
        usage: BufferUsageHint,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        size: usize,
    },

    // Vertex input
    CreateVertexArray(NativeVertexArray),
    DeleteVertexArray(NativeVertexArray),
    BindVertexArray(Option<NativeVertexArray>),
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    VertexAttribPointer(u32, VertexLayout),
    VertexAttribDivisor(u32, u32),

    // Textures
    CreateTexture(NativeTexture),
    DeleteTexture(NativeTexture),
    ActiveTexture(u32),
    BindTexture(TextureBindTarget, Option<NativeTexture>),
    TexImage2D {
        target: TexImageTarget,
        level: u32,
        width: u32,
        height: u32,
        format: TextureFormat,
        ty: TextureType,
        has_data: bool,
    },
    CompressedTexImage2D {
        target: TexImageTarget,
        level: u32,
        format: CompressedFormat,
        width: u32,
        height: u32,
        size: usize,
    },
    TexImageExternal {
        target: TexImageTarget,
        width: u32,
        height: u32,
    },
    TexParameter(TextureBindTarget, TexParameter),
    GenerateMipmap(TextureBindTarget),
    PixelStore(PixelStore),

    // Framebuffers
    CreateFramebuffer(NativeFramebuffer),
    DeleteFramebuffer(NativeFramebuffer),
    BindFramebuffer(FramebufferTarget, Option<NativeFramebuffer>),
    FramebufferTexture2D {
        target: FramebufferTarget,
        attachment: Attachment,
        image: TexImageTarget,
        texture: Option<NativeTexture>,
        level: u32,
    },
    CreateRenderbuffer(NativeRenderbuffer),
    DeleteRenderbuffer(NativeRenderbuffer),
    BindRenderbuffer(Option<NativeRenderbuffer>),
    RenderbufferStorage {
        format: RenderbufferFormat,
        width: u32,
        height: u32,
        samples: u32,
    },
    FramebufferRenderbuffer {
        target: FramebufferTarget,
        attachment: Attachment,
        renderbuffer: Option<NativeRenderbuffer>,
    },
    BlitFramebuffer {
        src: Viewport,
        dst: Viewport,
        mask: ClearMask,
        filter: BlitFilter,
    },
    DrawBuffers(u32),

    // Shaders and programs
    CreateShader(NativeShader, ShaderStage),
    ShaderSource(NativeShader),
    CompileShader(NativeShader),
    DeleteShader(NativeShader),
    CreateProgram(NativeProgram),
    AttachShader(NativeProgram, NativeShader),
    LinkProgram(NativeProgram),
    DeleteProgram(NativeProgram),
    UseProgram(Option<NativeProgram>),
    Uniform(UniformLocation, UniformValue),

    // Fixed-function state
    Enable(Capability),
    Disable(Capability),
    Viewport(Viewport),
    Scissor(Viewport),
    ColorMask(ColorMask),
    ClearColor(Color),
    ClearDepth(f32),
    ClearStencil(i32),
    Clear(ClearMask),
    DepthMask(bool),
    DepthFunc(CompareFunction),
    CullFace(Face),
    FrontFace(FrontFace),
    PolygonOffset(f32, f32),
    StencilFunc {
        func: CompareFunction,
        reference: i32,
        mask: u32,
    },
    StencilOp {
        fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    },
    StencilMask(u32),
    BlendFuncSeparate(BlendFunc),
    BlendEquation(BlendEquation),
    BlendColor(Color),

    // Draws
    DrawElements {
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: usize,
    },
    DrawElementsInstanced {
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: usize,
        instances: u32,
    },
    DrawArrays {
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
    },
    DrawArraysInstanced {
        topology: PrimitiveTopology,
        first: u32,
        count: u32,
        instances: u32,
    },
    Flush,
}

impl GlCall {
    /// Returns `true` for draw submissions.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            GlCall::DrawElements { .. }
                | GlCall::DrawElementsInstanced { .. }
                | GlCall::DrawArrays { .. }
                | GlCall::DrawArraysInstanced { .. }
        )
    }

    /// Returns `true` for calls that allocate a native object.
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            GlCall::CreateBuffer(_)
                | GlCall::CreateVertexArray(_)
                | GlCall::CreateTexture(_)
                | GlCall::CreateFramebuffer(_)
                | GlCall::CreateRenderbuffer(_)
                | GlCall::CreateShader(..)
                | GlCall::CreateProgram(_)
        )
    }
}
