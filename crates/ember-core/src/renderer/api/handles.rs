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

//! Opaque handles to objects owned by a native graphics context.
//!
//! Handles are plain integers chosen by the backend. They are only meaningful
//! for the context that produced them: after a context loss every handle is
//! stale and must be re-created.

macro_rules! native_handle {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

native_handle!(
    /// A native buffer object.
    NativeBuffer
);
native_handle!(
    /// A native texture object.
    NativeTexture
);
native_handle!(
    /// A native framebuffer object.
    NativeFramebuffer
);
native_handle!(
    /// A native renderbuffer object.
    NativeRenderbuffer
);
native_handle!(
    /// A native shader stage object.
    NativeShader
);
native_handle!(
    /// A native linked program object.
    NativeProgram
);
native_handle!(
    /// A native vertex array object.
    NativeVertexArray
);

/// The location of a uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);
