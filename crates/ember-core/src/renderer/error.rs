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

//! Defines the hierarchy of error types for the device layer.

use crate::renderer::api::ShaderStage;
use std::fmt;

/// An error raised while compiling a single shader stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// The native context refused to allocate a shader object.
    CreationFailed {
        /// The stage that could not be created.
        stage: ShaderStage,
    },
    /// The stage source failed to compile.
    CompilationError {
        /// The stage that failed.
        stage: ShaderStage,
        /// The compiler's info log.
        log: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CreationFailed { stage } => {
                write!(f, "Failed to create {stage} shader object")
            }
            ShaderError::CompilationError { stage, log } => {
                write!(f, "{stage} shader compilation failed: {log}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error raised while building a linked program.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// One of the stages failed.
    Shader(ShaderError),
    /// The native context refused to allocate a program object.
    CreationFailed,
    /// The stages compiled but the program failed to link.
    LinkFailed {
        /// The program info log.
        log: String,
    },
    /// The context is lost; no program can be built until it is restored.
    ContextLost,
}

impl ProgramError {
    /// Returns the stage that failed, if the failure was a stage compile error.
    pub fn stage(&self) -> Option<ShaderStage> {
        match self {
            ProgramError::Shader(ShaderError::CompilationError { stage, .. })
            | ProgramError::Shader(ShaderError::CreationFailed { stage }) => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Shader(err) => write!(f, "Program build failed: {err}"),
            ProgramError::CreationFailed => write!(f, "Failed to create program object"),
            ProgramError::LinkFailed { log } => write!(f, "Program link failed: {log}"),
            ProgramError::ContextLost => {
                write!(f, "Cannot build a program while the context is lost")
            }
        }
    }
}

impl std::error::Error for ProgramError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProgramError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ProgramError {
    fn from(err: ShaderError) -> Self {
        ProgramError::Shader(err)
    }
}

/// The kind of resource referenced by a [`ResourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A vertex, index, or instance buffer.
    Buffer,
    /// A texture, including render-target color textures.
    Texture,
    /// A framebuffer or one of its renderbuffers.
    Framebuffer,
    /// A linked program.
    Program,
    /// A vertex array object.
    VertexArray,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::Framebuffer => "framebuffer",
            ResourceKind::Program => "program",
            ResourceKind::VertexArray => "vertex array",
        };
        f.write_str(name)
    }
}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// A program-specific error occurred.
    Program(ProgramError),
    /// The native context failed to allocate the object.
    AllocationFailed(ResourceKind),
    /// The handle refers to a resource whose reference count already reached zero.
    Released {
        /// The kind of the released resource.
        kind: ResourceKind,
        /// The raw id of the released resource.
        id: usize,
    },
    /// The handle was never issued by this device.
    InvalidHandle {
        /// The kind of resource the handle was expected to reference.
        kind: ResourceKind,
        /// The raw id.
        id: usize,
    },
    /// A partial update exceeds the resource's capacity.
    OutOfBounds {
        /// The byte offset of the update.
        offset: usize,
        /// The byte length of the update.
        length: usize,
        /// The resource's capacity in bytes.
        capacity: usize,
    },
    /// The operation requires a live context.
    ContextLost,
    /// The device lacks a capability the operation requires.
    Unsupported(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Program(err) => write!(f, "Program resource error: {err}"),
            ResourceError::AllocationFailed(kind) => {
                write!(f, "Failed to allocate native {kind}")
            }
            ResourceError::Released { kind, id } => {
                write!(f, "The {kind} {id} has already been released")
            }
            ResourceError::InvalidHandle { kind, id } => {
                write!(f, "Invalid {kind} handle: {id}")
            }
            ResourceError::OutOfBounds {
                offset,
                length,
                capacity,
            } => write!(
                f,
                "Update of {length} bytes at offset {offset} exceeds capacity {capacity}"
            ),
            ResourceError::ContextLost => write!(f, "The graphics context is lost"),
            ResourceError::Unsupported(msg) => write!(f, "Unsupported operation: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Program(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProgramError> for ResourceError {
    fn from(err: ProgramError) -> Self {
        ResourceError::Program(err)
    }
}

/// An error produced by the texture loading pipeline.
///
/// Load errors are cloned into both the caller's error callback and the
/// load future, so they carry owned messages rather than boxed sources.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The fetcher failed to retrieve the bytes.
    Network {
        /// The requested URL.
        url: String,
        /// A description of the failure.
        message: String,
    },
    /// No registered loader or decoder accepted the payload.
    NoLoader {
        /// The requested URL.
        url: String,
    },
    /// A loader accepted the payload but failed to decode it.
    Decode {
        /// The requested URL.
        url: String,
        /// A description of the failure.
        message: String,
    },
    /// The decoded data could not be uploaded.
    Upload(ResourceError),
    /// The load was aborted before completion.
    Cancelled,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Network { url, message } => {
                write!(f, "Failed to fetch '{url}': {message}")
            }
            LoadError::NoLoader { url } => write!(f, "No loader can handle '{url}'"),
            LoadError::Decode { url, message } => {
                write!(f, "Failed to decode '{url}': {message}")
            }
            LoadError::Upload(err) => write!(f, "Failed to upload texture: {err}"),
            LoadError::Cancelled => write!(f, "The load was cancelled"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Upload(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for LoadError {
    fn from(err: ResourceError) -> Self {
        LoadError::Upload(err)
    }
}

/// A high-level error raised by the device or the engine built on it.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// No native context could be acquired.
    InitializationFailed(String),
    /// A resource operation failed.
    Resource(ResourceError),
    /// Re-acquiring or rebuilding after a context loss failed.
    RestoreFailed(String),
    /// The operation requires a live context.
    ContextLost,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics context: {msg}")
            }
            DeviceError::Resource(err) => write!(f, "Graphics resource operation failed: {err}"),
            DeviceError::RestoreFailed(msg) => {
                write!(f, "Failed to restore graphics context: {msg}")
            }
            DeviceError::ContextLost => write!(f, "The graphics context is lost"),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for DeviceError {
    fn from(err: ResourceError) -> Self {
        DeviceError::Resource(err)
    }
}

impl From<ProgramError> for DeviceError {
    fn from(err: ProgramError) -> Self {
        DeviceError::Resource(ResourceError::Program(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationError {
            stage: ShaderStage::Fragment,
            log: "ERROR: 0:3: 'foo' : undeclared identifier".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "fragment shader compilation failed: ERROR: 0:3: 'foo' : undeclared identifier"
        );
    }

    #[test]
    fn program_error_reports_failing_stage() {
        let err: ProgramError = ShaderError::CompilationError {
            stage: ShaderStage::Vertex,
            log: "bad".to_string(),
        }
        .into();
        assert_eq!(err.stage(), Some(ShaderStage::Vertex));
        assert!(err.source().is_some());

        let link = ProgramError::LinkFailed {
            log: "varying mismatch".to_string(),
        };
        assert_eq!(link.stage(), None);
    }

    #[test]
    fn released_handle_display() {
        let err = ResourceError::Released {
            kind: ResourceKind::Buffer,
            id: 7,
        };
        assert_eq!(format!("{err}"), "The buffer 7 has already been released");
    }

    #[test]
    fn device_error_chains_through_resource_and_program() {
        let err: DeviceError = ProgramError::LinkFailed {
            log: "oops".to_string(),
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Graphics resource operation failed: Program resource error: Program link failed: oops"
        );
        assert!(err.source().is_some());
        assert!(err.source().unwrap().source().is_some());
    }

    #[test]
    fn load_error_wraps_upload_failures() {
        let err: LoadError = ResourceError::ContextLost.into();
        assert_eq!(
            format!("{err}"),
            "Failed to upload texture: The graphics context is lost"
        );
    }
}
