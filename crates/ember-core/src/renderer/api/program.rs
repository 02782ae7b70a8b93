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

//! Defines data structures related to shader programs and uniforms.

use std::fmt;

/// An opaque handle to a linked program managed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub usize);

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// The identity of a program in the program cache.
///
/// Two requests with equal keys share one linked program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    /// Vertex stage source, without the precision header.
    pub vertex_source: String,
    /// Fragment stage source, without the precision header.
    pub fragment_source: String,
    /// Preprocessor defines prepended to both stages, newline separated.
    pub defines: String,
}

impl ProgramKey {
    /// Creates a key with no defines.
    pub fn new(vertex_source: impl Into<String>, fragment_source: impl Into<String>) -> Self {
        Self {
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            defines: String::new(),
        }
    }

    /// Returns the key with `defines` set.
    pub fn with_defines(mut self, defines: impl Into<String>) -> Self {
        self.defines = defines.into();
        self
    }
}

/// A value written to a uniform location.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// `int` or sampler unit.
    Int(i32),
    /// `float`.
    Float(f32),
    /// `vec2`.
    Float2([f32; 2]),
    /// `vec3`.
    Float3([f32; 3]),
    /// `vec4`.
    Float4([f32; 4]),
    /// `mat4`, column-major.
    Matrix4([f32; 16]),
    /// `int[]`.
    IntArray(Vec<i32>),
    /// `float[]`.
    FloatArray(Vec<f32>),
}

/// Payload of the before/after shader compile events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCompileInfo {
    /// The defines of the program being compiled.
    pub defines: String,
    /// `true` once the program linked successfully. Always `false` before compile.
    pub succeeded: bool,
}
