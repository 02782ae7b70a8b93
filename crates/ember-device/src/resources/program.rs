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

//! Shader program compilation, caching, and lifecycle.

use super::RebuildReport;
use crate::context::GpuContext;
use ember_core::event::Observable;
use ember_core::renderer::{
    GraphicsApi, NativeProgram, NativeShader, ProgramError, ProgramId, ProgramKey, ResourceError,
    ResourceKind, ShaderCompileInfo, ShaderError, ShaderStage, UniformLocation,
};
use std::collections::HashMap;

fn compile_stage(
    api: &mut dyn GraphicsApi,
    stage: ShaderStage,
    source: &str,
) -> Result<NativeShader, ShaderError> {
    let shader = api
        .create_shader(stage)
        .ok_or(ShaderError::CreationFailed { stage })?;
    api.shader_source(shader, source);
    api.compile_shader(shader);
    if !api.shader_compile_status(shader) {
        let log = api.shader_info_log(shader);
        api.delete_shader(shader);
        return Err(ShaderError::CompilationError { stage, log });
    }
    Ok(shader)
}

/// Compiles both stages and links them. Stage objects are deleted once the
/// link has been attempted.
pub(crate) fn link_program(
    api: &mut dyn GraphicsApi,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<NativeProgram, ProgramError> {
    if api.is_context_lost() {
        return Err(ProgramError::ContextLost);
    }
    let vertex = compile_stage(api, ShaderStage::Vertex, vertex_source)?;
    let fragment = match compile_stage(api, ShaderStage::Fragment, fragment_source) {
        Ok(shader) => shader,
        Err(err) => {
            api.delete_shader(vertex);
            return Err(err.into());
        }
    };
    let Some(program) = api.create_program() else {
        api.delete_shader(vertex);
        api.delete_shader(fragment);
        return Err(ProgramError::CreationFailed);
    };
    api.attach_shader(program, vertex);
    api.attach_shader(program, fragment);
    api.link_program(program);
    api.delete_shader(vertex);
    api.delete_shader(fragment);

    if !api.program_link_status(program) {
        let log = api.program_info_log(program);
        api.delete_program(program);
        return Err(ProgramError::LinkFailed { log });
    }
    Ok(program)
}

/// Prepends the precision statement and the defines, keeping a leading
/// `#version` directive on the first line.
fn assemble_source(precision: &str, defines: &str, source: &str) -> String {
    let (version, body) = match source.strip_prefix("#version") {
        Some(_) => match source.split_once('\n') {
            Some((first, rest)) => (first, rest),
            None => (source, ""),
        },
        None => ("", source),
    };
    let mut out = String::with_capacity(source.len() + defines.len() + 32);
    if !version.is_empty() {
        out.push_str(version);
        out.push('\n');
    }
    out.push_str("precision ");
    out.push_str(precision);
    out.push_str(" float;\n");
    if !defines.is_empty() {
        out.push_str(defines);
        out.push('\n');
    }
    out.push_str(body);
    out
}

/// A linked program and its reflection data.
#[derive(Debug)]
pub struct ProgramContext {
    native: Option<NativeProgram>,
    key: ProgramKey,
    attributes: Vec<(String, Option<u32>)>,
    uniform_names: Vec<String>,
    uniforms: HashMap<String, UniformLocation>,
    ref_count: u32,
}

impl ProgramContext {
    /// The native program, `None` while not ready.
    pub fn native(&self) -> Option<NativeProgram> {
        self.native
    }

    /// The cache key.
    pub fn key(&self) -> &ProgramKey {
        &self.key
    }

    /// Attribute names with their slots, in declaration order. Attributes the
    /// linker optimized away have no slot.
    pub fn attributes(&self) -> &[(String, Option<u32>)] {
        &self.attributes
    }

    /// The slot of a named attribute.
    pub fn attribute_slot(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, slot)| *slot)
    }

    /// The location of a named uniform.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    /// Number of live owners.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Returns `true` while the program is linked.
    pub fn is_ready(&self) -> bool {
        self.native.is_some()
    }

    fn reflect(&mut self, api: &mut dyn GraphicsApi, native: NativeProgram) {
        for (name, slot) in &mut self.attributes {
            *slot = api.get_attrib_location(native, name);
        }
        self.uniforms = self
            .uniform_names
            .iter()
            .filter_map(|name| {
                api.get_uniform_location(native, name)
                    .map(|location| (name.clone(), location))
            })
            .collect();
        self.native = Some(native);
    }
}

/// Compiles programs and shares them by key.
#[derive(Debug)]
pub struct ProgramManager {
    programs: HashMap<ProgramId, ProgramContext>,
    by_key: HashMap<ProgramKey, ProgramId>,
    next_id: usize,
    use_high_precision: bool,
    /// Raised before a program is compiled (cache misses only).
    pub before_compile: Observable<ShaderCompileInfo>,
    /// Raised after a compile attempt, successful or not.
    pub after_compile: Observable<ShaderCompileInfo>,
}

impl ProgramManager {
    /// Creates an empty manager. High precision is used only when requested
    /// and supported by the context.
    pub fn new(use_high_precision: bool) -> Self {
        Self {
            programs: HashMap::new(),
            by_key: HashMap::new(),
            next_id: 0,
            use_high_precision,
            before_compile: Observable::new(),
            after_compile: Observable::new(),
        }
    }

    /// Looks up a program.
    pub fn get(&self, id: ProgramId) -> Option<&ProgramContext> {
        self.programs.get(&id)
    }

    /// The native program and a uniform location, if both exist.
    pub fn uniform(&self, id: ProgramId, name: &str) -> Option<(NativeProgram, UniformLocation)> {
        let program = self.programs.get(&id)?;
        Some((program.native?, program.uniform_location(name)?))
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Returns `true` if no program is cached.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    fn precision(&self, ctx: &GpuContext<'_>) -> &'static str {
        if self.use_high_precision && ctx.caps.high_precision_shader {
            "highp"
        } else {
            "mediump"
        }
    }

    fn missing(&self, id: ProgramId) -> ResourceError {
        if id.0 < self.next_id {
            ResourceError::Released {
                kind: ResourceKind::Program,
                id: id.0,
            }
        } else {
            ResourceError::InvalidHandle {
                kind: ResourceKind::Program,
                id: id.0,
            }
        }
    }

    fn build(&mut self, ctx: &mut GpuContext<'_>, key: &ProgramKey) -> Result<NativeProgram, ProgramError> {
        let precision = self.precision(ctx);
        let vertex = assemble_source(precision, &key.defines, &key.vertex_source);
        let fragment = assemble_source(precision, &key.defines, &key.fragment_source);

        self.before_compile.notify(&ShaderCompileInfo {
            defines: key.defines.clone(),
            succeeded: false,
        });
        let result = link_program(ctx.api, &vertex, &fragment);
        self.after_compile.notify(&ShaderCompileInfo {
            defines: key.defines.clone(),
            succeeded: result.is_ok(),
        });
        result
    }

    /// Returns the program for `key`, compiling it on a cache miss.
    ///
    /// A cache hit adds an owner. A failed build is not cached, so a later
    /// request retries.
    pub fn create_program(
        &mut self,
        ctx: &mut GpuContext<'_>,
        key: ProgramKey,
        attributes: &[&str],
        uniforms: &[&str],
    ) -> Result<ProgramId, ProgramError> {
        if let Some(&id) = self.by_key.get(&key) {
            if let Some(program) = self.programs.get_mut(&id) {
                program.ref_count += 1;
                return Ok(id);
            }
        }

        let native = match self.build(ctx, &key) {
            Ok(native) => native,
            Err(err) => {
                log::warn!("Program build failed: {err}");
                return Err(err);
            }
        };
        let mut program = ProgramContext {
            native: None,
            key: key.clone(),
            attributes: attributes.iter().map(|a| (a.to_string(), None)).collect(),
            uniform_names: uniforms.iter().map(|u| u.to_string()).collect(),
            uniforms: HashMap::new(),
            ref_count: 1,
        };
        program.reflect(ctx.api, native);

        let id = ProgramId(self.next_id);
        self.next_id += 1;
        self.programs.insert(id, program);
        self.by_key.insert(key, id);
        log::debug!("Linked program {id:?}");
        Ok(id)
    }

    /// Adds an owner. Returns the new reference count.
    pub fn retain(&mut self, id: ProgramId) -> Result<u32, ResourceError> {
        let missing = self.missing(id);
        let program = self.programs.get_mut(&id).ok_or(missing)?;
        program.ref_count += 1;
        Ok(program.ref_count)
    }

    /// Removes an owner, deleting the program when none is left.
    /// Returns `true` if the program was deleted.
    pub fn release(&mut self, ctx: &mut GpuContext<'_>, id: ProgramId) -> Result<bool, ResourceError> {
        let missing = self.missing(id);
        let program = self.programs.get_mut(&id).ok_or(missing)?;
        program.ref_count -= 1;
        if program.ref_count > 0 {
            return Ok(false);
        }
        if let Some(program) = self.programs.remove(&id) {
            self.by_key.remove(&program.key);
            Self::destroy(ctx, &program);
        }
        Ok(true)
    }

    fn destroy(ctx: &mut GpuContext<'_>, program: &ProgramContext) {
        if let Some(native) = program.native {
            ctx.cache.forget_program(native);
            ctx.api.delete_program(native);
        }
    }

    /// Drops every native handle after a context loss.
    pub fn mark_context_lost(&mut self) {
        for program in self.programs.values_mut() {
            program.native = None;
        }
    }

    /// Re-links every cached program from its key, in creation order.
    /// Programs that fail stay not ready.
    pub fn rebuild_all(&mut self, ctx: &mut GpuContext<'_>) -> RebuildReport {
        let mut report = RebuildReport::default();
        let mut ids: Vec<ProgramId> = self.programs.keys().copied().collect();
        ids.sort();
        for id in ids {
            let Some(key) = self.programs.get(&id).map(|p| p.key.clone()) else {
                continue;
            };
            match self.build(ctx, &key) {
                Ok(native) => {
                    if let Some(program) = self.programs.get_mut(&id) {
                        program.reflect(ctx.api, native);
                    }
                    report.rebuilt += 1;
                }
                Err(err) => {
                    log::error!("Failed to rebuild program {id:?}: {err}");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Deletes every program regardless of reference counts.
    pub fn dispose_all(&mut self, ctx: &mut GpuContext<'_>) {
        for (_, program) in self.programs.drain() {
            Self::destroy(ctx, &program);
        }
        self.by_key.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateCache;
    use ember_core::renderer::Capabilities;
    use ember_infra::graphics::headless::{GlCall, HeadlessConfig, HeadlessGl};
    use std::cell::RefCell;
    use std::rc::Rc;

    const VS: &str = "attribute vec3 position;\nuniform mat4 world;\nvoid main() {}\n";
    const FS: &str = "uniform vec4 color;\nvoid main() {}\n";

    fn setup() -> (HeadlessGl, StateCache, Capabilities) {
        let mut gl = HeadlessGl::new(HeadlessConfig::version_2());
        let caps = crate::capability::probe(&mut gl, Default::default());
        (gl, StateCache::new(), caps)
    }

    #[test]
    fn identical_keys_share_one_program() {
        let (mut gl, mut cache, caps) = setup();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut programs = ProgramManager::new(true);

        let a = programs
            .create_program(&mut ctx, ProgramKey::new(VS, FS), &["position"], &["world"])
            .unwrap();
        let b = programs
            .create_program(&mut ctx, ProgramKey::new(VS, FS), &["position"], &["world"])
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(programs.get(a).unwrap().ref_count(), 2);
        assert_eq!(gl.count_calls(|c| matches!(c, GlCall::LinkProgram(_))), 1);
    }

    #[test]
    fn reflection_finds_attributes_and_uniforms() {
        let (mut gl, mut cache, caps) = setup();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut programs = ProgramManager::new(true);

        let id = programs
            .create_program(
                &mut ctx,
                ProgramKey::new(VS, FS),
                &["position", "uv"],
                &["world", "color", "missing"],
            )
            .unwrap();
        let program = programs.get(id).unwrap();
        assert!(program.attribute_slot("position").is_some());
        assert!(program.attribute_slot("uv").is_none());
        assert!(program.uniform_location("color").is_some());
        assert!(program.uniform_location("missing").is_none());
    }

    #[test]
    fn compile_failure_reports_stage_and_log() {
        let (mut gl, mut cache, caps) = setup();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut programs = ProgramManager::new(true);

        let err = programs
            .create_program(
                &mut ctx,
                ProgramKey::new(VS, "#error broken fragment\n"),
                &[],
                &[],
            )
            .unwrap_err();
        assert_eq!(err.stage(), Some(ShaderStage::Fragment));
        assert!(err.to_string().contains("broken fragment"));
        assert!(programs.is_empty());
        assert_eq!(gl.live_shaders(), 0);
    }

    #[test]
    fn stage_objects_are_deleted_after_link() {
        let (mut gl, mut cache, caps) = setup();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut programs = ProgramManager::new(true);
        programs
            .create_program(&mut ctx, ProgramKey::new(VS, FS), &[], &[])
            .unwrap();
        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.live_programs(), 1);
    }

    #[test]
    fn precision_header_follows_option() {
        let (mut gl, mut cache, caps) = setup();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut programs = ProgramManager::new(false);
        programs
            .create_program(&mut ctx, ProgramKey::new(VS, FS), &[], &[])
            .unwrap();
        assert!(gl
            .shader_sources()
            .iter()
            .all(|s| s.starts_with("precision mediump float;")));
    }

    #[test]
    fn version_directive_stays_first() {
        let assembled = assemble_source("highp", "#define A", "#version 300 es\nvoid main() {}\n");
        assert!(assembled.starts_with("#version 300 es\nprecision highp float;\n#define A\n"));
    }

    #[test]
    fn compile_events_fire_only_on_cache_miss() {
        let (mut gl, mut cache, caps) = setup();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut programs = ProgramManager::new(true);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        programs
            .after_compile
            .add(move |info: &ShaderCompileInfo| sink.borrow_mut().push(info.succeeded));

        let key = ProgramKey::new(VS, FS).with_defines("#define FOG");
        programs.create_program(&mut ctx, key.clone(), &[], &[]).unwrap();
        programs.create_program(&mut ctx, key, &[], &[]).unwrap();
        assert_eq!(*seen.borrow(), vec![true]);
    }

    #[test]
    fn release_deletes_at_zero_and_allows_recompile() {
        let (mut gl, mut cache, caps) = setup();
        let mut ctx = GpuContext::new(&mut gl, &mut cache, &caps);
        let mut programs = ProgramManager::new(true);
        let id = programs
            .create_program(&mut ctx, ProgramKey::new(VS, FS), &[], &[])
            .unwrap();
        assert!(programs.release(&mut ctx, id).unwrap());
        assert!(matches!(
            programs.release(&mut ctx, id),
            Err(ResourceError::Released { .. })
        ));
        let again = programs
            .create_program(&mut ctx, ProgramKey::new(VS, FS), &[], &[])
            .unwrap();
        assert_ne!(id, again);
        assert_eq!(gl.live_programs(), 1);
    }
}
