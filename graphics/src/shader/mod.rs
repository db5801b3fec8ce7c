//! Shader programs.
//!
//! - [`compose`] expands `#include` directives against a process-wide
//!   registry filled with [`register_include`]
//! - [`ShaderProgram`] compiles, links and reflects a [`ProgramSource`], and
//!   owns the texture unit pool and uniform blocks of the program
//!
//! # Example
//!
//! ```ignore
//! use tessera_graphics::shader::{register_include, ProgramSource, ShaderProgram};
//!
//! register_include("lighting", LIGHTING_GLSL);
//!
//! let source = ProgramSource::new()
//!     .with_vertex(VERTEX_GLSL)
//!     .with_fragment("#version 410\n#include <lighting>\n...")
//!     .with_label("lit");
//! let mut program = ShaderProgram::build(&ctx, source)?;
//! program.set_uniform("tint", [1.0, 0.5, 0.25, 1.0])?;
//! program.set_texture("albedo", Some(&texture))?;
//! ```

mod blocks;
pub mod log;
mod program;
mod texture_units;
mod uniforms;

use std::collections::{BTreeMap, HashSet};

use parking_lot::RwLock;

use crate::error::GraphicsError;
use crate::types::ShaderStage;

pub use blocks::{DirtyRange, UniformBlock};
pub use program::ShaderProgram;
pub use texture_units::{TextureUnitPool, UnitAssignment};
pub use uniforms::{
    ResolvedUniform, UniformBinding, UniformBlockDescriptor, UniformDescriptor, UniformTable,
    UniformTarget,
};

static INCLUDES: RwLock<BTreeMap<String, String>> = parking_lot::const_rwlock(BTreeMap::new());

/// Register `source` under `name` for `#include` directives.
///
/// Replaces any source previously registered under the same name.
pub fn register_include(name: impl Into<String>, source: impl Into<String>) {
    let name = name.into();
    ::log::debug!("Registering shader include `{name}`");
    INCLUDES.write().insert(name, source.into());
}

/// Remove the include registered under `name`. Returns whether it existed.
pub fn unregister_include(name: &str) -> bool {
    INCLUDES.write().remove(name).is_some()
}

/// Returns true if an include is registered under `name`.
pub fn has_include(name: &str) -> bool {
    INCLUDES.read().contains_key(name)
}

/// Expand `#include` directives in `source`.
///
/// Includes are resolved recursively and each name is inserted at most once.
/// `stage` only labels the error for a missing include.
pub fn compose(source: &str, stage: ShaderStage) -> Result<String, GraphicsError> {
    tessera_core::profile_scope!("shader_compose");
    let includes = INCLUDES.read();
    let mut included = HashSet::new();
    resolve_includes(source, stage, &includes, &mut included)
}

fn resolve_includes(
    source: &str,
    stage: ShaderStage,
    includes: &BTreeMap<String, String>,
    included: &mut HashSet<String>,
) -> Result<String, GraphicsError> {
    let mut result = String::with_capacity(source.len());

    for line in source.lines() {
        let Some(name) = parse_include_directive(line.trim()) else {
            result.push_str(line);
            result.push('\n');
            continue;
        };
        if !included.insert(name.to_string()) {
            continue;
        }
        let include = includes.get(name).ok_or_else(|| GraphicsError::Compile {
            stage,
            log: format!("include not found: `{name}`"),
        })?;
        result.push_str(&resolve_includes(include, stage, includes, included)?);
        if !result.ends_with('\n') {
            result.push('\n');
        }
    }

    Ok(result)
}

/// Parse an include directive: `#include NAME`, `#include "NAME"` or
/// `#include <NAME>`.
fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("#include")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    let name = if let Some(inner) = rest.strip_prefix('"') {
        inner.strip_suffix('"')?
    } else if let Some(inner) = rest.strip_prefix('<') {
        inner.strip_suffix('>')?
    } else {
        rest
    };
    (!name.is_empty() && !name.contains(char::is_whitespace)).then_some(name)
}

/// Per-stage sources of a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramSource {
    stages: BTreeMap<ShaderStage, String>,
    label: Option<String>,
}

impl ProgramSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source of `stage`, replacing any previous one.
    pub fn with_stage(mut self, stage: ShaderStage, source: impl Into<String>) -> Self {
        self.stages.insert(stage, source.into());
        self
    }

    pub fn with_vertex(self, source: impl Into<String>) -> Self {
        self.with_stage(ShaderStage::Vertex, source)
    }

    pub fn with_fragment(self, source: impl Into<String>) -> Self {
        self.with_stage(ShaderStage::Fragment, source)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Stages in pipeline order.
    pub fn stages(&self) -> impl Iterator<Item = (ShaderStage, &str)> {
        self.stages.iter().map(|(stage, source)| (*stage, source.as_str()))
    }

    /// Check that the stages form a linkable program.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.stages.is_empty() {
            return Err(GraphicsError::configuration("program has no shader stages"));
        }
        if self.stages.contains_key(&ShaderStage::Compute) && self.stages.len() > 1 {
            return Err(GraphicsError::configuration(
                "compute shaders cannot be combined with other stages",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_include_directive() {
        assert_eq!(parse_include_directive("#include common"), Some("common"));
        assert_eq!(parse_include_directive("#include \"lib/noise\""), Some("lib/noise"));
        assert_eq!(parse_include_directive("#include <lighting>"), Some("lighting"));
        assert_eq!(parse_include_directive("#include"), None);
        assert_eq!(parse_include_directive("#includes x"), None);
        assert_eq!(parse_include_directive("#include \"unterminated"), None);
        assert_eq!(parse_include_directive("// #include x"), None);
    }

    #[test]
    fn test_compose_includes_once() {
        register_include("compose_test/consts", "const float PI = 3.14159;");
        register_include(
            "compose_test/math",
            "#include compose_test/consts\nfloat tau() { return 2.0 * PI; }",
        );

        let source = "#version 410\n#include \"compose_test/consts\"\n#include <compose_test/math>\nvoid main() {}\n";
        let composed = compose(source, ShaderStage::Fragment).unwrap();
        assert_eq!(composed.matches("const float PI").count(), 1);
        assert!(composed.contains("float tau()"));
        assert!(composed.starts_with("#version 410\n"));
    }

    #[test]
    fn test_compose_missing_include() {
        let err = compose("#include compose_test/missing\n", ShaderStage::Vertex).unwrap_err();
        match err {
            GraphicsError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(log.contains("compose_test/missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unregister_include() {
        register_include("compose_test/temporary", "float x;");
        assert!(has_include("compose_test/temporary"));
        assert!(unregister_include("compose_test/temporary"));
        assert!(!unregister_include("compose_test/temporary"));
    }

    #[test]
    fn test_program_source_validation() {
        assert!(ProgramSource::new().validate().is_err());
        assert!(ProgramSource::new().with_vertex("v").with_fragment("f").validate().is_ok());
        let mixed = ProgramSource::new()
            .with_stage(ShaderStage::Compute, "c")
            .with_vertex("v");
        assert!(matches!(mixed.validate(), Err(GraphicsError::Configuration(_))));

        let stages: Vec<_> = ProgramSource::new()
            .with_fragment("f")
            .with_vertex("v")
            .stages()
            .map(|(stage, _)| stage)
            .collect();
        assert_eq!(stages, vec![ShaderStage::Vertex, ShaderStage::Fragment]);
    }
}
