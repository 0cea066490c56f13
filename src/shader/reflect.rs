//! WGSL front-end: parse, validate and reflect a shader stage with naga.

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::backend::{UniformKind, UniformLocation};
use crate::errors::{ShaderError, ShaderStage};

/// Group and binding of the uniform block holding the well-known uniforms.
pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
/// Global name of the primary texture.
pub const SOURCE_TEXTURE: &str = "source";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub location: UniformLocation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformBlockLayout {
    pub size: u32,
    pub members: Vec<UniformMember>,
}

impl UniformBlockLayout {
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.members
            .iter()
            .find(|member| member.name == name)
            .map(|member| member.location)
    }

    pub fn name_at(&self, location: UniformLocation) -> Option<&str> {
        self.members
            .iter()
            .find(|member| member.location == location)
            .map(|member| member.name.as_str())
    }

    /// Combines the blocks seen by two stages of one program. Stages share a single buffer, so
    /// members with the same name must agree on offset and type.
    pub fn merge(&mut self, other: &UniformBlockLayout) -> Result<(), String> {
        for member in &other.members {
            match self.location(&member.name) {
                Some(existing) if existing != member.location => {
                    return Err(format!(
                        "uniform {} is declared differently between stages",
                        member.name
                    ));
                }
                Some(_) => {}
                None => self.members.push(member.clone()),
            }
        }
        self.size = self.size.max(other.size);
        Ok(())
    }

    /// Size of the CPU-side copy of the block, padded for uniform buffer binding.
    pub fn buffer_size(&self) -> usize {
        let size = self.size.max(16) as usize;
        (size + 15) & !15
    }
}

#[derive(Debug, Clone, Default)]
pub struct StageReflection {
    pub entry_point: Option<String>,
    pub workgroup_size: [u32; 3],
    pub uniforms: UniformBlockLayout,
    pub uses_source_texture: bool,
}

/// Parses and validates one stage, returning the entry point for `stage` and the uniform block
/// layout.
pub fn reflect_stage(
    stage: ShaderStage,
    file: &str,
    text: &str,
) -> Result<StageReflection, ShaderError> {
    let module = naga::front::wgsl::parse_str(text).map_err(|error| ShaderError::Compile {
        stage,
        file: file.to_string(),
        message: error.emit_to_string(text),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|error| ShaderError::Compile {
            stage,
            file: file.to_string(),
            message: error.emit_to_string(text),
        })?;

    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
        ShaderStage::Compute => naga::ShaderStage::Compute,
    };

    let mut reflection = StageReflection::default();
    if let Some(entry) = module.entry_points.iter().find(|e| e.stage == naga_stage) {
        reflection.entry_point = Some(entry.name.clone());
        reflection.workgroup_size = entry.workgroup_size;
    }

    for (_, global) in module.global_variables.iter() {
        if global.name.as_deref() == Some(SOURCE_TEXTURE) {
            reflection.uses_source_texture = true;
        }
        let is_uniform_block = global.space == naga::AddressSpace::Uniform
            && global
                .binding
                .as_ref()
                .is_some_and(|b| b.group == UNIFORM_GROUP && b.binding == UNIFORM_BINDING);
        if !is_uniform_block {
            continue;
        }
        if let naga::TypeInner::Struct { members, span } = &module.types[global.ty].inner {
            reflection.uniforms.size = *span;
            for member in members {
                let Some(name) = member.name.clone() else {
                    continue;
                };
                let kind = uniform_kind(&module.types[member.ty].inner);
                reflection.uniforms.members.push(UniformMember {
                    name,
                    location: UniformLocation {
                        offset: member.offset,
                        kind,
                    },
                });
            }
        }
    }

    Ok(reflection)
}

fn uniform_kind(inner: &naga::TypeInner) -> UniformKind {
    use naga::{ScalarKind, TypeInner, VectorSize};

    match inner {
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float && scalar.width == 4 => UniformKind::Mat4,
        TypeInner::Vector {
            size: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float && scalar.width == 4 => UniformKind::Vec4,
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Float => UniformKind::F32,
            ScalarKind::Sint => UniformKind::I32,
            ScalarKind::Uint => UniformKind::U32,
            _ => UniformKind::Other,
        },
        _ => UniformKind::Other,
    }
}

/// Reflects both stages of a program and checks they link: each has its entry point and their
/// uniform blocks agree.
pub fn reflect_program(
    name: &str,
    vertex: (&str, &str),
    fragment: (&str, &str),
) -> Result<(StageReflection, StageReflection, UniformBlockLayout), ShaderError> {
    let vs = reflect_stage(ShaderStage::Vertex, vertex.0, vertex.1)?;
    let ps = reflect_stage(ShaderStage::Fragment, fragment.0, fragment.1)?;

    let link_error = |message: String| ShaderError::Link {
        name: name.to_string(),
        message,
    };
    if vs.entry_point.is_none() {
        return Err(link_error(format!("{} has no @vertex entry point", vertex.0)));
    }
    if ps.entry_point.is_none() {
        return Err(link_error(format!("{} has no @fragment entry point", fragment.0)));
    }

    let mut uniforms = vs.uniforms.clone();
    uniforms.merge(&ps.uniforms).map_err(link_error)?;
    Ok((vs, ps, uniforms))
}
