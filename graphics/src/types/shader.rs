//! Shader stages, uniform types and uniform values.

use std::fmt;

use super::TextureDimension;

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Tessellation control shader.
    TessControl,
    /// Tessellation evaluation shader.
    TessEvaluation,
    /// Geometry shader.
    Geometry,
    /// Fragment shader.
    Fragment,
    /// Compute shader.
    Compute,
}

impl ShaderStage {
    /// Lowercase stage name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::TessControl => "tessellation control",
            Self::TessEvaluation => "tessellation evaluation",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared GLSL type of a uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    UInt,
    Bool,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler2DArray,
    Sampler2DShadow,
}

impl UniformType {
    /// Parse a GLSL type keyword.
    pub fn from_glsl(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "int" => Self::Int,
            "ivec2" => Self::IVec2,
            "ivec3" => Self::IVec3,
            "ivec4" => Self::IVec4,
            "uint" => Self::UInt,
            "bool" => Self::Bool,
            "mat2" => Self::Mat2,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            "sampler3D" => Self::Sampler3D,
            "samplerCube" => Self::SamplerCube,
            "sampler2DArray" => Self::Sampler2DArray,
            "sampler2DShadow" => Self::Sampler2DShadow,
            _ => return None,
        })
    }

    /// GLSL type keyword.
    pub fn glsl_name(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Int => "int",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::UInt => "uint",
            Self::Bool => "bool",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Sampler2D => "sampler2D",
            Self::Sampler3D => "sampler3D",
            Self::SamplerCube => "samplerCube",
            Self::Sampler2DArray => "sampler2DArray",
            Self::Sampler2DShadow => "sampler2DShadow",
        }
    }

    /// Returns true for sampler types.
    pub fn is_sampler(&self) -> bool {
        self.texture_dimension().is_some()
    }

    /// Texture shape a sampler of this type reads.
    pub fn texture_dimension(&self) -> Option<TextureDimension> {
        match self {
            Self::Sampler2D | Self::Sampler2DShadow => Some(TextureDimension::D2),
            Self::Sampler3D => Some(TextureDimension::D3),
            Self::SamplerCube => Some(TextureDimension::Cube),
            Self::Sampler2DArray => Some(TextureDimension::D2Array),
            _ => None,
        }
    }

    /// Sampler type that reads textures of `dimension`.
    pub fn sampler_for(dimension: TextureDimension) -> Self {
        match dimension {
            TextureDimension::D2 => Self::Sampler2D,
            TextureDimension::D3 => Self::Sampler3D,
            TextureDimension::Cube => Self::SamplerCube,
            TextureDimension::D2Array => Self::Sampler2DArray,
        }
    }

    /// std140 base alignment in bytes.
    pub fn std140_align(&self) -> u32 {
        match self {
            Self::Vec2 | Self::IVec2 => 8,
            Self::Vec3 | Self::Vec4 | Self::IVec3 | Self::IVec4 => 16,
            Self::Mat2 | Self::Mat3 | Self::Mat4 => 16,
            _ => 4,
        }
    }

    /// std140 size in bytes of one element.
    ///
    /// Matrix columns are padded to 16 bytes.
    pub fn std140_size(&self) -> u32 {
        match self {
            Self::Vec2 | Self::IVec2 => 8,
            Self::Vec3 | Self::IVec3 => 12,
            Self::Vec4 | Self::IVec4 => 16,
            Self::Mat2 => 32,
            Self::Mat3 => 48,
            Self::Mat4 => 64,
            _ => 4,
        }
    }

    /// std140 stride between array elements.
    pub fn std140_array_stride(&self) -> u32 {
        self.std140_size().next_multiple_of(16)
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A value written to a non-sampler uniform.
///
/// Matrices are column-major. Samplers are assigned through the texture API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    UInt(u32),
    Bool(bool),
    Mat2([[f32; 2]; 2]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    /// The GLSL type this value matches.
    pub fn uniform_type(&self) -> UniformType {
        match self {
            Self::Float(_) => UniformType::Float,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Vec3(_) => UniformType::Vec3,
            Self::Vec4(_) => UniformType::Vec4,
            Self::Int(_) => UniformType::Int,
            Self::IVec2(_) => UniformType::IVec2,
            Self::IVec3(_) => UniformType::IVec3,
            Self::IVec4(_) => UniformType::IVec4,
            Self::UInt(_) => UniformType::UInt,
            Self::Bool(_) => UniformType::Bool,
            Self::Mat2(_) => UniformType::Mat2,
            Self::Mat3(_) => UniformType::Mat3,
            Self::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Encode the value as it is laid out inside a std140 uniform block.
    pub fn std140_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Vec2(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Vec3(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Vec4(v) => bytemuck::cast_slice(v).to_vec(),
            Self::Int(v) => bytemuck::bytes_of(v).to_vec(),
            Self::IVec2(v) => bytemuck::cast_slice(v).to_vec(),
            Self::IVec3(v) => bytemuck::cast_slice(v).to_vec(),
            Self::IVec4(v) => bytemuck::cast_slice(v).to_vec(),
            Self::UInt(v) => bytemuck::bytes_of(v).to_vec(),
            Self::Bool(v) => bytemuck::bytes_of(&u32::from(*v)).to_vec(),
            Self::Mat2(columns) => padded_columns(columns),
            Self::Mat3(columns) => padded_columns(columns),
            Self::Mat4(columns) => bytemuck::cast_slice(columns).to_vec(),
        }
    }
}

/// Lay out matrix columns with each column padded to a vec4.
fn padded_columns<const N: usize>(columns: &[[f32; N]; N]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(N * 16);
    for column in columns {
        for component in column {
            bytes.extend_from_slice(&component.to_ne_bytes());
        }
        bytes.resize(bytes.len() + (4 - N) * 4, 0);
    }
    bytes
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        Self::UInt(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<[[f32; 4]; 4]> for UniformValue {
    fn from(v: [[f32; 4]; 4]) -> Self {
        Self::Mat4(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glsl_names_roundtrip_keywords() {
        for keyword in ["float", "vec3", "ivec4", "mat3", "samplerCube", "sampler2DShadow"] {
            let ty = UniformType::from_glsl(keyword).unwrap();
            assert_eq!(ty.glsl_name(), keyword);
        }
        assert_eq!(UniformType::from_glsl("dvec3"), None);
    }

    #[test]
    fn test_std140_sizes() {
        assert_eq!(UniformType::Vec3.std140_size(), 12);
        assert_eq!(UniformType::Vec3.std140_align(), 16);
        assert_eq!(UniformType::Float.std140_array_stride(), 16);
        assert_eq!(UniformType::Mat3.std140_size(), 48);
    }

    #[test]
    fn test_mat3_padding() {
        let value = UniformValue::Mat3([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        let bytes = value.std140_bytes();
        assert_eq!(bytes.len(), 48);
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(&floats[0..5], &[1.0, 2.0, 3.0, 0.0, 4.0]);
    }

    #[test]
    fn test_bool_is_four_bytes() {
        assert_eq!(UniformValue::Bool(true).std140_bytes(), 1u32.to_ne_bytes().to_vec());
    }

    #[test]
    fn test_sampler_dimension() {
        assert!(UniformType::Sampler2DArray.is_sampler());
        assert!(!UniformType::Mat4.is_sampler());
        assert_eq!(
            UniformType::Sampler2DShadow.texture_dimension(),
            Some(TextureDimension::D2)
        );
    }
}
