// src/uniform.rs
//! Uniform values, locations and the CPU-side uniform cache.
//!
//! A compiled program exposes a [`UniformMap`] (name → location). Render plugins look
//! up the slot they care about and push a value through
//! [`RenderContext::set`](crate::render_context::RenderContext::set), which writes to
//! the graphics context and mirrors the value into the program's [`UniformCache`].

use std::collections::{BTreeMap, HashMap};

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// A value that can be bound to a shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    /// Type name as it appears in a shader declaration.
    pub fn glsl_type(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Int(_) => "int",
            UniformValue::Bool(_) => "bool",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
            UniformValue::Mat3(_) => "mat3",
            UniformValue::Mat4(_) => "mat4",
        }
    }

    /// Raw little-endian bytes for upload. Bools are widened to a 32-bit int.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Float(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Int(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Bool(v) => bytemuck::bytes_of(&(*v as u32)).to_vec(),
            UniformValue::Vec2(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Mat3(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Mat4(v) => bytemuck::bytes_of(v).to_vec(),
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            UniformValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        UniformValue::Mat3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Opaque location of a uniform inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

/// One entry of a program's uniform table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uniform {
    pub name: String,
    pub location: UniformLocation,
}

/// Uniform-name → location table of a linked program.
#[derive(Debug, Clone, Default)]
pub struct UniformMap {
    entries: HashMap<String, Uniform>,
}

impl UniformMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign locations in name order, starting at 0.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sorted: Vec<String> = names.into_iter().map(Into::into).collect();
        sorted.sort();
        sorted.dedup();

        let mut map = Self::new();
        for (index, name) in sorted.into_iter().enumerate() {
            map.insert(name, UniformLocation(index as u32));
        }
        map
    }

    pub fn insert(&mut self, name: impl Into<String>, location: UniformLocation) {
        let name = name.into();
        self.entries
            .insert(name.clone(), Uniform { name, location });
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Uniform> {
        self.entries.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uniform> {
        self.entries.values()
    }
}

/// CPU-side record of the latest value written to each uniform.
///
/// Ordered by name so shader declarations generated from it are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformCache {
    values: BTreeMap<String, UniformValue>,
}

impl UniformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        self.values.insert(name.into(), value.into());
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_locations_follow_name_order() {
        let map = UniformMap::from_names(["time", "color", "time", "amount"]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("amount").unwrap().location, UniformLocation(0));
        assert_eq!(map.get("color").unwrap().location, UniformLocation(1));
        assert_eq!(map.get("time").unwrap().location, UniformLocation(2));
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn test_value_bytes() {
        assert_eq!(UniformValue::Float(1.0).to_bytes(), 1.0f32.to_le_bytes().to_vec());
        assert_eq!(UniformValue::Bool(true).to_bytes(), 1u32.to_le_bytes().to_vec());
        assert_eq!(UniformValue::Vec3(Vec3::ONE).to_bytes().len(), 12);
        assert_eq!(UniformValue::Mat4(Mat4::IDENTITY).to_bytes().len(), 64);
    }

    #[test]
    fn test_cache_overwrites() {
        let mut cache = UniformCache::new();
        cache.insert("time", 0.5f32);
        cache.insert("time", 1.5f32);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("time").and_then(UniformValue::as_float), Some(1.5));
    }
}
