//! Directory entries and their typed values.

use std::collections::BTreeMap;

use tiff::tags::Type;

use crate::dng_pipeline::container::tags::TagCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub n: u32,
    pub d: u32,
}

impl Rational {
    pub fn new(n: u32, d: u32) -> Self {
        Self { n, d }
    }

    pub fn new_f32(value: f32, denominator: u32) -> Self {
        let n = (value * denominator as f32).round().clamp(0.0, u32::MAX as f32) as u32;
        Self { n, d: denominator }
    }

    pub fn as_f64(&self) -> f64 {
        if self.d == 0 { 0.0 } else { self.n as f64 / self.d as f64 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SRational {
    pub n: i32,
    pub d: i32,
}

impl SRational {
    pub fn new(n: i32, d: i32) -> Self {
        Self { n, d }
    }

    pub fn new_f32(value: f32, denominator: i32) -> Self {
        let n = (value * denominator as f32).round().clamp(i32::MIN as f32, i32::MAX as f32) as i32;
        Self { n, d: denominator }
    }

    pub fn as_f64(&self) -> f64 {
        if self.d == 0 { 0.0 } else { self.n as f64 / self.d as f64 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<Rational>),
    SRational(Vec<SRational>),
    Undefined(Vec<u8>),
}

impl Value {
    pub fn field_type(&self) -> u16 {
        match self {
            Value::Byte(_) => Type::BYTE.to_u16(),
            Value::Ascii(_) => Type::ASCII.to_u16(),
            Value::Short(_) => Type::SHORT.to_u16(),
            Value::Long(_) => Type::LONG.to_u16(),
            Value::Rational(_) => Type::RATIONAL.to_u16(),
            Value::SRational(_) => Type::SRATIONAL.to_u16(),
            Value::Undefined(_) => Type::UNDEFINED.to_u16(),
        }
    }

    /// Bytes per counted element.
    pub fn element_size(&self) -> usize {
        match self {
            Value::Byte(_) | Value::Ascii(_) | Value::Undefined(_) => 1,
            Value::Short(_) => 2,
            Value::Long(_) => 4,
            Value::Rational(_) | Value::SRational(_) => 8,
        }
    }

    pub fn count(&self) -> u32 {
        let count = match self {
            Value::Byte(v) | Value::Undefined(v) => v.len(),
            // Terminating NUL included
            Value::Ascii(s) => ascii_text(s).len() + 1,
            Value::Short(v) => v.len(),
            Value::Long(v) => v.len(),
            Value::Rational(v) => v.len(),
            Value::SRational(v) => v.len(),
        };
        count as u32
    }

    /// Little-endian payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Value::Byte(v) | Value::Undefined(v) => v.clone(),
            Value::Ascii(s) => {
                let mut bytes = ascii_text(s).to_vec();
                bytes.push(0);
                bytes
            }
            Value::Short(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Value::Long(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Value::Rational(v) => v
                .iter()
                .flat_map(|r| r.n.to_le_bytes().into_iter().chain(r.d.to_le_bytes()))
                .collect(),
            Value::SRational(v) => v
                .iter()
                .flat_map(|r| r.n.to_le_bytes().into_iter().chain(r.d.to_le_bytes()))
                .collect(),
        }
    }

    /// Integer view of BYTE, SHORT and LONG values.
    pub fn as_u32_vec(&self) -> Option<Vec<u32>> {
        match self {
            Value::Byte(v) | Value::Undefined(v) => Some(v.iter().map(|&x| x as u32).collect()),
            Value::Short(v) => Some(v.iter().map(|&x| x as u32).collect()),
            Value::Long(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Numeric view of integer and rational values.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Value::Rational(v) => Some(v.iter().map(Rational::as_f64).collect()),
            Value::SRational(v) => Some(v.iter().map(SRational::as_f64).collect()),
            other => other.as_u32_vec().map(|v| v.into_iter().map(f64::from).collect()),
        }
    }
}

/// A string ends at its first NUL, like the C string it is stored as.
fn ascii_text(s: &str) -> &[u8] {
    let bytes = s.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Short(vec![v])
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Long(vec![v])
    }
}

impl From<&[u16]> for Value {
    fn from(v: &[u16]) -> Self {
        Value::Short(v.to_vec())
    }
}

impl From<Vec<u16>> for Value {
    fn from(v: Vec<u16>) -> Self {
        Value::Short(v)
    }
}

impl<const N: usize> From<[u16; N]> for Value {
    fn from(v: [u16; N]) -> Self {
        Value::Short(v.to_vec())
    }
}

impl From<&[u32]> for Value {
    fn from(v: &[u32]) -> Self {
        Value::Long(v.to_vec())
    }
}

impl From<Vec<u32>> for Value {
    fn from(v: Vec<u32>) -> Self {
        Value::Long(v)
    }
}

impl<const N: usize> From<[u8; N]> for Value {
    fn from(v: [u8; N]) -> Self {
        Value::Byte(v.to_vec())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Ascii(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Ascii(v)
    }
}

impl From<Vec<Rational>> for Value {
    fn from(v: Vec<Rational>) -> Self {
        Value::Rational(v)
    }
}

impl From<Vec<SRational>> for Value {
    fn from(v: Vec<SRational>) -> Self {
        Value::SRational(v)
    }
}

/// One image file directory. Entries are kept sorted by tag, as TIFF requires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directory {
    entries: BTreeMap<u16, Value>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, replacing any previous value for the same tag.
    pub fn add_tag<T: TagCode, V: Into<Value>>(&mut self, tag: T, value: V) {
        self.entries.insert(tag.code(), value.into());
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (u16, &Value)> {
        self.entries.iter().map(|(tag, value)| (*tag, value))
    }

    pub fn get<T: TagCode>(&self, tag: T) -> Option<&Value> {
        self.entries.get(&tag.code())
    }

    pub fn contains<T: TagCode>(&self, tag: T) -> bool {
        self.entries.contains_key(&tag.code())
    }

    pub fn u32s<T: TagCode>(&self, tag: T) -> Option<Vec<u32>> {
        self.get(tag).and_then(Value::as_u32_vec)
    }

    pub fn u32<T: TagCode>(&self, tag: T) -> Option<u32> {
        self.u32s(tag).and_then(|v| v.first().copied())
    }

    pub fn f64s<T: TagCode>(&self, tag: T) -> Option<Vec<f64>> {
        self.get(tag).and_then(Value::as_f64_vec)
    }

    pub fn ascii<T: TagCode>(&self, tag: T) -> Option<&str> {
        match self.get(tag) {
            Some(Value::Ascii(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn bytes<T: TagCode>(&self, tag: T) -> Option<&[u8]> {
        match self.get(tag) {
            Some(Value::Byte(v)) | Some(Value::Undefined(v)) => Some(v.as_slice()),
            _ => None,
        }
    }
}
