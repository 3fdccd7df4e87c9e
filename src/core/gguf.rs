//! Reader for the GGUF file header and metadata table.
//!
//! Only the fixed header and the key/value metadata are decoded; tensor
//! descriptors and weights are left to the inference engine. Arrays are
//! skipped over and summarized by element type and length so that large
//! tokenizer vocabularies do not end up in memory.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";
pub const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];

const MAX_STRING_LEN: u64 = 16 * 1024 * 1024;
const MAX_KV_COUNT: u64 = 1 << 20;
const MAX_ARRAY_DEPTH: usize = 8;

#[derive(Debug)]
pub enum GgufError {
    Io(io::Error),
    /// The file ended before the header or metadata was complete.
    Truncated,
    BadMagic([u8; 4]),
    UnsupportedVersion(u32),
    Malformed(String),
}

impl fmt::Display for GgufError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GgufError::Io(err) => write!(f, "I/O error reading GGUF file: {err}"),
            GgufError::Truncated => write!(f, "GGUF file is truncated"),
            GgufError::BadMagic(found) => write!(
                f,
                "Not a GGUF file (magic bytes {:02x} {:02x} {:02x} {:02x})",
                found[0], found[1], found[2], found[3]
            ),
            GgufError::UnsupportedVersion(version) => {
                write!(f, "Unsupported GGUF version {version}")
            }
            GgufError::Malformed(msg) => write!(f, "Malformed GGUF metadata: {msg}"),
        }
    }
}

impl std::error::Error for GgufError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GgufError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GgufError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            GgufError::Truncated
        } else {
            GgufError::Io(err)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GgufType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    Bool,
    String,
    Array,
    U64,
    I64,
    F64,
}

impl GgufType {
    fn from_raw(raw: u32) -> Result<Self, GgufError> {
        Ok(match raw {
            0 => GgufType::U8,
            1 => GgufType::I8,
            2 => GgufType::U16,
            3 => GgufType::I16,
            4 => GgufType::U32,
            5 => GgufType::I32,
            6 => GgufType::F32,
            7 => GgufType::Bool,
            8 => GgufType::String,
            9 => GgufType::Array,
            10 => GgufType::U64,
            11 => GgufType::I64,
            12 => GgufType::F64,
            other => return Err(GgufError::Malformed(format!("unknown value type {other}"))),
        })
    }

    /// Encoded size for fixed-width types
    fn fixed_size(self) -> Option<u64> {
        match self {
            GgufType::U8 | GgufType::I8 | GgufType::Bool => Some(1),
            GgufType::U16 | GgufType::I16 => Some(2),
            GgufType::U32 | GgufType::I32 | GgufType::F32 => Some(4),
            GgufType::U64 | GgufType::I64 | GgufType::F64 => Some(8),
            GgufType::String | GgufType::Array => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GgufType::U8 => "u8",
            GgufType::I8 => "i8",
            GgufType::U16 => "u16",
            GgufType::I16 => "i16",
            GgufType::U32 => "u32",
            GgufType::I32 => "i32",
            GgufType::F32 => "f32",
            GgufType::Bool => "bool",
            GgufType::String => "string",
            GgufType::Array => "array",
            GgufType::U64 => "u64",
            GgufType::I64 => "i64",
            GgufType::F64 => "f64",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GgufValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    Bool(bool),
    String(String),
    Array { element_type: GgufType, len: u64 },
    U64(u64),
    I64(i64),
    F64(f64),
}

impl GgufValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            GgufValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Integer view of any non-negative integer value
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            GgufValue::U8(v) => Some(v.into()),
            GgufValue::U16(v) => Some(v.into()),
            GgufValue::U32(v) => Some(v.into()),
            GgufValue::U64(v) => Some(v),
            GgufValue::I8(v) => u64::try_from(v).ok(),
            GgufValue::I16(v) => u64::try_from(v).ok(),
            GgufValue::I32(v) => u64::try_from(v).ok(),
            GgufValue::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for GgufValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GgufValue::U8(v) => write!(f, "{v}"),
            GgufValue::I8(v) => write!(f, "{v}"),
            GgufValue::U16(v) => write!(f, "{v}"),
            GgufValue::I16(v) => write!(f, "{v}"),
            GgufValue::U32(v) => write!(f, "{v}"),
            GgufValue::I32(v) => write!(f, "{v}"),
            GgufValue::F32(v) => write!(f, "{v}"),
            GgufValue::Bool(v) => write!(f, "{v}"),
            GgufValue::String(v) => write!(f, "{v}"),
            GgufValue::Array { element_type, len } => {
                write!(f, "[{}; {len}]", element_type.name())
            }
            GgufValue::U64(v) => write!(f, "{v}"),
            GgufValue::I64(v) => write!(f, "{v}"),
            GgufValue::F64(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GgufHeader {
    pub version: u32,
    pub tensor_count: u64,
    pub metadata: Vec<(String, GgufValue)>,
}

impl GgufHeader {
    pub fn get(&self, key: &str) -> Option<&GgufValue> {
        self.metadata
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn architecture(&self) -> Option<&str> {
        self.get("general.architecture").and_then(GgufValue::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("general.name").and_then(GgufValue::as_str)
    }

    /// Training context length, stored under `<architecture>.context_length`
    pub fn context_length(&self) -> Option<u64> {
        let arch = self.architecture()?;
        self.get(&format!("{arch}.context_length"))
            .and_then(GgufValue::as_u64)
    }
}

/// Read the header of the GGUF file at `path`.
pub fn read_header_from_path(path: &Path) -> Result<GgufHeader, GgufError> {
    let file = File::open(path)?;
    read_header(BufReader::new(file))
}

pub fn read_header<R: Read>(reader: R) -> Result<GgufHeader, GgufError> {
    let mut reader = GgufReader { inner: reader };

    let mut magic = [0u8; 4];
    reader.inner.read_exact(&mut magic)?;
    if magic != GGUF_MAGIC {
        return Err(GgufError::BadMagic(magic));
    }

    let version = reader.u32()?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(GgufError::UnsupportedVersion(version));
    }

    let tensor_count = reader.u64()?;
    let kv_count = reader.u64()?;
    if kv_count > MAX_KV_COUNT {
        return Err(GgufError::Malformed(format!(
            "metadata count {kv_count} is implausibly large"
        )));
    }

    let mut metadata = Vec::with_capacity(kv_count as usize);
    for _ in 0..kv_count {
        let key = reader.string()?;
        let value_type = GgufType::from_raw(reader.u32()?)?;
        let value = reader.value(value_type, 0)?;
        metadata.push((key, value));
    }

    Ok(GgufHeader {
        version,
        tensor_count,
        metadata,
    })
}

struct GgufReader<R> {
    inner: R,
}

impl<R: Read> GgufReader<R> {
    fn array<const N: usize>(&mut self) -> Result<[u8; N], GgufError> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn u32(&mut self) -> Result<u32, GgufError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, GgufError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String, GgufError> {
        let len = self.u64()?;
        if len > MAX_STRING_LEN {
            return Err(GgufError::Malformed(format!(
                "string length {len} exceeds limit"
            )));
        }
        let mut buf = vec![0u8; len as usize];
        self.inner.read_exact(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn skip(&mut self, bytes: u64) -> Result<(), GgufError> {
        let copied = io::copy(&mut (&mut self.inner).take(bytes), &mut io::sink())?;
        if copied < bytes {
            return Err(GgufError::Truncated);
        }
        Ok(())
    }

    fn value(&mut self, value_type: GgufType, depth: usize) -> Result<GgufValue, GgufError> {
        Ok(match value_type {
            GgufType::U8 => GgufValue::U8(u8::from_le_bytes(self.array()?)),
            GgufType::I8 => GgufValue::I8(i8::from_le_bytes(self.array()?)),
            GgufType::U16 => GgufValue::U16(u16::from_le_bytes(self.array()?)),
            GgufType::I16 => GgufValue::I16(i16::from_le_bytes(self.array()?)),
            GgufType::U32 => GgufValue::U32(u32::from_le_bytes(self.array()?)),
            GgufType::I32 => GgufValue::I32(i32::from_le_bytes(self.array()?)),
            GgufType::F32 => GgufValue::F32(f32::from_le_bytes(self.array()?)),
            GgufType::Bool => GgufValue::Bool(self.array::<1>()?[0] != 0),
            GgufType::String => GgufValue::String(self.string()?),
            GgufType::U64 => GgufValue::U64(u64::from_le_bytes(self.array()?)),
            GgufType::I64 => GgufValue::I64(i64::from_le_bytes(self.array()?)),
            GgufType::F64 => GgufValue::F64(f64::from_le_bytes(self.array()?)),
            GgufType::Array => {
                if depth >= MAX_ARRAY_DEPTH {
                    return Err(GgufError::Malformed("arrays nested too deeply".to_string()));
                }
                let element_type = GgufType::from_raw(self.u32()?)?;
                let len = self.u64()?;
                self.skip_elements(element_type, len, depth + 1)?;
                GgufValue::Array { element_type, len }
            }
        })
    }

    fn skip_elements(
        &mut self,
        element_type: GgufType,
        len: u64,
        depth: usize,
    ) -> Result<(), GgufError> {
        if let Some(size) = element_type.fixed_size() {
            let total = size
                .checked_mul(len)
                .ok_or_else(|| GgufError::Malformed(format!("array length {len} overflows")))?;
            return self.skip(total);
        }
        for _ in 0..len {
            match element_type {
                GgufType::String => {
                    let str_len = self.u64()?;
                    if str_len > MAX_STRING_LEN {
                        return Err(GgufError::Malformed(format!(
                            "string length {str_len} exceeds limit"
                        )));
                    }
                    self.skip(str_len)?;
                }
                _ => {
                    self.value(element_type, depth)?;
                }
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_header_and_metadata() {
        let bytes = GgufBuilder::new()
            .tensors(291)
            .string("general.architecture", "llama")
            .string("general.name", "TinyLlama")
            .u32("llama.context_length", 2048)
            .f32("llama.rope.freq_base", 10000.0)
            .bool("tokenizer.ggml.add_bos_token", true)
            .string_array("tokenizer.ggml.tokens", &["<s>", "</s>", "hello"])
            .i32_array("tokenizer.ggml.token_type", &[1, 1, 3])
            .u32("general.file_type", 15)
            .build();

        let header = read_header(Cursor::new(bytes)).unwrap();
        assert_eq!(header.version, 3);
        assert_eq!(header.tensor_count, 291);
        assert_eq!(header.metadata.len(), 8);
        assert_eq!(header.architecture(), Some("llama"));
        assert_eq!(header.name(), Some("TinyLlama"));
        assert_eq!(header.context_length(), Some(2048));
        assert_eq!(
            header.get("tokenizer.ggml.tokens"),
            Some(&GgufValue::Array {
                element_type: GgufType::String,
                len: 3
            })
        );
        assert_eq!(
            header.get("tokenizer.ggml.token_type").unwrap().to_string(),
            "[i32; 3]"
        );
        // Entries after the arrays decode correctly only if the arrays were skipped exactly.
        assert_eq!(header.get("general.file_type"), Some(&GgufValue::U32(15)));
    }

    #[test]
    fn rejects_wrong_magic() {
        let err = read_header(Cursor::new(b"GGML\x03\x00\x00\x00".to_vec())).unwrap_err();
        assert!(matches!(err, GgufError::BadMagic(magic) if &magic == b"GGML"));
    }

    #[test]
    fn rejects_old_versions() {
        let bytes = GgufBuilder::new().version(1).build();
        let err = read_header(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, GgufError::UnsupportedVersion(1)));
    }

    #[test]
    fn truncated_metadata_is_reported() {
        let mut bytes = minimal_model_bytes();
        bytes.truncate(bytes.len() - 3);
        let err = read_header(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, GgufError::Truncated));

        let err = read_header(Cursor::new(b"GG".to_vec())).unwrap_err();
        assert!(matches!(err, GgufError::Truncated));
    }

    #[test]
    fn unknown_value_type_is_malformed() {
        let mut bytes = b"GGUF".to_vec();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(b"key");
        bytes.extend_from_slice(&42u32.to_le_bytes());

        let err = read_header(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, GgufError::Malformed(_)));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tiny.gguf");
        std::fs::write(&path, minimal_model_bytes()).unwrap();

        let header = read_header_from_path(&path).unwrap();
        assert_eq!(header.name(), Some("tiny-test"));
        assert_eq!(header.context_length(), Some(4096));
    }
}
