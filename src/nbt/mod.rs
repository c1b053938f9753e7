//! Writer for the big-endian NBT binary tag format.
//!
//! Tags are written straight to the output stream as they are produced.
//! Nested scopes (compounds and byte arrays) are tracked in a small arena so
//! that misuse can be detected: writing into a scope while one of its
//! children is still open is an error, while closing scopes in the wrong
//! order only produces warnings.

mod schematic;

pub use schematic::write_schematic;

use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Hard failures of the tag writer.
#[derive(Error, Debug)]
pub enum NbtError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("scope '{0}' has an open child scope")]
    ScopeHasOpenChild(String),

    #[error("scope '{0}' is already closed")]
    ScopeClosed(String),

    #[error("byte array '{name}' overflow: declared {declared} bytes, got {attempted}")]
    ByteArrayOverflow {
        name: String,
        declared: usize,
        attempted: usize,
    },

    #[error("string of {0} bytes does not fit a u16 length prefix")]
    StringTooLong(usize),

    #[error("byte array of {0} bytes does not fit an i32 length prefix")]
    ArrayTooLong(usize),
}

/// Non-fatal diagnostics reported when a scope is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NbtWarning {
    /// The scope was closed while one of its children was still open.
    ClosedBeforeChild { scope: String },
    /// The scope was closed after its parent had already been closed.
    ClosedAfterParent { scope: String },
    /// A byte array received a different number of bytes than declared.
    LengthMismatch {
        scope: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for NbtWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NbtWarning::ClosedBeforeChild { scope } => {
                write!(f, "tag '{}' closed before its child", scope)
            }
            NbtWarning::ClosedAfterParent { scope } => {
                write!(f, "tag '{}' closed after its parent", scope)
            }
            NbtWarning::LengthMismatch {
                scope,
                expected,
                actual,
            } => write!(
                f,
                "tag '{}' length mismatch: expected {} got {}",
                scope, expected, actual
            ),
        }
    }
}

/// Tag type identifiers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
}

/// Handle to an open compound tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compound(usize);

/// Handle to an open byte array tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteArray(usize);

/// Implemented by the scope handles accepted by [`NbtWriter::close`].
pub trait NbtScope: Copy + sealed::Sealed {
    #[doc(hidden)]
    fn scope_index(self) -> usize;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Compound {}
    impl Sealed for super::ByteArray {}
}

impl NbtScope for Compound {
    fn scope_index(self) -> usize {
        self.0
    }
}

impl NbtScope for ByteArray {
    fn scope_index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
enum ScopeKind {
    Compound,
    ByteArray { declared: usize, written: usize },
}

#[derive(Debug)]
struct Scope {
    name: String,
    kind: ScopeKind,
    parent: Option<usize>,
    has_child: bool,
    closed: bool,
}

/// Streaming NBT writer rooted at a single named compound.
pub struct NbtWriter<W: Write> {
    out: W,
    scopes: Vec<Scope>,
}

impl<W: Write> NbtWriter<W> {
    /// Start a document by writing the header of the root compound.
    pub fn new(out: W, root_name: &str) -> Result<Self, NbtError> {
        let mut writer = Self {
            out,
            scopes: Vec::new(),
        };
        writer.write_tag_header(TagKind::Compound, root_name)?;
        writer.scopes.push(Scope {
            name: root_name.to_string(),
            kind: ScopeKind::Compound,
            parent: None,
            has_child: false,
            closed: false,
        });
        Ok(writer)
    }

    /// The root compound.
    pub fn root(&self) -> Compound {
        Compound(0)
    }

    pub fn write_byte_tag(&mut self, scope: Compound, name: &str, value: u8) -> Result<(), NbtError> {
        self.ensure_writable(scope.0)?;
        self.write_tag_header(TagKind::Byte, name)?;
        self.out.write_all(&[value])?;
        Ok(())
    }

    pub fn write_short_tag(&mut self, scope: Compound, name: &str, value: i16) -> Result<(), NbtError> {
        self.ensure_writable(scope.0)?;
        self.write_tag_header(TagKind::Short, name)?;
        self.out.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_int_tag(&mut self, scope: Compound, name: &str, value: i32) -> Result<(), NbtError> {
        self.ensure_writable(scope.0)?;
        self.write_tag_header(TagKind::Int, name)?;
        self.out.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_string_tag(&mut self, scope: Compound, name: &str, value: &str) -> Result<(), NbtError> {
        self.ensure_writable(scope.0)?;
        self.write_tag_header(TagKind::String, name)?;
        self.write_string(value)
    }

    /// Write an empty list whose element kind is Byte.
    pub fn write_empty_list_tag(&mut self, scope: Compound, name: &str) -> Result<(), NbtError> {
        self.ensure_writable(scope.0)?;
        self.write_tag_header(TagKind::List, name)?;
        self.out.write_all(&[TagKind::Byte as u8])?;
        self.out.write_all(&0i32.to_be_bytes())?;
        Ok(())
    }

    /// Write a complete byte array in one go.
    pub fn write_byte_array_tag(&mut self, scope: Compound, name: &str, bytes: &[u8]) -> Result<(), NbtError> {
        let array = self.begin_byte_array(scope, name, bytes.len())?;
        self.write_array_bytes(array, bytes)?;
        self.close(array)?;
        Ok(())
    }

    /// Open a nested compound inside `scope`.
    pub fn begin_compound(&mut self, scope: Compound, name: &str) -> Result<Compound, NbtError> {
        self.ensure_writable(scope.0)?;
        self.write_tag_header(TagKind::Compound, name)?;
        Ok(Compound(self.push_scope(scope.0, name, ScopeKind::Compound)))
    }

    /// Open a byte array of `len` bytes; its content follows through
    /// [`write_array_bytes`](Self::write_array_bytes).
    pub fn begin_byte_array(&mut self, scope: Compound, name: &str, len: usize) -> Result<ByteArray, NbtError> {
        self.ensure_writable(scope.0)?;
        let prefix = i32::try_from(len).map_err(|_| NbtError::ArrayTooLong(len))?;
        self.write_tag_header(TagKind::ByteArray, name)?;
        self.out.write_all(&prefix.to_be_bytes())?;
        let kind = ScopeKind::ByteArray {
            declared: len,
            written: 0,
        };
        Ok(ByteArray(self.push_scope(scope.0, name, kind)))
    }

    /// Append content to an open byte array.
    pub fn write_array_bytes(&mut self, array: ByteArray, bytes: &[u8]) -> Result<(), NbtError> {
        self.ensure_writable(array.0)?;
        let scope = &mut self.scopes[array.0];
        if let ScopeKind::ByteArray { declared, written } = &mut scope.kind {
            let attempted = *written + bytes.len();
            if attempted > *declared {
                return Err(NbtError::ByteArrayOverflow {
                    name: scope.name.clone(),
                    declared: *declared,
                    attempted,
                });
            }
            *written = attempted;
        }
        self.out.write_all(bytes)?;
        Ok(())
    }

    /// Close a scope.
    ///
    /// Ordering problems are returned (and logged) as warnings; only I/O
    /// failures and closing the same scope twice are errors.
    pub fn close<S: NbtScope>(&mut self, scope: S) -> Result<Vec<NbtWarning>, NbtError> {
        let index = scope.scope_index();
        if self.scopes[index].closed {
            return Err(NbtError::ScopeClosed(self.scopes[index].name.clone()));
        }

        let mut warnings = Vec::new();
        let name = self.scopes[index].name.clone();

        match self.scopes[index].kind {
            ScopeKind::Compound => self.out.write_all(&[TagKind::End as u8])?,
            ScopeKind::ByteArray { declared, written } => {
                if declared != written {
                    warnings.push(NbtWarning::LengthMismatch {
                        scope: name.clone(),
                        expected: declared,
                        actual: written,
                    });
                }
            }
        }

        if self.scopes[index].has_child {
            warnings.push(NbtWarning::ClosedBeforeChild { scope: name.clone() });
        }

        if let Some(parent) = self.scopes[index].parent {
            if self.scopes[parent].closed {
                warnings.push(NbtWarning::ClosedAfterParent { scope: name });
            }
            self.scopes[parent].has_child = false;
        }

        self.scopes[index].closed = true;

        for warning in &warnings {
            log::warn!("NBT: {}", warning);
        }
        Ok(warnings)
    }

    /// Close the root (if still open), flush and hand back the stream.
    pub fn finish(mut self) -> Result<W, NbtError> {
        if !self.scopes[0].closed {
            self.close(Compound(0))?;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn push_scope(&mut self, parent: usize, name: &str, kind: ScopeKind) -> usize {
        self.scopes[parent].has_child = true;
        self.scopes.push(Scope {
            name: name.to_string(),
            kind,
            parent: Some(parent),
            has_child: false,
            closed: false,
        });
        self.scopes.len() - 1
    }

    fn ensure_writable(&self, index: usize) -> Result<(), NbtError> {
        let scope = &self.scopes[index];
        if scope.closed {
            return Err(NbtError::ScopeClosed(scope.name.clone()));
        }
        if scope.has_child {
            return Err(NbtError::ScopeHasOpenChild(scope.name.clone()));
        }
        Ok(())
    }

    fn write_tag_header(&mut self, kind: TagKind, name: &str) -> Result<(), NbtError> {
        self.out.write_all(&[kind as u8])?;
        self.write_string(name)
    }

    fn write_string(&mut self, value: &str) -> Result<(), NbtError> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| NbtError::StringTooLong(bytes.len()))?;
        self.out.write_all(&len.to_be_bytes())?;
        self.out.write_all(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(kind: TagKind, name: &str) -> Vec<u8> {
        let mut bytes = vec![kind as u8];
        bytes.extend_from_slice(&(name.len() as u16).to_be_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes
    }

    #[test]
    fn test_scalar_tags_are_big_endian() {
        let mut writer = NbtWriter::new(Vec::new(), "Root").unwrap();
        let root = writer.root();
        writer.write_short_tag(root, "Width", 0x0102).unwrap();
        writer.write_int_tag(root, "Count", 0x01020304).unwrap();
        writer.write_byte_tag(root, "Flag", 7).unwrap();
        let bytes = writer.finish().unwrap();

        let mut expected = header(TagKind::Compound, "Root");
        expected.extend(header(TagKind::Short, "Width"));
        expected.extend([0x01, 0x02]);
        expected.extend(header(TagKind::Int, "Count"));
        expected.extend([0x01, 0x02, 0x03, 0x04]);
        expected.extend(header(TagKind::Byte, "Flag"));
        expected.push(7);
        expected.push(0);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_string_and_empty_list() {
        let mut writer = NbtWriter::new(Vec::new(), "").unwrap();
        let root = writer.root();
        writer.write_string_tag(root, "Materials", "Alpha").unwrap();
        writer.write_empty_list_tag(root, "Entities").unwrap();
        let bytes = writer.finish().unwrap();

        let mut expected = header(TagKind::Compound, "");
        expected.extend(header(TagKind::String, "Materials"));
        expected.extend([0, 5]);
        expected.extend(b"Alpha");
        expected.extend(header(TagKind::List, "Entities"));
        expected.extend([1, 0, 0, 0, 0]);
        expected.push(0);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_byte_array_length_prefix() {
        let mut writer = NbtWriter::new(Vec::new(), "R").unwrap();
        let root = writer.root();
        writer.write_byte_array_tag(root, "Blocks", &[1, 2, 3]).unwrap();
        let bytes = writer.finish().unwrap();

        let mut expected = header(TagKind::Compound, "R");
        expected.extend(header(TagKind::ByteArray, "Blocks"));
        expected.extend([0, 0, 0, 3, 1, 2, 3]);
        expected.push(0);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_short_byte_array_warns_instead_of_failing() {
        let mut writer = NbtWriter::new(Vec::new(), "R").unwrap();
        let root = writer.root();
        let array = writer.begin_byte_array(root, "Blocks", 10).unwrap();
        writer.write_array_bytes(array, &[0; 8]).unwrap();
        let warnings = writer.close(array).unwrap();
        assert_eq!(
            warnings,
            vec![NbtWarning::LengthMismatch {
                scope: "Blocks".to_string(),
                expected: 10,
                actual: 8,
            }]
        );
        assert!(writer.finish().is_ok());
    }

    #[test]
    fn test_byte_array_overflow_is_an_error() {
        let mut writer = NbtWriter::new(Vec::new(), "R").unwrap();
        let root = writer.root();
        let array = writer.begin_byte_array(root, "Blocks", 2).unwrap();
        writer.write_array_bytes(array, &[1]).unwrap();
        let result = writer.write_array_bytes(array, &[2, 3]);
        assert!(matches!(
            result,
            Err(NbtError::ByteArrayOverflow { declared: 2, attempted: 3, .. })
        ));
    }

    #[test]
    fn test_writing_into_parent_with_open_child_fails() {
        let mut writer = NbtWriter::new(Vec::new(), "R").unwrap();
        let root = writer.root();
        let child = writer.begin_compound(root, "Child").unwrap();
        assert!(matches!(
            writer.write_byte_tag(root, "x", 1),
            Err(NbtError::ScopeHasOpenChild(_))
        ));
        assert!(matches!(
            writer.begin_compound(root, "Second"),
            Err(NbtError::ScopeHasOpenChild(_))
        ));

        writer.write_byte_tag(child, "x", 1).unwrap();
        assert!(writer.close(child).unwrap().is_empty());
        writer.write_byte_tag(root, "y", 2).unwrap();
    }

    #[test]
    fn test_out_of_order_close_warns() {
        let mut writer = NbtWriter::new(Vec::new(), "R").unwrap();
        let root = writer.root();
        let child = writer.begin_compound(root, "Child").unwrap();

        let warnings = writer.close(root).unwrap();
        assert_eq!(
            warnings,
            vec![NbtWarning::ClosedBeforeChild { scope: "R".to_string() }]
        );

        let warnings = writer.close(child).unwrap();
        assert_eq!(
            warnings,
            vec![NbtWarning::ClosedAfterParent { scope: "Child".to_string() }]
        );
    }

    #[test]
    fn test_double_close_is_an_error() {
        let mut writer = NbtWriter::new(Vec::new(), "R").unwrap();
        let root = writer.root();
        let child = writer.begin_compound(root, "Child").unwrap();
        writer.close(child).unwrap();
        assert!(matches!(writer.close(child), Err(NbtError::ScopeClosed(_))));
        assert!(matches!(
            writer.write_byte_tag(child, "x", 1),
            Err(NbtError::ScopeClosed(_))
        ));
    }

    #[test]
    fn test_string_too_long() {
        let mut writer = NbtWriter::new(Vec::new(), "R").unwrap();
        let root = writer.root();
        let long = "a".repeat(u16::MAX as usize + 1);
        assert!(matches!(
            writer.write_string_tag(root, "s", &long),
            Err(NbtError::StringTooLong(_))
        ));
    }
}
