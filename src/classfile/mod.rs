// src/classfile/mod.rs

//! Compiled-class resources
//!
//! [`ClassFile`] reads and writes the class-file container: header, constant
//! pool, members and attributes. Attribute bodies are kept as raw bytes; the
//! rewrite pass in [`rewrite`] walks the attributes it understands and patches
//! constant indices in place, so every attribute keeps its length and any
//! attribute it does not understand is written back untouched.
//!
//! ```text
//! magic  minor major  pool  access this super  interfaces  fields  methods  attributes
//! u4     u2    u2     ...   u2     u2   u2     u2 + u2*n   ...     ...      ...
//! ```

pub mod constant;
pub mod io;
pub mod mutf8;
pub mod rewrite;

pub use constant::{Constant, ConstantPool};
pub use rewrite::{ClassRewrite, rewrite_class};

use crate::signature::SignatureError;
use io::{ByteReader, ByteWriter};
use thiserror::Error;

/// Class-file magic number
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Errors while reading, rewriting or writing a class file
#[derive(Error, Debug)]
pub enum ClassFormatError {
    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("truncated at offset {offset} (wanted {wanted} bytes)")]
    Truncated { offset: usize, wanted: usize },

    #[error("unknown constant tag {tag} at slot {slot}")]
    BadConstantTag { tag: u8, slot: u16 },

    #[error("constant {index} is not a {expected} constant")]
    BadIndex { index: u16, expected: &'static str },

    #[error("constant {0} is not valid modified UTF-8")]
    BadUtf8(u16),

    #[error("constant of {0} bytes exceeds the Utf8 limit")]
    Utf8TooLong(usize),

    #[error("constant pool is full")]
    PoolOverflow,

    #[error("{0} trailing bytes after the class file")]
    TrailingBytes(usize),

    #[error("{0}")]
    Malformed(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// A raw attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

/// A field or method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// A parsed class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    pub fn parse(data: &[u8]) -> Result<Self, ClassFormatError> {
        let mut r = ByteReader::new(data);
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }
        let minor_version = r.u16()?;
        let major_version = r.u16()?;
        let pool = ConstantPool::read(&mut r)?;
        let access_flags = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;

        let interface_count = r.u16()?;
        let interfaces = (0..interface_count)
            .map(|_| r.u16())
            .collect::<Result<Vec<_>, _>>()?;
        let fields = read_members(&mut r)?;
        let methods = read_members(&mut r)?;
        let attributes = read_attributes(&mut r)?;

        if r.remaining() > 0 {
            return Err(ClassFormatError::TrailingBytes(r.remaining()));
        }

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassFormatError> {
        let mut w = ByteWriter::with_capacity(1024);
        w.u32(MAGIC);
        w.u16(self.minor_version);
        w.u16(self.major_version);
        self.pool.write(&mut w)?;
        w.u16(self.access_flags);
        w.u16(self.this_class);
        w.u16(self.super_class);
        w.u16(count(self.interfaces.len(), "interfaces")?);
        for interface in &self.interfaces {
            w.u16(*interface);
        }
        write_members(&mut w, &self.fields, "fields")?;
        write_members(&mut w, &self.methods, "methods")?;
        write_attributes(&mut w, &self.attributes)?;
        Ok(w.into_bytes())
    }

    /// Binary name of this class, e.g. `javax/servlet/GenericServlet`
    pub fn name(&self) -> Result<String, ClassFormatError> {
        self.pool.class_name(self.this_class)
    }
}

fn count(len: usize, what: &str) -> Result<u16, ClassFormatError> {
    u16::try_from(len).map_err(|_| ClassFormatError::Malformed(format!("too many {}", what)))
}

fn read_members(r: &mut ByteReader<'_>) -> Result<Vec<Member>, ClassFormatError> {
    let n = r.u16()?;
    let mut members = Vec::with_capacity(n as usize);
    for _ in 0..n {
        members.push(Member {
            access_flags: r.u16()?,
            name_index: r.u16()?,
            descriptor_index: r.u16()?,
            attributes: read_attributes(r)?,
        });
    }
    Ok(members)
}

fn read_attributes(r: &mut ByteReader<'_>) -> Result<Vec<Attribute>, ClassFormatError> {
    let n = r.u16()?;
    let mut attributes = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let name_index = r.u16()?;
        let len = r.u32()? as usize;
        attributes.push(Attribute {
            name_index,
            info: r.bytes(len)?.to_vec(),
        });
    }
    Ok(attributes)
}

fn write_members(w: &mut ByteWriter, members: &[Member], what: &str) -> Result<(), ClassFormatError> {
    w.u16(count(members.len(), what)?);
    for m in members {
        w.u16(m.access_flags);
        w.u16(m.name_index);
        w.u16(m.descriptor_index);
        write_attributes(w, &m.attributes)?;
    }
    Ok(())
}

fn write_attributes(w: &mut ByteWriter, attributes: &[Attribute]) -> Result<(), ClassFormatError> {
    w.u16(count(attributes.len(), "attributes")?);
    for a in attributes {
        w.u16(a.name_index);
        let len = u32::try_from(a.info.len())
            .map_err(|_| ClassFormatError::Malformed("attribute too large".into()))?;
        w.u32(len);
        w.bytes(&a.info);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal `public class a/B extends java/lang/Object` with one field
    fn minimal_class() -> Vec<u8> {
        let mut pool = ConstantPool::default();
        let this_name = pool.intern_utf8("a/B").unwrap();
        let this_class = pool.push(Constant::Class { name: this_name }).unwrap();
        let super_name = pool.intern_utf8("java/lang/Object").unwrap();
        let super_class = pool.push(Constant::Class { name: super_name }).unwrap();
        let field_name = pool.intern_utf8("f").unwrap();
        let field_desc = pool.intern_utf8("Ljava/lang/String;").unwrap();

        ClassFile {
            minor_version: 0,
            major_version: 52,
            pool,
            access_flags: 0x0021,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: vec![Member {
                access_flags: 0x0002,
                name_index: field_name,
                descriptor_index: field_desc,
                attributes: Vec::new(),
            }],
            methods: Vec::new(),
            attributes: Vec::new(),
        }
        .to_bytes()
        .unwrap()
    }

    #[test]
    fn test_parse_write_is_byte_identical() {
        let bytes = minimal_class();
        let class = ClassFile::parse(&bytes).unwrap();
        assert_eq!(class.name().unwrap(), "a/B");
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_rejects_bad_magic_and_truncation() {
        let mut bytes = minimal_class();
        assert!(matches!(
            ClassFile::parse(&bytes[..bytes.len() - 1]),
            Err(ClassFormatError::Truncated { .. })
        ));
        bytes.push(0);
        assert!(matches!(ClassFile::parse(&bytes), Err(ClassFormatError::TrailingBytes(1))));
        bytes[0] = 0;
        assert!(matches!(ClassFile::parse(&bytes), Err(ClassFormatError::BadMagic(_))));
    }
}
