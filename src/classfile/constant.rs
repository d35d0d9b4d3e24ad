// src/classfile/constant.rs

//! Constant pool

use super::ClassFormatError;
use super::io::{ByteReader, ByteWriter};
use super::mutf8;

/// Constant pool tags
pub mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// One constant pool slot
///
/// `Utf8` keeps the raw modified UTF-8 bytes so untouched constants are
/// written back exactly as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Slot 0 and the slot after a `Long` or `Double`
    Unusable,
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
}

impl Constant {
    /// Number of pool slots the constant occupies
    pub fn width(&self) -> u16 {
        match self {
            Self::Long(_) | Self::Double(_) => 2,
            _ => 1,
        }
    }

    fn read(r: &mut ByteReader<'_>, slot: u16) -> Result<Self, ClassFormatError> {
        let tag = r.u8()?;
        let constant = match tag {
            tag::UTF8 => {
                let len = r.u16()? as usize;
                Self::Utf8(r.bytes(len)?.to_vec())
            }
            tag::INTEGER => Self::Integer(r.u32()?),
            tag::FLOAT => Self::Float(r.u32()?),
            tag::LONG => Self::Long(r.u64()?),
            tag::DOUBLE => Self::Double(r.u64()?),
            tag::CLASS => Self::Class { name: r.u16()? },
            tag::STRING => Self::String { value: r.u16()? },
            tag::FIELD_REF => Self::FieldRef {
                class: r.u16()?,
                name_and_type: r.u16()?,
            },
            tag::METHOD_REF => Self::MethodRef {
                class: r.u16()?,
                name_and_type: r.u16()?,
            },
            tag::INTERFACE_METHOD_REF => Self::InterfaceMethodRef {
                class: r.u16()?,
                name_and_type: r.u16()?,
            },
            tag::NAME_AND_TYPE => Self::NameAndType {
                name: r.u16()?,
                descriptor: r.u16()?,
            },
            tag::METHOD_HANDLE => Self::MethodHandle {
                kind: r.u8()?,
                reference: r.u16()?,
            },
            tag::METHOD_TYPE => Self::MethodType {
                descriptor: r.u16()?,
            },
            tag::DYNAMIC => Self::Dynamic {
                bootstrap: r.u16()?,
                name_and_type: r.u16()?,
            },
            tag::INVOKE_DYNAMIC => Self::InvokeDynamic {
                bootstrap: r.u16()?,
                name_and_type: r.u16()?,
            },
            tag::MODULE => Self::Module { name: r.u16()? },
            tag::PACKAGE => Self::Package { name: r.u16()? },
            other => return Err(ClassFormatError::BadConstantTag { tag: other, slot }),
        };
        Ok(constant)
    }

    fn write(&self, w: &mut ByteWriter) -> Result<(), ClassFormatError> {
        match self {
            Self::Unusable => {}
            Self::Utf8(bytes) => {
                let len = u16::try_from(bytes.len())
                    .map_err(|_| ClassFormatError::Utf8TooLong(bytes.len()))?;
                w.u8(tag::UTF8);
                w.u16(len);
                w.bytes(bytes);
            }
            Self::Integer(v) => {
                w.u8(tag::INTEGER);
                w.u32(*v);
            }
            Self::Float(v) => {
                w.u8(tag::FLOAT);
                w.u32(*v);
            }
            Self::Long(v) => {
                w.u8(tag::LONG);
                w.u64(*v);
            }
            Self::Double(v) => {
                w.u8(tag::DOUBLE);
                w.u64(*v);
            }
            Self::Class { name } => {
                w.u8(tag::CLASS);
                w.u16(*name);
            }
            Self::String { value } => {
                w.u8(tag::STRING);
                w.u16(*value);
            }
            Self::FieldRef { class, name_and_type } => {
                w.u8(tag::FIELD_REF);
                w.u16(*class);
                w.u16(*name_and_type);
            }
            Self::MethodRef { class, name_and_type } => {
                w.u8(tag::METHOD_REF);
                w.u16(*class);
                w.u16(*name_and_type);
            }
            Self::InterfaceMethodRef { class, name_and_type } => {
                w.u8(tag::INTERFACE_METHOD_REF);
                w.u16(*class);
                w.u16(*name_and_type);
            }
            Self::NameAndType { name, descriptor } => {
                w.u8(tag::NAME_AND_TYPE);
                w.u16(*name);
                w.u16(*descriptor);
            }
            Self::MethodHandle { kind, reference } => {
                w.u8(tag::METHOD_HANDLE);
                w.u8(*kind);
                w.u16(*reference);
            }
            Self::MethodType { descriptor } => {
                w.u8(tag::METHOD_TYPE);
                w.u16(*descriptor);
            }
            Self::Dynamic { bootstrap, name_and_type } => {
                w.u8(tag::DYNAMIC);
                w.u16(*bootstrap);
                w.u16(*name_and_type);
            }
            Self::InvokeDynamic { bootstrap, name_and_type } => {
                w.u8(tag::INVOKE_DYNAMIC);
                w.u16(*bootstrap);
                w.u16(*name_and_type);
            }
            Self::Module { name } => {
                w.u8(tag::MODULE);
                w.u16(*name);
            }
            Self::Package { name } => {
                w.u8(tag::PACKAGE);
                w.u16(*name);
            }
        }
        Ok(())
    }
}

/// Constant pool indexed by slot; slot 0 is always unusable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }
}

impl ConstantPool {
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, ClassFormatError> {
        let count = r.u16()?;
        if count == 0 {
            return Err(ClassFormatError::Malformed("constant pool count is zero".into()));
        }

        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);
        let mut slot: u16 = 1;
        while slot < count {
            let constant = Constant::read(r, slot)?;
            let width = constant.width();
            entries.push(constant);
            if width == 2 {
                entries.push(Constant::Unusable);
            }
            slot = slot.checked_add(width).ok_or_else(|| {
                ClassFormatError::Malformed("wide constant overruns the constant pool".into())
            })?;
        }
        if entries.len() != count as usize {
            return Err(ClassFormatError::Malformed(
                "wide constant overruns the constant pool".into(),
            ));
        }
        Ok(Self { entries })
    }

    pub fn write(&self, w: &mut ByteWriter) -> Result<(), ClassFormatError> {
        w.u16(self.count()?);
        for constant in &self.entries {
            constant.write(w)?;
        }
        Ok(())
    }

    /// The `constant_pool_count` header value
    pub fn count(&self) -> Result<u16, ClassFormatError> {
        u16::try_from(self.entries.len()).map_err(|_| ClassFormatError::PoolOverflow)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u16) -> Option<&mut Constant> {
        self.entries.get_mut(index as usize)
    }

    /// Iterate `(slot, constant)` over usable slots
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != Constant::Unusable)
            .map(|(i, c)| (i as u16, c))
    }

    /// Raw bytes of a `Utf8` constant
    pub fn utf8_bytes(&self, index: u16) -> Result<&[u8], ClassFormatError> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => Ok(bytes),
            _ => Err(ClassFormatError::BadIndex {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Decoded text of a `Utf8` constant
    pub fn utf8(&self, index: u16) -> Result<String, ClassFormatError> {
        mutf8::decode(self.utf8_bytes(index)?).ok_or(ClassFormatError::BadUtf8(index))
    }

    /// Binary name behind a `Class` constant
    pub fn class_name(&self, index: u16) -> Result<String, ClassFormatError> {
        match self.get(index) {
            Some(Constant::Class { name }) => self.utf8(*name),
            _ => Err(ClassFormatError::BadIndex {
                index,
                expected: "Class",
            }),
        }
    }

    /// Replace the text of an existing `Utf8` constant
    pub fn set_utf8(&mut self, index: u16, text: &str) -> Result<(), ClassFormatError> {
        match self.get_mut(index) {
            Some(Constant::Utf8(bytes)) => {
                *bytes = encode_checked(text)?;
                Ok(())
            }
            _ => Err(ClassFormatError::BadIndex {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Append a constant, returning its slot
    pub fn push(&mut self, constant: Constant) -> Result<u16, ClassFormatError> {
        let slot = u16::try_from(self.entries.len()).map_err(|_| ClassFormatError::PoolOverflow)?;
        let width = constant.width();
        self.entries.push(constant);
        if width == 2 {
            self.entries.push(Constant::Unusable);
        }
        self.count()?;
        Ok(slot)
    }

    /// Slot of a `Utf8` constant with exactly this text, appending one if needed
    pub fn intern_utf8(&mut self, text: &str) -> Result<u16, ClassFormatError> {
        let encoded = encode_checked(text)?;
        let existing = self
            .entries
            .iter()
            .position(|c| matches!(c, Constant::Utf8(b) if *b == encoded));
        match existing {
            Some(slot) => Ok(slot as u16),
            None => self.push(Constant::Utf8(encoded)),
        }
    }
}

fn encode_checked(text: &str) -> Result<Vec<u8>, ClassFormatError> {
    let encoded = mutf8::encode(text);
    if encoded.len() > u16::MAX as usize {
        return Err(ClassFormatError::Utf8TooLong(encoded.len()));
    }
    Ok(encoded)
}
