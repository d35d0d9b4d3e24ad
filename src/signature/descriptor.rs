// src/signature/descriptor.rs

//! Field and method descriptors
//!
//! ```text
//! FieldDescriptor  := FieldType
//! MethodDescriptor := '(' FieldType* ')' ( FieldType | 'V' )
//! FieldType        := BaseType | 'L' ClassName ';' | '[' FieldType
//! ```

use super::SignatureError;
use std::fmt;

/// Primitive descriptor characters, plus `V` for void results
pub const BASE_TYPES: &[u8] = b"BCDFIJSZV";

/// One field type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Primitive or void
    Base(char),
    /// Binary class name, e.g. `java/lang/String`
    Object(String),
    /// Array of the component type
    Array(Box<FieldType>),
}

impl FieldType {
    /// Rewrite embedded class names; `None` when nothing changed
    pub fn rewrite(&self, rename: &mut dyn FnMut(&str) -> Option<String>) -> Option<Self> {
        match self {
            Self::Base(_) => None,
            Self::Object(name) => rename(name).map(Self::Object),
            Self::Array(component) => component
                .rewrite(rename)
                .map(|c| Self::Array(Box::new(c))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(c) => write!(f, "{}", c),
            Self::Object(name) => write!(f, "L{};", name),
            Self::Array(component) => write!(f, "[{}", component),
        }
    }
}

/// A parsed descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Field(FieldType),
    Method {
        params: Vec<FieldType>,
        result: FieldType,
    },
}

impl Descriptor {
    /// Parse either descriptor form, decided by a leading `(`
    pub fn parse(input: &str) -> Result<Self, SignatureError> {
        let mut parser = DescriptorParser::new(input);
        let descriptor = if parser.peek() == Some(b'(') {
            parser.bump();
            let mut params = Vec::new();
            while parser.peek() != Some(b')') {
                params.push(parser.field_type(false)?);
            }
            parser.expect(b')')?;
            let result = parser.field_type(true)?;
            Self::Method { params, result }
        } else {
            Self::Field(parser.field_type(true)?)
        };
        parser.finish()?;
        Ok(descriptor)
    }

    /// Rewrite embedded class names; `None` when nothing changed
    pub fn rewrite(&self, rename: &mut dyn FnMut(&str) -> Option<String>) -> Option<Self> {
        match self {
            Self::Field(ty) => ty.rewrite(rename).map(Self::Field),
            Self::Method { params, result } => {
                let new_params = super::rewrite_all(params, |p| p.rewrite(rename));
                let new_result = result.rewrite(rename);
                if new_params.is_none() && new_result.is_none() {
                    return None;
                }
                Some(Self::Method {
                    params: new_params.unwrap_or_else(|| params.clone()),
                    result: new_result.unwrap_or_else(|| result.clone()),
                })
            }
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(ty) => write!(f, "{}", ty),
            Self::Method { params, result } => {
                f.write_str("(")?;
                for p in params {
                    write!(f, "{}", p)?;
                }
                write!(f, "){}", result)
            }
        }
    }
}

struct DescriptorParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn error(&self, reason: &str) -> SignatureError {
        SignatureError::new("descriptor", self.input, self.pos, reason)
    }

    fn expect(&mut self, b: u8) -> Result<(), SignatureError> {
        if self.bump() == Some(b) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", b as char)))
        }
    }

    fn finish(&self) -> Result<(), SignatureError> {
        if self.pos == self.input.len() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }

    fn field_type(&mut self, allow_void: bool) -> Result<FieldType, SignatureError> {
        match self.bump() {
            Some(b'L') => {
                let start = self.pos;
                let len = self.input[start..]
                    .find(';')
                    .ok_or_else(|| self.error("unterminated class name"))?;
                if len == 0 {
                    return Err(self.error("empty class name"));
                }
                self.pos = start + len + 1;
                Ok(FieldType::Object(self.input[start..start + len].to_string()))
            }
            Some(b'[') => Ok(FieldType::Array(Box::new(self.field_type(false)?))),
            Some(b'V') if !allow_void => Err(self.error("void is only valid as a result")),
            Some(b) if BASE_TYPES.contains(&b) => Ok(FieldType::Base(b as char)),
            Some(_) => Err(self.error("unknown type character")),
            None => Err(self.error("unexpected end")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servlet(name: &str) -> Option<String> {
        name.strip_prefix("javax/servlet/")
            .map(|rest| format!("jakarta/servlet/{}", rest))
    }

    #[test]
    fn test_parse_and_display_roundtrip_shapes() {
        for input in ["I", "[[J", "Ljava/lang/String;", "(I[Ljava/lang/Object;)V", "()Z"] {
            assert_eq!(Descriptor::parse(input).unwrap().to_string(), input);
        }
    }

    #[test]
    fn test_method_descriptor_rewrite() {
        let d = Descriptor::parse("(Ljavax/servlet/ServletRequest;I)[Ljavax/servlet/Filter;")
            .unwrap();
        let rewritten = d.rewrite(&mut servlet).unwrap();
        assert_eq!(
            rewritten.to_string(),
            "(Ljakarta/servlet/ServletRequest;I)[Ljakarta/servlet/Filter;"
        );
    }

    #[test]
    fn test_unchanged_descriptor_returns_none() {
        let d = Descriptor::parse("(Ljava/lang/String;)V").unwrap();
        assert!(d.rewrite(&mut servlet).is_none());
    }

    #[test]
    fn test_malformed_descriptors() {
        for input in ["", "L;", "Ljava/lang/String", "(I", "(V)V", "Q", "II"] {
            assert!(Descriptor::parse(input).is_err(), "{} should fail", input);
        }
    }
}
