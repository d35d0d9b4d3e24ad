// src/signature/generic.rs

//! Generic signature grammar
//!
//! ```text
//! ClassSignature  := TypeParameters? ClassType ClassType*
//! MethodSignature := TypeParameters? '(' JavaType* ')' Result Throws*
//! FieldSignature  := ReferenceType
//! TypeParameters  := '<' (Identifier ':' ReferenceType? (':' ReferenceType)*)+ '>'
//! ReferenceType   := ClassType | 'T' Identifier ';' | '[' JavaType
//! ClassType       := 'L' Package? Simple ('.' Simple)* ';'
//! Simple          := Identifier TypeArguments?
//! TypeArguments   := '<' ('*' | ('+' | '-')? ReferenceType)+ '>'
//! Throws          := '^' ClassType | '^' 'T' Identifier ';'
//! ```
//!
//! Every node offers `rewrite`, which returns `None` when no class name below
//! it changed. A parent is rebuilt only when some child returned `Some`;
//! unchanged subtrees are cloned only when a sibling forces a rebuild.

use super::{SignatureError, rewrite_all};
use std::fmt;

type Rename<'r> = dyn FnMut(&str) -> Option<String> + 'r;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JavaType {
    Base(char),
    Reference(ReferenceType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceType {
    Class(ClassType),
    Variable(String),
    Array(Box<JavaType>),
}

/// `Lpkg/Outer<..>.Inner<..>;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassType {
    /// Package specifier including the trailing `/`, or empty
    pub package: String,
    pub outer: SimpleClassType,
    pub inner: Vec<SimpleClassType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleClassType {
    pub name: String,
    pub arguments: Vec<TypeArgument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Invariant,
    Extends,
    Super,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArgument {
    /// `*`
    Any,
    Bounded(Variance, ReferenceType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    pub class_bound: Option<ReferenceType>,
    pub interface_bounds: Vec<ReferenceType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub superclass: ClassType,
    pub interfaces: Vec<ClassType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<JavaType>,
    /// `JavaType::Base('V')` for void
    pub result: JavaType,
    pub throws: Vec<ReferenceType>,
}

// ---------------------------------------------------------------------------
// Rewriting
// ---------------------------------------------------------------------------

impl JavaType {
    pub fn rewrite(&self, rename: &mut Rename<'_>) -> Option<Self> {
        match self {
            Self::Base(_) => None,
            Self::Reference(r) => r.rewrite(rename).map(Self::Reference),
        }
    }
}

impl ReferenceType {
    pub fn rewrite(&self, rename: &mut Rename<'_>) -> Option<Self> {
        match self {
            Self::Class(c) => c.rewrite(rename).map(Self::Class),
            Self::Variable(_) => None,
            Self::Array(component) => component
                .rewrite(rename)
                .map(|c| Self::Array(Box::new(c))),
        }
    }
}

impl ClassType {
    /// Binary name of the outermost class, e.g. `java/util/Map`
    pub fn binary_name(&self) -> String {
        format!("{}{}", self.package, self.outer.name)
    }

    pub fn rewrite(&self, rename: &mut Rename<'_>) -> Option<Self> {
        let renamed = rename(&self.binary_name());
        let outer_args = rewrite_all(&self.outer.arguments, |a| a.rewrite(rename));
        let inner = rewrite_all(&self.inner, |s| s.rewrite(rename));

        if renamed.is_none() && outer_args.is_none() && inner.is_none() {
            return None;
        }

        let (package, name) = match renamed {
            Some(binary) => match binary.rfind('/') {
                Some(slash) => (binary[..=slash].to_string(), binary[slash + 1..].to_string()),
                None => (String::new(), binary),
            },
            None => (self.package.clone(), self.outer.name.clone()),
        };

        Some(Self {
            package,
            outer: SimpleClassType {
                name,
                arguments: outer_args.unwrap_or_else(|| self.outer.arguments.clone()),
            },
            inner: inner.unwrap_or_else(|| self.inner.clone()),
        })
    }
}

impl SimpleClassType {
    pub fn rewrite(&self, rename: &mut Rename<'_>) -> Option<Self> {
        rewrite_all(&self.arguments, |a| a.rewrite(rename)).map(|arguments| Self {
            name: self.name.clone(),
            arguments,
        })
    }
}

impl TypeArgument {
    pub fn rewrite(&self, rename: &mut Rename<'_>) -> Option<Self> {
        match self {
            Self::Any => None,
            Self::Bounded(variance, ty) => ty.rewrite(rename).map(|t| Self::Bounded(*variance, t)),
        }
    }
}

impl TypeParameter {
    pub fn rewrite(&self, rename: &mut Rename<'_>) -> Option<Self> {
        let class_bound = self.class_bound.as_ref().and_then(|b| b.rewrite(rename));
        let interface_bounds = rewrite_all(&self.interface_bounds, |b| b.rewrite(rename));
        if class_bound.is_none() && interface_bounds.is_none() {
            return None;
        }
        Some(Self {
            name: self.name.clone(),
            class_bound: class_bound.or_else(|| self.class_bound.clone()),
            interface_bounds: interface_bounds.unwrap_or_else(|| self.interface_bounds.clone()),
        })
    }
}

impl ClassSignature {
    pub fn parse(input: &str) -> Result<Self, SignatureError> {
        let mut p = SignatureParser::new("class signature", input);
        let type_parameters = p.type_parameters()?;
        let superclass = p.class_type()?;
        let mut interfaces = Vec::new();
        while !p.at_end() {
            interfaces.push(p.class_type()?);
        }
        Ok(Self {
            type_parameters,
            superclass,
            interfaces,
        })
    }

    pub fn rewrite(&self, rename: &mut Rename<'_>) -> Option<Self> {
        let type_parameters = rewrite_all(&self.type_parameters, |t| t.rewrite(rename));
        let superclass = self.superclass.rewrite(rename);
        let interfaces = rewrite_all(&self.interfaces, |i| i.rewrite(rename));
        if type_parameters.is_none() && superclass.is_none() && interfaces.is_none() {
            return None;
        }
        Some(Self {
            type_parameters: type_parameters.unwrap_or_else(|| self.type_parameters.clone()),
            superclass: superclass.unwrap_or_else(|| self.superclass.clone()),
            interfaces: interfaces.unwrap_or_else(|| self.interfaces.clone()),
        })
    }
}

impl MethodSignature {
    pub fn parse(input: &str) -> Result<Self, SignatureError> {
        let mut p = SignatureParser::new("method signature", input);
        let type_parameters = p.type_parameters()?;
        p.expect(b'(')?;
        let mut parameters = Vec::new();
        while p.peek() != Some(b')') {
            parameters.push(p.java_type()?);
        }
        p.expect(b')')?;
        let result = if p.peek() == Some(b'V') {
            p.bump();
            JavaType::Base('V')
        } else {
            p.java_type()?
        };
        let mut throws = Vec::new();
        while p.peek() == Some(b'^') {
            p.bump();
            throws.push(p.reference_type()?);
        }
        p.finish()?;
        Ok(Self {
            type_parameters,
            parameters,
            result,
            throws,
        })
    }

    pub fn rewrite(&self, rename: &mut Rename<'_>) -> Option<Self> {
        let type_parameters = rewrite_all(&self.type_parameters, |t| t.rewrite(rename));
        let parameters = rewrite_all(&self.parameters, |t| t.rewrite(rename));
        let result = self.result.rewrite(rename);
        let throws = rewrite_all(&self.throws, |t| t.rewrite(rename));
        if type_parameters.is_none() && parameters.is_none() && result.is_none() && throws.is_none()
        {
            return None;
        }
        Some(Self {
            type_parameters: type_parameters.unwrap_or_else(|| self.type_parameters.clone()),
            parameters: parameters.unwrap_or_else(|| self.parameters.clone()),
            result: result.unwrap_or_else(|| self.result.clone()),
            throws: throws.unwrap_or_else(|| self.throws.clone()),
        })
    }
}

/// Field signatures are a bare reference type
pub fn parse_field_signature(input: &str) -> Result<ReferenceType, SignatureError> {
    let mut p = SignatureParser::new("field signature", input);
    let ty = p.reference_type()?;
    p.finish()?;
    Ok(ty)
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base(c) => write!(f, "{}", c),
            Self::Reference(r) => write!(f, "{}", r),
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(c) => write!(f, "{}", c),
            Self::Variable(name) => write!(f, "T{};", name),
            Self::Array(component) => write!(f, "[{}", component),
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}{}", self.package, self.outer)?;
        for inner in &self.inner {
            write!(f, ".{}", inner)?;
        }
        f.write_str(";")
    }
}

impl fmt::Display for SimpleClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            f.write_str("<")?;
            for arg in &self.arguments {
                write!(f, "{}", arg)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Bounded(Variance::Invariant, ty) => write!(f, "{}", ty),
            Self::Bounded(Variance::Extends, ty) => write!(f, "+{}", ty),
            Self::Bounded(Variance::Super, ty) => write!(f, "-{}", ty),
        }
    }
}

fn write_type_parameters(f: &mut fmt::Formatter<'_>, params: &[TypeParameter]) -> fmt::Result {
    if params.is_empty() {
        return Ok(());
    }
    f.write_str("<")?;
    for param in params {
        write!(f, "{}:", param.name)?;
        if let Some(bound) = &param.class_bound {
            write!(f, "{}", bound)?;
        }
        for bound in &param.interface_bounds {
            write!(f, ":{}", bound)?;
        }
    }
    f.write_str(">")
}

impl fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type_parameters(f, &self.type_parameters)?;
        write!(f, "{}", self.superclass)?;
        for interface in &self.interfaces {
            write!(f, "{}", interface)?;
        }
        Ok(())
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type_parameters(f, &self.type_parameters)?;
        f.write_str("(")?;
        for param in &self.parameters {
            write!(f, "{}", param)?;
        }
        write!(f, "){}", self.result)?;
        for thrown in &self.throws {
            write!(f, "^{}", thrown)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct SignatureParser<'a> {
    kind: &'static str,
    input: &'a str,
    pos: usize,
}

impl<'a> SignatureParser<'a> {
    fn new(kind: &'static str, input: &'a str) -> Self {
        Self { kind, input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, reason: &str) -> SignatureError {
        SignatureError::new(self.kind, self.input, self.pos, reason)
    }

    fn expect(&mut self, b: u8) -> Result<(), SignatureError> {
        if self.bump() == Some(b) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", b as char)))
        }
    }

    fn finish(&self) -> Result<(), SignatureError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }

    /// Identifier up to (not including) any of `stops`
    fn identifier(&mut self, stops: &[u8]) -> Result<&'a str, SignatureError> {
        let input = self.input;
        let start = self.pos;
        let len = input.as_bytes()[start..]
            .iter()
            .position(|b| stops.contains(b))
            .ok_or_else(|| self.error("unterminated identifier"))?;
        if len == 0 {
            return Err(self.error("empty identifier"));
        }
        self.pos = start + len;
        Ok(&input[start..start + len])
    }

    fn type_parameters(&mut self) -> Result<Vec<TypeParameter>, SignatureError> {
        let mut params = Vec::new();
        if self.peek() != Some(b'<') {
            return Ok(params);
        }
        self.bump();
        while self.peek() != Some(b'>') {
            let name = self.identifier(b":")?.to_string();
            self.expect(b':')?;
            let class_bound = match self.peek() {
                Some(b'L' | b'T' | b'[') => Some(self.reference_type()?),
                _ => None,
            };
            let mut interface_bounds = Vec::new();
            while self.peek() == Some(b':') {
                self.bump();
                interface_bounds.push(self.reference_type()?);
            }
            params.push(TypeParameter {
                name,
                class_bound,
                interface_bounds,
            });
        }
        self.expect(b'>')?;
        if params.is_empty() {
            return Err(self.error("empty type parameter list"));
        }
        Ok(params)
    }

    fn java_type(&mut self) -> Result<JavaType, SignatureError> {
        match self.peek() {
            Some(b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z')) => {
                self.bump();
                Ok(JavaType::Base(b as char))
            }
            _ => Ok(JavaType::Reference(self.reference_type()?)),
        }
    }

    fn reference_type(&mut self) -> Result<ReferenceType, SignatureError> {
        match self.peek() {
            Some(b'L') => Ok(ReferenceType::Class(self.class_type()?)),
            Some(b'T') => {
                self.bump();
                let name = self.identifier(b";")?.to_string();
                self.expect(b';')?;
                Ok(ReferenceType::Variable(name))
            }
            Some(b'[') => {
                self.bump();
                Ok(ReferenceType::Array(Box::new(self.java_type()?)))
            }
            _ => Err(self.error("expected a reference type")),
        }
    }

    fn class_type(&mut self) -> Result<ClassType, SignatureError> {
        self.expect(b'L')?;
        let path = self.identifier(b";<.")?;
        let (package, name) = match path.rfind('/') {
            Some(slash) => (&path[..=slash], &path[slash + 1..]),
            None => ("", path),
        };
        if name.is_empty() {
            return Err(self.error("empty class name"));
        }
        let outer = SimpleClassType {
            name: name.to_string(),
            arguments: self.type_arguments()?,
        };

        let mut inner = Vec::new();
        while self.peek() == Some(b'.') {
            self.bump();
            let name = self.identifier(b";<.")?.to_string();
            inner.push(SimpleClassType {
                name,
                arguments: self.type_arguments()?,
            });
        }
        self.expect(b';')?;

        Ok(ClassType {
            package: package.to_string(),
            outer,
            inner,
        })
    }

    fn type_arguments(&mut self) -> Result<Vec<TypeArgument>, SignatureError> {
        let mut args = Vec::new();
        if self.peek() != Some(b'<') {
            return Ok(args);
        }
        self.bump();
        while self.peek() != Some(b'>') {
            let arg = match self.peek() {
                Some(b'*') => {
                    self.bump();
                    TypeArgument::Any
                }
                Some(b'+') => {
                    self.bump();
                    TypeArgument::Bounded(Variance::Extends, self.reference_type()?)
                }
                Some(b'-') => {
                    self.bump();
                    TypeArgument::Bounded(Variance::Super, self.reference_type()?)
                }
                None => return Err(self.error("unterminated type arguments")),
                _ => TypeArgument::Bounded(Variance::Invariant, self.reference_type()?),
            };
            args.push(arg);
        }
        self.bump();
        if args.is_empty() {
            return Err(self.error("empty type argument list"));
        }
        Ok(args)
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
    fn test_class_signature_roundtrip() {
        let input = "<T:Ljava/lang/Object;E::Ljava/lang/Comparable<-TE;>;>Ljava/util/AbstractList<TT;>;Ljava/util/RandomAccess;";
        let sig = ClassSignature::parse(input).unwrap();
        assert_eq!(sig.type_parameters.len(), 2);
        assert!(sig.type_parameters[1].class_bound.is_none());
        assert_eq!(sig.to_string(), input);
    }

    #[test]
    fn test_method_signature_roundtrip() {
        let input = "<X:Ljava/lang/Exception;>(Ljava/util/List<+Ljava/lang/Number;>;[I)V^TX;^Ljava/io/IOException;";
        let sig = MethodSignature::parse(input).unwrap();
        assert_eq!(sig.parameters.len(), 2);
        assert_eq!(sig.throws.len(), 2);
        assert_eq!(sig.to_string(), input);
    }

    #[test]
    fn test_nested_type_argument_rewrite() {
        let sig = parse_field_signature(
            "Ljava/util/Map<Ljava/lang/String;Ljava/util/List<Ljavax/servlet/Filter;>;>;",
        )
        .unwrap();
        let rewritten = sig.rewrite(&mut servlet).unwrap();
        assert_eq!(
            rewritten.to_string(),
            "Ljava/util/Map<Ljava/lang/String;Ljava/util/List<Ljakarta/servlet/Filter;>;>;"
        );
    }

    #[test]
    fn test_inner_class_suffix_keeps_outer_rename() {
        let sig = parse_field_signature("Ljavax/servlet/Outer<TT;>.Inner<*>;").unwrap();
        let rewritten = sig.rewrite(&mut servlet).unwrap();
        assert_eq!(rewritten.to_string(), "Ljakarta/servlet/Outer<TT;>.Inner<*>;");
    }

    #[test]
    fn test_unchanged_signature_returns_none() {
        let sig = MethodSignature::parse("<T:Ljava/lang/Object;>(TT;)Ljava/util/List<TT;>;").unwrap();
        assert!(sig.rewrite(&mut servlet).is_none());
    }

    #[test]
    fn test_malformed_signatures() {
        assert!(parse_field_signature("Ljava/util/List<>;").is_err());
        assert!(parse_field_signature("Ljava/util/List").is_err());
        assert!(parse_field_signature("I").is_err());
        assert!(MethodSignature::parse("(I").is_err());
        assert!(ClassSignature::parse("<>Ljava/lang/Object;").is_err());
    }
}
