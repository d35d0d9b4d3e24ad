// src/classfile/rewrite.rs

//! Constant-pool rewrite pass
//!
//! The pass runs in three steps:
//!
//! 1. **Collect** every use ("site") of a `Utf8` constant together with its
//!    role: class name, descriptor, generic signature, string literal or
//!    package name. Uses as plain names pin the constant to its text.
//! 2. **Evaluate** each distinct (constant, role) pair through the
//!    [`SignatureRule`].
//! 3. **Apply**: a constant whose uses all agree on one new text is updated in
//!    place. When uses disagree, the constant keeps its text and each
//!    changing use is pointed at an appended (or existing) constant holding
//!    its new text.
//!
//! | Site | Role |
//! |------|------|
//! | `Class` constant | binary type |
//! | `NameAndType`, `MethodType`, field/method descriptor | descriptor |
//! | `String` constant, annotation `s` value | string literal |
//! | `Package` constant | package name |
//! | `Signature` (class / field / method / record component) | generic signature |
//! | `LocalVariableTable` / `LocalVariableTypeTable` | descriptor / field signature |
//! | annotation type, enum and class values | descriptor |
//! | `Record` component descriptor | descriptor |
//!
//! `SourceFile`, `InnerClasses` simple names, `MethodParameters` names and
//! `Module` versions are walked only to pin their constants.

use super::constant::Constant;
use super::io::{ByteReader, patch_u16};
use super::{ClassFile, ClassFormatError};
use crate::signature::SignatureRule;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, trace};

/// Result of rewriting one class resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRewrite {
    /// Binary name before the rewrite
    pub class_name: String,
    /// New binary name when the class itself was renamed
    pub renamed_to: Option<String>,
    /// Number of constant texts changed
    pub replacements: usize,
    /// Rewritten class bytes; `None` when nothing changed
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Role {
    BinaryType,
    Descriptor,
    ClassSignature,
    FieldSignature,
    MethodSignature,
    StringLiteral,
    PackageName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Class,
    Field(usize),
    Method(usize),
}

#[derive(Debug, Clone, Copy)]
struct AttrRef {
    owner: Owner,
    attribute: usize,
}

#[derive(Debug, Clone, Copy)]
enum Location {
    /// The referencing constant at this slot
    Constant(u16),
    /// `descriptor_index` of a field or method
    MemberDescriptor(Owner),
    /// A `u16` inside an attribute body
    Attribute { owner: Owner, attribute: usize, offset: usize },
}

#[derive(Debug, Clone, Copy)]
struct Site {
    index: u16,
    role: Role,
    location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Class,
    Field,
    Method,
    Code,
    RecordComponent,
}

/// Rewrite a class resource
///
/// `resource` is the entry name, used to select per-class string tables.
pub fn rewrite_class(
    rule: &mut SignatureRule,
    resource: &str,
    data: &[u8],
) -> Result<ClassRewrite, ClassFormatError> {
    let mut class = ClassFile::parse(data)?;
    let class_name = class.name()?;
    let this_name_index = match class.pool.get(class.this_class) {
        Some(Constant::Class { name }) => *name,
        _ => {
            return Err(ClassFormatError::BadIndex {
                index: class.this_class,
                expected: "Class",
            });
        }
    };

    let collector = Collector::collect(&class)?;

    let mut values: HashMap<(u16, Role), Option<String>> = HashMap::new();
    for site in &collector.sites {
        let key = (site.index, site.role);
        if values.contains_key(&key) {
            continue;
        }
        let value = match class.pool.utf8(site.index) {
            Ok(original) => evaluate(rule, resource, site.role, &original)?,
            // Literals may legitimately hold unpaired surrogates; leave them alone
            Err(ClassFormatError::BadUtf8(_)) if site.role == Role::StringLiteral => None,
            Err(e) => return Err(e),
        };
        values.insert(key, value);
    }

    let renamed_to = values
        .get(&(this_name_index, Role::BinaryType))
        .cloned()
        .flatten();

    let mut by_index: BTreeMap<u16, Vec<&Site>> = BTreeMap::new();
    for site in &collector.sites {
        by_index.entry(site.index).or_default().push(site);
    }

    let mut in_place: Vec<(u16, String)> = Vec::new();
    let mut appended: Vec<(Site, String)> = Vec::new();
    for (index, group) in by_index {
        let mut targets: BTreeSet<Option<&str>> = group
            .iter()
            .map(|s| values.get(&(index, s.role)).and_then(|v| v.as_deref()))
            .collect();
        if collector.pinned.contains(&index) {
            targets.insert(None);
        }

        if targets.len() == 1 {
            if let Some(Some(text)) = targets.first() {
                in_place.push((index, text.to_string()));
            }
            continue;
        }

        for site in group {
            if let Some(Some(text)) = values.get(&(index, site.role)) {
                appended.push((*site, text.clone()));
            }
        }
    }

    if in_place.is_empty() && appended.is_empty() {
        return Ok(ClassRewrite {
            class_name,
            renamed_to,
            replacements: 0,
            bytes: None,
        });
    }

    let mut replacements = in_place.len();
    for (index, text) in &in_place {
        trace!("{}: constant {} -> {}", resource, index, text);
        class.pool.set_utf8(*index, text)?;
    }

    let mut split: HashSet<(u16, &str)> = HashSet::new();
    for (site, text) in &appended {
        let new_index = class.pool.intern_utf8(text)?;
        trace!(
            "{}: constant {} shared by differing uses, {} now uses {}",
            resource, site.index, text, new_index
        );
        retarget(&mut class, site.location, new_index)?;
        if split.insert((site.index, text.as_str())) {
            replacements += 1;
        }
    }

    debug!(
        "Rewrote {} constants in {} ({} in place, {} split)",
        replacements,
        resource,
        in_place.len(),
        split.len()
    );

    Ok(ClassRewrite {
        class_name,
        renamed_to,
        replacements,
        bytes: Some(class.to_bytes()?),
    })
}

fn evaluate(
    rule: &mut SignatureRule,
    resource: &str,
    role: Role,
    original: &str,
) -> Result<Option<String>, ClassFormatError> {
    let value = match role {
        Role::BinaryType => rule.transform_binary_type(original)?,
        Role::Descriptor => rule.transform_descriptor(original)?,
        Role::ClassSignature => rule.transform_class_signature(original)?,
        Role::FieldSignature => rule.transform_field_signature(original)?,
        Role::MethodSignature => rule.transform_method_signature(original)?,
        Role::StringLiteral => rule.transform_string(resource, original).map(|(s, _)| s),
        Role::PackageName => rule.replace_binary_package(original),
    };
    Ok(value.filter(|v| v != original))
}

fn retarget(class: &mut ClassFile, location: Location, index: u16) -> Result<(), ClassFormatError> {
    match location {
        Location::Constant(slot) => match class.pool.get_mut(slot) {
            Some(Constant::Class { name }) | Some(Constant::Package { name }) => *name = index,
            Some(Constant::String { value }) => *value = index,
            Some(Constant::NameAndType { descriptor, .. })
            | Some(Constant::MethodType { descriptor }) => *descriptor = index,
            _ => {
                return Err(ClassFormatError::BadIndex {
                    index: slot,
                    expected: "referencing",
                });
            }
        },
        Location::MemberDescriptor(owner) => {
            let member = match owner {
                Owner::Field(i) => class.fields.get_mut(i),
                Owner::Method(i) => class.methods.get_mut(i),
                Owner::Class => None,
            };
            member
                .ok_or_else(|| ClassFormatError::Malformed("member out of range".into()))?
                .descriptor_index = index;
        }
        Location::Attribute {
            owner,
            attribute,
            offset,
        } => {
            let attributes = match owner {
                Owner::Class => Some(&mut class.attributes),
                Owner::Field(i) => class.fields.get_mut(i).map(|m| &mut m.attributes),
                Owner::Method(i) => class.methods.get_mut(i).map(|m| &mut m.attributes),
            };
            let attr = attributes
                .and_then(|a| a.get_mut(attribute))
                .ok_or_else(|| ClassFormatError::Malformed("attribute out of range".into()))?;
            patch_u16(&mut attr.info, offset, index)?;
        }
    }
    Ok(())
}

/// Walks a class and records every `Utf8` use
struct Collector<'c> {
    class: &'c ClassFile,
    sites: Vec<Site>,
    pinned: HashSet<u16>,
}

impl<'c> Collector<'c> {
    fn collect(class: &'c ClassFile) -> Result<Self, ClassFormatError> {
        let mut c = Self {
            class,
            sites: Vec::new(),
            pinned: HashSet::new(),
        };

        for (slot, constant) in class.pool.iter() {
            let at = Location::Constant(slot);
            match constant {
                Constant::Class { name } => c.site(*name, Role::BinaryType, at),
                Constant::String { value } => c.site(*value, Role::StringLiteral, at),
                Constant::NameAndType { name, descriptor } => {
                    c.pinned.insert(*name);
                    c.site(*descriptor, Role::Descriptor, at);
                }
                Constant::MethodType { descriptor } => c.site(*descriptor, Role::Descriptor, at),
                Constant::Package { name } => c.site(*name, Role::PackageName, at),
                Constant::Module { name } => {
                    c.pinned.insert(*name);
                }
                _ => {}
            }
        }

        for (i, field) in class.fields.iter().enumerate() {
            let owner = Owner::Field(i);
            c.pinned.insert(field.name_index);
            c.site(field.descriptor_index, Role::Descriptor, Location::MemberDescriptor(owner));
            c.member_attributes(&field.attributes, owner, Context::Field)?;
        }
        for (i, method) in class.methods.iter().enumerate() {
            let owner = Owner::Method(i);
            c.pinned.insert(method.name_index);
            c.site(method.descriptor_index, Role::Descriptor, Location::MemberDescriptor(owner));
            c.member_attributes(&method.attributes, owner, Context::Method)?;
        }
        c.member_attributes(&class.attributes, Owner::Class, Context::Class)?;

        Ok(c)
    }

    fn site(&mut self, index: u16, role: Role, location: Location) {
        self.sites.push(Site {
            index,
            role,
            location,
        });
    }

    fn member_attributes(
        &mut self,
        attributes: &'c [super::Attribute],
        owner: Owner,
        ctx: Context,
    ) -> Result<(), ClassFormatError> {
        for (attribute, attr) in attributes.iter().enumerate() {
            self.pinned.insert(attr.name_index);
            let name = self.class.pool.utf8(attr.name_index)?;
            let mut r = ByteReader::new(&attr.info);
            self.attribute(&name, &mut r, ctx, AttrRef { owner, attribute })?;
        }
        Ok(())
    }

    /// Record the `u16` at the reader's position as a use in `role`
    fn index_at(&mut self, r: &mut ByteReader<'_>, role: Role, at: AttrRef) -> Result<(), ClassFormatError> {
        let offset = r.pos();
        let index = r.u16()?;
        self.site(
            index,
            role,
            Location::Attribute {
                owner: at.owner,
                attribute: at.attribute,
                offset,
            },
        );
        Ok(())
    }

    fn pin_at(&mut self, r: &mut ByteReader<'_>) -> Result<(), ClassFormatError> {
        let index = r.u16()?;
        self.pinned.insert(index);
        Ok(())
    }

    fn attribute(
        &mut self,
        name: &str,
        r: &mut ByteReader<'_>,
        ctx: Context,
        at: AttrRef,
    ) -> Result<(), ClassFormatError> {
        match (name, ctx) {
            ("Signature", Context::Class) => self.index_at(r, Role::ClassSignature, at),
            ("Signature", Context::Method) => self.index_at(r, Role::MethodSignature, at),
            ("Signature", Context::Field | Context::RecordComponent) => {
                self.index_at(r, Role::FieldSignature, at)
            }
            ("Code", Context::Method) => self.code(r, at),
            ("LocalVariableTable", Context::Code) => self.local_variables(r, Role::Descriptor, at),
            ("LocalVariableTypeTable", Context::Code) => {
                self.local_variables(r, Role::FieldSignature, at)
            }
            ("RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations", _) => {
                self.annotations(r, at)
            }
            (
                "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations",
                Context::Method,
            ) => {
                let parameters = r.u8()?;
                for _ in 0..parameters {
                    self.annotations(r, at)?;
                }
                Ok(())
            }
            ("RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations", _) => {
                let n = r.u16()?;
                for _ in 0..n {
                    self.type_annotation(r, at)?;
                }
                Ok(())
            }
            ("AnnotationDefault", Context::Method) => self.element_value(r, at),
            ("SourceFile", Context::Class) => self.pin_at(r),
            ("InnerClasses", Context::Class) => {
                let n = r.u16()?;
                for _ in 0..n {
                    r.skip(4)?; // inner_class_info, outer_class_info
                    self.pin_at(r)?;
                    r.skip(2)?; // flags
                }
                Ok(())
            }
            ("MethodParameters", Context::Method) => {
                let n = r.u8()?;
                for _ in 0..n {
                    self.pin_at(r)?;
                    r.skip(2)?; // flags
                }
                Ok(())
            }
            ("Module", Context::Class) => self.module(r),
            ("Record", Context::Class) => {
                let n = r.u16()?;
                for _ in 0..n {
                    self.pin_at(r)?;
                    self.index_at(r, Role::Descriptor, at)?;
                    self.attribute_table(r, Context::RecordComponent, at)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// An attribute table nested inside another attribute's body
    fn attribute_table(
        &mut self,
        r: &mut ByteReader<'_>,
        ctx: Context,
        at: AttrRef,
    ) -> Result<(), ClassFormatError> {
        let n = r.u16()?;
        for _ in 0..n {
            let name_index = r.u16()?;
            self.pinned.insert(name_index);
            let len = r.u32()? as usize;
            let start = r.pos();
            let data = r.data();
            let end = start
                .checked_add(len)
                .filter(|end| *end <= data.len())
                .ok_or(ClassFormatError::Truncated {
                    offset: start,
                    wanted: len,
                })?;
            let name = self.class.pool.utf8(name_index)?;
            let mut body = ByteReader::at(&data[..end], start);
            self.attribute(&name, &mut body, ctx, at)?;
            r.skip(len)?;
        }
        Ok(())
    }

    fn code(&mut self, r: &mut ByteReader<'_>, at: AttrRef) -> Result<(), ClassFormatError> {
        r.skip(4)?; // max_stack, max_locals
        let code_length = r.u32()? as usize;
        r.skip(code_length)?;
        let exceptions = r.u16()? as usize;
        r.skip(exceptions * 8)?;
        self.attribute_table(r, Context::Code, at)
    }

    /// Only the version strings of a `Module` attribute are `Utf8` indices
    fn module(&mut self, r: &mut ByteReader<'_>) -> Result<(), ClassFormatError> {
        r.skip(4)?; // module_name, flags
        self.pin_at(r)?;
        let requires = r.u16()?;
        for _ in 0..requires {
            r.skip(4)?;
            self.pin_at(r)?;
        }
        for _ in 0..2 {
            // exports, then opens
            let n = r.u16()?;
            for _ in 0..n {
                r.skip(4)?;
                let to = r.u16()? as usize;
                r.skip(to * 2)?;
            }
        }
        let uses = r.u16()? as usize;
        r.skip(uses * 2)?;
        let provides = r.u16()?;
        for _ in 0..provides {
            r.skip(2)?;
            let with = r.u16()? as usize;
            r.skip(with * 2)?;
        }
        Ok(())
    }

    fn local_variables(
        &mut self,
        r: &mut ByteReader<'_>,
        role: Role,
        at: AttrRef,
    ) -> Result<(), ClassFormatError> {
        let n = r.u16()?;
        for _ in 0..n {
            r.skip(4)?; // start_pc, length
            self.pin_at(r)?;
            self.index_at(r, role, at)?;
            r.skip(2)?; // slot
        }
        Ok(())
    }

    fn annotations(&mut self, r: &mut ByteReader<'_>, at: AttrRef) -> Result<(), ClassFormatError> {
        let n = r.u16()?;
        for _ in 0..n {
            self.annotation(r, at)?;
        }
        Ok(())
    }

    fn annotation(&mut self, r: &mut ByteReader<'_>, at: AttrRef) -> Result<(), ClassFormatError> {
        self.index_at(r, Role::Descriptor, at)?;
        let pairs = r.u16()?;
        for _ in 0..pairs {
            self.pin_at(r)?;
            self.element_value(r, at)?;
        }
        Ok(())
    }

    fn element_value(&mut self, r: &mut ByteReader<'_>, at: AttrRef) -> Result<(), ClassFormatError> {
        match r.u8()? {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => r.skip(2),
            b's' => self.index_at(r, Role::StringLiteral, at),
            b'e' => {
                self.index_at(r, Role::Descriptor, at)?;
                self.pin_at(r)
            }
            b'c' => self.index_at(r, Role::Descriptor, at),
            b'@' => self.annotation(r, at),
            b'[' => {
                let n = r.u16()?;
                for _ in 0..n {
                    self.element_value(r, at)?;
                }
                Ok(())
            }
            other => Err(ClassFormatError::Malformed(format!(
                "unknown element value tag '{}'",
                other as char
            ))),
        }
    }

    fn type_annotation(&mut self, r: &mut ByteReader<'_>, at: AttrRef) -> Result<(), ClassFormatError> {
        let target_type = r.u8()?;
        match target_type {
            0x00 | 0x01 | 0x16 => r.skip(1)?,
            0x10 | 0x11 | 0x12 | 0x17 | 0x42 | 0x43..=0x46 => r.skip(2)?,
            0x13..=0x15 => {}
            0x40 | 0x41 => {
                let n = r.u16()? as usize;
                r.skip(n * 6)?;
            }
            0x47..=0x4B => r.skip(3)?,
            other => {
                return Err(ClassFormatError::Malformed(format!(
                    "unknown type annotation target {:#04x}",
                    other
                )));
            }
        }
        let path_length = r.u8()? as usize;
        r.skip(path_length * 2)?;
        self.annotation(r, at)
    }
}
