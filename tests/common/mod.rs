// tests/common/mod.rs

//! Shared fixtures for integration tests: class files and archives built in
//! memory, plus the servlet rule set most tests run with.

#![allow(dead_code)]

use nsrewrite::classfile::{ClassFile, Constant, ConstantPool, Member};
use nsrewrite::rules::{RenameTable, RuleTables};
use nsrewrite::{TransformOptions, Transformer};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// `javax.servlet` (and subpackages) -> `jakarta.servlet`
pub fn servlet_rules() -> RuleTables {
    let mut tables = RuleTables {
        renames: RenameTable::from_pairs([
            ("javax.servlet", "jakarta.servlet"),
            ("javax.servlet.*", "jakarta.servlet"),
        ])
        .unwrap(),
        ..RuleTables::default()
    };
    tables.versions.set("jakarta.servlet", "[5.0,6)");
    tables
}

pub fn transformer(options: TransformOptions) -> Transformer {
    let mut t = Transformer::new(options);
    t.set_rules(servlet_rules()).unwrap();
    t
}

/// Minimal class file builder
pub struct ClassBuilder {
    class: ClassFile,
}

impl ClassBuilder {
    /// A public class extending `java/lang/Object`
    pub fn new(binary_name: &str) -> Self {
        let mut pool = ConstantPool::default();
        let this_name = pool.intern_utf8(binary_name).unwrap();
        let this_class = pool.push(Constant::Class { name: this_name }).unwrap();
        let super_name = pool.intern_utf8("java/lang/Object").unwrap();
        let super_class = pool.push(Constant::Class { name: super_name }).unwrap();
        Self {
            class: ClassFile {
                minor_version: 0,
                major_version: 61,
                pool,
                access_flags: 0x0021,
                this_class,
                super_class,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
            },
        }
    }

    pub fn implements(mut self, binary_name: &str) -> Self {
        let name = self.class.pool.intern_utf8(binary_name).unwrap();
        let class = self.class.pool.push(Constant::Class { name }).unwrap();
        self.class.interfaces.push(class);
        self
    }

    pub fn method(mut self, name: &str, descriptor: &str) -> Self {
        let name_index = self.class.pool.intern_utf8(name).unwrap();
        let descriptor_index = self.class.pool.intern_utf8(descriptor).unwrap();
        self.class.methods.push(Member {
            access_flags: 0x0001,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        self
    }

    pub fn string(mut self, text: &str) -> Self {
        let value = self.class.pool.intern_utf8(text).unwrap();
        self.class.pool.push(Constant::String { value }).unwrap();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.class.to_bytes().unwrap()
    }
}

/// `javax/servlet/MyFilter` implementing `javax/servlet/Filter`
pub fn servlet_filter_class() -> Vec<u8> {
    ClassBuilder::new("javax/servlet/MyFilter")
        .implements("javax/servlet/Filter")
        .method(
            "doFilter",
            "(Ljavax/servlet/ServletRequest;Ljavax/servlet/ServletResponse;)V",
        )
        .string("javax.servlet.http.HttpServlet")
        .build()
}

/// Build a ZIP archive from `(name, bytes)` pairs
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Build a ZIP archive whose entries are all stored uncompressed
pub fn stored_zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Overwrite the compression method of the first entry in both its headers
pub fn set_first_entry_method(bytes: &mut [u8], method: u16) {
    for (signature, offset) in [(b"PK\x03\x04", 8), (b"PK\x01\x02", 10)] {
        let at = bytes.windows(4).position(|w| w == signature).unwrap() + offset;
        bytes[at..at + 2].copy_from_slice(&method.to_le_bytes());
    }
}

/// Stored bytes of one entry, without decompression or CRC checks
pub fn zip_raw_entry(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    for i in 0..archive.len() {
        let mut entry = archive.by_index_raw(i).unwrap();
        if entry.name() == name {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            return Some(data);
        }
    }
    None
}

/// Every file entry of a ZIP archive, in archive order
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

pub fn zip_entry(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
    zip_entries(bytes)
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, data)| data)
}

pub fn zip_file_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    zip_entries(&std::fs::read(path).unwrap())
}

/// Names of every UTF-8 constant in a class file
pub fn class_strings(bytes: &[u8]) -> Vec<String> {
    let class = ClassFile::parse(bytes).unwrap();
    class
        .pool
        .iter()
        .filter_map(|(index, c)| match c {
            Constant::Utf8(_) => class.pool.utf8(index).ok(),
            _ => None,
        })
        .collect()
}
