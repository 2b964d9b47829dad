//! Loads binary class metadata by internal name from a list of
//! classpath entries (directories and `.jar`/`.zip` archives), caching
//! results for the lifetime of a compilation session.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use exo_class_file::item::{
    attribute_info::Attributes,
    constant_pool::{ConstantPool, ConstantPoolEntry},
    file::{ClassAccessFlags, ClassFile},
    fields::{FieldAccessFlags, FieldInfo},
    methods::{MethodAccessFlags, MethodInfo},
    ClassFileItem,
};
use exo_class_file::stream::ClassFileStream;

use crate::error::{CompileError, CompileResult};
use crate::types::Type;

/// A single field as seen from the classpath: name, descriptor, flags
/// and an optional generic signature.
#[derive(Debug, Clone)]
pub struct FieldMetadata {
    pub name: String,
    pub descriptor: String,
    pub access_flags: FieldAccessFlags,
    pub signature: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MethodMetadata {
    pub name: String,
    pub descriptor: String,
    pub access_flags: MethodAccessFlags,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
}

/// Everything the symbol resolver needs about a previously compiled or
/// library class, independent of whether it came off disk or was just
/// emitted by this compilation session (see [`ClassPath::register`]).
#[derive(Debug, Clone)]
pub struct ClassMetadata {
    pub internal_name: String,
    pub access_flags: ClassAccessFlags,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldMetadata>,
    pub methods: Vec<MethodMetadata>,
    pub signature: Option<String>,
}

impl ClassMetadata {
    fn from_class_file(file: &ClassFile) -> CompileResult<Self> {
        let pool = &file.constant_pool;
        let internal_name = class_name(pool, file.this_class)?;
        let super_name = if file.super_class == 0 {
            None
        } else {
            Some(class_name(pool, file.super_class)?)
        };
        let interfaces = file
            .interfaces
            .iter()
            .map(|idx| class_name(pool, *idx))
            .collect::<CompileResult<Vec<_>>>()?;

        let fields = file
            .fields
            .iter()
            .map(|f| field_metadata(pool, f))
            .collect::<CompileResult<Vec<_>>>()?;
        let methods = file
            .methods
            .iter()
            .map(|m| method_metadata(pool, m))
            .collect::<CompileResult<Vec<_>>>()?;

        let signature = class_file_signature(pool, &file.attributes)?;

        Ok(Self {
            internal_name,
            access_flags: file.access_flags,
            super_name,
            interfaces,
            fields,
            methods,
            signature,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ACC_INTERFACE)
    }
}

fn class_name(pool: &ConstantPool, index: u16) -> CompileResult<String> {
    match pool.get_constant(index as usize) {
        ConstantPoolEntry::Class { name_index } => {
            Ok(pool.get_utf8_constant(*name_index as usize)?.to_string())
        }
        _ => Err(CompileError::ClassPath(format!(
            "constant pool index {} is not a Class entry",
            index
        ))),
    }
}

fn attribute_signature(attrs: &exo_class_file::item::attribute_info::AttributesCollection) -> Option<u16> {
    attrs.get("Signature").iter().find_map(|a| match a {
        Attributes::Signature { signature_index } => Some(*signature_index),
        _ => None,
    })
}

fn field_metadata(pool: &ConstantPool, field: &FieldInfo) -> CompileResult<FieldMetadata> {
    let name = pool.get_utf8_constant(field.name_index as usize)?.to_string();
    let descriptor = pool.get_utf8_constant(field.descriptor_index as usize)?.to_string();
    let signature = attribute_signature(&field.attributes)
        .map(|idx| pool.get_utf8_constant(idx as usize).map(str::to_string))
        .transpose()?;
    Ok(FieldMetadata {
        name,
        descriptor,
        access_flags: field.access_flags,
        signature,
    })
}

fn method_metadata(pool: &ConstantPool, method: &MethodInfo) -> CompileResult<MethodMetadata> {
    let name = pool.get_utf8_constant(method.name_index as usize)?.to_string();
    let descriptor = pool.get_utf8_constant(method.descriptor_index as usize)?.to_string();
    let signature = attribute_signature(&method.attributes)
        .map(|idx| pool.get_utf8_constant(idx as usize).map(str::to_string))
        .transpose()?;
    let exceptions = method
        .attributes
        .get("Exceptions")
        .iter()
        .find_map(|a| match a {
            Attributes::Exceptions { exception_index_table } => Some(exception_index_table.clone()),
            _ => None,
        })
        .unwrap_or_default()
        .into_iter()
        .map(|idx| class_name(pool, idx))
        .collect::<CompileResult<Vec<_>>>()?;
    Ok(MethodMetadata {
        name,
        descriptor,
        access_flags: method.access_flags,
        signature,
        exceptions,
    })
}

fn class_file_signature(
    pool: &ConstantPool,
    attrs: &exo_class_file::item::attribute_info::AttributesCollection,
) -> CompileResult<Option<String>> {
    attribute_signature(attrs)
        .map(|idx| pool.get_utf8_constant(idx as usize).map(str::to_string))
        .transpose()
        .map_err(CompileError::from)
}

enum Entry {
    Directory(PathBuf),
    Archive(zip::ZipArchive<fs::File>),
}

/// A search path over directories and jar/zip archives, caching parsed
/// metadata by internal name for the session's lifetime.
pub struct ClassPath {
    entries: Vec<Entry>,
    cache: HashMap<String, ClassMetadata>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cache: HashMap::new(),
        }
    }

    pub fn add_entry(&mut self, path: &Path) -> CompileResult<()> {
        if path.is_dir() {
            self.entries.push(Entry::Directory(path.to_path_buf()));
            return Ok(());
        }
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if extension.eq_ignore_ascii_case("jar") || extension.eq_ignore_ascii_case("zip") {
            let file = fs::File::open(path)?;
            let archive = zip::ZipArchive::new(file)
                .map_err(|e| CompileError::ClassPath(format!("{}: {}", path.display(), e)))?;
            self.entries.push(Entry::Archive(archive));
            return Ok(());
        }
        Err(CompileError::ClassPath(format!(
            "{}: not a directory, jar or zip",
            path.display()
        )))
    }

    /// Directly caches already-known metadata, used to make a type this
    /// compilation session just emitted immediately visible to later
    /// source files without round-tripping it through bytes.
    pub fn register(&mut self, metadata: ClassMetadata) {
        self.cache.insert(metadata.internal_name.clone(), metadata);
    }

    pub fn find_class(&mut self, internal_name: &str) -> CompileResult<&ClassMetadata> {
        if !self.cache.contains_key(internal_name) {
            let metadata = self.load(internal_name)?;
            self.cache.insert(internal_name.to_string(), metadata);
        }
        Ok(self.cache.get(internal_name).unwrap())
    }

    fn load(&mut self, internal_name: &str) -> CompileResult<ClassMetadata> {
        let entry_name = format!("{}.class", internal_name);
        for entry in &mut self.entries {
            let bytes = match entry {
                Entry::Directory(dir) => {
                    let path = dir.join(&entry_name);
                    if !path.is_file() {
                        continue;
                    }
                    fs::read(path)?
                }
                Entry::Archive(archive) => {
                    let mut file = match archive.by_name(&entry_name) {
                        Ok(f) => f,
                        Err(_) => continue,
                    };
                    let mut buf = Vec::with_capacity(file.size() as usize);
                    file.read_to_end(&mut buf)?;
                    buf
                }
            };
            let mut cursor = std::io::Cursor::new(bytes);
            let class_file = ClassFile::read_from_stream(&mut ClassFileStream::new(&mut cursor), None)?;
            return ClassMetadata::from_class_file(&class_file);
        }
        Err(CompileError::ClassPath(format!("class not found: {}", internal_name)))
    }
}

impl Default for ClassPath {
    fn default() -> Self {
        Self::new()
    }
}

/// `Object` is a supertype of every reference and array type. Used by
/// the symbol resolver's assignability rule; not itself a `ClassPath`
/// lookup since `Object` always terminates the superclass chain.
pub fn is_object(ty: &Type) -> bool {
    matches!(ty, Type::Class(name) if name == "java/lang/Object")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_find_round_trips_without_disk_access() {
        let mut cp = ClassPath::new();
        cp.register(ClassMetadata {
            internal_name: "com/example/Foo".to_string(),
            access_flags: ClassAccessFlags::ACC_PUBLIC | ClassAccessFlags::ACC_SUPER,
            super_name: Some("java/lang/Object".to_string()),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            signature: None,
        });
        let found = cp.find_class("com/example/Foo").unwrap();
        assert_eq!(found.super_name.as_deref(), Some("java/lang/Object"));
    }

    #[test]
    fn missing_entry_is_class_not_found() {
        let mut cp = ClassPath::new();
        let err = cp.find_class("does/not/Exist").unwrap_err();
        assert!(matches!(err, CompileError::ClassPath(_)));
    }
}
