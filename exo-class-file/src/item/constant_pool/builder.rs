use std::collections::HashMap;

use crate::error::{self, ClassFileError};

use super::{ConstantPool, ConstantPoolEntry, RefKind};

/// Builds a [`ConstantPool`] incrementally, deduplicating entries as they're
/// added and handing back the 1-based index each one ends up at.
///
/// Mirrors [`ConstantPool`]'s own slot layout: a `Long`/`Double` is pushed as
/// a single logical entry followed by an unaddressable [`ConstantPoolEntry::Hole`],
/// exactly as a reader would see on the wire.
#[derive(Debug, Default)]
pub struct ConstantPoolBuilder {
    entries: Vec<ConstantPoolEntry>,
    dedup: HashMap<ConstantPoolEntry, u16>,
}

impl ConstantPoolBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            dedup: HashMap::new(),
        }
    }

    /// Rebuilds a builder from an already-assembled pool, preserving every
    /// existing index so further `add_*` calls dedup against it instead of
    /// appending duplicates. Used when re-encoding a `ClassFile` that was
    /// read from a stream rather than assembled via this builder.
    pub fn from_pool(pool: ConstantPool) -> Self {
        let mut dedup = HashMap::new();
        for (i, entry) in pool.entries.iter().enumerate() {
            if matches!(entry, ConstantPoolEntry::Hole) {
                continue;
            }
            dedup.insert(entry.clone(), i as u16 + 1);
        }
        Self {
            entries: pool.entries,
            dedup,
        }
    }

    /// Pushes `entry`, or returns the index of an existing identical entry.
    /// `entry` must not be [`ConstantPoolEntry::Hole`] (only `add_long`/
    /// `add_double` may introduce one, implicitly).
    fn intern(&mut self, entry: ConstantPoolEntry) -> error::Result<u16> {
        if let Some(index) = self.dedup.get(&entry) {
            return Ok(*index);
        }

        let index = self.entries.len() as u32 + 1;
        if index > u16::MAX as u32 {
            return Err(ClassFileError::ClassTooLarge);
        }
        let index = index as u16;

        self.dedup.insert(entry.clone(), index);
        self.entries.push(entry);
        Ok(index)
    }

    /// Pushes a wide (`Long`/`Double`) entry, followed by its `Hole`. Not
    /// deduplicated through `intern` since the hole that follows it must not
    /// be shared with any other entry's slot.
    fn intern_wide(&mut self, entry: ConstantPoolEntry) -> error::Result<u16> {
        if let Some(index) = self.dedup.get(&entry) {
            return Ok(*index);
        }

        let index = self.entries.len() as u32 + 1;
        if index + 1 > u16::MAX as u32 {
            return Err(ClassFileError::ClassTooLarge);
        }
        let index = index as u16;

        self.dedup.insert(entry.clone(), index);
        self.entries.push(entry);
        self.entries.push(ConstantPoolEntry::Hole);
        Ok(index)
    }

    pub fn add_utf8(&mut self, data: impl Into<String>) -> error::Result<u16> {
        self.intern(ConstantPoolEntry::Utf8 { data: data.into() })
    }

    pub fn add_integer(&mut self, value: i32) -> error::Result<u16> {
        self.intern(ConstantPoolEntry::Integer { bytes: value })
    }

    pub fn add_float(&mut self, value: f32) -> error::Result<u16> {
        self.intern(ConstantPoolEntry::Float {
            float: value.to_bits(),
        })
    }

    pub fn add_long(&mut self, value: i64) -> error::Result<u16> {
        self.intern_wide(ConstantPoolEntry::Long { bytes: value })
    }

    pub fn add_double(&mut self, value: f64) -> error::Result<u16> {
        self.intern_wide(ConstantPoolEntry::Double {
            bytes: value.to_bits(),
        })
    }

    /// Interns the UTF-8 `name` and the `Class` entry pointing at it.
    pub fn add_class(&mut self, name: &str) -> error::Result<u16> {
        let name_index = self.add_utf8(name)?;
        self.intern(ConstantPoolEntry::Class { name_index })
    }

    /// Interns the UTF-8 `value` and the `String` entry pointing at it.
    pub fn add_string(&mut self, value: &str) -> error::Result<u16> {
        let string_index = self.add_utf8(value)?;
        self.intern(ConstantPoolEntry::String { string_index })
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> error::Result<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.intern(ConstantPoolEntry::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    pub fn add_fieldref(&mut self, class: &str, name: &str, descriptor: &str) -> error::Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(ConstantPoolEntry::Fieldref {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_methodref(&mut self, class: &str, name: &str, descriptor: &str) -> error::Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(ConstantPoolEntry::Methodref {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_interface_methodref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> error::Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(ConstantPoolEntry::InterfaceMethodref {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_method_handle(&mut self, kind: RefKind, reference_index: u16) -> error::Result<u16> {
        self.intern(ConstantPoolEntry::MethodHandle {
            reference_kind: kind,
            reference_index,
        })
    }

    pub fn add_method_type(&mut self, descriptor: &str) -> error::Result<u16> {
        let descriptor_index = self.add_utf8(descriptor)?;
        self.intern(ConstantPoolEntry::MethodType { descriptor_index })
    }

    /// `bootstrap_method_attr_index` indexes the `BootstrapMethods` attribute
    /// table being built alongside this pool; callers are responsible for
    /// keeping the two in sync (see the `ClassFileBuilder` bootstrap table).
    pub fn add_invokedynamic(
        &mut self,
        bootstrap_method_attr_index: u16,
        name: &str,
        descriptor: &str,
    ) -> error::Result<u16> {
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(ConstantPoolEntry::InvokeDynamic {
            bootstrap_method_attr_index,
            name_and_type_index,
        })
    }

    pub fn finish(self) -> ConstantPool {
        ConstantPool {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_identical_utf8() {
        let mut b = ConstantPoolBuilder::new();
        let a = b.add_utf8("Hello").unwrap();
        let c = b.add_utf8("Hello").unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn long_consumes_two_slots() {
        let mut b = ConstantPoolBuilder::new();
        let first = b.add_long(42).unwrap();
        let next = b.add_utf8("after").unwrap();
        assert_eq!(next, first + 2);
        let pool = b.finish();
        assert!(matches!(pool.entries[first as usize], ConstantPoolEntry::Hole));
    }

    #[test]
    fn get_constant_is_one_based_through_holes() {
        let mut b = ConstantPoolBuilder::new();
        let long_index = b.add_long(7).unwrap();
        let name_index = b.add_utf8("foo").unwrap();
        let pool = b.finish();
        assert!(matches!(
            pool.get_constant(long_index as usize),
            ConstantPoolEntry::Long { bytes: 7 }
        ));
        assert!(matches!(
            pool.get_constant(name_index as usize),
            ConstantPoolEntry::Utf8 { data } if data == "foo"
        ));
    }
}
