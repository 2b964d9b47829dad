//! Write-side companions to the reader: append-only construction of a
//! single class file (`ClassFileBuilder`) and translation of high-level
//! emit calls into bytecode with branch patching and stack/local
//! bookkeeping (`BytecodeEmitter`).

use std::collections::HashMap;

use fnv::FnvHashMap;

use crate::error::{self, ClassFileError};

use super::{
    attribute_info::{Annotation, Attributes, AttributesCollection, BootstrapMethodsElement, ClassArrayEntry, ExceptionTableEntry},
    constant_pool::{ConstantPoolBuilder, RefKind},
    fields::FieldInfo,
    file::{ClassAccessFlags, ClassFile},
    methods::MethodInfo,
    opcodes::{ArrayTypeCode, InstructionList, VMOpcode},
};

/// Appends class-, field- and method-level structure to a single class
/// file under construction. Mirrors the order fields are written in the
/// wire format: nothing here is ever removed once added.
pub struct ClassFileBuilder {
    pool: ConstantPoolBuilder,
    version: (u16, u16),
    access_flags: ClassAccessFlags,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    attributes: AttributesCollection,
    bootstrap_methods: Vec<BootstrapMethodsElement>,
    inner_classes: Vec<ClassArrayEntry>,
    is_interface: bool,
}

impl ClassFileBuilder {
    /// Default version is 50.0, promoted to 52.0 by [`Self::add_method`]
    /// when an interface body gains a non-abstract method.
    pub fn new(name: &str, super_name: &str) -> error::Result<Self> {
        let mut pool = ConstantPoolBuilder::new();
        let this_class = pool.add_class(name)?;
        let super_class = pool.add_class(super_name)?;
        Ok(Self {
            pool,
            version: (50, 0),
            access_flags: ClassAccessFlags::empty(),
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: AttributesCollection {
                collection: HashMap::new(),
            },
            bootstrap_methods: Vec::new(),
            inner_classes: Vec::new(),
            is_interface: false,
        })
    }

    pub fn set_access_flags(&mut self, flags: ClassAccessFlags) {
        self.is_interface = flags.contains(ClassAccessFlags::ACC_INTERFACE);
        self.access_flags = flags;
    }

    pub fn constant_pool(&mut self) -> &mut ConstantPoolBuilder {
        &mut self.pool
    }

    pub fn add_interface(&mut self, name: &str) -> error::Result<()> {
        let index = self.pool.add_class(name)?;
        self.interfaces.push(index);
        Ok(())
    }

    pub fn add_field(&mut self, info: FieldInfo) {
        self.fields.push(info);
    }

    /// Promotes the class file to version 52.0 if `info` is a
    /// non-abstract method on an interface. `invokedynamic` usage
    /// promotes the version separately, from [`Self::add_bootstrap`].
    pub fn add_method(&mut self, info: MethodInfo) {
        if self.is_interface && !info.access_flags.contains(super::methods::MethodAccessFlags::ACC_ABSTRACT) {
            self.version = self.version.max((52, 0));
        }
        self.methods.push(info);
    }

    pub fn set_signature(&mut self, signature: &str) -> error::Result<()> {
        let signature_index = self.pool.add_utf8(signature)?;
        self.attributes.insert(
            super::attribute_info::attrtype::Signature.to_string(),
            Attributes::Signature { signature_index },
        );
        Ok(())
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.attributes.insert(
            super::attribute_info::attrtype::RuntimeVisibleAnnotations.to_string(),
            Attributes::RuntimeVisibleAnnotations {
                annotations: vec![annotation],
            },
        );
    }

    /// Accumulates into the class file's single `InnerClasses` attribute,
    /// materialized once in [`Self::finish`] (every call here adds one
    /// `classes` entry rather than a separate attribute).
    pub fn add_inner_class(&mut self, entry: ClassArrayEntry) {
        self.inner_classes.push(entry);
    }

    /// Appends a bootstrap method entry and returns its index into the
    /// `BootstrapMethods` table, for use as `invokedynamic`'s
    /// `bootstrap_method_attr_index`. A bootstrap entry only ever gets
    /// added when an `invokedynamic` is about to be emitted, so this is
    /// also where the class file is promoted to version 52.0.
    pub fn add_bootstrap(&mut self, handle: u16, args: Vec<u16>) -> error::Result<u16> {
        let index = self.bootstrap_methods.len();
        if index > u16::MAX as usize {
            return Err(ClassFileError::ClassTooLarge);
        }
        self.bootstrap_methods.push(BootstrapMethodsElement {
            bootstrap_method_ref: handle,
            bootstrap_arguments: args,
        });
        self.version = self.version.max((52, 0));
        Ok(index as u16)
    }

    pub fn add_method_handle(&mut self, kind: RefKind, reference_index: u16) -> error::Result<u16> {
        self.pool.add_method_handle(kind, reference_index)
    }

    /// Serializes the whole class file to bytes.
    pub fn finish(mut self) -> error::Result<Vec<u8>> {
        if !self.bootstrap_methods.is_empty() {
            self.attributes.insert(
                super::attribute_info::attrtype::BootstrapMethods.to_string(),
                Attributes::BootstrapMethods {
                    bootstrap_methods: self.bootstrap_methods,
                },
            );
        }
        if !self.inner_classes.is_empty() {
            self.attributes.insert(
                super::attribute_info::attrtype::InnerClasses.to_string(),
                Attributes::InnerClasses {
                    classes: self.inner_classes,
                },
            );
        }

        let class_file = ClassFile {
            version: self.version,
            constant_pool: self.pool.finish(),
            access_flags: self.access_flags,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: self.interfaces,
            fields: self.fields,
            methods: self.methods,
            attributes: self.attributes,
        };
        class_file.encode()
    }
}

/// A forward reference to a byte offset within a method's code array,
/// bound exactly once via [`BytecodeEmitter::bind_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

enum BranchFixup {
    /// A plain branch opcode (`ifeq`, `goto`, ...) whose sole `i16`
    /// operand is the displacement to `target`.
    Simple { instr_index: usize, target: Label },
    Lookup {
        instr_index: usize,
        default: Label,
        targets: Vec<Label>,
    },
    Table {
        instr_index: usize,
        default: Label,
        targets: Vec<Label>,
    },
}

/// Translates mnemonic-level emit calls into a method's `Code` array,
/// tracking operand-stack depth (`max_stack`), local-slot usage
/// (`max_locals`), and patching branch/switch targets and exception
/// handlers against labels at [`Self::finalize`].
pub struct BytecodeEmitter {
    instrs: Vec<VMOpcode>,
    offsets: Vec<usize>,
    code_len: usize,
    next_label: usize,
    label_offsets: HashMap<Label, usize>,
    fixups: Vec<BranchFixup>,
    stack_depth: i32,
    max_stack: u16,
    next_slot: u16,
    max_locals: u16,
    locals: HashMap<String, u16>,
    exception_handlers: Vec<(Label, Label, Label, u16)>,
}

impl Default for BytecodeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeEmitter {
    pub fn new() -> Self {
        Self {
            instrs: Vec::new(),
            offsets: Vec::new(),
            code_len: 0,
            next_label: 0,
            label_offsets: HashMap::new(),
            fixups: Vec::new(),
            stack_depth: 0,
            max_stack: 0,
            next_slot: 0,
            max_locals: 0,
            locals: HashMap::new(),
            exception_handlers: Vec::new(),
        }
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Binds `label` to the current end of the instruction stream. Must
    /// be called exactly once per label before [`Self::finalize`].
    pub fn bind_label(&mut self, label: Label) {
        self.label_offsets.insert(label, self.code_len);
    }

    /// Reserves `size` (1 or 2) contiguous local slots for `name` and
    /// returns the first slot index, updating `max_locals`.
    pub fn add_local(&mut self, name: &str, size: u16) -> u16 {
        let slot = self.next_slot;
        self.next_slot += size;
        self.max_locals = self.max_locals.max(self.next_slot);
        self.locals.insert(name.to_string(), slot);
        slot
    }

    pub fn local_slot(&self, name: &str) -> Option<u16> {
        self.locals.get(name).copied()
    }

    /// Marks the start of an exception handler: the JVM pushes the
    /// caught throwable onto what is otherwise an empty operand stack at
    /// this point, regardless of whatever depth the preceding
    /// fallthrough code left behind (this emitter tracks depth as a
    /// single running counter, not per-basic-block, so handler entry
    /// needs an explicit reset).
    pub fn enter_exception_handler(&mut self) {
        self.stack_depth = 1;
        self.max_stack = self.max_stack.max(1);
    }

    pub fn add_exception_handler(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type_cp_index: u16,
    ) {
        self.exception_handlers
            .push((start, end, handler, catch_type_cp_index));
    }

    /// Applies `delta` to the running stack depth (negative for opcodes
    /// that pop more than they push) and raises `max_stack` as needed.
    fn apply_stack_delta(&mut self, delta: i32) -> error::Result<()> {
        let depth = self.stack_depth + delta;
        if depth < 0 {
            return Err(ClassFileError::InvalidBytecode(
                "popped from an empty operand stack".to_string(),
            ));
        }
        self.stack_depth = depth;
        if depth > u16::MAX as i32 {
            return Err(ClassFileError::MethodTooLarge);
        }
        self.max_stack = self.max_stack.max(depth as u16);
        Ok(())
    }

    /// Appends `op` at the current offset, returning its instruction
    /// index for later patching (branch/switch targets).
    fn push(&mut self, op: VMOpcode) -> error::Result<usize> {
        let offset = self.code_len;
        let mut scratch = Vec::new();
        op.encode(&mut scratch, offset)?;
        self.code_len += scratch.len();
        let index = self.instrs.len();
        self.offsets.push(offset);
        self.instrs.push(op);
        Ok(index)
    }

    /// Appends a zero-operand opcode whose push/pop counts are fixed
    /// regardless of context (arithmetic, conversions, stack
    /// manipulation, array element access, returns, ...).
    pub fn emit(&mut self, op: VMOpcode, stack_delta: i32) -> error::Result<()> {
        self.push(op)?;
        self.apply_stack_delta(stack_delta)
    }

    /// `iconst_m1..5` / `bipush` / `sipush` / `ldc` / `ldc_w`, whichever
    /// is narrowest for `value`.
    pub fn iconst(&mut self, value: i32, pool: &mut ConstantPoolBuilder) -> error::Result<()> {
        let op = match value {
            -1 => VMOpcode::iconst_m1(),
            0 => VMOpcode::iconst_0(),
            1 => VMOpcode::iconst_1(),
            2 => VMOpcode::iconst_2(),
            3 => VMOpcode::iconst_3(),
            4 => VMOpcode::iconst_4(),
            5 => VMOpcode::iconst_5(),
            -128..=127 => VMOpcode::bipush(value as i8 as u8),
            -32768..=32767 => VMOpcode::sipush(value as i16 as u16),
            _ => {
                let index = pool.add_integer(value)?;
                return self.ldc_index(index);
            }
        };
        self.push(op)?;
        self.apply_stack_delta(1)
    }

    pub fn lconst(&mut self, value: i64) -> error::Result<()> {
        let op = match value {
            0 => VMOpcode::lconst_0(),
            1 => VMOpcode::lconst_1(),
            _ => {
                return Err(ClassFileError::InvalidBytecode(
                    "lconst only has constants for 0 and 1; load via ldc2_w".to_string(),
                ))
            }
        };
        self.push(op)?;
        self.apply_stack_delta(2)
    }

    pub fn fconst(&mut self, value: f32) -> error::Result<()> {
        let op = if value == 0.0 {
            VMOpcode::fconst_0()
        } else if value == 1.0 {
            VMOpcode::fconst_1()
        } else if value == 2.0 {
            VMOpcode::fconst_2()
        } else {
            return Err(ClassFileError::InvalidBytecode(
                "fconst only has constants for 0, 1 and 2; load via ldc".to_string(),
            ));
        };
        self.push(op)?;
        self.apply_stack_delta(1)
    }

    pub fn dconst(&mut self, value: f64) -> error::Result<()> {
        let op = if value == 0.0 {
            VMOpcode::dconst_0()
        } else if value == 1.0 {
            VMOpcode::dconst_1()
        } else {
            return Err(ClassFileError::InvalidBytecode(
                "dconst only has constants for 0 and 1; load via ldc2_w".to_string(),
            ));
        };
        self.push(op)?;
        self.apply_stack_delta(2)
    }

    /// Loads a wide (category 2) constant via `ldc2_w`.
    pub fn ldc_long(&mut self, value: i64, pool: &mut ConstantPoolBuilder) -> error::Result<()> {
        let index = pool.add_long(value)?;
        self.push(VMOpcode::ldc2_w(index))?;
        self.apply_stack_delta(2)
    }

    pub fn ldc_double(&mut self, value: f64, pool: &mut ConstantPoolBuilder) -> error::Result<()> {
        let index = pool.add_double(value)?;
        self.push(VMOpcode::ldc2_w(index))?;
        self.apply_stack_delta(2)
    }

    pub fn ldc_float(&mut self, value: f32, pool: &mut ConstantPoolBuilder) -> error::Result<()> {
        let index = pool.add_float(value)?;
        self.ldc_index(index)
    }

    pub fn ldc_string(&mut self, value: &str, pool: &mut ConstantPoolBuilder) -> error::Result<()> {
        let index = pool.add_string(value)?;
        self.ldc_index(index)
    }

    pub fn aconst_null(&mut self) -> error::Result<()> {
        self.push(VMOpcode::aconst_null())?;
        self.apply_stack_delta(1)
    }

    /// `ldc` for indices that fit in a byte, `ldc_w` otherwise.
    fn ldc_index(&mut self, index: u16) -> error::Result<()> {
        let op = match u8::try_from(index) {
            Ok(narrow) => VMOpcode::ldc(narrow),
            Err(_) => VMOpcode::ldc_w(index),
        };
        self.push(op)?;
        self.apply_stack_delta(1)
    }

    /// Category-1 load (`iload`/`fload`/`aload`), dispatching to the
    /// dedicated `_0..3` forms for the first four slots.
    pub fn load1(&mut self, kind: LoadStoreKind, slot: u16) -> error::Result<()> {
        let op = kind.load1(slot)?;
        self.push(op)?;
        self.apply_stack_delta(1)
    }

    /// Category-1 store (`istore`/`fstore`/`astore`).
    pub fn store1(&mut self, kind: LoadStoreKind, slot: u16) -> error::Result<()> {
        let op = kind.store1(slot)?;
        self.push(op)?;
        self.apply_stack_delta(-1)
    }

    /// Category-2 load (`lload`/`dload`).
    pub fn load2(&mut self, kind: LoadStoreKind, slot: u16) -> error::Result<()> {
        let op = kind.load2(slot)?;
        self.push(op)?;
        self.apply_stack_delta(2)
    }

    /// Category-2 store (`lstore`/`dstore`).
    pub fn store2(&mut self, kind: LoadStoreKind, slot: u16) -> error::Result<()> {
        let op = kind.store2(slot)?;
        self.push(op)?;
        self.apply_stack_delta(-2)
    }

    pub fn iinc(&mut self, slot: u8, amount: u8) -> error::Result<()> {
        self.push(VMOpcode::iinc(slot, amount))?;
        Ok(())
    }

    pub fn getstatic(&mut self, index: u16, slots: i32) -> error::Result<()> {
        self.push(VMOpcode::getstatic(index))?;
        self.apply_stack_delta(slots)
    }

    pub fn putstatic(&mut self, index: u16, slots: i32) -> error::Result<()> {
        self.push(VMOpcode::putstatic(index))?;
        self.apply_stack_delta(-slots)
    }

    pub fn getfield(&mut self, index: u16, slots: i32) -> error::Result<()> {
        self.push(VMOpcode::getfield(index))?;
        self.apply_stack_delta(slots - 1)
    }

    pub fn putfield(&mut self, index: u16, slots: i32) -> error::Result<()> {
        self.push(VMOpcode::putfield(index))?;
        self.apply_stack_delta(-slots - 1)
    }

    /// `invokestatic`. `arg_slots` is the sum of parameter slot widths
    /// (2 for `long`/`double`, 1 otherwise); `return_slots` is 0, 1 or 2.
    pub fn invokestatic(&mut self, index: u16, arg_slots: i32, return_slots: i32) -> error::Result<()> {
        self.push(VMOpcode::invokestatic(index))?;
        self.apply_stack_delta(return_slots - arg_slots)
    }

    /// `invokevirtual`/`invokespecial`, which additionally pop the
    /// receiver.
    pub fn invokevirtual(&mut self, index: u16, arg_slots: i32, return_slots: i32) -> error::Result<()> {
        self.push(VMOpcode::invokevirtual(index))?;
        self.apply_stack_delta(return_slots - arg_slots - 1)
    }

    pub fn invokespecial(&mut self, index: u16, arg_slots: i32, return_slots: i32) -> error::Result<()> {
        self.push(VMOpcode::invokespecial(index))?;
        self.apply_stack_delta(return_slots - arg_slots - 1)
    }

    pub fn invokeinterface(
        &mut self,
        index: u16,
        arg_slots: i32,
        return_slots: i32,
    ) -> error::Result<()> {
        let count = (arg_slots + 1) as u8;
        self.push(VMOpcode::invokeinterface(index, count, 0))?;
        self.apply_stack_delta(return_slots - arg_slots - 1)
    }

    pub fn invokedynamic(
        &mut self,
        index: u16,
        arg_slots: i32,
        return_slots: i32,
    ) -> error::Result<()> {
        self.push(VMOpcode::invokedynamic(index, 0))?;
        self.apply_stack_delta(return_slots - arg_slots)
    }

    pub fn new_object(&mut self, class_index: u16) -> error::Result<()> {
        self.push(VMOpcode::new(class_index))?;
        self.apply_stack_delta(1)
    }

    pub fn newarray(&mut self, element_type: ArrayTypeCode) -> error::Result<()> {
        self.push(VMOpcode::newarray(element_type))?;
        self.apply_stack_delta(0)
    }

    pub fn anewarray(&mut self, class_index: u16) -> error::Result<()> {
        self.push(VMOpcode::anewarray(class_index))?;
        self.apply_stack_delta(0)
    }

    pub fn multianewarray(&mut self, class_index: u16, dimensions: u8) -> error::Result<()> {
        self.push(VMOpcode::multianewarray(class_index, dimensions))?;
        self.apply_stack_delta(1 - dimensions as i32)
    }

    pub fn checkcast(&mut self, class_index: u16) -> error::Result<()> {
        self.push(VMOpcode::checkcast(class_index))?;
        self.apply_stack_delta(0)
    }

    pub fn instanceof(&mut self, class_index: u16) -> error::Result<()> {
        self.push(VMOpcode::instanceof(class_index))?;
        self.apply_stack_delta(0)
    }

    /// A branch instruction (`ifeq`, `if_icmpne`, `goto`, ...) whose
    /// `i16` displacement is resolved against `target` at
    /// [`Self::finalize`]. `stack_delta` is the pop count of the
    /// condition operands (0 for `goto`, -1 for `ifeq`-family, -2 for
    /// `if_icmp*`/`if_acmp*`).
    pub fn branch(&mut self, op: VMOpcode, target: Label, stack_delta: i32) -> error::Result<()> {
        let index = self.push(op)?;
        self.fixups.push(BranchFixup::Simple {
            instr_index: index,
            target,
        });
        self.apply_stack_delta(stack_delta)
    }

    /// `lookupswitch`. `pairs` need not be pre-sorted; this sorts by
    /// match value in ascending order per the JVM's requirement.
    pub fn lookupswitch(&mut self, default: Label, mut pairs: Vec<(i32, Label)>) -> error::Result<()> {
        pairs.sort_by_key(|(key, _)| *key);
        let targets: Vec<Label> = pairs.iter().map(|(_, l)| *l).collect();
        let placeholder_pairs: Vec<(i32, i32)> = pairs.iter().map(|(key, _)| (*key, 0)).collect();
        let index = self.push(VMOpcode::lookupswitch(0, placeholder_pairs))?;
        self.fixups.push(BranchFixup::Lookup {
            instr_index: index,
            default,
            targets,
        });
        self.apply_stack_delta(-1)
    }

    /// `tableswitch` over the contiguous range `low..=high`; `targets`
    /// must have `high - low + 1` entries, in index order.
    pub fn tableswitch(
        &mut self,
        default: Label,
        low: i32,
        high: i32,
        targets: Vec<Label>,
    ) -> error::Result<()> {
        let placeholder_offsets = vec![0; targets.len()];
        let index = self.push(VMOpcode::tableswitch(0, low, high, placeholder_offsets))?;
        self.fixups.push(BranchFixup::Table {
            instr_index: index,
            default,
            targets,
        });
        self.apply_stack_delta(-1)
    }

    fn resolve(&self, label: Label, from_offset: usize) -> error::Result<i32> {
        let target = *self
            .label_offsets
            .get(&label)
            .ok_or_else(|| ClassFileError::InvalidBytecode(format!("unresolved label {:?}", label)))?;
        Ok(target as i64 as i32 - from_offset as i64 as i32)
    }

    /// Patches every branch/switch target, producing the finished
    /// `Code` array contents alongside the watermarks tracked during
    /// emission.
    pub fn finalize(mut self) -> error::Result<(InstructionList, u16, u16, Vec<ExceptionTableEntry>)> {
        for fixup in &self.fixups {
            match fixup {
                BranchFixup::Simple { instr_index, target } => {
                    let from = self.offsets[*instr_index];
                    let disp = self.resolve(*target, from)?;
                    let disp16 = i16::try_from(disp)
                        .map_err(|_| ClassFileError::MethodTooLarge)?;
                    patch_simple_branch(&mut self.instrs[*instr_index], disp16)?;
                }
                BranchFixup::Lookup {
                    instr_index,
                    default,
                    targets,
                } => {
                    let from = self.offsets[*instr_index];
                    let default_disp = self.resolve(*default, from)?;
                    let mut offsets = Vec::with_capacity(targets.len());
                    for target in targets {
                        offsets.push(self.resolve(*target, from)?);
                    }
                    if let VMOpcode::lookupswitch(d, pairs) = &mut self.instrs[*instr_index] {
                        *d = default_disp;
                        for (pair, offset) in pairs.iter_mut().zip(offsets) {
                            pair.1 = offset;
                        }
                    }
                }
                BranchFixup::Table {
                    instr_index,
                    default,
                    targets,
                } => {
                    let from = self.offsets[*instr_index];
                    let default_disp = self.resolve(*default, from)?;
                    let mut offsets = Vec::with_capacity(targets.len());
                    for target in targets {
                        offsets.push(self.resolve(*target, from)?);
                    }
                    if let VMOpcode::tableswitch(d, _, _, table) = &mut self.instrs[*instr_index] {
                        *d = default_disp;
                        *table = offsets;
                    }
                }
            }
        }

        let exception_table = self
            .exception_handlers
            .iter()
            .map(|(start, end, handler, catch_type)| {
                let start_pc = *self
                    .label_offsets
                    .get(start)
                    .ok_or_else(|| ClassFileError::InvalidBytecode("unresolved handler start label".to_string()))?;
                let end_pc = *self
                    .label_offsets
                    .get(end)
                    .ok_or_else(|| ClassFileError::InvalidBytecode("unresolved handler end label".to_string()))?;
                let handler_pc = *self
                    .label_offsets
                    .get(handler)
                    .ok_or_else(|| ClassFileError::InvalidBytecode("unresolved handler label".to_string()))?;
                Ok(ExceptionTableEntry {
                    pc_range: (start_pc as u16)..=(end_pc as u16),
                    handler_pc: handler_pc as u16,
                    catch_type: *catch_type,
                })
            })
            .collect::<error::Result<Vec<_>>>()?;

        let code = InstructionList {
            opcodes: self.instrs,
            byte_to_code: FnvHashMap::default(),
            code_to_byte: FnvHashMap::default(),
        };

        Ok((code, self.max_stack, self.max_locals, exception_table))
    }
}

fn patch_simple_branch(op: &mut VMOpcode, disp: i16) -> error::Result<()> {
    match op {
        VMOpcode::ifeq(d)
        | VMOpcode::ifne(d)
        | VMOpcode::iflt(d)
        | VMOpcode::ifge(d)
        | VMOpcode::ifgt(d)
        | VMOpcode::ifle(d)
        | VMOpcode::ifnull(d)
        | VMOpcode::ifnonnull(d)
        | VMOpcode::if_icmpeq(d)
        | VMOpcode::if_icmpne(d)
        | VMOpcode::if_icmplt(d)
        | VMOpcode::if_icmpge(d)
        | VMOpcode::if_icmpgt(d)
        | VMOpcode::if_icmple(d)
        | VMOpcode::if_acmpeq(d)
        | VMOpcode::if_acmpne(d)
        | VMOpcode::goto(d) => {
            *d = disp;
            Ok(())
        }
        _ => Err(ClassFileError::InvalidBytecode(
            "patch_simple_branch called on a non-branch opcode".to_string(),
        )),
    }
}

/// Which family of typed load/store opcodes to use: `i`/`l`/`f`/`d`/`a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStoreKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl LoadStoreKind {
    fn load1(self, slot: u16) -> error::Result<VMOpcode> {
        Ok(match (self, slot) {
            (Self::Int, 0) => VMOpcode::iload_0(),
            (Self::Int, 1) => VMOpcode::iload_1(),
            (Self::Int, 2) => VMOpcode::iload_2(),
            (Self::Int, 3) => VMOpcode::iload_3(),
            (Self::Int, n) => VMOpcode::iload(narrow_slot(n)?),
            (Self::Float, 0) => VMOpcode::fload_0(),
            (Self::Float, 1) => VMOpcode::fload_1(),
            (Self::Float, 2) => VMOpcode::fload_2(),
            (Self::Float, 3) => VMOpcode::fload_3(),
            (Self::Float, n) => VMOpcode::fload(narrow_slot(n)?),
            (Self::Reference, 0) => VMOpcode::aload_0(),
            (Self::Reference, 1) => VMOpcode::aload_1(),
            (Self::Reference, 2) => VMOpcode::aload_2(),
            (Self::Reference, 3) => VMOpcode::aload_3(),
            (Self::Reference, n) => VMOpcode::aload(narrow_slot(n)?),
            (Self::Long | Self::Double, _) => {
                return Err(ClassFileError::InvalidBytecode(
                    "category-2 local loaded via load1".to_string(),
                ))
            }
        })
    }

    fn store1(self, slot: u16) -> error::Result<VMOpcode> {
        Ok(match (self, slot) {
            (Self::Int, 0) => VMOpcode::istore_0(),
            (Self::Int, 1) => VMOpcode::istore_1(),
            (Self::Int, 2) => VMOpcode::istore_2(),
            (Self::Int, 3) => VMOpcode::istore_3(),
            (Self::Int, n) => VMOpcode::istore(narrow_slot(n)?),
            (Self::Float, 0) => VMOpcode::fstore_0(),
            (Self::Float, 1) => VMOpcode::fstore_1(),
            (Self::Float, 2) => VMOpcode::fstore_2(),
            (Self::Float, 3) => VMOpcode::fstore_3(),
            (Self::Float, n) => VMOpcode::fstore(narrow_slot(n)?),
            (Self::Reference, 0) => VMOpcode::astore_0(),
            (Self::Reference, 1) => VMOpcode::astore_1(),
            (Self::Reference, 2) => VMOpcode::astore_2(),
            (Self::Reference, 3) => VMOpcode::astore_3(),
            (Self::Reference, n) => VMOpcode::astore(narrow_slot(n)?),
            (Self::Long | Self::Double, _) => {
                return Err(ClassFileError::InvalidBytecode(
                    "category-2 local stored via store1".to_string(),
                ))
            }
        })
    }

    fn load2(self, slot: u16) -> error::Result<VMOpcode> {
        Ok(match (self, slot) {
            (Self::Long, 0) => VMOpcode::lload_0(),
            (Self::Long, 1) => VMOpcode::lload_1(),
            (Self::Long, 2) => VMOpcode::lload_2(),
            (Self::Long, 3) => VMOpcode::lload_3(),
            (Self::Long, n) => VMOpcode::lload(narrow_slot(n)?),
            (Self::Double, 0) => VMOpcode::dload_0(),
            (Self::Double, 1) => VMOpcode::dload_1(),
            (Self::Double, 2) => VMOpcode::dload_2(),
            (Self::Double, 3) => VMOpcode::dload_3(),
            (Self::Double, n) => VMOpcode::dload(narrow_slot(n)?),
            _ => {
                return Err(ClassFileError::InvalidBytecode(
                    "category-1 local loaded via load2".to_string(),
                ))
            }
        })
    }

    fn store2(self, slot: u16) -> error::Result<VMOpcode> {
        Ok(match (self, slot) {
            (Self::Long, 0) => VMOpcode::lstore_0(),
            (Self::Long, 1) => VMOpcode::lstore_1(),
            (Self::Long, 2) => VMOpcode::lstore_2(),
            (Self::Long, 3) => VMOpcode::lstore_3(),
            (Self::Long, n) => VMOpcode::lstore(narrow_slot(n)?),
            (Self::Double, 0) => VMOpcode::dstore_0(),
            (Self::Double, 1) => VMOpcode::dstore_1(),
            (Self::Double, 2) => VMOpcode::dstore_2(),
            (Self::Double, 3) => VMOpcode::dstore_3(),
            (Self::Double, n) => VMOpcode::dstore(narrow_slot(n)?),
            _ => {
                return Err(ClassFileError::InvalidBytecode(
                    "category-1 local stored via store2".to_string(),
                ))
            }
        })
    }
}

fn narrow_slot(slot: u16) -> error::Result<u8> {
    u8::try_from(slot).map_err(|_| {
        ClassFileError::InvalidBytecode(
            "local slot beyond 255 needs a `wide` prefix, which this emitter never emits".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_method_tracks_max_stack() {
        let mut emitter = BytecodeEmitter::new();
        let mut pool = ConstantPoolBuilder::new();
        emitter.add_local("this", 1);
        emitter.iconst(1, &mut pool).unwrap();
        emitter.iconst(2, &mut pool).unwrap();
        emitter.emit(VMOpcode::iadd(), -1).unwrap();
        emitter.emit(VMOpcode::ireturn(), -1).unwrap();
        let (code, max_stack, max_locals, exceptions) = emitter.finalize().unwrap();
        assert_eq!(max_stack, 2);
        assert_eq!(max_locals, 1);
        assert!(exceptions.is_empty());
        assert_eq!(code.opcodes.len(), 4);
    }

    #[test]
    fn backward_branch_resolves_negative_displacement() {
        let mut emitter = BytecodeEmitter::new();
        let top = emitter.new_label();
        emitter.bind_label(top);
        emitter.emit(VMOpcode::nop(), 0).unwrap();
        emitter.branch(VMOpcode::goto(0), top, 0).unwrap();
        let (code, _, _, _) = emitter.finalize().unwrap();
        match &code.opcodes[1] {
            VMOpcode::goto(disp) => assert_eq!(*disp, -1),
            other => panic!("expected goto, got {:?}", other),
        }
    }

    #[test]
    fn popping_empty_stack_is_invalid_bytecode() {
        let mut emitter = BytecodeEmitter::new();
        let err = emitter.emit(VMOpcode::pop(), -1).unwrap_err();
        assert!(matches!(err, ClassFileError::InvalidBytecode(_)));
    }

    #[test]
    fn lookupswitch_sorts_match_pairs() {
        let mut emitter = BytecodeEmitter::new();
        let default = emitter.new_label();
        let a = emitter.new_label();
        let b = emitter.new_label();
        emitter.iconst(0, &mut ConstantPoolBuilder::new()).unwrap();
        emitter
            .lookupswitch(default, vec![(5, a), (1, b)])
            .unwrap();
        emitter.bind_label(a);
        emitter.bind_label(b);
        emitter.bind_label(default);
        let (code, _, _, _) = emitter.finalize().unwrap();
        match &code.opcodes[1] {
            VMOpcode::lookupswitch(_, pairs) => {
                assert_eq!(pairs[0].0, 1);
                assert_eq!(pairs[1].0, 5);
            }
            other => panic!("expected lookupswitch, got {:?}", other),
        }
    }
}
