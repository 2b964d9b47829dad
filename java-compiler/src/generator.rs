//! The declaration compiler: walks a type declaration's members, lays
//! down a [`ClassFileBuilder`], and drives the expression/statement
//! compilers for each method body. One `Generator` processes one
//! source file's types sequentially; nested-type compilation is a
//! recursive in-place call that saves and restores the outer type's
//! context, per spec.md's single-threaded-per-compilation model.

use std::collections::{HashMap, HashSet};

use exo_class_file::item::{
    attribute_info::{Attributes, AttributesCollection, ClassArrayEntry, ExceptionTableEntry},
    constant_pool::ConstantPoolBuilder,
    file::ClassAccessFlags,
    fields::{FieldAccessFlags, FieldInfo},
    methods::{MethodAccessFlags, MethodInfo},
    opcodes::{InstructionList, VMOpcode},
    writer::{BytecodeEmitter, ClassFileBuilder, Label, LoadStoreKind},
};

use crate::ast::{ConstructorDecl, Expr, Literal, Member, MethodDecl, Modifiers, Stmt, TypeDecl, TypeKind, TypeRef};
use crate::classpath::{ClassMetadata, ClassPath};
use crate::error::{CompileError, CompileResult};
use crate::expr::compile_expr_with_target;
use crate::stmt::compile_stmt;
use crate::symbols::{FieldCandidate, LocalClass, LocalClassRegistry, MethodCandidate, NameResolver};
use crate::types::{MethodType, Type};

/// Per-loop break/continue targets, pushed by the statement compiler
/// for every `while`/`do`/`for`/`for-each`/labeled loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopLabels {
    pub break_label: Label,
    pub continue_label: Label,
}

/// The in-flight context for a single method body: its local-variable
/// table, the bytecode emitter laying down its `Code`, a reference to
/// the class-wide constant pool, and the loop/label stacks the
/// statement compiler consults for `break`/`continue`.
pub struct MethodContext<'a> {
    pub classpath: &'a mut ClassPath,
    pub locals_registry: &'a LocalClassRegistry,
    pub resolver: &'a NameResolver,
    /// The enclosing class's builder. Held (not just its constant pool)
    /// so lambda desugaring can append synthetic methods and bootstrap
    /// entries without a separate channel back to the declaration
    /// compiler.
    pub builder: &'a mut ClassFileBuilder,
    pub emitter: BytecodeEmitter,
    pub current_class: String,
    pub is_static: bool,
    pub return_type: Type,
    pub variables: HashMap<String, (u16, Type)>,
    pub loop_stack: Vec<LoopLabels>,
    pub named_loops: HashMap<String, LoopLabels>,
    /// Unlabeled `break` targets: one entry per enclosing loop or
    /// `switch`, pushed alongside (but independent of) `loop_stack` so a
    /// bare `break` inside a `switch` nested in a loop targets the
    /// `switch`'s end rather than the loop's.
    pub break_stack: Vec<Label>,
    /// `break label;` targets for any [`crate::ast::Stmt::Labeled`]
    /// statement, keyed by label name.
    pub labeled_ends: HashMap<String, Label>,
    /// Shared across every method/constructor/`<clinit>` of one class
    /// so synthetic `lambda$N` names never collide within it.
    pub lambda_counter: &'a mut usize,
    synthetic_counter: usize,
}

impl<'a> MethodContext<'a> {
    pub fn new(
        classpath: &'a mut ClassPath,
        locals_registry: &'a LocalClassRegistry,
        resolver: &'a NameResolver,
        builder: &'a mut ClassFileBuilder,
        current_class: String,
        is_static: bool,
        return_type: Type,
        lambda_counter: &'a mut usize,
    ) -> Self {
        Self {
            classpath,
            locals_registry,
            resolver,
            builder,
            emitter: BytecodeEmitter::new(),
            current_class,
            is_static,
            return_type,
            variables: HashMap::new(),
            loop_stack: Vec::new(),
            named_loops: HashMap::new(),
            break_stack: Vec::new(),
            labeled_ends: HashMap::new(),
            lambda_counter,
            synthetic_counter: 0,
        }
    }

    pub fn pool(&mut self) -> &mut ConstantPoolBuilder {
        self.builder.constant_pool()
    }

    /// A fresh synthetic name, following pyjopa's `new_label` scheme of
    /// a monotonically increasing per-method counter suffix to avoid
    /// collisions across nested scopes (e.g. `a$0`, `len$0`, `i$0`).
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        let n = self.synthetic_counter;
        self.synthetic_counter += 1;
        format!("{}${}", prefix, n)
    }

    /// A fresh `lambda$N` name, unique across the whole enclosing class.
    pub fn fresh_lambda_name(&mut self) -> String {
        let n = *self.lambda_counter;
        *self.lambda_counter += 1;
        format!("lambda${}", n)
    }

    pub fn declare_local(&mut self, name: &str, ty: Type) -> u16 {
        let slot = self.emitter.add_local(name, ty.slot_size());
        self.variables.insert(name.to_string(), (slot, ty));
        slot
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&(u16, Type)> {
        self.variables.get(name)
    }

    /// Resolves `name` to a fully-qualified internal class name via the
    /// active import/package context.
    pub fn resolve_type_name(&self, name: &str) -> String {
        self.resolver.resolve_type_name(name)
    }

    pub fn resolve_type_ref(&self, type_ref: &TypeRef) -> Type {
        match type_ref {
            TypeRef::Primitive(p) => Type::Primitive(*p),
            TypeRef::Name(name) => Type::class(self.resolve_type_name(name)),
            TypeRef::Array { element, dimensions } => {
                Type::array(self.resolve_type_ref(element), *dimensions)
            }
        }
    }
}

fn access_flags_from_modifiers(m: &Modifiers) -> u16 {
    let mut bits = 0u16;
    if m.public {
        bits |= 0x0001;
    }
    if m.private {
        bits |= 0x0002;
    }
    if m.protected {
        bits |= 0x0004;
    }
    if m.is_static {
        bits |= 0x0008;
    }
    if m.is_final {
        bits |= 0x0010;
    }
    if m.synchronized {
        bits |= 0x0020;
    }
    if m.native {
        bits |= 0x0100;
    }
    if m.is_abstract {
        bits |= 0x0400;
    }
    if m.strictfp {
        bits |= 0x0800;
    }
    bits
}

fn empty_attributes() -> AttributesCollection {
    AttributesCollection {
        collection: HashMap::new(),
    }
}

fn load_store_kind_for(ty: &Type) -> LoadStoreKind {
    match ty.as_primitive() {
        Some(crate::types::Primitive::Long) => LoadStoreKind::Long,
        Some(crate::types::Primitive::Float) => LoadStoreKind::Float,
        Some(crate::types::Primitive::Double) => LoadStoreKind::Double,
        Some(_) => LoadStoreKind::Int,
        None => LoadStoreKind::Reference,
    }
}

fn emit_ldc_class(pool: &mut ConstantPoolBuilder, emitter: &mut BytecodeEmitter, internal_name: &str) -> CompileResult<()> {
    let index = pool.add_class(internal_name)?;
    match u8::try_from(index) {
        Ok(narrow) => emitter.emit(VMOpcode::ldc(narrow), 1).map_err(CompileError::from),
        Err(_) => emitter.emit(VMOpcode::ldc_w(index), 1).map_err(CompileError::from),
    }
}

pub(crate) fn return_opcode_for(ty: &Type) -> (VMOpcode, i32) {
    let slots = ty.slot_size() as i32;
    match ty.as_primitive() {
        Some(crate::types::Primitive::Long) => (VMOpcode::lreturn(), -slots),
        Some(crate::types::Primitive::Float) => (VMOpcode::freturn(), -slots),
        Some(crate::types::Primitive::Double) => (VMOpcode::dreturn(), -slots),
        Some(crate::types::Primitive::Void) => (VMOpcode::r#return(), 0),
        Some(_) => (VMOpcode::ireturn(), -slots),
        None => (VMOpcode::areturn(), -slots),
    }
}

/// One pending field/static initializer, in source order, to be folded
/// into the owning constructor (instance items) or `<clinit>` (static
/// items) the way javac's own `Gen` class does.
enum InitItem<'a> {
    Field(&'a str, Type, &'a Expr),
    Block(&'a [Stmt]),
}

/// Walks `decl`'s members in source order collecting either the static
/// or the instance initializers, skipping fields named in `skip` (the
/// `static final` constant fields already folded into a `ConstantValue`
/// attribute instead).
fn collect_init_items<'a>(decl: &'a TypeDecl, resolver: &NameResolver, want_static: bool, skip: &HashSet<String>) -> Vec<InitItem<'a>> {
    let mut items = Vec::new();
    for member in &decl.members {
        match member {
            Member::Field(f) if f.modifiers.is_static == want_static => {
                for declarator in &f.declarators {
                    if skip.contains(&declarator.name) {
                        continue;
                    }
                    if let Some(init) = &declarator.initializer {
                        let base = resolve_field_type(resolver, &f.element_type);
                        let ty = if declarator.extra_dimensions > 0 {
                            Type::array(base, declarator.extra_dimensions)
                        } else {
                            base
                        };
                        items.push(InitItem::Field(&declarator.name, ty, init));
                    }
                }
            }
            Member::Initializer { is_static, body } if *is_static == want_static => {
                items.push(InitItem::Block(body));
            }
            _ => {}
        }
    }
    items
}

/// Compiles each pending initializer item against an already-live
/// `MethodContext` (constructor body after the super-call, or
/// `<clinit>`), loading `this` first for instance field assignments.
fn emit_init_items(ctx: &mut MethodContext, items: &[InitItem], owner: &str, is_static: bool) -> CompileResult<()> {
    for item in items {
        match item {
            InitItem::Field(name, ty, init) => {
                if !is_static {
                    ctx.emitter.load1(LoadStoreKind::Reference, 0).map_err(CompileError::from)?;
                }
                compile_expr_with_target(ctx, init, ty)?;
                let descriptor = ty.descriptor();
                let index = ctx.pool().add_fieldref(owner, name, &descriptor)?;
                if is_static {
                    ctx.emitter.putstatic(index, ty.slot_size() as i32).map_err(CompileError::from)?;
                } else {
                    ctx.emitter.putfield(index, ty.slot_size() as i32).map_err(CompileError::from)?;
                }
            }
            InitItem::Block(body) => {
                for stmt in body.iter() {
                    compile_stmt(ctx, stmt)?;
                }
            }
        }
    }
    Ok(())
}

/// A `static final` field whose declarator is a bare literal of a type
/// `ConstantValue` accepts gets its value folded into the pool directly
/// (per spec.md §4.1) instead of via `<clinit>`.
fn constant_value_index(pool: &mut ConstantPoolBuilder, ty: &Type, init: &Expr) -> CompileResult<Option<u16>> {
    let Expr::Literal(lit) = init else {
        return Ok(None);
    };
    let index = match (ty.as_primitive(), lit) {
        (Some(crate::types::Primitive::Int), Literal::Int(v)) => pool.add_integer(*v)?,
        (Some(crate::types::Primitive::Short), Literal::Int(v)) => pool.add_integer(*v)?,
        (Some(crate::types::Primitive::Byte), Literal::Int(v)) => pool.add_integer(*v)?,
        (Some(crate::types::Primitive::Char), Literal::Int(v)) => pool.add_integer(*v)?,
        (Some(crate::types::Primitive::Boolean), Literal::Boolean(v)) => pool.add_integer(if *v { 1 } else { 0 })?,
        (Some(crate::types::Primitive::Long), Literal::Long(v)) => pool.add_long(*v)?,
        (Some(crate::types::Primitive::Float), Literal::Float(bits)) => pool.add_float(f32::from_bits(*bits))?,
        (Some(crate::types::Primitive::Double), Literal::Double(bits)) => pool.add_double(f64::from_bits(*bits))?,
        (None, Literal::String(s)) if ty == &Type::string() => pool.add_string(s)?,
        _ => return Ok(None),
    };
    Ok(Some(index))
}

/// Drives compilation of one compilation unit's type declarations into
/// finished class files, maintaining the shared classpath cache across
/// all types in the pass so later declarations can bind against earlier
/// ones without a round trip through bytes.
pub struct Generator {
    pub classpath: ClassPath,
    pub locals: LocalClassRegistry,
}

impl Generator {
    pub fn new(classpath: ClassPath) -> Self {
        Self {
            classpath,
            locals: LocalClassRegistry::new(),
        }
    }

    /// Pre-registers every type declaration's shape (superclass,
    /// interfaces, field/method signatures) before any body is
    /// compiled, so forward references and mutual recursion between
    /// sibling types in one compilation unit resolve.
    pub fn register_shapes(&mut self, package: Option<&str>, types: &[TypeDecl]) -> CompileResult<()> {
        for decl in types {
            self.register_type_shape(package, None, decl)?;
        }
        Ok(())
    }

    fn register_type_shape(&mut self, package: Option<&str>, enclosing: Option<&str>, decl: &TypeDecl) -> CompileResult<()> {
        let internal_name = match package {
            Some(pkg) => format!("{}/{}", pkg, decl.name),
            None => decl.name.clone(),
        };
        let super_name = if decl.kind == TypeKind::Enum {
            Some("java/lang/Enum".to_string())
        } else {
            decl.extends
                .clone()
                .or_else(|| (decl.kind != TypeKind::Interface).then(|| "java/lang/Object".to_string()))
        };

        let is_inner = enclosing.is_some() && decl.kind == TypeKind::Class && !decl.modifiers.is_static;

        let mut fields = Vec::new();
        let mut methods = Vec::new();

        if is_inner {
            fields.push(FieldCandidate {
                owner: internal_name.clone(),
                name: "this$0".to_string(),
                field_type: Type::class(enclosing.unwrap().to_string()),
                is_static: false,
            });
        }

        if decl.kind == TypeKind::Enum {
            for constant in &decl.enum_constants {
                fields.push(FieldCandidate {
                    owner: internal_name.clone(),
                    name: constant.name.clone(),
                    field_type: Type::class(internal_name.clone()),
                    is_static: true,
                });
            }
            fields.push(FieldCandidate {
                owner: internal_name.clone(),
                name: "$VALUES".to_string(),
                field_type: Type::array(Type::class(internal_name.clone()), 1),
                is_static: true,
            });
            methods.push(MethodCandidate {
                owner: internal_name.clone(),
                name: "values".to_string(),
                descriptor: MethodType::new(vec![], Type::array(Type::class(internal_name.clone()), 1)),
                is_static: true,
                is_varargs: false,
            });
            methods.push(MethodCandidate {
                owner: internal_name.clone(),
                name: "valueOf".to_string(),
                descriptor: MethodType::new(vec![Type::string()], Type::class(internal_name.clone())),
                is_static: true,
                is_varargs: false,
            });
        }

        let forced_prefix: Vec<Type> = {
            let mut prefix = Vec::new();
            if decl.kind == TypeKind::Enum {
                prefix.push(Type::string());
                prefix.push(Type::Primitive(crate::types::Primitive::Int));
            }
            if is_inner {
                prefix.push(Type::class(enclosing.unwrap().to_string()));
            }
            prefix
        };

        let mut has_explicit_ctor = false;
        for member in &decl.members {
            match member {
                Member::Field(f) => {
                    let ty = resolve_type_ref_standalone(package, &decl.name, &f.element_type);
                    for declarator in &f.declarators {
                        let element_ty = if declarator.extra_dimensions > 0 {
                            Type::array(ty.clone(), declarator.extra_dimensions)
                        } else {
                            ty.clone()
                        };
                        fields.push(FieldCandidate {
                            owner: internal_name.clone(),
                            name: declarator.name.clone(),
                            field_type: element_ty,
                            is_static: f.modifiers.is_static,
                        });
                    }
                }
                Member::Method(m) => {
                    let return_type = resolve_type_ref_standalone(package, &decl.name, &m.return_type);
                    let parameters = m
                        .parameters
                        .iter()
                        .map(|p| resolve_type_ref_standalone(package, &decl.name, &p.param_type))
                        .collect();
                    methods.push(MethodCandidate {
                        owner: internal_name.clone(),
                        name: m.name.clone(),
                        descriptor: MethodType::new(parameters, return_type),
                        is_static: m.modifiers.is_static,
                        is_varargs: m.parameters.last().map(|p| p.is_varargs).unwrap_or(false),
                    });
                }
                Member::Constructor(c) => {
                    has_explicit_ctor = true;
                    let mut parameters = forced_prefix.clone();
                    parameters.extend(
                        c.parameters
                            .iter()
                            .map(|p| resolve_type_ref_standalone(package, &decl.name, &p.param_type)),
                    );
                    methods.push(MethodCandidate {
                        owner: internal_name.clone(),
                        name: "<init>".to_string(),
                        descriptor: MethodType::new(parameters, Type::void()),
                        is_static: false,
                        is_varargs: c.parameters.last().map(|p| p.is_varargs).unwrap_or(false),
                    });
                }
                Member::NestedType(nested) => {
                    self.register_type_shape(Some(internal_name.as_str()), Some(internal_name.as_str()), nested)?;
                }
                Member::Initializer { .. } => {}
            }
        }

        if !has_explicit_ctor {
            methods.push(MethodCandidate {
                owner: internal_name.clone(),
                name: "<init>".to_string(),
                descriptor: MethodType::new(forced_prefix, Type::void()),
                is_static: false,
                is_varargs: false,
            });
        }

        self.locals.insert(LocalClass {
            internal_name,
            super_name,
            interfaces: decl.implements.clone(),
            fields,
            methods,
        });
        Ok(())
    }

    /// Compiles one type declaration (and its nested types, recursively)
    /// into finished class file byte vectors, keyed by internal name.
    /// `enclosing` is the owning class's internal name for a nested
    /// type, `None` for a top-level one.
    pub fn compile_type(
        &mut self,
        package: Option<&str>,
        decl: &TypeDecl,
        enclosing: Option<&str>,
    ) -> CompileResult<Vec<(String, Vec<u8>)>> {
        let internal_name = match package {
            Some(pkg) => format!("{}/{}", pkg, decl.name),
            None => decl.name.clone(),
        };

        // Nested types are never visited by `register_shapes` on their
        // own (only the top-level pass walks `decl.members`), so make
        // sure this type's own shape (and those of any of its nested
        // types) are registered before any body below references them.
        if self.locals.get(&internal_name).is_none() {
            self.register_type_shape(package, enclosing, decl)?;
        }

        let super_name = if decl.kind == TypeKind::Enum {
            "java/lang/Enum".to_string()
        } else {
            decl.extends.clone().unwrap_or_else(|| "java/lang/Object".to_string())
        };

        let is_inner = enclosing.is_some() && decl.kind == TypeKind::Class && !decl.modifiers.is_static;

        let mut resolver = NameResolver::new(internal_name.clone(), package.map(str::to_string));
        for iface in &decl.implements {
            resolver.add_single_import(iface.clone());
        }
        resolver.add_single_import(super_name.clone());
        if let Some(outer) = enclosing {
            resolver.add_single_import(outer.to_string());
        }

        let mut builder = ClassFileBuilder::new(&internal_name, &super_name).map_err(CompileError::from)?;
        let mut flags = ClassAccessFlags::from_bits(access_flags_from_modifiers(&decl.modifiers)).unwrap_or(ClassAccessFlags::empty());
        flags |= ClassAccessFlags::ACC_SUPER;
        if decl.kind == TypeKind::Interface {
            flags |= ClassAccessFlags::ACC_INTERFACE | ClassAccessFlags::ACC_ABSTRACT;
        }
        if decl.kind == TypeKind::Enum {
            flags |= ClassAccessFlags::ACC_ENUM | ClassAccessFlags::ACC_FINAL;
        }
        builder.set_access_flags(flags);
        for iface in &decl.implements {
            builder.add_interface(iface).map_err(CompileError::from)?;
        }

        if is_inner {
            let this0_descriptor = Type::class(enclosing.unwrap().to_string()).descriptor();
            let name_index = builder.constant_pool().add_utf8("this$0")?;
            let descriptor_index = builder.constant_pool().add_utf8(this0_descriptor)?;
            builder.add_field(FieldInfo {
                access_flags: FieldAccessFlags::ACC_PRIVATE | FieldAccessFlags::ACC_FINAL | FieldAccessFlags::ACC_SYNTHETIC,
                name_index,
                descriptor_index,
                attributes: empty_attributes(),
            });
        }

        let mut forced_prefix_types: Vec<Type> = Vec::new();
        if decl.kind == TypeKind::Enum {
            forced_prefix_types.push(Type::string());
            forced_prefix_types.push(Type::Primitive(crate::types::Primitive::Int));
        }
        if is_inner {
            forced_prefix_types.push(Type::class(enclosing.unwrap().to_string()));
        }

        let constant_fields = collect_constant_field_names(decl, &resolver);
        let static_items = collect_init_items(decl, &resolver, true, &constant_fields);
        let instance_items = collect_init_items(decl, &resolver, false, &HashSet::new());

        let mut lambda_counter = 0usize;
        let mut results = Vec::new();
        let mut has_explicit_ctor = false;

        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    self.compile_field(&mut builder, &resolver, field, &constant_fields)?;
                }
                Member::Method(method) => {
                    self.compile_method(&mut builder, &resolver, &internal_name, method, &mut lambda_counter)?;
                    if let Some(bridge) = find_bridge_target(&self.locals, &super_name, &method.name, &method_param_types(&resolver, method), &resolve_field_type(&resolver, &method.return_type)) {
                        compile_bridge_method(&mut builder, &internal_name, &method.name, &bridge, &resolve_field_type(&resolver, &method.return_type), &method_param_types(&resolver, method))?;
                    }
                }
                Member::Constructor(ctor) => {
                    has_explicit_ctor = true;
                    self.compile_constructor(
                        &mut builder,
                        &resolver,
                        &internal_name,
                        &super_name,
                        ctor,
                        &forced_prefix_types,
                        decl.kind == TypeKind::Enum,
                        is_inner,
                        &instance_items,
                        &mut lambda_counter,
                    )?;
                }
                Member::NestedType(nested) => {
                    let nested_results = self.compile_type(Some(internal_name.as_str()), nested, Some(internal_name.as_str()))?;
                    let nested_internal = match &nested_results.last() {
                        Some((name, _)) => name.clone(),
                        None => format!("{}/{}", internal_name, nested.name),
                    };
                    add_inner_class_entries(&mut builder, &nested_internal, Some(internal_name.as_str()), &nested.name)?;
                    results.extend(nested_results);
                }
                Member::Initializer { .. } => {}
            }
        }

        if !has_explicit_ctor {
            let synthetic = ConstructorDecl {
                modifiers: Modifiers { public: true, ..Modifiers::default() },
                parameters: vec![],
                throws: vec![],
                body: vec![],
            };
            self.compile_constructor(
                &mut builder,
                &resolver,
                &internal_name,
                &super_name,
                &synthetic,
                &forced_prefix_types,
                decl.kind == TypeKind::Enum,
                is_inner,
                &instance_items,
                &mut lambda_counter,
            )?;
        }

        if decl.kind == TypeKind::Enum {
            self.compile_enum_synthetics(&mut builder, &resolver, &internal_name, decl, &static_items, &mut lambda_counter)?;
        } else if !static_items.is_empty() {
            self.compile_clinit(&mut builder, &resolver, &internal_name, &static_items, &mut lambda_counter)?;
        }

        if enclosing.is_some() {
            add_inner_class_entries(&mut builder, &internal_name, enclosing, &decl.name)?;
        }

        let bytes = builder.finish().map_err(CompileError::from)?;
        self.classpath.register(ClassMetadata {
            internal_name: internal_name.clone(),
            access_flags: flags,
            super_name: Some(super_name),
            interfaces: decl.implements.clone(),
            fields: Vec::new(),
            methods: Vec::new(),
            signature: None,
        });
        results.push((internal_name, bytes));
        Ok(results)
    }

    fn compile_field(
        &mut self,
        builder: &mut ClassFileBuilder,
        resolver: &NameResolver,
        field: &crate::ast::FieldDecl,
        constant_fields: &HashSet<String>,
    ) -> CompileResult<()> {
        let element_type = resolve_field_type(resolver, &field.element_type);
        for declarator in &field.declarators {
            let ty = if declarator.extra_dimensions > 0 {
                Type::array(element_type.clone(), declarator.extra_dimensions)
            } else {
                element_type.clone()
            };
            let name_index = builder.constant_pool().add_utf8(declarator.name.clone())?;
            let descriptor_index = builder.constant_pool().add_utf8(ty.descriptor())?;
            let access_flags = FieldAccessFlags::from_bits(access_flags_from_modifiers(&field.modifiers)).unwrap_or(FieldAccessFlags::empty());

            let mut attributes = empty_attributes();
            if constant_fields.contains(&declarator.name) {
                if let Some(init) = &declarator.initializer {
                    if let Some(constantvalue_index) = constant_value_index(builder.constant_pool(), &ty, init)? {
                        attributes.insert("ConstantValue".to_string(), Attributes::ConstantValue { constantvalue_index });
                    }
                }
            }

            builder.add_field(FieldInfo {
                access_flags,
                name_index,
                descriptor_index,
                attributes,
            });
        }
        Ok(())
    }

    fn compile_method(
        &mut self,
        builder: &mut ClassFileBuilder,
        resolver: &NameResolver,
        current_class: &str,
        method: &MethodDecl,
        lambda_counter: &mut usize,
    ) -> CompileResult<()> {
        let return_type = resolve_field_type(resolver, &method.return_type);
        let parameter_types: Vec<Type> = method.parameters.iter().map(|p| resolve_field_type(resolver, &p.param_type)).collect();
        let method_type = MethodType::new(parameter_types.clone(), return_type.clone());

        let name_index = builder.constant_pool().add_utf8(method.name.clone())?;
        let descriptor_index = builder.constant_pool().add_utf8(method_type.descriptor())?;
        let mut access_flags = MethodAccessFlags::from_bits(access_flags_from_modifiers(&method.modifiers)).unwrap_or(MethodAccessFlags::empty());
        if method.parameters.last().map(|p| p.is_varargs).unwrap_or(false) {
            access_flags |= MethodAccessFlags::ACC_VARARGS;
        }

        let mut attributes = empty_attributes();

        if let Some(body) = &method.body {
            let mut ctx = MethodContext::new(
                &mut self.classpath,
                &self.locals,
                resolver,
                &mut *builder,
                current_class.to_string(),
                method.modifiers.is_static,
                return_type.clone(),
                lambda_counter,
            );
            if !method.modifiers.is_static {
                ctx.declare_local("this", Type::class(current_class));
            }
            for param in &method.parameters {
                let ty = resolve_field_type(resolver, &param.param_type);
                ctx.declare_local(&param.name, ty);
            }
            for stmt in body {
                compile_stmt(&mut ctx, stmt)?;
            }
            // Methods whose last statement isn't a `return` (always
            // true for `void`, per spec.md's implicit-return rule) get
            // one appended; a non-void method that falls off the end
            // without returning is a source error the AST builder is
            // responsible for not producing.
            if return_type == Type::void() {
                ctx.emitter.emit(VMOpcode::r#return(), 0).map_err(CompileError::from)?;
            }
            let (code, max_stack, max_locals, exception_table) = ctx.emitter.finalize().map_err(CompileError::from)?;

            attributes.insert(
                "Code".to_string(),
                Attributes::Code {
                    max_stack,
                    max_locals,
                    code,
                    exception_table,
                    attributes: empty_attributes(),
                },
            );
        }

        builder.add_method(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_constructor(
        &mut self,
        builder: &mut ClassFileBuilder,
        resolver: &NameResolver,
        current_class: &str,
        super_name: &str,
        ctor: &ConstructorDecl,
        forced_prefix: &[Type],
        is_enum: bool,
        is_inner: bool,
        instance_items: &[InitItem],
        lambda_counter: &mut usize,
    ) -> CompileResult<()> {
        let declared_types: Vec<Type> = ctor.parameters.iter().map(|p| resolve_field_type(resolver, &p.param_type)).collect();
        let mut parameter_types = forced_prefix.to_vec();
        parameter_types.extend(declared_types.clone());
        let method_type = MethodType::new(parameter_types, Type::void());

        let name_index = builder.constant_pool().add_utf8("<init>")?;
        let descriptor_index = builder.constant_pool().add_utf8(method_type.descriptor())?;
        let access_flags = MethodAccessFlags::from_bits(access_flags_from_modifiers(&ctor.modifiers)).unwrap_or(MethodAccessFlags::empty());

        let mut ctx = MethodContext::new(
            &mut self.classpath,
            &self.locals,
            resolver,
            &mut *builder,
            current_class.to_string(),
            false,
            Type::void(),
            lambda_counter,
        );
        ctx.declare_local("this", Type::class(current_class));

        // Forced leading parameters: enum `(String name, int ordinal)`
        // first, then the enclosing-instance reference for a non-static
        // nested class.
        let mut forced_slots = Vec::new();
        for (i, ty) in forced_prefix.iter().enumerate() {
            let synthetic_name = format!("$forced{}", i);
            let slot = ctx.declare_local(&synthetic_name, ty.clone());
            forced_slots.push(slot);
        }
        let enclosing_slot = if is_inner { forced_slots.last().copied() } else { None };

        for param in &ctor.parameters {
            let ty = resolve_field_type(resolver, &param.param_type);
            ctx.declare_local(&param.name, ty);
        }

        // Implicit `super()` unless the body's first statement is
        // already an explicit `this(...)`/`super(...)` call (modeled
        // here as a bare `MethodCall` expression statement named
        // "super"/"this"; the declaration compiler doesn't special-case
        // it beyond emitting the default when absent).
        let has_explicit_chain = matches!(
            ctor.body.first(),
            Some(Stmt::Expr(Expr::MethodCall { name, .. })) if name == "super" || name == "this"
        );
        let chains_to_this = matches!(
            ctor.body.first(),
            Some(Stmt::Expr(Expr::MethodCall { name, .. })) if name == "this"
        );

        if !has_explicit_chain {
            ctx.emitter.load1(LoadStoreKind::Reference, 0).map_err(CompileError::from)?;
            if is_enum {
                // Enum: chain to Enum(String, int), regardless of whether
                // this enum is also a nested type (the enclosing-instance
                // field, if any, is assigned separately below).
                ctx.emitter.load1(LoadStoreKind::Reference, forced_slots[0]).map_err(CompileError::from)?;
                ctx.emitter.load1(LoadStoreKind::Int, forced_slots[1]).map_err(CompileError::from)?;
                let super_init = ctx.pool().add_methodref(super_name, "<init>", "(Ljava/lang/String;I)V")?;
                ctx.emitter.invokespecial(super_init, 3, 0).map_err(CompileError::from)?;
            } else {
                let super_init = ctx.pool().add_methodref(super_name, "<init>", "()V")?;
                ctx.emitter.invokespecial(super_init, 0, 0).map_err(CompileError::from)?;
            }
            if let Some(slot) = enclosing_slot {
                let this0_ty = forced_prefix.last().cloned().unwrap();
                ctx.emitter.load1(LoadStoreKind::Reference, 0).map_err(CompileError::from)?;
                ctx.emitter.load1(LoadStoreKind::Reference, slot).map_err(CompileError::from)?;
                let descriptor = this0_ty.descriptor();
                let index = ctx.pool().add_fieldref(current_class, "this$0", &descriptor)?;
                ctx.emitter.putfield(index, this0_ty.slot_size() as i32).map_err(CompileError::from)?;
            }
            if !instance_items.is_empty() {
                emit_init_items(&mut ctx, instance_items, current_class, false)?;
            }
        } else if !chains_to_this {
            // Explicit `super(...)`: handled as an ordinary statement by
            // the statement/expression compiler below, which resolves
            // `super` calls against `super_name`'s constructors. Instance
            // initializers still run right after it, same as javac.
        }

        for stmt in &ctor.body {
            compile_stmt(&mut ctx, stmt)?;
        }
        ctx.emitter.emit(VMOpcode::r#return(), 0).map_err(CompileError::from)?;
        let (code, max_stack, max_locals, exception_table) = ctx.emitter.finalize().map_err(CompileError::from)?;

        let mut attributes = empty_attributes();
        attributes.insert(
            "Code".to_string(),
            Attributes::Code {
                max_stack,
                max_locals,
                code,
                exception_table,
                attributes: empty_attributes(),
            },
        );

        builder.add_method(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }

    fn compile_clinit(
        &mut self,
        builder: &mut ClassFileBuilder,
        resolver: &NameResolver,
        current_class: &str,
        static_items: &[InitItem],
        lambda_counter: &mut usize,
    ) -> CompileResult<()> {
        let mut ctx = MethodContext::new(
            &mut self.classpath,
            &self.locals,
            resolver,
            &mut *builder,
            current_class.to_string(),
            true,
            Type::void(),
            lambda_counter,
        );
        emit_init_items(&mut ctx, static_items, current_class, true)?;
        ctx.emitter.emit(VMOpcode::r#return(), 0).map_err(CompileError::from)?;
        let (code, max_stack, max_locals, exception_table) = ctx.emitter.finalize().map_err(CompileError::from)?;

        let name_index = builder.constant_pool().add_utf8("<clinit>")?;
        let descriptor_index = builder.constant_pool().add_utf8("()V")?;
        let mut attributes = empty_attributes();
        attributes.insert(
            "Code".to_string(),
            Attributes::Code {
                max_stack,
                max_locals,
                code,
                exception_table,
                attributes: empty_attributes(),
            },
        );
        builder.add_method(MethodInfo {
            access_flags: MethodAccessFlags::ACC_STATIC,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }

    /// Synthesizes an enum's `<clinit>` (building each constant, then
    /// `$VALUES`, then any other static initializers), plus its
    /// `values()`/`valueOf(String)` accessor pair, per the enum
    /// desugaring javac itself performs.
    fn compile_enum_synthetics(
        &mut self,
        builder: &mut ClassFileBuilder,
        resolver: &NameResolver,
        internal_name: &str,
        decl: &TypeDecl,
        static_items: &[InitItem],
        lambda_counter: &mut usize,
    ) -> CompileResult<()> {
        let enum_ty = Type::class(internal_name.to_string());
        let array_ty = Type::array(enum_ty.clone(), 1);

        let mut ctx = MethodContext::new(
            &mut self.classpath,
            &self.locals,
            resolver,
            &mut *builder,
            internal_name.to_string(),
            true,
            Type::void(),
            lambda_counter,
        );

        for (ordinal, constant) in decl.enum_constants.iter().enumerate() {
            let class_index = ctx.pool().add_class(internal_name)?;
            ctx.emitter.new_object(class_index).map_err(CompileError::from)?;
            ctx.emitter.emit(VMOpcode::dup(), 1).map_err(CompileError::from)?;
            let pool = ctx.pool();
            ctx.emitter.ldc_string(&constant.name, pool).map_err(CompileError::from)?;
            let pool = ctx.pool();
            ctx.emitter.iconst(ordinal as i32, pool).map_err(CompileError::from)?;

            let mut arg_types = Vec::new();
            for arg in &constant.arguments {
                let ty = crate::expr::compile_expr(&mut ctx, arg)?;
                arg_types.push(ty);
            }

            let mut descriptor_params = vec!["Ljava/lang/String;".to_string(), "I".to_string()];
            descriptor_params.extend(arg_types.iter().map(|t| t.descriptor()));
            let ctor_descriptor = format!("({})V", descriptor_params.concat());
            let ctor_index = ctx.pool().add_methodref(internal_name, "<init>", &ctor_descriptor)?;
            let arg_slots: i32 = 2 + arg_types.iter().map(|t| t.slot_size() as i32).sum::<i32>();
            ctx.emitter.invokespecial(ctor_index, arg_slots, 0).map_err(CompileError::from)?;

            let field_index = ctx.pool().add_fieldref(internal_name, &constant.name, &enum_ty.descriptor())?;
            ctx.emitter.putstatic(field_index, 1).map_err(CompileError::from)?;
        }

        let n = decl.enum_constants.len() as i32;
        let pool = ctx.pool();
        ctx.emitter.iconst(n, pool).map_err(CompileError::from)?;
        let element_class_index = ctx.pool().add_class(internal_name)?;
        ctx.emitter.anewarray(element_class_index).map_err(CompileError::from)?;
        for (ordinal, constant) in decl.enum_constants.iter().enumerate() {
            ctx.emitter.emit(VMOpcode::dup(), 1).map_err(CompileError::from)?;
            let pool = ctx.pool();
            ctx.emitter.iconst(ordinal as i32, pool).map_err(CompileError::from)?;
            let field_index = ctx.pool().add_fieldref(internal_name, &constant.name, &enum_ty.descriptor())?;
            ctx.emitter.getstatic(field_index, 1).map_err(CompileError::from)?;
            ctx.emitter.emit(VMOpcode::aastore(), -3).map_err(CompileError::from)?;
        }
        let values_field_index = ctx.pool().add_fieldref(internal_name, "$VALUES", &array_ty.descriptor())?;
        ctx.emitter.putstatic(values_field_index, 1).map_err(CompileError::from)?;

        emit_init_items(&mut ctx, static_items, internal_name, true)?;

        ctx.emitter.emit(VMOpcode::r#return(), 0).map_err(CompileError::from)?;
        let (code, max_stack, max_locals, exception_table) = ctx.emitter.finalize().map_err(CompileError::from)?;
        let name_index = builder.constant_pool().add_utf8("<clinit>")?;
        let descriptor_index = builder.constant_pool().add_utf8("()V")?;
        let mut attributes = empty_attributes();
        attributes.insert(
            "Code".to_string(),
            Attributes::Code {
                max_stack,
                max_locals,
                code,
                exception_table,
                attributes: empty_attributes(),
            },
        );
        builder.add_method(MethodInfo {
            access_flags: MethodAccessFlags::ACC_STATIC,
            name_index,
            descriptor_index,
            attributes,
        });

        self.compile_enum_values_method(builder, internal_name, &array_ty)?;
        self.compile_enum_value_of_method(builder, internal_name, &enum_ty)?;
        Ok(())
    }

    fn compile_enum_values_method(&mut self, builder: &mut ClassFileBuilder, internal_name: &str, array_ty: &Type) -> CompileResult<()> {
        let mut emitter = BytecodeEmitter::new();
        let array_descriptor = array_ty.descriptor();
        let values_field_index = builder.constant_pool().add_fieldref(internal_name, "$VALUES", &array_descriptor)?;
        emitter.getstatic(values_field_index, 1).map_err(CompileError::from)?;
        let clone_index = builder.constant_pool().add_methodref(&array_descriptor, "clone", "()Ljava/lang/Object;")?;
        emitter.invokevirtual(clone_index, 1, 1).map_err(CompileError::from)?;
        let cast_class_index = builder.constant_pool().add_class(&array_descriptor)?;
        emitter.checkcast(cast_class_index).map_err(CompileError::from)?;
        emitter.emit(VMOpcode::areturn(), -1).map_err(CompileError::from)?;

        let (code, max_stack, max_locals, exception_table) = emitter.finalize().map_err(CompileError::from)?;
        let name_index = builder.constant_pool().add_utf8("values")?;
        let descriptor_index = builder.constant_pool().add_utf8(format!("(){}", array_descriptor))?;
        let mut attributes = empty_attributes();
        attributes.insert(
            "Code".to_string(),
            Attributes::Code { max_stack, max_locals, code, exception_table, attributes: empty_attributes() },
        );
        builder.add_method(MethodInfo {
            access_flags: MethodAccessFlags::ACC_PUBLIC | MethodAccessFlags::ACC_STATIC,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }

    fn compile_enum_value_of_method(&mut self, builder: &mut ClassFileBuilder, internal_name: &str, enum_ty: &Type) -> CompileResult<()> {
        let mut emitter = BytecodeEmitter::new();
        emitter.add_local("name", 1);
        emit_ldc_class(builder.constant_pool(), &mut emitter, internal_name)?;
        emitter.load1(LoadStoreKind::Reference, 0).map_err(CompileError::from)?;
        let value_of_index = builder.constant_pool().add_methodref(
            "java/lang/Enum",
            "valueOf",
            "(Ljava/lang/Class;Ljava/lang/String;)Ljava/lang/Enum;",
        )?;
        emitter.invokestatic(value_of_index, 2, 1).map_err(CompileError::from)?;
        let cast_index = builder.constant_pool().add_class(internal_name)?;
        emitter.checkcast(cast_index).map_err(CompileError::from)?;
        emitter.emit(VMOpcode::areturn(), -1).map_err(CompileError::from)?;

        let (code, max_stack, max_locals, exception_table) = emitter.finalize().map_err(CompileError::from)?;
        let name_index = builder.constant_pool().add_utf8("valueOf")?;
        let descriptor_index = builder.constant_pool().add_utf8(format!("(Ljava/lang/String;){}", enum_ty.descriptor()))?;
        let mut attributes = empty_attributes();
        attributes.insert(
            "Code".to_string(),
            Attributes::Code { max_stack, max_locals, code, exception_table, attributes: empty_attributes() },
        );
        builder.add_method(MethodInfo {
            access_flags: MethodAccessFlags::ACC_PUBLIC | MethodAccessFlags::ACC_STATIC,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }
}

/// Finds a covariant-return override one level up the superclass chain
/// (locals only; interfaces and multi-level superclasses aren't
/// consulted, a deliberate simplification documented in DESIGN.md).
fn find_bridge_target(
    locals: &LocalClassRegistry,
    super_name: &str,
    name: &str,
    params: &[Type],
    my_return: &Type,
) -> Option<MethodType> {
    let super_class = locals.get(super_name)?;
    super_class
        .methods
        .iter()
        .find(|m| {
            m.name == name
                && !m.is_static
                && m.descriptor.parameters == params
                && &m.descriptor.return_type != my_return
        })
        .map(|m| m.descriptor.clone())
}

fn compile_bridge_method(
    builder: &mut ClassFileBuilder,
    current_class: &str,
    name: &str,
    bridge_descriptor: &MethodType,
    real_return: &Type,
    real_params: &[Type],
) -> CompileResult<()> {
    let mut emitter = BytecodeEmitter::new();
    let mut slot = emitter.add_local("this", 1);
    emitter.load1(LoadStoreKind::Reference, slot).map_err(CompileError::from)?;
    for param in real_params {
        slot = emitter.add_local("p", param.slot_size());
        let kind = load_store_kind_for(param);
        if param.slot_size() == 2 {
            emitter.load2(kind, slot).map_err(CompileError::from)?;
        } else {
            emitter.load1(kind, slot).map_err(CompileError::from)?;
        }
    }
    let real_descriptor = MethodType::new(real_params.to_vec(), real_return.clone()).descriptor();
    let methodref_index = builder.constant_pool().add_methodref(current_class, name, &real_descriptor)?;
    let arg_slots: i32 = 1 + real_params.iter().map(|t| t.slot_size() as i32).sum::<i32>();
    emitter.invokevirtual(methodref_index, arg_slots, real_return.slot_size() as i32).map_err(CompileError::from)?;
    let (ret_op, delta) = return_opcode_for(&bridge_descriptor.return_type);
    emitter.emit(ret_op, delta).map_err(CompileError::from)?;

    let (code, max_stack, max_locals, exception_table) = emitter.finalize().map_err(CompileError::from)?;
    let name_index = builder.constant_pool().add_utf8(name)?;
    let descriptor_index = builder.constant_pool().add_utf8(bridge_descriptor.descriptor())?;
    let mut attributes = empty_attributes();
    attributes.insert(
        "Code".to_string(),
        Attributes::Code { max_stack, max_locals, code, exception_table, attributes: empty_attributes() },
    );
    builder.add_method(MethodInfo {
        access_flags: MethodAccessFlags::ACC_PUBLIC | MethodAccessFlags::ACC_BRIDGE | MethodAccessFlags::ACC_SYNTHETIC,
        name_index,
        descriptor_index,
        attributes,
    });
    Ok(())
}

/// Appends an already-compiled synthetic method body (a lambda's
/// desugared implementation) straight onto the enclosing class's
/// builder. Used by the expression compiler, which finishes emitting a
/// lambda body before the declaration compiler gets a chance to see it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn append_synthetic_method(
    builder: &mut ClassFileBuilder,
    name: &str,
    descriptor: &str,
    access_flags: MethodAccessFlags,
    code: InstructionList,
    max_stack: u16,
    max_locals: u16,
    exception_table: Vec<ExceptionTableEntry>,
) -> CompileResult<()> {
    let name_index = builder.constant_pool().add_utf8(name.to_string())?;
    let descriptor_index = builder.constant_pool().add_utf8(descriptor.to_string())?;
    let mut attributes = empty_attributes();
    attributes.insert(
        "Code".to_string(),
        Attributes::Code { max_stack, max_locals, code, exception_table, attributes: empty_attributes() },
    );
    builder.add_method(MethodInfo {
        access_flags,
        name_index,
        descriptor_index,
        attributes,
    });
    Ok(())
}

fn method_param_types(resolver: &NameResolver, method: &MethodDecl) -> Vec<Type> {
    method.parameters.iter().map(|p| resolve_field_type(resolver, &p.param_type)).collect()
}

fn add_inner_class_entries(
    builder: &mut ClassFileBuilder,
    inner_internal_name: &str,
    outer_internal_name: Option<&str>,
    simple_name: &str,
) -> CompileResult<()> {
    let inner_class_info_index = builder.constant_pool().add_class(inner_internal_name)?;
    let outer_class_info_index = match outer_internal_name {
        Some(outer) => builder.constant_pool().add_class(outer)?,
        None => 0,
    };
    let inner_name_index = builder.constant_pool().add_utf8(simple_name)?;
    builder.add_inner_class(ClassArrayEntry {
        inner_class_info_index,
        outer_class_info_index,
        inner_name_index,
        inner_class_access_flags: ClassAccessFlags::ACC_PUBLIC,
    });
    Ok(())
}

/// The set of declarator names (of `static final` fields with a
/// constant-eligible literal initializer) that get a `ConstantValue`
/// attribute instead of a `<clinit>` assignment.
fn collect_constant_field_names(decl: &TypeDecl, _resolver: &NameResolver) -> HashSet<String> {
    let mut names = HashSet::new();
    for member in &decl.members {
        if let Member::Field(f) = member {
            if !(f.modifiers.is_static && f.modifiers.is_final) {
                continue;
            }
            for declarator in &f.declarators {
                if declarator.extra_dimensions > 0 {
                    continue;
                }
                if let Some(Expr::Literal(_)) = &declarator.initializer {
                    names.insert(declarator.name.clone());
                }
            }
        }
    }
    names
}

fn resolve_field_type(resolver: &NameResolver, type_ref: &TypeRef) -> Type {
    match type_ref {
        TypeRef::Primitive(p) => Type::Primitive(*p),
        TypeRef::Name(name) => Type::class(resolver.resolve_type_name(name)),
        TypeRef::Array { element, dimensions } => Type::array(resolve_field_type(resolver, element), *dimensions),
    }
}

/// Used during shape registration, before a `NameResolver` exists for
/// the type being registered (imports aren't threaded through the
/// pre-pass); qualifies bare names against the declaring package only.
fn resolve_type_ref_standalone(package: Option<&str>, _current: &str, type_ref: &TypeRef) -> Type {
    match type_ref {
        TypeRef::Primitive(p) => Type::Primitive(*p),
        TypeRef::Name(name) if name.contains('/') || name.starts_with("java/") => Type::class(name.clone()),
        TypeRef::Name(name) => match package {
            Some(pkg) => Type::class(format!("{}/{}", pkg, name)),
            None => Type::class(name.clone()),
        },
        TypeRef::Array { element, dimensions } => Type::array(resolve_type_ref_standalone(package, _current, element), *dimensions),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use exo_class_file::item::file::ClassFile;
    use exo_class_file::item::ClassFileItem;
    use exo_class_file::stream::ClassFileStream;

    use crate::ast::{BinaryOp, Declarator, Expr, Member, MethodDecl, Modifiers, Parameter, Stmt, TypeDecl, TypeKind};
    use crate::types::Primitive;

    use super::*;

    fn modifiers(public: bool, is_static: bool) -> Modifiers {
        Modifiers {
            public,
            is_static,
            ..Modifiers::default()
        }
    }

    fn int_ty() -> TypeRef {
        TypeRef::Primitive(Primitive::Int)
    }

    /// Round-trips a compiled type through the reader and returns its
    /// `ClassFile`, so assertions can inspect what actually landed on
    /// the wire rather than trusting the generator's own bookkeeping.
    fn reread(bytes: &[u8]) -> ClassFile {
        ClassFile::read_from_stream(&mut ClassFileStream::new(&mut Cursor::new(bytes)), None)
            .expect("generated bytes must parse back")
    }

    fn class_name_at(class_file: &ClassFile, class_index: u16) -> String {
        match class_file.constant_pool.get_constant(class_index as usize) {
            exo_class_file::item::constant_pool::ConstantPoolEntry::Class { name_index } => class_file
                .constant_pool
                .get_utf8_constant(*name_index as usize)
                .unwrap()
                .to_string(),
            other => panic!("expected a Class constant, found {other:?}"),
        }
    }

    #[test]
    fn compiles_static_method_and_round_trips() {
        let add = MethodDecl {
            modifiers: modifiers(true, true),
            type_parameters: vec![],
            return_type: int_ty(),
            name: "add".to_string(),
            parameters: vec![
                Parameter {
                    name: "a".to_string(),
                    param_type: int_ty(),
                    is_varargs: false,
                    is_final: false,
                },
                Parameter {
                    name: "b".to_string(),
                    param_type: int_ty(),
                    is_varargs: false,
                    is_final: false,
                },
            ],
            throws: vec![],
            body: Some(vec![Stmt::Return(Some(Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Name("a".to_string())),
                right: Box::new(Expr::Name("b".to_string())),
            }))]),
        };

        let decl = TypeDecl {
            kind: TypeKind::Class,
            modifiers: modifiers(true, false),
            name: "Adder".to_string(),
            type_parameters: vec![],
            extends: None,
            implements: vec![],
            members: vec![Member::Method(add)],
            enum_constants: vec![],
        };

        let mut generator = Generator::new(ClassPath::new());
        generator.register_shapes(None, &[decl.clone()]).unwrap();
        let outputs = generator.compile_type(None, &decl, None).unwrap();

        assert_eq!(outputs.len(), 1);
        let (internal_name, bytes) = &outputs[0];
        assert_eq!(internal_name, "Adder");

        let class_file = reread(bytes);
        assert_eq!(class_file.methods.len(), 2, "implicit constructor plus add()");
        assert_eq!(class_name_at(&class_file, class_file.this_class), "Adder");
    }

    #[test]
    fn compiles_instance_field_and_constructor() {
        let field = crate::ast::FieldDecl {
            modifiers: modifiers(false, false),
            element_type: int_ty(),
            declarators: vec![Declarator {
                name: "value".to_string(),
                extra_dimensions: 0,
                initializer: None,
            }],
        };

        let decl = TypeDecl {
            kind: TypeKind::Class,
            modifiers: modifiers(true, false),
            name: "Holder".to_string(),
            type_parameters: vec![],
            extends: None,
            implements: vec![],
            members: vec![Member::Field(field)],
            enum_constants: vec![],
        };

        let mut generator = Generator::new(ClassPath::new());
        generator.register_shapes(None, &[decl.clone()]).unwrap();
        let outputs = generator.compile_type(None, &decl, None).unwrap();

        let (_, bytes) = &outputs[0];
        let class_file = reread(bytes);
        assert_eq!(class_file.fields.len(), 1);
        assert_eq!(class_file.methods.len(), 1, "synthesized implicit constructor");
        assert_eq!(class_name_at(&class_file, class_file.super_class), "java/lang/Object");
    }

    #[test]
    fn compiles_enum_with_constants_and_synthetics() {
        let decl = TypeDecl {
            kind: TypeKind::Enum,
            modifiers: modifiers(true, false),
            name: "Color".to_string(),
            type_parameters: vec![],
            extends: None,
            implements: vec![],
            members: vec![],
            enum_constants: vec![
                crate::ast::EnumConstant { name: "RED".to_string(), arguments: vec![], body: None },
                crate::ast::EnumConstant { name: "GREEN".to_string(), arguments: vec![], body: None },
                crate::ast::EnumConstant { name: "BLUE".to_string(), arguments: vec![], body: None },
            ],
        };

        let mut generator = Generator::new(ClassPath::new());
        generator.register_shapes(None, &[decl.clone()]).unwrap();
        let outputs = generator.compile_type(None, &decl, None).unwrap();

        let (internal_name, bytes) = &outputs[0];
        assert_eq!(internal_name, "Color");
        let class_file = reread(bytes);
        assert_eq!(class_name_at(&class_file, class_file.super_class), "java/lang/Enum");
        // RED, GREEN, BLUE, $VALUES.
        assert_eq!(class_file.fields.len(), 4);
        let method_names: Vec<String> = class_file
            .methods
            .iter()
            .map(|m| class_file.constant_pool.get_utf8_constant(m.name_index as usize).unwrap().to_string())
            .collect();
        assert!(method_names.contains(&"values".to_string()));
        assert!(method_names.contains(&"valueOf".to_string()));
        assert!(method_names.contains(&"<clinit>".to_string()));
    }

    #[test]
    fn compiles_lambda_to_bootstrap_and_synthetic_method() {
        let make_runnable = MethodDecl {
            modifiers: modifiers(true, false),
            type_parameters: vec![],
            return_type: TypeRef::Name("java/lang/Runnable".to_string()),
            name: "makeRunnable".to_string(),
            parameters: vec![],
            throws: vec![],
            body: Some(vec![
                Stmt::LocalDecl {
                    element_type: TypeRef::Name("java/lang/Runnable".to_string()),
                    declarators: vec![Declarator {
                        name: "r".to_string(),
                        extra_dimensions: 0,
                        initializer: Some(Expr::Lambda {
                            parameters: vec![],
                            body: crate::ast::LambdaBody::Block(vec![]),
                        }),
                    }],
                    is_final: false,
                },
                Stmt::Return(Some(Expr::Name("r".to_string()))),
            ]),
        };

        let decl = TypeDecl {
            kind: TypeKind::Class,
            modifiers: modifiers(true, false),
            name: "Lambdas".to_string(),
            type_parameters: vec![],
            extends: None,
            implements: vec![],
            members: vec![Member::Method(make_runnable)],
            enum_constants: vec![],
        };

        let mut generator = Generator::new(ClassPath::new());
        generator.register_shapes(None, &[decl.clone()]).unwrap();
        let outputs = generator.compile_type(None, &decl, None).unwrap();

        let (_, bytes) = &outputs[0];
        let class_file = reread(bytes);

        // The implicit constructor, makeRunnable(), and one synthetic
        // lambda body method.
        assert_eq!(class_file.methods.len(), 3);
        let method_names: Vec<String> = class_file
            .methods
            .iter()
            .map(|m| class_file.constant_pool.get_utf8_constant(m.name_index as usize).unwrap().to_string())
            .collect();
        assert!(method_names.iter().any(|n| n.starts_with("lambda$")));

        assert!(
            !class_file.attributes.get("BootstrapMethods").is_empty(),
            "lambda desugaring must register a BootstrapMethods entry"
        );
    }
}
