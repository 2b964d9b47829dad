//! The statement compiler: lowers control flow, declarations, and
//! jump-affecting statements to bytecode, calling into [`crate::expr`]
//! for every expression a statement contains. `try`/`finally` (and the
//! `synchronized` and try-with-resources forms built on it) duplicates
//! the finally body at each exit edge rather than using `jsr`/`ret`,
//! which class-file versions 50+ disallow.

use exo_class_file::item::opcodes::VMOpcode;
use exo_class_file::item::writer::{Label, LoadStoreKind};

use crate::ast::{CatchClause, Declarator, Expr, Literal, LocalDecl, Stmt, SwitchCase, TypeRef};
use crate::error::{CompileError, CompileResult};
use crate::expr::{class_entry_name, compile_condition, compile_expr, compile_expr_for_effect, compile_expr_with_target, convert, emit_array_load, static_type};
use crate::generator::{LoopLabels, MethodContext};
use crate::types::{Primitive, Type};

pub fn compile_stmt(ctx: &mut MethodContext, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
        Stmt::Block(stmts) => {
            for s in stmts {
                compile_stmt(ctx, s)?;
            }
            Ok(())
        }
        Stmt::LocalDecl { element_type, declarators, .. } => compile_local_decl(ctx, element_type, declarators),
        Stmt::Expr(expr) => compile_expr_for_effect(ctx, expr),
        Stmt::If { condition, then_branch, else_branch } => {
            compile_if(ctx, condition, then_branch, else_branch.as_deref())
        }
        Stmt::While { condition, body, label } => compile_while(ctx, condition, body, label.as_deref()),
        Stmt::DoWhile { body, condition, label } => compile_do_while(ctx, body, condition, label.as_deref()),
        Stmt::For { init, condition, update, body, label } => {
            compile_for(ctx, init, condition.as_ref(), update, body, label.as_deref())
        }
        Stmt::ForEach { element_type, name, iterable, body, label } => {
            compile_for_each(ctx, element_type, name, iterable, body, label.as_deref())
        }
        Stmt::Switch { selector, cases } => compile_switch(ctx, selector, cases),
        Stmt::Break(label) => compile_break(ctx, label.as_deref()),
        Stmt::Continue(label) => compile_continue(ctx, label.as_deref()),
        Stmt::Return(value) => compile_return(ctx, value.as_ref()),
        Stmt::Throw(expr) => compile_throw(ctx, expr),
        Stmt::Try { resources, body, catches, finally } => {
            compile_try(ctx, resources, body, catches, finally.as_deref())
        }
        Stmt::Synchronized { monitor, body } => compile_synchronized(ctx, monitor, body),
        Stmt::Labeled { label, body } => compile_labeled(ctx, label, body),
        Stmt::Assert { condition, message } => compile_assert(ctx, condition, message.as_ref()),
        Stmt::Empty => Ok(()),
    }
}

fn load_store_kind(ty: &Type) -> LoadStoreKind {
    match ty.as_primitive() {
        Some(Primitive::Long) => LoadStoreKind::Long,
        Some(Primitive::Double) => LoadStoreKind::Double,
        Some(Primitive::Float) => LoadStoreKind::Float,
        Some(_) => LoadStoreKind::Int,
        None => LoadStoreKind::Reference,
    }
}

fn load_local(ctx: &mut MethodContext, slot: u16, ty: &Type) -> CompileResult<()> {
    let kind = load_store_kind(ty);
    if ty.slot_size() == 2 {
        ctx.emitter.load2(kind, slot).map_err(CompileError::from)
    } else {
        ctx.emitter.load1(kind, slot).map_err(CompileError::from)
    }
}

fn store_local(ctx: &mut MethodContext, slot: u16, ty: &Type) -> CompileResult<()> {
    let kind = load_store_kind(ty);
    if ty.slot_size() == 2 {
        ctx.emitter.store2(kind, slot).map_err(CompileError::from)
    } else {
        ctx.emitter.store1(kind, slot).map_err(CompileError::from)
    }
}

fn compile_local_decl(ctx: &mut MethodContext, element_type: &TypeRef, declarators: &[Declarator]) -> CompileResult<()> {
    let base_ty = ctx.resolve_type_ref(element_type);
    for declarator in declarators {
        let ty = if declarator.extra_dimensions > 0 {
            Type::array(base_ty.clone(), declarator.extra_dimensions)
        } else {
            base_ty.clone()
        };
        if let Some(init) = &declarator.initializer {
            compile_expr_with_target(ctx, init, &ty)?;
            let slot = ctx.declare_local(&declarator.name, ty.clone());
            store_local(ctx, slot, &ty)?;
        } else {
            ctx.declare_local(&declarator.name, ty);
        }
    }
    Ok(())
}

fn compile_if(
    ctx: &mut MethodContext,
    condition: &Expr,
    then_branch: &Stmt,
    else_branch: Option<&Stmt>,
) -> CompileResult<()> {
    let else_label = ctx.emitter.new_label();
    compile_condition(ctx, condition, else_label, false)?;
    compile_stmt(ctx, then_branch)?;
    match else_branch {
        Some(else_stmt) => {
            let end_label = ctx.emitter.new_label();
            ctx.emitter.branch(VMOpcode::goto(0), end_label, 0).map_err(CompileError::from)?;
            ctx.emitter.bind_label(else_label);
            compile_stmt(ctx, else_stmt)?;
            ctx.emitter.bind_label(end_label);
        }
        None => ctx.emitter.bind_label(else_label),
    }
    Ok(())
}

fn push_loop(ctx: &mut MethodContext, label: Option<&str>, labels: LoopLabels) {
    ctx.loop_stack.push(labels);
    ctx.break_stack.push(labels.break_label);
    if let Some(name) = label {
        ctx.named_loops.insert(name.to_string(), labels);
    }
}

fn pop_loop(ctx: &mut MethodContext, label: Option<&str>) {
    ctx.loop_stack.pop();
    ctx.break_stack.pop();
    if let Some(name) = label {
        ctx.named_loops.remove(name);
    }
}

fn compile_while(ctx: &mut MethodContext, condition: &Expr, body: &Stmt, label: Option<&str>) -> CompileResult<()> {
    let top = ctx.emitter.new_label();
    let end = ctx.emitter.new_label();
    push_loop(ctx, label, LoopLabels { break_label: end, continue_label: top });

    ctx.emitter.bind_label(top);
    compile_condition(ctx, condition, end, false)?;
    compile_stmt(ctx, body)?;
    ctx.emitter.branch(VMOpcode::goto(0), top, 0).map_err(CompileError::from)?;
    ctx.emitter.bind_label(end);

    pop_loop(ctx, label);
    Ok(())
}

fn compile_do_while(ctx: &mut MethodContext, body: &Stmt, condition: &Expr, label: Option<&str>) -> CompileResult<()> {
    let top = ctx.emitter.new_label();
    let continue_label = ctx.emitter.new_label();
    let end = ctx.emitter.new_label();
    push_loop(ctx, label, LoopLabels { break_label: end, continue_label });

    ctx.emitter.bind_label(top);
    compile_stmt(ctx, body)?;
    ctx.emitter.bind_label(continue_label);
    compile_condition(ctx, condition, top, true)?;
    ctx.emitter.bind_label(end);

    pop_loop(ctx, label);
    Ok(())
}

fn compile_for(
    ctx: &mut MethodContext,
    init: &[Stmt],
    condition: Option<&Expr>,
    update: &[Expr],
    body: &Stmt,
    label: Option<&str>,
) -> CompileResult<()> {
    for stmt in init {
        compile_stmt(ctx, stmt)?;
    }

    let top = ctx.emitter.new_label();
    let continue_label = ctx.emitter.new_label();
    let end = ctx.emitter.new_label();
    push_loop(ctx, label, LoopLabels { break_label: end, continue_label });

    ctx.emitter.bind_label(top);
    if let Some(cond) = condition {
        compile_condition(ctx, cond, end, false)?;
    }
    compile_stmt(ctx, body)?;
    ctx.emitter.bind_label(continue_label);
    for expr in update {
        compile_expr_for_effect(ctx, expr)?;
    }
    ctx.emitter.branch(VMOpcode::goto(0), top, 0).map_err(CompileError::from)?;
    ctx.emitter.bind_label(end);

    pop_loop(ctx, label);
    Ok(())
}

fn compile_for_each(
    ctx: &mut MethodContext,
    element_type: &TypeRef,
    name: &str,
    iterable: &Expr,
    body: &Stmt,
    label: Option<&str>,
) -> CompileResult<()> {
    let iterable_ty = static_type(ctx, iterable)?;
    let elem_ty = ctx.resolve_type_ref(element_type);
    if matches!(iterable_ty, Type::Array { .. }) {
        compile_array_for_each(ctx, &elem_ty, name, iterable, body, label)
    } else {
        compile_iterator_for_each(ctx, &elem_ty, name, iterable, body, label)
    }
}

/// `for (T x : array) body` lowers to an indexed loop over a hoisted
/// copy of the array reference and its length, matching javac's own
/// desugaring (so a concurrently-mutated array's length is snapshotted
/// once, not re-read every iteration).
fn compile_array_for_each(
    ctx: &mut MethodContext,
    elem_ty: &Type,
    name: &str,
    iterable: &Expr,
    body: &Stmt,
    label: Option<&str>,
) -> CompileResult<()> {
    let array_ty = compile_expr(ctx, iterable)?;
    let array_name = ctx.fresh_name("arr");
    let array_slot = ctx.declare_local(&array_name, array_ty.clone());
    store_local(ctx, array_slot, &array_ty)?;

    load_local(ctx, array_slot, &array_ty)?;
    ctx.emitter.emit(VMOpcode::arraylength(), 0).map_err(CompileError::from)?;
    let len_name = ctx.fresh_name("len");
    let int_ty = Type::Primitive(Primitive::Int);
    let len_slot = ctx.declare_local(&len_name, int_ty.clone());
    store_local(ctx, len_slot, &int_ty)?;

    let idx_name = ctx.fresh_name("i");
    let idx_slot = ctx.declare_local(&idx_name, int_ty.clone());
    {
        let pool = ctx.pool();
        ctx.emitter.iconst(0, pool).map_err(CompileError::from)?;
    }
    store_local(ctx, idx_slot, &int_ty)?;

    let top = ctx.emitter.new_label();
    let continue_label = ctx.emitter.new_label();
    let end = ctx.emitter.new_label();
    push_loop(ctx, label, LoopLabels { break_label: end, continue_label });

    ctx.emitter.bind_label(top);
    load_local(ctx, idx_slot, &int_ty)?;
    load_local(ctx, len_slot, &int_ty)?;
    ctx.emitter.branch(VMOpcode::if_icmpge(0), end, -2).map_err(CompileError::from)?;

    load_local(ctx, array_slot, &array_ty)?;
    load_local(ctx, idx_slot, &int_ty)?;
    emit_array_load(ctx, elem_ty)?;
    let var_slot = ctx.declare_local(name, elem_ty.clone());
    store_local(ctx, var_slot, elem_ty)?;

    compile_stmt(ctx, body)?;

    ctx.emitter.bind_label(continue_label);
    load_local(ctx, idx_slot, &int_ty)?;
    {
        let pool = ctx.pool();
        ctx.emitter.iconst(1, pool).map_err(CompileError::from)?;
    }
    ctx.emitter.emit(VMOpcode::iadd(), -1).map_err(CompileError::from)?;
    store_local(ctx, idx_slot, &int_ty)?;
    ctx.emitter.branch(VMOpcode::goto(0), top, 0).map_err(CompileError::from)?;
    ctx.emitter.bind_label(end);

    pop_loop(ctx, label);
    Ok(())
}

/// `for (T x : iterable) body` lowers to the standard
/// `Iterator`-driven desugaring. `iterator()`/`hasNext()`/`next()` are
/// invoked against `java/lang/Iterable`/`java/util/Iterator` directly
/// rather than the iterable's declared type, which is always safe
/// (any valid for-each target implements `Iterable`) and sidesteps
/// needing the full overload resolver for an interface call.
fn compile_iterator_for_each(
    ctx: &mut MethodContext,
    elem_ty: &Type,
    name: &str,
    iterable: &Expr,
    body: &Stmt,
    label: Option<&str>,
) -> CompileResult<()> {
    compile_expr(ctx, iterable)?;
    let iterator_index = ctx.pool().add_interface_methodref("java/lang/Iterable", "iterator", "()Ljava/util/Iterator;")?;
    ctx.emitter.invokeinterface(iterator_index, 0, 1).map_err(CompileError::from)?;
    let it_ty = Type::class("java/util/Iterator");
    let it_name = ctx.fresh_name("it");
    let it_slot = ctx.declare_local(&it_name, it_ty.clone());
    store_local(ctx, it_slot, &it_ty)?;

    let top = ctx.emitter.new_label();
    let end = ctx.emitter.new_label();
    push_loop(ctx, label, LoopLabels { break_label: end, continue_label: top });

    ctx.emitter.bind_label(top);
    load_local(ctx, it_slot, &it_ty)?;
    let has_next_index = ctx.pool().add_interface_methodref("java/util/Iterator", "hasNext", "()Z")?;
    ctx.emitter.invokeinterface(has_next_index, 0, 1).map_err(CompileError::from)?;
    ctx.emitter.branch(VMOpcode::ifeq(0), end, -1).map_err(CompileError::from)?;

    load_local(ctx, it_slot, &it_ty)?;
    let next_index = ctx.pool().add_interface_methodref("java/util/Iterator", "next", "()Ljava/lang/Object;")?;
    ctx.emitter.invokeinterface(next_index, 0, 1).map_err(CompileError::from)?;
    match elem_ty.as_primitive() {
        Some(prim) => {
            let boxed = prim.boxed_class();
            let class_index = ctx.pool().add_class(boxed)?;
            ctx.emitter.checkcast(class_index).map_err(CompileError::from)?;
            let method = prim.unboxing_method();
            let desc = format!("(){}", prim.descriptor());
            let index = ctx.pool().add_methodref(boxed, method, &desc)?;
            ctx.emitter
                .invokevirtual(index, 0, prim.slot_size() as i32)
                .map_err(CompileError::from)?;
        }
        None => {
            if elem_ty != &Type::object() {
                let class_index = ctx.pool().add_class(&class_entry_name(elem_ty))?;
                ctx.emitter.checkcast(class_index).map_err(CompileError::from)?;
            }
        }
    }
    let var_slot = ctx.declare_local(name, elem_ty.clone());
    store_local(ctx, var_slot, elem_ty)?;

    compile_stmt(ctx, body)?;

    ctx.emitter.branch(VMOpcode::goto(0), top, 0).map_err(CompileError::from)?;
    ctx.emitter.bind_label(end);

    pop_loop(ctx, label);
    Ok(())
}

fn compile_switch(ctx: &mut MethodContext, selector: &Expr, cases: &[SwitchCase]) -> CompileResult<()> {
    let selector_ty = static_type(ctx, selector)?;
    match &selector_ty {
        Type::Class(name) if name == "java/lang/String" => compile_string_switch(ctx, selector, cases),
        _ => compile_integral_switch(ctx, selector, cases),
    }
}

fn switch_case_value(expr: &Expr) -> CompileResult<i32> {
    match expr {
        Expr::Literal(Literal::Int(v)) => Ok(*v),
        Expr::Literal(Literal::Char(c)) => Ok(*c as i32),
        _ => Err(CompileError::BadSignature(
            "switch case label must be a constant int or char expression".to_string(),
        )),
    }
}

fn compile_integral_switch(ctx: &mut MethodContext, selector: &Expr, cases: &[SwitchCase]) -> CompileResult<()> {
    compile_expr(ctx, selector)?;

    let default_label = ctx.emitter.new_label();
    let end_label = ctx.emitter.new_label();
    let case_labels: Vec<Label> = cases.iter().map(|_| ctx.emitter.new_label()).collect();
    let mut int_pairs = Vec::new();
    for (case, label) in cases.iter().zip(&case_labels) {
        for lit in &case.labels {
            int_pairs.push((switch_case_value(lit)?, *label));
        }
    }
    ctx.emitter.lookupswitch(default_label, int_pairs).map_err(CompileError::from)?;

    ctx.break_stack.push(end_label);
    let mut default_bound = false;
    for (case, label) in cases.iter().zip(&case_labels) {
        ctx.emitter.bind_label(*label);
        if case.labels.is_empty() {
            ctx.emitter.bind_label(default_label);
            default_bound = true;
        }
        for stmt in &case.body {
            compile_stmt(ctx, stmt)?;
        }
    }
    if !default_bound {
        ctx.emitter.bind_label(default_label);
    }
    ctx.emitter.bind_label(end_label);
    ctx.break_stack.pop();
    Ok(())
}

/// `switch` over `String` compiles to a linear `equals` chain rather
/// than javac's hash-bucket-then-equals form; simpler, and identical
/// in observable behavior (case order doesn't matter since labels are
/// unique constants).
fn compile_string_switch(ctx: &mut MethodContext, selector: &Expr, cases: &[SwitchCase]) -> CompileResult<()> {
    let selector_ty = compile_expr(ctx, selector)?;
    let sel_name = ctx.fresh_name("sel");
    let sel_slot = ctx.declare_local(&sel_name, selector_ty.clone());
    store_local(ctx, sel_slot, &selector_ty)?;

    let end_label = ctx.emitter.new_label();
    let default_label = ctx.emitter.new_label();
    let case_labels: Vec<Label> = cases.iter().map(|_| ctx.emitter.new_label()).collect();
    let mut default_index = None;

    for (i, case) in cases.iter().enumerate() {
        if case.labels.is_empty() {
            default_index = Some(i);
            continue;
        }
        for lit in &case.labels {
            let text = match lit {
                Expr::Literal(Literal::String(s)) => s.clone(),
                _ => {
                    return Err(CompileError::BadSignature(
                        "switch case label must be a string literal".to_string(),
                    ))
                }
            };
            {
                let pool = ctx.pool();
                ctx.emitter.ldc_string(&text, pool).map_err(CompileError::from)?;
            }
            load_local(ctx, sel_slot, &selector_ty)?;
            let equals_index = ctx.pool().add_methodref("java/lang/String", "equals", "(Ljava/lang/Object;)Z")?;
            ctx.emitter.invokevirtual(equals_index, 1, 1).map_err(CompileError::from)?;
            ctx.emitter.branch(VMOpcode::ifne(0), case_labels[i], -1).map_err(CompileError::from)?;
        }
    }
    ctx.emitter.branch(VMOpcode::goto(0), default_label, 0).map_err(CompileError::from)?;

    ctx.break_stack.push(end_label);
    let mut default_bound = false;
    for (i, case) in cases.iter().enumerate() {
        ctx.emitter.bind_label(case_labels[i]);
        if Some(i) == default_index {
            ctx.emitter.bind_label(default_label);
            default_bound = true;
        }
        for stmt in &case.body {
            compile_stmt(ctx, stmt)?;
        }
    }
    if !default_bound {
        ctx.emitter.bind_label(default_label);
    }
    ctx.emitter.bind_label(end_label);
    ctx.break_stack.pop();
    Ok(())
}

fn compile_break(ctx: &mut MethodContext, label: Option<&str>) -> CompileResult<()> {
    let target = match label {
        Some(name) => ctx
            .labeled_ends
            .get(name)
            .copied()
            .or_else(|| ctx.named_loops.get(name).map(|l| l.break_label))
            .ok_or_else(|| CompileError::UndefinedLabel(name.to_string()))?,
        None => *ctx.break_stack.last().ok_or(CompileError::BreakOutsideLoop)?,
    };
    ctx.emitter.branch(VMOpcode::goto(0), target, 0).map_err(CompileError::from)
}

fn compile_continue(ctx: &mut MethodContext, label: Option<&str>) -> CompileResult<()> {
    let target = match label {
        Some(name) => ctx
            .named_loops
            .get(name)
            .map(|l| l.continue_label)
            .ok_or_else(|| CompileError::UndefinedLabel(name.to_string()))?,
        None => ctx
            .loop_stack
            .last()
            .map(|l| l.continue_label)
            .ok_or(CompileError::BreakOutsideLoop)?,
    };
    ctx.emitter.branch(VMOpcode::goto(0), target, 0).map_err(CompileError::from)
}

fn compile_return(ctx: &mut MethodContext, value: Option<&Expr>) -> CompileResult<()> {
    match value {
        None => ctx.emitter.emit(VMOpcode::r#return(), 0).map_err(CompileError::from),
        Some(expr) => {
            let return_type = ctx.return_type.clone();
            let value_ty = compile_expr(ctx, expr)?;
            convert(ctx, &value_ty, &return_type)?;
            let op = match return_type.as_primitive() {
                Some(Primitive::Long) => VMOpcode::lreturn(),
                Some(Primitive::Float) => VMOpcode::freturn(),
                Some(Primitive::Double) => VMOpcode::dreturn(),
                Some(Primitive::Void) => VMOpcode::r#return(),
                Some(_) => VMOpcode::ireturn(),
                None => VMOpcode::areturn(),
            };
            let slots = return_type.slot_size() as i32;
            ctx.emitter.emit(op, -slots).map_err(CompileError::from)
        }
    }
}

fn compile_throw(ctx: &mut MethodContext, expr: &Expr) -> CompileResult<()> {
    compile_expr(ctx, expr)?;
    ctx.emitter.emit(VMOpcode::athrow(), -1).map_err(CompileError::from)
}

/// Appends `start`/`end`/`handler` labels around `compile_body`, running
/// `compile_finally` on both the normal fallthrough edge and a
/// synthetic catch-all handler that reruns it and rethrows. This is how
/// `finally` (and, via [`compile_resource_close`], try-with-resources
/// and `synchronized`) is expressed without `jsr`/`ret`.
fn emit_try_finally<B, F>(ctx: &mut MethodContext, compile_body: B, compile_finally: F) -> CompileResult<()>
where
    B: FnOnce(&mut MethodContext) -> CompileResult<()>,
    F: Fn(&mut MethodContext) -> CompileResult<()>,
{
    let start = ctx.emitter.new_label();
    let end = ctx.emitter.new_label();
    let handler = ctx.emitter.new_label();
    let after = ctx.emitter.new_label();

    ctx.emitter.bind_label(start);
    compile_body(ctx)?;
    ctx.emitter.bind_label(end);
    compile_finally(ctx)?;
    ctx.emitter.branch(VMOpcode::goto(0), after, 0).map_err(CompileError::from)?;

    ctx.emitter.bind_label(handler);
    ctx.emitter.enter_exception_handler();
    let throwable_ty = Type::class("java/lang/Throwable");
    let ex_name = ctx.fresh_name("t");
    let ex_slot = ctx.declare_local(&ex_name, throwable_ty.clone());
    store_local(ctx, ex_slot, &throwable_ty)?;
    compile_finally(ctx)?;
    load_local(ctx, ex_slot, &throwable_ty)?;
    ctx.emitter.emit(VMOpcode::athrow(), -1).map_err(CompileError::from)?;

    ctx.emitter.add_exception_handler(start, end, handler, 0);
    ctx.emitter.bind_label(after);
    Ok(())
}

fn compile_try(
    ctx: &mut MethodContext,
    resources: &[LocalDecl],
    body: &[Stmt],
    catches: &[CatchClause],
    finally: Option<&[Stmt]>,
) -> CompileResult<()> {
    match finally {
        Some(fin) => emit_try_finally(
            ctx,
            |ctx| compile_try_with_catches(ctx, |ctx| compile_resourced_body(ctx, resources, body), catches),
            |ctx| {
                for stmt in fin {
                    compile_stmt(ctx, stmt)?;
                }
                Ok(())
            },
        ),
        None => compile_try_with_catches(ctx, |ctx| compile_resourced_body(ctx, resources, body), catches),
    }
}

fn compile_resourced_body(ctx: &mut MethodContext, resources: &[LocalDecl], body: &[Stmt]) -> CompileResult<()> {
    match resources.split_first() {
        None => {
            for stmt in body {
                compile_stmt(ctx, stmt)?;
            }
            Ok(())
        }
        Some((first, rest)) => {
            let resource_ty = ctx.resolve_type_ref(&first.element_type);
            let init_ty = compile_expr(ctx, &first.initializer)?;
            convert(ctx, &init_ty, &resource_ty)?;
            let slot = ctx.declare_local(&first.name, resource_ty.clone());
            store_local(ctx, slot, &resource_ty)?;

            emit_try_finally(
                ctx,
                |ctx| compile_resourced_body(ctx, rest, body),
                |ctx| compile_resource_close(ctx, slot, &resource_ty),
            )
        }
    }
}

/// `if (resource != null) resource.close();`. Unlike javac's full
/// desugaring, a `close()` thrown while another exception is already
/// propagating isn't recorded via `addSuppressed` — it simply replaces
/// the in-flight exception, same as any other exception thrown from a
/// `finally` block.
fn compile_resource_close(ctx: &mut MethodContext, slot: u16, resource_ty: &Type) -> CompileResult<()> {
    load_local(ctx, slot, resource_ty)?;
    let skip = ctx.emitter.new_label();
    ctx.emitter.branch(VMOpcode::ifnull(0), skip, -1).map_err(CompileError::from)?;
    load_local(ctx, slot, resource_ty)?;
    // `close()` is called against `AutoCloseable` regardless of the
    // resource's declared type, same as [`compile_iterator_for_each`]
    // calling through `Iterable`/`Iterator` — any valid resource type
    // implements it.
    let index = ctx.pool().add_interface_methodref("java/lang/AutoCloseable", "close", "()V")?;
    ctx.emitter.invokeinterface(index, 0, 0).map_err(CompileError::from)?;
    ctx.emitter.bind_label(skip);
    Ok(())
}

fn compile_try_with_catches<B>(ctx: &mut MethodContext, try_body: B, catches: &[CatchClause]) -> CompileResult<()>
where
    B: FnOnce(&mut MethodContext) -> CompileResult<()>,
{
    if catches.is_empty() {
        return try_body(ctx);
    }

    let start = ctx.emitter.new_label();
    let end = ctx.emitter.new_label();
    let after = ctx.emitter.new_label();

    ctx.emitter.bind_label(start);
    try_body(ctx)?;
    ctx.emitter.bind_label(end);
    ctx.emitter.branch(VMOpcode::goto(0), after, 0).map_err(CompileError::from)?;

    for catch in catches {
        let handler = ctx.emitter.new_label();
        ctx.emitter.bind_label(handler);
        ctx.emitter.enter_exception_handler();
        // A multi-catch (`catch (A | B e)`) binds `e`'s static type to
        // the first listed alternative; real overload resolution on
        // `e` inside the handler would need the least upper bound of
        // all alternatives, which this compiler doesn't compute.
        let first_type = &catch.exception_types[0];
        let var_ty = Type::class(ctx.resolve_type_name(first_type));
        let var_slot = ctx.declare_local(&catch.name, var_ty.clone());
        store_local(ctx, var_slot, &var_ty)?;
        for stmt in &catch.body {
            compile_stmt(ctx, stmt)?;
        }
        ctx.emitter.branch(VMOpcode::goto(0), after, 0).map_err(CompileError::from)?;

        for exc_type in &catch.exception_types {
            let resolved = ctx.resolve_type_name(exc_type);
            let catch_type = ctx.pool().add_class(&resolved)?;
            ctx.emitter.add_exception_handler(start, end, handler, catch_type);
        }
    }

    ctx.emitter.bind_label(after);
    Ok(())
}

fn compile_synchronized(ctx: &mut MethodContext, monitor: &Expr, body: &[Stmt]) -> CompileResult<()> {
    let monitor_ty = compile_expr(ctx, monitor)?;
    let lock_name = ctx.fresh_name("lock");
    let lock_slot = ctx.declare_local(&lock_name, monitor_ty.clone());
    store_local(ctx, lock_slot, &monitor_ty)?;
    load_local(ctx, lock_slot, &monitor_ty)?;
    ctx.emitter.emit(VMOpcode::monitorenter(), -1).map_err(CompileError::from)?;

    emit_try_finally(
        ctx,
        |ctx| {
            for stmt in body {
                compile_stmt(ctx, stmt)?;
            }
            Ok(())
        },
        |ctx| {
            load_local(ctx, lock_slot, &monitor_ty)?;
            ctx.emitter.emit(VMOpcode::monitorexit(), -1).map_err(CompileError::from)
        },
    )
}

fn compile_labeled(ctx: &mut MethodContext, label: &str, body: &Stmt) -> CompileResult<()> {
    let end = ctx.emitter.new_label();
    ctx.labeled_ends.insert(label.to_string(), end);
    compile_stmt(ctx, body)?;
    ctx.emitter.bind_label(end);
    ctx.labeled_ends.remove(label);
    Ok(())
}

/// `assert` is compiled as unconditionally active: there is no
/// `$assertionsDisabled` static field or `<clinit>` guard keyed off
/// `Class.desiredAssertionStatus()`, so `-ea`/`-da` toggling at class
/// load time isn't supported, only the condition check and the
/// `AssertionError` it throws when false.
fn compile_assert(ctx: &mut MethodContext, condition: &Expr, message: Option<&Expr>) -> CompileResult<()> {
    let skip = ctx.emitter.new_label();
    compile_condition(ctx, condition, skip, true)?;

    let class_index = ctx.pool().add_class("java/lang/AssertionError")?;
    ctx.emitter.new_object(class_index).map_err(CompileError::from)?;
    ctx.emitter.emit(VMOpcode::dup(), 1).map_err(CompileError::from)?;
    let (descriptor, arg_slots) = match message {
        Some(msg) => {
            let msg_ty = compile_expr(ctx, msg)?;
            match msg_ty.as_primitive() {
                Some(
                    p @ (Primitive::Boolean
                    | Primitive::Char
                    | Primitive::Int
                    | Primitive::Long
                    | Primitive::Float
                    | Primitive::Double),
                ) => (p.descriptor().to_string(), p.slot_size() as i32),
                _ => {
                    convert(ctx, &msg_ty, &Type::object())?;
                    ("Ljava/lang/Object;".to_string(), 1)
                }
            }
        }
        None => (String::new(), 0),
    };
    let method_desc = format!("({})V", descriptor);
    let index = ctx.pool().add_methodref("java/lang/AssertionError", "<init>", &method_desc)?;
    ctx.emitter.invokespecial(index, arg_slots, 0).map_err(CompileError::from)?;
    ctx.emitter.emit(VMOpcode::athrow(), -1).map_err(CompileError::from)?;

    ctx.emitter.bind_label(skip);
    Ok(())
}
