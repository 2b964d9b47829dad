//! Name resolution: class names, fields, methods and constructors,
//! including overload resolution with widening/boxing and the
//! "most specific" tie-break.

use std::collections::HashMap;

use crate::classpath::{ClassMetadata, ClassPath};
use crate::error::{CompileError, CompileResult};
use crate::types::{MethodType, Primitive, Type};

/// A field or method candidate as seen by the resolver, independent of
/// whether its owner is a classpath entry or a class this session is
/// still compiling.
#[derive(Debug, Clone)]
pub struct FieldCandidate {
    pub owner: String,
    pub name: String,
    pub field_type: Type,
    pub is_static: bool,
}

#[derive(Debug, Clone)]
pub struct MethodCandidate {
    pub owner: String,
    pub name: String,
    pub descriptor: MethodType,
    pub is_static: bool,
    pub is_varargs: bool,
}

/// Normalized view over a class's members, built either from classpath
/// metadata or from a type still being compiled in this session.
#[derive(Debug, Clone, Default)]
pub struct LocalClass {
    pub internal_name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldCandidate>,
    pub methods: Vec<MethodCandidate>,
}

/// Classes currently being compiled in this session, registered before
/// their bodies are emitted so forward references and self-reference
/// resolve.
#[derive(Debug, Default)]
pub struct LocalClassRegistry {
    classes: HashMap<String, LocalClass>,
}

impl LocalClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: LocalClass) {
        self.classes.insert(class.internal_name.clone(), class);
    }

    pub fn get(&self, name: &str) -> Option<&LocalClass> {
        self.classes.get(name)
    }
}

/// Resolves an owner's member list, whether it's an in-progress local
/// class or a classpath-loaded one, normalizing both to `LocalClass`.
fn class_view(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    name: &str,
) -> CompileResult<LocalClass> {
    if let Some(local) = locals.get(name) {
        return Ok(local.clone());
    }
    let metadata: ClassMetadata = classpath.find_class(name)?.clone();
    Ok(LocalClass {
        internal_name: metadata.internal_name.clone(),
        super_name: metadata.super_name.clone(),
        interfaces: metadata.interfaces.clone(),
        fields: metadata
            .fields
            .iter()
            .filter_map(|f| {
                let (ty, _) = Type::parse_descriptor(&f.descriptor)?;
                Some(FieldCandidate {
                    owner: metadata.internal_name.clone(),
                    name: f.name.clone(),
                    field_type: ty,
                    is_static: f.access_flags.contains(
                        exo_class_file::item::fields::FieldAccessFlags::ACC_STATIC,
                    ),
                })
            })
            .collect(),
        methods: metadata
            .methods
            .iter()
            .filter_map(|m| {
                let descriptor = MethodType::parse_descriptor(&m.descriptor)?;
                Some(MethodCandidate {
                    owner: metadata.internal_name.clone(),
                    name: m.name.clone(),
                    descriptor,
                    is_static: m.access_flags.contains(
                        exo_class_file::item::methods::MethodAccessFlags::ACC_STATIC,
                    ),
                    is_varargs: m.access_flags.contains(
                        exo_class_file::item::methods::MethodAccessFlags::ACC_VARARGS,
                    ),
                })
            })
            .collect(),
    })
}

/// Resolves simple names against imports and current-class/-package
/// context, per spec.md's four resolution rules in order.
pub struct NameResolver {
    pub current_class: String,
    pub current_package: Option<String>,
    /// Single-type imports: simple name -> internal name.
    pub single_imports: HashMap<String, String>,
    /// Wildcard-imported packages (internal form, no trailing `/`),
    /// always including `java/lang`.
    pub wildcard_packages: Vec<String>,
}

impl NameResolver {
    pub fn new(current_class: String, current_package: Option<String>) -> Self {
        Self {
            current_class,
            current_package,
            single_imports: HashMap::new(),
            wildcard_packages: vec!["java/lang".to_string()],
        }
    }

    pub fn add_single_import(&mut self, internal_name: String) {
        if let Some(simple) = internal_name.rsplit('/').next() {
            self.single_imports.insert(simple.to_string(), internal_name.clone());
        }
    }

    pub fn add_wildcard_import(&mut self, package: String) {
        self.wildcard_packages.push(package);
    }

    /// Resolves `name` to an internal class name. Does not verify the
    /// class actually exists; callers follow up with a classpath/local
    /// lookup to confirm.
    pub fn resolve_type_name(&self, name: &str) -> String {
        if name.contains('/') {
            return name.to_string();
        }
        if let Some(full) = self.single_imports.get(name) {
            return full.clone();
        }
        let current_simple = self.current_class.rsplit('/').next().unwrap_or(&self.current_class);
        if name == current_simple {
            return self.current_class.clone();
        }
        match &self.current_package {
            Some(pkg) => format!("{}/{}", pkg, name),
            None => name.to_string(),
        }
    }

    /// All candidate internal names for `name`, tried in resolution
    /// order: wildcard imports are tried last and only as a fallback
    /// since any of them could define it.
    pub fn candidate_type_names(&self, name: &str) -> Vec<String> {
        if name.contains('/') {
            return vec![name.to_string()];
        }
        let mut candidates = Vec::new();
        if let Some(full) = self.single_imports.get(name) {
            candidates.push(full.clone());
        }
        let current_simple = self.current_class.rsplit('/').next().unwrap_or(&self.current_class);
        if name == current_simple {
            candidates.push(self.current_class.clone());
        }
        if let Some(pkg) = &self.current_package {
            candidates.push(format!("{}/{}", pkg, name));
        } else {
            candidates.push(name.to_string());
        }
        for pkg in &self.wildcard_packages {
            candidates.push(format!("{}/{}", pkg, name));
        }
        candidates
    }
}

/// Walks `start`'s superclass chain, then its interface chain (applied
/// after exhausting superclasses, recursively over each interface's own
/// supers), calling `visit` on every owner until it returns `Some`.
fn walk_hierarchy<T>(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    start: &str,
    visit: &mut dyn FnMut(&LocalClass) -> Option<T>,
) -> CompileResult<Option<T>> {
    let mut queue = vec![start.to_string()];
    let mut seen = std::collections::HashSet::new();
    let mut interfaces_to_visit = Vec::new();

    while let Some(name) = queue.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let view = class_view(classpath, locals, &name)?;
        if let Some(result) = visit(&view) {
            return Ok(Some(result));
        }
        interfaces_to_visit.extend(view.interfaces.iter().cloned());
        if let Some(super_name) = &view.super_name {
            queue.push(super_name.clone());
        }
    }

    for iface in interfaces_to_visit {
        if seen.contains(&iface) {
            continue;
        }
        if let Some(result) = walk_hierarchy(classpath, locals, &iface, visit)? {
            return Ok(Some(result));
        }
    }

    Ok(None)
}

pub fn resolve_field(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    owner: &str,
    name: &str,
) -> CompileResult<FieldCandidate> {
    let found = walk_hierarchy(classpath, locals, owner, &mut |view| {
        view.fields.iter().find(|f| f.name == name).cloned()
    })?;
    found.ok_or_else(|| CompileError::NoSuchMember(owner.to_string(), name.to_string()))
}

/// Whether a value of type `from` is assignable to a parameter of type
/// `to`: identity, widening primitive conversion, or reference subtyping
/// (`Object` is a supertype of any reference/array type).
pub fn is_assignable(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    from: &Type,
    to: &Type,
) -> CompileResult<bool> {
    if from == to {
        return Ok(true);
    }
    match (from, to) {
        (Type::Primitive(a), Type::Primitive(b)) => Ok(a.widens_to(*b)),
        (_, Type::Class(name)) if name == "java/lang/Object" => Ok(true),
        (Type::Class(from_name), Type::Class(_)) => {
            is_subclass(classpath, locals, from_name, to)
        }
        (Type::Array { .. }, Type::Class(name)) if name == "java/lang/Object" => Ok(true),
        (
            Type::Array {
                element: from_elem,
                dimensions: from_dim,
            },
            Type::Array {
                element: to_elem,
                dimensions: to_dim,
            },
        ) => {
            if from_dim != to_dim {
                return Ok(false);
            }
            if from_elem.is_reference() {
                is_assignable(classpath, locals, from_elem, to_elem)
            } else {
                Ok(from_elem == to_elem)
            }
        }
        _ => Ok(false),
    }
}

fn is_subclass(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    from_name: &str,
    to: &Type,
) -> CompileResult<bool> {
    let target = match to {
        Type::Class(name) => name.clone(),
        _ => return Ok(false),
    };
    walk_hierarchy(classpath, locals, from_name, &mut |view| {
        (view.internal_name == target).then_some(())
    })
    .map(|found| found.is_some())
}

/// How specific a single parameter match is, used to rank overloads:
/// lower is more specific. Primitive-exact beats widening beats boxed
/// beats `Object`, per the Open Question decision recorded in DESIGN.md.
fn specificity_rank(param: &Type, arg: &Type) -> u8 {
    if param == arg {
        return 0;
    }
    match (param.as_primitive(), arg.as_primitive()) {
        (Some(_), Some(_)) => 1,
        (Some(p), None) => {
            // arg is boxed; a primitive parameter accepting it via
            // unboxing is less specific than an exact primitive match.
            if arg == &p.boxed_class().into() {
                2
            } else {
                3
            }
        }
        (None, _) => {
            if matches!(param, Type::Class(n) if n == "java/lang/Object") {
                4
            } else {
                2
            }
        }
    }
}

impl From<&str> for Type {
    fn from(s: &str) -> Self {
        Type::class(s)
    }
}

/// Tries to bind `arguments` against `candidate`'s fixed parameter list
/// (no varargs packaging). Returns `None` if arity or assignability fail.
fn try_fixed_arity(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    candidate: &MethodCandidate,
    arguments: &[Type],
) -> CompileResult<Option<Vec<u8>>> {
    if candidate.descriptor.parameters.len() != arguments.len() {
        return Ok(None);
    }
    let mut ranks = Vec::with_capacity(arguments.len());
    for (param, arg) in candidate.descriptor.parameters.iter().zip(arguments) {
        if !is_assignable(classpath, locals, arg, &param.boxed())?
            && !is_assignable(classpath, locals, &arg.boxed(), param)?
            && !is_assignable(classpath, locals, arg, param)?
        {
            return Ok(None);
        }
        ranks.push(specificity_rank(param, arg));
    }
    Ok(Some(ranks))
}

/// Tries to bind `arguments` against a varargs candidate: the fixed
/// prefix matches normally, and every trailing argument is assignable
/// to the trailing array parameter's element type.
fn try_varargs(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    candidate: &MethodCandidate,
    arguments: &[Type],
) -> CompileResult<Option<Vec<u8>>> {
    let params = &candidate.descriptor.parameters;
    let Some(last) = params.last() else {
        return Ok(None);
    };
    let Type::Array { element, dimensions: 1 } = last else {
        return Ok(None);
    };
    if arguments.len() + 1 < params.len() {
        return Ok(None);
    }
    let fixed = &params[..params.len() - 1];
    if arguments.len() < fixed.len() {
        return Ok(None);
    }
    let mut ranks = Vec::new();
    for (param, arg) in fixed.iter().zip(&arguments[..fixed.len()]) {
        if !is_assignable(classpath, locals, arg, param)? {
            return Ok(None);
        }
        ranks.push(specificity_rank(param, arg));
    }
    for arg in &arguments[fixed.len()..] {
        if !is_assignable(classpath, locals, arg, element)? {
            return Ok(None);
        }
        ranks.push(specificity_rank(element, arg));
    }
    Ok(Some(ranks))
}

/// Picks the unique most-specific overload for `name` on `owner`'s
/// hierarchy, given the static types of the call's arguments.
pub fn resolve_method(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    owner: &str,
    name: &str,
    arguments: &[Type],
) -> CompileResult<MethodCandidate> {
    let mut scored: Vec<(MethodCandidate, Vec<u8>)> = Vec::new();
    // Collect every same-named candidate across the hierarchy first
    // (can't score inline since `is_assignable` needs `&mut ClassPath`
    // while `walk_hierarchy`'s visitor borrows it too).
    let mut candidates = Vec::new();
    walk_hierarchy(classpath, locals, owner, &mut |view| {
        for m in &view.methods {
            if m.name == name {
                candidates.push(m.clone());
            }
        }
        None::<()>
    })?;

    for candidate in &candidates {
        if let Some(ranks) = try_fixed_arity(classpath, locals, candidate, arguments)? {
            scored.push((candidate.clone(), ranks));
        } else if candidate.is_varargs {
            if let Some(ranks) = try_varargs(classpath, locals, candidate, arguments)? {
                scored.push((candidate.clone(), ranks));
            }
        }
    }

    if scored.is_empty() {
        return Err(CompileError::NoApplicableOverload(name.to_string(), arguments.to_vec()));
    }

    // Most specific: the candidate whose rank vector is componentwise
    // <= every other candidate's, and strictly < at least one position.
    let mut best = vec![0usize];
    for i in 1..scored.len() {
        let cmp = compare_specificity(&scored[i].1, &scored[best[0]].1);
        match cmp {
            std::cmp::Ordering::Less => best = vec![i],
            std::cmp::Ordering::Equal => best.push(i),
            std::cmp::Ordering::Greater => {}
        }
    }
    if best.len() > 1 {
        return Err(CompileError::AmbiguousOverload(name.to_string(), best.len()));
    }
    Ok(scored.remove(best[0]).0)
}

fn compare_specificity(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let mut any_less = false;
    let mut any_greater = false;
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Less => any_less = true,
            Ordering::Greater => any_greater = true,
            Ordering::Equal => {}
        }
    }
    match (any_less, any_greater) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Constructor resolution is method resolution restricted to `<init>`
/// on `owner` only, no inheritance.
pub fn resolve_constructor(
    classpath: &mut ClassPath,
    locals: &LocalClassRegistry,
    owner: &str,
    arguments: &[Type],
) -> CompileResult<MethodCandidate> {
    let view = class_view(classpath, locals, owner)?;
    let candidates: Vec<_> = view.methods.iter().filter(|m| m.name == "<init>").collect();
    let mut best: Option<(MethodCandidate, Vec<u8>)> = None;
    let mut ambiguous = 1;
    for candidate in candidates {
        let ranks = if let Some(r) = try_fixed_arity(classpath, locals, candidate, arguments)? {
            Some(r)
        } else if candidate.is_varargs {
            try_varargs(classpath, locals, candidate, arguments)?
        } else {
            None
        };
        let Some(ranks) = ranks else { continue };
        match &best {
            None => best = Some((candidate.clone(), ranks)),
            Some((_, best_ranks)) => match compare_specificity(&ranks, best_ranks) {
                std::cmp::Ordering::Less => {
                    best = Some((candidate.clone(), ranks));
                    ambiguous = 1;
                }
                std::cmp::Ordering::Equal => ambiguous += 1,
                std::cmp::Ordering::Greater => {}
            },
        }
    }
    match best {
        Some(_) if ambiguous > 1 => Err(CompileError::AmbiguousOverload("<init>".to_string(), ambiguous)),
        Some((candidate, _)) => Ok(candidate),
        None => Err(CompileError::NoApplicableOverload("<init>".to_string(), arguments.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_class() -> LocalClass {
        LocalClass {
            internal_name: "java/lang/Object".to_string(),
            super_name: None,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
        }
    }

    #[test]
    fn resolves_field_from_superclass() {
        let mut classpath = ClassPath::new();
        let mut locals = LocalClassRegistry::new();
        locals.insert(object_class());
        locals.insert(LocalClass {
            internal_name: "com/example/Base".to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: vec![],
            fields: vec![FieldCandidate {
                owner: "com/example/Base".to_string(),
                name: "value".to_string(),
                field_type: Type::Primitive(Primitive::Int),
                is_static: false,
            }],
            methods: vec![],
        });
        locals.insert(LocalClass {
            internal_name: "com/example/Derived".to_string(),
            super_name: Some("com/example/Base".to_string()),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
        });
        let found = resolve_field(&mut classpath, &locals, "com/example/Derived", "value").unwrap();
        assert_eq!(found.owner, "com/example/Base");
    }

    #[test]
    fn picks_most_specific_overload_over_widening() {
        let mut classpath = ClassPath::new();
        let mut locals = LocalClassRegistry::new();
        locals.insert(object_class());
        locals.insert(LocalClass {
            internal_name: "com/example/Overloads".to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: vec![],
            fields: vec![],
            methods: vec![
                MethodCandidate {
                    owner: "com/example/Overloads".to_string(),
                    name: "f".to_string(),
                    descriptor: MethodType::new(
                        vec![Type::Primitive(Primitive::Int)],
                        Type::void(),
                    ),
                    is_static: true,
                    is_varargs: false,
                },
                MethodCandidate {
                    owner: "com/example/Overloads".to_string(),
                    name: "f".to_string(),
                    descriptor: MethodType::new(
                        vec![Type::Primitive(Primitive::Long)],
                        Type::void(),
                    ),
                    is_static: true,
                    is_varargs: false,
                },
            ],
        });
        let found = resolve_method(
            &mut classpath,
            &locals,
            "com/example/Overloads",
            "f",
            &[Type::Primitive(Primitive::Int)],
        )
        .unwrap();
        assert_eq!(found.descriptor.parameters, vec![Type::Primitive(Primitive::Int)]);
    }
}
