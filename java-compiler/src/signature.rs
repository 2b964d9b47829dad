//! Round-trips `Signature` attribute strings to/from an internal
//! representation, and defines erasure (stripping all generic
//! decoration down to the raw class-file descriptor).

use crate::error::{CompileError, CompileResult};
use crate::types::{Primitive, Type};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    /// First bound is the class bound (may be `java/lang/Object`),
    /// remaining are interface bounds.
    pub bounds: Vec<SigType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wildcard {
    /// `*`
    Unbounded,
    /// `+T` (extends)
    Extends(Box<SigType>),
    /// `-T` (super)
    Super(Box<SigType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigType {
    Base(Primitive),
    TypeVariable(String),
    Array(Box<SigType>),
    Class {
        name: String,
        type_arguments: Vec<TypeArgument>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArgument {
    Type(SigType),
    Wildcard(Wildcard),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub superclass: Option<SigType>,
    pub interfaces: Vec<SigType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<SigType>,
    pub return_type: ReturnSig,
    pub throws: Vec<SigType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnSig {
    Void,
    Type(SigType),
}

impl Default for ReturnSig {
    fn default() -> Self {
        Self::Void
    }
}

/// Strips all generic decoration, returning the plain descriptor type.
pub fn erase(sig: &SigType) -> Type {
    match sig {
        SigType::Base(p) => Type::Primitive(*p),
        SigType::TypeVariable(_) => Type::object(),
        SigType::Array(inner) => {
            let mut element = &**inner;
            let mut dims = 1u8;
            while let SigType::Array(next) = element {
                element = next;
                dims += 1;
            }
            Type::array(erase(element), dims)
        }
        SigType::Class { name, .. } => Type::class(name.clone()),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: u8) -> CompileResult<()> {
        if self.bump() == Some(c) {
            Ok(())
        } else {
            Err(CompileError::BadSignature(format!(
                "expected `{}` at position {}",
                c as char, self.pos
            )))
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if pred(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

fn parse_type_parameters(c: &mut Cursor) -> CompileResult<Vec<TypeParameter>> {
    if c.peek() != Some(b'<') {
        return Ok(Vec::new());
    }
    c.eat(b'<')?;
    let mut params = Vec::new();
    while c.peek() != Some(b'>') {
        let name = c.take_while(|b| b != b':');
        c.eat(b':')?;
        let mut bounds = Vec::new();
        // Class bound may be empty (e.g. `T::Comparable<T>;` has no class bound).
        if c.peek() != Some(b':') && c.peek() != Some(b'>') {
            bounds.push(parse_sig_type(c)?);
        }
        while c.peek() == Some(b':') {
            c.eat(b':')?;
            bounds.push(parse_sig_type(c)?);
        }
        params.push(TypeParameter { name, bounds });
    }
    c.eat(b'>')?;
    Ok(params)
}

fn parse_sig_type(c: &mut Cursor) -> CompileResult<SigType> {
    match c.peek() {
        Some(b'[') => {
            c.bump();
            Ok(SigType::Array(Box::new(parse_sig_type(c)?)))
        }
        Some(b'T') => {
            c.bump();
            let name = c.take_while(|b| b != b';');
            c.eat(b';')?;
            Ok(SigType::TypeVariable(name))
        }
        Some(b'L') => parse_class_sig_type(c),
        Some(tag) => {
            if let Some(p) = primitive_from_tag(tag) {
                c.bump();
                Ok(SigType::Base(p))
            } else {
                Err(CompileError::BadSignature(format!(
                    "unexpected tag `{}`",
                    tag as char
                )))
            }
        }
        None => Err(CompileError::BadSignature("unexpected end of signature".to_string())),
    }
}

fn parse_class_sig_type(c: &mut Cursor) -> CompileResult<SigType> {
    c.eat(b'L')?;
    let mut name = c.take_while(|b| b != b';' && b != b'<');
    let mut type_arguments = Vec::new();
    if c.peek() == Some(b'<') {
        c.eat(b'<')?;
        while c.peek() != Some(b'>') {
            type_arguments.push(parse_type_argument(c)?);
        }
        c.eat(b'>')?;
    }
    // Inner-class suffixes (`.Inner`) are folded into a single
    // `/`-joined name; erasure never needs them split.
    while c.peek() == Some(b'.') {
        c.bump();
        let inner = c.take_while(|b| b != b';' && b != b'<' && b != b'.');
        name.push('$');
        name.push_str(&inner);
        if c.peek() == Some(b'<') {
            c.eat(b'<')?;
            while c.peek() != Some(b'>') {
                type_arguments.push(parse_type_argument(c)?);
            }
            c.eat(b'>')?;
        }
    }
    c.eat(b';')?;
    Ok(SigType::Class { name, type_arguments })
}

fn parse_type_argument(c: &mut Cursor) -> CompileResult<TypeArgument> {
    match c.peek() {
        Some(b'*') => {
            c.bump();
            Ok(TypeArgument::Wildcard(Wildcard::Unbounded))
        }
        Some(b'+') => {
            c.bump();
            Ok(TypeArgument::Wildcard(Wildcard::Extends(Box::new(parse_sig_type(c)?))))
        }
        Some(b'-') => {
            c.bump();
            Ok(TypeArgument::Wildcard(Wildcard::Super(Box::new(parse_sig_type(c)?))))
        }
        _ => Ok(TypeArgument::Type(parse_sig_type(c)?)),
    }
}

fn primitive_from_tag(tag: u8) -> Option<Primitive> {
    Some(match tag {
        b'V' => Primitive::Void,
        b'Z' => Primitive::Boolean,
        b'B' => Primitive::Byte,
        b'C' => Primitive::Char,
        b'S' => Primitive::Short,
        b'I' => Primitive::Int,
        b'J' => Primitive::Long,
        b'F' => Primitive::Float,
        b'D' => Primitive::Double,
        _ => return None,
    })
}

pub fn parse_class_signature(s: &str) -> CompileResult<ClassSignature> {
    let mut c = Cursor::new(s);
    let type_parameters = parse_type_parameters(&mut c)?;
    let superclass = Some(parse_sig_type(&mut c)?);
    let mut interfaces = Vec::new();
    while !c.is_eof() {
        interfaces.push(parse_sig_type(&mut c)?);
    }
    Ok(ClassSignature {
        type_parameters,
        superclass,
        interfaces,
    })
}

pub fn parse_method_signature(s: &str) -> CompileResult<MethodSignature> {
    let mut c = Cursor::new(s);
    let type_parameters = parse_type_parameters(&mut c)?;
    c.eat(b'(')?;
    let mut parameters = Vec::new();
    while c.peek() != Some(b')') {
        parameters.push(parse_sig_type(&mut c)?);
    }
    c.eat(b')')?;
    let return_type = if c.peek() == Some(b'V') {
        c.bump();
        ReturnSig::Void
    } else {
        ReturnSig::Type(parse_sig_type(&mut c)?)
    };
    let mut throws = Vec::new();
    while c.peek() == Some(b'^') {
        c.bump();
        throws.push(parse_sig_type(&mut c)?);
    }
    Ok(MethodSignature {
        type_parameters,
        parameters,
        return_type,
        throws,
    })
}

fn write_sig_type(sig: &SigType, out: &mut String) {
    match sig {
        SigType::Base(p) => out.push_str(p.descriptor()),
        SigType::TypeVariable(name) => {
            out.push('T');
            out.push_str(name);
            out.push(';');
        }
        SigType::Array(inner) => {
            out.push('[');
            write_sig_type(inner, out);
        }
        SigType::Class { name, type_arguments } => {
            out.push('L');
            out.push_str(name);
            if !type_arguments.is_empty() {
                out.push('<');
                for arg in type_arguments {
                    write_type_argument(arg, out);
                }
                out.push('>');
            }
            out.push(';');
        }
    }
}

fn write_type_argument(arg: &TypeArgument, out: &mut String) {
    match arg {
        TypeArgument::Type(t) => write_sig_type(t, out),
        TypeArgument::Wildcard(Wildcard::Unbounded) => out.push('*'),
        TypeArgument::Wildcard(Wildcard::Extends(t)) => {
            out.push('+');
            write_sig_type(t, out);
        }
        TypeArgument::Wildcard(Wildcard::Super(t)) => {
            out.push('-');
            write_sig_type(t, out);
        }
    }
}

fn write_type_parameters(params: &[TypeParameter], out: &mut String) {
    if params.is_empty() {
        return;
    }
    out.push('<');
    for p in params {
        out.push_str(&p.name);
        if p.bounds.is_empty() {
            out.push_str("::");
        } else {
            for (i, bound) in p.bounds.iter().enumerate() {
                out.push(':');
                let _ = i;
                write_sig_type(bound, out);
            }
        }
    }
    out.push('>');
}

pub fn emit_class_signature(sig: &ClassSignature) -> String {
    let mut out = String::new();
    write_type_parameters(&sig.type_parameters, &mut out);
    if let Some(superclass) = &sig.superclass {
        write_sig_type(superclass, &mut out);
    }
    for iface in &sig.interfaces {
        write_sig_type(iface, &mut out);
    }
    out
}

pub fn emit_method_signature(sig: &MethodSignature) -> String {
    let mut out = String::new();
    write_type_parameters(&sig.type_parameters, &mut out);
    out.push('(');
    for p in &sig.parameters {
        write_sig_type(p, &mut out);
    }
    out.push(')');
    match &sig.return_type {
        ReturnSig::Void => out.push('V'),
        ReturnSig::Type(t) => write_sig_type(t, &mut out),
    }
    for t in &sig.throws {
        out.push('^');
        write_sig_type(t, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_parameterized_class_signature() {
        let s = "Ljava/util/ArrayList<Ljava/lang/String;>;";
        let sig = parse_sig_type(&mut Cursor::new(s)).unwrap();
        let mut out = String::new();
        write_sig_type(&sig, &mut out);
        assert_eq!(out, s);
    }

    #[test]
    fn erase_strips_type_arguments() {
        let sig = parse_sig_type(&mut Cursor::new("Ljava/util/List<Ljava/lang/String;>;")).unwrap();
        assert_eq!(erase(&sig), Type::class("java/util/List"));
    }

    #[test]
    fn method_signature_with_type_parameter_and_throws() {
        let s = "<T:Ljava/lang/Object;>(TT;)TT;^Ljava/lang/Exception;";
        let sig = parse_method_signature(s).unwrap();
        assert_eq!(sig.type_parameters.len(), 1);
        assert_eq!(sig.parameters.len(), 1);
        assert_eq!(sig.throws.len(), 1);
        assert_eq!(emit_method_signature(&sig), s);
    }

    #[test]
    fn class_signature_with_wildcard() {
        let s = "Ljava/util/List<+Ljava/lang/Number;>;";
        let sig = ClassSignature {
            type_parameters: vec![],
            superclass: Some(parse_sig_type(&mut Cursor::new(s)).unwrap()),
            interfaces: vec![],
        };
        assert_eq!(emit_class_signature(&sig), s);
    }
}
