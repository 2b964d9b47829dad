//! The AST the generator consumes. This crate never parses source text
//! into this tree (that's the lexer/parser's job, out of scope here) —
//! callers build it directly, either from a real front end or, in this
//! repo's tests and demo driver, by hand. The tree is immutable: the
//! generator never mutates it, and a method body has no cycles.

use crate::types::{Primitive, Type};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub public: bool,
    pub private: bool,
    pub protected: bool,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    pub synchronized: bool,
    pub native: bool,
    pub transient: bool,
    pub volatile: bool,
    pub strictfp: bool,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            public: false,
            private: false,
            protected: false,
            is_static: false,
            is_final: false,
            is_abstract: false,
            synchronized: false,
            native: false,
            transient: false,
            volatile: false,
            strictfp: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub is_static: bool,
    pub is_wildcard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub types: Vec<TypeDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    pub name: String,
    pub type_parameters: Vec<String>,
    /// Internal name of the superclass (`java/lang/Object` if absent,
    /// filled in by the declaration compiler if `None`).
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub members: Vec<Member>,
    /// Enum constant names, in declaration order (enum only).
    pub enum_constants: Vec<EnumConstant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: String,
    pub arguments: Vec<Expr>,
    /// A constant-specific class body, for `FOO { ... }` enum constants.
    pub body: Option<Vec<Member>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    /// `static { ... }` if `is_static`, else an instance initializer block.
    Initializer { is_static: bool, body: Block },
    NestedType(Box<TypeDecl>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarator {
    pub name: String,
    /// Extra `[]` pairs written after the name (`int a[]`).
    pub extra_dimensions: u8,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub modifiers: Modifiers,
    pub element_type: TypeRef,
    pub declarators: Vec<Declarator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub param_type: TypeRef,
    pub is_varargs: bool,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub modifiers: Modifiers,
    pub type_parameters: Vec<String>,
    pub return_type: TypeRef,
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub throws: Vec<String>,
    /// `None` for abstract/native/interface-without-default methods.
    pub body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub modifiers: Modifiers,
    pub parameters: Vec<Parameter>,
    pub throws: Vec<String>,
    pub body: Block,
}

/// A type as written in source, before resolution: a primitive, a
/// (possibly unresolved) class name, or an array of either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(Primitive),
    /// Simple or qualified name as written; resolved against imports
    /// and the classpath by the symbol resolver.
    Name(String),
    Array { element: Box<TypeRef>, dimensions: u8 },
}

impl TypeRef {
    pub fn class(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Block(Block),
    LocalDecl {
        element_type: TypeRef,
        declarators: Vec<Declarator>,
        is_final: bool,
    },
    Expr(Expr),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        label: Option<String>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        label: Option<String>,
    },
    For {
        init: Vec<Stmt>,
        condition: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
        label: Option<String>,
    },
    ForEach {
        element_type: TypeRef,
        name: String,
        iterable: Expr,
        body: Box<Stmt>,
        label: Option<String>,
    },
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        resources: Vec<LocalDecl>,
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
    },
    Synchronized {
        monitor: Expr,
        body: Block,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Assert {
        condition: Expr,
        message: Option<Expr>,
    },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDecl {
    pub element_type: TypeRef,
    pub name: String,
    pub initializer: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchClause {
    pub exception_types: Vec<String>,
    pub name: String,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCase {
    /// Empty means `default`.
    pub labels: Vec<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    Boolean(bool),
    Char(char),
    String(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    AndAssign,
    OrAssign,
    XorAssign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),
    /// A bare identifier; resolved to a local, field, or type by the
    /// symbol resolver.
    Name(String),
    /// A dotted name (`a.b.c`), disambiguated (package/type/field
    /// access chain) at resolution time.
    QualifiedName(Vec<String>),
    FieldAccess {
        target: Box<Expr>,
        name: String,
    },
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    MethodCall {
        /// `None` for an unqualified call (implicit `this` or static
        /// import).
        target: Option<Box<Expr>>,
        name: String,
        arguments: Vec<Expr>,
    },
    New {
        class_name: String,
        arguments: Vec<Expr>,
        /// Present for an anonymous class instantiation.
        anonymous_body: Option<Vec<Member>>,
    },
    NewArray {
        element_type: TypeRef,
        /// Explicit dimension size expressions (outermost first); may
        /// be shorter than total dimensions (`new int[3][]`).
        dimensions: Vec<Expr>,
        extra_dimensions: u8,
        initializer: Option<Box<Expr>>,
    },
    ArrayInitializer(Vec<Expr>),
    Cast {
        target_type: TypeRef,
        operand: Box<Expr>,
    },
    InstanceOf {
        operand: Box<Expr>,
        check_type: TypeRef,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Lambda {
        parameters: Vec<String>,
        body: LambdaBody,
    },
    MethodReference {
        target: Box<Expr>,
        method_name: String,
    },
    Parenthesized(Box<Expr>),
    This,
    Super,
    /// `Foo.class`.
    ClassLiteral(TypeRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}
