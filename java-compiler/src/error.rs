use thiserror::Error;

use crate::types::Type;

/// Every failure mode the generator can report, spanning class-path
/// resolution, symbol binding, and bytecode emission. These aren't tied
/// to a source span since the generator never sees source text, only
/// the AST.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("unknown class `{0}`")]
    UnknownClass(String),
    #[error("`{0}` has no member named `{1}`")]
    NoSuchMember(String, String),
    #[error("no applicable overload of `{0}` for argument types {1:?}")]
    NoApplicableOverload(String, Vec<Type>),
    #[error("call to `{0}` is ambiguous between {1} equally specific overloads")]
    AmbiguousOverload(String, usize),
    #[error("cannot assign {0} to {1}")]
    IncompatibleTypes(Type, Type),
    #[error("`{0}` cannot be resolved to a variable")]
    UnresolvedName(String),
    #[error("break/continue outside of a loop")]
    BreakOutsideLoop,
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),
    #[error("duplicate label `{0}`")]
    DuplicateLabel(String),
    #[error("method body generates more than 65535 bytes of code")]
    MethodTooLarge,
    #[error("class file would exceed format limits: {0}")]
    ClassTooLarge(String),
    #[error("malformed generic signature: {0}")]
    BadSignature(String),
    #[error("class file error: {0:?}")]
    ClassFile(exo_class_file::error::ClassFileError),
    #[error("error reading class path entry: {0}")]
    ClassPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// `ClassFileError` stays a plain enum (no `std::error::Error` impl) to
// match the teacher crate's own style, so it's bridged by hand rather
// than via thiserror's `#[from]`.
impl From<exo_class_file::error::ClassFileError> for CompileError {
    fn from(e: exo_class_file::error::ClassFileError) -> Self {
        Self::ClassFile(e)
    }
}

pub type CompileResult<T> = std::result::Result<T, CompileError>;
