//! The internal type model: primitive, class, array and method types,
//! and the descriptor strings the class-file format represents them as.
//! Descriptors are the canonical equality key at the emission boundary.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    pub fn descriptor(self) -> &'static str {
        match self {
            Self::Void => "V",
            Self::Boolean => "Z",
            Self::Byte => "B",
            Self::Char => "C",
            Self::Short => "S",
            Self::Int => "I",
            Self::Long => "J",
            Self::Float => "F",
            Self::Double => "D",
        }
    }

    /// Operand-stack / local-slot width: 2 for `long`/`double`, else 1
    /// (0 for `void`, which never occupies a slot).
    pub fn slot_size(self) -> u16 {
        match self {
            Self::Void => 0,
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    pub fn is_wide(self) -> bool {
        self.slot_size() == 2
    }

    /// Widening-primitive-conversion rank used by numeric promotion and
    /// overload specificity (JLS §5.1.2): byte < short < int < long <
    /// float < double, with char parallel to short.
    pub fn widening_rank(self) -> Option<u8> {
        match self {
            Self::Byte => Some(0),
            Self::Short | Self::Char => Some(1),
            Self::Int => Some(2),
            Self::Long => Some(3),
            Self::Float => Some(4),
            Self::Double => Some(5),
            Self::Void | Self::Boolean => None,
        }
    }

    pub fn widens_to(self, other: Self) -> bool {
        match (self.widening_rank(), other.widening_rank()) {
            (Some(a), Some(b)) => a <= b,
            _ => self == other,
        }
    }

    /// The boxed wrapper class's internal name, e.g. `Integer` -> `java/lang/Integer`.
    pub fn boxed_class(self) -> &'static str {
        match self {
            Self::Void => "java/lang/Void",
            Self::Boolean => "java/lang/Boolean",
            Self::Byte => "java/lang/Byte",
            Self::Char => "java/lang/Character",
            Self::Short => "java/lang/Short",
            Self::Int => "java/lang/Integer",
            Self::Long => "java/lang/Long",
            Self::Float => "java/lang/Float",
            Self::Double => "java/lang/Double",
        }
    }

    /// The wrapper class's unboxing method, e.g. `intValue`.
    pub fn unboxing_method(self) -> &'static str {
        match self {
            Self::Void => "",
            Self::Boolean => "booleanValue",
            Self::Byte => "byteValue",
            Self::Char => "charValue",
            Self::Short => "shortValue",
            Self::Int => "intValue",
            Self::Long => "longValue",
            Self::Float => "floatValue",
            Self::Double => "doubleValue",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        };
        write!(f, "{}", name)
    }
}

/// A type value in the internal type model. Two `Type`s with equal
/// descriptors are interchangeable in the constant pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    /// A class or interface, named by internal name (`java/lang/String`).
    Class(String),
    Array {
        element: Box<Type>,
        dimensions: u8,
    },
}

impl Type {
    pub fn void() -> Self {
        Self::Primitive(Primitive::Void)
    }

    pub fn class(internal_name: impl Into<String>) -> Self {
        Self::Class(internal_name.into())
    }

    pub fn array(element: Type, dimensions: u8) -> Self {
        Self::Array {
            element: Box::new(element),
            dimensions,
        }
    }

    pub fn object() -> Self {
        Self::class("java/lang/Object")
    }

    pub fn string() -> Self {
        Self::class("java/lang/String")
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Self::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Operand-stack / local-slot width: 2 for `long`/`double`, 1 for
    /// everything else including references, 0 for `void`.
    pub fn slot_size(&self) -> u16 {
        match self {
            Self::Primitive(p) => p.slot_size(),
            _ => 1,
        }
    }

    /// The JVM class-file descriptor string for this type.
    pub fn descriptor(&self) -> String {
        match self {
            Self::Primitive(p) => p.descriptor().to_string(),
            Self::Class(name) => format!("L{};", name),
            Self::Array { element, dimensions } => {
                format!("{}{}", "[".repeat(*dimensions as usize), element.descriptor())
            }
        }
    }

    /// The boxed reference type for a primitive; identity for anything
    /// already a reference type.
    pub fn boxed(&self) -> Type {
        match self {
            Self::Primitive(p) => Type::class(p.boxed_class()),
            other => other.clone(),
        }
    }

    /// Parses a single field descriptor (`I`, `Ljava/lang/String;`,
    /// `[[I`, ...), returning the remainder of `s` after the parsed type.
    pub fn parse_descriptor(s: &str) -> Option<(Type, &str)> {
        let bytes = s.as_bytes();
        let mut dims = 0u8;
        let mut i = 0;
        while bytes.get(i) == Some(&b'[') {
            dims += 1;
            i += 1;
        }
        let (element, rest) = match bytes.get(i)? {
            b'L' => {
                let end = s[i..].find(';')? + i;
                (Type::class(&s[i + 1..end]), &s[end + 1..])
            }
            tag => {
                let prim = match tag {
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
                };
                (Type::Primitive(prim), &s[i + 1..])
            }
        };
        if dims == 0 {
            Some((element, rest))
        } else {
            Some((Type::array(element, dims), rest))
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{}", p),
            Self::Class(name) => write!(f, "{}", name.replace('/', ".")),
            Self::Array { element, dimensions } => {
                write!(f, "{}{}", element, "[]".repeat(*dimensions as usize))
            }
        }
    }
}

/// A method's erased shape: ordered parameter types plus return type.
/// Serializes as the standard `(ParamDescs)ReturnDesc` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    pub parameters: Vec<Type>,
    pub return_type: Type,
}

impl MethodType {
    pub fn new(parameters: Vec<Type>, return_type: Type) -> Self {
        Self {
            parameters,
            return_type,
        }
    }

    pub fn descriptor(&self) -> String {
        let params: String = self.parameters.iter().map(Type::descriptor).collect();
        format!("({}){}", params, self.return_type.descriptor())
    }

    pub fn parse_descriptor(s: &str) -> Option<Self> {
        let inner = s.strip_prefix('(')?;
        let (param_part, return_part) = inner.split_once(')')?;
        let mut parameters = Vec::new();
        let mut rest = param_part;
        while !rest.is_empty() {
            let (ty, remainder) = Type::parse_descriptor(rest)?;
            parameters.push(ty);
            rest = remainder;
        }
        let (return_type, _) = Type::parse_descriptor(return_part)?;
        Some(Self {
            parameters,
            return_type,
        })
    }

    /// Sum of parameter slot widths, as `invoke*` stack accounting needs.
    pub fn parameter_slots(&self) -> i32 {
        self.parameters.iter().map(|t| t.slot_size() as i32).sum()
    }

    pub fn return_slots(&self) -> i32 {
        self.return_type.slot_size() as i32
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_descriptors() {
        assert_eq!(Primitive::Int.descriptor(), "I");
        assert_eq!(Primitive::Long.descriptor(), "J");
        assert_eq!(Primitive::Void.descriptor(), "V");
    }

    #[test]
    fn array_descriptor_nests_dimensions() {
        let t = Type::array(Type::Primitive(Primitive::Int), 2);
        assert_eq!(t.descriptor(), "[[I");
    }

    #[test]
    fn class_descriptor_wraps_in_l_semicolon() {
        assert_eq!(Type::string().descriptor(), "Ljava/lang/String;");
    }

    #[test]
    fn method_descriptor_matches_jvm_format() {
        let m = MethodType::new(
            vec![Type::Primitive(Primitive::Int), Type::string()],
            Type::Primitive(Primitive::Boolean),
        );
        assert_eq!(m.descriptor(), "(ILjava/lang/String;)Z");
    }

    #[test]
    fn widening_rank_orders_numeric_types() {
        assert!(Primitive::Int.widens_to(Primitive::Long));
        assert!(!Primitive::Long.widens_to(Primitive::Int));
        assert!(Primitive::Int.widens_to(Primitive::Int));
    }

    #[test]
    fn parses_array_of_class_descriptor() {
        let (ty, rest) = Type::parse_descriptor("[Ljava/lang/String;X").unwrap();
        assert_eq!(ty, Type::array(Type::string(), 1));
        assert_eq!(rest, "X");
    }

    #[test]
    fn parses_method_descriptor() {
        let m = MethodType::parse_descriptor("(ILjava/lang/String;)Z").unwrap();
        assert_eq!(m.parameters, vec![Type::Primitive(Primitive::Int), Type::string()]);
        assert_eq!(m.return_type, Type::Primitive(Primitive::Boolean));
    }
}
