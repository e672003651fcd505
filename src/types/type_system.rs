//! Type System for minic
//!
//! Types are plain immutable values. Equality is structural and comes from the
//! derived `PartialEq`: pointers compare their pointees, arrays compare element
//! type and count, structs compare by name.

use std::fmt;

/// Target word size in bytes
pub const WORD: usize = 4;

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Int,
    Char,
    Void,
}

/// A minic type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    Pointer(Box<Type>),
    Array { elem: Box<Type>, count: usize },
    /// Reference to a struct by name; its fields live in the struct declaration
    Struct(String),
}

impl Type {
    pub const INT: Self = Self::Primitive(PrimitiveType::Int);
    pub const CHAR: Self = Self::Primitive(PrimitiveType::Char);
    pub const VOID: Self = Self::Primitive(PrimitiveType::Void);

    /// Create a pointer type
    pub fn ptr(inner: Type) -> Self {
        Self::Pointer(Box::new(inner))
    }

    /// Create an array type
    pub fn array(elem: Type, count: usize) -> Self {
        Self::Array { elem: Box::new(elem), count }
    }

    /// Size in units.
    ///
    /// Primitives are one unit, pointers take their pointee's size, arrays
    /// spend a word per element unit. Struct layout is not resolved, so
    /// structs report zero.
    pub fn size(&self) -> usize {
        match self {
            Self::Primitive(_) => 1,
            Self::Pointer(inner) => inner.size(),
            Self::Array { elem, count } => WORD * elem.size() * count,
            Self::Struct(_) => 0,
        }
    }

    /// Size rounded up to whole words, never less than one word.
    /// This is the space a value takes in a stack frame.
    pub fn word_size(&self) -> usize {
        let size = self.size().max(WORD);
        size.div_ceil(WORD) * WORD
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(PrimitiveType::Void))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    /// `void*`, which no variable may have
    pub fn is_void_pointer(&self) -> bool {
        matches!(self, Self::Pointer(inner) if inner.is_void())
    }

    /// Element type of an array or pointee of a pointer
    pub fn element(&self) -> Option<&Type> {
        match self {
            Self::Array { elem, .. } => Some(elem),
            Self::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// Struct named at the core of this type, under any pointers or arrays
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Self::Struct(name) => Some(name),
            Self::Pointer(inner) => inner.struct_name(),
            Self::Array { elem, .. } => elem.struct_name(),
            Self::Primitive(_) => None,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Char => write!(f, "char"),
            Self::Void => write!(f, "void"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{}", p),
            Self::Pointer(inner) => write!(f, "{}*", inner),
            Self::Array { elem, count } => write!(f, "{}[{}]", elem, count),
            Self::Struct(name) => write!(f, "struct {}", name),
        }
    }
}
