use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// The primitive type universe of CompilScript. User classes are referenced
/// by name through [`TypeRef`] and are not part of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Integer,
    Float,
    String,
    Boolean,
    Void,
}

impl PrimitiveType {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Integer => "integer",
            PrimitiveType::Float => "float",
            PrimitiveType::String => "string",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Void => "void",
        }
    }

    pub fn from_name(name: &str) -> Option<PrimitiveType> {
        match name {
            "integer" => Some(PrimitiveType::Integer),
            "float" => Some(PrimitiveType::Float),
            "string" => Some(PrimitiveType::String),
            "boolean" => Some(PrimitiveType::Boolean),
            "void" => Some(PrimitiveType::Void),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, PrimitiveType::Integer | PrimitiveType::Float)
    }
}

impl Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A resolved type reference: a base name plus array dimensions.
/// `dimensions > 0` denotes an array; base names outside the primitive set
/// denote user classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub base: String,
    pub dimensions: u8,
}

impl TypeRef {
    pub fn new(base: impl Into<String>, dimensions: u8) -> Self {
        TypeRef {
            base: base.into(),
            dimensions,
        }
    }

    pub fn primitive(primitive: PrimitiveType) -> Self {
        TypeRef::new(primitive.name(), 0)
    }

    pub fn integer() -> Self {
        TypeRef::primitive(PrimitiveType::Integer)
    }

    pub fn float() -> Self {
        TypeRef::primitive(PrimitiveType::Float)
    }

    pub fn string() -> Self {
        TypeRef::primitive(PrimitiveType::String)
    }

    pub fn boolean() -> Self {
        TypeRef::primitive(PrimitiveType::Boolean)
    }

    pub fn void() -> Self {
        TypeRef::primitive(PrimitiveType::Void)
    }

    pub fn is_array(&self) -> bool {
        self.dimensions > 0
    }

    pub fn is_void(&self) -> bool {
        !self.is_array() && self.base == "void"
    }

    /// The primitive this reference names, if the base is not an array or a
    /// user class.
    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        if self.is_array() {
            return None;
        }
        PrimitiveType::from_name(&self.base)
    }

    pub fn is_numeric(&self) -> bool {
        self.as_primitive().is_some_and(|p| p.is_numeric())
    }

    pub fn is_string(&self) -> bool {
        self.as_primitive() == Some(PrimitiveType::String)
    }

    pub fn is_boolean(&self) -> bool {
        self.as_primitive() == Some(PrimitiveType::Boolean)
    }

    /// Default value in TAC operand form, used for synthesized returns.
    pub fn default_value(&self) -> &'static str {
        match self.as_primitive() {
            Some(PrimitiveType::Integer) => "0",
            Some(PrimitiveType::Float) => "0.0",
            Some(PrimitiveType::Boolean) => "false",
            Some(PrimitiveType::String) => "\"\"",
            _ => "0",
        }
    }

    /// Byte size of a value of this type. Arrays and strings are pointers.
    pub fn size_bytes(&self) -> u32 {
        4
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for _ in 0..self.dimensions {
            write!(f, "[]")?;
        }
        Ok(())
    }
}
