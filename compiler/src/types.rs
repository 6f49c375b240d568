use std::fmt;

use serde::Serialize;

/// A parsed IDL document. Built once by the parser and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub objects:      Vec<ObjectDef>,
    pub global_types: Vec<TypeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDef {
    pub name:    String,
    pub line:    usize,
    pub column:  usize,
    pub types:   Vec<TypeDef>,
    pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    pub fields: Vec<FieldDef>,
}

/// A named, typed slot. Used both for record fields and for direct method parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub name:     String,
    pub line:     usize,
    pub column:   usize,
    pub type_:    TypeRef,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Int8,
    Int16,
    Int32,
    Int64,
    String,
    Bool,
    Double,
    Array,
    Unspec,
}

impl Primitive {
    pub const ALL: [Primitive; 9] = [
        Primitive::Int8,
        Primitive::Int16,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::String,
        Primitive::Bool,
        Primitive::Double,
        Primitive::Array,
        Primitive::Unspec,
    ];

    pub fn from_keyword(keyword: &str) -> Option<Primitive> {
        Primitive::ALL.iter().copied().find(|p| p.keyword() == keyword)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Int8   => "int8",
            Primitive::Int16  => "int16",
            Primitive::Int32  => "int32",
            Primitive::Int64  => "int64",
            Primitive::String => "string",
            Primitive::Bool   => "bool",
            Primitive::Double => "double",
            Primitive::Array  => "array",
            Primitive::Unspec => "unspec",
        }
    }

    /// Opaque types are passed through as raw attribute buffers.
    pub fn is_opaque(self) -> bool {
        matches!(self, Primitive::Array | Primitive::Unspec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum TypeRef {
    Primitive(Primitive),
    Named(String),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(p) => f.write_str(p.keyword()),
            TypeRef::Named(name)  => f.write_str(name),
        }
    }
}

/// Parameter list of a method. The two forms are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Params {
    None,
    Direct { params: Vec<FieldDef> },
    Shared {
        type_name: String,
        line:      usize,
        column:    usize,
    },
}

impl Params {
    pub fn is_empty(&self) -> bool {
        matches!(self, Params::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDef {
    pub name:           String,
    pub line:           usize,
    pub column:         usize,
    pub params:         Params,
    pub annotations:    Vec<Annotation>,
    pub custom_handler: Option<String>,
}

impl MethodDef {
    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub name:   String,
    pub line:   usize,
    pub column: usize,
    pub value:  AnnotationValue,
}

/// Annotation literal, folded once at parse time. Hex and decimal both land in `Int`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Str(String),
    Int(i64),
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Str(s) => f.write_str(s),
            AnnotationValue::Int(n) => write!(f, "{}", n),
        }
    }
}
