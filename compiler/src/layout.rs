//! Resolved, emission-ready view of one object.
//!
//! Lowers the AST of an object into the records it compiles (struct + enum +
//! policy + codec functions) and the entries of its dispatch table. All names
//! come from `naming`, all type lookups from the `TypeRegistry`.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::{
    error::IdlError,
    naming::{effective_method_name, handler_name, member_name, RecordName},
    registry::TypeRegistry,
    types::{AnnotationValue, FieldDef, MethodDef, ObjectDef, Params, Primitive, TypeDef, TypeRef},
    utils::{name_error, quote},
};

/// Width of the `has_fields` mask.
pub const HAS_FIELDS_BITS: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum SlotKind {
    Scalar(Primitive),
    Opaque(Primitive),
    /// A field whose type is another record; carried on the wire as a table.
    Nested { struct_name: String },
}

/// One field of a record, at a fixed enum ordinal.
#[derive(Debug, Clone)]
pub struct Slot<'a> {
    pub field:       &'a FieldDef,
    pub kind:        SlotKind,
    pub ordinal:     usize,
    pub enum_member: String,
    pub has_macro:   Option<String>,
}

impl<'a> Slot<'a> {
    pub fn wire_name(&self) -> &'a str {
        &self.field.name
    }

    pub fn member(&self) -> String {
        member_name(&self.field.name)
    }

    pub fn is_optional(&self) -> bool {
        self.field.optional
    }

    /// Presence bit of an optional field: its enum ordinal, not an optional-only index.
    pub fn mask(&self) -> Option<u32> {
        if self.is_optional() {
            Some(1u32 << self.ordinal)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub names: RecordName,
    pub slots: Vec<Slot<'a>>,
    origin:    Origin<'a>,
}

/// Definition a record was compiled from.
#[derive(Debug, Clone, Copy)]
enum Origin<'a> {
    Type(&'a TypeDef),
    Method(&'a MethodDef),
}

impl<'a> Origin<'a> {
    fn same(self, other: Origin<'_>) -> bool {
        match (self, other) {
            (Origin::Type(a), Origin::Type(b)) => std::ptr::eq(a, b),
            (Origin::Method(a), Origin::Method(b)) => std::ptr::eq(a, b),
            _ => false,
        }
    }

    fn location(self) -> (usize, usize) {
        match self {
            Origin::Type(def) => (def.line, def.column),
            Origin::Method(method) => (method.line, method.column),
        }
    }
}

impl<'a> Record<'a> {
    pub fn has_optional(&self) -> bool {
        self.slots.iter().any(|s| s.is_optional())
    }

    pub fn required(&self) -> impl Iterator<Item = &Slot<'a>> {
        self.slots.iter().filter(|s| !s.is_optional())
    }

    pub fn optional(&self) -> impl Iterator<Item = &Slot<'a>> {
        self.slots.iter().filter(|s| s.is_optional())
    }

    /// Serialize needs a status variable for required opaque fields.
    pub fn needs_ret(&self) -> bool {
        self.required().any(|s| matches!(s.kind, SlotKind::Opaque(_)))
    }
}

/// Shape of a dispatch-table entry, chosen from the `mask`/`tag` annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Plain,
    Tag(i64),
    Mask(i64),
    MaskAndTag { mask: i64, tag: i64 },
}

impl Dispatch {
    fn from_values(mask: i64, tag: i64) -> Self {
        match (mask > 0, tag > 0) {
            (true, true)   => Dispatch::MaskAndTag { mask, tag },
            (false, true)  => Dispatch::Tag(tag),
            (true, false)  => Dispatch::Mask(mask),
            (false, false) => Dispatch::Plain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodEntry<'a> {
    pub method:    &'a MethodDef,
    pub wire_name: String,
    pub handler:   String,
    /// Record whose policy validates the request, if the method takes parameters.
    pub params:    Option<RecordName>,
    pub dispatch:  Dispatch,
}

#[derive(Debug, Clone)]
pub struct ObjectLayout<'a> {
    pub object:  &'a ObjectDef,
    /// Used global types, then object types, then direct-parameter records.
    pub records: Vec<Record<'a>>,
    pub methods: Vec<MethodEntry<'a>>,
}

impl<'a> ObjectLayout<'a> {
    pub fn custom_handlers(&self) -> impl Iterator<Item = &MethodEntry<'a>> {
        self.methods.iter().filter(|m| m.method.custom_handler.is_some())
    }
}

pub fn lay_out_object<'a>(
    registry: &TypeRegistry<'a>,
    object: &'a ObjectDef,
) -> Result<ObjectLayout<'a>, IdlError> {
    let scope = Some(object.name.as_str());
    let mut records = RecordSet::default();

    for def in used_global_types(registry, object) {
        let names = RecordName::for_type(None, &def.name);
        records.push(lay_out_record(registry, None, names, &def.fields, Origin::Type(def))?)?;
    }

    for def in &object.types {
        let names = RecordName::for_type(scope, &def.name);
        records.push(lay_out_record(registry, scope, names, &def.fields, Origin::Type(def))?)?;
    }

    let mut methods = Vec::with_capacity(object.methods.len());
    let mut handlers = HashSet::new();
    for method in &object.methods {
        let wire_name = effective_method_name(method);
        let params = match &method.params {
            Params::None => None,
            Params::Direct { params } => {
                let names = RecordName::for_method_params(&object.name, &wire_name);
                let record = lay_out_record(registry, scope, names.clone(), params, Origin::Method(method))?;
                records.push(record)?;
                Some(names)
            }
            Params::Shared { type_name, line, column } => {
                let resolved = registry.resolve(scope, type_name).ok_or_else(|| {
                    name_error(format!("The type {} is not defined", quote(type_name)), *line, *column)
                })?;
                Some(RecordName::for_type(resolved.owner, &resolved.def.name))
            }
        };

        let handler = handler_name(&object.name, method);
        if !handlers.insert(handler.clone()) {
            return Err(name_error(
                format!(
                    "Method {} resolves to handler {}, which is already in use",
                    quote(&method.name),
                    quote(&handler)
                ),
                method.line,
                method.column,
            ));
        }

        methods.push(MethodEntry {
            method,
            wire_name,
            handler,
            params,
            dispatch: dispatch_for(method)?,
        });
    }

    Ok(ObjectLayout {
        object,
        records: records.records,
        methods,
    })
}

fn lay_out_record<'a>(
    registry: &TypeRegistry<'a>,
    scope: Option<&str>,
    names: RecordName,
    fields: &'a [FieldDef],
    origin: Origin<'a>,
) -> Result<Record<'a>, IdlError> {
    let mut slots = Vec::with_capacity(fields.len());
    for (ordinal, field) in fields.iter().enumerate() {
        let kind = match &field.type_ {
            TypeRef::Primitive(p) if p.is_opaque() => SlotKind::Opaque(*p),
            TypeRef::Primitive(p) => SlotKind::Scalar(*p),
            TypeRef::Named(ty) => {
                let resolved = registry.resolve(scope, ty).ok_or_else(|| {
                    name_error(
                        format!("The type {} is not defined for field {}", quote(ty), quote(&field.name)),
                        field.line,
                        field.column,
                    )
                })?;
                SlotKind::Nested {
                    struct_name: RecordName::for_type(resolved.owner, &resolved.def.name)
                        .struct_name()
                        .to_string(),
                }
            }
        };

        if field.optional && ordinal >= HAS_FIELDS_BITS {
            return Err(IdlError::Layout {
                msg: format!(
                    "Optional field {} sits at position {}, beyond the {}-bit has_fields mask",
                    quote(&field.name),
                    ordinal,
                    HAS_FIELDS_BITS
                ),
                line:   field.line,
                column: field.column,
            });
        }

        slots.push(Slot {
            field,
            kind,
            ordinal,
            enum_member: names.enum_member(&field.name),
            has_macro: field.optional.then(|| names.has_macro(&field.name)),
        });
    }

    trace!(record = names.struct_name(), fields = slots.len(), "laid out record");
    Ok(Record { names, slots, origin })
}

/// Records keyed by prefix. Re-adding the same definition is a no-op; two
/// different definitions that land on one C name are an error.
#[derive(Default)]
struct RecordSet<'a> {
    records:  Vec<Record<'a>>,
    prefixes: HashMap<String, Origin<'a>>,
    structs:  HashSet<String>,
    enums:    HashSet<String>,
}

impl<'a> RecordSet<'a> {
    fn push(&mut self, record: Record<'a>) -> Result<(), IdlError> {
        let prefix = record.names.prefix().to_string();
        if let Some(origin) = self.prefixes.get(&prefix) {
            if origin.same(record.origin) {
                return Ok(());
            }
            return Err(collision(&record, &prefix));
        }
        if !self.structs.insert(record.names.struct_name().to_string()) {
            return Err(collision(&record, record.names.struct_name()));
        }
        if !self.enums.insert(record.names.upper()) {
            return Err(collision(&record, &record.names.upper()));
        }
        self.prefixes.insert(prefix, record.origin);
        self.records.push(record);
        Ok(())
    }
}

fn collision(record: &Record<'_>, name: &str) -> IdlError {
    let (line, column) = record.origin.location();
    name_error(
        format!(
            "The record {} resolves to the C name {}, which is already in use",
            quote(record.names.struct_name()),
            quote(name)
        ),
        line,
        column,
    )
}

/// Global types reachable from the object's types and methods, in declaration order.
fn used_global_types<'a>(registry: &TypeRegistry<'a>, object: &'a ObjectDef) -> Vec<&'a TypeDef> {
    let scope = Some(object.name.as_str());
    let mut pending: Vec<&str> = Vec::new();

    for def in &object.types {
        pending.extend(named_refs(&def.fields));
    }
    for method in &object.methods {
        match &method.params {
            Params::None => {}
            Params::Direct { params } => pending.extend(named_refs(params)),
            Params::Shared { type_name, .. } => pending.push(type_name.as_str()),
        }
    }

    // Object-level references may be shadowed by the object's own types.
    let mut found: Vec<&'a TypeDef> = Vec::new();
    let mut queue: Vec<&'a TypeDef> = pending
        .into_iter()
        .filter_map(|name| registry.resolve(scope, name))
        .filter(|resolved| resolved.is_global())
        .map(|resolved| resolved.def)
        .collect();

    while let Some(def) = queue.pop() {
        if found.iter().any(|seen| std::ptr::eq(*seen, def)) {
            continue;
        }
        found.push(def);
        queue.extend(
            named_refs(&def.fields)
                .filter_map(|name| registry.global(name))
                .map(|resolved| resolved.def),
        );
    }

    found.sort_by_key(|def| (def.line, def.column));
    found
}

fn named_refs(fields: &[FieldDef]) -> impl Iterator<Item = &str> {
    fields.iter().filter_map(|field| match &field.type_ {
        TypeRef::Named(name) => Some(name.as_str()),
        TypeRef::Primitive(_) => None,
    })
}

fn dispatch_for(method: &MethodDef) -> Result<Dispatch, IdlError> {
    let mut mask = 0;
    let mut tag = 0;
    for annotation in &method.annotations {
        let slot = match annotation.name.as_str() {
            "mask" => &mut mask,
            "tag" => &mut tag,
            _ => continue,
        };
        *slot = match &annotation.value {
            AnnotationValue::Int(value) => *value,
            AnnotationValue::Str(text) => parse_integer(text).ok_or_else(|| IdlError::InvalidAnnotation {
                msg: format!(
                    "Annotation {} on method {} expects an integer, found {}",
                    quote(&annotation.name),
                    quote(&method.name),
                    quote(text)
                ),
                line:   annotation.line,
                column: annotation.column,
            })?,
        };
    }
    Ok(Dispatch::from_values(mask, tag))
}

fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => i64::from_str_radix(digits, 16).ok(),
        None => text.parse().ok(),
    }
}
