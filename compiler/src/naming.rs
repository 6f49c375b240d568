//! Identifier derivation shared by every emission step.
//!
//! Everything here is a pure function of the owning object's name and the raw
//! declared name, so the header and the source file always agree on a prefix.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::MethodDef;

lazy_static! {
    static ref C_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Struct member appended to every record with optional fields.
pub const HAS_FIELDS_MEMBER: &str = "has_fields";

/// C11 keywords that cannot be used as struct member names.
const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "bool", "_Bool", "_Complex", "_Imaginary",
    "_Alignas", "_Alignof", "_Atomic", "_Generic", "_Noreturn", "_Static_assert",
    "_Thread_local",
];

/// `demo` for object `Demo`.
pub fn object_prefix(object: &str) -> String {
    object.to_lowercase()
}

/// Global types keep their own name; object types become `{object}_{type}`.
pub fn type_prefix(owner: Option<&str>, type_name: &str) -> String {
    match owner {
        Some(object) => format!("{}_{}", object_prefix(object), type_name),
        None => type_name.to_string(),
    }
}

/// The declared method name, unless a `@name(...)` annotation overrides it.
pub fn effective_method_name(method: &MethodDef) -> String {
    match method.annotation("name") {
        Some(annotation) => annotation.value.to_string(),
        None => method.name.clone(),
    }
}

/// Prefixes `name` with the object prefix unless it already carries it.
pub fn scoped_name(object: &str, name: &str) -> String {
    let prefix = format!("{}_", object_prefix(object));
    if name.starts_with(&prefix) {
        name.to_string()
    } else {
        format!("{}{}", prefix, name)
    }
}

/// Prefix for the parameter record of a method with direct parameters.
pub fn method_prefix(object: &str, method_name: &str) -> String {
    scoped_name(object, method_name)
}

pub fn handler_name(object: &str, method: &MethodDef) -> String {
    match &method.custom_handler {
        Some(handler) => handler.clone(),
        None => format!("{}_handler", scoped_name(object, &effective_method_name(method))),
    }
}

/// Author-supplied implementation called by a custom handler.
pub fn handler_impl_name(handler: &str) -> String {
    format!("{}_impl", handler)
}

pub fn header_file_name(object: &str) -> String {
    format!("{}_object.h", object_prefix(object))
}

pub fn source_file_name(object: &str) -> String {
    format!("{}_object.c", object_prefix(object))
}

pub fn header_guard(object: &str) -> String {
    format!("__{}_OBJECT_H__", object.to_uppercase())
}

pub fn methods_array_name(object: &str) -> String {
    format!("{}_methods", object_prefix(object))
}

pub fn object_type_name(object: &str) -> String {
    format!("{}_object_type", object_prefix(object))
}

pub fn object_var_name(object: &str) -> String {
    format!("{}_object", object_prefix(object))
}

/// Whether `name` can be spliced into C identifiers as-is.
pub fn is_c_identifier(name: &str) -> bool {
    C_IDENTIFIER.is_match(name)
}

/// Struct member name for a field; C keywords get a trailing underscore.
pub fn member_name(field: &str) -> String {
    if C_KEYWORDS.contains(&field) {
        format!("{}_", field)
    } else {
        field.to_string()
    }
}

/// Every identifier derived from one compiled record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordName {
    prefix:      String,
    struct_name: String,
}

impl RecordName {
    pub fn for_type(owner: Option<&str>, type_name: &str) -> Self {
        let prefix = type_prefix(owner, type_name);
        RecordName {
            struct_name: prefix.clone(),
            prefix,
        }
    }

    pub fn for_method_params(object: &str, method_name: &str) -> Self {
        let prefix = method_prefix(object, method_name);
        RecordName {
            struct_name: format!("{}_params", prefix),
            prefix,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn struct_name(&self) -> &str {
        &self.struct_name
    }

    pub fn upper(&self) -> String {
        self.prefix.to_uppercase()
    }

    pub fn enum_member(&self, field: &str) -> String {
        format!("{}_{}", self.upper(), field.to_uppercase())
    }

    pub fn enum_max(&self) -> String {
        format!("__{}_MAX", self.upper())
    }

    pub fn has_macro(&self, field: &str) -> String {
        format!("{}_HAS_{}", self.upper(), field.to_uppercase())
    }

    pub fn policy_name(&self) -> String {
        format!("{}_policy", self.prefix)
    }

    pub fn table_name(&self) -> String {
        format!("tb_{}", self.prefix)
    }

    pub fn deserialize_fn(&self) -> String {
        format!("{}_deserialize", self.prefix)
    }

    pub fn serialize_fn(&self) -> String {
        format!("{}_serialize", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Annotation, AnnotationValue, Params};

    fn method(name: &str, rename: Option<&str>, handler: Option<&str>) -> MethodDef {
        MethodDef {
            name:           name.to_string(),
            line:           1,
            column:         1,
            params:         Params::None,
            annotations:    rename
                .map(|n| vec![Annotation {
                    name:   "name".to_string(),
                    line:   1,
                    column: 1,
                    value:  AnnotationValue::Str(n.to_string()),
                }])
                .unwrap_or_default(),
            custom_handler: handler.map(str::to_string),
        }
    }

    #[test]
    fn global_type_prefix_is_unmangled() {
        let names = RecordName::for_type(None, "hello_common");
        assert_eq!(names.prefix(), "hello_common");
        assert_eq!(names.struct_name(), "hello_common");
        assert_eq!(names.deserialize_fn(), "hello_common_deserialize");
    }

    #[test]
    fn object_type_prefix_uses_lowercased_object() {
        let names = RecordName::for_type(Some("Demo"), "status");
        assert_eq!(names.struct_name(), "demo_status");
        assert_eq!(names.enum_member("code"), "DEMO_STATUS_CODE");
        assert_eq!(names.enum_max(), "__DEMO_STATUS_MAX");
        assert_eq!(names.has_macro("msg"), "DEMO_STATUS_HAS_MSG");
        assert_eq!(names.policy_name(), "demo_status_policy");
        assert_eq!(names.table_name(), "tb_demo_status");
    }

    #[test]
    fn method_params_prefix_is_idempotent() {
        let plain = RecordName::for_method_params("demo", "hello");
        assert_eq!(plain.prefix(), "demo_hello");
        assert_eq!(plain.struct_name(), "demo_hello_params");

        let prefixed = RecordName::for_method_params("wifi", "wifi_scan");
        assert_eq!(prefixed.prefix(), "wifi_scan");
        assert_eq!(prefixed.struct_name(), "wifi_scan_params");
        assert_eq!(prefixed.serialize_fn(), "wifi_scan_serialize");
    }

    #[test]
    fn name_annotation_overrides_method_name() {
        let m = method("scan", Some("wifi_scan"), None);
        assert_eq!(effective_method_name(&m), "wifi_scan");
        assert_eq!(handler_name("wifi", &m), "wifi_scan_handler");

        let plain = method("hello", None, None);
        assert_eq!(handler_name("Demo", &plain), "demo_hello_handler");
    }

    #[test]
    fn custom_handler_replaces_generated_name() {
        let m = method("hello3", None, Some("handler1"));
        assert_eq!(handler_name("simple_test", &m), "handler1");
        assert_eq!(handler_impl_name("handler1"), "handler1_impl");
    }

    #[test]
    fn file_names_and_guard() {
        assert_eq!(header_file_name("Demo"), "demo_object.h");
        assert_eq!(source_file_name("Demo"), "demo_object.c");
        assert_eq!(header_guard("Demo"), "__DEMO_OBJECT_H__");
        assert_eq!(object_var_name("Demo"), "demo_object");
    }

    #[test]
    fn identifier_check() {
        assert!(is_c_identifier("wifi_scan"));
        assert!(is_c_identifier("_x9"));
        assert!(!is_c_identifier("get status"));
        assert!(!is_c_identifier("9lives"));
        assert!(!is_c_identifier("say\\\"hi"));
        assert!(!is_c_identifier(""));
    }

    #[test]
    fn member_names_escape_c_keywords() {
        assert_eq!(member_name("default"), "default_");
        assert_eq!(member_name("id"), "id");
    }
}
