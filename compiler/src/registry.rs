use std::collections::{HashMap, HashSet};

use crate::{
    error::IdlError,
    naming::{effective_method_name, is_c_identifier, member_name, HAS_FIELDS_MEMBER},
    types::{AnnotationValue, Document, FieldDef, ObjectDef, Params, Primitive, TypeDef, TypeRef},
    utils::{name_error, quote},
};

/// A type definition together with the object that owns it (`None` for global types).
#[derive(Debug, Clone, Copy)]
pub struct ResolvedType<'a> {
    pub def:   &'a TypeDef,
    pub owner: Option<&'a str>,
}

impl<'a> ResolvedType<'a> {
    pub fn is_global(&self) -> bool {
        self.owner.is_none()
    }
}

/// Index of every named type in a document, keyed by scope.
///
/// Built once per document and read-only afterwards. It borrows the document
/// and cannot outlive it.
#[derive(Debug)]
pub struct TypeRegistry<'a> {
    globals: HashMap<&'a str, &'a TypeDef>,
    scoped:  HashMap<&'a str, HashMap<&'a str, &'a TypeDef>>,
}

impl<'a> TypeRegistry<'a> {
    /// Indexes `document` and validates every name it contains.
    pub fn build(document: &'a Document) -> Result<Self, IdlError> {
        let mut globals = HashMap::new();
        for def in &document.global_types {
            if globals.insert(def.name.as_str(), def).is_some() {
                return Err(name_error(
                    format!("The type {} is defined twice in the global scope", quote(&def.name)),
                    def.line,
                    def.column,
                ));
            }
        }

        let mut scoped = HashMap::new();
        let mut object_names = HashSet::new();
        for object in &document.objects {
            if !object_names.insert(object.name.to_lowercase()) {
                return Err(name_error(
                    format!("The object {} is defined twice", quote(&object.name)),
                    object.line,
                    object.column,
                ));
            }

            let mut types = HashMap::new();
            for def in &object.types {
                if types.insert(def.name.as_str(), def).is_some() {
                    return Err(name_error(
                        format!(
                            "The type {} is defined twice in object {}",
                            quote(&def.name),
                            quote(&object.name)
                        ),
                        def.line,
                        def.column,
                    ));
                }
            }
            scoped.insert(object.name.as_str(), types);
        }

        let registry = TypeRegistry { globals, scoped };
        registry.verify(document)?;
        Ok(registry)
    }

    pub fn global(&self, name: &str) -> Option<ResolvedType<'a>> {
        self.globals.get(name).map(|def| ResolvedType { def: *def, owner: None })
    }

    pub fn object_type(&self, object: &str, name: &str) -> Option<ResolvedType<'a>> {
        let (owner, types) = self.scoped.get_key_value(object)?;
        types.get(name).map(|def| ResolvedType { def: *def, owner: Some(*owner) })
    }

    /// Looks `name` up from inside `scope`: the object's own types first, then
    /// the global ones. Global definitions (`scope == None`) only see globals.
    pub fn resolve(&self, scope: Option<&str>, name: &str) -> Option<ResolvedType<'a>> {
        scope
            .and_then(|object| self.object_type(object, name))
            .or_else(|| self.global(name))
    }

    pub fn is_global(&self, scope: Option<&str>, name: &str) -> Option<bool> {
        self.resolve(scope, name).map(|resolved| resolved.is_global())
    }

    fn verify(&self, document: &Document) -> Result<(), IdlError> {
        for def in &document.global_types {
            self.verify_fields(None, &def.fields, &def.name)?;
        }

        for object in &document.objects {
            for def in &object.types {
                self.verify_fields(Some(object.name.as_str()), &def.fields, &def.name)?;
            }
            self.verify_methods(object)?;
        }

        Ok(())
    }

    fn verify_methods(&self, object: &ObjectDef) -> Result<(), IdlError> {
        let mut method_names = HashSet::new();
        for method in &object.methods {
            if let Some(annotation) = method.annotation("name") {
                let valid = match &annotation.value {
                    AnnotationValue::Str(name) => is_c_identifier(name),
                    AnnotationValue::Int(_) => false,
                };
                if !valid {
                    return Err(IdlError::InvalidAnnotation {
                        msg: format!(
                            "Annotation \"name\" on method {} must be an identifier, found {}",
                            quote(&method.name),
                            quote(&annotation.value.to_string())
                        ),
                        line:   annotation.line,
                        column: annotation.column,
                    });
                }
            }

            let name = effective_method_name(method);
            if !method_names.insert(name.clone()) {
                return Err(name_error(
                    format!(
                        "The method {} is defined twice in object {}",
                        quote(&name),
                        quote(&object.name)
                    ),
                    method.line,
                    method.column,
                ));
            }

            match &method.params {
                Params::None => {}
                Params::Direct { params } => {
                    self.verify_fields(Some(object.name.as_str()), params, &method.name)?;
                }
                Params::Shared { type_name, line, column } => {
                    if Primitive::from_keyword(type_name).is_some() {
                        return Err(name_error(
                            format!(
                                "Method {} must name a declared type, not the primitive {}",
                                quote(&method.name),
                                quote(type_name)
                            ),
                            *line,
                            *column,
                        ));
                    }
                    if self.resolve(Some(object.name.as_str()), type_name).is_none() {
                        return Err(name_error(
                            format!(
                                "The type {} used by method {} is not defined",
                                quote(type_name),
                                quote(&method.name)
                            ),
                            *line,
                            *column,
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn verify_fields(
        &self,
        scope: Option<&str>,
        fields: &[FieldDef],
        owner: &str,
    ) -> Result<(), IdlError> {
        let has_mask = fields.iter().any(|field| field.optional);
        let mut enum_names = HashSet::new();
        let mut members = HashSet::new();
        for field in fields {
            // Enum members are upper-cased, so `id` and `ID` would collide.
            // Keyword escaping can map `default` and `default_` to one member.
            let member = member_name(&field.name);
            if !enum_names.insert(field.name.to_uppercase()) || !members.insert(member.clone()) {
                return Err(name_error(
                    format!("The field {} is declared twice in {}", quote(&field.name), quote(owner)),
                    field.line,
                    field.column,
                ));
            }
            if has_mask && member == HAS_FIELDS_MEMBER {
                return Err(name_error(
                    format!(
                        "The field {} in {} clashes with the optional-field mask",
                        quote(&field.name),
                        quote(owner)
                    ),
                    field.line,
                    field.column,
                ));
            }
            if let TypeRef::Named(ty) = &field.type_ {
                if self.resolve(scope, ty).is_none() {
                    return Err(name_error(
                        format!(
                            "The type {} is not defined for field {}",
                            quote(ty),
                            quote(&field.name)
                        ),
                        field.line,
                        field.column,
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parse;

    fn name_error_message(source: &str) -> String {
        let document = parse(source).unwrap();
        match TypeRegistry::build(&document).unwrap_err() {
            IdlError::NameResolution { msg, .. } => msg,
            other => panic!("expected a NameResolution error but got {:?}", other),
        }
    }

    #[test]
    fn same_name_in_different_scopes_is_allowed() {
        let document = parse(
            "info: { id: int32 }
             object a { info: { name: string } get(info) }
             object b { get(info) }",
        )
        .unwrap();
        let registry = TypeRegistry::build(&document).unwrap();

        let in_a = registry.resolve(Some("a"), "info").unwrap();
        assert_eq!(in_a.owner, Some("a"));
        assert_eq!(in_a.def.fields[0].name, "name");

        let in_b = registry.resolve(Some("b"), "info").unwrap();
        assert!(in_b.is_global());
        assert_eq!(registry.is_global(None, "info"), Some(true));
        assert_eq!(registry.is_global(Some("a"), "info"), Some(false));
    }

    #[test]
    fn other_objects_types_are_not_visible() {
        let msg = name_error_message(
            "object a { secret: { x: int8 } }
             object b { peek(secret) }",
        );
        assert!(msg.contains("\"secret\""), "{}", msg);
    }

    #[test]
    fn duplicate_type_in_one_scope_is_rejected() {
        let msg = name_error_message("object a { t: { x: int8 } t: { y: int8 } }");
        assert!(msg.contains("defined twice in object \"a\""), "{}", msg);

        let msg = name_error_message("t: { x: int8 } t: { y: int8 }");
        assert!(msg.contains("global scope"), "{}", msg);
    }

    #[test]
    fn duplicate_object_is_rejected() {
        let msg = name_error_message("object demo { } object Demo { }");
        assert!(msg.contains("object \"Demo\""), "{}", msg);
    }

    #[test]
    fn undeclared_field_type_is_rejected() {
        let msg = name_error_message("object a { t: { x: missing } }");
        assert!(msg.contains("\"missing\" is not defined for field \"x\""), "{}", msg);
    }

    #[test]
    fn undeclared_direct_param_type_is_rejected() {
        let msg = name_error_message("object a { call(x: nowhere) }");
        assert!(msg.contains("\"nowhere\""), "{}", msg);
    }

    #[test]
    fn shared_param_must_name_a_type() {
        let msg = name_error_message("object a { call(int32) }");
        assert!(msg.contains("primitive \"int32\""), "{}", msg);

        let msg = name_error_message("object a { call(ghost) }");
        assert!(msg.contains("\"ghost\" used by method \"call\""), "{}", msg);
    }

    #[test]
    fn case_insensitive_field_collision_is_rejected() {
        let msg = name_error_message("object a { t: { id: int8, ID: int16 } }");
        assert!(msg.contains("\"ID\" is declared twice"), "{}", msg);
    }

    #[test]
    fn escaped_keyword_field_collision_is_rejected() {
        let msg = name_error_message("object o { t: { default: int32, default_: int8 } }");
        assert!(msg.contains("\"default_\" is declared twice"), "{}", msg);
    }

    #[test]
    fn mask_member_name_is_reserved_with_optional_fields() {
        let msg = name_error_message("object o { t: { has_fields: int32, x?: int8 } }");
        assert!(msg.contains("optional-field mask"), "{}", msg);

        let msg = name_error_message("object o { call(has_fields: int32, x?: int8) }");
        assert!(msg.contains("\"has_fields\""), "{}", msg);

        let document = parse("object o { t: { has_fields: int32 } }").unwrap();
        assert!(TypeRegistry::build(&document).is_ok());
    }

    #[test]
    fn name_annotation_must_be_an_identifier() {
        for source in [
            r#"object o { @name("get status") m(a: int8) }"#,
            r#"object o { @name("say\"hi") m() }"#,
            r#"object o { @name(42) m() }"#,
        ] {
            let document = parse(source).unwrap();
            let err = TypeRegistry::build(&document).unwrap_err();
            assert!(matches!(err, IdlError::InvalidAnnotation { .. }), "{}: {:?}", source, err);
        }
    }

    #[test]
    fn duplicate_effective_method_name_is_rejected() {
        let msg = name_error_message(r#"object a { ping() @name("ping") pong() }"#);
        assert!(msg.contains("method \"ping\" is defined twice"), "{}", msg);
    }
}
