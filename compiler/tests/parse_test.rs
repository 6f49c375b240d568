use indoc::indoc;
use serde_json::json;
use ubus_idl_compiler::{
    parse,
    types::{AnnotationValue, Params, Primitive, TypeRef},
    IdlError,
};

#[test]
fn parses_objects_types_and_methods() {
    let document = parse(indoc! {r#"
        // shared between objects
        common: { id: int32, note?: string }

        object demo {
            status: {
                code: int32
                msg?: string
            }

            hello(id: int32, name?: string)
            lookup(common)
            ping()
        }
    "#})
    .unwrap();

    assert_eq!(document.global_types.len(), 1);
    assert_eq!(document.global_types[0].name, "common");
    assert_eq!(document.global_types[0].line, 2);

    let demo = &document.objects[0];
    assert_eq!(demo.name, "demo");
    assert_eq!(demo.types[0].name, "status");
    assert!(!demo.types[0].fields[0].optional);
    assert!(demo.types[0].fields[1].optional);
    assert_eq!(demo.types[0].fields[1].type_, TypeRef::Primitive(Primitive::String));

    let names: Vec<_> = demo.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["hello", "lookup", "ping"]);

    match &demo.methods[0].params {
        Params::Direct { params } => {
            assert_eq!(params.len(), 2);
            assert_eq!(params[1].name, "name");
            assert!(params[1].optional);
        }
        other => panic!("expected direct params but got {:?}", other),
    }
    match &demo.methods[1].params {
        Params::Shared { type_name, .. } => assert_eq!(type_name, "common"),
        other => panic!("expected a shared type but got {:?}", other),
    }
    assert!(demo.methods[2].params.is_empty());
}

#[test]
fn folds_annotation_literals() {
    let document = parse(indoc! {r#"
        object sys {
            @mask(0x3) @tag(5) reboot()
            @name("sys_info") info()
            @tag(-1) odd()
        }
    "#})
    .unwrap();

    let methods = &document.objects[0].methods;
    assert_eq!(methods[0].annotation("mask").unwrap().value, AnnotationValue::Int(3));
    assert_eq!(methods[0].annotation("tag").unwrap().value, AnnotationValue::Int(5));
    assert_eq!(
        methods[1].annotation("name").unwrap().value,
        AnnotationValue::Str("sys_info".to_string())
    );
    assert_eq!(methods[2].annotation("tag").unwrap().value, AnnotationValue::Int(-1));
}

#[test]
fn accepts_both_custom_handler_forms() {
    let document = parse(indoc! {"
        object simple_test {
            hello1(id: int32) -> handler1
            hello2() : handler2
            hello3()
        }
    "})
    .unwrap();

    let handlers: Vec<_> = document.objects[0]
        .methods
        .iter()
        .map(|m| m.custom_handler.as_deref())
        .collect();
    assert_eq!(handlers, vec![Some("handler1"), Some("handler2"), None]);
}

#[test]
fn named_field_types_stay_unresolved_in_the_ast() {
    let document = parse("object geo { spot: { at: point } }").unwrap();
    assert_eq!(
        document.objects[0].types[0].fields[0].type_,
        TypeRef::Named("point".to_string())
    );
}

#[test]
fn reports_syntax_error_location() {
    let err = parse("object demo {\n  status: { code int32 }\n}").unwrap_err();
    match &err {
        IdlError::SyntaxError { msg, line, column } => {
            assert_eq!((*line, *column), (2, 18));
            assert!(msg.contains("\"int32\""), "{}", msg);
        }
        other => panic!("expected a SyntaxError but got {:?}", other),
    }
    assert_eq!(err.location(), Some((2, 18)));
    assert!(err.to_string().starts_with("Syntax error at line 2, column 18"));
}

#[test]
fn reports_unterminated_object() {
    let err = parse("object demo { ping()").unwrap_err();
    match err {
        IdlError::SyntaxError { msg, .. } => assert!(msg.contains("end of input"), "{}", msg),
        other => panic!("expected a SyntaxError but got {:?}", other),
    }
}

#[test]
fn rejects_mixed_parameter_forms() {
    let err = parse("object a { call(x: int32, common) }").unwrap_err();
    assert!(matches!(err, IdlError::NameResolution { .. }), "{:?}", err);

    let err = parse("object a { call(common, x: int32) }").unwrap_err();
    assert!(matches!(err, IdlError::NameResolution { .. }), "{:?}", err);
}

#[test]
fn rejects_out_of_range_annotation_integer() {
    let err = parse("object a { @mask(99999999999999999999) m() }").unwrap_err();
    match err {
        IdlError::SyntaxError { msg, .. } => assert!(msg.contains("Invalid integer"), "{}", msg),
        other => panic!("expected a SyntaxError but got {:?}", other),
    }
}

#[test]
fn serializes_document_as_json() {
    let document = parse(r#"object a { @tag(2) get(id?: int8, who: peer) }"#).unwrap();
    let value = serde_json::to_value(&document).unwrap();
    let method = &value["objects"][0]["methods"][0];

    assert_eq!(method["name"], json!("get"));
    assert_eq!(method["annotations"][0]["value"], json!(2));
    assert_eq!(method["params"]["kind"], json!("direct"));
    assert_eq!(
        method["params"]["params"][0]["type_"],
        json!({ "kind": "primitive", "name": "int8" })
    );
    assert_eq!(
        method["params"]["params"][1]["type_"],
        json!({ "kind": "named", "name": "peer" })
    );
}
