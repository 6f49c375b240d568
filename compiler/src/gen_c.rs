//! C code emission for one laid-out object.
//!
//! Produces the declaration unit (`{object}_object.h`) and the definition unit
//! (`{object}_object.c`) against the libubus / libubox blobmsg API.

use tracing::debug;

use crate::{
    emitter::CEmitter,
    layout::{Dispatch, MethodEntry, ObjectLayout, Record, Slot, SlotKind},
    naming::{
        handler_impl_name, header_file_name, header_guard, methods_array_name,
        object_type_name, object_var_name, source_file_name, HAS_FIELDS_MEMBER,
    },
    types::Primitive,
};

const HANDLER_ARGS: &str = "struct ubus_context *ctx, struct ubus_object *obj, \
                            struct ubus_request_data *req, const char *method, \
                            struct blob_attr *msg";

const HEADER_HELPERS: &[&str] = &[
    "/* Helper macros for optional field operations */",
    "#define UBUS_IDL_HAS_FIELD(params, mask) ((params)->has_fields & (mask))",
    "#define UBUS_IDL_SET_FIELD(params, mask) ((params)->has_fields |= (mask))",
    "#define UBUS_IDL_CLEAR_FIELD(params, mask) ((params)->has_fields &= ~(mask))",
];

const SOURCE_HELPERS: &[&str] = &[
    "/* Helper macros for optional field deserialization */",
    "#define UBUS_IDL_GET_OPTIONAL(type, tb, idx, field, params, mask) \\",
    "    do { \\",
    "        if ((tb)[(idx)]) { \\",
    "            (field) = blobmsg_get_##type((tb)[(idx)]); \\",
    "            UBUS_IDL_SET_FIELD((params), (mask)); \\",
    "        } \\",
    "    } while (0)",
    "",
    "/* Helper macros for optional field serialization */",
    "#define UBUS_IDL_ADD_OPTIONAL(type, b, name, field, params, mask) \\",
    "    do { \\",
    "        if (UBUS_IDL_HAS_FIELD((params), (mask))) { \\",
    "            if (blobmsg_add_##type((b), (name), (field)) < 0) { \\",
    "                return UBUS_STATUS_INVALID_ARGUMENT; \\",
    "            } \\",
    "        } \\",
    "    } while (0)",
    "",
    "/* Helper macros for field serialization with error checking */",
    "#define UBUS_IDL_ADD(type, b, name, val) \\",
    "    do { \\",
    "        if (blobmsg_add_##type((b), (name), (val)) < 0) { \\",
    "            return UBUS_STATUS_INVALID_ARGUMENT; \\",
    "        } \\",
    "    } while (0)",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedObject {
    pub header_name: String,
    pub header:      String,
    pub source_name: String,
    pub source:      String,
}

pub fn generate_object(layout: &ObjectLayout<'_>) -> GeneratedObject {
    let name = &layout.object.name;
    debug!(
        object = name.as_str(),
        records = layout.records.len(),
        methods = layout.methods.len(),
        "emitting object"
    );
    GeneratedObject {
        header_name: header_file_name(name),
        header:      emit_header(layout),
        source_name: source_file_name(name),
        source:      emit_source(layout),
    }
}

// ==================== Declaration unit ====================

fn emit_header(layout: &ObjectLayout<'_>) -> String {
    let object = &layout.object.name;
    let guard = header_guard(object);
    let mut e = CEmitter::new();

    e.line(&format!("/* Generated from ubus IDL - {} */", object));
    e.blank_line();
    e.line(&format!("#ifndef {}", guard));
    e.line(&format!("#define {}", guard));
    e.blank_line();
    e.line("#include <libubus.h>");
    e.line("#include <stdbool.h>");
    e.line("#include <stdint.h>");
    e.blank_line();
    e.raw_lines(HEADER_HELPERS);
    e.blank_line();

    for record in &layout.records {
        emit_struct(&mut e, record);
        e.blank_line();
        emit_enum(&mut e, record);
        e.blank_line();
        if record.has_optional() {
            for slot in record.optional() {
                if let Some(macro_name) = &slot.has_macro {
                    e.line(&format!("#define {} (1U << {})", macro_name, slot.enum_member));
                }
            }
            e.blank_line();
        }
    }

    for entry in &layout.methods {
        e.line(&format!("int {}({});", entry.handler, HANDLER_ARGS));
    }
    for entry in layout.custom_handlers() {
        e.line(&format!("{};", impl_signature(entry)));
    }
    if !layout.methods.is_empty() {
        e.blank_line();
    }

    for record in &layout.records {
        e.line(&format!("{};", deserialize_signature(record)));
        e.line(&format!("{};", serialize_signature(record)));
    }
    if !layout.records.is_empty() {
        e.blank_line();
    }

    e.line(&format!("extern struct ubus_object {};", object_var_name(object)));
    e.blank_line();
    e.line(&format!("#endif /* {} */", guard));
    e.finish()
}

fn emit_struct(e: &mut CEmitter, record: &Record<'_>) {
    e.block(&format!("struct {} {{", record.names.struct_name()), "};", |e| {
        for slot in &record.slots {
            e.line(&member_decl(slot));
        }
        if record.has_optional() {
            e.line(&format!("unsigned int {};", HAS_FIELDS_MEMBER));
        }
    });
}

fn emit_enum(e: &mut CEmitter, record: &Record<'_>) {
    e.block("enum {", "};", |e| {
        let members = record
            .slots
            .iter()
            .map(|slot| slot.enum_member.clone())
            .chain(std::iter::once(record.names.enum_max()));
        e.comma_separated(members);
    });
}

fn member_decl(slot: &Slot<'_>) -> String {
    let c_type = c_type(&slot.kind);
    if c_type.ends_with('*') {
        format!("{}{};", c_type, slot.member())
    } else {
        format!("{} {};", c_type, slot.member())
    }
}

fn impl_signature(entry: &MethodEntry<'_>) -> String {
    let handler = handler_impl_name(&entry.handler);
    match &entry.params {
        Some(names) => format!(
            "int {}(struct ubus_context *ctx, struct ubus_object *obj, \
             struct ubus_request_data *req, const char *method, const struct {} *params)",
            handler,
            names.struct_name()
        ),
        None => format!(
            "int {}(struct ubus_context *ctx, struct ubus_object *obj, \
             struct ubus_request_data *req, const char *method)",
            handler
        ),
    }
}

fn deserialize_signature(record: &Record<'_>) -> String {
    format!(
        "int {}(struct blob_attr *msg, struct {} *params)",
        record.names.deserialize_fn(),
        record.names.struct_name()
    )
}

fn serialize_signature(record: &Record<'_>) -> String {
    format!(
        "int {}(struct blob_buf *b, const struct {} *params)",
        record.names.serialize_fn(),
        record.names.struct_name()
    )
}

// ==================== Definition unit ====================

fn emit_source(layout: &ObjectLayout<'_>) -> String {
    let object = &layout.object.name;
    let mut e = CEmitter::new();

    e.line(&format!("/* Generated from ubus IDL - {} */", object));
    e.blank_line();
    e.line("#include <string.h>");
    e.line("#include <libubox/blobmsg_json.h>");
    e.line("#include <libubus.h>");
    e.line(&format!("#include \"{}\"", header_file_name(object)));
    e.blank_line();
    e.raw_lines(SOURCE_HELPERS);
    e.blank_line();

    for record in &layout.records {
        emit_policy(&mut e, record);
        e.blank_line();
        emit_deserialize(&mut e, record);
        e.blank_line();
        emit_serialize(&mut e, record);
        e.blank_line();
    }

    for entry in layout.custom_handlers() {
        emit_custom_handler(&mut e, entry);
        e.blank_line();
    }

    let methods = methods_array_name(object);
    e.block(&format!("static const struct ubus_method {}[] = {{", methods), "};", |e| {
        e.comma_separated(layout.methods.iter().map(dispatch_entry));
    });
    e.blank_line();

    let object_type = object_type_name(object);
    e.line(&format!("static struct ubus_object_type {} =", object_type));
    e.indent();
    e.line(&format!("UBUS_OBJECT_TYPE(\"{}\", {});", object, methods));
    e.dedent();
    e.blank_line();

    e.block(&format!("struct ubus_object {} = {{", object_var_name(object)), "};", |e| {
        e.line(&format!(".name = \"{}\",", object));
        e.line(&format!(".type = &{},", object_type));
        e.line(&format!(".methods = {},", methods));
        e.line(&format!(".n_methods = ARRAY_SIZE({}),", methods));
    });
    e.finish()
}

fn emit_policy(e: &mut CEmitter, record: &Record<'_>) {
    let open = format!("static const struct blobmsg_policy {}[] = {{", record.names.policy_name());
    e.block(&open, "};", |e| {
        e.comma_separated(record.slots.iter().map(|slot| {
            format!(
                "[{}] = {{ .name = \"{}\", .type = {} }}",
                slot.enum_member,
                slot.wire_name(),
                blob_type(&slot.kind)
            )
        }));
    });
}

fn emit_deserialize(e: &mut CEmitter, record: &Record<'_>) {
    let tb = record.names.table_name();
    let policy = record.names.policy_name();

    e.function(&deserialize_signature(record), |e| {
        if record.slots.is_empty() {
            e.line("(void)msg;");
            e.line("memset(params, 0, sizeof(*params));");
            e.line("return UBUS_STATUS_OK;");
            return;
        }

        e.line(&format!("struct blob_attr *{}[{}];", tb, record.names.enum_max()));
        e.blank_line();
        e.block(
            &format!(
                "if (blobmsg_parse({policy}, ARRAY_SIZE({policy}), {tb}, blob_data(msg), blob_len(msg)) < 0) {{",
                policy = policy,
                tb = tb
            ),
            "}",
            |e| e.line("return UBUS_STATUS_INVALID_ARGUMENT;"),
        );
        e.blank_line();

        let missing: Vec<String> = record
            .required()
            .map(|slot| format!("!{}[{}]", tb, slot.enum_member))
            .collect();
        if !missing.is_empty() {
            e.block(&format!("if ({}) {{", missing.join(" || ")), "}", |e| {
                e.line("return UBUS_STATUS_INVALID_ARGUMENT;");
            });
            e.blank_line();
        }

        e.line("memset(params, 0, sizeof(*params));");
        for slot in record.required() {
            decode_required(e, &tb, slot);
        }
        for slot in record.optional() {
            decode_optional(e, &tb, slot);
        }
        e.line("return UBUS_STATUS_OK;");
    });
}

fn decode_required(e: &mut CEmitter, tb: &str, slot: &Slot<'_>) {
    let attr = format!("{}[{}]", tb, slot.enum_member);
    match &slot.kind {
        SlotKind::Scalar(p) => e.line(&format!(
            "params->{} = blobmsg_get_{}({});",
            slot.member(),
            accessor(*p),
            attr
        )),
        SlotKind::Opaque(_) => e.line(&format!("params->{} = {};", slot.member(), attr)),
        SlotKind::Nested { struct_name } => e.line(&nested_placeholder(struct_name, slot, "decoded")),
    }
}

fn decode_optional(e: &mut CEmitter, tb: &str, slot: &Slot<'_>) {
    let has = slot.has_macro.as_deref().unwrap_or_default();
    match &slot.kind {
        SlotKind::Scalar(p) => e.line(&format!(
            "UBUS_IDL_GET_OPTIONAL({}, {}, {}, params->{}, params, {});",
            accessor(*p),
            tb,
            slot.enum_member,
            slot.member(),
            has
        )),
        SlotKind::Opaque(_) => {
            let attr = format!("{}[{}]", tb, slot.enum_member);
            e.block(&format!("if ({}) {{", attr), "}", |e| {
                e.line(&format!("params->{} = {};", slot.member(), attr));
                e.line(&format!("UBUS_IDL_SET_FIELD(params, {});", has));
            });
        }
        SlotKind::Nested { struct_name } => e.line(&nested_placeholder(struct_name, slot, "decoded")),
    }
}

fn emit_serialize(e: &mut CEmitter, record: &Record<'_>) {
    e.function(&serialize_signature(record), |e| {
        if record.slots.is_empty() {
            e.line("(void)b;");
            e.line("(void)params;");
        }
        if record.needs_ret() {
            e.line("int ret;");
            e.blank_line();
        }
        for slot in &record.slots {
            if slot.is_optional() {
                encode_optional(e, slot);
            } else {
                encode_required(e, slot);
            }
        }
        e.line("return UBUS_STATUS_OK;");
    });
}

fn encode_required(e: &mut CEmitter, slot: &Slot<'_>) {
    let field = format!("params->{}", slot.member());
    match &slot.kind {
        SlotKind::Scalar(p) => e.line(&format!(
            "UBUS_IDL_ADD({}, b, \"{}\", {});",
            accessor(*p),
            slot.wire_name(),
            scalar_value(*p, &field)
        )),
        SlotKind::Opaque(_) => {
            e.line(&format!("if ({}) {{", field));
            e.indent();
            e.line(&format!("ret = {};", add_field_call(slot, &field)));
            e.dedent();
            e.line("} else {");
            e.indent();
            e.line("ret = -1;");
            e.dedent();
            e.line("}");
            e.block("if (ret < 0) {", "}", |e| {
                e.line("return UBUS_STATUS_INVALID_ARGUMENT;");
            });
        }
        SlotKind::Nested { struct_name } => e.line(&nested_placeholder(struct_name, slot, "encoded")),
    }
}

fn encode_optional(e: &mut CEmitter, slot: &Slot<'_>) {
    let field = format!("params->{}", slot.member());
    let has = slot.has_macro.as_deref().unwrap_or_default();
    match &slot.kind {
        SlotKind::Scalar(p) => e.line(&format!(
            "UBUS_IDL_ADD_OPTIONAL({}, b, \"{}\", {}, params, {});",
            accessor(*p),
            slot.wire_name(),
            scalar_value(*p, &field),
            has
        )),
        SlotKind::Opaque(_) => {
            e.block(&format!("if (UBUS_IDL_HAS_FIELD(params, {})) {{", has), "}", |e| {
                e.block(
                    &format!("if (!{} || {} < 0) {{", field, add_field_call(slot, &field)),
                    "}",
                    |e| e.line("return UBUS_STATUS_INVALID_ARGUMENT;"),
                );
            });
        }
        SlotKind::Nested { struct_name } => e.line(&nested_placeholder(struct_name, slot, "encoded")),
    }
}

fn add_field_call(slot: &Slot<'_>, field: &str) -> String {
    format!(
        "blobmsg_add_field(b, {}, \"{}\", blobmsg_data({}), blobmsg_data_len({}))",
        blob_type(&slot.kind),
        slot.wire_name(),
        field,
        field
    )
}

fn scalar_value(primitive: Primitive, field: &str) -> String {
    match primitive {
        Primitive::Bool => format!("{} ? 1 : 0", field),
        _ => field.to_string(),
    }
}

/// Nested records travel as tables but have no codec of their own yet.
fn nested_placeholder(struct_name: &str, slot: &Slot<'_>, verb: &str) -> String {
    format!(
        "/* \"{}\" (struct {}) is carried as a table and not {} here */",
        slot.wire_name(),
        struct_name,
        verb
    )
}

fn emit_custom_handler(e: &mut CEmitter, entry: &MethodEntry<'_>) {
    let signature = format!("int {}({})", entry.handler, HANDLER_ARGS);
    let implementation = handler_impl_name(&entry.handler);
    e.function(&signature, |e| match &entry.params {
        Some(names) => {
            e.line(&format!("struct {} params;", names.struct_name()));
            e.blank_line();
            e.block(
                &format!("if ({}(msg, &params) != UBUS_STATUS_OK) {{", names.deserialize_fn()),
                "}",
                |e| e.line("return UBUS_STATUS_INVALID_ARGUMENT;"),
            );
            e.blank_line();
            e.line(&format!("return {}(ctx, obj, req, method, &params);", implementation));
        }
        None => {
            e.line("(void)msg;");
            e.line(&format!("return {}(ctx, obj, req, method);", implementation));
        }
    });
}

/// One initializer of the `ubus_method` table.
pub fn dispatch_entry(entry: &MethodEntry<'_>) -> String {
    let name = &entry.wire_name;
    let handler = &entry.handler;
    match (&entry.params, entry.dispatch) {
        (Some(params), Dispatch::Plain) => {
            format!("UBUS_METHOD(\"{}\", {}, {})", name, handler, params.policy_name())
        }
        (Some(params), Dispatch::Tag(tag)) => {
            format!("UBUS_METHOD_TAG(\"{}\", {}, {}, {})", name, handler, params.policy_name(), tag)
        }
        (Some(params), Dispatch::Mask(mask)) => {
            format!("UBUS_METHOD_MASK(\"{}\", {}, {}, {})", name, handler, params.policy_name(), mask)
        }
        (Some(params), Dispatch::MaskAndTag { mask, tag }) => format!(
            "{{ __UBUS_METHOD(\"{}\", {}, {}, {}, {}) }}",
            name,
            handler,
            mask,
            params.policy_name(),
            tag
        ),
        (None, Dispatch::Plain) => format!("UBUS_METHOD_NOARG(\"{}\", {})", name, handler),
        (None, Dispatch::Tag(tag)) => {
            format!("UBUS_METHOD_TAG_NOARG(\"{}\", {}, {})", name, handler, tag)
        }
        (None, Dispatch::Mask(mask)) => {
            format!("{{ __UBUS_METHOD_NOARG(\"{}\", {}, {}, 0) }}", name, handler, mask)
        }
        (None, Dispatch::MaskAndTag { mask, tag }) => {
            format!("{{ __UBUS_METHOD_NOARG(\"{}\", {}, {}, {}) }}", name, handler, mask, tag)
        }
    }
}

fn c_type(kind: &SlotKind) -> String {
    match kind {
        SlotKind::Scalar(p) | SlotKind::Opaque(p) => match p {
            Primitive::Int8   => "int8_t",
            Primitive::Int16  => "int16_t",
            Primitive::Int32  => "int32_t",
            Primitive::Int64  => "int64_t",
            Primitive::String => "const char *",
            Primitive::Bool   => "bool",
            Primitive::Double => "double",
            Primitive::Array | Primitive::Unspec => "struct blob_attr *",
        }
        .to_string(),
        SlotKind::Nested { struct_name } => format!("struct {} *", struct_name),
    }
}

fn blob_type(kind: &SlotKind) -> &'static str {
    match kind {
        SlotKind::Scalar(p) | SlotKind::Opaque(p) => match p {
            Primitive::Int8   => "BLOBMSG_TYPE_INT8",
            Primitive::Int16  => "BLOBMSG_TYPE_INT16",
            Primitive::Int32  => "BLOBMSG_TYPE_INT32",
            Primitive::Int64  => "BLOBMSG_TYPE_INT64",
            Primitive::String => "BLOBMSG_TYPE_STRING",
            Primitive::Bool   => "BLOBMSG_TYPE_BOOL",
            Primitive::Double => "BLOBMSG_TYPE_DOUBLE",
            Primitive::Array  => "BLOBMSG_TYPE_ARRAY",
            Primitive::Unspec => "BLOBMSG_TYPE_UNSPEC",
        },
        SlotKind::Nested { .. } => "BLOBMSG_TYPE_TABLE",
    }
}

/// Suffix of the `blobmsg_get_*` / `blobmsg_add_*` pair for a scalar.
fn accessor(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Int8 | Primitive::Bool => "u8",
        Primitive::Int16  => "u16",
        Primitive::Int32  => "u32",
        Primitive::Int64  => "u64",
        Primitive::Double => "double",
        Primitive::String => "string",
        Primitive::Array | Primitive::Unspec => "field",
    }
}
