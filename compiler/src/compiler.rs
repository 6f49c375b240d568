use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    error::IdlError,
    gen_c::generate_object,
    layout::lay_out_object,
    parser::parse_document,
    registry::TypeRegistry,
    tokenizer::tokenize,
    types::Document,
};

/// Parse IDL source text into a `Document`.
/// Returns `Err(IdlError::SyntaxError)` with the offending location on malformed input.
pub fn parse(source: &str) -> Result<Document, IdlError> {
    let tokens = tokenize(source)?;
    parse_document(&tokens)
}

/// Generate the C declaration and definition units of every object in `document`,
/// keyed by file name. Any error fails the whole document.
pub fn generate(document: &Document) -> Result<BTreeMap<String, String>, IdlError> {
    let registry = TypeRegistry::build(document)?;

    let mut files = BTreeMap::new();
    for object in &document.objects {
        debug!(object = object.name.as_str(), "compiling object");
        let layout = lay_out_object(&registry, object)?;
        let generated = generate_object(&layout);

        debug!(file = generated.header_name.as_str(), bytes = generated.header.len(), "generated");
        files.insert(generated.header_name, generated.header);
        debug!(file = generated.source_name.as_str(), bytes = generated.source.len(), "generated");
        files.insert(generated.source_name, generated.source);
    }
    Ok(files)
}

/// `parse` followed by `generate`.
pub fn compile(source: &str) -> Result<BTreeMap<String, String>, IdlError> {
    let document = parse(source)?;
    generate(&document)
}
