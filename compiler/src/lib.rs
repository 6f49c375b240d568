//! ubus-idl-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for `.uidl` interface files,
//!  2) A type registry that resolves names and rejects invalid documents,
//!  3) Naming and layout of every record and dispatch entry of an object,
//!  4) C code generation against libubus / blobmsg (`generate` → file name → text),
//!  5) Error types (`IdlError`).

pub mod error;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod parser;
pub mod registry;
pub mod naming;
pub mod layout;
pub mod emitter;
pub mod gen_c;
pub mod compiler;

pub use compiler::compile;
pub use compiler::generate;
pub use compiler::parse;
pub use error::IdlError;
pub use registry::TypeRegistry;
pub use types::Document;
