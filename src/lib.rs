//! # formweave - Form Schema Compiler
//!
//! **formweave** turns a form-builder schema (a JSON tree of components) into
//! everything a persistence and rendering layer needs at runtime: a typed
//! record table, one descriptor per field, conditional and logic rules with
//! their dependency graph, and the metadata registries that drive cloning,
//! uniqueness, computed values and list views.
//!
//! ## Core Workflow
//!
//! 1.  **Load the schema**: parse the builder payload into a `SchemaDocument`.
//! 2.  **Compile**: configure a `SchemaCompiler` through its builder (language,
//!     translations, resolved option lists, rule context) and compile the
//!     document into a `CompiledSchema`. Broken components are skipped and
//!     reported as diagnostics; the rest of the form still compiles.
//! 3.  **Instantiate**: create `Record`s from submitted payloads. Values are
//!     coerced to the declared field types.
//! 4.  **Re-evaluate**: when a field changes, look up its dependents and
//!     re-run their rules against the new data.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formweave::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> Result<()> {
//!     let schema = SchemaDocument::from_value(&json!({
//!         "components": [
//!             {"type": "textfield", "key": "username", "label": "User", "input": true},
//!             {
//!                 "type": "textfield", "key": "secret", "label": "Secret", "input": true,
//!                 "conditional": {"json": {"==": [{"var": "form.username"}, "admin"]}}
//!             }
//!         ]
//!     }))?;
//!
//!     let compiler = SchemaCompiler::builder("account").with_language("en").build();
//!     let compiled = compiler.compile(&schema)?;
//!
//!     // `secret` is re-evaluated whenever `username` changes.
//!     assert_eq!(compiled.dependents_of("username"), ["secret"]);
//!
//!     let record = compiled.new_record(&json!({"username": "admin"}))?;
//!     let context = json!({"form": record.to_value()});
//!     let configs = compiled.evaluate_dependents("username", &context);
//!     println!("secret hidden: {}", configs["secret"].hidden);
//!
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod error;
pub mod field;
pub mod infer;
pub mod path;
pub mod prelude;
pub mod record;
pub mod rules;
pub mod schema;
