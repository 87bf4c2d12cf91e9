//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from the formweave
//! crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use formweave::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let schema_json = std::fs::read_to_string("path/to/form.json")?;
//!
//! let compiler = SchemaCompiler::new("customer");
//! let compiled = compiler.compile_json(&schema_json)?;
//!
//! let record = compiled.new_record(&serde_json::json!({"rec_name": "C-001"}))?;
//! println!("{}", record.to_value());
//! # Ok(())
//! # }
//! ```

// Compilation
pub use crate::compiler::{
    CompiledSchema, CompiledScope, CompilerBuilder, CompilerConfig, SchemaCompiler, SchemaMetadata,
    ScopeId,
};

// Schema and record types
pub use crate::record::Record;
pub use crate::schema::{FieldDef, FieldType, RecordType, SchemaDocument, SchemaNode};

// Field descriptors
pub use crate::field::{FieldConfig, FieldDescriptor, Locale, OptionList, Translations};

// Rules and inference
pub use crate::infer::{Inferred, ValueKind};
pub use crate::rules::{DependencyMap, RuleEvaluator};

// Error types
pub use crate::error::{CompileError, EvaluationError, RecordError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
