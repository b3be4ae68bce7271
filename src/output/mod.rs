//! JSON output module for CLI commands
//!
//! Every command prints one schema-versioned JSON document to stdout.

pub mod command;

pub use command::{
    generate_execution_id, output_json, ErrorBody, ErrorResponse, JsonResponse,
    ARCHITECTUM_JSON_SCHEMA_VERSION,
};
