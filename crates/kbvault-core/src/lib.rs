//! # kbvault-core
//!
//! Core types, traits, and the constraint engine for kbvault.
//!
//! This crate holds everything that does not touch storage: the front-matter
//! parser, the persisted rule-document codec, constraint evaluation and
//! resolution, and path scoping. The storage-backed registry lives in
//! `kbvault-store`.

pub mod codec;
pub mod defaults;
pub mod error;
pub mod frontmatter;
pub mod logging;
pub mod models;
pub mod paths;
pub mod resolver;
pub mod rules;
pub mod rules_yaml;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use codec::{
    parse_folder_constraint, parse_knowledge_base, serialize_folder_constraint,
    serialize_knowledge_base,
};
pub use error::{Error, Result};
pub use models::*;
pub use resolver::find_applicable;
pub use rules::{check_rules, rules_from_json};
pub use traits::*;
pub use validation::validate;
