//! Core infrastructure for doxbind.
//!
//! This crate provides the symbol graph the generator resolves directives
//! against:
//! - XML element tree over the corpus documents
//! - Node model (namespaces, classes, callables, enums, types)
//! - Overload sets with label-based disambiguation
//! - The corpus index: manifest loading, lazy detail loading, scoped lookup
//! - Error types shared by the generator

pub mod corpus;
pub mod error;
pub mod model;
pub mod overloads;
pub mod xml;

pub use corpus::{Corpus, DOC_COMMAND_PREFIX, MANIFEST_FILE};
pub use error::{CorpusError, LookupError, LookupResult};
pub use model::{
    BaseRef, CallableDetail, CxxType, Detail, DocBlock, Node, NodeId, NodeKind, Param, TypeRef,
};
pub use overloads::OverloadSet;
