//! doxbind: a Doxygen-XML driven Boost.Python wrapper generator.
//!
//! The generator reads a documentation-extraction XML corpus describing a
//! C++ API and a template file containing embedded `%%…%%` directives, and
//! emits wrapper source that registers the described API with the binding
//! library. The symbol graph itself lives in `doxbind-core`; this crate
//! carries the directive language and everything that turns resolved
//! symbols into code:
//!
//! - template scanner (`scan`)
//! - option schemas and the directive argument grammar (`options`)
//! - the scope stack (`scope`)
//! - the directive registry (`macros`)
//! - the code emitter (`emit`)
//! - the driver and CLI plumbing (`process`)

pub mod emit;
pub mod macros;
pub mod options;
pub mod process;
pub mod scan;
pub mod scope;

pub use emit::{EmitConfig, Emitter};
pub use macros::{DirectiveError, MacroKind};
pub use process::{
    resolve_roots, GenerateError, ProcessError, Processor, RootError, SEARCH_PATH_ENV,
};
pub use scope::{ScopeContext, ScopeError};
