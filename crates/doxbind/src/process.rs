//! The macro processor: drives one template through the registry.
//!
//! Processing is single-threaded, synchronous, single-pass: the scanner
//! stream is walked line by line, each directive is dispatched against the
//! symbol graph under the current scope stack, and its output is spliced in
//! place of the directive span. Any directive failure aborts the whole run,
//! annotated with its 1-based source line; there is no per-directive
//! recovery.
//!
//! Output discipline: the full result is built in memory and written through
//! a sibling temporary file renamed into place on success, so a failed run
//! never leaves partial output a caller could mistake for complete.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use doxbind_core::{Corpus, MANIFEST_FILE};

use crate::emit::{EmitConfig, Emitter};
use crate::macros::{dispatch, DirectiveError, MacroKind};
use crate::scan::{scan_line, ScanError, Segment};
use crate::scope::{ScopeContext, ScopeError};

/// Environment variable holding the colon-separated corpus search path.
pub const SEARCH_PATH_ENV: &str = "DOXBIND_PATH";

/// Errors that abort a template run.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Malformed directive delimiters or an unregistered directive name.
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A directive failed to parse, resolve, or validate.
    #[error("directive error on line {line}: {source}")]
    Directive {
        line: usize,
        #[source]
        source: DirectiveError,
    },

    /// A block left open (or closed twice) by the end of input.
    #[error("unbalanced block structure: {source}")]
    Unbalanced {
        #[source]
        source: ScopeError,
    },
}

/// Errors around a whole generation run (template in, wrapper source out).
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("failed to write output {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors resolving requested corpus roots to directories.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("no {MANIFEST_FILE} in absolute path {}", path.display())]
    AbsoluteMissing { path: PathBuf },

    #[error("could not resolve corpus root '{root}'")]
    NotFound { root: String },
}

/// The macro processor. Owns the symbol graph for its lifetime; one
/// instance can process several templates sequentially, amortizing detail
/// parsing across them.
#[derive(Debug)]
pub struct Processor {
    corpus: Corpus,
    emitter: Emitter,
}

impl Processor {
    pub fn new(corpus: Corpus) -> Self {
        Processor {
            corpus,
            emitter: Emitter::default(),
        }
    }

    pub fn with_config(corpus: Corpus, config: EmitConfig) -> Self {
        Processor {
            corpus,
            emitter: Emitter::new(config),
        }
    }

    /// Expand one template to its output text.
    pub fn process_str(&mut self, input: &str) -> Result<String, ProcessError> {
        let mut ctx = ScopeContext::new();
        let mut out = String::with_capacity(input.len());
        for (index, line) in input.split_inclusive('\n').enumerate() {
            let line_no = index + 1;
            let segments = scan_line(line, line_no).map_err(scan_to_process)?;
            for segment in segments {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Directive(directive) => {
                        let kind = MacroKind::from_name(directive.name).ok_or_else(|| {
                            ProcessError::Syntax {
                                line: directive.line,
                                message: format!("unknown directive '{}'", directive.name),
                            }
                        })?;
                        debug!(
                            "dispatching directive '{}' on line {}",
                            directive.name, directive.line
                        );
                        let expansion = dispatch(
                            kind,
                            directive.body,
                            directive.column,
                            &mut self.corpus,
                            &mut ctx,
                            &self.emitter,
                        )
                        .map_err(|source| ProcessError::Directive {
                            line: directive.line,
                            source,
                        })?;
                        out.push_str(&expansion);
                    }
                }
            }
        }
        ctx.assert_balanced(&self.corpus)
            .map_err(|source| ProcessError::Unbalanced { source })?;
        Ok(out)
    }

    /// Expand a template file, writing the output next to it (the template
    /// path minus its extension) or to an explicit path.
    pub fn process_file(
        &mut self,
        template: &Path,
        output: Option<&Path>,
    ) -> Result<PathBuf, GenerateError> {
        let input = fs::read_to_string(template).map_err(|source| GenerateError::Read {
            path: template.to_path_buf(),
            source,
        })?;
        let expanded = self.process_str(&input)?;
        let out_path = match output {
            Some(path) => path.to_path_buf(),
            None => template.with_extension(""),
        };
        write_atomically(&out_path, &expanded).map_err(|source| GenerateError::Write {
            path: out_path.clone(),
            source,
        })?;
        Ok(out_path)
    }

    /// Borrow the symbol graph (tests and tooling).
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }
}

fn scan_to_process(err: ScanError) -> ProcessError {
    match err {
        ScanError::Unterminated { line } => ProcessError::Syntax {
            line,
            message: "unterminated directive marker".to_string(),
        },
        ScanError::Malformed { span, line } => ProcessError::Syntax {
            line,
            message: format!("malformed directive '{span}'"),
        },
    }
}

/// Write through a sibling temporary file renamed into place on success.
fn write_atomically(path: &Path, contents: &str) -> Result<(), std::io::Error> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new_in(".")?,
    };
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Resolve requested corpus roots, each in order against: the path itself
/// (absolute), the current directory, then every entry of the
/// [`SEARCH_PATH_ENV`] search path. A root resolves to the first directory
/// containing the manifest.
pub fn resolve_roots(requested: &[String]) -> Result<Vec<PathBuf>, RootError> {
    let search_path = std::env::var(SEARCH_PATH_ENV).unwrap_or_default();
    resolve_roots_with(requested, Path::new("."), &search_path)
}

/// Testable form of [`resolve_roots`] with explicit current directory and
/// search path.
pub fn resolve_roots_with(
    requested: &[String],
    current_dir: &Path,
    search_path: &str,
) -> Result<Vec<PathBuf>, RootError> {
    let mut resolved = Vec::with_capacity(requested.len());
    for root in requested {
        let path = Path::new(root);
        if path.is_absolute() {
            if path.join(MANIFEST_FILE).exists() {
                resolved.push(path.to_path_buf());
                continue;
            }
            return Err(RootError::AbsoluteMissing {
                path: path.to_path_buf(),
            });
        }
        let local = current_dir.join(root);
        if local.join(MANIFEST_FILE).exists() {
            resolved.push(local);
            continue;
        }
        let mut found = None;
        for base in search_path.split(':').filter(|base| !base.is_empty()) {
            let candidate = Path::new(base).join(root);
            if candidate.join(MANIFEST_FILE).exists() {
                found = Some(candidate);
                break;
            }
        }
        match found {
            Some(path) => resolved.push(path),
            None => {
                return Err(RootError::NotFound {
                    root: root.clone(),
                })
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.cc");
        write_atomically(&path, "first").unwrap();
        write_atomically(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    mod roots {
        use super::*;

        fn corpus_dir(parent: &Path, name: &str) -> PathBuf {
            let dir = parent.join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(MANIFEST_FILE), "<doxygenindex/>").unwrap();
            dir
        }

        #[test]
        fn current_dir_wins_over_search_path() {
            let cwd = TempDir::new().unwrap();
            let elsewhere = TempDir::new().unwrap();
            corpus_dir(cwd.path(), "xml");
            corpus_dir(elsewhere.path(), "xml");
            let resolved = resolve_roots_with(
                &["xml".to_string()],
                cwd.path(),
                elsewhere.path().to_str().unwrap(),
            )
            .unwrap();
            assert_eq!(resolved, vec![cwd.path().join("xml")]);
        }

        #[test]
        fn search_path_is_consulted_in_order() {
            let cwd = TempDir::new().unwrap();
            let first = TempDir::new().unwrap();
            let second = TempDir::new().unwrap();
            corpus_dir(second.path(), "xml");
            let search = format!(
                "{}:{}",
                first.path().display(),
                second.path().display()
            );
            let resolved =
                resolve_roots_with(&["xml".to_string()], cwd.path(), &search).unwrap();
            assert_eq!(resolved, vec![second.path().join("xml")]);
        }

        #[test]
        fn absolute_root_must_carry_manifest() {
            let dir = TempDir::new().unwrap();
            let missing = dir.path().join("empty");
            fs::create_dir_all(&missing).unwrap();
            let err = resolve_roots_with(
                &[missing.to_str().unwrap().to_string()],
                dir.path(),
                "",
            )
            .unwrap_err();
            assert!(matches!(err, RootError::AbsoluteMissing { .. }));
        }

        #[test]
        fn unresolved_root_is_fatal() {
            let cwd = TempDir::new().unwrap();
            let err =
                resolve_roots_with(&["nowhere".to_string()], cwd.path(), "").unwrap_err();
            match err {
                RootError::NotFound { root } => assert_eq!(root, "nowhere"),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }
}
