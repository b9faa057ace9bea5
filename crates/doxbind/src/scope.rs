//! The driver's scope stack: active namespace and nested class frames.
//!
//! The scope context is an explicit value passed into every directive's
//! apply/finish logic (never ambient processor state), which keeps the state
//! machine's invariants independently testable:
//!
//! - the namespace slot is set only from top-level and never nests;
//! - class frames push/pop in balanced pairs, each capturing the open
//!   directive's options, template-argument binding, pending static
//!   methods, and already-customized member set;
//! - the active resolution scope is always the top class frame's scoped
//!   name, else the namespace's, else empty.

use std::collections::HashSet;

use thiserror::Error;

use doxbind_core::{Corpus, NodeId};

use crate::options::OptionSet;

/// State-machine violations: a directive used outside its required context
/// or unbalanced block structure.
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("cannot set namespace scope inside class scope")]
    NamespaceInsideClass,

    #[error("cannot nest namespace directives")]
    NestedNamespace,

    #[error("namespace close without matching open")]
    UnbalancedNamespaceClose,

    #[error("cannot close namespace '{namespace}' while class '{class}' is open")]
    NamespaceCloseInsideClass { namespace: String, class: String },

    #[error("'{child}' is not an inner class of '{parent}'")]
    NotInnerClass { child: String, parent: String },

    #[error("'{child}' is not in namespace '{parent}'")]
    NotInNamespace { child: String, parent: String },

    #[error("'{child}' is not in the global namespace")]
    NotGlobal { child: String },

    #[error("no class is open at this point")]
    NoActiveClass,

    #[error("class close without matching open")]
    UnbalancedClassClose,

    #[error("customization block close without matching open")]
    UnbalancedCustomClose,

    #[error("unclosed {what} at end of input")]
    UnclosedAtEof { what: String },
}

/// What kind of block opened a class-like frame; the matching close
/// directive must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Class,
    Exception,
}

/// One open class (or exception) block.
#[derive(Debug, Clone)]
pub struct ClassFrame {
    pub node: NodeId,
    pub kind: FrameKind,
    /// Template-argument binding (`<T,N>`) for templated classes.
    pub tparams: Option<String>,
    /// The open directive's parsed options, needed again at close.
    pub options: OptionSet,
    /// Python names of static methods emitted inside this class, in
    /// emission order.
    pub static_methods: Vec<String>,
    /// Refids of members already explicitly handled by a directive; the
    /// close-time sweep skips them.
    pub customized: HashSet<String>,
}

impl ClassFrame {
    pub fn new(
        node: NodeId,
        kind: FrameKind,
        tparams: Option<String>,
        options: OptionSet,
    ) -> Self {
        ClassFrame {
            node,
            kind,
            tparams,
            options,
            static_methods: Vec::new(),
            customized: HashSet::new(),
        }
    }
}

/// The open namespace block.
#[derive(Debug, Clone)]
pub struct NamespaceFrame {
    pub node: NodeId,
    /// Number of `namespace x {` braces the close must balance.
    pub segments: usize,
    /// Whether an innermost anonymous namespace was opened too.
    pub anonymous: bool,
}

/// The scope stack threaded through directive dispatch.
#[derive(Debug, Default)]
pub struct ScopeContext {
    namespace: Option<NamespaceFrame>,
    classes: Vec<ClassFrame>,
    custom_blocks: usize,
}

impl ScopeContext {
    pub fn new() -> Self {
        ScopeContext::default()
    }

    /// The active resolution scope: top class frame's scoped name, else the
    /// namespace's, else empty.
    pub fn active_path(&self, corpus: &Corpus) -> Vec<String> {
        if let Some(frame) = self.classes.last() {
            return corpus.node(frame.node).lscope.clone();
        }
        if let Some(frame) = &self.namespace {
            return corpus.node(frame.node).lscope.clone();
        }
        Vec::new()
    }

    pub fn namespace(&self) -> Option<NodeId> {
        self.namespace.as_ref().map(|frame| frame.node)
    }

    /// Open the namespace block. Only legal from top-level.
    pub fn set_namespace(&mut self, frame: NamespaceFrame) -> Result<(), ScopeError> {
        if !self.classes.is_empty() {
            return Err(ScopeError::NamespaceInsideClass);
        }
        if self.namespace.is_some() {
            return Err(ScopeError::NestedNamespace);
        }
        self.namespace = Some(frame);
        Ok(())
    }

    /// Close the namespace block, returning its frame for emission.
    pub fn clear_namespace(&mut self, corpus: &Corpus) -> Result<NamespaceFrame, ScopeError> {
        if let Some(class) = self.classes.last() {
            let namespace = self
                .namespace
                .as_ref()
                .map(|f| corpus.node(f.node).qualified_name())
                .unwrap_or_default();
            return Err(ScopeError::NamespaceCloseInsideClass {
                namespace,
                class: corpus.node(class.node).qualified_name(),
            });
        }
        self.namespace
            .take()
            .ok_or(ScopeError::UnbalancedNamespaceClose)
    }

    /// Push a class frame after validating that the class is a syntactic
    /// child of the currently active scope.
    pub fn push_class(&mut self, corpus: &Corpus, frame: ClassFrame) -> Result<(), ScopeError> {
        let child = corpus.node(frame.node);
        if let Some(top) = self.classes.last() {
            let parent = corpus.node(top.node);
            if child.fscope != Some(top.node) {
                return Err(ScopeError::NotInnerClass {
                    child: child.qualified_name(),
                    parent: parent.qualified_name(),
                });
            }
        } else if let Some(namespace) = &self.namespace {
            if child.fscope != Some(namespace.node) {
                return Err(ScopeError::NotInNamespace {
                    child: child.qualified_name(),
                    parent: corpus.node(namespace.node).qualified_name(),
                });
            }
        } else if child.fscope.is_some() {
            return Err(ScopeError::NotGlobal {
                child: child.qualified_name(),
            });
        }
        self.classes.push(frame);
        Ok(())
    }

    /// Pop the top class frame. The frame's template binding disappears
    /// with it.
    pub fn pop_class(&mut self) -> Result<ClassFrame, ScopeError> {
        self.classes.pop().ok_or(ScopeError::UnbalancedClassClose)
    }

    pub fn active_class(&self) -> Option<&ClassFrame> {
        self.classes.last()
    }

    pub fn active_class_mut(&mut self) -> Option<&mut ClassFrame> {
        self.classes.last_mut()
    }

    /// Record a static method pending `staticmethod()` emission at close.
    pub fn mark_static_method(&mut self, name: &str) -> Result<(), ScopeError> {
        let frame = self.classes.last_mut().ok_or(ScopeError::NoActiveClass)?;
        if !frame.static_methods.iter().any(|n| n == name) {
            frame.static_methods.push(name.to_string());
        }
        Ok(())
    }

    /// Record a member as explicitly handled so the close-time sweep skips it.
    pub fn mark_customized(&mut self, refid: &str) -> Result<(), ScopeError> {
        let frame = self.classes.last_mut().ok_or(ScopeError::NoActiveClass)?;
        frame.customized.insert(refid.to_string());
        Ok(())
    }

    /// The template-argument binding for a templated class refid, searching
    /// open frames innermost-first.
    pub fn tparams_for(&self, corpus: &Corpus, refid: &str) -> Option<&str> {
        self.classes
            .iter()
            .rev()
            .find(|frame| corpus.node(frame.node).refid == refid)
            .and_then(|frame| frame.tparams.as_deref())
    }

    pub fn open_custom(&mut self) {
        self.custom_blocks += 1;
    }

    pub fn close_custom(&mut self) -> Result<(), ScopeError> {
        if self.custom_blocks == 0 {
            return Err(ScopeError::UnbalancedCustomClose);
        }
        self.custom_blocks -= 1;
        Ok(())
    }

    /// End-of-input balance check: every block open must have been closed.
    pub fn assert_balanced(&self, corpus: &Corpus) -> Result<(), ScopeError> {
        if let Some(frame) = self.classes.last() {
            return Err(ScopeError::UnclosedAtEof {
                what: format!("class '{}'", corpus.node(frame.node).qualified_name()),
            });
        }
        if let Some(frame) = &self.namespace {
            return Err(ScopeError::UnclosedAtEof {
                what: format!("namespace '{}'", corpus.node(frame.node).qualified_name()),
            });
        }
        if self.custom_blocks > 0 {
            return Err(ScopeError::UnclosedAtEof {
                what: "customization block".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Push validation needs corpus data and is covered by the integration
    // tests in tests/; these exercise the pure stack invariants.

    fn frame(id: u32) -> ClassFrame {
        ClassFrame::new(NodeId::new(id), FrameKind::Class, None, OptionSet::default())
    }

    #[test]
    fn static_methods_keep_insertion_order_without_duplicates() {
        let mut ctx = ScopeContext::new();
        ctx.classes.push(frame(0));
        ctx.mark_static_method("alpha").unwrap();
        ctx.mark_static_method("beta").unwrap();
        ctx.mark_static_method("alpha").unwrap();
        assert_eq!(
            ctx.active_class().unwrap().static_methods,
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn marking_without_a_class_is_an_error() {
        let mut ctx = ScopeContext::new();
        assert!(matches!(
            ctx.mark_static_method("alpha"),
            Err(ScopeError::NoActiveClass)
        ));
        assert!(matches!(
            ctx.mark_customized("refid"),
            Err(ScopeError::NoActiveClass)
        ));
    }

    #[test]
    fn pop_on_empty_stack_is_unbalanced() {
        let mut ctx = ScopeContext::new();
        assert!(matches!(
            ctx.pop_class(),
            Err(ScopeError::UnbalancedClassClose)
        ));
    }

    #[test]
    fn customized_set_is_per_frame() {
        let mut ctx = ScopeContext::new();
        ctx.classes.push(frame(0));
        ctx.mark_customized("a").unwrap();
        ctx.classes.push(frame(1));
        assert!(!ctx.active_class().unwrap().customized.contains("a"));
        let popped = ctx.pop_class().unwrap();
        assert!(popped.customized.is_empty());
        assert!(ctx.active_class().unwrap().customized.contains("a"));
    }

    #[test]
    fn custom_blocks_balance() {
        let mut ctx = ScopeContext::new();
        ctx.open_custom();
        ctx.close_custom().unwrap();
        assert!(matches!(
            ctx.close_custom(),
            Err(ScopeError::UnbalancedCustomClose)
        ));
    }
}
