//! Node model: the entities of the symbol graph.
//!
//! Nodes live in an arena owned by [`Corpus`](crate::corpus::Corpus) and are
//! addressed by [`NodeId`]. A node is created as an unloaded stub during
//! manifest loading; its documentation and kind-specific [`Detail`] are
//! populated exactly once, when the owning compound's detail document is
//! parsed.
//!
//! Scoped names ("lscope") are ordered name segments (`["ns", "Foo", "bar"]`
//! for `ns::Foo::bar`). The enclosing-scope back-reference ("fscope") is a
//! plain [`NodeId`]: navigation only, never ownership.

use std::fmt;
use std::path::PathBuf;

/// Arena index of a node, stable for the life of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new node ID.
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// The arena slot this ID addresses.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Kind of entity, as declared by the corpus manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Namespace,
    Class,
    Struct,
    Group,
    File,
    Function,
    Variable,
    Enum,
    EnumValue,
    Typedef,
}

impl NodeKind {
    /// Map a manifest `kind` attribute to a node kind.
    ///
    /// Returns `None` for kinds the generator does not model (pages, dirs,
    /// defines, friends, ...), which are skipped during manifest loading.
    pub fn from_corpus(kind: &str) -> Option<NodeKind> {
        match kind {
            "namespace" => Some(NodeKind::Namespace),
            "class" => Some(NodeKind::Class),
            "struct" => Some(NodeKind::Struct),
            "group" => Some(NodeKind::Group),
            "file" => Some(NodeKind::File),
            "function" => Some(NodeKind::Function),
            "variable" => Some(NodeKind::Variable),
            "enum" => Some(NodeKind::Enum),
            "enumvalue" => Some(NodeKind::EnumValue),
            "typedef" => Some(NodeKind::Typedef),
            _ => None,
        }
    }

    /// True for entities that own a detail document (manifest compounds).
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            NodeKind::Namespace
                | NodeKind::Class
                | NodeKind::Struct
                | NodeKind::Group
                | NodeKind::File
        )
    }

    /// True for entities that introduce a lookup scope with children.
    pub fn is_scope(&self) -> bool {
        matches!(self, NodeKind::Namespace | NodeKind::Class | NodeKind::Struct)
    }

    /// True for class-like scopes.
    pub fn is_class(&self) -> bool {
        matches!(self, NodeKind::Class | NodeKind::Struct)
    }
}

/// One block of documentation: plain prose or a literal code listing.
///
/// Code listings pass through the docstring formatter unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum DocBlock {
    Text(String),
    Code(Vec<String>),
}

impl DocBlock {
    /// True if the block carries no renderable content.
    pub fn is_empty(&self) -> bool {
        match self {
            DocBlock::Text(text) => text.trim().is_empty(),
            DocBlock::Code(lines) => lines.is_empty(),
        }
    }
}

/// A cross-reference embedded in a type expression.
///
/// The reference keeps the literal text from the reference site so formatting
/// can fall back to it when the refid is absent from the corpus (dangling
/// references are recoverable, never fatal).
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// Referenced corpus identifier.
    pub refid: String,
    /// Literal text at the reference site.
    pub text: String,
    /// The reference was immediately followed by explicit template arguments.
    pub has_tparams: bool,
    /// The reference was followed by further `::` qualification.
    pub has_nested: bool,
}

/// A type (or default-value) expression: a template string with indexed
/// placeholders (`{0}`, `{1}`, ...) standing in for cross-references.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CxxType {
    pub template: String,
    pub refs: Vec<TypeRef>,
    pub is_pointer: bool,
}

impl CxxType {
    /// A plain expression with no cross-references.
    pub fn plain(text: impl Into<String>) -> Self {
        let template = text.into();
        let is_pointer = template.contains('*');
        CxxType {
            template,
            refs: Vec::new(),
            is_pointer,
        }
    }

    /// True if the expression has no content at all.
    pub fn is_empty(&self) -> bool {
        self.template.trim().is_empty()
    }
}

/// One parameter of a callable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Param {
    /// Declared name; `None` for unnamed parameters.
    pub name: Option<String>,
    pub cxx_type: CxxType,
    /// Default-value expression, if any.
    pub default: Option<CxxType>,
    /// Per-parameter brief documentation.
    pub brief: Vec<DocBlock>,
}

/// A base-class reference of a class node.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRef {
    /// Resolved base, when the corpus documents it.
    pub target: Option<NodeId>,
    /// Literal base-class text from the detail document.
    pub text: String,
    /// Explicit template-argument text trailing the base name, if the base
    /// is itself a template (`<T,N>`).
    pub tparams: Option<String>,
}

/// Scope detail for namespaces and classes.
#[derive(Debug, Clone, Default)]
pub struct ScopeDetail {
    /// Local names of child overload sets, in insertion (document) order.
    pub children: Vec<String>,
    /// Base classes (classes only; empty for namespaces).
    pub bases: Vec<BaseRef>,
}

/// Callable detail for functions, methods, and constructors.
#[derive(Debug, Clone, Default)]
pub struct CallableDetail {
    pub params: Vec<Param>,
    /// Return type; empty for constructors.
    pub result: CxxType,
    pub is_const: bool,
    pub is_static: bool,
    pub is_reimplementation: bool,
}

/// Variable detail.
#[derive(Debug, Clone, Default)]
pub struct VariableDetail {
    pub cxx_type: CxxType,
    pub is_static: bool,
}

/// Typedef detail.
#[derive(Debug, Clone, Default)]
pub struct TypedefDetail {
    pub aliased: CxxType,
}

/// Enum detail.
#[derive(Debug, Clone, Default)]
pub struct EnumDetail {
    /// Value nodes in declaration order.
    pub values: Vec<NodeId>,
}

/// Enum-value detail.
#[derive(Debug, Clone)]
pub struct EnumValueDetail {
    /// Initializer text, if declared.
    pub initializer: Option<String>,
    /// The owning enum (used to detect anonymous enums at emission time).
    pub owner: NodeId,
}

/// Kind-specific data, populated on detail load.
#[derive(Debug, Clone, Default)]
pub enum Detail {
    /// Not yet loaded, or the kind carries no extra data.
    #[default]
    None,
    Scope(ScopeDetail),
    Callable(CallableDetail),
    Variable(VariableDetail),
    Typedef(TypedefDetail),
    Enum(EnumDetail),
    EnumValue(EnumValueDetail),
}

/// One entity of the symbol graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable corpus identifier.
    pub refid: String,
    pub kind: NodeKind,
    /// Scoped name segments; the last segment is the local name.
    pub lscope: Vec<String>,
    /// Author-attached disambiguation label, if any.
    pub label: Option<String>,
    /// Hidden members stay in their overload set's `all` collection but are
    /// excluded from `visible`. Transitions visible -> hidden only.
    pub hidden: bool,
    pub is_template: bool,
    /// Flips false -> true exactly once, when detail is populated.
    pub loaded: bool,
    pub brief: Vec<DocBlock>,
    pub detailed: Vec<DocBlock>,
    /// Enclosing scope (navigation only).
    pub fscope: Option<NodeId>,
    /// The compound whose detail document defines this member. For members
    /// re-homed by a group this differs from the syntactic parent.
    pub location: Option<NodeId>,
    /// For compounds: the detail document path (`<root>/<refid>.xml`).
    pub detail_file: Option<PathBuf>,
    pub detail: Detail,
}

impl Node {
    /// Create an unloaded stub.
    pub fn stub(refid: impl Into<String>, kind: NodeKind, lscope: Vec<String>) -> Self {
        Node {
            refid: refid.into(),
            kind,
            lscope,
            label: None,
            hidden: false,
            is_template: false,
            loaded: false,
            brief: Vec::new(),
            detailed: Vec::new(),
            fscope: None,
            location: None,
            detail_file: None,
            detail: Detail::None,
        }
    }

    /// Local (unqualified) name.
    pub fn name(&self) -> &str {
        self.lscope.last().map(String::as_str).unwrap_or("")
    }

    /// Fully-qualified display name.
    pub fn qualified_name(&self) -> String {
        self.lscope.join("::")
    }

    /// Hide this node. Idempotent; hidden nodes never become visible again.
    pub fn hide(&mut self) {
        self.hidden = true;
    }

    /// Callable detail, if this node is a callable.
    pub fn callable(&self) -> Option<&CallableDetail> {
        match &self.detail {
            Detail::Callable(detail) => Some(detail),
            _ => None,
        }
    }

    /// Scope detail, if this node is a scope.
    pub fn scope(&self) -> Option<&ScopeDetail> {
        match &self.detail {
            Detail::Scope(detail) => Some(detail),
            _ => None,
        }
    }

    /// True if this node is a const member function.
    pub fn is_const(&self) -> bool {
        self.callable().map(|c| c.is_const).unwrap_or(false)
    }

    /// True if this node is a static member.
    pub fn is_static(&self) -> bool {
        match &self.detail {
            Detail::Callable(c) => c.is_static,
            Detail::Variable(v) => v.is_static,
            _ => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}
