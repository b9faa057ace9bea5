//! The directive registry: a closed catalog of macro kinds.
//!
//! Each directive kind declares a typed option schema and its apply/finish
//! behavior; dispatch is a `match` over [`MacroKind`], never a name lookup on
//! a handler object. Block-style directives (`namespace`, `class`,
//! `template_class`, `exception`, `custom`) bracket literal pass-through
//! text with explicit `end_*` close directives; simple directives produce a
//! single inline replacement.
//!
//! Member-emitting directives record the refids they handled in the active
//! class frame, so the close-time sweep ("emit everything not yet covered")
//! skips them.

use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;

use doxbind_core::model::{NodeId, NodeKind};
use doxbind_core::{Corpus, LookupError, OverloadSet};

use crate::emit::{CallOptions, ClassOpen, EmitError, Emitter};
use crate::options::{parse_options, OptionError, OptionSet, OptionSpec, RefSpec};
use crate::scope::{ClassFrame, FrameKind, NamespaceFrame, ScopeContext, ScopeError};

/// Errors raised while dispatching one directive. The driver annotates them
/// with the source line and aborts the run.
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error(transparent)]
    Options(#[from] OptionError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error("'{name}' is not a namespace")]
    NotANamespace { name: String },

    #[error("'{name}' is not a class")]
    NotAClass { name: String },

    #[error("'{name}' is not an enum")]
    NotAnEnum { name: String },

    #[error("'{name}' is a template class; open it with template_class")]
    TemplateClass { name: String },

    #[error("'{name}' is not a template class")]
    NotTemplateClass { name: String },

    #[error("multiple labels provided for a single-target argument")]
    MultipleLabels,

    #[error("cannot rename constructor '{name}'")]
    RenamedConstructor { name: String },

    #[error("cannot set a function pointer for constructor '{name}'")]
    ConstructorPointer { name: String },

    #[error("cannot wrap templated constructor '{name}'")]
    TemplatedConstructor { name: String },

    #[error("'{close}' does not match the open '{open}' block")]
    MismatchedClose {
        close: &'static str,
        open: &'static str,
    },

    #[error("invalid filter pattern '{pattern}': {message}")]
    BadPattern { pattern: String, message: String },

    #[error("exception '{name}' has no documented base class; pass base=")]
    MissingExceptionBase { name: String },
}

/// The closed catalog of directive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    Namespace,
    EndNamespace,
    Class,
    TemplateClass,
    EndClass,
    Exception,
    EndException,
    Function,
    Member,
    Members,
    Enum,
    Doc,
    Custom,
    EndCustom,
}

impl MacroKind {
    /// Look a directive name up in the registry.
    pub fn from_name(name: &str) -> Option<MacroKind> {
        match name {
            "namespace" => Some(MacroKind::Namespace),
            "end_namespace" => Some(MacroKind::EndNamespace),
            "class" => Some(MacroKind::Class),
            "template_class" => Some(MacroKind::TemplateClass),
            "end_class" => Some(MacroKind::EndClass),
            "exception" => Some(MacroKind::Exception),
            "end_exception" => Some(MacroKind::EndException),
            "function" => Some(MacroKind::Function),
            "member" => Some(MacroKind::Member),
            "members" => Some(MacroKind::Members),
            "enum" => Some(MacroKind::Enum),
            "doc" => Some(MacroKind::Doc),
            "custom" => Some(MacroKind::Custom),
            "end_custom" => Some(MacroKind::EndCustom),
            _ => None,
        }
    }

    /// The typed option schema for this directive kind, in positional order.
    pub fn schema(&self) -> Vec<OptionSpec> {
        match self {
            MacroKind::Namespace => vec![
                OptionSpec::reference("target"),
                OptionSpec::boolean("anonymous", true),
            ],
            MacroKind::Class => class_schema(false),
            MacroKind::TemplateClass => class_schema(true),
            MacroKind::Exception => vec![
                OptionSpec::reference("target"),
                OptionSpec::reference("base"),
                OptionSpec::string("rename"),
                OptionSpec::string_with("include_regex", ".*"),
                OptionSpec::string("ignore_regex"),
                OptionSpec::list("include_list"),
                OptionSpec::list("ignore_list"),
            ],
            MacroKind::Function | MacroKind::Member => vec![
                OptionSpec::reference("target"),
                OptionSpec::string("rename"),
                OptionSpec::code("policies"),
                OptionSpec::code("pointer"),
                OptionSpec::code("args"),
                OptionSpec::code("doc"),
                OptionSpec::code("tparams"),
            ],
            MacroKind::Members => vec![
                OptionSpec::list("include_list"),
                OptionSpec::string("include_regex"),
                OptionSpec::list("ignore_list"),
                OptionSpec::string("ignore_regex"),
            ],
            MacroKind::Enum => vec![
                OptionSpec::reference("target"),
                OptionSpec::string("rename"),
                OptionSpec::code("doc"),
                OptionSpec::boolean("export_values", true),
            ],
            MacroKind::Doc => vec![OptionSpec::reference("target")],
            MacroKind::EndNamespace
            | MacroKind::EndClass
            | MacroKind::EndException
            | MacroKind::Custom
            | MacroKind::EndCustom => Vec::new(),
        }
    }
}

fn class_schema(template: bool) -> Vec<OptionSpec> {
    let mut schema = vec![OptionSpec::reference("target")];
    if template {
        schema.push(OptionSpec::code("parameters"));
    }
    schema.extend([
        OptionSpec::string("rename"),
        OptionSpec::code("init"),
        OptionSpec::code("doc"),
        OptionSpec::boolean("const_aware", true),
        OptionSpec::boolean("noncopyable", false),
        OptionSpec::boolean("shared_ptr", true),
        OptionSpec::string_with("include_regex", ".*"),
        OptionSpec::string("ignore_regex"),
        OptionSpec::list("include_list"),
        OptionSpec::list("ignore_list"),
    ]);
    schema
}

/// Parse a directive body and run the matched macro, returning the text
/// spliced in place of the directive span.
pub fn dispatch(
    kind: MacroKind,
    body: &str,
    column: usize,
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
) -> Result<String, DirectiveError> {
    let opts = parse_options(&kind.schema(), body)?;
    let indent = " ".repeat(column);
    match kind {
        MacroKind::Namespace => apply_namespace(corpus, ctx, emitter, &opts),
        MacroKind::EndNamespace => apply_end_namespace(corpus, ctx, emitter),
        MacroKind::Class => apply_class(corpus, ctx, emitter, &opts, &indent, ClassForm::Plain),
        MacroKind::TemplateClass => {
            apply_class(corpus, ctx, emitter, &opts, &indent, ClassForm::Template)
        }
        MacroKind::Exception => {
            apply_class(corpus, ctx, emitter, &opts, &indent, ClassForm::Exception)
        }
        MacroKind::EndClass => apply_end_class(corpus, ctx, emitter, &indent, FrameKind::Class),
        MacroKind::EndException => {
            apply_end_class(corpus, ctx, emitter, &indent, FrameKind::Exception)
        }
        MacroKind::Function => apply_function(corpus, ctx, emitter, &opts, &indent),
        MacroKind::Member => apply_member(corpus, ctx, emitter, &opts, &indent),
        MacroKind::Members => apply_members(corpus, ctx, emitter, &opts, &indent),
        MacroKind::Enum => apply_enum(corpus, ctx, emitter, &opts, &indent),
        MacroKind::Doc => apply_doc(corpus, ctx, emitter, &opts, &indent),
        MacroKind::Custom => {
            ctx.open_custom();
            Ok(emitter.custom_open())
        }
        MacroKind::EndCustom => {
            ctx.close_custom()?;
            Ok(emitter.custom_close())
        }
    }
}

// ============================================================================
// Target resolution
// ============================================================================

fn resolve_set(
    corpus: &mut Corpus,
    ctx: &ScopeContext,
    spec: &RefSpec,
) -> Result<OverloadSet, DirectiveError> {
    let scope = ctx.active_path(corpus);
    Ok(corpus.lookup(&spec.path, &scope)?)
}

/// Resolve a reference to exactly one node, honoring a single label
/// subscript.
fn resolve_single(
    corpus: &mut Corpus,
    ctx: &ScopeContext,
    spec: &RefSpec,
) -> Result<NodeId, DirectiveError> {
    let set = resolve_set(corpus, ctx, spec)?;
    match spec.labels.as_deref() {
        None => Ok(set.get(corpus.nodes())?),
        Some([label]) => Ok(set.get_labeled(corpus.nodes(), label)?),
        Some(_) => Err(DirectiveError::MultipleLabels),
    }
}

// ============================================================================
// Namespace blocks
// ============================================================================

fn apply_namespace(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
    opts: &OptionSet,
) -> Result<String, DirectiveError> {
    let spec = opts.require_ref("target")?;
    let id = resolve_single(corpus, ctx, spec)?;
    if corpus.node(id).kind != NodeKind::Namespace {
        return Err(DirectiveError::NotANamespace {
            name: corpus.node(id).qualified_name(),
        });
    }
    let anonymous = opts.bool_flag("anonymous");
    let segments = corpus.node(id).lscope.clone();
    ctx.set_namespace(NamespaceFrame {
        node: id,
        segments: segments.len(),
        anonymous,
    })?;
    Ok(emitter.namespace_open(&segments, anonymous))
}

fn apply_end_namespace(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
) -> Result<String, DirectiveError> {
    let frame = ctx.clear_namespace(corpus)?;
    let name = corpus.node(frame.node).qualified_name();
    Ok(emitter.namespace_close(frame.segments, frame.anonymous, &name))
}

// ============================================================================
// Class blocks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassForm {
    Plain,
    Template,
    Exception,
}

fn apply_class(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
    opts: &OptionSet,
    indent: &str,
    form: ClassForm,
) -> Result<String, DirectiveError> {
    let spec = opts.require_ref("target")?;
    let id = resolve_single(corpus, ctx, spec)?;
    let node_name = corpus.node(id).qualified_name();
    if !corpus.node(id).kind.is_class() {
        return Err(DirectiveError::NotAClass { name: node_name });
    }

    let tparams = match form {
        ClassForm::Template => {
            if !corpus.node(id).is_template {
                return Err(DirectiveError::NotTemplateClass { name: node_name });
            }
            let parameters =
                opts.code_opt("parameters")
                    .ok_or(OptionError::MissingRequired {
                        name: "parameters".to_string(),
                    })?;
            Some(parameters.trim().to_string())
        }
        ClassForm::Plain | ClassForm::Exception => {
            if corpus.node(id).is_template {
                return Err(DirectiveError::TemplateClass { name: node_name });
            }
            None
        }
    };

    // The frame goes up first: the class's own name, bases, and members all
    // format relative to the newly active scope (and template binding).
    let frame_kind = match form {
        ClassForm::Exception => FrameKind::Exception,
        _ => FrameKind::Class,
    };
    ctx.push_class(
        corpus,
        ClassFrame::new(id, frame_kind, tparams.clone(), opts.clone()),
    )?;

    let local_name = corpus.node(id).name().to_string();
    let cxx_name = emitter.format_node(corpus, ctx, id, tparams.as_deref())?;
    let pyname = opts
        .str_opt("rename")
        .map(str::to_string)
        .unwrap_or_else(|| local_name.clone());

    let exception_base = match form {
        ClassForm::Exception => Some(resolve_exception_base(corpus, ctx, emitter, opts, id)?),
        _ => None,
    };

    let bases = match form {
        ClassForm::Exception => Vec::new(),
        _ => {
            let base_refs = corpus
                .node(id)
                .scope()
                .map(|scope| scope.bases.clone())
                .unwrap_or_default();
            let mut bases = Vec::with_capacity(base_refs.len());
            for base in &base_refs {
                match base.target {
                    Some(base_id) => bases.push(emitter.format_node(
                        corpus,
                        ctx,
                        base_id,
                        base.tparams.as_deref(),
                    )?),
                    None => bases.push(base.text.clone()),
                }
            }
            bases
        }
    };

    let step = " ".repeat(emitter.config.indent);
    let indent3 = format!("{indent}{step}{step}{step}");
    let doc = match opts.code_opt("doc") {
        Some(doc) => Some(doc.to_string()),
        None => Some(emitter.format_doc(corpus, id, &indent3)),
    };
    let init_code = opts
        .code_opt("init")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}::no_init", emitter.config.bp));

    let spec = ClassOpen {
        struct_name: format!("Py{local_name}"),
        cxx_name,
        pyname,
        bases,
        init_code,
        doc,
        const_aware: opts.bool_flag("const_aware"),
        noncopyable: opts.bool_flag("noncopyable"),
        shared_ptr: opts.bool_flag("shared_ptr"),
        runtime_name: form == ClassForm::Template,
        exception_base,
    };
    Ok(emitter.class_open(&spec, indent))
}

fn resolve_exception_base(
    corpus: &mut Corpus,
    ctx: &ScopeContext,
    emitter: &Emitter,
    opts: &OptionSet,
    id: NodeId,
) -> Result<String, DirectiveError> {
    if let Some(base_spec) = opts.ref_opt("base") {
        let base_id = resolve_single(corpus, ctx, base_spec)?;
        return Ok(emitter.format_node(corpus, ctx, base_id, None)?);
    }
    let first_base = corpus
        .node(id)
        .scope()
        .and_then(|scope| scope.bases.first().cloned());
    match first_base {
        Some(base) => match base.target {
            Some(base_id) => Ok(emitter.format_node(corpus, ctx, base_id, None)?),
            None => Ok(base.text),
        },
        None => Err(DirectiveError::MissingExceptionBase {
            name: corpus.node(id).qualified_name(),
        }),
    }
}

fn apply_end_class(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
    indent: &str,
    expected: FrameKind,
) -> Result<String, DirectiveError> {
    let (class_id, frame_kind, options, customized, mut static_methods) = {
        let frame = ctx
            .active_class()
            .ok_or(ScopeError::UnbalancedClassClose)?;
        (
            frame.node,
            frame.kind,
            frame.options.clone(),
            frame.customized.clone(),
            frame.static_methods.clone(),
        )
    };
    if frame_kind != expected {
        return Err(DirectiveError::MismatchedClose {
            close: match expected {
                FrameKind::Class => "end_class",
                FrameKind::Exception => "end_exception",
            },
            open: match frame_kind {
                FrameKind::Class => "class",
                FrameKind::Exception => "exception",
            },
        });
    }

    let step = " ".repeat(emitter.config.indent);
    let sweep_indent = format!("{indent}{step}{step}");
    let selected = select_members(
        corpus,
        class_id,
        options.str_opt("include_regex").filter(|p| !p.is_empty()),
        options.str_opt("ignore_regex").filter(|p| !p.is_empty()),
        options.list("include_list"),
        options.list("ignore_list"),
    )?;

    let mut statements = Vec::new();
    for member in selected {
        if corpus.node(member).is_template {
            continue;
        }
        if customized.contains(&corpus.node(member).refid) {
            continue;
        }
        if let Some((text, static_method)) =
            sweep_fragment(corpus, ctx, emitter, member, &sweep_indent)?
        {
            statements.push(text);
            if let Some(name) = static_method {
                if !static_methods.contains(&name) {
                    static_methods.push(name);
                }
            }
        }
    }

    ctx.pop_class()?;
    Ok(emitter.class_close(&statements, &static_methods, indent))
}

/// Select the active class's members against include/ignore filters, in
/// declaration order.
fn select_members(
    corpus: &Corpus,
    class_id: NodeId,
    include_regex: Option<&str>,
    ignore_regex: Option<&str>,
    include_list: &[RefSpec],
    ignore_list: &[RefSpec],
) -> Result<Vec<NodeId>, DirectiveError> {
    let scope = corpus.node(class_id).lscope.clone();
    let children: Vec<String> = corpus
        .node(class_id)
        .scope()
        .map(|detail| detail.children.clone())
        .unwrap_or_default();

    let mut selected: Vec<NodeId> = Vec::new();
    let mut seen: HashSet<NodeId> = HashSet::new();

    if let Some(pattern) = include_regex {
        let include = compile_pattern(pattern)?;
        let ignore = ignore_regex.map(compile_pattern).transpose()?;
        for name in &children {
            if !matches_start(&include, name) {
                continue;
            }
            if let Some(ignore) = &ignore {
                if matches_start(ignore, name) {
                    continue;
                }
            }
            let Some(set) = corpus.overload_set(&child_key(&scope, name)) else {
                continue;
            };
            for id in set.iterate(corpus.nodes(), None)? {
                if seen.insert(id) {
                    selected.push(id);
                }
            }
        }
    }
    for spec in ignore_list {
        let set = child_set(corpus, &scope, spec)?;
        for id in set.iterate(corpus.nodes(), spec.labels.as_deref())? {
            seen.remove(&id);
            selected.retain(|s| *s != id);
        }
    }
    for spec in include_list {
        let set = child_set(corpus, &scope, spec)?;
        for id in set.iterate(corpus.nodes(), spec.labels.as_deref())? {
            if seen.insert(id) {
                selected.push(id);
            }
        }
    }
    Ok(selected)
}

fn child_key(scope: &[String], name: &str) -> Vec<String> {
    let mut key = scope.to_vec();
    key.push(name.to_string());
    key
}

fn child_set(
    corpus: &Corpus,
    scope: &[String],
    spec: &RefSpec,
) -> Result<OverloadSet, DirectiveError> {
    let mut key = scope.to_vec();
    key.extend(spec.path.iter().cloned());
    corpus
        .overload_set(&key)
        .cloned()
        .ok_or_else(|| {
            DirectiveError::Lookup(LookupError::NameNotFound {
                name: spec.qualified_name(),
                scope: scope.join("::"),
            })
        })
}

fn compile_pattern(pattern: &str) -> Result<Regex, DirectiveError> {
    Regex::new(pattern).map_err(|err| DirectiveError::BadPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

/// Match anchored at the start of the name only.
fn matches_start(regex: &Regex, name: &str) -> bool {
    regex.find(name).map(|m| m.start() == 0).unwrap_or(false)
}

/// One member's sweep emission: the fragment text plus a static-method name
/// to register, or `None` for kinds with no member emission.
fn sweep_fragment(
    corpus: &mut Corpus,
    ctx: &ScopeContext,
    emitter: &Emitter,
    id: NodeId,
    indent: &str,
) -> Result<Option<(String, Option<String>)>, DirectiveError> {
    match corpus.node(id).kind {
        NodeKind::Function => {
            if corpus.is_constructor(id) {
                let text = emitter.constructor_def(
                    corpus,
                    ctx,
                    id,
                    indent,
                    Some("wrapper"),
                    None,
                    None,
                    None,
                )?;
                Ok(Some((text, None)))
            } else {
                let call = emitter.function_def(
                    corpus,
                    ctx,
                    id,
                    indent,
                    CallOptions {
                        wrapper: Some("wrapper"),
                        ..CallOptions::default()
                    },
                )?;
                Ok(Some((call.text, call.static_method)))
            }
        }
        NodeKind::Variable => {
            let text = emitter.variable_def(corpus, ctx, id, indent, Some("wrapper"), None, None)?;
            Ok(Some((text, None)))
        }
        NodeKind::Typedef => {
            let text = emitter.typedef_def(corpus, ctx, id, "wrapper", None)?;
            Ok(Some((text, None)))
        }
        NodeKind::Enum => {
            let text = emitter.enum_def(corpus, ctx, id, indent, None, None, true)?;
            Ok(Some((text, None)))
        }
        NodeKind::EnumValue => Ok(emitter
            .enum_value_def(corpus, ctx, id, Some("wrapper"), None)?
            .map(|text| (text, None))),
        _ => Ok(None),
    }
}

// ============================================================================
// Simple directives
// ============================================================================

fn apply_function(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
    opts: &OptionSet,
    indent: &str,
) -> Result<String, DirectiveError> {
    let spec = opts.require_ref("target")?;
    let id = resolve_single(corpus, ctx, spec)?;
    let call = emitter.function_def(
        corpus,
        ctx,
        id,
        indent,
        CallOptions {
            wrapper: None,
            pyname: opts.str_opt("rename"),
            tparams: opts.code_opt("tparams"),
            pointer: opts.code_opt("pointer"),
            policies: opts.code_opt("policies"),
            args: opts.code_opt("args"),
            doc: opts.code_opt("doc"),
        },
    )?;
    if let Some(name) = &call.static_method {
        if ctx.active_class().is_some() {
            ctx.mark_static_method(name)?;
        }
    }
    Ok(call.text)
}

fn apply_member(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
    opts: &OptionSet,
    indent: &str,
) -> Result<String, DirectiveError> {
    if ctx.active_class().is_none() {
        return Err(ScopeError::NoActiveClass.into());
    }
    let spec = opts.require_ref("target")?;
    let id = resolve_single(corpus, ctx, spec)?;
    let name = corpus.node(id).qualified_name();
    let rename = opts.str_opt("rename");

    let text = match corpus.node(id).kind {
        NodeKind::Function if corpus.is_constructor(id) => {
            if rename.is_some() {
                return Err(DirectiveError::RenamedConstructor { name });
            }
            if opts.code_opt("pointer").is_some() {
                return Err(DirectiveError::ConstructorPointer { name });
            }
            if opts.code_opt("tparams").is_some() {
                return Err(DirectiveError::TemplatedConstructor { name });
            }
            emitter.constructor_def(
                corpus,
                ctx,
                id,
                indent,
                Some("wrapper"),
                opts.code_opt("policies"),
                opts.code_opt("args"),
                opts.code_opt("doc"),
            )?
        }
        NodeKind::Function => {
            let call = emitter.function_def(
                corpus,
                ctx,
                id,
                indent,
                CallOptions {
                    wrapper: Some("wrapper"),
                    pyname: rename,
                    tparams: opts.code_opt("tparams"),
                    pointer: opts.code_opt("pointer"),
                    policies: opts.code_opt("policies"),
                    args: opts.code_opt("args"),
                    doc: opts.code_opt("doc"),
                },
            )?;
            if let Some(static_name) = &call.static_method {
                ctx.mark_static_method(static_name)?;
            }
            call.text
        }
        NodeKind::Variable => emitter.variable_def(
            corpus,
            ctx,
            id,
            indent,
            Some("wrapper"),
            rename,
            opts.code_opt("doc"),
        )?,
        NodeKind::Typedef => emitter.typedef_def(corpus, ctx, id, "wrapper", rename)?,
        NodeKind::Enum => emitter.enum_def(
            corpus,
            ctx,
            id,
            indent,
            rename,
            opts.code_opt("doc"),
            true,
        )?,
        NodeKind::EnumValue => emitter
            .enum_value_def(corpus, ctx, id, Some("wrapper"), rename)?
            .unwrap_or_default(),
        _ => String::new(),
    };
    let refid = corpus.node(id).refid.clone();
    ctx.mark_customized(&refid)?;
    Ok(text)
}

fn apply_members(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
    opts: &OptionSet,
    indent: &str,
) -> Result<String, DirectiveError> {
    let class_id = ctx
        .active_class()
        .ok_or(ScopeError::NoActiveClass)?
        .node;
    let customized = ctx
        .active_class()
        .map(|frame| frame.customized.clone())
        .unwrap_or_default();
    let selected = select_members(
        corpus,
        class_id,
        opts.str_opt("include_regex").filter(|p| !p.is_empty()),
        opts.str_opt("ignore_regex").filter(|p| !p.is_empty()),
        opts.list("include_list"),
        opts.list("ignore_list"),
    )?;

    let mut fragments = Vec::new();
    for member in selected {
        if corpus.node(member).is_template {
            continue;
        }
        if customized.contains(&corpus.node(member).refid) {
            continue;
        }
        let Some((text, static_method)) = sweep_fragment(corpus, ctx, emitter, member, indent)?
        else {
            continue;
        };
        fragments.push(text);
        if let Some(name) = static_method {
            ctx.mark_static_method(&name)?;
        }
        let refid = corpus.node(member).refid.clone();
        ctx.mark_customized(&refid)?;
    }
    Ok(fragments.join(&format!(";\n{indent}")))
}

fn apply_enum(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
    opts: &OptionSet,
    indent: &str,
) -> Result<String, DirectiveError> {
    let spec = opts.require_ref("target")?;
    let id = resolve_single(corpus, ctx, spec)?;
    if corpus.node(id).kind != NodeKind::Enum {
        return Err(DirectiveError::NotAnEnum {
            name: corpus.node(id).qualified_name(),
        });
    }
    let text = emitter.enum_def(
        corpus,
        ctx,
        id,
        indent,
        opts.str_opt("rename"),
        opts.code_opt("doc"),
        opts.bool_flag("export_values"),
    )?;
    if ctx.active_class().is_some() {
        let refid = corpus.node(id).refid.clone();
        ctx.mark_customized(&refid)?;
    }
    Ok(text)
}

fn apply_doc(
    corpus: &mut Corpus,
    ctx: &mut ScopeContext,
    emitter: &Emitter,
    opts: &OptionSet,
    indent: &str,
) -> Result<String, DirectiveError> {
    let spec = opts.require_ref("target")?;
    let id = resolve_single(corpus, ctx, spec)?;
    Ok(emitter.format_doc(corpus, id, indent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_closed() {
        assert_eq!(MacroKind::from_name("class"), Some(MacroKind::Class));
        assert_eq!(MacroKind::from_name("end_class"), Some(MacroKind::EndClass));
        assert_eq!(MacroKind::from_name("Class"), None);
        assert_eq!(MacroKind::from_name("auto_method"), None);
    }

    #[test]
    fn schemas_declare_targets_first() {
        for kind in [
            MacroKind::Namespace,
            MacroKind::Class,
            MacroKind::TemplateClass,
            MacroKind::Exception,
            MacroKind::Function,
            MacroKind::Member,
            MacroKind::Enum,
            MacroKind::Doc,
        ] {
            let schema = kind.schema();
            assert_eq!(schema[0].name, "target", "{kind:?} schema");
        }
    }

    #[test]
    fn template_class_takes_parameters_second() {
        let schema = MacroKind::TemplateClass.schema();
        assert_eq!(schema[1].name, "parameters");
    }

    #[test]
    fn close_directives_take_no_options() {
        assert!(MacroKind::EndClass.schema().is_empty());
        assert!(MacroKind::EndNamespace.schema().is_empty());
    }

    #[test]
    fn start_anchored_matching() {
        let re = Regex::new(r"get\w*").unwrap();
        assert!(matches_start(&re, "getValue"));
        assert!(!matches_start(&re, "unsafeGetValue"));
    }
}
