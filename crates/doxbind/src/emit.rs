//! Code emitter: renders resolved symbols as wrapper source fragments.
//!
//! Everything here is scope-relative: qualified names drop the segments
//! shared with the active namespace, and templated classes on the enclosing
//! chain substitute the active template-argument binding. Cross-references
//! that dangle (refid absent from the corpus) degrade to their literal text
//! with a warning; that is the only recoverable failure in the generator.
//!
//! Output conventions follow the wrapper library idiom: `bp` aliases the
//! binding library namespace, `bpx` its extensions, documentation strings
//! are wrapped at a fixed column and emitted as adjacent C string literals.

use thiserror::Error;
use tracing::warn;

use doxbind_core::model::{CxxType, Detail, DocBlock, NodeId, NodeKind, Param, TypeRef};
use doxbind_core::{Corpus, CorpusError, LookupError};

use crate::scope::ScopeContext;

/// Emitter configuration.
#[derive(Debug, Clone)]
pub struct EmitConfig {
    /// Alias of the binding library namespace.
    pub bp: String,
    /// Alias of the binding extensions namespace.
    pub bpx: String,
    /// Spaces per indentation step.
    pub indent: usize,
    /// Column width for wrapped documentation.
    pub doc_width: usize,
}

impl Default for EmitConfig {
    fn default() -> Self {
        EmitConfig {
            bp: "bp".to_string(),
            bpx: "bpx".to_string(),
            indent: 4,
            doc_width: 80,
        }
    }
}

/// Emission failures. Corpus failures stay fatal; everything else names the
/// symbol it failed on.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    /// A templated callable needs explicit template parameters to take a
    /// pointer to.
    #[error("cannot generate a pointer for '{name}' without template parameters")]
    TemplatePointer { name: String },
}

/// Explicit overrides for one callable emission; unset fields fall back to
/// values derived from the symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions<'a> {
    /// Wrapper variable to call `.def` on; `None` emits a free `bp::def`.
    pub wrapper: Option<&'a str>,
    pub pyname: Option<&'a str>,
    pub tparams: Option<&'a str>,
    pub pointer: Option<&'a str>,
    pub policies: Option<&'a str>,
    pub args: Option<&'a str>,
    pub doc: Option<&'a str>,
}

/// One emitted callable plus its static-method marker, if any.
#[derive(Debug, Clone)]
pub struct EmittedCall {
    pub text: String,
    /// Python name to register with `staticmethod()` at class close.
    pub static_method: Option<String>,
}

/// Everything the class-open emission needs, pre-formatted by the caller.
#[derive(Debug, Clone)]
pub struct ClassOpen {
    pub struct_name: String,
    /// Scope-relative C++ name, template arguments included.
    pub cxx_name: String,
    pub pyname: String,
    pub bases: Vec<String>,
    pub init_code: String,
    pub doc: Option<String>,
    pub const_aware: bool,
    pub noncopyable: bool,
    pub shared_ptr: bool,
    /// Template classes take the Python name as a runtime argument.
    pub runtime_name: bool,
    /// Exception wrappers build through `declareException` with this base.
    pub exception_base: Option<String>,
}

/// The code emitter.
#[derive(Debug, Default)]
pub struct Emitter {
    pub config: EmitConfig,
}

impl Emitter {
    pub fn new(config: EmitConfig) -> Self {
        Emitter { config }
    }

    fn step(&self) -> String {
        " ".repeat(self.config.indent)
    }

    // ========================================================================
    // Names and types
    // ========================================================================

    /// Render a node's qualified name relative to the active scope.
    ///
    /// `tparams` supplies explicit template arguments for the target itself;
    /// templated classes on the enclosing chain take their binding from the
    /// open class frames.
    pub fn format_node(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        tparams: Option<&str>,
    ) -> Result<String, EmitError> {
        self.qualify(corpus, ctx, id, tparams, Vec::new(), false)
    }

    fn qualify(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        tparams: Option<&str>,
        mut terms: Vec<String>,
        add_typename: bool,
    ) -> Result<String, EmitError> {
        corpus.ensure_loaded(id)?;
        let target_kind = corpus.node(id).kind;
        let mut prefix = if add_typename { "typename " } else { "" };
        let mut current = Some(id);
        while let Some(cur) = current {
            corpus.ensure_loaded(cur)?;
            let (kind, name, refid, is_template, fscope) = {
                let node = corpus.node(cur);
                (
                    node.kind,
                    node.name().to_string(),
                    node.refid.clone(),
                    node.is_template,
                    node.fscope,
                )
            };
            match kind {
                k if k.is_class() => {
                    if is_template {
                        let args: String = if cur == id {
                            match tparams {
                                Some(t) => t.to_string(),
                                None => ctx
                                    .tparams_for(corpus, &refid)
                                    .unwrap_or_default()
                                    .to_string(),
                            }
                        } else {
                            ctx.tparams_for(corpus, &refid)
                                .unwrap_or_default()
                                .to_string()
                        };
                        // A nested type under a template class is dependent.
                        if cur != id
                            && matches!(
                                target_kind,
                                NodeKind::Class
                                    | NodeKind::Struct
                                    | NodeKind::Typedef
                                    | NodeKind::Enum
                            )
                        {
                            prefix = "typename ";
                        }
                        terms.push(format!("{name}{args}"));
                    } else {
                        terms.push(name);
                    }
                }
                NodeKind::Namespace => {
                    // Elide the active namespace and all of its ancestors.
                    let mut scope = ctx.namespace();
                    let mut elide = false;
                    while let Some(s) = scope {
                        if corpus.node(s).refid == refid {
                            elide = true;
                            break;
                        }
                        scope = corpus.node(s).fscope;
                    }
                    if elide {
                        break;
                    }
                    terms.push(name);
                }
                _ => {
                    if is_template && cur == id {
                        if let Some(t) = tparams {
                            terms.push(format!("{name}{t}"));
                        } else {
                            terms.push(name);
                        }
                    } else {
                        terms.push(name);
                    }
                }
            }
            current = fscope;
        }
        terms.reverse();
        Ok(format!("{}{}", prefix, terms.join("::")))
    }

    /// Render one cross-reference: the resolved name, or the literal
    /// reference text when the corpus has no such identifier.
    pub fn format_ref(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        type_ref: &TypeRef,
    ) -> Result<String, EmitError> {
        let Some(target) = corpus.node_by_refid(&type_ref.refid) else {
            warn!(
                "could not resolve '{}' - scope may be incomplete (add xml directories \
                 to resolve this)",
                type_ref.text
            );
            return Ok(type_ref.text.clone());
        };
        corpus.ensure_loaded(target)?;
        if corpus.node(target).is_template {
            if type_ref.has_tparams {
                // The site text supplies explicit template arguments; emit
                // the bare qualified name and let the text carry the rest.
                let name = corpus.node(target).name().to_string();
                return match corpus.node(target).fscope {
                    Some(fscope) => self.qualify(
                        corpus,
                        ctx,
                        fscope,
                        None,
                        vec![name],
                        type_ref.has_nested,
                    ),
                    None if type_ref.has_nested => Ok(format!("typename {name}")),
                    None => Ok(name),
                };
            }
            let site_name = type_ref.text.rsplit("::").next().unwrap_or(&type_ref.text);
            if corpus.node(target).name() != site_name {
                // The reference site names an alias of the template; resolve
                // the literal text instead, falling back to it on a miss.
                let path: Vec<String> =
                    type_ref.text.split("::").map(str::to_string).collect();
                let scope = ctx.active_path(corpus);
                return match corpus.lookup(&path, &scope) {
                    Ok(set) => match set.get(corpus.nodes()) {
                        Ok(resolved) => self.format_node(corpus, ctx, resolved, None),
                        Err(_) => Ok(type_ref.text.clone()),
                    },
                    Err(LookupError::Corpus(err)) => Err(EmitError::Corpus(err)),
                    Err(_) => Ok(type_ref.text.clone()),
                };
            }
        }
        self.format_node(corpus, ctx, target, None)
    }

    /// Render a type expression, substituting formatted cross-references
    /// into its placeholder template.
    pub fn format_type(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        cxx: &CxxType,
    ) -> Result<String, EmitError> {
        let mut formatted = Vec::with_capacity(cxx.refs.len());
        for type_ref in &cxx.refs {
            formatted.push(self.format_ref(corpus, ctx, type_ref)?);
        }
        let out = substitute(&cxx.template, &formatted);
        Ok(out.replace("typename typename ", "typename "))
    }

    // ========================================================================
    // Documentation
    // ========================================================================

    /// Assemble a docstring literal: brief paragraphs, a per-parameter
    /// `Arguments:` table, then detailed paragraphs, wrapped at the doc
    /// width. Code blocks pass through unwrapped. The result includes the
    /// surrounding quotes; continuation lines carry `indent`.
    pub fn format_doc(&self, corpus: &Corpus, id: NodeId, indent: &str) -> String {
        let node = corpus.node(id);
        let width = self.config.doc_width;
        let mut lines: Vec<String> = Vec::new();

        for block in &node.brief {
            push_block(&mut lines, block, width);
        }

        if let Some(callable) = node.callable() {
            self.push_param_table(&mut lines, &callable.params, width);
        }

        for block in &node.detailed {
            push_block(&mut lines, block, width);
        }

        if lines.is_empty() {
            return "\"\"".to_string();
        }
        let escaped: Vec<String> = lines
            .iter()
            .map(|line| line.replace('\\', "\\\\").replace('"', "\\\""))
            .collect();
        let mut out = format!("\"{}\\n\"", escaped[0]);
        for line in &escaped[1..] {
            out.push_str(&format!("\n{indent}\"{line}\\n\""));
        }
        out
    }

    fn push_param_table(&self, lines: &mut Vec<String>, params: &[Param], width: usize) {
        let name_width = params
            .iter()
            .filter(|p| p.name.is_some() && !p.brief.is_empty())
            .map(|p| p.name.as_deref().unwrap_or("").len())
            .max()
            .unwrap_or(0);
        if name_width == 0 {
            return;
        }
        lines.push("Arguments:".to_string());
        let hang = " ".repeat(name_width + 5);
        for param in params {
            let Some(name) = param.name.as_deref() else {
                continue;
            };
            let sep = "-".repeat(name_width + 1 - name.len());
            let mut blocks = param.brief.iter();
            match blocks.next() {
                Some(DocBlock::Text(text)) => {
                    lines.extend(wrap_indented(
                        &format!("{name} {sep} {text}"),
                        width,
                        "  ",
                        &hang,
                    ));
                }
                Some(DocBlock::Code(code)) => lines.extend(code.iter().cloned()),
                None => continue,
            }
            for block in blocks {
                push_block_no_break(lines, block, width);
            }
        }
        lines.push(String::new());
    }

    // ========================================================================
    // Callables
    // ========================================================================

    /// Parenthesized keyword-argument list, or `None` when the callable has
    /// no parameters or any parameter is unnamed (an unnamed parameter
    /// cannot be keyworded).
    pub fn keyword_list(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
    ) -> Result<Option<String>, EmitError> {
        let params = match corpus.node(id).callable() {
            Some(callable) => callable.params.clone(),
            None => return Ok(None),
        };
        if params.is_empty() || params.iter().any(|p| p.name.is_none()) {
            return Ok(None);
        }
        let mut terms = Vec::with_capacity(params.len());
        for param in &params {
            let default = match &param.default {
                None => String::new(),
                // A null-pointer default maps to the Python None object.
                Some(d) if d.template.trim() == "0" && param.cxx_type.is_pointer => {
                    format!("={}::object()", self.config.bp)
                }
                Some(d) => format!("={}", self.format_type(corpus, ctx, d)?),
            };
            terms.push(format!(
                "{}::arg(\"{}\"){}",
                self.config.bp,
                param.name.as_deref().unwrap_or(""),
                default
            ));
        }
        Ok(Some(format!("({})", terms.join(", "))))
    }

    /// Comma-separated formatted parameter types.
    pub fn param_types(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
    ) -> Result<String, EmitError> {
        let params = match corpus.node(id).callable() {
            Some(callable) => callable.params.clone(),
            None => return Ok(String::new()),
        };
        let mut types = Vec::with_capacity(params.len());
        for param in &params {
            types.push(self.format_type(corpus, ctx, &param.cxx_type)?);
        }
        Ok(types.join(", "))
    }

    /// A function pointer to the callable, cast to its exact type when (and
    /// only when) the overload set holds more than one member.
    pub fn pointer_cast(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        tparams: Option<&str>,
    ) -> Result<String, EmitError> {
        let (is_template, is_static, is_const, result) = {
            let node = corpus.node(id);
            let callable = node.callable();
            (
                node.is_template,
                callable.map(|c| c.is_static).unwrap_or(false),
                callable.map(|c| c.is_const).unwrap_or(false),
                callable.map(|c| c.result.clone()).unwrap_or_default(),
            )
        };
        if tparams.is_none() && is_template {
            return Err(EmitError::TemplatePointer {
                name: corpus.node(id).qualified_name(),
            });
        }
        let name = self.format_node(corpus, ctx, id, tparams)?;
        if !corpus.is_overloaded(id) {
            return Ok(format!("&{name}"));
        }
        let params = self.param_types(corpus, ctx, id)?;
        let ret = self.format_type(corpus, ctx, &result)?;
        if corpus.is_method(id) && !is_static {
            let fscope = corpus.node(id).fscope;
            let class_name = match fscope {
                Some(f) => self.format_node(corpus, ctx, f, None)?,
                None => String::new(),
            };
            let constness = if is_const { " const" } else { "" };
            Ok(format!(
                "({ret} ({class_name}::*)({params}){constness})&{name}"
            ))
        } else {
            Ok(format!("({ret} (*)({params}))&{name}"))
        }
    }

    /// A constructor visitor for use inside a wrapper's `def` call.
    pub fn init_visitor(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        indent: &str,
        policies: Option<&str>,
        args: Option<&str>,
        doc: Option<&str>,
    ) -> Result<String, EmitError> {
        let bp = &self.config.bp;
        let indent1 = format!("{indent}{}", self.step());
        let doc = match doc {
            Some(d) => d.to_string(),
            None => self.format_doc(corpus, id, &indent1),
        };
        let args = match args {
            Some(a) => Some(a.to_string()),
            None => self.keyword_list(corpus, ctx, id)?,
        };
        let has_params = corpus
            .node(id)
            .callable()
            .map(|c| !c.params.is_empty())
            .unwrap_or(false);
        let body = match (has_params, args) {
            (true, Some(args)) => {
                let param_types = self.param_types(corpus, ctx, id)?;
                format!(
                    "{bp}::init< {param_types} >(\n{indent1}{args},\n{indent1}{doc}\n{indent})"
                )
            }
            _ => format!("{bp}::init<>(\n{indent1}{doc}\n{indent})"),
        };
        match policies {
            Some(policies) => Ok(format!("{body}[{policies}]")),
            None => Ok(body),
        }
    }

    /// A `def` call for a function or method.
    pub fn function_def(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        indent: &str,
        opts: CallOptions<'_>,
    ) -> Result<EmittedCall, EmitError> {
        let indent1 = format!("{indent}{}", self.step());
        let pyname = opts
            .pyname
            .map(str::to_string)
            .unwrap_or_else(|| corpus.node(id).name().to_string());
        let args = match opts.args {
            Some(a) => Some(a.to_string()),
            None => self.keyword_list(corpus, ctx, id)?,
        };
        let doc = match opts.doc {
            Some(d) => d.to_string(),
            None => self.format_doc(corpus, id, &indent1),
        };
        let pointer = match opts.pointer {
            Some(p) => p.to_string(),
            None => self.pointer_cast(corpus, ctx, id, opts.tparams)?,
        };
        let mut terms = vec![format!("\"{pyname}\""), pointer];
        if let Some(args) = args {
            terms.push(args);
        }
        if let Some(policies) = opts.policies {
            terms.push(policies.to_string());
        }
        if !doc_is_empty(&doc) {
            terms.push(doc);
        }
        let static_method = (corpus.is_method(id) && corpus.node(id).is_static())
            .then(|| pyname.clone());
        let head = match opts.wrapper {
            Some(wrapper) => format!("{wrapper}.def"),
            None => format!("{}::def", self.config.bp),
        };
        let body = terms.join(&format!(",\n{indent1}"));
        Ok(EmittedCall {
            text: format!("{head}(\n{indent1}{body}\n{indent})"),
            static_method,
        })
    }

    /// A `def` call wrapping a constructor visitor.
    pub fn constructor_def(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        indent: &str,
        wrapper: Option<&str>,
        policies: Option<&str>,
        args: Option<&str>,
        doc: Option<&str>,
    ) -> Result<String, EmitError> {
        let indent1 = format!("{indent}{}", self.step());
        let visitor = self.init_visitor(corpus, ctx, id, &indent1, policies, args, doc)?;
        let head = match wrapper {
            Some(wrapper) => format!("{wrapper}.def"),
            None => format!("{}::def", self.config.bp),
        };
        Ok(format!("{head}(\n{indent1}{visitor}\n{indent})"))
    }

    // ========================================================================
    // Data members, typedefs, enums
    // ========================================================================

    /// A `data_member` wrapper for a variable.
    pub fn variable_def(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        indent: &str,
        wrapper: Option<&str>,
        pyname: Option<&str>,
        doc: Option<&str>,
    ) -> Result<String, EmitError> {
        let bpx = &self.config.bpx;
        let indent1 = format!("{indent}{}", self.step());
        let indent2 = format!("{indent1}{}", self.step());
        let name = self.format_node(corpus, ctx, id, None)?;
        let pyname = pyname
            .map(str::to_string)
            .unwrap_or_else(|| corpus.node(id).name().to_string());
        let head = match wrapper {
            Some(wrapper) => format!("{wrapper}.def"),
            None => format!("{}::def", self.config.bp),
        };
        if corpus.node(id).is_static() {
            return Ok(format!("{head}({bpx}::data_member(\"{pyname}\", &{name}))"));
        }
        let doc = match doc {
            Some(d) => d.to_string(),
            None => self.format_doc(corpus, id, &indent2),
        };
        Ok(format!(
            "{head}(\n{indent1}{bpx}::data_member(\n{indent2}\"{pyname}\",\n{indent2}&{name},\n{indent2}{doc}\n{indent1})\n{indent})"
        ))
    }

    /// A static type-lookup property for a typedef.
    pub fn typedef_def(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        wrapper: &str,
        pyname: Option<&str>,
    ) -> Result<String, EmitError> {
        let bpx = &self.config.bpx;
        let name = self.format_node(corpus, ctx, id, None)?;
        let pyname = pyname
            .map(str::to_string)
            .unwrap_or_else(|| corpus.node(id).name().to_string());
        Ok(format!(
            "{wrapper}.add_static_property(\"{pyname}\", &{bpx}::lookup_type< {name} >)"
        ))
    }

    /// A `setattr` of an anonymous enum's value; named-enum values emit
    /// nothing here (the enum declaration carries them).
    pub fn enum_value_def(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        wrapper: Option<&str>,
        pyname: Option<&str>,
    ) -> Result<Option<String>, EmitError> {
        let owner = match &corpus.node(id).detail {
            Detail::EnumValue(detail) => detail.owner,
            _ => return Ok(None),
        };
        if !corpus.node(owner).name().starts_with('@') {
            return Ok(None);
        }
        let name = self.format_node(corpus, ctx, id, None)?;
        let pyname = pyname
            .map(str::to_string)
            .unwrap_or_else(|| corpus.node(id).name().to_string());
        let head = match wrapper {
            Some(wrapper) => format!("{wrapper}.setattr"),
            None => "setattr".to_string(),
        };
        Ok(Some(format!("{head}(\"{pyname}\", int({name}))")))
    }

    /// A complete `enum_` declaration with its `.value` chain.
    pub fn enum_def(
        &self,
        corpus: &mut Corpus,
        ctx: &ScopeContext,
        id: NodeId,
        indent: &str,
        pyname: Option<&str>,
        doc: Option<&str>,
        export_values: bool,
    ) -> Result<String, EmitError> {
        let bp = &self.config.bp;
        let indent1 = format!("{indent}{}", self.step());
        let doc = match doc {
            Some(d) => d.to_string(),
            None => self.format_doc(corpus, id, &indent1),
        };
        let pyname = pyname
            .map(str::to_string)
            .unwrap_or_else(|| corpus.node(id).name().to_string());
        let name = self.format_node(corpus, ctx, id, None)?;
        let values = match &corpus.node(id).detail {
            Detail::Enum(detail) => detail.values.clone(),
            _ => Vec::new(),
        };
        let mut lines = Vec::new();
        if !doc_is_empty(&doc) {
            lines.push(format!(
                "{bp}::enum_< {name} >(\n{indent1}\"{pyname}\",\n{indent1}{doc}\n{indent})"
            ));
        } else {
            lines.push(format!("{bp}::enum_< {name} >(\"{pyname}\")"));
        }
        for value in values {
            let value_name = corpus.node(value).name().to_string();
            let formatted = self.format_node(corpus, ctx, value, None)?;
            lines.push(format!("{indent1}.value(\"{value_name}\", {formatted})"));
        }
        if export_values {
            lines.push(format!("{indent1}.export_values()"));
        }
        Ok(lines.join("\n"))
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// The opening of a class wrapper: struct, `declare()`, wrapper
    /// construction, scope, and shared-pointer registration. The block's
    /// member directives continue inside `declare()`.
    pub fn class_open(&self, spec: &ClassOpen, indent: &str) -> String {
        let bp = &self.config.bp;
        let bpx = &self.config.bpx;
        let step = self.step();
        let i1 = format!("{indent}{step}");
        let i2 = format!("{i1}{step}");
        let i3 = format!("{i2}{step}");
        let struct_name = &spec.struct_name;
        let name = &spec.cxx_name;

        if let Some(base) = &spec.exception_base {
            return format!(
                "struct {struct_name} {{\n\n\
                 {i1}static void declare() {{\n\
                 {i2}{bp}::class_< {name}, {bp}::bases< {base} > > wrapper =\n\
                 {i3}{bpx}::declareException< {name}, {base} >(\"{pyname}\");\n\
                 {i2}{bp}::scope in_wrapper(wrapper);",
                pyname = spec.pyname,
            );
        }

        let mut tbody = Vec::new();
        let scope_arg = if spec.const_aware {
            tbody.push(format!("{bpx}::const_aware< {name} >"));
            "wrapper.main_class()"
        } else {
            tbody.push(name.clone());
            "wrapper"
        };
        if !spec.bases.is_empty() {
            tbody.push(format!("{bp}::bases< {} >", spec.bases.join(", ")));
        }
        if spec.noncopyable {
            tbody.push("boost::noncopyable".to_string());
        }
        let tbody = tbody.join(", ");

        let (func_args, first_term) = if spec.runtime_name {
            ("char const * pyname", "pyname".to_string())
        } else {
            ("", format!("\"{}\"", spec.pyname))
        };
        let mut pbody = vec![first_term];
        if let Some(doc) = &spec.doc {
            if !doc_is_empty(doc) {
                pbody.push(doc.clone());
            }
        }
        pbody.push(spec.init_code.clone());
        let pbody = pbody.join(&format!(",\n{i3}"));

        let mut out = format!(
            "struct {struct_name} {{\n\n\
             {i1}static void declare({func_args}) {{\n\
             {i2}{bp}::class_< {tbody} > wrapper(\n\
             {i3}{pbody}\n\
             {i2});\n\
             {i2}{bp}::scope in_wrapper({scope_arg});"
        );
        if spec.shared_ptr {
            if spec.const_aware {
                out.push_str(&format!("\n{i2}wrapper.enable_shared_ptr();"));
            } else {
                out.push_str(&format!(
                    "\n{i2}{bp}::register_ptr_to_python< boost::shared_ptr< {name} > >();"
                ));
            }
        }
        out
    }

    /// The close of a class wrapper: remaining sweep statements, the
    /// `customize` hook call, pending `staticmethod` registrations, and the
    /// closing braces of `declare()` and the struct.
    pub fn class_close(
        &self,
        statements: &[String],
        static_methods: &[String],
        indent: &str,
    ) -> String {
        let step = self.step();
        let i1 = format!("{indent}{step}");
        let i2 = format!("{i1}{step}");
        let mut all: Vec<String> = statements.to_vec();
        all.push("customize(wrapper)".to_string());
        for name in static_methods {
            all.push(format!("wrapper.staticmethod(\"{name}\")"));
        }
        let mut out = String::new();
        for (i, statement) in all.iter().enumerate() {
            if i == 0 {
                // The close directive's column already reaches `indent`.
                out.push_str(&step.repeat(2));
            } else {
                out.push_str(&format!("\n{i2}"));
            }
            out.push_str(statement);
            out.push(';');
        }
        out.push_str(&format!("\n{i1}}}\n{indent}}};"));
        out
    }

    /// Nested namespace opening braces, innermost-anonymous included.
    pub fn namespace_open(&self, segments: &[String], anonymous: bool) -> String {
        let mut out = segments
            .iter()
            .map(|segment| format!("namespace {segment} {{"))
            .collect::<Vec<_>>()
            .join(" ");
        if anonymous {
            out.push_str(" namespace {");
        }
        out
    }

    /// Matching namespace close braces with a trailing comment.
    pub fn namespace_close(&self, segments: usize, anonymous: bool, name: &str) -> String {
        let braces = segments + usize::from(anonymous);
        format!("{} // namespace {name}", "}".repeat(braces))
    }

    /// Open a default customization hook in an anonymous namespace.
    pub fn custom_open(&self) -> String {
        "namespace {\n\ntemplate <typename Wrapper>\nvoid customize(Wrapper & wrapper) {"
            .to_string()
    }

    /// Close the customization hook and its anonymous namespace.
    pub fn custom_close(&self) -> String {
        "}\n\n} // namespace".to_string()
    }
}

// ============================================================================
// Text helpers
// ============================================================================

/// Substitute `{N}` placeholders; unknown or malformed placeholders pass
/// through unchanged.
fn substitute(template: &str, values: &[String]) -> String {
    let mut out = String::new();
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(close) = after.find('}') {
            let inner = &after[..close];
            if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
                if let Some(value) = inner
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| values.get(index))
                {
                    out.push_str(value);
                    rest = &after[close + 1..];
                    continue;
                }
            }
        }
        out.push('{');
        rest = after;
    }
    out.push_str(rest);
    out
}

/// True when a rendered docstring carries no content beyond quotes and
/// newline escapes.
pub(crate) fn doc_is_empty(doc: &str) -> bool {
    doc.trim_matches(|c| c == '"' || c == '\\' || c == 'n')
        .trim()
        .is_empty()
}

fn push_block(lines: &mut Vec<String>, block: &DocBlock, width: usize) {
    match block {
        DocBlock::Text(text) => lines.extend(wrap(text, width)),
        DocBlock::Code(code) => lines.extend(code.iter().cloned()),
    }
    lines.push(String::new());
}

fn push_block_no_break(lines: &mut Vec<String>, block: &DocBlock, width: usize) {
    match block {
        DocBlock::Text(text) => lines.extend(wrap(text, width)),
        DocBlock::Code(code) => lines.extend(code.iter().cloned()),
    }
}

/// Greedy word wrap at the given column width.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Greedy wrap with a hanging indent; the width covers the indent.
fn wrap_indented(text: &str, width: usize, initial: &str, subsequent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = initial.to_string();
    let mut content_len = 0usize;
    for word in text.split_whitespace() {
        let prefix_len = if lines.is_empty() {
            initial.len()
        } else {
            subsequent.len()
        };
        if content_len == 0 {
            current.push_str(word);
            content_len = word.len();
        } else if prefix_len + content_len + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
            content_len += 1 + word.len();
        } else {
            lines.push(std::mem::take(&mut current));
            current = format!("{subsequent}{word}");
            content_len = word.len();
        }
    }
    if content_len > 0 {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    mod text {
        use super::*;

        #[test]
        fn substitute_replaces_indexed_placeholders() {
            let values = vec!["ns::Foo".to_string(), "Bar".to_string()];
            assert_eq!(
                substitute("shared_ptr< {0} > const & {1}", &values),
                "shared_ptr< ns::Foo > const & Bar"
            );
        }

        #[test]
        fn substitute_leaves_unknown_braces_alone() {
            let values = vec!["X".to_string()];
            assert_eq!(substitute("f{ }{0}{9}", &values), "f{ }X{9}");
        }

        #[test]
        fn wrap_respects_width() {
            let lines = wrap("alpha beta gamma delta", 11);
            assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
        }

        #[test]
        fn wrap_collapses_whitespace() {
            let lines = wrap("one   two\n three", 80);
            assert_eq!(lines, vec!["one two three"]);
        }

        #[test]
        fn wrap_indented_hangs_continuations() {
            let lines = wrap_indented("x -- a b c d", 10, "  ", "     ");
            assert_eq!(lines[0], "  x -- a");
            assert!(lines[1].starts_with("     "));
        }

        #[test]
        fn empty_doc_detection() {
            assert!(doc_is_empty("\"\""));
            assert!(doc_is_empty("\"\\n\""));
            assert!(!doc_is_empty("\"Some text.\\n\""));
        }
    }

    mod blocks {
        use super::*;

        #[test]
        fn namespace_open_nests_and_anonymizes() {
            let emitter = Emitter::default();
            let segments = vec!["img".to_string(), "geom".to_string()];
            assert_eq!(
                emitter.namespace_open(&segments, true),
                "namespace img { namespace geom { namespace {"
            );
            assert_eq!(
                emitter.namespace_open(&segments, false),
                "namespace img { namespace geom {"
            );
        }

        #[test]
        fn namespace_close_balances_braces() {
            let emitter = Emitter::default();
            assert_eq!(
                emitter.namespace_close(2, true, "img::geom"),
                "}}} // namespace img::geom"
            );
        }

        #[test]
        fn class_close_emits_customize_and_statics() {
            let emitter = Emitter::default();
            let out = emitter.class_close(
                &["wrapper.def(\n        \"x\"\n    )".to_string()],
                &["make".to_string()],
                "",
            );
            assert!(out.contains("customize(wrapper);"));
            assert!(out.contains("wrapper.staticmethod(\"make\");"));
            assert!(out.ends_with("\n    }\n};"));
        }

        #[test]
        fn class_open_const_aware_wrapper() {
            let emitter = Emitter::default();
            let spec = ClassOpen {
                struct_name: "PyFoo".to_string(),
                cxx_name: "ns::Foo".to_string(),
                pyname: "Foo".to_string(),
                bases: vec![],
                init_code: "bp::no_init".to_string(),
                doc: None,
                const_aware: true,
                noncopyable: false,
                shared_ptr: true,
                runtime_name: false,
                exception_base: None,
            };
            let out = emitter.class_open(&spec, "");
            assert!(out.contains("bp::class_< bpx::const_aware< ns::Foo > > wrapper("));
            assert!(out.contains("bp::scope in_wrapper(wrapper.main_class());"));
            assert!(out.contains("wrapper.enable_shared_ptr();"));
            assert!(out.contains("static void declare() {"));
        }

        #[test]
        fn class_open_plain_wrapper_registers_shared_ptr() {
            let emitter = Emitter::default();
            let spec = ClassOpen {
                struct_name: "PyFoo".to_string(),
                cxx_name: "Foo".to_string(),
                pyname: "Foo".to_string(),
                bases: vec!["Base".to_string()],
                init_code: "bp::no_init".to_string(),
                doc: None,
                const_aware: false,
                noncopyable: true,
                shared_ptr: true,
                runtime_name: false,
                exception_base: None,
            };
            let out = emitter.class_open(&spec, "");
            assert!(out.contains("bp::class_< Foo, bp::bases< Base >, boost::noncopyable > wrapper("));
            assert!(out.contains("bp::register_ptr_to_python< boost::shared_ptr< Foo > >();"));
        }

        #[test]
        fn template_class_takes_runtime_name() {
            let emitter = Emitter::default();
            let spec = ClassOpen {
                struct_name: "PyImage".to_string(),
                cxx_name: "Image<T>".to_string(),
                pyname: "Image".to_string(),
                bases: vec![],
                init_code: "bp::no_init".to_string(),
                doc: None,
                const_aware: false,
                noncopyable: false,
                shared_ptr: false,
                runtime_name: true,
                exception_base: None,
            };
            let out = emitter.class_open(&spec, "");
            assert!(out.contains("static void declare(char const * pyname) {"));
            assert!(out.contains("pyname,"));
        }

        #[test]
        fn exception_wrapper_uses_declare_exception() {
            let emitter = Emitter::default();
            let spec = ClassOpen {
                struct_name: "PyRuntimeError".to_string(),
                cxx_name: "RuntimeError".to_string(),
                pyname: "RuntimeError".to_string(),
                bases: vec![],
                init_code: String::new(),
                doc: None,
                const_aware: false,
                noncopyable: false,
                shared_ptr: false,
                runtime_name: false,
                exception_base: Some("Exception".to_string()),
            };
            let out = emitter.class_open(&spec, "");
            assert!(out.contains(
                "bpx::declareException< RuntimeError, Exception >(\"RuntimeError\");"
            ));
        }
    }
}
