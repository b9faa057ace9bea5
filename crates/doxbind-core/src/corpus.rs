//! Corpus index: manifest loading, lazy detail loading, scoped lookup.
//!
//! The corpus is a set of root directories, each holding one manifest
//! (`index.xml`) enumerating compound entities plus one detail document per
//! compound (`<refid>.xml`). Loading is two-level lazy:
//!
//! 1. [`Corpus::load`] parses every manifest, creating one unloaded stub
//!    [`Node`] per compound and per member reference beneath it. This pass is
//!    cheap and total.
//! 2. Detail documents are parsed on first touch ([`Corpus::ensure_loaded`],
//!    triggered by [`Corpus::lookup`]). One detail pass reads the compound
//!    *and* every member it documents, so a member loaded individually loads
//!    its owning compound first.
//!
//! Name resolution is a single algorithm: outward-widening search from the
//! most specific enclosing scope (see [`Corpus::lookup`]). The most local
//! candidate always wins.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CorpusError, LookupError, LookupResult};
use crate::model::{
    BaseRef, CallableDetail, CxxType, Detail, DocBlock, EnumDetail, EnumValueDetail, Node, NodeId,
    NodeKind, Param, ScopeDetail, TypeRef, TypedefDetail, VariableDetail,
};
use crate::overloads::OverloadSet;
use crate::xml::{self, Content, Element};

/// Fixed manifest filename inside every corpus root.
pub const MANIFEST_FILE: &str = "index.xml";

/// URL prefix of the corpus-embedded command channel (`bind.label: x`,
/// `bind.ignore` inside documentation links).
pub const DOC_COMMAND_PREFIX: &str = "bind.";

/// A command attached to an entity through its documentation.
#[derive(Debug, Clone, PartialEq)]
enum DocCommand {
    Label(String),
    Ignore,
}

/// The symbol graph: an arena of nodes plus the indexes over it.
#[derive(Debug, Default)]
pub struct Corpus {
    nodes: Vec<Node>,
    by_refid: HashMap<String, NodeId>,
    by_lscope: BTreeMap<Vec<String>, OverloadSet>,
}

impl Corpus {
    /// Load every manifest under the given corpus roots.
    pub fn load(roots: &[PathBuf]) -> Result<Corpus, CorpusError> {
        let mut corpus = Corpus::default();
        for root in roots {
            corpus.load_root(root)?;
        }
        Ok(corpus)
    }

    /// Load one corpus root's manifest, creating stub nodes.
    pub fn load_root(&mut self, root: &Path) -> Result<(), CorpusError> {
        let manifest = root.join(MANIFEST_FILE);
        debug!("parsing corpus manifest '{}'", manifest.display());
        let doc = xml::load_document(&manifest)?;

        // Scope compounds first so members always attach to their syntactic
        // parent, regardless of manifest order; files and groups afterwards.
        let mut groups = Vec::new();
        for compound_xml in doc.find_all("compound") {
            let Some(kind) = compound_xml.attr("kind").and_then(NodeKind::from_corpus) else {
                continue;
            };
            if !kind.is_scope() {
                continue;
            }
            let compound_id = self.register_compound(root, compound_xml, kind)?;
            self.register_members(compound_id, compound_xml, true);
        }
        for compound_xml in doc.find_all("compound") {
            let Some(kind) = compound_xml.attr("kind").and_then(NodeKind::from_corpus) else {
                continue;
            };
            if kind.is_scope() || !kind.is_compound() {
                continue;
            }
            let compound_id = self.register_compound(root, compound_xml, kind)?;
            self.register_members(compound_id, compound_xml, false);
            if kind == NodeKind::Group {
                groups.push((compound_id, compound_xml));
            }
        }

        // A member can sit in both a group and some other compound, but it is
        // always documented in the group's detail file.
        for (group_id, group_xml) in groups {
            for member_xml in group_xml.find_all("member") {
                let Some(member_id) = member_xml
                    .attr("refid")
                    .and_then(|refid| self.by_refid.get(refid).copied())
                else {
                    continue;
                };
                debug!(
                    "re-homing member '{}' into group '{}'",
                    self.node(member_id),
                    self.node(group_id).name()
                );
                self.nodes[member_id.index()].location = Some(group_id);
            }
        }
        Ok(())
    }

    fn register_compound(
        &mut self,
        root: &Path,
        compound_xml: &Element,
        kind: NodeKind,
    ) -> Result<NodeId, CorpusError> {
        let manifest = root.join(MANIFEST_FILE);
        let refid = compound_xml
            .attr("refid")
            .ok_or_else(|| missing(&manifest, "compound without refid"))?
            .to_string();
        if let Some(&existing) = self.by_refid.get(&refid) {
            return Ok(existing);
        }
        let name = compound_xml
            .find_text("name")
            .ok_or_else(|| missing(&manifest, "compound without name"))?;
        let lscope: Vec<String> = name.split("::").map(str::to_string).collect();
        debug!("indexing compound '{}' ({})", name, refid);

        let mut node = Node::stub(refid.clone(), kind, lscope.clone());
        node.detail_file = Some(root.join(format!("{refid}.xml")));
        if kind.is_scope() {
            node.detail = Detail::Scope(ScopeDetail::default());
        }
        let id = self.push_node(node);
        if kind.is_scope() {
            self.register_overload(lscope, id);
        }
        Ok(id)
    }

    fn register_members(&mut self, compound_id: NodeId, compound_xml: &Element, scoped: bool) {
        for member_xml in compound_xml.find_all("member") {
            let Some(kind) = member_xml.attr("kind").and_then(NodeKind::from_corpus) else {
                continue;
            };
            let (Some(refid), Some(name)) = (member_xml.attr("refid"), member_xml.find_text("name"))
            else {
                continue;
            };
            if self.by_refid.contains_key(refid) {
                continue;
            }
            let lscope = if scoped {
                let mut lscope = self.node(compound_id).lscope.clone();
                lscope.push(name.clone());
                lscope
            } else {
                // File and group members resolve at global scope.
                vec![name.clone()]
            };
            debug!("indexing member '{}' ({})", lscope.join("::"), refid);
            let mut node = Node::stub(refid, kind, lscope.clone());
            node.location = Some(compound_id);
            if scoped {
                node.fscope = Some(compound_id);
            }
            let id = self.push_node(node);
            self.register_overload(lscope.clone(), id);
            if scoped {
                self.push_scope_child(compound_id, lscope.last().cloned().unwrap_or_default());
            }
        }
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.by_refid.insert(node.refid.clone(), id);
        self.nodes.push(node);
        id
    }

    fn register_overload(&mut self, lscope: Vec<String>, id: NodeId) {
        self.by_lscope
            .entry(lscope.clone())
            .or_insert_with(|| OverloadSet::new(lscope))
            .add(id);
    }

    fn push_scope_child(&mut self, scope_id: NodeId, name: String) {
        if let Detail::Scope(detail) = &mut self.nodes[scope_id.index()].detail {
            if !detail.children.contains(&name) {
                detail.children.push(name);
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The node arena. Overload-set resolution borrows this slice.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_by_refid(&self, refid: &str) -> Option<NodeId> {
        self.by_refid.get(refid).copied()
    }

    /// The overload set registered under a scoped name, if any.
    pub fn overload_set(&self, lscope: &[String]) -> Option<&OverloadSet> {
        self.by_lscope.get(lscope)
    }

    /// True if the node shares its local name with siblings.
    pub fn is_overloaded(&self, id: NodeId) -> bool {
        self.by_lscope
            .get(&self.nodes[id.index()].lscope)
            .map(|set| set.len() > 1)
            .unwrap_or(false)
    }

    /// True if the node is a member function of a class.
    pub fn is_method(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.kind == NodeKind::Function
            && node
                .fscope
                .map(|f| self.node(f).kind.is_class())
                .unwrap_or(false)
    }

    /// True if the node is a constructor: a method whose local name equals
    /// its enclosing class's local name.
    pub fn is_constructor(&self, id: NodeId) -> bool {
        self.is_method(id)
            && self
                .node(id)
                .fscope
                .map(|f| self.node(f).name() == self.node(id).name())
                .unwrap_or(false)
    }

    /// Hide a node by identifier. Visible -> hidden only; never reversed.
    pub fn hide(&mut self, id: NodeId) {
        self.nodes[id.index()].hide();
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Resolve a scoped name against an active scope.
    ///
    /// Tries `scope + name`, then drops the innermost scope segment and
    /// retries, down to the empty scope. The first existing overload set
    /// wins; its members are lazily loaded before the set is returned.
    pub fn lookup(&mut self, name: &[String], scope: &[String]) -> LookupResult<OverloadSet> {
        for n in (0..=scope.len()).rev() {
            let mut key: Vec<String> = scope[..n].to_vec();
            key.extend(name.iter().cloned());
            if self.by_lscope.contains_key(&key) {
                self.load_set_members(&key)?;
                // Loading may relocate members; hand back the current state.
                if let Some(set) = self.by_lscope.get(&key) {
                    return Ok(set.clone());
                }
            }
        }
        Err(LookupError::NameNotFound {
            name: name.join("::"),
            scope: scope.join("::"),
        })
    }

    fn load_set_members(&mut self, lscope: &[String]) -> Result<(), CorpusError> {
        let ids: Vec<NodeId> = match self.by_lscope.get(lscope) {
            Some(set) => set.all().to_vec(),
            None => return Ok(()),
        };
        for id in ids {
            self.ensure_loaded(id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Detail loading
    // ========================================================================

    /// Load the node's detail on first touch.
    ///
    /// Members load through their owning compound: the compound's single
    /// detail document is the actual source of every member's data.
    pub fn ensure_loaded(&mut self, id: NodeId) -> Result<(), CorpusError> {
        if self.nodes[id.index()].loaded {
            return Ok(());
        }
        let owner = if self.nodes[id.index()].kind.is_compound() {
            id
        } else {
            self.nodes[id.index()]
                .location
                .ok_or_else(|| CorpusError::Undocumented {
                    name: self.nodes[id.index()].qualified_name(),
                })?
        };
        self.load_compound_detail(owner)?;
        if !self.nodes[id.index()].loaded {
            return Err(CorpusError::Undocumented {
                name: self.nodes[id.index()].qualified_name(),
            });
        }
        Ok(())
    }

    fn load_compound_detail(&mut self, compound_id: NodeId) -> Result<(), CorpusError> {
        if self.nodes[compound_id.index()].loaded {
            return Ok(());
        }
        let path = self.nodes[compound_id.index()]
            .detail_file
            .clone()
            .ok_or_else(|| CorpusError::Undocumented {
                name: self.nodes[compound_id.index()].qualified_name(),
            })?;
        debug!("parsing corpus detail document '{}'", path.display());
        let doc = xml::load_document(&path)?;

        let mut found = false;
        for compounddef in doc.find_all("compounddef") {
            let Some(def_id) = compounddef
                .attr("id")
                .and_then(|refid| self.by_refid.get(refid).copied())
            else {
                continue;
            };
            if def_id == compound_id {
                found = true;
            }
            self.read_compound(def_id, compounddef);
        }
        if !found {
            return Err(CorpusError::MissingDefinition {
                path,
                refid: self.nodes[compound_id.index()].refid.clone(),
            });
        }
        Ok(())
    }

    fn read_compound(&mut self, id: NodeId, compounddef: &Element) {
        if self.nodes[id.index()].loaded {
            return;
        }
        let kind = self.nodes[id.index()].kind;

        self.read_docs_and_hide_rules(id, compounddef);

        if kind.is_scope() {
            // Inner classes/namespaces become children of this scope.
            for child_xml in compounddef
                .find_all("innerclass")
                .chain(compounddef.find_all("innernamespace"))
            {
                let Some(child_id) = child_xml
                    .attr("refid")
                    .and_then(|refid| self.by_refid.get(refid).copied())
                else {
                    continue;
                };
                self.nodes[child_id.index()].fscope = Some(id);
                let child_name = self.nodes[child_id.index()].name().to_string();
                self.push_scope_child(id, child_name);
            }
        }
        if kind.is_class() {
            self.nodes[id.index()].is_template = compounddef.find("templateparamlist").is_some();
            let bases = self.read_bases(compounddef);
            if let Detail::Scope(detail) = &mut self.nodes[id.index()].detail {
                detail.bases = bases;
            }
        }
        self.nodes[id.index()].loaded = true;

        // Resolve the enclosing-scope back-reference before members are read,
        // so related-member relocation can inherit it.
        self.resolve_compound_fscope(id);

        for sectiondef in compounddef.find_all("sectiondef") {
            let related = sectiondef.attr("kind") == Some("related");
            for memberdef in sectiondef.find_all("memberdef") {
                let Some(member_id) = memberdef
                    .attr("id")
                    .and_then(|refid| self.by_refid.get(refid).copied())
                else {
                    continue;
                };
                self.read_member(member_id, memberdef);
                if related {
                    self.relocate_related_member(member_id, id);
                }
            }
        }
    }

    fn read_bases(&self, compounddef: &Element) -> Vec<BaseRef> {
        let mut bases = Vec::new();
        for base_xml in compounddef.find_all("basecompoundref") {
            let text = base_xml.text();
            let target = base_xml
                .attr("refid")
                .and_then(|refid| self.by_refid.get(refid).copied());
            let base = match target {
                None => BaseRef {
                    target: None,
                    text,
                    tparams: None,
                },
                Some(base_id) => {
                    let base_name = self.node(base_id).name().to_string();
                    // Base text like "Base< T, N >" carries the explicit
                    // template arguments after the base's own name.
                    let tparams = text.find(&base_name).map(|i| {
                        text[i + base_name.len()..].trim().to_string()
                    });
                    match tparams {
                        Some(t) if !t.is_empty() => BaseRef {
                            target: Some(base_id),
                            text,
                            tparams: Some(t),
                        },
                        _ => BaseRef {
                            target: Some(base_id),
                            text,
                            tparams: None,
                        },
                    }
                }
            };
            bases.push(base);
        }
        bases
    }

    fn resolve_compound_fscope(&mut self, id: NodeId) {
        if self.nodes[id.index()].fscope.is_some() || self.nodes[id.index()].lscope.len() <= 1 {
            return;
        }
        let parent_key = self.nodes[id.index()].lscope[..self.nodes[id.index()].lscope.len() - 1]
            .to_vec();
        let resolved = match self.by_lscope.get(&parent_key) {
            None => {
                warn!(
                    "could not locate enclosing scope for '{}'",
                    self.nodes[id.index()]
                );
                return;
            }
            Some(set) => set.get(&self.nodes),
        };
        match resolved {
            Ok(parent) => self.nodes[id.index()].fscope = Some(parent),
            Err(_) => warn!(
                "could not resolve enclosing scope for '{}'",
                self.nodes[id.index()]
            ),
        }
    }

    fn read_member(&mut self, id: NodeId, memberdef: &Element) {
        if self.nodes[id.index()].loaded {
            return;
        }
        let kind = self.nodes[id.index()].kind;
        let detail = match kind {
            NodeKind::Function => {
                self.nodes[id.index()].is_template =
                    memberdef.find("templateparamlist").is_some();
                Detail::Callable(CallableDetail {
                    params: parse_params(memberdef),
                    result: parse_cxx_type(memberdef.find("type")),
                    is_const: memberdef.attr("const") == Some("yes"),
                    is_static: memberdef.attr("static") == Some("yes"),
                    is_reimplementation: memberdef.find("reimplements").is_some(),
                })
            }
            NodeKind::Variable => Detail::Variable(VariableDetail {
                cxx_type: parse_cxx_type(memberdef.find("type")),
                is_static: memberdef.attr("static") == Some("yes"),
            }),
            NodeKind::Typedef => Detail::Typedef(TypedefDetail {
                aliased: parse_cxx_type(memberdef.find("type")),
            }),
            NodeKind::Enum => {
                let mut values = Vec::new();
                for value_xml in memberdef.find_all("enumvalue") {
                    let Some(value_id) = value_xml
                        .attr("id")
                        .and_then(|refid| self.by_refid.get(refid).copied())
                    else {
                        warn!(
                            "skipping unindexed enum value in '{}'",
                            self.nodes[id.index()]
                        );
                        continue;
                    };
                    self.read_enum_value(value_id, id, value_xml);
                    values.push(value_id);
                }
                Detail::Enum(EnumDetail { values })
            }
            _ => Detail::None,
        };
        self.nodes[id.index()].detail = detail;
        self.read_docs_and_hide_rules(id, memberdef);
        self.nodes[id.index()].loaded = true;
    }

    fn read_enum_value(&mut self, id: NodeId, owner: NodeId, value_xml: &Element) {
        if self.nodes[id.index()].loaded {
            return;
        }
        self.nodes[id.index()].detail = Detail::EnumValue(EnumValueDetail {
            initializer: value_xml.find_text("initializer"),
            owner,
        });
        self.read_docs_and_hide_rules(id, value_xml);
        self.nodes[id.index()].loaded = true;
    }

    /// Shared portion of every detail read: protection and naming hide
    /// rules, documentation paragraphs, and doc-channel commands.
    fn read_docs_and_hide_rules(&mut self, id: NodeId, elem: &Element) {
        match elem.attr("prot") {
            Some("protected") | Some("private") => {
                debug!("hiding non-public member '{}'", self.nodes[id.index()]);
                self.nodes[id.index()].hide();
            }
            _ => {}
        }
        let name = self.nodes[id.index()].name().to_string();
        if name.starts_with('~') || name.starts_with("operator") {
            debug!("hiding special member '{}'", self.nodes[id.index()]);
            self.nodes[id.index()].hide();
        }
        if name.starts_with('@') {
            debug!("hiding anonymous member '{}'", self.nodes[id.index()]);
            self.nodes[id.index()].hide();
        }
        if let Some(location) = elem.find("location") {
            if location.attr("file").map(|f| f.ends_with(".py")).unwrap_or(false) {
                debug!("hiding pure-python member '{}'", self.nodes[id.index()]);
                self.nodes[id.index()].hide();
            }
        }

        let mut commands = Vec::new();
        // Parameter briefs parsed out of the documentation update the
        // already-parsed parameter list in place.
        let mut params = match &self.nodes[id.index()].detail {
            Detail::Callable(c) => c.params.clone(),
            _ => Vec::new(),
        };
        let brief = parse_paragraphs(elem.find("briefdescription"), &mut params, &mut commands);
        let detailed = parse_paragraphs(elem.find("detaileddescription"), &mut params, &mut commands);
        if let Detail::Callable(c) = &mut self.nodes[id.index()].detail {
            c.params = params;
        }
        self.nodes[id.index()].brief = brief;
        self.nodes[id.index()].detailed = detailed;

        for command in commands {
            match command {
                DocCommand::Label(label) => self.attach_label(id, &label),
                DocCommand::Ignore => {
                    debug!("ignoring overload of '{}'", self.nodes[id.index()]);
                    self.nodes[id.index()].hide();
                }
            }
        }
    }

    fn attach_label(&mut self, id: NodeId, label: &str) {
        let lscope = self.nodes[id.index()].lscope.clone();
        let Some(set) = self.by_lscope.get(&lscope).cloned() else {
            self.nodes[id.index()].label = Some(label.to_string());
            return;
        };
        debug!(
            "attaching label '{}' to overload of '{}'",
            label,
            self.nodes[id.index()]
        );
        set.attach_label(&mut self.nodes, id, label);
    }

    /// Relocate a member documented under a `related` section into the
    /// documenting compound's enclosing scope, rewriting its scoped name.
    fn relocate_related_member(&mut self, member_id: NodeId, compound_id: NodeId) {
        let compound_lscope = self.nodes[compound_id.index()].lscope.clone();
        if compound_lscope.is_empty() {
            return;
        }
        let name = self.nodes[member_id.index()].name().to_string();
        let mut new_lscope = compound_lscope[..compound_lscope.len() - 1].to_vec();
        new_lscope.push(name);
        let old_lscope = self.nodes[member_id.index()].lscope.clone();
        if new_lscope == old_lscope {
            return;
        }
        warn!(
            "moving member '{}' from '{}' to '{}'",
            self.nodes[member_id.index()],
            compound_lscope.join("::"),
            new_lscope[..new_lscope.len() - 1].join("::")
        );
        if let Some(set) = self.by_lscope.get_mut(&old_lscope) {
            set.remove(member_id);
        }
        self.nodes[member_id.index()].lscope = new_lscope.clone();
        self.nodes[member_id.index()].fscope = self.nodes[compound_id.index()].fscope;
        self.register_overload(new_lscope, member_id);
    }
}

// ============================================================================
// Detail-document parsing helpers
// ============================================================================

fn missing(path: &Path, message: &str) -> CorpusError {
    CorpusError::Malformed {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Parse a `<param>` list from a callable's member definition.
///
/// An unnamed parameter whose type is exactly `void` is the C idiom for an
/// empty parameter list and is dropped.
fn parse_params(memberdef: &Element) -> Vec<Param> {
    let mut params = Vec::new();
    for param_xml in memberdef.find_all("param") {
        let cxx_type = parse_cxx_type(param_xml.find("type"));
        let name = param_xml.find_text("declname");
        if name.is_none() && cxx_type.template.trim() == "void" {
            continue;
        }
        let default = param_xml.find("defval").map(|d| parse_cxx_type(Some(d)));
        let mut unused_params = Vec::new();
        let mut unused_commands = Vec::new();
        let brief = parse_paragraphs(
            param_xml.find("briefdescription"),
            &mut unused_params,
            &mut unused_commands,
        );
        params.push(Param {
            name,
            cxx_type,
            default,
            brief,
        });
    }
    params
}

/// Parse a type (or default-value) element into a placeholder template plus
/// its cross-references.
fn parse_cxx_type(elem: Option<&Element>) -> CxxType {
    let Some(elem) = elem else {
        return CxxType::default();
    };
    let mut parts: Vec<String> = Vec::new();
    let mut refs: Vec<TypeRef> = Vec::new();
    fn push_text(parts: &mut Vec<String>, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }
    for (i, content) in elem.contents.iter().enumerate() {
        match content {
            Content::Text(text) => push_text(&mut parts, text),
            Content::Element(child) if child.name() == "ref" => {
                let tail = match elem.contents.get(i + 1) {
                    Some(Content::Text(t)) => t.as_str(),
                    _ => "",
                };
                parts.push(format!("{{{}}}", refs.len()));
                refs.push(TypeRef {
                    refid: child.attr("refid").unwrap_or_default().to_string(),
                    text: child.text(),
                    has_tparams: tail.trim_start().starts_with('<'),
                    has_nested: tail.contains("::"),
                });
            }
            Content::Element(child) => push_text(&mut parts, &child.direct_text()),
        }
    }
    let template = parts.join(" ");
    CxxType {
        is_pointer: template.contains('*'),
        template,
        refs,
    }
}

/// Parse a documentation element containing `<para>` blocks.
///
/// Nested `<parameterlist>` entries update the callable's parameter briefs in
/// place; `<programlisting>` blocks become literal [`DocBlock::Code`] items;
/// `<ulink>` URLs carrying the [`DOC_COMMAND_PREFIX`] become commands.
fn parse_paragraphs(
    elem: Option<&Element>,
    params: &mut Vec<Param>,
    commands: &mut Vec<DocCommand>,
) -> Vec<DocBlock> {
    let Some(elem) = elem else {
        return Vec::new();
    };
    let mut blocks = Vec::new();
    for para in elem.find_all("para") {
        let mut terms = String::new();
        for content in &para.contents {
            match content {
                Content::Text(text) => terms.push_str(text),
                Content::Element(child) => match child.name() {
                    "parameterlist" => {
                        read_parameter_list(child, params, commands);
                    }
                    "programlisting" => {
                        if !terms.trim().is_empty() {
                            blocks.push(DocBlock::Text(std::mem::take(&mut terms)));
                        } else {
                            terms.clear();
                        }
                        blocks.push(DocBlock::Code(format_code_listing(child)));
                    }
                    "ulink" => {
                        if let Some(command) = parse_doc_command(child) {
                            commands.push(command);
                        }
                        terms.push_str(&child.direct_text());
                    }
                    _ => terms.push_str(&child.direct_text()),
                },
            }
        }
        if !terms.trim().is_empty() {
            blocks.push(DocBlock::Text(terms));
        }
    }
    blocks
}

fn parse_doc_command(ulink: &Element) -> Option<DocCommand> {
    let url = ulink.attr("url")?;
    let command = url.strip_prefix(DOC_COMMAND_PREFIX)?;
    if let Some(label) = command.strip_prefix("label:") {
        return Some(DocCommand::Label(label.trim().to_string()));
    }
    if command.trim() == "ignore" {
        return Some(DocCommand::Ignore);
    }
    warn!("unrecognized doc command '{}'", command);
    None
}

fn read_parameter_list(
    parameterlist: &Element,
    params: &mut Vec<Param>,
    commands: &mut Vec<DocCommand>,
) {
    for item in parameterlist.children() {
        let Some(namelist) = item.find("parameternamelist") else {
            continue;
        };
        let mut unused = Vec::new();
        let description =
            parse_paragraphs(item.find("parameterdescription"), &mut unused, commands);
        for parametername in namelist.find_all("parametername") {
            let name = parametername.text();
            if let Some(param) = params
                .iter_mut()
                .find(|p| p.name.as_deref() == Some(name.trim()))
            {
                param.brief = description.clone();
            }
        }
    }
}

/// Flatten a `<programlisting>` into its code lines.
fn format_code_listing(programlisting: &Element) -> Vec<String> {
    let mut lines = Vec::new();
    for codeline in programlisting.find_all("codeline") {
        let mut line = String::new();
        for highlight in codeline.find_all("highlight") {
            collect_highlight_text(highlight, &mut line);
        }
        lines.push(line);
    }
    lines
}

fn collect_highlight_text(elem: &Element, out: &mut String) {
    for content in &elem.contents {
        match content {
            Content::Text(text) => out.push_str(text),
            Content::Element(child) if child.name() == "sp" => out.push(' '),
            Content::Element(child) => collect_highlight_text(child, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const INDEX_XML: &str = r#"<?xml version="1.0"?>
<doxygenindex>
  <compound refid="namespacens" kind="namespace"><name>ns</name>
    <member refid="ns_free" kind="function"><name>clip</name></member>
  </compound>
  <compound refid="classns_1_1Foo" kind="class"><name>ns::Foo</name>
    <member refid="foo_ctor" kind="function"><name>Foo</name></member>
    <member refid="foo_bar_a" kind="function"><name>bar</name></member>
    <member refid="foo_bar_b" kind="function"><name>bar</name></member>
    <member refid="foo_dtor" kind="function"><name>~Foo</name></member>
    <member refid="foo_state" kind="enum"><name>State</name></member>
    <member refid="foo_state_on" kind="enumvalue"><name>ON</name></member>
    <member refid="foo_state_off" kind="enumvalue"><name>OFF</name></member>
  </compound>
  <compound refid="filemisc" kind="file"><name>misc.h</name>
    <member refid="misc_clip" kind="function"><name>clip</name></member>
  </compound>
</doxygenindex>
"#;

    const FOO_XML: &str = r#"<?xml version="1.0"?>
<doxygen>
<compounddef id="classns_1_1Foo" kind="class" prot="public">
  <compoundname>ns::Foo</compoundname>
  <briefdescription><para>A container of bars.</para></briefdescription>
  <detaileddescription/>
  <sectiondef kind="public-func">
    <memberdef kind="function" id="foo_ctor" prot="public" static="no" const="no">
      <type/>
      <name>Foo</name>
      <param><type>int</type><declname>size</declname></param>
      <briefdescription><para>Make a Foo.</para></briefdescription>
      <detaileddescription/>
    </memberdef>
    <memberdef kind="function" id="foo_bar_a" prot="public" static="no" const="no">
      <type>int</type>
      <name>bar</name>
      <param><type>int</type><declname>x</declname></param>
      <briefdescription><para>Integer bar. <ulink url="bind.label: a">a</ulink></para></briefdescription>
      <detaileddescription/>
    </memberdef>
    <memberdef kind="function" id="foo_bar_b" prot="public" static="no" const="no">
      <type>double</type>
      <name>bar</name>
      <param><type>double</type><declname>x</declname></param>
      <briefdescription><para>Floating bar. <ulink url="bind.label: b">b</ulink></para></briefdescription>
      <detaileddescription/>
    </memberdef>
    <memberdef kind="function" id="foo_dtor" prot="public" static="no" const="no">
      <type/>
      <name>~Foo</name>
      <briefdescription/>
      <detaileddescription/>
    </memberdef>
  </sectiondef>
  <sectiondef kind="public-type">
    <memberdef kind="enum" id="foo_state" prot="public">
      <name>State</name>
      <enumvalue id="foo_state_on" prot="public"><name>ON</name><initializer>= 1</initializer></enumvalue>
      <enumvalue id="foo_state_off" prot="public"><name>OFF</name></enumvalue>
      <briefdescription><para>Power state.</para></briefdescription>
      <detaileddescription/>
    </memberdef>
  </sectiondef>
</compounddef>
</doxygen>
"#;

    const NS_XML: &str = r#"<?xml version="1.0"?>
<doxygen>
<compounddef id="namespacens" kind="namespace">
  <compoundname>ns</compoundname>
  <innerclass refid="classns_1_1Foo">ns::Foo</innerclass>
  <briefdescription/>
  <detaileddescription/>
  <sectiondef kind="func">
    <memberdef kind="function" id="ns_free" prot="public" static="no" const="no">
      <type>void</type>
      <name>clip</name>
      <param><type>double</type><declname>limit</declname></param>
      <briefdescription><para>Clip inside ns.</para></briefdescription>
      <detaileddescription/>
    </memberdef>
  </sectiondef>
</compounddef>
</doxygen>
"#;

    const MISC_XML: &str = r#"<?xml version="1.0"?>
<doxygen>
<compounddef id="filemisc" kind="file">
  <compoundname>misc.h</compoundname>
  <briefdescription/>
  <detaileddescription/>
  <sectiondef kind="func">
    <memberdef kind="function" id="misc_clip" prot="public" static="no" const="no">
      <type>void</type>
      <name>clip</name>
      <param><type>int</type><declname>limit</declname></param>
      <briefdescription><para>Global clip.</para></briefdescription>
      <detaileddescription/>
    </memberdef>
  </sectiondef>
</compounddef>
</doxygen>
"#;

    fn write_corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.xml"), INDEX_XML).unwrap();
        fs::write(dir.path().join("classns_1_1Foo.xml"), FOO_XML).unwrap();
        fs::write(dir.path().join("namespacens.xml"), NS_XML).unwrap();
        fs::write(dir.path().join("filemisc.xml"), MISC_XML).unwrap();
        dir
    }

    fn load_corpus(dir: &TempDir) -> Corpus {
        Corpus::load(&[dir.path().to_path_buf()]).unwrap()
    }

    fn segments(name: &str) -> Vec<String> {
        name.split("::").map(str::to_string).collect()
    }

    mod manifest {
        use super::*;

        #[test]
        fn stubs_are_created_unloaded() {
            let dir = write_corpus();
            let corpus = load_corpus(&dir);
            let foo = corpus.node_by_refid("classns_1_1Foo").unwrap();
            assert!(!corpus.node(foo).loaded);
            assert_eq!(corpus.node(foo).qualified_name(), "ns::Foo");
        }

        #[test]
        fn members_register_under_scope() {
            let dir = write_corpus();
            let corpus = load_corpus(&dir);
            let set = corpus.overload_set(&segments("ns::Foo::bar")).unwrap();
            assert_eq!(set.all().len(), 2);
        }

        #[test]
        fn file_members_resolve_at_global_scope() {
            let dir = write_corpus();
            let corpus = load_corpus(&dir);
            assert!(corpus.overload_set(&segments("clip")).is_some());
        }

        #[test]
        fn missing_manifest_is_fatal() {
            let dir = TempDir::new().unwrap();
            let err = Corpus::load(&[dir.path().to_path_buf()]).unwrap_err();
            assert!(matches!(err, CorpusError::Io { .. }));
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn widening_prefers_nearest_scope() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            // From inside ns, the bare name resolves to ns::clip.
            let set = corpus.lookup(&segments("clip"), &segments("ns")).unwrap();
            assert_eq!(set.lscope, segments("ns::clip"));
            // From the empty scope, the global wins.
            let set = corpus.lookup(&segments("clip"), &[]).unwrap();
            assert_eq!(set.lscope, segments("clip"));
        }

        #[test]
        fn widening_reaches_outer_scopes() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            // "clip" is not a member of ns::Foo; the search must drop the
            // class segment and land on ns::clip.
            let set = corpus
                .lookup(&segments("clip"), &segments("ns::Foo"))
                .unwrap();
            assert_eq!(set.lscope, segments("ns::clip"));
        }

        #[test]
        fn unknown_name_reports_scope() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            let err = corpus
                .lookup(&segments("missing"), &segments("ns"))
                .unwrap_err();
            match err {
                LookupError::NameNotFound { name, scope } => {
                    assert_eq!(name, "missing");
                    assert_eq!(scope, "ns");
                }
                other => panic!("unexpected error {other:?}"),
            }
        }

        #[test]
        fn lookup_triggers_lazy_load() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            let set = corpus.lookup(&segments("bar"), &segments("ns::Foo")).unwrap();
            for id in set.all() {
                assert!(corpus.node(*id).loaded);
            }
        }
    }

    mod detail {
        use super::*;

        #[test]
        fn labels_come_from_the_doc_channel() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            let set = corpus.lookup(&segments("bar"), &segments("ns::Foo")).unwrap();
            let a = set.get_labeled(corpus.nodes(), "a").unwrap();
            let b = set.get_labeled(corpus.nodes(), "b").unwrap();
            assert_ne!(a, b);
            assert_eq!(corpus.node(a).refid, "foo_bar_a");
            assert_eq!(corpus.node(b).refid, "foo_bar_b");
        }

        #[test]
        fn destructor_is_hidden_but_retained() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            let set = corpus
                .lookup(&segments("~Foo"), &segments("ns::Foo"))
                .unwrap();
            assert_eq!(set.all().len(), 1);
            assert_eq!(set.visible(corpus.nodes()).count(), 0);
        }

        #[test]
        fn constructor_is_detected() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            // Constructors register under Class::Class.
            let set = corpus
                .lookup(&segments("Foo::Foo"), &segments("ns"))
                .unwrap();
            let ctor = corpus.node_by_refid("foo_ctor").unwrap();
            assert!(set.all().contains(&ctor));
            assert!(corpus.is_constructor(ctor));
            assert!(!corpus.is_constructor(corpus.node_by_refid("foo_bar_a").unwrap()));
        }

        #[test]
        fn member_load_pulls_owner_detail() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            let bar = corpus.node_by_refid("foo_bar_a").unwrap();
            corpus.ensure_loaded(bar).unwrap();
            let class_id = corpus.node_by_refid("classns_1_1Foo").unwrap();
            assert!(corpus.node(class_id).loaded);
            let callable = corpus.node(bar).callable().unwrap();
            assert_eq!(callable.params.len(), 1);
            assert_eq!(callable.params[0].name.as_deref(), Some("x"));
        }

        #[test]
        fn enum_values_load_with_their_enum() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            let set = corpus.lookup(&segments("State"), &segments("ns::Foo")).unwrap();
            let state = set.get(corpus.nodes()).unwrap();
            match &corpus.node(state).detail {
                Detail::Enum(detail) => assert_eq!(detail.values.len(), 2),
                other => panic!("expected enum detail, got {other:?}"),
            }
            let on = corpus.node_by_refid("foo_state_on").unwrap();
            match &corpus.node(on).detail {
                Detail::EnumValue(detail) => {
                    assert_eq!(detail.initializer.as_deref(), Some("= 1"));
                    assert_eq!(detail.owner, state);
                }
                other => panic!("expected enum value detail, got {other:?}"),
            }
        }

        #[test]
        fn inner_class_gains_enclosing_scope() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            let ns = corpus.node_by_refid("namespacens").unwrap();
            corpus.ensure_loaded(ns).unwrap();
            let foo = corpus.node_by_refid("classns_1_1Foo").unwrap();
            assert_eq!(corpus.node(foo).fscope, Some(ns));
        }

        #[test]
        fn missing_detail_document_is_fatal() {
            let dir = write_corpus();
            fs::remove_file(dir.path().join("classns_1_1Foo.xml")).unwrap();
            let mut corpus = load_corpus(&dir);
            let err = corpus
                .lookup(&segments("bar"), &segments("ns::Foo"))
                .unwrap_err();
            assert!(matches!(err, LookupError::Corpus(CorpusError::Io { .. })));
        }

        #[test]
        fn load_happens_once() {
            let dir = write_corpus();
            let mut corpus = load_corpus(&dir);
            let bar = corpus.node_by_refid("foo_bar_a").unwrap();
            corpus.ensure_loaded(bar).unwrap();
            // Deleting the detail file proves the second touch never re-reads.
            fs::remove_file(dir.path().join("classns_1_1Foo.xml")).unwrap();
            corpus.ensure_loaded(bar).unwrap();
        }
    }

    mod type_parsing {
        use super::*;

        #[test]
        fn refs_become_indexed_placeholders() {
            let elem = xml::parse_document(
                r#"<type>boost::shared_ptr&lt; <ref refid="classns_1_1Foo">Foo</ref> &gt; *</type>"#,
            )
            .unwrap();
            let cxx = parse_cxx_type(Some(&elem));
            assert_eq!(cxx.template, "boost::shared_ptr< {0} > *");
            assert_eq!(cxx.refs.len(), 1);
            assert_eq!(cxx.refs[0].text, "Foo");
            assert!(cxx.is_pointer);
        }

        #[test]
        fn ref_tail_flags_template_arguments_and_nesting() {
            let elem = xml::parse_document(
                r#"<type><ref refid="classBase">Base</ref>&lt; T &gt;::Nested</type>"#,
            )
            .unwrap();
            let cxx = parse_cxx_type(Some(&elem));
            assert!(cxx.refs[0].has_tparams);
            assert!(cxx.refs[0].has_nested);
        }

        #[test]
        fn void_parameter_is_dropped() {
            let elem = xml::parse_document(
                r#"<memberdef><param><type>void</type></param></memberdef>"#,
            )
            .unwrap();
            assert!(parse_params(&elem).is_empty());
        }
    }
}
