//! Overload sets: same-named siblings within one scope.
//!
//! An [`OverloadSet`] owns the ordered member IDs sharing one local name in
//! one scope. Resolution runs against the node arena (passed in as a slice),
//! which keeps the set itself a cheap, clonable handle.
//!
//! Labels are author-attached tags used to pick one member out of a set.
//! Two labels are synthesized on demand for member functions that carry none:
//! `const` and `nonconst`, derived from method constness.

use tracing::warn;

use crate::error::{LookupError, LookupResult};
use crate::model::{Node, NodeId};

/// Auto-label predicate, keyed by label name.
fn auto_label_matches(label: &str, node: &Node) -> bool {
    match label {
        "const" => node.is_const(),
        "nonconst" => node.callable().map(|c| !c.is_const).unwrap_or(false),
        _ => false,
    }
}

/// The group of sibling entities sharing one local name within one scope.
#[derive(Debug, Clone, Default)]
pub struct OverloadSet {
    /// Scoped name shared by every member.
    pub lscope: Vec<String>,
    members: Vec<NodeId>,
}

impl OverloadSet {
    /// Create an empty set for the given scoped name.
    pub fn new(lscope: Vec<String>) -> Self {
        OverloadSet {
            lscope,
            members: Vec::new(),
        }
    }

    /// Scoped display name.
    pub fn qualified_name(&self) -> String {
        self.lscope.join("::")
    }

    /// Append a member. Members keep insertion order for the life of the set.
    pub fn add(&mut self, id: NodeId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }

    /// Remove a member (used when a detail document relocates it).
    pub fn remove(&mut self, id: NodeId) {
        self.members.retain(|m| *m != id);
    }

    /// All members, hidden included, in insertion order.
    pub fn all(&self) -> &[NodeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Visible members in insertion order.
    pub fn visible<'a>(&'a self, nodes: &'a [Node]) -> impl Iterator<Item = NodeId> + 'a {
        self.members
            .iter()
            .copied()
            .filter(|id| !nodes[id.index()].hidden)
    }

    /// The unique visible member.
    ///
    /// Errors when the set has no visible member or more than one.
    pub fn get(&self, nodes: &[Node]) -> LookupResult<NodeId> {
        let mut visible = self.visible(nodes);
        match (visible.next(), visible.next()) {
            (Some(id), None) => Ok(id),
            (None, _) => Err(LookupError::NoVisibleOverload {
                name: self.qualified_name(),
            }),
            (Some(_), Some(_)) => Err(LookupError::Ambiguous {
                name: self.qualified_name(),
                count: self.visible(nodes).count(),
            }),
        }
    }

    /// The member selected by a label.
    ///
    /// Explicit labels win over the synthesized `const`/`nonconst`
    /// predicates; both passes scan `all` in insertion order.
    pub fn get_labeled(&self, nodes: &[Node], label: &str) -> LookupResult<NodeId> {
        for id in &self.members {
            if nodes[id.index()].label.as_deref() == Some(label) {
                return Ok(*id);
            }
        }
        for id in &self.members {
            if auto_label_matches(label, &nodes[id.index()]) {
                return Ok(*id);
            }
        }
        Err(LookupError::LabelNotFound {
            name: self.qualified_name(),
            label: label.to_string(),
        })
    }

    /// Select members by label list, erroring if any label goes unmatched.
    ///
    /// Explicit labels are claimed first, so a label satisfied explicitly is
    /// never re-satisfied by an auto predicate on a different member. Members
    /// are yielded in insertion order within each pass.
    pub fn select(&self, nodes: &[Node], labels: &[String]) -> LookupResult<Vec<NodeId>> {
        let mut remaining: Vec<&String> = labels.iter().collect();
        let mut selected = Vec::new();
        for id in &self.members {
            if let Some(label) = &nodes[id.index()].label {
                if let Some(pos) = remaining.iter().position(|l| *l == label) {
                    remaining.remove(pos);
                    selected.push(*id);
                }
            }
        }
        let auto_requested: Vec<&String> = std::mem::take(&mut remaining);
        for label in auto_requested {
            let mut matched = false;
            for id in &self.members {
                if auto_label_matches(label, &nodes[id.index()]) && !selected.contains(id) {
                    selected.push(*id);
                    matched = true;
                }
            }
            if !matched {
                return Err(LookupError::LabelNotFound {
                    name: self.qualified_name(),
                    label: label.clone(),
                });
            }
        }
        Ok(selected)
    }

    /// Resolve an optional label list against the set.
    ///
    /// With no labels, yields the visible members in insertion order; with
    /// labels, delegates to [`select`](OverloadSet::select).
    pub fn iterate(&self, nodes: &[Node], labels: Option<&[String]>) -> LookupResult<Vec<NodeId>> {
        match labels {
            None => Ok(self.visible(nodes).collect()),
            Some(labels) => self.select(nodes, labels),
        }
    }

    /// Attach an explicit label to a member of this set.
    ///
    /// Conflicts are recoverable: the first binding stays, the new
    /// assignment is rejected with a warning, and the run continues.
    pub fn attach_label(&self, nodes: &mut [Node], id: NodeId, label: &str) {
        if let Some(existing) = &nodes[id.index()].label {
            warn!(
                "cannot apply label '{}': overload of '{}' already labeled '{}'",
                label,
                self.qualified_name(),
                existing
            );
            return;
        }
        for member in &self.members {
            if nodes[member.index()].label.as_deref() == Some(label) {
                warn!(
                    "cannot apply label '{}' twice within overloads of '{}'",
                    label,
                    self.qualified_name()
                );
                return;
            }
        }
        nodes[id.index()].label = Some(label.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CallableDetail, Detail, NodeKind};

    fn method(name: &str, is_const: bool) -> Node {
        let mut node = Node::stub(
            format!("m_{name}_{is_const}"),
            NodeKind::Function,
            vec!["Foo".into(), name.into()],
        );
        node.detail = Detail::Callable(CallableDetail {
            is_const,
            ..CallableDetail::default()
        });
        node
    }

    fn build(nodes: Vec<Node>) -> (Vec<Node>, OverloadSet) {
        let mut set = OverloadSet::new(vec!["Foo".into(), "bar".into()]);
        for (i, _) in nodes.iter().enumerate() {
            set.add(NodeId::new(i as u32));
        }
        (nodes, set)
    }

    mod get {
        use super::*;

        #[test]
        fn singleton_resolves() {
            let (nodes, set) = build(vec![method("bar", false)]);
            assert_eq!(set.get(&nodes).unwrap(), NodeId::new(0));
        }

        #[test]
        fn two_visible_members_are_ambiguous() {
            let (nodes, set) = build(vec![method("bar", false), method("bar", true)]);
            match set.get(&nodes) {
                Err(LookupError::Ambiguous { count, .. }) => assert_eq!(count, 2),
                other => panic!("expected ambiguity, got {other:?}"),
            }
        }

        #[test]
        fn hiding_reduces_to_singleton() {
            let (mut nodes, set) = build(vec![method("bar", false), method("bar", true)]);
            nodes[1].hide();
            assert_eq!(set.get(&nodes).unwrap(), NodeId::new(0));
        }

        #[test]
        fn all_hidden_is_an_error() {
            let (mut nodes, set) = build(vec![method("bar", false)]);
            nodes[0].hide();
            assert!(matches!(
                set.get(&nodes),
                Err(LookupError::NoVisibleOverload { .. })
            ));
        }
    }

    mod labels {
        use super::*;

        #[test]
        fn auto_const_and_nonconst_resolve_distinct_members() {
            let (nodes, set) = build(vec![method("bar", true), method("bar", false)]);
            assert_eq!(set.get_labeled(&nodes, "const").unwrap(), NodeId::new(0));
            assert_eq!(set.get_labeled(&nodes, "nonconst").unwrap(), NodeId::new(1));
        }

        #[test]
        fn explicit_label_wins_over_auto_predicate() {
            let (mut nodes, set) = build(vec![method("bar", true), method("bar", false)]);
            // The non-const member explicitly claims "const".
            nodes[1].label = Some("const".to_string());
            assert_eq!(set.get_labeled(&nodes, "const").unwrap(), NodeId::new(1));
        }

        #[test]
        fn unknown_label_is_an_error() {
            let (nodes, set) = build(vec![method("bar", false)]);
            assert!(matches!(
                set.get_labeled(&nodes, "deep"),
                Err(LookupError::LabelNotFound { .. })
            ));
        }

        #[test]
        fn select_resolves_each_label_once() {
            let (mut nodes, set) = build(vec![method("bar", true), method("bar", false)]);
            nodes[0].label = Some("a".to_string());
            nodes[1].label = Some("b".to_string());
            let picked = set
                .select(&nodes, &["a".to_string(), "b".to_string()])
                .unwrap();
            assert_eq!(picked, vec![NodeId::new(0), NodeId::new(1)]);
        }

        #[test]
        fn select_errors_on_missing_label() {
            let (nodes, set) = build(vec![method("bar", false)]);
            let err = set.select(&nodes, &["ghost".to_string()]).unwrap_err();
            assert!(matches!(err, LookupError::LabelNotFound { .. }));
        }

        #[test]
        fn select_mixes_explicit_and_auto_labels() {
            let (mut nodes, set) = build(vec![method("bar", true), method("bar", false)]);
            nodes[1].label = Some("scalar".to_string());
            let picked = set
                .select(&nodes, &["scalar".to_string(), "const".to_string()])
                .unwrap();
            assert_eq!(picked, vec![NodeId::new(1), NodeId::new(0)]);
        }
    }

    mod label_conflicts {
        use super::*;

        #[test]
        fn duplicate_label_keeps_first_binding() {
            let (mut nodes, set) = build(vec![method("bar", true), method("bar", false)]);
            set.attach_label(&mut nodes, NodeId::new(0), "a");
            set.attach_label(&mut nodes, NodeId::new(1), "a");
            assert_eq!(nodes[0].label.as_deref(), Some("a"));
            assert_eq!(nodes[1].label, None);
        }

        #[test]
        fn relabeling_a_member_is_rejected() {
            let (mut nodes, set) = build(vec![method("bar", true)]);
            set.attach_label(&mut nodes, NodeId::new(0), "a");
            set.attach_label(&mut nodes, NodeId::new(0), "b");
            assert_eq!(nodes[0].label.as_deref(), Some("a"));
        }
    }

    mod iteration {
        use super::*;

        #[test]
        fn default_iteration_yields_visible_in_insertion_order() {
            let (mut nodes, set) = build(vec![
                method("bar", false),
                method("bar", true),
                method("bar", false),
            ]);
            nodes[1].hide();
            let ids = set.iterate(&nodes, None).unwrap();
            assert_eq!(ids, vec![NodeId::new(0), NodeId::new(2)]);
        }

        #[test]
        fn hidden_members_remain_in_all() {
            let (mut nodes, set) = build(vec![method("bar", false), method("bar", true)]);
            nodes[0].hide();
            assert_eq!(set.all().len(), 2);
            assert_eq!(set.visible(&nodes).count(), 1);
        }
    }
}
