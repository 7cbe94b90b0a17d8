// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;

use crate::{NodePath, PathSeg, YamlNode, YamlNodeData};

/// Blank lines before a node are preserved up to this count.
pub(crate) const MAX_EMPTY_LINES: usize = 2;

/// Editorial metadata attached to an AST position.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Presentation {
    /// Comment lines appearing above the node, without the `#`.
    pub prefix_comments: Vec<String>,
    /// Single trailing `# …` on the node's line, without the `#`.
    pub inline_comment: Option<String>,
    /// Blank lines preceding the node, capped at [MAX_EMPTY_LINES].
    pub empty_lines: usize,
    /// Whether the node was written in flow style.
    pub flow_mode: bool,
    /// Original string literal containing `$name` placeholders.
    pub value_with_variables: Option<String>,
    /// Set when the node is the root of an included document.
    pub included: Option<Box<Inclusion>>,
}

impl Presentation {
    pub(crate) fn is_empty(&self) -> bool {
        self.prefix_comments.is_empty()
            && self.inline_comment.is_none()
            && self.empty_lines == 0
            && !self.flow_mode
            && self.value_with_variables.is_none()
            && self.included.is_none()
    }
}

/// How a node came to be included from a subfile, and everything needed to
/// reconstruct the `!include` line, its override block and its variable
/// bindings when repacking.
#[derive(Debug, PartialEq, Clone)]
pub struct Inclusion {
    /// Presentation of the `!include` line itself in the including
    /// document.
    pub include_pres: Presentation,
    /// Textual argument of `!include`/`!includeraw`.
    pub path: String,
    pub raw: bool,
    /// Variable names bound by the including document at this include.
    pub variables: Vec<String>,
    /// Override records in merge traversal order.
    pub records: Vec<OverrideRecord>,
    /// When the subfile's own root is itself an include, its descriptor
    /// chains here (the node is the root of both documents).
    pub inner: Option<Box<Inclusion>>,
}

impl Inclusion {
    pub(crate) fn new(path: String, raw: bool) -> Self {
        Self {
            include_pres: Presentation::default(),
            path,
            raw,
            variables: Vec::new(),
            records: Vec::new(),
            inner: None,
        }
    }
}

/// One override applied to included data. `original` is the value present
/// before the override, so repacking can recover the subfile content by
/// diffing the current AST against it. Additions carry no original.
#[derive(Debug, PartialEq, Clone)]
pub struct OverrideRecord {
    pub path: NodePath,
    pub original: Option<YamlNode>,
}

/// Per-parse presentation storage. Nodes reference entries by index.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct PresentationStore {
    nodes: Vec<Presentation>,
}

impl PresentationStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, pres: Presentation) -> usize {
        self.nodes.push(pres);
        self.nodes.len() - 1
    }

    pub(crate) fn get(&self, id: usize) -> Option<&Presentation> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: usize) -> Option<&mut Presentation> {
        self.nodes.get_mut(id)
    }

    /// Move every presentation entry referenced under `node` from `from`
    /// into this store, remapping the node indexes. Used when an included
    /// subtree is grafted into its including document.
    pub(crate) fn rehome(&mut self, node: &mut YamlNode, from: &Self) {
        if let Some(id) = node.pres {
            if let Some(pres) = from.get(id) {
                node.pres = Some(self.alloc(pres.clone()));
            } else {
                node.pres = None;
            }
        }
        match &mut node.data {
            YamlNodeData::Sequence(items) => {
                for item in items {
                    self.rehome(item, from);
                }
            }
            YamlNodeData::Map(map) => {
                for (_, entry) in map.iter_mut() {
                    if let Some(id) = entry.key_pres {
                        if let Some(pres) = from.get(id) {
                            entry.key_pres = Some(self.alloc(pres.clone()));
                        } else {
                            entry.key_pres = None;
                        }
                    }
                    self.rehome(&mut entry.value, from);
                }
            }
            _ => (),
        }
    }
}

/// The parse-time recorder: comments and blank lines accumulate here until
/// the next node is created, inline comments attach to the last completed
/// node.
#[derive(Debug, Default)]
pub(crate) struct PresCursor {
    /// Presentation index of the last completed node.
    last: Option<usize>,
    pending_prefix: Vec<String>,
    pending_empty_lines: usize,
}

impl PresCursor {
    pub(crate) fn note_empty_line(&mut self) {
        self.pending_empty_lines += 1;
    }

    pub(crate) fn attach_prefix(&mut self, comment: String) {
        self.pending_prefix.push(comment);
    }

    pub(crate) fn attach_inline(
        &mut self,
        store: &mut PresentationStore,
        comment: String,
    ) {
        if let Some(pres) =
            self.last.and_then(|id| store.get_mut(id))
        {
            if pres.inline_comment.is_none() {
                pres.inline_comment = Some(comment);
                return;
            }
        }
        // No completed node on this line yet, keep it for the next one.
        self.pending_prefix.push(comment);
    }

    /// Drain accumulated prefix comments and empty lines into a fresh
    /// presentation record for the node being created.
    pub(crate) fn take_pending(&mut self) -> Presentation {
        let empty_lines = self.pending_empty_lines.min(MAX_EMPTY_LINES);
        self.pending_empty_lines = 0;
        Presentation {
            prefix_comments: std::mem::take(&mut self.pending_prefix),
            empty_lines,
            ..Default::default()
        }
    }

    pub(crate) fn set_last(&mut self, id: Option<usize>) {
        self.last = id;
    }
}

/// Flat, path-addressed form of a document's presentation. `.key` descends
/// a mapping, `[idx]` descends a sequence; a terminal `!` addresses the
/// node itself, a path without it addresses the mapping key.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct DocPresentation(pub IndexMap<String, Presentation>);

impl DocPresentation {
    pub fn get(&self, path: &str) -> Option<&Presentation> {
        self.0.get(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub(crate) fn flatten(
    root: &YamlNode,
    store: &PresentationStore,
) -> DocPresentation {
    let mut ret = DocPresentation::default();
    flatten_node(root, store, &NodePath::root(), &mut ret);
    ret
}

fn flatten_node(
    node: &YamlNode,
    store: &PresentationStore,
    path: &NodePath,
    out: &mut DocPresentation,
) {
    if let Some(pres) = node.pres.and_then(|id| store.get(id)) {
        if !pres.is_empty() {
            out.0.insert(format!("{path}!"), pres.clone());
        }
    }
    match &node.data {
        YamlNodeData::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_node(item, store, &path.with_index(i), out);
            }
        }
        YamlNodeData::Map(map) => {
            for (key, entry) in map.iter() {
                let key_path = path.with_key(key);
                if let Some(pres) =
                    entry.key_pres.and_then(|id| store.get(id))
                {
                    if !pres.is_empty() {
                        out.0.insert(key_path.to_string(), pres.clone());
                    }
                }
                flatten_node(&entry.value, store, &key_path, out);
            }
        }
        _ => (),
    }
}

/// Re-attach a flat document presentation onto a tree, allocating entries
/// in `store` and pointing the nodes at them.
pub(crate) fn apply(
    doc_pres: &DocPresentation,
    root: &mut YamlNode,
    store: &mut PresentationStore,
) {
    for (path_str, pres) in doc_pres.0.iter() {
        let (path, at_node) = match parse_path(path_str) {
            Some(v) => v,
            None => {
                log::debug!("Ignoring malformed presentation path {path_str}");
                continue;
            }
        };
        if at_node {
            if let Some(node) = root.descend_mut(&path) {
                node.pres = Some(store.alloc(pres.clone()));
            }
        } else if let Some((parent, PathSeg::Key(key))) = path.split_last() {
            if let Some(YamlNodeData::Map(map)) =
                root.descend_mut(&parent).map(|n| &mut n.data)
            {
                if let Some(entry) = map.get_mut(&key) {
                    entry.key_pres = Some(store.alloc(pres.clone()));
                }
            }
        }
    }
}

/// Parse the textual path form. Returns the path and whether a terminal
/// `!` addressed the node itself.
fn parse_path(s: &str) -> Option<(NodePath, bool)> {
    let (s, at_node) = match s.strip_suffix('!') {
        Some(stripped) => (stripped, true),
        None => (s, false),
    };
    let mut path = NodePath::root();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                let mut key = String::new();
                while let Some(k) = chars.peek() {
                    if *k == '.' || *k == '[' {
                        break;
                    }
                    key.push(*k);
                    chars.next();
                }
                path = path.with_key(&key);
            }
            '[' => {
                let mut num = String::new();
                for k in chars.by_ref() {
                    if k == ']' {
                        break;
                    }
                    num.push(k);
                }
                path = path.with_index(num.parse().ok()?);
            }
            _ => return None,
        }
    }
    Some((path, at_node))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{RytSpan, YamlMapEntry, YamlNodeMap};

    #[test]
    fn test_cursor_pending_attach() {
        let mut store = PresentationStore::new();
        let mut cursor = PresCursor::default();
        cursor.note_empty_line();
        cursor.note_empty_line();
        cursor.note_empty_line();
        cursor.attach_prefix("first".to_string());
        let pres = cursor.take_pending();
        assert_eq!(pres.empty_lines, MAX_EMPTY_LINES);
        assert_eq!(pres.prefix_comments, vec!["first".to_string()]);
        assert_eq!(cursor.take_pending(), Presentation::default());

        let id = store.alloc(pres);
        cursor.set_last(Some(id));
        cursor.attach_inline(&mut store, " trailing".to_string());
        assert_eq!(
            store.get(id).unwrap().inline_comment.as_deref(),
            Some(" trailing")
        );
    }

    #[test]
    fn test_inline_without_last_becomes_prefix() {
        let mut store = PresentationStore::new();
        let mut cursor = PresCursor::default();
        cursor.attach_inline(&mut store, " floating".to_string());
        let pres = cursor.take_pending();
        assert_eq!(pres.prefix_comments, vec![" floating".to_string()]);
    }

    #[test]
    fn test_flatten_and_parse_path() {
        let mut store = PresentationStore::new();
        let mut inner = YamlNode::new(
            YamlNodeData::Uint(1),
            RytSpan::default(),
        );
        inner.pres = Some(store.alloc(Presentation {
            inline_comment: Some(" c".to_string()),
            ..Default::default()
        }));
        let mut map = YamlNodeMap::new();
        map.insert(
            "a".to_string(),
            YamlMapEntry {
                key_span: RytSpan::default(),
                key_pres: None,
                value: inner,
            },
        );
        let root = YamlNode::new(
            YamlNodeData::Map(Box::new(map)),
            RytSpan::default(),
        );
        let flat = flatten(&root, &store);
        assert_eq!(flat.len(), 1);
        assert!(flat.get(".a!").is_some());

        let (path, at_node) = parse_path(".a[3].b!").unwrap();
        assert!(at_node);
        assert_eq!(path.to_string(), ".a[3].b");
    }
}
