// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;

use crate::{RytError, RytSpan};

/// Coarse node kind used by override merging and error messages.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum YamlNodeKind {
    Scalar,
    Sequence,
    Mapping,
}

impl std::fmt::Display for YamlNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Scalar => "scalar",
                Self::Sequence => "sequence",
                Self::Mapping => "mapping",
            }
        )
    }
}

/// A `!word` tag applied to a node.
#[derive(Debug, PartialEq, Clone)]
pub struct YamlTagProp {
    pub name: String,
    pub span: RytSpan,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct YamlNode {
    pub data: YamlNodeData,
    pub span: RytSpan,
    pub tag: Option<YamlTagProp>,
    /// Index into the presentation store of the owning document.
    pub(crate) pres: Option<usize>,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub enum YamlNodeData {
    #[default]
    Null,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Double(f64),
    String(String),
    Sequence(Vec<YamlNode>),
    Map(Box<YamlNodeMap>),
}

impl YamlNode {
    pub(crate) fn new(data: YamlNodeData, span: RytSpan) -> Self {
        Self {
            data,
            span,
            tag: None,
            pres: None,
        }
    }

    pub fn kind(&self) -> YamlNodeKind {
        match &self.data {
            YamlNodeData::Sequence(_) => YamlNodeKind::Sequence,
            YamlNodeData::Map(_) => YamlNodeKind::Mapping,
            _ => YamlNodeKind::Scalar,
        }
    }

    pub fn is_null(&self) -> bool {
        self.data == YamlNodeData::Null
    }

    pub fn as_str(&self) -> Result<&str, RytError> {
        if let YamlNodeData::String(v) = &self.data {
            Ok(v.as_str())
        } else {
            Err(RytError::wrong_type_of_data(
                format!("expecting a string, but got {}", self.kind()),
                self.span.start,
            ))
        }
    }

    pub fn as_bool(&self) -> Result<bool, RytError> {
        if let YamlNodeData::Bool(v) = &self.data {
            Ok(*v)
        } else {
            Err(RytError::wrong_type_of_data(
                format!("expecting a boolean, but got {}", self.kind()),
                self.span.start,
            ))
        }
    }

    pub fn as_u64(&self) -> Result<u64, RytError> {
        if let YamlNodeData::Uint(v) = &self.data {
            Ok(*v)
        } else {
            Err(RytError::wrong_type_of_data(
                format!(
                    "expecting an unsigned integer, but got {}",
                    self.kind()
                ),
                self.span.start,
            ))
        }
    }

    pub fn as_i64(&self) -> Result<i64, RytError> {
        match &self.data {
            YamlNodeData::Int(v) => Ok(*v),
            YamlNodeData::Uint(v) if *v <= i64::MAX as u64 => Ok(*v as i64),
            _ => Err(RytError::wrong_type_of_data(
                format!("expecting an integer, but got {}", self.kind()),
                self.span.start,
            )),
        }
    }

    pub fn as_f64(&self) -> Result<f64, RytError> {
        match &self.data {
            YamlNodeData::Double(v) => Ok(*v),
            YamlNodeData::Int(v) => Ok(*v as f64),
            YamlNodeData::Uint(v) => Ok(*v as f64),
            _ => Err(RytError::wrong_type_of_data(
                format!("expecting a number, but got {}", self.kind()),
                self.span.start,
            )),
        }
    }

    pub fn as_sequence(&self) -> Result<&[YamlNode], RytError> {
        if let YamlNodeData::Sequence(v) = &self.data {
            Ok(v.as_slice())
        } else {
            Err(RytError::wrong_type_of_data(
                format!("expecting a sequence, but got {}", self.kind()),
                self.span.start,
            ))
        }
    }

    pub fn as_map(&self) -> Result<&YamlNodeMap, RytError> {
        if let YamlNodeData::Map(v) = &self.data {
            Ok(v)
        } else {
            Err(RytError::wrong_type_of_data(
                format!("expecting a mapping, but got {}", self.kind()),
                self.span.start,
            ))
        }
    }

    /// Resolve a node path rooted at this node.
    pub(crate) fn descend(&self, path: &NodePath) -> Option<&YamlNode> {
        let mut cur = self;
        for seg in path.segments() {
            cur = match (seg, &cur.data) {
                (PathSeg::Key(k), YamlNodeData::Map(map)) => {
                    &map.get(k)?.value
                }
                (PathSeg::Index(i), YamlNodeData::Sequence(items)) => {
                    items.get(*i)?
                }
                _ => return None,
            };
        }
        Some(cur)
    }

    pub(crate) fn descend_mut(
        &mut self,
        path: &NodePath,
    ) -> Option<&mut YamlNode> {
        let mut cur = self;
        for seg in path.segments() {
            cur = match (seg, &mut cur.data) {
                (PathSeg::Key(k), YamlNodeData::Map(map)) => {
                    &mut map.get_mut(k)?.value
                }
                (PathSeg::Index(i), YamlNodeData::Sequence(items)) => {
                    items.get_mut(*i)?
                }
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Whether this node or any descendant carries a tag. The packer uses
    /// this to downgrade flow style, which cannot carry tags.
    pub(crate) fn has_tag_deep(&self) -> bool {
        if self.tag.is_some() {
            return true;
        }
        match &self.data {
            YamlNodeData::Sequence(items) => {
                items.iter().any(YamlNode::has_tag_deep)
            }
            YamlNodeData::Map(map) => {
                map.iter().any(|(_, e)| e.value.has_tag_deep())
            }
            _ => false,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct YamlMapEntry {
    pub key_span: RytSpan,
    pub(crate) key_pres: Option<usize>,
    pub value: YamlNode,
}

/// Ordered mapping with unique string keys.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct YamlNodeMap(IndexMap<String, YamlMapEntry>);

impl YamlNodeMap {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Returns the previous entry when the key was already present.
    pub fn insert(
        &mut self,
        key: String,
        entry: YamlMapEntry,
    ) -> Option<YamlMapEntry> {
        self.0.insert(key, entry)
    }

    pub fn get(&self, key: &str) -> Option<&YamlMapEntry> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut YamlMapEntry> {
        self.0.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn shift_remove(&mut self, key: &str) -> Option<YamlMapEntry> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, YamlMapEntry> {
        self.0.iter()
    }

    pub fn iter_mut(
        &mut self,
    ) -> indexmap::map::IterMut<'_, String, YamlMapEntry> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for YamlNodeMap {
    type Item = (String, YamlMapEntry);
    type IntoIter = indexmap::map::IntoIter<String, YamlMapEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One step of a node path.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PathSeg {
    Key(String),
    Index(usize),
}

/// Path from a subtree root to a node: `.key` descends a mapping,
/// `[idx]` descends a sequence. The textual form carries a terminal `!`
/// when the path addresses the node itself for a scalar overwrite.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct NodePath(Vec<PathSeg>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn with_key(&self, key: &str) -> Self {
        let mut segs = self.0.clone();
        segs.push(PathSeg::Key(key.to_string()));
        Self(segs)
    }

    pub fn with_index(&self, index: usize) -> Self {
        let mut segs = self.0.clone();
        segs.push(PathSeg::Index(index));
        Self(segs)
    }

    pub fn segments(&self) -> &[PathSeg] {
        self.0.as_slice()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into the parent path and the final segment.
    pub(crate) fn split_last(&self) -> Option<(NodePath, PathSeg)> {
        let (last, rest) = self.0.split_last()?;
        Some((NodePath(rest.to_vec()), last.clone()))
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for seg in &self.0 {
            match seg {
                PathSeg::Key(k) => write!(f, ".{k}")?,
                PathSeg::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}
