// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::{
    scalar::{classify_scalar, read_double_quoted_str},
    CharsIter, DocPresentation, PresCursor, Presentation, PresentationStore,
    RytError, RytPosition, RytSpan, YamlNode, YamlNodeData, YamlTagProp,
};

/// Flags recognized by the parse entry points.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ParseOptions {
    /// Record comments, empty lines and style hints so the packer can
    /// reproduce them. Default is true.
    pub generate_presentation: bool,
    /// Accept `$name` placeholders left unbound after all includes are
    /// resolved. Default is false.
    pub allow_unbound_variables: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            generate_presentation: true,
            allow_unbound_variables: false,
        }
    }
}

/// Result of a parse: the AST plus the presentation store its nodes
/// reference, and the variable names left unbound (only non-empty when
/// [ParseOptions::allow_unbound_variables] was set).
#[derive(Debug, PartialEq, Clone)]
pub struct YamlDocument {
    pub root: YamlNode,
    pub(crate) store: PresentationStore,
    pub unbound_variables: Vec<String>,
}

impl YamlDocument {
    /// The flat, path-addressed form of this document's presentation.
    pub fn document_presentation(&self) -> DocPresentation {
        crate::presentation::flatten(&self.root, &self.store)
    }

    /// Re-attach a flat presentation onto the tree, e.g. one obtained from
    /// an earlier parse of the same document.
    pub fn set_document_presentation(&mut self, doc_pres: &DocPresentation) {
        crate::presentation::apply(doc_pres, &mut self.root, &mut self.store);
    }

    pub fn presentation_of(&self, node: &YamlNode) -> Option<&Presentation> {
        node.pres.and_then(|id| self.store.get(id))
    }
}

/// Parse an in-memory document. There is no containing directory, so
/// `!include` raises "invalid include" here; use [parse_file] for
/// documents that include subfiles.
pub fn parse_str(
    input: &str,
    opts: &ParseOptions,
) -> Result<YamlDocument, RytError> {
    ParseContext::new(input, None, None, Vec::new(), *opts).finish()
}

/// Parse a document from a file. Includes are resolved relative to the
/// file's directory and never escape it.
pub fn parse_file(
    path: &Path,
    opts: &ParseOptions,
) -> Result<YamlDocument, RytError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| RytError::io("open", path, e))?;
    let file = std::fs::File::open(&canonical)
        .map_err(|e| RytError::io("open", path, e))?;
    // Safety: the file is opened read-only and the mapping is dropped
    // before this function returns.
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .map_err(|e| RytError::io("map", path, e))?;
    let source = std::str::from_utf8(&mmap).map_err(|_| {
        RytError::new(
            crate::ErrorKind::Io,
            format!("{} is not valid UTF-8", path.display()),
            RytPosition::EOF,
        )
    })?;
    let dir = canonical.parent().map(Path::to_path_buf);
    ParseContext::new(
        source,
        Some(path.to_path_buf()),
        dir,
        vec![canonical],
        *opts,
    )
    .finish()
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Per-file parse state.
#[derive(Debug)]
pub(crate) struct ParseContext<'s> {
    pub(crate) iter: CharsIter<'s>,
    source: &'s str,
    /// Path as given by the caller, for error messages.
    pub(crate) file_path: Option<PathBuf>,
    /// Canonical directory containing this file; includes resolve here.
    pub(crate) dir: Option<PathBuf>,
    /// Canonical paths of this file and every including ancestor.
    pub(crate) ancestors: Vec<PathBuf>,
    pub(crate) opts: ParseOptions,
    pub(crate) store: PresentationStore,
    pub(crate) cursor: PresCursor,
    /// Whether a non-space character was consumed since the line start.
    content_since_line_start: bool,
}

impl<'s> ParseContext<'s> {
    pub(crate) fn new(
        source: &'s str,
        file_path: Option<PathBuf>,
        dir: Option<PathBuf>,
        ancestors: Vec<PathBuf>,
        opts: ParseOptions,
    ) -> Self {
        Self {
            iter: CharsIter::new(source),
            source,
            file_path,
            dir,
            ancestors,
            opts,
            store: PresentationStore::new(),
            cursor: PresCursor::default(),
            content_since_line_start: false,
        }
    }

    pub(crate) fn finish(mut self) -> Result<YamlDocument, RytError> {
        let root = match self.parse_root() {
            Ok(root) => root,
            Err(e) => return Err(self.attach(e)),
        };
        let unbound = crate::variable::collect_unbound(&root, &self.store);
        if !unbound.is_empty() && !self.opts.allow_unbound_variables {
            return Err(RytError::unbound_variables(&unbound)
                .with_context(self.file_path.as_deref(), None));
        }
        Ok(YamlDocument {
            root,
            store: self.store,
            unbound_variables: unbound,
        })
    }

    /// Parse the document root and reject trailing content.
    pub(crate) fn parse_root(&mut self) -> Result<YamlNode, RytError> {
        let root = self.parse_data(1)?;
        self.trim()?;
        if self.iter.peek().is_some() {
            return Err(RytError::extra_characters(self.iter.next_pos()));
        }
        Ok(root)
    }

    /// Fill file path and source line into an error raised inside this
    /// context.
    pub(crate) fn attach(&self, e: RytError) -> RytError {
        let line = self.source_line(e.pos().line);
        e.with_context(self.file_path.as_deref(), line)
    }

    pub(crate) fn source_line(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.source.lines().nth(line - 1)
    }

    /// Drain one char, tracking whether the current line has content yet.
    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.iter.next();
        match c {
            Some('\n') => self.content_since_line_start = false,
            Some(' ') | None => (),
            Some(_) => self.content_since_line_start = true,
        }
        c
    }

    /// The single sink for editorial presentation: spaces are discarded,
    /// blank lines and comments accumulate on the cursor, tabs are a hard
    /// error.
    pub(crate) fn trim(&mut self) -> Result<(), RytError> {
        loop {
            match self.iter.peek() {
                Some(' ') => {
                    self.bump();
                }
                Some('\t') => {
                    return Err(RytError::tab_character(self.iter.next_pos()));
                }
                Some('\n') => {
                    if !self.content_since_line_start {
                        self.cursor.note_empty_line();
                    }
                    self.bump();
                }
                Some('#') => self.read_comment(),
                _ => return Ok(()),
            }
        }
    }

    /// Trim inside flow containers: line breaks carry no presentation
    /// meaning there.
    pub(crate) fn trim_flow(&mut self) -> Result<(), RytError> {
        loop {
            match self.iter.peek() {
                Some(' ') | Some('\n') => {
                    self.bump();
                }
                Some('\t') => {
                    return Err(RytError::tab_character(self.iter.next_pos()));
                }
                Some('#') => self.read_comment(),
                _ => return Ok(()),
            }
        }
    }

    fn read_comment(&mut self) {
        let fresh = !self.content_since_line_start;
        self.bump();
        let mut text = String::new();
        while let Some(c) = self.iter.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.bump();
        }
        if !self.opts.generate_presentation {
            return;
        }
        if fresh {
            self.cursor.attach_prefix(text);
        } else {
            self.cursor.attach_inline(&mut self.store, text);
        }
    }

    /// Parse one node whose first character must not be left of
    /// `min_indent` (a 1-based column).
    pub(crate) fn parse_data(
        &mut self,
        min_indent: usize,
    ) -> Result<YamlNode, RytError> {
        self.trim()?;
        let c = match self.iter.peek() {
            Some(c) => c,
            None => {
                return Err(RytError::missing_data(self.iter.next_pos()));
            }
        };
        let pos = self.iter.next_pos();
        if pos.column < min_indent {
            return Err(RytError::wrong_indentation(
                format!("expecting minimum column {min_indent}"),
                pos,
            ));
        }
        match c {
            '!' => self.parse_tagged(min_indent),
            '-' if matches!(
                self.iter.peek_second(),
                None | Some(' ') | Some('\n')
            ) =>
            {
                self.parse_block_seq(false)
            }
            '[' => self.parse_flow_seq(),
            '{' => self.parse_flow_map(),
            _ => {
                if self.lookahead_block_map_key() {
                    self.parse_block_map(min_indent, false)
                } else {
                    self.parse_scalar_node(false)
                }
            }
        }
    }

    /// Whether the pending token reads as `key:` followed by a separator.
    pub(crate) fn lookahead_block_map_key(&self) -> bool {
        let rest = self.iter.as_str();
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        let key_len = rest
            .find(|c: char| !is_key_char(c))
            .unwrap_or(rest.len());
        if key_len == 0 {
            return false;
        }
        let mut after = rest[key_len..].chars();
        after.next() == Some(':')
            && matches!(
                after.next(),
                None | Some(' ') | Some('\n') | Some('\r')
            )
    }

    fn parse_tagged(
        &mut self,
        min_indent: usize,
    ) -> Result<YamlNode, RytError> {
        let tag = self.parse_tag()?;
        let mut node = self.parse_data(min_indent)?;
        if tag.name == "include" || tag.name == "includeraw" {
            return crate::include::resolve_include(self, tag, node, min_indent);
        }
        if let Some(existing) = &node.tag {
            return Err(RytError::invalid_tag(
                format!(
                    "only one tag is allowed on a node, already tagged \
                     !{}",
                    existing.name
                ),
                existing.span.start,
            ));
        }
        node.tag = Some(tag);
        Ok(node)
    }

    pub(crate) fn parse_tag(&mut self) -> Result<YamlTagProp, RytError> {
        let start = self.iter.next_pos();
        self.bump();
        let mut name = String::new();
        while let Some(c) = self.iter.peek() {
            if c.is_ascii_alphanumeric() {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Err(RytError::invalid_tag(
                "tag must start with a letter".to_string(),
                start,
            ));
        }
        let end = self.iter.pos();
        Ok(YamlTagProp {
            name,
            span: RytSpan::new(start, end),
        })
    }

    /// Read a `$`-prefixed or plain key followed by `:` and a separator.
    pub(crate) fn read_map_key(
        &mut self,
    ) -> Result<(String, bool), RytError> {
        let start = self.iter.next_pos();
        let mut is_var = false;
        let mut key = String::new();
        if self.iter.peek() == Some('$') {
            is_var = true;
            self.bump();
        }
        while let Some(c) = self.iter.peek() {
            if is_key_char(c) {
                key.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if key.is_empty() {
            return Err(RytError::invalid_key(
                "expecting a key".to_string(),
                start,
            ));
        }
        if self.iter.peek() != Some(':') {
            return Err(RytError::invalid_key(
                format!("expecting `:` after key `{key}`"),
                self.iter.next_pos(),
            ));
        }
        self.bump();
        if !matches!(self.iter.peek(), None | Some(' ') | Some('\n')) {
            return Err(RytError::invalid_key(
                format!("expecting space or line break after `{key}:`"),
                self.iter.next_pos(),
            ));
        }
        let key = if is_var { format!("${key}") } else { key };
        Ok((key, is_var))
    }

    /// Read a scalar token and build its node. Quoted scalars are always
    /// strings; unquoted ones are classified.
    pub(crate) fn parse_scalar_node(
        &mut self,
        in_flow: bool,
    ) -> Result<YamlNode, RytError> {
        let start = self.iter.next_pos();
        if self.iter.peek() == Some('"') {
            self.bump();
            let raw = read_double_quoted_str(&mut self.iter)?;
            self.content_since_line_start = true;
            let end = self.iter.pos();
            return Ok(self.make_scalar(raw, RytSpan::new(start, end), true));
        }
        let mut raw = String::new();
        let mut end = start;
        while let Some(c) = self.iter.peek() {
            if c == '\n' || c == '#' {
                break;
            }
            if c == '\t' {
                return Err(RytError::tab_character(self.iter.next_pos()));
            }
            if in_flow {
                if matches!(c, ',' | ']' | '}') {
                    break;
                }
                if c == ':'
                    && matches!(
                        self.iter.peek_second(),
                        None | Some(' ')
                            | Some(',')
                            | Some(']')
                            | Some('}')
                            | Some('\n')
                    )
                {
                    break;
                }
            }
            raw.push(c);
            self.bump();
            if c != ' ' {
                end = self.iter.pos();
            }
        }
        let raw = raw.trim_end().to_string();
        Ok(self.make_scalar(raw, RytSpan::new(start, end), false))
    }

    pub(crate) fn make_scalar(
        &mut self,
        raw: String,
        span: RytSpan,
        quoted: bool,
    ) -> YamlNode {
        let data = if quoted {
            YamlNodeData::String(raw.clone())
        } else {
            classify_scalar(&raw)
        };
        let mut node = YamlNode::new(data, span);
        if self.opts.generate_presentation {
            let mut pres = self.cursor.take_pending();
            if crate::variable::contains_var(&raw) {
                pres.value_with_variables = Some(raw);
            }
            let id = self.store.alloc(pres);
            node.pres = Some(id);
            self.cursor.set_last(Some(id));
        }
        node
    }

    /// Allocate a presentation record for a container node that was just
    /// completed, marking it the attach target for inline comments.
    pub(crate) fn finish_container(
        &mut self,
        node: &mut YamlNode,
        pres: Presentation,
    ) {
        if !self.opts.generate_presentation {
            return;
        }
        let id = self.store.alloc(pres);
        node.pres = Some(id);
        self.cursor.set_last(Some(id));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ErrorKind;

    fn parse(input: &str) -> Result<YamlDocument, RytError> {
        parse_str(input, &ParseOptions::default())
    }

    #[test]
    fn test_scalar_document() -> Result<(), RytError> {
        let doc = parse("128")?;
        assert_eq!(doc.root.data, YamlNodeData::Uint(128));
        assert_eq!(doc.root.span.start, RytPosition::new(1, 1));
        assert_eq!(doc.root.span.end, RytPosition::new(1, 3));
        Ok(())
    }

    #[test]
    fn test_quoted_scalar_keeps_string() -> Result<(), RytError> {
        let doc = parse("\"128\"")?;
        assert_eq!(doc.root.data, YamlNodeData::String("128".to_string()));
        Ok(())
    }

    #[test]
    fn test_missing_data_on_empty_input() {
        let e = parse("").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MissingData);
        let e = parse("   \n\n").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MissingData);
    }

    #[test]
    fn test_tab_rejected() {
        let e = parse("\ta: 1").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::TabCharacterDetected);
    }

    #[test]
    fn test_extra_characters_after_data() {
        let e = parse("abc\ndef").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::ExtraCharactersAfterData);
        assert_eq!(e.pos(), RytPosition::new(2, 1));
    }

    #[test]
    fn test_tagged_scalar() -> Result<(), RytError> {
        let doc = parse("!color red")?;
        assert_eq!(
            doc.root.data,
            YamlNodeData::String("red".to_string())
        );
        assert_eq!(doc.root.tag.as_ref().map(|t| t.name.as_str()), Some("color"));
        Ok(())
    }

    #[test]
    fn test_two_tags_rejected() {
        let e = parse("!one !two data").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidTag);
    }

    #[test]
    fn test_tag_must_start_with_letter() {
        let e = parse("!1tag data").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidTag);
    }

    #[test]
    fn test_include_rejected_without_directory() {
        let e = parse("!include other.yml").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidInclude);
    }

    #[test]
    fn test_negative_and_minus_zero() -> Result<(), RytError> {
        assert_eq!(parse("-3")?.root.data, YamlNodeData::Int(-3));
        assert_eq!(parse("-0")?.root.data, YamlNodeData::Uint(0));
        Ok(())
    }

    #[test]
    fn test_comment_attachment() -> Result<(), RytError> {
        let doc = parse("# above\nvalue # beside")?;
        let pres = doc.presentation_of(&doc.root).unwrap();
        assert_eq!(pres.prefix_comments, vec![" above".to_string()]);
        assert_eq!(pres.inline_comment.as_deref(), Some(" beside"));
        Ok(())
    }

    #[test]
    fn test_empty_lines_capped() -> Result<(), RytError> {
        let doc = parse("\n\n\n\n\nvalue")?;
        let pres = doc.presentation_of(&doc.root).unwrap();
        assert_eq!(pres.empty_lines, 2);
        Ok(())
    }

    #[test]
    fn test_value_with_variables_recorded() -> Result<(), RytError> {
        let opts = ParseOptions {
            allow_unbound_variables: true,
            ..Default::default()
        };
        let doc = parse_str("\"$host:$port\"", &opts)?;
        let pres = doc.presentation_of(&doc.root).unwrap();
        assert_eq!(
            pres.value_with_variables.as_deref(),
            Some("$host:$port")
        );
        assert_eq!(
            doc.unbound_variables,
            vec!["host".to_string(), "port".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_unbound_variables_rejected_by_default() {
        let e = parse("addr: $host").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::UnboundVariables);
        assert!(e.msg().contains("$host"));
    }
}
