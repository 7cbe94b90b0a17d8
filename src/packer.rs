// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::{
    scalar::{needs_quote, scalar_to_string, write_quoted},
    subfile::SubfileStore,
    Presentation, PresentationStore, RytError, RytSpan, YamlDocument,
    YamlNode, YamlNodeData,
};

/// Whitespace state between emitted tokens. Every data write goes through
/// `Clean` and leaves the machine in `AfterData`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum PackState {
    Clean,
    OnDash,
    OnKey,
    OnNewline,
    AfterData,
}

/// Packer configuration: an optional output directory for subfile
/// recreation and the no-subfiles flag forcing included content inline.
#[derive(Debug, Clone, Default)]
pub struct PackEnv {
    output_dir: Option<PathBuf>,
    no_subfiles: bool,
}

impl PackEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the output directory if missing and remember its canonical
    /// path. Includes are recreated as subfiles under it.
    pub fn set_output_dir(&mut self, dir: &Path) -> Result<(), RytError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| RytError::io("create directory", dir, e))?;
        let canonical = dir
            .canonicalize()
            .map_err(|e| RytError::io("open", dir, e))?;
        self.output_dir = Some(canonical);
        Ok(())
    }

    /// Inline included content in the top-level stream even when an
    /// output directory is configured.
    pub fn set_no_subfiles(&mut self, no_subfiles: bool) {
        self.no_subfiles = no_subfiles;
    }

    fn run(&self, doc: &YamlDocument) -> Result<String, RytError> {
        let dir = if self.no_subfiles {
            None
        } else {
            self.output_dir.clone()
        };
        let mut sub = SubfileStore::new(dir);
        let mut run = PackRun::new(&doc.store, false);
        run.emit_node(&doc.root, 0, &mut sub, false)?;
        run.goto_state(PackState::OnNewline, 0);
        for (name, _) in &run.discovered {
            log::debug!(
                "Discarding re-deduced variable ${name}: no include binds it"
            );
        }
        Ok(run.out)
    }

    pub fn pack_to_string(
        &mut self,
        doc: &YamlDocument,
    ) -> Result<String, RytError> {
        self.run(doc)
    }

    pub fn pack_to_file(
        &mut self,
        doc: &YamlDocument,
        path: &Path,
    ) -> Result<(), RytError> {
        let text = self.run(doc)?;
        crate::subfile::write_file(path, &text)
    }

    pub fn pack_with<F>(
        &mut self,
        doc: &YamlDocument,
        mut callback: F,
    ) -> Result<(), RytError>
    where
        F: FnMut(&str),
    {
        let text = self.run(doc)?;
        callback(&text);
        Ok(())
    }
}

/// One in-flight emission: the top-level stream or one subfile buffer.
pub(crate) struct PackRun<'a> {
    store: &'a PresentationStore,
    pub(crate) out: String,
    state: PackState,
    /// Subfile buffers re-emit `$name` templates; the top-level stream
    /// emits resolved values.
    in_subfile: bool,
    /// Variable values re-deduced from templates, waiting for the include
    /// that binds them.
    pub(crate) discovered: Vec<(String, YamlNode)>,
}

impl<'a> PackRun<'a> {
    pub(crate) fn new(store: &'a PresentationStore, in_subfile: bool) -> Self {
        Self {
            store,
            out: String::new(),
            state: PackState::OnNewline,
            in_subfile,
            discovered: Vec::new(),
        }
    }

    pub(crate) fn pres(&self, node: &YamlNode) -> Option<&'a Presentation> {
        node.pres.and_then(|id| self.store.get(id))
    }

    pub(crate) fn store_ref(&self) -> &'a PresentationStore {
        self.store
    }

    /// Emit `key:` (or `$name:`) and land in the on-key state.
    pub(crate) fn emit_key(&mut self, key: &str, level: usize) {
        self.goto_state(PackState::OnKey, level);
        self.out.push_str(key);
        self.out.push(':');
        self.state = PackState::OnKey;
    }

    pub(crate) fn emit_dash(&mut self, level: usize) {
        self.goto_state(PackState::OnDash, level);
        self.out.push('-');
        self.state = PackState::OnDash;
    }

    fn push_indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str("  ");
        }
    }

    pub(crate) fn goto_state(&mut self, to: PackState, level: usize) {
        use PackState::*;
        match (self.state, to) {
            (Clean, OnNewline) => self.out.push('\n'),
            (OnDash, Clean | OnDash | OnKey) => self.out.push(' '),
            (OnDash, OnNewline) => self.out.push('\n'),
            (OnKey, Clean) => self.out.push(' '),
            (OnKey, OnDash | OnKey) => {
                self.out.push('\n');
                self.push_indent(level);
            }
            (OnKey, OnNewline) => self.out.push('\n'),
            (OnNewline, Clean | OnDash | OnKey) => self.push_indent(level),
            (AfterData, Clean) => self.out.push(' '),
            (AfterData, OnDash | OnKey) => {
                self.out.push('\n');
                self.push_indent(level);
            }
            (AfterData, OnNewline) => self.out.push('\n'),
            _ => (),
        }
        self.state = to;
    }

    pub(crate) fn emit_token(&mut self, token: &str, level: usize) {
        self.goto_state(PackState::Clean, level);
        self.out.push_str(token);
        self.state = PackState::AfterData;
    }

    /// Empty lines flush first, then prefix comments, each on its own
    /// line at the node's indent.
    pub(crate) fn flush_before(
        &mut self,
        pres: Option<&Presentation>,
        level: usize,
    ) {
        let Some(pres) = pres else {
            return;
        };
        if pres.empty_lines == 0 && pres.prefix_comments.is_empty() {
            return;
        }
        self.goto_state(PackState::OnNewline, 0);
        for _ in 0..pres.empty_lines {
            self.out.push('\n');
        }
        for comment in &pres.prefix_comments {
            self.push_indent(level);
            self.out.push('#');
            self.out.push_str(comment);
            self.out.push('\n');
        }
    }

    pub(crate) fn flush_inline(&mut self, pres: Option<&Presentation>) {
        if let Some(comment) =
            pres.and_then(|p| p.inline_comment.as_deref())
        {
            self.out.push_str(" #");
            self.out.push_str(comment);
        }
    }

    /// Flush the presentation that belongs in front of a node's first
    /// line, e.g. before the dash that introduces it as a sequence
    /// element.
    pub(crate) fn flush_leading(&mut self, node: &YamlNode, level: usize) {
        let pres = self.pres(node);
        if let Some(incl) = pres.and_then(|p| p.included.as_deref()) {
            self.flush_before(Some(&incl.include_pres), level);
            return;
        }
        let flow = pres.map(|p| p.flow_mode).unwrap_or(false);
        match &node.data {
            YamlNodeData::Map(map) if !flow => {
                if let Some((_, entry)) = map.iter().next() {
                    let kp =
                        entry.key_pres.and_then(|id| self.store.get(id));
                    self.flush_before(kp, level);
                }
            }
            YamlNodeData::Sequence(items) if !flow => {
                if let Some(first) = items.first() {
                    self.flush_leading(first, level);
                }
            }
            _ => self.flush_before(pres, level),
        }
    }

    pub(crate) fn emit_node(
        &mut self,
        node: &YamlNode,
        level: usize,
        sub: &mut SubfileStore,
        skip_leading: bool,
    ) -> Result<(), RytError> {
        if let Some(incl) =
            self.pres(node).and_then(|p| p.included.as_deref())
        {
            if sub.enabled() {
                return crate::subfile::emit_include(
                    self,
                    sub,
                    node,
                    incl,
                    level,
                    skip_leading,
                );
            }
            // Inlining: the include line's presentation stays in front of
            // the substituted content.
            if !skip_leading {
                self.flush_before(Some(&incl.include_pres), level);
            }
            return self.emit_content(node, level, sub, true);
        }
        self.emit_content(node, level, sub, skip_leading)
    }

    /// Emit a node's data, ignoring any inclusion on it.
    pub(crate) fn emit_content(
        &mut self,
        node: &YamlNode,
        level: usize,
        sub: &mut SubfileStore,
        skip_leading: bool,
    ) -> Result<(), RytError> {
        let pres = self.pres(node);
        match &node.data {
            YamlNodeData::Sequence(items) => {
                if self.use_flow(node) {
                    if !skip_leading {
                        self.flush_before(pres, level);
                    }
                    let text = self.flow_string(node);
                    self.emit_token(&text, level);
                    self.flush_inline(pres);
                } else {
                    self.emit_tag(node, level);
                    self.emit_block_seq(node, items, level, sub, skip_leading)?;
                }
            }
            YamlNodeData::Map(map) => {
                if self.use_flow(node) {
                    if !skip_leading {
                        self.flush_before(pres, level);
                    }
                    let text = self.flow_string(node);
                    self.emit_token(&text, level);
                    self.flush_inline(pres);
                } else {
                    self.emit_tag(node, level);
                    self.emit_block_map(node, map, level, sub, skip_leading)?;
                }
            }
            _ => {
                if !skip_leading {
                    self.flush_before(pres, level);
                }
                self.emit_tag(node, level);
                let text = self.scalar_text(node);
                self.emit_token(&text, level);
                self.flush_inline(pres);
            }
        }
        Ok(())
    }

    /// Flow style is honored unless any descendant carries a tag, which
    /// flow cannot express.
    fn use_flow(&self, node: &YamlNode) -> bool {
        self.pres(node).map(|p| p.flow_mode).unwrap_or(false)
            && !node.has_tag_deep()
    }

    fn emit_tag(&mut self, node: &YamlNode, level: usize) {
        if let Some(tag) = &node.tag {
            self.emit_token(&format!("!{}", tag.name), level);
        }
    }

    fn emit_block_seq(
        &mut self,
        node: &YamlNode,
        items: &[YamlNode],
        level: usize,
        sub: &mut SubfileStore,
        skip_leading: bool,
    ) -> Result<(), RytError> {
        let pres = self.pres(node);
        if pres.map(|p| p.flow_mode).unwrap_or(false) && !skip_leading {
            // Downgraded flow: its comments live on the container.
            self.flush_before(pres, level);
        }
        for (i, item) in items.iter().enumerate() {
            if !(i == 0 && skip_leading) {
                self.flush_leading(item, level);
            }
            self.emit_dash(level);
            self.emit_node(item, level + 1, sub, true)?;
        }
        Ok(())
    }

    fn emit_block_map(
        &mut self,
        node: &YamlNode,
        map: &crate::YamlNodeMap,
        level: usize,
        sub: &mut SubfileStore,
        skip_leading: bool,
    ) -> Result<(), RytError> {
        let pres = self.pres(node);
        if pres.map(|p| p.flow_mode).unwrap_or(false) && !skip_leading {
            self.flush_before(pres, level);
        }
        for (i, (key, entry)) in map.iter().enumerate() {
            let kp = entry.key_pres.and_then(|id| self.store.get(id));
            if !(i == 0 && skip_leading) {
                self.flush_before(kp, level);
            }
            self.emit_key(key, level);
            if let Some(comment) =
                kp.and_then(|p| p.inline_comment.as_deref())
            {
                self.out.push_str(" #");
                self.out.push_str(comment);
                self.state = PackState::AfterData;
                self.goto_state(PackState::OnNewline, 0);
            }
            self.emit_node(&entry.value, level + 1, sub, false)?;
        }
        Ok(())
    }

    fn flow_string(&mut self, node: &YamlNode) -> String {
        match &node.data {
            YamlNodeData::Sequence(items) => {
                if items.is_empty() {
                    return "[]".to_string();
                }
                let mut parts: Vec<String> = Vec::new();
                for item in items {
                    // An inline one-key mapping renders bare.
                    let part = if let YamlNodeData::Map(map) = &item.data {
                        if let Some((k, e)) =
                            map.iter().next().filter(|_| map.len() == 1)
                        {
                            format!("{k}: {}", self.flow_string(&e.value))
                        } else {
                            self.flow_string(item)
                        }
                    } else {
                        self.flow_string(item)
                    };
                    parts.push(part);
                }
                format!("[ {} ]", parts.join(", "))
            }
            YamlNodeData::Map(map) => {
                if map.is_empty() {
                    return "{}".to_string();
                }
                let mut parts: Vec<String> = Vec::new();
                for (key, entry) in map.iter() {
                    parts.push(format!(
                        "{key}: {}",
                        self.flow_string(&entry.value)
                    ));
                }
                format!("{{ {} }}", parts.join(", "))
            }
            _ => self.scalar_text(node),
        }
    }

    /// The text of a scalar. Inside a subfile, a value whose presentation
    /// carries a `$name` template is matched back against it; on success
    /// the template is re-emitted and the discovered values queue up for
    /// the binding flush after the include line.
    pub(crate) fn scalar_text(&mut self, node: &YamlNode) -> String {
        if self.in_subfile {
            if let Some(template) = self
                .pres(node)
                .and_then(|p| p.value_with_variables.as_ref())
            {
                if let Some(found) = match_template(template, &node.data) {
                    for (name, value) in found {
                        if self
                            .discovered
                            .iter()
                            .any(|(n, _)| n == &name)
                        {
                            log::debug!(
                                "Variable ${name} re-deduced more than \
                                 once, keeping the first value"
                            );
                        } else {
                            self.discovered.push((name, value));
                        }
                    }
                    return quote_if_needed(template);
                }
                log::debug!(
                    "Value no longer matches template `{template}`, \
                     emitting it resolved"
                );
            }
        }
        match &node.data {
            YamlNodeData::String(s) => quote_if_needed(s),
            other => scalar_to_string(other),
        }
    }
}

fn quote_if_needed(s: &str) -> String {
    if needs_quote(s) {
        let mut out = String::new();
        write_quoted(&mut out, s);
        out
    } else {
        s.to_string()
    }
}

/// Match a scalar back against its `$name` template. A whole-value
/// template captures the node as-is; an in-string template splits the
/// current string along the template's fixed parts, leftmost-first.
fn match_template(
    template: &str,
    data: &YamlNodeData,
) -> Option<Vec<(String, YamlNode)>> {
    let refs = crate::variable::find_refs(template);
    if refs.is_empty() {
        return None;
    }
    if let Some(name) = crate::variable::whole_value_name(template) {
        return Some(vec![(
            name.to_string(),
            YamlNode::new(data.clone(), RytSpan::default()),
        )]);
    }
    let current = match data {
        YamlNodeData::String(s) => s.as_str(),
        _ => return None,
    };
    let prefix = &template[..refs[0].0];
    if !current.starts_with(prefix) {
        return None;
    }
    let mut idx = prefix.len();
    let mut found: Vec<(String, YamlNode)> = Vec::new();
    for (i, (start, len, name)) in refs.iter().enumerate() {
        let fixed_end =
            refs.get(i + 1).map(|r| r.0).unwrap_or(template.len());
        let fixed = &template[start + len..fixed_end];
        let value = if i + 1 == refs.len() {
            let rest = current.get(idx..)?;
            let stripped = rest.strip_suffix(fixed)?;
            idx = current.len();
            stripped
        } else {
            if fixed.is_empty() {
                // Adjacent references cannot be split apart.
                return None;
            }
            let at = current.get(idx..)?.find(fixed)?;
            let value = &current[idx..idx + at];
            idx += at + fixed.len();
            value
        };
        found.push((
            name.to_string(),
            YamlNode::new(
                YamlNodeData::String(value.to_string()),
                RytSpan::default(),
            ),
        ));
    }
    Some(found)
}
