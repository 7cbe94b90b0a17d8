// SPDX-License-Identifier: Apache-2.0

use std::path::{Component, Path};

use crate::{
    error::IncludeFrame, parser::ParseContext, Inclusion, Presentation,
    RytError, RytPosition, YamlNode, YamlNodeData, YamlTagProp,
};

/// Resolve `!include`/`!includeraw` over a parsed path scalar: load the
/// subfile, replace the node with its content, then merge the override
/// object that may follow and apply its variable bindings.
pub(crate) fn resolve_include(
    ctx: &mut ParseContext,
    tag: YamlTagProp,
    node: YamlNode,
    min_indent: usize,
) -> Result<YamlNode, RytError> {
    let raw = tag.name == "includeraw";
    if let Some(existing) = &node.tag {
        return Err(RytError::invalid_tag(
            format!(
                "tag !{} is not allowed on an include path",
                existing.name
            ),
            existing.span.start,
        ));
    }
    let path_str = match &node.data {
        YamlNodeData::String(s) => s.clone(),
        _ => {
            return Err(RytError::expected_string(
                "include path must be a string".to_string(),
                node.span.start,
            ));
        }
    };
    // The path scalar's presentation is the include line's; its inline
    // comment may still arrive while the override block is detected, so
    // it is captured at the end.
    let include_pres_id = node.pres;
    let site = tag.span.start;

    let dir = match &ctx.dir {
        Some(dir) => dir.clone(),
        None => {
            return Err(RytError::invalid_include(
                "no containing directory to resolve include".to_string(),
                node.span.start,
            ));
        }
    };
    let rel = Path::new(&path_str);
    if rel.is_absolute()
        || rel
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(RytError::invalid_include(
            format!("include path `{path_str}` escapes the containing directory"),
            node.span.start,
        ));
    }
    let full = dir.join(rel);
    let canonical = full.canonicalize().map_err(|e| {
        RytError::invalid_include(
            format!("cannot open included file {}: {e}", full.display()),
            node.span.start,
        )
    })?;
    if ctx.ancestors.contains(&canonical) {
        let e = RytError::invalid_include(
            "inclusion loop detected".to_string(),
            RytPosition::new(1, 1),
        )
        .with_context(Some(&full), None);
        return Err(e.with_include_frame(include_frame(ctx, site)));
    }

    let file = std::fs::File::open(&canonical).map_err(|e| {
        RytError::invalid_include(
            format!("cannot open included file {}: {e}", full.display()),
            node.span.start,
        )
    })?;
    // Safety: the file is opened read-only and the mapping is dropped
    // before this function returns.
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| {
        RytError::invalid_include(
            format!("cannot map included file {}: {e}", full.display()),
            node.span.start,
        )
    })?;
    let source = std::str::from_utf8(&mmap).map_err(|_| {
        RytError::invalid_include(
            format!("included file {} is not valid UTF-8", full.display()),
            node.span.start,
        )
    })?;
    log::debug!(
        "Including {} from {}",
        full.display(),
        ctx.file_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    );

    let mut inclusion = Inclusion::new(path_str, raw);

    let mut new_node = if raw {
        YamlNode::new(
            YamlNodeData::String(source.to_string()),
            node.span,
        )
    } else {
        let mut ancestors = ctx.ancestors.clone();
        ancestors.push(canonical.clone());
        let mut child = ParseContext::new(
            source,
            Some(full.clone()),
            canonical.parent().map(Path::to_path_buf),
            ancestors,
            ctx.opts,
        );
        let mut sub_root = match child.parse_root() {
            Ok(root) => root,
            Err(e) => {
                let e = child.attach(e);
                return Err(e.with_include_frame(include_frame(ctx, site)));
            }
        };
        ctx.store.rehome(&mut sub_root, &child.store);
        sub_root
    };

    parse_override_block(ctx, &mut new_node, &mut inclusion, min_indent)?;
    inclusion.include_pres = include_pres_id
        .and_then(|id| ctx.store.get(id))
        .cloned()
        .unwrap_or_default();

    if ctx.opts.generate_presentation {
        let pres_id = match new_node.pres {
            Some(id) => id,
            None => {
                let id = ctx.store.alloc(Presentation::default());
                new_node.pres = Some(id);
                id
            }
        };
        if let Some(pres) = ctx.store.get_mut(pres_id) {
            inclusion.inner = pres.included.take();
            pres.included = Some(Box::new(inclusion));
        }
    }
    Ok(new_node)
}

/// A mapping at an indent no shallower than the include is the override:
/// `$name:` entries at its top level bind variables, the rest merges into
/// the included data.
fn parse_override_block(
    ctx: &mut ParseContext,
    target: &mut YamlNode,
    inclusion: &mut Inclusion,
    min_indent: usize,
) -> Result<(), RytError> {
    ctx.trim()?;
    let c = match ctx.iter.peek() {
        Some(c) => c,
        None => return Ok(()),
    };
    if ctx.iter.next_pos().column < min_indent {
        return Ok(());
    }
    if c != '$' && !ctx.lookahead_block_map_key() {
        return Ok(());
    }
    let over = ctx.parse_block_map(min_indent, true)?;
    let over_map = match over.data {
        YamlNodeData::Map(map) => *map,
        _ => return Ok(()),
    };

    let mut bindings: Vec<(String, YamlNode, RytPosition)> = Vec::new();
    let mut structural = crate::YamlNodeMap::new();
    for (key, entry) in over_map.into_iter() {
        if let Some(name) = key.strip_prefix('$') {
            bindings.push((
                name.to_string(),
                entry.value,
                entry.key_span.start,
            ));
        } else {
            structural.insert(key, entry);
        }
    }

    if !structural.is_empty() {
        let over_node = YamlNode::new(
            YamlNodeData::Map(Box::new(structural)),
            over.span,
        );
        crate::overrides::merge(
            target,
            over_node,
            &crate::NodePath::root(),
            &mut inclusion.records,
        )?;
    }

    for (name, value, key_pos) in bindings {
        let replaced = crate::variable::bind(target, &name, &value)?;
        if replaced == 0 {
            return Err(RytError::unknown_variable(&name, key_pos));
        }
        log::debug!("Bound ${name} at {replaced} reference(s)");
        inclusion.variables.push(name);
    }
    Ok(())
}

fn include_frame(ctx: &ParseContext, pos: RytPosition) -> IncludeFrame {
    IncludeFrame {
        file: ctx.file_path.clone(),
        pos,
        source_line: ctx.source_line(pos.line).map(str::to_string),
    }
}
