// SPDX-License-Identifier: Apache-2.0

use std::hash::{DefaultHasher, Hasher};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::{
    packer::{PackRun, PackState},
    Inclusion, OverrideRecord, PathSeg, RytError, RytPosition, YamlNode,
    YamlNodeData,
};

/// Where subfiles are written, and the dedup table deciding which paths
/// are shared. One store spans a whole pack invocation, nested includes
/// included.
pub(crate) struct SubfileStore {
    dir: Option<PathBuf>,
    /// Chosen relative path → content hash.
    dedup: IndexMap<String, u64>,
}

impl SubfileStore {
    pub(crate) fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            dedup: IndexMap::new(),
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Choose an on-disk path for subfile content: an unused path is
    /// written and recorded, an equal-hash path is reused, a conflicting
    /// one probes `base~1.ext`, `base~2.ext`, …
    fn store(&mut self, rel: &str, content: &str) -> Result<String, RytError> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => {
                return Err(RytError::bug(
                    "subfile store used without an output directory"
                        .to_string(),
                    RytPosition::EOF,
                ));
            }
        };
        let hash = hash_content(content);
        let mut candidate = rel.to_string();
        let mut n = 0usize;
        loop {
            match self.dedup.get(&candidate) {
                None => {
                    write_file(&dir.join(&candidate), content)?;
                    self.dedup.insert(candidate.clone(), hash);
                    log::debug!("Wrote subfile {candidate}");
                    return Ok(candidate);
                }
                Some(known) if *known == hash => {
                    log::debug!("Reusing subfile {candidate}");
                    return Ok(candidate);
                }
                Some(_) => {
                    n += 1;
                    candidate = suffixed(rel, n);
                }
            }
        }
    }
}

fn hash_content(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(content.as_bytes());
    hasher.finish()
}

/// `shared.yml` → `shared~1.yml`: the suffix lands before the extension
/// of the file name, directory components untouched.
fn suffixed(rel: &str, n: usize) -> String {
    let (dir, name) = match rel.rfind('/') {
        Some(at) => (&rel[..at + 1], &rel[at + 1..]),
        None => ("", rel),
    };
    match name.rfind('.') {
        Some(at) if at > 0 => {
            format!("{dir}{}~{n}{}", &name[..at], &name[at..])
        }
        _ => format!("{dir}{name}~{n}"),
    }
}

/// Create + truncate + write-only, parents created if missing. Write and
/// close failures are reported distinctly, with the offending path.
pub(crate) fn write_file(path: &Path, content: &str) -> Result<(), RytError> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| RytError::io("create directory", parent, e))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .map_err(|e| RytError::io("create", path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| RytError::io("write", path, e))?;
    file.sync_all()
        .map_err(|e| RytError::io("close", path, e))?;
    Ok(())
}

/// Recreate an included node's subfile, then emit the `!include` line,
/// the override block reconstructed from its records, and the variable
/// bindings re-deduced while packing the subfile.
pub(crate) fn emit_include(
    run: &mut PackRun,
    sub: &mut SubfileStore,
    node: &YamlNode,
    incl: &Inclusion,
    level: usize,
    skip_leading: bool,
) -> Result<(), RytError> {
    if !skip_leading {
        run.flush_before(Some(&incl.include_pres), level);
    }
    // A raw include whose node no longer holds a string downgrades to a
    // non-raw include.
    let raw = incl.raw && matches!(node.data, YamlNodeData::String(_));
    if incl.raw && !raw {
        log::debug!(
            "Raw include {} no longer holds a string, downgrading",
            incl.path
        );
    }
    let (buffer, mut child_vars) = if raw {
        let content = match &node.data {
            YamlNodeData::String(s) => s.clone(),
            _ => String::new(),
        };
        (content, Vec::new())
    } else {
        let original = reconstruct_original(node, &incl.records);
        let mut child = PackRun::new(run.store_ref(), true);
        match &incl.inner {
            Some(inner) => {
                emit_include(&mut child, sub, &original, inner, 0, false)?;
            }
            None => child.emit_content(&original, 0, sub, false)?,
        }
        child.goto_state(PackState::OnNewline, 0);
        (child.out, child.discovered)
    };
    let chosen = sub.store(&incl.path, &buffer)?;
    run.emit_token(
        &format!(
            "!{} {chosen}",
            if raw { "includeraw" } else { "include" }
        ),
        level,
    );
    run.flush_inline(Some(&incl.include_pres));
    emit_override_block(run, node, &incl.records, level, sub)?;
    for name in &incl.variables {
        if let Some(at) = child_vars.iter().position(|(n, _)| n == name) {
            let (_, value) = child_vars.remove(at);
            run.emit_key(&format!("${name}"), level);
            run.emit_node(&value, level + 1, sub, false)?;
        } else {
            log::debug!(
                "Variable ${name} was not re-deduced while packing {}",
                incl.path
            );
        }
    }
    // Values this include did not bind may belong to an outer one.
    run.discovered.append(&mut child_vars);
    Ok(())
}

/// Undo recorded overrides on a clone of the merged subtree: restore
/// recorded originals, drop added keys and appended elements.
fn reconstruct_original(
    node: &YamlNode,
    records: &[OverrideRecord],
) -> YamlNode {
    let mut original = node.clone();
    for rec in records.iter().rev() {
        match &rec.original {
            Some(o) => {
                if let Some(target) = original.descend_mut(&rec.path) {
                    target.data = o.data.clone();
                }
            }
            None => {
                let Some((parent, last)) = rec.path.split_last() else {
                    continue;
                };
                let Some(parent_node) = original.descend_mut(&parent)
                else {
                    continue;
                };
                match (last, &mut parent_node.data) {
                    (PathSeg::Key(key), YamlNodeData::Map(map)) => {
                        map.shift_remove(&key);
                    }
                    (PathSeg::Index(i), YamlNodeData::Sequence(items)) => {
                        if i < items.len() {
                            items.remove(i);
                        }
                    }
                    _ => (),
                }
            }
        }
    }
    original
}

/// Replay override records in order against the current AST: changed
/// values and additions re-emit, records whose node disappeared drop.
fn emit_override_block(
    run: &mut PackRun,
    node: &YamlNode,
    records: &[OverrideRecord],
    level: usize,
    sub: &mut SubfileStore,
) -> Result<(), RytError> {
    let mut opened: Vec<String> = Vec::new();
    for rec in records {
        let Some(current) = node.descend(&rec.path) else {
            log::debug!(
                "Dropping override entry {}: node disappeared",
                rec.path
            );
            continue;
        };
        if let Some(original) = &rec.original {
            if original.data == current.data {
                continue;
            }
        }
        let Some((parent_path, last)) = rec.path.split_last() else {
            continue;
        };
        let parents = parent_path.segments();
        let mut common = 0usize;
        while common < opened.len() && common < parents.len() {
            match &parents[common] {
                PathSeg::Key(k) if *k == opened[common] => common += 1,
                _ => break,
            }
        }
        opened.truncate(common);
        for seg in &parents[common..] {
            let PathSeg::Key(key) = seg else {
                break;
            };
            run.emit_key(key, level + opened.len());
            opened.push(key.clone());
        }
        let depth = level + opened.len();
        match &last {
            PathSeg::Key(key) => {
                run.emit_key(key, depth);
                run.emit_node(current, depth + 1, sub, false)?;
            }
            PathSeg::Index(_) => {
                run.emit_dash(depth);
                run.emit_node(current, depth + 1, sub, false)?;
            }
        }
    }
    Ok(())
}
