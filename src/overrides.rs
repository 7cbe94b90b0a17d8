// SPDX-License-Identifier: Apache-2.0

use crate::{
    NodePath, OverrideRecord, RytError, YamlNode, YamlNodeData,
};

/// Merge an override subtree into included data, recording per-leaf
/// originals so repacking can reconstruct both the untouched subfile and
/// the override block.
///
/// Rules: kinds must match; scalars are overwritten (original recorded);
/// sequence elements are appended (`[new_idx]`, no original); mapping
/// entries recurse on existing keys and append on new ones.
pub(crate) fn merge(
    target: &mut YamlNode,
    over: YamlNode,
    path: &NodePath,
    records: &mut Vec<OverrideRecord>,
) -> Result<(), RytError> {
    if target.kind() != over.kind() {
        return Err(RytError::override_type_mismatch(over.span.start));
    }
    match over.data {
        YamlNodeData::Sequence(over_items) => {
            if let YamlNodeData::Sequence(items) = &mut target.data {
                for elem in over_items {
                    records.push(OverrideRecord {
                        path: path.with_index(items.len()),
                        original: None,
                    });
                    items.push(elem);
                }
            }
        }
        YamlNodeData::Map(over_map) => {
            if let YamlNodeData::Map(map) = &mut target.data {
                for (key, entry) in (*over_map).into_iter() {
                    let key_path = path.with_key(&key);
                    if let Some(existing) = map.get_mut(&key) {
                        merge(
                            &mut existing.value,
                            entry.value,
                            &key_path,
                            records,
                        )?;
                    } else {
                        records.push(OverrideRecord {
                            path: key_path,
                            original: None,
                        });
                        map.insert(key, entry);
                    }
                }
            }
        }
        _ => {
            records.push(OverrideRecord {
                path: path.clone(),
                original: Some(target.clone()),
            });
            target.data = over.data;
        }
    }
    Ok(())
}
