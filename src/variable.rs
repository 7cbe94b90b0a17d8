// SPDX-License-Identifier: Apache-2.0

use crate::{PresentationStore, RytError, YamlNode, YamlNodeData};

/// Find `$name` placeholders in a string. Returns `(byte_start, byte_len,
/// name)` for each occurrence, where the range covers the `$` and the
/// name. A name starts with a letter or `_` and continues alphanumeric or
/// `_`.
pub(crate) fn find_refs(s: &str) -> Vec<(usize, usize, &str)> {
    let mut ret = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let name_start = i + 1;
            let mut j = name_start;
            while j < bytes.len()
                && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_')
            {
                j += 1;
            }
            let first_ok = bytes
                .get(name_start)
                .is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_');
            if first_ok {
                ret.push((i, j - i, &s[name_start..j]));
                i = j;
                continue;
            }
        }
        i += 1;
    }
    ret
}

pub(crate) fn contains_var(s: &str) -> bool {
    !find_refs(s).is_empty()
}

/// Whether the literal is exactly one `$name`, making it a whole-value
/// reference rather than an in-string one.
pub(crate) fn whole_value_name(s: &str) -> Option<&str> {
    let refs = find_refs(s);
    match refs.as_slice() {
        [(0, len, name)] if *len == s.len() => Some(*name),
        _ => None,
    }
}

/// Names referenced anywhere under `root`, in first-seen order. The
/// verbatim content of a raw include is not a variable site and is
/// skipped.
pub(crate) fn collect_unbound(
    root: &YamlNode,
    store: &PresentationStore,
) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    collect_names(root, store, &mut names);
    names
}

fn collect_names(
    node: &YamlNode,
    store: &PresentationStore,
    names: &mut Vec<String>,
) {
    if let Some(incl) = node
        .pres
        .and_then(|id| store.get(id))
        .and_then(|p| p.included.as_deref())
    {
        if incl.raw {
            return;
        }
    }
    match &node.data {
        YamlNodeData::String(s) => {
            for (_, _, name) in find_refs(s) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        YamlNodeData::Sequence(items) => {
            for item in items {
                collect_names(item, store, names);
            }
        }
        YamlNodeData::Map(map) => {
            for (_, entry) in map.iter() {
                collect_names(&entry.value, store, names);
            }
        }
        _ => (),
    }
}

/// Substitute every reference to `name` under `root` with `value`.
/// Whole-value references take the bound data of any kind; in-string
/// references require a scalar, stringified when not a string. Returns
/// how many references were replaced.
pub(crate) fn bind(
    root: &mut YamlNode,
    name: &str,
    value: &YamlNode,
) -> Result<usize, RytError> {
    let mut count = 0usize;
    bind_walk(root, name, value, &mut count)?;
    Ok(count)
}

fn bind_walk(
    node: &mut YamlNode,
    name: &str,
    value: &YamlNode,
    count: &mut usize,
) -> Result<(), RytError> {
    match &mut node.data {
        YamlNodeData::String(s) => {
            if whole_value_name(s) == Some(name) {
                node.data = value.data.clone();
                *count += 1;
                return Ok(());
            }
            let refs: Vec<(usize, usize)> = find_refs(s)
                .into_iter()
                .filter(|(_, _, n)| *n == name)
                .map(|(start, len, _)| (start, len))
                .collect();
            if refs.is_empty() {
                return Ok(());
            }
            let text = match &value.data {
                YamlNodeData::String(v) => v.clone(),
                YamlNodeData::Sequence(_) | YamlNodeData::Map(_) => {
                    return Err(RytError::wrong_type_of_data(
                        format!(
                            "variable `${name}` used inside a string must \
                             be bound to a scalar"
                        ),
                        value.span.start,
                    ));
                }
                other => crate::scalar::scalar_to_string(other),
            };
            let mut replaced = String::with_capacity(s.len());
            let mut idx = 0usize;
            for (start, len) in &refs {
                replaced.push_str(&s[idx..*start]);
                replaced.push_str(&text);
                idx = start + len;
            }
            replaced.push_str(&s[idx..]);
            *count += refs.len();
            node.data = YamlNodeData::String(replaced);
        }
        YamlNodeData::Sequence(items) => {
            for item in items {
                bind_walk(item, name, value, count)?;
            }
        }
        YamlNodeData::Map(map) => {
            for (_, entry) in map.iter_mut() {
                bind_walk(&mut entry.value, name, value, count)?;
            }
        }
        _ => (),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{RytSpan, YamlNode, YamlNodeData};

    fn string_node(s: &str) -> YamlNode {
        YamlNode::new(
            YamlNodeData::String(s.to_string()),
            RytSpan::default(),
        )
    }

    #[test]
    fn test_find_refs() {
        assert_eq!(
            find_refs("$host:$port"),
            vec![(0, 5, "host"), (6, 5, "port")]
        );
        // A digit cannot start a name.
        assert_eq!(find_refs("cost: $5"), Vec::new());
        assert_eq!(find_refs("a$_x-b"), vec![(1, 3, "_x")]);
    }

    #[test]
    fn test_whole_value_name() {
        assert_eq!(whole_value_name("$host"), Some("host"));
        assert_eq!(whole_value_name("$host "), None);
        assert_eq!(whole_value_name("x$host"), None);
    }

    #[test]
    fn test_bind_whole_value_non_string() -> Result<(), RytError> {
        let mut root = string_node("$count");
        let value =
            YamlNode::new(YamlNodeData::Uint(7), RytSpan::default());
        assert_eq!(bind(&mut root, "count", &value)?, 1);
        assert_eq!(root.data, YamlNodeData::Uint(7));
        Ok(())
    }

    #[test]
    fn test_bind_in_string_stringifies() -> Result<(), RytError> {
        let mut root = string_node("$host:$port");
        let host = string_node("website.org");
        let port =
            YamlNode::new(YamlNodeData::Uint(80), RytSpan::default());
        assert_eq!(bind(&mut root, "port", &port)?, 1);
        assert_eq!(
            root.data,
            YamlNodeData::String("$host:80".to_string())
        );
        assert_eq!(bind(&mut root, "host", &host)?, 1);
        assert_eq!(
            root.data,
            YamlNodeData::String("website.org:80".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_bind_in_string_rejects_container() {
        let mut root = string_node("x-$a");
        let value = YamlNode::new(
            YamlNodeData::Sequence(Vec::new()),
            RytSpan::default(),
        );
        let e = bind(&mut root, "a", &value).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::WrongTypeOfData);
    }

    #[test]
    fn test_bind_counts_zero_without_reference() -> Result<(), RytError> {
        let mut root = string_node("$other");
        let value = string_node("v");
        assert_eq!(bind(&mut root, "missing", &value)?, 0);
        Ok(())
    }

    #[test]
    fn test_collect_unbound_order() {
        let mut map = crate::YamlNodeMap::new();
        map.insert(
            "a".to_string(),
            crate::YamlMapEntry {
                key_span: RytSpan::default(),
                key_pres: None,
                value: string_node("$z and $y"),
            },
        );
        map.insert(
            "b".to_string(),
            crate::YamlMapEntry {
                key_span: RytSpan::default(),
                key_pres: None,
                value: string_node("$z"),
            },
        );
        let root = YamlNode::new(
            YamlNodeData::Map(Box::new(map)),
            RytSpan::default(),
        );
        assert_eq!(
            collect_unbound(&root, &PresentationStore::new()),
            vec!["z".to_string(), "y".to_string()]
        );
    }
}
