// SPDX-License-Identifier: Apache-2.0

use crate::{
    parser::ParseContext, Presentation, RytError, RytSpan, YamlMapEntry,
    YamlNode, YamlNodeData, YamlNodeMap,
};

impl ParseContext<'_> {
    /// Parse `[ … ]`. Elements are scalars, nested flow containers, or
    /// implicit single-entry mappings `key: value`.
    pub(crate) fn parse_flow_seq(&mut self) -> Result<YamlNode, RytError> {
        let start = self.iter.next_pos();
        let pending = self.cursor.take_pending();
        self.bump();
        let mut items: Vec<YamlNode> = Vec::new();
        loop {
            self.trim_flow()?;
            match self.iter.peek() {
                None => {
                    return Err(RytError::missing_data(self.iter.next_pos()));
                }
                Some(']') => {
                    self.bump();
                    break;
                }
                _ => (),
            }
            items.push(self.parse_flow_seq_element()?);
            self.trim_flow()?;
            match self.iter.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    return Err(RytError::extra_characters(
                        self.iter.next_pos(),
                    ));
                }
                None => {
                    return Err(RytError::missing_data(self.iter.next_pos()));
                }
            }
        }
        let end = self.iter.pos();
        let mut node = YamlNode::new(
            YamlNodeData::Sequence(items),
            RytSpan::new(start, end),
        );
        self.finish_container(
            &mut node,
            Presentation {
                flow_mode: true,
                ..pending
            },
        );
        Ok(node)
    }

    /// Parse `{ k: v, … }`. Only key-value entries are accepted.
    pub(crate) fn parse_flow_map(&mut self) -> Result<YamlNode, RytError> {
        let start = self.iter.next_pos();
        let pending = self.cursor.take_pending();
        self.bump();
        let mut map = YamlNodeMap::new();
        loop {
            self.trim_flow()?;
            match self.iter.peek() {
                None => {
                    return Err(RytError::missing_data(self.iter.next_pos()));
                }
                Some('}') => {
                    self.bump();
                    break;
                }
                Some('$') => {
                    return Err(RytError::invalid_key(
                        "variable binding is only allowed in an override"
                            .to_string(),
                        self.iter.next_pos(),
                    ));
                }
                _ => (),
            }
            let key_start = self.iter.next_pos();
            let key_node = self.parse_scalar_node(true)?;
            let key = match flow_key_word(&key_node) {
                Some(key) => key,
                None => {
                    return Err(RytError::wrong_object(
                        "only key-value mappings are allowed inside an \
                         object"
                            .to_string(),
                        key_start,
                    ));
                }
            };
            if self.iter.peek() != Some(':') {
                return Err(RytError::wrong_object(
                    "only key-value mappings are allowed inside an object"
                        .to_string(),
                    key_start,
                ));
            }
            self.bump();
            if map.contains_key(&key) {
                return Err(RytError::invalid_key(
                    format!("duplicate key `{key}`"),
                    key_start,
                ));
            }
            let key_end = self.iter.pos();
            let value = self.parse_flow_value()?;
            self.trim_flow()?;
            match self.iter.peek() {
                Some(':') => {
                    return Err(RytError::wrong_object(
                        "unexpected colon".to_string(),
                        self.iter.next_pos(),
                    ));
                }
                Some(',') => {
                    self.bump();
                }
                Some('}') => (),
                Some(_) => {
                    return Err(RytError::extra_characters(
                        self.iter.next_pos(),
                    ));
                }
                None => {
                    return Err(RytError::missing_data(self.iter.next_pos()));
                }
            }
            map.insert(
                key,
                YamlMapEntry {
                    key_span: RytSpan::new(key_start, key_end),
                    key_pres: None,
                    value,
                },
            );
        }
        let end = self.iter.pos();
        let mut node = YamlNode::new(
            YamlNodeData::Map(Box::new(map)),
            RytSpan::new(start, end),
        );
        self.finish_container(
            &mut node,
            Presentation {
                flow_mode: true,
                ..pending
            },
        );
        Ok(node)
    }

    /// One value inside a flow container: a scalar or a nested container.
    fn parse_flow_value(&mut self) -> Result<YamlNode, RytError> {
        self.trim_flow()?;
        match self.iter.peek() {
            Some('[') => self.parse_flow_seq(),
            Some('{') => self.parse_flow_map(),
            Some('!') => Err(RytError::invalid_tag(
                "tag is not allowed in flow context".to_string(),
                self.iter.next_pos(),
            )),
            Some(_) => self.parse_scalar_node(true),
            None => Err(RytError::missing_data(self.iter.next_pos())),
        }
    }

    /// One element of a flow sequence, surfacing `key: value` as an
    /// inline one-key mapping.
    fn parse_flow_seq_element(&mut self) -> Result<YamlNode, RytError> {
        self.trim_flow()?;
        match self.iter.peek() {
            Some('[') => return self.parse_flow_seq(),
            Some('{') => return self.parse_flow_map(),
            Some('!') => {
                return Err(RytError::invalid_tag(
                    "tag is not allowed in flow context".to_string(),
                    self.iter.next_pos(),
                ));
            }
            _ => (),
        }
        let key_start = self.iter.next_pos();
        let scalar = self.parse_scalar_node(true)?;
        if self.iter.peek() != Some(':') {
            return Ok(scalar);
        }
        // Implicit single-entry mapping.
        let key = match flow_key_word(&scalar) {
            Some(key) => key,
            None => {
                return Err(RytError::invalid_key(
                    "flow mapping key must be a plain word".to_string(),
                    key_start,
                ));
            }
        };
        self.bump();
        let key_end = self.iter.pos();
        let value = self.parse_flow_value()?;
        self.trim_flow()?;
        if self.iter.peek() == Some(':') {
            return Err(RytError::wrong_object(
                "unexpected colon".to_string(),
                self.iter.next_pos(),
            ));
        }
        let span = RytSpan::new(key_start, value.span.end);
        let mut map = YamlNodeMap::new();
        map.insert(
            key,
            YamlMapEntry {
                key_span: RytSpan::new(key_start, key_end),
                key_pres: None,
                value,
            },
        );
        let mut node =
            YamlNode::new(YamlNodeData::Map(Box::new(map)), span);
        self.finish_container(
            &mut node,
            Presentation {
                flow_mode: true,
                ..Default::default()
            },
        );
        Ok(node)
    }
}

/// A flow mapping key must be an unquoted plain word.
fn flow_key_word(node: &YamlNode) -> Option<String> {
    let raw = match &node.data {
        YamlNodeData::String(s) => s.clone(),
        YamlNodeData::Uint(v) => v.to_string(),
        YamlNodeData::Bool(v) => v.to_string(),
        _ => return None,
    };
    if !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Some(raw)
    } else {
        None
    }
}
