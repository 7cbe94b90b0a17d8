// SPDX-License-Identifier: Apache-2.0

use crate::{
    parser::ParseContext, RytError, RytSpan, YamlMapEntry, YamlNode,
    YamlNodeData, YamlNodeMap,
};

impl ParseContext<'_> {
    /// Parse a block mapping. Keys are plain words followed by `:`; an
    /// optional leading `$` marks a variable binding and is only accepted
    /// in override context (`allow_var_keys`).
    pub(crate) fn parse_block_map(
        &mut self,
        min_indent: usize,
        allow_var_keys: bool,
    ) -> Result<YamlNode, RytError> {
        self.trim()?;
        let start = self.iter.next_pos();
        let map_col = start.column;
        if map_col < min_indent {
            return Err(RytError::wrong_indentation(
                format!("expecting minimum column {min_indent}"),
                start,
            ));
        }
        let mut map = YamlNodeMap::new();
        let mut end = start;
        loop {
            self.trim()?;
            if self.iter.peek().is_none() {
                break;
            }
            let pos = self.iter.next_pos();
            if pos.column < map_col {
                break;
            }
            if pos.column > map_col {
                return Err(RytError::wrong_indentation(
                    format!("expecting key at column {map_col}"),
                    pos,
                ));
            }
            let key_start = self.iter.next_pos();
            let (key, is_var) = self.read_map_key()?;
            if is_var && !allow_var_keys {
                return Err(RytError::invalid_key(
                    format!(
                        "variable binding `{key}:` is only allowed in an \
                         override"
                    ),
                    key_start,
                ));
            }
            if map.contains_key(&key) {
                return Err(RytError::invalid_key(
                    format!("duplicate key `{key}`"),
                    key_start,
                ));
            }
            let key_end = self.iter.pos();
            let key_pres = if self.opts.generate_presentation {
                let id = self.store.alloc(self.cursor.take_pending());
                self.cursor.set_last(Some(id));
                Some(id)
            } else {
                None
            };
            let value = self.parse_map_value(key_start, key_end, map_col)?;
            end = value.span.end;
            map.insert(
                key,
                YamlMapEntry {
                    key_span: RytSpan::new(key_start, key_end),
                    key_pres,
                    value,
                },
            );
        }
        Ok(YamlNode::new(
            YamlNodeData::Map(Box::new(map)),
            RytSpan::new(start, end),
        ))
    }

    /// Parse the value after `key:`. The value may sit on the key line, on
    /// deeper following lines, or be missing entirely (null). A sequence
    /// dash may sit at the key column.
    fn parse_map_value(
        &mut self,
        key_start: crate::RytPosition,
        key_end: crate::RytPosition,
        map_col: usize,
    ) -> Result<YamlNode, RytError> {
        self.trim()?;
        if self.iter.peek().is_none() {
            return Ok(null_value(key_end));
        }
        let pos = self.iter.next_pos();
        if pos.line == key_start.line {
            return self.parse_data(key_start.column + 1);
        }
        if pos.column == map_col
            && self.iter.peek() == Some('-')
            && matches!(
                self.iter.peek_second(),
                None | Some(' ') | Some('\n')
            )
        {
            return self.parse_block_seq(true);
        }
        if pos.column <= map_col {
            return Ok(null_value(key_end));
        }
        self.parse_data(map_col + 1)
    }
}

fn null_value(at: crate::RytPosition) -> YamlNode {
    YamlNode::new(YamlNodeData::Null, RytSpan::new(at, at))
}
