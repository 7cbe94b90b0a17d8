// SPDX-License-Identifier: Apache-2.0

use crate::{
    parser::ParseContext, RytError, RytSpan, YamlNode, YamlNodeData,
};

impl ParseContext<'_> {
    /// Parse a block sequence. Each element is introduced by `-` at the
    /// column of the first dash; elements parse with their minimum column
    /// right of the dash.
    ///
    /// With `stop_at_equal_column` the sequence ends quietly on an
    /// equal-column non-dash line instead of raising; this serves the
    /// dash-at-key-column exception, where the enclosing mapping's next
    /// key sits at the dash column.
    pub(crate) fn parse_block_seq(
        &mut self,
        stop_at_equal_column: bool,
    ) -> Result<YamlNode, RytError> {
        self.trim()?;
        let start = self.iter.next_pos();
        let dash_col = start.column;
        let mut items: Vec<YamlNode> = Vec::new();
        let mut end = start;
        loop {
            // The dash itself, verified by the caller or the loop below.
            self.bump();
            let elem = self.parse_data(dash_col + 1)?;
            end = elem.span.end;
            items.push(elem);
            self.trim()?;
            let c = match self.iter.peek() {
                Some(c) => c,
                None => break,
            };
            let pos = self.iter.next_pos();
            if pos.column < dash_col {
                break;
            }
            if pos.column == dash_col {
                if c == '-'
                    && matches!(
                        self.iter.peek_second(),
                        None | Some(' ') | Some('\n')
                    )
                {
                    continue;
                }
                if stop_at_equal_column {
                    break;
                }
                return Err(RytError::wrong_indentation(
                    "expected another element of sequence".to_string(),
                    pos,
                ));
            }
            return Err(RytError::wrong_indentation(
                "line not aligned".to_string(),
                pos,
            ));
        }
        // Block containers carry no presentation of their own; comments
        // live on the elements, and anything still pending belongs to the
        // next node after this sequence.
        Ok(YamlNode::new(
            YamlNodeData::Sequence(items),
            RytSpan::new(start, end),
        ))
    }
}
