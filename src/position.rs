// SPDX-License-Identifier: Apache-2.0

/// Line and column of a character in a document. Both are 1-based; the
/// special [RytPosition::EOF] marks "no position" (end of input).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct RytPosition {
    pub line: usize,
    pub column: usize,
}

impl Default for RytPosition {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl RytPosition {
    pub const EOF: Self = Self { line: 0, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn is_eof(&self) -> bool {
        self == &Self::EOF
    }

    pub(crate) fn next_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }

    pub(crate) fn next_column(&mut self) {
        self.column += 1;
    }
}

impl std::fmt::Display for RytPosition {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> Result<(), std::fmt::Error> {
        if self.is_eof() {
            write!(f, "end of file")
        } else {
            write!(f, "line {} column {}", self.line, self.column)
        }
    }
}

/// Start and end position of an AST or presentation element.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct RytSpan {
    pub start: RytPosition,
    pub end: RytPosition,
}

impl RytSpan {
    pub fn new(start: RytPosition, end: RytPosition) -> Self {
        Self { start, end }
    }
}
