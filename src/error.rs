// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::RytPosition;

/// Name of in-memory documents in rendered error messages.
const NO_FILE_NAME: &str = "<input>";

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum ErrorKind {
    #[default]
    Bug,
    /// Mapping key is not a plain word, duplicated, or a `$` key outside
    /// override context.
    InvalidKey,
    /// A string scalar was required, e.g. as the `!include` argument.
    ExpectedString,
    /// End of input where a node was required.
    MissingData,
    /// Node kind differs from what the construct requires.
    WrongTypeOfData,
    /// Content left of the minimum column, or misaligned siblings.
    WrongIndentation,
    /// Malformed flow mapping entry.
    WrongObject,
    /// Tab in leading whitespace.
    TabCharacterDetected,
    /// Malformed tag word or two tags on one node.
    InvalidTag,
    /// Trailing content after the document root.
    ExtraCharactersAfterData,
    /// Bad `!include` argument: escape from the containment directory,
    /// unreadable subfile, or an inclusion loop.
    InvalidInclude,
    /// Override value kind differs from the included data kind.
    OverrideTypeMismatch,
    /// A `$name:` binding with no matching reference.
    UnknownVariable,
    /// `$name` placeholders left after all resolutions.
    UnboundVariables,
    /// Packer input/output failure; the message carries the offending path.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Bug => "bug",
                Self::InvalidKey => "invalid key",
                Self::ExpectedString => "expected string",
                Self::MissingData => "missing data",
                Self::WrongTypeOfData => "wrong type of data",
                Self::WrongIndentation => "wrong indentation",
                Self::WrongObject => "wrong object",
                Self::TabCharacterDetected => "tab character detected",
                Self::InvalidTag => "invalid tag",
                Self::ExtraCharactersAfterData =>
                    "extra characters after data",
                Self::InvalidInclude => "invalid include",
                Self::OverrideTypeMismatch =>
                    "cannot change types of data in override",
                Self::UnknownVariable => "unknown variable",
                Self::UnboundVariables => "unbound variables",
                Self::Io => "input/output error",
            }
        )
    }
}

/// One hop of the inclusion chain: the `!include` site an error crossed
/// while propagating up.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct IncludeFrame {
    pub(crate) file: Option<PathBuf>,
    pub(crate) pos: RytPosition,
    pub(crate) source_line: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct RytError {
    kind: ErrorKind,
    msg: String,
    pos: RytPosition,
    file: Option<PathBuf>,
    source_line: Option<String>,
    /// Innermost include site first; rendered outermost first.
    chain: Vec<IncludeFrame>,
}

impl RytError {
    pub fn new(kind: ErrorKind, msg: String, pos: RytPosition) -> Self {
        Self {
            kind,
            msg,
            pos,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }

    pub fn pos(&self) -> RytPosition {
        self.pos
    }

    /// Fill in file path and source line once the failing parse context is
    /// known. Only the innermost context wins.
    pub(crate) fn with_context(
        mut self,
        file: Option<&Path>,
        source_line: Option<&str>,
    ) -> Self {
        if self.file.is_none() {
            self.file = file.map(Path::to_path_buf);
        }
        if self.source_line.is_none() {
            self.source_line = source_line.map(str::to_string);
        }
        self
    }

    /// Record the include site an error is propagating through.
    pub(crate) fn with_include_frame(mut self, frame: IncludeFrame) -> Self {
        self.chain.push(frame);
        self
    }

    fn render_one(
        f: &mut std::fmt::Formatter<'_>,
        file: Option<&Path>,
        pos: RytPosition,
        msg: &str,
        source_line: Option<&str>,
    ) -> std::fmt::Result {
        let file_name = file
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| NO_FILE_NAME.to_string());
        if pos.is_eof() {
            writeln!(f, "{file_name}: {msg}")?;
        } else {
            writeln!(f, "{}:{}:{}: {}", file_name, pos.line, pos.column, msg)?;
            if let Some(line) = source_line {
                writeln!(f, "{line}")?;
                writeln!(f, "{}^", " ".repeat(pos.column.saturating_sub(1)))?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for RytError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> Result<(), std::fmt::Error> {
        for frame in self.chain.iter().rev() {
            Self::render_one(
                f,
                frame.file.as_deref(),
                frame.pos,
                "error in included file",
                frame.source_line.as_deref(),
            )?;
        }
        let msg = if self.msg.is_empty() {
            self.kind.to_string()
        } else {
            format!("{}: {}", self.kind, self.msg)
        };
        Self::render_one(
            f,
            self.file.as_deref(),
            self.pos,
            &msg,
            self.source_line.as_deref(),
        )
    }
}

impl std::error::Error for RytError {}

impl RytError {
    pub(crate) fn bug(msg: String, pos: RytPosition) -> Self {
        Self::new(ErrorKind::Bug, msg, pos)
    }

    pub(crate) fn invalid_key(msg: String, pos: RytPosition) -> Self {
        Self::new(ErrorKind::InvalidKey, msg, pos)
    }

    pub(crate) fn expected_string(msg: String, pos: RytPosition) -> Self {
        Self::new(ErrorKind::ExpectedString, msg, pos)
    }

    pub(crate) fn missing_data(pos: RytPosition) -> Self {
        Self::new(ErrorKind::MissingData, String::new(), pos)
    }

    pub(crate) fn wrong_type_of_data(msg: String, pos: RytPosition) -> Self {
        Self::new(ErrorKind::WrongTypeOfData, msg, pos)
    }

    pub(crate) fn wrong_indentation(msg: String, pos: RytPosition) -> Self {
        Self::new(ErrorKind::WrongIndentation, msg, pos)
    }

    pub(crate) fn wrong_object(msg: String, pos: RytPosition) -> Self {
        Self::new(ErrorKind::WrongObject, msg, pos)
    }

    pub(crate) fn tab_character(pos: RytPosition) -> Self {
        Self::new(ErrorKind::TabCharacterDetected, String::new(), pos)
    }

    pub(crate) fn invalid_tag(msg: String, pos: RytPosition) -> Self {
        Self::new(ErrorKind::InvalidTag, msg, pos)
    }

    pub(crate) fn extra_characters(pos: RytPosition) -> Self {
        Self::new(ErrorKind::ExtraCharactersAfterData, String::new(), pos)
    }

    pub(crate) fn invalid_include(msg: String, pos: RytPosition) -> Self {
        Self::new(ErrorKind::InvalidInclude, msg, pos)
    }

    pub(crate) fn override_type_mismatch(pos: RytPosition) -> Self {
        Self::new(ErrorKind::OverrideTypeMismatch, String::new(), pos)
    }

    pub(crate) fn unknown_variable(name: &str, pos: RytPosition) -> Self {
        Self::new(ErrorKind::UnknownVariable, format!("${name}"), pos)
    }

    pub(crate) fn unbound_variables(names: &[String]) -> Self {
        Self::new(
            ErrorKind::UnboundVariables,
            names
                .iter()
                .map(|n| format!("${n}"))
                .collect::<Vec<_>>()
                .join(", "),
            RytPosition::EOF,
        )
    }

    pub(crate) fn io(
        action: &str,
        path: &Path,
        e: std::io::Error,
    ) -> Self {
        Self::new(
            ErrorKind::Io,
            format!("failed to {action} {}: {e}", path.display()),
            RytPosition::EOF,
        )
    }
}
