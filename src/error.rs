use std::error::Error;
use std::fmt;

use crate::NodeId;

/// Longest fragment of source text kept in a [`ParseError`]
const MAX_FRAGMENT_LEN: usize = 40;

// ============================================================================
// Parse errors
// ============================================================================

/// Kinds of malformed Newick input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    EmptyInput,
    UnclosedParen,
    UnexpectedCloseParen,
    UnexpectedToken,
    InvalidBranchLength,
    EmptyAnnotationKey,
    EmptyAnnotationValue,
    UnterminatedAnnotation,
    TrailingInput,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ParseErrorKind::EmptyInput => "empty Newick string",
            ParseErrorKind::UnclosedParen => "unmatched opening parenthesis",
            ParseErrorKind::UnexpectedCloseParen => "unmatched closing parenthesis",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::InvalidBranchLength => "invalid branch length",
            ParseErrorKind::EmptyAnnotationKey => "empty annotation key",
            ParseErrorKind::EmptyAnnotationValue => "empty annotation value",
            ParseErrorKind::UnterminatedAnnotation => "unterminated annotation block",
            ParseErrorKind::TrailingInput => "unexpected input after end of tree",
        };
        f.write_str(msg)
    }
}

/// Newick parse failure, with the offending fragment and its byte offset.
///
/// Parsing fails as a whole; no partial tree is ever returned alongside an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    kind: ParseErrorKind,
    fragment: String,
    offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, fragment: impl Into<String>, offset: usize) -> Self {
        let mut fragment: String = fragment.into();
        if let Some((cut, _)) = fragment.char_indices().nth(MAX_FRAGMENT_LEN) {
            fragment.truncate(cut);
        }
        Self {
            kind,
            fragment,
            offset,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// Source text at the point of failure
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Byte offset into the parsed string
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)?;
        if !self.fragment.is_empty() {
            write!(f, " near '{}'", self.fragment)?;
        }
        Ok(())
    }
}

impl Error for ParseError {}

/// Non-fatal findings reported alongside a successfully parsed tree
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
    /// An annotation entry that is not a single `key=value` pair was skipped
    MalformedAnnotation { pair: String, offset: usize },
    /// The root has no offspring
    DegenerateRoot,
    /// The root has exactly one offspring
    SingleOffspringRoot,
    /// Label or branch length on the outermost group was discarded
    RootDecorationIgnored { fragment: String },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::MalformedAnnotation { pair, offset } => {
                write!(f, "skipped malformed annotation '{pair}' at offset {offset}")
            }
            ParseWarning::DegenerateRoot => write!(f, "tree root has no offspring"),
            ParseWarning::SingleOffspringRoot => write!(f, "tree root has a single offspring"),
            ParseWarning::RootDecorationIgnored { fragment } => {
                write!(f, "ignored label or branch length '{fragment}' on the root")
            }
        }
    }
}

// ============================================================================
// Structural errors
// ============================================================================

/// Operations that would violate tree invariants. Nothing is modified when
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The tree has no root
    EmptyTree,
    /// The id does not refer to a live node of this tree
    UnknownNode(NodeId),
    /// No nodes are selected
    EmptySelection,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::EmptyTree => write!(f, "tree is empty"),
            TreeError::UnknownNode(id) => write!(f, "node {id} is not part of this tree"),
            TreeError::EmptySelection => write!(f, "no nodes are selected"),
        }
    }
}

impl Error for TreeError {}

// ============================================================================
// Layout errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Positions were invalidated by a structural change and not recomputed
    Stale,
    UnknownNode(NodeId),
    EmptyTree,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Stale => {
                write!(f, "node positions are stale, a layout pass is required")
            }
            LayoutError::UnknownNode(id) => write!(f, "node {id} is not part of this tree"),
            LayoutError::EmptyTree => write!(f, "tree is empty"),
        }
    }
}

impl Error for LayoutError {}

impl From<TreeError> for LayoutError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::UnknownNode(id) => LayoutError::UnknownNode(id),
            TreeError::EmptyTree | TreeError::EmptySelection => LayoutError::EmptyTree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_offset_and_fragment() {
        let err = ParseError::new(ParseErrorKind::InvalidBranchLength, "1.x", 7);
        assert_eq!(err.offset(), 7);
        assert_eq!(err.fragment(), "1.x");
        assert_eq!(err.to_string(), "invalid branch length at offset 7 near '1.x'");
    }

    #[test]
    fn long_fragments_are_truncated() {
        let long = "a".repeat(100);
        let err = ParseError::new(ParseErrorKind::TrailingInput, long, 0);
        assert_eq!(err.fragment().len(), MAX_FRAGMENT_LEN);
    }
}
