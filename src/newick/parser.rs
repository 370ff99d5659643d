use std::collections::BTreeMap;

use tracing::{debug, debug_span, trace};

use super::lexer::{tokenize, Spanned, Token};
use crate::{
    error::{ParseError, ParseErrorKind, ParseWarning},
    node::Node,
    BranchLength, NodeId, Tree,
};

/// Result of a successful parse
#[derive(Debug, Clone)]
pub struct Parsed {
    pub tree: Tree,
    /// Non-fatal findings, in input order
    pub warnings: Vec<ParseWarning>,
}

/// Parse a Newick string into a [`Tree`].
///
/// The whole input must describe exactly one tree; a trailing `;` is optional.
/// Annotation blocks (`[&key=value,...]`) may follow the label or the branch
/// length, several blocks on one node are merged. Plain `[...]` comments are
/// ignored.
pub fn parse(text: &str) -> Result<Parsed, ParseError> {
    let _span = debug_span!("parse_newick", len = text.len()).entered();

    let tokens = tokenize(text)?;
    if matches!(
        tokens.first().map(|s| &s.token),
        None | Some(Token::Semicolon)
    ) {
        return Err(ParseError::new(ParseErrorKind::EmptyInput, text.trim(), 0));
    }

    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
        tree: Tree::new(),
        warnings: Vec::new(),
    };

    let root = parser.subtree(None)?;
    parser.finish()?;
    parser.check_root(root);

    let Parser {
        mut tree, warnings, ..
    } = parser;
    tree.set_root_id(root);
    tree.set_original_newick(text);

    debug!(
        tips = tree.num_leaves(),
        warnings = warnings.len(),
        "Parsed newick tree"
    );
    Ok(Parsed { tree, warnings })
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Spanned<'a>>,
    pos: usize,
    tree: Tree,
    warnings: Vec<ParseWarning>,
}

/// Label and length text as it appeared in the input, used for diagnostics
#[derive(Debug, Default)]
struct Decoration {
    label: Option<String>,
    length: Option<String>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Spanned<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Offset of the current token, or the end of input
    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.text.len())
    }

    fn error_at(&self, kind: ParseErrorKind, offset: usize) -> ParseError {
        let fragment = self.text.get(offset..).unwrap_or("");
        ParseError::new(kind, fragment, offset)
    }

    /// `subtree := '(' subtree (',' subtree)* ')' decoration | decoration`
    fn subtree(&mut self, parent: Option<NodeId>) -> Result<NodeId, ParseError> {
        let id = self.tree.alloc(Node::default());
        if let Some(parent) = parent {
            self.tree.attach(parent, id);
        }

        if matches!(self.peek(), Some(Token::Open)) {
            let open = self.offset();
            self.pos += 1;
            loop {
                self.subtree(Some(id))?;
                match self.next() {
                    Some(Spanned {
                        token: Token::Comma,
                        ..
                    }) => continue,
                    Some(Spanned {
                        token: Token::Close,
                        ..
                    }) => break,
                    Some(Spanned { offset, .. }) => {
                        return Err(self.error_at(ParseErrorKind::UnexpectedToken, offset))
                    }
                    None => return Err(self.error_at(ParseErrorKind::UnclosedParen, open)),
                }
            }
        }

        let decoration = self.decoration(id)?;
        trace!(%id, label = ?decoration.label, length = ?decoration.length, "node");
        Ok(id)
    }

    /// `decoration := [label] annotation* [':' length annotation*]`
    fn decoration(&mut self, id: NodeId) -> Result<Decoration, ParseError> {
        let mut decoration = Decoration::default();

        if let Some(Token::Text(label)) = self.peek() {
            let label = label.to_string();
            self.tree[id].label = Some(label.clone());
            decoration.label = Some(label);
            self.pos += 1;
        }
        self.annotations(id)?;

        if matches!(self.peek(), Some(Token::Colon)) {
            let colon = self.offset();
            self.pos += 1;
            let Some(Spanned {
                token: Token::Text(text),
                offset,
            }) = self.next()
            else {
                return Err(self.error_at(ParseErrorKind::InvalidBranchLength, colon));
            };
            let length = parse_length(&text)
                .ok_or_else(|| self.error_at(ParseErrorKind::InvalidBranchLength, offset))?;
            self.tree[id].dist_to_parent = Some(length);
            decoration.length = Some(text.into_owned());
            self.annotations(id)?;
        }

        Ok(decoration)
    }

    fn annotations(&mut self, id: NodeId) -> Result<(), ParseError> {
        while let Some(Token::Annotation(body)) = self.peek() {
            let body = *body;
            let offset = self.offset();
            self.pos += 1;
            let pairs = self.annotation_block(body, offset)?;
            self.tree[id].annotations.extend(pairs);
        }
        Ok(())
    }

    /// Parse `key=value,...` from the body of one `[&...]` block starting at `offset`
    fn annotation_block(
        &mut self,
        body: &str,
        offset: usize,
    ) -> Result<BTreeMap<String, String>, ParseError> {
        // Body starts after "[&"
        let body_offset = offset + 2;
        let mut pairs = BTreeMap::new();

        for (start, pair) in split_top_level(body) {
            let pair_offset = body_offset + start;
            if pair.trim().is_empty() {
                continue;
            }
            let Some((key, value)) = split_pair(pair) else {
                self.warnings.push(ParseWarning::MalformedAnnotation {
                    pair: pair.trim().to_string(),
                    offset: pair_offset,
                });
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                return Err(self.error_at(ParseErrorKind::EmptyAnnotationKey, pair_offset));
            }
            if value.is_empty() {
                return Err(self.error_at(ParseErrorKind::EmptyAnnotationValue, pair_offset));
            }
            pairs.insert(unquote(key), unquote(value));
        }

        Ok(pairs)
    }

    /// After the root subtree only an optional `;` may follow
    fn finish(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek(), Some(Token::Semicolon)) {
            self.pos += 1;
        }
        match self.next() {
            None => Ok(()),
            Some(Spanned {
                token: Token::Close,
                offset,
            }) => Err(self.error_at(ParseErrorKind::UnexpectedCloseParen, offset)),
            Some(Spanned { offset, .. }) => {
                Err(self.error_at(ParseErrorKind::TrailingInput, offset))
            }
        }
    }

    /// The root carries no label or branch length of its own, except when the
    /// whole input is a single tip.
    fn check_root(&mut self, root: NodeId) {
        let node = &mut self.tree[root];
        match node.num_offspring() {
            0 => {
                self.warnings.push(ParseWarning::DegenerateRoot);
                if let Some(length) = node.dist_to_parent.take() {
                    self.warnings.push(ParseWarning::RootDecorationIgnored {
                        fragment: format!(":{length}"),
                    });
                }
            }
            n => {
                let label = node.label.take();
                let length = node.dist_to_parent.take();
                if label.is_some() || length.is_some() {
                    let mut fragment = label.unwrap_or_default();
                    if let Some(length) = length {
                        fragment.push_str(&format!(":{length}"));
                    }
                    self.warnings
                        .push(ParseWarning::RootDecorationIgnored { fragment });
                }
                if n == 1 {
                    self.warnings.push(ParseWarning::SingleOffspringRoot);
                }
            }
        }
    }
}

fn parse_length(text: &str) -> Option<BranchLength> {
    text.parse::<f64>().ok().filter(|d| d.is_finite())
}

/// Split `key=value` at its only `=` outside double quotes
fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let mut quoted = false;
    let mut split = None;
    for (i, c) in pair.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '=' if !quoted => {
                if split.is_some() {
                    return None;
                }
                split = Some(i);
            }
            _ => {}
        }
    }
    split.map(|i| (&pair[..i], &pair[i + 1..]))
}

/// Strip surrounding double quotes, where a doubled quote stands for one quote
fn unquote(text: &str) -> String {
    match text
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => text.to_string(),
    }
}

/// Split on commas that are not nested inside brackets, braces, parentheses or quotes.
/// Yields each piece with its byte offset into `body`.
fn split_top_level(body: &str) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '{' | '[') => depth += 1,
            (None, ')' | '}' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                pieces.push((start, &body[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push((start, &body[start..]));
    pieces
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::test::find;

    #[traced_test]
    #[test]
    fn parses_nested_tree_with_lengths() {
        let Parsed { tree, warnings } = parse("(A:1,B:2,(C:3,D:4):5);").unwrap();
        assert!(warnings.is_empty());

        let root = tree.root().unwrap();
        assert_eq!(tree[root].num_offspring(), 3);
        assert_eq!(tree[root].dist_to_parent(), None);
        let labels: Vec<&str> = tree.all_tips().iter().map(|t| tree[*t].label()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D"]);
        assert_eq!(tree.original_newick(), Some("(A:1,B:2,(C:3,D:4):5);"));
    }

    #[test]
    fn trailing_semicolon_is_optional() {
        let tree = parse("(A,B)").unwrap().tree;
        assert_eq!(tree.num_leaves(), 2);
    }

    #[test]
    fn internal_labels_and_missing_lengths() {
        let tree = parse("((A,B)95:0.1,C)").unwrap().tree;
        let a = find(&tree, "A").unwrap();
        let internal = tree[a].parent().unwrap();
        assert_eq!(tree[internal].label(), "95");
        assert_eq!(tree[internal].dist_to_parent(), Some(0.1));
        assert_eq!(tree[a].dist_to_parent(), None);
    }

    #[traced_test]
    #[test]
    fn annotations_before_colon_and_after_length_merge() {
        let tree = parse("(A[&rate=0.5]:1[&tip=alpha],B:2);").unwrap().tree;
        let a = find(&tree, "A").unwrap();
        assert_eq!(tree[a].annotation("rate"), Some("0.5"));
        assert_eq!(tree[a].annotation("tip"), Some("alpha"));
        assert_eq!(tree[a].dist_to_parent(), Some(1.0));
    }

    #[test]
    fn annotation_values_may_hold_commas_and_parens() {
        let tree = parse("((A:1,B:1)[&height_95%_HPD={0.5,1.5},note=(x,y)]:2,C:3);")
            .unwrap()
            .tree;
        let a = find(&tree, "A").unwrap();
        let internal = tree[a].parent().unwrap();
        assert_eq!(tree[internal].annotation("height_95%_HPD"), Some("{0.5,1.5}"));
        assert_eq!(tree[internal].annotation("note"), Some("(x,y)"));
        assert_eq!(tree.num_leaves(), 3);
    }

    #[traced_test]
    #[test]
    fn malformed_pairs_are_skipped_with_warning() {
        let Parsed { tree, warnings } = parse("(A[&ok=1,broken,a=b=c]:1,B:1);").unwrap();
        let a = find(&tree, "A").unwrap();
        assert_eq!(tree[a].annotation("ok"), Some("1"));
        assert_eq!(tree[a].annotations().len(), 1);
        assert_eq!(
            warnings,
            vec![
                ParseWarning::MalformedAnnotation {
                    pair: "broken".to_string(),
                    offset: 9,
                },
                ParseWarning::MalformedAnnotation {
                    pair: "a=b=c".to_string(),
                    offset: 16,
                },
            ]
        );
    }

    #[test]
    fn empty_annotation_key_or_value_fails() {
        let err = parse("(A[&=1]:1,B);").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::EmptyAnnotationKey);
        let err = parse("(A[&k=]:1,B);").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::EmptyAnnotationValue);
    }

    #[test]
    fn malformed_structure_is_rejected() {
        let cases = [
            ("", ParseErrorKind::EmptyInput),
            ("  ;", ParseErrorKind::EmptyInput),
            ("(A,B", ParseErrorKind::UnclosedParen),
            ("(A,B));", ParseErrorKind::UnexpectedCloseParen),
            ("(A:x,B);", ParseErrorKind::InvalidBranchLength),
            ("(A:,B);", ParseErrorKind::InvalidBranchLength),
            ("(A:inf,B);", ParseErrorKind::InvalidBranchLength),
            ("(A,B(C,D));", ParseErrorKind::UnexpectedToken),
            ("(A,B);(C,D);", ParseErrorKind::TrailingInput),
        ];
        for (text, kind) in cases {
            let err = parse(text).unwrap_err();
            assert_eq!(err.kind(), kind, "input {text:?}");
        }
    }

    #[test]
    fn error_reports_offset_and_fragment() {
        let err = parse("(A:1,B:oops);").unwrap_err();
        assert_eq!(err.offset(), 7);
        assert_eq!(err.fragment(), "oops);");
    }

    #[traced_test]
    #[test]
    fn unquoted_labels_may_contain_spaces() {
        let tree = parse("(Homo sapiens:1,Pan troglodytes :2);").unwrap().tree;
        let labels: Vec<&str> = tree.all_tips().iter().map(|t| tree[*t].label()).collect();
        assert_eq!(labels, vec!["Homo sapiens", "Pan troglodytes"]);
        let pan = find(&tree, "Pan troglodytes").unwrap();
        assert_eq!(tree[pan].dist_to_parent(), Some(2.0));
    }

    #[test]
    fn unquoted_labels_may_contain_apostrophes() {
        let tree = parse("(it's:1,B:2);").unwrap().tree;
        let tip = find(&tree, "it's").unwrap();
        assert_eq!(tree[tip].dist_to_parent(), Some(1.0));
        assert_eq!(tree.num_leaves(), 2);
    }

    #[test]
    fn quoted_annotation_values_are_unquoted() {
        let tree = parse(r#"(A[&note="a,b]=c",k=v]:1,B:1);"#).unwrap().tree;
        let a = find(&tree, "A").unwrap();
        assert_eq!(tree[a].annotation("note"), Some("a,b]=c"));
        assert_eq!(tree[a].annotation("k"), Some("v"));
    }

    #[test]
    fn bare_leaf_is_a_degenerate_root() {
        let Parsed { tree, warnings } = parse("A;").unwrap();
        let root = tree.root().unwrap();
        assert!(tree[root].is_tip());
        assert_eq!(tree[root].label(), "A");
        assert_eq!(warnings, vec![ParseWarning::DegenerateRoot]);
    }

    #[test]
    fn single_offspring_root_warns() {
        let Parsed { tree, warnings } = parse("((A,B));").unwrap();
        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(warnings, vec![ParseWarning::SingleOffspringRoot]);
    }

    #[test]
    fn root_decoration_is_discarded() {
        let Parsed { tree, warnings } = parse("(A:1,B:2)root:3[&k=v];").unwrap();
        let root = tree.root().unwrap();
        assert!(!tree[root].has_label());
        assert_eq!(tree[root].dist_to_parent(), None);
        assert_eq!(tree[root].annotation("k"), Some("v"));
        assert_eq!(
            warnings,
            vec![ParseWarning::RootDecorationIgnored {
                fragment: "root:3".to_string()
            }]
        );
    }

    #[test]
    fn split_respects_nesting() {
        assert_eq!(
            split_top_level("a=1,b={2,3},c='x,y'"),
            vec![(0, "a=1"), (4, "b={2,3}"), (12, "c='x,y'")]
        );
    }
}
