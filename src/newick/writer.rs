use std::fmt::Write;

use tracing::warn;

use crate::{NodeId, Tree};

/// Output flavour for [`to_newick`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NewickStyle {
    /// Labels and branch lengths only
    #[default]
    Plain,
    /// Also write `[&key=value,...]` annotation blocks after labels
    Annotated,
}

/// Serialize `tree` to a Newick string terminated by `;`.
///
/// Unknown branch lengths are omitted and the root's length is never written.
/// Labels containing Newick punctuation or whitespace are single-quoted, and
/// annotation text that would break the block is double-quoted. An empty tree
/// serializes to an empty string.
pub fn to_newick(tree: &Tree, style: NewickStyle) -> String {
    let Some(root) = tree.root() else {
        return String::new();
    };

    // Rough per-node estimate: label, colon, length, separator
    let mut out = String::with_capacity(tree.total_nodes() * 8);
    let mut single_offspring = 0;
    write_subtree(tree, root, style, &mut out, &mut single_offspring);
    out.push(';');

    if single_offspring > 0 {
        warn!(single_offspring, "Writing tree with single-offspring internal nodes");
    }
    out
}

fn write_subtree(
    tree: &Tree,
    id: NodeId,
    style: NewickStyle,
    out: &mut String,
    single_offspring: &mut usize,
) {
    let node = &tree[id];

    if !node.is_tip() {
        if node.num_offspring() == 1 {
            *single_offspring += 1;
        }
        out.push('(');
        for (i, child) in node.offspring().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_subtree(tree, *child, style, out, single_offspring);
        }
        out.push(')');
    }

    if node.has_label() {
        write_label(node.label(), out);
    }

    if style == NewickStyle::Annotated && node.has_annotations() {
        out.push_str("[&");
        for (i, (key, value)) in node.annotations().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_annotation_text(key, out);
            out.push('=');
            write_annotation_text(value, out);
        }
        out.push(']');
    }

    if !node.is_root() {
        if let Some(length) = node.dist_to_parent() {
            let _ = write!(out, ":{length}");
        }
    }
}

fn write_label(label: &str, out: &mut String) {
    let needs_quotes = label.is_empty()
        || label
            .chars()
            .any(|c| matches!(c, '(' | ')' | ',' | ':' | ';' | '[' | ']' | '\'') || c.is_whitespace());

    if needs_quotes {
        out.push('\'');
        out.push_str(&label.replace('\'', "''"));
        out.push('\'');
    } else {
        out.push_str(label);
    }
}

/// Annotation keys and values are double-quoted when they would otherwise end
/// the pair or the block early
fn write_annotation_text(text: &str, out: &mut String) {
    let needs_quotes = text.is_empty()
        || text.trim() != text
        || text
            .chars()
            .any(|c| matches!(c, ',' | '=' | '[' | ']' | '"' | '\''));

    if needs_quotes {
        out.push('"');
        out.push_str(&text.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(text);
    }
}
