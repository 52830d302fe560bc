//! DOT output for call graphs and loop nests.
//!
//! Output can be rendered with Graphviz. [`DotWriter`] keeps node and edge
//! emission uniform across the graphs this crate can dump.

use std::fmt::Write;

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// # Examples
///
/// ```rust
/// use optscope::utils::escape_dot;
///
/// assert_eq!(escape_dot("List<T>"), "List\\<T\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

/// Incremental builder for a DOT digraph.
#[derive(Debug)]
pub struct DotWriter {
    out: String,
}

impl DotWriter {
    /// Starts a digraph called `name` labelled with `title`.
    #[must_use]
    pub fn new(name: &str, title: &str) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {name} {{");
        let _ = writeln!(out, "    label=\"{}\";", escape_dot(title));
        out.push_str("    labelloc=t;\n");
        out.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        Self { out }
    }

    /// Emits a node; `fill` selects a fill colour.
    pub fn node(&mut self, id: &str, label: &str, fill: Option<&str>) {
        let style = fill.map_or(String::new(), |c| format!(", style=filled, fillcolor={c}"));
        let _ = writeln!(
            self.out,
            "    \"{}\" [label=\"{}\"{style}];",
            escape_dot(id),
            escape_dot(label)
        );
    }

    /// Emits an edge.
    pub fn edge(&mut self, from: &str, to: &str) {
        let _ = writeln!(
            self.out,
            "    \"{}\" -> \"{}\";",
            escape_dot(from),
            escape_dot(to)
        );
    }

    /// Closes the graph and returns the text.
    #[must_use]
    pub fn finish(mut self) -> String {
        self.out.push_str("}\n");
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_quotes() {
        assert_eq!(escape_dot("say \"hello\""), "say \\\"hello\\\"");
    }

    #[test]
    fn test_escape_dot_newlines() {
        assert_eq!(escape_dot("line1\r\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_writer_emits_nodes_and_edges() {
        let mut w = DotWriter::new("G", "demo");
        w.node("a", "A", Some("lightgreen"));
        w.node("b", "B", None);
        w.edge("a", "b");
        let dot = w.finish();
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains("\"a\" [label=\"A\", style=filled, fillcolor=lightgreen];"));
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.ends_with("}\n"));
    }
}
