use crate::xml::node::{Attrs, Node, NodeContent};
use std::fmt;

/// Renders a [`Node`] as compact XML, attributes sorted for stable output.
pub struct DisplayableNode<'a>(pub &'a Node);

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_attributes(attrs: &Attrs) -> String {
    let mut keys: Vec<_> = attrs.keys().collect();
    keys.sort_unstable();

    let mut result = String::new();
    for key in keys {
        if let Some(value) = attrs.get(key) {
            result.push_str(&format!(" {}=\"{}\"", key, escape(value)));
        }
    }
    result
}

impl fmt::Display for DisplayableNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.0;
        let attrs = format_attributes(&node.attrs);
        match &node.content {
            None => write!(f, "<{}{}/>", node.tag, attrs),
            Some(NodeContent::Nodes(nodes)) if nodes.is_empty() => {
                write!(f, "<{}{}/>", node.tag, attrs)
            }
            Some(NodeContent::Nodes(nodes)) => {
                write!(f, "<{}{}>", node.tag, attrs)?;
                for child in nodes {
                    write!(f, "{}", DisplayableNode(child))?;
                }
                write!(f, "</{}>", node.tag)
            }
            Some(NodeContent::Text(text)) => {
                write!(f, "<{}{}>{}</{}>", node.tag, attrs, escape(text), node.tag)
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        DisplayableNode(self).fmt(f)
    }
}
