use crate::xml::attrs::AttrParser;
use std::collections::HashMap;

pub type Attrs = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Text(String),
    Nodes(Vec<Node>),
}

/// One XML element of a stanza. Namespaces are kept as plain `xmlns`
/// attributes, which is all the signaling layer needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub tag: String,
    pub attrs: Attrs,
    pub content: Option<NodeContent>,
}

impl Node {
    pub fn new(tag: &str, attrs: Attrs, content: Option<NodeContent>) -> Self {
        Self {
            tag: tag.to_string(),
            attrs,
            content,
        }
    }

    pub fn children(&self) -> Option<&[Node]> {
        match &self.content {
            Some(NodeContent::Nodes(nodes)) => Some(nodes),
            _ => None,
        }
    }

    pub fn attrs(&self) -> AttrParser<'_> {
        AttrParser::new(self)
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Text content of this element, if it holds text rather than children.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(NodeContent::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_optional_child_by_tag<'a>(&'a self, tags: &[&str]) -> Option<&'a Node> {
        let mut current_node = self;
        for &tag in tags {
            current_node = current_node.get_optional_child(tag)?;
        }
        Some(current_node)
    }

    /// Returns the direct children that have the specified tag.
    pub fn get_children_by_tag(&self, tag: &str) -> Vec<&Node> {
        if let Some(children) = self.children() {
            children.iter().filter(|c| c.tag == tag).collect()
        } else {
            Vec::new()
        }
    }

    /// Finds the first direct child with the given tag and returns it.
    pub fn get_optional_child(&self, tag: &str) -> Option<&Node> {
        self.children()
            .and_then(|nodes| nodes.iter().find(|node| node.tag == tag))
    }
}
