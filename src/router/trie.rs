//! The path-segment trie behind [`Router`](super::Router).
//!
//! Node names are single path segments stored with their trailing `/`;
//! capture segments keep their `:` marker (`":user-id/"`). Children are kept
//! in registration order and a node may have at most one capturing child —
//! the matcher walks with no lookahead, so two capture edges out of the same
//! node could never be told apart.

use std::fmt::Write as _;

use super::{BuildError, Handler};
use crate::context::Captures;

pub(super) struct Node {
    name: String,
    handler: Option<Handler>,
    children: Vec<Node>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("handler", &self.handler.is_some())
            .field("children", &self.children)
            .finish()
    }
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            handler: None,
            children: Vec::new(),
        }
    }

    /// The handler assigned to this node, if it is terminal.
    pub(super) fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    // ":user-id/" -> Some("user-id"), literals -> None.
    fn capture_name(&self) -> Option<&str> {
        let stripped = self.name.strip_prefix(':')?;
        Some(&stripped[..stripped.len() - 1])
    }

    // Find-or-create the child for `segment`, rejecting a second capturing
    // sibling. `pattern` is only for the error report.
    fn child_index(&mut self, pattern: &str, segment: &str) -> Result<usize, BuildError> {
        for (i, child) in self.children.iter().enumerate() {
            if child.name == segment {
                return Ok(i);
            }
            if child.name.starts_with(':') && segment.starts_with(':') {
                return Err(BuildError::AmbiguousCapture {
                    pattern: pattern.to_owned(),
                    existing: child.name.clone(),
                });
            }
        }

        self.children.push(Node::new(segment.to_owned()));
        Ok(self.children.len() - 1)
    }
}

/// Builds the trie from normalized `(pattern, handler)` pairs, in
/// registration order. The empty pattern assigns the root handler.
pub(super) fn build(
    prefix: &str,
    routes: Vec<(String, Handler)>,
) -> Result<Node, BuildError> {
    let mut root = Node::new(prefix.to_owned());

    for (pattern, handler) in routes {
        if pattern.is_empty() {
            root.handler = Some(handler);
            continue;
        }

        let mut node = &mut root;
        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            let segment = format!("{segment}/");
            let index = node.child_index(&pattern, &segment)?;
            node = &mut node.children[index];
        }

        // Distinct raw patterns can still collapse to one segment sequence
        // (e.g. doubled separators); that is a duplicate registration too.
        if node.handler.is_some() {
            return Err(BuildError::DuplicatePattern { pattern });
        }
        node.handler = Some(handler);
    }

    Ok(root)
}

/// Walks the trie for `path` (the request path with the router prefix already
/// stripped, guaranteed non-empty). Returns the matched handler and captures.
pub(super) fn walk<'t>(root: &'t Node, path: &str) -> Option<(&'t Handler, Captures)> {
    let mut captures = Captures::new();
    let mut siblings = root.children.as_slice();
    let mut rest = path;

    loop {
        let mut descended = false;

        for node in siblings {
            if let Some(name) = node.capture_name() {
                // A capture consumes up to the next separator; without one
                // the segment is unterminated and this edge cannot match.
                let Some(slash) = rest.find('/') else {
                    continue;
                };
                captures.insert(name.to_owned(), rest[..slash].to_owned());

                let sub = &rest[slash + 1..];
                if sub.is_empty() {
                    match &node.handler {
                        Some(handler) => return Some((handler, captures)),
                        None => continue,
                    }
                }

                rest = sub;
                siblings = node.children.as_slice();
                descended = true;
                break;
            }

            if rest == node.name {
                match &node.handler {
                    Some(handler) => return Some((handler, captures)),
                    None => continue,
                }
            }

            if let Some(sub) = rest.strip_prefix(node.name.as_str()) {
                rest = sub;
                siblings = node.children.as_slice();
                descended = true;
                break;
            }
        }

        if !descended {
            return None;
        }
    }
}

/// Renders the trie one node per line, children indented, terminal nodes
/// marked with `(h)`. A debugging aid, not a stable format.
pub(super) fn render(root: &Node) -> String {
    let mut out = String::new();
    render_node(root, 0, &mut out);
    out
}

fn render_node(node: &Node, depth: usize, out: &mut String) {
    let marker = if node.handler.is_some() { " (h)" } else { "" };
    let _ = writeln!(out, "{:indent$}{}{marker}", "", node.name, indent = depth * 2);
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}
