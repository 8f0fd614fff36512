//! AST-based chunk extraction via tree-sitter.

use tree_sitter::{Node, Parser};

use super::complexity::{measure, score};
use super::{Chunk, ChunkKind, Chunker};
use crate::error::{IndexError, Result};
use crate::languages::{Lang, NodeRole};

/// Extracts functions, methods and class-like definitions from a parse tree.
///
/// Classes are descended into so their methods become separate chunks.
/// Function bodies are not, so nested functions stay inside their parent.
#[derive(Debug, Clone)]
pub struct StructuralChunker {
    lang: Lang,
    grammar: tree_sitter::Language,
}

struct Frame<'t> {
    node: Node<'t>,
    parent: Option<String>,
}

impl StructuralChunker {
    /// Returns `None` when `lang` has no grammar compiled in.
    #[must_use]
    pub fn new(lang: Lang) -> Option<Self> {
        lang.grammar().map(|grammar| Self { lang, grammar })
    }

    fn extract(&self, source: &str, root: Node<'_>) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut stack = vec![Frame {
            node: root,
            parent: None,
        }];

        while let Some(Frame { node, parent }) = stack.pop() {
            let Some((role, target)) = self.classify(node) else {
                push_children(&mut stack, node, parent.as_ref());
                continue;
            };

            let name = symbol_name(target, source);
            let kind = match (role, parent.is_some()) {
                (NodeRole::Class, _) => ChunkKind::Class,
                (_, true) => ChunkKind::Method,
                (_, false) => ChunkKind::Function,
            };

            let complexity = score(measure(node, self.lang));
            chunks.push(
                Chunk::new(
                    source[node.byte_range()].to_string(),
                    node.start_position().row,
                    node.end_position().row,
                    kind,
                    self.lang,
                )
                .with_symbol(name.clone())
                .with_parent(parent)
                .with_complexity(complexity),
            );

            if role == NodeRole::Class {
                let scope = name.unwrap_or_else(|| target.kind().to_string());
                push_children(&mut stack, target, Some(&scope));
            }
        }

        chunks
    }

    /// Resolve wrappers to the definition they carry.
    fn classify<'t>(&self, node: Node<'t>) -> Option<(NodeRole, Node<'t>)> {
        match self.lang.node_role(node.kind())? {
            NodeRole::Wrapper => {
                let inner = node
                    .child_by_field_name("definition")
                    .or_else(|| node.child_by_field_name("declaration"))?;
                match self.lang.node_role(inner.kind())? {
                    NodeRole::Wrapper => None,
                    role => Some((role, inner)),
                }
            }
            role => Some((role, node)),
        }
    }
}

impl Chunker for StructuralChunker {
    fn chunk(&self, source: &str) -> Result<Vec<Chunk>> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| IndexError::Parse(format!("{} parse returned no tree", self.lang)))?;
        let root = tree.root_node();

        let mut chunks = self.extract(source, root);
        if chunks.is_empty() {
            let complexity = score(measure(root, self.lang));
            let end = source.lines().count().saturating_sub(1);
            chunks.push(
                Chunk::new(source.to_string(), 0, end, ChunkKind::File, self.lang)
                    .with_complexity(complexity),
            );
        }
        Ok(chunks)
    }
}

/// Push named children in reverse so they pop in source order.
fn push_children<'t>(stack: &mut Vec<Frame<'t>>, node: Node<'t>, parent: Option<&String>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children.into_iter().rev() {
        stack.push(Frame {
            node: child,
            parent: parent.cloned(),
        });
    }
}

fn symbol_name(node: Node<'_>, source: &str) -> Option<String> {
    // impl_item names its type via "type"; Go type_declaration wraps a type_spec.
    node.child_by_field_name("name")
        .or_else(|| node.child_by_field_name("type"))
        .or_else(|| {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .find(|c| c.kind() == "type_spec")
                .and_then(|spec| spec.child_by_field_name("name"))
        })
        .map(|n| source[n.byte_range()].to_string())
}
