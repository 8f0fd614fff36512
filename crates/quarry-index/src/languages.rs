//! Language detection, tree-sitter grammar registry and chunkable node tables.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Language of an indexed file. Only some variants carry a grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    Bash,
    Toml,
    Json,
    Yaml,
    Markdown,
    Text,
}

/// How the structural chunker treats a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeRole {
    /// Function or method definition. Never descended into.
    Function,
    /// Class-like container. Emitted and descended into for methods.
    Class,
    /// Decorator or export wrapper around a definition found in a named field.
    Wrapper,
}

impl Lang {
    /// Identifier used in storage payloads and logs.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Ruby => "ruby",
            Self::Bash => "bash",
            Self::Toml => "toml",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Markdown => "markdown",
            Self::Text => "text",
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the language has no
    /// grammar or the corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Prose goes to the documents collection, everything else to code.
    #[must_use]
    pub fn is_code(self) -> bool {
        !matches!(self, Self::Markdown | Self::Text)
    }

    pub(crate) fn node_role(self, kind: &str) -> Option<NodeRole> {
        let role = match (self, kind) {
            (Self::Rust, "function_item")
            | (Self::Python, "function_definition")
            | (
                Self::JavaScript | Self::TypeScript,
                "function_declaration" | "generator_function_declaration" | "method_definition",
            )
            | (Self::Go, "function_declaration" | "method_declaration") => NodeRole::Function,

            (Self::Rust, "struct_item" | "enum_item" | "trait_item" | "impl_item")
            | (Self::Python, "class_definition")
            | (Self::JavaScript, "class_declaration")
            | (
                Self::TypeScript,
                "class_declaration" | "abstract_class_declaration" | "interface_declaration",
            )
            | (Self::Go, "type_declaration") => NodeRole::Class,

            (Self::Python, "decorated_definition")
            | (Self::JavaScript | Self::TypeScript, "export_statement") => NodeRole::Wrapper,

            _ => return None,
        };
        Some(role)
    }

    /// Control-flow node kinds counted by complexity scoring.
    pub(crate) fn branch_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &[
                "if_expression",
                "for_expression",
                "while_expression",
                "loop_expression",
                "match_expression",
            ],
            Self::Python => &[
                "if_statement",
                "for_statement",
                "while_statement",
                "try_statement",
                "match_statement",
            ],
            Self::JavaScript | Self::TypeScript => &[
                "if_statement",
                "for_statement",
                "for_in_statement",
                "while_statement",
                "do_statement",
                "try_statement",
                "switch_statement",
            ],
            Self::Go => &[
                "if_statement",
                "for_statement",
                "expression_switch_statement",
                "type_switch_statement",
                "select_statement",
            ],
            _ => &[],
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "rs" => Some(Lang::Rust),
        "py" | "pyi" => Some(Lang::Python),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "tsx" | "mts" | "cts" => Some(Lang::TypeScript),
        "go" => Some(Lang::Go),
        "java" => Some(Lang::Java),
        "c" | "h" => Some(Lang::C),
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => Some(Lang::Cpp),
        "rb" => Some(Lang::Ruby),
        "sh" | "bash" | "zsh" => Some(Lang::Bash),
        "toml" => Some(Lang::Toml),
        "json" | "jsonc" => Some(Lang::Json),
        "yml" | "yaml" => Some(Lang::Yaml),
        "md" | "markdown" => Some(Lang::Markdown),
        "txt" | "rst" | "adoc" => Some(Lang::Text),
        _ => None,
    }
}

/// Language for `path`, treating unknown extensions as plain text.
#[must_use]
pub fn language_for(path: &Path) -> Lang {
    detect_language(path).unwrap_or(Lang::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_rs() {
        assert_eq!(detect_language(Path::new("src/main.rs")), Some(Lang::Rust));
    }

    #[test]
    fn detect_language_py() {
        assert_eq!(detect_language(Path::new("script.py")), Some(Lang::Python));
    }

    #[test]
    fn detect_language_ts_variants() {
        for ext in &["ts", "tsx", "mts", "cts"] {
            let path = format!("file.{ext}");
            assert_eq!(
                detect_language(Path::new(&path)),
                Some(Lang::TypeScript),
                "failed for .{ext}"
            );
        }
    }

    #[test]
    fn unknown_extension_is_text() {
        assert_eq!(detect_language(Path::new("file.xyz")), None);
        assert_eq!(language_for(Path::new("file.xyz")), Lang::Text);
        assert_eq!(language_for(Path::new("Makefile")), Lang::Text);
    }

    #[test]
    fn prose_is_not_code() {
        assert!(!Lang::Markdown.is_code());
        assert!(!Lang::Text.is_code());
        assert!(Lang::Rust.is_code());
        assert!(Lang::Yaml.is_code());
    }

    #[test]
    fn node_roles() {
        assert_eq!(
            Lang::Rust.node_role("function_item"),
            Some(NodeRole::Function)
        );
        assert_eq!(Lang::Rust.node_role("impl_item"), Some(NodeRole::Class));
        assert_eq!(
            Lang::Python.node_role("decorated_definition"),
            Some(NodeRole::Wrapper)
        );
        assert_eq!(Lang::Python.node_role("function_item"), None);
        assert_eq!(Lang::Markdown.node_role("section"), None);
    }

    #[test]
    fn grammar_returns_some_for_enabled_features() {
        #[cfg(feature = "lang-rust")]
        assert!(Lang::Rust.grammar().is_some());
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-js")]
        {
            assert!(Lang::JavaScript.grammar().is_some());
            assert!(Lang::TypeScript.grammar().is_some());
        }
        #[cfg(feature = "lang-go")]
        assert!(Lang::Go.grammar().is_some());
        assert!(Lang::Markdown.grammar().is_none());
        assert!(Lang::Java.grammar().is_none());
    }

    #[test]
    fn lang_id_matches_display() {
        for lang in [Lang::Rust, Lang::Cpp, Lang::Markdown, Lang::Text] {
            assert_eq!(lang.to_string(), lang.id());
        }
    }
}
