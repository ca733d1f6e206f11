//! Workspace context sent along with mentor chat requests.
//!
//! Picks the files most likely to matter for the active file (its relative
//! imports, then its siblings) and keeps the total under a size budget.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Total characters of file content in one context
pub const MAX_CONTEXT_SIZE: usize = 10 * 1024;

pub const MAX_RELATED_FILES: usize = 5;

/// Paths listed from the file tree
pub const MAX_TREE_PATHS: usize = 50;

const IMPORT_CONTENT_LIMIT: usize = 2000;
const SIBLING_CONTENT_LIMIT: usize = 1000;
const TRUNCATION_MARKER: &str = "\n\n... (truncated)";

const CANDIDATE_EXTENSIONS: &[&str] = &[
    "", ".ts", ".tsx", ".js", ".jsx", ".py", ".rs", "/index.ts", "/index.tsx", "/index.js",
    "/__init__.py", "/mod.rs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Import,
    Sibling,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedFile {
    pub path: String,
    pub content: String,
    pub relation: Relation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceContext {
    pub active_file: FileSnapshot,
    pub related_files: Vec<RelatedFile>,
    pub file_tree: Vec<String>,
}

impl WorkspaceContext {
    /// Plain-text rendering used as the `context_summary` of chat requests.
    pub fn render_summary(&self) -> String {
        let mut out = format!(
            "Active file: {}\n{}\n",
            self.active_file.path, self.active_file.content
        );
        for file in &self.related_files {
            let label = match file.relation {
                Relation::Import => "imported",
                Relation::Sibling => "sibling",
            };
            out.push_str(&format!("\n--- {} ({}) ---\n{}\n", file.path, label, file.content));
        }
        if !self.file_tree.is_empty() {
            out.push_str("\nProject files:\n");
            for path in &self.file_tree {
                out.push_str("  ");
                out.push_str(path);
                out.push('\n');
            }
        }
        out
    }
}

fn js_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"import\s+(?:.*?\s+from\s+)?['"](\.[^'"]+)['"]"#).expect("valid regex")
    })
}

fn py_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*from\s+(\.[\w.]*)\s+import").expect("valid regex"))
}

/// Cut `content` to `max_chars` characters, marking the cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((idx, _)) => format!("{}{}", &content[..idx], TRUNCATION_MARKER),
    }
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Join a relative import onto `base_dir`, resolving `./` and `../`.
fn resolve_relative(import: &str, base_dir: &str) -> String {
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in import.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Relative import targets of a JS/TS or Python file, resolved against its
/// directory and without extension.
pub fn parse_imports(content: &str, file_path: &str) -> Vec<String> {
    let base = parent_dir(file_path);
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for cap in js_import_re().captures_iter(content) {
        let resolved = resolve_relative(&cap[1], base);
        if seen.insert(resolved.clone()) {
            out.push(resolved);
        }
    }

    for cap in py_import_re().captures_iter(content) {
        let module = &cap[1];
        let dots = module.chars().take_while(|c| *c == '.').count();
        let rest = module[dots..].replace('.', "/");
        let mut prefix = String::from("./");
        for _ in 1..dots {
            prefix.push_str("../");
        }
        let resolved = resolve_relative(&format!("{}{}", prefix, rest), base);
        if seen.insert(resolved.clone()) {
            out.push(resolved);
        }
    }

    out
}

fn find_candidate<'a>(target: &str, files: &'a BTreeMap<String, String>) -> Option<&'a String> {
    CANDIDATE_EXTENSIONS
        .iter()
        .find_map(|ext| files.get_key_value(&format!("{}{}", target, ext)))
        .map(|(path, _)| path)
}

/// Build the context for `active_path`. `files` maps workspace-relative
/// paths to contents; `None` when the active file is not among them.
pub fn build_workspace_context(
    active_path: &str,
    files: &BTreeMap<String, String>,
    tree: &[String],
) -> Option<WorkspaceContext> {
    let active_content = files.get(active_path)?;
    let mut related: Vec<RelatedFile> = Vec::new();
    let mut used: BTreeSet<&str> = BTreeSet::new();
    used.insert(active_path);

    for import in parse_imports(active_content, active_path) {
        if related.len() >= MAX_RELATED_FILES {
            break;
        }
        if let Some(path) = find_candidate(&import, files) {
            if used.insert(path.as_str()) {
                related.push(RelatedFile {
                    path: path.clone(),
                    content: truncate_content(&files[path], IMPORT_CONTENT_LIMIT),
                    relation: Relation::Import,
                });
            }
        }
    }

    let active_dir = parent_dir(active_path);
    for (path, content) in files {
        if related.len() >= MAX_RELATED_FILES {
            break;
        }
        if parent_dir(path) == active_dir && used.insert(path.as_str()) {
            related.push(RelatedFile {
                path: path.clone(),
                content: truncate_content(content, SIBLING_CONTENT_LIMIT),
                relation: Relation::Sibling,
            });
        }
    }

    let active_len = active_content.chars().count();
    let total: usize = active_len
        + related
            .iter()
            .map(|f| f.content.chars().count())
            .sum::<usize>();
    if total > MAX_CONTEXT_SIZE && !related.is_empty() {
        let per_file = MAX_CONTEXT_SIZE.saturating_sub(active_len) / related.len();
        for file in &mut related {
            file.content = truncate_content(&file.content, per_file);
        }
    }

    Some(WorkspaceContext {
        active_file: FileSnapshot {
            path: active_path.to_string(),
            content: active_content.clone(),
        },
        related_files: related,
        file_tree: tree.iter().take(MAX_TREE_PATHS).cloned().collect(),
    })
}
