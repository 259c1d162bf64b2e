//! Best-effort project tree inferred from executed command text.
//!
//! Nothing here touches the filesystem. Each [`StructureRule`] looks at a
//! command string and proposes entries; [`ProjectStructure`] keeps the
//! accepted ones in discovery order. The view can list files that a failed
//! or unusual command never produced.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectStructureEntry {
    pub id: String,
    pub name: String,
    pub path: String,
    pub language: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
    pub is_directory: bool,
}

impl ProjectStructureEntry {
    pub fn directory(path: impl Into<String>, description: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: Uuid::new_v4().to_string(),
            name: entry_name(&path),
            path,
            language: String::new(),
            description: description.into(),
            content: String::new(),
            is_directory: true,
        }
    }

    pub fn file(path: impl Into<String>, description: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: Uuid::new_v4().to_string(),
            name: entry_name(&path),
            language: language_for_path(&path).to_string(),
            path,
            description: description.into(),
            content: String::new(),
            is_directory: false,
        }
    }
}

/// Entries proposed by the rules for a single command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureDelta {
    pub entries: Vec<ProjectStructureEntry>,
}

impl StructureDelta {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Project generators whose standard output is known well enough to sketch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScaffoldTool {
    CreateReactApp,
    Vite,
    CreateNextApp,
    VueCli,
    ExpressGenerator,
    NpmInit,
    GitInit,
}

impl ScaffoldTool {
    pub const ALL: [ScaffoldTool; 7] = [
        ScaffoldTool::CreateReactApp,
        ScaffoldTool::Vite,
        ScaffoldTool::CreateNextApp,
        ScaffoldTool::VueCli,
        ScaffoldTool::ExpressGenerator,
        ScaffoldTool::NpmInit,
        ScaffoldTool::GitInit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ScaffoldTool::CreateReactApp => "create-react-app",
            ScaffoldTool::Vite => "create vite",
            ScaffoldTool::CreateNextApp => "create-next-app",
            ScaffoldTool::VueCli => "vue create",
            ScaffoldTool::ExpressGenerator => "express-generator",
            ScaffoldTool::NpmInit => "npm init",
            ScaffoldTool::GitInit => "git init",
        }
    }

    // Group 1, when present, is the target directory.
    fn pattern(self) -> &'static str {
        match self {
            ScaffoldTool::CreateReactApp => r"create-react-app(?:@\S+)?\s+([^\s;&|-][^\s;&|]*)",
            ScaffoldTool::Vite => {
                r"\b(?:npm|yarn|pnpm)\s+create\s+vite(?:@\S+)?(?:\s+([^\s;&|-][^\s;&|]*))?"
            }
            ScaffoldTool::CreateNextApp => r"create-next-app(?:@\S+)?\s+([^\s;&|-][^\s;&|]*)",
            ScaffoldTool::VueCli => r"\bvue(?:/cli)?\s+create\s+(?:-\S+\s+)*([^\s;&|-][^\s;&|]*)",
            ScaffoldTool::ExpressGenerator => {
                r"express-generator\s+(?:-\S+\s+)*([^\s;&|-][^\s;&|]*)"
            }
            ScaffoldTool::NpmInit => r"\b(?:npm|yarn|pnpm)\s+init(?:\s+(?:-y|--yes))?\s*(?:$|[;&|])",
            ScaffoldTool::GitInit => r"\bgit\s+init(?:\s+([^\s;&|-][^\s;&|]*))?",
        }
    }

    /// Canned output of the generator, relative to its target directory.
    /// Directories end with `/`.
    fn template(self) -> &'static [&'static str] {
        match self {
            ScaffoldTool::CreateReactApp => &[
                "src/",
                "public/",
                "package.json",
                "src/index.js",
                "src/App.js",
                "src/App.css",
                "public/index.html",
            ],
            ScaffoldTool::Vite => &[
                "src/",
                "public/",
                "package.json",
                "index.html",
                "vite.config.js",
                "src/main.jsx",
                "src/App.jsx",
            ],
            ScaffoldTool::CreateNextApp => &[
                "app/",
                "public/",
                "package.json",
                "next.config.js",
                "app/layout.js",
                "app/page.js",
            ],
            ScaffoldTool::VueCli => &[
                "src/",
                "public/",
                "package.json",
                "src/main.js",
                "src/App.vue",
                "public/index.html",
            ],
            ScaffoldTool::ExpressGenerator => &[
                "bin/",
                "routes/",
                "views/",
                "public/",
                "package.json",
                "app.js",
                "bin/www",
                "routes/index.js",
            ],
            ScaffoldTool::NpmInit => &["package.json"],
            ScaffoldTool::GitInit => &[".git/"],
        }
    }
}

static MKDIR_RE: OnceLock<Regex> = OnceLock::new();
static TOUCH_RE: OnceLock<Regex> = OnceLock::new();
static REDIRECT_RE: OnceLock<Regex> = OnceLock::new();
static CD_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
static SCAFFOLD_RES: OnceLock<Vec<Regex>> = OnceLock::new();

fn mkdir_re() -> &'static Regex {
    MKDIR_RE.get_or_init(|| Regex::new(r"\bmkdir\s+(?:-\S+\s+)*([^\s;&|)]+)").unwrap())
}

fn touch_re() -> &'static Regex {
    TOUCH_RE.get_or_init(|| Regex::new(r"\btouch\s+(?:-\S+\s+)*([^\s;&|)]+)").unwrap())
}

// `2>&1` and `>&2` never match: the target may not start with `&`.
fn redirect_re() -> &'static Regex {
    REDIRECT_RE.get_or_init(|| Regex::new(r"(?:^|[^0-9&>])>{1,2}\s*([^\s;&|>]+)").unwrap())
}

fn cd_prefix_re() -> &'static Regex {
    CD_PREFIX_RE.get_or_init(|| Regex::new(r"^\s*cd\s+([^\s;&|]+)\s*&&\s*(.*)$").unwrap())
}

fn scaffold_re(tool: ScaffoldTool) -> &'static Regex {
    let all = SCAFFOLD_RES.get_or_init(|| {
        ScaffoldTool::ALL
            .iter()
            .map(|tool| Regex::new(tool.pattern()).unwrap())
            .collect()
    });
    &all[tool as usize]
}

/// A single command pattern and the entries it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureRule {
    Mkdir,
    Touch,
    /// `> file` or `>> file`, as in `echo "KEY=value" >> .env`.
    Redirect,
    Scaffold(ScaffoldTool),
}

impl StructureRule {
    /// Proposed entries for `command`, with paths relative to the command's
    /// working directory.
    pub fn apply(&self, command: &str) -> Option<StructureDelta> {
        match self {
            StructureRule::Mkdir => {
                let path = first_argument(mkdir_re(), command)?;
                Some(StructureDelta {
                    entries: vec![ProjectStructureEntry::directory(
                        path,
                        "Created by mkdir",
                    )],
                })
            }
            StructureRule::Touch => {
                let path = first_argument(touch_re(), command)?;
                Some(StructureDelta {
                    entries: vec![ProjectStructureEntry::file(path, "Created by touch")],
                })
            }
            StructureRule::Redirect => {
                let path = first_argument(redirect_re(), command)?;
                if path.starts_with("/dev/") {
                    return None;
                }
                Some(StructureDelta {
                    entries: vec![ProjectStructureEntry::file(path, "Written by shell redirect")],
                })
            }
            StructureRule::Scaffold(tool) => {
                let captures = scaffold_re(*tool).captures(command)?;
                let root = captures
                    .get(1)
                    .map(|target| normalize_path(target.as_str()))
                    .unwrap_or_default();
                let description = format!("Generated by {}", tool.label());
                let mut entries = Vec::new();
                if !root.is_empty() {
                    entries.push(ProjectStructureEntry::directory(
                        root.clone(),
                        description.clone(),
                    ));
                }
                for relative in tool.template() {
                    let (relative, is_directory) = match relative.strip_suffix('/') {
                        Some(dir) => (dir, true),
                        None => (*relative, false),
                    };
                    let path = join_path(&root, relative);
                    entries.push(if is_directory {
                        ProjectStructureEntry::directory(path, description.clone())
                    } else {
                        ProjectStructureEntry::file(path, description.clone())
                    });
                }
                Some(StructureDelta { entries })
            }
        }
    }
}

/// Ordered rule set. New generators are added with [`StructureInference::with_rule`].
#[derive(Debug, Clone)]
pub struct StructureInference {
    rules: Vec<StructureRule>,
}

impl Default for StructureInference {
    fn default() -> Self {
        let mut rules = vec![
            StructureRule::Mkdir,
            StructureRule::Touch,
            StructureRule::Redirect,
        ];
        rules.extend(ScaffoldTool::ALL.iter().copied().map(StructureRule::Scaffold));
        Self { rules }
    }
}

impl StructureInference {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: StructureRule) -> Self {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
        self
    }

    pub fn rules(&self) -> &[StructureRule] {
        &self.rules
    }

    /// Run every rule against `command`. A leading `cd <dir> &&` re-roots
    /// the proposed paths under `<dir>`.
    pub fn infer(&self, command: &str) -> StructureDelta {
        let (base, body) = match cd_prefix_re().captures(command) {
            Some(captures) => (
                normalize_path(&captures[1]),
                captures.get(2).map_or("", |m| m.as_str()),
            ),
            None => (String::new(), command),
        };

        let mut delta = StructureDelta::default();
        for rule in &self.rules {
            if let Some(found) = rule.apply(body) {
                for mut entry in found.entries {
                    if !base.is_empty() && !Path::new(&entry.path).is_absolute() {
                        entry.path = join_path(&base, &entry.path);
                    }
                    delta.entries.push(entry);
                }
            }
        }
        delta
    }
}

/// Inferred tree, append-only and deduplicated by path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectStructure {
    entries: Vec<ProjectStructureEntry>,
}

impl ProjectStructure {
    pub fn entries(&self) -> &[ProjectStructureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, path: &str) -> Option<&ProjectStructureEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    /// Append unseen entries and return how many were added.
    pub fn apply(&mut self, delta: StructureDelta) -> usize {
        let mut added = 0;
        for entry in delta.entries {
            if self.find(&entry.path).is_some() {
                continue;
            }
            debug!(path = %entry.path, directory = entry.is_directory, "inferred structure entry");
            self.entries.push(entry);
            added += 1;
        }
        added
    }
}

/// Language tag used by the editor for a file path.
pub fn language_for_path(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("js" | "jsx" | "mjs" | "cjs") => "javascript",
        Some("ts" | "tsx") => "typescript",
        Some("py") => "python",
        Some("rs") => "rust",
        Some("json") => "json",
        Some("html" | "htm") => "html",
        Some("css") => "css",
        Some("scss") => "scss",
        Some("md") => "markdown",
        Some("yml" | "yaml") => "yaml",
        Some("toml") => "toml",
        Some("sql") => "sql",
        Some("sh") => "shell",
        Some("go") => "go",
        Some("java") => "java",
        Some("vue") => "vue",
        _ => "plaintext",
    }
}

fn first_argument(re: &Regex, command: &str) -> Option<String> {
    let raw = re.captures(command)?.get(1)?.as_str();
    if raw.starts_with('-') {
        return None;
    }
    let path = normalize_path(raw);
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

fn normalize_path(raw: &str) -> String {
    let unquoted = raw.trim_matches(|c| c == '"' || c == '\'');
    let mut path = unquoted;
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    let path = path.trim_end_matches('/');
    if path == "." {
        String::new()
    } else {
        path.to_string()
    }
}

fn join_path(base: &str, relative: &str) -> String {
    if base.is_empty() {
        relative.to_string()
    } else {
        format!("{base}/{relative}")
    }
}

fn entry_name(path: &str) -> String {
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer_all(commands: &[&str]) -> ProjectStructure {
        let inference = StructureInference::default();
        let mut structure = ProjectStructure::default();
        for command in commands {
            structure.apply(inference.infer(command));
        }
        structure
    }

    #[test]
    fn mkdir_then_touch_builds_directory_and_file() {
        let structure = infer_all(&["mkdir src", "touch src/index.js"]);
        let dir = structure.find("src").expect("src entry");
        assert!(dir.is_directory);
        assert_eq!(dir.name, "src");
        let file = structure.find("src/index.js").expect("index entry");
        assert!(!file.is_directory);
        assert_eq!(file.name, "index.js");
        assert_eq!(file.language, "javascript");
    }

    #[test]
    fn mkdir_skips_flags_and_takes_first_path() {
        let delta = StructureRule::Mkdir
            .apply("mkdir -p ./server/routes server/models")
            .expect("mkdir delta");
        assert_eq!(delta.entries.len(), 1);
        assert_eq!(delta.entries[0].path, "server/routes");
        assert_eq!(delta.entries[0].name, "routes");
        assert!(StructureRule::Mkdir.apply("mkdir -p").is_none());
        assert!(StructureRule::Mkdir.apply("npm install").is_none());
    }

    #[test]
    fn scaffold_generators_expand_under_target() {
        let structure = infer_all(&["npx create-react-app my-app"]);
        for path in [
            "my-app",
            "my-app/src",
            "my-app/public",
            "my-app/package.json",
            "my-app/src/index.js",
        ] {
            assert!(structure.find(path).is_some(), "missing {path}");
        }
        assert!(structure.find("my-app/src").unwrap().is_directory);
    }

    #[test]
    fn cd_prefix_reroots_paths() {
        let structure = infer_all(&["cd shop && mkdir src/db && touch src/db/index.ts"]);
        assert!(structure.find("shop/src/db").unwrap().is_directory);
        assert_eq!(structure.find("shop/src/db/index.ts").unwrap().language, "typescript");
    }

    #[test]
    fn npm_init_does_not_match_generators() {
        let delta = StructureInference::default().infer("npm init -y");
        assert_eq!(delta.entries.len(), 1);
        assert_eq!(delta.entries[0].path, "package.json");
        assert!(StructureRule::Scaffold(ScaffoldTool::NpmInit)
            .apply("npm init vite@latest demo")
            .is_none());
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut structure = ProjectStructure::default();
        let inference = StructureInference::default();
        assert_eq!(structure.apply(inference.infer("mkdir src")), 1);
        assert_eq!(structure.apply(inference.infer("mkdir -p src")), 0);
        assert_eq!(structure.len(), 1);
    }

    #[test]
    fn custom_rule_sets_only_apply_their_rules() {
        let inference = StructureInference::empty().with_rule(StructureRule::Touch);
        assert!(inference.infer("mkdir src").is_empty());
        assert_eq!(inference.infer("touch README.md").entries[0].language, "markdown");
    }

    #[test]
    fn redirects_record_the_target_file() {
        let structure = infer_all(&[
            "cd shop && echo \"DATABASE_URL=postgres://localhost:5432/shop\" >> .env",
            "echo hi > notes.md",
        ]);
        let env = structure.find("shop/.env").expect("env entry");
        assert!(!env.is_directory);
        assert_eq!(env.name, ".env");
        assert_eq!(structure.find("notes.md").unwrap().language, "markdown");

        assert!(StructureRule::Redirect.apply("npm test 2>&1").is_none());
        assert!(StructureRule::Redirect.apply("npm ci > /dev/null").is_none());
        assert!(StructureRule::Redirect.apply("npm install").is_none());
    }

    #[test]
    fn unknown_extensions_are_plaintext() {
        assert_eq!(language_for_path(".env"), "plaintext");
        assert_eq!(language_for_path("Dockerfile"), "plaintext");
        assert_eq!(language_for_path("App.TSX"), "typescript");
    }
}
