//! Include/exclude path filtering.
//!
//! A `PathFilter` decides whether a source-relative path is left behind.
//! Precedence, strongest first:
//! 1. include tokens (substring of the file name or the full path) keep a path
//! 2. anything under `.git` in `objects`, `refs` or `logs` is dropped
//! 3. exclude tokens: `*.ext` suffix, `prefix*` on the file name, or a literal
//!    matched against path segments
//!
//! Paths are compared using `/`-joined components so the result is the same
//! on every platform.

use std::collections::BTreeSet;
use std::path::{Component, Path};

/// Build outputs, dependency caches and OS clutter left behind by default.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    // JavaScript / TypeScript
    "node_modules",
    "node_modules.bak",
    "bower_components",
    ".next",
    ".nuxt",
    ".sass-cache",
    ".parcel-cache",
    "coverage",
    // Python
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".coverage",
    ".tox",
    ".venv",
    "venv",
    "*.pyc",
    "*.pyo",
    "*.pyd",
    // Generic build output
    "dist",
    "build",
    "target",
    "bin",
    "obj",
    ".cache",
    "*.log",
    "*.tmp",
    "*.temp",
    // Editors and OS
    ".vs",
    ".vscode/settings.json",
    ".idea/workspace.xml",
    ".idea/tasks.xml",
    ".DS_Store",
    "Thumbs.db",
];

/// Project metadata that is always carried over, even inside excluded trees.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &[
    ".env",
    ".env.local",
    ".env.development",
    ".env.production",
    ".env.staging",
    ".env.test",
    ".env.example",
    ".env.template",
    ".env.sample",
    ".gitignore",
    ".gitmodules",
    ".gitattributes",
    ".gitkeep",
    ".github",
    ".dockerignore",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    ".editorconfig",
    ".prettierrc",
    ".pre-commit-config.yaml",
    ".npmrc",
    ".yarnrc",
    "pyproject.toml",
    "poetry.lock",
    "requirements.txt",
    "requirements-dev.txt",
    "setup.py",
    "setup.cfg",
    "tox.ini",
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "tsconfig.json",
    "tslint.json",
    "eslint.config.js",
    ".eslintrc.js",
    ".eslintrc.json",
    "jest.config.js",
    "babel.config.js",
    "webpack.config.js",
    "vite.config.ts",
    "tailwind.config.js",
    "postcss.config.js",
    "Makefile",
    "LICENSE",
    "README.md",
    "CHANGELOG.md",
];

/// `.git` subdirectories holding bulk object storage.
const GIT_EXCLUDED_DIRS: &[&str] = &["objects", "refs", "logs"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExcludeRule {
    /// `*.ext`, stored as `.ext`
    Extension(String),
    /// `prefix*`, stored as `prefix`
    Prefix(String),
    /// Literal token, split on `/`
    Segments(Vec<String>),
}

impl ExcludeRule {
    fn parse(token: &str) -> Self {
        if let Some(ext) = token.strip_prefix('*').filter(|rest| rest.starts_with('.')) {
            ExcludeRule::Extension(ext.to_string())
        } else if let Some(prefix) = token.strip_suffix('*') {
            ExcludeRule::Prefix(prefix.to_string())
        } else {
            ExcludeRule::Segments(
                token
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        }
    }

    fn matches(&self, full: &str, name: &str, segments: &[String]) -> bool {
        match self {
            ExcludeRule::Extension(ext) => full.ends_with(ext.as_str()),
            ExcludeRule::Prefix(prefix) => name.starts_with(prefix.as_str()),
            ExcludeRule::Segments(parts) => match parts.len() {
                0 => false,
                1 => parts[0] == name || segments.iter().any(|s| *s == parts[0]),
                n => segments.windows(n).any(|w| w == parts.as_slice()),
            },
        }
    }
}

/// Decides which paths are migrated.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
    rules: Vec<ExcludeRule>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PathFilter {
    /// Filter with only the built-in token sets.
    pub fn new() -> Self {
        Self::with_patterns(Vec::<String>::new(), Vec::<String>::new())
    }

    /// Filter with extra tokens layered on top of the defaults.
    pub fn with_patterns<I, E>(additional_include: I, additional_exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let include: BTreeSet<String> = DEFAULT_INCLUDE_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .chain(additional_include.into_iter().map(Into::into))
            .filter(|s| !s.is_empty())
            .collect();
        let exclude: BTreeSet<String> = DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .chain(additional_exclude.into_iter().map(Into::into))
            .filter(|s| !s.is_empty())
            .collect();
        let rules = exclude.iter().map(|t| ExcludeRule::parse(t)).collect();

        PathFilter {
            include,
            exclude,
            rules,
        }
    }

    /// Active include tokens.
    pub fn include_patterns(&self) -> impl Iterator<Item = &str> {
        self.include.iter().map(String::as_str)
    }

    /// Active exclude tokens.
    pub fn exclude_patterns(&self) -> impl Iterator<Item = &str> {
        self.exclude.iter().map(String::as_str)
    }

    /// Returns true if `path` should be left out of the migration.
    pub fn should_exclude(&self, path: &Path) -> bool {
        let segments = path_segments(path);
        let Some(name) = segments.last() else {
            return false;
        };
        let full = segments.join("/");

        if self
            .include
            .iter()
            .any(|token| name.contains(token.as_str()) || full.contains(token.as_str()))
        {
            return false;
        }

        if segments.iter().any(|s| s == ".git")
            && segments
                .iter()
                .any(|s| GIT_EXCLUDED_DIRS.contains(&s.as_str()))
        {
            return true;
        }

        self.rules
            .iter()
            .any(|rule| rule.matches(&full, name, &segments))
    }
}

fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
