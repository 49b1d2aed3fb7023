use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Folders never descended into
pub const DEFAULT_EXCLUDED_FOLDERS: &[&str] = &[
    "node_modules", "venv", "env", "__pycache__", "site-packages", "myenv",
    "target", "bin", "build", "obj", "vendor", ".git", ".hg", ".svn",
];

/// Lock files, editor droppings and generated files
pub const DEFAULT_EXCLUDED_FILES: &[&str] = &[
    "package-lock.json", "yarn.lock", "pnpm-lock.yaml", "Cargo.lock",
    "Pipfile.lock", "composer.lock", ".DS_Store", "thumbs.db", "Thumbs.db",
    "npm-debug.log", "yarn-error.log", "Dockerfile", "docker-compose.yml",
    ".env", ".gitignore", ".gitattributes", "Makefile",
];

/// Build manifests that describe a project's framework
pub const DEFAULT_KEY_FILES: &[&str] = &[
    "Dockerfile", ".dockerignore", "package.json", "requirements.txt",
    "Pipfile", "composer.json", "Gemfile", "build.gradle", "pom.xml",
    "Cargo.toml", "Makefile",
];

/// Source, markup and configuration extensions (lowercase, no dot)
pub const DEFAULT_INCLUDE_EXTENSIONS: &[&str] = &[
    // JavaScript / TypeScript
    "js", "mjs", "jsx", "ts", "tsx",
    "py", "java",
    // C family
    "cs", "csproj", "cpp", "hpp", "h", "cc", "c",
    "rb", "erb", "rake",
    "php", "phtml", "php3", "php4", "php5", "phps",
    "swift", "kt", "kts", "go", "r",
    "pl", "pm", "t",
    "sh", "bash",
    "html", "htm", "css", "scss", "sass", "less",
    "sql", "scala", "sc", "hs", "lhs", "lua", "rs", "dart", "m", "jl",
    "vb", "vbs", "asm", "s",
    "fs", "fsi", "fsx",
    "groovy", "gvy", "gy", "gsh",
    "erl", "hrl", "ex", "exs",
    "cob", "cbl",
    "f", "for", "f90", "f95",
    "adb", "ads", "pro",
    "lisp", "lsp", "scm", "ss", "rkt",
    "v", "vh", "vhdl", "vhd",
    "md", "markdown",
    "vue", "svelte", "ipynb",
    // Configuration
    "json", "yaml", "yml", "xml",
];

/// Extensions that are never read as text
pub const DEFAULT_BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "pdf", "exe", "dll", "so",
    "zip", "tar", "gz", "7z", "rar", "mp3", "mp4", "avi", "mov",
    "wmv", "flv", "mkv", "iso", "jar", "war", "ear", "class", "o",
    "obj", "pyc", "pyo", "apk", "dmg", "pkg", "app", "deb", "rpm",
    "psd", "ai", "eps", "ps", "ttf", "woff", "woff2", "eot", "otf",
    "ico", "icns", "swf", "fla", "cab", "sys", "msi", "msp", "msm",
    "crx", "xpi", "vsix", "doc", "docx", "xls", "xlsx", "ppt",
    "pptx", "odt", "ods", "odp", "odg", "odb", "odf", "rtf",
];

/// Lookup tables consumed by the file classifier.
///
/// Folder and file names match exactly (case-sensitive). Extensions are
/// stored lowercase without the leading dot and are compared against the
/// lowercased extension of each file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub excluded_folders: BTreeSet<String>,
    pub excluded_files: BTreeSet<String>,
    pub include_extensions: BTreeSet<String>,
    pub key_files: BTreeSet<String>,
    pub binary_extensions: BTreeSet<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            excluded_folders: names(DEFAULT_EXCLUDED_FOLDERS),
            excluded_files: names(DEFAULT_EXCLUDED_FILES),
            include_extensions: extensions(DEFAULT_INCLUDE_EXTENSIONS.iter().copied()),
            key_files: names(DEFAULT_KEY_FILES),
            binary_extensions: extensions(DEFAULT_BINARY_EXTENSIONS.iter().copied()),
        }
    }
}

impl ClassifierConfig {
    /// Tables with no entries at all
    pub fn empty() -> Self {
        Self {
            excluded_folders: BTreeSet::new(),
            excluded_files: BTreeSet::new(),
            include_extensions: BTreeSet::new(),
            key_files: BTreeSet::new(),
            binary_extensions: BTreeSet::new(),
        }
    }

    /// Add every entry of `extra` to these tables. Nothing is ever removed.
    pub fn extend(&mut self, extra: &ClassifierOverrides) {
        self.excluded_folders.extend(extra.excluded_folders.iter().cloned());
        self.excluded_files.extend(extra.excluded_files.iter().cloned());
        self.key_files.extend(extra.key_files.iter().cloned());
        self.include_extensions
            .extend(extensions(extra.include_extensions.iter().map(String::as_str)));
        self.binary_extensions
            .extend(extensions(extra.binary_extensions.iter().map(String::as_str)));
    }
}

/// Additional classifier entries read from a settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOverrides {
    pub excluded_folders: Vec<String>,
    pub excluded_files: Vec<String>,
    pub include_extensions: Vec<String>,
    pub key_files: Vec<String>,
    pub binary_extensions: Vec<String>,
}

/// Process-level settings shared by every pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the per-run snapshot directories
    pub scratch_dir: PathBuf,

    /// Where aggregate reports and rendered documents are written
    pub reports_dir: PathBuf,

    /// Where remote repositories are cloned
    pub checkout_dir: PathBuf,

    /// Worker threads for project scanning; `None` uses all cores but one
    pub threads: Option<usize>,

    /// Extra classifier entries on top of the defaults
    pub classifier: ClassifierOverrides,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("footprint_data_tmp"),
            reports_dir: PathBuf::from("footprint_data_reports"),
            checkout_dir: PathBuf::from("footprint_data_checkouts"),
            threads: None,
            classifier: ClassifierOverrides::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML or YAML file, chosen by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading settings from {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let settings: Settings = match ext.as_str() {
            "toml" => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML settings {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML settings {}", path.display()))?,
            other => bail!("Unsupported settings format '{}' for {}", other, path.display()),
        };

        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Default tables extended with this file's classifier overrides
    pub fn classifier_config(&self) -> ClassifierConfig {
        let mut config = ClassifierConfig::default();
        config.extend(&self.classifier);
        config
    }
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn extensions<'a>(list: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    list.map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
