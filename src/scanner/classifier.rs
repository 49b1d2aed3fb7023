use std::path::{Component, Path};

use crate::config::ClassifierConfig;
use crate::utils::file_utils;

/// Outcome of classifying a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Skip,
    IncludeSource,
    IncludeKeyFile,
}

impl Classification {
    pub fn is_included(self) -> bool {
        !matches!(self, Classification::Skip)
    }
}

/// Extension to language tag, first match wins during a scan
const LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("java", "java"),
    ("cpp", "c++"),
    ("c", "c"),
    ("cs", "c#"),
    ("php", "php"),
    ("rb", "ruby"),
    ("go", "go"),
    ("swift", "swift"),
    ("ts", "typescript"),
    ("kt", "kotlin"),
    ("rs", "rust"),
    ("dart", "dart"),
];

/// Lowercase language tag for a (lowercase) extension
pub fn language_for_extension(extension: &str) -> Option<&'static str> {
    LANGUAGE_EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, lang)| *lang)
}

/// Decides what the project scanner does with each path it meets
#[derive(Debug, Clone, Default)]
pub struct FileClassifier {
    config: ClassifierConfig,
}

impl FileClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Whether a directory with this name is pruned from the walk
    pub fn is_excluded_dir(&self, dir_name: &str) -> bool {
        self.config.excluded_folders.contains(dir_name)
    }

    /// Classify a file.
    ///
    /// `path` is relative to the project root; only its parent segments are
    /// checked against the excluded folders, so a project that itself lives
    /// under e.g. `build/` is still scanned.
    pub fn classify(&self, path: &Path, file_name: &str) -> Classification {
        if self.inside_excluded_dir(path) {
            return Classification::Skip;
        }

        if self.config.excluded_files.contains(file_name) {
            return Classification::Skip;
        }

        let extension = file_utils::file_extension(file_name);

        if let Some(ext) = &extension {
            if self.config.binary_extensions.contains(ext) {
                return Classification::Skip;
            }
        }

        if self.config.key_files.contains(file_name) {
            return Classification::IncludeKeyFile;
        }

        match extension {
            Some(ext) if self.config.include_extensions.contains(&ext) => Classification::IncludeSource,
            _ => Classification::Skip,
        }
    }

    fn inside_excluded_dir(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };

        parent.components().any(|component| match component {
            Component::Normal(segment) => segment
                .to_str()
                .is_some_and(|s| self.is_excluded_dir(s)),
            _ => false,
        })
    }
}
