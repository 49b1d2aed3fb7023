//! Pattern-based import extraction.
//!
//! These are line heuristics, not parsers: matches inside comments and
//! strings are counted and multi-line import forms are missed.

use std::fmt::Debug;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static PYTHON_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import|from)\s+([^\s,]+)").expect("python import pattern")
});

static JS_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s.*?from\s+['"]([^'"]+)['"]|require\(['"]([^'"]+)['"]\)"#)
        .expect("javascript import pattern")
});

static JAVA_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*import\s+([^\s;]+);").expect("java import pattern")
});

/// Lazy sequence of import names borrowed from the scanned content
pub type ImportIter<'a> = Box<dyn Iterator<Item = &'a str> + 'a>;

/// One language's import heuristic
pub trait ImportHeuristic: Debug + Send + Sync {
    /// Lowercase extensions this heuristic handles
    fn extensions(&self) -> &[&str];

    fn extract<'a>(&self, content: &'a str) -> ImportIter<'a>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonImports;

impl ImportHeuristic for PythonImports {
    fn extensions(&self) -> &[&str] {
        &["py"]
    }

    fn extract<'a>(&self, content: &'a str) -> ImportIter<'a> {
        Box::new(
            PYTHON_IMPORT_RE
                .captures_iter(content)
                .filter_map(|cap| cap.get(1).map(|m| m.as_str())),
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JavaScriptImports;

impl ImportHeuristic for JavaScriptImports {
    fn extensions(&self) -> &[&str] {
        &["js", "jsx", "mjs", "ts", "tsx"]
    }

    fn extract<'a>(&self, content: &'a str) -> ImportIter<'a> {
        Box::new(
            JS_IMPORT_RE
                .captures_iter(content)
                .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str())),
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JavaImports;

impl ImportHeuristic for JavaImports {
    fn extensions(&self) -> &[&str] {
        &["java"]
    }

    fn extract<'a>(&self, content: &'a str) -> ImportIter<'a> {
        Box::new(
            JAVA_IMPORT_RE
                .captures_iter(content)
                .filter_map(|cap| cap.get(1).map(|m| m.as_str())),
        )
    }
}

/// Dispatches content to the heuristic registered for its extension
#[derive(Debug)]
pub struct ImportExtractor {
    heuristics: Vec<Box<dyn ImportHeuristic>>,
}

impl Default for ImportExtractor {
    fn default() -> Self {
        Self {
            heuristics: vec![
                Box::new(PythonImports),
                Box::new(JavaScriptImports),
                Box::new(JavaImports),
            ],
        }
    }
}

impl ImportExtractor {
    /// An extractor without any heuristics
    pub fn empty() -> Self {
        Self { heuristics: Vec::new() }
    }

    /// Add a heuristic. Later registrations take precedence for shared extensions.
    pub fn register(&mut self, heuristic: impl ImportHeuristic + 'static) {
        self.heuristics.insert(0, Box::new(heuristic));
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.heuristic_for(extension).is_some()
    }

    /// Import names referenced by `content`; empty for unrecognized extensions
    pub fn extract<'a>(&self, content: &'a str, extension: &str) -> ImportIter<'a> {
        match self.heuristic_for(extension) {
            Some(heuristic) => heuristic.extract(content),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Occurrence count per exact import name, in first-seen order
    pub fn count(&self, content: &str, extension: &str) -> IndexMap<String, usize> {
        let mut counts = IndexMap::new();
        for name in self.extract(content, extension) {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
        counts
    }

    fn heuristic_for(&self, extension: &str) -> Option<&dyn ImportHeuristic> {
        self.heuristics
            .iter()
            .find(|h| h.extensions().contains(&extension))
            .map(|h| h.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn names(content: &str, ext: &str) -> Vec<String> {
        ImportExtractor::default()
            .extract(content, ext)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_python_counts() {
        let counts = ImportExtractor::default().count("import os\nimport os\nfrom sys import path\n", "py");

        let mut expected = IndexMap::new();
        expected.insert("os".to_string(), 2);
        expected.insert("sys".to_string(), 1);
        assert_eq!(counts, expected);
    }

    #[test_case("import os, sys\n" => vec!["os"]; "stops at comma")]
    #[test_case("    import numpy as np\n" => vec!["numpy"]; "indented with alias")]
    #[test_case("from .models import User\n" => vec![".models"]; "relative import kept raw")]
    #[test_case("x = 1  # import nothing\n" => Vec::<&str>::new(); "not at line start")]
    fn test_python_patterns(content: &str) -> Vec<String> {
        names(content, "py")
    }

    #[test_case("import React from 'react';\n" => vec!["react"]; "default import")]
    #[test_case("import { a, b } from \"./utils\";\n" => vec!["./utils"]; "relative path kept")]
    #[test_case("const fs = require('fs');\n" => vec!["fs"]; "require anywhere on line")]
    #[test_case("import './side-effect.css';\n" => Vec::<&str>::new(); "bare import is not matched")]
    fn test_javascript_patterns(content: &str) -> Vec<String> {
        names(content, "js")
    }

    #[test]
    fn test_typescript_shares_javascript_heuristic() {
        assert_eq!(names("import { Injectable } from '@angular/core';", "ts"), vec!["@angular/core"]);
        assert_eq!(names("const x = require(\"x\")", "tsx"), vec!["x"]);
    }

    #[test_case("import java.util.List;\n" => vec!["java.util.List"]; "qualified name")]
    #[test_case("import java.util.*;\n" => vec!["java.util.*"]; "wildcard")]
    #[test_case("import static org.junit.Assert.assertEquals;\n" => Vec::<&str>::new(); "static import")]
    fn test_java_patterns(content: &str) -> Vec<String> {
        names(content, "java")
    }

    #[test]
    fn test_names_are_case_and_path_sensitive() {
        let counts = ImportExtractor::default().count("require('./utils')\nrequire('utils')\nrequire('Utils')\n", "js");
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_unrecognized_extension_yields_nothing() {
        assert!(names("import os\n", "rb").is_empty());
        assert!(!ImportExtractor::default().supports("md"));
    }

    #[derive(Debug)]
    struct RubyRequires;

    impl ImportHeuristic for RubyRequires {
        fn extensions(&self) -> &[&str] {
            &["rb"]
        }

        fn extract<'a>(&self, content: &'a str) -> ImportIter<'a> {
            Box::new(
                content
                    .lines()
                    .filter_map(|line| line.trim().strip_prefix("require "))
                    .map(|rest| rest.trim_matches(|c| c == '\'' || c == '"')),
            )
        }
    }

    #[test]
    fn test_registered_heuristic_extends_extractor() {
        let mut extractor = ImportExtractor::default();
        extractor.register(RubyRequires);

        let found: Vec<_> = extractor.extract("require 'json'\n", "rb").collect();
        assert_eq!(found, vec!["json"]);
    }
}
