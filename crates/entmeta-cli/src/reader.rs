use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use entmeta_core::{GlobalConfig, SchemaDocument, SchemaError};

pub const CONFIG_FILE: &str = "entmeta.config.yaml";

const SCHEMA_PATTERNS: [&str; 3] = [
    "**/*.entities.yaml",
    "**/*.entities.yml",
    "**/*.entities.json",
];

/// A schema file with its path and content.
pub struct SchemaFile {
    pub path: String,
    pub content: String,
}

impl SchemaFile {
    fn read(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Ok(SchemaFile {
            path: path.to_string_lossy().to_string(),
            content,
        })
    }

    pub fn parse(&self) -> Result<SchemaDocument, SchemaError> {
        if self.path.ends_with(".json") {
            SchemaDocument::from_json_str(&self.content, &self.path)
        } else {
            SchemaDocument::from_yaml_str(&self.content, &self.path)
        }
    }
}

/// Project configuration from entmeta.config.yaml.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectConfig {
    pub sources: Option<Vec<String>>,
    /// Global configuration; replaces any `config` section of the schema
    /// documents.
    pub config: Option<GlobalConfig>,
}

/// Read schema files from a path (file or directory).
pub fn read_schema_files(input_path: &Path) -> Result<Vec<SchemaFile>, String> {
    if !input_path.exists() {
        return Err(format!("Path does not exist: {}", input_path.display()));
    }

    if input_path.is_file() {
        return Ok(vec![SchemaFile::read(input_path)?]);
    }

    if input_path.is_dir() {
        return match read_project_config(input_path)? {
            Some(ProjectConfig {
                sources: Some(patterns),
                ..
            }) if !patterns.is_empty() => read_from_patterns(&patterns, input_path),
            _ => scan_directory(input_path),
        };
    }

    Err(format!(
        "Path is neither a file nor a directory: {}",
        input_path.display()
    ))
}

/// Read the project config of a directory, if it has one.
pub fn read_project_config(dir_path: &Path) -> Result<Option<ProjectConfig>, String> {
    let config_path = dir_path.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read config: {}", e))?;
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|e| format!("Invalid YAML config {}: {}", config_path.display(), e))
}

fn glob_paths(pattern: &Path, label: &str) -> Result<Vec<PathBuf>, String> {
    let pattern_str = pattern.to_string_lossy().replace('\\', "/");
    let entries = glob::glob(&pattern_str)
        .map_err(|e| format!("Invalid glob pattern '{}': {}", label, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => return Err(format!("Glob error: {}", e)),
        }
    }
    Ok(paths)
}

fn scan_directory(dir_path: &Path) -> Result<Vec<SchemaFile>, String> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for pattern in SCHEMA_PATTERNS {
        for path in glob_paths(&dir_path.join(pattern), pattern)? {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    paths.sort();
    paths.iter().map(|path| SchemaFile::read(path)).collect()
}

fn read_from_patterns(patterns: &[String], base_dir: &Path) -> Result<Vec<SchemaFile>, String> {
    let mut files: Vec<SchemaFile> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for pattern in patterns {
        let mut matched: Vec<PathBuf> = glob_paths(&base_dir.join(pattern), pattern)?
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .collect();
        matched.sort();

        for path in matched {
            files.push(SchemaFile::read(&path)?);
        }
    }

    Ok(files)
}
