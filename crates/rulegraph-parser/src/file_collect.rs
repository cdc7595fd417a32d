use crate::language::is_source_file;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rulegraph_core::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Build-configuration subset the collector honors. Present at the project
/// root as `tsconfig.json`.
#[derive(Debug, Default, Deserialize)]
struct BuildConfig {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

/// Collect the analyzed source set under `root`, honoring a root-level
/// build-configuration file when present and the directory exclusion set
/// always. Output is sorted for deterministic downstream ordering.
pub fn collect_source_files(root: &Path, excluded_dirs: &[String]) -> Result<Vec<PathBuf>> {
    let config_path = root.join("tsconfig.json");
    let mut paths = if config_path.is_file() {
        match load_build_config(&config_path) {
            Some(config) => collect_from_config(root, &config, excluded_dirs)?,
            None => walk_sources(root, excluded_dirs, None, None),
        }
    } else {
        walk_sources(root, excluded_dirs, None, None)
    };

    paths.sort();
    paths.dedup();
    debug!("collected {} source files under {:?}", paths.len(), root);
    Ok(paths)
}

fn load_build_config(path: &Path) -> Option<BuildConfig> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<BuildConfig>(&text) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("ignoring malformed build configuration {:?}: {}", path, e);
            None
        }
    }
}

fn collect_from_config(
    root: &Path,
    config: &BuildConfig,
    excluded_dirs: &[String],
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for file in &config.files {
        let path = root.join(file);
        if !path.is_file() {
            warn!("declared source file missing: {:?}", path);
            continue;
        }
        if is_source_file(&path) && !has_excluded_segment(&path, root, excluded_dirs) {
            paths.push(path);
        }
    }

    if !config.include.is_empty() {
        let include = build_globset(config.include.iter().map(|p| normalize_pattern(p)));
        let exclude = build_globset(config.exclude.iter().map(|p| normalize_pattern(p)));
        paths.extend(walk_sources(root, excluded_dirs, include, exclude));
    }

    Ok(paths)
}

/// Bare directory entries in `include` mean everything beneath them.
fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim_end_matches('/');
    let has_meta = trimmed.contains('*') || trimmed.contains('?') || trimmed.contains('[');
    let has_extension = Path::new(trimmed).extension().is_some();
    if !has_meta && !has_extension {
        format!("{}/**/*", trimmed)
    } else {
        trimmed.to_string()
    }
}

fn build_globset<I: IntoIterator<Item = String>>(patterns: I) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = false;
    for pattern in patterns {
        match Glob::new(&pattern) {
            Ok(glob) => {
                builder.add(glob);
                added = true;
            }
            Err(e) => warn!("invalid glob pattern '{}': {}", pattern, e),
        }
    }
    if added {
        builder.build().ok()
    } else {
        None
    }
}

fn walk_sources(
    root: &Path,
    excluded_dirs: &[String],
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
) -> Vec<PathBuf> {
    let excluded: Vec<String> = excluded_dirs.to_vec();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .filter_entry(move |entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !excluded.iter().any(|d| d == name))
                .unwrap_or(true)
        })
        .build();

    let mut paths = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("walker error: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() || !is_source_file(path) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if let Some(ref set) = include {
            if !set.is_match(relative) {
                continue;
            }
        }
        if let Some(ref set) = exclude {
            if set.is_match(relative) {
                continue;
            }
        }
        paths.push(path.to_path_buf());
    }
    paths
}

fn has_excluded_segment(path: &Path, root: &Path, excluded_dirs: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| excluded_dirs.iter().any(|d| d == s))
            .unwrap_or(false)
    })
}
