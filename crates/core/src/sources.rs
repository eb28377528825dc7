//! Source glob resolution
//!
//! Turns a task's glob patterns into concrete [`SourceFile`]s. Each pattern
//! is walked from its glob base (the leading path components without glob
//! metacharacters), so `src/scss/**/*.scss` only visits `src/scss`. Matched
//! files keep their path relative to that base, which is what actions use to
//! mirror the source layout under a destination directory.
//!
//! Patterns starting with `!` exclude files matched by the other patterns.

use std::collections::{HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

use conveyor_action_protocol::SourceFile;
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::types::{ConveyorError, ConveyorResult};

const GLOB_META: &[char] = &['*', '?', '[', '{'];
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules"];

/// Compile a single pattern with path-aware semantics: `*` does not cross `/`.
pub fn compile_pattern(pattern: &str) -> ConveyorResult<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| ConveyorError::Config(format!("Invalid glob pattern '{}': {}", pattern, e)))
}

/// Compile several patterns into one set.
pub fn compile_pattern_set<S: AsRef<str>>(patterns: &[S]) -> ConveyorResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                ConveyorError::Config(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConveyorError::Config(format!("Invalid glob patterns: {}", e)))
}

/// The leading components of `pattern` that contain no glob metacharacters.
///
/// A pattern without any metacharacters names a single file; its base is the
/// containing directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let mut saw_meta = false;

    for component in path.components() {
        if component.as_os_str().to_string_lossy().contains(GLOB_META) {
            saw_meta = true;
            break;
        }
        base.push(component.as_os_str());
    }

    if !saw_meta {
        base.pop();
    }
    base
}

/// How many directory levels below the base a pattern can reach, or `None`
/// when it contains `**`.
fn max_depth(pattern: &str, base: &Path) -> Option<usize> {
    if pattern.contains("**") {
        return None;
    }
    let total = Path::new(pattern)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .count();
    let base_len = base
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .count();
    Some(total.saturating_sub(base_len))
}

/// Resolve `patterns` against `root` into a stable, de-duplicated file list.
///
/// Files are ordered by pattern, then by path. A file matched by several
/// patterns is reported once, relative to the first pattern that matched it.
pub fn resolve_sources(root: &Path, patterns: &[String]) -> ConveyorResult<Vec<SourceFile>> {
    let (negated, positive): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|p| p.starts_with('!'));
    let excluded = compile_pattern_set(
        &negated
            .iter()
            .map(|p| p.trim_start_matches('!'))
            .collect::<Vec<_>>(),
    )?;

    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for pattern in positive {
        let matcher = compile_pattern(pattern)?;
        let base = glob_base(pattern);
        let base_dir = root.join(&base);
        let depth_limit = max_depth(pattern, &base);

        let mut matched = Vec::new();
        walk_files(&base_dir, depth_limit, &mut |path: &Path| {
            let candidate = if Path::new(pattern.as_str()).is_absolute() {
                path.to_path_buf()
            } else {
                path.strip_prefix(root).unwrap_or(path).to_path_buf()
            };
            if matcher.is_match(&candidate) && !excluded.is_match(&candidate) {
                matched.push(path.to_path_buf());
            }
        })?;
        matched.sort();

        for path in matched {
            if !seen.insert(path.clone()) {
                continue;
            }
            let relative = path
                .strip_prefix(&base_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
            sources.push(SourceFile::new(path, relative));
        }
    }

    Ok(sources)
}

/// Breadth-first walk below `dir`, calling `visit` for every file.
///
/// Symlinked files are visited; symlinked directories are not descended into.
fn walk_files(
    dir: &Path,
    depth_limit: Option<usize>,
    visit: &mut dyn FnMut(&Path),
) -> ConveyorResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    let mut queue = VecDeque::new();
    queue.push_back((dir.to_path_buf(), 1usize));

    while let Some((current_dir, depth)) = queue.pop_front() {
        for entry in std::fs::read_dir(&current_dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                let skipped = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name));
                let within_limit = depth_limit.map_or(true, |limit| depth < limit);
                if !skipped && within_limit {
                    queue.push_back((path, depth + 1));
                }
            } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
                visit(&path);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, relative).unwrap();
    }

    fn relatives(sources: &[SourceFile]) -> Vec<String> {
        sources
            .iter()
            .map(|s| s.relative.display().to_string())
            .collect()
    }

    #[test]
    fn glob_base_stops_at_first_metacharacter() {
        assert_eq!(glob_base("src/scss/**/*.scss"), PathBuf::from("src/scss"));
        assert_eq!(glob_base("src/*.{html,htm}"), PathBuf::from("src"));
        assert_eq!(glob_base("img/*.png"), PathBuf::from("img"));
        assert_eq!(glob_base("*.css"), PathBuf::new());
        assert_eq!(glob_base("src/index.html"), PathBuf::from("src"));
    }

    #[test]
    fn single_star_does_not_descend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        touch(root, "src/index.html");
        touch(root, "src/about.htm");
        touch(root, "src/partials/nav.html");

        let sources = resolve_sources(root, &["src/*.{html,htm}".to_string()]).unwrap();
        assert_eq!(relatives(&sources), vec!["about.htm", "index.html"]);
    }

    #[test]
    fn double_star_keeps_nested_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        touch(root, "src/scss/main.scss");
        touch(root, "src/scss/parts/nav.scss");
        touch(root, "src/scss/parts/readme.md");

        let sources = resolve_sources(root, &["src/scss/**/*.scss".to_string()]).unwrap();
        assert_eq!(relatives(&sources), vec!["main.scss", "parts/nav.scss"]);
        assert!(sources[1].path.ends_with("src/scss/parts/nav.scss"));
    }

    #[test]
    fn negated_patterns_exclude_and_duplicates_collapse() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        touch(root, "src/js/app.js");
        touch(root, "src/js/vendor.min.js");

        let patterns = vec![
            "src/js/*.js".to_string(),
            "src/js/app.js".to_string(),
            "!src/js/*.min.js".to_string(),
        ];
        let sources = resolve_sources(root, &patterns).unwrap();
        assert_eq!(relatives(&sources), vec!["app.js"]);
    }

    #[test]
    fn missing_base_directory_yields_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sources = resolve_sources(temp_dir.path(), &["img/*.png".to_string()]).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = resolve_sources(temp_dir.path(), &["src/[".to_string()]).unwrap_err();
        assert!(matches!(err, ConveyorError::Config(_)));
    }

    #[cfg(unix)]
    #[test]
    fn directory_symlink_loops_are_not_followed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        touch(root, "src/img/logo.svg");
        std::os::unix::fs::symlink(root.join("src/img"), root.join("src/img/loop")).unwrap();

        let sources = resolve_sources(root, &["src/img/**/*.svg".to_string()]).unwrap();
        assert_eq!(relatives(&sources), vec!["logo.svg"]);
    }
}
