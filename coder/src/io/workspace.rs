//! File tools confined to one working-directory root.
//!
//! Paths from the model are resolved lexically against the root. Absolute
//! paths outside the root and `..` segments that climb above it are rejected
//! before any filesystem access. The deepest existing ancestor of the result
//! is then canonicalized, so a symlink inside the root cannot lead outside it.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tracing::{debug, instrument};
use walkdir::{DirEntry, WalkDir};

/// Extensions searched by `grep_search`.
const SEARCHABLE_EXTENSIONS: &[&str] = &[
    "py", "rs", "js", "jsx", "ts", "tsx", "html", "css", "json", "toml", "md", "yaml", "yml",
    "sql", "sh", "txt",
];
/// Directories never descended into by `grep_search`.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "__pycache__", "dist", "build"];
const MAX_GREP_MATCHES: usize = 200;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path to a location inside the root.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf> {
        let raw = raw.trim();
        let path = Path::new(raw);
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map_err(|_| anyhow!("path '{raw}' is outside the working directory"))?
        } else {
            path
        };

        let mut resolved = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    if !resolved.pop() {
                        bail!("path '{raw}' escapes the working directory");
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    bail!("path '{raw}' is outside the working directory");
                }
            }
        }
        let full = self.root.join(resolved);
        self.confine(raw, &full)?;
        Ok(full)
    }

    /// Workspace-relative form of a model-supplied path, with `.` segments,
    /// repeated separators and absolute prefixes inside the root removed.
    pub fn relative(&self, raw: &str) -> Result<String> {
        Ok(self.display_path(&self.resolve(raw)?))
    }

    /// Reject `full` when its deepest existing ancestor, symlinks followed,
    /// lies outside the canonical root.
    fn confine(&self, raw: &str, full: &Path) -> Result<()> {
        let root = self
            .root
            .canonicalize()
            .with_context(|| format!("resolve working directory {}", self.root.display()))?;
        let Some(existing) = full
            .ancestors()
            .find(|ancestor| fs::symlink_metadata(ancestor).is_ok())
        else {
            return Ok(());
        };
        // Dangling links fail here too.
        let real = existing
            .canonicalize()
            .with_context(|| format!("resolve '{raw}'"))?;
        if !real.starts_with(&root) {
            bail!("path '{raw}' resolves outside the working directory");
        }
        Ok(())
    }

    /// Path relative to the root, for display.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    #[instrument(skip(self))]
    pub fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).with_context(|| format!("read {path}"))
    }

    #[instrument(skip(self, contents), fields(bytes = contents.len()))]
    pub fn write_file(&self, path: &str, contents: &str) -> Result<String> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&full, contents).with_context(|| format!("write {path}"))?;
        debug!(path, "file written");
        Ok(format!(
            "Successfully wrote {} characters to {path}",
            contents.chars().count()
        ))
    }

    /// Replace the 1-based inclusive `line_range` (`"5"` or `"5:10"`) with `new_text`.
    ///
    /// A range starting past the end appends.
    #[instrument(skip(self, new_text))]
    pub fn edit_file(&self, path: &str, line_range: &str, new_text: &str) -> Result<String> {
        let (start, end) = parse_line_range(line_range)?;
        let full = self.resolve(path)?;
        let original = fs::read_to_string(&full).with_context(|| format!("read {path}"))?;
        let mut lines: Vec<String> = original.split_inclusive('\n').map(str::to_string).collect();

        if let Some(last) = lines.last_mut()
            && !last.ends_with('\n')
        {
            last.push('\n');
        }
        let mut replacement = new_text.to_string();
        if !replacement.ends_with('\n') {
            replacement.push('\n');
        }

        let start_idx = (start - 1).min(lines.len());
        let end_idx = end.min(lines.len()).max(start_idx);
        lines.drain(start_idx..end_idx);
        lines.insert(start_idx, replacement);

        fs::write(&full, lines.concat()).with_context(|| format!("write {path}"))?;
        Ok(format!("Successfully edited {path} (lines {line_range})"))
    }

    #[instrument(skip(self))]
    pub fn list_dir(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        let mut entries: Vec<(bool, String)> = fs::read_dir(&full)
            .with_context(|| format!("list {path}"))?
            .map(|entry| -> Result<(bool, String)> {
                let entry = entry.with_context(|| format!("read entry in {path}"))?;
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                Ok((is_dir, entry.file_name().to_string_lossy().into_owned()))
            })
            .collect::<Result<_>>()?;
        if entries.is_empty() {
            return Ok("No files found".to_string());
        }
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        let lines: Vec<String> = entries
            .into_iter()
            .map(|(is_dir, name)| {
                if is_dir {
                    format!("[DIR]  {name}")
                } else {
                    format!("[FILE] {name}")
                }
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Regex search over source files; an invalid regex is searched literally.
    #[instrument(skip(self))]
    pub fn grep_search(&self, pattern: &str, path: &str) -> Result<String> {
        let base = self.resolve(path)?;
        if !base.exists() {
            bail!("path '{path}' does not exist");
        }
        let regex = Regex::new(pattern)
            .or_else(|_| Regex::new(&regex::escape(pattern)))
            .with_context(|| format!("compile pattern {pattern}"))?;

        let mut matches = Vec::new();
        let walker = WalkDir::new(&base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));
        'files: for entry in walker.filter_map(|entry| entry.ok()) {
            if !entry.file_type().is_file() || !is_searchable(entry.path()) {
                continue;
            }
            let Ok(contents) = fs::read_to_string(entry.path()) else {
                continue;
            };
            let display = self.display_path(entry.path());
            for (index, line) in contents.lines().enumerate() {
                if regex.is_match(line) {
                    if matches.len() == MAX_GREP_MATCHES {
                        matches.push(format!("[... truncated at {MAX_GREP_MATCHES} matches]"));
                        break 'files;
                    }
                    matches.push(format!("{display}:{}:{}", index + 1, line.trim_end()));
                }
            }
        }

        if matches.is_empty() {
            Ok("No matches found".to_string())
        } else {
            Ok(matches.join("\n"))
        }
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()))
}

fn is_searchable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SEARCHABLE_EXTENSIONS.contains(&ext))
}

fn parse_line_range(raw: &str) -> Result<(usize, usize)> {
    let invalid = || anyhow!("invalid line range '{raw}': expected \"N\" or \"N:M\" (1-based)");
    let parse = |part: &str| part.trim().parse::<usize>().map_err(|_| invalid());
    let (start, end) = match raw.split_once(':') {
        Some((start, end)) => (parse(start)?, parse(end)?),
        None => {
            let line = parse(raw)?;
            (line, line)
        }
    };
    if start == 0 || end < start {
        return Err(invalid());
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::new(temp.path());
        (temp, ws)
    }

    #[test]
    fn write_creates_parents_and_reports_characters() {
        let (_temp, ws) = workspace();
        let message = ws.write_file("src/app/main.py", "héllo").expect("write");
        assert_eq!(message, "Successfully wrote 5 characters to src/app/main.py");
        assert_eq!(ws.read_file("src/app/main.py").expect("read"), "héllo");
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let (_temp, ws) = workspace();
        assert!(ws.resolve("../outside.txt").is_err());
        assert!(ws.resolve("a/../../outside.txt").is_err());
        assert!(ws.resolve("/etc/passwd").is_err());
        assert!(ws.write_file("../x.txt", "nope").is_err());
        assert_eq!(ws.resolve("a/./b/../c.txt").expect("inside"), ws.root().join("a/c.txt"));
    }

    #[test]
    fn absolute_paths_inside_root_are_accepted() {
        let (_temp, ws) = workspace();
        let inside = ws.root().join("notes.txt");
        let resolved = ws.resolve(&inside.display().to_string()).expect("inside");
        assert_eq!(resolved, inside);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_cannot_lead_outside_the_root() {
        let (_temp, ws) = workspace();
        let outside = tempfile::tempdir().expect("outside");
        fs::write(outside.path().join("secret.txt"), "s3cret").expect("seed");
        std::os::unix::fs::symlink(outside.path(), ws.root().join("link")).expect("dir link");
        std::os::unix::fs::symlink(outside.path().join("new.txt"), ws.root().join("dangling"))
            .expect("dangling link");

        assert!(ws.read_file("link/secret.txt").is_err());
        assert!(ws.write_file("link/planted.txt", "x").is_err());
        assert!(ws.write_file("link/deeper/planted.txt", "x").is_err());
        assert!(ws.write_file("dangling", "x").is_err());
        assert!(ws.list_dir("link").is_err());
        assert!(!outside.path().join("planted.txt").exists());
        assert!(!outside.path().join("deeper").exists());
        assert!(!outside.path().join("new.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_within_the_root_still_resolve() {
        let (_temp, ws) = workspace();
        ws.write_file("real/a.txt", "inside").expect("write");
        std::os::unix::fs::symlink(ws.root().join("real"), ws.root().join("alias")).expect("link");
        assert_eq!(ws.read_file("alias/a.txt").expect("read"), "inside");
    }

    #[test]
    fn relative_paths_are_normalized() {
        let (_temp, ws) = workspace();
        let absolute = ws.root().join("src/a.py").display().to_string();
        for raw in ["src/a.py", "./src/a.py", "src//a.py", "src/./a.py", absolute.as_str()] {
            assert_eq!(ws.relative(raw).expect("relative"), "src/a.py", "{raw}");
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let (_temp, ws) = workspace();
        let err = ws.read_file("absent.txt").expect_err("missing");
        assert!(format!("{err:#}").starts_with("read absent.txt"));
    }

    #[test]
    fn edit_replaces_single_line_and_ranges() {
        let (_temp, ws) = workspace();
        ws.write_file("f.txt", "one\ntwo\nthree\nfour").expect("write");
        ws.edit_file("f.txt", "2", "TWO").expect("edit");
        assert_eq!(ws.read_file("f.txt").expect("read"), "one\nTWO\nthree\nfour\n");
        ws.edit_file("f.txt", "3:4", "tail").expect("edit");
        assert_eq!(ws.read_file("f.txt").expect("read"), "one\nTWO\ntail\n");
    }

    #[test]
    fn edit_past_end_appends() {
        let (_temp, ws) = workspace();
        ws.write_file("f.txt", "a\n").expect("write");
        ws.edit_file("f.txt", "9", "b").expect("edit");
        assert_eq!(ws.read_file("f.txt").expect("read"), "a\nb\n");
    }

    #[test]
    fn edit_rejects_bad_ranges() {
        let (_temp, ws) = workspace();
        ws.write_file("f.txt", "a\n").expect("write");
        assert!(ws.edit_file("f.txt", "0", "x").is_err());
        assert!(ws.edit_file("f.txt", "4:2", "x").is_err());
        assert!(ws.edit_file("f.txt", "two", "x").is_err());
    }

    #[test]
    fn list_dir_marks_directories_and_sorts() {
        let (_temp, ws) = workspace();
        assert_eq!(ws.list_dir(".").expect("list"), "No files found");
        ws.write_file("b.txt", "").expect("write");
        ws.write_file("a/inner.txt", "").expect("write");
        assert_eq!(ws.list_dir(".").expect("list"), "[DIR]  a\n[FILE] b.txt");
    }

    #[test]
    fn grep_reports_path_line_and_text() {
        let (_temp, ws) = workspace();
        ws.write_file("src/app.py", "import os\ndef main():\n    pass\n").expect("write");
        ws.write_file("node_modules/lib.js", "def main").expect("write");
        ws.write_file("image.png", "def main").expect("write");
        assert_eq!(
            ws.grep_search(r"def \w+", ".").expect("grep"),
            "src/app.py:2:def main():"
        );
        assert_eq!(ws.grep_search("missing", ".").expect("grep"), "No matches found");
    }

    #[test]
    fn grep_falls_back_to_literal_for_invalid_regex() {
        let (_temp, ws) = workspace();
        ws.write_file("a.py", "call(\n").expect("write");
        assert_eq!(ws.grep_search("call(", ".").expect("grep"), "a.py:1:call(");
    }
}
