//! The `str_replace_editor` tool: view, create, and edit files on the
//! controlled machine, with per-path undo history.

use super::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Context lines shown around an edit in the result snippet.
const SNIPPET_CONTEXT: usize = 3;

#[derive(Default)]
pub struct EditorTool {
    /// Previous file contents, pushed before each mutating edit.
    history: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl EditorTool {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate_path(&self, command: &str, path: &Path) -> Result<(), String> {
        if !path.is_absolute() {
            let suggested = std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf());
            return Err(format!(
                "The path {} is not an absolute path. Did you mean {}?",
                path.display(),
                suggested.display()
            ));
        }
        if !path.exists() && command != "create" {
            return Err(format!("The path {} does not exist", path.display()));
        }
        if path.exists() && command == "create" {
            return Err(format!("File already exists at {}", path.display()));
        }
        if path.is_dir() && command != "view" {
            return Err(format!(
                "The path {} is a directory. Only the 'view' command can be used on directories",
                path.display()
            ));
        }
        Ok(())
    }

    fn view(&self, path: &Path, view_range: Option<&Value>) -> Result<ToolResult, String> {
        if path.is_dir() {
            if view_range.is_some() {
                return Err(
                    "The 'view_range' parameter cannot be used when viewing a directory".into(),
                );
            }
            let entries = fs::read_dir(path)
                .map_err(|e| format!("Failed to list directory contents: {e}"))?;
            let mut names: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            let listing = names
                .iter()
                .enumerate()
                .map(|(i, name)| format!("{}. {name}", i + 1))
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(ToolResult::output(format!(
                "Contents of directory {}:\n\n{listing}",
                path.display()
            )));
        }

        let content = read_file(path)?;
        let lines: Vec<&str> = content.split('\n').collect();
        let line_count = lines.len();

        let (start, end) = match view_range {
            None => (1, line_count as i64),
            Some(range) => {
                let pair = range
                    .as_array()
                    .filter(|a| a.len() == 2 && a.iter().all(|v| v.is_i64()))
                    .ok_or("Invalid 'view_range'. It should be a list of two integers")?;
                let start = pair[0].as_i64().unwrap();
                let end = pair[1].as_i64().unwrap();
                if start < 1 || start > line_count as i64 {
                    return Err(format!(
                        "Invalid 'view_range': Start line {start} is out of range (1-{line_count})"
                    ));
                }
                if end != -1 && (end < start || end > line_count as i64) {
                    return Err(format!(
                        "Invalid 'view_range': End line {end} is out of range ({start}-{line_count})"
                    ));
                }
                (start, end)
            }
        };

        let last = if end == -1 { line_count } else { end as usize };
        let numbered = lines[(start as usize - 1)..last]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:4} | {line}", i + start as usize))
            .collect::<Vec<_>>()
            .join("\n");
        let output = if view_range.is_some() {
            format!("File: {} (lines {start}-{last}):\n\n{numbered}", path.display())
        } else {
            format!("File: {}:\n\n{numbered}", path.display())
        };
        Ok(ToolResult::output(output))
    }

    fn create(&self, path: &Path, file_text: &str) -> Result<ToolResult, String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create file: {e}"))?;
        }
        write_file(path, file_text)?;
        Ok(ToolResult::output(format!(
            "File created successfully at: {}",
            path.display()
        )))
    }

    fn str_replace(
        &self,
        path: &Path,
        old_str: &str,
        new_str: &str,
    ) -> Result<ToolResult, String> {
        let content = read_file(path)?;

        let occurrences = content.matches(old_str).count();
        if occurrences == 0 {
            return Err(format!(
                "No replacements made: '{old_str}' not found in {}",
                path.display()
            ));
        }
        if occurrences > 1 {
            let matching_lines: Vec<usize> = content
                .split('\n')
                .enumerate()
                .filter(|(_, line)| line.contains(old_str))
                .map(|(i, _)| i + 1)
                .collect();
            return Err(format!(
                "Multiple occurrences of '{old_str}' found in lines {matching_lines:?}. \
                 Please make sure it is unique."
            ));
        }

        self.push_history(path, &content);

        let new_content = content.replacen(old_str, new_str, 1);
        write_file(path, &new_content)?;

        let line_num = content.split(old_str).next().unwrap_or("").matches('\n').count() + 1;
        Ok(ToolResult::output(format!(
            "File {} has been edited. Here's a snippet of the result:\n\n{}",
            path.display(),
            snippet(&new_content, line_num.saturating_sub(SNIPPET_CONTEXT + 1), line_num + SNIPPET_CONTEXT)
        )))
    }

    fn insert(&self, path: &Path, insert_line: i64, new_str: &str) -> Result<ToolResult, String> {
        let content = read_file(path)?;
        let lines: Vec<&str> = content.split('\n').collect();

        if insert_line < 0 || insert_line > lines.len() as i64 {
            return Err(format!(
                "Invalid 'insert_line' parameter: {insert_line}. Should be between 0 and {}",
                lines.len()
            ));
        }
        let anchor = insert_line as usize;

        self.push_history(path, &content);

        let new_lines: Vec<&str> = new_str.split('\n').collect();
        let mut result_lines: Vec<&str> = Vec::with_capacity(lines.len() + new_lines.len());
        result_lines.extend_from_slice(&lines[..anchor]);
        result_lines.extend_from_slice(&new_lines);
        result_lines.extend_from_slice(&lines[anchor..]);
        let new_content = result_lines.join("\n");
        write_file(path, &new_content)?;

        Ok(ToolResult::output(format!(
            "File {} has been edited. Here's a snippet of the result:\n\n{}",
            path.display(),
            snippet(
                &new_content,
                anchor.saturating_sub(SNIPPET_CONTEXT),
                anchor + new_lines.len() + SNIPPET_CONTEXT
            )
        )))
    }

    fn undo_edit(&self, path: &Path) -> Result<ToolResult, String> {
        let previous = {
            let mut history = self.history.lock().expect("editor history poisoned");
            history.get_mut(path).and_then(|stack| stack.pop())
        };
        let Some(previous) = previous else {
            return Err(format!("No edit history found for {}", path.display()));
        };
        write_file(path, &previous)?;

        let lines: Vec<&str> = previous.split('\n').collect();
        let mut preview = lines
            .iter()
            .take(10)
            .enumerate()
            .map(|(i, line)| format!("{:4} | {line}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        if lines.len() > 10 {
            preview.push_str("\n... (file continues)");
        }
        Ok(ToolResult::output(format!(
            "Last edit to {} undone successfully. Here's a preview:\n\n{preview}",
            path.display()
        )))
    }

    fn push_history(&self, path: &Path, content: &str) {
        let mut history = self.history.lock().expect("editor history poisoned");
        history
            .entry(path.to_path_buf())
            .or_default()
            .push(content.to_string());
    }
}

#[async_trait]
impl Tool for EditorTool {
    fn name(&self) -> &'static str {
        "str_replace_editor"
    }

    fn api_params(&self) -> Value {
        json!({
            "type": "text_editor_20250124",
            "name": self.name(),
        })
    }

    async fn call(&self, input: Value) -> ToolResult {
        let Some(command) = input.get("command").and_then(|v| v.as_str()) else {
            return ToolResult::error("Missing required 'command' parameter");
        };
        let Some(path) = input.get("path").and_then(|v| v.as_str()) else {
            return ToolResult::error("Missing required 'path' parameter");
        };
        let path = PathBuf::from(path);

        if let Err(message) = self.validate_path(command, &path) {
            return ToolResult::error(message);
        }

        let result = match command {
            "view" => self.view(&path, input.get("view_range")),
            "create" => match input.get("file_text").and_then(|v| v.as_str()) {
                Some(file_text) => self.create(&path, file_text),
                None => Err("Parameter 'file_text' is required for the 'create' command".into()),
            },
            "str_replace" => match input.get("old_str").and_then(|v| v.as_str()) {
                Some(old_str) => {
                    let new_str = input.get("new_str").and_then(|v| v.as_str()).unwrap_or("");
                    self.str_replace(&path, old_str, new_str)
                }
                None => Err("Parameter 'old_str' is required for the 'str_replace' command".into()),
            },
            "insert" => {
                let insert_line = input.get("insert_line").and_then(|v| v.as_i64());
                let new_str = input.get("new_str").and_then(|v| v.as_str());
                match (insert_line, new_str) {
                    (None, _) => {
                        Err("Parameter 'insert_line' is required for the 'insert' command".into())
                    }
                    (_, None) => {
                        Err("Parameter 'new_str' is required for the 'insert' command".into())
                    }
                    (Some(line), Some(text)) => self.insert(&path, line, text),
                }
            }
            "undo_edit" => self.undo_edit(&path),
            other => Err(format!("Unrecognized command: {other}")),
        };

        match result {
            Ok(result) => result,
            Err(message) => ToolResult::error(message),
        }
    }
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read file {}: {e}", path.display()))
}

fn write_file(path: &Path, content: &str) -> Result<(), String> {
    fs::write(path, content).map_err(|e| format!("Failed to write to file {}: {e}", path.display()))
}

/// Render `[start, end)` (0-based line indexes, clamped) with line numbers.
fn snippet(content: &str, start: usize, end: usize) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let end = end.min(lines.len());
    let start = start.min(end);
    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:4} | {line}", i + start + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (EditorTool, TempDir) {
        (EditorTool::new(), tempfile::tempdir().unwrap())
    }

    #[tokio::test]
    async fn create_then_view() {
        let (tool, dir) = setup();
        let path = dir.path().join("notes.txt");
        let result = tool
            .call(json!({
                "command": "create",
                "path": path.to_str().unwrap(),
                "file_text": "alpha\nbeta\ngamma",
            }))
            .await;
        assert!(!result.is_error(), "{:?}", result.error);

        let result = tool
            .call(json!({"command": "view", "path": path.to_str().unwrap()}))
            .await;
        let output = result.output.unwrap();
        assert!(output.contains("   1 | alpha"));
        assert!(output.contains("   3 | gamma"));
    }

    #[tokio::test]
    async fn create_refuses_to_overwrite() {
        let (tool, dir) = setup();
        let path = dir.path().join("exists.txt");
        std::fs::write(&path, "x").unwrap();
        let result = tool
            .call(json!({
                "command": "create",
                "path": path.to_str().unwrap(),
                "file_text": "y",
            }))
            .await;
        assert!(result.error.unwrap().contains("File already exists"));
    }

    #[tokio::test]
    async fn relative_path_is_rejected_with_suggestion() {
        let (tool, _dir) = setup();
        let result = tool
            .call(json!({"command": "view", "path": "relative.txt"}))
            .await;
        let error = result.error.unwrap();
        assert!(error.contains("not an absolute path"));
        assert!(error.contains("Did you mean"));
    }

    #[tokio::test]
    async fn view_range_selects_lines() {
        let (tool, dir) = setup();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "one\ntwo\nthree\nfour").unwrap();
        let result = tool
            .call(json!({
                "command": "view",
                "path": path.to_str().unwrap(),
                "view_range": [2, 3],
            }))
            .await;
        let output = result.output.unwrap();
        assert!(output.contains("   2 | two"));
        assert!(output.contains("   3 | three"));
        assert!(!output.contains("one"));
        assert!(!output.contains("four"));
    }

    #[tokio::test]
    async fn view_range_end_sentinel_reads_to_eof() {
        let (tool, dir) = setup();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "one\ntwo\nthree").unwrap();
        let result = tool
            .call(json!({
                "command": "view",
                "path": path.to_str().unwrap(),
                "view_range": [2, -1],
            }))
            .await;
        let output = result.output.unwrap();
        assert!(output.contains("three"));
        assert!(!output.contains("one"));
    }

    #[tokio::test]
    async fn view_range_out_of_bounds_is_rejected() {
        let (tool, dir) = setup();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "one\ntwo").unwrap();
        let result = tool
            .call(json!({
                "command": "view",
                "path": path.to_str().unwrap(),
                "view_range": [5, 6],
            }))
            .await;
        assert!(result.error.unwrap().contains("out of range"));
    }

    #[tokio::test]
    async fn view_directory_lists_entries() {
        let (tool, dir) = setup();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        let result = tool
            .call(json!({"command": "view", "path": dir.path().to_str().unwrap()}))
            .await;
        let output = result.output.unwrap();
        assert!(output.contains("1. a.txt"));
        assert!(output.contains("2. b.txt"));
    }

    #[tokio::test]
    async fn str_replace_requires_unique_match() {
        let (tool, dir) = setup();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "dup\ndup\nother").unwrap();

        let result = tool
            .call(json!({
                "command": "str_replace",
                "path": path.to_str().unwrap(),
                "old_str": "dup",
                "new_str": "x",
            }))
            .await;
        let error = result.error.unwrap();
        assert!(error.contains("Multiple occurrences"));
        assert!(error.contains("[1, 2]"));

        let result = tool
            .call(json!({
                "command": "str_replace",
                "path": path.to_str().unwrap(),
                "old_str": "missing",
            }))
            .await;
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn str_replace_edits_and_undo_restores() {
        let (tool, dir) = setup();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "hello world").unwrap();

        let result = tool
            .call(json!({
                "command": "str_replace",
                "path": path.to_str().unwrap(),
                "old_str": "world",
                "new_str": "there",
            }))
            .await;
        assert!(!result.is_error());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello there");

        let result = tool
            .call(json!({"command": "undo_edit", "path": path.to_str().unwrap()}))
            .await;
        assert!(!result.is_error());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn insert_places_lines_at_anchor() {
        let (tool, dir) = setup();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "one\nthree").unwrap();

        let result = tool
            .call(json!({
                "command": "insert",
                "path": path.to_str().unwrap(),
                "insert_line": 1,
                "new_str": "two",
            }))
            .await;
        assert!(!result.is_error(), "{:?}", result.error);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn insert_rejects_bad_anchor() {
        let (tool, dir) = setup();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "one").unwrap();
        let result = tool
            .call(json!({
                "command": "insert",
                "path": path.to_str().unwrap(),
                "insert_line": 99,
                "new_str": "x",
            }))
            .await;
        assert!(result.error.unwrap().contains("Invalid 'insert_line'"));
    }

    #[tokio::test]
    async fn undo_without_history_is_an_error() {
        let (tool, dir) = setup();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "x").unwrap();
        let result = tool
            .call(json!({"command": "undo_edit", "path": path.to_str().unwrap()}))
            .await;
        assert!(result.error.unwrap().contains("No edit history"));
    }
}
