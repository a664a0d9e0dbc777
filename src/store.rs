use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Reads a JSON document, treating a missing or blank file as `T::default()`.
pub fn load_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut rendered = serde_json::to_string_pretty(value).context("failed to serialize JSON")?;
    rendered.push('\n');
    Ok(rendered)
}

/// Writes `value` unless the file already holds the same rendering. Returns whether it wrote.
pub fn save_json_if_changed<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<bool> {
    let rendered = render_json(value)?;
    write_if_changed(path, &rendered)
}

pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if let Ok(existing) = fs::read_to_string(path)
        && existing == contents
    {
        return Ok(false);
    }
    write_atomic(path, contents)?;
    Ok(true)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_blank_files_load_as_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing: Vec<u32> = load_json(&dir.path().join("nope.json")).expect("load");
        assert!(missing.is_empty());

        let blank = dir.path().join("blank.json");
        fs::write(&blank, "  \n").expect("write");
        let loaded: Vec<u32> = load_json(&blank).expect("load");
        assert!(loaded.is_empty());
    }

    #[test]
    fn skips_rewrite_when_content_is_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("data.json");

        assert!(save_json_if_changed(&path, &vec![1, 2, 3]).expect("first save"));
        assert!(!save_json_if_changed(&path, &vec![1, 2, 3]).expect("second save"));
        assert!(save_json_if_changed(&path, &vec![1, 2]).expect("third save"));

        let loaded: Vec<u32> = load_json(&path).expect("load");
        assert_eq!(loaded, vec![1, 2]);
        assert!(!dir.path().join("nested").join("data.json.tmp").exists());
    }

    #[test]
    fn malformed_json_is_an_error_with_path_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").expect("write");

        let err = load_json::<Vec<u32>>(&path).expect_err("should fail");
        assert!(format!("{err:#}").contains("broken.json"));
    }
}
