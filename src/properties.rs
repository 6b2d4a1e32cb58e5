//! Line-preserving edits of flat `key=value` files such as `server.properties`.
//!
//! Comments, blank lines and anything that is not a property line are written
//! back untouched and in their original position.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};

pub const LEVEL_NAME: &str = "level-name";
pub const SERVER_PORT: &str = "server-port";
pub const QUERY_PORT: &str = "query.port";

pub const DEFAULT_LEVEL_NAME: &str = "world";
pub const DEFAULT_SERVER_PORT: &str = "25565";

/// Rewrite every property line whose key is in `replacements` as `key=value`.
/// Only the first occurrence of a key is rewritten. Returns the keys that did
/// not match any line; they are not appended to the file.
pub fn modify(path: &Path, replacements: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;

    let mut remaining = replacements.clone();
    let mut lines: Vec<String> = Vec::new();
    for line in content.lines() {
        let replaced = split_line(line)
            .and_then(|(key, _)| remaining.remove_entry(key))
            .map(|(key, value)| format!("{key}={value}"));
        lines.push(replaced.unwrap_or_else(|| line.to_string()));
    }

    let mut output = String::with_capacity(content.len());
    for line in &lines {
        output.push_str(line);
        output.push('\n');
    }
    std::fs::write(path, output)
        .map_err(|e| Error::io(format!("failed to write {}", path.display()), e))?;

    for (key, value) in &remaining {
        tracing::warn!("property not used: {key} ({value})");
    }

    Ok(remaining)
}

/// Read the values of `keys` without modifying the file. The first
/// occurrence of a key wins; keys without a line map to `None`.
pub fn read(path: &Path, keys: &[&str]) -> Result<BTreeMap<String, Option<String>>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;

    let mut values: BTreeMap<String, Option<String>> =
        keys.iter().map(|k| (k.to_string(), None)).collect();
    for (key, value) in content.lines().filter_map(split_line) {
        if let Some(slot) = values.get_mut(key) {
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
    }

    Ok(values)
}

/// Turn `key=value` command line arguments into a replacement map.
/// Malformed and duplicate arguments are skipped with a warning.
pub fn parse_overrides(args: &[String]) -> BTreeMap<String, String> {
    let mut overrides = BTreeMap::new();
    let mut seen = HashSet::new();

    for arg in args {
        let Some((key, value)) = arg.split_once('=').filter(|(k, _)| !k.trim().is_empty()) else {
            tracing::warn!("{}", Error::InvalidProperty(arg.clone()));
            continue;
        };
        let key = key.trim();
        if !seen.insert(key.to_string()) {
            tracing::warn!("duplicate property: '{key}' (value: '{value}')");
            continue;
        }
        overrides.insert(key.to_string(), value.to_string());
    }

    overrides
}

/// Split a property line into key and value. Comments, blank lines and lines
/// without `=` are not property lines.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    Some((key.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "#Minecraft server properties\n\
                          #Sat Jan 01 00:00:00 UTC 2000\n\
                          \n\
                          level-name=world\n\
                          motd=A Minecraft Server\n\
                          not a property\n\
                          server-port=25565\n\
                          # server-port=1\n\
                          level-name=shadow\n";

    fn sample_file(content: &str) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("server.properties");
        std::fs::write(&path, content).unwrap();
        (temp, path)
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_replacements_leave_file_identical() {
        let (_temp, path) = sample_file(SAMPLE);
        let unused = modify(&path, &BTreeMap::new()).unwrap();

        assert!(unused.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);
    }

    #[test]
    fn replaced_keys_keep_their_position() {
        let (_temp, path) = sample_file(SAMPLE);
        let unused = modify(&path, &map(&[("server-port", "25570"), ("motd", "hi")])).unwrap();
        assert!(unused.is_empty());

        let after = std::fs::read_to_string(&path).unwrap();
        let before_lines: Vec<_> = SAMPLE.lines().collect();
        let after_lines: Vec<_> = after.lines().collect();
        assert_eq!(before_lines.len(), after_lines.len());
        assert_eq!(after_lines[4], "motd=hi");
        assert_eq!(after_lines[6], "server-port=25570");
        for (i, line) in before_lines.iter().enumerate() {
            if i != 4 && i != 6 {
                assert_eq!(after_lines[i], *line);
            }
        }
    }

    #[test]
    fn only_first_duplicate_is_rewritten() {
        let (_temp, path) = sample_file(SAMPLE);
        modify(&path, &map(&[("level-name", "survival")])).unwrap();

        let after = std::fs::read_to_string(&path).unwrap();
        assert_eq!(after.matches("level-name=survival").count(), 1);
        assert!(after.contains("level-name=shadow\n"));
    }

    #[test]
    fn commented_keys_do_not_match() {
        let (_temp, path) = sample_file("# server-port=1\n");
        let unused = modify(&path, &map(&[("server-port", "2")])).unwrap();

        assert_eq!(unused, map(&[("server-port", "2")]));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# server-port=1\n");
    }

    #[test]
    fn unused_keys_are_reported_not_appended() {
        let (_temp, path) = sample_file(SAMPLE);
        let unused = modify(&path, &map(&[("difficulty", "hard"), ("motd", "x")])).unwrap();

        assert_eq!(unused, map(&[("difficulty", "hard")]));
        assert!(!std::fs::read_to_string(&path).unwrap().contains("difficulty"));
    }

    #[test]
    fn indented_property_line_is_rewritten_normalized() {
        let (_temp, path) = sample_file("  motd = old\nother=1");
        modify(&path, &map(&[("motd", "new")])).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "motd=new\nother=1\n");
    }

    #[test]
    fn read_returns_first_occurrence_and_absent_keys() {
        let (_temp, path) = sample_file(SAMPLE);
        let values = read(&path, &[LEVEL_NAME, SERVER_PORT, QUERY_PORT]).unwrap();

        assert_eq!(values[LEVEL_NAME].as_deref(), Some("world"));
        assert_eq!(values[SERVER_PORT].as_deref(), Some("25565"));
        assert_eq!(values[QUERY_PORT], None);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);
    }

    #[test]
    fn read_trims_spaced_values() {
        let (_temp, path) = sample_file("server-port = 25565 \nlevel-name= hub\n");
        let values = read(&path, &[SERVER_PORT, LEVEL_NAME]).unwrap();

        assert_eq!(values[SERVER_PORT].as_deref(), Some("25565"));
        assert_eq!(values[LEVEL_NAME].as_deref(), Some("hub"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        let err = modify(&temp.path().join("nope"), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn parse_overrides_skips_malformed_and_duplicates() {
        let args = vec![
            "level-name=hub".to_string(),
            "garbage".to_string(),
            "=value".to_string(),
            "level-name=other".to_string(),
            "motd=a=b".to_string(),
        ];
        let overrides = parse_overrides(&args);

        assert_eq!(overrides, map(&[("level-name", "hub"), ("motd", "a=b")]));
    }
}
