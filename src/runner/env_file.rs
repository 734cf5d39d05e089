use std::collections::BTreeMap;
use std::path::Path;

/// Loaded in this order; later files override earlier ones.
pub const ENV_FILES: &[&str] = &[".env", ".env.local", ".env.test", ".env.test.local"];

/// Merge every `.env`-style file present in `workspace_root`. Unreadable files
/// are skipped.
pub fn load_env_files(workspace_root: &Path) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for name in ENV_FILES {
        let path = workspace_root.join(name);
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => vars.extend(parse_env_file(&content)),
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    vars
}

/// `KEY=value` lines. Blank lines and `#` comments are ignored, an `export `
/// prefix is allowed, and one layer of matching quotes is stripped.
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    vars
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_lines() {
        let vars = parse_env_file(
            "# comment\n\nBASE_URL=http://localhost:3000\nexport TOKEN='abc=def'\nNAME = \"Jane Doe\"\n=orphan\nnot a pair\nEMPTY=\n",
        );
        assert_eq!(vars.get("BASE_URL").map(String::as_str), Some("http://localhost:3000"));
        assert_eq!(vars.get("TOKEN").map(String::as_str), Some("abc=def"));
        assert_eq!(vars.get("NAME").map(String::as_str), Some("Jane Doe"));
        assert_eq!(vars.get("EMPTY").map(String::as_str), Some(""));
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_mismatched_quotes_kept() {
        let vars = parse_env_file("A=\"open\nB='x\"\nC=\"\n");
        assert_eq!(vars["A"], "\"open");
        assert_eq!(vars["B"], "'x\"");
        assert_eq!(vars["C"], "\"");
    }

    #[test]
    fn test_later_files_override() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "API=prod\nONLY_BASE=1\n").unwrap();
        std::fs::write(dir.path().join(".env.local"), "API=local\n").unwrap();
        std::fs::write(dir.path().join(".env.test.local"), "API=test-local\nEXTRA=yes\n").unwrap();

        let vars = load_env_files(dir.path());
        assert_eq!(vars["API"], "test-local");
        assert_eq!(vars["ONLY_BASE"], "1");
        assert_eq!(vars["EXTRA"], "yes");
    }

    #[test]
    fn test_no_files() {
        let dir = tempdir().unwrap();
        assert!(load_env_files(dir.path()).is_empty());
    }
}
