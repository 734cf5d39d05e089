use super::NormalizedConfig;

/// `pytest.ini`, `setup.cfg` and `tox.ini`: only the pytest section counts.
pub fn parse_pytest_ini(content: &str) -> NormalizedConfig {
    let mut config = NormalizedConfig::default();
    let Some(section) = ini_section(content, &["pytest", "tool:pytest"]) else {
        return config;
    };

    if let Some(addopts) = ini_value(&section, "addopts") {
        apply_addopts(&mut config, &addopts);
    }
    if let Some(secs) = ini_value(&section, "timeout").and_then(|v| v.trim().parse::<u64>().ok()) {
        config.timeout = Some(secs * 1000);
    }
    if let Some(url) = ini_value(&section, "base_url") {
        config.base_url = Some(url.trim().to_string());
    }
    config
}

/// `pyproject.toml`: keys under `[tool.pytest.ini_options]`.
pub fn parse_pyproject(content: &str) -> NormalizedConfig {
    let mut config = NormalizedConfig::default();
    let Some(section) = ini_section(content, &["tool.pytest.ini_options"]) else {
        return config;
    };

    let headless = regex!(r"(?m)^\s*headless\s*=\s*(true|false)");
    if let Some(caps) = headless.captures(&section) {
        config.headless = Some(&caps[1] == "true");
    }

    let browser_list = regex!(r"(?m)^\s*browser\s*=\s*\[([^\]]+)\]");
    let browser_single = regex!(r#"(?m)^\s*browser\s*=\s*['"]([^'"]+)['"]"#);
    if let Some(caps) = browser_list.captures(&section) {
        let browsers: Vec<String> = caps[1]
            .split(',')
            .map(|b| b.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
            .filter(|b| !b.is_empty())
            .collect();
        if !browsers.is_empty() {
            config.browsers = Some(browsers);
        }
    } else if let Some(caps) = browser_single.captures(&section) {
        config.browsers = Some(vec![caps[1].to_string()]);
    }

    let addopts_str = regex!(r#"(?m)^\s*addopts\s*=\s*['"]([^'"]*)['"]"#);
    let addopts_list = regex!(r"(?ms)^\s*addopts\s*=\s*\[(.*?)\]");
    if let Some(caps) = addopts_str.captures(&section) {
        apply_addopts(&mut config, &caps[1]);
    } else if let Some(caps) = addopts_list.captures(&section) {
        let joined = caps[1]
            .split(',')
            .map(|item| item.trim().trim_matches(|c: char| c == '"' || c == '\''))
            .collect::<Vec<_>>()
            .join(" ");
        apply_addopts(&mut config, &joined);
    }

    let timeout = regex!(r"(?m)^\s*timeout\s*=\s*(\d+)");
    if let Some(secs) = timeout.captures(&section).and_then(|c| c[1].parse::<u64>().ok()) {
        config.timeout = Some(secs * 1000);
    }

    config
}

/// Body of the first `[name]` section matching one of `names`, up to the next
/// section header.
fn ini_section(content: &str, names: &[&str]) -> Option<String> {
    let mut found = false;
    let mut body: Vec<&str> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if found {
                break;
            }
            found = names.contains(&header.trim());
            continue;
        }
        if found {
            body.push(line);
        }
    }

    found.then(|| body.join("\n"))
}

/// INI value for `key`, including indented continuation lines.
fn ini_value(section: &str, key: &str) -> Option<String> {
    let mut lines = section.lines().peekable();
    while let Some(line) = lines.next() {
        let Some((k, v)) = line.split_once(|c: char| c == '=' || c == ':') else { continue };
        if line.starts_with(char::is_whitespace) || k.trim() != key {
            continue;
        }
        let mut value = v.trim().to_string();
        while let Some(next) = lines.peek() {
            if next.starts_with(char::is_whitespace) && !next.trim().is_empty() {
                value.push(' ');
                value.push_str(next.trim());
                lines.next();
            } else {
                break;
            }
        }
        return Some(value);
    }
    None
}

/// Fold pytest command-line flags from `addopts` into the config.
fn apply_addopts(config: &mut NormalizedConfig, addopts: &str) {
    let mut tokens = addopts.split_whitespace();
    let mut browsers: Vec<String> = Vec::new();

    while let Some(token) = tokens.next() {
        let (flag, inline) = match token.split_once('=') {
            Some((f, v)) => (f, Some(v.to_string())),
            None => (token, None),
        };
        let mut value = || inline.clone().or_else(|| tokens.next().map(str::to_string));

        match flag {
            "--headed" => config.headless = Some(false),
            "--browser" => {
                if let Some(b) = value() {
                    browsers.push(b);
                }
            }
            "--reruns" => config.retries = value().and_then(|v| v.parse().ok()),
            "-n" | "--numprocesses" => config.workers = value().and_then(|v| v.parse().ok()),
            "--base-url" => config.base_url = value(),
            _ => {
                if let Some(n) = flag.strip_prefix("-n").and_then(|n| n.parse().ok()) {
                    config.workers = Some(n);
                }
            }
        }
    }

    if !browsers.is_empty() {
        config.browsers = Some(browsers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pytest_ini_addopts() {
        let config = parse_pytest_ini(
            "[pytest]\naddopts = --headed --browser firefox\n    --browser=webkit --reruns 2 -n 4\ntimeout = 30\n",
        );
        assert_eq!(config.headless, Some(false));
        assert_eq!(
            config.browsers,
            Some(vec!["firefox".to_string(), "webkit".to_string()])
        );
        assert_eq!(config.retries, Some(2));
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.timeout, Some(30_000));
    }

    #[test]
    fn test_setup_cfg_section_name() {
        let config = parse_pytest_ini("[metadata]\nname = app\n\n[tool:pytest]\naddopts = --browser chromium\n");
        assert_eq!(config.browsers, Some(vec!["chromium".to_string()]));
        assert_eq!(config.headless, None);
    }

    #[test]
    fn test_ini_without_pytest_section_is_empty() {
        let config = parse_pytest_ini("[flake8]\naddopts = --headed\n");
        assert!(config.is_empty());
    }

    #[test]
    fn test_pyproject_section() {
        let config = parse_pyproject(
            r#"
[project]
name = "app"

[tool.pytest.ini_options]
headless = false
browser = ["chromium", 'firefox']
addopts = "--reruns 1"

[tool.black]
headless = true
"#,
        );
        assert_eq!(config.headless, Some(false));
        assert_eq!(
            config.browsers,
            Some(vec!["chromium".to_string(), "firefox".to_string()])
        );
        assert_eq!(config.retries, Some(1));
    }

    #[test]
    fn test_pyproject_addopts_list() {
        let config = parse_pyproject(
            "[tool.pytest.ini_options]\naddopts = [\n  \"--headed\",\n  \"--browser=webkit\",\n]\n",
        );
        assert_eq!(config.headless, Some(false));
        assert_eq!(config.browsers, Some(vec!["webkit".to_string()]));
    }

    #[test]
    fn test_pyproject_without_pytest_section() {
        assert!(parse_pyproject("[tool.poetry]\nname = \"x\"\n").is_empty());
    }
}
