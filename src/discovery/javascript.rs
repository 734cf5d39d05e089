use super::expr::{eval_bool, eval_number};
use super::NormalizedConfig;

const KNOWN_BROWSERS: [&str; 3] = ["chromium", "firefox", "webkit"];

/// Read the settings we recognize out of a `playwright.config.{ts,js}`.
pub fn parse_playwright_config(content: &str) -> NormalizedConfig {
    let content = strip_comments(content);
    let use_blocks = blocks(&content, "use");
    let expect_blocks = blocks(&content, "expect");
    let top_level = top_level(&content);

    let mut config = NormalizedConfig {
        headless: bool_value(&top_level, "headless"),
        use_headless: use_blocks.iter().find_map(|b| bool_value(b, "headless")),
        timeout: number_value(&top_level, "timeout"),
        expect_timeout: expect_blocks.iter().find_map(|b| number_value(b, "timeout")),
        action_timeout: use_blocks.iter().find_map(|b| number_value(b, "actionTimeout")),
        navigation_timeout: use_blocks.iter().find_map(|b| number_value(b, "navigationTimeout")),
        retries: number_value(&top_level, "retries").and_then(|n| u32::try_from(n).ok()),
        workers: workers_value(&top_level),
        reporter: reporter_value(&top_level),
        test_dir: string_value(&top_level, "testDir"),
        output_dir: string_value(&top_level, "outputDir"),
        base_url: use_blocks
            .iter()
            .find_map(|b| string_value(b, "baseURL"))
            .or_else(|| string_value(&top_level, "baseURL")),
        browsers: None,
    };

    let browsers = browser_names(&content);
    if !browsers.is_empty() {
        config.browsers = Some(browsers);
    }

    config
}

/// Index just past the string or template literal opening at `start`.
/// Single and double quoted strings end at a newline if left unterminated.
fn string_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' if quote != b'`' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Drop `//` and `/* */` comments. Literals are skipped whole, so a glob
/// like `'**/*.spec.ts'` does not open a comment.
fn strip_comments(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len());
    let mut kept = 0;
    let mut i = 0;

    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1).copied()) {
            (b'\'' | b'"' | b'`', _) => i = string_end(bytes, i),
            (b'\\', _) => i += 2,
            (b'/', Some(b'/')) => {
                out.push_str(&content[kept..i]);
                i = content[i..].find('\n').map_or(bytes.len(), |n| i + n);
                kept = i;
            }
            (b'/', Some(b'*')) => {
                out.push_str(&content[kept..i]);
                out.push(' ');
                i = content[i + 2..].find("*/").map_or(bytes.len(), |n| i + n + 4);
                kept = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&content[kept..]);
    out
}

/// Index of the `}` closing the brace at `open`.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                i = string_end(bytes, i);
                continue;
            }
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Every `key: { ... }` object literal, braces included.
fn blocks<'a>(content: &'a str, key: &str) -> Vec<&'a str> {
    let bytes = content.as_bytes();
    regex!(r"\b(\w+)\s*:\s*\{")
        .captures_iter(content)
        .filter(|caps| &caps[1] == key)
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let close = matching_brace(bytes, m.end() - 1)?;
            Some(&content[m.start()..=close])
        })
        .collect()
}

/// The text at object depth one: the config object's own keys, with every
/// nested object (`use`, `expect`, `webServer`, project entries) cut out.
fn top_level(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len());
    let mut depth = 0usize;
    let mut kept = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => i = string_end(bytes, i),
            b'\\' => i += 2,
            b'{' => {
                if depth == 1 {
                    out.push_str(&content[kept..i]);
                }
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
                if depth == 1 {
                    kept = i;
                }
            }
            _ => i += 1,
        }
    }
    if depth <= 1 {
        out.push_str(&content[kept.min(bytes.len())..]);
    }
    out
}

/// Raw `key: value` expressions, up to the next comma, newline or brace.
fn raw_values<'t>(text: &'t str, key: &'t str) -> impl Iterator<Item = &'t str> + 't {
    regex!(r"\b(\w+)\s*:\s*([^,\n}]+)")
        .captures_iter(text)
        .filter(move |caps| &caps[1] == key)
        .filter_map(|caps| caps.get(2).map(|m| m.as_str()))
}

fn bool_value(text: &str, key: &str) -> Option<bool> {
    raw_values(text, key).find_map(eval_bool)
}

fn number_value(text: &str, key: &str) -> Option<u64> {
    raw_values(text, key).find_map(eval_number)
}

fn string_value(text: &str, key: &str) -> Option<String> {
    regex!(r#"\b(\w+)\s*:\s*['"`]([^'"`]+)['"`]"#)
        .captures_iter(text)
        .find(|caps| &caps[1] == key)
        .map(|caps| caps[2].to_string())
}

fn workers_value(text: &str) -> Option<u32> {
    let raw = raw_values(text, "workers").next()?;
    // Percentages ("50%") are relative to CPU count; nothing to normalize to.
    if raw.contains('%') {
        return None;
    }
    eval_number(raw).and_then(|n| u32::try_from(n).ok())
}

fn reporter_value(text: &str) -> Option<String> {
    if let Some(name) = string_value(text, "reporter") {
        return Some(name);
    }
    regex!(r#"\breporter\s*:\s*\[\s*\[?\s*['"`]([^'"`]+)['"`]"#)
        .captures(text)
        .map(|caps| caps[1].to_string())
}

fn browser_names(content: &str) -> Vec<String> {
    let browser_name = regex!(r#"\bbrowserName\s*:\s*['"`](\w+)['"`]"#);
    let project_name = regex!(r#"\bname\s*:\s*['"`](\w+)['"`]"#);
    let device = regex!(r#"devices\[\s*['"`]Desktop (Chrome|Firefox|Safari)"#);

    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for caps in browser_name.captures_iter(content) {
        push(&caps[1]);
    }
    for caps in project_name.captures_iter(content) {
        if KNOWN_BROWSERS.contains(&&caps[1]) {
            push(&caps[1]);
        }
    }
    for caps in device.captures_iter(content) {
        push(match &caps[1] {
            "Chrome" => "chromium",
            "Firefox" => "firefox",
            _ => "webkit",
        });
    }
    names
}
