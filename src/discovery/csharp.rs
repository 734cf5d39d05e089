use serde_json::Value;

use super::NormalizedConfig;

/// `appsettings*.json`. Parsed as JSON first; files that do not parse
/// (comments and trailing commas are common here) fall back to patterns.
pub fn parse_appsettings(content: &str) -> NormalizedConfig {
    match serde_json::from_str::<Value>(content) {
        Ok(json) => from_json(&json),
        Err(e) => {
            tracing::debug!("appsettings is not strict JSON ({}), using textual fallback", e);
            from_json_text(content)
        }
    }
}

fn from_json(json: &Value) -> NormalizedConfig {
    let mut config = NormalizedConfig::default();
    let section = json
        .get("Playwright")
        .or_else(|| json.pointer("/TestSettings/Playwright"))
        .or_else(|| json.get("playwright"));
    let Some(section) = section else {
        return config;
    };

    config.headless = field(section, &["headless", "Headless"])
        .or_else(|| section.pointer("/LaunchOptions/Headless"))
        .and_then(Value::as_bool);

    config.browsers = match field(section, &["browser", "Browser", "BrowserName"]) {
        Some(Value::String(name)) => Some(vec![name.clone()]),
        Some(Value::Array(items)) => {
            let names: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            (!names.is_empty()).then_some(names)
        }
        _ => None,
    };

    config.timeout = field(section, &["timeout", "Timeout"]).and_then(Value::as_u64);
    config
}

fn field<'a>(section: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| section.get(*name))
}

fn from_json_text(content: &str) -> NormalizedConfig {
    let headless = regex!(r#""[Hh]eadless"\s*:\s*(true|false)"#);
    let browser = regex!(r#""(?:[Bb]rowser|BrowserName)"\s*:\s*"([^"]+)""#);

    NormalizedConfig {
        headless: headless.captures(content).map(|c| &c[1] == "true"),
        browsers: browser.captures(content).map(|c| vec![c[1].to_string()]),
        ..Default::default()
    }
}

/// `runsettings.xml` and `Directory.Build.{props,targets}`.
pub fn parse_msbuild_xml(content: &str) -> NormalizedConfig {
    let property_headless = regex!(r"<PlaywrightHeadless>\s*(true|false)\s*</PlaywrightHeadless>");
    let property_browser = regex!(r"<PlaywrightBrowser>\s*([^<\s]+)\s*</PlaywrightBrowser>");
    let launch_headless = regex!(r"(?s)<LaunchOptions>.*?<Headless>\s*(true|false)\s*</Headless>");
    let browser_name = regex!(r"<BrowserName>\s*([^<\s]+)\s*</BrowserName>");

    NormalizedConfig {
        headless: property_headless
            .captures(content)
            .or_else(|| launch_headless.captures(content))
            .map(|c| c[1].eq_ignore_ascii_case("true")),
        browsers: property_browser
            .captures(content)
            .or_else(|| browser_name.captures(content))
            .map(|c| vec![c[1].to_string()]),
        ..Default::default()
    }
}
