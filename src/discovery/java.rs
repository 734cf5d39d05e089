use super::NormalizedConfig;

/// Maven `pom.xml`: `<playwright.headless>` / `<playwright.browser>` properties.
pub fn parse_pom(content: &str) -> NormalizedConfig {
    let headless = regex!(r"<playwright\.headless>\s*(true|false)\s*</playwright\.headless>");
    let browser = regex!(r"<playwright\.browser>\s*([^<\s]+)\s*</playwright\.browser>");

    NormalizedConfig {
        headless: headless.captures(content).map(|c| &c[1] == "true"),
        browsers: browser.captures(content).map(|c| vec![c[1].to_string()]),
        ..Default::default()
    }
}

/// Gradle build scripts: `systemProperty("playwright.headless", "false")`
/// in either DSL.
pub fn parse_gradle(content: &str) -> NormalizedConfig {
    let headless = regex!(r#"systemProperty\s*\(?\s*['"]playwright\.headless['"]\s*,\s*['"]?(true|false)['"]?\s*\)?"#);
    let browser = regex!(r#"systemProperty\s*\(?\s*['"]playwright\.browser['"]\s*,\s*['"]([^'"]+)['"]\s*\)?"#);

    NormalizedConfig {
        headless: headless.captures(content).map(|c| &c[1] == "true"),
        browsers: browser.captures(content).map(|c| vec![c[1].to_string()]),
        ..Default::default()
    }
}

/// `application.properties` (`playwright.headless=false`) and
/// `application.yml`, either flattened or as a nested `playwright:` block.
pub fn parse_properties(content: &str) -> NormalizedConfig {
    let flat_headless = regex!(r"playwright\.headless\s*[=:]\s*(true|false)");
    let flat_browser = regex!(r"playwright\.browser\s*[=:]\s*([^\s#]+)");

    let mut config = NormalizedConfig {
        headless: flat_headless.captures(content).map(|c| &c[1] == "true"),
        browsers: flat_browser.captures(content).map(|c| vec![c[1].to_string()]),
        ..Default::default()
    };

    if let Some(block) = yaml_block(content, "playwright") {
        let headless = regex!(r"(?m)^\s+headless\s*:\s*(true|false)");
        let browser = regex!(r#"(?m)^\s+browser\s*:\s*['"]?([\w-]+)['"]?"#);
        if config.headless.is_none() {
            config.headless = headless.captures(&block).map(|c| &c[1] == "true");
        }
        if config.browsers.is_none() {
            config.browsers = browser.captures(&block).map(|c| vec![c[1].to_string()]);
        }
    }

    config
}

/// Indented body under a top-level `key:` line in YAML.
fn yaml_block(content: &str, key: &str) -> Option<String> {
    let mut lines = content.lines();
    lines.by_ref().find(|line| line.trim_end() == format!("{}:", key))?;
    let body: Vec<&str> = lines
        .take_while(|line| line.trim().is_empty() || line.starts_with(char::is_whitespace))
        .collect();
    Some(body.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pom_properties() {
        let config = parse_pom(
            r#"<project>
  <properties>
    <playwright.headless>false</playwright.headless>
    <playwright.browser>firefox</playwright.browser>
  </properties>
</project>"#,
        );
        assert_eq!(config.headless, Some(false));
        assert_eq!(config.browsers, Some(vec!["firefox".to_string()]));
    }

    #[test]
    fn test_pom_without_playwright_is_empty() {
        assert!(parse_pom("<project><artifactId>app</artifactId></project>").is_empty());
    }

    #[test]
    fn test_gradle_groovy_and_kotlin() {
        let groovy = parse_gradle("test {\n  systemProperty 'playwright.headless', 'true'\n}");
        assert_eq!(groovy.headless, Some(true));

        let kotlin = parse_gradle(
            "tasks.test {\n  systemProperty(\"playwright.browser\", \"webkit\")\n}",
        );
        assert_eq!(kotlin.browsers, Some(vec!["webkit".to_string()]));
        assert_eq!(kotlin.headless, None);
    }

    #[test]
    fn test_properties_and_yaml() {
        let props = parse_properties("playwright.headless=false\nplaywright.browser=chromium\n");
        assert_eq!(props.headless, Some(false));
        assert_eq!(props.browsers, Some(vec!["chromium".to_string()]));

        let yaml = parse_properties("server:\n  port: 8080\nplaywright:\n  headless: true\n  browser: firefox\n");
        assert_eq!(yaml.headless, Some(true));
        assert_eq!(yaml.browsers, Some(vec!["firefox".to_string()]));
    }
}
