//! Evaluation of the small expression idioms config files use in place of
//! plain literals.

use std::sync::OnceLock;

use regex::Regex;

fn env_lookup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(!{0,2})\s*process\.env(?:\.(\w+)|\[\s*['"](\w+)['"]\s*\])$"#)
            .expect("static regex")
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d[\d_]*(?:\s*\*\s*\d[\d_]*)*").expect("static regex")
    })
}

/// Evaluate a boolean-valued expression: `true`, `false`, or an environment
/// lookup such as `!process.env.HEADED`, resolved against the current
/// process environment (unset or empty counts as falsy).
pub fn eval_bool(expr: &str) -> Option<bool> {
    eval_bool_with(expr, |name| std::env::var(name).ok())
}

pub fn eval_bool_with(expr: &str, env: impl Fn(&str) -> Option<String>) -> Option<bool> {
    let expr = expr.trim().trim_end_matches(',').trim();
    match expr {
        "true" => return Some(true),
        "false" => return Some(false),
        _ => {}
    }

    let caps = env_lookup_re().captures(expr)?;
    let name = caps.get(2).or_else(|| caps.get(3))?.as_str();
    let set = env(name).is_some_and(|v| !v.is_empty());
    match caps.get(1).map_or(0, |m| m.as_str().len()) {
        1 => Some(!set),
        2 => Some(set),
        // A bare `process.env.X` is a string, not a boolean.
        _ => None,
    }
}

/// Evaluate a numeric expression. Digit-group separators (`30_000`) and
/// literal products (`60 * 1000`) are understood. For a ternary the
/// condition is ignored and the largest branch value wins, since the branch
/// not taken locally is usually a `0` or `undefined`.
pub fn eval_number(expr: &str) -> Option<u64> {
    let branches: Vec<&str> = match expr.split_once('?') {
        Some((_condition, rest)) => rest.split(':').collect(),
        None => vec![expr],
    };

    branches
        .into_iter()
        .flat_map(|branch| number_re().find_iter(branch))
        .filter_map(|m| eval_product(m.as_str()))
        .max()
}

fn eval_product(text: &str) -> Option<u64> {
    text.split('*')
        .map(|factor| factor.trim().replace('_', "").parse::<u64>().ok())
        .try_fold(1u64, |acc, factor| acc.checked_mul(factor?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_bool_literals() {
        assert_eq!(eval_bool_with("true", no_env), Some(true));
        assert_eq!(eval_bool_with(" false,", no_env), Some(false));
        assert_eq!(eval_bool_with("maybe", no_env), None);
    }

    #[test]
    fn test_negated_env_lookup() {
        assert_eq!(eval_bool_with("!process.env.HEADED", no_env), Some(true));
        let headed = |name: &str| (name == "HEADED").then(|| "1".to_string());
        assert_eq!(eval_bool_with("!process.env.HEADED", headed), Some(false));
        assert_eq!(eval_bool_with("!!process.env['HEADED']", headed), Some(true));
        assert_eq!(eval_bool_with("process.env.HEADED", headed), None);
    }

    #[test]
    fn test_empty_env_value_is_falsy() {
        let empty = |_: &str| Some(String::new());
        assert_eq!(eval_bool_with("!process.env.CI", empty), Some(true));
    }

    #[test]
    fn test_number_with_separators_and_products() {
        assert_eq!(eval_number("30_000"), Some(30_000));
        assert_eq!(eval_number("60 * 1000"), Some(60_000));
        assert_eq!(eval_number("0"), Some(0));
        assert_eq!(eval_number("undefined"), None);
    }

    #[test]
    fn test_ternary_takes_largest_branch() {
        assert_eq!(eval_number("cond ? 0 : 30000"), Some(30_000));
        assert_eq!(eval_number("process.env.CI ? 2 : 0"), Some(2));
        assert_eq!(eval_number("process.env.CI ? 1 : undefined"), Some(1));
        // Numbers inside the condition are not candidates.
        assert_eq!(eval_number("retries > 5 ? 1 : 0"), Some(1));
    }
}
