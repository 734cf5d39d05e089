use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Test-runner family a test file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// JavaScript or TypeScript run through the Playwright test runner.
    JavaScript,
    Python,
    Java,
    CSharp,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 4] = [
        Ecosystem::JavaScript,
        Ecosystem::Python,
        Ecosystem::Java,
        Ecosystem::CSharp,
    ];

    /// Pick the ecosystem from a file extension. Anything unrecognized is
    /// treated as JS/TS, which is where most Playwright suites live.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Ecosystem::Python,
            Some("java") => Ecosystem::Java,
            Some("cs") => Ecosystem::CSharp,
            _ => Ecosystem::JavaScript,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::JavaScript => "javascript",
            Ecosystem::Python => "python",
            Ecosystem::Java => "java",
            Ecosystem::CSharp => "csharp",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ecosystem {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "javascript" | "typescript" | "js" | "ts" => Ok(Ecosystem::JavaScript),
            "python" | "py" => Ok(Ecosystem::Python),
            "java" => Ok(Ecosystem::Java),
            "csharp" | "c#" | "cs" | "dotnet" => Ok(Ecosystem::CSharp),
            _ => Err(crate::Error::UnknownEcosystem(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_by_extension() {
        assert_eq!(Ecosystem::from_path(Path::new("tests/test_login.py")), Ecosystem::Python);
        assert_eq!(Ecosystem::from_path(Path::new("src/test/LoginTest.java")), Ecosystem::Java);
        assert_eq!(Ecosystem::from_path(Path::new("Tests/LoginTests.cs")), Ecosystem::CSharp);
        assert_eq!(Ecosystem::from_path(Path::new("e2e/login.spec.ts")), Ecosystem::JavaScript);
        assert_eq!(Ecosystem::from_path(Path::new("README")), Ecosystem::JavaScript);
    }

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("typescript".parse::<Ecosystem>().unwrap(), Ecosystem::JavaScript);
        assert_eq!("C#".parse::<Ecosystem>().unwrap(), Ecosystem::CSharp);
        assert!(matches!(
            "ruby".parse::<Ecosystem>(),
            Err(crate::Error::UnknownEcosystem(_))
        ));
    }
}
