//! Build and test output analysis
//!
//! Recognizes the output of common toolchains and extracts the errors or
//! failing tests into a short summary the model can act on.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

/// Entries shown per section before the summary elides the rest
const SUMMARY_LIMIT: usize = 5;

/// Cap on generic matches per pattern
const GENERIC_LIMIT: usize = 10;

lazy_static! {
    static ref MAVEN_ERROR: Regex =
        Regex::new(r"\[ERROR\]\s+(/[^:\s]+):?\[?(\d+)?,?(\d+)?\]?\s*(.+)")
            .expect("maven error regex");
    static ref GO_FAIL: Regex = Regex::new(r"--- FAIL: (\S+)").expect("go fail regex");
    static ref GO_LOCATION: Regex =
        Regex::new(r"^\s+(\S+\.go):(\d+):\s*(.+)").expect("go location regex");
    static ref NPM_ERROR: Regex = Regex::new(r"npm ERR!\s*(.+)").expect("npm error regex");
    static ref JEST_FAIL: Regex = Regex::new(r"✕\s+(.+)").expect("jest fail regex");
    static ref JEST_LOCATION: Regex =
        Regex::new(r"at\s+\S+\s+\(([^:()]+):(\d+):(\d+)\)").expect("jest location regex");
    static ref CARGO_ERROR: Regex =
        Regex::new(r"error(?:\[E\d+\])?: (.+)\n\s+-->\s+([^:\s]+):(\d+):(\d+)")
            .expect("cargo error regex");
    static ref JUNIT_FAILED_RUN: Regex =
        Regex::new(r"FAILURE!|Tests run:.*Failures: [1-9]").expect("junit summary regex");
    static ref JUNIT_TEST: Regex = Regex::new(r"(\w+)\((\w+)\).*FAILED").expect("junit test regex");
    static ref GENERIC_LOCATED: Regex =
        Regex::new(r"([^:\s]+):(\d+):\s*error:\s*(.+)").expect("located error regex");
    static ref GENERIC_ERROR: Regex = Regex::new(r"(?i)error:\s*(.+)").expect("error regex");
    static ref GENERIC_FATAL: Regex = Regex::new(r"(?i)fatal:\s*(.+)").expect("fatal regex");
}

/// Toolchain the output was recognized as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Maven,
    Go,
    Npm,
    Jest,
    Cargo,
    JUnit,
    Unknown,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Maven => "maven",
            OutputKind::Go => "go",
            OutputKind::Npm => "npm",
            OutputKind::Jest => "jest",
            OutputKind::Cargo => "cargo",
            OutputKind::JUnit => "junit",
            OutputKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildError {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFailure {
    pub test_name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub message: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub kind: OutputKind,
    pub build_errors: Vec<BuildError>,
    pub test_failures: Vec<TestFailure>,
}

impl AnalysisResult {
    pub fn success(&self) -> bool {
        self.build_errors.is_empty() && self.test_failures.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.success() {
            return "Build/tests passed successfully.".to_string();
        }

        let mut out = String::new();

        if !self.build_errors.is_empty() {
            out.push_str("Build Errors:\n");
            for (i, err) in self.build_errors.iter().enumerate() {
                if i >= SUMMARY_LIMIT {
                    out.push_str("  ... and more errors\n");
                    break;
                }
                out.push_str("  • ");
                if let Some(file) = &err.file {
                    out.push_str(file);
                    if let Some(line) = err.line {
                        out.push_str(&format!(":{}", line));
                    }
                    out.push_str(": ");
                }
                out.push_str(&err.message);
                out.push('\n');
            }
        }

        if !self.test_failures.is_empty() {
            out.push_str("Test Failures:\n");
            for (i, failure) in self.test_failures.iter().enumerate() {
                if i >= SUMMARY_LIMIT {
                    out.push_str("  ... and more failures\n");
                    break;
                }
                out.push_str(&format!("  • {}\n", failure.test_name));
                if let Some(message) = &failure.message {
                    out.push_str(&format!("    {}\n", message));
                }
            }
        }

        out
    }
}

/// Detect the toolchain and extract what went wrong.
pub fn analyze_output(output: &str) -> AnalysisResult {
    let mut result = AnalysisResult {
        kind: detect_kind(output),
        build_errors: Vec::new(),
        test_failures: Vec::new(),
    };

    match result.kind {
        OutputKind::Maven => result.build_errors = maven_errors(output),
        OutputKind::Go => result.test_failures = go_failures(output),
        OutputKind::Npm => result.build_errors = npm_errors(output),
        OutputKind::Jest => result.test_failures = jest_failures(output),
        OutputKind::Cargo => result.build_errors = cargo_errors(output),
        OutputKind::JUnit => result.test_failures = junit_failures(output),
        OutputKind::Unknown => result.build_errors = generic_errors(output),
    }

    result
}

fn detect_kind(output: &str) -> OutputKind {
    let has = |needle: &str| output.contains(needle);

    if has("BUILD FAILURE") || has("[ERROR]") {
        OutputKind::Maven
    } else if has("FAILED") && has("go test") {
        OutputKind::Go
    } else if has("npm ERR!") {
        OutputKind::Npm
    } else if has("FAIL") && (has("jest") || has("vitest")) {
        OutputKind::Jest
    } else if has("error:") && has("cargo") {
        OutputKind::Cargo
    } else if has("FAILURES!") || has("Tests run:") {
        OutputKind::JUnit
    } else {
        OutputKind::Unknown
    }
}

fn num(s: Option<regex::Match<'_>>) -> Option<u32> {
    s.and_then(|m| m.as_str().parse().ok())
}

fn text(s: Option<regex::Match<'_>>) -> Option<String> {
    s.map(|m| m.as_str().trim().to_string())
}

fn maven_errors(output: &str) -> Vec<BuildError> {
    MAVEN_ERROR
        .captures_iter(output)
        .map(|c| BuildError {
            file: text(c.get(1)),
            line: num(c.get(2)),
            column: num(c.get(3)),
            message: text(c.get(4)).unwrap_or_default(),
        })
        .collect()
}

fn go_failures(output: &str) -> Vec<TestFailure> {
    let mut failures: Vec<TestFailure> = Vec::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        if let Some(c) = GO_FAIL.captures(line) {
            current = text(c.get(1));
            continue;
        }
        let Some(test) = &current else { continue };

        if let Some(c) = GO_LOCATION.captures(line) {
            failures.push(TestFailure {
                test_name: test.clone(),
                file: text(c.get(1)),
                line: num(c.get(2)),
                message: text(c.get(3)),
                ..TestFailure::default()
            });
            continue;
        }

        if let Some(last) = failures.last_mut() {
            let trimmed = line.trim();
            if trimmed.contains("expected") {
                last.expected = Some(trimmed.to_string());
            } else if trimmed.contains("got") {
                last.actual = Some(trimmed.to_string());
            }
        }
    }

    failures
}

fn npm_errors(output: &str) -> Vec<BuildError> {
    NPM_ERROR
        .captures_iter(output)
        .filter_map(|c| text(c.get(1)))
        .filter(|m| !m.starts_with("code") && !m.starts_with("errno"))
        .map(|message| BuildError {
            message,
            ..BuildError::default()
        })
        .collect()
}

fn jest_failures(output: &str) -> Vec<TestFailure> {
    // Jest prints stack locations after the failure list; the first one is
    // the best we can attribute without a structured reporter.
    let location = JEST_LOCATION.captures(output);
    JEST_FAIL
        .captures_iter(output)
        .map(|c| TestFailure {
            test_name: text(c.get(1)).unwrap_or_default(),
            file: location.as_ref().and_then(|l| text(l.get(1))),
            line: location.as_ref().and_then(|l| num(l.get(2))),
            ..TestFailure::default()
        })
        .collect()
}

fn cargo_errors(output: &str) -> Vec<BuildError> {
    CARGO_ERROR
        .captures_iter(output)
        .map(|c| BuildError {
            message: text(c.get(1)).unwrap_or_default(),
            file: text(c.get(2)),
            line: num(c.get(3)),
            column: num(c.get(4)),
        })
        .collect()
}

fn junit_failures(output: &str) -> Vec<TestFailure> {
    if !JUNIT_FAILED_RUN.is_match(output) {
        return Vec::new();
    }
    JUNIT_TEST
        .captures_iter(output)
        .map(|c| TestFailure {
            test_name: format!("{}.{}", &c[2], &c[1]),
            ..TestFailure::default()
        })
        .collect()
}

fn generic_errors(output: &str) -> Vec<BuildError> {
    let mut errors = Vec::new();

    for c in GENERIC_LOCATED.captures_iter(output).take(GENERIC_LIMIT) {
        errors.push(BuildError {
            file: text(c.get(1)),
            line: num(c.get(2)),
            message: text(c.get(3)).unwrap_or_default(),
            ..BuildError::default()
        });
    }
    for re in [&*GENERIC_ERROR, &*GENERIC_FATAL] {
        for c in re.captures_iter(output).take(GENERIC_LIMIT) {
            errors.push(BuildError {
                message: text(c.get(1)).unwrap_or_default(),
                ..BuildError::default()
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_output_passes() {
        let result = analyze_output("Compiling...\nAll good\n");
        assert_eq!(result.kind, OutputKind::Unknown);
        assert!(result.success());
        assert_eq!(result.summary(), "Build/tests passed successfully.");
    }

    #[test]
    fn test_cargo_errors() {
        let output = "   Compiling devbot v0.1.0\nerror[E0425]: cannot find value `x` in this scope\n  --> src/lib.rs:10:5\n   |\nerror: could not compile `devbot` (cargo)\n";
        let result = analyze_output(output);
        assert_eq!(result.kind, OutputKind::Cargo);
        assert_eq!(result.build_errors.len(), 1);
        let err = &result.build_errors[0];
        assert_eq!(err.file.as_deref(), Some("src/lib.rs"));
        assert_eq!(err.line, Some(10));
        assert_eq!(err.column, Some(5));
        assert!(result.summary().contains("src/lib.rs:10: cannot find value"));
    }

    #[test]
    fn test_go_failures() {
        let output = "=== RUN   TestAdd\n--- FAIL: TestAdd (0.00s)\n    math_test.go:12: sum wrong\n        expected 4\n        got 5\nFAILED go test ./...\n";
        let result = analyze_output(output);
        assert_eq!(result.kind, OutputKind::Go);
        assert_eq!(result.test_failures.len(), 1);
        let failure = &result.test_failures[0];
        assert_eq!(failure.test_name, "TestAdd");
        assert_eq!(failure.line, Some(12));
        assert_eq!(failure.expected.as_deref(), Some("expected 4"));
        assert_eq!(failure.actual.as_deref(), Some("got 5"));
    }

    #[test]
    fn test_npm_skips_code_lines() {
        let output = "npm ERR! code ELIFECYCLE\nnpm ERR! errno 1\nnpm ERR! app@1.0.0 build: `tsc`\n";
        let result = analyze_output(output);
        assert_eq!(result.kind, OutputKind::Npm);
        assert_eq!(result.build_errors.len(), 1);
        assert_eq!(result.build_errors[0].message, "app@1.0.0 build: `tsc`");
    }

    #[test]
    fn test_junit_failures() {
        let output = "Tests run: 3, Failures: 1, Errors: 0\ntestLogin(AuthTest)  Time elapsed: 0.1 sec  <<< FAILED\n";
        let result = analyze_output(output);
        assert_eq!(result.kind, OutputKind::JUnit);
        assert_eq!(result.test_failures[0].test_name, "AuthTest.testLogin");
    }

    #[test]
    fn test_summary_elides_after_five() {
        let output: String = (0..8).map(|i| format!("fatal: broken {}\n", i)).collect();
        let summary = analyze_output(&output).summary();
        assert!(summary.contains("... and more errors"));
        assert_eq!(summary.matches("  • ").count(), SUMMARY_LIMIT);
    }
}
