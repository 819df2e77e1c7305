#[path = "build/literals.rs"]
mod literals;

use grep::matcher::Matcher;
use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use literals::code_outside_literals;
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories holding the crate's own Rust sources.
const SOURCE_ROOTS: [&str; 4] = ["engine", "tests", "benches", "build"];

/// A hygiene rule: a line regex plus the explanation printed when it matches.
/// Text inside comments and string or char literals never counts.
struct Rule {
    name: &'static str,
    pattern: &'static str,
    advice: &'static str,
}

const RULES: [Rule; 2] = [
    Rule {
        name: "underscore-prefixed identifiers",
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        advice: "Underscore-prefixed names are not allowed in this project.\n   Either use the binding (removing the underscore) or remove it completely.",
    },
    Rule {
        name: "#[allow(dead_code)] attributes",
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        advice: "#[allow(dead_code)] is STRICTLY FORBIDDEN in this project.\n   Either use the code or remove it completely.",
    },
];

// Collects every offending line of one file so the error lists them all.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    // Rechecks each matched line with comments and literals removed.
    code_matcher: RegexMatcher,
}

impl ViolationCollector {
    fn new(file_path: &Path, code_matcher: RegexMatcher) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            code_matcher,
        }
    }

    fn error_message(&self, rule: &Rule) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }
        let mut message = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            rule.name,
            self.file_path.display()
        );
        for violation in &self.violations {
            message.push_str(&format!("   {violation}\n"));
        }
        message.push_str(&format!("\n⚠️ {}\n", rule.advice));
        Some(message)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        let in_code = self
            .code_matcher
            .is_match(code_outside_literals(line_text).as_bytes())
            .unwrap_or(true);
        if in_code {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_ROOTS
        .iter()
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .map(|e| e.into_path())
        .chain(std::iter::once(PathBuf::from("build.rs")))
        .filter(|p| p.extension().is_some_and(|ext| ext == "rs"))
}

fn check(rule: &Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
    let mut searcher = Searcher::new();
    for path in rust_sources() {
        let mut collector = ViolationCollector::new(&path, matcher.clone());
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(message) = collector.error_message(rule) {
            return Err(message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    for rule in &RULES {
        if let Err(e) = check(rule) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
