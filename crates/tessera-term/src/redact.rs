// SPDX-License-Identifier: MIT
//
// Secret redaction for session recordings.
//
// A `Redactor` is an ordered list of regex rules, each with a replacement
// template. The built-in set targets the usual shapes: `key: value` pairs
// whose key names a password, token, secret or API key (the key is kept,
// the value replaced), bearer tokens, JWTs, AWS access key IDs, GitHub
// tokens, long hex strings and base64-looking secret assignments.
//
// The rules are heuristics. Extend them with `with_pattern`, or start from
// `Redactor::empty()`.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;

/// Text substituted for a redacted value.
pub const REDACTED: &str = "[REDACTED]";

const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "credential-field",
        r#"(?i)\b((?:password|passwd|pwd|passphrase|secret|token|api[_-]?key|access[_-]?key|credentials?|private[_-]?key|client[_-]?secret)[a-z0-9_-]*)(\s*[:=]\s*)(["']?)([^\s"',;\x00-\x1f]+)"#,
        "${1}${2}${3}[REDACTED]",
    ),
    (
        "bearer",
        r"(?i)\b(bearer\s+)[A-Za-z0-9._~+/-]+=*",
        "${1}[REDACTED]",
    ),
    (
        "jwt",
        r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+",
        "[REDACTED]",
    ),
    ("aws-access-key", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b", "[REDACTED]"),
    (
        "github-token",
        r"\b(?:gh[pousr]_[A-Za-z0-9]{36,}|github_pat_[A-Za-z0-9_]{22,})",
        "[REDACTED]",
    ),
    ("hex-string", r"\b[0-9a-fA-F]{32,}\b", "[REDACTED]"),
    (
        "base64-assignment",
        r#"(?i)\b([a-z0-9_]*(?:key|secret|token)\s*[:=]\s*["']?)[A-Za-z0-9+/]{20,}={0,2}"#,
        "${1}[REDACTED]",
    ),
];

static DEFAULT: LazyLock<Redactor> = LazyLock::new(Redactor::builtin);

/// One redaction rule.
#[derive(Debug, Clone)]
pub struct RedactPattern {
    name: String,
    regex: Regex,
    replacement: String,
}

impl RedactPattern {
    /// # Errors
    ///
    /// Returns [`crate::Error::Pattern`] if `pattern` is not a valid regex.
    pub fn new(name: impl Into<String>, pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered set of redaction rules.
#[derive(Debug, Clone)]
pub struct Redactor {
    patterns: Vec<RedactPattern>,
}

impl Redactor {
    fn builtin() -> Self {
        Self {
            // The built-in expressions are constants covered by tests.
            patterns: BUILTIN
                .iter()
                .filter_map(|(name, pattern, replacement)| RedactPattern::new(*name, pattern, *replacement).ok())
                .collect(),
        }
    }

    /// A redactor with no rules; `redact` returns its input unchanged.
    #[must_use]
    pub const fn empty() -> Self {
        Self { patterns: Vec::new() }
    }

    /// Append a rule. `replacement` may use `$1`-style group references.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Pattern`] if `pattern` is not a valid regex.
    pub fn with_pattern(mut self, name: impl Into<String>, pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        self.patterns.push(RedactPattern::new(name, pattern, replacement)?);
        Ok(self)
    }

    /// Append a rule that replaces every match with [`REDACTED`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Pattern`] if `pattern` is not a valid regex.
    pub fn with_simple_pattern(self, pattern: &str) -> Result<Self> {
        self.with_pattern(pattern, pattern, REDACTED)
    }

    #[must_use]
    pub fn pattern_names(&self) -> Vec<&str> {
        self.patterns.iter().map(RedactPattern::name).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Apply every rule in order. Borrows when nothing matched.
    #[must_use]
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(text);
        for p in &self.patterns {
            let replaced = match p.regex.replace_all(&out, p.replacement.as_str()) {
                Cow::Borrowed(_) => continue,
                Cow::Owned(s) => s,
            };
            out = Cow::Owned(replaced);
        }
        out
    }
}

impl Default for Redactor {
    fn default() -> Self {
        DEFAULT.clone()
    }
}

/// Redact `text` with the built-in rules.
///
/// ```
/// let out = tessera_term::redact_credentials("password: secret123");
/// assert_eq!(out, "password: [REDACTED]");
/// ```
#[must_use]
pub fn redact_credentials(text: &str) -> String {
    DEFAULT.redact(text).into_owned()
}
