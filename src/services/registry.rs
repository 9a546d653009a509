//! Reader for Wine's text registry hives (`system.reg`, `user.reg`).
//!
//! The format is line oriented:
//!
//! ```text
//! WINE REGISTRY Version 2
//! #arch=win64
//!
//! [Software\\Wine\\Drivers] 1700000000
//! #time=1da0c1b2e3f4a50
//! "Audio"="pulse"
//! ```
//!
//! Only string values are kept; `dword:`/`hex:` values and default (`@`)
//! values are ignored since probing never needs them.

use anyhow::{Context, Result};
use camino::Utf8Path;
use indexmap::IndexMap;
use regex::Regex;
use std::fs;
use std::sync::LazyLock;

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.+)\](?:\s+\d+)?\s*$").expect("Invalid key regex"));

static VALUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"((?:[^"\\]|\\.)*)"="((?:[^"\\]|\\.)*)"\s*$"#).expect("Invalid value regex")
});

static ARCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#arch=(\w+)\s*$").expect("Invalid arch regex"));

/// Parsed registry hive: key path -> (value name -> string data)
#[derive(Debug, Clone, Default)]
pub struct RegistryFile {
    arch: Option<String>,
    keys: IndexMap<String, IndexMap<String, String>>,
}

impl RegistryFile {
    /// Read and parse a hive from disk
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry file: {}", path))?;
        Ok(Self::parse(&content))
    }

    /// Parse hive contents. Unknown lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut file = RegistryFile::default();
        let mut current: Option<String> = None;

        for line in content.lines() {
            let line = line.trim_end();

            if let Some(caps) = ARCH_PATTERN.captures(line) {
                file.arch = Some(caps[1].to_string());
                continue;
            }

            if let Some(caps) = KEY_PATTERN.captures(line) {
                let key = unescape(&caps[1]);
                file.keys.entry(key.clone()).or_default();
                current = Some(key);
                continue;
            }

            if line.is_empty() {
                current = None;
                continue;
            }

            if let (Some(key), Some(caps)) = (&current, VALUE_PATTERN.captures(line)) {
                let name = unescape(&caps[1]);
                let data = unescape(&caps[2]);
                if let Some(values) = file.keys.get_mut(key) {
                    values.insert(name, data);
                }
            }
        }

        file
    }

    /// Value of the `#arch=` header, if present
    pub fn arch(&self) -> Option<&str> {
        self.arch.as_deref()
    }

    /// Look up a string value. Key paths use single backslashes and are
    /// compared case-insensitively, as Windows does.
    pub fn value(&self, key: &str, name: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, values)| {
                values
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v.as_str())
            })
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys.keys().any(|k| k.eq_ignore_ascii_case(key))
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
