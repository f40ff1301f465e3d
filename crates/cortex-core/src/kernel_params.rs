//! Accessor for `kernel_params`: a short ASCII `key=value` string, separated
//! by `,`, `&`, or `\n`, carried opaquely everywhere else in the crate.
//!
//! Missing keys and malformed values both yield the caller-supplied default;
//! neither is an error, since a kernel is expected to run with its built-in
//! defaults when the harness passes an empty or partially-relevant string.

use std::collections::HashMap;

/// A parsed `kernel_params` string, keyed by the first `=` on each field.
#[derive(Debug, Clone, Default)]
pub struct KernelParams {
    fields: HashMap<String, String>,
}

impl KernelParams {
    /// Parse `raw`. Fields are separated by any of `,`, `&`, `\n`; a field
    /// with no `=` is ignored; a key repeated later in the string overrides
    /// an earlier one.
    pub fn parse(raw: &str) -> Self {
        let mut fields = HashMap::new();
        for field in raw.split([',', '&', '\n']) {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            if let Some((key, value)) = field.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    fields.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
        KernelParams { fields }
    }

    /// Build directly from the raw `kernel_params` bytes carried on a
    /// `CONFIG` frame, lossily decoding non-UTF-8 bytes.
    pub fn from_bytes(raw: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(raw))
    }

    /// Raw string value, or `None` if the key is absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// `true`/`false`/`1`/`0` (case-insensitive), falling back to `default`
    /// on an absent or unrecognized value.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            _ => default,
        }
    }

    /// Decimal or scientific-notation float, falling back to `default` on an
    /// absent or unparseable value.
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(default)
    }

    /// Decimal integer, falling back to `default` on an absent or
    /// unparseable value.
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(default)
    }

    /// String value, unquoting a single layer of matching `"..."` if present,
    /// falling back to `default` (borrowed, so the caller supplies a
    /// `'static` or owned fallback) when absent.
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get(key) {
            Some(v) => unquote(v),
            None => default,
        }
    }
}

fn unquote(v: &str) -> &str {
    let bytes = v.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        &v[1..v.len() - 1]
    } else {
        v
    }
}
