//! Small helpers shared across modules.

use crate::reactive::Value;

/// Convert a camelCase name to kebab-case: `"fooBar"` → `"foo-bar"`.
///
/// A hyphen goes before each uppercase ASCII letter that follows a letter
/// or digit; the result is lowercased.
pub fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_is_word = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() && prev_is_word {
            out.push('-');
        }
        out.push(ch.to_ascii_lowercase());
        prev_is_word = ch.is_alphanumeric() || ch == '_';
    }
    out
}

/// Whether `value` is an array, directly or behind a proxy.
pub fn is_array(value: &Value) -> bool {
    match value {
        Value::Object(raw) => raw.is_array(),
        Value::Proxy(proxy) => proxy.is_array(),
        _ => false,
    }
}
