//! `${name}` substitution over raw document text.

use serde_json::{Map, Value};

/// Replaces every `${name}` token whose name is in `vars` with the JSON
/// encoding of its value.
///
/// Substitution is a single pass over the input: replacement text is never
/// rescanned, and tokens naming unknown variables stay as they are.
#[must_use]
pub fn substitute(raw: &str, vars: &Map<String, Value>) -> String {
    if vars.is_empty() {
        return raw.to_string();
    }

    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let name = &after[..end];
        match vars.get(name) {
            Some(value) => output.push_str(&value.to_string()),
            None => output.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    output
}
