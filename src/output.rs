// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON output helpers shared by the commands

use serde::Serialize;

/// Serialize `value` to stdout, pretty unless `compact`
pub fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> serde_json::Result<()> {
    println!("{}", to_json(value, compact)?);
    Ok(())
}

pub fn to_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compact_has_no_newlines() {
        let value = json!({"tag": "main", "line": 3});
        assert!(!to_json(&value, true).unwrap().contains('\n'));
        assert!(to_json(&value, false).unwrap().contains('\n'));
    }
}
