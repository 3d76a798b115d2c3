use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z0-9_]+)\s*=\s*(.*)$").expect("static regex compile"));

const TRIPLE_QUOTE: &str = "\"\"\"";

/// Parses a `key = value` manifest.
///
/// Values opening with `"""` run until the next line containing `"""`; the
/// collected lines are joined with `\n` and trimmed. Blank lines and `#`
/// comments outside of such blocks are ignored.
pub fn parse_manifest(text: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    let mut lines = text.lines();

    while let Some(raw) = lines.next() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(caps) = ENTRY_RE.captures(line) else {
            continue;
        };

        let key = caps[1].to_string();
        let mut value = caps[2].trim().to_string();

        if let Some(rest) = value.strip_prefix(TRIPLE_QUOTE) {
            value = match rest.strip_suffix(TRIPLE_QUOTE) {
                Some(inline) => inline.to_string(),
                None => {
                    let mut parts: Vec<&str> = Vec::new();
                    if !rest.is_empty() {
                        parts.push(rest);
                    }
                    for next in lines.by_ref() {
                        if let Some((head, _)) = next.split_once(TRIPLE_QUOTE) {
                            if !head.trim().is_empty() {
                                parts.push(head);
                            }
                            break;
                        }
                        parts.push(next);
                    }
                    parts.join("\n").trim().to_string()
                }
            };
        }

        entries.insert(key, value);
    }

    entries
}
