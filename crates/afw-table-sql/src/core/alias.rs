//! Reverse alias resolution.
//!
//! The catalog library resolves a field name by replacing the longest prefix
//! found in the schema's alias map with its target, repeating until no prefix
//! matches or as many replacements as there are map entries have been made.
//! [`aliases_for`] inverts that process: it computes every name that resolves
//! to a given field.

use std::collections::BTreeSet;

/// Compute the set of aliases that resolve to `name`.
///
/// `mappings` holds `(alias prefix, target prefix)` pairs sorted by alias
/// prefix. A candidate alias produced by reversing rule `i` is kept only if no
/// longer alias prefix (which sorts after rule `i`) also matches it, since the
/// longer rule would win during forward resolution.
pub fn aliases_for(name: &str, mappings: &[(String, String)]) -> BTreeSet<String> {
    let mut aliases = BTreeSet::new();
    let mut frontier = BTreeSet::from([name.to_string()]);
    let mut rounds = 0;

    while rounds < mappings.len() && !frontier.is_empty() {
        rounds += 1;
        let mut next = BTreeSet::new();
        for current in &frontier {
            for (i, (source, target)) in mappings.iter().enumerate() {
                let Some(rest) = current.strip_prefix(target.as_str()) else {
                    continue;
                };
                let alias = format!("{}{}", source, rest);
                if is_longest_prefix(&alias, i, mappings) {
                    aliases.insert(alias.clone());
                    next.insert(alias);
                }
            }
        }
        frontier = next;
    }

    aliases
}

/// Whether `mappings[i]` is the longest alias prefix matching `alias`.
///
/// Prefixes extending `mappings[i].0` sort directly after it, so the scan
/// stops at the first entry that does not extend it.
fn is_longest_prefix(alias: &str, i: usize, mappings: &[(String, String)]) -> bool {
    let source = &mappings[i].0;
    for (longer, _) in &mappings[i + 1..] {
        if !longer.starts_with(source.as_str()) {
            break;
        }
        if alias.starts_with(longer.as_str()) {
            return false;
        }
    }
    true
}
