//! Output file names.

use std::collections::HashMap;

/// One name per identifier, in order. The first occurrence of an identifier
/// keeps it as is; later ones get `_2`, `_3` and so on.
pub fn assign_output_names<S: AsRef<str>>(identifiers: &[S]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    identifiers
        .iter()
        .map(|identifier| {
            let identifier = identifier.as_ref();
            let count = seen.entry(identifier).or_insert(0);
            *count += 1;
            if *count == 1 {
                identifier.to_owned()
            } else {
                format!("{}_{}", identifier, count)
            }
        })
        .collect()
}
