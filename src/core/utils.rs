use crate::core::WELL_KNOWN_ROOTS;

/// Component separator used by the host for paths under the virtualization root.
pub const SEPARATOR: char = '\\';

/// Display name of a key's unnamed (default) value.
pub const DEFAULT_VALUE_NAME: &str = "@";

/// Splits `path` into its non-empty components.
/// Both `\` and `/` are accepted; empty components are dropped.
pub fn split(path: &str) -> Vec<&str> {
    path.split(['\\', '/']).filter(|c| !c.is_empty()).collect()
}

/// Joins a parent path and a child name with [`SEPARATOR`].
pub fn join(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches(['\\', '/']);
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

/// Returns true if `path` denotes the virtualization root.
pub fn is_virtual_root(path: &str) -> bool {
    split(path).is_empty()
}

/// Returns the canonical spelling of a well-known root name, matched case-insensitively.
pub fn well_known_root(name: &str) -> Option<&'static str> {
    WELL_KNOWN_ROOTS
        .iter()
        .copied()
        .find(|root| root.eq_ignore_ascii_case(name))
}

/// Case-insensitive name comparison, as the store resolves names.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_uppercase() == b.to_uppercase()
}

/// Maps a stored value name to the name shown to the host.
pub fn display_value_name(name: &str) -> &str {
    if name.is_empty() { DEFAULT_VALUE_NAME } else { name }
}
