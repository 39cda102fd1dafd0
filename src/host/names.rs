use std::cmp::Ordering;

/// Longest name the host accepts for a single path component, in UTF-16 code units.
pub const MAX_NAME_LEN: usize = 255;

const RESERVED_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Name handling owned by the virtualization host.
///
/// Providers never reimplement these rules; they consume them through this trait so
/// that listings match and sort exactly the way the host expects.
pub trait NameRules: Send + Sync {
    /// Wildcard match of `name` against the listing pattern. `None` matches everything.
    fn matches(&self, name: &str, pattern: Option<&str>) -> bool;

    /// Collation order in which entries are returned to the host.
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Whether `name` may appear as a path component on the host.
    fn is_valid_name(&self, name: &str) -> bool;
}

/// Case-insensitive rules: `*` and `?` wildcards, uppercase-folded ordinal collation.
#[derive(Debug, Default, Copy, Clone)]
pub struct HostNameRules;

fn fold(s: &str) -> Vec<char> {
    s.chars().flat_map(char::to_uppercase).collect()
}

fn wildcard_match(name: &[char], pattern: &[char]) -> bool {
    let (mut n, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                n += 1;
                p += 1;
            }
            _ => match star {
                Some((sp, sn)) => {
                    p = sp + 1;
                    n = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

impl NameRules for HostNameRules {
    fn matches(&self, name: &str, pattern: Option<&str>) -> bool {
        match pattern {
            None | Some("") | Some("*") => true,
            Some(pattern) => wildcard_match(&fold(name), &fold(pattern)),
        }
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
    }

    fn is_valid_name(&self, name: &str) -> bool {
        !name.is_empty()
            && name != "."
            && name != ".."
            && name.encode_utf16().count() <= MAX_NAME_LEN
            && !name
                .chars()
                .any(|c| c.is_control() || RESERVED_CHARS.contains(&c))
    }
}
