use std::cmp::Ordering;

/// Leading digits of one version component; "0rc1" is 0, "beta" is 0.
fn numeric_prefix(component: &str) -> u64 {
    let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Compares dotted version strings component-wise as integers,
/// ignoring non-numeric suffixes. Shorter versions compare as if
/// padded with zeros, so "13" == "13.0.0".
pub fn cmp_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<u64> = a.split('.').map(numeric_prefix).collect();
    let right: Vec<u64> = b.split('.').map(numeric_prefix).collect();

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    Ordering::Equal
}
