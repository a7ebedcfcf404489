// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Natural (numeric-aware) ordering for interface names.

use std::cmp::Ordering;

/// Compares two strings treating runs of ASCII digits as numbers, so
/// "br-eth2" sorts before "br-eth10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chunks = chunks(a).into_iter();
    let mut b_chunks = chunks(b).into_iter();
    loop {
        match (a_chunks.next(), b_chunks.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (&x, &y) {
                    (Chunk::Number(m), Chunk::Number(n)) => m.cmp(n),
                    (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
                    (Chunk::Text(s), Chunk::Text(t)) => s.cmp(t),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Sorts a list of names in place with [`natural_cmp`].
pub fn natural_sort(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk {
    // u128 comfortably holds any digit run that fits in an interface
    // name.
    Number(u128),
    Text(String),
}

fn chunks(s: &str) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = None;
    for c in s.chars() {
        let is_digit = c.is_ascii_digit();
        if current_is_digit != Some(is_digit) && !current.is_empty() {
            out.push(finish(current, current_is_digit == Some(true)));
            current = String::new();
        }
        current.push(c);
        current_is_digit = Some(is_digit);
    }
    if !current.is_empty() {
        out.push(finish(current, current_is_digit == Some(true)));
    }
    out
}

fn finish(s: String, is_digit: bool) -> Chunk {
    if is_digit {
        match s.parse::<u128>() {
            Ok(n) => Chunk::Number(n),
            Err(_) => Chunk::Text(s),
        }
    } else {
        Chunk::Text(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_numeric_runs_compare_as_numbers() {
        let mut names = vec![
            "br-eth10".to_string(),
            "br-eth2".to_string(),
            "br-eth1".to_string(),
            "eth0".to_string(),
        ];
        natural_sort(&mut names);
        assert_eq!(names, vec!["br-eth1", "br-eth2", "br-eth10", "eth0"]);
    }

    #[test]
    fn test_mixed_prefixes() {
        assert_eq!(natural_cmp("eth2", "eth10"), Ordering::Less);
        assert_eq!(natural_cmp("eth10", "eth10"), Ordering::Equal);
        assert_eq!(natural_cmp("bond0", "br0"), Ordering::Less);
        // A digit chunk sorts before a text chunk at the same position.
        assert_eq!(natural_cmp("eth1x", "etha"), Ordering::Less);
    }
}
