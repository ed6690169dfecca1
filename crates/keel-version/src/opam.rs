//! Opam-style version strings and their ordering.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A version in opam's format.
///
/// Opam versions are free-form strings ordered by the Debian comparison
/// algorithm: the string is split into alternating non-digit and digit runs,
/// digit runs compare numerically, and within non-digit runs letters sort
/// before other characters with `~` sorting before everything, including the
/// end of the string (`1.0~beta < 1.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpamVersion(String);

impl OpamVersion {
    pub fn new(raw: impl Into<String>) -> Self {
        OpamVersion(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpamVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for OpamVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

impl PartialOrd for OpamVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rank of a single character within a non-digit run.
///
/// Letters sort before every other character, and `~` sorts before the end
/// of the string, which is represented by rank 0.
fn char_rank(c: char) -> i32 {
    if c == '~' {
        -1
    } else if c.is_ascii_alphabetic() {
        c as i32
    } else {
        c as i32 + 256
    }
}

fn compare_non_digit(a: &str, b: &str) -> Ordering {
    let mut xs = a.chars();
    let mut ys = b.chars();
    loop {
        match (xs.next(), ys.next()) {
            (None, None) => return Ordering::Equal,
            (x, y) => {
                let rx = x.map(char_rank).unwrap_or(0);
                let ry = y.map(char_rank).unwrap_or(0);
                match rx.cmp(&ry) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
        }
    }
}

fn split_run(s: &str, digits: bool) -> (&str, &str) {
    let end = s
        .find(|c: char| c.is_ascii_digit() != digits)
        .unwrap_or(s.len());
    s.split_at(end)
}

/// Debian-style comparison of two raw version strings.
pub(crate) fn compare(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        // Non-digit run first; an exhausted side compares as the empty run.
        let (na, rest_a) = split_run(a, false);
        let (nb, rest_b) = split_run(b, false);
        match compare_non_digit(na, nb) {
            Ordering::Equal => {}
            other => return other,
        }

        let (da, rest_a2) = split_run(rest_a, true);
        let (db, rest_b2) = split_run(rest_b, true);
        let va: u64 = da.parse().unwrap_or(0);
        let vb: u64 = db.parse().unwrap_or(0);
        match va.cmp(&vb) {
            Ordering::Equal => {}
            other => return other,
        }

        if rest_a2.is_empty() && rest_b2.is_empty() {
            return Ordering::Equal;
        }
        a = rest_a2;
        b = rest_b2;
    }
}
