// Copyright 2024 The compcache authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::ops::{Add, AddAssign, Index};
use std::slice;

/// An ordered list of UTF-8 argument strings.
///
/// This is the canonical representation of command lines, environment
/// entries and file lists throughout the crate. Indexing is bounds-checked;
/// indexing out of range is a programmer error and panics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArgList {
    items: Vec<String>,
}

/// Characters (besides whitespace) that force a token to be quoted by
/// `join_quoted`.
const SHELL_META: &str = "\"'\\$&|;<>(){}[]*?~#";

fn needs_quoting(token: &str) -> bool {
    token.is_empty() || token.chars().any(|c| c.is_whitespace() || SHELL_META.contains(c))
}

fn quote(token: &str) -> String {
    let mut out = String::with_capacity(token.len() + 2);
    out.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl ArgList {
    pub fn new() -> ArgList {
        ArgList { items: vec![] }
    }

    /// Split `s` on `sep` into exactly k+1 fields for k separator
    /// occurrences. Fields are never trimmed and empty fields are never
    /// collapsed, so `split`/`join` round-trip.
    pub fn split(s: &str, sep: char) -> ArgList {
        ArgList {
            items: s.split(sep).map(str::to_owned).collect(),
        }
    }

    pub fn push<S: Into<String>>(&mut self, item: S) {
        self.items.push(item.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, String> {
        self.items.iter()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.iter().any(|i| i == item)
    }

    pub fn first(&self) -> Option<&String> {
        self.items.first()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn sort(&mut self) {
        self.items.sort();
    }

    /// Join the tokens with `sep`. Round-trips with `split` as long as no
    /// token contains the separator.
    pub fn join(&self, sep: char) -> String {
        let mut out = String::new();
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push(sep);
            }
            out.push_str(item);
        }
        out
    }

    /// Like `join`, but tokens containing whitespace or shell
    /// metacharacters are wrapped in double quotes, with `"` and `\`
    /// backslash-escaped. Suitable for log output meant to be pasted into
    /// a shell.
    pub fn join_quoted(&self, sep: char) -> String {
        let mut out = String::new();
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push(sep);
            }
            if needs_quoting(item) {
                out.push_str(&quote(item));
            } else {
                out.push_str(item);
            }
        }
        out
    }
}

impl Index<usize> for ArgList {
    type Output = String;

    fn index(&self, index: usize) -> &String {
        &self.items[index]
    }
}

impl Add for ArgList {
    type Output = ArgList;

    fn add(mut self, other: ArgList) -> ArgList {
        self.items.extend(other.items);
        self
    }
}

impl AddAssign for ArgList {
    fn add_assign(&mut self, other: ArgList) {
        self.items.extend(other.items);
    }
}

impl From<Vec<String>> for ArgList {
    fn from(items: Vec<String>) -> ArgList {
        ArgList { items }
    }
}

impl FromIterator<String> for ArgList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> ArgList {
        ArgList {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ArgList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArgList {
    type Item = &'a String;
    type IntoIter = slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.join(' '))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_exact_fields() {
        let l = ArgList::split("a=b=c", '=');
        assert_eq!(l, ArgList::from(stringvec!["a", "b", "c"]));
        // Empty fields are preserved, never collapsed.
        let l = ArgList::split("a==b", '=');
        assert_eq!(l, ArgList::from(stringvec!["a", "", "b"]));
        let l = ArgList::split("=", '=');
        assert_eq!(l, ArgList::from(stringvec!["", ""]));
        // k separators yield exactly k+1 fields.
        assert_eq!(ArgList::split("", ',').len(), 1);
        assert_eq!(ArgList::split(",,,", ',').len(), 4);
    }

    #[test]
    fn test_join_split_round_trip() {
        // join-split is the identity for tokens without the separator.
        for token in &["t", "hello world", "--emit=link", ""] {
            let mut l = ArgList::new();
            l.push(*token);
            assert_eq!(ArgList::split(&l.join(','), ','), l);
        }
        let l = ArgList::from(stringvec!["a", "b c", "d"]);
        assert_eq!(ArgList::split(&l.join('\0'), '\0'), l);
    }

    #[test]
    fn test_join_quoted() {
        let l = ArgList::from(stringvec!["gcc", "-DNAME=\"value\"", "foo bar.c"]);
        assert_eq!(l.join_quoted(' '), "gcc \"-DNAME=\\\"value\\\"\" \"foo bar.c\"");
        let l = ArgList::from(stringvec!["back\\slash"]);
        assert_eq!(l.join_quoted(' '), "\"back\\\\slash\"");
        // Plain tokens are left alone.
        let l = ArgList::from(stringvec!["-c", "foo.c"]);
        assert_eq!(l.join_quoted(' '), "-c foo.c");
    }

    #[test]
    fn test_concatenation() {
        let empty = ArgList::new();
        let l = ArgList::from(stringvec!["a", "b"]);
        // Left-concat with empty is the identity.
        assert_eq!(empty.clone() + l.clone(), l);
        let both = ArgList::from(stringvec!["a", "b", "a", "b"]);
        assert_eq!(l.clone() + l.clone(), both);
        let mut l2 = l.clone();
        l2 += ArgList::from(stringvec!["c"]);
        assert_eq!(l2, ArgList::from(stringvec!["a", "b", "c"]));
    }

    #[test]
    fn test_index() {
        let l = ArgList::from(stringvec!["x", "y"]);
        assert_eq!(l[0], "x");
        assert_eq!(l[1], "y");
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_range() {
        let l = ArgList::new();
        let _ = &l[0];
    }

    #[test]
    fn test_equality_is_elementwise() {
        assert_eq!(
            ArgList::from(stringvec!["a", "b"]),
            ArgList::from(stringvec!["a", "b"])
        );
        assert_ne!(
            ArgList::from(stringvec!["a", "b"]),
            ArgList::from(stringvec!["b", "a"])
        );
        assert_eq!(ArgList::new(), ArgList::default());
    }
}
