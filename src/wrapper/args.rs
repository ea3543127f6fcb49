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

//! Data-driven command-line classification.
//!
//! A wrapper describes each option it knows as an `ArgInfo` paired with a
//! wrapper-specific attribute, in a sorted table. `ArgsIter` walks raw
//! arguments, matches them against the table (including `-optvalue` and
//! `-opt=value` spellings) and yields classified arguments together with
//! their attributes. Unknown tokens come out as `UnknownFlag` or `Raw`.

use std::cmp::Ordering;

/// How the value of an option with a value is attached.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ArgDisposition {
    /// Only as `-arg value`.
    Separated,
    /// Only as `-arg<delimiter>value`.
    Concatenated(Option<u8>),
    /// As `-arg value` or `-arg<delimiter>value`.
    CanBeSeparated(Option<u8>),
}

/// The description of one option.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum ArgInfo {
    /// A flag with no value, e.g. `--version`.
    Flag(&'static str),
    /// An option with a value, e.g. `--emit link` / `--emit=link`.
    TakeArg(&'static str, ArgDisposition),
}

/// One classified argument.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Argument {
    /// A non-flag token the table doesn't know, e.g. `foo.rs`.
    Raw(String),
    /// A flag-looking token the table doesn't know, e.g. `-Zfoo`.
    UnknownFlag(String),
    /// A known flag. Options that expect a separate value but hit the end
    /// of the command line also come out as this; wrappers that require
    /// the value report it as missing.
    Flag(&'static str),
    /// A known option with its value.
    WithValue(&'static str, String),
}

impl Argument {
    pub fn to_str(&self) -> &str {
        match *self {
            Argument::Raw(ref s) | Argument::UnknownFlag(ref s) => s,
            Argument::Flag(s) | Argument::WithValue(s, _) => s,
        }
    }

    pub fn get_value(&self) -> Option<&str> {
        match *self {
            Argument::WithValue(_, ref v) => Some(v),
            _ => None,
        }
    }
}

impl ArgInfo {
    /// Turn a matching raw token into a classified `Argument`. For options
    /// whose value comes as the following token, `get_next_arg` supplies
    /// it.
    fn process<F>(&self, arg: &str, get_next_arg: F) -> Argument
    where
        F: FnOnce() -> Option<String>,
    {
        match *self {
            ArgInfo::Flag(s) => {
                debug_assert_eq!(s, arg);
                Argument::Flag(s)
            }
            ArgInfo::TakeArg(s, ArgDisposition::Separated) => {
                debug_assert_eq!(s, arg);
                match get_next_arg() {
                    Some(value) => Argument::WithValue(s, value),
                    None => Argument::Flag(s),
                }
            }
            ArgInfo::TakeArg(s, ArgDisposition::Concatenated(d)) => {
                Self::process_concatenated(s, d, arg)
            }
            ArgInfo::TakeArg(s, ArgDisposition::CanBeSeparated(d)) => {
                if arg == s {
                    match (get_next_arg(), d) {
                        (Some(value), _) => Argument::WithValue(s, value),
                        // A delimiterless option at the end of the command
                        // line has an (empty) concatenated value.
                        (None, None) => Argument::WithValue(s, String::new()),
                        (None, Some(_)) => Argument::Flag(s),
                    }
                } else {
                    Self::process_concatenated(s, d, arg)
                }
            }
        }
    }

    /// Handles the `ArgDisposition::Concatenated` case without going
    /// through the generic `process` to avoid unbounded monomorphization
    /// when called recursively from the `CanBeSeparated` arm.
    fn process_concatenated(s: &'static str, d: Option<u8>, arg: &str) -> Argument {
        let mut len = s.len();
        debug_assert_eq!(&arg[..len], s);
        if let Some(d) = d {
            debug_assert_eq!(arg.as_bytes()[len], d);
            len += 1;
        }
        Argument::WithValue(s, arg[len..].to_owned())
    }

    /// Whether `arg` matches this description, and if not, how it differs.
    /// Options with concatenated values prefix-match.
    fn cmp(&self, arg: &str) -> Ordering {
        match *self {
            ArgInfo::TakeArg(s, ArgDisposition::Concatenated(None))
            | ArgInfo::TakeArg(s, ArgDisposition::CanBeSeparated(None))
                if arg.starts_with(s) =>
            {
                Ordering::Equal
            }
            ArgInfo::TakeArg(s, ArgDisposition::Concatenated(Some(d)))
            | ArgInfo::TakeArg(s, ArgDisposition::CanBeSeparated(Some(d)))
                if arg.len() > s.len() && arg.starts_with(s) =>
            {
                arg.as_bytes()[s.len()].cmp(&d)
            }
            _ => self.as_str().cmp(arg),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            ArgInfo::Flag(s) | ArgInfo::TakeArg(s, _) => s,
        }
    }
}

/// Binary search with a comparison function that may prefix-match: when
/// several adjacent items match, the last one wins (so `--crate-name`
/// beats `--crate` would-be prefixes).
fn bsearch<'a, K, T, F>(key: K, items: &'a [T], cmp: F) -> Option<&'a T>
where
    F: Copy + Fn(&T, &K) -> Ordering,
{
    let mut slice = items;
    while !slice.is_empty() {
        let middle = slice.len() / 2;
        match cmp(&slice[middle], &key) {
            Ordering::Equal => {
                let found_after = if slice.len() == 1 {
                    None
                } else {
                    bsearch(key, &slice[middle + 1..], cmp)
                };
                return found_after.or(Some(&slice[middle]));
            }
            Ordering::Greater => {
                slice = &slice[..middle];
            }
            Ordering::Less => {
                slice = &slice[middle + 1..];
            }
        }
    }
    None
}

/// A classified argument together with its table attribute. `data` is
/// `None` for tokens the table doesn't describe.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ArgumentItem<A> {
    pub arg: Argument,
    pub data: Option<A>,
}

/// An iterator of classified arguments.
pub struct ArgsIter<I, A: 'static> {
    arguments: I,
    table: &'static [(ArgInfo, A)],
}

impl<I, A> ArgsIter<I, A>
where
    I: Iterator<Item = String>,
    A: Copy + 'static,
{
    /// `table` must be sorted by option string (checked in debug builds).
    pub fn new(arguments: I, table: &'static [(ArgInfo, A)]) -> Self {
        debug_assert!(table
            .windows(2)
            .all(|w| w[0].0.as_str() < w[1].0.as_str()));
        ArgsIter { arguments, table }
    }
}

impl<I, A> Iterator for ArgsIter<I, A>
where
    I: Iterator<Item = String>,
    A: Copy + 'static,
{
    type Item = ArgumentItem<A>;

    fn next(&mut self) -> Option<Self::Item> {
        let arg = self.arguments.next()?;
        let table = self.table;
        match bsearch(arg.as_str(), table, |entry, k| entry.0.cmp(*k)) {
            Some(&(ref info, data)) => {
                let arguments = &mut self.arguments;
                Some(ArgumentItem {
                    arg: info.process(&arg, || arguments.next()),
                    data: Some(data),
                })
            }
            None => Some(ArgumentItem {
                arg: if arg.starts_with('-') {
                    Argument::UnknownFlag(arg)
                } else {
                    Argument::Raw(arg)
                },
                data: None,
            }),
        }
    }
}

/// Define a flag table entry: `flag!("-foo", attribute)`.
macro_rules! flag {
    ($s:expr, $d:expr) => {
        ($crate::wrapper::args::ArgInfo::Flag($s), $d)
    };
}

/// Define a value-taking table entry:
///     take_arg!("-foo", Separated, attribute)
///     take_arg!("-foo", Concatenated, attribute)
///     take_arg!("-foo", CanBeSeparated('='), attribute)
macro_rules! take_arg {
    ($s:expr, Separated, $d:expr) => {
        (
            $crate::wrapper::args::ArgInfo::TakeArg(
                $s,
                $crate::wrapper::args::ArgDisposition::Separated,
            ),
            $d,
        )
    };
    ($s:expr, $disp:ident, $d:expr) => {
        (
            $crate::wrapper::args::ArgInfo::TakeArg(
                $s,
                $crate::wrapper::args::ArgDisposition::$disp(None),
            ),
            $d,
        )
    };
    ($s:expr, $disp:ident($x:expr), $d:expr) => {
        (
            $crate::wrapper::args::ArgInfo::TakeArg(
                $s,
                $crate::wrapper::args::ArgDisposition::$disp(Some($x as u8)),
            ),
            $d,
        )
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_arginfo_cmp_flag() {
        let (info, _) = flag!("-foo", 0);
        assert_eq!(info.cmp("-foo"), Ordering::Equal);
        assert_eq!(info.cmp("bar"), Ordering::Less);
        assert_eq!(info.cmp("-bar"), Ordering::Greater);
        assert_eq!(info.cmp("-qux"), Ordering::Less);
        assert_eq!(info.cmp("-foobar"), Ordering::Less);
        assert_eq!(info.cmp("-foo=bar"), Ordering::Less);
    }

    #[test]
    fn test_arginfo_cmp_concatenated() {
        let (info, _) = take_arg!("-foo", Concatenated, 0);
        assert_eq!(info.cmp("-foo"), Ordering::Equal);
        assert_eq!(info.cmp("-foobar"), Ordering::Equal);
        assert_eq!(info.cmp("-foo=bar"), Ordering::Equal);
        assert_eq!(info.cmp("-bar"), Ordering::Greater);
        assert_eq!(info.cmp("-qux"), Ordering::Less);

        let (info, _) = take_arg!("-foo", CanBeSeparated('='), 0);
        assert_eq!(info.cmp("-foo"), Ordering::Equal);
        assert_eq!(info.cmp("-foo="), Ordering::Equal);
        assert_eq!(info.cmp("-foo=bar"), Ordering::Equal);
        // The byte after the prefix decides the direction.
        assert_eq!(info.cmp("-foobar"), Ordering::Greater);
    }

    #[test]
    fn test_arginfo_process() {
        let (info, _) = flag!("-foo", 0);
        assert_eq!(info.process("-foo", || None), Argument::Flag("-foo"));

        let (info, _) = take_arg!("-foo", Separated, 0);
        assert_eq!(info.process("-foo", || None), Argument::Flag("-foo"));
        assert_eq!(
            info.process("-foo", || Some("bar".into())),
            Argument::WithValue("-foo", "bar".into())
        );

        let (info, _) = take_arg!("-foo", Concatenated, 0);
        assert_eq!(
            info.process("-foo", || None),
            Argument::WithValue("-foo", "".into())
        );
        assert_eq!(
            info.process("-foobar", || None),
            Argument::WithValue("-foo", "bar".into())
        );

        let (info, _) = take_arg!("-foo", Concatenated('='), 0);
        assert_eq!(
            info.process("-foo=", || None),
            Argument::WithValue("-foo", "".into())
        );
        assert_eq!(
            info.process("-foo=bar", || None),
            Argument::WithValue("-foo", "bar".into())
        );

        let (info, _) = take_arg!("-foo", CanBeSeparated, 0);
        assert_eq!(
            info.process("-foo", || None),
            Argument::WithValue("-foo", "".into())
        );
        assert_eq!(
            info.process("-foobar", || None),
            Argument::WithValue("-foo", "bar".into())
        );
        assert_eq!(
            info.process("-foo", || Some("bar".into())),
            Argument::WithValue("-foo", "bar".into())
        );

        let (info, _) = take_arg!("-foo", CanBeSeparated('='), 0);
        assert_eq!(info.process("-foo", || None), Argument::Flag("-foo"));
        assert_eq!(
            info.process("-foo=", || None),
            Argument::WithValue("-foo", "".into())
        );
        assert_eq!(
            info.process("-foo=bar", || None),
            Argument::WithValue("-foo", "bar".into())
        );
        assert_eq!(
            info.process("-foo", || Some("bar".into())),
            Argument::WithValue("-foo", "bar".into())
        );
    }

    #[test]
    fn test_bsearch_prefix_matches() {
        let data = vec![
            ("a", 1),
            ("ab", 2),
            ("abc", 3),
            ("abd", 4),
            ("abe", 5),
            ("abef", 6),
            ("abefg", 7),
        ];
        for item in &data {
            assert_eq!(
                bsearch(item.0, &data, |i, k| if k.starts_with(i.0) {
                    Ordering::Equal
                } else {
                    i.0.cmp(k)
                }),
                Some(item)
            );
        }
        // Try again with an even number of items.
        let data = &data[..6];
        for item in data {
            assert_eq!(
                bsearch(item.0, data, |i, k| if k.starts_with(i.0) {
                    Ordering::Equal
                } else {
                    i.0.cmp(k)
                }),
                Some(item)
            );
        }
    }

    static TEST_ARGS: [(ArgInfo, u8); 5] = [
        flag!("-bar", 1),
        take_arg!("-foo", Separated, 2),
        take_arg!("-hoge", Concatenated, 3),
        take_arg!("-qux", CanBeSeparated('='), 4),
        flag!("-zorglub", 5),
    ];

    fn classify(args: &[&str]) -> Vec<ArgumentItem<u8>> {
        ArgsIter::new(args.iter().map(|s| (*s).to_owned()), &TEST_ARGS[..]).collect()
    }

    #[test]
    fn test_argsiter() {
        let items = classify(&[
            "-nomatch",
            "-foo",
            "value",
            "-hoge",
            "value", // -hoge doesn't take a separate value
            "-hoge=value", // = is not recognized as a separator
            "-hogevalue",
            "-zorglub",
            "-qux",
            "value",
            "-quxbar", // -quxbar is not -qux with a value of bar
            "-qux=value",
            "plain",
        ]);
        let expected = vec![
            ArgumentItem { arg: Argument::UnknownFlag("-nomatch".into()), data: None },
            ArgumentItem { arg: Argument::WithValue("-foo", "value".into()), data: Some(2) },
            ArgumentItem { arg: Argument::WithValue("-hoge", "".into()), data: Some(3) },
            ArgumentItem { arg: Argument::Raw("value".into()), data: None },
            ArgumentItem { arg: Argument::WithValue("-hoge", "=value".into()), data: Some(3) },
            ArgumentItem { arg: Argument::WithValue("-hoge", "value".into()), data: Some(3) },
            ArgumentItem { arg: Argument::Flag("-zorglub"), data: Some(5) },
            ArgumentItem { arg: Argument::WithValue("-qux", "value".into()), data: Some(4) },
            ArgumentItem { arg: Argument::UnknownFlag("-quxbar".into()), data: None },
            ArgumentItem { arg: Argument::WithValue("-qux", "value".into()), data: Some(4) },
            ArgumentItem { arg: Argument::Raw("plain".into()), data: None },
        ];
        assert_eq!(items, expected);
    }

    #[test]
    fn test_argsiter_separated_at_end() {
        let items = classify(&["-foo"]);
        assert_eq!(
            items,
            vec![ArgumentItem { arg: Argument::Flag("-foo"), data: Some(2) }]
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn test_args_iter_unsorted() {
        static BAD: [(ArgInfo, u8); 2] = [flag!("-foo", 1), flag!("-bar", 2)];
        let _ = ArgsIter::new(Vec::<String>::new().into_iter(), &BAD[..]);
    }
}
