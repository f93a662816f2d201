// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tag line fields
//!
//! A tag line is `TAG<TAB>FILE<TAB>EX_CMD;"<TAB>EXT...` where the extension
//! block is a tab separated list that starts with the kind (a letter, a long
//! name or `kind:NAME`) and may carry `line:N`.

use serde::Serialize;
use std::fmt;

use crate::errors::{Result, TagError};

const EXT_SEPARATOR: &[u8] = b";\"";

/// Kind of symbol a tag describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    File,
    Class,
    Macro,
    EnumValue,
    Function,
    Enum,
    Local,
    Member,
    Namespace,
    Prototype,
    Struct,
    Typedef,
    Union,
    Variable,
    External,
    #[default]
    Unknown,
}

impl TagKind {
    /// Map a kind letter or a long kind name
    pub fn parse(text: &[u8]) -> Self {
        match text {
            [letter] => Self::from_letter(*letter),
            _ => Self::from_name(text),
        }
    }

    pub fn from_letter(letter: u8) -> Self {
        match letter {
            b'F' => TagKind::File,
            b'c' => TagKind::Class,
            b'd' => TagKind::Macro,
            b'e' => TagKind::EnumValue,
            b'f' => TagKind::Function,
            b'g' => TagKind::Enum,
            b'l' => TagKind::Local,
            b'm' => TagKind::Member,
            b'n' => TagKind::Namespace,
            b'p' => TagKind::Prototype,
            b's' => TagKind::Struct,
            b't' => TagKind::Typedef,
            b'u' => TagKind::Union,
            b'v' => TagKind::Variable,
            b'x' => TagKind::External,
            _ => TagKind::Unknown,
        }
    }

    pub fn from_name(name: &[u8]) -> Self {
        match name {
            b"file" => TagKind::File,
            b"class" => TagKind::Class,
            b"macro" => TagKind::Macro,
            b"enumerator" => TagKind::EnumValue,
            b"function" => TagKind::Function,
            b"enum" => TagKind::Enum,
            b"local" => TagKind::Local,
            b"member" => TagKind::Member,
            b"namespace" => TagKind::Namespace,
            b"prototype" => TagKind::Prototype,
            b"struct" => TagKind::Struct,
            b"typedef" => TagKind::Typedef,
            b"union" => TagKind::Union,
            b"variable" => TagKind::Variable,
            b"externvar" => TagKind::External,
            _ => TagKind::Unknown,
        }
    }

    pub fn letter(self) -> char {
        match self {
            TagKind::File => 'F',
            TagKind::Class => 'c',
            TagKind::Macro => 'd',
            TagKind::EnumValue => 'e',
            TagKind::Function => 'f',
            TagKind::Enum => 'g',
            TagKind::Local => 'l',
            TagKind::Member => 'm',
            TagKind::Namespace => 'n',
            TagKind::Prototype => 'p',
            TagKind::Struct => 's',
            TagKind::Typedef => 't',
            TagKind::Union => 'u',
            TagKind::Variable => 'v',
            TagKind::External => 'x',
            TagKind::Unknown => '?',
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::File => "file",
            TagKind::Class => "class",
            TagKind::Macro => "macro",
            TagKind::EnumValue => "enumerator",
            TagKind::Function => "function",
            TagKind::Enum => "enum",
            TagKind::Local => "local",
            TagKind::Member => "member",
            TagKind::Namespace => "namespace",
            TagKind::Prototype => "prototype",
            TagKind::Struct => "struct",
            TagKind::Typedef => "typedef",
            TagKind::Union => "union",
            TagKind::Variable => "variable",
            TagKind::External => "externvar",
            TagKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Fields of one tag line, borrowed from the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLineProps<'a> {
    pub tag: &'a [u8],
    pub file_name: &'a [u8],
    pub ex_cmd: &'a [u8],
    /// Kind text without a `kind:` header, empty when absent
    pub kind_text: &'a [u8],
    /// Digits of `line:N`, empty when absent
    pub line_text: &'a [u8],
    /// Extension fields following the kind (and a `line:N` right after it)
    pub ext_fields: &'a [u8],
    pub kind: TagKind,
}

impl<'a> TagLineProps<'a> {
    /// Split a line into fields.
    ///
    /// `tag_size` is the offset of the first tab, as found by the reader
    /// window. Lines without a file name and ex-command are `Invalid`.
    pub fn parse(line: &'a [u8], tag_size: Option<usize>) -> Result<Self> {
        let invalid = || TagError::Invalid(String::from_utf8_lossy(line).into_owned());

        let tag_size = tag_size.ok_or_else(invalid)?;
        let tag = &line[..tag_size];
        let rest = &line[tag_size + 1..];

        let file_end = rest.iter().position(|&b| b == b'\t').ok_or_else(invalid)?;
        let file_name = &rest[..file_end];
        let rest = &rest[file_end + 1..];
        if rest.is_empty() {
            return Err(invalid());
        }

        let (ex_cmd, ext) = split_ex_cmd(rest);
        let mut props = TagLineProps {
            tag,
            file_name,
            ex_cmd,
            kind_text: &[],
            line_text: &[],
            ext_fields: &[],
            kind: TagKind::Unknown,
        };
        if let Some(ext) = ext {
            props.parse_extension(ext);
        }
        Ok(props)
    }

    fn parse_extension(&mut self, ext: &'a [u8]) {
        // The kind is the first non-empty token, unless that token is a
        // `key:value` pair other than `kind:`.
        let mut fields_start = 0;
        let mut has_kind = false;
        if let Some((token, end)) = Tokens::new(ext).next() {
            if let Some(kind) = token.strip_prefix(b"kind:") {
                self.kind_text = kind;
                has_kind = true;
            } else if !token.contains(&b':') {
                self.kind_text = token;
                has_kind = true;
            }
            if has_kind {
                fields_start = end;
            }
        }
        self.kind = TagKind::parse(self.kind_text);

        let line_pos = usize::from(has_kind);
        for (idx, (token, end)) in Tokens::new(ext).enumerate() {
            if let Some(digits) = token.strip_prefix(b"line:") {
                self.line_text = digits;
                if idx == line_pos {
                    fields_start = end;
                }
                break;
            }
        }

        self.ext_fields = skip_tabs(&ext[fields_start..]);
    }

    /// Declared line number from `line:N`
    pub fn line_number(&self) -> Option<u32> {
        parse_u32(self.line_text)
    }
}

fn split_ex_cmd(rest: &[u8]) -> (&[u8], Option<&[u8]>) {
    let mut i = 0;
    while i + 1 < rest.len() {
        if &rest[i..i + 2] == EXT_SEPARATOR {
            match rest.get(i + 2) {
                None => return (&rest[..i], None),
                Some(b'\t') => return (&rest[..i], Some(&rest[i + 3..])),
                Some(_) => {}
            }
        }
        i += 1;
    }
    (rest, None)
}

fn skip_tabs(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&b| b != b'\t').unwrap_or(s.len());
    &s[start..]
}

/// Parse an unsigned decimal made only of digits
pub(crate) fn parse_u32(s: &[u8]) -> Option<u32> {
    if s.is_empty() || !s.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(s).ok()?.parse().ok()
}

/// Non-empty tab separated tokens with the offset just past each one
struct Tokens<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(s: &'a [u8]) -> Self {
        Self { s, pos: 0 }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = (&'a [u8], usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.s.len() {
            let start = self.pos;
            let end = self.s[start..]
                .iter()
                .position(|&b| b == b'\t')
                .map_or(self.s.len(), |i| start + i);
            self.pos = end + 1;
            if end > start {
                return Some((&self.s[start..end], end));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn parse(line: &str) -> TagLineProps<'_> {
        let tab = line.find('\t');
        TagLineProps::parse(line.as_bytes(), tab).expect("parse")
    }

    #[test]
    fn full_line_with_kind_and_line() {
        let p = parse("main\tsrc/main.c\t/^int main(void)$/;\"\tf\tline:12\tsignature:(void)");
        assert_eq!(p.tag, b"main");
        assert_eq!(p.file_name, b"src/main.c");
        assert_eq!(p.ex_cmd, b"/^int main(void)$/");
        assert_eq!(p.kind, TagKind::Function);
        assert_eq!(p.kind_text, b"f");
        assert_eq!(p.line_number(), Some(12));
        assert_eq!(p.ext_fields, b"signature:(void)");
    }

    #[test]
    fn kind_header_and_long_names() {
        let p = parse("Point\tgeo.h\t10;\"\tkind:struct\tfile:");
        assert_eq!(p.kind, TagKind::Struct);
        assert_eq!(p.kind_text, b"struct");
        assert_eq!(p.ex_cmd, b"10");
        assert_eq!(p.ext_fields, b"file:");
        assert_eq!(p.line_number(), None);
    }

    #[test]
    fn line_not_next_to_kind_stays_in_fields() {
        let p = parse("x\ta.c\t3;\"\tv\tfile:\tline:3");
        assert_eq!(p.kind, TagKind::Variable);
        assert_eq!(p.line_number(), Some(3));
        assert_eq!(p.ext_fields, b"file:\tline:3");
    }

    #[test]
    fn no_extension_block() {
        let p = parse("FOO\tdefs.h\t/^#define FOO 1$/");
        assert_eq!(p.ex_cmd, b"/^#define FOO 1$/");
        assert_eq!(p.kind, TagKind::Unknown);
        assert!(p.ext_fields.is_empty());

        let p = parse("FOO\tdefs.h\t7;\"");
        assert_eq!(p.ex_cmd, b"7");
    }

    #[test]
    fn separator_inside_pattern_is_kept() {
        let p = parse("s\ta.c\t/^char *s = \";\"x;$/;\"\tv");
        assert_eq!(p.ex_cmd, b"/^char *s = \";\"x;$/");
        assert_eq!(p.kind, TagKind::Variable);
    }

    #[test]
    fn unknown_letter() {
        let p = parse("k\ta.rs\t1;\"\tZ");
        assert_eq!(p.kind, TagKind::Unknown);
        assert_eq!(p.kind_text, b"Z");
    }

    #[test]
    fn missing_fields_are_invalid() {
        for line in ["tagonly", "tag\tfile", "tag\tfile\t"] {
            let tab = line.find('\t');
            let err = TagLineProps::parse(line.as_bytes(), tab).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Invalid, "{line:?}");
        }
    }

    #[test]
    fn kind_round_trips_through_letter_and_name() {
        for kind in [TagKind::File, TagKind::Function, TagKind::External, TagKind::EnumValue] {
            assert_eq!(TagKind::from_letter(kind.letter() as u8), kind);
            assert_eq!(TagKind::from_name(kind.to_string().as_bytes()), kind);
        }
    }
}
