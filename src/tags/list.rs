// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tag list
//!
//! [`TagList::create`] collects the records of one tag (or tag prefix) into
//! arena memory. The list then helps navigate to a record: it resolves the
//! record's source file relative to the tags file and relocates the line the
//! record points at, even when the source has changed since it was tagged.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use super::file::{IndexOptions, TagFile};
use super::iterator::{TagIterator, DEFAULT_WINDOW_SIZE};
use super::line::{parse_u32, TagKind, TagLineProps};
use super::TagOrder;
use crate::arena::{Arena, ArenaStr};
use crate::errors::{Result, TagError};
use crate::reader::{self, FileReader, ReaderKind, ReaderWindow, ScanStep};

/// Longest field kept in a record
pub const MAX_FIELD_SIZE: usize = 1024;
/// Default cap on the number of records
pub const DEFAULT_MAX_ITEMS: usize = 200;

const SOURCE_WINDOW_SIZE: usize = 128 * 1024;
const STRING_ARENA_PAGE: usize = 8 * 1024;
const CYGWIN_PREFIX: &str = "/cygdrive";

#[derive(Debug, Clone, Copy)]
struct TagListItem {
    tag: ArenaStr,
    file_name: ArenaStr,
    ex_cmd: ArenaStr,
    kind_text: ArenaStr,
    line_text: ArenaStr,
    ext_fields: ArenaStr,
    kind: TagKind,
}

/// One record of a [`TagList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRecord<'a> {
    pub tag: &'a [u8],
    pub file_name: &'a [u8],
    pub ex_cmd: &'a [u8],
    pub kind_text: &'a [u8],
    pub line_text: &'a [u8],
    pub ext_fields: &'a [u8],
    pub kind: TagKind,
}

impl TagRecord<'_> {
    /// Declared line number from the `line:N` field
    pub fn declared_line(&self) -> Option<u32> {
        parse_u32(self.line_text)
    }
}

#[derive(Debug, Clone)]
struct LineHint {
    tag: Vec<u8>,
    line: u32,
}

/// Bounded list of the records matching one query
#[derive(Debug)]
pub struct TagList {
    items: Vec<TagListItem>,
    strings: Arena,
    tags_path: PathBuf,
    order: TagOrder,
    line_hint: Option<LineHint>,
    options: IndexOptions,
    window_size: usize,
}

impl Default for TagList {
    fn default() -> Self {
        Self::new()
    }
}

impl TagList {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            strings: Arena::new(STRING_ARENA_PAGE),
            tags_path: PathBuf::new(),
            order: TagOrder::CaseSensitive,
            line_hint: None,
            options: IndexOptions::default(),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Options used when `create` has to open the tags file itself
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Scan window used while collecting records
    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Collect up to `max_items` records for `tag` from the tags file at
    /// `tags_path`.
    ///
    /// `shared_index`, when given, must be open on `tags_path`; it keeps its
    /// cache across lists. Records from a previous `create` are dropped, and
    /// so is the line hint.
    pub fn create(
        &mut self,
        tag: impl AsRef<[u8]>,
        tags_path: impl AsRef<Path>,
        shared_index: Option<&mut TagFile>,
        prefix_match: bool,
        max_items: usize,
    ) -> Result<()> {
        let tag = tag.as_ref();
        self.items.clear();
        self.strings.reset();
        self.line_hint = None;
        self.tags_path = tags_path.as_ref().to_path_buf();

        let mut owned;
        let index = match shared_index {
            Some(index) => index,
            None => {
                owned = TagFile::open(&self.tags_path, self.options)?;
                &mut owned
            }
        };
        self.order = index.order();

        let mut iter = TagIterator::new(prefix_match);
        iter.init(index, tag, self.window_size)?;

        while self.items.len() < max_items {
            if iter.next_line()?.is_none() {
                break;
            }
            let props = match iter.line_props() {
                Ok(props) => props,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping malformed tag line");
                    continue;
                }
            };

            let checkpoint = self.strings.checkpoint();
            match store(&mut self.strings, &props) {
                Ok(item) => self.items.push(item),
                Err(err) => {
                    self.strings.rewind(checkpoint);
                    return Err(err);
                }
            }
        }

        tracing::debug!(
            tag = %String::from_utf8_lossy(tag),
            records = self.items.len(),
            scanned = iter.line_count(),
            string_bytes = self.strings.allocated_bytes(),
            string_pages = self.strings.page_count(),
            "tag list created"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn tags_path(&self) -> &Path {
        &self.tags_path
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.order.is_case_insensitive()
    }

    pub fn get(&self, index: usize) -> Option<TagRecord<'_>> {
        self.items.get(index).map(|item| self.record(item))
    }

    /// Records in file order
    pub fn iter(&self) -> impl Iterator<Item = TagRecord<'_>> + '_ {
        self.items.iter().map(|item| self.record(item))
    }

    fn record(&self, item: &TagListItem) -> TagRecord<'_> {
        TagRecord {
            tag: self.strings.get(item.tag),
            file_name: self.strings.get(item.file_name),
            ex_cmd: self.strings.get(item.ex_cmd),
            kind_text: self.strings.get(item.kind_text),
            line_text: self.strings.get(item.line_text),
            ext_fields: self.strings.get(item.ext_fields),
            kind: item.kind,
        }
    }

    /// Remember the line number that came with the query (`name:12`). It
    /// applies to `file` records named `tag`.
    pub fn set_line_hint(&mut self, tag: impl AsRef<[u8]>, line: u32) {
        self.line_hint = Some(LineHint {
            tag: tag.as_ref().to_vec(),
            line,
        });
    }

    /// Split `name:12` or `name(12)` into name and line number
    pub fn parse_line_hint(query: &str) -> Option<(&str, u32)> {
        let (name, digits) = if let Some(inner) = query.strip_suffix(')') {
            inner.rsplit_once('(')?
        } else {
            query.rsplit_once(':')?
        };
        if name.is_empty() {
            return None;
        }
        let line = parse_u32(digits.as_bytes())?;
        Some((name, line))
    }

    /// Locate the source file of `record`.
    ///
    /// Absolute names are tried as given and then, for Cygwin
    /// (`/cygdrive/c/...`) and MinGW (`/c/...`) style names, as a Windows
    /// drive path. Relative names are resolved against the directory of the
    /// tags file.
    pub fn resolve_source_path(&self, record: &TagRecord<'_>) -> Result<PathBuf> {
        let name = String::from_utf8_lossy(record.file_name);
        if is_absolute_name(&name) {
            let direct = PathBuf::from(name.as_ref());
            if direct.is_file() {
                return Ok(direct);
            }
            for prefix in [CYGWIN_PREFIX, ""] {
                if let Some(converted) = drive_path(&name, prefix) {
                    let converted = PathBuf::from(converted);
                    if converted.is_file() {
                        return Ok(converted);
                    }
                }
            }
            return Err(TagError::FileNotFound(direct));
        }

        let base = self.tags_path.parent().unwrap_or_else(|| Path::new(""));
        let joined = base.join(name.as_ref());
        if joined.is_file() {
            Ok(joined)
        } else {
            Err(TagError::FileNotFound(joined))
        }
    }

    /// Resolve and open the source file of `record`
    pub fn open_source_file(
        &self,
        record: &TagRecord<'_>,
        kind: ReaderKind,
    ) -> Result<(Box<dyn FileReader>, PathBuf)> {
        let path = self.resolve_source_path(record)?;
        let mut reader = reader::create(kind);
        reader.open(&path, false)?;
        Ok((reader, path))
    }

    /// 1-based line of `record` in the source `lines` walk over.
    ///
    /// Tried in order: the line hint (for `file` records), a numeric
    /// ex-command, the search pattern, the pattern up to and including the
    /// tag, and finally the bare tag.
    pub fn find_line_number(
        &self,
        lines: &mut dyn LineSource,
        record: &TagRecord<'_>,
    ) -> Result<u32> {
        if record.kind == TagKind::File {
            if let Some(hint) = &self.line_hint {
                if hint.line > 0 && self.order.eq(&hint.tag, record.tag) {
                    return Ok(hint.line);
                }
            }
        }

        if let Some(line) = parse_u32(record.ex_cmd).filter(|&n| n >= 1) {
            return Ok(line);
        }

        let pattern = unescape_ex_cmd(record.ex_cmd);
        match search_lines(lines, &pattern) {
            Err(err) if is_search_miss(&err) => {}
            res => return res,
        }

        // The line may have changed around the tag; retry with the start of
        // the pattern through the tag
        if let Some(end) = self.order.find(&pattern, record.tag).map(|i| i + record.tag.len()) {
            match search_lines(lines, &pattern[..end]) {
                Err(err) if is_search_miss(&err) => {}
                res => return res,
            }
        }

        tracing::trace!(
            tag = %String::from_utf8_lossy(record.tag),
            "pattern not found, searching for the bare tag"
        );
        search_lines(lines, record.tag)
    }
}

/// Length of the identifier (`[A-Za-z0-9_]`) that `text` starts with
pub fn leading_word_len(text: &[u8]) -> usize {
    text.iter().take_while(|&&b| is_word_byte(b)).count()
}

/// End of the word ending at `word_end` extended over a following `.ext`,
/// for names such as `main.c` where only `main` was selected. `None` when
/// no `.` follows the word.
pub fn extend_over_extension(text: &[u8], word_end: usize) -> Option<usize> {
    if text.get(word_end) != Some(&b'.') {
        return None;
    }
    let ext = &text[word_end + 1..];
    Some(word_end + 1 + leading_word_len(ext))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Lines `first..=last` (1-based) with their numbers, fewer when the text
/// ends first
pub fn read_lines(
    lines: &mut dyn LineSource,
    first: u32,
    last: u32,
) -> Result<Vec<(u32, Vec<u8>)>> {
    let mut out = Vec::new();
    if first > last || !lines.move_to_first_line()? {
        return Ok(out);
    }
    let mut number = 1u32;
    loop {
        if number >= first {
            out.push((number, lines.line().to_vec()));
        }
        if number >= last || !lines.move_to_next_line()? {
            break;
        }
        number += 1;
    }
    Ok(out)
}

fn store(strings: &mut Arena, props: &TagLineProps<'_>) -> Result<TagListItem> {
    Ok(TagListItem {
        tag: strings.alloc(props.tag)?,
        file_name: strings.alloc(props.file_name)?,
        ex_cmd: strings.alloc(trim_field(props.ex_cmd))?,
        kind_text: strings.alloc(trim_field(props.kind_text))?,
        line_text: strings.alloc(trim_field(props.line_text))?,
        ext_fields: strings.alloc(trim_field(props.ext_fields))?,
        kind: props.kind,
    })
}

/// Cut a field to [`MAX_FIELD_SIZE`] without leaving a trailing `\`
fn trim_field(field: &[u8]) -> &[u8] {
    if field.len() <= MAX_FIELD_SIZE {
        return field;
    }
    let mut end = MAX_FIELD_SIZE;
    while end > 0 && field[end - 1] == b'\\' {
        end -= 1;
    }
    &field[..end]
}

/// Undo the `\\` and `\/` escapes of an ex search command
fn unescape_ex_cmd(ex_cmd: &[u8]) -> Cow<'_, [u8]> {
    if !ex_cmd.contains(&b'\\') {
        return Cow::Borrowed(ex_cmd);
    }
    let mut out = Vec::with_capacity(ex_cmd.len());
    let mut i = 0;
    while i < ex_cmd.len() {
        let b = ex_cmd[i];
        if b == b'\\' && matches!(ex_cmd.get(i + 1), Some(b'\\' | b'/')) {
            i += 1;
        }
        out.push(ex_cmd[i]);
        i += 1;
    }
    Cow::Owned(out)
}

fn is_search_miss(err: &TagError) -> bool {
    matches!(err, TagError::NotFound(_) | TagError::Invalid(_))
}

// 1-based number of the first line matching an ex search pattern. `/^`
// anchors at the line start, `$/` at the line end; otherwise any substring
// matches.
fn search_lines(lines: &mut dyn LineSource, pattern: &[u8]) -> Result<u32> {
    let mut pat = pattern;
    let mut from_start = false;
    let mut to_end = false;
    if let Some(rest) = pat.strip_prefix(b"/^") {
        pat = rest;
        from_start = true;
    }
    if let Some(rest) = pat.strip_suffix(b"$/") {
        pat = rest;
        to_end = true;
    }
    if pat.is_empty() {
        return Err(TagError::Invalid("empty search pattern".to_string()));
    }

    let not_found = || TagError::NotFound(String::from_utf8_lossy(pattern).into_owned());
    if !lines.move_to_first_line()? {
        return Err(not_found());
    }

    let mut number = 1u32;
    loop {
        let line = lines.line();
        let hit = match (from_start, to_end) {
            (true, true) => line == pat,
            (true, false) => line.starts_with(pat),
            (false, true) => line.ends_with(pat),
            (false, false) => line.windows(pat.len()).any(|w| w == pat),
        };
        if hit {
            return Ok(number);
        }
        if !lines.move_to_next_line()? {
            return Err(not_found());
        }
        number += 1;
    }
}

fn is_absolute_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes {
        [b'/' | b'\\', ..] => true,
        [drive, b':', b'\\', ..] => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

// `<prefix>/X/rest` to `X:\rest`
fn drive_path(name: &str, prefix: &str) -> Option<String> {
    let rest = name.strip_prefix(prefix)?;
    let bytes = rest.as_bytes();
    match bytes {
        [b'/', drive, b'/', _, ..] if drive.is_ascii_alphabetic() => {
            Some(format!("{}:\\{}", *drive as char, &rest[3..]))
        }
        _ => None,
    }
}

/// Sequential access to the lines of a source text
pub trait LineSource {
    /// Rewind to the first line. False when there are no lines.
    fn move_to_first_line(&mut self) -> Result<bool>;

    /// Advance one line. False at the end.
    fn move_to_next_line(&mut self) -> Result<bool>;

    /// Current line without its end-of-line bytes
    fn line(&self) -> &[u8];
}

/// Lines of a file read through a sliding window
pub struct FileLineSource<'r> {
    reader: &'r dyn FileReader,
    window: Option<ReaderWindow<'r>>,
}

impl<'r> FileLineSource<'r> {
    pub fn new(reader: &'r dyn FileReader) -> Self {
        Self {
            reader,
            window: None,
        }
    }

    fn advance(&mut self) -> Result<bool> {
        let Some(window) = self.window.as_mut() else {
            return Ok(false);
        };
        // An overlong line still counts as a line, with empty text
        match window.find_next_full_line(true)? {
            ScanStep::Line | ScanStep::TooBig => Ok(true),
            ScanStep::End => {
                self.window = None;
                Ok(false)
            }
        }
    }
}

impl LineSource for FileLineSource<'_> {
    fn move_to_first_line(&mut self) -> Result<bool> {
        self.window = Some(ReaderWindow::init(self.reader, 0, SOURCE_WINDOW_SIZE)?);
        self.advance()
    }

    fn move_to_next_line(&mut self) -> Result<bool> {
        self.advance()
    }

    fn line(&self) -> &[u8] {
        match &self.window {
            Some(window) => window.line(),
            None => &[],
        }
    }
}

/// Lines of an in-memory buffer, such as an editor document
pub struct BufferLineSource<'a> {
    text: &'a [u8],
    start: usize,
    end: usize,
    next: usize,
}

impl<'a> BufferLineSource<'a> {
    pub fn new(text: &'a [u8]) -> Self {
        Self {
            text,
            start: 0,
            end: 0,
            next: 0,
        }
    }

    fn advance(&mut self) -> bool {
        if self.next >= self.text.len() {
            self.start = self.text.len();
            self.end = self.text.len();
            return false;
        }
        let rest = &self.text[self.next..];
        let eol = rest.iter().position(|&b| b == b'\n' || b == b'\r');
        self.start = self.next;
        match eol {
            Some(i) => {
                self.end = self.next + i;
                let crlf = rest[i] == b'\r' && rest.get(i + 1) == Some(&b'\n');
                self.next = self.end + if crlf { 2 } else { 1 };
            }
            None => {
                self.end = self.text.len();
                self.next = self.text.len();
            }
        }
        true
    }
}

impl LineSource for BufferLineSource<'_> {
    fn move_to_first_line(&mut self) -> Result<bool> {
        self.next = 0;
        Ok(self.advance())
    }

    fn move_to_next_line(&mut self) -> Result<bool> {
        Ok(self.advance())
    }

    fn line(&self) -> &[u8] {
        &self.text[self.start..self.end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "!_TAG_FILE_FORMAT\t2\t/extended format/\n!_TAG_FILE_SORTED\t1\t/0=unsorted, 1=sorted, 2=foldcase/\n";

    const SOURCE: &str = "#include <stdio.h>\n\
                          \n\
                          static int counter;\n\
                          \n\
                          int main(int argc, char **argv)\n\
                          {\n\
                          \x20   return helper(argc);\n\
                          }\n";

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write file");
    }

    fn record<'a>(tag: &'a [u8], ex_cmd: &'a [u8], kind: TagKind) -> TagRecord<'a> {
        TagRecord {
            tag,
            file_name: b"src/main.c",
            ex_cmd,
            kind_text: b"",
            line_text: b"",
            ext_fields: b"",
            kind,
        }
    }

    #[test]
    fn create_collects_records_in_file_order() {
        let dir = TempDir::new().expect("tempdir");
        let tags = dir.path().join("tags");
        write_file(
            &tags,
            &format!(
                "{HEADER}counter\tsrc/main.c\t/^static int counter;$/;\"\tv\tfile:\n\
                 main\tsrc/main.c\t/^int main(int argc, char **argv)$/;\"\tf\tline:5\n\
                 main\tsrc/other.c\t12;\"\tf\n\
                 mainloop\tsrc/loop.c\t3;\"\tkind:function\n"
            ),
        );

        let mut list = TagList::new();
        list.create("main", &tags, None, false, DEFAULT_MAX_ITEMS).expect("create");
        assert_eq!(list.len(), 2);
        let files: Vec<&[u8]> = list.iter().map(|r| r.file_name).collect();
        assert_eq!(files, vec![&b"src/main.c"[..], &b"src/other.c"[..]]);
        let first = list.get(0).expect("record");
        assert_eq!(first.kind, TagKind::Function);
        assert_eq!(first.declared_line(), Some(5));

        list.create("main", &tags, None, true, DEFAULT_MAX_ITEMS).expect("create");
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(2).expect("record").kind, TagKind::Function);

        list.create("main", &tags, None, true, 1).expect("create");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn create_with_shared_index_keeps_cache() {
        let dir = TempDir::new().expect("tempdir");
        let tags = dir.path().join("tags");
        let mut content = String::from(HEADER);
        for i in 0..300 {
            content.push_str(&format!("sym{i:04}\tf{i}.c\t{i};\"\tv\n"));
        }
        write_file(&tags, &content);

        let options = IndexOptions {
            page_size: 128,
            ..IndexOptions::default()
        };
        let mut index = TagFile::open(&tags, options).expect("open");
        let mut list = TagList::new();
        list.create("sym0150", &tags, Some(&mut index), false, 10).expect("create");
        assert_eq!(list.len(), 1);
        assert!(index.descriptor_count() > 0);

        list.create("sym02", &tags, Some(&mut index), true, 500).expect("create");
        assert_eq!(list.len(), 100);
    }

    #[test]
    fn missing_tags_file() {
        let dir = TempDir::new().expect("tempdir");
        let mut list = TagList::new();
        let err = list
            .create("x", dir.path().join("tags"), None, false, 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = TempDir::new().expect("tempdir");
        let tags = dir.path().join("tags");
        write_file(&tags, &format!("{HEADER}dup\tonly_file\ndup\tok.c\t1;\"\tf\n"));
        let mut list = TagList::new();
        list.create("dup", &tags, None, false, 10).expect("create");
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(0).expect("record").file_name, b"ok.c");
    }

    #[test]
    fn long_fields_are_trimmed_without_trailing_backslash() {
        let mut field = vec![b'a'; MAX_FIELD_SIZE - 2];
        field.extend_from_slice(b"\\\\\\\\tail");
        let trimmed = trim_field(&field);
        assert_eq!(trimmed.len(), MAX_FIELD_SIZE - 2);
        assert!(!trimmed.ends_with(b"\\"));
        assert_eq!(trim_field(b"short\\"), b"short\\");
    }

    #[test]
    fn unescape_slashes() {
        assert_eq!(unescape_ex_cmd(b"/^a\\/b\\\\c$/").as_ref(), b"/^a/b\\c$/");
        assert!(matches!(unescape_ex_cmd(b"/^plain$/"), Cow::Borrowed(_)));
        assert_eq!(unescape_ex_cmd(b"x\\n").as_ref(), b"x\\n");
    }

    #[test]
    fn line_hint_parsing() {
        assert_eq!(TagList::parse_line_hint("main.c:12"), Some(("main.c", 12)));
        assert_eq!(TagList::parse_line_hint("main.c(7)"), Some(("main.c", 7)));
        assert_eq!(TagList::parse_line_hint("C:\\src\\a.c:3"), Some(("C:\\src\\a.c", 3)));
        assert_eq!(TagList::parse_line_hint("main.c"), None);
        assert_eq!(TagList::parse_line_hint("main.c:"), None);
        assert_eq!(TagList::parse_line_hint(":4"), None);
        assert_eq!(TagList::parse_line_hint("f(x)"), None);
    }

    #[test]
    fn line_number_strategies() {
        let list = TagList::new();
        let mut lines = BufferLineSource::new(SOURCE.as_bytes());

        // Numeric ex-command
        let r = record(b"main", b"5", TagKind::Function);
        assert_eq!(list.find_line_number(&mut lines, &r).unwrap(), 5);

        // Anchored pattern
        let r = record(b"main", b"/^int main(int argc, char **argv)$/", TagKind::Function);
        assert_eq!(list.find_line_number(&mut lines, &r).unwrap(), 5);

        let r = record(b"counter", b"/^static int counter;$/", TagKind::Variable);
        assert_eq!(list.find_line_number(&mut lines, &r).unwrap(), 3);

        // Line edited after tagging: falls back to the prefix through the tag
        let r = record(b"main", b"/^int main(void)$/", TagKind::Function);
        assert_eq!(list.find_line_number(&mut lines, &r).unwrap(), 5);

        // Pattern without the tag: bare tag search
        let r = record(b"helper", b"/^gone$/", TagKind::Function);
        assert_eq!(list.find_line_number(&mut lines, &r).unwrap(), 7);

        let r = record(b"absent", b"/^gone$/", TagKind::Function);
        assert_eq!(
            list.find_line_number(&mut lines, &r).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn only_anchored_slashes_are_stripped() {
        let mut lines = BufferLineSource::new(b"path\npath/\n/^x\n");
        assert_eq!(search_lines(&mut lines, b"path/").unwrap(), 2);
        assert_eq!(search_lines(&mut lines, b"/^path/$/").unwrap(), 2);
        assert_eq!(search_lines(&mut lines, b"/^path$/").unwrap(), 1);
        assert_eq!(
            search_lines(&mut lines, b"/path").unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let list = TagList::new();
        let r = record(b"path/", b"/^gone$/", TagKind::Variable);
        assert_eq!(list.find_line_number(&mut lines, &r).unwrap(), 2);
    }

    #[test]
    fn word_and_extension_spans() {
        let text = b"main.c:12 and more";
        assert_eq!(leading_word_len(text), 4);
        assert_eq!(extend_over_extension(text, 4), Some(6));
        assert_eq!(extend_over_extension(b"util.", 4), Some(5));
        assert_eq!(extend_over_extension(b"util.inner_x(", 4), Some(12));
        assert_eq!(extend_over_extension(b"main(", 4), None);
        assert_eq!(extend_over_extension(b"main", 4), None);
        assert_eq!(leading_word_len(b"::x"), 0);
    }

    #[test]
    fn read_lines_clips_to_text() {
        let mut lines = BufferLineSource::new(SOURCE.as_bytes());
        let around_main = read_lines(&mut lines, 4, 6).unwrap();
        let numbers: Vec<u32> = around_main.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![4, 5, 6]);
        assert_eq!(around_main[1].1, b"int main(int argc, char **argv)");

        let tail = read_lines(&mut lines, 7, 20).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].1, b"}");
        assert!(read_lines(&mut lines, 5, 4).unwrap().is_empty());
    }

    #[test]
    fn line_hint_applies_to_file_records() {
        let mut list = TagList::new();
        list.set_line_hint("main.c", 42);
        let mut lines = BufferLineSource::new(SOURCE.as_bytes());

        let file = record(b"main.c", b"1", TagKind::File);
        assert_eq!(list.find_line_number(&mut lines, &file).unwrap(), 42);

        let func = record(b"main.c", b"1", TagKind::Function);
        assert_eq!(list.find_line_number(&mut lines, &func).unwrap(), 1);
    }

    #[test]
    fn file_line_source_counts_every_line() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("main.c");
        write_file(&src, "a\r\nb\n\nd");
        let mut reader = reader::create(ReaderKind::Buffered);
        reader.open(&src, false).expect("open");

        let mut lines = FileLineSource::new(reader.as_ref());
        let mut seen = Vec::new();
        let mut more = lines.move_to_first_line().expect("first");
        while more {
            seen.push(String::from_utf8_lossy(lines.line()).into_owned());
            more = lines.move_to_next_line().expect("next");
        }
        assert_eq!(seen, vec!["a", "b", "", "d"]);

        let list = TagList::new();
        let r = record(b"d", b"/^d$/", TagKind::Variable);
        assert_eq!(list.find_line_number(&mut lines, &r).unwrap(), 4);
    }

    #[test]
    fn resolves_relative_names_against_tags_dir() {
        let dir = TempDir::new().expect("tempdir");
        let tags = dir.path().join("proj").join("tags");
        write_file(&tags, &format!("{HEADER}main\tsrc/main.c\t1;\"\tf\n"));
        write_file(&dir.path().join("proj/src/main.c"), SOURCE);

        let mut list = TagList::new();
        list.create("main", &tags, None, false, 10).expect("create");
        let rec = list.get(0).expect("record");
        let path = list.resolve_source_path(&rec).expect("resolve");
        assert_eq!(path, dir.path().join("proj").join("src/main.c"));

        let (reader, opened) = list.open_source_file(&rec, ReaderKind::Mapped).expect("open");
        assert_eq!(opened, path);
        let mut lines = FileLineSource::new(reader.as_ref());
        let r = record(b"main", b"/^int main(int argc, char **argv)$/", TagKind::Function);
        assert_eq!(list.find_line_number(&mut lines, &r).unwrap(), 5);
    }

    #[test]
    fn absolute_and_drive_names() {
        let dir = TempDir::new().expect("tempdir");
        let src = dir.path().join("abs.c");
        write_file(&src, SOURCE);
        let name = src.to_string_lossy().into_owned();

        let list = TagList::new();
        let mut rec = record(b"main", b"1", TagKind::Function);
        rec.file_name = name.as_bytes();
        assert_eq!(list.resolve_source_path(&rec).expect("resolve"), src);

        rec.file_name = b"/cygdrive/q/definitely/missing.c";
        assert_eq!(
            list.resolve_source_path(&rec).unwrap_err().kind(),
            ErrorKind::FileNotFound
        );

        assert!(is_absolute_name("/usr/src/a.c"));
        assert!(is_absolute_name("C:\\src\\a.c"));
        assert!(!is_absolute_name("src/a.c"));
        assert_eq!(drive_path("/cygdrive/c/src/a.c", CYGWIN_PREFIX).as_deref(), Some("c:\\src/a.c"));
        assert_eq!(drive_path("/d/work/a.c", "").as_deref(), Some("d:\\work/a.c"));
        assert_eq!(drive_path("/usr/src/a.c", ""), None);
    }
}
