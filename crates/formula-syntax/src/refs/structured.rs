//! Structured (table) references: `Table1[Col]`, `[@Col]`, `Table1[[#Headers],[A]:[B]]`.

use serde::{Deserialize, Serialize};

use super::{split_context, stringify_prefix, RefContext, RefParseOptions};
use crate::lexer::{tokenize, TokenizeOptions};
use crate::token::TokenKind;

/// Table section keyword (`#Headers`, `#This Row`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSection {
    Headers,
    Data,
    Totals,
    All,
    #[serde(rename = "this row")]
    ThisRow,
}

impl TableSection {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            TableSection::Headers => "#Headers",
            TableSection::Data => "#Data",
            TableSection::Totals => "#Totals",
            TableSection::All => "#All",
            TableSection::ThisRow => "#This Row",
        }
    }

    fn from_keyword(text: &str) -> Option<Self> {
        [
            TableSection::Headers,
            TableSection::Data,
            TableSection::Totals,
            TableSection::All,
            TableSection::ThisRow,
        ]
        .into_iter()
        .find(|s| s.keyword().eq_ignore_ascii_case(text))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredReference {
    pub context: RefContext,
    /// `None` for table-less references such as `[@Col]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Zero, one, or two (a column span) column names.
    pub columns: Vec<String>,
    pub sections: Vec<TableSection>,
}

/// Only these section combinations name a real region of a table.
fn valid_sections(sections: &[TableSection]) -> bool {
    use TableSection::{Data, Headers, Totals};
    let mut sorted = sections.to_vec();
    sorted.sort();
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return false;
    }
    matches!(sorted.as_slice(), [] | [_] | [Headers, Data] | [Data, Totals])
}

/// Resolve `'` escapes in a column name. Unescaped brackets are rejected.
fn unescape_column(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => out.push(chars.next()?),
            '[' | ']' => return None,
            _ => out.push(c),
        }
    }
    Some(out)
}

fn escape_column(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '[' | ']' | '#' | '\'') {
            out.push('\'');
        }
        out.push(c);
    }
    out
}

/// Columns that cannot be written as `[@Col]` without inner brackets.
fn needs_brackets(name: &str) -> bool {
    !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii())
}

fn has_unescaped(text: &str, needle: char) -> bool {
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\'' {
            chars.next();
        } else if c == needle {
            return true;
        }
    }
    false
}

/// Cursor over the inside of a bracketed specifier list.
struct ItemReader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ItemReader<'a> {
    fn skip_spaces(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start_matches(' ').len();
    }

    fn eat(&mut self, c: char) -> bool {
        if self.src[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// Read one `[...]` item and return its raw contents.
    fn item(&mut self) -> Option<&'a str> {
        if !self.eat('[') {
            return None;
        }
        let start = self.pos;
        let mut chars = self.src[start..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\'' => {
                    chars.next()?;
                }
                '[' => return None,
                ']' => {
                    self.pos = start + i + 1;
                    return Some(&self.src[start..start + i]);
                }
                _ => {}
            }
        }
        None
    }
}

/// Parse a bracketed body (`[...]`) into columns and sections.
pub(crate) fn parse_body(body: &str) -> Option<(Vec<String>, Vec<TableSection>)> {
    let inner = body.strip_prefix('[')?.strip_suffix(']')?;
    let (columns, sections) = if has_unescaped(inner, '[') {
        parse_nested(inner)?
    } else {
        parse_simple(inner)?
    };
    valid_sections(&sections).then_some((columns, sections))
}

fn parse_simple(inner: &str) -> Option<(Vec<String>, Vec<TableSection>)> {
    if inner.is_empty() {
        return Some((Vec::new(), Vec::new()));
    }
    if inner.starts_with('#') {
        return Some((Vec::new(), vec![TableSection::from_keyword(inner)?]));
    }
    if let Some(column) = inner.strip_prefix('@') {
        let column = unescape_column(column)?;
        if column.is_empty() {
            return None;
        }
        return Some((vec![column], vec![TableSection::ThisRow]));
    }
    Some((vec![unescape_column(inner)?], Vec::new()))
}

fn parse_nested(inner: &str) -> Option<(Vec<String>, Vec<TableSection>)> {
    let mut reader = ItemReader { src: inner, pos: 0 };
    let this_row = reader.eat('@');
    let mut sections = Vec::new();
    let mut columns: Vec<String> = Vec::new();

    loop {
        reader.skip_spaces();
        let item = reader.item()?;
        reader.skip_spaces();
        if reader.eat(':') {
            reader.skip_spaces();
            let end = reader.item()?;
            if !columns.is_empty() || item.starts_with('#') || end.starts_with('#') {
                return None;
            }
            columns.push(unescape_column(item)?);
            columns.push(unescape_column(end)?);
        } else if item.starts_with('#') {
            // Sections come before any column.
            if !columns.is_empty() {
                return None;
            }
            sections.push(TableSection::from_keyword(item)?);
        } else {
            if !columns.is_empty() {
                return None;
            }
            columns.push(unescape_column(item)?);
        }
        reader.skip_spaces();
        if reader.at_end() {
            break;
        }
        if !reader.eat(',') {
            return None;
        }
    }

    if this_row {
        if !sections.is_empty() || columns.len() != 1 {
            return None;
        }
        sections.push(TableSection::ThisRow);
    }
    Some((columns, sections))
}

fn is_table_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '\\' || c >= '\u{a1}'
}

fn is_table_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '\\') || c >= '\u{a1}'
}

/// Index one past the `]` that closes the `[` at `start`.
fn matching_bracket(src: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = src[start..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                chars.next();
            }
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Tokenizer entry point: an optional table name followed by a valid bracketed body.
pub(crate) fn scan(src: &str, pos: usize) -> Option<usize> {
    let rest = &src[pos..];
    let name_len = if rest.starts_with(is_table_start) {
        rest.find(|c: char| !is_table_char(c)).unwrap_or(rest.len())
    } else {
        0
    };
    let open = pos + name_len;
    if !src[open..].starts_with('[') {
        return None;
    }
    let end = matching_bracket(src, open)?;
    parse_body(&src[open..end])?;
    Some(end)
}

/// Parse a structured reference such as `Sheet1!Table1[[#Data],[Price]]`.
#[must_use]
pub fn parse_struct_ref(text: &str, options: &RefParseOptions) -> Option<StructuredReference> {
    let tokens = tokenize(
        text,
        &TokenizeOptions {
            merge_refs: false,
            negative_numbers: false,
            xlsx: options.xlsx,
            with_location: false,
            ..TokenizeOptions::default()
        },
    );
    let (context, rest) = split_context(&tokens, options.xlsx);
    let [token] = rest else {
        return None;
    };
    if token.kind != TokenKind::Structured {
        return None;
    }
    let open = token.value.find('[')?;
    let (columns, sections) = parse_body(&token.value[open..])?;
    let table = &token.value[..open];
    Some(StructuredReference {
        context,
        table: (!table.is_empty()).then(|| table.to_string()),
        columns,
        sections,
    })
}

/// Render a structured reference in its shortest form. With `this_row`, `[#This Row]` is always
/// spelled out instead of the `@` shorthand.
#[must_use]
pub fn stringify_struct_ref(reference: &StructuredReference, this_row: bool) -> String {
    let mut out = stringify_prefix(&reference.context);
    if let Some(table) = &reference.table {
        out.push_str(table);
    }
    let columns = &reference.columns;
    let sections = &reference.sections;

    if columns.is_empty() && sections.len() == 1 {
        out.push_str(&format!("[{}]", sections[0].keyword()));
        return out;
    }
    if sections.is_empty() && columns.len() == 1 {
        out.push_str(&format!("[{}]", escape_column(&columns[0])));
        return out;
    }
    if !this_row && sections.as_slice() == [TableSection::ThisRow] && columns.len() == 1 {
        let column = escape_column(&columns[0]);
        if needs_brackets(&columns[0]) {
            out.push_str(&format!("[@[{column}]]"));
        } else {
            out.push_str(&format!("[@{column}]"));
        }
        return out;
    }

    let mut items: Vec<String> = sections
        .iter()
        .map(|s| format!("[{}]", s.keyword()))
        .collect();
    match columns.as_slice() {
        [] => {}
        [column] => items.push(format!("[{}]", escape_column(column))),
        [first, last, ..] => items.push(format!(
            "[{}]:[{}]",
            escape_column(first),
            escape_column(last)
        )),
    }
    out.push('[');
    out.push_str(&items.join(","));
    out.push(']');
    out
}
