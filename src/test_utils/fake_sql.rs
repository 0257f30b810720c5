//! The small SQL dialect the fake server understands.
//!
//! Enough of MySQL to drive both execution paths end to end: `CREATE TABLE`,
//! `DROP TABLE`, `INSERT`, `SELECT` (single table, one equality filter,
//! `ORDER BY`, `LIMIT`), literal-only `SELECT`, `UPDATE`, `DELETE`,
//! `SHOW TABLES`, and a handful of session statements accepted as no-ops.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};

use crate::catalog::NativeType;
use crate::client::{ColumnFlags, Field, TextRow};
use crate::error::ServerError;
use crate::placeholders::{is_quote, skip_quoted};

pub(crate) const ER_TABLE_EXISTS: u32 = 1050;
pub(crate) const ER_BAD_FIELD: u32 = 1054;
pub(crate) const ER_PARSE: u32 = 1064;
pub(crate) const ER_WRONG_VALUE_COUNT: u32 = 1136;
pub(crate) const ER_NO_SUCH_TABLE: u32 = 1146;
pub(crate) const ER_BAD_NULL: u32 = 1048;

static CREATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is-u)^create\s+table\s+(?:if\s+not\s+exists\s+)?`?(\w+)`?\s*\((.*)\)$")
        .expect("valid CREATE pattern")
});
static COLUMN_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is-u)^`?(\w+)`?\s+(\w+)(?:\s*\(\s*(\d+)(?:\s*,\s*(\d+))?\s*\))?\s*(.*)$")
        .expect("valid column pattern")
});
static DROP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is-u)^drop\s+table\s+(if\s+exists\s+)?`?(\w+)`?$").expect("valid DROP pattern")
});
static INSERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is-u)^insert\s+into\s+`?(\w+)`?\s*(?:\(([^)]*)\))?\s*values\s*(.*)$")
        .expect("valid INSERT pattern")
});
static SELECT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is-u)^select\s+(.+?)\s+from\s+`?(\w+)`?(?:\s+where\s+`?(\w+)`?\s*=\s*(.+?))?(?:\s+order\s+by\s+`?(\w+)`?(?:\s+(asc|desc))?)?(?:\s+limit\s+(.+?))?$",
    )
    .expect("valid SELECT pattern")
});
static SELECT_LITERALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is-u)^select\s+(.+)$").expect("valid SELECT pattern"));
static COUNT_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i-u)^count\(\s*\*\s*\)$").expect("valid COUNT pattern"));
static UPDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is-u)^update\s+`?(\w+)`?\s+set\s+(.+?)(?:\s+where\s+`?(\w+)`?\s*=\s*(.+))?$")
        .expect("valid UPDATE pattern")
});
static DELETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is-u)^delete\s+from\s+`?(\w+)`?(?:\s+where\s+`?(\w+)`?\s*=\s*(.+))?$")
        .expect("valid DELETE pattern")
});
static SHOW_TABLES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is-u)^show\s+tables$").expect("valid SHOW pattern"));
static SESSION_NOOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is-u)^(?:set|do|use|begin|start\s+transaction|commit|rollback)\b")
        .expect("valid session pattern")
});

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Rows { fields: Vec<Field>, rows: Vec<TextRow> },
    Affected { rows: u64, insert_id: u64, info: Option<String> },
}

impl Outcome {
    fn affected(rows: u64) -> Self {
        Outcome::Affected {
            rows,
            insert_id: 0,
            info: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Column {
    pub(crate) name: String,
    pub(crate) native_type: NativeType,
    pub(crate) length: u64,
    pub(crate) decimals: u8,
    pub(crate) flags: u32,
}

impl Column {
    fn field(&self, table: &str) -> Field {
        Field::new(&self.name, self.native_type)
            .with_table(table)
            .with_length(self.length)
            .with_decimals(self.decimals)
            .with_flags(self.flags)
    }

    fn is_integral(&self) -> bool {
        matches!(
            self.native_type,
            NativeType::Tiny
                | NativeType::Short
                | NativeType::Long
                | NativeType::Int24
                | NativeType::LongLong
                | NativeType::Year
        )
    }

    fn is_real(&self) -> bool {
        matches!(self.native_type, NativeType::Float | NativeType::Double)
    }

    fn is_decimal(&self) -> bool {
        matches!(self.native_type, NativeType::Decimal | NativeType::NewDecimal)
    }

    fn sorts_numerically(&self) -> bool {
        self.is_integral() || self.is_real() || self.is_decimal()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub(crate) columns: Vec<Column>,
    pub(crate) rows: Vec<TextRow>,
    next_auto_id: u64,
}

impl Table {
    pub(crate) fn fields(&self, name: &str) -> Vec<Field> {
        self.columns.iter().map(|c| c.field(name)).collect()
    }

    fn position(&self, column: &[u8]) -> Result<usize, ServerError> {
        let wanted = String::from_utf8_lossy(column);
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                ServerError::new(ER_BAD_FIELD, format!("Unknown column '{wanted}' in 'field list'"))
            })
    }
}

/// Every table on the server, keyed by lower-cased name.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    tables: BTreeMap<String, Table>,
}

/// Per-session flags that change statement results.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SessionFlags {
    pub(crate) found_rows: bool,
}

impl Catalog {
    pub(crate) fn table(&self, name: &str) -> Result<&Table, ServerError> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| no_such_table(name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, ServerError> {
        self.tables
            .get_mut(&name.to_ascii_lowercase())
            .ok_or_else(|| no_such_table(name))
    }

    pub(crate) fn run(&mut self, sql: &[u8], flags: SessionFlags) -> Result<Outcome, ServerError> {
        let mut sql = sql.trim_ascii();
        while let Some(rest) = sql.strip_suffix(b";") {
            sql = rest.trim_ascii_end();
        }

        if let Some(caps) = CREATE.captures(sql) {
            return self.create(&text(&caps, 1), group(&caps, 2));
        }
        if let Some(caps) = DROP.captures(sql) {
            let name = text(&caps, 2).to_ascii_lowercase();
            if self.tables.remove(&name).is_none() && caps.get(1).is_none() {
                return Err(no_such_table(&name));
            }
            return Ok(Outcome::affected(0));
        }
        if let Some(caps) = INSERT.captures(sql) {
            return self.insert(&text(&caps, 1), caps.get(2).map(|m| m.as_bytes()), group(&caps, 3));
        }
        if let Some(caps) = SELECT_FROM.captures(sql) {
            return self.select_from(&caps);
        }
        if let Some(caps) = SELECT_LITERALS.captures(sql) {
            return select_literals(group(&caps, 1));
        }
        if let Some(caps) = UPDATE.captures(sql) {
            return self.update(&caps, flags);
        }
        if let Some(caps) = DELETE.captures(sql) {
            return self.delete(&caps);
        }
        if SHOW_TABLES.is_match(sql) {
            let rows = self
                .tables
                .keys()
                .map(|name| vec![Some(name.clone().into_bytes())])
                .collect();
            return Ok(Outcome::Rows {
                fields: vec![Field::new("Tables_in_test", NativeType::VarString).with_length(64)],
                rows,
            });
        }
        if SESSION_NOOP.is_match(sql) {
            return Ok(Outcome::affected(0));
        }
        Err(syntax_error(sql))
    }

    fn create(&mut self, name: &str, body: &[u8]) -> Result<Outcome, ServerError> {
        let key = name.to_ascii_lowercase();
        if self.tables.contains_key(&key) {
            return Err(ServerError::new(
                ER_TABLE_EXISTS,
                format!("Table '{name}' already exists"),
            ));
        }
        let mut columns = Vec::new();
        for def in split_top_level(body) {
            let def = def.trim_ascii();
            if def.len() >= 11 && def[..11].eq_ignore_ascii_case(b"primary key") {
                continue;
            }
            let caps = COLUMN_DEF.captures(def).ok_or_else(|| syntax_error(def))?;
            let width = caps
                .get(3)
                .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
                .and_then(|s| s.parse::<u64>().ok());
            let scale = caps
                .get(4)
                .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
                .and_then(|s| s.parse::<u8>().ok());
            let (native_type, length, decimals, mut flags) =
                column_type(&text(&caps, 2), width, scale).ok_or_else(|| syntax_error(def))?;
            let modifiers = text(&caps, 5).to_ascii_lowercase();
            if modifiers.contains("not null") {
                flags |= ColumnFlags::NOT_NULL;
            }
            if modifiers.contains("primary key") {
                flags |= ColumnFlags::PRI_KEY | ColumnFlags::NOT_NULL;
            }
            if modifiers.contains("unique") {
                flags |= ColumnFlags::UNIQUE_KEY;
            }
            if modifiers.contains("unsigned") {
                flags |= ColumnFlags::UNSIGNED;
            }
            if modifiers.contains("auto_increment") {
                flags |= ColumnFlags::AUTO_INCREMENT;
            }
            columns.push(Column {
                name: text(&caps, 1),
                native_type,
                length,
                decimals,
                flags,
            });
        }
        self.tables.insert(
            key,
            Table {
                columns,
                rows: Vec::new(),
                next_auto_id: 1,
            },
        );
        Ok(Outcome::affected(0))
    }

    fn insert(
        &mut self,
        name: &str,
        column_list: Option<&[u8]>,
        values: &[u8],
    ) -> Result<Outcome, ServerError> {
        let table = self.table_mut(name)?;
        let targets: Vec<usize> = match column_list {
            Some(list) => split_top_level(list)
                .into_iter()
                .map(|c| table.position(c.trim_ascii().unquote_ident()))
                .collect::<Result<_, _>>()?,
            None => (0..table.columns.len()).collect(),
        };

        let tokens = tokenize(values)?;
        let tuples = parse_tuples(&tokens, values)?;
        let mut first_id = 0;
        let mut staged = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            if tuple.len() != targets.len() {
                return Err(ServerError::new(
                    ER_WRONG_VALUE_COUNT,
                    "Column count doesn't match value count at row 1",
                ));
            }
            let mut row: TextRow = vec![None; table.columns.len()];
            for (literal, &idx) in tuple.iter().zip(&targets) {
                row[idx] = coerce(&table.columns[idx], literal)?;
            }
            for (idx, column) in table.columns.iter().enumerate() {
                if column.flags & ColumnFlags::AUTO_INCREMENT != 0 && row[idx].is_none() {
                    let id = table.next_auto_id;
                    table.next_auto_id += 1;
                    if first_id == 0 {
                        first_id = id;
                    }
                    row[idx] = Some(id.to_string().into_bytes());
                } else if row[idx].is_none() && column.flags & ColumnFlags::NOT_NULL != 0 {
                    return Err(ServerError::new(
                        ER_BAD_NULL,
                        format!("Column '{}' cannot be null", column.name),
                    ));
                } else if column.flags & ColumnFlags::AUTO_INCREMENT != 0
                    && let Some(explicit) = row[idx].as_deref().and_then(parse_int)
                {
                    table.next_auto_id = table.next_auto_id.max(explicit.unsigned_abs() + 1);
                }
            }
            staged.push(row);
        }
        let count = staged.len() as u64;
        table.rows.extend(staged);
        Ok(Outcome::Affected {
            rows: count,
            insert_id: first_id,
            info: (count > 1).then(|| format!("Records: {count}  Duplicates: 0  Warnings: 0")),
        })
    }

    fn select_from(&self, caps: &Captures<'_>) -> Result<Outcome, ServerError> {
        let name = text(caps, 2);
        let table = self.table(&name)?;
        let mut rows: Vec<&TextRow> = match filter(table, caps.get(3), caps.get(4))? {
            Some((idx, wanted)) => table
                .rows
                .iter()
                .filter(|row| row[idx].is_some() && row[idx] == wanted)
                .collect(),
            None => table.rows.iter().collect(),
        };

        if let Some(order) = caps.get(5) {
            let idx = table.position(order.as_bytes())?;
            let column = &table.columns[idx];
            rows.sort_by(|a, b| compare_cells(column, a[idx].as_deref(), b[idx].as_deref()));
            if caps
                .get(6)
                .is_some_and(|m| m.as_bytes().eq_ignore_ascii_case(b"desc"))
            {
                rows.reverse();
            }
        }

        let projection = group(caps, 1).trim_ascii();
        if COUNT_STAR.is_match(projection) {
            return Ok(Outcome::Rows {
                fields: vec![
                    Field::new("COUNT(*)", NativeType::LongLong)
                        .with_length(21)
                        .with_flags(ColumnFlags::NOT_NULL | ColumnFlags::NUM | ColumnFlags::BINARY),
                ],
                rows: vec![vec![Some(rows.len().to_string().into_bytes())]],
            });
        }

        if let Some(limit) = caps.get(7) {
            let (offset, count) = parse_limit(limit.as_bytes())?;
            rows = rows.into_iter().skip(offset).take(count).collect();
        }

        let columns: Vec<usize> = if projection == b"*" {
            (0..table.columns.len()).collect()
        } else {
            split_top_level(projection)
                .into_iter()
                .map(|c| table.position(c.trim_ascii().unquote_ident()))
                .collect::<Result<_, _>>()?
        };

        Ok(Outcome::Rows {
            fields: columns.iter().map(|&i| table.columns[i].field(&name)).collect(),
            rows: rows
                .into_iter()
                .map(|row| columns.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    fn update(&mut self, caps: &Captures<'_>, flags: SessionFlags) -> Result<Outcome, ServerError> {
        let table = self.table_mut(&text(caps, 1))?;
        let assignments_src = group(caps, 2);
        let tokens = tokenize(assignments_src)?;
        let mut assignments = Vec::new();
        let mut iter = tokens.iter().map(|(t, _)| t);
        loop {
            let (Some(Token::Ident(column)), Some(Token::Eq), Some(Token::Lit(value))) =
                (iter.next(), iter.next(), iter.next())
            else {
                return Err(syntax_error(assignments_src));
            };
            let idx = table.position(column.as_bytes())?;
            assignments.push((idx, coerce(&table.columns[idx], value)?));
            match iter.next() {
                None => break,
                Some(Token::Comma) => {}
                Some(_) => return Err(syntax_error(assignments_src)),
            }
        }

        let selector = filter(table, caps.get(3), caps.get(4))?;
        let (mut matched, mut changed) = (0u64, 0u64);
        for row in &mut table.rows {
            if let Some((idx, wanted)) = &selector
                && (row[*idx].is_none() || row[*idx] != *wanted)
            {
                continue;
            }
            matched += 1;
            let mut touched = false;
            for (idx, value) in &assignments {
                if row[*idx] != *value {
                    row[*idx].clone_from(value);
                    touched = true;
                }
            }
            if touched {
                changed += 1;
            }
        }
        Ok(Outcome::Affected {
            rows: if flags.found_rows { matched } else { changed },
            insert_id: 0,
            info: Some(format!("Rows matched: {matched}  Changed: {changed}  Warnings: 0")),
        })
    }

    fn delete(&mut self, caps: &Captures<'_>) -> Result<Outcome, ServerError> {
        let table = self.table_mut(&text(caps, 1))?;
        let selector = filter(table, caps.get(2), caps.get(3))?;
        let before = table.rows.len();
        match selector {
            Some((idx, wanted)) => table
                .rows
                .retain(|row| row[idx].is_none() || row[idx] != wanted),
            None => table.rows.clear(),
        }
        Ok(Outcome::affected((before - table.rows.len()) as u64))
    }
}

/// Number of `?` markers outside quoted regions.
pub(crate) fn count_markers(sql: &[u8]) -> usize {
    let mut count = 0;
    let mut idx = 0;
    while idx < sql.len() {
        if is_quote(sql[idx]) {
            idx = skip_quoted(sql, idx);
            continue;
        }
        if sql[idx] == b'?' {
            count += 1;
        }
        idx += 1;
    }
    count
}

/// Replace each `?` marker with the matching literal, the way the server
/// applies bound parameters.
pub(crate) fn substitute(sql: &[u8], literals: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(sql.len() + literals.iter().map(Vec::len).sum::<usize>());
    let mut next = literals.iter();
    let mut idx = 0;
    while idx < sql.len() {
        if is_quote(sql[idx]) {
            let end = skip_quoted(sql, idx);
            out.extend_from_slice(&sql[idx..end]);
            idx = end;
            continue;
        }
        match sql[idx] {
            b'?' => match next.next() {
                Some(literal) => out.extend_from_slice(literal),
                None => out.push(b'?'),
            },
            b => out.push(b),
        }
        idx += 1;
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Null,
    Int(i64),
    /// Integer above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Text(Vec<u8>),
    Hex(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Lit(Literal),
    Ident(String),
    Comma,
    LParen,
    RParen,
    Eq,
    As,
}

fn tokenize(input: &[u8]) -> Result<Vec<(Token, Range<usize>)>, ServerError> {
    let mut tokens = Vec::new();
    let mut idx = 0;
    while idx < input.len() {
        let start = idx;
        let b = input[idx];
        let token = match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                idx += 1;
                continue;
            }
            b',' => {
                idx += 1;
                Token::Comma
            }
            b'(' => {
                idx += 1;
                Token::LParen
            }
            b')' => {
                idx += 1;
                Token::RParen
            }
            b'=' => {
                idx += 1;
                Token::Eq
            }
            b'\'' | b'"' => {
                let (bytes, end) = quoted(input, idx)?;
                idx = end;
                Token::Lit(Literal::Text(bytes))
            }
            b'0' if matches!(input.get(idx + 1), Some(b'x' | b'X')) => {
                let (bytes, end) = hex(input, idx + 2)?;
                idx = end;
                Token::Lit(Literal::Hex(bytes))
            }
            b'-' | b'.' | b'0'..=b'9' => {
                let (literal, end) = number(input, idx)?;
                idx = end;
                Token::Lit(literal)
            }
            b'`' => {
                let end = skip_quoted(input, idx);
                let name = &input[idx + 1..end.saturating_sub(1).max(idx + 1)];
                idx = end;
                Token::Ident(String::from_utf8_lossy(name).into_owned())
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while idx < input.len() && (input[idx].is_ascii_alphanumeric() || input[idx] == b'_') {
                    idx += 1;
                }
                let word = String::from_utf8_lossy(&input[start..idx]).into_owned();
                match word.to_ascii_lowercase().as_str() {
                    "null" => Token::Lit(Literal::Null),
                    "true" => Token::Lit(Literal::Int(1)),
                    "false" => Token::Lit(Literal::Int(0)),
                    "as" => Token::As,
                    _ => Token::Ident(word),
                }
            }
            _ => return Err(syntax_error(&input[idx..])),
        };
        tokens.push((token, start..idx));
    }
    Ok(tokens)
}

fn quoted(input: &[u8], start: usize) -> Result<(Vec<u8>, usize), ServerError> {
    let quote = input[start];
    let mut out = Vec::new();
    let mut idx = start + 1;
    while idx < input.len() {
        let b = input[idx];
        if b == b'\\' && idx + 1 < input.len() {
            out.push(match input[idx + 1] {
                b'0' => 0,
                b'n' => b'\n',
                b'r' => b'\r',
                b't' => b'\t',
                b'b' => 0x08,
                b'Z' => 0x1a,
                other => other,
            });
            idx += 2;
            continue;
        }
        if b == quote {
            if input.get(idx + 1) == Some(&quote) {
                out.push(quote);
                idx += 2;
                continue;
            }
            return Ok((out, idx + 1));
        }
        out.push(b);
        idx += 1;
    }
    Err(syntax_error(&input[start..]))
}

fn hex(input: &[u8], start: usize) -> Result<(Vec<u8>, usize), ServerError> {
    let mut end = start;
    while end < input.len() && input[end].is_ascii_hexdigit() {
        end += 1;
    }
    let digits = &input[start..end];
    if digits.is_empty() {
        return Err(syntax_error(&input[start.saturating_sub(2)..]));
    }
    let nibble = |b: u8| -> u8 {
        match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            _ => b - b'A' + 10,
        }
    };
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    let mut iter = digits.iter().copied();
    if digits.len() % 2 == 1 {
        out.push(iter.next().map_or(0, nibble));
    }
    while let (Some(hi), Some(lo)) = (iter.next(), iter.next()) {
        out.push((nibble(hi) << 4) | nibble(lo));
    }
    Ok((out, end))
}

fn number(input: &[u8], start: usize) -> Result<(Literal, usize), ServerError> {
    let mut idx = start;
    let mut text = String::new();
    if input[idx] == b'-' {
        text.push('-');
        idx += 1;
        while idx < input.len() && input[idx] == b' ' {
            idx += 1;
        }
    }
    let mut real = false;
    let mut digits = 0;
    while idx < input.len() {
        match input[idx] {
            b @ b'0'..=b'9' => {
                digits += 1;
                text.push(char::from(b));
            }
            b'.' if !real => {
                real = true;
                text.push('.');
            }
            b'e' | b'E' if digits > 0 => {
                real = true;
                text.push('e');
                if let Some(&sign @ (b'+' | b'-')) = input.get(idx + 1) {
                    text.push(char::from(sign));
                    idx += 1;
                }
            }
            _ => break,
        }
        idx += 1;
    }
    if digits == 0 {
        return Err(syntax_error(&input[start..]));
    }
    let literal = if real {
        Literal::Float(text.parse().map_err(|_| syntax_error(&input[start..]))?)
    } else {
        match (text.parse::<i64>(), text.parse::<u64>()) {
            (Ok(v), _) => Literal::Int(v),
            (_, Ok(v)) => Literal::UInt(v),
            _ => Literal::Float(text.parse().map_err(|_| syntax_error(&input[start..]))?),
        }
    };
    Ok((literal, idx))
}

/// `(a, b), (c, d)` into literal tuples.
fn parse_tuples(tokens: &[(Token, Range<usize>)], src: &[u8]) -> Result<Vec<Vec<Literal>>, ServerError> {
    let mut tuples = Vec::new();
    let mut iter = tokens.iter().map(|(t, _)| t);
    loop {
        if iter.next() != Some(&Token::LParen) {
            return Err(syntax_error(src));
        }
        let mut tuple = Vec::new();
        loop {
            match iter.next() {
                Some(Token::Lit(literal)) => tuple.push(literal.clone()),
                _ => return Err(syntax_error(src)),
            }
            match iter.next() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => break,
                _ => return Err(syntax_error(src)),
            }
        }
        tuples.push(tuple);
        match iter.next() {
            None => return Ok(tuples),
            Some(Token::Comma) => {}
            Some(_) => return Err(syntax_error(src)),
        }
    }
}

/// `SELECT <literal> [AS alias], ...` with no table.
fn select_literals(list: &[u8]) -> Result<Outcome, ServerError> {
    let tokens = tokenize(list)?;
    let mut fields = Vec::new();
    let mut row = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        let (Token::Lit(literal), span) = &tokens[idx] else {
            return Err(syntax_error(list));
        };
        idx += 1;
        let mut name = match literal {
            Literal::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::from_utf8_lossy(&list[span.clone()]).into_owned(),
        };
        if let Some((Token::As, _)) = tokens.get(idx) {
            idx += 1;
        }
        if let Some((Token::Ident(alias), _)) = tokens.get(idx) {
            name.clone_from(alias);
            idx += 1;
        }
        match tokens.get(idx) {
            None => {}
            Some((Token::Comma, _)) => idx += 1,
            Some(_) => return Err(syntax_error(list)),
        }

        let (field, cell) = match literal {
            Literal::Null => (Field::new(name, NativeType::Null).with_flags(ColumnFlags::BINARY), None),
            Literal::Int(v) => (
                Field::new(name, NativeType::LongLong)
                    .with_length(21)
                    .with_flags(ColumnFlags::NOT_NULL | ColumnFlags::NUM | ColumnFlags::BINARY),
                Some(v.to_string().into_bytes()),
            ),
            Literal::UInt(v) => (
                Field::new(name, NativeType::LongLong)
                    .with_length(20)
                    .with_flags(
                        ColumnFlags::NOT_NULL | ColumnFlags::UNSIGNED | ColumnFlags::NUM | ColumnFlags::BINARY,
                    ),
                Some(v.to_string().into_bytes()),
            ),
            Literal::Float(v) => (
                Field::new(name, NativeType::Double)
                    .with_length(23)
                    .with_decimals(31)
                    .with_flags(ColumnFlags::NOT_NULL | ColumnFlags::NUM | ColumnFlags::BINARY),
                Some(v.to_string().into_bytes()),
            ),
            Literal::Text(bytes) => (
                Field::new(name, NativeType::VarString)
                    .with_length(bytes.len() as u64)
                    .with_flags(ColumnFlags::NOT_NULL),
                Some(bytes.clone()),
            ),
            Literal::Hex(bytes) => (
                Field::new(name, NativeType::VarString)
                    .with_length(bytes.len() as u64)
                    .with_flags(ColumnFlags::NOT_NULL | ColumnFlags::BINARY),
                Some(bytes.clone()),
            ),
        };
        fields.push(field);
        row.push(cell);
    }
    if fields.is_empty() {
        return Err(syntax_error(list));
    }
    Ok(Outcome::Rows {
        fields,
        rows: vec![row],
    })
}

/// Column index and stored form of a `WHERE col = literal` filter.
fn filter(
    table: &Table,
    column: Option<regex::bytes::Match<'_>>,
    value: Option<regex::bytes::Match<'_>>,
) -> Result<Option<(usize, Option<Vec<u8>>)>, ServerError> {
    let (Some(column), Some(value)) = (column, value) else {
        return Ok(None);
    };
    let idx = table.position(column.as_bytes())?;
    let tokens = tokenize(value.as_bytes())?;
    let [(Token::Lit(literal), _)] = tokens.as_slice() else {
        return Err(syntax_error(value.as_bytes()));
    };
    let wanted = match literal {
        Literal::Null => None,
        other => coerce_lenient(&table.columns[idx], other),
    };
    Ok(Some((idx, wanted)))
}

/// `LIMIT n`, `LIMIT offset, n`, or `LIMIT n OFFSET offset`.
fn parse_limit(src: &[u8]) -> Result<(usize, usize), ServerError> {
    let tokens = tokenize(src)?;
    let as_count = |literal: &Literal| match literal {
        Literal::Int(v) if *v >= 0 => usize::try_from(*v).ok(),
        Literal::UInt(v) => usize::try_from(*v).ok(),
        _ => None,
    };
    let parsed = match tokens.as_slice() {
        [(Token::Lit(n), _)] => as_count(n).map(|n| (0, n)),
        [(Token::Lit(offset), _), (Token::Comma, _), (Token::Lit(n), _)] => {
            as_count(offset).zip(as_count(n))
        }
        [(Token::Lit(n), _), (Token::Ident(kw), _), (Token::Lit(offset), _)]
            if kw.eq_ignore_ascii_case("offset") =>
        {
            as_count(offset).zip(as_count(n))
        }
        _ => None,
    };
    parsed.ok_or_else(|| syntax_error(src))
}

fn column_type(name: &str, width: Option<u64>, scale: Option<u8>) -> Option<(NativeType, u64, u8, u32)> {
    const NUM: u32 = ColumnFlags::NUM;
    const BLOB: u32 = ColumnFlags::BLOB;
    const BIN: u32 = ColumnFlags::BINARY;
    let resolved = match name.to_ascii_lowercase().as_str() {
        "tinyint" | "bool" | "boolean" => (NativeType::Tiny, width.unwrap_or(4), 0, NUM),
        "smallint" => (NativeType::Short, width.unwrap_or(6), 0, NUM),
        "mediumint" => (NativeType::Int24, width.unwrap_or(9), 0, NUM),
        "int" | "integer" => (NativeType::Long, width.unwrap_or(11), 0, NUM),
        "bigint" => (NativeType::LongLong, width.unwrap_or(20), 0, NUM),
        "year" => (NativeType::Year, 4, 0, NUM | ColumnFlags::ZEROFILL),
        "float" => (NativeType::Float, 12, 31, NUM),
        "double" | "real" => (NativeType::Double, 22, 31, NUM),
        "decimal" | "numeric" => {
            let precision = width.unwrap_or(10);
            let scale = scale.unwrap_or(0);
            (NativeType::NewDecimal, precision + 2, scale, NUM)
        }
        "char" => (NativeType::String, width.unwrap_or(1), 0, 0),
        "varchar" => (NativeType::VarString, width.unwrap_or(255), 0, 0),
        "binary" => (NativeType::String, width.unwrap_or(1), 0, BIN),
        "varbinary" => (NativeType::VarString, width.unwrap_or(255), 0, BIN),
        "tinytext" => (NativeType::Blob, 255, 0, BLOB),
        "text" => (NativeType::Blob, 65_535, 0, BLOB),
        "mediumtext" => (NativeType::Blob, 16_777_215, 0, BLOB),
        "longtext" => (NativeType::Blob, 4_294_967_295, 0, BLOB),
        "tinyblob" => (NativeType::Blob, 255, 0, BLOB | BIN),
        "blob" => (NativeType::Blob, 65_535, 0, BLOB | BIN),
        "mediumblob" => (NativeType::Blob, 16_777_215, 0, BLOB | BIN),
        "longblob" => (NativeType::Blob, 4_294_967_295, 0, BLOB | BIN),
        "date" => (NativeType::Date, 10, 0, BIN),
        "datetime" => (NativeType::DateTime, 19, 0, BIN),
        "timestamp" => (NativeType::Timestamp, 19, 0, BIN | ColumnFlags::TIMESTAMP),
        "time" => (NativeType::Time, 10, 0, BIN),
        _ => return None,
    };
    Some(resolved)
}

/// Stored form of `literal` in `column`, rejecting NULL for NOT NULL columns
/// that are not auto-generated.
fn coerce(column: &Column, literal: &Literal) -> Result<Option<Vec<u8>>, ServerError> {
    if *literal == Literal::Null {
        if column.flags & ColumnFlags::NOT_NULL != 0 && column.flags & ColumnFlags::AUTO_INCREMENT == 0 {
            return Err(ServerError::new(
                ER_BAD_NULL,
                format!("Column '{}' cannot be null", column.name),
            ));
        }
        return Ok(None);
    }
    Ok(coerce_lenient(column, literal))
}

fn coerce_lenient(column: &Column, literal: &Literal) -> Option<Vec<u8>> {
    let unsigned = column.flags & ColumnFlags::UNSIGNED != 0;
    let numeric = |literal: &Literal| -> f64 {
        match literal {
            Literal::Int(v) => *v as f64,
            Literal::UInt(v) => *v as f64,
            Literal::Float(v) => *v,
            Literal::Text(b) | Literal::Hex(b) => leading_number(b),
            Literal::Null => 0.0,
        }
    };
    let stored = match literal {
        Literal::Null => return None,
        _ if column.is_integral() => match literal {
            Literal::Int(v) => v.to_string(),
            Literal::UInt(v) => v.to_string(),
            Literal::Text(b) if parse_int(b.trim_ascii()).is_some() => {
                parse_int(b.trim_ascii()).unwrap_or_default().to_string()
            }
            Literal::Text(b) if unsigned && parse_uint(b.trim_ascii()).is_some() => {
                parse_uint(b.trim_ascii()).unwrap_or_default().to_string()
            }
            other if unsigned => (numeric(other).round().max(0.0) as u64).to_string(),
            other => (numeric(other).round() as i64).to_string(),
        },
        _ if column.is_real() => numeric(literal).to_string(),
        _ if column.is_decimal() => format!("{:.*}", usize::from(column.decimals), numeric(literal)),
        Literal::Int(v) => v.to_string(),
        Literal::UInt(v) => v.to_string(),
        Literal::Float(v) => v.to_string(),
        Literal::Text(b) | Literal::Hex(b) => return Some(b.clone()),
    };
    Some(stored.into_bytes())
}

/// Numeric value of the longest numeric prefix, `0` when there is none.
fn leading_number(bytes: &[u8]) -> f64 {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start();
    let mut end = 0;
    for (idx, c) in text.char_indices() {
        let ok = c.is_ascii_digit() || (idx == 0 && (c == '-' || c == '+')) || c == '.';
        if !ok {
            break;
        }
        end = idx + c.len_utf8();
    }
    text[..end].parse().unwrap_or(0.0)
}

fn parse_int(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn parse_uint(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn compare_cells(column: &Column, a: Option<&[u8]>, b: Option<&[u8]>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) if column.sorts_numerically() => {
            leading_number(a).total_cmp(&leading_number(b))
        }
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// Split on commas that are neither quoted nor inside parentheses.
fn split_top_level(input: &[u8]) -> Vec<&[u8]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut idx = 0;
    while idx < input.len() {
        match input[idx] {
            b if is_quote(b) => {
                idx = skip_quoted(input, idx);
                continue;
            }
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
        idx += 1;
    }
    parts.push(&input[start..]);
    parts
}

trait UnquoteIdent {
    fn unquote_ident(&self) -> &[u8];
}

impl UnquoteIdent for [u8] {
    fn unquote_ident(&self) -> &[u8] {
        let s = self.strip_prefix(b"`").unwrap_or(self);
        s.strip_suffix(b"`").unwrap_or(s)
    }
}

fn group<'h>(caps: &Captures<'h>, idx: usize) -> &'h [u8] {
    caps.get(idx).map_or(&[][..], |m| m.as_bytes())
}

fn text(caps: &Captures<'_>, idx: usize) -> String {
    String::from_utf8_lossy(group(caps, idx)).into_owned()
}

fn no_such_table(name: &str) -> ServerError {
    ServerError::new(ER_NO_SUCH_TABLE, format!("Table 'test.{name}' doesn't exist"))
}

fn syntax_error(near: &[u8]) -> ServerError {
    let shown: String = String::from_utf8_lossy(near).chars().take(80).collect();
    ServerError::new(
        ER_PARSE,
        format!("You have an error in your SQL syntax; check the manual near '{shown}'"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(catalog: &mut Catalog, sql: &str) -> Outcome {
        catalog
            .run(sql.as_bytes(), SessionFlags::default())
            .unwrap_or_else(|e| panic!("{sql}: {e}"))
    }

    #[test]
    fn create_insert_select() {
        let mut catalog = Catalog::default();
        run(
            &mut catalog,
            "CREATE TABLE t (id INT PRIMARY KEY AUTO_INCREMENT, name VARCHAR(10), price DECIMAL(6,2))",
        );
        let Outcome::Affected { rows, insert_id, .. } =
            run(&mut catalog, "INSERT INTO t (name, price) VALUES ('a', 1.5), ('b\\'s', 2)")
        else {
            panic!("expected affected rows");
        };
        assert_eq!((rows, insert_id), (2, 1));

        let Outcome::Rows { fields, rows } =
            run(&mut catalog, "SELECT name, price FROM t WHERE id = 2")
        else {
            panic!("expected rows");
        };
        assert_eq!(fields[0].native_type, NativeType::VarString);
        assert_eq!(rows, vec![vec![Some(b"b's".to_vec()), Some(b"2.00".to_vec())]]);
    }

    #[test]
    fn limit_forms() {
        assert_eq!(parse_limit(b"5").ok(), Some((0, 5)));
        assert_eq!(parse_limit(b"2, 5").ok(), Some((2, 5)));
        assert_eq!(parse_limit(b"5 OFFSET 2").ok(), Some((2, 5)));
        assert!(parse_limit(b"1 0").is_err());
    }

    #[test]
    fn literal_select_types() {
        let Ok(Outcome::Rows { fields, rows }) =
            select_literals(b"1, -2.5, 'x', NULL, 0x41 AS h")
        else {
            panic!("expected rows");
        };
        let types: Vec<_> = fields.iter().map(|f| f.native_type).collect();
        assert_eq!(
            types,
            vec![
                NativeType::LongLong,
                NativeType::Double,
                NativeType::VarString,
                NativeType::Null,
                NativeType::VarString
            ]
        );
        assert_eq!(fields[4].name, "h");
        assert_eq!(rows[0][4], Some(b"A".to_vec()));
    }

    #[test]
    fn leftover_marker_is_a_syntax_error() {
        let mut catalog = Catalog::default();
        let err = catalog
            .run(b"SELECT 1, ?", SessionFlags::default())
            .expect_err("marker is not valid SQL");
        assert_eq!(err.code, ER_PARSE);
    }

    #[test]
    fn substitution_skips_quoted_markers() {
        let out = substitute(b"SELECT '?', ?, ?", &[b"1".to_vec()]);
        assert_eq!(out, b"SELECT '?', 1, ?".to_vec());
        assert_eq!(count_markers(b"SELECT '?', ?, `a?`"), 1);
    }

    #[test]
    fn update_counts_changed_or_matched() {
        let mut catalog = Catalog::default();
        run(&mut catalog, "CREATE TABLE t (id INT, v INT)");
        run(&mut catalog, "INSERT INTO t VALUES (1, 1), (2, 1)");
        let sql = b"UPDATE t SET v = 1";
        let Ok(Outcome::Affected { rows, .. }) = catalog.run(sql, SessionFlags::default()) else {
            panic!("update failed");
        };
        assert_eq!(rows, 0);
        let Ok(Outcome::Affected { rows, .. }) =
            catalog.run(sql, SessionFlags { found_rows: true })
        else {
            panic!("update failed");
        };
        assert_eq!(rows, 2);
    }
}
