//! Escape-and-substitute query construction.
//!
//! The driver seam is string-only, so caller values reach the server by being escaped and
//! spliced into the statement text. Every argument goes through [`escape`]; there is no path
//! that substitutes a raw caller string.

use std::borrow::Cow;

mod parsers;
mod scanner;

use parsers::{is_block_comment_end, is_block_comment_start, is_line_comment_start};
use scanner::State;

use crate::driver::{DriverConnection, SqlDialect};
use crate::error::SqlHandlesError;
use crate::types::RowValues;

/// Render one argument as SQL text, without surrounding quotes.
///
/// Text goes through the connection's escaping primitive; numbers are written in their
/// decimal form. Anything else is rejected.
///
/// # Errors
/// Returns `SqlHandlesError::ParameterError` for unsupported value types or non-finite floats.
pub fn escape(conn: &dyn DriverConnection, value: &RowValues) -> Result<String, SqlHandlesError> {
    match value {
        RowValues::Text(text) => Ok(conn.escape_string(text)),
        RowValues::Int(int) => Ok(int.to_string()),
        RowValues::Float(float) if float.is_finite() => Ok(float.to_string()),
        RowValues::Float(float) => Err(SqlHandlesError::ParameterError(format!(
            "cannot use non-finite number {float} as a query argument"
        ))),
        other => Err(SqlHandlesError::ParameterError(format!(
            "unsupported query argument type: {}",
            other.type_name()
        ))),
    }
}

/// The fragment substituted for a placeholder: escaped text in single quotes, bare numbers.
///
/// Negative numbers are parenthesised so a template like `v-?` cannot turn into `v--5`.
fn literal(conn: &dyn DriverConnection, value: &RowValues) -> Result<String, SqlHandlesError> {
    let escaped = escape(conn, value)?;
    if matches!(value, RowValues::Text(_)) {
        Ok(format!("'{escaped}'"))
    } else if escaped.starts_with('-') {
        Ok(format!("({escaped})"))
    } else {
        Ok(escaped)
    }
}

/// Substitute `args` into the `?` placeholders of `template`, in order.
///
/// With no arguments the template is returned untouched and never scanned, so pre-built
/// statements containing a literal `?` pass through. Placeholders inside quoted strings,
/// backticked identifiers and comments are not placeholders; where those begin and end follows
/// the connection's [`SqlDialect`].
///
/// ```rust
/// # use sql_handles::prelude::*;
/// # use sql_handles::test_utils::MockConnection;
/// let conn = MockConnection::new();
/// let args = [RowValues::Text("o'k".into()), RowValues::Int(3)];
/// let sql = interpolate(&conn, "SELECT * FROM t WHERE name = ? AND id = ?", &args)?;
/// assert_eq!(sql, "SELECT * FROM t WHERE name = 'o\\'k' AND id = 3");
/// # Ok::<(), SqlHandlesError>(())
/// ```
///
/// # Errors
/// Returns `SqlHandlesError::ParameterError` if an argument cannot be escaped or the number of
/// placeholders differs from the number of arguments.
pub fn interpolate<'a>(
    conn: &dyn DriverConnection,
    template: &'a str,
    args: &[RowValues],
) -> Result<Cow<'a, str>, SqlHandlesError> {
    if args.is_empty() {
        return Ok(Cow::Borrowed(template));
    }

    let fragments = args
        .iter()
        .map(|arg| literal(conn, arg))
        .collect::<Result<Vec<_>, _>>()?;

    let positions = placeholder_positions(template, conn.dialect());
    if positions.len() != fragments.len() {
        return Err(SqlHandlesError::ParameterError(format!(
            "query has {} placeholder(s) but {} argument(s) were supplied",
            positions.len(),
            fragments.len()
        )));
    }

    let extra: usize = fragments.iter().map(String::len).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut last = 0;
    for (pos, fragment) in positions.into_iter().zip(fragments) {
        out.push_str(&template[last..pos]);
        out.push_str(&fragment);
        last = pos + 1;
    }
    out.push_str(&template[last..]);
    Ok(Cow::Owned(out))
}

/// Byte offsets of every `?` that sits outside literals and comments.
fn placeholder_positions(sql: &str, dialect: SqlDialect) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut positions = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backticked,
                b'?' => positions.push(idx),
                _ if is_line_comment_start(bytes, idx, dialect) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment;
                    idx += 1;
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted | State::Backticked => {
                if b == b'\\' && state.honours_backslash(dialect) {
                    idx += 1; // skip escaped byte
                } else if Some(b) == state.closing_quote() {
                    if bytes.get(idx + 1) == Some(&b) {
                        idx += 1; // doubled quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    positions
}
