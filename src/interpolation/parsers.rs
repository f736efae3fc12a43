use crate::driver::SqlDialect;

pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize, dialect: SqlDialect) -> bool {
    match (bytes.get(idx), dialect) {
        (Some(b'#'), SqlDialect::MySql) => true,
        // MySQL only opens a `--` comment when whitespace or end of input follows.
        (Some(b'-'), SqlDialect::MySql) => {
            bytes.get(idx + 1) == Some(&b'-')
                && bytes
                    .get(idx + 2)
                    .is_none_or(|b| b.is_ascii_whitespace())
        }
        (Some(b'-'), SqlDialect::Sqlite) => bytes.get(idx + 1) == Some(&b'-'),
        _ => false,
    }
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql_double_dash_needs_whitespace() {
        let d = SqlDialect::MySql;
        assert!(is_line_comment_start(b"-- x", 0, d));
        assert!(is_line_comment_start(b"--", 0, d));
        assert!(!is_line_comment_start(b"1--1", 1, d));
        assert!(is_line_comment_start(b"# x", 0, d));
    }

    #[test]
    fn sqlite_double_dash_always_comments() {
        let d = SqlDialect::Sqlite;
        assert!(is_line_comment_start(b"1--1", 1, d));
        assert!(is_line_comment_start(b"--x", 0, d));
        assert!(!is_line_comment_start(b"# x", 0, d));
        assert!(!is_line_comment_start(b"-1", 0, d));
    }
}
