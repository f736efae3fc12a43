use crate::driver::SqlDialect;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backticked,
    LineComment,
    BlockComment,
}

impl State {
    /// Quote byte that closes this state, if it is a quoted state.
    pub(super) fn closing_quote(self) -> Option<u8> {
        match self {
            State::SingleQuoted => Some(b'\''),
            State::DoubleQuoted => Some(b'"'),
            State::Backticked => Some(b'`'),
            _ => None,
        }
    }

    // Backticked identifiers never have backslash escapes.
    pub(super) fn honours_backslash(self, dialect: SqlDialect) -> bool {
        dialect.backslash_escapes() && matches!(self, State::SingleQuoted | State::DoubleQuoted)
    }
}
