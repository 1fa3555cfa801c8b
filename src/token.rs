/// Associates readiness events with their waiting I/O handle.
///
/// A `Token` is the payload stored in the selector for every registered file
/// descriptor; when the selector reports readiness it hands the token back,
/// and the scheduler uses it to look the waiter up again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Token(pub usize);

impl From<Token> for usize {
    fn from(val: Token) -> usize {
        val.0
    }
}
