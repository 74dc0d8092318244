use std::borrow::Cow;

/// Return the input string with an added "s" at the end if `count` is not one.
pub fn pluralize(value: &str, count: usize) -> Cow<'_, str> {
    if count == 1 {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("{value}s"))
    }
}
