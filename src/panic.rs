//! Formatting of caught handler panics.

use std::{any::Any, borrow::Cow};

/// Extract a readable message from a `catch_unwind` payload.
///
/// `panic!` payloads are either `&'static str` or `String`; anything else is
/// reported generically.
///
/// ```
/// use callwire::panic::panic_message;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
/// assert_eq!(panic_message(&*payload), "boom");
/// ```
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> Cow<'_, str> {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        Cow::Borrowed(message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Cow::Borrowed(message.as_str())
    } else {
        Cow::Borrowed("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, panic::catch_unwind};

    use rstest::rstest;

    use super::panic_message;

    #[rstest]
    #[case::literal(Box::new("boom"), "boom")]
    #[case::formatted(Box::new(String::from("boom 7")), "boom 7")]
    #[case::other(Box::new(7_u32), "non-string panic payload")]
    fn payloads_are_described(#[case] payload: Box<dyn Any + Send>, #[case] expected: &str) {
        assert_eq!(panic_message(&*payload), expected);
    }

    #[test]
    fn caught_panic_payload_is_readable() {
        let payload = catch_unwind(|| panic!("handler exploded: {}", 42)).expect_err("panics");
        assert_eq!(panic_message(&*payload), "handler exploded: 42");
    }
}
