//! The definedness predicate every conditional combinator is built on.

/// Whether a stream value counts as present.
///
/// Only the pending marker (`None`) is undefined. Falsy-looking payloads such
/// as `0`, `false`, `""` or an inner `None` are all defined.
#[inline]
#[must_use]
pub fn is_defined<T>(value: Option<&T>) -> bool {
    value.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_value_is_defined() {
        assert!(is_defined(Some(&true)));
        assert!(is_defined(Some(&false)));
        assert!(is_defined(Some(&1)));
        assert!(is_defined(Some(&0)));
        assert!(is_defined(Some(&"")));
        assert!(is_defined(Some(&"hi")));
        assert!(is_defined(Some(&None::<i32>)));
        assert!(is_defined(Some(&())));
    }

    #[test]
    fn pending_is_not_defined() {
        assert!(!is_defined::<i32>(None));
        let pending: Option<String> = None;
        assert!(!is_defined(pending.as_ref()));
    }
}
