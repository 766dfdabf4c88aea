//! The [`Request`] contract.

/// A request that can be dispatched through a Conduit sender.
///
/// Every request type names exactly one response type. The binding is fixed
/// at compile time, so a sender can return a strongly-typed outcome without
/// the caller knowing which handler produced it.
///
/// # Example
///
/// ```
/// use conduit_core::Request;
///
/// struct Ping {
///     message: String,
/// }
///
/// struct Pong {
///     reply: String,
/// }
///
/// impl Request for Ping {
///     type Response = Pong;
/// }
/// ```
pub trait Request: Send + Sync + 'static {
    /// The success payload produced for this request.
    type Response: Send + 'static;

    /// Human-readable request type name used in logs and metrics.
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Strips the module path from a fully-qualified type name.
///
/// Generic arguments are left untouched (`a::Wrapper<b::Inner>` becomes
/// `Wrapper<b::Inner>`).
pub fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    impl Request for Ping {
        type Response = ();
    }

    #[test]
    fn test_type_name_is_short() {
        assert_eq!(Ping::type_name(), "Ping");
    }

    #[test]
    fn test_short_type_name_keeps_generics() {
        assert_eq!(short_type_name("a::b::Wrapper<c::Inner>"), "Wrapper<c::Inner>");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
