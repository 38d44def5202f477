//! library-internal extensions to std types/traits
pub mod convert;

/// We need fixed names for many parts of this lib.
pub trait Named {
    /// Provide the name of this element.
    fn name(&self) -> &str;
}
