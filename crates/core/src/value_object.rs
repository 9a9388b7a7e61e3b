//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Two
/// `Address`es with the same bytes are the same account; two `Amount`s with the
/// same base-unit count are the same quantity. To "modify" one, build a new one.
///
/// ```ignore
/// let a: Address = "0x00000000000000000000000000000000000000aa".parse()?;
/// let b = Address::repeat_byte(0xaa);
/// assert_ne!(a, b); // value comparison, byte by byte
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
