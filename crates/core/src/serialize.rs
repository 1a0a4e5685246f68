/// Canonical binary serialization of wire types.
///
/// Signatures over structured messages are computed over this representation,
/// so every party must encode identically.
pub(crate) trait CanonicalSerialize {
    /// Serializes the type.
    fn serialize(&self) -> Result<Vec<u8>, bcs::Error>;
}

impl<T> CanonicalSerialize for T
where
    T: serde::Serialize,
{
    fn serialize(&self) -> Result<Vec<u8>, bcs::Error> {
        bcs::to_bytes(self)
    }
}
