//! `serde(with = "...")` helpers for arkworks group/field elements, playing
//! the role this codebase's curve-specific compatibility shim plays, but
//! generalised over any `CanonicalSerialize`/`CanonicalDeserialize` type so
//! the same helpers serve G1, G2 and scalar fields alike.

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};

/// Serialises any canonical arkworks type via its compressed encoding.
pub fn serialize_compressed<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: CanonicalSerialize,
{
    let mut bytes = Vec::new();
    value
        .serialize_compressed(&mut bytes)
        .map_err(S::Error::custom)?;
    serializer.serialize_bytes(&bytes)
}

/// Deserialises any canonical arkworks type from its compressed encoding.
/// For curve points this does **not** perform the subgroup check; callers
/// handling externally supplied points must additionally call the
/// corresponding `deserialize_*_compressed` helper in `crate::curve`, which
/// does.
pub fn deserialize_compressed<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: CanonicalDeserialize,
{
    let bytes = Vec::<u8>::deserialize(deserializer)?;
    T::deserialize_compressed(bytes.as_slice()).map_err(D::Error::custom)
}
