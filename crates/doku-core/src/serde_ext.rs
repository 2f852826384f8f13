//! Serde helpers for Docker's JSON.

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the type's default.
///
/// The Engine API sends `null` instead of empty arrays and maps in many places.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
