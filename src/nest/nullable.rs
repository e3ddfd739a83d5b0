use serde::{Deserialize, Deserializer};

/// Decodes `null` as `T::default()`, the same as a missing field.
///
/// Offline thermostats report `null` readings; one of them must not fail the
/// whole response.
pub(super) fn default_on_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
