use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;

/// One field slot of an update payload.
///
/// Precedence: an absent key keeps the stored value (`Keep`), an explicit
/// JSON `null` clears it (`Clear`, only meaningful for nullable columns) and
/// a concrete value overwrites it (`Set`).
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Keep,
    Clear,
    Set(T),
}

// Manual impl: the derive would demand `T: Default`, which timestamp and
// enum fields do not carry.
impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T> Patch<T> {
    /// Merge into a nullable column value.
    pub fn resolve(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Keep => current,
            Patch::Clear => None,
            Patch::Set(v) => Some(v),
        }
    }

    /// Merge into a required column value; `null` cannot clear it.
    pub fn value_or(self, current: T) -> T {
        match self {
            Patch::Set(v) => v,
            Patch::Keep | Patch::Clear => current,
        }
    }

    pub fn set_value(&self) -> Option<&T> {
        match self {
            Patch::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            None => Patch::Clear,
            Some(v) => Patch::Set(v),
        })
    }
}

/// Deserializer for `Patch<OffsetDateTime>` fields; timestamps arrive as
/// RFC 3339 strings, which the stock `OffsetDateTime` impl does not accept.
pub fn rfc3339_patch<'de, D>(deserializer: D) -> Result<Patch<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match time::serde::rfc3339::option::deserialize(deserializer)? {
        None => Patch::Clear,
        Some(v) => Patch::Set(v),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default)]
        value: Patch<f64>,
        #[serde(default)]
        notes: Patch<String>,
    }

    #[test]
    fn absent_key_keeps_current() {
        let probe: Probe = serde_json::from_str(r#"{ "notes": "x" }"#).unwrap();
        assert_eq!(probe.value, Patch::Keep);
        assert_eq!(probe.notes, Patch::Set("x".into()));
        assert_eq!(probe.value.value_or(120.0), 120.0);
    }

    #[test]
    fn explicit_null_clears_nullable() {
        let probe: Probe = serde_json::from_str(r#"{ "notes": null }"#).unwrap();
        assert_eq!(probe.notes, Patch::Clear);
        assert_eq!(probe.notes.resolve(Some("old".to_string())), None);
    }

    #[test]
    fn value_overwrites() {
        let probe: Probe = serde_json::from_str(r#"{ "value": 95.5 }"#).unwrap();
        assert_eq!(probe.value.clone().value_or(120.0), 95.5);
        assert_eq!(probe.value.resolve(Some(120.0)), Some(95.5));
    }

    #[test]
    fn null_cannot_clear_required_field() {
        let probe: Probe = serde_json::from_str(r#"{ "value": null }"#).unwrap();
        assert_eq!(probe.value.value_or(120.0), 120.0);
    }

    #[test]
    fn presence_distinguishes_null_from_absent() {
        let probe: Probe = serde_json::from_str(r#"{ "notes": null }"#).unwrap();
        assert_eq!(probe.notes, Patch::Clear);
        assert_eq!(probe.value, Patch::Keep);
    }

    #[derive(Debug, Deserialize)]
    struct StampProbe {
        #[serde(default, deserialize_with = "rfc3339_patch")]
        timestamp: Patch<OffsetDateTime>,
    }

    #[test]
    fn rfc3339_patch_parses_timestamps() {
        let probe: StampProbe =
            serde_json::from_str(r#"{ "timestamp": "2024-05-01T12:30:00Z" }"#).unwrap();
        let ts = probe.timestamp.set_value().copied().unwrap();
        assert_eq!(ts.year(), 2024);

        let absent: StampProbe = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.timestamp, Patch::Keep);
    }
}
