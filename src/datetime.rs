//! Datetime helper collaborator.
//!
//! Backs the built-in `datetime` filter (§4.1) and the Query Normalizer
//! (§4.10). The process-wide default zone is fixed to UTC: the core has no
//! notion of a caller-local zone, and every canonical form it emits is
//! zone-tagged so two engines sharing a backend agree on comparisons.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Parses a free-form timestamp string, returning `None` on failure rather
/// than erroring — per the datetime filter's encode contract, a parse
/// failure passes the original value through unchanged.
pub fn parse(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    None
}

/// Re-emits a timestamp in the canonical ISO-8601 form with millisecond
/// precision, matching how the filter's encode phase normalizes values
/// before they reach the adapter.
pub fn canonicalize(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Encodes a raw timestamp string into the canonical form, or returns the
/// input unchanged if it cannot be parsed.
pub fn encode(input: &str) -> String {
    match parse(input) {
        Some(dt) => canonicalize(dt),
        None => input.to_string(),
    }
}

/// Decodes a stored timestamp into its UTC-tagged canonical form. Since the
/// core only ever stores the canonical form, this is encode's mirror and
/// exists as a distinct name so the datetime filter's encode/decode pair
/// reads symmetrically.
pub fn decode(input: &str) -> String {
    encode(input)
}

/// Returns the current instant in the canonical form, used to stamp
/// `$createdAt`/`$updatedAt`.
pub fn now() -> String {
    canonicalize(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_input_passes_through() {
        assert_eq!(encode("not-a-date"), "not-a-date");
    }

    #[test]
    fn rfc3339_round_trips_through_canonical_form() {
        let canonical = encode("2024-01-02T03:04:05Z");
        assert!(canonical.starts_with("2024-01-02T03:04:05"));
        assert!(canonical.ends_with('Z'));
    }

    #[test]
    fn space_separated_form_is_accepted() {
        let canonical = encode("2024-01-02 03:04:05");
        assert!(canonical.starts_with("2024-01-02T03:04:05"));
    }
}
