//! Typed identifiers for ArgusLM entities.
//!
//! Every entity key is a UUID wrapped in its own newtype, so a benchmark run
//! id can never be handed to a model lookup by accident. Cross-entity
//! references (run -> model, alert -> rule) are stored as these ids rather
//! than object graphs. Ids are minted time-ordered (UUID v7), which keeps
//! freshly written rows clustered at the tail of their indexes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares one entity id newtype.
///
/// The generated type serializes transparently as the bare UUID (the wire
/// and storage form), converts to and from `Uuid` for database bindings,
/// and parses from path segments via `FromStr`.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh, time-ordered id.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Unwrap to the raw UUID for storage bindings.
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(raw: Uuid) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(raw).map(Self)
            }
        }
    };
}

entity_id! {
    /// Key of a provider account (an external inference endpoint).
    ProviderAccountId
}

entity_id! {
    /// Key of a model in the registry. Distinct from the provider-visible
    /// `model_id` string (e.g. "gpt-4o"), which is not unique across
    /// accounts.
    ModelId
}

entity_id! {
    /// Key of the monitoring configuration singleton row.
    MonitoringConfigId
}

entity_id! {
    /// Key of one uptime check record.
    UptimeCheckId
}

entity_id! {
    /// Key of a benchmark run; also the routing key on the progress bus.
    BenchmarkRunId
}

entity_id! {
    /// Key of one benchmark measurement.
    BenchmarkResultId
}

entity_id! {
    /// Key of an alert rule.
    AlertRuleId
}

entity_id! {
    /// Key of one alert incident.
    AlertId
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn minted_ids_are_time_ordered_across_milliseconds() {
        let earlier = UptimeCheckId::new();
        thread::sleep(Duration::from_millis(2));
        let later = UptimeCheckId::new();
        assert!(earlier.into_uuid() < later.into_uuid());
    }

    #[test]
    fn storage_round_trip_preserves_identity() {
        // Repositories bind the raw UUID and rebuild the typed id on read
        let id = BenchmarkRunId::new();
        let raw = id.into_uuid();
        assert_eq!(BenchmarkRunId::from(raw), id);
        assert_eq!(Uuid::from(id), raw);
    }

    #[test]
    fn ids_serialize_as_bare_uuid_strings() {
        #[derive(Serialize)]
        struct ResultEvent {
            model_id: ModelId,
        }

        let model_id = ModelId::new();
        let json = serde_json::to_value(ResultEvent { model_id }).unwrap();
        assert_eq!(json["model_id"], serde_json::json!(model_id.to_string()));

        let restored: ModelId = serde_json::from_value(json["model_id"].clone()).unwrap();
        assert_eq!(restored, model_id);
    }

    #[test]
    fn path_segments_parse_into_typed_ids() {
        let rule_id = AlertRuleId::new();
        let parsed: AlertRuleId = rule_id.to_string().parse().unwrap();
        assert_eq!(parsed, rule_id);

        assert!("not-a-uuid".parse::<AlertId>().is_err());
        assert!("".parse::<ProviderAccountId>().is_err());
    }
}
