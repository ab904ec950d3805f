//! Extended-JSON codec for timestamps
//!
//! Dates are stored as `{"$date": "2024-01-09T00:00:00.000Z"}` (relaxed form).
//! The canonical `{"$date": {"$numberLong": "<millis>"}}` form is accepted on
//! input as well. Use with `#[serde(with = "types::ext_json")]`.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
struct ExtDate {
    #[serde(rename = "$date")]
    date: DateRepr,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DateRepr {
    Iso(String),
    Long {
        #[serde(rename = "$numberLong")]
        millis: String,
    },
}

pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    ExtDate {
        date: DateRepr::Iso(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
    }
    .serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match ExtDate::deserialize(deserializer)?.date {
        DateRepr::Iso(iso) => DateTime::parse_from_rfc3339(&iso)
            .map(|date| date.with_timezone(&Utc))
            .map_err(D::Error::custom),
        DateRepr::Long { millis } => {
            let millis: i64 = millis.parse().map_err(D::Error::custom)?;
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {millis}")))
        }
    }
}
