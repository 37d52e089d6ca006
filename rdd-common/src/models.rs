//! Shared data model
//!
//! Documents written to the record store keep the field names the browser
//! application has always used (`type`, `userName`, `userId`, and the
//! capitalized measurement keys), so existing history stays readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Label shown when the account carries no usable email address
pub const PLACEHOLDER_LABEL: &str = "User";

/// Authenticated user as seen by the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable account id issued by the account directory
    pub id: String,
    /// Local part of the email address, or [`PLACEHOLDER_LABEL`]
    pub display_label: String,
}

impl Identity {
    /// Build an identity from an account id and optional email address
    pub fn from_account(uid: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: uid.into(),
            display_label: display_label_for(email),
        }
    }
}

fn display_label_for(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .filter(|local| !local.is_empty())
        .unwrap_or(PLACEHOLDER_LABEL)
        .to_string()
}

/// Environmental measurements submitted through the tabular form
///
/// Values stay as the text the user typed; the prediction service and the
/// stored history both receive them verbatim. JSON numbers are accepted on
/// input and kept as their decimal text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementRecord {
    #[serde(rename = "Maximum_Temperature", deserialize_with = "string_or_number")]
    pub maximum_temperature: String,
    #[serde(rename = "Minimum_Temperature", deserialize_with = "string_or_number")]
    pub minimum_temperature: String,
    #[serde(rename = "Temperature", deserialize_with = "string_or_number")]
    pub average_temperature: String,
    #[serde(rename = "Precipitation", deserialize_with = "string_or_number")]
    pub precipitation: String,
    #[serde(rename = "Soil_pH", deserialize_with = "string_or_number")]
    pub soil_ph: String,
    #[serde(rename = "Relative_Humidity", deserialize_with = "string_or_number")]
    pub relative_humidity: String,
}

/// Measurement field that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeasurementError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} must be a number (got {value:?})")]
    NotNumeric { field: &'static str, value: String },
}

impl MeasurementRecord {
    /// Field names paired with their values, in form order
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("Maximum_Temperature", self.maximum_temperature.as_str()),
            ("Minimum_Temperature", self.minimum_temperature.as_str()),
            ("Temperature", self.average_temperature.as_str()),
            ("Precipitation", self.precipitation.as_str()),
            ("Soil_pH", self.soil_ph.as_str()),
            ("Relative_Humidity", self.relative_humidity.as_str()),
        ]
    }

    /// Check that every field is present and numeric
    ///
    /// No range validation is applied.
    pub fn validate(&self) -> Result<(), MeasurementError> {
        for (field, value) in self.fields() {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(MeasurementError::Missing(field));
            }
            match trimmed.parse::<f64>() {
                Ok(number) if number.is_finite() => {}
                _ => {
                    return Err(MeasurementError::NotNumeric {
                        field,
                        value: value.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Which form produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionKind {
    Image,
    Tabular,
}

/// One logged prediction outcome
///
/// Appended once per completed prediction call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "type")]
    pub kind: PredictionKind,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MeasurementRecord>,
    /// Set by the record store on append when left empty
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "userName")]
    pub owner_name: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
}

impl PredictionRecord {
    /// Record for an image prediction
    pub fn image(owner: &Identity, result: impl Into<String>) -> Self {
        Self::new(PredictionKind::Image, owner, result.into(), None)
    }

    /// Record for a tabular prediction, embedding the submitted values
    pub fn tabular(owner: &Identity, result: impl Into<String>, data: MeasurementRecord) -> Self {
        Self::new(PredictionKind::Tabular, owner, result.into(), Some(data))
    }

    fn new(
        kind: PredictionKind,
        owner: &Identity,
        result: String,
        data: Option<MeasurementRecord>,
    ) -> Self {
        Self {
            kind,
            result,
            data,
            timestamp: None,
            owner_name: owner.display_label.clone(),
            owner_id: owner.id.clone(),
        }
    }
}

/// Sort records most recent first
///
/// Records without a timestamp sort as the oldest. Equal timestamps keep
/// their incoming order.
pub fn sort_newest_first(records: &mut [PredictionRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
