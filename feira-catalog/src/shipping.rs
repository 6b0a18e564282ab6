use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of a product's shipping table: what delivery to a city costs.
///
/// City ids arrive from seller tooling as JSON numbers or strings; both
/// deserialize to the same `i64` so lookups compare one integer type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingOption {
    #[serde(deserialize_with = "city_id_lenient")]
    pub city_id: i64,
    pub cost: Decimal,
}

fn city_id_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom("city_id is not an integer")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom("city_id string is not an integer")),
        _ => Err(D::Error::custom("city_id must be a number or string")),
    }
}

/// A product's full shipping table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShippingOptions(pub Vec<ShippingOption>);

impl ShippingOptions {
    /// Parse a stored shipping table, degrading to an empty one on bad data.
    ///
    /// Malformed seller input must never take pricing down; the fallback fee
    /// covers the gap and the row is logged for cleanup.
    pub fn parse_lenient(raw: Option<&serde_json::Value>) -> Self {
        let Some(value) = raw else {
            return Self::default();
        };
        if value.is_null() {
            return Self::default();
        }
        match serde_json::from_value::<Vec<ShippingOption>>(value.clone()) {
            Ok(options) => Self(options),
            Err(err) => {
                tracing::warn!(error = %err, "unparseable shipping options, treating as none");
                Self::default()
            }
        }
    }

    /// Cost of shipping to the given city, when the seller listed it.
    pub fn resolve(&self, city_id: i64) -> Option<Decimal> {
        self.0
            .iter()
            .find(|option| option.city_id == city_id)
            .map(|option| option.cost)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
