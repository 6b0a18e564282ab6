use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use feira_shared::pii::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles a caller can act under. Issued by the identity service and carried
/// in the JWT; the fulfillment core only ever checks, never assigns them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Buyer,
    Seller,
    Courier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "Buyer",
            Role::Seller => "Seller",
            Role::Courier => "Courier",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buyer" => Ok(Role::Buyer),
            "Seller" => Ok(Role::Seller),
            "Courier" => Ok(Role::Courier),
            other => Err(CoreError::Permission(format!("unknown role: {other}"))),
        }
    }
}

/// The resolved profile of whoever is making a request.
///
/// Loaded per request from the party directory so operations always see
/// current availability, city and balance rather than stale token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerProfile {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub email: Option<String>,
    pub city_id: Option<i64>,
    pub district_id: Option<i64>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub landmark: Option<String>,
    pub whatsapp: Option<String>,
    /// Courier flag: free to take a delivery. Flipped only by claim/release.
    pub is_available: bool,
    /// Seller earnings waiting for payout.
    pub pending_balance: Decimal,
    /// Seller's payment-provider credential; absent until they connect.
    /// Masked so a logged profile never prints it.
    pub payment_token: Option<Masked<String>>,
}

impl CallerProfile {
    /// Capture the address fields an order must snapshot at checkout.
    ///
    /// Orders keep their own copy so a buyer moving house later never
    /// rewrites where an old order was delivered.
    pub fn address_snapshot(&self) -> CoreResult<AddressSnapshot> {
        let city_id = self
            .city_id
            .ok_or_else(|| CoreError::Validation("caller has no delivery city set".into()))?;
        let street = self
            .street
            .clone()
            .ok_or_else(|| CoreError::Validation("caller has no street address set".into()))?;
        Ok(AddressSnapshot {
            city_id,
            district_id: self.district_id,
            street,
            number: self.number.clone().unwrap_or_default(),
            landmark: self.landmark.clone(),
            whatsapp: self.whatsapp.clone(),
        })
    }
}

/// Denormalized delivery address copied onto an order at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressSnapshot {
    pub city_id: i64,
    pub district_id: Option<i64>,
    pub street: String,
    pub number: String,
    pub landmark: Option<String>,
    pub whatsapp: Option<String>,
}

/// Read access to the user base owned by the identity service.
#[async_trait]
pub trait PartyDirectory: Send + Sync {
    async fn load_caller(&self, id: Uuid) -> CoreResult<Option<CallerProfile>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn profile() -> CallerProfile {
        CallerProfile {
            id: Uuid::new_v4(),
            role: Role::Buyer,
            full_name: "Ana Souza".to_string(),
            email: Some("ana@example.com".to_string()),
            city_id: Some(10),
            district_id: Some(3),
            street: Some("Rua das Flores".to_string()),
            number: Some("120".to_string()),
            landmark: Some("next to the bakery".to_string()),
            whatsapp: Some("5511999990000".to_string()),
            is_available: true,
            pending_balance: dec!(0),
            payment_token: None,
        }
    }

    #[test]
    fn test_address_snapshot_complete() {
        let snapshot = profile().address_snapshot().unwrap();
        assert_eq!(snapshot.city_id, 10);
        assert_eq!(snapshot.street, "Rua das Flores");
    }

    #[test]
    fn test_address_snapshot_requires_city() {
        let mut p = profile();
        p.city_id = None;
        assert!(p.address_snapshot().is_err());
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Buyer, Role::Seller, Role::Courier] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("Admin".parse::<Role>().is_err());
    }
}
