//! Identity model and verifiable address bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The subject of authentication. Carries a traits document conforming
/// to the schema referenced by `schema_id`.
///
/// Identities are mutable only through settings flow completions; the
/// credentials map is never serialized to API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub schema_id: String,
    /// Free-form JSON document conforming to the identity trait schema.
    pub traits: Value,
    #[serde(default)]
    pub verifiable_addresses: Vec<VerifiableAddress>,
    #[serde(skip)]
    pub credentials: HashMap<CredentialsType, Credentials>,
}

impl Identity {
    /// Create a new identity with a random id and no credentials.
    pub fn new(schema_id: impl Into<String>, traits: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            schema_id: schema_id.into(),
            traits,
            verifiable_addresses: Vec::new(),
            credentials: HashMap::new(),
        }
    }
}

/// Credential kinds an identity can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsType {
    Password,
    Oidc,
}

/// A credential record attached to an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "type")]
    pub kind: CredentialsType,
    /// Login identifiers this credential answers to (e.g. the email).
    pub identifiers: Vec<String>,
    /// Kind-specific configuration (e.g. the hashed password).
    pub config: Value,
}

/// A contact channel that must be proven before being trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiableAddress {
    pub value: String,
    /// Delivery channel, e.g. `"email"`.
    pub via: String,
    pub verified: bool,
}

/// Reconcile the address set computed from an updated traits document
/// against the set stored on the identity.
///
/// Returns `(final, introduced)`: the final set carries over the
/// `verified` flag for addresses that did not change, and `introduced`
/// holds every address that is new or whose value changed (each of
/// which needs a fresh verification message).
pub fn reconcile_addresses(
    old: &[VerifiableAddress],
    computed: Vec<VerifiableAddress>,
) -> (Vec<VerifiableAddress>, Vec<VerifiableAddress>) {
    let mut introduced = Vec::new();
    let mut merged = Vec::with_capacity(computed.len());

    for mut address in computed {
        match old
            .iter()
            .find(|o| o.value == address.value && o.via == address.via)
        {
            Some(existing) => address.verified = existing.verified,
            None => introduced.push(address.clone()),
        }
        merged.push(address);
    }

    (merged, introduced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(value: &str, verified: bool) -> VerifiableAddress {
        VerifiableAddress {
            value: value.to_string(),
            via: "email".to_string(),
            verified,
        }
    }

    #[test]
    fn unchanged_address_keeps_verified_flag() {
        let old = vec![addr("a@example.com", true)];
        let (merged, introduced) = reconcile_addresses(&old, vec![addr("a@example.com", false)]);

        assert!(introduced.is_empty());
        assert!(merged[0].verified, "verified flag must carry over");
    }

    #[test]
    fn changed_address_is_introduced_unverified() {
        let old = vec![addr("a@example.com", true)];
        let (merged, introduced) = reconcile_addresses(&old, vec![addr("b@example.com", false)]);

        assert_eq!(introduced.len(), 1);
        assert_eq!(introduced[0].value, "b@example.com");
        assert!(!merged[0].verified);
    }

    #[test]
    fn credentials_are_not_serialized() {
        let mut identity = Identity::new("default", serde_json::json!({"email": "a@example.com"}));
        identity.credentials.insert(
            CredentialsType::Password,
            Credentials {
                kind: CredentialsType::Password,
                identifiers: vec!["a@example.com".to_string()],
                config: serde_json::json!({"hashed_password": "secret"}),
            },
        );

        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("credentials").is_none());
        assert_eq!(json["schema_id"], "default");
    }
}
