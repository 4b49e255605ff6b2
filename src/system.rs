//! The node record stored in a [`SystemForest`](crate::forest::SystemForest).
//!
//! A [`System`] carries its own identifier, the identifier of its declared parent
//! and an opaque payload. The forest never looks inside the payload; it only needs
//! it for equality (duplicate detection) and for the JSON wire format:
//!
//! ```json
//! {"sys_id":22,"parent_sys_id":11,"usr_data":"aaa"}
//! ```

use std::{fmt, str::FromStr};

use derive_more::{From, Into};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// A type-safe identifier for a system. Wraps the `u32` used on the wire.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SystemId(pub u32);

impl SystemId {
    /// Conventional anchor of top-level systems.
    pub const ROOT: SystemId = SystemId(0);
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum SystemFormatError {
    #[error("malformed system record: {0}")]
    Json(#[from] serde_json::Error),
}

/// A node of the forest.
///
/// Equality is structural over all three fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct System<D> {
    #[serde(rename = "sys_id")]
    pub id: SystemId,
    #[serde(rename = "parent_sys_id")]
    pub parent: SystemId,
    #[serde(rename = "usr_data")]
    pub data: D,
}

impl<D> System<D> {
    pub fn new(id: SystemId, parent: SystemId, data: D) -> Self {
        System { id, parent, data }
    }

    /// Builds a record from raw wire identifiers.
    pub fn from_raw(id: u32, parent: u32, data: D) -> Self {
        Self::new(SystemId(id), SystemId(parent), data)
    }

    /// A system hanging directly below [`SystemId::ROOT`].
    pub fn top_level(id: SystemId, data: D) -> Self {
        Self::new(id, SystemId::ROOT, data)
    }

    /// A system may not be its own parent. Nothing else is checked.
    pub fn is_valid(&self) -> bool {
        self.id != self.parent
    }

    pub fn is_equal_to(&self, other: &Self) -> bool
    where
        D: PartialEq,
    {
        self == other
    }

    pub fn map_data<F, U>(self, transform: F) -> System<U>
    where
        F: FnOnce(D) -> U,
    {
        System {
            id: self.id,
            parent: self.parent,
            data: transform(self.data),
        }
    }

    pub fn map_data_ref<F, U>(&self, transform: F) -> System<U>
    where
        F: FnOnce(&D) -> U,
    {
        System {
            id: self.id,
            parent: self.parent,
            data: transform(&self.data),
        }
    }
}

impl<D: Serialize> System<D> {
    pub fn to_json(&self) -> Result<String, SystemFormatError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>, SystemFormatError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<D: DeserializeOwned> System<D> {
    pub fn from_json(input: &str) -> Result<Self, SystemFormatError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_json_slice(input: &[u8]) -> Result<Self, SystemFormatError> {
        Ok(serde_json::from_slice(input)?)
    }
}

impl<D: DeserializeOwned> FromStr for System<D> {
    type Err = SystemFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(s)
    }
}

impl<D: fmt::Display> fmt::Display for System<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{},{}}}", self.id, self.parent, self.data)
    }
}

#[cfg(test)]
mod test {
    use serde_json::{json, Value};

    use super::{System, SystemId};

    #[test]
    fn self_parent_is_invalid() {
        assert!(!System::from_raw(7, 7, ()).is_valid());
        assert!(System::from_raw(7, 0, ()).is_valid());
        assert!(System::top_level(SystemId(3), "x").is_valid());
    }

    #[test]
    fn equality_covers_every_field() {
        let a = System::from_raw(22, 11, "aaa");
        assert!(a.is_equal_to(&System::from_raw(22, 11, "aaa")));
        assert!(!a.is_equal_to(&System::from_raw(22, 12, "aaa")));
        assert!(!a.is_equal_to(&System::from_raw(23, 11, "aaa")));
        assert!(!a.is_equal_to(&System::from_raw(22, 11, "aab")));
    }

    #[test]
    fn json_uses_wire_field_names() {
        let system = System::from_raw(22, 11, "aaa".to_string());
        assert_eq!(
            system.to_json().unwrap(),
            r#"{"sys_id":22,"parent_sys_id":11,"usr_data":"aaa"}"#
        );
    }

    #[test]
    fn json_round_trip_with_nested_payload() {
        let system = System::from_raw(
            44,
            22,
            json!({
                "name": "ledger",
                "replicas": [1, 2, 3],
                "route": { "domain": "eu", "weight": 0.5, "tags": null }
            }),
        );
        let bytes = system.to_json_vec().unwrap();
        let back: System<Value> = System::from_json_slice(&bytes).unwrap();
        assert_eq!(back, system);

        let parsed: System<Value> = system.to_json().unwrap().parse().unwrap();
        similar_asserts::assert_eq!(parsed, system);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(System::<Value>::from_json("{\"sys_id\":1").is_err());
        assert!(System::<Value>::from_json(r#"{"sys_id":-1,"parent_sys_id":0,"usr_data":1}"#).is_err());
        assert!(System::<String>::from_json(r#"{"sys_id":1,"parent_sys_id":0,"usr_data":5}"#).is_err());
        assert!("not json".parse::<System<Value>>().is_err());
    }

    #[test]
    fn display_is_id_parent_data() {
        assert_eq!(System::from_raw(55, 11, "cccc").to_string(), "{55,11,cccc}");
        assert_eq!(SystemId::from(9u32).to_string(), "9");
        assert_eq!(u32::from(SystemId::ROOT), 0);
    }
}
