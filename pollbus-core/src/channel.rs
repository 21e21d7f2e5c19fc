//! Channel descriptors and tenant-scoped canonical keys.
//!
//! Everything addressable on the bus reduces to a [`ChannelKey`]: an
//! ordered tuple of atoms whose first atom is always the tenant name.
//! The wire accepts loosely-shaped descriptors (a bare string, an
//! `[model, id]` entity reference, an arbitrary scalar tuple); they are
//! resolved into the tagged [`ChannelDescriptor`] once at the API
//! boundary and canonicalized here, so nothing deeper in the system ever
//! shape-sniffs a channel value.

use compact_str::{CompactString, ToCompactString};
use pollbus_sdk::objects::{WireAtom, WireChannel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the implicit per-tenant broadcast channel.
pub const BROADCAST_CHANNEL: &str = "broadcast";

/// Errors raised while resolving or canonicalizing a channel value.
///
/// All of these are caller bugs, surfaced before any store or registry
/// interaction.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("unsupported channel descriptor: {0}")]
    UnsupportedDescriptor(String),

    #[error("channel tuple may not be empty")]
    EmptyTuple,

    #[error("channel encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One scalar position of a channel tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyAtom {
    Int(i64),
    Str(CompactString),
}

impl From<&str> for KeyAtom {
    fn from(s: &str) -> Self {
        KeyAtom::Str(CompactString::from(s))
    }
}

impl From<i64> for KeyAtom {
    fn from(n: i64) -> Self {
        KeyAtom::Int(n)
    }
}

/// A resolved channel descriptor.
///
/// Wire values are resolved into exactly one of these variants by
/// [`ChannelDescriptor::resolve_wire`]; in-process publishers construct
/// them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelDescriptor {
    /// A raw named channel, e.g. `"orders"`.
    Name(CompactString),
    /// A reference to one record of one model, e.g. `("order", 5)`.
    Entity { model: CompactString, id: i64 },
    /// A pre-tupled channel of arbitrary scalar atoms.
    Tuple(Vec<KeyAtom>),
}

impl ChannelDescriptor {
    pub fn name(name: impl AsRef<str>) -> Self {
        ChannelDescriptor::Name(CompactString::from(name.as_ref()))
    }

    pub fn entity(model: impl AsRef<str>, id: i64) -> Self {
        ChannelDescriptor::Entity {
            model: CompactString::from(model.as_ref()),
            id,
        }
    }

    /// Resolve a wire-level channel value into a tagged descriptor.
    ///
    /// A JSON string becomes [`Name`](ChannelDescriptor::Name); a
    /// two-element `[string, integer]` array is the entity-reference
    /// shorthand; any other non-empty array of scalars becomes
    /// [`Tuple`](ChannelDescriptor::Tuple). An empty array is rejected.
    pub fn resolve_wire(wire: &WireChannel) -> Result<Self, ChannelError> {
        match wire {
            WireChannel::Name(name) => Ok(ChannelDescriptor::Name(name.to_compact_string())),
            WireChannel::Parts(parts) => {
                if parts.is_empty() {
                    return Err(ChannelError::EmptyTuple);
                }
                if let [WireAtom::Str(model), WireAtom::Int(id)] = parts.as_slice() {
                    return Ok(ChannelDescriptor::Entity {
                        model: model.to_compact_string(),
                        id: *id,
                    });
                }
                let atoms = parts
                    .iter()
                    .map(|part| match part {
                        WireAtom::Int(n) => KeyAtom::Int(*n),
                        WireAtom::Str(s) => KeyAtom::Str(s.to_compact_string()),
                    })
                    .collect();
                Ok(ChannelDescriptor::Tuple(atoms))
            }
        }
    }
}

/// A canonical, tenant-scoped channel key.
///
/// Stored as the stable JSON encoding of its atom tuple, which is what
/// the `channel_key` column and the registry maps use for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(CompactString);

impl ChannelKey {
    /// Canonicalize a descriptor for the given tenant.
    ///
    /// The tenant always ends up as the first atom, so two tenants can
    /// never collide even on identical raw channel names. A tuple whose
    /// first atom already equals the tenant is not prefixed twice.
    pub fn canonicalize(
        tenant: &str,
        descriptor: &ChannelDescriptor,
    ) -> Result<Self, ChannelError> {
        let atoms = match descriptor {
            ChannelDescriptor::Name(name) => {
                vec![KeyAtom::from(tenant), KeyAtom::Str(name.clone())]
            }
            ChannelDescriptor::Entity { model, id } => vec![
                KeyAtom::from(tenant),
                KeyAtom::Str(model.clone()),
                KeyAtom::Int(*id),
            ],
            ChannelDescriptor::Tuple(parts) => {
                if parts.is_empty() {
                    return Err(ChannelError::EmptyTuple);
                }
                let already_scoped =
                    matches!(parts.first(), Some(KeyAtom::Str(first)) if first == tenant);
                if already_scoped {
                    parts.clone()
                } else {
                    let mut scoped = Vec::with_capacity(parts.len() + 1);
                    scoped.push(KeyAtom::from(tenant));
                    scoped.extend(parts.iter().cloned());
                    scoped
                }
            }
        };
        Self::from_atoms(&atoms)
    }

    /// The distinguished per-tenant broadcast key every poll subscribes to.
    pub fn broadcast(tenant: &str) -> Result<Self, ChannelError> {
        Self::from_atoms(&[KeyAtom::from(tenant), KeyAtom::from(BROADCAST_CHANNEL)])
    }

    fn from_atoms(atoms: &[KeyAtom]) -> Result<Self, ChannelError> {
        let encoded = serde_json::to_string(atoms)?;
        Ok(ChannelKey(CompactString::from(encoded)))
    }

    /// Rebuild a key from its canonical encoding.
    ///
    /// Only for strings that were produced by this type (the NOTIFY
    /// payload round-trip); no validation is performed.
    pub fn from_canonical(encoded: impl AsRef<str>) -> Self {
        ChannelKey(CompactString::from(encoded.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0.into()
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn key(tenant: &str, descriptor: &ChannelDescriptor) -> ChannelKey {
        ChannelKey::canonicalize(tenant, descriptor).unwrap()
    }

    #[test]
    fn string_channel_is_tenant_scoped() {
        let k = key("acme", &ChannelDescriptor::name("orders"));
        assert_eq!(k.as_str(), r#"["acme","orders"]"#);
    }

    #[test]
    fn entity_channel_reduces_to_model_and_id() {
        let k = key("acme", &ChannelDescriptor::entity("order", 5));
        assert_eq!(k.as_str(), r#"["acme","order",5]"#);
    }

    #[test]
    fn tuple_channel_is_prefixed_once() {
        let unscoped = ChannelDescriptor::Tuple(vec!["presence".into(), 7.into()]);
        assert_eq!(key("acme", &unscoped).as_str(), r#"["acme","presence",7]"#);

        let scoped = ChannelDescriptor::Tuple(vec!["acme".into(), "presence".into(), 7.into()]);
        assert_eq!(key("acme", &scoped).as_str(), r#"["acme","presence",7]"#);
    }

    #[test]
    fn tenants_never_collide_on_identical_names() {
        let descriptor = ChannelDescriptor::name("orders");
        assert_ne!(key("acme", &descriptor), key("globex", &descriptor));
    }

    #[test]
    fn broadcast_key_shape() {
        let k = ChannelKey::broadcast("acme").unwrap();
        assert_eq!(k.as_str(), r#"["acme","broadcast"]"#);
    }

    #[test]
    fn empty_tuple_is_a_caller_error() {
        let err = ChannelKey::canonicalize("acme", &ChannelDescriptor::Tuple(vec![]));
        assert!(matches!(err, Err(ChannelError::EmptyTuple)));
    }

    #[test]
    fn wire_name_resolves_to_name() {
        let wire = WireChannel::Name("orders".into());
        assert_eq!(
            ChannelDescriptor::resolve_wire(&wire).unwrap(),
            ChannelDescriptor::name("orders")
        );
    }

    #[test]
    fn wire_model_id_pair_resolves_to_entity() {
        let wire = WireChannel::Parts(vec![WireAtom::Str("order".into()), WireAtom::Int(5)]);
        assert_eq!(
            ChannelDescriptor::resolve_wire(&wire).unwrap(),
            ChannelDescriptor::entity("order", 5)
        );
    }

    #[test]
    fn wire_other_arrays_resolve_to_tuples() {
        let wire = WireChannel::Parts(vec![
            WireAtom::Str("a".into()),
            WireAtom::Str("b".into()),
            WireAtom::Int(1),
        ]);
        assert_eq!(
            ChannelDescriptor::resolve_wire(&wire).unwrap(),
            ChannelDescriptor::Tuple(vec!["a".into(), "b".into(), 1.into()])
        );
    }

    #[test]
    fn wire_empty_array_is_rejected() {
        let wire = WireChannel::Parts(vec![]);
        assert!(matches!(
            ChannelDescriptor::resolve_wire(&wire),
            Err(ChannelError::EmptyTuple)
        ));
    }

    #[test]
    fn canonical_round_trip() {
        let k = key("acme", &ChannelDescriptor::entity("order", 5));
        assert_eq!(ChannelKey::from_canonical(k.as_str()), k);
    }
}
