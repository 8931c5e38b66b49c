//! Interface method tables.
//!
//! Every type carries [`IMT_SIZE`] dispatch slots. An interface method is
//! hashed from its full signature into a [`MethodId`], and `id % IMT_SIZE`
//! picks the slot that compiled code loads at the call site. A slot holding
//! exactly one implementation is resolved without looking at the id at all;
//! a shared slot is scanned linearly.
use crate::error::DispatchError;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

pub const IMT_SIZE: usize = 19;

const SIGNATURE_SEED: u32 = 17;
const SIGNATURE_FACTOR: u32 = 23;

/// Compile-time-stable identity of an interface method. Never zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MethodId(u32);

impl MethodId {
    pub fn new(raw: u32) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Hashes a fully qualified method name, e.g. `"IShape.Area"`.
    ///
    /// A hash of zero is remapped to one, since zero ends an entry list.
    pub fn from_signature(signature: &str) -> Self {
        let hash = signature.encode_utf16().fold(SIGNATURE_SEED, |hash, unit| {
            hash.wrapping_mul(SIGNATURE_FACTOR)
                .wrapping_add(unit as u32)
        });
        Self(hash.max(1))
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn slot_index(self) -> usize {
        self.0 as usize % IMT_SIZE
    }
}

impl Display for MethodId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Opaque entry point of compiled code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MethodAddress(pub usize);

impl Display for MethodAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImtEntry {
    pub method_id: MethodId,
    pub address: MethodAddress,
}

impl ImtEntry {
    pub fn new(method_id: MethodId, address: MethodAddress) -> Self {
        Self { method_id, address }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub enum DispatchSlot {
    #[default]
    Empty,
    Single(MethodAddress),
    Multi(Box<[ImtEntry]>),
}

impl DispatchSlot {
    pub fn multi(entries: Vec<ImtEntry>) -> Result<Self, DispatchError> {
        if entries.is_empty() {
            return Err(DispatchError::EmptyMultiSlot);
        }
        Ok(Self::Multi(entries.into_boxed_slice()))
    }

    /// Picks the narrowest representation for the entries sharing one slot.
    fn from_entries(entries: Vec<ImtEntry>) -> Self {
        match entries.len() {
            0 => Self::Empty,
            1 => Self::Single(entries[0].address),
            _ => Self::Multi(entries.into_boxed_slice()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single(_) => 1,
            Self::Multi(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Resolves a call site's method id against the slot loaded from the receiver.
pub fn resolve_interface_call(
    method_id: MethodId,
    slot: &DispatchSlot,
) -> Result<MethodAddress, DispatchError> {
    match slot {
        DispatchSlot::Single(address) => Ok(*address),
        DispatchSlot::Multi(entries) => entries
            .iter()
            .find(|entry| entry.method_id == method_id)
            .map(|entry| entry.address)
            .ok_or(DispatchError::NoApplicableMethod(method_id)),
        DispatchSlot::Empty => Err(DispatchError::NoApplicableMethod(method_id)),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InterfaceMethodTable {
    slots: Vec<DispatchSlot>,
}

impl Default for InterfaceMethodTable {
    fn default() -> Self {
        Self {
            slots: vec![DispatchSlot::Empty; IMT_SIZE],
        }
    }
}

impl InterfaceMethodTable {
    /// Buckets the entries by slot index, preserving their order within a bucket.
    ///
    /// Method ids are expected to be unique; callers reject collisions first.
    pub fn build(entries: &[ImtEntry]) -> Self {
        let mut buckets: [Vec<ImtEntry>; IMT_SIZE] = std::array::from_fn(|_| Vec::new());
        for entry in entries {
            buckets[entry.method_id.slot_index()].push(*entry);
        }
        Self {
            slots: buckets.into_iter().map(DispatchSlot::from_entries).collect(),
        }
    }

    pub fn slot(&self, method_id: MethodId) -> &DispatchSlot {
        &self.slots[method_id.slot_index()]
    }

    pub fn slots(&self) -> &[DispatchSlot] {
        &self.slots
    }

    pub fn resolve(&self, method_id: MethodId) -> Result<MethodAddress, DispatchError> {
        resolve_interface_call(method_id, self.slot(method_id))
    }
}
