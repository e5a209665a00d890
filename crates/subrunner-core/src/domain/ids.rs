//! Strongly-typed identifiers.
//!
//! `Id<T>` は ULID を包むジェネリック ID。`T` は PhantomData のマーカー型で、
//! `SessionId` と `HandleId` を型レベルで区別する（実行時コストなし）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait providing the display prefix of an id kind.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ULID-backed id, typed by its marker.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for receive sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Session {}

impl IdMarker for Session {
    fn prefix() -> &'static str {
        "session-"
    }
}

/// Marker for ack handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Handle {}

impl IdMarker for Handle {
    fn prefix() -> &'static str {
        "handle-"
    }
}

/// Identifier of one receive session (connect → deadline/cancellation).
pub type SessionId = Id<Session>;

/// Identifier of one dispatched message's ack handle.
pub type HandleId = Id<Handle>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_kind_prefix() {
        let ulid = Ulid::new();
        let session = SessionId::from_ulid(ulid);
        let handle = HandleId::from_ulid(ulid);

        assert_eq!(session.to_string(), format!("session-{ulid}"));
        assert_eq!(handle.to_string(), format!("handle-{ulid}"));
        // let _: SessionId = handle; // <- does not compile
    }

    #[test]
    fn ids_serialize_as_bare_ulid() {
        let id = HandleId::from_ulid(Ulid::new());
        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, format!("\"{}\"", id.as_ulid()));
        let back: HandleId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_marker_is_zero_sized() {
        assert_eq!(std::mem::size_of::<HandleId>(), std::mem::size_of::<Ulid>());
    }
}
