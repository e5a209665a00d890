//! Domain model (ids, messages, outcomes, handle state, errors).

pub mod errors;
pub mod ids;
pub mod message;
pub mod outcome;
pub mod state;

pub use self::errors::{
    AckError, Cancelled, DecodeError, ErrorKind, HandlerError, StoreError, TransportError,
};
pub use self::ids::{HandleId, SessionId};
pub use self::message::{Attributes, Message, PublishedMessage, RawDelivery};
pub use self::outcome::{NackReason, Outcome, Settle};
pub use self::state::{HandleCell, HandleState};
