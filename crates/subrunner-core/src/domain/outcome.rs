//! Terminal outcomes of a dispatched message.
//!
//! Every message reaches exactly one of these; the source is told which one
//! through `MessageSource::settle`.

use serde::{Deserialize, Serialize};

/// Terminal state of a delivery, as reported to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Processed; the source may forget it.
    Acked,

    /// Rejected; the source should redeliver it.
    Nacked,

    /// No ack/nack before the deadline; a redelivery candidate.
    Expired,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Acked => "acked",
            Outcome::Nacked => "nacked",
            Outcome::Expired => "expired",
        }
    }
}

/// Why a message was nacked. Only used for accounting and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NackReason {
    /// The handler called `nack()` itself.
    Requested,

    /// The handler returned an error or panicked.
    Handler,

    /// The payload could not be decoded.
    Decode,

    /// The session gave up waiting for it during drain.
    Abandoned,
}

/// A terminal transition requested on an ack handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    Ack,
    Nack(NackReason),
}

impl Settle {
    pub fn outcome(self) -> Outcome {
        match self {
            Settle::Ack => Outcome::Acked,
            Settle::Nack(_) => Outcome::Nacked,
        }
    }
}
