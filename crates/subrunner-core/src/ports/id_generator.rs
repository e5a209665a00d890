//! IdGenerator port - ID 生成の抽象化
//!
//! Session and handle ids are ULIDs whose timestamp part comes from the
//! `Clock` port, so a `FixedClock` yields ids with a deterministic prefix.

use crate::domain::ids::{HandleId, SessionId};
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn session_id(&self) -> SessionId;

    fn handle_id(&self) -> HandleId;
}

/// ULID generator: clock millis + 80 random bits.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn session_id(&self) -> SessionId {
        SessionId::from(self.next())
    }

    fn handle_id(&self) -> HandleId {
        HandleId::from(self.next())
    }
}
