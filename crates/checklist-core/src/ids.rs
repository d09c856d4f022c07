//! Identifier generation for new tasks.

use std::cell::Cell;

use uuid::Uuid;

use crate::task::TaskId;

/// Produces a globally unique id on every call.
pub trait IdGenerator {
    fn generate_id(&self) -> TaskId;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate_id(&self) -> TaskId {
        TaskId::new(Uuid::new_v4().to_string())
    }
}

/// Predictable `prefix-1`, `prefix-2`, ... ids for tests and scripted sessions.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: Cell<u64>,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: Cell::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn generate_id(&self) -> TaskId {
        let n = self.next.get();
        self.next.set(n + 1);
        TaskId::new(format!("{}-{n}", self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique() {
        let ids = UuidGenerator;
        let a = ids.generate_id();
        let b = ids.generate_id();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("t");
        assert_eq!(ids.generate_id().as_str(), "t-1");
        assert_eq!(ids.generate_id().as_str(), "t-2");
    }
}
