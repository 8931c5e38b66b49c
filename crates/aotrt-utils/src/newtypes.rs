use std::fmt::{self, Display, Formatter};

/// Runtime-assigned identity of an OS thread, used for monitor ownership.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl Display for ThreadId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}
