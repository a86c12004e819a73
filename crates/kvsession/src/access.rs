//! Per-request session access policy.

/// How a request may use its session.
///
/// `create` makes a new session when none exists for the id. `write` grants
/// the write gate on the shared record; without it every attribute mutation
/// and every update fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAccess {
    pub create: bool,
    pub write: bool,
}

impl Default for SessionAccess {
    /// Create if missing, read-only.
    fn default() -> Self {
        Self {
            create: true,
            write: false,
        }
    }
}

impl SessionAccess {
    /// Existing sessions only, no writes.
    pub const READ_ONLY: Self = Self {
        create: false,
        write: false,
    };

    /// Create if missing, writes allowed.
    pub const READ_WRITE: Self = Self {
        create: true,
        write: true,
    };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn with_write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }
}
