// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared state used by datastore operations

/// Provided to all datastore operations
///
/// Carries the logger for the operation. The placement subsystem has no
/// authn/authz of its own (that lives in the service layer above it), so
/// this is deliberately thin; it exists so every datastore method has a
/// per-operation logging context and a place for cross-cutting state to
/// land later.
pub struct OpContext {
    pub log: slog::Logger,
    kind: OpKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    /// Background operation (one of the system's workers)
    Background,
    /// Automated testing
    Test,
}

impl OpContext {
    /// Returns a context suitable for use in background operations
    pub fn for_background(log: slog::Logger) -> OpContext {
        OpContext { log, kind: OpKind::Background }
    }

    /// Returns a context suitable for automated tests
    pub fn for_tests(log: slog::Logger) -> OpContext {
        OpContext { log, kind: OpKind::Test }
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Returns a child context whose log carries the given operation name.
    pub fn child(&self, operation: &'static str) -> OpContext {
        OpContext {
            log: self.log.new(o!("operation" => operation)),
            kind: self.kind,
        }
    }
}
