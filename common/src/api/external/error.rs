// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling facilities for the corral control plane

use crate::api::external::MachineName;
use crate::api::external::ResourceType;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use uuid::Uuid;

/// An error that can be generated within a control plane component
///
/// These are produced by the datastore and the policy engines and are
/// converted into transport-level errors by whatever API layer sits above
/// them. Most of the system only needs to distinguish the error kind, not
/// its formatting.
///
/// Where possible we reuse existing variants rather than inventing new
/// ones to distinguish cases that no programmatic consumer needs to
/// distinguish.
#[derive(Clone, Debug, Deserialize, thiserror::Error, PartialEq, Serialize)]
pub enum Error {
    /// An object needed as part of this operation was not found.
    #[error("Object (of type {type_name:?}) not found: {lookup_type:?}")]
    ObjectNotFound { type_name: ResourceType, lookup_type: LookupType },
    /// An object already exists with the specified name or identifier.
    #[error("Object (of type {type_name:?}) already exists: {object_name}")]
    ObjectAlreadyExists { type_name: ResourceType, object_name: String },
    /// The request was well-formed, but the operation cannot be completed
    /// given the current state of the system.
    #[error("Invalid Request: {message}")]
    InvalidRequest { message: String },
    /// A machine constraint references something (a space, a container
    /// type) that does not exist.
    #[error("Invalid Constraints: {message}")]
    InvalidConstraints { message: String },
    /// Machine nesting is exactly one level deep; resolving the parent of
    /// a machine that is itself a container is refused.
    #[error("machine {machine} is a container; grandparent machines are not supported")]
    GrandParentNotSupported { machine: String },

    /// The system encountered an unhandled operational error.
    #[error("Internal Error: {internal_message}")]
    InternalError { internal_message: String },
    /// The system (or part of it) is unavailable.
    #[error("Service Unavailable: {internal_message}")]
    ServiceUnavailable { internal_message: String },
}

/// Indicates how an object was looked up (for an `ObjectNotFound` error)
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum LookupType {
    /// a specific name was requested
    ByName(String),
    /// a specific id was requested
    ById(Uuid),
    /// a specific id was requested with some composite type
    /// (caller summarizes it)
    ByCompositeId(String),
}

impl LookupType {
    /// Returns an ObjectNotFound error appropriate for the case where this
    /// lookup failed
    pub fn into_not_found(self, type_name: ResourceType) -> Error {
        Error::ObjectNotFound { type_name, lookup_type: self }
    }
}

impl From<&str> for LookupType {
    fn from(name: &str) -> Self {
        LookupType::ByName(name.to_owned())
    }
}

impl From<&MachineName> for LookupType {
    fn from(name: &MachineName) -> Self {
        LookupType::from(name.as_str())
    }
}

impl From<Uuid> for LookupType {
    fn from(uuid: Uuid) -> Self {
        LookupType::ById(uuid)
    }
}

impl Error {
    /// Generates an [`Error::ObjectNotFound`] error for a lookup by object
    /// name.
    pub fn not_found_by_name(type_name: ResourceType, name: &str) -> Error {
        LookupType::from(name).into_not_found(type_name)
    }

    /// Generates an [`Error::ObjectNotFound`] error for a lookup by object
    /// id.
    pub fn not_found_by_id(type_name: ResourceType, id: &Uuid) -> Error {
        LookupType::ById(*id).into_not_found(type_name)
    }

    /// Generates an [`Error::InternalError`] error with the specific
    /// message
    ///
    /// InternalError should be used for operational conditions that should
    /// not happen but that we cannot reasonably handle at runtime (e.g.,
    /// deserializing a value from the database, or an import batch that
    /// references a parent device it never defines).
    pub fn internal_error(internal_message: &str) -> Error {
        Error::InternalError { internal_message: internal_message.to_owned() }
    }

    /// Generates an [`Error::InvalidRequest`] error with the specific
    /// message
    ///
    /// This should be used for failures due possibly to invalid client
    /// input or malformed requests.
    pub fn invalid_request(message: &str) -> Error {
        Error::InvalidRequest { message: message.to_owned() }
    }

    /// Generates an [`Error::InvalidConstraints`] error with the specific
    /// message
    pub fn invalid_constraints(message: &str) -> Error {
        Error::InvalidConstraints { message: message.to_owned() }
    }

    /// Generates an [`Error::ServiceUnavailable`] error with the specific
    /// message
    ///
    /// This should be used for transient failures where the caller might
    /// be expected to retry. Retrying is the surrounding worker layer's
    /// job; nothing in this crate retries on its own.
    pub fn unavail(message: &str) -> Error {
        Error::ServiceUnavailable { internal_message: message.to_owned() }
    }

    /// Given an [`Error`] with an internal message, return the same error
    /// with `context` prepended to it to provide more context
    ///
    /// If the error has no internal message, then it is returned
    /// unchanged.
    pub fn internal_context<C>(self, context: C) -> Error
    where
        C: Display + Send + Sync + 'static,
    {
        match self {
            Error::ObjectNotFound { .. }
            | Error::ObjectAlreadyExists { .. }
            | Error::InvalidRequest { .. }
            | Error::InvalidConstraints { .. }
            | Error::GrandParentNotSupported { .. } => self,
            Error::InternalError { internal_message } => Error::InternalError {
                internal_message: format!("{}: {}", context, internal_message),
            },
            Error::ServiceUnavailable { internal_message } => {
                Error::ServiceUnavailable {
                    internal_message: format!(
                        "{}: {}",
                        context, internal_message
                    ),
                }
            }
        }
    }
}

/// Like [`assert!`], except that instead of panicking, this function
/// returns an `Err(Error::InternalError)` with an appropriate message if
/// the given condition is not true.
#[macro_export]
macro_rules! bail_unless {
    ($cond:expr $(,)?) => {
        bail_unless!($cond, "failed runtime check: {:?}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            Err($crate::api::external::Error::internal_error(&format!(
                $($arg)*)))?;
        }
    };
}

/// Implements a pattern similar to [`anyhow::Context`] for providing extra
/// context for internal error messages
///
/// Unlike `anyhow::Context`, this does not add a new Error to the cause
/// chain. It replaces the given Error with one that has the modified
/// `internal_message`.
pub trait InternalContext<T> {
    fn internal_context<C>(self, s: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static;

    fn with_internal_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> InternalContext<T> for Result<T, Error> {
    fn internal_context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|error| error.internal_context(context))
    }

    fn with_internal_context<C, F>(self, make_context: F) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| error.internal_context(make_context()))
    }
}
