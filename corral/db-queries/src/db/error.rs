// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling and conversions.

use corral_common::api::external::Error as PublicError;
use corral_common::api::external::LookupType;
use corral_common::api::external::ResourceType;
use diesel::result::DatabaseErrorKind;
use diesel::result::Error as DieselError;

/// Wrapper around an error returned from a transaction, allowing callers
/// to distinguish their own bail-out errors from database errors.
#[derive(Debug)]
pub enum TransactionError<T> {
    /// The customizable error type.
    ///
    /// This error should be used for all non-database errors generated
    /// within a transaction body.
    CustomError(T),

    /// The diesel error type.
    ///
    /// This error covers failure due to accessing the DB pool or errors
    /// propagated from the DB within the transaction.
    Database(DieselError),
}

impl<T> From<DieselError> for TransactionError<T> {
    fn from(err: DieselError) -> Self {
        TransactionError::Database(err)
    }
}

impl From<PublicError> for TransactionError<PublicError> {
    fn from(err: PublicError) -> Self {
        TransactionError::CustomError(err)
    }
}

impl TransactionError<PublicError> {
    /// Converts this error into a public error, mapping any database
    /// error through `handler`.
    pub fn into_public(self, handler: ErrorHandler<'_>) -> PublicError {
        match self {
            TransactionError::CustomError(err) => err,
            TransactionError::Database(err) => {
                public_error_from_diesel(err, handler)
            }
        }
    }
}

/// Describes how to handle a database error when converting it to the
/// public error type.
pub enum ErrorHandler<'a> {
    /// The error is a lookup failure for the given resource.
    NotFoundByLookup(ResourceType, LookupType),

    /// The error is a creation failure, where a conflict means the named
    /// object already exists.
    Conflict(ResourceType, &'a str),

    /// The error is not expected or understood; no context is provided
    /// besides the error itself.
    Server,
}

/// Converts a Diesel error to a public-facing error.
pub fn public_error_from_diesel(
    error: DieselError,
    handler: ErrorHandler<'_>,
) -> PublicError {
    match handler {
        ErrorHandler::NotFoundByLookup(resource_type, lookup_type) => {
            match error {
                DieselError::NotFound => {
                    lookup_type.into_not_found(resource_type)
                }
                error => public_error_from_diesel_unexpected(error),
            }
        }
        ErrorHandler::Conflict(resource_type, object_name) => match error {
            DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            ) => PublicError::ObjectAlreadyExists {
                type_name: resource_type,
                object_name: object_name.to_string(),
            },
            error => public_error_from_diesel_unexpected(error),
        },
        ErrorHandler::Server => public_error_from_diesel_unexpected(error),
    }
}

fn public_error_from_diesel_unexpected(error: DieselError) -> PublicError {
    PublicError::internal_error(&format!(
        "unexpected database error: {}",
        error
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_not_found_maps_to_object_not_found() {
        let err = public_error_from_diesel(
            DieselError::NotFound,
            ErrorHandler::NotFoundByLookup(
                ResourceType::Machine,
                LookupType::ByName("7".to_string()),
            ),
        );
        assert_eq!(
            err,
            PublicError::ObjectNotFound {
                type_name: ResourceType::Machine,
                lookup_type: LookupType::ByName("7".to_string()),
            }
        );
    }

    #[test]
    fn test_unexpected_error_is_internal() {
        let err = public_error_from_diesel(
            DieselError::NotFound,
            ErrorHandler::Server,
        );
        assert!(matches!(err, PublicError::InternalError { .. }));
    }
}
