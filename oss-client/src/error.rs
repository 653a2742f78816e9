/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use http::StatusCode;
use serde::Deserialize;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by this library
///
/// The [`ErrorKind`] gives the general category. Structured details (a decoded service error
/// document, the pair of mismatching checksums, etc) are available through the typed accessors
/// such as [`Error::as_service_error`].
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
}

/// General categories of client errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Operation input validation issues (bucket/object name, endpoint, part size, range, ...)
    InputInvalid,

    /// I/O errors
    IOError,

    /// Some kind of internal runtime issue (e.g. task failure, poisoned mutex, etc)
    RuntimeError,

    /// The service returned an error document
    ServiceError,

    /// The service returned a status code the operation does not accept
    UnexpectedStatusCode,

    /// Client and server CRC64 checksums disagree
    CrcMismatch,

    /// The service answered with a 3xx redirect
    UnexpectedRedirect,

    /// Lower level transport failure (connect, TLS, timeout, ...)
    Transport,

    /// The operation was cancelled through its cancellation token or handle.
    OperationCancelled,
}

impl Error {
    /// Creates a new [`Error`] from a known kind of error as well as an arbitrary error
    /// source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: err.into(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The decoded service error, if this error came from an error document
    pub fn as_service_error(&self) -> Option<&ServiceError> {
        self.source.downcast_ref::<ServiceError>()
    }

    /// The checksum pair, if this is a CRC64 mismatch
    pub fn as_crc_error(&self) -> Option<&CrcCheckError> {
        self.source.downcast_ref::<CrcCheckError>()
    }

    /// The got/expected pair, if the service returned a status code the operation did not accept
    pub fn as_unexpected_status(&self) -> Option<&UnexpectedStatusCodeError> {
        self.source.downcast_ref::<UnexpectedStatusCodeError>()
    }

    /// The HTTP status code the service answered with, when there was one
    pub fn status_code(&self) -> Option<u16> {
        if let Some(err) = self.as_service_error() {
            return Some(err.status_code);
        }
        if let Some(err) = self.as_unexpected_status() {
            return Some(err.got);
        }
        self.source
            .downcast_ref::<UnexpectedRedirectError>()
            .map(|err| err.status_code)
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Transport failures, throttling and server side (5xx) errors are retryable. Validation
    /// errors, CRC mismatches and other 4xx responses are not.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            ErrorKind::Transport => true,
            ErrorKind::ServiceError => self
                .as_service_error()
                .map(ServiceError::is_retryable)
                .unwrap_or(false),
            ErrorKind::UnexpectedStatusCode => self
                .as_unexpected_status()
                .map(|err| err.got >= 500 || err.got == 429)
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InputInvalid => write!(f, "invalid input: {}", self.source),
            ErrorKind::IOError => write!(f, "I/O error"),
            ErrorKind::RuntimeError => write!(f, "runtime error"),
            ErrorKind::ServiceError => write!(f, "{}", self.source),
            ErrorKind::UnexpectedStatusCode => write!(f, "{}", self.source),
            ErrorKind::CrcMismatch => write!(f, "{}", self.source),
            ErrorKind::UnexpectedRedirect => write!(f, "{}", self.source),
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::OperationCancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        // errors raised by this crate inside an I/O stream keep their kind
        if !value.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Self::new(ErrorKind::IOError, value);
        }
        match value.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(err)) => *err,
            Some(Err(inner)) => Self::new(ErrorKind::IOError, inner),
            None => Self::new(ErrorKind::IOError, "I/O error without details"),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::new(ErrorKind::RuntimeError, value)
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::new(ErrorKind::Transport, value)
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(value: quick_xml::DeError) -> Self {
        Self::new(ErrorKind::IOError, value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::new(ErrorKind::IOError, value)
    }
}

impl From<http::Error> for Error {
    fn from(value: http::Error) -> Self {
        Self::new(ErrorKind::InputInvalid, value)
    }
}

pub(crate) fn invalid_input<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InputInvalid, err)
}

pub(crate) fn from_kind<E>(kind: ErrorKind) -> impl FnOnce(E) -> Error
where
    E: Into<BoxError>,
{
    |err| Error::new(kind, err)
}

static CANCELLATION_ERROR: &str = "the operation was cancelled before it could complete";

pub(crate) fn operation_cancelled() -> Error {
    Error::new(ErrorKind::OperationCancelled, CANCELLATION_ERROR)
}

/// An error document returned by the service.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename = "Error", rename_all = "PascalCase")]
pub struct ServiceError {
    /// Service error code, e.g. `NoSuchKey`
    pub code: String,
    /// Human readable description
    pub message: String,
    /// Request id assigned by the service
    pub request_id: String,
    /// Host that served the request
    pub host_id: String,
    /// Endpoint hint, returned with some redirect style errors
    pub endpoint: String,
    /// Detailed error code
    #[serde(rename = "EC")]
    pub ec: String,
    /// HTTP status code of the response
    #[serde(skip)]
    pub status_code: u16,
    /// The raw error document
    #[serde(skip)]
    pub raw_message: String,
}

impl ServiceError {
    fn is_retryable(&self) -> bool {
        if self.status_code >= 500 {
            return true;
        }
        matches!(
            self.code.as_str(),
            "RequestTimeout" | "SlowDown" | "Throttling" | "TooManyRequests" | "RequestTimeTooSkewed"
        )
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "service returned error: StatusCode={}, ErrorCode={}, ErrorMessage=\"{}\", RequestId={}",
            self.status_code, self.code, self.message, self.request_id
        )?;
        if !self.ec.is_empty() {
            write!(f, ", Ec={}", self.ec)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

/// Client and server CRC64 disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrcCheckError {
    /// CRC64 computed locally over the bytes sent or received
    pub client_crc: u64,
    /// CRC64 reported by the service
    pub server_crc: u64,
    /// The operation that detected the mismatch
    pub operation: String,
    /// Request id of the response carrying the server checksum
    pub request_id: String,
}

impl fmt::Display for CrcCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} crc64 check failed, client crc: {}, server crc: {}, request id: {}",
            self.operation, self.client_crc, self.server_crc, self.request_id
        )
    }
}

impl std::error::Error for CrcCheckError {}

/// The service answered with a status code outside the set accepted by an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnexpectedStatusCodeError {
    /// Status codes the operation accepts
    pub allowed: Vec<u16>,
    /// Status code received
    pub got: u16,
}

impl fmt::Display for UnexpectedStatusCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected status code {}, expected one of {:?}",
            self.got, self.allowed
        )
    }
}

impl std::error::Error for UnexpectedStatusCodeError {}

/// A 3xx response was received
#[derive(Clone, Debug)]
pub struct UnexpectedRedirectError {
    /// The 3xx status code
    pub status_code: u16,
    /// `Location` header, when present
    pub location: Option<String>,
    /// Response body
    pub body: bytes::Bytes,
}

impl fmt::Display for UnexpectedRedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = StatusCode::from_u16(self.status_code)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        write!(f, "service returned {} {}", self.status_code, reason)?;
        if let Some(location) = &self.location {
            write!(f, ", location: {location}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UnexpectedRedirectError {}

#[cfg(test)]
mod test {
    use super::{CrcCheckError, Error, ErrorKind, ServiceError, UnexpectedStatusCodeError};

    #[test]
    fn test_typed_accessors() {
        let err = Error::new(
            ErrorKind::ServiceError,
            ServiceError {
                code: "NoSuchKey".to_owned(),
                status_code: 404,
                ..Default::default()
            },
        );
        assert_eq!(Some(404), err.status_code());
        assert_eq!("NoSuchKey", err.as_service_error().unwrap().code);
        assert!(err.as_crc_error().is_none());
        assert!(!err.is_retryable());

        let err = Error::new(
            ErrorKind::CrcMismatch,
            CrcCheckError {
                client_crc: 7,
                server_crc: 42,
                operation: "PutObject".to_owned(),
                request_id: String::new(),
            },
        );
        assert_eq!(7, err.as_crc_error().unwrap().client_crc);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_classification() {
        let throttled = Error::new(
            ErrorKind::ServiceError,
            ServiceError {
                code: "SlowDown".to_owned(),
                status_code: 503,
                ..Default::default()
            },
        );
        assert!(throttled.is_retryable());

        let status = Error::new(
            ErrorKind::UnexpectedStatusCode,
            UnexpectedStatusCodeError {
                allowed: vec![200],
                got: 502,
            },
        );
        assert!(status.is_retryable());
        assert!(!super::invalid_input("bad").is_retryable());
        assert!(Error::new(ErrorKind::Transport, "reset").is_retryable());
    }
}
