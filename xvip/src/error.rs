// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for pipeline operations.
//!
//! This module defines the error type returned by routing, format, streaming
//! and pipeline calls, together with the mapping to the negative errno codes
//! the kernel drivers report.

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

const EIO: i32 = 5;
const ENXIO: i32 = 6;
const EBUSY: i32 = 16;
const EINVAL: i32 = 22;
const EPIPE: i32 = 32;
const ETIME: i32 = 62;

/// Errors that can occur when configuring or streaming a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A malformed request: bad routing table, out-of-range pad or stream,
    /// or a route forbidden by the entity's routing restrictions. Nothing
    /// was modified.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The entity or pipeline is streaming and the request would mutate
    /// frozen state (routing, formats, links).
    #[error("Busy: {0}")]
    Busy(String),

    /// The graph does not form a usable pipeline: no DMA engine was found,
    /// no subdevice is connected where one is required, or a link carries
    /// incompatible formats.
    #[error("No such pipeline: {0}")]
    NoSuchPipeline(String),

    /// A bounded hardware polling loop ran out of attempts.
    #[error("Hardware timeout: {what} not ready after {attempts} attempts")]
    HardwareTimeout { what: String, attempts: u32 },

    /// Enabling or disabling streams on a neighbouring entity failed.
    ///
    /// `entity` names the entity whose operation failed first, `source` is
    /// its original error.
    #[error("Streaming failed on {entity}: {source}")]
    Propagation {
        entity: String,
        #[source]
        source: Box<Error>,
    },

    /// A register bus or DMA channel reported an I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// A generic error for failures not covered by the variants above.
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Wraps `error` as a failure of the neighbouring `entity`.
    ///
    /// An error that already carries propagation context is returned as is,
    /// so the entity reported is always the one that failed first.
    pub fn propagation(entity: &str, error: Error) -> Self {
        match error {
            Error::Propagation { .. } => error,
            other => Error::Propagation {
                entity: entity.to_owned(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, looking through propagation context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Propagation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the negative errno equivalent of this error.
    ///
    /// Propagation errors report the errno of their original cause.
    pub fn errno(&self) -> i32 {
        match self.root_cause() {
            Error::InvalidArgument(_) => -EINVAL,
            Error::Busy(_) => -EBUSY,
            Error::NoSuchPipeline(_) => -EPIPE,
            Error::HardwareTimeout { .. } => -ETIME,
            Error::Io(_) | Error::Other(_) => -EIO,
            Error::Propagation { .. } => unreachable!("root_cause() never returns propagation"),
        }
    }

    /// Converts a status code reported by a back-end into a [`Result`].
    ///
    /// # Arguments
    ///
    /// * `status` - Zero for success or a negative errno
    ///
    /// # Returns
    ///
    /// - `Ok(())` if `status == 0`
    /// - `Err(Error::...)` for any negative errno
    pub fn from_errno(status: i32) -> Result<()> {
        match -status {
            0 => Ok(()),
            EINVAL => Err(Error::InvalidArgument("rejected by back-end".into())),
            EBUSY => Err(Error::Busy("back-end busy".into())),
            EPIPE | ENXIO => Err(Error::NoSuchPipeline("back-end reports broken pipe".into())),
            ETIME => Err(Error::HardwareTimeout {
                what: "back-end".into(),
                attempts: 0,
            }),
            EIO => Err(Error::Io("back-end I/O failure".into())),
            other => Err(Error::Other(format!("back-end status -{other}"))),
        }
    }
}
