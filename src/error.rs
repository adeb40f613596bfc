// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use thiserror::Error;

/// Errors that can occur while constructing a [`Histogram`](crate::Histogram).
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum CreationError {
    #[error("lowest trackable value must be >= 1")]
    LowestTrackableValueZero,
    #[error("highest trackable value must be >= 2x the lowest trackable value")]
    HighestTrackableValueTooSmall,
    #[error("significant figures must be between 1 and 5 inclusive")]
    SignificantFiguresOutOfRange,
    #[error("the requested precision cannot be represented at this lowest trackable value")]
    CannotRepresentSignificantFigures,
}
