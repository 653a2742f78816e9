/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/// Bounds on the remaining length of an [`InputStream`](crate::io::InputStream).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeHint {
    lower: u64,
    upper: Option<u64>,
}

impl SizeHint {
    /// A stream of exactly `len` bytes
    pub fn exact(len: u64) -> Self {
        Self {
            lower: len,
            upper: Some(len),
        }
    }

    /// A stream whose length is not known up front
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Lower bound on the number of bytes
    pub fn lower(&self) -> u64 {
        self.lower
    }

    /// Upper bound, if one is known
    pub fn upper(&self) -> Option<u64> {
        self.upper
    }

    /// The exact length when lower and upper bounds agree
    pub fn exact_len(&self) -> Option<u64> {
        match self.upper {
            Some(upper) if upper == self.lower => Some(upper),
            _ => None,
        }
    }
}
