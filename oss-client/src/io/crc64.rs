/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! CRC64 (ECMA-182, reflected) as reported by the `x-oss-hash-crc64ecma` header

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crc::{Crc, CRC_64_XZ};

static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

// reflected ECMA-182 polynomial
const POLY: u64 = 0xC96C_5795_D787_0F42;

/// CRC64 of `data`
pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Continue a CRC64 computation: `update(checksum(a), b) == checksum(a ++ b)`
pub fn update(crc: u64, data: &[u8]) -> u64 {
    // the register holds the complement of the finalized value, in reflected bit order
    let mut digest = CRC64.digest_with_initial((!crc).reverse_bits());
    digest.update(data);
    digest.finalize()
}

/// CRC64 of the concatenation of two byte sequences given their CRCs and the length of the
/// second one.
pub fn combine(mut crc1: u64, crc2: u64, mut len2: u64) -> u64 {
    if len2 == 0 {
        return crc1;
    }

    // operator for one zero bit in odd, then two and four zero bits
    let mut even = [0u64; 64];
    let mut odd = [0u64; 64];
    odd[0] = POLY;
    let mut row = 1u64;
    for slot in odd.iter_mut().skip(1) {
        *slot = row;
        row <<= 1;
    }
    gf2_matrix_square(&mut even, &odd);
    gf2_matrix_square(&mut odd, &even);

    // apply len2 zeros to crc1
    loop {
        gf2_matrix_square(&mut even, &odd);
        if len2 & 1 != 0 {
            crc1 = gf2_matrix_times(&even, crc1);
        }
        len2 >>= 1;
        if len2 == 0 {
            break;
        }

        gf2_matrix_square(&mut odd, &even);
        if len2 & 1 != 0 {
            crc1 = gf2_matrix_times(&odd, crc1);
        }
        len2 >>= 1;
        if len2 == 0 {
            break;
        }
    }

    crc1 ^ crc2
}

fn gf2_matrix_times(mat: &[u64; 64], mut vec: u64) -> u64 {
    let mut sum = 0;
    let mut i = 0;
    while vec != 0 {
        if vec & 1 != 0 {
            sum ^= mat[i];
        }
        vec >>= 1;
        i += 1;
    }
    sum
}

fn gf2_matrix_square(square: &mut [u64; 64], mat: &[u64; 64]) {
    for (n, slot) in square.iter_mut().enumerate() {
        *slot = gf2_matrix_times(mat, mat[n]);
    }
}

/// Running CRC64 shared between a body adapter and the request engine
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedCrc64(Arc<AtomicU64>);

impl SharedCrc64 {
    pub(crate) fn new(seed: u64) -> Self {
        Self(Arc::new(AtomicU64::new(seed)))
    }

    pub(crate) fn update(&self, data: &[u8]) {
        // a single body is only ever read by one task at a time
        let current = self.0.load(Ordering::Acquire);
        self.0.store(update(current, data), Ordering::Release);
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
