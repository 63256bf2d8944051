//! W-LSB (Window-based Least Significant Bits) encoding support.
//!
//! Implements the compressor side of the W-LSB scheme of RFC 3095 §4.5.1
//! and §4.5.2: the interpretation-interval function `f(v_ref, k, p)` and a
//! bounded sliding window of reference values from which the minimum number
//! of LSBs to transmit is derived.

use std::collections::VecDeque;

/// Determines if a value falls within the W-LSB interpretation window.
///
/// The interpretation window is defined as:
/// `[reference_value - p_offset, reference_value - p_offset + (2^num_lsb_bits) - 1]`
/// All calculations are performed modulo `2^64`.
pub fn is_value_in_lsb_interval(
    value: u64,
    reference_value: u64,
    num_lsb_bits: u8,
    p_offset: i64,
) -> bool {
    if num_lsb_bits == 0 || num_lsb_bits > 64 {
        return false;
    }
    if num_lsb_bits == 64 {
        // All 64 bits are LSBs, value is fully known
        return true;
    }

    let window_size = 1u64 << num_lsb_bits;

    let interval_base = if p_offset >= 0 {
        reference_value.wrapping_sub(p_offset as u64)
    } else {
        reference_value.wrapping_add((-p_offset) as u64)
    };

    // In window iff (v - interval_base) mod 2^64 < window_size
    value.wrapping_sub(interval_base) < window_size
}

/// Extracts the `k` least significant bits of `value`.
#[inline]
pub fn encode_lsb(value: u64, num_lsb_bits: u8) -> u64 {
    debug_assert!(
        num_lsb_bits >= 1 && num_lsb_bits <= 64,
        "LSB count out of range: {}",
        num_lsb_bits
    );
    if num_lsb_bits >= 64 {
        value
    } else {
        value & ((1u64 << num_lsb_bits) - 1)
    }
}

/// Sliding window of recent reference values for one wrapping field.
///
/// The compressor adds every transmitted value to the window; before each
/// packet it asks for the minimum `k` such that the k-bit interpretation
/// interval anchored at ANY stored reference still contains the new value
/// (RFC 3095 §4.5.2). The decompressor may have any of the stored values as
/// its reference, hence the scan over the whole window.
#[derive(Debug, Clone)]
pub struct WlsbWindow {
    references: VecDeque<u64>,
    capacity: usize,
    field_bits: u8,
    p_offset: i64,
}

impl WlsbWindow {
    /// Creates an empty window.
    ///
    /// `capacity` must be a power of two (enforced by the engine setter);
    /// `field_bits` is the native width of the encoded field (16 for SN and
    /// IP-ID, 32 for a timestamp); `p_offset` is the field-specific `p`.
    pub fn new(capacity: usize, field_bits: u8, p_offset: i64) -> Self {
        debug_assert!(capacity.is_power_of_two(), "window width {} not a power of two", capacity);
        debug_assert!(field_bits > 0 && field_bits <= 64);
        Self {
            references: VecDeque::with_capacity(capacity),
            capacity,
            field_bits,
            p_offset,
        }
    }

    /// Admits a new reference value, evicting the oldest when full.
    pub fn add(&mut self, value: u64) {
        if self.references.len() == self.capacity {
            self.references.pop_front();
        }
        self.references.push_back(value & self.mask());
    }

    /// Minimum `k` so the k-bit interval around every stored reference
    /// contains `value`. `k = 0` means the value is fully deducible from
    /// any reference. Returns the full field width when the window is empty
    /// or no smaller `k` works.
    pub fn k_required(&self, value: u64) -> u8 {
        let value = value & self.mask();
        if self.references.is_empty() {
            return self.field_bits;
        }
        for k in 0..self.field_bits {
            if self.covered_by(value, k) {
                return k;
            }
        }
        self.field_bits
    }

    /// True when `k` bits are enough for every reference in the window.
    pub fn covered_by(&self, value: u64, k: u8) -> bool {
        self.references.iter().all(|&v_ref| {
            in_field_interval(value, v_ref, k, self.p_offset, self.field_bits)
        })
    }

    /// Number of references currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    /// True when no reference has been admitted yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// True once the window holds enough references for the decompressor to
    /// be trusted with minimal updates (the window is full).
    #[inline]
    pub fn is_established(&self) -> bool {
        self.references.len() >= self.capacity
    }

    /// Drops every stored reference.
    pub fn clear(&mut self) {
        self.references.clear();
    }

    #[inline]
    fn mask(&self) -> u64 {
        if self.field_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.field_bits) - 1
        }
    }
}

/// Interval check performed modulo `2^field_bits` instead of `2^64`.
/// Unlike [`is_value_in_lsb_interval`], `k = 0` is meaningful here: the
/// interval degenerates to the single point `v_ref - p`.
fn in_field_interval(value: u64, v_ref: u64, k: u8, p_offset: i64, field_bits: u8) -> bool {
    if field_bits >= 64 {
        return is_value_in_lsb_interval(value, v_ref, k, p_offset);
    }
    let modulus_mask = (1u64 << field_bits) - 1;
    if k >= field_bits {
        return true;
    }
    let window_size = 1u64 << k;
    let interval_base = if p_offset >= 0 {
        v_ref.wrapping_sub(p_offset as u64) & modulus_mask
    } else {
        v_ref.wrapping_add((-p_offset) as u64) & modulus_mask
    };
    (value.wrapping_sub(interval_base) & modulus_mask) < window_size
}
