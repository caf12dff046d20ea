use std::ops::Range;

/// Splits `total` samples among `devices` and returns the slice for `device`.
///
/// Ranges are contiguous, disjoint and cover `0..total`; their sizes differ by at most 1.
pub fn shard_range(total: usize, device: usize, devices: usize) -> Range<usize> {
    let base = total / devices;
    let rem = total % devices;

    let start = device * base + device.min(rem);
    let extra = usize::from(device < rem);
    start..start + base + extra
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_range_balanced() {
        // total 10, devices 3 => sizes 4,3,3
        assert_eq!(shard_range(10, 0, 3), 0..4);
        assert_eq!(shard_range(10, 1, 3), 4..7);
        assert_eq!(shard_range(10, 2, 3), 7..10);
    }

    #[test]
    fn fewer_samples_than_devices_leaves_trailing_shards_empty() {
        assert_eq!(shard_range(1, 0, 2), 0..1);
        assert_eq!(shard_range(1, 1, 2), 1..1);
    }
}
