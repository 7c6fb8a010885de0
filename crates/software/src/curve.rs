//! Pure functions producing monotonic sequences. The bell fade-in eases volume and tempo with a linear [`spread`], and
//! the star motor accelerates and decelerates along a [`log_ramp`].
//!
//! Results are returned in fixed-capacity [`ArrayVec`]s; asking for more points than the capacity `N` is treated the
//! same as any other invalid range.

use num_traits::Float;
use tinyvec::ArrayVec;

/// Errors produced by the curve generators.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CurveError {
    /// The endpoints are in the wrong order, or the requested number of points is below two or above the capacity.
    InvalidRange,
}

/// Returns `steps` values linearly interpolated from `min` to `max`, both inclusive.
///
/// `min` may be greater than `max`, in which case the values descend.
pub fn spread<const N: usize>(min: f32, max: f32, steps: usize) -> Result<ArrayVec<[f32; N]>, CurveError> {
    if steps < 2 || steps > N {
        return Err(CurveError::InvalidRange);
    }

    let step = (max - min) / (steps - 1) as f32;
    let mut values = ArrayVec::new();
    for i in 0..steps - 1 {
        values.push(min + step * i as f32);
    }
    // pinned rather than computed so that rounding can never leave the last value short of its target
    values.push(max);

    Ok(values)
}

/// Returns `count` points easing logarithmically from `start` toward (but not reaching) `end`.
///
/// Point `i` is `round(start + scale * log10(1 + i))` where `scale = (end - start) / log10(1 + count)`, which yields a
/// non-increasing sequence that changes quickly at first and flattens out as it approaches `end`. `start` must be
/// greater than `end`; reverse the result to ease away from a value instead.
pub fn log_ramp<const N: usize>(start: u32, end: u32, count: usize) -> Result<ArrayVec<[u32; N]>, CurveError> {
    if start <= end || count < 2 || count > N {
        return Err(CurveError::InvalidRange);
    }

    let start = start as f32;
    let scale = (end as f32 - start) / (1.0 + count as f32).log10();

    Ok((0..count)
        .map(|i| (start + scale * (1.0 + i as f32).log10()).round() as u32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_interpolates_inclusively() {
        let actual = spread::<8>(12.0, 40.0, 5).unwrap();
        assert_eq!(
            &[12.0, 19.0, 26.0, 33.0, 40.0][..],
            actual.as_slice(),
            "Expected left but got right"
        );
    }

    #[test]
    fn spread_descends_when_min_exceeds_max() {
        let actual = spread::<8>(270.0, 250.0, 3).unwrap();
        assert_eq!(&[270.0, 260.0, 250.0][..], actual.as_slice(), "Expected left but got right");
    }

    #[test]
    fn spread_is_strictly_monotonic() {
        let actual = spread::<32>(15.0, 40.0, 10).unwrap();
        assert_eq!(10, actual.len());
        assert_eq!(15.0, actual[0]);
        assert_eq!(40.0, actual[9]);
        assert!(actual.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn spread_rejects_fewer_than_two_steps() {
        assert_eq!(Err(CurveError::InvalidRange), spread::<8>(1.0, 2.0, 1));
        assert_eq!(Err(CurveError::InvalidRange), spread::<8>(1.0, 2.0, 0));
    }

    #[test]
    fn spread_rejects_more_steps_than_capacity() {
        assert_eq!(Err(CurveError::InvalidRange), spread::<4>(1.0, 2.0, 5));
    }

    #[test]
    fn log_ramp_eases_toward_end() {
        let actual = log_ramp::<16>(750, 100, 10).unwrap();
        assert_eq!(10, actual.len());
        assert_eq!(750, actual[0], "Ramp should begin at its start value");
        assert!(
            actual.windows(2).all(|pair| pair[0] >= pair[1]),
            "Ramp should never increase"
        );
        let last = actual[9];
        assert!(last > 100 && last < 150, "Ramp should end near 100, got {}", last);
    }

    #[test]
    fn log_ramp_changes_fastest_at_the_start() {
        let actual = log_ramp::<16>(750, 100, 10).unwrap();
        let first_drop = actual[0] - actual[1];
        let last_drop = actual[8] - actual[9];
        assert!(first_drop > last_drop);
    }

    #[test]
    fn log_ramp_requires_descending_endpoints() {
        assert_eq!(Err(CurveError::InvalidRange), log_ramp::<8>(100, 200, 5));
        assert_eq!(Err(CurveError::InvalidRange), log_ramp::<8>(100, 100, 5));
    }

    #[test]
    fn log_ramp_rejects_bad_counts() {
        assert_eq!(Err(CurveError::InvalidRange), log_ramp::<8>(750, 100, 1));
        assert_eq!(Err(CurveError::InvalidRange), log_ramp::<8>(750, 100, 9));
    }
}
