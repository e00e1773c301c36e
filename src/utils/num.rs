//! Centralized numeric casts. Prefer these over a raw `as` at call sites so
//! overflow/truncation is a single reviewable spot instead of scattered casts.

#[inline]
#[must_use]
pub fn u64_to_usize(v: u64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn u32_to_usize(v: u32) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
#[must_use]
pub fn usize_to_u32_saturating(v: usize) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

#[inline]
#[must_use]
pub fn i64_to_usize(v: i64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_to_usize_matches_try_from() {
        for &v in &[0u64, 1, 42, u64::from(u32::MAX) + 1] {
            assert_eq!(u64_to_usize(v), usize::try_from(v).ok());
        }
    }

    #[test]
    fn usize_to_u64_roundtrips() {
        for &v in &[0usize, 1, 4096, 1_000_000] {
            assert_eq!(usize_to_u64(v) as usize, v);
        }
    }

    #[test]
    fn i64_to_usize_rejects_negative() {
        assert_eq!(i64_to_usize(-1), None);
        assert_eq!(i64_to_usize(5), Some(5));
    }
}
