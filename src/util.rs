#[inline(always)]
pub(crate) fn zero_inverse(value: f32) -> f32 {
    if value != 0.0 { 1.0 / value } else { 0.0 }
}

#[inline]
pub(crate) fn lerp<const N: usize>(a: [f32; N], b: [f32; N], t: f32) -> [f32; N] {
    let mut result = [0.0; N];

    for (r, (a, b)) in result.iter_mut().zip(a.iter().zip(b.iter())) {
        *r = a * (1.0 - t) + b * t;
    }

    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lerp() {
        assert_eq!(lerp([0.0, 2.0, 4.0], [2.0, 4.0, 8.0], 0.5), [1.0, 3.0, 6.0]);
        assert_eq!(lerp([1.0, 1.0], [3.0, 5.0], 0.0), [1.0, 1.0]);
        assert_eq!(lerp([1.0, 1.0], [3.0, 5.0], 1.0), [3.0, 5.0]);
    }

    #[test]
    fn test_zero_inverse() {
        assert_eq!(zero_inverse(0.0), 0.0);
        assert_eq!(zero_inverse(4.0), 0.25);
    }
}
