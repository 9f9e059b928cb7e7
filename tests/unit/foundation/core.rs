use super::*;

#[test]
fn div_ceil_rounds_up_and_handles_zero() {
    assert_eq!(Int2::new(33, 16).div_ceil(Int2::splat(16)), Int2::new(3, 1));
    assert_eq!(Int2::new(0, 5).div_ceil(Int2::splat(16)), Int2::new(0, 1));
    assert_eq!(Int2::new(7, 7).div_ceil(Int2::ZERO), Int2::new(7, 7));
}

#[test]
fn int2_area_and_contains() {
    assert_eq!(Int2::new(4, 3).area(), 12);
    assert_eq!(Int2::new(-1, 3).area(), 0);
    assert!(Int2::new(4, 3).contains(Int2::new(3, 2)));
    assert!(!Int2::new(4, 3).contains(Int2::new(4, 0)));
    assert!(!Int2::new(4, 3).contains(Int2::new(0, -1)));
}

#[test]
fn float4_arithmetic() {
    let a = Float4::new(1.0, 2.0, 3.0, 4.0);
    let b = Float4::splat(1.0);
    assert_eq!(a + b, Float4::new(2.0, 3.0, 4.0, 5.0));
    assert_eq!(a - b, Float4::new(0.0, 1.0, 2.0, 3.0));
    assert_eq!(a * 2.0, Float4::new(2.0, 4.0, 6.0, 8.0));
    assert_eq!(a.lerp(b, 1.0), b);
    assert_eq!(a.with_w(0.0).w(), 0.0);
    assert_eq!(a.max_abs_diff(b), 3.0);
}

#[test]
fn rect_intersection_clamps_to_empty() {
    let a = IntRect::new(Int2::new(0, 0), Int2::new(10, 10));
    let b = IntRect::new(Int2::new(5, 2), Int2::new(20, 8));
    assert_eq!(a.intersect(b), IntRect::new(Int2::new(5, 2), Int2::new(10, 8)));

    let c = IntRect::new(Int2::new(12, 12), Int2::new(14, 14));
    assert!(a.intersect(c).is_empty());
}
