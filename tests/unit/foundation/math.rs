use super::*;

#[test]
fn mul_div255_bounds() {
    assert_eq!(mul_div255_u16(0, 255), 0);
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u8(128, 255), 128);
}

#[test]
fn wrap_is_non_negative() {
    assert!((wrap(-30.0, 360.0) - 330.0).abs() < 1e-9);
    assert!((wrap(725.0, 360.0) - 5.0).abs() < 1e-9);
    assert_eq!(wrap(f64::NAN, 360.0), 0.0);
}

#[test]
fn unit_to_u8_clamps() {
    assert_eq!(unit_to_u8(-0.5), 0);
    assert_eq!(unit_to_u8(2.0), 255);
    assert_eq!(unit_to_u8(0.5), 128);
}
