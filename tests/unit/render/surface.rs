use super::*;

#[test]
fn pixel_access_is_bounds_checked() {
    let mut s = Surface::new(Canvas::new(4, 2).unwrap());
    s.set_pixel(3, 1, [1, 2, 3, 4]);
    s.set_pixel(4, 1, [9, 9, 9, 9]);
    s.set_pixel(-1, 0, [9, 9, 9, 9]);
    assert_eq!(s.pixel(3, 1), [1, 2, 3, 4]);
    assert_eq!(s.pixel(10, 10), [0, 0, 0, 0]);
    assert_eq!(s.data().iter().filter(|&&b| b == 9).count(), 0);
}

#[test]
fn fill_and_clear() {
    let mut s = Surface::new(Canvas::new(2, 2).unwrap());
    s.fill(Rgba8Premul::from_straight_rgba(17, 24, 39, 255));
    assert_eq!(s.pixel(1, 1), [17, 24, 39, 255]);
    s.clear();
    assert!(s.data().iter().all(|&b| b == 0));
}

#[test]
fn from_premul_checks_len() {
    assert!(Surface::from_premul(Canvas::new(2, 2).unwrap(), vec![0; 15]).is_err());
    assert!(Surface::from_premul(Canvas::new(2, 2).unwrap(), vec![0; 16]).is_ok());
}

#[test]
fn straight_conversion_unpremultiplies() {
    let f = FrameRGBA {
        width: 1,
        height: 1,
        data: vec![64, 0, 128, 128],
        premultiplied: true,
    };
    let s = f.to_straight();
    assert!(!s.premultiplied);
    assert_eq!(s.data, vec![128, 0, 255, 128]);
}
