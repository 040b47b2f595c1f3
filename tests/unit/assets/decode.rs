use super::*;

fn png_bytes(img: &image::RgbaImage) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

#[test]
fn decodes_png_and_hashes_content() {
    let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
    let a = ImageAsset::from_bytes(&png_bytes(&img)).unwrap();
    assert_eq!((a.width(), a.height()), (3, 2));
    assert_eq!(a.rgba.get_pixel(2, 1).0, [10, 20, 30, 255]);

    let b = ImageAsset::from_rgba(img.clone());
    assert_eq!(a.id, b.id);

    let other = ImageAsset::from_rgba(image::RgbaImage::from_pixel(
        3,
        2,
        image::Rgba([10, 20, 31, 255]),
    ));
    assert_ne!(a.id, other.id);
}

#[test]
fn garbage_bytes_are_rejected() {
    assert!(ImageAsset::from_bytes(b"not an image").is_err());
}

#[test]
fn premultiply_zeroes_transparent() {
    let mut px = vec![200, 100, 50, 0, 255, 255, 255, 128];
    premultiply_rgba8_in_place(&mut px);
    assert_eq!(&px[..4], &[0, 0, 0, 0]);
    assert_eq!(&px[4..], &[128, 128, 128, 128]);
}
