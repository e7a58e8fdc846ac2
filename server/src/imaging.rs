use std::io::Cursor;

use fgsm::model::INPUT_SHAPE;
use image::{
    ExtendedColorType, ImageEncoder, ImageResult, codecs::png::PngEncoder, imageops::FilterType,
};
use ndarray::{Array4, ArrayView2};

/// Turns an uploaded picture into a `(1, 1, 28, 28)` classifier input.
///
/// The picture is converted to grayscale, resized with bilinear filtering, scaled to `[0, 1]` and
/// inverted, since MNIST digits are white on a black background.
pub fn preprocess(bytes: &[u8]) -> ImageResult<Array4<f32>> {
    let (_, h, w) = INPUT_SHAPE;

    let gray = image::load_from_memory(bytes)?.to_luma8();
    let resized = image::imageops::resize(&gray, w as u32, h as u32, FilterType::Triangle);

    Ok(Array4::from_shape_fn((1, 1, h, w), |(_, _, i, j)| {
        1. - resized.get_pixel(j as u32, i as u32)[0] as f32 / 255.
    }))
}

/// Encodes a `[0, 1]` image as an 8 bit grayscale PNG. Pixels are truncated, not rounded.
pub fn encode_png(image: ArrayView2<f32>) -> ImageResult<Vec<u8>> {
    let (h, w) = image.dim();
    let pixels: Vec<u8> = image.iter().map(|&x| (x * 255.) as u8).collect();

    let mut png = Cursor::new(Vec::new());
    PngEncoder::new(&mut png).write_image(&pixels, w as u32, h as u32, ExtendedColorType::L8)?;

    Ok(png.into_inner())
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
    use ndarray::array;

    use super::*;

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn inverts_and_resizes() {
        let white = RgbImage::from_pixel(56, 40, Rgb([255, 255, 255]));
        let black = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));

        let x = preprocess(&png_bytes(&white)).unwrap();
        assert_eq!(x.dim(), (1, 1, 28, 28));
        assert!(x.iter().all(|&v| v == 0.));

        let x = preprocess(&png_bytes(&black)).unwrap();
        assert!(x.iter().all(|&v| v == 1.));
    }

    #[test]
    fn keeps_rows_and_columns_apart() {
        // dark left half on a 28x28 picture: only the left columns light up.
        let image = RgbImage::from_fn(28, 28, |x, _| {
            if x < 14 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });

        let x = preprocess(&png_bytes(&image)).unwrap();

        assert_eq!(x[[0, 0, 5, 0]], 1.);
        assert_eq!(x[[0, 0, 5, 27]], 0.);
    }

    #[test]
    fn rejects_garbage() {
        assert!(preprocess(b"not an image").is_err());
        assert!(preprocess(&[]).is_err());
    }

    #[test]
    fn png_truncates_pixels() {
        let image = array![[0., 0.999, 1.], [0.5, 0.25, 0.1]];

        let png = encode_png(image.view()).unwrap();
        let decoded: GrayImage = image::load_from_memory(&png).unwrap().to_luma8();

        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(*decoded.get_pixel(1, 0), Luma([254]));
        assert_eq!(*decoded.get_pixel(2, 0), Luma([255]));
        assert_eq!(*decoded.get_pixel(0, 1), Luma([127]));
        assert_eq!(*decoded.get_pixel(2, 1), Luma([25]));
    }
}
