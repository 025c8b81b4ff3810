pub mod image_helper {
    use crate::error::PipelineError;
    use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, Luma};
    use std::path::Path;

    /// Decodes an image of any supported depth, 16-bit TIFF scans included.
    pub fn load(path: &Path) -> Result<DynamicImage, PipelineError> {
        Ok(image::open(path)?)
    }

    /// Stretches the image's own intensity range onto 0..=255.
    /// A flat image has no range to stretch and comes back black.
    pub fn normalize(image: &DynamicImage) -> GrayImage {
        let wide = image.to_luma16();
        let (width, height) = wide.dimensions();

        let (min, max) = wide
            .pixels()
            .fold((u16::MAX, u16::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        if max <= min {
            return GrayImage::new(width, height);
        }

        let range = (max - min) as f64;
        GrayImage::from_fn(width, height, |x, y| {
            let v = (wide.get_pixel(x, y)[0] - min) as f64;
            Luma([(v * 255.0 / range).round() as u8])
        })
    }

    pub fn save(
        path: &Path,
        width: u32,
        height: u32,
        buffer: &[u8],
        color: ExtendedColorType,
    ) -> Result<(), PipelineError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(buffer, width, height, color)?;

        Ok(())
    }

    pub fn save_gray(path: &Path, image: &GrayImage) -> Result<(), PipelineError> {
        save(path, image.width(), image.height(), image.as_raw(), ExtendedColorType::L8)
    }

    pub fn save_rgb(path: &Path, image: &image::RgbImage) -> Result<(), PipelineError> {
        save(path, image.width(), image.height(), image.as_raw(), ExtendedColorType::Rgb8)
    }
}

#[cfg(test)]
mod tests {

    use super::image_helper::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

    #[test]
    fn normalize_stretches_sixteen_bit_range() {
        let raw: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(3, 1, vec![1000, 1500, 2000]).expect("buffer size");
        let normalized = normalize(&DynamicImage::ImageLuma16(raw));
        assert_eq!(normalized.into_raw(), vec![0, 128, 255]);
    }

    #[test]
    fn flat_image_normalizes_to_black() {
        let flat = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([77])));
        assert!(normalize(&flat).pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn save_and_reload_gray_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gradient_file.png");
        let gradient = GrayImage::from_fn(64, 32, |x, _| Luma([(x * 4) as u8]));

        save_gray(&path, &gradient).expect("Error Saving File.");

        let reloaded = load(&path).expect("Error Loading File.").to_luma8();
        assert_eq!(reloaded, gradient);
    }

    #[test]
    fn save_non_square_rgb_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("green_file.png");
        let green = RgbImage::from_pixel(50, 20, Rgb([0, 255, 0]));

        save_rgb(&path, &green).expect("Error Saving File.");

        let reloaded = load(&path).expect("Error Loading File.");
        assert_eq!((reloaded.width(), reloaded.height()), (50, 20));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load(std::path::Path::new("does/not/exist.tif")).is_err());
    }
}
