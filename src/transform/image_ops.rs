//! Per-file image work: resize, metadata strip, pass-through copy
//!
//! Everything here is blocking and runs on the blocking pool.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::session::StagedFile;

use super::types::{ResizeSpec, TransformError, TransformOptions, TransformResult, TransformStatus};

/// Extensions treated as images
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Quality used when re-encoding JPEGs
pub const JPEG_QUALITY: u8 = 90;

/// Largest image a resize may produce: 100 megapixels
pub const MAX_OUTPUT_PIXELS: u64 = 100_000_000;

/// Whether a file name carries one of the supported image extensions
pub fn is_image(name: &str) -> bool {
    extension(name)
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Name of the file a transform writes for `name`
///
/// Resized images get `_<p>pct` or `_<w>x<h>` before the extension; strip-only
/// and pass-through outputs keep the original name.
pub fn output_name(name: &str, options: &TransformOptions) -> String {
    match options.resize {
        Some(spec) if is_image(name) => resized_name(name, spec),
        _ => name.to_string(),
    }
}

/// `name` with the resize suffix inserted before its extension
pub fn resized_name(name: &str, spec: ResizeSpec) -> String {
    let suffix = spec.name_suffix();
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{}{}", name, suffix),
    }
}

/// Transform one staged file into `out_dir`
///
/// Decode and encode failures are reported on the item. Only disk failures
/// are returned as errors.
pub fn transform_one(
    file: &StagedFile,
    options: &TransformOptions,
    out_dir: &Path,
) -> Result<TransformResult, TransformError> {
    let name = output_name(&file.name, options);
    let target = out_dir.join(&name);

    if !is_image(&file.name) || !options.touches_images() {
        std::fs::copy(&file.path, &target)?;
        return Ok(TransformResult {
            source: file.name.clone(),
            output: Some(target),
            output_name: Some(name),
            status: TransformStatus::Copied,
        });
    }

    let bytes = std::fs::read(&file.path)?;

    let encoded = match reencode(&bytes, &file.name, options.resize) {
        Ok(encoded) => encoded,
        Err(reason) => {
            tracing::warn!(file = %file.name, error = %reason, "Image transform failed");
            return Ok(TransformResult {
                source: file.name.clone(),
                output: None,
                output_name: None,
                status: TransformStatus::Failed(reason),
            });
        }
    };

    std::fs::write(&target, &encoded.data)?;

    let status = match options.resize {
        Some(_) => TransformStatus::Resized {
            width: encoded.width,
            height: encoded.height,
        },
        None => TransformStatus::Stripped,
    };

    tracing::debug!(
        file = %file.name,
        output = %name,
        width = encoded.width,
        height = encoded.height,
        "Image transformed"
    );

    Ok(TransformResult {
        source: file.name.clone(),
        output: Some(target),
        output_name: Some(name),
        status,
    })
}

// ============================================================================
// Codec
// ============================================================================

struct Encoded {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

/// Decode, optionally resize, and re-encode without any metadata segments
fn reencode(bytes: &[u8], name: &str, resize: Option<ResizeSpec>) -> Result<Encoded, String> {
    let img = image::load_from_memory(bytes).map_err(|e| format!("decode failed: {}", e))?;

    let img = match resize {
        Some(spec) => apply_resize(&img, spec)?,
        None => img,
    };
    let (width, height) = img.dimensions();

    let format = extension(name)
        .and_then(ImageFormat::from_extension)
        .or_else(|| image::guess_format(bytes).ok())
        .ok_or_else(|| "unknown image format".to_string())?;

    let data = encode(img, format).map_err(|e| format!("encode failed: {}", e))?;
    Ok(Encoded {
        data,
        width,
        height,
    })
}

fn apply_resize(img: &DynamicImage, spec: ResizeSpec) -> Result<DynamicImage, String> {
    let (width, height) = target_dimensions(img.dimensions(), spec);
    if width as u64 * height as u64 > MAX_OUTPUT_PIXELS {
        return Err(format!(
            "resize to {}x{} exceeds the {} pixel limit",
            width, height, MAX_OUTPUT_PIXELS
        ));
    }
    Ok(img.resize_exact(width, height, FilterType::CatmullRom))
}

/// Output size for `spec`; `Fit` keeps the aspect ratio inside the box
fn target_dimensions((w, h): (u32, u32), spec: ResizeSpec) -> (u32, u32) {
    let scale = |dim: u32, factor: f64| {
        let scaled = (dim as f64 * factor).round();
        (scaled.min(u32::MAX as f64) as u32).max(1)
    };
    match spec {
        ResizeSpec::Percent(percent) => {
            let factor = percent as f64 / 100.0;
            (scale(w, factor), scale(h, factor))
        }
        ResizeSpec::Fit { width, height } => {
            let factor = f64::min(width as f64 / w as f64, height as f64 / h as f64);
            (scale(w, factor), scale(h, factor))
        }
    }
}

/// Encode decoded pixels into a fresh container
///
/// Alpha is kept for formats that carry it. Colour profiles and 16-bit
/// channels are not preserved.
fn encode(img: DynamicImage, format: ImageFormat) -> image::ImageResult<Vec<u8>> {
    let mut output = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)?;
        }
        _ => {
            let normalized = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            normalized.write_to(&mut Cursor::new(&mut output), format)?;
        }
    }

    Ok(output)
}

fn extension(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|ext| ext.to_str())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    /// Write a solid-colour image of the given size to `dir/name`
    pub(crate) fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> StagedFile {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 90]));
        let path = dir.join(name);
        let format = ImageFormat::from_path(&path).unwrap();
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut data), format)
            .unwrap();
        std::fs::write(&path, &data).unwrap();
        StagedFile {
            name: name.to_string(),
            upload_name: name.to_string(),
            size: data.len() as u64,
            path,
        }
    }

    /// Insert an APP1 Exif segment right after the JPEG SOI marker
    pub(crate) fn inject_exif(jpeg: &[u8]) -> Vec<u8> {
        let payload: &[u8] = b"Exif\0\0MM\0*\0\0\0\x08\0\0GPS-LAT-51.5";
        let len = (payload.len() + 2) as u16;
        let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
        out.extend_from_slice(&jpeg[..2]);
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_is_image() {
        assert!(is_image("a.jpg"));
        assert!(is_image("a.JPEG"));
        assert!(is_image("b.WebP"));
        assert!(!is_image("notes.txt"));
        assert!(!is_image("jpg"));
    }

    #[test]
    fn test_output_name() {
        let percent = TransformOptions {
            resize: Some(ResizeSpec::Percent(50)),
            strip_metadata: false,
        };
        let fit = TransformOptions {
            resize: Some(ResizeSpec::Fit { width: 800, height: 600 }),
            strip_metadata: true,
        };
        let strip = TransformOptions {
            resize: None,
            strip_metadata: true,
        };

        assert_eq!(output_name("cat.jpg", &percent), "cat_50pct.jpg");
        assert_eq!(output_name("cat.png", &fit), "cat_800x600.png");
        assert_eq!(output_name("cat.png", &strip), "cat.png");
        assert_eq!(output_name("notes.txt", &percent), "notes.txt");
    }

    #[test]
    fn test_percent_resize_halves_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();
        let file = write_test_image(temp_dir.path(), "photo.png", 200, 101);

        let options = TransformOptions {
            resize: Some(ResizeSpec::Percent(50)),
            strip_metadata: false,
        };
        let result = transform_one(&file, &options, &out_dir).unwrap();

        assert_eq!(result.status, TransformStatus::Resized { width: 100, height: 51 });
        let output = image::open(out_dir.join("photo_50pct.png")).unwrap();
        assert_eq!(output.dimensions(), (100, 51));
    }

    #[test]
    fn test_fit_resize_preserves_aspect_ratio() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();
        let file = write_test_image(temp_dir.path(), "wide.png", 400, 200);

        let options = TransformOptions {
            resize: Some(ResizeSpec::Fit { width: 100, height: 100 }),
            strip_metadata: false,
        };
        let result = transform_one(&file, &options, &out_dir).unwrap();

        let output = image::open(result.output.unwrap()).unwrap();
        let (w, h) = output.dimensions();
        assert!(w <= 100 && h <= 100);
        assert_eq!((w, h), (100, 50));
    }

    #[test]
    fn test_strip_removes_exif_and_keeps_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();

        let plain = write_test_image(temp_dir.path(), "gps.jpg", 64, 48);
        let tagged = inject_exif(&std::fs::read(&plain.path).unwrap());
        std::fs::write(&plain.path, &tagged).unwrap();
        assert!(contains(&tagged, b"Exif"));
        assert_eq!(image::open(&plain.path).unwrap().dimensions(), (64, 48));

        let options = TransformOptions {
            resize: None,
            strip_metadata: true,
        };
        let result = transform_one(&plain, &options, &out_dir).unwrap();
        assert_eq!(result.status, TransformStatus::Stripped);

        let stripped = std::fs::read(out_dir.join("gps.jpg")).unwrap();
        assert!(!contains(&stripped, b"Exif"));
        assert!(!contains(&stripped, b"GPS-LAT"));
        assert_eq!(image::load_from_memory(&stripped).unwrap().dimensions(), (64, 48));
    }

    #[test]
    fn test_strip_keeps_alpha_for_png() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();

        let path = temp_dir.path().join("clear.png");
        RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 0]))
            .save(&path)
            .unwrap();
        let file = StagedFile {
            name: "clear.png".to_string(),
            upload_name: "clear.png".to_string(),
            size: std::fs::metadata(&path).unwrap().len(),
            path,
        };

        let options = TransformOptions {
            resize: None,
            strip_metadata: true,
        };
        transform_one(&file, &options, &out_dir).unwrap();

        let output = image::open(out_dir.join("clear.png")).unwrap();
        assert!(output.color().has_alpha());
        assert_eq!(output.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_corrupt_image_fails_item_only() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();

        let path = temp_dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really").unwrap();
        let file = StagedFile {
            name: "broken.png".to_string(),
            upload_name: "broken.png".to_string(),
            size: 18,
            path,
        };

        let options = TransformOptions {
            resize: Some(ResizeSpec::Percent(50)),
            strip_metadata: false,
        };
        let result = transform_one(&file, &options, &out_dir).unwrap();
        assert!(result.is_failed());
        assert!(result.output.is_none());
        assert!(!out_dir.join("broken_50pct.png").exists());
    }

    #[test]
    fn test_oversized_resize_fails_item() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();
        let file = write_test_image(temp_dir.path(), "tiny.png", 10, 10);

        let options = TransformOptions {
            resize: Some(ResizeSpec::Percent(1_000_000)),
            strip_metadata: false,
        };
        let result = transform_one(&file, &options, &out_dir).unwrap();
        assert!(matches!(&result.status, TransformStatus::Failed(reason) if reason.contains("pixel limit")));
        assert!(!out_dir.join("tiny_1000000pct.png").exists());

        let options = TransformOptions {
            resize: Some(ResizeSpec::Fit { width: 100_000, height: 100_000 }),
            strip_metadata: false,
        };
        assert!(transform_one(&file, &options, &out_dir).unwrap().is_failed());
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(target_dimensions((40, 20), ResizeSpec::Percent(50)), (20, 10));
        assert_eq!(target_dimensions((1, 1), ResizeSpec::Percent(10)), (1, 1));
        assert_eq!(
            target_dimensions((400, 200), ResizeSpec::Fit { width: 100, height: 100 }),
            (100, 50)
        );
        assert_eq!(
            target_dimensions((100, 50), ResizeSpec::Fit { width: 400, height: 400 }),
            (400, 200)
        );
    }

    #[test]
    fn test_non_image_is_copied_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();

        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        let file = StagedFile {
            name: "notes.txt".to_string(),
            upload_name: "notes.txt".to_string(),
            size: 5,
            path,
        };

        let options = TransformOptions {
            resize: Some(ResizeSpec::Percent(10)),
            strip_metadata: true,
        };
        let result = transform_one(&file, &options, &out_dir).unwrap();
        assert_eq!(result.status, TransformStatus::Copied);
        assert_eq!(std::fs::read(out_dir.join("notes.txt")).unwrap(), b"hello");
    }
}
