//! Output directory handling and per-response file formats

use airsim_shared::ImageResponse;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::pfm::encode_pfm;

/// Value written into the green channel of raw captures
pub const GREEN_MARK: u8 = 100;

/// Errors that can occur while saving captures
#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("{0} exists and is not a directory")]
    NotADirectory(PathBuf),

    #[error("pixel buffer of {len} bytes does not fit a {width}x{height} image")]
    BadPixelBuffer { len: usize, width: i64, height: i64 },

    #[error("float buffer of {len} values does not fit a {width}x{height} image")]
    BadFloatBuffer { len: usize, width: usize, height: usize },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ImagingError + '_ {
    move |source| ImagingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Create `path` and its parents; an existing directory is fine
pub fn ensure_dir(path: &Path) -> Result<(), ImagingError> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(_) if path.is_dir() => Ok(()),
        Err(e) if path.exists() => {
            debug!("create_dir_all({}) failed: {}", path.display(), e);
            Err(ImagingError::NotADirectory(path.to_path_buf()))
        }
        Err(e) => Err(io_error(path)(e)),
    }
}

/// How a response is written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Floating point depth, kept at full precision
    Pfm,
    /// Already-compressed PNG bytes
    Png,
    /// Uncompressed pixels, re-encoded after marking
    Raw,
}

impl ImageFormat {
    /// Float payload wins over compression; anything else is raw
    pub fn for_response(response: &ImageResponse) -> Self {
        if response.pixels_as_float {
            ImageFormat::Pfm
        } else if response.compress {
            ImageFormat::Png
        } else {
            ImageFormat::Raw
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Pfm => ".pfm",
            ImageFormat::Png => ".png",
            ImageFormat::Raw => ".greener.png",
        }
    }
}

/// Flip raw pixels vertically and force the green channel
///
/// Returns the marked buffer and its channel count (3 or 4).
pub fn mark_raw_pixels(data: &[u8], width: i32, height: i32) -> Result<(Vec<u8>, usize), ImagingError> {
    let bad = || ImagingError::BadPixelBuffer {
        len: data.len(),
        width: width.into(),
        height: height.into(),
    };

    let (w, h) = match (usize::try_from(width), usize::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(bad()),
    };
    let pixels = w * h;
    if data.len() % pixels != 0 {
        return Err(bad());
    }
    let channels = data.len() / pixels;
    if channels != 3 && channels != 4 {
        return Err(bad());
    }

    // Captures arrive bottom row first
    let mut marked = Vec::with_capacity(data.len());
    for row in data.chunks_exact(w * channels).rev() {
        marked.extend_from_slice(row);
    }
    for pixel in marked.chunks_exact_mut(channels) {
        pixel[1] = GREEN_MARK;
    }

    Ok((marked, channels))
}

fn write_marked_png(path: &Path, response: &ImageResponse) -> Result<(), ImagingError> {
    let (pixels, channels) = mark_raw_pixels(&response.image_data_uint8, response.width, response.height)?;
    let color = if channels == 4 {
        ExtendedColorType::Rgba8
    } else {
        ExtendedColorType::Rgb8
    };

    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer).write_image(
        &pixels,
        response.width as u32,
        response.height as u32,
        color,
    )?;
    writer.flush().map_err(io_error(path))
}

/// Write one response as `{dir}/{index}{ext}`
pub fn save_response(dir: &Path, index: usize, response: &ImageResponse) -> Result<PathBuf, ImagingError> {
    let format = ImageFormat::for_response(response);
    let path = dir.join(format!("{}{}", index, format.extension()));

    info!(
        "Type {}, size {}",
        i32::from(response.image_type),
        response.payload_len()
    );

    match format {
        ImageFormat::Pfm => {
            let bad = || ImagingError::BadFloatBuffer {
                len: response.image_data_float.len(),
                width: 0,
                height: 0,
            };
            let width = usize::try_from(response.width).map_err(|_| bad())?;
            let height = usize::try_from(response.height).map_err(|_| bad())?;
            let encoded = encode_pfm(&response.image_data_float, width, height)?;
            fs::write(&path, &encoded).map_err(io_error(&path))?;
        }
        ImageFormat::Png => {
            fs::write(&path, &response.image_data_uint8).map_err(io_error(&path))?;
        }
        ImageFormat::Raw => write_marked_png(&path, response)?,
    }

    Ok(path)
}

/// Write every response in order, numbering files from zero
pub fn save_responses(dir: &Path, responses: &[ImageResponse]) -> Result<Vec<PathBuf>, ImagingError> {
    responses
        .iter()
        .enumerate()
        .map(|(index, response)| save_response(dir, index, response))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use airsim_shared::ImageType;
    use airsim_shared::ByteBuf;

    fn response(pixels_as_float: bool, compress: bool) -> ImageResponse {
        ImageResponse {
            pixels_as_float,
            compress,
            ..Default::default()
        }
    }

    #[test]
    fn test_ensure_dir_accepts_existing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("airsim_drone");

        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
        ensure_dir(&dir).unwrap();
    }

    #[test]
    fn test_ensure_dir_rejects_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("airsim_drone");
        fs::write(&path, b"not a directory").unwrap();

        match ensure_dir(&path) {
            Err(ImagingError::NotADirectory(p)) => assert_eq!(p, path),
            other => panic!("expected NotADirectory, got {:?}", other),
        }
    }

    #[test]
    fn test_format_from_flags() {
        assert_eq!(ImageFormat::for_response(&response(true, true)), ImageFormat::Pfm);
        assert_eq!(ImageFormat::for_response(&response(true, false)), ImageFormat::Pfm);
        assert_eq!(ImageFormat::for_response(&response(false, true)), ImageFormat::Png);
        assert_eq!(ImageFormat::for_response(&response(false, false)), ImageFormat::Raw);
        assert_eq!(ImageFormat::Raw.extension(), ".greener.png");
    }

    #[test]
    fn test_mark_raw_pixels_flips_and_marks_green() {
        // 1x2 RGBA: top row red=1, bottom row red=2
        let data = [1, 7, 9, 255, 2, 7, 9, 255];
        let (marked, channels) = mark_raw_pixels(&data, 1, 2).unwrap();

        assert_eq!(channels, 4);
        assert_eq!(marked, [2, GREEN_MARK, 9, 255, 1, GREEN_MARK, 9, 255]);
    }

    #[test]
    fn test_mark_raw_pixels_accepts_rgb() {
        let data = [10, 20, 30, 40, 50, 60];
        let (marked, channels) = mark_raw_pixels(&data, 2, 1).unwrap();
        assert_eq!(channels, 3);
        assert_eq!(marked, [10, GREEN_MARK, 30, 40, GREEN_MARK, 60]);
    }

    #[test]
    fn test_mark_raw_pixels_rejects_bad_shape() {
        assert!(mark_raw_pixels(&[0; 10], 2, 2).is_err());
        assert!(mark_raw_pixels(&[0; 8], 0, 2).is_err());
        assert!(mark_raw_pixels(&[0; 8], -1, 2).is_err());
    }

    #[test]
    fn test_save_responses_names_files_by_index() {
        let tmp = tempfile::tempdir().unwrap();

        let depth = ImageResponse {
            image_data_uint8: ByteBuf::from(b"\x89PNG fake".to_vec()),
            image_type: ImageType::DepthVis,
            ..response(false, true)
        };
        let scene = ImageResponse {
            image_data_uint8: ByteBuf::from(vec![0u8; 2 * 2 * 4]),
            width: 2,
            height: 2,
            ..response(false, false)
        };
        let planar = ImageResponse {
            image_data_float: vec![0.5; 4],
            width: 2,
            height: 2,
            image_type: ImageType::DepthPlanar,
            ..response(true, false)
        };

        let paths = save_responses(tmp.path(), &[depth, scene, planar]).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["0.png", "1.greener.png", "2.pfm"]);

        // Compressed bytes are written verbatim
        assert_eq!(fs::read(&paths[0]).unwrap(), b"\x89PNG fake");

        let decoded = image::open(&paths[1]).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert!(decoded.pixels().all(|p| p.0[1] == GREEN_MARK));

        let pfm = fs::read(&paths[2]).unwrap();
        assert!(pfm.starts_with(b"Pf\n2 2\n"));
    }
}
