//! Synthetic camera captures

use airsim_shared::{ByteBuf, ImageRequest, ImageResponse, ImageType, Quaternionr, Vector3r};
use anyhow::Result;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Render one response per request, honouring each request's payload flags
pub fn render(
    requests: &[ImageRequest],
    width: u32,
    height: u32,
    camera_position: Vector3r,
    time_stamp: u64,
) -> Result<Vec<ImageResponse>> {
    requests
        .iter()
        .map(|request| {
            let mut response = ImageResponse {
                camera_name: request.camera_name.clone(),
                camera_position,
                camera_orientation: Quaternionr::default(),
                time_stamp,
                pixels_as_float: request.pixels_as_float,
                compress: request.compress,
                width: width as i32,
                height: height as i32,
                image_type: request.image_type,
                ..Default::default()
            };

            if request.pixels_as_float {
                response.image_data_float = depth_ramp(width, height);
            } else if request.compress {
                let rgb = rgb_pattern(request.image_type, width, height);
                response.image_data_uint8 = ByteBuf::from(encode_png(&rgb, width, height)?);
            } else {
                response.image_data_uint8 = ByteBuf::from(rgba_rows(width, height));
            }

            Ok(response)
        })
        .collect()
}

/// Distances growing row by row
fn depth_ramp(width: u32, height: u32) -> Vec<f32> {
    (0..height)
        .flat_map(|row| (0..width).map(move |col| row as f32 + col as f32 / width as f32))
        .collect()
}

/// Flat colour per image type so captures are distinguishable
fn rgb_pattern(image_type: ImageType, width: u32, height: u32) -> Vec<u8> {
    let shade = (i32::from(image_type) as u8).wrapping_mul(25);
    (0..width * height).flat_map(|_| [shade, 255 - shade, 128]).collect()
}

/// RGBA pixels whose red channel carries the row index
pub fn rgba_rows(width: u32, height: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|row| (0..width).flat_map(move |_| [row as u8, 0, 0, 255]))
        .collect()
}

fn encode_png(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_follows_flags() {
        let requests = [
            ImageRequest::new("0", ImageType::DepthVis),
            ImageRequest::with_flags("1", ImageType::Scene, false, false),
            ImageRequest::with_flags("0", ImageType::DepthPlanar, true, false),
        ];
        let responses = render(&requests, 4, 3, Vector3r::default(), 0).unwrap();

        assert_eq!(responses.len(), 3);
        assert!(responses[0].image_data_uint8.starts_with(b"\x89PNG"));
        assert_eq!(responses[1].image_data_uint8.len(), 4 * 3 * 4);
        assert_eq!(responses[2].image_data_float.len(), 4 * 3);
        assert!(responses[2].image_data_uint8.is_empty());
    }
}
