use std::path::Path;
use std::time::Duration;

use image::{DynamicImage, ImageReader};
use log::debug;
use tokio::task;

use crate::api::ApiError;
use crate::models::{AstronomyPictureOfTheDay, MediaType};
use crate::request::Transport;

/// Download and decode the day's picture when there is one.
///
/// Non-image media kinds are never fetched; the caller gets `Ok(None)`
/// without any network traffic. The temporary download file is removed
/// before returning, whether or not decoding worked.
pub async fn maybe_download_image(
    transport: &dyn Transport,
    picture: &AstronomyPictureOfTheDay,
    timeout: Duration,
) -> Result<Option<DynamicImage>, ApiError> {
    if picture.media_type != MediaType::Image {
        debug!(
            "media for {} is not an image, nothing to download",
            picture.date
        );
        return Ok(None);
    }

    let path = transport
        .download_to_file(&picture.url, timeout)
        .await
        .map_err(|err| ApiError::Download(Box::new(err)))?;

    let decoded = task::spawn_blocking({
        let path = path.clone();
        move || decode_image(&path)
    })
    .await;
    // best effort, the decode result is what matters
    let _ = tokio::fs::remove_file(&path).await;

    match decoded {
        Ok(Ok(image)) => Ok(Some(image)),
        Ok(Err(error)) => Err(error),
        // the blocking pool tore the decode down underneath us
        Err(_) => Err(ApiError::Cancelled),
    }
}

/// Pixel decoding is CPU-bound, so it runs on the blocking pool. The format
/// is sniffed from the file contents since download paths carry no extension.
fn decode_image(path: &Path) -> Result<DynamicImage, ApiError> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| ApiError::Download(Box::new(err)))?
        .decode()
        .map_err(|err| ApiError::Download(Box::new(err)))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbaImage};
    use reqwest::StatusCode;
    use url::Url;

    use crate::api::DEFAULT_TIMEOUT;
    use crate::request::mock::MockTransport;
    use crate::request::{ResponseParts, TransportError};

    use super::*;

    fn picture(media_type: MediaType, url: &str) -> AstronomyPictureOfTheDay {
        AstronomyPictureOfTheDay {
            copyright: None,
            date: "2019-01-01".to_owned(),
            explanation: "Test Explanation".to_owned(),
            hd_url: None,
            media_type,
            service_version: "v1".to_owned(),
            title: "Test Title".to_owned(),
            url: Url::parse(url).unwrap(),
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut pixels = RgbaImage::new(2, 2);
        pixels.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        pixels.put_pixel(1, 1, image::Rgba([0, 0, 255, 255]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(pixels)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[tokio::test]
    async fn videos_are_never_downloaded() {
        let transport = MockTransport::new(|_| panic!("no network traffic expected"));
        let picture = picture(MediaType::Video, "https://nasa.gov/test.mp4");

        let image = maybe_download_image(&transport, &picture, DEFAULT_TIMEOUT)
            .await
            .unwrap();

        assert!(image.is_none());
        assert_eq!(transport.network_calls(), 0);
    }

    #[tokio::test]
    async fn downloads_and_decodes_images() {
        let served = png_bytes();
        let body = served.clone();
        let transport = MockTransport::new(move |_| {
            Ok(ResponseParts {
                code: StatusCode::OK,
                body: body.clone(),
            })
        });
        let picture = picture(MediaType::Image, "https://nasa.gov/test.png");

        let image = maybe_download_image(&transport, &picture, DEFAULT_TIMEOUT)
            .await
            .unwrap()
            .expect("an image");

        let expected = image::load_from_memory(&served).unwrap();
        assert_eq!(image.to_rgba8(), expected.to_rgba8());
        let path = transport.downloads.lock().unwrap()[0].clone();
        assert!(!path.exists(), "temporary download should be deleted");
    }

    #[tokio::test]
    async fn transfer_failures_become_download_errors() {
        let transport =
            MockTransport::new(|_| Err(TransportError::Other("interrupted".to_owned())));
        let picture = picture(MediaType::Image, "https://nasa.gov/test.png");

        let error = maybe_download_image(&transport, &picture, DEFAULT_TIMEOUT)
            .await
            .unwrap_err();

        match error {
            ApiError::Download(inner) => {
                let inner = inner.downcast::<TransportError>().unwrap();
                assert!(matches!(*inner, TransportError::Other(ref reason) if reason == "interrupted"));
            }
            other => panic!("expected a download error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn undecodable_bodies_become_download_errors() {
        let transport = MockTransport::new(|_| {
            Ok(ResponseParts {
                code: StatusCode::OK,
                body: b"not an image".to_vec(),
            })
        });
        let picture = picture(MediaType::Image, "https://nasa.gov/test.png");

        let result = maybe_download_image(&transport, &picture, DEFAULT_TIMEOUT).await;

        assert!(matches!(result, Err(ApiError::Download(_))));
        let path = transport.downloads.lock().unwrap()[0].clone();
        assert!(
            !path.exists(),
            "temporary download should be deleted even when decoding fails"
        );
    }
}
