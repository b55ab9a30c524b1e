use std::env;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use lazy_static::lazy_static;
use log::error;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::models::AstronomyPictureOfTheDay;
use crate::request::{ApodRequest, ResponseParts, Transport, TransportError};

pub const APOD_ENDPOINT: &str = "https://api.nasa.gov/planetary/apod";

/// The key NASA hands out for unauthenticated demos.
pub const DEMO_API_KEY: &str = "DEMO_KEY";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

lazy_static! {
    /// APOD days roll over in US Central Standard Time, so dates sent to
    /// the service are formatted there rather than in the caller's zone.
    static ref REFERENCE_ZONE: FixedOffset =
        FixedOffset::west_opt(6 * 3600).expect("reference zone offset is in range");
}

/// Everything that can go wrong between asking for a picture and showing
/// it. `None` stands for "nothing attempted yet" and is only ever used as
/// the initial published value of the view state.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("response body was not valid picture metadata")]
    Decode(#[source] serde_json::Error),
    #[error("media download failed")]
    Download(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("request failed")]
    Request(#[source] TransportError),
    #[error("unexpected response code {}", .0.code)]
    Response(ResponseParts),
    #[error("operation was cancelled")]
    Cancelled,
    #[error("unclassified failure")]
    Unknown,
    #[error("nothing has been loaded yet")]
    None,
}

impl ApiError {
    /// False only for the `None` sentinel.
    pub fn is_error(&self) -> bool {
        !matches!(self, ApiError::None)
    }
}

/// The api key sent with every metadata request, overridable through the
/// `APOD_API_KEY` environment variable.
pub fn api_key() -> String {
    env::var("APOD_API_KEY").unwrap_or_else(|_| DEMO_API_KEY.to_owned())
}

/// `instant` as the calendar day it falls on in the service's zone.
pub fn service_date(instant: &DateTime<Utc>) -> String {
    instant
        .with_timezone(&*REFERENCE_ZONE)
        .format("%Y-%m-%d")
        .to_string()
}

pub fn picture_of_the_day_request(
    date: Option<DateTime<Utc>>,
    timeout: Duration,
) -> Result<ApodRequest, ApiError> {
    let mut params: Vec<(&str, String)> = Vec::with_capacity(2);
    if let Some(date) = date {
        params.push(("date", service_date(&date)));
    }
    params.push(("api_key", api_key()));
    let url = Url::parse_with_params(APOD_ENDPOINT, &params).map_err(|_| ApiError::Unknown)?;
    Ok(ApodRequest { url, timeout })
}

/// Fetch one day's metadata. `None` asks the service for today's picture.
pub async fn picture_of_the_day(
    transport: &dyn Transport,
    date: Option<DateTime<Utc>>,
    timeout: Duration,
) -> Result<AstronomyPictureOfTheDay, ApiError> {
    let request = picture_of_the_day_request(date, timeout)?;
    let url = request.url.clone();
    let response = transport.issue(request).await.map_err(ApiError::Request)?;
    if response.code != StatusCode::OK {
        return Err(ApiError::Response(response));
    }
    serde_json::from_slice(&response.body).map_err(|err| {
        error!("failed to parse picture metadata from {}", url);
        ApiError::Decode(err)
    })
}
