use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api;

/// The kind of media the service published for a day. Only images are ever
/// downloaded; videos stay on the hosting site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// One day's picture metadata as served by the APOD endpoint. Decoded
/// straight from the response body and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstronomyPictureOfTheDay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    pub date: String,
    pub explanation: String,
    #[serde(rename = "hdurl", skip_serializing_if = "Option::is_none")]
    pub hd_url: Option<Url>,
    #[serde(rename = "media_type")]
    pub media_type: MediaType,
    #[serde(rename = "service_version")]
    pub service_version: String,
    pub title: String,
    pub url: Url,
}

impl AstronomyPictureOfTheDay {
    /// Whether this metadata belongs to the day `instant` falls on in the
    /// service's reference zone.
    pub fn is_same_day(&self, instant: &DateTime<Utc>) -> bool {
        self.date == api::service_date(instant)
    }
}
