use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use log::{debug, error, info};
use tokio::sync::watch;

use crate::api::{self, ApiError, DEFAULT_TIMEOUT};
use crate::media;
use crate::models::AstronomyPictureOfTheDay;
use crate::request::Transport;

/// Latest metadata fetch outcome. `Err(ApiError::None)` until a load has
/// finished.
pub type PictureResult = Result<AstronomyPictureOfTheDay, ApiError>;

/// Latest image outcome. `Ok(None)` both before any load has finished and
/// for days whose media is not an image.
pub type ImageResult = Result<Option<DynamicImage>, ApiError>;

/// View state for the picture of the day.
///
/// Owns the current date and the two observable result slots a UI binds
/// to. All writes go through this object, readers subscribe and observe
/// updates in publish order. Dropping a receiver ends that subscription.
pub struct PictureOfTheDay {
    date: DateTime<Utc>,
    picture: watch::Sender<PictureResult>,
    image: watch::Sender<ImageResult>,
    generation: Arc<AtomicU64>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl PictureOfTheDay {
    /// View state starting at the current day.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::starting_at(Utc::now(), transport)
    }

    pub fn starting_at(date: DateTime<Utc>, transport: Arc<dyn Transport>) -> Self {
        let (picture, _) = watch::channel(Err(ApiError::None));
        let (image, _) = watch::channel(Ok(None));
        Self {
            date,
            picture,
            image,
            generation: Arc::new(AtomicU64::new(0)),
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn subscribe_picture(&self) -> watch::Receiver<PictureResult> {
        self.picture.subscribe()
    }

    pub fn subscribe_image(&self) -> watch::Receiver<ImageResult> {
        self.image.subscribe()
    }

    /// Shift the current date by `days` and reload. A shift of zero is a
    /// no-op. Both slots go back to their initial values before the new
    /// load starts, so observers never see old results under the new date.
    pub fn increment_date(&mut self, days: i64) {
        if days == 0 {
            return;
        }
        let next = match self.date.checked_add_signed(chrono::Duration::days(days)) {
            Some(next) => next,
            None => return,
        };
        self.date = next;
        // invalidate in-flight loads before touching the slots, otherwise a
        // superseded publish could land between the reset and the new load
        let generation = self.next_generation();
        self.picture.send_replace(Err(ApiError::None));
        self.image.send_replace(Ok(None));
        self.spawn_load(generation);
    }

    /// Start the fetch then conditional-download sequence for the current
    /// date. Fire-and-forget, results arrive through the subscriptions.
    /// Must be called from within a tokio runtime.
    pub fn load(&self) {
        let generation = self.next_generation();
        self.spawn_load(generation);
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn spawn_load(&self, generation: u64) {
        let sequence = LoadSequence {
            date: self.date,
            generation,
            live: Arc::clone(&self.generation),
            transport: Arc::clone(&self.transport),
            timeout: self.timeout,
            picture: self.picture.clone(),
            image: self.image.clone(),
        };
        tokio::spawn(sequence.run());
    }
}

/// One generation of the fetch then download pipeline. A sequence publishes
/// only while its generation is still the live one, so results of
/// superseded loads are dropped instead of overwriting newer state.
struct LoadSequence {
    date: DateTime<Utc>,
    generation: u64,
    live: Arc<AtomicU64>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    picture: watch::Sender<PictureResult>,
    image: watch::Sender<ImageResult>,
}

impl LoadSequence {
    async fn run(self) {
        let day = api::service_date(&self.date);
        let result =
            api::picture_of_the_day(self.transport.as_ref(), Some(self.date), self.timeout).await;
        let loaded = result.as_ref().ok().cloned();
        match &result {
            Ok(picture) => info!("picture metadata loaded for {}: {}", day, picture.title),
            Err(err) => error!("picture metadata failed for {}: {}", day, err),
        }
        self.publish_picture(result);

        match loaded {
            None => self.publish_image(Ok(None)),
            Some(picture) => {
                let image =
                    media::maybe_download_image(self.transport.as_ref(), &picture, self.timeout)
                        .await;
                if let Err(err) = &image {
                    error!("image load failed for {}: {}", day, err);
                }
                self.publish_image(image);
            }
        }
        debug!("load complete for {}", day);
    }

    fn is_current(&self) -> bool {
        self.live.load(Ordering::SeqCst) == self.generation
    }

    fn publish_picture(&self, value: PictureResult) {
        if !self.is_current() {
            debug!(
                "dropping superseded picture result for {}",
                api::service_date(&self.date)
            );
            return;
        }
        self.picture.send_replace(value);
    }

    fn publish_image(&self, value: ImageResult) {
        if !self.is_current() {
            debug!(
                "dropping superseded image result for {}",
                api::service_date(&self.date)
            );
            return;
        }
        self.image.send_replace(value);
    }
}
