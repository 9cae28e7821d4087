//! Picture thumbnails.
//!
//! Every thumbnail loads its image on a worker thread and races it against
//! a timeout. Whichever resolves first wins and the thumbnail never changes
//! state again.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use image::DynamicImage;
use image::imageops::FilterType;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Display size of a thumbnail, in pixels.
pub const THUMBNAIL_SIZE: u32 = 182;

/// How close to the bottom the scroll has to get before the next page loads.
pub const GAP: f32 = 100.0;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Picture {
    pub url: String,
    pub likes: u32,
    pub comments: u32,
}

pub fn load_pictures(path: &Path) -> Result<Vec<Picture>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

#[derive(Debug)]
pub enum LoadState {
    Pending,
    Loaded(DynamicImage),
    /// Decode error or timeout.
    Failed,
}

/// A worker's result, stamped with the moment it finished.
type Loaded = (Instant, Result<DynamicImage>);

pub struct Thumbnail {
    pub likes: u32,
    pub comments: u32,
    /// Image source; cleared when the load times out.
    pub source: Option<String>,
    state: LoadState,
    started: Instant,
    timeout: Duration,
    rx: Option<Receiver<Loaded>>,
}

impl Thumbnail {
    fn new(
        data: &Picture,
        rx: Receiver<Loaded>,
        started: Instant,
        timeout: Duration,
    ) -> Self {
        Self {
            likes: data.likes,
            comments: data.comments,
            source: Some(data.url.clone()),
            state: LoadState::Pending,
            started,
            timeout,
            rx: Some(rx),
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, LoadState::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, LoadState::Failed)
    }

    /// Resolves the load race as of `now`. Returns `true` if the state
    /// changed.
    ///
    /// A result counts only if the worker finished it before the deadline,
    /// however late it is polled.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(rx) = &self.rx else {
            return false;
        };
        let deadline = self.started + self.timeout;

        let outcome = match rx.try_recv() {
            Ok((finished, result)) if finished < deadline => Some(result),
            Ok(_) => None,
            Err(TryRecvError::Disconnected) if now < deadline => Some(Err(Error::LoaderStopped)),
            Err(TryRecvError::Empty) if now < deadline => return false,
            Err(_) => None,
        };

        match outcome {
            Some(Ok(image)) => {
                log::info!("loaded {}", self.source.as_deref().unwrap_or_default());
                self.state = LoadState::Loaded(image);
            }
            Some(Err(e)) => {
                log::warn!("failed to load {}: {e}", self.source.as_deref().unwrap_or_default());
                self.state = LoadState::Failed;
            }
            None => {
                log::warn!(
                    "timed out loading {} after {:?}",
                    self.source.as_deref().unwrap_or_default(),
                    self.timeout
                );
                self.source = None;
                self.state = LoadState::Failed;
            }
        }
        // Dropping the receiver discards any late result.
        self.rx = None;
        true
    }
}

pub fn is_next_page_available(list_size: usize, page: usize, page_size: usize) -> bool {
    page_size > 0 && page < list_size / page_size
}

/// `content_bottom` is the distance from the top of the viewport to the end
/// of the content.
pub fn is_bottom_reached(content_bottom: f32, viewport_height: f32) -> bool {
    content_bottom - viewport_height - GAP <= 0.0
}

/// Thumbnail container with paged rendering.
pub struct Gallery {
    base_dir: PathBuf,
    timeout: Duration,
    page_size: usize,
    pictures: Vec<Picture>,
    page: usize,
    pub thumbnails: Vec<Thumbnail>,
}

impl Gallery {
    pub fn new(
        base_dir: PathBuf,
        pictures: Vec<Picture>,
        page_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            base_dir,
            timeout,
            page_size: page_size.max(1),
            pictures,
            page: 0,
            thumbnails: Vec::new(),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn render_page(&mut self, page: usize) {
        let start = page * self.page_size;
        let end = (start + self.page_size).min(self.pictures.len());
        if start >= end {
            return;
        }
        log::info!("rendering page {page} ({} pictures)", end - start);
        let batch = self.pictures[start..end].to_vec();
        for picture in &batch {
            render(picture, self);
        }
        self.page = page;
    }

    /// Renders the next page when the scroll reached the bottom and there is
    /// more to show.
    pub fn on_scroll(&mut self, content_bottom: f32, viewport_height: f32) -> bool {
        if is_bottom_reached(content_bottom, viewport_height)
            && is_next_page_available(self.pictures.len(), self.page, self.page_size)
        {
            self.render_page(self.page + 1);
            return true;
        }
        false
    }

    /// Polls every pending thumbnail; returns `true` while any still waits.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut pending = false;
        for thumbnail in &mut self.thumbnails {
            thumbnail.poll(now);
            pending |= thumbnail.is_pending();
        }
        pending
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        self.base_dir.join(url)
    }

    fn push(&mut self, thumbnail: Thumbnail) -> &Thumbnail {
        self.thumbnails.push(thumbnail);
        &self.thumbnails[self.thumbnails.len() - 1]
    }
}

fn load_thumbnail(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle))
}

/// Appends a thumbnail for `data` to `container` and starts loading its
/// image in the background. Returns immediately; poll the gallery to see
/// the image arrive.
pub fn render<'a>(data: &Picture, container: &'a mut Gallery) -> &'a Thumbnail {
    let (tx, rx) = mpsc::channel();
    let path = container.resolve(&data.url);
    let started = Instant::now();
    std::thread::spawn(move || {
        let result = load_thumbnail(&path);
        let _ = tx.send((Instant::now(), result));
    });
    let thumbnail = Thumbnail::new(data, rx, started, container.timeout);
    container.push(thumbnail)
}
