//! Upload wizard: select a file, crop it, pick a filter.
//!
//! The wizard is a state machine. UI handlers never touch its state directly;
//! they dispatch a [`WizardEvent`] and read back what to show.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use image::DynamicImage;
use rand::Rng;
use rand::rngs::StdRng;

use crate::constraint::{Resizer, Square};
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::media;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    SelectFile,
    Resize,
    Filter,
}

#[derive(Debug)]
pub enum WizardEvent {
    FileChosen { name: String, bytes: Vec<u8> },
    /// Background decode of the chosen file finished.
    FileLoaded(Result<DynamicImage>),
    RetryAcknowledged,
    FieldsEdited,
    ResizerChanged,
    ResizeSubmitted,
    ResizeReset,
    FilterChanged(Filter),
    FilterReset,
    FilterSubmitted,
}

impl WizardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WizardEvent::FileChosen { .. } => "FileChosen",
            WizardEvent::FileLoaded(_) => "FileLoaded",
            WizardEvent::RetryAcknowledged => "RetryAcknowledged",
            WizardEvent::FieldsEdited => "FieldsEdited",
            WizardEvent::ResizerChanged => "ResizerChanged",
            WizardEvent::ResizeSubmitted => "ResizeSubmitted",
            WizardEvent::ResizeReset => "ResizeReset",
            WizardEvent::FilterChanged(_) => "FilterChanged",
            WizardEvent::FilterReset => "FilterReset",
            WizardEvent::FilterSubmitted => "FilterSubmitted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Uploading,
    /// Shown with a "try again" action.
    Error(String),
}

impl Message {
    pub fn text(&self) -> &str {
        match self {
            Message::Uploading => "Uploading…",
            Message::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Message::Error(_))
    }
}

/// Text of the three numeric inputs of the resize form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResizeFields {
    pub x: String,
    pub y: String,
    pub side: String,
}

impl ResizeFields {
    fn parsed(&self) -> Option<(f32, f32, f32)> {
        Some((parse_field(&self.x)?, parse_field(&self.y)?, parse_field(&self.side)?))
    }
}

/// A non-empty, finite number.
pub fn parse_field(value: &str) -> Option<f32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Fields are written back rounded to whole pixels, so half a pixel of
/// difference still counts as the same selection.
fn fields_match(fields: &ResizeFields, square: Square) -> bool {
    fields.parsed().is_some_and(|(x, y, side)| {
        (x - square.x).abs() <= 0.5
            && (y - square.y).abs() <= 0.5
            && (side - square.side).abs() <= 0.5
    })
}

/// Whether the resize form may be submitted for an image of the given size.
pub fn resize_fields_valid(fields: &ResizeFields, natural_width: u32, natural_height: u32) -> bool {
    let Some((x, y, side)) = fields.parsed() else {
        return false;
    };
    x >= 0.0
        && y >= 0.0
        && side >= 0.0
        && x + side <= natural_width as f32
        && y + side <= natural_height as f32
}

/// Extra validation before leaving the resize step. The resize button rule
/// already covers the bounds, nothing else is checked.
fn resize_form_is_valid() -> bool {
    true
}

pub struct Wizard {
    step: Step,
    resizer: Option<Resizer>,
    pub fields: ResizeFields,
    resize_enabled: bool,
    message: Option<Message>,
    upload: Option<Receiver<Result<DynamicImage>>>,
    backgrounds: Vec<PathBuf>,
    background: Option<usize>,
    rng: StdRng,
    filter: Filter,
    cropped: Option<DynamicImage>,
    preview: Option<DynamicImage>,
    /// Bumped whenever the image under the resizer or the preview changes.
    revision: u64,
    submitted: Option<Filter>,
}

impl Wizard {
    pub fn new(backgrounds: Vec<PathBuf>, filter: Filter, rng: StdRng) -> Self {
        let mut wizard = Self {
            step: Step::SelectFile,
            resizer: None,
            fields: ResizeFields::default(),
            resize_enabled: false,
            message: None,
            upload: None,
            backgrounds,
            background: None,
            rng,
            filter,
            cropped: None,
            preview: None,
            revision: 0,
            submitted: None,
        };
        wizard.update_background();
        wizard
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn resizer(&self) -> Option<&Resizer> {
        self.resizer.as_ref()
    }

    pub fn resizer_mut(&mut self) -> Option<&mut Resizer> {
        self.resizer.as_mut()
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.upload.is_some()
    }

    pub fn resize_enabled(&self) -> bool {
        self.resize_enabled
    }

    pub fn background(&self) -> Option<&PathBuf> {
        self.background.and_then(|i| self.backgrounds.get(i))
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn preview(&self) -> Option<&DynamicImage> {
        self.preview.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The filter confirmed by the last submit, to be persisted.
    pub fn take_submitted_filter(&mut self) -> Option<Filter> {
        self.submitted.take()
    }

    /// Feeds a finished background decode back into the machine; waits up to
    /// `wait` for it when given.
    pub fn poll_upload(&mut self, wait: Option<Duration>) -> bool {
        let Some(rx) = &self.upload else {
            return false;
        };
        let result = match wait {
            Some(wait) => match rx.recv_timeout(wait) {
                Ok(result) => result,
                Err(mpsc::RecvTimeoutError::Timeout) => return false,
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::LoaderStopped),
            },
            None => match rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => Err(Error::LoaderStopped),
            },
        };
        self.upload = None;
        self.dispatch(WizardEvent::FileLoaded(result))
    }

    /// Dispatches `ResizerChanged` when pointer interaction moved the
    /// selection.
    pub fn poll_resizer(&mut self) -> bool {
        let changed = self
            .resizer
            .as_mut()
            .and_then(Resizer::take_change)
            .is_some();
        changed && self.dispatch(WizardEvent::ResizerChanged)
    }

    /// Runs one transition. Returns `false` when the event does not apply
    /// to the current step.
    pub fn dispatch(&mut self, event: WizardEvent) -> bool {
        use WizardEvent as E;

        match (self.step, event) {
            (Step::SelectFile, E::FileChosen { name, bytes }) => {
                self.on_file_chosen(&name, bytes);
                true
            }
            (Step::SelectFile, E::FileLoaded(result)) => {
                self.on_file_loaded(result);
                true
            }
            (Step::SelectFile, E::RetryAcknowledged) => {
                self.message = None;
                true
            }
            (Step::Resize, E::FieldsEdited) => {
                self.on_fields_edited();
                true
            }
            (Step::Resize, E::ResizerChanged) => {
                self.sync_fields_from_resizer();
                true
            }
            (Step::Resize, E::ResizeSubmitted) => self.on_resize_submitted(),
            (Step::Resize, E::ResizeReset) => {
                self.reset();
                true
            }
            (Step::Filter, E::FilterChanged(filter)) => {
                self.filter = filter;
                self.refresh_preview();
                true
            }
            (Step::Filter, E::FilterReset) => {
                self.go_to(Step::Resize);
                true
            }
            (Step::Filter, E::FilterSubmitted) => {
                log::info!("filter {} submitted", self.filter.value());
                self.submitted = Some(self.filter);
                self.reset();
                true
            }
            (step, event) => {
                log::warn!("ignoring {} in {step:?}", event.name());
                false
            }
        }
    }

    fn go_to(&mut self, step: Step) {
        log::info!("{:?} -> {:?}", self.step, step);
        self.step = step;
    }

    fn on_file_chosen(&mut self, name: &str, bytes: Vec<u8>) {
        let media_type = media::sniff_media_type(name, &bytes);
        if !media::is_supported_media_type(media_type) {
            log::warn!("rejecting {name}: {}", Error::UnsupportedMediaType(media_type.to_owned()));
            self.message = Some(Message::Error("Unsupported file format.".to_owned()));
            return;
        }

        log::info!("decoding {name} ({media_type}, {} bytes)", bytes.len());
        self.message = Some(Message::Uploading);
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(image::load_from_memory(&bytes).map_err(Error::from));
        });
        self.upload = Some(rx);
    }

    fn on_file_loaded(&mut self, result: Result<DynamicImage>) {
        match result {
            Ok(image) => {
                self.cleanup_resizer();
                self.resizer = Some(Resizer::new(image));
                self.revision += 1;
                self.message = None;
                self.sync_fields_from_resizer();
                self.go_to(Step::Resize);
            }
            Err(e) => {
                log::warn!("upload failed: {e}");
                self.message = Some(Message::Error("Could not read this image.".to_owned()));
            }
        }
    }

    fn on_fields_edited(&mut self) {
        let Some(resizer) = self.resizer.as_mut() else {
            return;
        };
        if let Some((x, y, side)) = self.fields.parsed() {
            resizer.set_constraint(x, y, side);
        }
        self.update_resize_enabled();
    }

    fn sync_fields_from_resizer(&mut self) {
        let Some(resizer) = &self.resizer else {
            return;
        };
        let square = resizer.get_constraint();
        self.fields = ResizeFields {
            x: format!("{:.0}", square.x),
            y: format!("{:.0}", square.y),
            side: format!("{:.0}", square.side),
        };
        self.update_resize_enabled();
    }

    /// The button also stays disabled while the resizer holds a different
    /// square than the form shows, e.g. after a refused or clamped edit.
    fn update_resize_enabled(&mut self) {
        self.resize_enabled = self.resizer.as_ref().is_some_and(|resizer| {
            let (w, h) = resizer.natural_size();
            resize_fields_valid(&self.fields, w, h)
                && fields_match(&self.fields, resizer.get_constraint())
        });
    }

    fn on_resize_submitted(&mut self) -> bool {
        if !self.resize_enabled || !resize_form_is_valid() {
            log::warn!("resize form is not valid: {:?}", self.fields);
            return false;
        }
        let Some(resizer) = &self.resizer else {
            log::warn!("{}", Error::NoResizer);
            return false;
        };
        self.cropped = Some(resizer.export_image());
        self.refresh_preview();
        self.go_to(Step::Filter);
        true
    }

    fn refresh_preview(&mut self) {
        self.preview = self.cropped.as_ref().map(|image| self.filter.apply(image));
        self.revision += 1;
    }

    fn cleanup_resizer(&mut self) {
        self.resizer = None;
        self.cropped = None;
        self.preview = None;
        self.fields = ResizeFields::default();
        self.resize_enabled = false;
    }

    fn update_background(&mut self) {
        self.background = if self.backgrounds.is_empty() {
            None
        } else {
            Some(self.rng.gen_range(0..self.backgrounds.len()))
        };
    }

    fn reset(&mut self) {
        self.cleanup_resizer();
        self.update_background();
        self.go_to(Step::SelectFile);
    }
}
