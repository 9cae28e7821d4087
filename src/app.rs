use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use eframe::egui;
use image::DynamicImage;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::Config;
use crate::filter::Filter;
use crate::gallery::{self, Gallery, LoadState, THUMBNAIL_SIZE, Thumbnail};
use crate::media::ACCEPTED_MEDIA_TYPES;
use crate::overlay::{self, PainterSurface};
use crate::prefs::{self, StoredFilter};
use crate::wizard::{Step, Wizard, WizardEvent};

const PADDING: f32 = 20.0;
const FAILURE_COLOR: egui::Color32 = egui::Color32::from_rgb(120, 30, 30);
const PLACEHOLDER_COLOR: egui::Color32 = egui::Color32::from_gray(40);
const REPAINT_WHILE_LOADING: Duration = Duration::from_millis(100);

fn to_color_image(image: &DynamicImage) -> egui::ColorImage {
    let size = [image.width() as _, image.height() as _];
    let image_buffer = image.to_rgba8();
    let pixels = image_buffer.as_flat_samples();
    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice())
}

/// A texture rebuilt whenever its source revision changes.
#[derive(Default)]
struct TextureSlot {
    revision: Option<u64>,
    handle: Option<egui::TextureHandle>,
}

impl TextureSlot {
    fn get(
        &mut self,
        ctx: &egui::Context,
        name: &str,
        revision: u64,
        image: Option<&DynamicImage>,
    ) -> Option<egui::TextureId> {
        if self.revision != Some(revision) {
            self.revision = Some(revision);
            self.handle = image.map(|image| {
                ctx.load_texture(name, to_color_image(image), egui::TextureOptions::LINEAR)
            });
        }
        self.handle.as_ref().map(egui::TextureHandle::id)
    }
}

pub struct KekstagramApp {
    gallery: Gallery,
    wizard: Wizard,
    stored_filter: Option<StoredFilter>,
    load_error: Option<String>,
    thumbnail_textures: HashMap<usize, egui::TextureHandle>,
    upload_texture: TextureSlot,
    preview_texture: TextureSlot,
    background_texture: Option<(PathBuf, Option<egui::TextureHandle>)>,
}

impl KekstagramApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config) -> Self {
        let stored_filter = cc.storage.and_then(|storage| prefs::load(storage));
        let filter = prefs::current(stored_filter.as_ref(), Utc::now());

        let (pictures, load_error) = match gallery::load_pictures(&config.pictures) {
            Ok(pictures) => (pictures, None),
            Err(e) => {
                log::warn!("no pictures: {e}");
                (Vec::new(), Some(e.to_string()))
            }
        };
        let mut gallery = Gallery::new(
            config.pictures_dir(),
            pictures,
            config.page_size,
            config.image_load_timeout(),
        );
        gallery.render_page(0);

        Self {
            gallery,
            wizard: Wizard::new(config.backgrounds, filter, StdRng::from_entropy()),
            stored_filter,
            load_error,
            thumbnail_textures: HashMap::new(),
            upload_texture: TextureSlot::default(),
            preview_texture: TextureSlot::default(),
            background_texture: None,
        }
    }

    fn choose_file(&mut self, name: String, bytes: Vec<u8>) {
        self.wizard.dispatch(WizardEvent::FileChosen { name, bytes });
    }

    fn open_path(&mut self, path: &Path) {
        match std::fs::read(path) {
            Ok(bytes) => self.choose_file(path.display().to_string(), bytes),
            Err(e) => log::warn!("failed to read {}: {e}", path.display()),
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        if self.wizard.step() != Step::SelectFile {
            return;
        }
        let dropped_files = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(file) = dropped_files.first() {
            if let Some(bytes) = &file.bytes {
                self.choose_file(file.name.clone(), bytes.to_vec());
            } else if let Some(path) = &file.path {
                self.open_path(path);
            }
        }
    }

    fn background_id(&mut self, ctx: &egui::Context) -> Option<egui::TextureId> {
        let wanted = self.wizard.background()?.clone();
        let stale = self
            .background_texture
            .as_ref()
            .is_none_or(|(path, _)| *path != wanted);
        if stale {
            let handle = match image::open(&wanted) {
                Ok(image) => Some(ctx.load_texture(
                    "background",
                    to_color_image(&image),
                    egui::TextureOptions::LINEAR,
                )),
                Err(e) => {
                    log::warn!("background {}: {e}", wanted.display());
                    None
                }
            };
            self.background_texture = Some((wanted, handle));
        }
        self.background_texture
            .as_ref()
            .and_then(|(_, handle)| handle.as_ref().map(egui::TextureHandle::id))
    }

    fn gallery_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Pictures");
        if let Some(error) = &self.load_error {
            ui.colored_label(egui::Color32::LIGHT_RED, error);
        }

        let ctx = ui.ctx().clone();
        let output = egui::ScrollArea::vertical().show(ui, |ui| {
            ui.horizontal_wrapped(|ui| {
                for (index, thumbnail) in self.gallery.thumbnails.iter().enumerate() {
                    let texture = match thumbnail.state() {
                        LoadState::Loaded(image) => Some(
                            self.thumbnail_textures
                                .entry(index)
                                .or_insert_with(|| {
                                    ctx.load_texture(
                                        format!("thumbnail-{index}"),
                                        to_color_image(image),
                                        egui::TextureOptions::LINEAR,
                                    )
                                })
                                .id(),
                        ),
                        _ => None,
                    };
                    thumbnail_ui(ui, thumbnail, texture);
                }
            });
        });

        let content_bottom = output.content_size.y - output.state.offset.y;
        if self.gallery.on_scroll(content_bottom, output.inner_rect.height()) {
            log::debug!("gallery now at page {}", self.gallery.page());
        }
    }

    fn wizard_ui(&mut self, ui: &mut egui::Ui) {
        if let Some(id) = self.background_id(ui.ctx()) {
            ui.painter().image(
                id,
                ui.max_rect(),
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::from_white_alpha(60),
            );
        }

        match self.wizard.step() {
            Step::SelectFile => self.select_ui(ui),
            Step::Resize => self.resize_ui(ui),
            Step::Filter => self.filter_ui(ui),
        }
    }

    fn select_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Upload a picture");
        ui.label(format!("Accepted: {}", ACCEPTED_MEDIA_TYPES.join(", ")));

        if ui
            .add_enabled(!self.wizard.is_uploading(), egui::Button::new("Open Image"))
            .clicked()
        {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("Image", &["gif", "jpg", "jpeg", "png", "svg"])
                .pick_file()
            {
                self.open_path(&path);
            }
        }

        let mut retry = false;
        if let Some(message) = self.wizard.message() {
            ui.separator();
            if message.is_error() {
                ui.colored_label(egui::Color32::LIGHT_RED, message.text());
                retry = ui.link("Try again").clicked();
            } else {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(message.text());
                });
            }
        }
        if retry {
            self.wizard.dispatch(WizardEvent::RetryAcknowledged);
        }
    }

    fn resize_ui(&mut self, ui: &mut egui::Ui) {
        let mut edited = false;
        let mut back = false;
        let mut next = false;
        let enabled = self.wizard.resize_enabled();
        ui.horizontal(|ui| {
            let fields = &mut self.wizard.fields;
            for (label, value) in [
                ("x", &mut fields.x),
                ("y", &mut fields.y),
                ("size", &mut fields.side),
            ] {
                ui.label(label);
                edited |= ui
                    .add(egui::TextEdit::singleline(value).desired_width(56.0))
                    .changed();
            }
            back = ui.button("Back").clicked();
            next = ui
                .add_enabled(enabled, egui::Button::new("Next"))
                .clicked();
        });
        ui.separator();

        if edited {
            self.wizard.dispatch(WizardEvent::FieldsEdited);
        }

        let revision = self.wizard.revision();
        let texture = self.upload_texture.get(
            ui.ctx(),
            "upload",
            revision,
            self.wizard.resizer().map(|resizer| resizer.image()),
        );
        if let (Some(texture), Some(resizer)) = (texture, self.wizard.resizer_mut()) {
            let (w, h) = resizer.natural_size();
            let image_size = egui::vec2(w as f32, h as f32);

            let available_size = ui.available_size();
            let max_size = available_size - egui::vec2(PADDING * 2.0, PADDING * 2.0);
            let scale = (max_size.x / image_size.x).min(max_size.y / image_size.y).max(0.01);
            let display_size = image_size * scale;

            // Manual centering
            let x_offset = (available_size.x - display_size.x) / 2.0;
            let y_offset = (available_size.y - display_size.y) / 2.0;
            let start_pos = ui.cursor().min + egui::vec2(x_offset.max(0.0), y_offset.max(0.0));
            let target_rect = egui::Rect::from_min_size(start_pos, display_size);

            let response = ui.allocate_rect(target_rect, egui::Sense::drag());
            let painter = ui.painter_at(target_rect);
            let origin = target_rect.center();

            if response.drag_started() {
                if let Some(pos) = response.interact_pointer_pos() {
                    resizer.begin_drag(((pos - origin) / scale).to_pos2(), scale);
                }
            }
            if response.dragged() {
                resizer.drag(response.drag_delta() / scale);
            }
            if response.drag_stopped() {
                resizer.end_drag();
            }
            if resizer.is_dragging() {
                ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
            }

            // The image pans under the selection, which stays centered.
            let center = resizer.get_constraint().center();
            let image_rect = egui::Rect::from_min_size(
                origin + overlay::image_offset(center) * scale,
                display_size,
            );
            painter.image(
                texture,
                image_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
            resizer.frame().replay(&mut PainterSurface {
                painter: &painter,
                origin,
                scale,
            });
        }
        self.wizard.poll_resizer();

        if back {
            self.wizard.dispatch(WizardEvent::ResizeReset);
        } else if next {
            self.wizard.dispatch(WizardEvent::ResizeSubmitted);
        }
    }

    fn filter_ui(&mut self, ui: &mut egui::Ui) {
        let mut selected = self.wizard.filter();
        let mut back = false;
        let mut submit = false;
        ui.horizontal(|ui| {
            for filter in Filter::ALL {
                ui.radio_value(&mut selected, filter, filter.label());
            }
            back = ui.button("Back").clicked();
            submit = ui.button("Submit").clicked();
        });
        ui.separator();

        if selected != self.wizard.filter() {
            self.wizard.dispatch(WizardEvent::FilterChanged(selected));
        }

        let revision = self.wizard.revision();
        if let Some(texture) =
            self.preview_texture
                .get(ui.ctx(), "preview", revision, self.wizard.preview())
        {
            let size = self
                .wizard
                .preview()
                .map(|p| egui::vec2(p.width() as f32, p.height() as f32))
                .unwrap_or(egui::Vec2::ZERO);
            let max = ui.available_size() - egui::vec2(PADDING * 2.0, PADDING * 2.0);
            let scale = (max.x / size.x).min(max.y / size.y).min(1.0);
            ui.centered_and_justified(|ui| ui.image((texture, size * scale)));
        }

        if back {
            self.wizard.dispatch(WizardEvent::FilterReset);
        } else if submit {
            self.wizard.dispatch(WizardEvent::FilterSubmitted);
        }
    }

    fn persist_submitted_filter(&mut self, frame: &mut eframe::Frame) {
        let Some(filter) = self.wizard.take_submitted_filter() else {
            return;
        };
        let stored = StoredFilter::new(filter, Utc::now());
        log::info!("remembering filter {} until {}", filter.value(), stored.expires);
        if let Some(storage) = frame.storage_mut() {
            prefs::store(storage, &stored);
        }
        self.stored_filter = Some(stored);
    }
}

fn thumbnail_ui(ui: &mut egui::Ui, thumbnail: &Thumbnail, texture: Option<egui::TextureId>) {
    let size = egui::vec2(THUMBNAIL_SIZE as f32, THUMBNAIL_SIZE as f32);
    ui.vertical(|ui| {
        match texture {
            Some(texture) => {
                ui.image((texture, size));
            }
            None => {
                let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
                let painter = ui.painter();
                if thumbnail.is_failed() {
                    painter.rect_filled(rect, 0.0, FAILURE_COLOR);
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "✖",
                        egui::FontId::proportional(24.0),
                        egui::Color32::WHITE,
                    );
                } else {
                    painter.rect_filled(rect, 0.0, PLACEHOLDER_COLOR);
                }
            }
        }
        ui.horizontal(|ui| {
            ui.label(format!("♥ {}", thumbnail.likes));
            ui.label(format!("💬 {}", thumbnail.comments));
        });
    });
}

impl eframe::App for KekstagramApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let loading = self.gallery.poll(Instant::now());
        self.wizard.poll_upload(None);
        if loading || self.wizard.is_uploading() {
            ctx.request_repaint_after(REPAINT_WHILE_LOADING);
        }

        self.handle_dropped_files(ctx);

        egui::SidePanel::left("gallery")
            .resizable(true)
            .default_width(THUMBNAIL_SIZE as f32 * 2.0 + PADDING * 2.0)
            .show(ctx, |ui| self.gallery_ui(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.wizard_ui(ui));

        self.persist_submitted_filter(frame);
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        if let Some(stored) = &self.stored_filter {
            prefs::store(storage, stored);
        }
    }
}
