use eframe::egui::{self, Pos2, Vec2};
use image::DynamicImage;

use crate::overlay::{self, BORDER_LINE, DisplayList};

/// Smallest selection the resizer will keep, in image pixels.
pub const MIN_SIDE: f32 = 1.0;

/// Share of the shorter image side covered by the initial selection.
const INITIAL_SHARE: f32 = 0.75;

/// Corner grab radius, in screen pixels.
const HANDLE_TOLERANCE: f32 = 10.0;

/// Crop selection in image pixels: top-left offset and side length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Square {
    pub x: f32,
    pub y: f32,
    pub side: f32,
}

impl Square {
    pub fn new(x: f32, y: f32, side: f32) -> Self {
        Self { x, y, side }
    }

    pub fn center(&self) -> Pos2 {
        egui::pos2(self.x + self.side / 2.0, self.y + self.side / 2.0)
    }

    /// Shrinks and shifts the square until it fits inside `width × height`.
    pub fn clamp_to(self, width: f32, height: f32) -> Self {
        let side = self.side.clamp(MIN_SIDE, width.min(height).max(MIN_SIDE));
        Self {
            x: self.x.clamp(0.0, (width - side).max(0.0)),
            y: self.y.clamp(0.0, (height - side).max(0.0)),
            side,
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.side.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResizeHandle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center, // Moving
}

impl ResizeHandle {
    /// Outward diagonal of a corner handle.
    fn direction(self) -> Option<Vec2> {
        match self {
            ResizeHandle::TopLeft => Some(egui::vec2(-1.0, -1.0)),
            ResizeHandle::TopRight => Some(egui::vec2(1.0, -1.0)),
            ResizeHandle::BottomLeft => Some(egui::vec2(-1.0, 1.0)),
            ResizeHandle::BottomRight => Some(egui::vec2(1.0, 1.0)),
            ResizeHandle::Center => None,
        }
    }
}

/// Owns the loaded image and the crop selection over it.
///
/// The selection is always shown centered in the view with the image panned
/// underneath, so every overlay frame is drawn around the origin.
pub struct Resizer {
    image: DynamicImage,
    constraint: Square,
    frame: DisplayList,
    selected_handle: Option<ResizeHandle>,
    pending_change: Option<Square>,
}

impl Resizer {
    pub fn new(image: DynamicImage) -> Self {
        let (w, h) = (image.width() as f32, image.height() as f32);
        let side = (w.min(h) * INITIAL_SHARE).floor().max(MIN_SIDE);
        let constraint =
            Square::new(((w - side) / 2.0).floor(), ((h - side) / 2.0).floor(), side).clamp_to(w, h);

        let mut resizer = Self {
            image,
            constraint,
            frame: DisplayList::default(),
            selected_handle: None,
            pending_change: None,
        };
        resizer.redraw();
        resizer
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn natural_size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn get_constraint(&self) -> Square {
        self.constraint
    }

    /// Stores a new selection, clamped to the image, and redraws the overlay
    /// frame before returning.
    ///
    /// Non-finite values and non-positive sides are refused; the previous
    /// selection stays in place and `false` is returned.
    pub fn set_constraint(&mut self, x: f32, y: f32, side: f32) -> bool {
        let requested = Square::new(x, y, side);
        if !requested.is_finite() || side <= 0.0 {
            log::debug!("refusing constraint {requested:?}");
            return false;
        }
        let (w, h) = self.natural_size();
        self.constraint = requested.clamp_to(w as f32, h as f32);
        self.redraw();
        true
    }

    /// The overlay frame for the current selection, in image pixels around
    /// the selection center.
    pub fn frame(&self) -> &DisplayList {
        &self.frame
    }

    /// Takes the selection changed by pointer interaction since the last call.
    pub fn take_change(&mut self) -> Option<Square> {
        self.pending_change.take()
    }

    fn redraw(&mut self) {
        let (w, h) = self.natural_size();
        let side = self.constraint.side;
        self.frame.clear();
        overlay::draw_mask(&mut self.frame, w as f32, h as f32, side, BORDER_LINE);
        overlay::draw_border(&mut self.frame, side, BORDER_LINE);
        overlay::draw_label(&mut self.frame, w, h, side, BORDER_LINE);
    }

    /// Picks the handle under `pos`, given in image pixels relative to the
    /// selection center. `scale` is screen pixels per image pixel; the grab
    /// tolerance is measured on screen.
    pub fn hit_test(&self, pos: Pos2, scale: f32) -> ResizeHandle {
        let tolerance = HANDLE_TOLERANCE / scale.max(f32::EPSILON);
        // Corners sit on the dotted border, not on the hole.
        let half = self.constraint.side / 2.0 + BORDER_LINE / 2.0;

        let corners = [
            (egui::pos2(-half, -half), ResizeHandle::TopLeft),
            (egui::pos2(half, -half), ResizeHandle::TopRight),
            (egui::pos2(-half, half), ResizeHandle::BottomLeft),
            (egui::pos2(half, half), ResizeHandle::BottomRight),
        ];
        corners
            .into_iter()
            .find(|(corner, _)| pos.distance(*corner) < tolerance)
            .map_or(ResizeHandle::Center, |(_, handle)| handle)
    }

    pub fn begin_drag(&mut self, pos: Pos2, scale: f32) {
        self.selected_handle = Some(self.hit_test(pos, scale));
    }

    /// Applies a pointer movement, in image pixels, to the selection.
    ///
    /// Dragging the image pans it under the fixed selection, so moving moves
    /// the selection the opposite way. Corner handles grow or shrink the
    /// square around its center.
    pub fn drag(&mut self, delta: Vec2) {
        let Some(handle) = self.selected_handle else {
            return;
        };
        let current = self.constraint;
        let next = match handle.direction() {
            None => Square::new(current.x - delta.x, current.y - delta.y, current.side),
            Some(dir) => {
                // Half of the growth along the diagonal goes to each side.
                let grow = delta.dot(dir) / 2.0;
                Square::new(current.x - grow, current.y - grow, current.side + 2.0 * grow)
            }
        };

        if self.set_constraint(next.x, next.y, next.side) && self.constraint != current {
            self.pending_change = Some(self.constraint);
        }
    }

    pub fn end_drag(&mut self) {
        self.selected_handle = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.selected_handle.is_some()
    }

    /// Crops the current selection out of the image.
    pub fn export_image(&self) -> DynamicImage {
        let (w, h) = self.natural_size();
        let square = self.constraint;

        let x = (square.x.round().max(0.0) as u32).min(w.saturating_sub(1));
        let y = (square.y.round().max(0.0) as u32).min(h.saturating_sub(1));
        let side = (square.side.round().max(1.0) as u32)
            .min(w - x)
            .min(h - y);

        self.image.crop_imm(x, y, side, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::DrawCmd;

    fn resizer(w: u32, h: u32) -> Resizer {
        Resizer::new(DynamicImage::new_rgba8(w, h))
    }

    #[test]
    fn initial_selection_is_centered() {
        let r = resizer(400, 200);
        assert_eq!(r.get_constraint(), Square::new(125.0, 25.0, 150.0));
        assert_eq!(r.get_constraint().center(), egui::pos2(200.0, 100.0));
    }

    #[test]
    fn set_constraint_clamps_to_image_bounds() {
        let mut r = resizer(300, 200);
        assert!(r.set_constraint(250.0, -10.0, 100.0));
        assert_eq!(r.get_constraint(), Square::new(200.0, 0.0, 100.0));

        assert!(r.set_constraint(0.0, 0.0, 500.0));
        assert_eq!(r.get_constraint(), Square::new(0.0, 0.0, 200.0));
    }

    #[test]
    fn set_constraint_refuses_garbage() {
        let mut r = resizer(300, 200);
        let before = r.get_constraint();
        assert!(!r.set_constraint(f32::NAN, 0.0, 10.0));
        assert!(!r.set_constraint(0.0, 0.0, 0.0));
        assert!(!r.set_constraint(0.0, 0.0, f32::INFINITY));
        assert_eq!(r.get_constraint(), before);
    }

    #[test]
    fn set_constraint_redraws_before_returning() {
        let mut r = resizer(300, 300);
        r.set_constraint(10.0, 10.0, 80.0);

        let label = r.frame().cmds.iter().find_map(|cmd| match cmd {
            DrawCmd::Text { pos, text, .. } => Some((*pos, text.clone())),
            _ => None,
        });
        assert_eq!(
            label,
            Some((egui::pos2(0.0, -40.0 - 2.0 * BORDER_LINE), "300 x 300".to_owned()))
        );

        let rects = r
            .frame()
            .cmds
            .iter()
            .filter(|cmd| matches!(cmd, DrawCmd::Rect { .. }))
            .count();
        assert_eq!(rects, 4);
    }

    #[test]
    fn form_driven_sets_do_not_notify() {
        let mut r = resizer(300, 300);
        r.set_constraint(0.0, 0.0, 50.0);
        assert_eq!(r.take_change(), None);
    }

    #[test]
    fn dragging_inside_pans_the_image_and_notifies() {
        let mut r = resizer(300, 300);
        r.set_constraint(100.0, 100.0, 100.0);
        r.begin_drag(egui::pos2(0.0, 0.0), 1.0);
        r.drag(egui::vec2(20.0, -10.0));
        assert_eq!(r.get_constraint(), Square::new(80.0, 110.0, 100.0));
        assert_eq!(r.take_change(), Some(Square::new(80.0, 110.0, 100.0)));
        assert_eq!(r.take_change(), None);
        r.end_drag();
        assert!(!r.is_dragging());
    }

    #[test]
    fn dragging_a_corner_resizes_around_the_center() {
        let mut r = resizer(300, 300);
        r.set_constraint(100.0, 100.0, 100.0);
        r.begin_drag(egui::pos2(52.0, 52.0), 1.0);
        r.drag(egui::vec2(10.0, 10.0));
        assert_eq!(r.get_constraint(), Square::new(90.0, 90.0, 120.0));
        assert_eq!(r.get_constraint().center(), egui::pos2(150.0, 150.0));
    }

    #[test]
    fn corner_tolerance_is_measured_on_screen() {
        let mut r = resizer(4000, 4000);
        r.set_constraint(1000.0, 1000.0, 2000.0);
        let scale = 0.15;
        let corner = -(1000.0 + BORDER_LINE / 2.0);
        // 5 screen pixels inward from the dotted top-left corner.
        let off = 5.0 / scale;
        let pos = egui::pos2(corner + off, corner);
        assert_eq!(r.hit_test(pos, scale), ResizeHandle::TopLeft);
        assert_eq!(r.hit_test(pos, 1.0), ResizeHandle::Center);
    }

    #[test]
    fn drag_without_a_handle_is_ignored() {
        let mut r = resizer(300, 300);
        let before = r.get_constraint();
        r.drag(egui::vec2(10.0, 10.0));
        assert_eq!(r.get_constraint(), before);
        assert_eq!(r.take_change(), None);
    }

    #[test]
    fn blocked_drag_does_not_notify() {
        let mut r = resizer(100, 100);
        r.set_constraint(0.0, 0.0, 100.0);
        r.begin_drag(egui::pos2(0.0, 0.0), 1.0);
        r.drag(egui::vec2(5.0, 5.0));
        assert_eq!(r.take_change(), None);
    }

    #[test]
    fn export_crops_the_selection() {
        let mut r = resizer(320, 240);
        r.set_constraint(10.0, 20.0, 64.0);
        let cropped = r.export_image();
        assert_eq!((cropped.width(), cropped.height()), (64, 64));
    }
}
