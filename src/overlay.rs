//! Crop overlay drawing.
//!
//! Three immediate-mode routines decorate the crop selection: a darkened
//! mask around it, a dotted border and a label with the image dimensions.
//! All of them draw in a coordinate system whose origin is the center of the
//! selection square and share the same `(side, line)` pair, so the caller can
//! redraw everything from scratch on every pointer move.

use eframe::egui::{self, Align2, Color32, Pos2, Rect, Stroke, Vec2};

/// Stroke width of the selection border, in image pixels.
pub const BORDER_LINE: f32 = 6.0;

pub const MASK_COLOR: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 204);
pub const DOT_COLOR: Color32 = Color32::from_rgb(0xff, 0xe7, 0x53);
pub const DOT_RADIUS: f32 = 3.0;
pub const DOT_STEP: f32 = 10.0;
/// 12pt.
pub const LABEL_FONT_SIZE: f32 = 16.0;

/// Something the overlay can be painted onto.
pub trait Surface {
    fn fill_rect(&mut self, rect: Rect, color: Color32);
    fn fill_circle(&mut self, center: Pos2, radius: f32, fill: Color32, stroke: Stroke);
    fn fill_text(&mut self, pos: Pos2, anchor: Align2, text: &str, font_size: f32, color: Color32);
}

/// The four curtain regions around a `side × side` hole centered at the origin.
///
/// Order: top, bottom, left, right. Top and bottom span the whole container
/// width, left and right fill the height between them.
pub fn mask_rects(container_width: f32, container_height: f32, side: f32) -> [Rect; 4] {
    let half_w = container_width / 2.0;
    let half_h = container_height / 2.0;
    let half_side = side / 2.0;

    [
        Rect::from_min_max(egui::pos2(-half_w, -half_h), egui::pos2(half_w, -half_side)),
        Rect::from_min_max(egui::pos2(-half_w, half_side), egui::pos2(half_w, half_h)),
        Rect::from_min_max(egui::pos2(-half_w, -half_side), egui::pos2(-half_side, half_side)),
        Rect::from_min_max(egui::pos2(half_side, -half_side), egui::pos2(half_w, half_side)),
    ]
}

pub fn draw_mask(
    surface: &mut impl Surface,
    container_width: f32,
    container_height: f32,
    side: f32,
    line: f32,
) {
    if side + 2.0 * line > container_width.min(container_height) {
        log::debug!(
            "selection {side}+2*{line} exceeds container {container_width}x{container_height}"
        );
    }

    for rect in mask_rects(container_width, container_height, side) {
        surface.fill_rect(rect, MASK_COLOR);
    }
}

/// Coordinates visited by one pass along an edge of half-extent `half`.
///
/// The step does not snap to the far corner, so the last dot can stop short
/// of it by up to one step.
fn edge_steps(half: f32) -> impl Iterator<Item = f32> {
    std::iter::successors(Some(-half), |v| Some(v + DOT_STEP)).take_while(move |v| *v < half)
}

/// Dot centers of the selection border, in drawing order:
/// top edge, bottom edge, left edge, right edge.
pub fn border_dots(side: f32, line: f32) -> Vec<Pos2> {
    let half = side / 2.0 + line / 2.0;

    let top = edge_steps(half).map(|x| egui::pos2(x, -half));
    let bottom = edge_steps(half).map(|x| egui::pos2(x, half));
    let left = edge_steps(half).map(|y| egui::pos2(-half, y));
    let right = edge_steps(half).map(|y| egui::pos2(half, y));

    top.chain(bottom).chain(left).chain(right).collect()
}

pub fn draw_border(surface: &mut impl Surface, side: f32, line: f32) {
    for dot in border_dots(side, line) {
        surface.fill_circle(dot, DOT_RADIUS, DOT_COLOR, Stroke::NONE);
    }
}

pub fn label_text(natural_width: u32, natural_height: u32) -> String {
    format!("{} x {}", natural_width, natural_height)
}

/// Bottom-center anchor of the dimension label, just above the border.
pub fn label_anchor(side: f32, line: f32) -> Pos2 {
    egui::pos2(0.0, -side / 2.0 - line * 2.0)
}

pub fn draw_label(
    surface: &mut impl Surface,
    natural_width: u32,
    natural_height: u32,
    side: f32,
    line: f32,
) {
    surface.fill_text(
        label_anchor(side, line),
        Align2::CENTER_BOTTOM,
        &label_text(natural_width, natural_height),
        LABEL_FONT_SIZE,
        Color32::WHITE,
    );
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCmd {
    Rect {
        rect: Rect,
        color: Color32,
    },
    Circle {
        center: Pos2,
        radius: f32,
        fill: Color32,
        stroke: Stroke,
    },
    Text {
        pos: Pos2,
        anchor: Align2,
        text: String,
        font_size: f32,
        color: Color32,
    },
}

/// A recorded frame of draw calls that can be replayed onto another surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayList {
    pub cmds: Vec<DrawCmd>,
}

impl DisplayList {
    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    pub fn replay(&self, target: &mut impl Surface) {
        for cmd in &self.cmds {
            match cmd {
                DrawCmd::Rect { rect, color } => target.fill_rect(*rect, *color),
                DrawCmd::Circle {
                    center,
                    radius,
                    fill,
                    stroke,
                } => target.fill_circle(*center, *radius, *fill, *stroke),
                DrawCmd::Text {
                    pos,
                    anchor,
                    text,
                    font_size,
                    color,
                } => target.fill_text(*pos, *anchor, text, *font_size, *color),
            }
        }
    }
}

impl Surface for DisplayList {
    fn fill_rect(&mut self, rect: Rect, color: Color32) {
        self.cmds.push(DrawCmd::Rect { rect, color });
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, fill: Color32, stroke: Stroke) {
        self.cmds.push(DrawCmd::Circle {
            center,
            radius,
            fill,
            stroke,
        });
    }

    fn fill_text(&mut self, pos: Pos2, anchor: Align2, text: &str, font_size: f32, color: Color32) {
        self.cmds.push(DrawCmd::Text {
            pos,
            anchor,
            text: text.to_owned(),
            font_size,
            color,
        });
    }
}

/// Paints overlay coordinates onto an egui painter.
///
/// Positions are scaled by `scale` and translated so that the overlay origin
/// lands on `origin`. Dot radii and font sizes stay in screen pixels.
pub struct PainterSurface<'a> {
    pub painter: &'a egui::Painter,
    pub origin: Pos2,
    pub scale: f32,
}

impl PainterSurface<'_> {
    fn to_screen(&self, pos: Pos2) -> Pos2 {
        self.origin + pos.to_vec2() * self.scale
    }
}

impl Surface for PainterSurface<'_> {
    fn fill_rect(&mut self, rect: Rect, color: Color32) {
        let rect = Rect::from_min_max(self.to_screen(rect.min), self.to_screen(rect.max));
        self.painter.rect_filled(rect, 0.0, color);
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, fill: Color32, stroke: Stroke) {
        self.painter
            .circle(self.to_screen(center), radius, fill, stroke);
    }

    fn fill_text(&mut self, pos: Pos2, anchor: Align2, text: &str, font_size: f32, color: Color32) {
        self.painter.text(
            self.to_screen(pos),
            anchor,
            text,
            egui::FontId::proportional(font_size),
            color,
        );
    }
}

/// Offset that puts the selection center at the overlay origin, for drawing
/// the image underneath the mask.
pub fn image_offset(center: Pos2) -> Vec2 {
    -center.to_vec2()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(rect: &Rect) -> f32 {
        rect.width() * rect.height()
    }

    #[test]
    fn mask_leaves_exactly_the_selection_unpainted() {
        for (w, h, side) in [(800.0, 600.0, 300.0), (640.0, 640.0, 1.0), (500.0, 300.0, 290.0)] {
            let total: f32 = mask_rects(w, h, side).iter().map(area).sum();
            assert!((total - (w * h - side * side)).abs() < 1e-2, "{w}x{h} side {side}");
        }
    }

    #[test]
    fn mask_bands_span_full_width_then_remaining_height() {
        let [top, bottom, left, right] = mask_rects(400.0, 300.0, 100.0);
        assert_eq!(top.width(), 400.0);
        assert_eq!(bottom.width(), 400.0);
        assert_eq!(top.max.y, -50.0);
        assert_eq!(bottom.min.y, 50.0);
        assert_eq!(left.height(), 100.0);
        assert_eq!(right.height(), 100.0);
        assert_eq!(left.max.x, -50.0);
        assert_eq!(right.min.x, 50.0);
    }

    #[test]
    fn draw_mask_fills_four_translucent_rects() {
        let mut list = DisplayList::default();
        draw_mask(&mut list, 400.0, 300.0, 100.0, BORDER_LINE);
        assert_eq!(list.cmds.len(), 4);
        for cmd in &list.cmds {
            match cmd {
                DrawCmd::Rect { color, .. } => assert_eq!(color.a(), 204),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn border_starts_at_top_left_corner_and_steps_by_ten() {
        let dots = border_dots(100.0, 6.0);
        // half-extent 53, 106 / 10 rounds up to 11 dots per edge
        assert_eq!(dots.len(), 44);
        assert_eq!(dots[0], egui::pos2(-53.0, -53.0));
        assert_eq!(dots[1], egui::pos2(-43.0, -53.0));
        assert_eq!(dots[10], egui::pos2(47.0, -53.0));
        // bottom edge
        assert_eq!(dots[11], egui::pos2(-53.0, 53.0));
        // left edge
        assert_eq!(dots[22], egui::pos2(-53.0, -53.0));
        assert_eq!(dots[23], egui::pos2(-53.0, -43.0));
        // right edge
        assert_eq!(dots[33], egui::pos2(53.0, -53.0));
        assert_eq!(dots[43], egui::pos2(53.0, 47.0));
    }

    #[test]
    fn border_dot_count_follows_the_stepping_rule() {
        for (side, line) in [(20.0, 0.0), (25.0, 0.0), (94.0, 6.0), (1.0, 0.0)] {
            let per_edge = ((side + line) / DOT_STEP).ceil() as usize;
            assert_eq!(border_dots(side, line).len(), per_edge * 4, "side {side}");
        }
    }

    #[test]
    fn border_dots_are_yellow_without_stroke() {
        let mut list = DisplayList::default();
        draw_border(&mut list, 40.0, 0.0);
        assert!(list.cmds.iter().all(|cmd| matches!(
            cmd,
            DrawCmd::Circle { radius, fill, stroke, .. }
                if *radius == DOT_RADIUS && *fill == DOT_COLOR && *stroke == Stroke::NONE
        )));
    }

    #[test]
    fn label_sits_above_the_border() {
        let mut list = DisplayList::default();
        draw_label(&mut list, 1024, 768, 200.0, 6.0);
        assert_eq!(
            list.cmds,
            vec![DrawCmd::Text {
                pos: egui::pos2(0.0, -112.0),
                anchor: Align2::CENTER_BOTTOM,
                text: "1024 x 768".to_owned(),
                font_size: LABEL_FONT_SIZE,
                color: Color32::WHITE,
            }]
        );
    }

    #[test]
    fn replay_reproduces_the_recorded_frame() {
        let mut first = DisplayList::default();
        draw_mask(&mut first, 300.0, 300.0, 120.0, BORDER_LINE);
        draw_border(&mut first, 120.0, BORDER_LINE);
        draw_label(&mut first, 10, 20, 120.0, BORDER_LINE);

        let mut second = DisplayList::default();
        first.replay(&mut second);
        assert_eq!(first, second);
    }
}
