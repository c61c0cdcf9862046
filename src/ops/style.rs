use crate::model::width::Width;

/// CSS custom property the host reads for the text column width.
pub const LINE_WIDTH_PROPERTY: &str = "--file-line-width";

/// Pixel width of the text column for `width`.
///
/// 0% is one character wide and 100% fills the editor; everything in
/// between is linear. Needs a positive, finite character width.
pub fn line_width_px(width: Width, editor_px: f64, char_px: f64) -> Option<f64> {
    if !(char_px.is_finite() && char_px > 0.0 && editor_px.is_finite()) {
        return None;
    }
    let fraction = f64::from(width.percent()) / 100.0;
    let px = char_px * (1.0 + fraction * (editor_px / char_px - 1.0));
    (px > 0.0).then_some(px)
}

/// The style rule applying `width` to an editor of the given size.
pub fn style_rule(width: Width, editor_px: f64, char_px: f64) -> Option<String> {
    let px = line_width_px(width, editor_px, char_px)?;
    Some(format!("body {{ {LINE_WIDTH_PROPERTY}: {px}px;}}"))
}
