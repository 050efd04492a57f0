use crate::colors::ColorState;
use crate::terminal::Terminal;

/// Render a centered help overlay box with the provided text.
pub fn render_help_overlay(term: &mut Terminal, width: u16, height: u16, help_text: &str, colors: &ColorState) {
    let lines: Vec<&str> = help_text.lines().collect();
    if lines.is_empty() {
        return;
    }

    let text_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_width = text_width + 4; // border plus one space each side
    let box_height = lines.len() + 2;

    let left = ((width as usize).saturating_sub(box_width) / 2) as i32;
    let top = ((height as usize).saturating_sub(box_height) / 2) as i32;
    let right = left + box_width as i32 - 1;
    let bottom = top + box_height as i32 - 1;

    let palette = colors.palette();
    let border = Some(palette.accent);
    let text = Some(palette.text);

    for x in left + 1..right {
        term.set(x, top, '─', border, false);
        term.set(x, bottom, '─', border, false);
    }
    term.set(left, top, '╭', border, false);
    term.set(right, top, '╮', border, false);
    term.set(left, bottom, '╰', border, false);
    term.set(right, bottom, '╯', border, false);

    for (i, line) in lines.iter().enumerate() {
        let y = top + 1 + i as i32;
        term.set(left, y, '│', border, false);
        // Blank the row first so the map does not show through
        for x in left + 1..right {
            term.set(x, y, ' ', None, false);
        }
        term.set_str(left + 2, y, line, text, i == 0);
        term.set(right, y, '│', border, false);
    }
}
