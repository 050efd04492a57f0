//! Side panels and the status line
use crate::aggregate::{AggregateSummary, HOURS};
use crate::colors::ColorState;
use crate::playback::PlayState;
use crate::terminal::Terminal;
use crate::traffic::TrafficEvent;
use crossterm::style::Color;

// Box drawing characters (rounded)
const BOX_TL: char = '╭';
const BOX_TR: char = '╮';
const BOX_BL: char = '╰';
const BOX_BR: char = '╯';
const BOX_H: char = '─';
const BOX_V: char = '│';
const BOX_TITLE_L: char = '┤';
const BOX_TITLE_R: char = '├';

// Vertical partial blocks for the histogram (1/8 increments)
pub const VBLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub const TOP_LOCATIONS: usize = 10;

/// A bordered panel with a title
pub struct Panel {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
    pub title: String,
}

impl Panel {
    pub fn new(x: i32, y: i32, width: u16, height: u16, title: &str) -> Self {
        Self {
            x,
            y,
            width,
            height,
            title: title.to_string(),
        }
    }

    pub fn inner_x(&self) -> i32 { self.x + 1 }
    pub fn inner_y(&self) -> i32 { self.y + 1 }
    pub fn inner_width(&self) -> u16 { self.width.saturating_sub(2) }
    pub fn inner_height(&self) -> u16 { self.height.saturating_sub(2) }

    pub fn draw(&self, term: &mut Terminal, colors: &ColorState) {
        if self.width < 2 || self.height < 2 {
            return;
        }
        let w = self.width as i32;
        let h = self.height as i32;
        let bc = Some(colors.palette().chrome);

        term.set(self.x, self.y, BOX_TL, bc, false);
        for i in 1..(w - 1) {
            term.set(self.x + i, self.y, BOX_H, bc, false);
        }
        term.set(self.x + w - 1, self.y, BOX_TR, bc, false);

        let title_len = self.title.chars().count() as i32;
        if title_len > 0 && title_len + 6 <= w {
            let tx = self.x + 2;
            term.set(tx, self.y, BOX_TITLE_L, bc, false);
            term.set_str(tx + 2, self.y, &self.title, Some(Color::White), true);
            term.set(tx + 1, self.y, ' ', None, false);
            term.set(tx + 2 + title_len, self.y, ' ', None, false);
            term.set(tx + 3 + title_len, self.y, BOX_TITLE_R, bc, false);
        }

        for i in 1..(h - 1) {
            term.set(self.x, self.y + i, BOX_V, bc, false);
            term.set(self.x + w - 1, self.y + i, BOX_V, bc, false);
        }

        term.set(self.x, self.y + h - 1, BOX_BL, bc, false);
        for i in 1..(w - 1) {
            term.set(self.x + i, self.y + h - 1, BOX_H, bc, false);
        }
        term.set(self.x + w - 1, self.y + h - 1, BOX_BR, bc, false);
    }
}

/// Snapshot of the busiest locations. Only refreshed on request so the list
/// does not flicker every frame.
#[derive(Default)]
pub struct LocationList {
    rows: Vec<(String, usize)>,
}

impl LocationList {
    pub fn refresh(&mut self, summary: &AggregateSummary) {
        self.rows = summary
            .top_locations(TOP_LOCATIONS)
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
    }

    pub fn rows(&self) -> &[(String, usize)] {
        &self.rows
    }

    pub fn draw(&self, term: &mut Terminal, panel: &Panel, colors: &ColorState) {
        panel.draw(term, colors);
        let width = panel.inner_width() as usize;
        let palette = colors.palette();

        if self.rows.is_empty() {
            term.set_str(panel.inner_x() + 1, panel.inner_y(), "waiting for data", Some(palette.chrome), false);
            return;
        }

        for (i, (name, count)) in self.rows.iter().enumerate().take(panel.inner_height() as usize) {
            let (label, number) = location_row(name, *count, width);
            let y = panel.inner_y() + i as i32;
            term.set_str(panel.inner_x(), y, &label, Some(palette.text), false);
            let nx = panel.inner_x() + width as i32 - number.chars().count() as i32;
            term.set_str(nx, y, &number, Some(palette.accent), true);
        }
    }
}

/// Name left, count right, the name cut with an ellipsis if the row is short
pub fn location_row(name: &str, count: usize, width: usize) -> (String, String) {
    let number = count.to_string();
    let room = width.saturating_sub(number.len() + 2);
    let label = if name.chars().count() <= room {
        format!(" {name}")
    } else if room > 1 {
        let cut: String = name.chars().take(room - 1).collect();
        format!(" {cut}…")
    } else {
        String::new()
    };
    (label, number)
}

/// Cells of one histogram column, top to bottom
pub fn bar_column(count: usize, max: usize, height: usize) -> Vec<char> {
    if height == 0 {
        return Vec::new();
    }
    let eighths = if max == 0 {
        0
    } else {
        ((count as f64 / max as f64) * (height * 8) as f64).round() as usize
    };
    (0..height)
        .rev()
        .map(|row| {
            let filled = eighths.saturating_sub(row * 8).min(8);
            VBLOCKS[filled]
        })
        .collect()
}

/// Traffic per local hour, 24 columns with an hour axis underneath
pub fn draw_hour_histogram(term: &mut Terminal, panel: &Panel, summary: &AggregateSummary, colors: &ColorState) {
    panel.draw(term, colors);
    let inner_h = panel.inner_height() as usize;
    let inner_w = panel.inner_width() as usize;
    if inner_h < 2 || inner_w < HOURS {
        return;
    }

    let bar_h = inner_h - 1;
    let col_w = inner_w / HOURS;
    let x0 = panel.inner_x() + ((inner_w - col_w * HOURS) / 2) as i32;
    let max = summary.hour_histogram.iter().copied().max().unwrap_or(0);
    let peak = summary.peak_hour().map(|(hour, _)| hour);
    let palette = colors.palette();

    for (hour, &count) in summary.hour_histogram.iter().enumerate() {
        let is_peak = Some(hour) == peak;
        let (color, bold) = if is_peak { (palette.accent, true) } else { (palette.marker, false) };
        let x = x0 + (hour * col_w) as i32;
        for (row, ch) in bar_column(count, max, bar_h).into_iter().enumerate() {
            for dx in 0..col_w.max(1) as i32 {
                term.set(x + dx, panel.inner_y() + row as i32, ch, Some(color), bold);
            }
        }
        if hour % 6 == 0 {
            term.set_str(x, panel.inner_y() + bar_h as i32, &hour.to_string(), Some(palette.chrome), false);
        }
    }
}

/// Everything the status line shows
pub struct Status<'a> {
    pub state: PlayState,
    pub cursor: usize,
    pub total: usize,
    pub markers: usize,
    pub display_secs: u64,
    pub source: &'a str,
    /// Label of the newest marker, see `marker_label`
    pub latest: Option<String>,
    pub last_refresh: Option<String>,
    pub last_error: Option<&'a str>,
}

/// Location of an event, with its size when the backend sent one
pub fn marker_label(event: &TrafficEvent) -> String {
    match event.size {
        Some(size) if size.is_finite() && size >= 0.0 => format!("{} ({size:.0} B)", event.location.key()),
        _ => event.location.key(),
    }
}

pub fn status_text(status: &Status) -> String {
    let state = match status.state {
        PlayState::Playing => "▶ playing",
        PlayState::Paused => "⏸ paused",
    };
    let mut text = format!(
        " {state}  {}/{} events  {} on map  {}s  {}",
        status.cursor, status.total, status.markers, status.display_secs, status.source
    );
    if let Some(latest) = &status.latest {
        text.push_str(&format!("  last: {latest}"));
    }
    if let Some(err) = status.last_error {
        text.push_str(&format!("  error: {err}"));
    } else if let Some(at) = &status.last_refresh {
        text.push_str(&format!("  refreshed {at}"));
    }
    text
}

pub fn draw_status(term: &mut Terminal, y: i32, width: u16, status: &Status, colors: &ColorState) {
    let palette = colors.palette();
    let color = if status.last_error.is_some() {
        Color::Red
    } else if status.state == PlayState::Paused {
        Color::Yellow
    } else {
        palette.text
    };
    let text: String = status_text(status).chars().take(width as usize).collect();
    term.set_str(0, y, &text, Some(color), false);

    let hint = "? help ";
    let used = text.chars().count();
    if used + hint.len() < width as usize {
        term.set_str(width as i32 - hint.len() as i32, y, hint, Some(palette.chrome), false);
    }
}
