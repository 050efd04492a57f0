//! Flat world map in braille dots
//!
//! Each terminal cell holds a 2x4 grid of dots. Coastlines are drawn in the
//! lowest intensity, markers in higher ones depending on how far they have
//! faded.

use crate::colors::Palette;
use crate::playback::{MapPoint, PlaybackSession};
use crate::terminal::Terminal;
use crossterm::style::Color;
use std::time::Instant;

/// Coastline outlines as (lat, lon) in degrees
const CONTINENTS: &[&[(f32, f32)]] = &[
    // North America
    &[
        (69.5, -90.5), (67.1, -81.4), (58.9, -94.7), (51.2, -79.9), (62.6, -77.4),
        (58.2, -67.6), (60.3, -64.6), (53.3, -55.8), (46.8, -71.1), (49.2, -65.1),
        (45.9, -59.8), (39.2, -76.3), (31.4, -81.3), (25.2, -80.4), (30.1, -84.1),
        (27.8, -97.1), (18.8, -95.9), (21.5, -87.1), (15.9, -88.9), (15.3, -83.4),
        (9.0, -82.2), (11.1, -74.9), (7.2, -80.9), (19.3, -105.0), (31.2, -113.1),
        (23.4, -109.4), (24.7, -112.2), (40.3, -124.4), (49.0, -122.8), (58.1, -134.1),
        (61.3, -150.6), (54.4, -164.8), (58.9, -157.0), (61.5, -166.1), (64.8, -160.8),
        (65.7, -168.1), (71.4, -156.6), (67.4, -108.9), (67.3, -96.1), (71.9, -95.2),
        (69.5, -90.5),
    ],
    // South America
    &[
        (11.1, -74.9), (10.7, -61.9), (4.2, -51.3), (-0.1, -50.4), (-7.3, -34.7),
        (-21.9, -40.9), (-24.9, -47.6), (-34.4, -53.8), (-33.9, -58.4), (-36.9, -56.8),
        (-41.1, -65.1), (-48.1, -66.0), (-53.8, -71.0), (-52.3, -74.9), (-46.6, -75.6),
        (-42.4, -72.7), (-18.3, -70.4), (-14.6, -76.0), (-4.7, -81.4), (3.8, -77.1),
        (9.0, -79.1), (11.1, -74.9),
    ],
    // Europe
    &[
        (31.2, 29.7), (31.2, 34.3), (36.7, 36.2), (36.7, 27.6), (39.5, 26.2),
        (41.5, 41.6), (45.2, 36.7), (47.3, 39.1), (44.4, 33.9), (46.6, 30.7),
        (41.1, 28.8), (40.3, 22.6), (36.4, 23.2), (45.6, 13.9), (40.2, 18.5),
        (37.9, 15.7), (44.4, 8.9), (36.0, -5.9), (36.9, -8.9), (43.0, -9.4),
        (43.4, -1.9), (48.7, -4.6), (53.5, 8.1), (57.1, 8.5), (54.0, 10.9),
        (54.4, 19.7), (59.2, 23.3), (60.0, 29.1), (60.7, 21.3), (65.1, 25.4),
        (65.7, 22.2), (55.4, 12.9), (59.5, 10.4), (58.6, 5.7), (62.6, 5.9),
        (69.8, 19.2), (70.5, 31.3), (69.3, 33.8), (31.2, 29.7),
    ],
    // Africa
    &[
        (29.9, 32.4), (11.7, 42.7), (10.6, 51.0), (-4.7, 39.2), (-14.7, 40.8),
        (-19.8, 34.8), (-24.1, 35.5), (-32.8, 28.2), (-34.8, 19.6), (-18.1, 11.8),
        (-10.7, 13.7), (3.7, 9.4), (6.3, 4.3), (4.4, -8.0), (14.7, -17.6),
        (29.9, 32.4),
    ],
    // Asia
    &[
        (77.0, 107.0), (70.8, 131.3), (69.4, 178.6), (62.3, 179.2), (59.9, 163.5),
        (51.0, 156.8), (56.8, 155.9), (62.6, 164.5), (54.7, 135.1), (52.2, 141.4),
        (39.8, 127.5), (35.1, 129.1), (40.9, 121.6), (39.2, 118.0), (37.5, 122.4),
        (34.9, 119.2), (28.2, 121.7), (19.8, 105.9), (13.4, 109.3), (8.6, 105.2),
        (13.4, 100.1), (1.3, 104.2), (22.8, 91.4), (15.9, 80.3), (8.0, 77.5),
        (21.4, 72.6), (30.3, 48.9), (24.0, 51.8), (26.4, 56.4), (22.3, 59.8),
        (12.6, 43.5), (21.3, 39.1), (69.3, 33.8), (67.5, 41.1), (66.6, 33.2),
        (63.8, 37.0), (68.6, 43.5), (68.1, 68.5), (71.0, 66.7), (73.0, 69.9),
        (66.2, 72.4), (72.8, 74.7), (77.0, 107.0),
    ],
    // Australia
    &[
        (-13.8, 143.6), (-26.1, 153.1), (-37.4, 150.0), (-38.0, 140.6), (-34.4, 138.2),
        (-35.3, 136.8), (-32.9, 137.8), (-34.9, 136.0), (-31.5, 131.3), (-34.2, 115.0),
        (-21.8, 114.1), (-19.7, 120.9), (-14.2, 125.7), (-15.0, 129.6), (-11.1, 132.4),
        (-11.9, 136.5), (-15.0, 135.5), (-17.7, 140.2), (-11.0, 142.1), (-13.8, 143.6),
    ],
    // Greenland
    &[
        (83.5, -27.1), (82.7, -20.8), (82.0, -31.4), (81.3, -12.2), (80.2, -20.0),
        (80.1, -17.7), (76.6, -21.7), (74.3, -19.4), (70.2, -26.4), (70.1, -22.3),
        (65.5, -39.8), (60.1, -43.4), (63.6, -51.6), (67.2, -54.0), (69.9, -50.9),
        (69.6, -54.7), (70.6, -51.4), (75.5, -58.6), (78.0, -73.3), (81.8, -62.7),
        (83.5, -27.1),
    ],
    // Japan
    &[
        (37.1, 141.0), (33.5, 135.8), (33.9, 131.0), (31.4, 130.2), (33.3, 129.4),
        (38.2, 139.4), (41.2, 140.3), (37.1, 141.0),
    ],
    // UK and Ireland
    &[
        (58.6, -3.0), (51.3, 1.4), (50.0, -5.2), (54.0, -2.9), (56.8, -6.1),
        (58.6, -3.0),
    ],
    // Antarctica, open along the date line
    &[
        (-64.2, -58.6), (-68.0, -65.7), (-73.7, -60.8), (-79.2, -78.0), (-83.2, -58.2),
        (-80.3, -28.5), (-78.1, -35.3), (-70.9, -6.9), (-65.8, 54.5), (-72.3, 69.9),
        (-66.2, 88.0), (-65.3, 135.1), (-71.7, 171.2), (-80.9, 159.8), (-84.7, 180.0),
    ],
    &[
        (-84.1, -179.1), (-85.0, -143.1), (-76.9, -158.4), (-73.9, -74.9), (-64.2, -58.6),
    ],
];

pub const COAST: u8 = 1;
const MARKER_DIM: u8 = 2;
const MARKER: u8 = 3;
const MARKER_FRESH: u8 = 4;

/// Dot bit for each (row, col) inside a braille cell
const DOT_BITS: [[u8; 2]; 4] = [[0x01, 0x08], [0x02, 0x10], [0x04, 0x20], [0x40, 0x80]];

pub struct BrailleCanvas {
    cols: usize,
    rows: usize,
    dots: Vec<u8>,
}

impl BrailleCanvas {
    /// A canvas covering `cols` x `rows` terminal cells
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            dots: vec![0; cols * 2 * rows * 4],
        }
    }

    pub fn cells(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Size in dots
    pub fn dot_size(&self) -> (usize, usize) {
        (self.cols * 2, self.rows * 4)
    }

    pub fn resize(&mut self, cols: usize, rows: usize) {
        if (cols, rows) != (self.cols, self.rows) {
            *self = Self::new(cols, rows);
        }
    }

    pub fn clear(&mut self) {
        self.dots.fill(0);
    }

    /// Set a dot, keeping the brighter of old and new
    pub fn plot(&mut self, x: i32, y: i32, intensity: u8) {
        let (w, h) = self.dot_size();
        if x < 0 || y < 0 || x as usize >= w || y as usize >= h {
            return;
        }
        let idx = y as usize * w + x as usize;
        self.dots[idx] = self.dots[idx].max(intensity);
    }

    pub fn plot_point(&mut self, point: MapPoint, intensity: u8) -> (i32, i32) {
        let (w, h) = self.dot_size();
        let (x, y) = point.to_surface(w, h);
        self.plot(x as i32, y as i32, intensity);
        (x as i32, y as i32)
    }

    /// Braille glyph and brightest intensity of a cell, `None` when empty
    pub fn cell(&self, cx: usize, cy: usize) -> Option<(char, u8)> {
        let w = self.cols * 2;
        let mut bits = 0u8;
        let mut max = 0u8;
        for (row, row_bits) in DOT_BITS.iter().enumerate() {
            for (col, bit) in row_bits.iter().enumerate() {
                let val = self.dots[(cy * 4 + row) * w + cx * 2 + col];
                if val > 0 {
                    bits |= bit;
                    max = max.max(val);
                }
            }
        }
        if bits == 0 {
            return None;
        }
        char::from_u32(0x2800 + bits as u32).map(|ch| (ch, max))
    }
}

/// Coastlines, interpolated between outline points
pub fn draw_coastlines(canvas: &mut BrailleCanvas) {
    let (w, _) = canvas.dot_size();
    // Enough steps that adjacent samples land on neighbouring dots
    let steps = (w / 40).max(4);
    for outline in CONTINENTS {
        for pair in outline.windows(2) {
            let (lat1, lon1) = pair[0];
            let (lat2, lon2) = pair[1];
            for t in 0..=steps {
                let frac = t as f32 / steps as f32;
                let lat = lat1 + (lat2 - lat1) * frac;
                let lon = lon1 + (lon2 - lon1) * frac;
                canvas.plot_point(MapPoint::from_lat_lon(lat as f64, lon as f64), COAST);
            }
        }
    }
}

fn marker_intensity(opacity: f32) -> u8 {
    if opacity >= 0.999 {
        MARKER_FRESH
    } else if opacity > 0.5 {
        MARKER
    } else {
        MARKER_DIM
    }
}

/// One dot per live marker; fully visible ones get a small cross
pub fn draw_markers(canvas: &mut BrailleCanvas, session: &PlaybackSession, now: Instant) {
    for marker in session.markers() {
        let intensity = marker_intensity(session.opacity(marker, now));
        let (x, y) = canvas.plot_point(marker.position, intensity);
        if intensity == MARKER_FRESH {
            for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                canvas.plot(x + dx, y + dy, intensity);
            }
        }
    }
}

fn dot_color(palette: &Palette, intensity: u8) -> Color {
    match intensity {
        COAST => palette.coast,
        MARKER_DIM => palette.marker_faded,
        MARKER => palette.marker,
        _ => palette.marker_fresh,
    }
}

/// Copy the canvas into the back buffer at `(x0, y0)`
pub fn render(canvas: &BrailleCanvas, term: &mut Terminal, x0: i32, y0: i32, palette: &Palette) {
    let (cols, rows) = canvas.cells();
    for cy in 0..rows {
        for cx in 0..cols {
            let Some((ch, intensity)) = canvas.cell(cx, cy) else {
                continue;
            };
            term.set(x0 + cx as i32, y0 + cy as i32, ch, Some(dot_color(palette, intensity)), intensity >= MARKER);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;
    use crate::traffic::TrafficEvent;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn cell_composes_braille_bits() {
        let mut canvas = BrailleCanvas::new(2, 1);
        assert_eq!(canvas.cell(0, 0), None);

        canvas.plot(0, 0, COAST);
        assert_eq!(canvas.cell(0, 0), Some(('\u{2801}', COAST)));

        canvas.plot(1, 3, MARKER);
        assert_eq!(canvas.cell(0, 0), Some(('\u{2881}', MARKER)));
        assert_eq!(canvas.cell(1, 0), None);
    }

    #[test]
    fn plot_ignores_out_of_bounds() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.plot(-1, 0, COAST);
        canvas.plot(2, 0, COAST);
        canvas.plot(0, 4, COAST);
        assert_eq!(canvas.cell(0, 0), None);
    }

    #[test]
    fn brighter_dot_wins() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.plot(0, 0, MARKER_FRESH);
        canvas.plot(0, 0, COAST);
        assert_eq!(canvas.cell(0, 0).map(|(_, i)| i), Some(MARKER_FRESH));
    }

    #[test]
    fn corners_of_the_world_land_in_corner_cells() {
        let mut canvas = BrailleCanvas::new(40, 10);
        canvas.plot_point(MapPoint::from_lat_lon(90.0, -180.0), MARKER);
        canvas.plot_point(MapPoint::from_lat_lon(-90.0, 180.0), MARKER);
        assert!(canvas.cell(0, 0).is_some());
        assert!(canvas.cell(39, 9).is_some());
    }

    #[test]
    fn coastlines_fit_any_size() {
        for (cols, rows) in [(1, 1), (20, 5), (200, 60)] {
            let mut canvas = BrailleCanvas::new(cols, rows);
            draw_coastlines(&mut canvas);
            let lit = (0..rows)
                .flat_map(|cy| (0..cols).map(move |cx| (cx, cy)))
                .filter(|&(cx, cy)| canvas.cell(cx, cy).is_some())
                .count();
            assert!(lit > 0);
        }
    }

    #[test]
    fn fading_markers_dim() {
        let mut session = PlaybackSession::new(PlaybackConfig {
            display_duration: Duration::from_secs(1),
            fade_duration: Duration::from_secs(1),
            ..PlaybackConfig::default()
        });
        session.apply_batch(vec![TrafficEvent::new("198.51.100.7", 0.0, 0.0, Utc::now())]);
        let t0 = Instant::now();
        session.tick(t0);

        let mut canvas = BrailleCanvas::new(10, 5);
        draw_markers(&mut canvas, &session, t0);
        let fresh = canvas.cell(5, 2).map(|(_, i)| i);
        assert_eq!(fresh, Some(MARKER_FRESH));

        canvas.clear();
        draw_markers(&mut canvas, &session, t0 + Duration::from_millis(1800));
        let (_, intensity) = (0..5)
            .flat_map(|cy| (0..10).map(move |cx| (cx, cy)))
            .find_map(|(cx, cy)| canvas.cell(cx, cy))
            .unwrap();
        assert_eq!(intensity, MARKER_DIM);
    }

    #[test]
    fn paused_markers_keep_their_brightness() {
        let mut session = PlaybackSession::new(PlaybackConfig::default());
        session.apply_batch(vec![TrafficEvent::new("198.51.100.7", 0.0, 0.0, Utc::now())]);
        let t0 = Instant::now();
        session.tick(t0);
        session.pause(t0);

        let mut canvas = BrailleCanvas::new(10, 5);
        draw_markers(&mut canvas, &session, t0 + Duration::from_secs(60));
        assert_eq!(canvas.cell(5, 2).map(|(_, i)| i), Some(MARKER_FRESH));
    }
}
