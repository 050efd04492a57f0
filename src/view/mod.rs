//! Live world map view
//!
//! The frame loop: read a key, let the controller advance one frame, redraw
//! map and panels into the back buffer, present, sleep.

pub mod controller;
pub mod map;
pub mod panels;

use crate::colors::ColorState;
use crate::config::MapConfig;
use crate::help::render_help_overlay;
use crate::terminal::Terminal;
use crate::traffic::source::TrafficSource;
use controller::Controller;
use crossterm::event::{KeyCode, KeyModifiers};
use map::BrailleCanvas;
use panels::{draw_hour_histogram, draw_status, marker_label, LocationList, Panel, Status};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const HELP: &str = "\
TRAFFIC MAP
───────────────────────
 Space   Pause/resume
 r       Replay from start
 +/-     Display duration
 !-^,)   Color scheme
 q/Esc   Quit
 ?       Close help
───────────────────────";

/// Side panel width; below `MIN_WIDTH_FOR_PANELS` the map gets the full width
const SIDE_WIDTH: u16 = 34;
const MIN_WIDTH_FOR_PANELS: u16 = 80;
const LOCATION_PANEL_HEIGHT: u16 = panels::TOP_LOCATIONS as u16 + 2;

/// Keyboard state that is not part of playback
pub struct ViewState {
    pub time_step: f32,
    pub colors: ColorState,
    pub show_help: bool,
}

impl ViewState {
    pub fn new(time_step: f32, color_scheme: u8) -> Self {
        Self {
            time_step,
            colors: ColorState::new(color_scheme),
            show_help: false,
        }
    }

    /// Handle view keys, returns true if should quit
    pub fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) -> bool {
        if self.colors.handle_key(code) {
            return false;
        }
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('?') => self.show_help = !self.show_help,
            _ => {}
        }
        false
    }

    pub fn render_help(&self, term: &mut Terminal, width: u16, height: u16) {
        if self.show_help {
            render_help_overlay(term, width, height, HELP, &self.colors);
        }
    }
}

/// Whole-second step of the display duration, clamped to the allowed range
pub fn step_duration(current: Duration, delta_secs: i64) -> Duration {
    let secs = (current.as_secs() as i64 + delta_secs).clamp(
        controller::MIN_DISPLAY.as_secs() as i64,
        controller::MAX_DISPLAY.as_secs() as i64,
    );
    Duration::from_secs(secs as u64)
}

struct Layout {
    map_cols: u16,
    map_rows: u16,
    side: Option<(Panel, Panel)>,
    status_y: i32,
}

fn layout(width: u16, height: u16) -> Layout {
    let body = height.saturating_sub(1);
    let side = if width >= MIN_WIDTH_FOR_PANELS && body > LOCATION_PANEL_HEIGHT + 4 {
        let x = (width - SIDE_WIDTH) as i32;
        let locations = Panel::new(x, 0, SIDE_WIDTH, LOCATION_PANEL_HEIGHT, "Top locations");
        let hours = Panel::new(
            x,
            LOCATION_PANEL_HEIGHT as i32,
            SIDE_WIDTH,
            body - LOCATION_PANEL_HEIGHT,
            "Traffic per hour",
        );
        Some((locations, hours))
    } else {
        None
    };
    let map_cols = if side.is_some() { width - SIDE_WIDTH - 1 } else { width };
    Layout {
        map_cols,
        map_rows: body,
        side,
        status_y: body as i32,
    }
}

pub fn run(term: &mut Terminal, source: Arc<dyn TrafficSource>, config: &MapConfig) -> io::Result<()> {
    let mut state = ViewState::new(config.time_step, config.color_scheme);
    let mut controller = Controller::new(source, config.playback);
    let mut locations = LocationList::default();

    let (init_w, init_h) = term.size();
    let mut prev_w = init_w;
    let mut prev_h = init_h;
    let mut parts = layout(init_w, init_h);
    let mut canvas = BrailleCanvas::new(parts.map_cols as usize, parts.map_rows as usize);

    let source_name = controller.source_name();
    info!(source = %source_name, "live view started");
    controller.begin(Instant::now());

    loop {
        let (width, height) = crossterm::terminal::size().unwrap_or(term.size());

        if width != prev_w || height != prev_h {
            term.resize(width, height);
            term.clear_screen()?;
            prev_w = width;
            prev_h = height;
            parts = layout(width, height);
            canvas.resize(parts.map_cols as usize, parts.map_rows as usize);
        }

        if let Some((code, mods)) = term.check_key()? {
            if state.handle_key(code, mods) {
                break;
            }
            let now = Instant::now();
            match code {
                KeyCode::Char(' ') => {
                    let play_state = controller.toggle_pause(now);
                    info!(state = ?play_state, "toggled playback");
                }
                KeyCode::Char('r') => {
                    controller.reset();
                    locations.refresh(controller.session().summary());
                }
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    let next = step_duration(controller.display_duration(), 1);
                    controller.set_display_duration(next, now);
                }
                KeyCode::Char('-') | KeyCode::Char('_') => {
                    let next = step_duration(controller.display_duration(), -1);
                    controller.set_display_duration(next, now);
                }
                _ => {}
            }
        }

        let now = Instant::now();
        let outcome = controller.frame(now);
        if outcome.batch_applied || outcome.tick.refresh_locations {
            locations.refresh(controller.session().summary());
        }

        term.clear();
        canvas.clear();
        map::draw_coastlines(&mut canvas);
        map::draw_markers(&mut canvas, controller.session(), now);
        map::render(&canvas, term, 0, 0, state.colors.palette());

        if let Some((loc_panel, hour_panel)) = &parts.side {
            locations.draw(term, loc_panel, &state.colors);
            draw_hour_histogram(term, hour_panel, controller.session().summary(), &state.colors);
        }

        let session = controller.session();
        let status = Status {
            state: session.state(),
            cursor: session.cursor(),
            total: session.len(),
            markers: session.markers().len(),
            display_secs: controller.display_duration().as_secs(),
            source: &source_name,
            latest: session.markers().last().map(|marker| marker_label(&marker.event)),
            last_refresh: controller.last_refresh().map(|t| t.format("%H:%M:%S").to_string()),
            last_error: controller.last_error(),
        };
        draw_status(term, parts.status_y, width, &status, &state.colors);

        state.render_help(term, width, height);
        term.present()?;
        term.sleep(state.time_step);
    }

    info!("live view stopped");
    Ok(())
}
