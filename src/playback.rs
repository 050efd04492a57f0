//! Playback engine
//!
//! Draws the current event set onto the map a batch per frame, then ages the
//! markers out. The session is plain data: nothing here knows about the
//! terminal, timers or the network, so every transition can be driven from
//! tests with synthetic instants.

use crate::aggregate::{summarize, AggregateSummary};
use crate::config::PlaybackConfig;
use crate::traffic::{clamp_coordinate, TrafficEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
}

/// Normalized equirectangular position, both axes in `[0, 1]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapPoint {
    pub x: f32,
    pub y: f32,
}

impl MapPoint {
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        let lat = clamp_coordinate(lat, 90.0);
        let lon = clamp_coordinate(lon, 180.0);
        Self {
            x: ((lon + 180.0) / 360.0) as f32,
            y: ((90.0 - lat) / 180.0) as f32,
        }
    }

    /// Scale onto a surface of the given size, staying inside it
    pub fn to_surface(self, width: usize, height: usize) -> (usize, usize) {
        let x = (self.x * width as f32) as usize;
        let y = (self.y * height as f32) as usize;
        (x.min(width.saturating_sub(1)), y.min(height.saturating_sub(1)))
    }
}

/// On-screen dot for one consumed event
#[derive(Clone, Debug)]
pub struct VisualMarker {
    pub position: MapPoint,
    pub created_at: Instant,
    pub event: Arc<TrafficEvent>,
}

impl VisualMarker {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// Opacity of a marker of the given age: fully visible until `display`,
/// then a linear fade to zero over `fade`.
pub fn marker_opacity(age: Duration, display: Duration, fade: Duration) -> f32 {
    if age <= display {
        return 1.0;
    }
    if fade.is_zero() {
        return 0.0;
    }
    let progress = (age - display).as_secs_f32() / fade.as_secs_f32();
    1.0 - progress.min(1.0)
}

/// What one frame did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub emitted: usize,
    pub expired: usize,
    /// The location list should be redrawn
    pub refresh_locations: bool,
}

pub struct PlaybackSession {
    config: PlaybackConfig,
    state: PlayState,
    events: Vec<Arc<TrafficEvent>>,
    cursor: usize,
    markers: Vec<VisualMarker>,
    summary: AggregateSummary,
    last_frame: Option<Instant>,
    /// Set while paused; marker ages are frozen at this instant
    paused_at: Option<Instant>,
}

impl PlaybackSession {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            state: PlayState::Playing,
            events: Vec::new(),
            cursor: 0,
            markers: Vec::new(),
            summary: AggregateSummary::default(),
            last_frame: None,
            paused_at: None,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[Arc<TrafficEvent>] {
        &self.events
    }

    pub fn markers(&self) -> &[VisualMarker] {
        &self.markers
    }

    pub fn summary(&self) -> &AggregateSummary {
        &self.summary
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Events consumed per frame
    pub fn batch_size(&self) -> usize {
        self.events.len().div_ceil(self.config.batch_frames.max(1))
    }

    /// The instant marker ages are measured against: `now` while playing,
    /// the moment of the pause otherwise.
    pub fn clock(&self, now: Instant) -> Instant {
        self.paused_at.unwrap_or(now)
    }

    pub fn opacity(&self, marker: &VisualMarker, now: Instant) -> f32 {
        marker_opacity(
            marker.age(self.clock(now)),
            self.config.display_duration,
            self.config.fade_duration,
        )
    }

    /// Advance one frame. A no-op while paused.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        if self.state == PlayState::Paused {
            return TickReport::default();
        }

        // Emission order must never go back in time
        let now = match self.last_frame {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_frame = Some(now);

        let start = self.cursor;
        let end = (start + self.batch_size()).min(self.events.len());
        for event in &self.events[start..end] {
            self.markers.push(VisualMarker {
                position: MapPoint::from_lat_lon(event.latitude, event.longitude),
                created_at: now,
                event: Arc::clone(event),
            });
        }
        self.cursor = end;

        let every = self.config.location_refresh_every.max(1);
        let refresh_locations = end > start && start / every != end / every;

        let lifetime = self.config.lifetime();
        let before = self.markers.len();
        self.markers.retain(|marker| marker.age(now) < lifetime);

        TickReport {
            emitted: end - start,
            expired: before - self.markers.len(),
            refresh_locations,
        }
    }

    /// Playing -> Paused. Markers stay where they are and stop aging.
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.state == PlayState::Paused {
            return false;
        }
        self.state = PlayState::Paused;
        self.paused_at = Some(now);
        debug!(cursor = self.cursor, markers = self.markers.len(), "playback paused");
        true
    }

    /// Paused -> Playing. The caller restarts the refresh timer.
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.state == PlayState::Playing {
            return false;
        }
        self.state = PlayState::Playing;
        if let Some(paused_at) = self.paused_at.take() {
            let span = now.saturating_duration_since(paused_at);
            for marker in &mut self.markers {
                marker.created_at += span;
            }
        }
        self.last_frame = Some(now);
        debug!(cursor = self.cursor, "playback resumed");
        true
    }

    /// Replace the event set and start over. Valid in either state; returns
    /// true when playing, meaning a fresh fetch should be requested.
    pub fn reset(&mut self, events: Vec<Arc<TrafficEvent>>) -> bool {
        self.markers.clear();
        self.cursor = 0;
        self.events = events;
        self.summary = summarize(self.events.iter().map(|event| &**event));
        self.is_playing()
    }

    /// Apply a completed fetch. Ignored once paused so a request that was in
    /// flight when the user paused cannot disturb the frozen view.
    pub fn apply_batch(&mut self, events: Vec<TrafficEvent>) -> bool {
        if self.state == PlayState::Paused {
            debug!(events = events.len(), "discarding batch that completed after pause");
            return false;
        }
        self.reset(events.into_iter().map(Arc::new).collect());
        true
    }

    /// Live change of the aging thresholds
    pub fn set_timing(&mut self, display: Duration, fade: Duration) {
        self.config.display_duration = display;
        self.config.fade_duration = fade;
    }
}
