//! Map palettes, switched with Shift+digit

use crossterm::event::KeyCode;
use crossterm::style::Color;

/// Colors of one scheme, named by what they paint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette {
    pub coast: Color,
    /// Marker in the second half of its fade
    pub marker_faded: Color,
    pub marker: Color,
    /// Marker still inside its display duration
    pub marker_fresh: Color,
    /// Borders, axis labels and hints
    pub chrome: Color,
    /// Location names and help text
    pub text: Color,
    /// Counts, the histogram peak and the help border
    pub accent: Color,
}

pub const PALETTES: [Palette; 7] = [
    // matrix
    Palette {
        coast: Color::DarkGreen,
        marker_faded: Color::DarkGreen,
        marker: Color::Green,
        marker_fresh: Color::AnsiValue(10),
        chrome: Color::DarkGrey,
        text: Color::Green,
        accent: Color::AnsiValue(10),
    },
    // fire
    Palette {
        coast: Color::DarkRed,
        marker_faded: Color::Red,
        marker: Color::DarkYellow,
        marker_fresh: Color::Yellow,
        chrome: Color::DarkGrey,
        text: Color::DarkYellow,
        accent: Color::Yellow,
    },
    // ice
    Palette {
        coast: Color::DarkBlue,
        marker_faded: Color::Blue,
        marker: Color::Cyan,
        marker_fresh: Color::White,
        chrome: Color::DarkGrey,
        text: Color::Cyan,
        accent: Color::White,
    },
    // pink
    Palette {
        coast: Color::DarkMagenta,
        marker_faded: Color::DarkMagenta,
        marker: Color::Magenta,
        marker_fresh: Color::AnsiValue(13),
        chrome: Color::DarkGrey,
        text: Color::Magenta,
        accent: Color::AnsiValue(13),
    },
    // amber
    Palette {
        coast: Color::AnsiValue(94),
        marker_faded: Color::DarkYellow,
        marker: Color::Yellow,
        marker_fresh: Color::AnsiValue(11),
        chrome: Color::DarkGrey,
        text: Color::Yellow,
        accent: Color::AnsiValue(11),
    },
    // mono
    Palette {
        coast: Color::DarkGrey,
        marker_faded: Color::Grey,
        marker: Color::White,
        marker_fresh: Color::White,
        chrome: Color::DarkGrey,
        text: Color::Grey,
        accent: Color::White,
    },
    // neon: blue land, magenta traffic
    Palette {
        coast: Color::DarkBlue,
        marker_faded: Color::DarkMagenta,
        marker: Color::Magenta,
        marker_fresh: Color::AnsiValue(13),
        chrome: Color::Blue,
        text: Color::Cyan,
        accent: Color::AnsiValue(13),
    },
];

#[derive(Clone, Copy)]
pub struct ColorState {
    pub scheme: u8,
}

impl ColorState {
    pub fn new(default_scheme: u8) -> Self {
        Self {
            scheme: default_scheme.min(PALETTES.len() as u8 - 1),
        }
    }

    pub fn palette(&self) -> &'static Palette {
        &PALETTES[self.scheme as usize % PALETTES.len()]
    }

    /// Shift+0..6. Returns true if the key picked a scheme.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        self.scheme = match code {
            KeyCode::Char(')') => 0,
            KeyCode::Char('!') => 1,
            KeyCode::Char('@') => 2,
            KeyCode::Char('#') => 3,
            KeyCode::Char('$') => 4,
            KeyCode::Char('%') => 5,
            KeyCode::Char('^') => 6,
            _ => return false,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifted_digits_select_schemes() {
        let mut colors = ColorState::new(0);
        assert!(colors.handle_key(KeyCode::Char('%')));
        assert_eq!(colors.scheme, 5);
        assert_eq!(colors.palette().coast, Color::DarkGrey);
        assert!(!colors.handle_key(KeyCode::Char('&')));
        assert_eq!(colors.scheme, 5);
    }

    #[test]
    fn out_of_range_default_is_clamped() {
        let colors = ColorState::new(42);
        assert_eq!(colors.scheme, 6);
        assert_eq!(colors.palette(), &PALETTES[6]);
    }

    #[test]
    fn markers_stand_out_from_the_coast() {
        for palette in &PALETTES {
            assert_ne!(palette.coast, palette.marker_fresh);
            assert_ne!(palette.coast, palette.marker);
        }
    }
}
