use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{poll, read, Event, KeyCode, KeyModifiers},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Back-buffered terminal. Frames are drawn into `back` and `present` only
/// writes the cells that differ from what is on screen.
pub struct Terminal {
    width: u16,
    height: u16,
    back: Vec<Vec<Cell>>,
    front: Vec<Vec<Cell>>,
    alternate_screen: bool,
}

/// A single cell in the terminal buffer
#[derive(Clone, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bold: false,
        }
    }
}

fn blank(width: u16, height: u16) -> Vec<Vec<Cell>> {
    vec![vec![Cell::default(); width as usize]; height as usize]
}

impl Terminal {
    /// Initialize the terminal for drawing
    pub fn new(alternate_screen: bool) -> io::Result<Self> {
        let (width, height) = size()?;

        if alternate_screen {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        }

        Ok(Self {
            width,
            height,
            back: blank(width, height),
            front: blank(width, height),
            alternate_screen,
        })
    }

    /// Get terminal dimensions
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Reallocate both buffers for a new size
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.back = blank(width, height);
        self.front = blank(width, height);
    }

    /// Clear the back buffer
    pub fn clear(&mut self) {
        for row in &mut self.back {
            row.fill(Cell::default());
        }
    }

    /// Clear the actual terminal. The next `present` redraws everything.
    pub fn clear_screen(&mut self) -> io::Result<()> {
        execute!(stdout(), Clear(ClearType::All))?;
        for row in &mut self.front {
            row.fill(Cell::default());
        }
        Ok(())
    }

    /// Set a character at position with optional color
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.back[y as usize][x as usize] = Cell { ch, fg, bold };
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    /// Write changed cells to the screen
    pub fn present(&mut self) -> io::Result<()> {
        let mut out = stdout();

        for (y, (back_row, front_row)) in self.back.iter().zip(self.front.iter_mut()).enumerate() {
            for (x, (cell, shown)) in back_row.iter().zip(front_row.iter_mut()).enumerate() {
                if cell == shown {
                    continue;
                }
                queue!(out, MoveTo(x as u16, y as u16))?;
                if cell.bold {
                    queue!(out, SetAttribute(Attribute::Bold))?;
                }
                match cell.fg {
                    Some(color) => queue!(out, SetForegroundColor(color), Print(cell.ch), ResetColor)?,
                    None => queue!(out, Print(cell.ch))?,
                }
                if cell.bold {
                    queue!(out, SetAttribute(Attribute::Reset))?;
                }
                *shown = cell.clone();
            }
        }

        out.flush()
    }

    /// Check for keypress (non-blocking), returns (code, modifiers)
    pub fn check_key(&self) -> io::Result<Option<(KeyCode, KeyModifiers)>> {
        if poll(Duration::from_millis(0))? {
            if let Event::Key(key_event) = read()? {
                return Ok(Some((key_event.code, key_event.modifiers)));
            }
        }
        Ok(None)
    }

    /// Sleep for specified duration
    pub fn sleep(&self, seconds: f32) {
        std::thread::sleep(Duration::from_secs_f32(seconds.max(0.0)));
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            let _ = execute!(stdout(), Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}
