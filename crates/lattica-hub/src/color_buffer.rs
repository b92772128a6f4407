//! Flat display-colour cache shared between workers and readers
//!
//! Each worker writes only the indices of its own shard, so stores never
//! race with each other. Readers (a display thread, the controller) may
//! observe a mix of old and new colours while a generation is in flight.
//!
//! With an averaging window above one, a cell is painted from the mean of
//! its last `window` canonical values rather than its current state, which
//! smooths out period-2 flicker in the display.

use lattica_core::{Cell, CellState, Lattice, Rgb, Rule, StateValue};
use std::sync::atomic::{AtomicU32, Ordering};

/// One packed `0xRRGGBB` colour per cell
#[derive(Debug, Default)]
pub struct ColorBuffer {
    colors: Vec<AtomicU32>,
    averaging_window: usize,
}

impl ColorBuffer {
    /// A buffer of `len` black cells, painted from current states
    pub fn new(len: usize) -> Self {
        Self {
            colors: (0..len).map(|_| AtomicU32::new(Rgb::BLACK.to_u32())).collect(),
            averaging_window: 1,
        }
    }

    /// Paint from the mean of the last `window` generations instead
    pub fn with_averaging(mut self, window: usize) -> Self {
        self.averaging_window = window.max(1);
        self
    }

    pub fn averaging_window(&self) -> usize {
        self.averaging_window
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.colors
            .get(index)
            .map(|c| Rgb::from_u32(c.load(Ordering::Relaxed)))
    }

    /// Store the colour of cell `index`; out-of-range indices are ignored
    pub fn store(&self, index: usize, rgb: Rgb) {
        if let Some(slot) = self.colors.get(index) {
            slot.store(rgb.to_u32(), Ordering::Relaxed);
        }
    }

    /// Copy of every colour, row-major
    pub fn snapshot(&self) -> Vec<Rgb> {
        self.colors
            .iter()
            .map(|c| Rgb::from_u32(c.load(Ordering::Relaxed)))
            .collect()
    }

    /// Recolour one cell
    pub fn paint(&self, rule: &dyn Rule, cell: &Cell) {
        self.store(cell.index(), cell_color(rule, cell, self.averaging_window));
    }

    /// Recolour every cell
    pub fn refresh(&self, lattice: &Lattice, rule: &dyn Rule) {
        for cell in lattice.cells() {
            self.paint(rule, cell);
        }
    }
}

/// Display colour of `cell`, averaged over `window` generations
///
/// Tagged cells are highlighted regardless of the window. Colour-valued
/// states are never averaged.
pub fn cell_color(rule: &dyn Rule, cell: &Cell, window: usize) -> Rgb {
    let state = cell.current_state();
    if window <= 1 || state.is_tagged() || matches!(state.value(), StateValue::Color(_)) {
        return display_color(rule, &state);
    }
    cell.running_average(window)
        .and_then(|mean| state.with_int(mean.round() as u32).ok())
        .map(|averaged| rule.color(&averaged))
        .unwrap_or_else(|| rule.color(&state))
}

/// Colour a state for display, highlighting tagged states
pub fn display_color(rule: &dyn Rule, state: &CellState) -> Rgb {
    if state.is_tagged() {
        Rgb::HIGHLIGHT
    } else {
        rule.color(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattica_core::rules::{Cyclic, Majority};
    use lattica_core::{Coordinate, TagOwner};

    #[test]
    fn test_store_and_get() {
        let buffer = ColorBuffer::new(3);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get(1), Some(Rgb::BLACK));

        buffer.store(1, Rgb::new(10, 20, 30));
        buffer.store(99, Rgb::WHITE);
        assert_eq!(buffer.get(1), Some(Rgb::new(10, 20, 30)));
        assert_eq!(buffer.get(99), None);
        assert_eq!(buffer.snapshot().len(), 3);
    }

    #[test]
    fn test_display_color_highlights_tags() {
        let mut state = CellState::binary(true);
        assert_eq!(display_color(&Majority, &state), Rgb::BLACK);
        state.set_tag(TagOwner(1));
        assert_eq!(display_color(&Majority, &state), Rgb::HIGHLIGHT);
    }

    #[test]
    fn test_averaged_paint() {
        let rule = Cyclic::new(5, 1).unwrap();
        let state = |v| CellState::integer(v, 5).unwrap();
        let cell = Cell::new(Coordinate::new(0, 0), 0, state(0), 4, 1);
        cell.push_state(state(4));
        cell.push_state(state(2));

        // Mean of 0, 4, 2 is 2; mean of 4, 2 is 3
        let averaged = ColorBuffer::new(1).with_averaging(3);
        averaged.paint(&rule, &cell);
        assert_eq!(averaged.get(0), Some(rule.color(&state(2))));

        assert_eq!(cell_color(&rule, &cell, 2), rule.color(&state(3)));
        assert_eq!(cell_color(&rule, &cell, 1), rule.color(&state(2)));

        cell.tag(TagOwner(7));
        assert_eq!(cell_color(&rule, &cell, 3), Rgb::HIGHLIGHT);
    }
}
