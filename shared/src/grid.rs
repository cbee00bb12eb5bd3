//! Static wall/empty tile map and world <-> tile coordinate conversion.

use crate::geometry::{Rect, Vector2};
use thiserror::Error;

/// The arena every server ships with unless given another map.
pub const REFERENCE_MAP: [&str; 16] = [
    "################",
    "#              #",
    "#              #",
    "#  ##########  #",
    "#  #        #  #",
    "#  #        #  #",
    "#  #  ####     #",
    "#        #     #",
    "#        ##  ###",
    "##     ####    #",
    "##     ####    #",
    "##     ######  #",
    "##     ######  #",
    "####           #",
    "####           #",
    "################",
];

const WALL_CHAR: char = '#';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Wall,
    Empty,
}

impl From<char> for Cell {
    fn from(c: char) -> Self {
        if c == WALL_CHAR {
            Cell::Wall
        } else {
            Cell::Empty
        }
    }
}

/// Reasons a map is rejected at load time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("map must have at least one row and one column")]
    Empty,
    #[error("row {row} has {found} cells, expected {expected}")]
    NonRectangular {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Immutable tile map. Only the world-space tile size changes, when the
/// viewport is resized.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    cells: Vec<Cell>,
    width: usize,
    height: usize,
    viewport: Vector2,
    tile_size: Vector2,
}

impl TileGrid {
    /// Parses rows of text where `'#'` marks a wall and anything else is open floor.
    pub fn from_rows<S: AsRef<str>>(rows: &[S], viewport: Vector2) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().chars().count()).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(GridError::Empty);
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row, line) in rows.iter().enumerate() {
            let before = cells.len();
            cells.extend(line.as_ref().chars().map(Cell::from));
            let found = cells.len() - before;
            if found != width {
                return Err(GridError::NonRectangular {
                    row,
                    expected: width,
                    found,
                });
            }
        }

        let mut grid = TileGrid {
            cells,
            width,
            height,
            viewport,
            tile_size: Vector2::ZERO,
        };
        grid.resize(viewport);
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> Vector2 {
        self.tile_size
    }

    pub fn viewport(&self) -> Vector2 {
        self.viewport
    }

    /// Recomputes the world-space tile size for a new viewport.
    pub fn resize(&mut self, viewport: Vector2) {
        self.viewport = viewport;
        self.tile_size = Vector2::new(
            viewport.x / self.width as f32,
            viewport.y / self.height as f32,
        );
    }

    fn in_bounds(&self, tx: i32, ty: i32) -> bool {
        tx >= 0 && ty >= 0 && (tx as usize) < self.width && (ty as usize) < self.height
    }

    /// Cell kind at a tile coordinate; anything off the map reads as `Empty`.
    pub fn cell_at(&self, tx: i32, ty: i32) -> Cell {
        if self.in_bounds(tx, ty) {
            self.cells[ty as usize * self.width + tx as usize]
        } else {
            Cell::Empty
        }
    }

    pub fn is_wall(&self, tx: i32, ty: i32) -> bool {
        self.cell_at(tx, ty) == Cell::Wall
    }

    /// Tile containing a world point. Truncates toward zero, so points just
    /// left of or above the map still land on row/column 0.
    pub fn world_to_tile(&self, point: Vector2) -> (i32, i32) {
        (
            (point.x / self.tile_size.x) as i32,
            (point.y / self.tile_size.y) as i32,
        )
    }

    /// World-space rectangle covered by a tile.
    pub fn tile_rect(&self, tx: i32, ty: i32) -> Rect {
        let left = tx as f32 * self.tile_size.x;
        let top = ty as f32 * self.tile_size.y;
        Rect::new(left, left + self.tile_size.x, top, top + self.tile_size.y)
    }

    /// The visible region: the whole map in world space.
    pub fn world_bounds(&self) -> Rect {
        Rect::new(0.0, self.viewport.x, 0.0, self.viewport.y)
    }

    /// Wall tiles in `[center - radius, center + radius + 1)` on both axes,
    /// clamped to the map.
    pub fn neighborhood(
        &self,
        center_x: i32,
        center_y: i32,
        radius: i32,
    ) -> impl Iterator<Item = (i32, i32)> + '_ {
        let x_lower = (center_x - radius).max(0);
        let x_upper = (center_x + radius + 1).min(self.width as i32);
        let y_lower = (center_y - radius).max(0);
        let y_upper = (center_y + radius + 1).min(self.height as i32);

        (y_lower..y_upper)
            .flat_map(move |y| (x_lower..x_upper).map(move |x| (x, y)))
            .filter(move |&(x, y)| self.is_wall(x, y))
    }

    /// Every wall tile on the map, row by row.
    pub fn walls(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == Cell::Wall)
            .map(move |(i, _)| ((i % self.width) as i32, (i / self.width) as i32))
    }

    pub fn wall_rects(&self) -> impl Iterator<Item = Rect> + '_ {
        self.walls().map(move |(x, y)| self.tile_rect(x, y))
    }

    /// Renders the map back into the text form it was parsed from.
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width)
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Cell::Wall => WALL_CHAR,
                        Cell::Empty => ' ',
                    })
                    .collect()
            })
            .collect()
    }
}
