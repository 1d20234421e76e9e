//! Board module - manages the game grid
//!
//! The board is a 10x21 grid: one hidden deadline row (y = 0) above twenty
//! visible rows (y = 1..=20). Uses a flat array for cache locality and no
//! allocation. Coordinates: x grows to the right, y grows downward. Cells
//! with y < 0 are open space above the board; pieces may pass through them
//! but can never lock there.

use arrayvec::ArrayVec;

use crate::catalog::Piece;
use crate::types::{
    Cell, BOARD_CELLS, BOARD_HEIGHT, BOARD_WIDTH, EMPTY_CELL, GARBAGE_CELL, SOLID_CELL,
};

const WIDTH: usize = BOARD_WIDTH as usize;
const HEIGHT: usize = BOARD_HEIGHT as usize;
/// Width of the well checked by [`Board::four_wide_well`].
const FOUR_WIDE: usize = 4;

/// Row indices cleared by one lock, top to bottom.
pub type ClearedRows = ArrayVec<u8, HEIGHT>;

/// Result of writing a piece into the board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockOutcome {
    pub cleared: ClearedRows,
    /// A mino ended above the deadline row.
    pub topped_out: bool,
    /// Cleared rows that held garbage.
    pub garbage_rows: u8,
}

/// Garbage rows to push in from the bottom, one hole column per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GarbageRows<'a> {
    /// Leftmost gap column for each inserted row, top row first.
    pub holes: &'a [u8],
    /// Gap width in columns.
    pub width: u8,
    /// Inverted garbage fills only the gap and leaves the rest empty.
    pub invert: bool,
}

/// The game board - 10 columns x 21 rows using flat array storage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    /// Flat array of cells, row-major order (y * WIDTH + x)
    cells: [Cell; BOARD_CELLS],
}

impl Board {
    /// Create a new empty board
    pub fn new() -> Self {
        Self {
            cells: [EMPTY_CELL; BOARD_CELLS],
        }
    }

    pub fn from_cells(cells: [Cell; BOARD_CELLS]) -> Self {
        Self { cells }
    }

    /// Calculate flat index from (x, y) coordinates
    #[inline(always)]
    pub fn index(x: i8, y: i8) -> Option<usize> {
        if x < 0 || x >= BOARD_WIDTH as i8 || y < 0 || y >= BOARD_HEIGHT as i8 {
            return None;
        }
        Some((y as usize) * WIDTH + (x as usize))
    }

    /// Get cell at position (x, y)
    /// Returns None if out of bounds
    pub fn get(&self, x: i8, y: i8) -> Option<Cell> {
        Self::index(x, y).map(|idx| self.cells[idx])
    }

    /// Set cell at position (x, y)
    /// Returns false if out of bounds
    pub fn set(&mut self, x: i8, y: i8, cell: Cell) -> bool {
        match Self::index(x, y) {
            Some(idx) => {
                self.cells[idx] = cell;
                true
            }
            None => false,
        }
    }

    /// Check if position is occupied (within bounds and filled)
    pub fn is_occupied(&self, x: i8, y: i8) -> bool {
        matches!(self.get(x, y), Some(cell) if cell != EMPTY_CELL)
    }

    /// A mino may sit at (x, y): inside the walls, above the floor, and
    /// either above the board or on an empty cell.
    pub fn is_free(&self, x: i8, y: i8) -> bool {
        if x < 0 || x >= BOARD_WIDTH as i8 || y >= BOARD_HEIGHT as i8 {
            return false;
        }
        y < 0 || !self.is_occupied(x, y)
    }

    /// Corner probe used by spin checks: walls and floor count as filled.
    pub fn is_blocked(&self, x: i8, y: i8) -> bool {
        !self.is_free(x, y)
    }

    pub fn collides(&self, piece: &Piece) -> bool {
        piece.cells().any(|(x, y)| !self.is_free(x, y))
    }

    pub fn row(&self, y: usize) -> &[Cell] {
        &self.cells[y * WIDTH..(y + 1) * WIDTH]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks_exact(WIDTH)
    }

    /// Get a reference to the internal cells array
    pub fn cells(&self) -> &[Cell; BOARD_CELLS] {
        &self.cells
    }

    /// Full rows clear unless they contain solid garbage.
    pub fn is_row_full(&self, y: usize) -> bool {
        if y >= HEIGHT {
            return false;
        }
        self.row(y)
            .iter()
            .all(|&cell| cell != EMPTY_CELL && cell != SOLID_CELL)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&cell| cell == EMPTY_CELL)
    }

    /// Write a piece and clear full rows.
    ///
    /// Minos above the board are dropped and reported as `topped_out`; the
    /// board never grows. Nothing is cleared when `clear_lines` is false.
    pub fn lock(&mut self, piece: &Piece, clear_lines: bool) -> LockOutcome {
        let color = piece.def().color;
        let mut outcome = LockOutcome::default();
        for (x, y) in piece.cells() {
            if y < 0 {
                outcome.topped_out = true;
            } else {
                self.set(x, y, color);
            }
        }
        if clear_lines {
            outcome.garbage_rows = (0..HEIGHT)
                .filter(|&y| self.is_row_full(y) && self.row(y).contains(&GARBAGE_CELL))
                .count() as u8;
            outcome.cleared = self.clear_full_rows();
        }
        outcome
    }

    /// Clear all full rows and return their indices (top to bottom)
    /// Uses a two-pointer algorithm with zero-allocation
    pub fn clear_full_rows(&mut self) -> ClearedRows {
        let mut cleared_rows = ClearedRows::new();
        let mut write_y = HEIGHT;

        // Scan from bottom to top
        for read_y in (0..HEIGHT).rev() {
            if self.is_row_full(read_y) {
                cleared_rows.push(read_y as u8);
            } else {
                write_y -= 1;
                if write_y != read_y {
                    self.cells
                        .copy_within(read_y * WIDTH..(read_y + 1) * WIDTH, write_y * WIDTH);
                }
            }
        }

        // Clear the remaining rows at the top
        self.cells[..write_y * WIDTH].fill(EMPTY_CELL);

        cleared_rows.reverse();
        cleared_rows
    }

    /// Shift the stack up by `n` rows; returns true if filled cells were
    /// pushed off the top.
    fn shift_up(&mut self, n: usize) -> bool {
        let n = n.min(HEIGHT);
        let overflow = self.cells[..n * WIDTH].iter().any(|&c| c != EMPTY_CELL);
        self.cells.copy_within(n * WIDTH.., 0);
        overflow
    }

    /// Insert garbage rows at the bottom, one gap per row.
    ///
    /// Returns true when the existing stack was pushed out of the board.
    pub fn insert_garbage(&mut self, rows: GarbageRows<'_>) -> bool {
        // Garbage always lands on top of the solid floor.
        let solid = self.solid_height() as usize;
        let n = rows.holes.len().min(HEIGHT - solid);
        if n == 0 {
            return false;
        }
        let topped_out = self.shift_up(n);
        if solid > 0 {
            self.cells.copy_within(
                (HEIGHT - solid - n) * WIDTH..(HEIGHT - n) * WIDTH,
                (HEIGHT - solid) * WIDTH,
            );
        }
        let first = HEIGHT - solid - n;
        let holes = &rows.holes[rows.holes.len() - n..];
        for (i, &hole) in holes.iter().enumerate() {
            let y = first + i;
            for x in 0..WIDTH {
                let in_gap = x >= hole as usize && x < hole as usize + rows.width as usize;
                self.cells[y * WIDTH + x] = if in_gap != rows.invert {
                    EMPTY_CELL
                } else {
                    GARBAGE_CELL
                };
            }
        }
        topped_out
    }

    /// Raise `n` unclearable solid rows from the floor.
    pub fn insert_solid(&mut self, n: u8) -> bool {
        let n = (n as usize).min(HEIGHT);
        if n == 0 {
            return false;
        }
        let topped_out = self.shift_up(n);
        self.cells[(HEIGHT - n) * WIDTH..].fill(SOLID_CELL);
        topped_out
    }

    /// Number of solid rows at the bottom of the board.
    pub fn solid_height(&self) -> u8 {
        (0..HEIGHT)
            .rev()
            .take_while(|&y| self.row(y).iter().all(|&c| c == SOLID_CELL))
            .count() as u8
    }

    /// Rows above the solid floor containing garbage, counted from the bottom.
    pub fn garbage_height(&self) -> u8 {
        let solid = self.solid_height() as usize;
        (0..HEIGHT - solid)
            .rev()
            .take_while(|&y| self.row(y).contains(&GARBAGE_CELL))
            .count() as u8
    }

    /// Four-wide well check.
    ///
    /// Looks at row `y` and the non-empty rows stacked on it. Returns the
    /// well's first column when every one of them keeps the cells outside
    /// the same four columns filled, and at least one leaves exactly those
    /// four columns empty.
    pub fn four_wide_well(&self, y: usize) -> Option<u8> {
        if y >= HEIGHT {
            return None;
        }
        let mut walled = u8::MAX;
        let mut open = 0u8;
        let stack = (0..=y)
            .rev()
            .map(|r| self.row(r))
            .take_while(|row| row.iter().any(|&c| c != EMPTY_CELL));
        for row in stack {
            walled &= walled_windows(row);
            if let Some(start) = open_window(row) {
                open |= 1 << start;
            }
        }
        let wells = walled & open;
        (wells != 0).then(|| wells.trailing_zeros() as u8)
    }

    pub fn is_4w(&self, y: usize) -> bool {
        self.four_wide_well(y).is_some()
    }

    /// Apply direct cell edits `(flat index, value)`; out-of-range indices
    /// are ignored.
    pub fn apply_mods(&mut self, changes: &[(u8, u8)]) {
        for &(index, cell) in changes {
            if let Some(slot) = self.cells.get_mut(index as usize) {
                *slot = cell;
            }
        }
    }

    /// Clear the entire board
    pub fn clear(&mut self) {
        self.cells.fill(EMPTY_CELL);
    }

    /// Build from rows of text for tests: `#` filled, `.` empty, bottom-aligned.
    #[cfg(test)]
    pub fn from_ascii(rows: &[&str]) -> Self {
        let mut board = Self::new();
        let first = HEIGHT - rows.len();
        for (i, row) in rows.iter().enumerate() {
            for (x, ch) in row.bytes().enumerate() {
                let cell = match ch {
                    b'#' => GARBAGE_CELL,
                    b'S' => SOLID_CELL,
                    _ => EMPTY_CELL,
                };
                board.set(x as i8, (first + i) as i8, cell);
            }
        }
        board
    }
}

/// Bit `w` is set when every cell of `row` outside columns `w..w + 4` is
/// filled and at least one inside is empty.
fn walled_windows(row: &[Cell]) -> u8 {
    (0..=WIDTH - FOUR_WIDE)
        .filter(|&start| {
            let window = start..start + FOUR_WIDE;
            let walls = row
                .iter()
                .enumerate()
                .filter(|(x, _)| !window.contains(x))
                .all(|(_, &c)| c != EMPTY_CELL);
            walls && row[window].contains(&EMPTY_CELL)
        })
        .fold(0, |mask, start| mask | 1 << start)
}

/// First column of the only run of empty cells, when it is four wide.
fn open_window(row: &[Cell]) -> Option<usize> {
    let empties: ArrayVec<usize, WIDTH> = row
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == EMPTY_CELL)
        .map(|(x, _)| x)
        .collect();
    (empties.len() == FOUR_WIDE && empties[FOUR_WIDE - 1] - empties[0] == FOUR_WIDE - 1)
        .then(|| empties[0])
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use crate::types::{PieceKind, PieceRef, Rotation};

    fn spawn(kind: PieceKind) -> Piece {
        catalog().spawn(PieceRef::standard(kind)).unwrap()
    }

    #[test]
    fn test_board_index_calculation() {
        assert_eq!(Board::index(0, 0), Some(0));
        assert_eq!(Board::index(9, 0), Some(9));
        assert_eq!(Board::index(0, 1), Some(10));
        assert_eq!(Board::index(9, 20), Some(209));
        assert_eq!(Board::index(-1, 0), None);
        assert_eq!(Board::index(10, 0), None);
        assert_eq!(Board::index(0, 21), None);
    }

    #[test]
    fn cells_above_board_are_free() {
        let board = Board::new();
        assert!(board.is_free(4, -3));
        assert!(!board.is_free(-1, 5));
        assert!(!board.is_free(10, 5));
        assert!(!board.is_free(4, 21));
    }

    #[test]
    fn collides_with_stack_and_walls() {
        let mut board = Board::new();
        let piece = spawn(PieceKind::T);
        assert!(!board.collides(&piece));
        board.set(4, 1, GARBAGE_CELL);
        assert!(board.collides(&piece));
        assert!(Board::new().collides(&piece.moved(-4, 0)));
    }

    #[test]
    fn lock_clears_and_compacts() {
        let mut board = Board::from_ascii(&["#########.", "####.#####"]);
        let mut piece = spawn(PieceKind::I);
        piece.rotation = Rotation::East;
        // Vertical I in column 9, bottom mino on row 19.
        piece.x = 7;
        piece.y = 16;
        assert!(!board.collides(&piece));
        let outcome = board.lock(&piece, true);
        assert_eq!(outcome.cleared.as_slice(), &[19]);
        assert_eq!(outcome.garbage_rows, 1);
        assert!(!outcome.topped_out);
        assert_eq!(board.row(20), &[8, 8, 8, 8, 0, 8, 8, 8, 8, 8]);
        assert_eq!(board.row(19)[9], 5);
        assert_eq!(board.row(17)[9], 5);
        assert_eq!(board.row(16)[9], 0);
    }

    #[test]
    fn lock_without_clearing() {
        let mut board = Board::from_ascii(&["#########."]);
        let mut piece = spawn(PieceKind::I);
        piece.rotation = Rotation::East;
        piece.x = 7;
        piece.y = 17;
        let outcome = board.lock(&piece, false);
        assert!(outcome.cleared.is_empty());
        assert!(board.row(20).iter().all(|&c| c != EMPTY_CELL));
    }

    #[test]
    fn lock_above_deadline_tops_out() {
        let mut board = Board::new();
        let piece = spawn(PieceKind::T).moved(0, -1);
        let outcome = board.lock(&piece, true);
        assert!(outcome.topped_out);
    }

    #[test]
    fn garbage_insertion_shifts_stack_up() {
        let mut board = Board::new();
        board.set(0, 20, 7);
        let topped = board.insert_garbage(GarbageRows {
            holes: &[3, 3],
            width: 1,
            invert: false,
        });
        assert!(!topped);
        assert_eq!(board.row(18)[0], 7);
        assert_eq!(board.row(19), &[8, 8, 8, 0, 8, 8, 8, 8, 8, 8]);
        assert_eq!(board.row(20), &[8, 8, 8, 0, 8, 8, 8, 8, 8, 8]);
        assert_eq!(board.garbage_height(), 2);
    }

    #[test]
    fn wide_and_inverted_garbage() {
        let mut board = Board::new();
        board.insert_garbage(GarbageRows {
            holes: &[2],
            width: 3,
            invert: true,
        });
        assert_eq!(board.row(20), &[0, 0, 8, 8, 8, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn garbage_pushing_stack_out_tops_out() {
        let mut board = Board::new();
        board.set(0, 0, 3);
        assert!(board.insert_garbage(GarbageRows {
            holes: &[0],
            width: 1,
            invert: false,
        }));
    }

    #[test]
    fn solid_rows_never_clear_and_stay_below_garbage() {
        let mut board = Board::new();
        assert!(!board.insert_solid(1));
        assert!(!board.is_row_full(20));
        assert_eq!(board.solid_height(), 1);
        board.insert_garbage(GarbageRows {
            holes: &[5],
            width: 1,
            invert: false,
        });
        assert_eq!(board.solid_height(), 1);
        assert_eq!(board.row(19)[5], EMPTY_CELL);
        assert_eq!(board.garbage_height(), 1);
        assert!(board.clear_full_rows().is_empty());
    }

    #[test]
    fn four_wide_detection() {
        let board = Board::from_ascii(&["###....###", "###....###"]);
        assert_eq!(board.four_wide_well(20), Some(3));
        assert!(board.is_4w(19));
        let shifted = Board::from_ascii(&["##....####", "###....###"]);
        assert!(!shifted.is_4w(20));
        let three = Board::from_ascii(&["###...####"]);
        assert!(!three.is_4w(20));
        assert!(!Board::new().is_4w(20));
    }

    #[test]
    fn residue_rows_count_toward_the_well_below_an_open_row() {
        let board = Board::from_ascii(&["###....###", "###..#.###", "###.######"]);
        assert_eq!(board.four_wide_well(20), Some(3));
        assert_eq!(board.four_wide_well(19), Some(3));
        // A one-wide well never opens to four columns.
        let single = Board::from_ascii(&["#########.", "#########."]);
        assert!(!single.is_4w(20));
        // Walls that stop short of the open row do not make a well.
        let capped = Board::from_ascii(&["....###...", "###....###", "###.######"]);
        assert!(!capped.is_4w(20));
    }

    #[test]
    fn matrix_mods_ignore_out_of_range() {
        let mut board = Board::new();
        board.apply_mods(&[(0, 3), (209, 8), (250, 1)]);
        assert_eq!(board.get(0, 0), Some(3));
        assert_eq!(board.get(9, 20), Some(8));
    }
}
