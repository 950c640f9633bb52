//! Board State and Move Rules
//!
//! The 4×4 grid, the tile-spawn rule, directional moves with merge scoring,
//! and terminal-state detection. Every transition returns a new `Board`.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::core::hash::{commit, Commitment};
use crate::core::rng::DeterministicRng;

/// Board edge length.
pub const BOARD_SIZE: usize = 4;

/// Tile value that counts as a win.
pub const WIN_TILE: u32 = 2048;

/// Largest tile reachable on a 4×4 board (a 4 spawned into every cell, all merged).
pub const MAX_TILE: u32 = 1 << 17;

/// Spawned tiles are a 2 with probability `SPAWN_TWO_CHANCE / SPAWN_CHANCE_DENOMINATOR`,
/// otherwise a 4.
pub const SPAWN_TWO_CHANCE: u32 = 9;
/// Denominator for the spawn chance.
pub const SPAWN_CHANCE_DENOMINATOR: u32 = 10;

/// Cells stored row-major: `rows[row][col]`.
pub type Rows = [[u32; BOARD_SIZE]; BOARD_SIZE];

// =============================================================================
// DIRECTION
// =============================================================================

/// Move direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward row 0.
    Up,
    /// Toward row 3.
    Down,
    /// Toward column 0.
    Left,
    /// Toward column 3.
    Right,
}

impl Direction {
    /// All four directions.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Lowercase name, as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(BoardError::UnknownDirection(other.to_string())),
        }
    }
}

/// Board construction and parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// Cell value is neither empty nor a power of two in `2..=MAX_TILE`.
    #[error("invalid tile {value} at ({row}, {col})")]
    InvalidTile {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
        /// Offending value.
        value: u32,
    },

    /// Direction name not recognised.
    #[error("unknown direction: {0}")]
    UnknownDirection(String),
}

// =============================================================================
// BOARD
// =============================================================================

/// Result of a single move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Board after sliding, merging and (if moved) spawning.
    pub board: Board,
    /// Whether any cell changed during the slide.
    pub moved: bool,
    /// Sum of every merge result produced by the move.
    pub score_delta: u32,
}

/// A 4×4 grid of tiles; 0 is empty.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Board(Rows);

impl Board {
    /// The all-empty board.
    pub const EMPTY: Board = Board([[0; BOARD_SIZE]; BOARD_SIZE]);

    /// Fresh game board: empty, then two spawned tiles.
    pub fn initialize(rng: &mut DeterministicRng) -> Self {
        Self::EMPTY.spawn_tile(rng).spawn_tile(rng)
    }

    /// Build a board from rows, validating every cell.
    pub fn from_rows(rows: Rows) -> Result<Self, BoardError> {
        for (row, cells) in rows.iter().enumerate() {
            for (col, &value) in cells.iter().enumerate() {
                if value != 0 && (value < 2 || value > MAX_TILE || !value.is_power_of_two()) {
                    return Err(BoardError::InvalidTile { row, col, value });
                }
            }
        }
        Ok(Self(rows))
    }

    /// Borrow the rows.
    pub fn rows(&self) -> &Rows {
        &self.0
    }

    /// Every cell value, row-major.
    pub fn cells(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().flatten().copied()
    }

    /// Tile at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.0[row][col]
    }

    /// Coordinates of every empty cell, row-major.
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::with_capacity(BOARD_SIZE * BOARD_SIZE);
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                if self.0[row][col] == 0 {
                    cells.push((row, col));
                }
            }
        }
        cells
    }

    /// Number of occupied cells.
    pub fn tile_count(&self) -> usize {
        self.cells().filter(|&v| v != 0).count()
    }

    /// Largest tile on the board.
    pub fn max_tile(&self) -> u32 {
        self.cells().max().unwrap_or(0)
    }

    /// Place a 2 (90%) or 4 (10%) on a uniformly chosen empty cell.
    ///
    /// Returns the board unchanged when it is full.
    pub fn spawn_tile(&self, rng: &mut DeterministicRng) -> Board {
        let empty = self.empty_cells();
        let Some(&(row, col)) = rng.choose(&empty) else {
            return *self;
        };

        let value = if rng.next_chance(SPAWN_TWO_CHANCE, SPAWN_CHANCE_DENOMINATOR) {
            2
        } else {
            4
        };

        let mut next = *self;
        next.0[row][col] = value;
        next
    }

    /// Slide and merge without spawning.
    ///
    /// Returns `(board, moved, score_delta)`.
    pub fn slide(&self, direction: Direction) -> (Board, bool, u32) {
        let mut next = *self;
        let mut score_delta = 0u32;

        for i in 0..BOARD_SIZE {
            let line = self.read_line(direction, i);
            let (collapsed, delta) = collapse_line(line);
            next.write_line(direction, i, collapsed);
            score_delta = score_delta.saturating_add(delta);
        }

        let moved = next != *self;
        (next, moved, score_delta)
    }

    /// Apply one player move.
    ///
    /// A tile is spawned if and only if the slide changed the board.
    pub fn apply_move(&self, direction: Direction, rng: &mut DeterministicRng) -> MoveOutcome {
        let (slid, moved, score_delta) = self.slide(direction);
        let board = if moved { slid.spawn_tile(rng) } else { slid };

        MoveOutcome {
            board,
            moved,
            score_delta,
        }
    }

    /// True if any cell is empty or any orthogonal neighbours are equal.
    pub fn can_move(&self) -> bool {
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let current = self.0[row][col];
                if current == 0 {
                    return true;
                }
                if row + 1 < BOARD_SIZE && self.0[row + 1][col] == current {
                    return true;
                }
                if col + 1 < BOARD_SIZE && self.0[row][col + 1] == current {
                    return true;
                }
            }
        }
        false
    }

    /// True once a 2048 tile exists. Play may continue past it.
    pub fn has_won(&self) -> bool {
        self.cells().any(|v| v == WIN_TILE)
    }

    /// Canonical serialization: JSON rows, no whitespace.
    ///
    /// `[[0,2,0,0],[0,0,0,0],[0,0,4,0],[0,0,0,0]]`
    pub fn canonical_json(&self) -> String {
        let rows: Vec<String> = self
            .0
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(u32::to_string).collect();
                format!("[{}]", cells.join(","))
            })
            .collect();
        format!("[{}]", rows.join(","))
    }

    /// Ledger commitment of this board.
    pub fn commitment(&self) -> Commitment {
        commit(self.canonical_json().as_bytes())
    }

    /// Read line `i` ordered from the leading edge of `direction`.
    fn read_line(&self, direction: Direction, i: usize) -> [u32; BOARD_SIZE] {
        let mut line = [0; BOARD_SIZE];
        for (k, slot) in line.iter_mut().enumerate() {
            let (row, col) = line_coords(direction, i, k);
            *slot = self.0[row][col];
        }
        line
    }

    /// Write line `i`, ordered from the leading edge of `direction`.
    fn write_line(&mut self, direction: Direction, i: usize, line: [u32; BOARD_SIZE]) {
        for (k, value) in line.into_iter().enumerate() {
            let (row, col) = line_coords(direction, i, k);
            self.0[row][col] = value;
        }
    }
}

impl From<Board> for Rows {
    fn from(board: Board) -> Self {
        board.0
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.canonical_json())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for (j, &value) in row.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                if value == 0 {
                    write!(f, "{:>5}", ".")?;
                } else {
                    write!(f, "{:>5}", value)?;
                }
            }
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Rows::deserialize(deserializer)?;
        Board::from_rows(rows).map_err(serde::de::Error::custom)
    }
}

/// Commitment recorded on the ledger for `board`.
pub fn board_commitment(board: &Board) -> Commitment {
    board.commitment()
}

/// Map (line index, position from leading edge) to board coordinates.
#[inline]
fn line_coords(direction: Direction, i: usize, k: usize) -> (usize, usize) {
    let last = BOARD_SIZE - 1;
    match direction {
        Direction::Left => (i, k),
        Direction::Right => (i, last - k),
        Direction::Up => (k, i),
        Direction::Down => (last - k, i),
    }
}

/// Collapse a line toward index 0.
///
/// Empties are dropped, then one pass from the leading edge merges each tile
/// with an equal neighbour. A merged tile is not merged again this move.
/// A pair whose sum would not fit in a `u32` stays unmerged.
/// Returns the padded line and the sum of merge results.
pub fn collapse_line(line: [u32; BOARD_SIZE]) -> ([u32; BOARD_SIZE], u32) {
    let tiles: Vec<u32> = line.into_iter().filter(|&v| v != 0).collect();
    let mut out = [0; BOARD_SIZE];
    let mut score = 0u32;
    let mut write = 0;
    let mut read = 0;

    while read < tiles.len() {
        let merged = match tiles.get(read + 1) {
            Some(&next) if next == tiles[read] => tiles[read].checked_mul(2),
            _ => None,
        };
        if let Some(merged) = merged {
            out[write] = merged;
            score = score.saturating_add(merged);
            read += 2;
        } else {
            out[write] = tiles[read];
            read += 1;
        }
        write += 1;
    }

    (out, score)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn board(rows: Rows) -> Board {
        Board::from_rows(rows).unwrap()
    }

    #[test]
    fn test_collapse_three_equal_merges_first_pair() {
        assert_eq!(collapse_line([2, 2, 2, 0]), ([4, 2, 0, 0], 4));
    }

    #[test]
    fn test_collapse_two_pairs() {
        assert_eq!(collapse_line([2, 2, 4, 4]), ([4, 8, 0, 0], 12));
        assert_eq!(collapse_line([4, 4, 4, 4]), ([8, 8, 0, 0], 16));
    }

    #[test]
    fn test_collapse_no_chain_merge() {
        // 4 from 2+2 must not merge with the existing 4 in the same move
        assert_eq!(collapse_line([2, 2, 4, 0]), ([4, 4, 0, 0], 4));
    }

    #[test]
    fn test_collapse_gaps() {
        assert_eq!(collapse_line([0, 2, 0, 2]), ([4, 0, 0, 0], 4));
        assert_eq!(collapse_line([0, 0, 0, 8]), ([8, 0, 0, 0], 0));
    }

    #[test]
    fn test_slide_left_row() {
        let b = board([[2, 2, 2, 0], [0; 4], [0; 4], [0; 4]]);
        let (next, moved, delta) = b.slide(Direction::Left);

        assert!(moved);
        assert_eq!(delta, 4);
        assert_eq!(next.rows()[0], [4, 2, 0, 0]);
    }

    #[test]
    fn test_slide_right_pads_leading_side() {
        let b = board([[2, 2, 2, 0], [0; 4], [0; 4], [0; 4]]);
        let (next, moved, delta) = b.slide(Direction::Right);

        assert!(moved);
        assert_eq!(delta, 4);
        assert_eq!(next.rows()[0], [0, 0, 2, 4]);
    }

    #[test]
    fn test_slide_columns() {
        let b = board([
            [2, 0, 0, 0],
            [2, 0, 0, 0],
            [4, 0, 0, 0],
            [0, 0, 0, 0],
        ]);

        let (up, moved, delta) = b.slide(Direction::Up);
        assert!(moved);
        assert_eq!(delta, 4);
        assert_eq!([up.get(0, 0), up.get(1, 0), up.get(2, 0), up.get(3, 0)], [4, 4, 0, 0]);

        let (down, moved, delta) = b.slide(Direction::Down);
        assert!(moved);
        assert_eq!(delta, 4);
        assert_eq!([down.get(0, 0), down.get(1, 0), down.get(2, 0), down.get(3, 0)], [0, 0, 4, 4]);
    }

    #[test]
    fn test_apply_move_spawns_one_tile_when_moved() {
        let mut rng = DeterministicRng::new(7);
        let b = board([[2, 2, 2, 0], [0; 4], [0; 4], [0; 4]]);

        let outcome = b.apply_move(Direction::Left, &mut rng);
        assert!(outcome.moved);
        assert_eq!(outcome.score_delta, 4);
        // [4, 2] plus one spawned tile
        assert_eq!(outcome.board.tile_count(), 3);
        assert_eq!(outcome.board.rows()[0][0], 4);
    }

    #[test]
    fn test_empty_board_never_moves() {
        let mut rng = DeterministicRng::new(1);
        for direction in Direction::ALL {
            let outcome = Board::EMPTY.apply_move(direction, &mut rng);
            assert!(!outcome.moved);
            assert_eq!(outcome.score_delta, 0);
            assert_eq!(outcome.board, Board::EMPTY);
        }
    }

    #[test]
    fn test_blocked_move_does_not_spawn_or_score() {
        let mut rng = DeterministicRng::new(3);
        let b = board([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let before = rng.clone();

        let outcome = b.apply_move(Direction::Left, &mut rng);
        assert!(!outcome.moved);
        assert_eq!(outcome.score_delta, 0);
        assert_eq!(outcome.board, b);
        // No randomness consumed either
        assert_eq!(rng, before);
    }

    #[test]
    fn test_can_move() {
        assert!(Board::EMPTY.can_move());

        let stuck = board([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 2],
        ]);
        assert!(!stuck.can_move());
        let mut rng = DeterministicRng::new(11);
        for direction in Direction::ALL {
            let (slid, moved, delta) = stuck.slide(direction);
            assert!(!moved, "{} moved a stuck board", direction);
            assert_eq!((slid, delta), (stuck, 0));
            assert!(!stuck.apply_move(direction, &mut rng).moved);
        }

        let horizontal = board([
            [2, 2, 2, 4],
            [4, 8, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 2],
        ]);
        assert!(horizontal.can_move());

        let vertical = board([
            [2, 4, 2, 4],
            [4, 8, 4, 2],
            [2, 8, 2, 4],
            [4, 2, 4, 2],
        ]);
        assert!(vertical.can_move());
    }

    #[test]
    fn test_has_won() {
        assert!(!Board::EMPTY.has_won());
        let b = board([[2048, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert!(b.has_won());
        assert_eq!(b.max_tile(), 2048);
    }

    #[test]
    fn test_from_rows_rejects_invalid_tiles() {
        assert_eq!(
            Board::from_rows([[0, 3, 0, 0], [0; 4], [0; 4], [0; 4]]),
            Err(BoardError::InvalidTile { row: 0, col: 1, value: 3 })
        );
        assert!(matches!(
            Board::from_rows([[0; 4], [0; 4], [0; 4], [0, 0, 0, 1]]),
            Err(BoardError::InvalidTile { value: 1, .. })
        ));
    }

    #[test]
    fn test_from_rows_caps_tile_size() {
        assert!(Board::from_rows([[MAX_TILE, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).is_ok());
        assert_eq!(
            Board::from_rows([[1 << 31, 1 << 31, 0, 0], [0; 4], [0; 4], [0; 4]]),
            Err(BoardError::InvalidTile { row: 0, col: 0, value: 1 << 31 })
        );
        assert!(matches!(
            Board::from_rows([[0; 4], [0, 0, MAX_TILE * 2, 0], [0; 4], [0; 4]]),
            Err(BoardError::InvalidTile { row: 1, col: 2, .. })
        ));
    }

    #[test]
    fn test_collapse_leaves_overflowing_pair() {
        let top = 1u32 << 31;
        assert_eq!(collapse_line([top, top, 0, 0]), ([top, top, 0, 0], 0));
        assert_eq!(collapse_line([top, top, 2, 2]), ([top, top, 4, 0], 4));
    }

    #[test]
    fn test_deserialize_validates_tiles() {
        let b: Board = serde_json::from_str("[[0,2,0,0],[0,0,0,0],[0,0,4,0],[0,0,0,0]]").unwrap();
        assert_eq!(b.get(2, 2), 4);

        assert!(serde_json::from_str::<Board>("[[0,3,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]]").is_err());
        assert!(serde_json::from_str::<Board>("[[2147483648,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]]").is_err());
    }

    #[test]
    fn test_canonical_json_matches_serde() {
        let b = board([[0, 2, 0, 0], [0; 4], [0, 0, 4, 0], [0; 4]]);
        let canonical = b.canonical_json();

        assert_eq!(canonical, "[[0,2,0,0],[0,0,0,0],[0,0,4,0],[0,0,0,0]]");
        assert_eq!(canonical, serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_commitment_known_values() {
        // keccak256 of the canonical JSON, as a browser client computes it
        assert_eq!(
            Board::EMPTY.commitment().to_hex(),
            "0x756ff4a1ca0fa926bd819f0f4185fd51a184bfef35458652f9326445da94b725"
        );
        let b = board([[0, 2, 0, 0], [0; 4], [0, 0, 4, 0], [0; 4]]);
        assert_eq!(
            board_commitment(&b).to_hex(),
            "0x743b7ad388334a62b82a27824cda315becb6336b2bc049cca32469a87d2719ca"
        );
    }

    #[test]
    fn test_commitment_stable_for_equal_boards() {
        let a = board([[2, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 4]]);
        let b = board([[2, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 4]]);
        let c = board([[0, 0, 0, 2], [0; 4], [0; 4], [0, 0, 0, 4]]);

        assert_eq!(a.commitment(), b.commitment());
        assert_ne!(a.commitment(), c.commitment());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("left".parse::<Direction>().unwrap(), Direction::Left);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(serde_json::to_string(&Direction::Down).unwrap(), "\"down\"");
    }

    #[test]
    fn test_display_renders_grid() {
        let b = board([[2, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 2048]]);
        let text = b.to_string();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().last().unwrap().ends_with("2048"));
    }

    fn arb_tile() -> impl Strategy<Value = u32> {
        prop_oneof![Just(0u32), (1u32..=11).prop_map(|exp| 1 << exp)]
    }

    fn arb_board() -> impl Strategy<Value = Board> {
        proptest::array::uniform4(proptest::array::uniform4(arb_tile()))
            .prop_map(|rows| Board::from_rows(rows).unwrap())
    }

    /// Full boards with no equal neighbours: even and odd checkerboard
    /// squares draw from disjoint tile sets.
    fn arb_stuck_board() -> impl Strategy<Value = Board> {
        let even = prop_oneof![Just(2u32), Just(8), Just(32), Just(128), Just(512)];
        let odd = prop_oneof![Just(4u32), Just(16), Just(64), Just(256), Just(1024)];
        (
            proptest::collection::vec(even, BOARD_SIZE * BOARD_SIZE / 2),
            proptest::collection::vec(odd, BOARD_SIZE * BOARD_SIZE / 2),
        )
            .prop_map(|(even, odd)| {
                let mut rows = [[0; BOARD_SIZE]; BOARD_SIZE];
                let (mut e, mut o) = (even.into_iter(), odd.into_iter());
                for (r, row) in rows.iter_mut().enumerate() {
                    for (c, cell) in row.iter_mut().enumerate() {
                        let source = if (r + c) % 2 == 0 { &mut e } else { &mut o };
                        *cell = source.next().unwrap();
                    }
                }
                Board::from_rows(rows).unwrap()
            })
    }

    fn arb_direction() -> impl Strategy<Value = Direction> {
        prop_oneof![
            Just(Direction::Up),
            Just(Direction::Down),
            Just(Direction::Left),
            Just(Direction::Right),
        ]
    }

    proptest! {
        #[test]
        fn prop_initialize_has_two_small_tiles(seed in any::<u64>()) {
            let mut rng = DeterministicRng::new(seed);
            let b = Board::initialize(&mut rng);

            let tiles: Vec<u32> = b.rows().iter().flatten().copied().filter(|&v| v != 0).collect();
            prop_assert_eq!(tiles.len(), 2);
            prop_assert!(tiles.iter().all(|&v| v == 2 || v == 4));
        }

        #[test]
        fn prop_noop_move_stays_noop(b in arb_board(), d in arb_direction(), seed in any::<u64>()) {
            let mut rng = DeterministicRng::new(seed);
            let first = b.apply_move(d, &mut rng);
            if !first.moved {
                prop_assert_eq!(first.board, b);
                let second = first.board.apply_move(d, &mut rng);
                prop_assert!(!second.moved);
                prop_assert_eq!(second.score_delta, 0);
            }
        }

        #[test]
        fn prop_stuck_board_cannot_move(b in arb_stuck_board(), seed in any::<u64>()) {
            prop_assert!(!b.can_move());
            let mut rng = DeterministicRng::new(seed);
            for d in Direction::ALL {
                let (_, moved, delta) = b.slide(d);
                prop_assert!(!moved);
                prop_assert_eq!(delta, 0);
                prop_assert_eq!(b.apply_move(d, &mut rng).board, b);
            }
        }

        #[test]
        fn prop_any_move_implies_can_move(b in arb_board(), d in arb_direction()) {
            let (_, moved, _) = b.slide(d);
            if moved {
                prop_assert!(b.can_move());
            }
        }

        #[test]
        fn prop_slide_preserves_tile_sum(b in arb_board(), d in arb_direction()) {
            let before: u64 = b.rows().iter().flatten().map(|&v| v as u64).sum();
            let (next, _, _) = b.slide(d);
            let after: u64 = next.rows().iter().flatten().map(|&v| v as u64).sum();
            prop_assert_eq!(before, after);
        }

        #[test]
        fn prop_moved_adds_exactly_one_tile_beyond_slide(b in arb_board(), d in arb_direction(), seed in any::<u64>()) {
            let mut rng = DeterministicRng::new(seed);
            let (slid, moved, _) = b.slide(d);
            let outcome = b.apply_move(d, &mut rng);
            if moved {
                prop_assert_eq!(outcome.board.tile_count(), slid.tile_count() + 1);
            } else {
                prop_assert_eq!(outcome.board, b);
            }
        }
    }
}
