//! Piece catalog - piece sets, rotation states and kick tables
//!
//! Every piece is described by its spawn matrix; the other three rotation
//! states are derived by rotating that matrix clockwise inside its bounding
//! box. Kick offsets follow the usual y-up convention and are applied as
//! `(x + dx, y - dy)` on the y-down board.
//! Reference: https://tetris.wiki/SRS

use std::sync::OnceLock;

use crate::types::{
    Cell, PieceKind, PieceRef, PieceSetId, Rotation, RotationDelta, BOARD_WIDTH, HIDDEN_ROWS,
};

/// Offset of a single mino relative to the bounding box origin
pub type MinoOffset = (i8, i8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationSystem {
    /// Single `(0, 0)` candidate
    None,
    Srs,
    Ars,
    Cultris2,
    OSpin,
}

/// Ordered kick candidates keyed by `(from, delta)`.
#[derive(Debug)]
pub struct KickTable {
    pub cw: [&'static [MinoOffset]; 4],
    pub ccw: [&'static [MinoOffset]; 4],
    pub half: [&'static [MinoOffset]; 4],
}

impl KickTable {
    pub fn get(&self, from: Rotation, delta: RotationDelta) -> &'static [MinoOffset] {
        let idx = from.index() as usize;
        match delta {
            RotationDelta::Cw => self.cw[idx],
            RotationDelta::Ccw => self.ccw[idx],
            RotationDelta::Half => self.half[idx],
        }
    }
}

const ZERO: &[MinoOffset] = &[(0, 0)];

static NO_KICKS: KickTable = KickTable {
    cw: [ZERO; 4],
    ccw: [ZERO; 4],
    half: [ZERO; 4],
};

const SRS_HALF: [&[MinoOffset]; 4] = [
    &[(0, 0), (0, 1)],
    &[(0, 0), (1, 0)],
    &[(0, 0), (0, -1)],
    &[(0, 0), (-1, 0)],
];

/// JLSTZ kicks (shared by every non-I piece under SRS)
static SRS_KICKS: KickTable = KickTable {
    cw: [
        // N->E
        &[(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
        // E->S
        &[(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
        // S->W
        &[(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
        // W->N
        &[(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
    ],
    ccw: [
        // N->W
        &[(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
        // E->N
        &[(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
        // S->E
        &[(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
        // W->S
        &[(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
    ],
    half: SRS_HALF,
};

/// I piece kicks (different from JLSTZ)
static SRS_I_KICKS: KickTable = KickTable {
    cw: [
        &[(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)],
        &[(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
        &[(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
        &[(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
    ],
    ccw: [
        &[(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
        &[(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
        &[(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
        &[(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)],
    ],
    half: SRS_HALF,
};

const ARS: &[MinoOffset] = &[(0, 0), (1, 0), (-1, 0)];

static ARS_KICKS: KickTable = KickTable {
    cw: [ARS; 4],
    ccw: [ARS; 4],
    half: [ARS; 4],
};

const C2: &[MinoOffset] = &[
    (0, 0),
    (-1, 0),
    (1, 0),
    (0, -1),
    (-1, -1),
    (1, -1),
    (-2, 0),
    (2, 0),
];

static C2_KICKS: KickTable = KickTable {
    cw: [C2; 4],
    ccw: [C2; 4],
    half: [C2; 4],
};

const OSPIN: &[MinoOffset] = &[
    (0, 0),
    (-1, 0),
    (1, 0),
    (0, -1),
    (-1, -1),
    (1, -1),
    (0, 1),
    (-1, 1),
    (1, 1),
    (-2, 0),
    (2, 0),
    (0, -2),
    (-2, -1),
    (2, -1),
    (0, 2),
    (-1, 2),
];

static OSPIN_KICKS: KickTable = KickTable {
    cw: [OSPIN; 4],
    ccw: [OSPIN; 4],
    half: [OSPIN; 4],
};

/// Cells probed by the all-spin check, in bounding box coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllSpinPoints {
    pub full: [MinoOffset; 2],
    /// I has a primary and an alternative pair; either one matching counts.
    pub mini: Vec<[MinoOffset; 2]>,
}

#[derive(Debug, Clone)]
pub struct PieceDef {
    pub id: u8,
    pub name: &'static str,
    pub color: Cell,
    /// Bounding box edge in cells, after scaling.
    pub size: u8,
    pub rotation_system: RotationSystem,
    pub spawn: (i8, i8),
    kicks: &'static KickTable,
    minos: [Vec<MinoOffset>; 4],
    all_spin: Option<[AllSpinPoints; 4]>,
}

impl PieceDef {
    pub fn minos(&self, rotation: Rotation) -> &[MinoOffset] {
        &self.minos[rotation.index() as usize]
    }

    pub fn kicks(&self, from: Rotation, delta: RotationDelta) -> &'static [MinoOffset] {
        self.kicks.get(from, delta)
    }

    pub fn all_spin(&self, rotation: Rotation) -> Option<&AllSpinPoints> {
        self.all_spin
            .as_ref()
            .map(|points| &points[rotation.index() as usize])
    }

    /// Bounding box grid for a rotation state; filled cells carry the color.
    pub fn bounding_box(&self, rotation: Rotation) -> Vec<Vec<Cell>> {
        let n = self.size as usize;
        let mut grid = vec![vec![0; n]; n];
        for &(x, y) in self.minos(rotation) {
            grid[y as usize][x as usize] = self.color;
        }
        grid
    }
}

#[derive(Debug, Clone)]
pub struct PieceSet {
    pub id: PieceSetId,
    pub name: &'static str,
    /// Columns moved per horizontal step.
    pub step: u8,
    /// Cells per logical mino edge.
    pub scale: u8,
    pieces: Vec<PieceDef>,
}

impl PieceSet {
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn pieces(&self) -> &[PieceDef] {
        &self.pieces
    }

    pub fn get(&self, id: u8) -> Option<&PieceDef> {
        self.pieces.get(id as usize)
    }
}

/// Immutable lookup over every piece set.
#[derive(Debug)]
pub struct PieceCatalog {
    sets: Vec<PieceSet>,
}

/// Shared catalog instance.
pub fn catalog() -> &'static PieceCatalog {
    static CATALOG: OnceLock<PieceCatalog> = OnceLock::new();
    CATALOG.get_or_init(PieceCatalog::build)
}

impl PieceCatalog {
    pub fn set(&self, id: PieceSetId) -> &PieceSet {
        &self.sets[id.id() as usize]
    }

    pub fn get(&self, piece: PieceRef) -> Option<&PieceDef> {
        self.set(piece.set).get(piece.id)
    }

    /// Definition for a piece already known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if the id does not exist in its set.
    pub fn def(&self, piece: PieceRef) -> &PieceDef {
        &self.set(piece.set).pieces[piece.id as usize]
    }

    pub fn bounding_box(&self, piece: PieceRef, rotation: Rotation) -> Option<Vec<Vec<Cell>>> {
        self.get(piece).map(|def| def.bounding_box(rotation))
    }

    pub fn kicks(
        &self,
        piece: PieceRef,
        from: Rotation,
        delta: RotationDelta,
    ) -> Option<&'static [MinoOffset]> {
        self.get(piece).map(|def| def.kicks(from, delta))
    }

    /// New piece at its spawn position, or `None` for an unknown id.
    pub fn spawn(&self, piece: PieceRef) -> Option<Piece> {
        let def = self.get(piece)?;
        Some(Piece {
            id: piece.id,
            set: piece.set,
            x: def.spawn.0,
            y: def.spawn.1,
            rotation: Rotation::North,
        })
    }

    fn build() -> Self {
        let sets = PieceSetId::ALL
            .iter()
            .map(|&id| match id {
                PieceSetId::Standard => {
                    tetromino_set(id, "Standard", 1, 1, |kind| match kind {
                        PieceKind::O => RotationSystem::None,
                        _ => RotationSystem::Srs,
                    })
                }
                PieceSetId::Big => tetromino_set(id, "Big", 2, 2, |_| RotationSystem::Srs),
                PieceSetId::BigPlus => tetromino_set(id, "Big+", 1, 2, |_| RotationSystem::Srs),
                PieceSetId::Ars => tetromino_set(id, "ARS", 1, 1, |kind| match kind {
                    PieceKind::I => RotationSystem::None,
                    _ => RotationSystem::Ars,
                }),
                PieceSetId::Cultris2 => {
                    tetromino_set(id, "Cultris II", 1, 1, |_| RotationSystem::Cultris2)
                }
                PieceSetId::OSpin => tetromino_set(id, "O-spin", 1, 1, |_| RotationSystem::OSpin),
                PieceSetId::Pentomino => PieceSet {
                    id,
                    name: "Pentomino",
                    step: 1,
                    scale: 1,
                    pieces: shapes_to_defs(PENTOMINOES, 0, 1),
                },
                PieceSetId::M123 => PieceSet {
                    id,
                    name: "M123",
                    step: 1,
                    scale: 1,
                    pieces: shapes_to_defs(M123, 0, 1),
                },
                PieceSetId::All29 => {
                    let mut pieces = tetromino_set(id, "All-29", 1, 1, |kind| match kind {
                        PieceKind::O => RotationSystem::None,
                        _ => RotationSystem::Srs,
                    })
                    .pieces;
                    let next = pieces.len() as u8;
                    pieces.extend(shapes_to_defs(M123, next, 1));
                    let next = pieces.len() as u8;
                    pieces.extend(shapes_to_defs(PENTOMINOES, next, 1));
                    PieceSet {
                        id,
                        name: "All-29",
                        step: 1,
                        scale: 1,
                        pieces,
                    }
                }
            })
            .collect();
        Self { sets }
    }
}

/// Spawn matrices of the tetrominoes, in block id order.
const TETROMINOES: [(&str, &[&str]); 7] = [
    ("I", &["....", "####", "....", "...."]),
    ("O", &["##", "##"]),
    ("T", &[".#.", "###", "..."]),
    ("L", &["..#", "###", "..."]),
    ("J", &["#..", "###", "..."]),
    ("S", &[".##", "##.", "..."]),
    ("Z", &["##.", ".##", "..."]),
];

const M123: &[(&str, &[&str])] = &[
    ("M1", &["#"]),
    ("M2", &["##", ".."]),
    ("I3", &["...", "###", "..."]),
    ("L3", &["#..", "##.", "..."]),
];

const PENTOMINOES: &[(&str, &[&str])] = &[
    ("F", &[".....", "..##.", ".##..", "..#..", "....."]),
    ("F'", &[".....", ".##..", "..##.", "..#..", "....."]),
    ("I5", &[".....", ".....", "#####", ".....", "....."]),
    ("L5", &[".....", "....#", ".####", ".....", "....."]),
    ("J5", &[".....", "#....", "####.", ".....", "....."]),
    ("N", &[".....", ".##..", "..###", ".....", "....."]),
    ("N'", &[".....", "..##.", "###..", ".....", "....."]),
    ("P", &[".....", ".##..", ".###.", ".....", "....."]),
    ("P'", &[".....", "..##.", ".###.", ".....", "....."]),
    ("T5", &[".....", ".###.", "..#..", "..#..", "....."]),
    ("U", &[".....", ".#.#.", ".###.", ".....", "....."]),
    ("V", &[".....", ".#...", ".#...", ".###.", "....."]),
    ("W", &[".....", ".#...", ".##..", "..##.", "....."]),
    ("X", &[".....", "..#..", ".###.", "..#..", "....."]),
    ("Y", &[".....", "..#..", "####.", ".....", "....."]),
    ("Y'", &[".....", "..#..", ".####", ".....", "....."]),
    ("Z5", &[".....", ".##..", "..#..", "..##.", "....."]),
    ("Z5'", &[".....", "..##.", "..#..", ".##..", "....."]),
];

/// All-spin probe points in spawn orientation: (full pair, mini pairs).
fn all_spin_spawn_points(kind: PieceKind) -> Option<([MinoOffset; 2], Vec<[MinoOffset; 2]>)> {
    match kind {
        PieceKind::I => Some((
            [(0, 0), (3, 2)],
            vec![[(0, 0), (3, 0)], [(0, 2), (3, 2)]],
        )),
        PieceKind::L => Some(([(0, 2), (2, 2)], vec![[(0, 0), (1, 0)]])),
        PieceKind::J => Some(([(0, 2), (2, 2)], vec![[(1, 0), (2, 0)]])),
        PieceKind::S => Some(([(0, 0), (2, 1)], vec![[(0, 2), (2, 2)]])),
        PieceKind::Z => Some(([(2, 0), (0, 1)], vec![[(0, 2), (2, 2)]])),
        PieceKind::O | PieceKind::T => None,
    }
}

fn tetromino_set(
    id: PieceSetId,
    name: &'static str,
    step: u8,
    scale: u8,
    system: impl Fn(PieceKind) -> RotationSystem,
) -> PieceSet {
    let pieces = TETROMINOES
        .iter()
        .zip(PieceKind::ALL)
        .map(|(&(piece_name, rows), kind)| {
            let mut def = build_def(kind.id(), piece_name, kind.color(), rows, scale);
            def.rotation_system = system(kind);
            def.kicks = kick_table(def.rotation_system, kind == PieceKind::I);
            if id == PieceSetId::Standard {
                let n = def.size as i8;
                def.all_spin = all_spin_spawn_points(kind).map(|(full, mini)| {
                    rotations(AllSpinPoints { full, mini }, |points| AllSpinPoints {
                        full: points.full.map(|p| rotate_cw(p, n)),
                        mini: points
                            .mini
                            .iter()
                            .map(|pair| pair.map(|p| rotate_cw(p, n)))
                            .collect(),
                    })
                });
            }
            def
        })
        .collect();
    PieceSet {
        id,
        name,
        step,
        scale,
        pieces,
    }
}

fn shapes_to_defs(shapes: &[(&'static str, &[&str])], first_id: u8, scale: u8) -> Vec<PieceDef> {
    shapes
        .iter()
        .enumerate()
        .map(|(i, &(name, rows))| {
            let color = (i % 7) as Cell + 1;
            build_def(first_id + i as u8, name, color, rows, scale)
        })
        .collect()
}

fn kick_table(system: RotationSystem, is_i: bool) -> &'static KickTable {
    match system {
        RotationSystem::None => &NO_KICKS,
        RotationSystem::Srs if is_i => &SRS_I_KICKS,
        RotationSystem::Srs => &SRS_KICKS,
        RotationSystem::Ars => &ARS_KICKS,
        RotationSystem::Cultris2 => &C2_KICKS,
        RotationSystem::OSpin => &OSPIN_KICKS,
    }
}

/// The four rotation states starting from spawn, each derived clockwise from
/// the previous one.
fn rotations<T: Clone>(spawn: T, rotate: impl Fn(&T) -> T) -> [T; 4] {
    let east = rotate(&spawn);
    let south = rotate(&east);
    let west = rotate(&south);
    [spawn, east, south, west]
}

/// Rotate a cell clockwise inside an `n`x`n` box.
fn rotate_cw((x, y): MinoOffset, n: i8) -> MinoOffset {
    (n - 1 - y, x)
}

fn build_def(id: u8, name: &'static str, color: Cell, rows: &[&str], scale: u8) -> PieceDef {
    let n = rows.len() as i8;
    let spawn: Vec<MinoOffset> = rows
        .iter()
        .enumerate()
        .flat_map(|(y, row)| {
            row.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'#')
                .map(move |(x, _)| (x as i8, y as i8))
        })
        .collect();

    let states = rotations(spawn, |minos| minos.iter().map(|&p| rotate_cw(p, n)).collect())
        .map(|minos| scale_minos(&minos, scale));

    let size = n as u8 * scale;
    let lowest = states[0].iter().map(|&(_, y)| y).max().unwrap_or(0);
    let spawn_x = (BOARD_WIDTH as i8 - size as i8) / 2;
    let spawn_y = HIDDEN_ROWS as i8 + scale as i8 - 1 - lowest;

    PieceDef {
        id,
        name,
        color,
        size,
        rotation_system: RotationSystem::Srs,
        spawn: (spawn_x, spawn_y),
        kicks: &SRS_KICKS,
        minos: states,
        all_spin: None,
    }
}

fn scale_minos(minos: &[MinoOffset], scale: u8) -> Vec<MinoOffset> {
    let s = scale as i8;
    let mut out = Vec::with_capacity(minos.len() * (scale as usize).pow(2));
    for &(x, y) in minos {
        for dy in 0..s {
            for dx in 0..s {
                out.push((x * s + dx, y * s + dy));
            }
        }
    }
    out.sort_by_key(|&(x, y)| (y, x));
    out
}

/// A positioned piece. Position is the top-left of its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub id: u8,
    pub set: PieceSetId,
    pub x: i8,
    pub y: i8,
    pub rotation: Rotation,
}

impl Piece {
    pub fn piece_ref(&self) -> PieceRef {
        PieceRef::new(self.id, self.set)
    }

    pub fn kind(&self) -> Option<PieceKind> {
        self.piece_ref().kind()
    }

    pub fn def(&self) -> &'static PieceDef {
        catalog().def(self.piece_ref())
    }

    /// Absolute board coordinates of every mino.
    pub fn cells(&self) -> impl Iterator<Item = (i8, i8)> + 'static {
        let (px, py) = (self.x, self.y);
        self.def()
            .minos(self.rotation)
            .iter()
            .map(move |&(mx, my)| (px + mx, py + my))
    }

    pub fn moved(self, dx: i8, dy: i8) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// Try to rotate a piece with wall kicks
///
/// Candidates are tried strictly in table order; the first one accepted by
/// `is_valid` wins. Returns the rotated piece and the index of the accepted
/// kick, or `None` (the caller keeps the original piece).
pub fn try_rotate(
    piece: &Piece,
    delta: RotationDelta,
    is_valid: impl Fn(&Piece) -> bool,
) -> Option<(Piece, usize)> {
    let def = piece.def();
    let scale = catalog().set(piece.set).scale as i8;
    let rotation = piece.rotation.apply(delta);

    for (index, &(dx, dy)) in def.kicks(piece.rotation, delta).iter().enumerate() {
        let candidate = Piece {
            x: piece.x + dx * scale,
            y: piece.y - dy * scale,
            rotation,
            ..*piece
        };
        if is_valid(&candidate) {
            return Some((candidate, index));
        }
    }

    None
}
