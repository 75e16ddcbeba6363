//! Geometry primitives for tile planning.
//!
//! Everything here is pure math in the scrollable surface's coordinate
//! space (logical pixels, origin at the surface's top-left corner):
//! - Rectangle normalization from a two-point drag
//! - Rectangle intersection
//! - Tile grid computation for full-surface and region captures

/// A point in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle in surface coordinates.
///
/// Width and height are unsigned, so a `Rect` can never have negative
/// dimensions; a zero-area rectangle is representable and reported by
/// [`Rect::is_empty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalizes a two-point drag into a rectangle.
    ///
    /// The corners may arrive in any order; the result always has its
    /// origin at the top-left of the dragged area.
    pub fn from_points(p1: Point, p2: Point) -> Self {
        Self {
            x: p1.x.min(p2.x),
            y: p1.y.min(p2.y),
            width: p1.x.abs_diff(p2.x),
            height: p1.y.abs_diff(p2.y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Exclusive right edge. Widened to avoid overflow near `i32::MAX`.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Returns true when `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Computes the overlap of two rectangles.
    ///
    /// Returns `None` when they share no area (including when they only
    /// touch along an edge); callers skip such tiles during composition.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x) as i64;
        let y1 = self.y.max(other.y) as i64;
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 > x1 && y2 > y1 {
            Some(Rect::new(
                x1 as i32,
                y1 as i32,
                (x2 - x1) as u32,
                (y2 - y1) as u32,
            ))
        } else {
            None
        }
    }
}

/// One snapshot to be taken: where the viewport must sit for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpec {
    pub index: usize,
    pub origin: Point,
}

/// The ordered set of tiles required to cover a target area.
///
/// Tiles are enumerated row-major: left-to-right, then top-to-bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlan {
    pub tiles: Vec<TileSpec>,
    pub viewport: Size,
}

impl TilePlan {
    /// Plans tiles covering the entire surface.
    ///
    /// Produces `ceil(h/vh) * ceil(w/vw)` tiles; tile `(row, col)` sits at
    /// `(col*vw, row*vh)`. There is no upper bound on the tile count;
    /// very large surfaces are captured in full, never truncated.
    pub fn full_surface(surface: Size, viewport: Size) -> Self {
        if viewport.is_empty() || surface.is_empty() {
            return Self {
                tiles: Vec::new(),
                viewport,
            };
        }

        let cols = surface.width.div_ceil(viewport.width);
        let rows = surface.height.div_ceil(viewport.height);

        let mut tiles = Vec::with_capacity((rows as usize) * (cols as usize));
        for row in 0..rows {
            for col in 0..cols {
                tiles.push(TileSpec {
                    index: tiles.len(),
                    origin: Point::new(
                        (col as i64 * viewport.width as i64) as i32,
                        (row as i64 * viewport.height as i64) as i32,
                    ),
                });
            }
        }

        Self { tiles, viewport }
    }

    /// Plans the minimal tile set overlapping `target`.
    ///
    /// When the target already fits inside the viewport frame at the
    /// current scroll offset, a single tile at that offset suffices and no
    /// scrolling will be needed. Otherwise the plan walks the
    /// viewport-aligned grid cells (origins at multiples of the viewport
    /// size) that intersect the target.
    pub fn region(target: Rect, viewport: Size, scroll: Point) -> Self {
        if viewport.is_empty() || target.is_empty() {
            return Self {
                tiles: Vec::new(),
                viewport,
            };
        }

        let frame = Rect::new(scroll.x, scroll.y, viewport.width, viewport.height);
        if frame.contains(&target) {
            return Self::single(scroll, viewport);
        }

        let vw = viewport.width as i32;
        let vh = viewport.height as i32;
        let first_col = target.x.div_euclid(vw);
        let last_col = ((target.right() - 1) as i32).div_euclid(vw);
        let first_row = target.y.div_euclid(vh);
        let last_row = ((target.bottom() - 1) as i32).div_euclid(vh);

        let mut tiles = Vec::new();
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                tiles.push(TileSpec {
                    index: tiles.len(),
                    origin: Point::new(
                        (col as i64 * vw as i64) as i32,
                        (row as i64 * vh as i64) as i32,
                    ),
                });
            }
        }

        Self { tiles, viewport }
    }

    /// Plans a single tile at `origin`, the visible-area capture case.
    pub fn single(origin: Point, viewport: Size) -> Self {
        Self {
            tiles: vec![TileSpec { index: 0, origin }],
            viewport,
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
