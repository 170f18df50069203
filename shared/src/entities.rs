//! Snake and food records as they travel on the wire.
//!
//! Both records double as update requests: the server builds a fresh record
//! for every change and hands it to the world, which keeps its own copy. A
//! record carrying the sentinel coordinate announces a death or an eaten food.

use crate::geometry::{Direction, Point, SENTINEL};
use serde::{Deserialize, Serialize};

/// Display color of a cell occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const FOOD: Color = Color { r: 0, g: 0, b: 0 };

    /// Mid-range color derived from a snake id. Each channel lands in 50..205
    /// so snakes never blend into the background or the food.
    pub fn for_id(id: i32) -> Color {
        let mut h = (id as u32).wrapping_mul(0x9E37_79B9) ^ 0x85EB_CA6B;
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        let channel = |shift: u32| 50 + ((h >> shift) % 155) as u8;
        Color {
            r: channel(0),
            g: channel(8),
            b: channel(16),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    #[serde(rename = "ID")]
    pub id: i32,
    pub loc: Point,
}

impl Food {
    pub fn new(id: i32, loc: Point) -> Self {
        Self { id, loc }
    }

    /// Marker announcing that the food with `id` has been consumed.
    pub fn eaten(id: i32) -> Self {
        Self { id, loc: SENTINEL }
    }

    pub fn is_eaten(&self) -> bool {
        self.loc.is_sentinel()
    }
}

/// A snake body stored as a bend-tracking vertex list, tail first.
///
/// Consecutive vertices always share a row or a column; every grid cell
/// between them belongs to the snake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snake {
    #[serde(rename = "ID")]
    pub id: i32,
    pub name: String,
    pub vertices: Vec<Point>,
    /// Number of cells covered, maintained by the world.
    #[serde(skip)]
    pub length: usize,
}

impl Snake {
    pub fn new(id: i32, name: impl Into<String>, head: Point, tail: Point) -> Self {
        Self::with_vertices(id, name, vec![tail, head])
    }

    pub fn with_vertices(id: i32, name: impl Into<String>, vertices: Vec<Point>) -> Self {
        Self {
            id,
            name: name.into(),
            vertices,
            length: 0,
        }
    }

    /// The record that tells the world and the clients this snake has died.
    pub fn dead(id: i32, name: impl Into<String>) -> Self {
        Self::new(id, name, SENTINEL, SENTINEL)
    }

    pub fn head(&self) -> Point {
        self.vertices.last().copied().unwrap_or(SENTINEL)
    }

    pub fn tail(&self) -> Point {
        self.vertices.first().copied().unwrap_or(SENTINEL)
    }

    pub fn is_dead(&self) -> bool {
        self.head().is_sentinel() && self.tail().is_sentinel()
    }

    /// Same id, head and tail. Two records matching here describe the same
    /// board state for the purposes of an update.
    pub fn same_extent(&self, other: &Snake) -> bool {
        self.id == other.id && self.head() == other.head() && self.tail() == other.tail()
    }

    pub fn color(&self) -> Color {
        Color::for_id(self.id)
    }

    /// Heading of the segment that ends at the head.
    pub fn heading(&self) -> Option<Direction> {
        let n = self.vertices.len();
        if n < 2 {
            return None;
        }
        Direction::between(&self.vertices[n - 2], &self.vertices[n - 1])
    }

    /// Every grid cell covered by the body, tail to head, without repeats.
    pub fn cells(&self) -> Vec<Point> {
        let mut cells: Vec<Point> = Vec::new();
        let push = |p: Point, cells: &mut Vec<Point>| {
            if !cells.contains(&p) {
                cells.push(p);
            }
        };

        match self.vertices.as_slice() {
            [] => {}
            [only] => push(*only, &mut cells),
            vertices => {
                for pair in vertices.windows(2) {
                    let (from, to) = (pair[0], pair[1]);
                    match Direction::between(&from, &to) {
                        Some(direction) => {
                            let mut current = from;
                            while current != to {
                                push(current, &mut cells);
                                current = current.step(direction);
                            }
                        }
                        None => push(from, &mut cells),
                    }
                }
                push(self.head(), &mut cells);
            }
        }

        cells
    }

    /// Drops duplicate vertices and interior vertices that sit on a straight
    /// line between their neighbours.
    pub fn simplify(&mut self) {
        self.vertices.dedup();
        let mut i = 1;
        while i + 1 < self.vertices.len() {
            let (a, b, c) = (self.vertices[i - 1], self.vertices[i], self.vertices[i + 1]);
            let colinear = (a.x == b.x && b.x == c.x) || (a.y == b.y && b.y == c.y);
            if colinear {
                self.vertices.remove(i);
            } else {
                i += 1;
            }
        }
    }
}
