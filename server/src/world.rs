//! The authoritative board: a grid of cells plus the live snakes, the active
//! food and the scoreboard.
//!
//! Every cell claim goes through [`World::apply_snake_update`] or
//! [`World::apply_food_update`], which keeps the grid and the entity maps in
//! agreement: a cell names a snake or a food exactly when that entity is in
//! its map and covers the cell.

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Color, Direction, Food, Point, Snake, NO_OCCUPANT};
use std::collections::HashMap;

/// Cells between the head and the tail of a freshly spawned snake.
pub const SPAWN_LENGTH: i32 = 16;

/// Fraction of each board dimension kept clear around a spawn point.
const SPAWN_INSET: f64 = 0.12;

/// Random placement attempts before falling back to a full board scan.
const RANDOM_PROBES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Occupant {
    #[default]
    Empty,
    Snake(i32),
    Food(i32),
}

/// Occupancy record of one grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub occupant: Occupant,
    /// Direction towards the next segment, for snake cells only
    pub heading: Option<Direction>,
    pub color: Option<Color>,
}

impl Cell {
    /// Occupant id, or `NO_OCCUPANT` for an empty cell.
    pub fn id(&self) -> i32 {
        match self.occupant {
            Occupant::Empty => NO_OCCUPANT,
            Occupant::Snake(id) | Occupant::Food(id) => id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.occupant == Occupant::Empty
    }
}

/// Hands out ids shared by players and food, so an id never names two
/// entities at once.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: i32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> i32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call to `next_id` will return.
    pub fn peek(&self) -> i32 {
        self.next
    }
}

pub struct World {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    snakes: HashMap<i32, Snake>,
    food: HashMap<i32, Food>,
    scoreboard: HashMap<i32, usize>,
    pending_headings: HashMap<i32, Direction>,
}

impl World {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
            snakes: HashMap::new(),
            food: HashMap::new(),
            scoreboard: HashMap::new(),
            pending_headings: HashMap::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn snakes(&self) -> &HashMap<i32, Snake> {
        &self.snakes
    }

    pub fn snake(&self, id: i32) -> Option<&Snake> {
        self.snakes.get(&id)
    }

    pub fn food(&self) -> &HashMap<i32, Food> {
        &self.food
    }

    pub fn scoreboard(&self) -> &HashMap<i32, usize> {
        &self.scoreboard
    }

    pub fn score(&self, id: i32) -> Option<usize> {
        self.scoreboard.get(&id).copied()
    }

    pub fn cell(&self, p: Point) -> Option<&Cell> {
        self.index(p).map(|i| &self.cells[i])
    }

    /// True for the outermost ring and anything outside the board.
    pub fn is_wall(&self, p: Point) -> bool {
        p.x <= 0 || p.y <= 0 || p.x >= self.width - 1 || p.y >= self.height - 1
    }

    /// Current heading of a live snake, read from its head cell.
    pub fn heading(&self, id: i32) -> Option<Direction> {
        let snake = self.snakes.get(&id)?;
        self.cell(snake.head())
            .and_then(|cell| cell.heading)
            .or_else(|| snake.heading())
    }

    /// Number of cells holding any occupant.
    pub fn claimed_cells(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_empty()).count()
    }

    /// Positions currently claimed by `occupant`.
    pub fn cells_with(&self, occupant: Occupant) -> Vec<Point> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.occupant == occupant)
            .map(|(i, _)| Point::new(i as i32 % self.width, i as i32 / self.width))
            .collect()
    }

    fn index(&self, p: Point) -> Option<usize> {
        if p.x < 0 || p.y < 0 || p.x >= self.width || p.y >= self.height {
            return None;
        }
        Some((p.y * self.width + p.x) as usize)
    }

    fn set_cell(&mut self, p: Point, cell: Cell) {
        if let Some(i) = self.index(p) {
            self.cells[i] = cell;
        }
    }

    /// Empties `p` if it is still claimed by `occupant`.
    fn release_cell(&mut self, p: Point, occupant: Occupant) {
        if let Some(i) = self.index(p) {
            if self.cells[i].occupant == occupant {
                self.cells[i] = Cell::default();
            }
        }
    }

    /// Claims every cell of a body, segment by segment. Returns the number of
    /// distinct cells claimed.
    fn claim_body(&mut self, snake: &Snake) -> usize {
        let occupant = Occupant::Snake(snake.id);
        let color = Some(snake.color());
        let mut claimed = 0;

        for pair in snake.vertices.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let Some(direction) = Direction::between(&from, &to) else {
                continue;
            };
            let mut current = from;
            while current != to {
                if self.cell(current).map(|c| c.occupant) != Some(occupant) {
                    claimed += 1;
                }
                self.set_cell(
                    current,
                    Cell {
                        occupant,
                        heading: Some(direction),
                        color,
                    },
                );
                current = current.step(direction);
            }
        }

        let head = snake.head();
        if self.cell(head).map(|c| c.occupant) != Some(occupant) {
            claimed += 1;
        }
        self.set_cell(
            head,
            Cell {
                occupant,
                heading: snake.heading(),
                color,
            },
        );

        claimed
    }

    /// Applies a snake record: a death, a new snake, a grow or a move.
    ///
    /// The record is consumed; the world keeps its own body sequence.
    pub fn apply_snake_update(&mut self, update: Snake) {
        let id = update.id;

        if update.is_dead() {
            if let Some(old) = self.snakes.remove(&id) {
                for p in old.cells() {
                    self.release_cell(p, Occupant::Snake(id));
                }
                self.scoreboard.remove(&id);
                self.pending_headings.remove(&id);
                debug!("Snake {} ({}) removed from the board", id, old.name);
            }
            return;
        }

        let Some((old_head, old_tail, old_length)) = self
            .snakes
            .get(&id)
            .map(|s| (s.head(), s.tail(), s.length))
        else {
            let mut snake = update;
            let length = self.claim_body(&snake);
            snake.length = length;
            self.scoreboard.insert(id, length);
            debug!("Snake {} ({}) placed with length {}", id, snake.name, length);
            self.snakes.insert(id, snake);
            return;
        };

        let new_head = update.head();
        if new_head == old_head && update.tail() == old_tail {
            return;
        }

        let mut length = old_length;
        if update.tail() == old_tail {
            length += 1;
            *self.scoreboard.entry(id).or_insert(old_length) += 1;
        } else {
            self.release_cell(old_tail, Occupant::Snake(id));
        }

        self.set_cell(
            new_head,
            Cell {
                occupant: Occupant::Snake(id),
                heading: Direction::between(&old_head, &new_head),
                color: Some(update.color()),
            },
        );

        if let Some(stored) = self.snakes.get_mut(&id) {
            stored.vertices = update.vertices;
            stored.length = length;
        }
    }

    /// Applies a food record. Eaten records remove the food; anything else is
    /// placed unless a live snake or another food holds the cell. Returns
    /// whether the board changed.
    pub fn apply_food_update(&mut self, food: Food) -> bool {
        let occupant = Occupant::Food(food.id);

        if food.is_eaten() {
            return match self.food.remove(&food.id) {
                Some(old) => {
                    self.release_cell(old.loc, occupant);
                    true
                }
                None => false,
            };
        }

        let Some(cell) = self.cell(food.loc) else {
            return false;
        };
        match cell.occupant {
            Occupant::Snake(id) if self.snakes.contains_key(&id) => return false,
            Occupant::Food(id) if id != food.id && self.food.contains_key(&id) => return false,
            _ => {}
        }

        if let Some(previous) = self.food.insert(food.id, food.clone()) {
            if previous.loc != food.loc {
                self.release_cell(previous.loc, occupant);
            }
        }
        self.set_cell(
            food.loc,
            Cell {
                occupant,
                heading: None,
                color: Some(Color::FOOD),
            },
        );
        true
    }

    fn is_free_interior(&self, p: Point) -> bool {
        !self.is_wall(p) && self.cell(p).is_some_and(Cell::is_empty)
    }

    /// Picks an unclaimed interior cell at random. Falls back to scanning the
    /// whole board once random probing keeps hitting occupied cells.
    fn random_free_interior<R: Rng>(&self, rng: &mut R) -> Option<Point> {
        if self.width <= 2 || self.height <= 2 {
            return None;
        }

        for _ in 0..RANDOM_PROBES {
            let p = Point::new(
                rng.gen_range(1..self.width - 1),
                rng.gen_range(1..self.height - 1),
            );
            if self.is_free_interior(p) {
                return Some(p);
            }
        }

        let free: Vec<Point> = (1..self.height - 1)
            .flat_map(|y| (1..self.width - 1).map(move |x| Point::new(x, y)))
            .filter(|&p| self.is_free_interior(p))
            .collect();
        free.choose(rng).copied()
    }

    /// Places one food on a random unclaimed interior cell. Returns `None`
    /// only when the interior is full.
    pub fn spawn_random_food<R: Rng>(
        &mut self,
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> Option<Food> {
        let loc = self.random_free_interior(rng)?;
        let food = Food::new(ids.peek(), loc);
        if !self.apply_food_update(food.clone()) {
            return None;
        }
        ids.next_id();
        Some(food)
    }

    /// Turns part of each dead snake's body into food: `round(cells * rate)`
    /// distinct cells chosen at random among those the body covered. Halves
    /// round to even, so 5 cells at 0.5 give 2 food.
    pub fn recycle_snake_remains<R: Rng>(
        &mut self,
        dead: &[Snake],
        rate: f32,
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> Vec<Food> {
        let mut created = Vec::new();

        for snake in dead {
            let cells = snake.cells();
            let share = (cells.len() as f32 * rate.max(0.0)).round_ties_even();
            let count = (share as usize).min(cells.len());

            for &loc in cells.choose_multiple(rng, count) {
                let food = Food::new(ids.peek(), loc);
                if self.apply_food_update(food.clone()) {
                    ids.next_id();
                    created.push(food);
                }
            }
        }

        created
    }

    /// Records a heading change for the next tick. Turning onto the current
    /// axis (straight on or straight back) is refused.
    pub fn request_heading(&mut self, id: i32, direction: Direction) -> bool {
        let Some(current) = self.heading(id) else {
            return false;
        };
        if direction.is_parallel(current) {
            return false;
        }
        self.pending_headings.insert(id, direction);
        true
    }

    /// Removes and returns the heading requested since the last tick.
    pub fn take_pending_heading(&mut self, id: i32) -> Option<Direction> {
        self.pending_headings.remove(&id)
    }

    fn spawn_run_is_clear(&self, head: Point, tail_direction: Direction) -> bool {
        let mut p = head;
        for _ in 0..=SPAWN_LENGTH {
            if !self.is_free_interior(p) {
                return false;
            }
            p = p.step(tail_direction);
        }
        true
    }

    /// Finds room for a new snake and places it: head at a random point
    /// inset from the border, tail `SPAWN_LENGTH` cells behind it in a random
    /// direction, every cell in between unclaimed. Returns `None` when the
    /// board has no such run left.
    pub fn place_new_snake<R: Rng>(
        &mut self,
        id: i32,
        name: &str,
        rng: &mut R,
    ) -> Option<Snake> {
        let inset_x = ((self.width as f64 * SPAWN_INSET) as i32).max(1);
        let inset_y = ((self.height as f64 * SPAWN_INSET) as i32).max(1);

        let mut placement = None;
        if inset_x < self.width - inset_x && inset_y < self.height - inset_y {
            for _ in 0..RANDOM_PROBES {
                let head = Point::new(
                    rng.gen_range(inset_x..self.width - inset_x),
                    rng.gen_range(inset_y..self.height - inset_y),
                );
                let tail_direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
                if self.spawn_run_is_clear(head, tail_direction) {
                    placement = Some((head, tail_direction));
                    break;
                }
            }
        }

        if placement.is_none() {
            let candidates: Vec<(Point, Direction)> = (1..self.height - 1)
                .flat_map(|y| (1..self.width - 1).map(move |x| Point::new(x, y)))
                .flat_map(|p| Direction::ALL.into_iter().map(move |d| (p, d)))
                .filter(|&(p, d)| self.spawn_run_is_clear(p, d))
                .collect();
            placement = candidates.choose(rng).copied();
        }

        let (head, tail_direction) = placement?;
        let (dx, dy) = tail_direction.delta();
        let tail = Point::new(head.x + dx * SPAWN_LENGTH, head.y + dy * SPAWN_LENGTH);

        self.apply_snake_update(Snake::new(id, name, head, tail));
        self.snakes.get(&id).cloned()
    }
}
