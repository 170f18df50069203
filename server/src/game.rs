use crate::config::Settings;
use crate::world::{IdAllocator, Occupant, World};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{encode_line, Direction, Food, Point, Snake, Startup};
use std::time::Duration;

/// Upper bound on the extra cells a snake swallows after food when the
/// alternate game play is on.
pub const ALT_CHAIN_MAX: usize = 3;

/// Baseline food spawn period with at most one snake on the board.
const FOOD_SPAWN_BASE: Duration = Duration::from_millis(1000);

/// Everything clients need to redraw after one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub snakes: Vec<Snake>,
    pub dead: Vec<Snake>,
    pub food: Vec<Food>,
    pub eaten: Vec<Food>,
}

impl TickReport {
    /// Renders the report as protocol lines: live snakes, dead snakes,
    /// active food, then eaten food.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        let mut payload = String::new();
        for snake in self.snakes.iter().chain(&self.dead) {
            payload.push_str(&encode_line(snake)?);
        }
        for food in self.food.iter().chain(&self.eaten) {
            payload.push_str(&encode_line(food)?);
        }
        Ok(payload)
    }

    pub fn is_empty(&self) -> bool {
        self.snakes.is_empty()
            && self.dead.is_empty()
            && self.food.is_empty()
            && self.eaten.is_empty()
    }
}

/// What the cell in front of a snake does to it.
enum Target {
    Blocked,
    Food(i32),
    Open,
}

pub struct GameState {
    pub settings: Settings,
    pub world: World,
    pub tick: u64,
    ids: IdAllocator,
    rng: StdRng,
}

impl GameState {
    pub fn new(settings: Settings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    pub fn with_rng(settings: Settings, rng: StdRng) -> Self {
        let world = World::new(settings.board_width, settings.board_height);
        Self {
            settings,
            world,
            tick: 0,
            ids: IdAllocator::new(),
            rng,
        }
    }

    /// Allocates an id and places a snake for a new player.
    pub fn add_player(&mut self, name: &str) -> Option<i32> {
        let id = self.ids.next_id();
        match self.world.place_new_snake(id, name, &mut self.rng) {
            Some(snake) => {
                info!(
                    "Added player {} ({}) at {:?} heading {:?}",
                    id,
                    name,
                    snake.head(),
                    snake.heading()
                );
                Some(id)
            }
            None => {
                warn!("No room left to place a snake for {}", name);
                None
            }
        }
    }

    pub fn startup(&self, id: i32) -> Startup {
        Startup {
            id,
            width: self.world.width(),
            height: self.world.height(),
        }
    }

    pub fn request_heading(&mut self, id: i32, direction: Direction) -> bool {
        self.world.request_heading(id, direction)
    }

    /// Advances every live snake by one step and resolves deaths.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;

        let mut order: Vec<i32> = self.world.snakes().keys().copied().collect();
        order.sort_unstable();

        let mut dead = Vec::new();
        let mut eaten = Vec::new();

        for id in order {
            let Some(snake) = self.world.snake(id).cloned() else {
                continue;
            };
            let pending = self.world.take_pending_heading(id);
            let Some(heading) = pending.or_else(|| self.world.heading(id)) else {
                continue;
            };
            if let Some(body) = self.advance(snake, heading, &mut eaten) {
                dead.push(body);
            }
        }

        let mut sentinels = Vec::with_capacity(dead.len());
        for body in &dead {
            let sentinel = Snake::dead(body.id, body.name.clone());
            self.world.apply_snake_update(sentinel.clone());
            info!("Snake {} ({}) died with length {}", body.id, body.name, body.length);
            sentinels.push(sentinel);
        }

        let recycled = self.world.recycle_snake_remains(
            &dead,
            self.settings.snake_recycle_rate,
            &mut self.ids,
            &mut self.rng,
        );
        if !recycled.is_empty() {
            debug!("Recycled {} food from {} dead snakes", recycled.len(), dead.len());
        }

        let mut snakes: Vec<Snake> = self.world.snakes().values().cloned().collect();
        snakes.sort_by_key(|s| s.id);
        let mut food: Vec<Food> = self.world.food().values().cloned().collect();
        food.sort_by_key(|f| f.id);

        TickReport {
            snakes,
            dead: sentinels,
            food,
            eaten,
        }
    }

    fn probe(&self, p: Point) -> Target {
        if self.world.is_wall(p) {
            return Target::Blocked;
        }
        match self.world.cell(p).map(|cell| cell.occupant) {
            Some(Occupant::Empty) => Target::Open,
            Some(Occupant::Food(id)) => Target::Food(id),
            Some(Occupant::Snake(_)) | None => Target::Blocked,
        }
    }

    /// Moves one snake. Returns its last body when it dies this tick.
    fn advance(
        &mut self,
        snake: Snake,
        heading: Direction,
        eaten: &mut Vec<Food>,
    ) -> Option<Snake> {
        let target = snake.head().step(heading);
        let mut snake = match self.probe(target) {
            Target::Blocked => return Some(snake),
            Target::Open => {
                self.slide(&snake, target);
                return None;
            }
            Target::Food(food_id) => {
                self.eat(food_id, eaten);
                self.grow(&snake, target)
            }
        };

        if !self.settings.enable_alt_game_play {
            return None;
        }

        let extra = self.rng.gen_range(1..=ALT_CHAIN_MAX);
        for _ in 0..extra {
            let target = snake.head().step(heading);
            snake = match self.probe(target) {
                Target::Blocked => return Some(snake),
                Target::Open => self.grow(&snake, target),
                Target::Food(food_id) => {
                    self.eat(food_id, eaten);
                    self.grow(&snake, target)
                }
            };
        }
        None
    }

    fn eat(&mut self, food_id: i32, eaten: &mut Vec<Food>) {
        let sentinel = Food::eaten(food_id);
        if self.world.apply_food_update(sentinel.clone()) {
            eaten.push(sentinel);
        }
    }

    /// Extends the head into `target` while the tail stays put.
    fn grow(&mut self, snake: &Snake, target: Point) -> Snake {
        let mut grown = snake.clone();
        grown.vertices.push(target);
        grown.simplify();
        self.world.apply_snake_update(grown.clone());
        self.world.snake(snake.id).cloned().unwrap_or(grown)
    }

    /// Extends the head into `target` and pulls the tail one cell along.
    fn slide(&mut self, snake: &Snake, target: Point) {
        let mut moved = snake.clone();
        moved.vertices.push(target);

        if let [tail, next, ..] = moved.vertices[..] {
            if let Some(direction) = Direction::between(&tail, &next) {
                let new_tail = tail.step(direction);
                if new_tail == next {
                    moved.vertices.remove(0);
                } else {
                    moved.vertices[0] = new_tail;
                }
            }
        }

        moved.simplify();
        self.world.apply_snake_update(moved);
    }

    /// Adds one food when the board holds fewer than the configured density
    /// per live snake.
    pub fn spawn_food(&mut self) -> Option<Food> {
        let wanted = self.settings.food_density * self.world.snakes().len();
        if self.world.food().len() >= wanted {
            return None;
        }
        let food = self.world.spawn_random_food(&mut self.ids, &mut self.rng)?;
        debug!("Spawned food {} at {:?}", food.id, food.loc);
        Some(food)
    }

    /// Food spawns speed up with the number of live snakes.
    pub fn food_spawn_period(&self) -> Duration {
        let snakes = self.world.snakes().len().max(1) as u32;
        FOOD_SPAWN_BASE / snakes
    }
}
