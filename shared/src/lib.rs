use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;

pub const FIELD_WIDTH: i32 = 20_000;
pub const FIELD_HEIGHT: i32 = 10_000;
pub const PLAYER_SIZE: i32 = 400;
pub const GOAL_WIDTH: i32 = 3_000;
pub const BALL_MAX_SPEED: f32 = 400.0;
pub const PLAYER_MAX_SPEED: f32 = 100.0;
pub const MIN_PLAYER_NUMBER: u32 = 1;
pub const MAX_PLAYER_NUMBER: u32 = 11;

/// Datagrams exchanged with the arena. Each packet travels alone in one
/// bincode-encoded UDP datagram.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        team_side: TeamSide,
        number: u32,
        initial_position: Point,
    },
    Orders {
        turn: u32,
        order_set: OrderSet,
    },
    Disconnect,

    Connected {
        turn: u32,
    },
    GameSnapshot {
        snapshot: Snapshot,
    },
    OrderAck {
        turn: u32,
        response: OrderResponse,
    },
    Disconnected {
        reason: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("speed {speed} is outside (0, {max}]")]
    SpeedOutOfRange { speed: f32, max: f32 },
    #[error("cannot derive a direction from {from:?} to {to:?}")]
    ZeroDirection { from: Point, to: Point },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_inside_field(&self) -> bool {
        (0..=FIELD_WIDTH).contains(&self.x) && (0..=FIELD_HEIGHT).contains(&self.y)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    pub fn between(from: Point, to: Point) -> Self {
        Self {
            x: (to.x - from.x) as f32,
            y: (to.y - from.y) as f32,
        }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero-length vector.
    pub fn normalize(&self) -> Option<Self> {
        let length = self.length();
        if length < f32::EPSILON || !length.is_finite() {
            return None;
        }
        Some(Self {
            x: self.x / length,
            y: self.y / length,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub direction: Vector,
    pub speed: f32,
}

impl Velocity {
    /// Builds a velocity pointing from `from` to `to`, checking the speed
    /// against `max_speed`.
    pub fn towards(from: Point, to: Point, speed: f32, max_speed: f32) -> Result<Self, OrderError> {
        if !speed.is_finite() || speed <= 0.0 || speed > max_speed {
            return Err(OrderError::SpeedOutOfRange {
                speed,
                max: max_speed,
            });
        }

        let direction = Vector::between(from, to)
            .normalize()
            .ok_or(OrderError::ZeroDirection { from, to })?;

        Ok(Self { direction, speed })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    pub fn opponent(&self) -> TeamSide {
        match self {
            TeamSide::Home => TeamSide::Away,
            TeamSide::Away => TeamSide::Home,
        }
    }

    /// Home defends the goal on the left edge, away the one on the right edge.
    pub fn own_goal(&self) -> Goal {
        let x = match self {
            TeamSide::Home => 0,
            TeamSide::Away => FIELD_WIDTH,
        };
        let center_y = FIELD_HEIGHT / 2;

        Goal {
            side: *self,
            center: Point::new(x, center_y),
            top_pole: Point::new(x, center_y + GOAL_WIDTH / 2),
            bottom_pole: Point::new(x, center_y - GOAL_WIDTH / 2),
        }
    }

    pub fn opponent_goal(&self) -> Goal {
        self.opponent().own_goal()
    }
}

impl std::fmt::Display for TeamSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamSide::Home => write!(f, "home"),
            TeamSide::Away => write!(f, "away"),
        }
    }
}

impl std::str::FromStr for TeamSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "home" => Ok(TeamSide::Home),
            "away" => Ok(TeamSide::Away),
            other => Err(format!("unknown team side '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goal {
    pub side: TeamSide,
    pub center: Point,
    pub top_pole: Point,
    pub bottom_pole: Point,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Player {
    pub number: u32,
    pub team_side: TeamSide,
    pub position: Point,
    pub velocity: Velocity,
}

impl Player {
    pub fn new(number: u32, team_side: TeamSide, position: Point) -> Self {
        Self {
            number,
            team_side,
            position,
            velocity: Velocity::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BallHolder {
    pub team_side: TeamSide,
    pub number: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ball {
    pub position: Point,
    pub velocity: Velocity,
    pub holder: Option<BallHolder>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Team {
    pub side: TeamSide,
    pub score: u32,
    pub players: Vec<Player>,
}

impl Team {
    pub fn new(side: TeamSide) -> Self {
        Self {
            side,
            score: 0,
            players: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Listening,
    GetReady,
    Playing,
    Over,
}

/// Full game state broadcast by the arena once per turn.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Snapshot {
    pub turn: u32,
    pub state: MatchState,
    pub home: Team,
    pub away: Team,
    pub ball: Ball,
}

impl Snapshot {
    pub fn team(&self, side: TeamSide) -> &Team {
        match side {
            TeamSide::Home => &self.home,
            TeamSide::Away => &self.away,
        }
    }

    pub fn player(&self, side: TeamSide, number: u32) -> Option<&Player> {
        self.team(side)
            .players
            .iter()
            .find(|player| player.number == number)
    }

    pub fn is_ball_holder(&self, player: &Player) -> bool {
        self.ball.holder
            == Some(BallHolder {
                team_side: player.team_side,
                number: player.number,
            })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Order {
    Move { velocity: Velocity },
    Kick { velocity: Velocity },
    Catch,
}

impl Order {
    /// Kicks the ball from where it lies towards `target`.
    pub fn kick(ball: &Ball, target: Point, speed: f32) -> Result<Order, OrderError> {
        let velocity = Velocity::towards(ball.position, target, speed, BALL_MAX_SPEED)?;
        Ok(Order::Kick { velocity })
    }

    pub fn move_to(from: Point, to: Point, speed: f32) -> Result<Order, OrderError> {
        let velocity = Velocity::towards(from, to, speed, PLAYER_MAX_SPEED)?;
        Ok(Order::Move { velocity })
    }

    pub fn move_max_speed(from: Point, to: Point) -> Result<Order, OrderError> {
        Self::move_to(from, to, PLAYER_MAX_SPEED)
    }

    pub fn catch() -> Order {
        Order::Catch
    }
}

/// Orders submitted together for a single turn.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct OrderSet {
    pub orders: Vec<Order>,
    pub debug_message: Option<String>,
}

impl OrderSet {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            orders,
            debug_message: None,
        }
    }

    pub fn with_debug_message(mut self, message: impl Into<String>) -> Self {
        self.debug_message = Some(message.into());
        self
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    TooLate,
    InvalidOrder,
    UnknownPlayer,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OrderResponse {
    pub code: ResponseCode,
    pub details: Option<String>,
}

impl OrderResponse {
    pub fn success() -> Self {
        Self {
            code: ResponseCode::Success,
            details: None,
        }
    }

    pub fn rejected(code: ResponseCode, details: impl Into<String>) -> Self {
        Self {
            code,
            details: Some(details.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success
    }

    /// The server verdict as an error value, if it was not a success.
    pub fn rejection(&self) -> Option<RejectedError> {
        if self.is_success() {
            return None;
        }
        Some(RejectedError {
            code: self.code,
            details: self.details.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("orders rejected with {code:?}: {details}")]
pub struct RejectedError {
    pub code: ResponseCode,
    pub details: String,
}
