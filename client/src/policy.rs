//! Decision policies
//!
//! A policy turns one snapshot into the orders for that turn. It is plain
//! synchronous code: the dispatcher runs it on the blocking pool, enforces the
//! turn deadline around it and contains any failure it reports.

use crate::config::PlayerIdentity;
use crate::error::PolicyError;
use shared::{Order, OrderSet, Snapshot, BALL_MAX_SPEED};

pub trait DecisionPolicy: Send + Sync {
    fn decide(&self, snapshot: &Snapshot) -> Result<OrderSet, PolicyError>;
}

impl<F> DecisionPolicy for F
where
    F: Fn(&Snapshot) -> Result<OrderSet, PolicyError> + Send + Sync,
{
    fn decide(&self, snapshot: &Snapshot) -> Result<OrderSet, PolicyError> {
        self(snapshot)
    }
}

/// Shirt number that runs after the ball instead of waiting for it
pub const PLAYMAKER_NUMBER: u32 = 10;

/// Shoots at the opponent goal whenever it holds the ball. The playmaker
/// chases the ball; everybody else stays put and tries to catch it.
#[derive(Debug, Clone, Copy)]
pub struct ChaseAndShoot {
    identity: PlayerIdentity,
}

impl ChaseAndShoot {
    pub fn new(identity: PlayerIdentity) -> Self {
        Self { identity }
    }
}

impl DecisionPolicy for ChaseAndShoot {
    fn decide(&self, snapshot: &Snapshot) -> Result<OrderSet, PolicyError> {
        let PlayerIdentity {
            team_side, number, ..
        } = self.identity;

        let me = snapshot
            .player(team_side, number)
            .ok_or(PolicyError::PlayerNotFound {
                team: team_side,
                number,
            })?;

        let orders = if snapshot.is_ball_holder(me) {
            let target = me.team_side.opponent_goal().center;
            vec![Order::kick(&snapshot.ball, target, BALL_MAX_SPEED)?]
        } else if me.number == PLAYMAKER_NUMBER {
            vec![
                Order::move_max_speed(me.position, snapshot.ball.position)?,
                Order::catch(),
            ]
        } else {
            vec![Order::catch()]
        };

        Ok(OrderSet::new(orders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        Ball, BallHolder, MatchState, Player, Point, Team, TeamSide, Velocity,
        PLAYER_MAX_SPEED,
    };

    fn identity(team_side: TeamSide, number: u32) -> PlayerIdentity {
        PlayerIdentity {
            team_side,
            number,
            initial_position: Point::new(0, 0),
        }
    }

    fn snapshot_with(me: Player, holder: Option<BallHolder>, ball_at: Point) -> Snapshot {
        let mut home = Team::new(TeamSide::Home);
        let mut away = Team::new(TeamSide::Away);
        match me.team_side {
            TeamSide::Home => home.players.push(me),
            TeamSide::Away => away.players.push(me),
        }

        Snapshot {
            turn: 1,
            state: MatchState::Playing,
            home,
            away,
            ball: Ball {
                position: ball_at,
                velocity: Velocity::default(),
                holder,
            },
        }
    }

    #[test]
    fn test_holder_kicks_at_opponent_goal() {
        let me = Player::new(4, TeamSide::Away, Point::new(8_000, 5_000));
        let snapshot = snapshot_with(
            me,
            Some(BallHolder {
                team_side: TeamSide::Away,
                number: 4,
            }),
            Point::new(8_000, 5_000),
        );

        let order_set = ChaseAndShoot::new(identity(TeamSide::Away, 4))
            .decide(&snapshot)
            .unwrap();

        assert_eq!(order_set.len(), 1);
        match &order_set.orders[0] {
            Order::Kick { velocity } => {
                assert_eq!(velocity.speed, BALL_MAX_SPEED);
                // away attacks the home goal on the left edge
                assert!(velocity.direction.x < 0.0);
            }
            other => panic!("Expected kick, got {:?}", other),
        }
    }

    #[test]
    fn test_playmaker_chases_then_catches() {
        let me = Player::new(PLAYMAKER_NUMBER, TeamSide::Home, Point::new(1_000, 1_000));
        let snapshot = snapshot_with(me, None, Point::new(4_000, 5_000));

        let order_set = ChaseAndShoot::new(identity(TeamSide::Home, PLAYMAKER_NUMBER))
            .decide(&snapshot)
            .unwrap();

        assert_eq!(order_set.len(), 2);
        assert!(matches!(
            &order_set.orders[0],
            Order::Move { velocity } if velocity.speed == PLAYER_MAX_SPEED
        ));
        assert_eq!(order_set.orders[1], Order::Catch);
    }

    #[test]
    fn test_other_players_catch() {
        let me = Player::new(6, TeamSide::Home, Point::new(1_000, 1_000));
        let snapshot = snapshot_with(
            me,
            Some(BallHolder {
                team_side: TeamSide::Away,
                number: 6,
            }),
            Point::new(4_000, 5_000),
        );

        let order_set = ChaseAndShoot::new(identity(TeamSide::Home, 6))
            .decide(&snapshot)
            .unwrap();

        assert_eq!(order_set.orders, vec![Order::Catch]);
    }

    #[test]
    fn test_missing_player_is_an_error() {
        let someone = Player::new(2, TeamSide::Home, Point::new(1_000, 1_000));
        let snapshot = snapshot_with(someone, None, Point::new(4_000, 5_000));

        let result = ChaseAndShoot::new(identity(TeamSide::Home, 9)).decide(&snapshot);
        assert!(matches!(
            result,
            Err(PolicyError::PlayerNotFound { number: 9, .. })
        ));
    }

    #[test]
    fn test_playmaker_on_the_ball_spot_fails_cleanly() {
        let spot = Point::new(3_000, 3_000);
        let me = Player::new(PLAYMAKER_NUMBER, TeamSide::Home, spot);
        let snapshot = snapshot_with(me, None, spot);

        let result = ChaseAndShoot::new(identity(TeamSide::Home, PLAYMAKER_NUMBER)).decide(&snapshot);
        assert!(matches!(result, Err(PolicyError::Order(_))));
    }

    #[test]
    fn test_closures_are_policies() {
        let policy = |snapshot: &Snapshot| -> Result<OrderSet, PolicyError> {
            Ok(OrderSet::new(vec![Order::catch()]).with_debug_message(format!("turn {}", snapshot.turn)))
        };

        let me = Player::new(1, TeamSide::Home, Point::new(0, 0));
        let order_set = policy.decide(&snapshot_with(me, None, Point::new(10, 10))).unwrap();
        assert_eq!(order_set.debug_message.as_deref(), Some("turn 1"));
    }
}
