//! Order submission and acknowledgement
//!
//! Orders for a turn are written to the session socket as a single
//! `Packet::Orders` datagram. The receiver task routes the arena's
//! `Packet::OrderAck` replies into a queue which the sender drains until it
//! finds the verdict for the turn it just submitted.
//!
//! Rejections are not errors here: a non-success code is returned inside the
//! [`OrderResponse`] and it is up to the caller to log it. Nothing is retried;
//! a turn whose orders were lost or refused is simply gone.

use crate::error::TransportError;
use bincode::serialize;
use log::debug;
use shared::{OrderResponse, OrderSet, Packet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

/// Arena verdict for one turn, as routed by the session receiver
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub turn: u32,
    pub response: OrderResponse,
}

/// Submits one turn's orders and waits for the server verdict.
pub trait OrderSender {
    fn send(
        &mut self,
        turn: u32,
        order_set: &OrderSet,
    ) -> impl Future<Output = Result<OrderResponse, TransportError>> + Send;
}

pub struct UdpOrderSender {
    socket: Arc<UdpSocket>,
    acks: mpsc::UnboundedReceiver<OrderAck>,
    ack_timeout: Duration,
    last_sent_turn: Option<u32>,
}

impl UdpOrderSender {
    pub fn new(
        socket: Arc<UdpSocket>,
        acks: mpsc::UnboundedReceiver<OrderAck>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            socket,
            acks,
            ack_timeout,
            last_sent_turn: None,
        }
    }

    async fn await_ack(&mut self, turn: u32) -> Result<OrderResponse, TransportError> {
        let deadline = Instant::now() + self.ack_timeout;

        loop {
            match timeout_at(deadline, self.acks.recv()).await {
                Ok(Some(ack)) if ack.turn == turn => return Ok(ack.response),
                Ok(Some(ack)) => {
                    debug!(
                        "Skipping stale acknowledgement for turn {} while waiting on turn {}",
                        ack.turn, turn
                    );
                }
                Ok(None) => return Err(TransportError::Closed),
                Err(_) => return Err(TransportError::AckTimeout(turn)),
            }
        }
    }
}

impl OrderSender for UdpOrderSender {
    async fn send(
        &mut self,
        turn: u32,
        order_set: &OrderSet,
    ) -> Result<OrderResponse, TransportError> {
        if self.last_sent_turn == Some(turn) {
            return Err(TransportError::AlreadySent(turn));
        }

        let packet = Packet::Orders {
            turn,
            order_set: order_set.clone(),
        };
        let data = serialize(&packet)?;

        self.socket.send(&data).await?;
        self.last_sent_turn = Some(turn);

        debug!("Sent {} orders for turn {}", order_set.len(), turn);
        self.await_ack(turn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincode::deserialize;
    use shared::{Order, ResponseCode};

    /// Connected socket pair on loopback: (client side, arena side)
    async fn socket_pair() -> (Arc<UdpSocket>, UdpSocket) {
        let arena = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.connect(arena.local_addr().unwrap()).await.unwrap();
        (Arc::new(client), arena)
    }

    async fn recv_packet(arena: &UdpSocket) -> Packet {
        let mut buffer = [0u8; 2048];
        let (len, _) = arena.recv_from(&mut buffer).await.unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    #[tokio::test]
    async fn test_send_returns_matching_ack() {
        let (client, arena) = socket_pair().await;
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let mut sender = UdpOrderSender::new(client, ack_rx, Duration::from_millis(500));

        ack_tx
            .send(OrderAck {
                turn: 4,
                response: OrderResponse::rejected(ResponseCode::TooLate, "old"),
            })
            .unwrap();
        ack_tx
            .send(OrderAck {
                turn: 5,
                response: OrderResponse::success(),
            })
            .unwrap();

        let response = sender
            .send(5, &OrderSet::new(vec![Order::catch()]))
            .await
            .unwrap();
        assert!(response.is_success());

        match recv_packet(&arena).await {
            Packet::Orders { turn, order_set } => {
                assert_eq!(turn, 5);
                assert_eq!(order_set.orders, vec![Order::Catch]);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejection_is_not_an_error() {
        let (client, _arena) = socket_pair().await;
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let mut sender = UdpOrderSender::new(client, ack_rx, Duration::from_millis(500));

        ack_tx
            .send(OrderAck {
                turn: 9,
                response: OrderResponse::rejected(ResponseCode::InvalidOrder, "bad kick"),
            })
            .unwrap();

        let response = sender.send(9, &OrderSet::default()).await.unwrap();
        let rejection = response.rejection().unwrap();
        assert_eq!(rejection.code, ResponseCode::InvalidOrder);
        assert_eq!(rejection.details, "bad kick");
    }

    #[tokio::test]
    async fn test_missing_ack_times_out() {
        let (client, _arena) = socket_pair().await;
        let (_ack_tx, ack_rx) = mpsc::unbounded_channel();
        let mut sender = UdpOrderSender::new(client, ack_rx, Duration::from_millis(30));

        let result = sender.send(2, &OrderSet::default()).await;
        assert!(matches!(result, Err(TransportError::AckTimeout(2))));
    }

    #[tokio::test]
    async fn test_closed_ack_queue() {
        let (client, _arena) = socket_pair().await;
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        drop(ack_tx);
        let mut sender = UdpOrderSender::new(client, ack_rx, Duration::from_millis(500));

        let result = sender.send(2, &OrderSet::default()).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_second_send_for_same_turn_is_refused() {
        let (client, arena) = socket_pair().await;
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let mut sender = UdpOrderSender::new(client, ack_rx, Duration::from_millis(500));

        ack_tx
            .send(OrderAck {
                turn: 3,
                response: OrderResponse::success(),
            })
            .unwrap();
        assert!(sender.send(3, &OrderSet::default()).await.is_ok());

        let again = sender.send(3, &OrderSet::default()).await;
        assert!(matches!(again, Err(TransportError::AlreadySent(3))));

        // Only the first submission reached the wire
        assert!(matches!(recv_packet(&arena).await, Packet::Orders { turn: 3, .. }));
        let mut buffer = [0u8; 2048];
        let extra =
            tokio::time::timeout(Duration::from_millis(50), arena.recv_from(&mut buffer)).await;
        assert!(extra.is_err());
    }
}
