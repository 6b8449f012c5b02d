//! Room actor
//!
//! A room is a fixed set of numbered seats. Viewers bind a byte channel to
//! a seat; whatever one bound seat broadcasts reaches every bound seat,
//! the sender included.
//!
//! One task owns the room state. [`RoomHandle`] talks to it over a command
//! channel, each command carrying a oneshot for the reply.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::registry::RoomRegistry;
use crate::error::{Result, SightlineError};

/// Room ids are `r<N>` with `N` below this
pub const MAX_ROOM_ID: u64 = 341_592_653;

/// Commands queued per room before senders wait
const COMMAND_BUFFER: usize = 32;

/// Idle check period used when a zero timeout is requested
const FALLBACK_IDLE_CHECK: Duration = Duration::from_secs(1);

/// Channel a viewer receives broadcast bytes on
pub type ClientSender = mpsc::Sender<Bytes>;

enum RoomCommand {
    ClaimSeat {
        reply: oneshot::Sender<Result<u32>>,
    },
    SetClient {
        seat: u32,
        client: ClientSender,
        reply: oneshot::Sender<Result<()>>,
    },
    RemoveClient {
        seat: u32,
        /// Only free the seat while it is bound to this channel
        only: Option<ClientSender>,
        reply: oneshot::Sender<Result<()>>,
    },
    Broadcast {
        from: u32,
        data: Bytes,
        reply: oneshot::Sender<Result<usize>>,
    },
    BoundSeats {
        reply: oneshot::Sender<Vec<u32>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable address of a running room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: String,
    capacity: u32,
    tx: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ClaimSeat { .. } => "ClaimSeat",
            Self::SetClient { .. } => "SetClient",
            Self::RemoveClient { .. } => "RemoveClient",
            Self::Broadcast { .. } => "Broadcast",
            Self::BoundSeats { .. } => "BoundSeats",
            Self::Stop { .. } => "Stop",
        };
        f.write_str(name)
    }
}

impl RoomHandle {
    /// Spawn a room task
    ///
    /// With a registry the room registers itself under a fresh id and
    /// deregisters when it stops.
    /// A zero `idle_timeout` is raised to one second.
    pub fn spawn(capacity: u32, idle_timeout: Duration, registry: Option<RoomRegistry>) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let idle_timeout = if idle_timeout.is_zero() {
            warn!("Zero room idle timeout, checking every {:?}", FALLBACK_IDLE_CHECK);
            FALLBACK_IDLE_CHECK
        } else {
            idle_timeout
        };

        let id = match &registry {
            Some(registry) => loop {
                let id = new_room_id();
                if registry.get(&id).is_none() {
                    break id;
                }
            },
            None => new_room_id(),
        };

        let handle = Self {
            id: id.clone(),
            capacity,
            tx,
        };

        if let Some(registry) = &registry {
            registry.add(handle.clone());
        }

        let room = Room {
            id,
            capacity,
            next_seat: 1,
            seats: vec![None; capacity as usize],
            registry,
        };
        tokio::spawn(room.run(rx, idle_timeout));

        handle
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Whether the room task has ended
    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }

    /// Reserve the next free seat
    pub async fn claim_seat(&self) -> Result<u32> {
        self.request(|reply| RoomCommand::ClaimSeat { reply }).await?
    }

    /// Bind `client` to `seat`, replacing any previous client
    pub async fn set_client(&self, seat: u32, client: ClientSender) -> Result<()> {
        self.request(|reply| RoomCommand::SetClient {
            seat,
            client,
            reply,
        })
        .await?
    }

    /// Free `seat`
    pub async fn remove_client(&self, seat: u32) -> Result<()> {
        self.request(|reply| RoomCommand::RemoveClient {
            seat,
            only: None,
            reply,
        })
        .await?
    }

    /// Free `seat` if `client` is still the one bound to it
    pub async fn release_client(&self, seat: u32, client: ClientSender) -> Result<()> {
        self.request(|reply| RoomCommand::RemoveClient {
            seat,
            only: Some(client),
            reply,
        })
        .await?
    }

    /// Send `data` to every bound seat
    ///
    /// Returns how many clients the data was queued for.
    pub async fn broadcast(&self, from: u32, data: Bytes) -> Result<usize> {
        self.request(|reply| RoomCommand::Broadcast { from, data, reply })
            .await?
    }

    /// Seats that currently have a client
    pub async fn bound_seats(&self) -> Result<Vec<u32>> {
        self.request(|reply| RoomCommand::BoundSeats { reply }).await
    }

    /// Stop the room and drop its clients
    pub async fn stop(&self) -> Result<()> {
        match self.request(|reply| RoomCommand::Stop { reply }).await {
            Ok(()) | Err(SightlineError::RoomStopped(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| SightlineError::RoomStopped(self.id.clone()))?;
        rx.await
            .map_err(|_| SightlineError::RoomStopped(self.id.clone()))
    }
}

impl std::fmt::Display for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

fn new_room_id() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % MAX_ROOM_ID as u128;
    format!("r{}", n)
}

struct Room {
    id: String,
    capacity: u32,
    /// Lowest seat a claim starts searching from
    next_seat: u32,
    /// Index `seat - 1`
    seats: Vec<Option<ClientSender>>,
    registry: Option<RoomRegistry>,
}

impl Room {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>, idle_timeout: Duration) {
        info!("Room {} started with {} seats", self.id, self.capacity);

        let mut idle = tokio::time::interval_at(Instant::now() + idle_timeout, idle_timeout);
        idle.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else {
                        debug!("Room {} has no handles left", self.id);
                        break;
                    };
                    if !self.handle(command) {
                        break;
                    }
                }
                _ = idle.tick() => {
                    if self.is_empty() {
                        info!("Room {} became inactive, stopped", self.id);
                        break;
                    }
                }
            }
        }

        if let Some(registry) = self.registry.take() {
            registry.remove(&self.id);
        }
        info!("Room {} stopped", self.id);
    }

    /// Returns false once the room should stop
    fn handle(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::ClaimSeat { reply } => {
                let _ = reply.send(self.claim_seat());
            }
            RoomCommand::SetClient {
                seat,
                client,
                reply,
            } => {
                let _ = reply.send(self.set_client(seat, client));
            }
            RoomCommand::RemoveClient { seat, only, reply } => {
                let result = match only {
                    Some(client) => self.release_client(seat, &client),
                    None => self.remove_client(seat),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Broadcast { from, data, reply } => {
                let _ = reply.send(self.broadcast(from, data));
            }
            RoomCommand::BoundSeats { reply } => {
                let _ = reply.send(self.bound_seats());
            }
            RoomCommand::Stop { reply } => {
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn claim_seat(&mut self) -> Result<u32> {
        for seat in self.next_seat..=self.capacity {
            if self.seats[seat as usize - 1].is_none() {
                self.next_seat = seat + 1;
                debug!("Room {} handed out seat {}", self.id, seat);
                return Ok(seat);
            }
        }
        Err(SightlineError::RoomFull)
    }

    fn slot(&mut self, seat: u32) -> Result<&mut Option<ClientSender>> {
        if seat == 0 || seat > self.capacity {
            return Err(SightlineError::SeatNotInRoom(seat));
        }
        Ok(&mut self.seats[seat as usize - 1])
    }

    fn set_client(&mut self, seat: u32, client: ClientSender) -> Result<()> {
        *self.slot(seat)? = Some(client);
        debug!("Room {} seat {} bound", self.id, seat);
        Ok(())
    }

    fn remove_client(&mut self, seat: u32) -> Result<()> {
        *self.slot(seat)? = None;
        if seat < self.next_seat {
            self.next_seat = seat;
        }
        debug!("Room {} seat {} freed", self.id, seat);
        Ok(())
    }

    fn release_client(&mut self, seat: u32, client: &ClientSender) -> Result<()> {
        let still_bound = matches!(self.slot(seat)?, Some(bound) if bound.same_channel(client));
        if still_bound {
            self.remove_client(seat)
        } else {
            Ok(())
        }
    }

    fn broadcast(&mut self, from: u32, data: Bytes) -> Result<usize> {
        if !matches!(self.slot(from)?, Some(_)) {
            return Err(SightlineError::SeatNotInRoom(from));
        }

        let mut delivered = 0;
        let mut closed = Vec::new();

        for (index, slot) in self.seats.iter().enumerate() {
            let Some(client) = slot else { continue };
            let seat = index as u32 + 1;
            match client.try_send(data.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Room {} seat {} is lagging, chunk dropped", self.id, seat);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(seat),
            }
        }

        for seat in closed {
            debug!("Room {} seat {} disconnected", self.id, seat);
            let _ = self.remove_client(seat);
        }

        Ok(delivered)
    }

    fn bound_seats(&self) -> Vec<u32> {
        self.seats
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| index as u32 + 1)
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.seats.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_secs(180);

    #[tokio::test]
    async fn test_room_id_format() {
        let room = RoomHandle::spawn(8, IDLE, None);
        let n: u64 = room.id().strip_prefix('r').unwrap().parse().unwrap();
        assert!(n < MAX_ROOM_ID);
        room.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_idle_timeout_still_runs() {
        let room = RoomHandle::spawn(2, Duration::ZERO, None);
        assert_eq!(room.claim_seat().await.unwrap(), 1);
        room.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_until_full() {
        let room = RoomHandle::spawn(2, IDLE, None);
        assert_eq!(room.claim_seat().await.unwrap(), 1);
        assert_eq!(room.claim_seat().await.unwrap(), 2);
        assert!(matches!(room.claim_seat().await, Err(SightlineError::RoomFull)));
    }

    #[tokio::test]
    async fn test_removed_seat_is_reused() {
        let room = RoomHandle::spawn(3, IDLE, None);
        let (tx, _rx) = mpsc::channel(4);
        for _ in 0..3 {
            let seat = room.claim_seat().await.unwrap();
            room.set_client(seat, tx.clone()).await.unwrap();
        }
        room.remove_client(2).await.unwrap();
        assert_eq!(room.claim_seat().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_seat_rejected() {
        let room = RoomHandle::spawn(8, IDLE, None);
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            room.set_client(0, tx.clone()).await,
            Err(SightlineError::SeatNotInRoom(0))
        ));
        assert!(room.set_client(9, tx).await.is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_sender_too() {
        let room = RoomHandle::spawn(8, IDLE, None);
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        room.set_client(1, tx1).await.unwrap();
        room.set_client(2, tx2).await.unwrap();

        let sent = room.broadcast(1, Bytes::from_static(b"frame")).await.unwrap();
        assert_eq!(sent, 2);
        assert_eq!(rx1.recv().await.unwrap(), Bytes::from_static(b"frame"));
        assert_eq!(rx2.recv().await.unwrap(), Bytes::from_static(b"frame"));
    }

    #[tokio::test]
    async fn test_broadcast_from_unbound_seat_fails() {
        let room = RoomHandle::spawn(8, IDLE, None);
        assert!(matches!(
            room.broadcast(3, Bytes::from_static(b"x")).await,
            Err(SightlineError::SeatNotInRoom(3))
        ));
    }

    #[tokio::test]
    async fn test_closed_client_is_unbound() {
        let room = RoomHandle::spawn(8, IDLE, None);
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, rx2) = mpsc::channel(4);
        room.set_client(1, tx1).await.unwrap();
        room.set_client(2, tx2).await.unwrap();
        drop(rx2);

        assert_eq!(room.broadcast(1, Bytes::from_static(b"x")).await.unwrap(), 1);
        assert_eq!(room.bound_seats().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_release_ignores_rebound_seat() {
        let room = RoomHandle::spawn(8, IDLE, None);
        let (old, _old_rx) = mpsc::channel(1);
        let (new, _new_rx) = mpsc::channel(1);
        room.set_client(1, old.clone()).await.unwrap();
        room.set_client(1, new).await.unwrap();

        room.release_client(1, old).await.unwrap();
        assert_eq!(room.bound_seats().await.unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_room_stops_and_deregisters() {
        let registry = RoomRegistry::new();
        let room = RoomHandle::spawn(8, IDLE, Some(registry.clone()));
        assert!(registry.get(room.id()).is_some());

        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;

        assert!(registry.get(room.id()).is_none());
        assert!(matches!(
            room.claim_seat().await,
            Err(SightlineError::RoomStopped(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_occupied_room_survives_idle_check() {
        let registry = RoomRegistry::new();
        let room = RoomHandle::spawn(8, IDLE, Some(registry.clone()));
        let (tx, _rx) = mpsc::channel(1);
        room.set_client(1, tx).await.unwrap();

        tokio::time::sleep(IDLE * 2).await;
        assert!(registry.get(room.id()).is_some());
        assert_eq!(room.bound_seats().await.unwrap(), vec![1]);
    }
}
