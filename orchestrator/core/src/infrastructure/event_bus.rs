// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Fleet Events
//
// In-memory event streaming over tokio broadcast channels. Consumers
// (CLI printers, trajectory recorders, visualisers) never feed back into
// planning.

use crate::domain::events::{MapEvent, MissionEvent, ParkingEvent};
use crate::domain::robot::RobotId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified fleet event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FleetEvent {
    Mission(MissionEvent),
    Parking(ParkingEvent),
    Map(MapEvent),
}

/// Event bus for publishing and subscribing to fleet events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<FleetEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Older events are dropped for slow receivers once it fills.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_mission_event(&self, event: MissionEvent) {
        self.publish(FleetEvent::Mission(event));
    }

    pub fn publish_parking_event(&self, event: ParkingEvent) {
        self.publish(FleetEvent::Parking(event));
    }

    pub fn publish_map_event(&self, event: MapEvent) {
        self.publish(FleetEvent::Map(event));
    }

    fn publish(&self, event: FleetEvent) {
        // send() only fails when nobody is subscribed
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all fleet events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to mission events of one robot only
    pub fn subscribe_robot(&self, robot: RobotId) -> RobotEventReceiver {
        RobotEventReceiver {
            receiver: self.sender.subscribe(),
            robot,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all fleet events
pub struct EventReceiver {
    receiver: broadcast::Receiver<FleetEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<FleetEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<FleetEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one robot's mission events
pub struct RobotEventReceiver {
    receiver: broadcast::Receiver<FleetEvent>,
    robot: RobotId,
}

impl RobotEventReceiver {
    pub async fn recv(&mut self) -> Result<MissionEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let FleetEvent::Mission(mission_event) = event {
                if mission_event.robot() == &self.robot {
                    return Ok(mission_event);
                }
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Point2;
    use crate::domain::mission::MissionId;
    use chrono::Utc;

    fn started(robot: &str) -> MissionEvent {
        MissionEvent::MissionStarted {
            mission_id: MissionId::new(),
            robot: RobotId::new(robot),
            goal: Point2::new(1.0, 2.0),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish_mission_event(started("Rob0"));

        match receiver.recv().await.unwrap() {
            FleetEvent::Mission(MissionEvent::MissionStarted { robot, goal, .. }) => {
                assert_eq!(robot, RobotId::new("Rob0"));
                assert_eq!(goal, Point2::new(1.0, 2.0));
            }
            other => panic!("Wrong event type received: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_robot_event_filtering() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_robot(RobotId::new("Rob1"));

        event_bus.publish_mission_event(started("Rob0"));
        event_bus.publish_map_event(MapEvent::MapGrown {
            old_size: 225,
            new_size: 301,
            grown_at: Utc::now(),
        });
        event_bus.publish_mission_event(started("Rob1"));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.robot(), &RobotId::new("Rob1"));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish_parking_event(ParkingEvent::RobotReturned {
            robot: RobotId::new("Rob1"),
            home: Point2::new(0.0, -0.7),
            returned_at: Utc::now(),
        });

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::new(4);
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(FleetEvent::Mission(started("Rob2"))).unwrap();
        assert_eq!(json["type"], "mission");
    }
}
