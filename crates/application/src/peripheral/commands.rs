use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use domain::DomainError;
use domain::protocol::{CommandId, LedState, MotorDirection, RobotCommand, SensorReading};
use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use super::decoder::InboundFrame;
use super::manager::{ConnectionManager, SendOutcome, Shared};

/// A GET_* request waiting for its reply.
///
/// Dropping the handle, or a timed out [`ReplyHandle::wait`], withdraws the
/// request so a late reply only refreshes the cache.
pub struct ReplyHandle {
    outcome: SendOutcome,
    reply: Option<oneshot::Receiver<SensorReading>>,
    seq: Option<u64>,
    shared: Weak<Shared>,
    timeout: Duration,
}

impl fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("outcome", &self.outcome)
            .field("seq", &self.seq)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ReplyHandle {
    fn unsent(outcome: SendOutcome, timeout: Duration) -> Self {
        Self {
            outcome,
            reply: None,
            seq: None,
            shared: Weak::new(),
            timeout,
        }
    }

    /// What happened to the request frame
    pub fn outcome(&self) -> SendOutcome {
        self.outcome
    }

    /// Wait for the reply. `None` when the request was never sent, the
    /// session went away, or the reply timeout elapsed.
    pub async fn wait(mut self) -> Option<SensorReading> {
        let reply = self.reply.take()?;
        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(reading)) => Some(reading),
            Ok(Err(_)) => None,
            Err(_) => {
                debug!(seq = ?self.seq, timeout_ms = self.timeout.as_millis() as u64, "Reply timed out");
                None
            }
        }
    }
}

impl Drop for ReplyHandle {
    fn drop(&mut self) {
        let Some(seq) = self.seq.take() else {
            return;
        };
        if let Some(shared) = self.shared.upgrade() {
            shared.decoder.cancel_reply(seq);
        }
    }
}

impl ConnectionManager {
    /// Encode `command` and send it through the rate limiter
    pub async fn execute(&self, command: RobotCommand) -> Result<SendOutcome, DomainError> {
        let frame = command.to_frame()?;
        debug!(command = %command.command_id(), bytes = ?frame.as_bytes(), "Executing command");
        self.send(frame, true).await
    }

    pub async fn set_led_rgb(&self, red: u8, green: u8, blue: u8) -> Result<SendOutcome, DomainError> {
        self.execute(RobotCommand::LedRgb { red, green, blue }).await
    }

    pub async fn set_traffic_light(
        &self,
        port: u8,
        red: LedState,
        yellow: LedState,
        green: LedState,
    ) -> Result<SendOutcome, DomainError> {
        self.execute(RobotCommand::TrafficLight {
            port,
            red,
            yellow,
            green,
        })
        .await
    }

    pub async fn set_motor_direction(
        &self,
        port: u8,
        direction: MotorDirection,
    ) -> Result<SendOutcome, DomainError> {
        self.execute(RobotCommand::MotorDirection { port, direction })
            .await
    }

    pub async fn set_motor_power(&self, port: u8, power: u8) -> Result<SendOutcome, DomainError> {
        self.execute(RobotCommand::MotorPower { port, power }).await
    }

    /// Direction and power in one frame
    pub async fn set_motor(
        &self,
        port: u8,
        direction: MotorDirection,
        power: u8,
    ) -> Result<SendOutcome, DomainError> {
        self.execute(RobotCommand::MotorFullControl {
            port,
            direction,
            power,
        })
        .await
    }

    pub async fn set_all_motors(
        &self,
        direction: MotorDirection,
        power: u8,
    ) -> Result<SendOutcome, DomainError> {
        self.execute(RobotCommand::AllMotorsFullControl { direction, power })
            .await
    }

    /// Angles above 180 are clamped
    pub async fn set_servo_angles(&self, port: u8, angles: [u8; 3]) -> Result<SendOutcome, DomainError> {
        self.execute(RobotCommand::ServoAngles { port, angles })
            .await
    }

    /// Fire a GET_* request; the reply arrives as a `ReadingUpdated` event
    pub async fn query_sensor(&self, command: CommandId, port: u8) -> Result<SendOutcome, DomainError> {
        self.execute(RobotCommand::Query { command, port }).await
    }

    pub async fn query_button_state(&self, port: u8) -> Result<SendOutcome, DomainError> {
        self.query_sensor(CommandId::GetButtonState, port).await
    }

    pub async fn query_ultrasonic_distance(&self, port: u8) -> Result<SendOutcome, DomainError> {
        self.query_sensor(CommandId::GetUltrasonic, port).await
    }

    /// Send a GET_* request and return a handle resolving to its reply
    pub async fn request_reading(&self, command: CommandId, port: u8) -> Result<ReplyHandle, DomainError> {
        let frame = RobotCommand::Query { command, port }.to_frame()?;
        let timeout = Duration::from_millis(self.shared.settings.reply_timeout_ms);

        // Registered before sending so a fast reply cannot be missed
        let (seq, reply) = self.shared.decoder.expect_reply(command, port)?;

        match self.send(frame, true).await {
            Ok(SendOutcome::Sent) => Ok(ReplyHandle {
                outcome: SendOutcome::Sent,
                reply: Some(reply),
                seq: Some(seq),
                shared: Arc::downgrade(&self.shared),
                timeout,
            }),
            Ok(outcome) => {
                self.shared.decoder.cancel_reply(seq);
                Ok(ReplyHandle::unsent(outcome, timeout))
            }
            Err(e) => {
                self.shared.decoder.cancel_reply(seq);
                Err(e)
            }
        }
    }

    /// Most recent reply for (command, port), from polling or queries
    pub fn latest_reading(&self, command: CommandId, port: u8) -> Option<SensorReading> {
        self.shared.decoder.latest(command, port)
    }

    /// Raw inbound bytes, including frames that are not readings
    pub fn subscribe_inbound(&self) -> broadcast::Receiver<InboundFrame> {
        self.shared.decoder.subscribe()
    }
}
