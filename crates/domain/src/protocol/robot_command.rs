use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

use super::command::{CommandId, LedState, MotorDirection, MotorSubCommand};
use super::frame::CommandFrame;

/// Highest servo angle the controller accepts
pub const SERVO_MAX_ANGLE: u8 = 180;

/// High-level intents understood by the controller.
///
/// Arguments are expected to be validated by the caller; the only
/// correction applied here is clamping servo angles into range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobotCommand {
    LedRgb {
        red: u8,
        green: u8,
        blue: u8,
    },
    TrafficLight {
        port: u8,
        red: LedState,
        yellow: LedState,
        green: LedState,
    },
    MotorDirection {
        port: u8,
        direction: MotorDirection,
    },
    MotorPower {
        port: u8,
        power: u8,
    },
    MotorFullControl {
        port: u8,
        direction: MotorDirection,
        power: u8,
    },
    AllMotorsFullControl {
        direction: MotorDirection,
        power: u8,
    },
    ServoAngles {
        port: u8,
        angles: [u8; 3],
    },
    /// Any GET_* request addressed to a port
    Query {
        command: CommandId,
        port: u8,
    },
}

impl RobotCommand {
    pub fn command_id(&self) -> CommandId {
        match self {
            Self::LedRgb { .. } => CommandId::PutLedRgb,
            Self::TrafficLight { .. } => CommandId::PutLedTraffic,
            Self::MotorDirection { .. }
            | Self::MotorPower { .. }
            | Self::MotorFullControl { .. }
            | Self::AllMotorsFullControl { .. } => CommandId::PutDcMotor,
            Self::ServoAngles { .. } => CommandId::PutServo,
            Self::Query { command, .. } => *command,
        }
    }

    pub fn payload(&self) -> Result<Vec<u8>> {
        let payload = match *self {
            Self::LedRgb { red, green, blue } => vec![red, green, blue],
            // The controller expects the lamps bottom-up: green, yellow, red
            Self::TrafficLight {
                port,
                red,
                yellow,
                green,
            } => vec![port, green.as_u8(), yellow.as_u8(), red.as_u8()],
            Self::MotorDirection { port, direction } => vec![
                MotorSubCommand::PortDirection.as_u8(),
                port,
                direction.as_u8(),
            ],
            Self::MotorPower { port, power } => {
                vec![MotorSubCommand::PortPower.as_u8(), port, power]
            }
            Self::MotorFullControl {
                port,
                direction,
                power,
            } => vec![
                MotorSubCommand::PortFullControl.as_u8(),
                port,
                direction.as_u8(),
                power,
            ],
            Self::AllMotorsFullControl { direction, power } => vec![
                MotorSubCommand::AllPortsFullControl.as_u8(),
                direction.as_u8(),
                power,
            ],
            Self::ServoAngles { port, angles } => {
                let mut payload = vec![port];
                payload.extend(angles.iter().map(|a| (*a).min(SERVO_MAX_ANGLE)));
                payload
            }
            Self::Query { command, port } => {
                if !command.is_query() {
                    return Err(DomainError::InvalidState(format!(
                        "{} is not a query command",
                        command
                    )));
                }
                vec![port]
            }
        };
        Ok(payload)
    }

    /// Encode into a fresh wire frame
    pub fn to_frame(&self) -> Result<CommandFrame> {
        CommandFrame::encode(self.command_id(), &self.payload()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_rgb_frame() {
        let cmd = RobotCommand::LedRgb {
            red: 0xFF,
            green: 0x00,
            blue: 0x80,
        };
        assert_eq!(
            cmd.to_frame().unwrap().as_bytes(),
            &[0x04, 0x00, 0x00, 0xFF, 0x00, 0x80]
        );
    }

    #[test]
    fn test_traffic_light_payload_order() {
        let cmd = RobotCommand::TrafficLight {
            port: 1,
            red: LedState::On,
            yellow: LedState::Off,
            green: LedState::Off,
        };
        let frame = cmd.to_frame().unwrap();
        assert_eq!(frame.command_byte(), 0x01);
        assert_eq!(frame.payload(), &[0x01, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_motor_frames() {
        let power = RobotCommand::MotorPower { port: 0, power: 75 }.to_frame().unwrap();
        assert_eq!(power.command_byte(), 0x02);
        assert_eq!(power.payload(), &[0x01, 0x00, 0x4B]);

        let direction = RobotCommand::MotorDirection {
            port: 1,
            direction: MotorDirection::CounterClockwise,
        }
        .to_frame()
        .unwrap();
        assert_eq!(direction.payload(), &[0x00, 0x01, 0x01]);

        let full = RobotCommand::MotorFullControl {
            port: 1,
            direction: MotorDirection::Clockwise,
            power: 100,
        }
        .to_frame()
        .unwrap();
        assert_eq!(full.as_bytes(), &[0x05, 0x00, 0x02, 0x02, 0x01, 0x00, 0x64]);

        let all = RobotCommand::AllMotorsFullControl {
            direction: MotorDirection::CounterClockwise,
            power: 50,
        }
        .to_frame()
        .unwrap();
        assert_eq!(all.payload(), &[0x03, 0x01, 0x32]);
    }

    #[test]
    fn test_servo_angles_are_clamped() {
        let cmd = RobotCommand::ServoAngles {
            port: 0,
            angles: [0, 200, 180],
        };
        let frame = cmd.to_frame().unwrap();
        assert_eq!(frame.command_byte(), 0x05);
        assert_eq!(frame.payload(), &[0x00, 0x00, 180, 180]);
    }

    #[test]
    fn test_query_frames() {
        let frame = RobotCommand::Query {
            command: CommandId::GetUltrasonic,
            port: 1,
        }
        .to_frame()
        .unwrap();
        assert_eq!(frame.as_bytes(), &[0x02, 0x00, 0x06, 0x01]);
    }

    #[test]
    fn test_query_rejects_put_command() {
        let cmd = RobotCommand::Query {
            command: CommandId::PutBuzzer,
            port: 0,
        };
        assert!(matches!(cmd.to_frame(), Err(DomainError::InvalidState(_))));
    }
}
