//! Wire protocol of the robot controller

mod assembler;
mod command;
mod frame;
mod reply;
mod robot_command;

pub use assembler::FrameAssembler;
pub use command::{CommandId, LedState, MotorDirection, MotorSubCommand};
pub use frame::{CommandFrame, LENGTH_PREFIX_LEN, MAX_PAYLOAD_LEN};
pub use reply::{MAX_REPLY_LEN, ReplyLayout, SensorReading, SensorValue};
pub use robot_command::{RobotCommand, SERVO_MAX_ANGLE};
