use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Top-level command identifiers (byte 2 of every frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandId {
    #[serde(rename = "PUT_LEDRGB")]
    PutLedRgb = 0x00,
    #[serde(rename = "PUT_LEDTRAFFIC")]
    PutLedTraffic = 0x01,
    #[serde(rename = "PUT_DCMOTOR")]
    PutDcMotor = 0x02,
    #[serde(rename = "PUT_LCD")]
    PutLcd = 0x03,
    #[serde(rename = "PUT_BUZZER")]
    PutBuzzer = 0x04,
    #[serde(rename = "PUT_SERVO")]
    PutServo = 0x05,
    #[serde(rename = "GET_ULTRASONIC")]
    GetUltrasonic = 0x06,
    #[serde(rename = "GET_GAS")]
    GetGas = 0x07,
    #[serde(rename = "GET_PHOTORES")]
    GetPhotoresistor = 0x08,
    #[serde(rename = "GET_TEMPERATURE")]
    GetTemperature = 0x09,
    #[serde(rename = "GET_IR_SENSOR")]
    GetIrSensor = 0x0A,
    #[serde(rename = "GET_VAR_RES")]
    GetVariableResistor = 0x0B,
    #[serde(rename = "GET_BUTTON_STATE")]
    GetButtonState = 0x0C,
}

impl CommandId {
    pub const ALL: [CommandId; 13] = [
        Self::PutLedRgb,
        Self::PutLedTraffic,
        Self::PutDcMotor,
        Self::PutLcd,
        Self::PutBuzzer,
        Self::PutServo,
        Self::GetUltrasonic,
        Self::GetGas,
        Self::GetPhotoresistor,
        Self::GetTemperature,
        Self::GetIrSensor,
        Self::GetVariableResistor,
        Self::GetButtonState,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// GET_* commands expect a reply from the controller
    pub fn is_query(self) -> bool {
        self.as_u8() >= Self::GetUltrasonic.as_u8()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PutLedRgb => "PUT_LEDRGB",
            Self::PutLedTraffic => "PUT_LEDTRAFFIC",
            Self::PutDcMotor => "PUT_DCMOTOR",
            Self::PutLcd => "PUT_LCD",
            Self::PutBuzzer => "PUT_BUZZER",
            Self::PutServo => "PUT_SERVO",
            Self::GetUltrasonic => "GET_ULTRASONIC",
            Self::GetGas => "GET_GAS",
            Self::GetPhotoresistor => "GET_PHOTORES",
            Self::GetTemperature => "GET_TEMPERATURE",
            Self::GetIrSensor => "GET_IR_SENSOR",
            Self::GetVariableResistor => "GET_VAR_RES",
            Self::GetButtonState => "GET_BUTTON_STATE",
        }
    }
}

impl TryFrom<u8> for CommandId {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_u8() == value)
            .ok_or(DomainError::UnknownCommand(value))
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-opcodes of PUT_DCMOTOR (first payload byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MotorSubCommand {
    PortDirection = 0x00,
    PortPower = 0x01,
    PortFullControl = 0x02,
    AllPortsFullControl = 0x03,
}

impl MotorSubCommand {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Rotation direction of a DC motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MotorDirection {
    #[default]
    #[serde(rename = "CW")]
    Clockwise = 0x00,
    #[serde(rename = "CCW")]
    CounterClockwise = 0x01,
}

impl MotorDirection {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::str::FromStr for MotorDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CW" => Ok(Self::Clockwise),
            "CCW" => Ok(Self::CounterClockwise),
            other => Err(format!("unknown motor direction: {other} (expected CW or CCW)")),
        }
    }
}

/// On/off state of a single traffic-light LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LedState {
    #[default]
    #[serde(rename = "OFF")]
    Off = 0x00,
    #[serde(rename = "ON")]
    On = 0x01,
}

impl LedState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::str::FromStr for LedState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            other => Err(format!("unknown LED state: {other} (expected ON or OFF)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_id_values() {
        assert_eq!(CommandId::PutLedRgb.as_u8(), 0x00);
        assert_eq!(CommandId::PutDcMotor.as_u8(), 0x02);
        assert_eq!(CommandId::PutServo.as_u8(), 0x05);
        assert_eq!(CommandId::GetUltrasonic.as_u8(), 0x06);
        assert_eq!(CommandId::GetButtonState.as_u8(), 0x0C);
    }

    #[test]
    fn test_command_id_try_from() {
        for id in CommandId::ALL {
            assert_eq!(CommandId::try_from(id.as_u8()), Ok(id));
        }
        assert_eq!(
            CommandId::try_from(0x0D),
            Err(DomainError::UnknownCommand(0x0D))
        );
    }

    #[test]
    fn test_only_get_commands_are_queries() {
        let queries: Vec<_> = CommandId::ALL.into_iter().filter(|c| c.is_query()).collect();
        assert_eq!(queries.len(), 7);
        assert!(queries.iter().all(|c| c.as_str().starts_with("GET_")));
    }

    #[test]
    fn test_command_id_serde_uses_wire_names() {
        let json = serde_json::to_string(&CommandId::GetPhotoresistor).unwrap();
        assert_eq!(json, "\"GET_PHOTORES\"");
        let parsed: CommandId = serde_json::from_str("\"GET_ULTRASONIC\"").unwrap();
        assert_eq!(parsed, CommandId::GetUltrasonic);
    }

    #[test]
    fn test_motor_sub_commands() {
        assert_eq!(MotorSubCommand::PortDirection.as_u8(), 0x00);
        assert_eq!(MotorSubCommand::PortPower.as_u8(), 0x01);
        assert_eq!(MotorSubCommand::PortFullControl.as_u8(), 0x02);
        assert_eq!(MotorSubCommand::AllPortsFullControl.as_u8(), 0x03);
    }

    #[test]
    fn test_direction_and_led_parsing() {
        assert_eq!("cw".parse::<MotorDirection>(), Ok(MotorDirection::Clockwise));
        assert_eq!(
            "CCW".parse::<MotorDirection>(),
            Ok(MotorDirection::CounterClockwise)
        );
        assert!("left".parse::<MotorDirection>().is_err());
        assert_eq!("on".parse::<LedState>(), Ok(LedState::On));
        assert_eq!(LedState::default(), LedState::Off);
    }
}
