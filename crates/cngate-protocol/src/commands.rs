use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::{
    ChannelSet, NodeArchi, PowerSource, PowerSupply, SampleAverage, SamplePeriod, TxPower,
};

/// A command sent from the gateway to the control node.
///
/// Commands are parsed from one text line each and encoded to the type +
/// payload part of a wire frame. Parsing is all-or-nothing: a line either
/// yields a complete command or an error, never a partial encode.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Power up the open node
    Start {
        /// Supply to power the node from
        supply: PowerSupply,
    },
    /// Power down the open node
    Stop {
        /// Supply the node was running on
        supply: PowerSupply,
    },
    /// Set the control node clock to gateway wall-clock time
    SetTime {
        /// Unix seconds at capture
        secs: u32,
        /// Microseconds within the second
        micros: u32,
    },
    /// Set the open node identifier
    SetNodeId {
        /// Open node architecture
        archi: NodeArchi,
        /// Node number, 0..=4095
        num: u16,
    },
    /// Start consumption measures on the INA226
    ConfigConsumptionStart {
        /// Power source under measure
        source: PowerSource,
        /// Report power values
        power: bool,
        /// Report voltage values
        voltage: bool,
        /// Report current values
        current: bool,
        /// Conversion period per channel
        period: SamplePeriod,
        /// Hardware averaging factor
        average: SampleAverage,
    },
    /// Stop consumption measures
    ConfigConsumptionStop,
    /// Stop all radio measures
    ConfigRadioStop,
    /// Poll RSSI on a channel set
    ConfigRadioMeasure {
        /// Channels to poll
        channels: ChannelSet,
        /// Polling period in milliseconds, nonzero
        period: u16,
        /// Measures taken per channel before hopping
        num: u8,
    },
    /// Capture radio traffic on a channel set
    ConfigRadioSniffer {
        /// Channels to capture on
        channels: ChannelSet,
        /// Hop period in milliseconds; zero only for a single channel
        period: u16,
    },
    /// Start the radio ping-pong hardware test
    TestRadioPingPongStart {
        /// Channel to test on
        channel: u8,
        /// Transmit power level
        tx_power: TxPower,
    },
    /// Stop the radio ping-pong hardware test
    TestRadioPingPongStop,
    /// Start or stop the GPIO loopback test
    TestGpio { start: bool },
    /// Start or stop the I2C loopback test
    TestI2c { start: bool },
    /// Start or stop the PPS input test
    TestPps { start: bool },
    /// Query whether a PPS pulse was seen
    TestGotPps,
    /// Force the green LED on
    GreenLedOn,
    /// Restore the green LED default blink
    GreenLedBlink,
}

impl Command {
    /// Wire type byte of this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::Start { .. } => OPEN_NODE_START,
            Command::Stop { .. } => OPEN_NODE_STOP,
            Command::SetTime { .. } => SET_TIME,
            Command::SetNodeId { .. } => SET_NODE_ID,
            Command::ConfigConsumptionStart { .. } => CONFIG_CONSUMPTION,
            Command::ConfigConsumptionStop => CONFIG_CONSUMPTION,
            Command::ConfigRadioStop => CONFIG_RADIO_STOP,
            Command::ConfigRadioMeasure { .. } => CONFIG_RADIO_MEAS,
            Command::ConfigRadioSniffer { .. } => CONFIG_RADIO_SNIFFER,
            Command::TestRadioPingPongStart { .. } => TEST_RADIO_PING_PONG,
            Command::TestRadioPingPongStop => TEST_RADIO_PING_PONG,
            Command::TestGpio { .. } => TEST_GPIO,
            Command::TestI2c { .. } => TEST_I2C,
            Command::TestPps { .. } => TEST_PPS,
            Command::TestGotPps => TEST_GOT_PPS,
            Command::GreenLedOn => GREEN_LED_ON,
            Command::GreenLedBlink => GREEN_LED_BLINK,
        }
    }

    /// Text name of this command, as echoed on acknowledgement lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Stop { .. } => "stop",
            Command::SetTime { .. } => "set_time",
            Command::SetNodeId { .. } => "set_node_id",
            Command::ConfigConsumptionStart { .. } | Command::ConfigConsumptionStop => {
                "config_consumption_measure"
            }
            Command::ConfigRadioStop => "config_radio_stop",
            Command::ConfigRadioMeasure { .. } => "config_radio_measure",
            Command::ConfigRadioSniffer { .. } => "config_radio_sniffer",
            Command::TestRadioPingPongStart { .. } | Command::TestRadioPingPongStop => {
                "test_radio_ping_pong"
            }
            Command::TestGpio { .. } => "test_gpio",
            Command::TestI2c { .. } => "test_i2c",
            Command::TestPps { .. } => "test_pps",
            Command::TestGotPps => "test_got_pps",
            Command::GreenLedOn => "green_led_on",
            Command::GreenLedBlink => "green_led_blink",
        }
    }

    /// Text name for a command type byte echoed by the node.
    pub fn name_for_code(code: u8) -> Option<&'static str> {
        match code {
            OPEN_NODE_START => Some("start"),
            OPEN_NODE_STOP => Some("stop"),
            SET_TIME => Some("set_time"),
            SET_NODE_ID => Some("set_node_id"),
            CONFIG_CONSUMPTION => Some("config_consumption_measure"),
            CONFIG_RADIO_STOP => Some("config_radio_stop"),
            CONFIG_RADIO_MEAS => Some("config_radio_measure"),
            CONFIG_RADIO_SNIFFER => Some("config_radio_sniffer"),
            TEST_RADIO_PING_PONG => Some("test_radio_ping_pong"),
            TEST_GPIO => Some("test_gpio"),
            TEST_I2C => Some("test_i2c"),
            TEST_PPS => Some("test_pps"),
            TEST_GOT_PPS => Some("test_got_pps"),
            GREEN_LED_ON => Some("green_led_on"),
            GREEN_LED_BLINK => Some("green_led_blink"),
            _ => None,
        }
    }

    /// Encode the type + payload bytes of this command.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(self.code());
        match self {
            Command::Start { supply } | Command::Stop { supply } => {
                buf.push(supply.code());
            }
            Command::SetTime { secs, micros } => {
                buf.extend_from_slice(&secs.to_le_bytes());
                buf.extend_from_slice(&micros.to_le_bytes());
            }
            Command::SetNodeId { archi, num } => {
                let word = (archi.code() << 12) | num;
                buf.extend_from_slice(&word.to_le_bytes());
            }
            Command::ConfigConsumptionStart {
                source,
                power,
                voltage,
                current,
                period,
                average,
            } => {
                let mut config = source.bit();
                if *power {
                    config |= MEASURE_POWER;
                }
                if *voltage {
                    config |= MEASURE_VOLTAGE;
                }
                if *current {
                    config |= MEASURE_CURRENT;
                }
                buf.push(CONSUMPTION_START);
                buf.push(config);
                buf.push(period.code() | (average.code() << 4));
            }
            Command::ConfigConsumptionStop => {
                buf.push(CONSUMPTION_STOP);
                buf.push(0);
                buf.push(0);
            }
            Command::ConfigRadioStop => {}
            Command::ConfigRadioMeasure {
                channels,
                period,
                num,
            } => {
                buf.extend_from_slice(&channels.bitmap().to_le_bytes());
                buf.extend_from_slice(&period.to_le_bytes());
                buf.push(*num);
            }
            Command::ConfigRadioSniffer { channels, period } => {
                buf.extend_from_slice(&channels.bitmap().to_le_bytes());
                buf.extend_from_slice(&period.to_le_bytes());
            }
            Command::TestRadioPingPongStart { channel, tx_power } => {
                buf.push(TEST_START);
                buf.push(*channel);
                buf.push(tx_power.code());
            }
            Command::TestRadioPingPongStop => {
                buf.push(TEST_STOP);
            }
            Command::TestGpio { start }
            | Command::TestI2c { start }
            | Command::TestPps { start } => {
                buf.push(if *start { TEST_START } else { TEST_STOP });
            }
            Command::TestGotPps | Command::GreenLedOn | Command::GreenLedBlink => {}
        }
        buf
    }

    /// Parse one text line into a command.
    ///
    /// Words are whitespace separated. Trailing words after a complete
    /// command are an error.
    pub fn parse(line: &str) -> Result<Command, ProtocolError> {
        let mut words = line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| ProtocolError::UnknownCommand(String::new()))?;

        let command = match name {
            "start" => Command::Start {
                supply: next_arg(&mut words, name)?.parse()?,
            },
            "stop" => Command::Stop {
                supply: next_arg(&mut words, name)?.parse()?,
            },
            "set_time" => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default();
                Command::SetTime {
                    secs: now.as_secs() as u32,
                    micros: now.subsec_micros(),
                }
            }
            "set_node_id" => {
                let archi: NodeArchi = next_arg(&mut words, name)?.parse()?;
                let num = int_arg::<u16>(&mut words, name, "node number")?;
                if num > 0x0FFF {
                    return Err(ProtocolError::InvalidArgument {
                        command: name.to_string(),
                        reason: format!("node number {} out of range 0..=4095", num),
                    });
                }
                Command::SetNodeId { archi, num }
            }
            "config_consumption_measure" => match next_arg(&mut words, name)? {
                "stop" => Command::ConfigConsumptionStop,
                "start" => {
                    let source: PowerSource = next_arg(&mut words, name)?.parse()?;
                    let power = flag_arg(&mut words, name, "p")?;
                    let voltage = flag_arg(&mut words, name, "v")?;
                    let current = flag_arg(&mut words, name, "c")?;
                    expect_marker(&mut words, name, "-p")?;
                    let period: SamplePeriod = next_arg(&mut words, name)?.parse()?;
                    expect_marker(&mut words, name, "-a")?;
                    let average: SampleAverage = next_arg(&mut words, name)?.parse()?;
                    Command::ConfigConsumptionStart {
                        source,
                        power,
                        voltage,
                        current,
                        period,
                        average,
                    }
                }
                other => {
                    return Err(ProtocolError::InvalidArgument {
                        command: name.to_string(),
                        reason: format!("expected 'start' or 'stop', got '{}'", other),
                    })
                }
            },
            "config_radio_stop" => Command::ConfigRadioStop,
            "config_radio_measure" => {
                let channels = ChannelSet::parse(next_arg(&mut words, name)?, name)?;
                let period = int_arg::<u16>(&mut words, name, "period")?;
                if period == 0 {
                    return Err(ProtocolError::InvalidArgument {
                        command: name.to_string(),
                        reason: "period must be nonzero".to_string(),
                    });
                }
                let num = int_arg::<u8>(&mut words, name, "measures per channel")?;
                Command::ConfigRadioMeasure {
                    channels,
                    period,
                    num,
                }
            }
            "config_radio_sniffer" => {
                let channels = ChannelSet::parse(next_arg(&mut words, name)?, name)?;
                let period = int_arg::<u16>(&mut words, name, "period")?;
                // A single channel is captured continuously; hopping over
                // several channels needs a nonzero period.
                if channels.len() == 1 && period != 0 {
                    return Err(ProtocolError::InvalidArgument {
                        command: name.to_string(),
                        reason: "period must be 0 for a single channel".to_string(),
                    });
                }
                if channels.len() > 1 && period == 0 {
                    return Err(ProtocolError::InvalidArgument {
                        command: name.to_string(),
                        reason: "period must be nonzero for multiple channels".to_string(),
                    });
                }
                Command::ConfigRadioSniffer { channels, period }
            }
            "test_radio_ping_pong" => match next_arg(&mut words, name)? {
                "stop" => Command::TestRadioPingPongStop,
                "start" => {
                    let channel = int_arg::<u8>(&mut words, name, "channel")?;
                    if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
                        return Err(ProtocolError::InvalidArgument {
                            command: name.to_string(),
                            reason: format!("channel {} out of range 11..=26", channel),
                        });
                    }
                    let tx_power: TxPower = next_arg(&mut words, name)?.parse()?;
                    Command::TestRadioPingPongStart { channel, tx_power }
                }
                other => {
                    return Err(ProtocolError::InvalidArgument {
                        command: name.to_string(),
                        reason: format!("expected 'start' or 'stop', got '{}'", other),
                    })
                }
            },
            "test_gpio" => Command::TestGpio {
                start: start_stop_arg(&mut words, name)?,
            },
            "test_i2c" => Command::TestI2c {
                start: start_stop_arg(&mut words, name)?,
            },
            "test_pps" => Command::TestPps {
                start: start_stop_arg(&mut words, name)?,
            },
            "test_got_pps" => Command::TestGotPps,
            "green_led_on" => Command::GreenLedOn,
            "green_led_blink" => Command::GreenLedBlink,
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };

        if let Some(extra) = words.next() {
            return Err(ProtocolError::InvalidArgument {
                command: name.to_string(),
                reason: format!("unexpected trailing word '{}'", extra),
            });
        }
        Ok(command)
    }
}

fn next_arg<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &str,
) -> Result<&'a str, ProtocolError> {
    words.next().ok_or_else(|| ProtocolError::InvalidArgument {
        command: command.to_string(),
        reason: "missing argument".to_string(),
    })
}

fn int_arg<'a, T: std::str::FromStr>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &str,
    what: &str,
) -> Result<T, ProtocolError> {
    let word = next_arg(words, command)?;
    word.parse().map_err(|_| ProtocolError::InvalidArgument {
        command: command.to_string(),
        reason: format!("invalid {} '{}'", what, word),
    })
}

/// Require the literal marker word at the current position.
fn expect_marker<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &str,
    marker: &str,
) -> Result<(), ProtocolError> {
    let word = next_arg(words, command)?;
    if word != marker {
        return Err(ProtocolError::InvalidArgument {
            command: command.to_string(),
            reason: format!("expected '{}', got '{}'", marker, word),
        });
    }
    Ok(())
}

/// Parse a `<marker> <0|1>` pair.
fn flag_arg<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &str,
    marker: &str,
) -> Result<bool, ProtocolError> {
    expect_marker(words, command, marker)?;
    match next_arg(words, command)? {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ProtocolError::InvalidArgument {
            command: command.to_string(),
            reason: format!("expected 0 or 1 after '{}', got '{}'", marker, other),
        }),
    }
}

fn start_stop_arg<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &str,
) -> Result<bool, ProtocolError> {
    match next_arg(words, command)? {
        "start" => Ok(true),
        "stop" => Ok(false),
        other => Err(ProtocolError::InvalidArgument {
            command: command.to_string(),
            reason: format!("expected 'start' or 'stop', got '{}'", other),
        }),
    }
}
