//! MIDI utilities and message types
//!
//! Provides channel message parsing and encoding, glob-based port discovery,
//! and the input transport that feeds control-change events to the router.

use std::fmt;

use colored::*;
use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;

/// Client name announced to the MIDI driver
const CLIENT_NAME: &str = "nanokongo";

/// Capacity of the driver-thread → router queue
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// MIDI channel message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },
}

impl MidiMessage {
    /// Parse a channel message from raw bytes
    ///
    /// System messages and running status are not supported and yield `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        if !(0x80..0xF0).contains(&status) {
            return None;
        }

        let channel = status & 0x0F;
        let data1 = rest.first().map(|b| b & 0x7F);
        let data2 = rest.get(1).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: data1?,
                velocity: data2?,
            }),
            0x90 => {
                let note = data1?;
                let velocity = data2?;
                // Note On with velocity 0 = Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                cc: data1?,
                value: data2?,
            }),
            0xC0 => Some(MidiMessage::ProgramChange {
                channel,
                program: data1?,
            }),
            0xE0 => {
                let lsb = u16::from(data1?);
                let msb = u16::from(data2?);
                Some(MidiMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                })
            }
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                vec![0xE0 | (channel & 0x0F), lsb, msb]
            }
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel, program)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel, value)
            }
        }
    }
}

/// A control-change message as delivered to the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChangeEvent {
    pub channel: u8,
    pub control: u8,
    pub value: u8,
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compile a shell-style device pattern
pub fn compile_pattern(pattern: &str) -> Result<glob::Pattern, TransportError> {
    glob::Pattern::new(pattern).map_err(|source| TransportError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Find the first port whose full name matches `pattern`, in enumeration order
pub fn find_port<T: MidiIO>(io: &T, pattern: &glob::Pattern) -> Option<(T::Port, String)> {
    for port in io.ports() {
        let Ok(name) = io.port_name(&port) else {
            continue;
        };
        debug!(portname = %name, "looking for device");
        if pattern.matches(&name) {
            return Some((port, name));
        }
    }
    None
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>, TransportError> {
    let midi_in = MidiInput::new(&format!("{CLIENT_NAME}-scanner"))?;
    Ok(port_names(&midi_in))
}

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>, TransportError> {
    let midi_out = MidiOutput::new(&format!("{CLIENT_NAME}-scanner"))?;
    Ok(port_names(&midi_out))
}

/// Print input and output ports for `--list-ports`
pub fn print_ports() -> Result<(), TransportError> {
    println!("{}", "=== MIDI Input Ports ===".bold().cyan());
    let inputs = list_input_ports()?;
    if inputs.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (index, name) in inputs.iter().enumerate() {
        println!("  [{}] {}", index.to_string().yellow(), name.green());
    }

    println!("\n{}", "=== MIDI Output Ports ===".bold().cyan());
    let outputs = list_output_ports()?;
    if outputs.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (index, name) in outputs.iter().enumerate() {
        println!("  [{}] {}", index.to_string().yellow(), name.green());
    }

    Ok(())
}

/// An opened MIDI input port
///
/// The driver callback runs on midir's own thread; it forwards control-change
/// messages, in arrival order, into a channel drained by [`MidiInputDevice::recv`].
pub struct MidiInputDevice {
    port_name: String,
    connection: Option<MidiInputConnection<()>>,
    event_rx: mpsc::Receiver<ControlChangeEvent>,
}

impl fmt::Debug for MidiInputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiInputDevice")
            .field("port_name", &self.port_name)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

impl MidiInputDevice {
    /// Open the first input port matching the glob `pattern`
    pub fn open(pattern: &str) -> Result<Self, TransportError> {
        let pattern_glob = compile_pattern(pattern)?;
        let midi_in = MidiInput::new(&format!("{CLIENT_NAME}-input"))?;

        debug!("Found {} MIDI input ports", midi_in.port_count());

        let (port, port_name) = find_port(&midi_in, &pattern_glob)
            .ok_or_else(|| TransportError::DeviceNotFound(pattern.to_string()))?;

        info!(portname = %port_name, "found device");

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let connection = midi_in
            .connect(
                &port,
                CLIENT_NAME,
                move |_timestamp, data, _| match MidiMessage::parse(data) {
                    Some(MidiMessage::ControlChange { channel, cc, value }) => {
                        let event = ControlChangeEvent {
                            channel,
                            control: cc,
                            value,
                        };
                        // Blocks the driver thread while the router is busy
                        if event_tx.blocking_send(event).is_err() {
                            warn!("Router stopped listening, dropping {:?}", event);
                        }
                    }
                    Some(other) => trace!("ignoring {}", other),
                    None => trace!("Failed to parse MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| TransportError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            port_name,
            connection: Some(connection),
            event_rx,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Wait for the next control-change event
    pub async fn recv(&mut self) -> Result<ControlChangeEvent, TransportError> {
        self.event_rx.recv().await.ok_or(TransportError::Disconnected)
    }

    /// Close the port; pending events already queued are discarded
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!(portname = %self.port_name, "closed device");
        }
        self.event_rx.close();
    }
}

impl Drop for MidiInputDevice {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_change() {
        let data = vec![0xB2, 7, 100]; // CC ch 3, volume, value 100
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(
            msg,
            MidiMessage::ControlChange {
                channel: 2,
                cc: 7,
                value: 100,
            }
        );
    }

    #[test]
    fn test_note_on_velocity_zero() {
        let data = vec![0x90, 60, 0];
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(
            msg,
            MidiMessage::NoteOff {
                channel: 0,
                note: 60,
                velocity: 0,
            }
        );
    }

    #[test]
    fn test_truncated_and_system_messages_are_rejected() {
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::parse(&[0xF8]), None);
        assert_eq!(MidiMessage::parse(&[0x07, 0x40]), None); // running status
    }

    #[test]
    fn test_encode_control_change_masks_channel() {
        let msg = MidiMessage::ControlChange {
            channel: 0x13,
            cc: 41,
            value: 127,
        };

        assert_eq!(msg.encode(), vec![0xB3, 41, 127]);
    }

    #[test]
    fn test_encode_channel_messages() {
        let cases = [
            (MidiMessage::NoteOff { channel: 1, note: 60, velocity: 64 }, vec![0x81, 60, 64]),
            (MidiMessage::NoteOn { channel: 9, note: 36, velocity: 100 }, vec![0x99, 36, 100]),
            (MidiMessage::ProgramChange { channel: 15, program: 5 }, vec![0xCF, 5]),
            (MidiMessage::PitchBend { channel: 0, value: 8192 }, vec![0xE0, 0x00, 0x40]),
        ];

        for (msg, bytes) in cases {
            assert_eq!(msg.encode(), bytes, "{}", msg);
            assert_eq!(MidiMessage::parse(&bytes), Some(msg));
        }
    }

    #[test]
    fn test_pitch_bend() {
        let msg = MidiMessage::parse(&[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(msg, MidiMessage::PitchBend { channel: 0, value: 8192 });
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xB0, 0x29, 0x7F]), "B0 29 7F");
    }

    #[test]
    fn test_device_pattern_matching() {
        let pattern = compile_pattern("nanoKONTROL2*").unwrap();
        assert!(pattern.matches("nanoKONTROL2:nanoKONTROL2 MIDI 1 20:0"));
        assert!(!pattern.matches("Midi Through:Midi Through Port-0 14:0"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = compile_pattern("nano[").unwrap_err();
        assert!(matches!(err, TransportError::InvalidPattern { .. }));
    }
}
