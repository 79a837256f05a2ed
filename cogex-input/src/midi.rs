use cogex_core::{CaptureKind, CaptureSink, DeviceUnavailable, InputPayload, InputSource};
use midir::{MidiInput, MidiInputConnection};

const KIND: CaptureKind = CaptureKind::Midi;

/// Listens on every MIDI input port. midir calls back on its own thread;
/// each raw message is handed to the capture sink untouched.
pub struct MidiSource {
    client_name: String,
    connections: Vec<MidiInputConnection<()>>,
}

impl MidiSource {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            connections: Vec::new(),
        }
    }

    pub fn connected_ports(&self) -> usize {
        self.connections.len()
    }

    fn backend(err: impl std::fmt::Display) -> DeviceUnavailable {
        DeviceUnavailable::Backend {
            kind: KIND,
            reason: err.to_string(),
        }
    }
}

impl InputSource for MidiSource {
    fn kind(&self) -> CaptureKind {
        KIND
    }

    fn connect(&mut self, sink: CaptureSink) -> Result<(), DeviceUnavailable> {
        let probe = MidiInput::new(&self.client_name).map_err(Self::backend)?;
        let ports = probe.ports();
        if ports.is_empty() {
            return Err(DeviceUnavailable::NoPorts { kind: KIND });
        }

        for port in &ports {
            // midir consumes the client on connect, so each port gets its own.
            let input = match MidiInput::new(&self.client_name) {
                Ok(input) => input,
                Err(err) => {
                    log::warn!("midi client unavailable: {err}");
                    continue;
                }
            };
            let name = input
                .port_name(port)
                .unwrap_or_else(|_| "unknown".to_string());
            let sink = sink.clone();
            let connected = input.connect(
                port,
                &name,
                move |_stamp, message, _| {
                    sink.push(InputPayload::Midi(message.to_vec()));
                },
                (),
            );
            match connected {
                Ok(conn) => {
                    log::info!("listening on midi port {name}");
                    self.connections.push(conn);
                }
                Err(err) => log::warn!("midi port {name} skipped: {err}"),
            }
        }

        if self.connections.is_empty() {
            return Err(Self::backend("no midi port accepted a connection"));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        let count = self.connections.len();
        for conn in self.connections.drain(..) {
            conn.close();
        }
        if count > 0 {
            log::debug!("closed {count} midi connections");
        }
    }
}

impl Drop for MidiSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_without_connect_is_a_no_op() {
        let mut source = MidiSource::new("cogex-test");
        source.disconnect();
        source.disconnect();
        assert_eq!(source.connected_ports(), 0);
        assert_eq!(source.kind(), CaptureKind::Midi);
    }
}
