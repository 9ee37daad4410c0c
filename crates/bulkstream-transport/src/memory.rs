use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Completion, TransferHandle, TransferStatus, Transport, MAX_COMMAND_PAYLOAD};

/// What a [`MemoryTransport`] does once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndOfScript {
    /// Keep reads pending forever, like a silent device.
    #[default]
    Idle,
    /// Complete every pending read with [`TransferStatus::NoDevice`].
    Disconnect,
}

/// A command recorded by [`MemoryTransport::send_command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
enum Scripted {
    Packet(Bytes),
    Fail(TransferStatus),
}

/// In-memory transport driven by a script of packets and failures.
///
/// Each scripted item completes the oldest pending read, so completions come
/// back in submission order.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    script: VecDeque<Scripted>,
    trailing: VecDeque<Bytes>,
    pending: VecDeque<(TransferHandle, Vec<u8>)>,
    cancelled: Vec<(TransferHandle, Vec<u8>)>,
    commands: Vec<SentCommand>,
    end: EndOfScript,
    next_handle: u64,
    submissions: usize,
    submit_limit: Option<usize>,
    fail_commands: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script every packet in order, with the given end-of-script behaviour.
    pub fn from_packets<I, B>(packets: I, end: EndOfScript) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let mut transport = Self {
            end,
            ..Self::default()
        };
        for packet in packets {
            transport.push_packet(packet);
        }
        transport
    }

    /// Queue one packet to be delivered into the next pending read.
    pub fn push_packet(&mut self, packet: impl Into<Bytes>) {
        self.script.push_back(Scripted::Packet(packet.into()));
    }

    /// Queue a failed completion for the next pending read.
    pub fn push_failure(&mut self, status: TransferStatus) {
        self.script.push_back(Scripted::Fail(status));
    }

    /// Queue a packet for [`Transport::blocking_read`].
    pub fn push_trailing(&mut self, packet: impl Into<Bytes>) {
        self.trailing.push_back(packet.into());
    }

    pub fn set_end_of_script(&mut self, end: EndOfScript) {
        self.end = end;
    }

    /// Accept only `limit` submissions in total; later ones fail.
    pub fn limit_submissions(&mut self, limit: usize) {
        self.submit_limit = Some(limit);
    }

    /// Make every subsequent command fail with a timeout.
    pub fn fail_commands(&mut self, fail: bool) {
        self.fail_commands = fail;
    }

    /// Commands sent so far, oldest first.
    pub fn commands(&self) -> &[SentCommand] {
        &self.commands
    }

    /// Reads currently queued and not yet completed.
    pub fn pending_reads(&self) -> usize {
        self.pending.len()
    }

    /// Total successful submissions.
    pub fn submissions(&self) -> usize {
        self.submissions
    }

    /// Scripted items not yet delivered.
    pub fn remaining_script(&self) -> usize {
        self.script.len()
    }
}

impl Transport for MemoryTransport {
    fn submit_read(&mut self, buffer: Vec<u8>) -> Result<TransferHandle> {
        if let Some(limit) = self.submit_limit {
            if self.submissions >= limit {
                return Err(TransportError::Submit(format!(
                    "submission limit of {limit} reached"
                )));
            }
        }
        let handle = TransferHandle::new(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.submissions += 1;
        self.pending.push_back((handle, buffer));
        Ok(handle)
    }

    fn cancel(&mut self, handle: TransferHandle) -> Result<()> {
        let index = self
            .pending
            .iter()
            .position(|(pending, _)| *pending == handle)
            .ok_or(TransportError::UnknownTransfer(handle))?;
        if let Some(entry) = self.pending.remove(index) {
            self.cancelled.push(entry);
        }
        Ok(())
    }

    fn poll_completions(&mut self, _timeout: Duration) -> Result<Vec<Completion>> {
        let mut out: Vec<Completion> = self
            .cancelled
            .drain(..)
            .map(|(handle, buffer)| Completion {
                handle,
                status: TransferStatus::Cancelled,
                buffer,
                actual_length: 0,
            })
            .collect();

        while !self.pending.is_empty() {
            let Some(item) = self.script.pop_front() else {
                break;
            };
            let Some((handle, mut buffer)) = self.pending.pop_front() else {
                break;
            };
            let completion = match item {
                Scripted::Packet(packet) => {
                    let copied = packet.len().min(buffer.len());
                    buffer[..copied].copy_from_slice(&packet[..copied]);
                    let status = if packet.len() > buffer.len() {
                        TransferStatus::Overflow
                    } else {
                        TransferStatus::Completed
                    };
                    Completion {
                        handle,
                        status,
                        buffer,
                        actual_length: copied,
                    }
                }
                Scripted::Fail(status) => Completion {
                    handle,
                    status,
                    buffer,
                    actual_length: 0,
                },
            };
            out.push(completion);
        }

        if self.script.is_empty() && self.end == EndOfScript::Disconnect {
            for (handle, buffer) in self.pending.drain(..) {
                out.push(Completion {
                    handle,
                    status: TransferStatus::NoDevice,
                    buffer,
                    actual_length: 0,
                });
            }
        }

        Ok(out)
    }

    fn send_command(&mut self, opcode: u8, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_COMMAND_PAYLOAD {
            return Err(TransportError::CommandTooLong {
                len: payload.len(),
                max: MAX_COMMAND_PAYLOAD,
            });
        }
        if self.fail_commands {
            return Err(TransportError::Timeout(Duration::from_millis(1000)));
        }
        debug!(opcode, len = payload.len(), "command sent");
        self.commands.push(SentCommand {
            opcode,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn blocking_read(&mut self, max_len: usize, timeout: Duration) -> Result<Bytes> {
        match self.trailing.pop_front() {
            Some(packet) => Ok(packet.slice(..packet.len().min(max_len))),
            None => Err(TransportError::Timeout(timeout)),
        }
    }
}
