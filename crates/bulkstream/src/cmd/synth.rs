use std::fs::File;
use std::io::BufWriter;

use bulkstream_frame::{
    encode_frame, Channel, FrameHeader, StatusCounters, StatusRecord, StatusVariant, HEADER_SIZE,
};
use bulkstream_pipeline::TEST_FRAME_SAMPLES;
use bulkstream_transport::write_capture;
use bytes::{BufMut, BytesMut};
use tracing::info;

use crate::cmd::SynthArgs;
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};

/// Packets of a synthetic stream, one per bulk read.
#[derive(Debug, Default)]
struct SynthStream {
    packets: Vec<Vec<u8>>,
    frames: usize,
    status_records: usize,
}

pub fn run(args: SynthArgs) -> CliResult<i32> {
    let stream = build_stream(&args)?;

    let file = File::create(&args.output)
        .map_err(|err| transport_error("create capture", err.into()))?;
    let records = write_capture(&mut BufWriter::new(file), &stream.packets)
        .map_err(|err| transport_error("write capture", err))?;

    info!(
        output = %args.output.display(),
        records,
        frames = stream.frames,
        status_records = stream.status_records,
        "capture written"
    );
    println!(
        "wrote {records} records ({} frames, {} status) to {}",
        stream.frames,
        stream.status_records,
        args.output.display()
    );
    Ok(SUCCESS)
}

/// The test frame, when requested, shares the first pair's sequence number.
fn build_stream(args: &SynthArgs) -> CliResult<SynthStream> {
    let mut stream = SynthStream::default();
    let mut timestamp = 0u32;

    if args.test_frame {
        let header = stamp(
            FrameHeader::test_frame(args.start_sequence, TEST_FRAME_SAMPLES),
            args.crc,
            timestamp,
        );
        stream.push_frame(&header, &samples(args.start_sequence, TEST_FRAME_SAMPLES))?;
    }

    let mut sent = 0u32;
    for index in 0..args.pairs {
        let sequence = args.start_sequence.wrapping_add(index);
        timestamp = index.wrapping_mul(args.timestamp_step);

        if !args.skip.contains(&sequence) {
            let payload = samples(sequence, args.samples);
            for channel in Channel::ALL {
                let header = stamp(
                    FrameHeader::new(sequence, channel, args.samples),
                    args.crc,
                    timestamp,
                );
                stream.push_frame(&header, &payload)?;
            }
            sent += 1;
        }

        if let Some(every) = args.status_every.filter(|every| *every > 0) {
            if (index + 1) % every == 0 {
                let counters = StatusCounters {
                    version: 1,
                    current_samples: args.samples,
                    frame_bytes: frame_bytes(args.samples),
                    test_frames: u16::from(args.test_frame),
                    produced_sequence: sequence,
                    sent: [sent, sent],
                    tx_complete: sent.wrapping_mul(2),
                    dma_done: [sent, sent],
                    frame_write_sequence: sequence.wrapping_add(1),
                    ..StatusCounters::default()
                };
                let variant = if args.diagnostic {
                    StatusVariant::Diagnostic
                } else {
                    StatusVariant::Standard
                };
                stream.push_status(variant, &counters, args.status_len)?;
            }
        }
    }

    Ok(stream)
}

impl SynthStream {
    fn push_frame(&mut self, header: &FrameHeader, payload: &[u8]) -> CliResult<()> {
        let mut buf = BytesMut::with_capacity(header.frame_len());
        encode_frame(header, payload, &mut buf).map_err(|err| frame_error("encode frame", err))?;
        self.packets.push(buf.to_vec());
        self.frames += 1;
        Ok(())
    }

    fn push_status(
        &mut self,
        variant: StatusVariant,
        counters: &StatusCounters,
        len: usize,
    ) -> CliResult<()> {
        let mut buf = BytesMut::with_capacity(len);
        StatusRecord::encode(variant, counters, len, &mut buf)
            .map_err(|err| frame_error("encode status", err))?;
        self.packets.push(buf.to_vec());
        self.status_records += 1;
        Ok(())
    }
}

fn stamp(header: FrameHeader, crc: bool, timestamp: u32) -> FrameHeader {
    let header = header.with_timestamp(timestamp);
    if crc {
        header.with_crc()
    } else {
        header
    }
}

/// A ramp offset by the sequence number, so consecutive frames differ.
fn samples(sequence: u32, count: u16) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(usize::from(count) * 2);
    for i in 0..count {
        buf.put_u16_le((sequence as u16).wrapping_add(i));
    }
    buf.to_vec()
}

fn frame_bytes(samples: u16) -> u16 {
    (HEADER_SIZE + usize::from(samples) * 2).min(usize::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bulkstream_frame::{decode, Decoded};

    use super::*;

    fn args() -> SynthArgs {
        SynthArgs {
            output: PathBuf::from("/tmp/unused.bscp"),
            pairs: 4,
            samples: 16,
            start_sequence: 10,
            crc: false,
            test_frame: false,
            skip: Vec::new(),
            status_every: None,
            status_len: 64,
            diagnostic: false,
            timestamp_step: 1,
        }
    }

    #[test]
    fn emits_one_frame_per_channel_per_pair() {
        let stream = build_stream(&args()).expect("stream should build");
        assert_eq!(stream.frames, 8);
        assert_eq!(stream.packets.len(), 8);

        let Decoded::Frame(first) = decode(&stream.packets[0]) else {
            panic!("first packet should decode as a frame");
        };
        assert_eq!(first.meta.sequence, 10);
        assert_eq!(first.meta.channel, Channel::Adc0);
        assert_eq!(first.meta.sample_count, 16);

        let Decoded::Frame(second) = decode(&stream.packets[1]) else {
            panic!("second packet should decode as a frame");
        };
        assert_eq!(second.meta.sequence, 10);
        assert_eq!(second.meta.channel, Channel::Adc1);
    }

    #[test]
    fn test_frame_opens_the_stream() {
        let mut args = args();
        args.test_frame = true;
        args.crc = true;
        let stream = build_stream(&args).expect("stream should build");
        assert_eq!(stream.frames, 9);

        let Decoded::Frame(frame) = decode(&stream.packets[0]) else {
            panic!("test frame should decode");
        };
        assert!(frame.meta.is_test());
        assert_eq!(frame.meta.sample_count, TEST_FRAME_SAMPLES);
        assert!(frame.meta.flags.has_crc());
    }

    #[test]
    fn skipped_sequences_are_left_out() {
        let mut args = args();
        args.skip = vec![11, 12];
        let stream = build_stream(&args).expect("stream should build");
        assert_eq!(stream.frames, 4);

        let sequences: Vec<u32> = stream
            .packets
            .iter()
            .filter_map(|packet| match decode(packet) {
                Decoded::Frame(frame) => Some(frame.meta.sequence),
                _ => None,
            })
            .collect();
        assert_eq!(sequences, vec![10, 10, 13, 13]);
    }

    #[test]
    fn status_records_are_interleaved() {
        let mut args = args();
        args.status_every = Some(2);
        args.diagnostic = true;
        let stream = build_stream(&args).expect("stream should build");
        assert_eq!(stream.status_records, 2);
        assert_eq!(stream.packets.len(), 10);

        let Decoded::Status(record) = decode(&stream.packets[4]) else {
            panic!("fifth packet should be a status record");
        };
        assert_eq!(record.variant, StatusVariant::Diagnostic);
        assert_eq!(record.counters.produced_sequence, 11);
        assert_eq!(record.counters.sent, [2, 2]);
        assert_eq!(record.counters.frame_bytes, 64);
    }

    #[test]
    fn bad_status_length_is_a_usage_error() {
        let mut args = args();
        args.status_every = Some(1);
        args.status_len = 8;
        let err = build_stream(&args).expect_err("short status should fail");
        assert_eq!(err.code, crate::exit::USAGE);
    }

    #[test]
    fn sample_ramp_depends_on_sequence() {
        assert_eq!(samples(3, 2), vec![3, 0, 4, 0]);
        assert_ne!(samples(3, 4), samples(4, 4));
    }
}
