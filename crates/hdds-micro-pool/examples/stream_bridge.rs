// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream-to-Packet Bridge Example
//!
//! Simulates the motivating use case: a byte stream (think UART RX)
//! carrying flag-delimited frames is turned into packets held by a
//! [`PacketPool`] while a slower consumer drains them.
//!
//! For every frame the receiver grabs the biggest buffer the pool can
//! give (the final frame length is unknown when reception starts),
//! fills it byte by byte, trims it to the real length once the closing
//! flag arrives, and queues the handle. The consumer runs every third
//! frame, so several packets are in flight at once.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example stream_bridge --features std
//! ```

use heapless::Deque;

use hdds_micro_pool::{BufferHandle, PacketPool, Result, UNBOUNDED};

/// Frame delimiter, HDLC style
const FLAG: u8 = 0x7E;

/// Smallest buffer worth starting a frame in
const MIN_FRAME: usize = 8;

/// Receiver state for the frame currently on the wire
struct Receiver {
    buffer: BufferHandle,
    filled: usize,
}

fn consume<const N: usize>(
    pool: &mut PacketPool<'_, N>,
    inflight: &mut Deque<BufferHandle, 8>,
) -> Result<()> {
    while let Some(handle) = inflight.pop_front() {
        let frame = pool.bytes(&handle)?;
        println!(
            "  consumed {:2}-byte frame: {:02X?}",
            frame.len(),
            &frame[..frame.len().min(8)]
        );
        pool.release(handle)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // The byte stream: four frames of very different lengths.
    let mut stream = Vec::new();
    for frame in [
        b"ping".as_slice(),
        b"telemetry: rssi=-71 snr=9.2 vbat=3.81".as_slice(),
        b"ack".as_slice(),
        b"cfg: channel=4 rate=9600 power=17".as_slice(),
    ] {
        stream.push(FLAG);
        stream.extend_from_slice(frame);
        stream.push(FLAG);
    }

    let mut backing = [0u8; 256];
    let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1)?;
    let mut inflight: Deque<BufferHandle, 8> = Deque::new();
    let mut receiver: Option<Receiver> = None;
    let mut completed = 0u32;

    println!("[>] bridging {} stream bytes", stream.len());

    for byte in stream {
        if byte == FLAG {
            // Closing flag: trim the buffer to the bytes actually
            // received and queue the packet. Empty frames (back-to-back
            // flags) just return their buffer.
            if let Some(rx) = receiver.take() {
                if rx.filled == 0 {
                    pool.release(rx.buffer)?;
                    continue;
                }
                let packet = pool.resize(rx.buffer, rx.filled)?;
                println!(
                    "[=] frame complete: {} bytes (buffer was {})",
                    rx.filled,
                    rx.buffer.len()
                );
                if inflight.push_back(packet).is_err() {
                    // Queue full: drop the oldest to keep receiving.
                    if let Some(oldest) = inflight.pop_front() {
                        pool.release(oldest)?;
                    }
                    let _ = inflight.push_back(packet);
                }
                completed += 1;
                if completed % 3 == 0 {
                    consume(&mut pool, &mut inflight)?;
                }
            }
            continue;
        }

        // Payload byte: open a maximal buffer on the first one.
        if receiver.is_none() {
            let buffer = pool.request(MIN_FRAME, UNBOUNDED)?;
            receiver = Some(Receiver { buffer, filled: 0 });
        }
        if let Some(rx) = receiver.as_mut() {
            let bytes = pool.bytes_mut(&rx.buffer)?;
            if rx.filled < bytes.len() {
                bytes[rx.filled] = byte;
                rx.filled += 1;
            }
        }
    }

    consume(&mut pool, &mut inflight)?;

    let stats = pool.stats();
    println!(
        "[#] done: {} frames, {} of {} bytes free, largest fragment {}",
        completed, stats.available_bytes, stats.capacity, stats.largest_available
    );
    pool.validate().expect("pool integrity");
    Ok(())
}
