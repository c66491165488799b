use std::io::{self, Cursor, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::debug;
use thiserror::Error;

pub mod packet;

pub use packet::Packet;

pub const PROTOCOL_VERSION: i32 = 1;
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;
pub const MAX_STRING_LEN: usize = 32_767;

static NETWORK_DEBUG: AtomicBool = AtomicBool::new(false);

pub fn enable_network_debug() {
    NETWORK_DEBUG.store(true, Ordering::Relaxed);
}

pub fn is_network_debug() -> bool {
    NETWORK_DEBUG.load(Ordering::Relaxed)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("varint is longer than 5 bytes")]
    VarIntTooLong,

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("string is too long: {0} bytes")]
    StringTooLong(usize),

    #[error("string is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("frame is too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("unknown {direction:?} packet id {id:#04x}")]
    UnknownPacket { direction: Direction, id: i32 },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: i32 },

    #[error("{remaining} trailing bytes after packet {id:#04x}")]
    TrailingBytes { id: i32, remaining: usize },
}

/// Which side of the connection a packet travels towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clientbound,
    Serverbound,
}

pub trait Serializable: Sized {
    fn read_from<R: Read>(buf: &mut R) -> Result<Self, Error>;
    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error>;
}

impl Serializable for bool {
    fn read_from<R: Read>(buf: &mut R) -> Result<bool, Error> {
        Ok(buf.read_u8()? != 0)
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_u8(u8::from(*self))?;
        Ok(())
    }
}

impl Serializable for u8 {
    fn read_from<R: Read>(buf: &mut R) -> Result<u8, Error> {
        Ok(buf.read_u8()?)
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_u8(*self)?;
        Ok(())
    }
}

impl Serializable for i32 {
    fn read_from<R: Read>(buf: &mut R) -> Result<i32, Error> {
        Ok(buf.read_i32::<BigEndian>()?)
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_i32::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Serializable for f64 {
    fn read_from<R: Read>(buf: &mut R) -> Result<f64, Error> {
        Ok(buf.read_f64::<BigEndian>()?)
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        buf.write_f64::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Serializable for String {
    fn read_from<R: Read>(buf: &mut R) -> Result<String, Error> {
        let len = read_len(buf)?;
        if len > MAX_STRING_LEN {
            return Err(Error::StringTooLong(len));
        }
        let mut bytes = vec![0u8; len];
        buf.read_exact(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        if self.len() > MAX_STRING_LEN {
            return Err(Error::StringTooLong(self.len()));
        }
        write_len(buf, self.len())?;
        buf.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl<T: Serializable> Serializable for Option<T> {
    fn read_from<R: Read>(buf: &mut R) -> Result<Option<T>, Error> {
        if bool::read_from(buf)? {
            Ok(Some(T::read_from(buf)?))
        } else {
            Ok(None)
        }
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        match self {
            Some(value) => {
                true.write_to(buf)?;
                value.write_to(buf)
            }
            None => false.write_to(buf),
        }
    }
}

impl<T: Serializable> Serializable for Vec<T> {
    fn read_from<R: Read>(buf: &mut R) -> Result<Vec<T>, Error> {
        let len = read_len(buf)?;
        // Each element takes at least one byte on the wire.
        let mut out = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            out.push(T::read_from(buf)?);
        }
        Ok(out)
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        write_len(buf, self.len())?;
        for item in self {
            item.write_to(buf)?;
        }
        Ok(())
    }
}

/// Raw bytes with a VarInt length prefix, read in one go.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ByteArray(pub Vec<u8>);

impl std::fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteArray({} bytes)", self.0.len())
    }
}

impl Serializable for ByteArray {
    fn read_from<R: Read>(buf: &mut R) -> Result<ByteArray, Error> {
        let len = read_len(buf)?;
        let mut data = vec![0u8; len];
        buf.read_exact(&mut data)?;
        Ok(ByteArray(data))
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        write_len(buf, self.0.len())?;
        buf.write_all(&self.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarInt(pub i32);

impl VarInt {
    pub fn encoded_len(self) -> usize {
        let mut value = self.0 as u32;
        let mut size = 1;
        while value & !0x7f != 0 {
            value >>= 7;
            size += 1;
        }
        size
    }
}

impl Serializable for VarInt {
    fn read_from<R: Read>(buf: &mut R) -> Result<VarInt, Error> {
        let mut result = 0u32;
        for shift in 0..5 {
            let byte = buf.read_u8()?;
            result |= u32::from(byte & 0x7f) << (7 * shift);
            if byte & 0x80 == 0 {
                return Ok(VarInt(result as i32));
            }
        }
        Err(Error::VarIntTooLong)
    }

    fn write_to<W: Write>(&self, buf: &mut W) -> Result<(), Error> {
        let mut value = self.0 as u32;
        loop {
            if value & !0x7f == 0 {
                buf.write_u8(value as u8)?;
                return Ok(());
            }
            buf.write_u8(((value & 0x7f) | 0x80) as u8)?;
            value >>= 7;
        }
    }
}

fn read_len<R: Read>(buf: &mut R) -> Result<usize, Error> {
    let VarInt(len) = VarInt::read_from(buf)?;
    if len < 0 {
        return Err(Error::NegativeLength(len));
    }
    let len = len as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge(len));
    }
    Ok(len)
}

fn write_len<W: Write>(buf: &mut W, len: usize) -> Result<(), Error> {
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge(len));
    }
    VarInt(len as i32).write_to(buf)
}

/// Encodes one packet into a frame body (without the outer length prefix).
pub fn encode_frame(packet: &Packet, compression_threshold: i32) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    VarInt(packet.id()).write_to(&mut body)?;
    packet.write_payload(&mut body)?;

    if compression_threshold < 0 {
        return Ok(body);
    }

    let mut frame = Vec::with_capacity(body.len() + 5);
    if body.len() >= compression_threshold as usize {
        VarInt(body.len() as i32).write_to(&mut frame)?;
        let mut encoder = ZlibEncoder::new(frame, Compression::default());
        encoder.write_all(&body)?;
        frame = encoder.finish()?;
    } else {
        VarInt(0).write_to(&mut frame)?;
        frame.extend_from_slice(&body);
    }
    Ok(frame)
}

/// Decodes a frame body produced by [`encode_frame`].
pub fn decode_frame(
    frame: &[u8],
    direction: Direction,
    compression_threshold: i32,
) -> Result<Packet, Error> {
    let mut cursor = Cursor::new(frame);
    let body = if compression_threshold >= 0 {
        let data_len = read_len(&mut cursor)?;
        let start = cursor.position() as usize;
        if data_len == 0 {
            frame[start..].to_vec()
        } else {
            let mut out = Vec::with_capacity(data_len);
            ZlibDecoder::new(&frame[start..])
                .take(data_len as u64)
                .read_to_end(&mut out)?;
            out
        }
    } else {
        frame.to_vec()
    };

    let mut cursor = Cursor::new(body.as_slice());
    let VarInt(id) = VarInt::read_from(&mut cursor)?;
    let packet = Packet::read_payload(direction, id, &mut cursor)?;
    let remaining = body.len() - cursor.position() as usize;
    if remaining != 0 {
        return Err(Error::TrailingBytes { id, remaining });
    }
    Ok(packet)
}

/// A framed packet stream over TCP. `inbound` is the direction of packets
/// this side reads.
pub struct Conn {
    stream: TcpStream,
    pub peer: String,
    inbound: Direction,
    compression_threshold: i32,
}

impl Conn {
    /// Opens a client connection; reads clientbound packets.
    pub fn connect(address: &str) -> Result<Conn, Error> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        Ok(Conn {
            stream,
            peer: address.to_string(),
            inbound: Direction::Clientbound,
            compression_threshold: -1,
        })
    }

    /// Wraps an accepted server-side socket; reads serverbound packets.
    pub fn accept(stream: TcpStream) -> Result<Conn, Error> {
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(Conn {
            stream,
            peer,
            inbound: Direction::Serverbound,
            compression_threshold: -1,
        })
    }

    pub fn try_clone(&self) -> Result<Conn, Error> {
        Ok(Conn {
            stream: self.stream.try_clone()?,
            peer: self.peer.clone(),
            inbound: self.inbound,
            compression_threshold: self.compression_threshold,
        })
    }

    pub fn set_compression(&mut self, threshold: i32) {
        self.compression_threshold = threshold;
    }

    pub fn compression_threshold(&self) -> i32 {
        self.compression_threshold
    }

    /// Bounds how long a write may block on a peer that stopped reading.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), Error> {
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    pub fn write_packet<P: Into<Packet>>(&mut self, packet: P) -> Result<(), Error> {
        let packet = packet.into();
        let frame = encode_frame(&packet, self.compression_threshold)?;
        if is_network_debug() {
            debug!(
                "send {} to {} ({} bytes)",
                packet.name(),
                self.peer,
                frame.len()
            );
        }
        let mut out = Vec::with_capacity(frame.len() + 5);
        write_len(&mut out, frame.len())?;
        out.extend_from_slice(&frame);
        self.stream.write_all(&out)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn read_packet(&mut self) -> Result<Packet, Error> {
        let len = read_len(&mut self.stream)?;
        let mut frame = vec![0u8; len];
        self.stream.read_exact(&mut frame)?;
        let packet = decode_frame(&frame, self.inbound, self.compression_threshold)?;
        if is_network_debug() {
            debug!("recv {} from {} ({} bytes)", packet.name(), self.peer, len);
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests;
