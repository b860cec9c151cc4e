//! Bit level I/O over 64 bit blocks.
//!
//! Bits accumulate MSB first in a 64 bit shift register.  When the register
//! fills, its eight bytes spill to the sink in big endian order, so the bit
//! written first lands in the most significant bit of the first byte.  The
//! reader mirrors this exactly.  Sinks and sources move whole blocks, which
//! keeps the backends trivial: a bounded memory buffer, or any `Read`/`Write`
//! trait object.
//!
//! Errors are sticky: the first failure poisons the writer or reader and
//! every later operation short-circuits with the same error, so a caller
//! that missed one bad return cannot corrupt the register state.

use std::io::{Read,Write};
use crate::Error;

/// Accepts one 64 bit block at a time.
pub trait WordSink {
    fn put_word(&mut self,word: u64) -> Result<(),Error>;
}

/// Produces one 64 bit block at a time.
pub trait WordSource {
    fn get_word(&mut self) -> Result<u64,Error>;
}

/// Sink over a caller owned buffer with fixed capacity.
pub struct MemSink<'a> {
    buf: &'a mut [u8],
    len: usize
}

impl <'a> MemSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }
    /// bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }
}

impl WordSink for MemSink<'_> {
    fn put_word(&mut self,word: u64) -> Result<(),Error> {
        if self.len + 8 > self.buf.len() {
            return Err(Error::CapacityExceeded);
        }
        self.buf[self.len..self.len+8].copy_from_slice(&word.to_be_bytes());
        self.len += 8;
        Ok(())
    }
}

/// Source over a caller owned byte slice.
pub struct MemSource<'a> {
    buf: &'a [u8],
    pos: usize
}

impl <'a> MemSource<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl WordSource for MemSource<'_> {
    fn get_word(&mut self) -> Result<u64,Error> {
        if self.pos + 8 > self.buf.len() {
            return Err(Error::EndOfStream);
        }
        let mut block = [0u8;8];
        block.copy_from_slice(&self.buf[self.pos..self.pos+8]);
        self.pos += 8;
        Ok(u64::from_be_bytes(block))
    }
}

/// Sink over any writer, blocks go out as 8 big endian bytes.
pub struct IoSink<W: Write> {
    inner: W
}

impl <W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl <W: Write> WordSink for IoSink<W> {
    fn put_word(&mut self,word: u64) -> Result<(),Error> {
        self.inner.write_all(&word.to_be_bytes())?;
        Ok(())
    }
}

/// Source over any reader, blocks come in as 8 big endian bytes.
pub struct IoSource<R: Read> {
    inner: R
}

impl <R: Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl <R: Read> WordSource for IoSource<R> {
    fn get_word(&mut self) -> Result<u64,Error> {
        let mut block = [0u8;8];
        match self.inner.read_exact(&mut block) {
            Ok(()) => Ok(u64::from_be_bytes(block)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::EndOfStream),
            Err(e) => Err(Error::Io(e))
        }
    }
}

/// Packs bit fields into 64 bit blocks and spills them to a sink.
pub struct BitWriter<S: WordSink> {
    sink: S,
    b64: u64,
    bits: u32,
    written: u64,
    error: Option<Error>
}

impl <S: WordSink> BitWriter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, b64: 0, bits: 0, written: 0, error: None }
    }
    /// bytes spilled to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
    pub fn into_sink(self) -> S {
        self.sink
    }
    fn check(&self) -> Result<(),Error> {
        match &self.error {
            Some(e) => Err(e.again()),
            None => Ok(())
        }
    }
    fn poison(&mut self,e: Error) -> Error {
        self.error = Some(e.again());
        e
    }
    pub fn write_bit(&mut self,bit: bool) -> Result<(),Error> {
        self.check()?;
        self.b64 = (self.b64 << 1) | bit as u64;
        self.bits += 1;
        if self.bits == 64 {
            match self.sink.put_word(self.b64) {
                Ok(()) => {
                    self.b64 = 0;
                    self.bits = 0;
                    self.written += 8;
                },
                Err(e) => return Err(self.poison(e))
            }
        }
        Ok(())
    }
    /// write the low `n` bits of `value`, most significant of the `n` first
    pub fn write_bits(&mut self,value: u64,n: u32) -> Result<(),Error> {
        debug_assert!(1 <= n && n <= 64);
        for k in (0..n).rev() {
            self.write_bit((value >> k) & 1 != 0)?;
        }
        Ok(())
    }
    /// variable width number coding: groups of `base` bits starting from the
    /// low end, each followed by a continuation bit
    pub fn write_number(&mut self,value: u64,base: u32) -> Result<(),Error> {
        debug_assert!(1 <= base && base < 64);
        let mask = (1u64 << base) - 1;
        let mut v = value;
        loop {
            self.write_bits(v & mask,base)?;
            v >>= base;
            self.write_bit(v != 0)?;
            if v == 0 {
                break;
            }
        }
        Ok(())
    }
    /// pad with zero bits to the next 64 bit boundary and spill
    pub fn flush(&mut self) -> Result<(),Error> {
        self.check()?;
        if self.bits > 0 {
            self.b64 <<= 64 - self.bits;
            match self.sink.put_word(self.b64) {
                Ok(()) => {
                    self.b64 = 0;
                    self.bits = 0;
                    self.written += 8;
                },
                Err(e) => return Err(self.poison(e))
            }
        }
        Ok(())
    }
}

/// Unpacks bit fields from 64 bit blocks pulled from a source.
pub struct BitReader<S: WordSource> {
    source: S,
    b64: u64,
    bits: u32,
    read: u64,
    error: Option<Error>
}

impl <S: WordSource> BitReader<S> {
    pub fn new(source: S) -> Self {
        Self { source, b64: 0, bits: 0, read: 0, error: None }
    }
    /// bytes pulled from the source so far
    pub fn bytes_read(&self) -> u64 {
        self.read
    }
    fn check(&self) -> Result<(),Error> {
        match &self.error {
            Some(e) => Err(e.again()),
            None => Ok(())
        }
    }
    fn poison(&mut self,e: Error) -> Error {
        self.error = Some(e.again());
        e
    }
    pub fn read_bit(&mut self) -> Result<bool,Error> {
        self.check()?;
        if self.bits == 0 {
            match self.source.get_word() {
                Ok(word) => {
                    self.b64 = word;
                    self.bits = 64;
                    self.read += 8;
                },
                Err(e) => return Err(self.poison(e))
            }
        }
        let bit = self.b64 & (1 << 63) != 0;
        self.b64 <<= 1;
        self.bits -= 1;
        Ok(bit)
    }
    pub fn read_bits(&mut self,n: u32) -> Result<u64,Error> {
        debug_assert!(1 <= n && n <= 64);
        let mut value = 0;
        for _k in 0..n {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value)
    }
    /// mirror of `BitWriter::write_number`
    pub fn read_number(&mut self,base: u32) -> Result<u64,Error> {
        debug_assert!(1 <= base && base < 64);
        let mut value = 0;
        let mut shift = 0;
        loop {
            if shift >= 64 {
                // continuation bits past the register width cannot
                // come from a well formed stream
                return Err(self.poison(Error::CorruptStream));
            }
            value |= self.read_bits(base)? << shift;
            shift += base;
            if !self.read_bit()? {
                break;
            }
        }
        Ok(value)
    }
}

#[test]
fn msb_first_layout() {
    let mut buf = [0u8;16];
    let mut w = BitWriter::new(MemSink::new(&mut buf));
    w.write_bits(0xAB,8).expect("write failed");
    w.flush().expect("flush failed");
    let n = w.into_sink().len();
    assert_eq!(n,8);
    assert_eq!(buf[0..8].to_vec(),hex::decode("ab00000000000000").unwrap());
}

#[test]
fn single_bit_lands_high() {
    let mut buf = [0u8;8];
    let mut w = BitWriter::new(MemSink::new(&mut buf));
    w.write_bit(true).expect("write failed");
    w.flush().expect("flush failed");
    assert_eq!(buf[0],0x80);
}

#[test]
fn field_round_trip() {
    let fields: Vec<(u64,u32)> = vec![
        (1,1), (0,3), (0x5a,8), (0xdead_beef,32), (u64::MAX,64), (12345,17)
    ];
    let mut buf = [0u8;64];
    let mut w = BitWriter::new(MemSink::new(&mut buf));
    for (v,n) in &fields {
        w.write_bits(*v,*n).expect("write failed");
    }
    w.write_number(4094,3).expect("write failed");
    w.write_number(0,3).expect("write failed");
    w.flush().expect("flush failed");
    let mut r = BitReader::new(MemSource::new(&buf));
    for (v,n) in &fields {
        assert_eq!(r.read_bits(*n).expect("read failed"),*v);
    }
    assert_eq!(r.read_number(3).expect("read failed"),4094);
    assert_eq!(r.read_number(3).expect("read failed"),0);
}

#[test]
fn capacity_exceeded() {
    let mut buf = [0u8;7];
    let mut w = BitWriter::new(MemSink::new(&mut buf));
    let mut result = Ok(());
    for _i in 0..64 {
        result = w.write_bit(false);
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result,Err(Error::CapacityExceeded)));
}

#[test]
fn end_of_stream() {
    let buf = [0u8;4];
    let mut r = BitReader::new(MemSource::new(&buf));
    assert!(matches!(r.read_bit(),Err(Error::EndOfStream)));
}

#[test]
fn errors_are_sticky() {
    let mut buf = [0u8;7];
    let mut w = BitWriter::new(MemSink::new(&mut buf));
    for _i in 0..63 {
        w.write_bit(false).expect("write failed");
    }
    assert!(matches!(w.write_bit(false),Err(Error::CapacityExceeded)));
    // the poisoned writer keeps refusing instead of silently dropping bits,
    // and flush must not touch the overfull register
    assert!(matches!(w.write_bit(true),Err(Error::CapacityExceeded)));
    assert!(matches!(w.write_bits(0xff,8),Err(Error::CapacityExceeded)));
    assert!(matches!(w.flush(),Err(Error::CapacityExceeded)));

    let buf = [0u8;4];
    let mut r = BitReader::new(MemSource::new(&buf));
    assert!(matches!(r.read_bit(),Err(Error::EndOfStream)));
    assert!(matches!(r.read_bits(8),Err(Error::EndOfStream)));
    assert!(matches!(r.read_number(3),Err(Error::EndOfStream)));
}

#[test]
fn block_accounting() {
    let mut buf = [0u8;32];
    let mut w = BitWriter::new(MemSink::new(&mut buf));
    w.write_bits(0,64).expect("write failed");
    assert_eq!(w.bytes_written(),8);
    w.write_bit(true).expect("write failed");
    w.flush().expect("flush failed");
    assert_eq!(w.bytes_written(),16);
}
