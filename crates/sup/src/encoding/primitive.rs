// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Primitive value codec.
//!
//! | Kind | Body |
//! |------|------|
//! | uint8..uint64 | counted uvarint |
//! | int8..int64, duration, time | counted zigzag varint |
//! | float16/32/64 | little-endian IEEE-754, 2/4/8 bytes |
//! | bool | one byte, 0 or 1 |
//! | bytes, string, type | raw bytes (string is UTF-8) |
//! | ip | 4 or 16 address bytes |
//! | net | address followed by mask, masked to canonical form |
//! | null | only the null body |

use super::varint::{
    append_counted_uvarint, append_counted_varint, decode_counted_uvarint, decode_counted_varint,
};
use crate::error::{Error, Result};
use crate::types::PrimitiveKind;
use chrono::{DateTime, SecondsFormat, Utc};
use half::f16;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[must_use]
pub fn encode_uint(v: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    append_counted_uvarint(&mut out, v);
    out
}

#[inline]
pub fn decode_uint(body: &[u8]) -> Result<u64> {
    decode_counted_uvarint(body)
}

#[must_use]
pub fn encode_int(v: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    append_counted_varint(&mut out, v);
    out
}

#[inline]
pub fn decode_int(body: &[u8]) -> Result<i64> {
    decode_counted_varint(body)
}

#[must_use]
pub fn encode_float64(v: f64) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}

pub fn decode_float64(body: &[u8]) -> Result<f64> {
    let arr: [u8; 8] = body
        .try_into()
        .map_err(|_| Error::bad_value(format!("float64 body of {} bytes", body.len())))?;
    Ok(f64::from_le_bytes(arr))
}

#[must_use]
pub fn encode_float32(v: f32) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}

pub fn decode_float32(body: &[u8]) -> Result<f32> {
    let arr: [u8; 4] = body
        .try_into()
        .map_err(|_| Error::bad_value(format!("float32 body of {} bytes", body.len())))?;
    Ok(f32::from_le_bytes(arr))
}

#[must_use]
pub fn encode_float16(v: f32) -> Vec<u8> {
    f32_to_f16_bits(v).to_le_bytes().to_vec()
}

pub fn decode_float16(body: &[u8]) -> Result<f32> {
    let arr: [u8; 2] = body
        .try_into()
        .map_err(|_| Error::bad_value(format!("float16 body of {} bytes", body.len())))?;
    Ok(f16_bits_to_f32(u16::from_le_bytes(arr)))
}

/// Decode any float width as f64.
pub fn decode_float(kind: PrimitiveKind, body: &[u8]) -> Result<f64> {
    match kind {
        PrimitiveKind::Float16 => decode_float16(body).map(f64::from),
        PrimitiveKind::Float32 => decode_float32(body).map(f64::from),
        PrimitiveKind::Float64 => decode_float64(body),
        other => Err(Error::bad_value(format!("{} is not a float", other))),
    }
}

/// Encode an f64 at the width of `kind`.
pub fn encode_float(kind: PrimitiveKind, v: f64) -> Result<Vec<u8>> {
    match kind {
        PrimitiveKind::Float16 => Ok(encode_float16(v as f32)),
        PrimitiveKind::Float32 => Ok(encode_float32(v as f32)),
        PrimitiveKind::Float64 => Ok(encode_float64(v)),
        other => Err(Error::bad_value(format!("{} is not a float", other))),
    }
}

#[must_use]
pub fn encode_bool(v: bool) -> Vec<u8> {
    vec![u8::from(v)]
}

pub fn decode_bool(body: &[u8]) -> Result<bool> {
    match body {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(Error::bad_value("bool body must be a single 0 or 1 byte")),
    }
}

#[must_use]
pub fn encode_ip(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(a) => a.octets().to_vec(),
        IpAddr::V6(a) => a.octets().to_vec(),
    }
}

pub fn decode_ip(body: &[u8]) -> Result<IpAddr> {
    match body.len() {
        4 => {
            let mut o = [0u8; 4];
            o.copy_from_slice(body);
            Ok(IpAddr::V4(Ipv4Addr::from(o)))
        }
        16 => {
            let mut o = [0u8; 16];
            o.copy_from_slice(body);
            Ok(IpAddr::V6(Ipv6Addr::from(o)))
        }
        n => Err(Error::bad_value(format!("ip body of {} bytes", n))),
    }
}

/// An IP prefix (address plus prefix length), always held masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNet {
    addr: IpAddr,
    prefix: u8,
}

impl IpNet {
    /// Build a prefix, masking host bits off `addr`.
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self> {
        let width = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > width {
            return Err(Error::bad_value(format!(
                "prefix length {} exceeds {}",
                prefix, width
            )));
        }
        let mut bytes = encode_ip(addr);
        let mask = mask_bytes(bytes.len(), prefix);
        for (b, m) in bytes.iter_mut().zip(&mask) {
            *b &= m;
        }
        Ok(Self {
            addr: decode_ip(&bytes)?,
            prefix,
        })
    }

    #[must_use]
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    #[must_use]
    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl Default for IpNet {
    /// `0.0.0.0/0`.
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            prefix: 0,
        }
    }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

fn mask_bytes(len: usize, prefix: u8) -> Vec<u8> {
    let mut mask = vec![0u8; len];
    let mut bits = usize::from(prefix);
    for b in &mut mask {
        let n = bits.min(8);
        *b = if n == 0 { 0 } else { 0xffu8 << (8 - n) };
        bits -= n;
    }
    mask
}

#[must_use]
pub fn encode_net(net: IpNet) -> Vec<u8> {
    let mut out = encode_ip(net.addr);
    let mask = mask_bytes(out.len(), net.prefix);
    out.extend_from_slice(&mask);
    out
}

pub fn decode_net(body: &[u8]) -> Result<IpNet> {
    let half = match body.len() {
        8 => 4,
        32 => 16,
        n => return Err(Error::bad_value(format!("net body of {} bytes", n))),
    };
    let (addr, mask) = body.split_at(half);
    let mut prefix = 0u32;
    for &m in mask {
        prefix += m.leading_ones();
        if m != 0xff {
            break;
        }
    }
    IpNet::new(decode_ip(addr)?, prefix as u8)
}

#[must_use]
pub fn encode_string(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

pub fn decode_string(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body).map_err(|e| Error::bad_value(format!("string: {}", e)))
}

/// Check that `body` is a well-formed encoding of `kind`.
pub fn check(kind: PrimitiveKind, body: &[u8]) -> Result<()> {
    use PrimitiveKind as K;
    let ok = match kind {
        K::Uint8 => decode_uint(body)? <= u64::from(u8::MAX),
        K::Uint16 => decode_uint(body)? <= u64::from(u16::MAX),
        K::Uint32 => decode_uint(body)? <= u64::from(u32::MAX),
        K::Uint64 => body.len() <= 8,
        K::Int8 => i8::try_from(decode_int(body)?).is_ok(),
        K::Int16 => i16::try_from(decode_int(body)?).is_ok(),
        K::Int32 => i32::try_from(decode_int(body)?).is_ok(),
        K::Int64 | K::Duration | K::Time => body.len() <= 8,
        K::Float16 => body.len() == 2,
        K::Float32 => body.len() == 4,
        K::Float64 => body.len() == 8,
        K::Bool => decode_bool(body).is_ok(),
        K::Bytes | K::Type => true,
        K::String => decode_string(body).is_ok(),
        K::Ip => decode_ip(body).is_ok(),
        K::Net => decode_net(body).is_ok(),
        K::Null => false,
        reserved => return Err(Error::UnsupportedPrimitive(reserved.id())),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::bad_value(format!(
            "{}-byte body is not a valid {}",
            body.len(),
            kind
        )))
    }
}

/// IEEE-754 binary32 to binary16, round to nearest even.
#[must_use]
pub fn f32_to_f16_bits(v: f32) -> u16 {
    f16::from_f32(v).to_bits()
}

#[must_use]
pub fn f16_bits_to_f32(h: u16) -> f32 {
    f16::from_bits(h).to_f32()
}

const NS_PER_US: u64 = 1_000;
const NS_PER_MS: u64 = 1_000_000;
const NS_PER_SEC: u64 = 1_000_000_000;
const NS_PER_MIN: u64 = 60 * NS_PER_SEC;
const NS_PER_HOUR: u64 = 60 * NS_PER_MIN;
const NS_PER_DAY: u64 = 24 * NS_PER_HOUR;

fn push_fraction(out: &mut String, whole: u64, frac: u64, digits: usize, unit: &str) {
    out.push_str(&whole.to_string());
    if frac != 0 {
        let s = format!("{:0width$}", frac, width = digits);
        out.push('.');
        out.push_str(s.trim_end_matches('0'));
    }
    out.push_str(unit);
}

/// Render nanoseconds as a duration such as `1d2h3m4.5s` or `250us`.
///
/// The magnitude is taken with `unsigned_abs`, so `i64::MIN` renders as
/// `-106751d23h47m16.854775808s`.
#[must_use]
pub fn format_duration(ns: i64) -> String {
    if ns == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    if ns < 0 {
        out.push('-');
    }
    let mut u = ns.unsigned_abs();
    if u < NS_PER_US {
        push_fraction(&mut out, u, 0, 0, "ns");
        return out;
    }
    if u < NS_PER_MS {
        push_fraction(&mut out, u / NS_PER_US, u % NS_PER_US, 3, "us");
        return out;
    }
    if u < NS_PER_SEC {
        push_fraction(&mut out, u / NS_PER_MS, u % NS_PER_MS, 6, "ms");
        return out;
    }
    for (unit, name) in [(NS_PER_DAY, "d"), (NS_PER_HOUR, "h"), (NS_PER_MIN, "m")] {
        if u >= unit {
            out.push_str(&(u / unit).to_string());
            out.push_str(name);
            u %= unit;
        }
    }
    if u != 0 {
        push_fraction(&mut out, u / NS_PER_SEC, u % NS_PER_SEC, 9, "s");
    }
    out
}

/// Render nanoseconds since the Unix epoch as an RFC 3339 UTC timestamp.
/// Fractional seconds print as 3, 6 or 9 digits, or not at all.
#[must_use]
pub fn format_time(ns: i64) -> String {
    DateTime::<Utc>::from_timestamp_nanos(ns).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
