// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Range-scan packet codec.
//!
//! A packet is ASCII base64 of little-endian `f32`s, either `(x, y, z, range)`
//! or `(x, y, z)` per point. When the float count divides by both, the
//! four-wide layout wins. Three-wide points get their planar distance as
//! range.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::domain::ports::{PortError, SensorPoint};

pub fn decode_packet(packet: &str) -> Result<Vec<SensorPoint>, PortError> {
    let packet = packet.trim();
    if packet.is_empty() {
        return Ok(Vec::new());
    }
    let raw = STANDARD
        .decode(packet)
        .map_err(|e| PortError::Packet(e.to_string()))?;
    if raw.len() % 4 != 0 {
        return Err(PortError::Packet(format!(
            "{} bytes is not a whole number of f32 values",
            raw.len()
        )));
    }

    let floats: Vec<f64> = raw
        .chunks_exact(4)
        .map(|b| f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        .collect();

    if floats.len() % 4 == 0 {
        Ok(floats
            .chunks_exact(4)
            .map(|p| SensorPoint::new(p[0], p[1], p[2], p[3]))
            .collect())
    } else if floats.len() % 3 == 0 {
        Ok(floats
            .chunks_exact(3)
            .map(|p| SensorPoint::new(p[0], p[1], p[2], p[0].hypot(p[1])))
            .collect())
    } else {
        Err(PortError::Packet(format!(
            "{} floats fit neither 3 nor 4 per point",
            floats.len()
        )))
    }
}

/// Four-wide layout.
pub fn encode_packet(points: &[SensorPoint]) -> String {
    let bytes: Vec<u8> = points
        .iter()
        .flat_map(|p| [p.x, p.y, p.z, p.range])
        .flat_map(|v| (v as f32).to_le_bytes())
        .collect();
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_of(floats: &[f32]) -> String {
        let bytes: Vec<u8> = floats.iter().flat_map(|f| f.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_four_wide_points() {
        let points = decode_packet(&packet_of(&[0.5, 0.0, 0.1, 0.5, 0.0, -0.25, 0.0, 0.25])).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], SensorPoint::new(0.5, 0.0, 0.10000000149011612, 0.5));
        assert_eq!(points[1].y, -0.25);
    }

    #[test]
    fn test_three_wide_derives_range() {
        let points = decode_packet(&packet_of(&[3.0, 4.0, 1.0])).unwrap();
        assert_eq!(points, vec![SensorPoint::new(3.0, 4.0, 1.0, 5.0)]);
    }

    #[test]
    fn test_twelve_floats_read_four_wide() {
        let floats: Vec<f32> = (0..12).map(|i| i as f32).collect();
        assert_eq!(decode_packet(&packet_of(&floats)).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_and_malformed() {
        assert!(decode_packet("").unwrap().is_empty());
        assert!(matches!(decode_packet("not base64!"), Err(PortError::Packet(_))));
        assert!(matches!(decode_packet(&packet_of(&[1.0, 2.0])), Err(PortError::Packet(_))));
        assert!(matches!(decode_packet(&STANDARD.encode([1u8, 2, 3])), Err(PortError::Packet(_))));
    }

    #[test]
    fn test_encoded_packet_decodes() {
        let points = [SensorPoint::new(0.5, -0.5, 0.0, 0.75)];
        assert_eq!(decode_packet(&encode_packet(&points)).unwrap(), points.to_vec());
    }
}
