// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fast Direct Parsing Module
//!
//! Parses GML coordinate text (`gml:posList`, `gml:pos`, `gml:coordinates`)
//! straight from the raw bytes of a text node into points, without going
//! through intermediate strings.
//!
//! All parsers are strict: a single malformed token rejects the whole list,
//! so that a ring never silently loses a vertex.

use crate::model::{Point3, Ring};

/// Estimate number of floats in coordinate data
#[inline]
fn estimate_float_count(bytes: &[u8]) -> usize {
    // Rough estimate: ~10 bytes per projected coordinate (including delimiters)
    bytes.len() / 10
}

/// Split on XML whitespace, skipping empty runs
#[inline]
fn tokens(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    bytes
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
}

/// Parse a single float token, rejecting trailing garbage
#[inline]
pub fn parse_f64(token: &[u8]) -> Option<f64> {
    match fast_float::parse_partial::<f64, _>(token) {
        Ok((value, consumed)) if consumed == token.len() && value.is_finite() => Some(value),
        _ => None,
    }
}

/// Parse a trimmed integer value
#[inline]
pub fn parse_i32(bytes: &[u8]) -> Option<i32> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    lexical_core::parse::<i32>(text.as_bytes()).ok()
}

/// Parse a whitespace separated float list to `Vec<f64>`
///
/// Returns `None` on the first malformed token.
#[inline]
pub fn parse_floats(bytes: &[u8]) -> Option<Vec<f64>> {
    let mut result = Vec::with_capacity(estimate_float_count(bytes));
    for token in tokens(bytes) {
        result.push(parse_f64(token)?);
    }
    Some(result)
}

/// Parse `gml:posList` / `gml:pos` text into points
///
/// `dimension` is the declared `srsDimension` (2 or 3). 2D points get `z = 0`.
/// Returns `None` when a token is malformed or the value count is not a
/// multiple of the dimension.
pub fn parse_pos_list(bytes: &[u8], dimension: usize) -> Option<Vec<Point3>> {
    if !(2..=3).contains(&dimension) {
        return None;
    }
    let values = parse_floats(bytes)?;
    if values.len() % dimension != 0 {
        return None;
    }

    let points = values
        .chunks_exact(dimension)
        .map(|c| Point3::new(c[0], c[1], if dimension == 3 { c[2] } else { 0.0 }))
        .collect();
    Some(points)
}

/// Parse legacy `gml:coordinates` text (`x,y,z x,y,z ...`)
pub fn parse_coordinates(bytes: &[u8]) -> Option<Vec<Point3>> {
    let mut points = Vec::with_capacity(estimate_float_count(bytes) / 3 + 1);
    for tuple in tokens(bytes) {
        let mut parts = tuple.split(|&b| b == b',');
        let x = parse_f64(parts.next()?)?;
        let y = parse_f64(parts.next()?)?;
        let z = match parts.next() {
            Some(t) => parse_f64(t)?,
            None => 0.0,
        };
        if parts.next().is_some() {
            return None;
        }
        points.push(Point3::new(x, y, z));
    }
    Some(points)
}

/// Normalize a GML ring: drop consecutive duplicates and the closing point
///
/// GML rings repeat the first point at the end; downstream code expects an
/// open ring.
pub fn open_ring(points: Vec<Point3>) -> Ring {
    let mut ring: Ring = Vec::with_capacity(points.len());
    for p in points {
        if ring.last() != Some(&p) {
            ring.push(p);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pos_list_3d() {
        let pts = parse_pos_list(b"0 0 0  10 0 0\n10 10 5.5", 3).unwrap();
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[2], Point3::new(10.0, 10.0, 5.5));
    }

    #[test]
    fn test_parse_pos_list_2d() {
        let pts = parse_pos_list(b"1 2 3 4", 2).unwrap();
        assert_eq!(pts, vec![Point3::new(1.0, 2.0, 0.0), Point3::new(3.0, 4.0, 0.0)]);
    }

    #[test]
    fn test_parse_pos_list_rejects_bad_input() {
        assert!(parse_pos_list(b"0 0 0 1 1", 3).is_none());
        assert!(parse_pos_list(b"0 0 abc", 3).is_none());
        assert!(parse_pos_list(b"0 0 1e400", 3).is_none());
        assert!(parse_pos_list(b"0 0 0", 4).is_none());
    }

    #[test]
    fn test_parse_scientific_and_negative() {
        let pts = parse_pos_list(b"-1.5e2 3.0E-1 .5", 3).unwrap();
        assert_eq!(pts[0], Point3::new(-150.0, 0.3, 0.5));
    }

    #[test]
    fn test_parse_coordinates() {
        let pts = parse_coordinates(b"0,0,1 2,3,4  5,6").unwrap();
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[1], Point3::new(2.0, 3.0, 4.0));
        assert_eq!(pts[2], Point3::new(5.0, 6.0, 0.0));
        assert!(parse_coordinates(b"1,2,3,4").is_none());
        assert!(parse_coordinates(b"1").is_none());
    }

    #[test]
    fn test_parse_i32() {
        assert_eq!(parse_i32(b" 3 "), Some(3));
        assert_eq!(parse_i32(b"0"), Some(0));
        assert_eq!(parse_i32(b"three"), None);
    }

    #[test]
    fn test_open_ring() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(1.0, 1.0, 0.0);
        assert_eq!(open_ring(vec![a, b, b, c, a]), vec![a, b, c]);
        assert_eq!(open_ring(vec![a, b, c]), vec![a, b, c]);
        assert_eq!(open_ring(vec![a, a, a]), vec![a]);
    }
}
