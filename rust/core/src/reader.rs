// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Streaming CityGML reader
//!
//! Pulls XML events with `quick-xml` and builds one [`CityObject`] per
//! `cityObjectMember` without materializing a document tree. Only the object
//! currently being read is held in memory, so callers that consume
//! [`CityGmlReader::next_object`] incrementally keep peak memory bounded by
//! the largest single object.
//!
//! Recoverable defects (short rings, empty surfaces, bad attribute values)
//! are logged, counted in [`ReadStats`] and skipped. Structural defects
//! (malformed XML, wrong root, truncation, missing `gml:id`) abort reading.

use crate::classify::ElementType;
use crate::error::{Error, Result};
use crate::fast_parse::{open_ring, parse_coordinates, parse_f64, parse_floats, parse_i32, parse_pos_list};
use crate::model::{
    BoundarySurface, BuildingAttributes, CityModel, CityObject, Envelope, Point3, Polygon,
    ReadStats, Ring,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Generic attribute element names (`gen:*Attribute`)
const GENERIC_ATTRIBUTES: [&str; 6] = [
    "stringAttribute",
    "intAttribute",
    "doubleAttribute",
    "dateAttribute",
    "uriAttribute",
    "measureAttribute",
];

#[inline]
fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

#[inline]
fn is_member(name: &str) -> bool {
    matches!(name, "cityObjectMember" | "featureMember")
}

#[inline]
fn is_polygon(name: &str) -> bool {
    matches!(name, "Polygon" | "Triangle" | "Rectangle")
}

/// Context of the children currently being walked inside an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Direct children of the city object: attributes live here
    Object,
    /// Children of `boundedBy`/`opening`: every child is a surface
    Surfaces,
    /// Anything deeper
    Nested,
}

/// Object under construction
struct ObjectFrame {
    object: CityObject,
    attributes: BuildingAttributes,
    /// Surfaces currently open, innermost last
    open: Vec<BoundarySurface>,
    /// Polygons outside any boundary surface
    loose: Vec<Polygon>,
}

impl ObjectFrame {
    fn push_polygon(&mut self, polygon: Polygon) {
        match self.open.last_mut() {
            Some(surface) => surface.polygons.push(polygon),
            None => self.loose.push(polygon),
        }
    }

    fn finish(self) -> CityObject {
        let mut object = self.object;
        if !self.loose.is_empty() {
            let mut implicit = BoundarySurface::new(None, object.element_type);
            implicit.polygons = self.loose;
            object.surfaces.push(implicit);
        }
        if !self.attributes.is_empty() {
            object.attributes = Some(self.attributes);
        }
        object
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeRoot,
    InRoot,
    Done,
}

/// Incremental CityGML reader
pub struct CityGmlReader<R> {
    reader: Reader<R>,
    state: State,
    /// Open elements from the root down to the current member
    path: Vec<String>,
    envelope: Option<Envelope>,
    stats: ReadStats,
}

impl<'a> CityGmlReader<&'a [u8]> {
    /// Read from an in-memory document
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl CityGmlReader<BufReader<File>> {
    /// Open a document on disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> CityGmlReader<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        Self {
            reader,
            state: State::BeforeRoot,
            path: Vec::new(),
            envelope: None,
            stats: ReadStats::default(),
        }
    }

    fn next_event<'b>(&mut self, buf: &'b mut Vec<u8>) -> Result<Event<'b>> {
        let position = self.reader.buffer_position();
        self.reader
            .read_event_into(buf)
            .map_err(|e| Error::xml(position, e))
    }

    fn attribute(&self, e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
        let position = self.reader.buffer_position();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| Error::xml(position, err))?;
            if attr.key.local_name().as_ref() == key {
                let value = attr
                    .unescape_value()
                    .map_err(|err| Error::xml(position, err))?;
                return Ok(Some(value.into_owned()));
            }
        }
        Ok(None)
    }

    /// Read the next city object in document order.
    ///
    /// Returns `Ok(None)` once the root element has been closed.
    pub fn next_object(&mut self) -> Result<Option<CityObject>> {
        if self.state == State::Done {
            return Ok(None);
        }

        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.next_event(&mut buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    if self.state == State::BeforeRoot {
                        if name != "CityModel" {
                            return Err(Error::UnknownRoot(name));
                        }
                        self.state = State::InRoot;
                        self.path.push(name);
                        continue;
                    }

                    let parent = self.path.last().map(String::as_str);
                    let in_member = parent.is_some_and(is_member);
                    let in_model_bounds = self.path.len() == 2 && parent == Some("boundedBy");
                    if in_member {
                        let object = self.read_object(&e, &name)?;
                        return Ok(Some(object));
                    }
                    if name == "Envelope" && in_model_bounds {
                        self.envelope = self.read_envelope(&name)?;
                        continue;
                    }
                    self.path.push(name);
                }
                Event::Empty(e) => {
                    let name = local_name(&e);
                    if self.state == State::BeforeRoot {
                        if name != "CityModel" {
                            return Err(Error::UnknownRoot(name));
                        }
                        self.state = State::Done;
                        return Ok(None);
                    }
                    if self.path.last().is_some_and(|p| is_member(p)) {
                        let id = self.object_id(&e, &name)?;
                        tracing::debug!(id = %id, "City object without content");
                        return Ok(Some(CityObject::new(id, ElementType::from_name(&name))));
                    }
                }
                Event::End(_) => {
                    self.path.pop();
                    if self.path.is_empty() {
                        self.state = State::Done;
                        return Ok(None);
                    }
                }
                Event::Eof => {
                    return match (self.state, self.path.last()) {
                        (State::BeforeRoot, _) => Err(Error::EmptyDocument),
                        (_, Some(open)) => Err(Error::UnexpectedEof {
                            element: open.clone(),
                        }),
                        (_, None) => {
                            self.state = State::Done;
                            Ok(None)
                        }
                    };
                }
                _ => {}
            }
        }
    }

    /// Drain the remaining objects into a [`CityModel`]
    pub fn into_model(self) -> Result<CityModel> {
        Ok(self.into_model_until(|| false)?.unwrap_or_default())
    }

    /// Drain the remaining objects, polling `cancelled` after each one.
    ///
    /// Returns `Ok(None)` as soon as `cancelled` reports `true`.
    pub fn into_model_until(mut self, mut cancelled: impl FnMut() -> bool) -> Result<Option<CityModel>> {
        let mut model = CityModel::new();
        while let Some(object) = self.next_object()? {
            if cancelled() {
                tracing::debug!(objects = model.len(), "Reading cancelled");
                return Ok(None);
            }
            model.push(object);
        }
        model.envelope = self.envelope;
        model.stats = self.stats;

        tracing::info!(
            objects = model.len(),
            polygons = model.polygon_count(),
            dropped_rings = model.stats.dropped_rings,
            empty_surfaces = model.stats.empty_surfaces,
            "CityGML document read"
        );
        Ok(Some(model))
    }

    fn object_id(&self, e: &BytesStart, name: &str) -> Result<String> {
        match self.attribute(e, b"id")? {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::MissingIdentifier {
                element: name.to_string(),
                position: self.reader.buffer_position(),
            }),
        }
    }

    fn read_object(&mut self, e: &BytesStart, name: &str) -> Result<CityObject> {
        let id = self.object_id(e, name)?;
        let element_type = ElementType::from_name(name);

        let mut frame = ObjectFrame {
            object: CityObject::new(id, element_type),
            attributes: BuildingAttributes::default(),
            open: Vec::new(),
            loose: Vec::new(),
        };
        self.walk(name, &mut frame, Scope::Object)?;

        let object = frame.finish();
        tracing::debug!(
            id = %object.id,
            element_type = %object.element_type,
            surfaces = object.surfaces.len(),
            polygons = object.polygon_count(),
            "Read city object"
        );
        Ok(object)
    }

    /// Walk the children of `element` up to its end tag
    fn walk(&mut self, element: &str, frame: &mut ObjectFrame, scope: Scope) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.next_event(&mut buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    if scope == Scope::Object && self.read_attribute(&e, &name, &mut frame.attributes)? {
                        continue;
                    }
                    if is_polygon(&name) {
                        if let Some(polygon) = self.read_polygon(&name)? {
                            frame.push_polygon(polygon);
                        }
                        continue;
                    }
                    if name == "Envelope" {
                        self.skip(&name)?;
                        continue;
                    }

                    let element_type = ElementType::from_name(&name);
                    if scope == Scope::Surfaces || element_type.is_boundary_surface() {
                        let id = self.attribute(&e, b"id")?;
                        frame.open.push(BoundarySurface::new(id, element_type));
                        self.walk(&name, frame, Scope::Nested)?;
                        if let Some(surface) = frame.open.pop() {
                            self.close_surface(frame, surface);
                        }
                        continue;
                    }

                    let child_scope = match name.as_str() {
                        "boundedBy" | "opening" => Scope::Surfaces,
                        _ => Scope::Nested,
                    };
                    self.walk(&name, frame, child_scope)?;
                }
                Event::Empty(e) => {
                    let name = local_name(&e);
                    let element_type = ElementType::from_name(&name);
                    let is_surface = scope == Scope::Surfaces || element_type.is_boundary_surface();
                    if is_surface && name != "Envelope" && !is_polygon(&name) {
                        let id = self.attribute(&e, b"id")?;
                        self.close_surface(frame, BoundarySurface::new(id, element_type));
                    }
                }
                Event::End(_) => return Ok(()),
                Event::Eof => {
                    return Err(Error::UnexpectedEof {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }
    }

    /// Keep a finished surface, or count and skip it when it has no polygons
    fn close_surface(&mut self, frame: &mut ObjectFrame, surface: BoundarySurface) {
        if surface.polygons.is_empty() {
            self.stats.empty_surfaces += 1;
            tracing::warn!(
                object = %frame.object.id,
                surface = surface.id.as_deref().unwrap_or(""),
                element_type = %surface.element_type,
                "Skipping boundary surface without polygons"
            );
        } else {
            frame.object.surfaces.push(surface);
        }
    }

    /// Consume a building attribute element. Returns `false` if `name` is not one.
    fn read_attribute(
        &mut self,
        e: &BytesStart,
        name: &str,
        attributes: &mut BuildingAttributes,
    ) -> Result<bool> {
        match name {
            "name" | "description" | "function" | "roofType" => {
                let text = self.read_text(name)?;
                let slot = match name {
                    "name" => &mut attributes.name,
                    "description" => &mut attributes.description,
                    "function" => &mut attributes.function,
                    _ => &mut attributes.roof_type,
                };
                if slot.is_none() && !text.is_empty() {
                    *slot = Some(text);
                }
            }
            "measuredHeight" => {
                let text = self.read_text(name)?;
                if attributes.measured_height.is_none() {
                    attributes.measured_height = self.number(name, &text, |t| parse_f64(t.trim().as_bytes()));
                }
            }
            "storeysAboveGround" | "storeysBelowGround" | "yearOfConstruction" => {
                let text = self.read_text(name)?;
                let value = self.number(name, &text, |t| parse_i32(t.as_bytes()));
                let slot = match name {
                    "storeysAboveGround" => &mut attributes.storeys_above_ground,
                    "storeysBelowGround" => &mut attributes.storeys_below_ground,
                    _ => &mut attributes.year_of_construction,
                };
                if slot.is_none() {
                    *slot = value;
                }
            }
            n if GENERIC_ATTRIBUTES.contains(&n) => {
                let key = self.attribute(e, b"name")?;
                let value = self.read_generic_value(name)?;
                match (key, value) {
                    (Some(key), Some(value)) => {
                        attributes.generic.entry(key).or_insert(value);
                    }
                    _ => {
                        self.stats.invalid_attributes += 1;
                        tracing::warn!(element = name, "Generic attribute without name or value");
                    }
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn number<T>(&mut self, name: &str, text: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        if text.is_empty() {
            return None;
        }
        let value = parse(text);
        if value.is_none() {
            self.stats.invalid_attributes += 1;
            tracing::warn!(attribute = name, value = text, "Ignoring unparsable attribute value");
        }
        value
    }

    fn read_generic_value(&mut self, element: &str) -> Result<Option<String>> {
        let mut value = None;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.next_event(&mut buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    if name == "value" {
                        value = Some(self.read_text(&name)?);
                    } else {
                        self.skip(&name)?;
                    }
                }
                Event::End(_) => return Ok(value),
                Event::Eof => {
                    return Err(Error::UnexpectedEof {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }
    }

    fn read_polygon(&mut self, element: &str) -> Result<Option<Polygon>> {
        let mut exterior: Option<Ring> = None;
        let mut interiors = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.next_event(&mut buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    match name.as_str() {
                        "exterior" | "outerBoundaryIs" => {
                            exterior = self.read_boundary(&name)?;
                        }
                        "interior" | "innerBoundaryIs" => {
                            if let Some(ring) = self.read_boundary(&name)? {
                                interiors.push(ring);
                            }
                        }
                        _ => self.skip(&name)?,
                    }
                }
                Event::End(_) => break,
                Event::Eof => {
                    return Err(Error::UnexpectedEof {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }

        match exterior {
            Some(exterior) => Ok(Some(Polygon { exterior, interiors })),
            None => {
                self.stats.dropped_polygons += 1;
                tracing::warn!(
                    position = self.reader.buffer_position(),
                    "Dropping polygon without a usable exterior ring"
                );
                Ok(None)
            }
        }
    }

    /// Read an `exterior`/`interior` wrapper down to its `LinearRing`
    fn read_boundary(&mut self, element: &str) -> Result<Option<Ring>> {
        let mut ring = None;
        let mut found = false;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.next_event(&mut buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    if name == "LinearRing" && !found {
                        found = true;
                        ring = self.read_ring(&name)?;
                    } else {
                        self.skip(&name)?;
                    }
                }
                Event::End(_) => break,
                Event::Eof => {
                    return Err(Error::UnexpectedEof {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }
        if !found {
            self.stats.dropped_rings += 1;
            tracing::warn!(element, "Dropping boundary without a LinearRing");
        }
        Ok(ring)
    }

    fn read_ring(&mut self, element: &str) -> Result<Option<Ring>> {
        let mut points = Vec::new();
        let mut valid = true;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.next_event(&mut buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    let parsed = match name.as_str() {
                        "posList" | "pos" => {
                            let dimension = self
                                .attribute(&e, b"srsDimension")?
                                .and_then(|d| parse_i32(d.as_bytes()))
                                .map_or(3, |d| d.max(0) as usize);
                            let text = self.read_text(&name)?;
                            parse_pos_list(text.as_bytes(), dimension)
                        }
                        "coordinates" => {
                            let text = self.read_text(&name)?;
                            parse_coordinates(text.as_bytes())
                        }
                        _ => {
                            self.skip(&name)?;
                            continue;
                        }
                    };
                    match parsed {
                        Some(p) => points.extend(p),
                        None => valid = false,
                    }
                }
                Event::End(_) => break,
                Event::Eof => {
                    return Err(Error::UnexpectedEof {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }

        let ring = if valid { open_ring(points) } else { Vec::new() };
        if ring.len() < 3 {
            self.stats.dropped_rings += 1;
            tracing::warn!(
                position = self.reader.buffer_position(),
                points = ring.len(),
                malformed = !valid,
                "Dropping ring with fewer than 3 points"
            );
            return Ok(None);
        }
        Ok(Some(ring))
    }

    fn read_envelope(&mut self, element: &str) -> Result<Option<Envelope>> {
        let mut lower = None;
        let mut upper = None;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.next_event(&mut buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    match name.as_str() {
                        "lowerCorner" => lower = corner(&self.read_text(&name)?),
                        "upperCorner" => upper = corner(&self.read_text(&name)?),
                        _ => self.skip(&name)?,
                    }
                }
                Event::End(_) => break,
                Event::Eof => {
                    return Err(Error::UnexpectedEof {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }
        Ok(lower.zip(upper).map(|(lower, upper)| Envelope { lower, upper }))
    }

    /// Concatenated text content of `element`, nested elements ignored
    fn read_text(&mut self, element: &str) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let position = self.reader.buffer_position();
            match self.next_event(&mut buf)? {
                Event::Text(t) => {
                    if depth == 0 {
                        let value = t.unescape().map_err(|err| Error::xml(position, err))?;
                        text.push_str(&value);
                    }
                }
                Event::CData(c) => {
                    if depth == 0 {
                        text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    if depth == 0 {
                        return Ok(text.trim().to_string());
                    }
                    depth -= 1;
                }
                Event::Eof => {
                    return Err(Error::UnexpectedEof {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }
    }

    /// Consume everything up to the end tag of `element`
    fn skip(&mut self, element: &str) -> Result<()> {
        let mut depth = 0usize;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.next_event(&mut buf)? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                Event::Eof => {
                    return Err(Error::UnexpectedEof {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }
    }
}

fn corner(text: &str) -> Option<Point3> {
    match parse_floats(text.as_bytes())?.as_slice() {
        [x, y] => Some(Point3::new(*x, *y, 0.0)),
        [x, y, z] => Some(Point3::new(*x, *y, *z)),
        _ => None,
    }
}

/// Parse a complete in-memory document
pub fn parse_bytes(bytes: &[u8]) -> Result<CityModel> {
    CityGmlReader::from_bytes(bytes).into_model()
}
