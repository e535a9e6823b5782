//! PLY reader and writer.
//!
//! Writes `binary_little_endian` with float positions, optional uchar
//! colours and `uchar`/`int` face lists. The reader accepts that layout in
//! both `ascii` and `binary_little_endian` encodings, plus any extra scalar
//! properties or elements, which it skips.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ErrorCode, Result, ServerError};
use crate::types::TriMesh;

/// Writes `mesh` to `path` as binary little-endian PLY.
pub fn write_ply(mesh: &TriMesh, path: &Path) -> Result<()> {
    let name = file_label(path);
    let file = fs::File::create(path).map_err(|e| {
        ServerError::with_source(
            ErrorCode::ExportFailed,
            format!("Failed to create {}", name),
            e,
        )
    })?;
    let mut out = BufWriter::new(file);
    encode_ply(mesh, &mut out)
        .and_then(|_| out.flush())
        .map_err(|e| {
            ServerError::with_source(
                ErrorCode::ExportFailed,
                format!("Failed to write {}", name),
                e,
            )
        })
}

fn encode_ply<W: Write>(mesh: &TriMesh, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "ply")?;
    writeln!(out, "format binary_little_endian 1.0")?;
    writeln!(out, "element vertex {}", mesh.vertex_count())?;
    writeln!(out, "property float x")?;
    writeln!(out, "property float y")?;
    writeln!(out, "property float z")?;
    if mesh.colors.is_some() {
        writeln!(out, "property uchar red")?;
        writeln!(out, "property uchar green")?;
        writeln!(out, "property uchar blue")?;
    }
    writeln!(out, "element face {}", mesh.face_count())?;
    writeln!(out, "property list uchar int vertex_indices")?;
    writeln!(out, "end_header")?;

    for (i, p) in mesh.positions.iter().enumerate() {
        for c in p {
            out.write_all(&c.to_le_bytes())?;
        }
        if let Some(colors) = &mesh.colors {
            let rgb = colors[i].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            out.write_all(&rgb)?;
        }
    }

    for face in &mesh.faces {
        out.write_all(&[3u8])?;
        for &i in face {
            out.write_all(&(i as i32).to_le_bytes())?;
        }
    }

    Ok(())
}

/// Reads a PLY file back into a mesh.
///
/// Polygons with more than three vertices are fan-triangulated.
pub fn read_ply(path: &Path) -> Result<TriMesh> {
    let bytes = fs::read(path).map_err(|e| {
        ServerError::with_source(
            ErrorCode::ExportFailed,
            format!("Failed to read {}", file_label(path)),
            e,
        )
    })?;
    parse_ply(&bytes)
}

/// Parses PLY bytes into a mesh.
pub fn parse_ply(bytes: &[u8]) -> Result<TriMesh> {
    let (header, body) = split_header(bytes)?;
    let header = parse_header(header)?;

    let mut source = match header.format {
        Format::Ascii => {
            let text = std::str::from_utf8(body).map_err(|_| malformed("ascii body is not UTF-8"))?;
            Source::Ascii(text.split_whitespace())
        }
        Format::BinaryLittleEndian => Source::Binary { data: body, pos: 0 },
    };

    let mut positions = Vec::new();
    let mut colors: Vec<[f32; 3]> = Vec::new();
    let mut faces = Vec::new();

    for element in &header.elements {
        match element.name.as_str() {
            "vertex" => {
                let layout = VertexLayout::from_properties(&element.properties)?;
                positions.reserve(element.count);
                for _ in 0..element.count {
                    let row = read_row(&mut source, &element.properties)?;
                    positions.push([
                        row[layout.x].scalar() as f32,
                        row[layout.y].scalar() as f32,
                        row[layout.z].scalar() as f32,
                    ]);
                    if let Some([r, g, b]) = layout.rgb {
                        let scale = layout.color_scale;
                        colors.push([
                            (row[r].scalar() / scale) as f32,
                            (row[g].scalar() / scale) as f32,
                            (row[b].scalar() / scale) as f32,
                        ]);
                    }
                }
            }
            "face" => {
                let list = element
                    .properties
                    .iter()
                    .position(|p| matches!(p, Property::List { .. }))
                    .ok_or_else(|| malformed("face element has no index list"))?;
                faces.reserve(element.count);
                for _ in 0..element.count {
                    let row = read_row(&mut source, &element.properties)?;
                    let indices = row[list].list();
                    for k in 1..indices.len().saturating_sub(1) {
                        faces.push([
                            to_index(indices[0])?,
                            to_index(indices[k])?,
                            to_index(indices[k + 1])?,
                        ]);
                    }
                }
            }
            _ => {
                for _ in 0..element.count {
                    read_row(&mut source, &element.properties)?;
                }
            }
        }
    }

    let mut mesh = TriMesh::new(positions, faces);
    if !colors.is_empty() {
        mesh = mesh.with_colors(colors);
    }
    mesh.validate().map_err(malformed)?;
    Ok(mesh)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Ascii,
    BinaryLittleEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "char" | "int8" => Some(Scalar::I8),
            "uchar" | "uint8" => Some(Scalar::U8),
            "short" | "int16" => Some(Scalar::I16),
            "ushort" | "uint16" => Some(Scalar::U16),
            "int" | "int32" => Some(Scalar::I32),
            "uint" | "uint32" => Some(Scalar::U32),
            "float" | "float32" => Some(Scalar::F32),
            "double" | "float64" => Some(Scalar::F64),
            _ => None,
        }
    }

    fn size(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::F64 => 8,
        }
    }

    fn decode_le(self, b: &[u8]) -> f64 {
        match self {
            Scalar::I8 => b[0] as i8 as f64,
            Scalar::U8 => b[0] as f64,
            Scalar::I16 => i16::from_le_bytes([b[0], b[1]]) as f64,
            Scalar::U16 => u16::from_le_bytes([b[0], b[1]]) as f64,
            Scalar::I32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Scalar::U32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Scalar::F32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            Scalar::F64 => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        }
    }
}

#[derive(Debug, Clone)]
enum Property {
    Scalar { name: String, ty: Scalar },
    List { count: Scalar, item: Scalar },
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Debug)]
struct Header {
    format: Format,
    elements: Vec<Element>,
}

enum Value {
    Scalar(f64),
    List(Vec<f64>),
}

impl Value {
    fn scalar(&self) -> f64 {
        match self {
            Value::Scalar(v) => *v,
            Value::List(_) => 0.0,
        }
    }

    fn list(&self) -> &[f64] {
        match self {
            Value::List(v) => v,
            Value::Scalar(_) => &[],
        }
    }
}

struct VertexLayout {
    x: usize,
    y: usize,
    z: usize,
    rgb: Option<[usize; 3]>,
    color_scale: f64,
}

impl VertexLayout {
    fn from_properties(properties: &[Property]) -> Result<Self> {
        let find = |wanted: &str| {
            properties.iter().position(
                |p| matches!(p, Property::Scalar { name, .. } if name == wanted),
            )
        };
        let x = find("x").ok_or_else(|| malformed("vertex has no x"))?;
        let y = find("y").ok_or_else(|| malformed("vertex has no y"))?;
        let z = find("z").ok_or_else(|| malformed("vertex has no z"))?;

        let rgb = match (find("red"), find("green"), find("blue")) {
            (Some(r), Some(g), Some(b)) => Some([r, g, b]),
            _ => None,
        };
        let color_scale = match rgb.map(|[r, _, _]| &properties[r]) {
            Some(Property::Scalar { ty: Scalar::F32 | Scalar::F64, .. }) => 1.0,
            Some(Property::Scalar { ty: Scalar::U16, .. }) => 65535.0,
            _ => 255.0,
        };

        Ok(Self {
            x,
            y,
            z,
            rgb,
            color_scale,
        })
    }
}

enum Source<'a> {
    Ascii(std::str::SplitWhitespace<'a>),
    Binary { data: &'a [u8], pos: usize },
}

impl Source<'_> {
    fn next(&mut self, ty: Scalar) -> Result<f64> {
        match self {
            Source::Ascii(tokens) => tokens
                .next()
                .ok_or_else(|| malformed("unexpected end of data"))?
                .parse::<f64>()
                .map_err(|_| malformed("non-numeric value")),
            Source::Binary { data, pos } => {
                let end = *pos + ty.size();
                let bytes = data
                    .get(*pos..end)
                    .ok_or_else(|| malformed("unexpected end of data"))?;
                *pos = end;
                Ok(ty.decode_le(bytes))
            }
        }
    }
}

fn read_row(source: &mut Source<'_>, properties: &[Property]) -> Result<Vec<Value>> {
    let mut row = Vec::with_capacity(properties.len());
    for property in properties {
        match property {
            Property::Scalar { ty, .. } => row.push(Value::Scalar(source.next(*ty)?)),
            Property::List { count, item } => {
                let n = source.next(*count)?;
                if n < 0.0 {
                    return Err(malformed("negative list length"));
                }
                let n = n as usize;
                let mut values = Vec::with_capacity(n.min(16));
                for _ in 0..n {
                    values.push(source.next(*item)?);
                }
                row.push(Value::List(values));
            }
        }
    }
    Ok(row)
}

fn split_header(bytes: &[u8]) -> Result<(&str, &[u8])> {
    const MARKER: &[u8] = b"end_header";
    if !bytes.starts_with(b"ply") {
        return Err(malformed("missing ply magic"));
    }
    let at = bytes
        .windows(MARKER.len())
        .position(|w| w == MARKER)
        .ok_or_else(|| malformed("missing end_header"))?;
    let mut body_start = at + MARKER.len();
    if bytes.get(body_start) == Some(&b'\r') {
        body_start += 1;
    }
    if bytes.get(body_start) == Some(&b'\n') {
        body_start += 1;
    }
    let header =
        std::str::from_utf8(&bytes[..at]).map_err(|_| malformed("header is not UTF-8"))?;
    Ok((header, &bytes[body_start..]))
}

fn parse_header(text: &str) -> Result<Header> {
    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();

    for line in text.lines().skip(1) {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] | ["comment", ..] | ["obj_info", ..] => {}
            ["format", "ascii", _] => format = Some(Format::Ascii),
            ["format", "binary_little_endian", _] => format = Some(Format::BinaryLittleEndian),
            ["format", other, _] => {
                return Err(malformed(&format!("unsupported format {}", other)));
            }
            ["element", name, count] => {
                let count = count
                    .parse()
                    .map_err(|_| malformed("element count is not a number"))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            ["property", "list", count, item, _name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| malformed("property before element"))?;
                let count = Scalar::parse(count).ok_or_else(|| malformed("unknown list count type"))?;
                let item = Scalar::parse(item).ok_or_else(|| malformed("unknown list item type"))?;
                element.properties.push(Property::List { count, item });
            }
            ["property", ty, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| malformed("property before element"))?;
                let ty = Scalar::parse(ty).ok_or_else(|| malformed("unknown property type"))?;
                element.properties.push(Property::Scalar {
                    name: name.to_string(),
                    ty,
                });
            }
            _ => return Err(malformed(&format!("unrecognised header line {:?}", line))),
        }
    }

    let format = format.ok_or_else(|| malformed("missing format line"))?;
    Ok(Header { format, elements })
}

fn to_index(v: f64) -> Result<u32> {
    if v < 0.0 || v > u32::MAX as f64 {
        return Err(malformed("face index out of range"));
    }
    Ok(v as u32)
}

fn malformed(reason: impl AsRef<str>) -> ServerError {
    ServerError::export_failed(format!("malformed PLY: {}", reason.as_ref()))
}

/// File name for error messages; never the full path.
pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}
