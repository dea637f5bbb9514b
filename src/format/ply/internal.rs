use std::io::{Cursor, Read};

use anyhow::{bail, Context, Result};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};

const MAGIC: &str = "ply";
const FORMAT: &str = "format binary_little_endian 1.0";
const FACE_LIST: &str = "property list uchar uint vertex_indices";

/// Represents a PLY file in the binary little-endian flavor the engine loads.
/// Vertex records are kept packed: every record is the concatenation of the
/// declared properties' little-endian bytes, so a record doubles as the exact
/// identity of the vertex it encodes. Faces are always triangles.
#[derive(Debug, PartialEq)]
pub struct Ply {
    /// Optional comment line written into the header.
    pub comment: Option<String>,
    /// The declared vertex properties, in record order.
    pub properties: Vec<Property>,
    /// Packed vertex records, each `record_size()` bytes long.
    pub vertices: Vec<Vec<u8>>,
    /// Triangle corner indices into `vertices`.
    pub faces: Vec<[u32; 3]>,
}

impl Ply {
    pub fn new() -> Self {
        Default::default()
    }

    /// Size in bytes of one packed vertex record.
    pub fn record_size(&self) -> usize {
        self.properties
            .iter()
            .map(|property| property.kind.size())
            .sum()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        fn line<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a str> {
            let len =
                memchr::memchr(b'\n', &bytes[*offset..]).context("unterminated header line")?;
            let text = std::str::from_utf8(&bytes[*offset..*offset + len])
                .context("header line is not valid utf-8")?;
            *offset += len + 1;
            Ok(text)
        }

        let mut ply = Self::new();
        let mut offset = 0;

        if line(bytes, &mut offset)? != MAGIC {
            bail!("missing magic line");
        }
        if line(bytes, &mut offset)? != FORMAT {
            bail!("unsupported format line");
        }

        let mut num_vertices = 0;
        let mut num_faces = 0;

        loop {
            let text = line(bytes, &mut offset)?;
            if text == "end_header" {
                break;
            } else if let Some(comment) = text.strip_prefix("comment ") {
                ply.comment = Some(comment.to_string());
            } else if let Some(count) = text.strip_prefix("element vertex ") {
                num_vertices = count.parse().context("invalid vertex count")?;
            } else if let Some(count) = text.strip_prefix("element face ") {
                num_faces = count.parse().context("invalid face count")?;
            } else if text == FACE_LIST {
                continue;
            } else if let Some(declaration) = text.strip_prefix("property ") {
                ply.properties.push(Property::from_declaration(declaration)?);
            } else {
                bail!("unrecognized header line: {:?}", text);
            }
        }

        let record_size = ply.record_size();
        let mut reader = Cursor::new(&bytes[offset..]);

        for _ in 0..num_vertices {
            let mut record = vec![0; record_size];
            reader.read_exact(&mut record)?;
            ply.vertices.push(record);
        }
        for _ in 0..num_faces {
            let corners = reader.read_u8()?;
            if corners != 3 {
                bail!("face with {} corners, expected a triangle", corners);
            }
            let mut face = [0; 3];
            reader.read_u32_into::<LE>(&mut face)?;
            ply.faces.push(face);
        }

        Ok(ply)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();

        bytes.extend_from_slice(MAGIC.as_bytes());
        bytes.push(b'\n');
        bytes.extend_from_slice(FORMAT.as_bytes());
        bytes.push(b'\n');
        if let Some(comment) = &self.comment {
            bytes.extend_from_slice(format!("comment {}\n", comment).as_bytes());
        }

        bytes.extend_from_slice(format!("element vertex {}\n", self.vertices.len()).as_bytes());
        for property in &self.properties {
            bytes.extend_from_slice(
                format!("property {} {}\n", property.kind.keyword(), property.name).as_bytes(),
            );
        }

        bytes.extend_from_slice(format!("element face {}\n", self.faces.len()).as_bytes());
        bytes.extend_from_slice(FACE_LIST.as_bytes());
        bytes.push(b'\n');
        bytes.extend_from_slice(b"end_header\n");

        for record in &self.vertices {
            bytes.extend_from_slice(record);
        }
        for face in &self.faces {
            bytes.write_u8(3)?;
            for &index in face {
                bytes.write_u32::<LE>(index)?;
            }
        }

        Ok(bytes)
    }
}

impl Default for Ply {
    fn default() -> Self {
        Self {
            comment: None,
            properties: Vec::new(),
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }
}

/// One declared vertex property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub kind: ScalarType,
    pub name: &'static str,
}

impl Property {
    fn from_declaration(declaration: &str) -> Result<Self> {
        let (keyword, name) = declaration
            .split_once(' ')
            .context("malformed property line")?;
        let kind = ScalarType::from_keyword(keyword)?;
        let name = NAMES
            .iter()
            .copied()
            .find(|&known| known == name)
            .with_context(|| format!("unrecognized property name: {:?}", name))?;

        Ok(Self { kind, name })
    }
}

/// The canonical property names, in the channel order records are packed in.
const NAMES: [&str; 27] = [
    "x", "y", "z", "s", "t", "nx", "ny", "nz", "tx", "ty", "tz", "bx", "by", "bz", "red", "green",
    "blue", "alpha", "b0", "b1", "b2", "b3", "w0", "w1", "w2", "w3", "vertex_indices",
];

/// Scalar types a vertex property can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Float,
    Uchar,
    Int,
}

impl ScalarType {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Uchar => "uchar",
            Self::Int => "int",
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::Float => 4,
            Self::Uchar => 1,
            Self::Int => 4,
        }
    }

    fn from_keyword(keyword: &str) -> Result<Self> {
        match keyword {
            "float" => Ok(Self::Float),
            "uchar" => Ok(Self::Uchar),
            "int" => Ok(Self::Int),
            _ => bail!("unrecognized property type: {:?}", keyword),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn read() {
        let (expected, bytes) = data();
        let actual = Ply::from_bytes(&bytes).unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn write() {
        let (ply, expected) = data();
        let actual = ply.to_bytes().unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn rejects_non_triangle_faces() {
        let (_, mut bytes) = data();

        // Patch the corner count of the only face.
        let face_offset = bytes.len() - 13;
        assert_eq!(3, bytes[face_offset]);
        bytes[face_offset] = 4;

        assert!(Ply::from_bytes(&bytes).is_err());
    }

    fn data() -> (Ply, Vec<u8>) {
        let mut ply = Ply::new();
        ply.comment = Some(String::from("made with gxport"));
        ply.properties = vec![
            Property {
                kind: ScalarType::Float,
                name: "x",
            },
            Property {
                kind: ScalarType::Float,
                name: "y",
            },
            Property {
                kind: ScalarType::Float,
                name: "z",
            },
        ];
        ply.vertices = vec![
            1_f32.to_le_bytes().repeat(3),
            [0_f32.to_le_bytes(), 1_f32.to_le_bytes(), 0_f32.to_le_bytes()].concat(),
            2_f32.to_le_bytes().repeat(3),
        ];
        ply.faces = vec![[0, 1, 2]];

        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"ply\n\
              format binary_little_endian 1.0\n\
              comment made with gxport\n\
              element vertex 3\n\
              property float x\n\
              property float y\n\
              property float z\n\
              element face 1\n\
              property list uchar uint vertex_indices\n\
              end_header\n",
        );
        for record in &ply.vertices {
            bytes.extend_from_slice(record);
        }
        bytes.push(3);
        for index in 0..3_u32 {
            bytes.extend_from_slice(&index.to_le_bytes());
        }

        (ply, bytes)
    }
}
