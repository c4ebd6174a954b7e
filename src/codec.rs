//! Binary record for a [`DocumentIndex`].
//!
//! Layout (integers are u32 LE, strings are a u32 byte length then UTF-8):
//! - 4 bytes: magic `CSIX`
//! - version, dimension D
//! - embedder fingerprint
//! - title count, then each title
//! - line count L, then per line: its index and the seven views in
//!   [`LineView::ALL`] order, each as a row count R followed by R * D f32
//!   values in native byte order, row-major

use crate::{
    document::{DocumentIndex, Line, LineView},
    embedding::ViewMatrix,
    error::{Error, Result},
};

const MAGIC: &[u8; 4] = b"CSIX";
pub const FORMAT_VERSION: u32 = 1;

/// Serialize an index.
pub fn encode_index(index: &DocumentIndex) -> Vec<u8> {
    let floats: usize = index
        .lines()
        .iter()
        .flat_map(|line| LineView::ALL.map(|v| line.view(v).data().len()))
        .sum();
    let mut out = Vec::with_capacity(64 + floats * 4);

    out.extend_from_slice(MAGIC);
    put_u32(&mut out, FORMAT_VERSION);
    put_u32(&mut out, index.dimension() as u32);
    put_str(&mut out, index.embedder());

    put_u32(&mut out, index.titles().len() as u32);
    for title in index.titles() {
        put_str(&mut out, title);
    }

    put_u32(&mut out, index.len() as u32);
    for line in index.lines() {
        put_u32(&mut out, line.index as u32);
        for view in LineView::ALL {
            let matrix = line.view(view);
            put_u32(&mut out, matrix.rows() as u32);
            out.extend_from_slice(bytemuck::cast_slice(matrix.data()));
        }
    }

    out
}

/// Parse an index written by [`encode_index`].
pub fn decode_index(bytes: &[u8]) -> Result<DocumentIndex> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(4)? != MAGIC {
        return Err(Error::Codec("not an index record".to_string()));
    }
    let version = reader.u32()?;
    if version != FORMAT_VERSION {
        return Err(Error::Codec(format!(
            "unsupported index format version {version}"
        )));
    }

    let dimension = reader.u32()? as usize;
    let embedder = reader.string()?;

    let title_count = reader.u32()? as usize;
    let titles = (0..title_count)
        .map(|_| reader.string())
        .collect::<Result<Vec<_>>>()?;

    let line_count = reader.u32()? as usize;
    let mut lines = Vec::with_capacity(line_count.min(bytes.len()));
    for _ in 0..line_count {
        let index = reader.u32()? as usize;
        let mut views = Vec::with_capacity(LineView::ALL.len());
        for _ in LineView::ALL {
            let rows = reader.u32()? as usize;
            let len = rows
                .checked_mul(dimension)
                .and_then(|n| n.checked_mul(4))
                .ok_or_else(|| Error::Codec(format!("view of {rows} rows is too large")))?;
            let raw = reader.take(len)?;
            let data: Vec<f32> = bytemuck::pod_collect_to_vec(raw);
            views.push(ViewMatrix::new(rows, dimension, data)?);
        }
        let views: [ViewMatrix; 7] = views
            .try_into()
            .map_err(|_| Error::Codec("incomplete line".to_string()))?;
        lines.push(Line::from_views(index, views));
    }

    if reader.pos != bytes.len() {
        return Err(Error::Codec(format!(
            "{} trailing bytes after index",
            bytes.len() - reader.pos
        )));
    }

    DocumentIndex::new(dimension, embedder, titles, lines)
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                Error::Codec(format!("record truncated at byte {}", self.pos))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::Codec(format!("invalid UTF-8 in record: {e}")))
    }
}
