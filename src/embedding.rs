use candle_core::{Device, Tensor};
use kdam::{BarExt, tqdm};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Default width of [`HashingEmbedder`] vectors.
pub const DEFAULT_HASHING_DIMENSION: usize = 512;

/// Default number of texts sent to an embedder per call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// A non-empty group of embedding vectors sharing one dimension.
///
/// Stored row-major: `data[row * dimension + column]`. Serializes as a list
/// of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f32>>", into = "Vec<Vec<f32>>")]
pub struct ViewMatrix {
    rows: usize,
    dimension: usize,
    data: Vec<f32>,
}

impl ViewMatrix {
    /// Build a matrix from flat row-major data.
    pub fn new(rows: usize, dimension: usize, data: Vec<f32>) -> Result<Self> {
        if rows == 0 || dimension == 0 {
            return Err(Error::Codec(format!(
                "view matrix must be non-empty, got {rows}x{dimension}"
            )));
        }
        if data.len() != rows * dimension {
            return Err(Error::Codec(format!(
                "view matrix {rows}x{dimension} cannot hold {} values",
                data.len()
            )));
        }
        Ok(Self {
            rows,
            dimension,
            data,
        })
    }

    /// The placeholder for an empty view: one zero vector.
    pub fn zeros(dimension: usize) -> Self {
        Self {
            rows: 1,
            dimension,
            data: vec![0.0; dimension],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// True when every value is zero (the empty-view placeholder).
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|v| *v == 0.0)
    }

    /// Copy `count` rows starting at `start` into a new matrix.
    fn slice_rows(&self, start: usize, count: usize) -> Self {
        let from = start * self.dimension;
        let to = from + count * self.dimension;
        Self {
            rows: count,
            dimension: self.dimension,
            data: self.data[from..to].to_vec(),
        }
    }

    /// Load into a `[rows, dimension]` CPU tensor.
    pub fn to_tensor(&self) -> Result<Tensor> {
        Ok(Tensor::from_slice(
            &self.data,
            (self.rows, self.dimension),
            &Device::Cpu,
        )?)
    }
}

impl TryFrom<Vec<Vec<f32>>> for ViewMatrix {
    type Error = Error;

    fn try_from(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != dimension) {
            return Err(Error::Codec(format!(
                "ragged view matrix: row of width {} in a matrix of width {dimension}",
                bad.len()
            )));
        }
        let count = rows.len();
        Self::new(count, dimension, rows.into_iter().flatten().collect())
    }
}

impl From<ViewMatrix> for Vec<Vec<f32>> {
    fn from(matrix: ViewMatrix) -> Self {
        matrix
            .data
            .chunks(matrix.dimension)
            .map(<[f32]>::to_vec)
            .collect()
    }
}

/// Maps text to fixed-width vectors.
pub trait Embedder: Send {
    /// Width of every produced vector.
    fn dimension(&self) -> usize;

    /// Identifies the model and settings; indices and queries must agree on it.
    fn fingerprint(&self) -> String;

    /// Embed a non-empty batch, one row per text, in input order.
    fn embed(&mut self, texts: &[String]) -> Result<ViewMatrix>;
}

/// Embed one view group, validating the provider's answer.
///
/// An empty group is not sent to the provider; it becomes a single zero
/// vector.
pub fn embed_view(
    embedder: &mut dyn Embedder,
    texts: &[String],
) -> Result<ViewMatrix> {
    let dimension = embedder.dimension();
    if texts.is_empty() {
        return Ok(ViewMatrix::zeros(dimension));
    }

    let matrix = embedder.embed(texts)?;
    if matrix.rows() != texts.len() || matrix.dimension() != dimension {
        return Err(Error::ShapeMismatch {
            source_name: "embedder",
            expected: format!("{}x{dimension}", texts.len()),
            actual: format!("{}x{}", matrix.rows(), matrix.dimension()),
        });
    }
    Ok(matrix)
}

/// Embed many view groups with as few provider calls as possible.
///
/// All texts are flattened and sent in batches of `batch_size`, then the
/// rows are cut back into one matrix per group. Empty groups get the zero
/// placeholder.
pub fn embed_groups(
    embedder: &mut dyn Embedder,
    groups: &[Vec<String>],
    batch_size: usize,
    label: &str,
    show_progress: bool,
) -> Result<Vec<ViewMatrix>> {
    let dimension = embedder.dimension();
    let texts: Vec<String> = groups.iter().flatten().cloned().collect();
    let batch_size = batch_size.max(1);

    let mut pb = tqdm!(
        total = texts.len(),
        desc = label.to_string(),
        disable = !show_progress
    );

    let mut data = Vec::with_capacity(texts.len() * dimension);
    for batch in texts.chunks(batch_size) {
        let matrix = embed_view(embedder, batch)?;
        data.extend_from_slice(matrix.data());
        pb.update(batch.len())?;
    }

    let all = ViewMatrix {
        rows: texts.len(),
        dimension,
        data,
    };

    let mut offset = 0;
    let matrices = groups
        .iter()
        .map(|group| {
            if group.is_empty() {
                ViewMatrix::zeros(dimension)
            } else {
                let m = all.slice_rows(offset, group.len());
                offset += group.len();
                m
            }
        })
        .collect();

    tracing::debug!(view = label, texts = texts.len(), "embedded view");
    Ok(matrices)
}

/// Bumped whenever the word hashing changes, so old indices are rejected.
const HASHING_VERSION: u32 = 1;

/// First eight bytes of the word's SHA-256, big-endian.
fn word_hash(word: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(word.as_bytes());
    hasher.finalize()[..8]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Model-free embedder: signed feature hashing of lower-cased words,
/// L2-normalised.
///
/// Only lexical overlap is captured, but it is deterministic, fast and needs
/// no download, which makes it useful offline and in tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str, out: &mut [f32]) {
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word_hash(&word.to_lowercase());

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            out[bucket] += sign;
        }

        let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            out.iter_mut().for_each(|v| *v /= norm);
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn fingerprint(&self) -> String {
        format!("hashing-v{HASHING_VERSION}:{}", self.dimension)
    }

    fn embed(&mut self, texts: &[String]) -> Result<ViewMatrix> {
        let mut data = vec![0.0; texts.len() * self.dimension];
        for (text, out) in texts.iter().zip(data.chunks_mut(self.dimension)) {
            self.embed_one(text, out);
        }
        ViewMatrix::new(texts.len(), self.dimension, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers every request with a single row, whatever was asked.
    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn fingerprint(&self) -> String {
            "short".to_string()
        }

        fn embed(&mut self, _texts: &[String]) -> Result<ViewMatrix> {
            ViewMatrix::new(1, 2, vec![1.0, 0.0])
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_group_becomes_zero_vector() {
        let mut embedder = HashingEmbedder::new(8);
        let m = embed_view(&mut embedder, &[]).unwrap();
        assert_eq!(m.rows(), 1);
        assert_eq!(m.dimension(), 8);
        assert!(m.is_zero());
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let mut embedder = ShortEmbedder;
        let err = embed_view(&mut embedder, &strings(&["a", "b"])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn groups_are_cut_back_in_order() {
        let mut embedder = HashingEmbedder::new(16);
        let groups = vec![
            strings(&["alpha", "beta"]),
            vec![],
            strings(&["gamma"]),
        ];
        let out = embed_groups(&mut embedder, &groups, 2, "test", false).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].rows(), 2);
        assert!(out[1].is_zero());
        assert_eq!(out[2].rows(), 1);

        let direct = embedder.embed(&strings(&["gamma"])).unwrap();
        assert_eq!(out[2], direct);
    }

    #[test]
    fn hashing_is_deterministic_and_normalised() {
        let mut embedder = HashingEmbedder::new(32);
        let a = embedder.embed(&strings(&["The cat sat"])).unwrap();
        let b = embedder.embed(&strings(&["the CAT sat"])).unwrap();
        assert_eq!(a, b);

        let norm: f32 = a.row(0).iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hashing_text_without_words_is_zero() {
        let mut embedder = HashingEmbedder::new(4);
        let m = embedder.embed(&strings(&["..."])).unwrap();
        assert!(m.is_zero());
    }

    #[test]
    fn hashing_buckets_are_fixed() {
        let mut embedder = HashingEmbedder::new(16);
        let m = embedder.embed(&strings(&["Rent, tenant"])).unwrap();

        let half = std::f32::consts::FRAC_1_SQRT_2;
        let mut expected = vec![0.0f32; 16];
        expected[12] = half;
        expected[6] = -half;
        for (got, want) in m.row(0).iter().zip(&expected) {
            assert!((got - want).abs() < 1e-6, "{:?}", m.row(0));
        }
        assert_eq!(embedder.fingerprint(), "hashing-v1:16");
    }

    #[test]
    fn view_matrix_rejects_bad_shapes() {
        assert!(ViewMatrix::new(0, 3, vec![]).is_err());
        assert!(ViewMatrix::new(2, 3, vec![0.0; 5]).is_err());
        assert!(ViewMatrix::try_from(vec![vec![1.0, 2.0], vec![3.0]]).is_err());
        assert!(ViewMatrix::try_from(Vec::<Vec<f32>>::new()).is_err());
    }

    #[test]
    fn view_matrix_json_is_a_list_of_rows() {
        let m = ViewMatrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[1.0,2.0],[3.0,4.0]]");
        let back: ViewMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn tensor_has_matrix_shape() {
        let m = ViewMatrix::new(2, 3, vec![0.0; 6]).unwrap();
        assert_eq!(m.to_tensor().unwrap().dims2().unwrap(), (2, 3));
    }
}
