//! Flat, append-only vector arena with exact cosine search.
//!
//! Vectors live back to back in one `Vec<f32>`; a vector's internal id is its
//! slot number. Every stored vector is L2-normalized on the way in, so cosine
//! similarity is a plain dot product at query time.

use crate::error::IndexError;

/// Dense identifier of a vector slot (and of the record paired with it).
pub type InternalId = u64;

const MAGIC: &[u8; 4] = b"SCVI";
const HEADER_LEN: usize = 4 + 8 + 8;

/// One search result: slot id and normalized inner product with the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: InternalId,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index for vectors of length `dimension`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::ZeroDimension`] when `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Normalize `vector` and append it, returning its new id.
    ///
    /// Ids are handed out 0, 1, 2, ... in insertion order.
    ///
    /// # Errors
    ///
    /// [`IndexError::DimensionMismatch`] if the length is not the index
    /// dimension, [`IndexError::NonFinite`] if any component is NaN or
    /// infinite. Nothing is stored on error.
    pub fn add(&mut self, mut vector: Vec<f32>) -> Result<InternalId, IndexError> {
        self.check_dimension(vector.len())?;
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFinite);
        }
        l2_normalize(&mut vector);
        let id = self.len() as InternalId;
        self.data.extend_from_slice(&vector);
        Ok(id)
    }

    /// Exact top-`k` search by cosine similarity.
    ///
    /// Results are ordered by descending score; equal scores keep the lower
    /// id first. An empty index yields an empty list regardless of the query.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if the query length differs
    /// from the index dimension (on a non-empty index).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len())?;

        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(slot, stored)| SearchHit {
                id: slot as InternalId,
                score: dot(&q, stored),
            })
            .collect();

        let by_rank = |a: &SearchHit, b: &SearchHit| {
            b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
        };
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_rank);
            hits.truncate(k);
        }
        hits.sort_unstable_by(by_rank);
        Ok(hits)
    }

    /// Copy out the stored (normalized) vector for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnknownId`] if `id` is past the end.
    pub fn reconstruct(&self, id: InternalId) -> Result<Vec<f32>, IndexError> {
        self.slot(id).map(<[f32]>::to_vec)
    }

    /// Build a fresh index holding only `retained`, in the given order.
    ///
    /// The vector at `retained[i]` becomes id `i` in the new index. Stored
    /// values are copied bit for bit.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnknownId`] if any retained id is not present.
    pub fn compact(&self, retained: &[InternalId]) -> Result<VectorIndex, IndexError> {
        let mut data = Vec::with_capacity(retained.len() * self.dimension);
        for &id in retained {
            data.extend_from_slice(self.slot(id)?);
        }
        Ok(VectorIndex {
            dimension: self.dimension,
            data,
        })
    }

    /// Encode as `SCVI | dim: u64 | count: u64 | count*dim f32`, little-endian.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(self.dimension as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Decode bytes produced by [`VectorIndex::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Corrupt`] on a bad magic, a truncated or
    /// oversized payload, or a zero dimension.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(IndexError::Corrupt(
                "vector blob has no SCVI header".to_string(),
            ));
        }
        let dimension = read_u64(&bytes[4..12])?;
        let count = read_u64(&bytes[12..20])?;
        if dimension == 0 {
            return Err(IndexError::Corrupt("vector blob has zero dimension".to_string()));
        }

        let expected = dimension
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| IndexError::Corrupt("vector blob size overflows".to_string()))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            return Err(IndexError::Corrupt(format!(
                "vector blob holds {} payload bytes, header implies {expected}",
                payload.len()
            )));
        }

        let data = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { dimension, data })
    }

    fn check_dimension(&self, actual: usize) -> Result<(), IndexError> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual,
            })
        }
    }

    fn slot(&self, id: InternalId) -> Result<&[f32], IndexError> {
        let slot = usize::try_from(id).map_err(|_| IndexError::UnknownId(id))?;
        if slot >= self.len() {
            return Err(IndexError::UnknownId(id));
        }
        let start = slot * self.dimension;
        Ok(&self.data[start..start + self.dimension])
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left as-is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn read_u64(bytes: &[u8]) -> Result<usize, IndexError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| IndexError::Corrupt("short header field".to_string()))?;
    usize::try_from(u64::from_le_bytes(raw))
        .map_err(|_| IndexError::Corrupt("header field exceeds platform size".to_string()))
}
