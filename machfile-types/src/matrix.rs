/// Dense row-major n-dimensional array of floats (connection matrices, B(H) curves).
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Matrix {
    /// `None` when `data` does not hold exactly `shape.iter().product()` elements,
    /// or when a zero-length dimension is followed by others: nested arrays
    /// cannot carry the shape below an empty level.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Option<Self> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != data.len() {
            return None;
        }
        if shape.iter().rev().skip(1).any(|&dim| dim == 0) {
            return None;
        }
        Some(Self { shape, data })
    }

    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Builds a 2-D matrix. `None` for ragged rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != ncols) {
            return None;
        }
        let nrows = rows.len();
        let data = rows.into_iter().flatten().collect();
        Self::new(vec![nrows, ncols], data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (i, (&idx, &dim)) in index.iter().zip(&self.shape).enumerate() {
            if idx >= dim {
                return None;
            }
            let stride: usize = self.shape[i + 1..].iter().product();
            flat += idx * stride;
        }
        self.data.get(flat).copied()
    }

    /// Multi-index of a flat (row-major) position.
    pub fn unravel(&self, mut flat: usize) -> Vec<usize> {
        let mut index = vec![0; self.shape.len()];
        for (slot, dim) in index.iter_mut().zip(&self.shape).rev() {
            if *dim == 0 {
                continue;
            }
            *slot = flat % dim;
            flat /= dim;
        }
        index
    }

    /// Same matrix with every element sign-flipped.
    pub fn negated(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|v| -v).collect(),
        }
    }
}
