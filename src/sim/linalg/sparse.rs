use crate::sim::linalg::LinalgError;

/// Square sparse matrix in coordinate form.
///
/// Entries may be pushed in any order. Duplicates are summed on conversion
/// to CSR.
#[derive(Debug, Clone, Default)]
pub struct TripletMatrix {
    n: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl TripletMatrix {
    pub fn new(n: usize) -> Self {
        Self::with_capacity(n, 0)
    }

    pub fn with_capacity(n: usize, nnz: usize) -> Self {
        Self {
            n,
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
            values: Vec::with_capacity(nnz),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    /// Multiplies every stored value by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for v in self.values.iter_mut() {
            *v *= factor;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.values)
            .map(|((&r, &c), &v)| (r, c, v))
    }
}

impl Extend<(usize, usize, f64)> for TripletMatrix {
    fn extend<I: IntoIterator<Item = (usize, usize, f64)>>(&mut self, iter: I) {
        for (r, c, v) in iter {
            self.push(r, c, v);
        }
    }
}

/// Compressed sparse row matrix with column indices sorted within each row.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    pub fn from_triplets(t: &TripletMatrix) -> Result<Self, LinalgError> {
        let n = t.n;
        for (row, col, _) in t.iter() {
            if row >= n || col >= n {
                return Err(LinalgError::IndexOutOfRange { row, col, n });
            }
        }

        // Bucket by row, then sort each row by column and merge duplicates
        let mut counts = vec![0usize; n + 1];
        for &r in &t.rows {
            counts[r + 1] += 1;
        }
        for i in 0..n {
            counts[i + 1] += counts[i];
        }
        let mut next = counts.clone();
        let mut entries = vec![(0usize, 0.0f64); t.nnz()];
        for (row, col, value) in t.iter() {
            entries[next[row]] = (col, value);
            next[row] += 1;
        }

        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(t.nnz());
        let mut values = Vec::with_capacity(t.nnz());
        row_ptr.push(0);
        for i in 0..n {
            let row = &mut entries[counts[i]..counts[i + 1]];
            row.sort_by_key(|&(c, _)| c);
            let start = col_idx.len();
            for &(c, v) in row.iter() {
                if col_idx.len() > start && col_idx.last() == Some(&c) {
                    if let Some(last) = values.last_mut() {
                        *last += v;
                    }
                } else {
                    col_idx.push(c);
                    values.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }

        Ok(Self {
            n,
            row_ptr,
            col_idx,
            values,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `(row, col)`, 0 if not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        match self.col_idx[range.clone()].binary_search(&col) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.,
        }
    }

    /// Computes `y = A * x`.
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        for (i, yi) in y.iter_mut().enumerate().take(self.n) {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            *yi = sum;
        }
    }

    /// Largest absolute value stored in row `i`.
    pub fn row_max_abs(&self, i: usize) -> f64 {
        self.values[self.row_ptr[i]..self.row_ptr[i + 1]]
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }
}
