// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    collections::dense::DenseMatrix,
    runtime::{
        fail::{
            Fail,
            FailKind,
        },
        types::Real,
    },
};
use ::std::collections::BTreeMap;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Sparse matrix in coordinate form. Entries are kept ordered by `(row, column)` so that iteration, and therefore
/// every operator derived from it, is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    entries: BTreeMap<(usize, usize), Real>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SparseMatrix {
    /// Creates an empty matrix with the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            entries: BTreeMap::new(),
        }
    }

    /// Builds a matrix from `(row, column, value)` triplets. Repeated coordinates are summed.
    pub fn from_triplets<I>(rows: usize, cols: usize, triplets: I) -> Result<Self, Fail>
    where
        I: IntoIterator<Item = (usize, usize, Real)>,
    {
        let mut m: SparseMatrix = Self::new(rows, cols);
        for (r, c, v) in triplets {
            m.add(r, c, v)?;
        }
        Ok(m)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, r: usize, c: usize) -> Real {
        self.entries.get(&(r, c)).cloned().unwrap_or(0.0)
    }

    /// Overwrites one entry. Storing zero removes the entry.
    pub fn set(&mut self, r: usize, c: usize, value: Real) -> Result<(), Fail> {
        self.check_bounds(r, c)?;
        if value == 0.0 {
            self.entries.remove(&(r, c));
        } else {
            self.entries.insert((r, c), value);
        }
        Ok(())
    }

    /// Adds to one entry.
    pub fn add(&mut self, r: usize, c: usize, value: Real) -> Result<(), Fail> {
        let current: Real = self.get(r, c);
        self.set(r, c, current + value)
    }

    /// Iterates over stored entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Real)> + '_ {
        self.entries.iter().map(|(&(r, c), &v)| (r, c, v))
    }

    /// Copies `block` into this matrix with its top-left corner at `(row_offset, col_offset)`.
    pub fn embed(&mut self, block: &SparseMatrix, row_offset: usize, col_offset: usize) -> Result<(), Fail> {
        if row_offset + block.rows > self.rows || col_offset + block.cols > self.cols {
            let cause: String = format!(
                "block {}x{} at ({}, {}) does not fit in {}x{} matrix",
                block.rows, block.cols, row_offset, col_offset, self.rows, self.cols
            );
            error!("embed(): {}", cause);
            return Err(Fail::new(FailKind::InvalidConfig, &cause));
        }
        for (r, c, v) in block.iter() {
            self.add(row_offset + r, col_offset + c, v)?;
        }
        Ok(())
    }

    /// Difference `self - other` of two matrices with the same shape.
    pub fn sub(&self, other: &SparseMatrix) -> Result<Self, Fail> {
        if self.rows != other.rows || self.cols != other.cols {
            let cause: String = format!(
                "cannot subtract {}x{} from {}x{} matrix",
                other.rows, other.cols, self.rows, self.cols
            );
            error!("sub(): {}", cause);
            return Err(Fail::new(FailKind::NumericalError, &cause));
        }
        let mut out: SparseMatrix = self.clone();
        for (r, c, v) in other.iter() {
            out.add(r, c, -v)?;
        }
        Ok(out)
    }

    /// Returns, for every column, the list of `(row, value)` entries.
    pub fn columns(&self) -> Vec<Vec<(usize, Real)>> {
        let mut columns: Vec<Vec<(usize, Real)>> = vec![Vec::new(); self.cols];
        for (r, c, v) in self.iter() {
            columns[c].push((r, v));
        }
        columns
    }

    /// Returns, for every row, the list of `(column, value)` entries.
    pub fn row_lists(&self) -> Vec<Vec<(usize, Real)>> {
        let mut rows: Vec<Vec<(usize, Real)>> = vec![Vec::new(); self.rows];
        for (r, c, v) in self.iter() {
            rows[r].push((c, v));
        }
        rows
    }

    /// Matrix-vector product `self * v`.
    pub fn mul_vec(&self, v: &[Real]) -> Result<Vec<Real>, Fail> {
        if self.cols != v.len() {
            let cause: String = format!(
                "cannot multiply {}x{} matrix by vector of {}",
                self.rows,
                self.cols,
                v.len()
            );
            error!("mul_vec(): {}", cause);
            return Err(Fail::new(FailKind::NumericalError, &cause));
        }
        let mut out: Vec<Real> = vec![0.0; self.rows];
        for (r, c, value) in self.iter() {
            out[r] += value * v[c];
        }
        Ok(out)
    }

    pub fn to_dense(&self) -> DenseMatrix {
        let mut m: DenseMatrix = DenseMatrix::zeros(self.rows, self.cols);
        for (r, c, v) in self.iter() {
            m[(r, c)] = v;
        }
        m
    }

    fn check_bounds(&self, r: usize, c: usize) -> Result<(), Fail> {
        if r >= self.rows || c >= self.cols {
            let cause: String = format!("entry ({}, {}) outside {}x{} matrix", r, c, self.rows, self.cols);
            error!("check_bounds(): {}", cause);
            return Err(Fail::new(FailKind::InvalidConfig, &cause));
        }
        Ok(())
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
