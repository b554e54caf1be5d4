// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::{
        Fail,
        FailKind,
    },
    types::Real,
};
use ::std::ops::{
    Index,
    IndexMut,
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Pivots smaller than this (relative to the largest entry) make a matrix singular.
const SINGULAR_PIVOT: Real = 1e-12;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Row-major dense matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Real>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl DenseMatrix {
    /// Creates a matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Creates an identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m: DenseMatrix = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Returns the row-major storage.
    pub fn as_slice(&self) -> &[Real] {
        &self.data
    }

    /// Returns one row.
    pub fn row(&self, r: usize) -> &[Real] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Returns `I + scale * self`.
    pub fn identity_plus(&self, scale: Real) -> Result<Self, Fail> {
        self.ensure_square("identity_plus")?;
        let mut m: DenseMatrix = self.clone();
        m.data.iter_mut().for_each(|x| *x *= scale);
        for i in 0..self.rows {
            m[(i, i)] += 1.0;
        }
        Ok(m)
    }

    /// Matrix product `self * other`.
    pub fn mul(&self, other: &DenseMatrix) -> Result<Self, Fail> {
        if self.cols != other.rows {
            let cause: String = format!(
                "cannot multiply {}x{} by {}x{} matrix",
                self.rows, self.cols, other.rows, other.cols
            );
            error!("mul(): {}", cause);
            return Err(Fail::new(FailKind::NumericalError, &cause));
        }
        let mut out: DenseMatrix = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            let out_row: &mut [Real] = &mut out.data[i * other.cols..(i + 1) * other.cols];
            for k in 0..self.cols {
                let a: Real = self.data[i * self.cols + k];
                // Operators of large meshes are mostly zeros.
                if a == 0.0 {
                    continue;
                }
                let other_row: &[Real] = &other.data[k * other.cols..(k + 1) * other.cols];
                for (o, b) in out_row.iter_mut().zip(other_row.iter()) {
                    *o += a * b;
                }
            }
        }
        Ok(out)
    }

    /// Matrix-vector product `self * v`.
    pub fn mul_vec(&self, v: &[Real]) -> Result<Vec<Real>, Fail> {
        if self.cols != v.len() {
            let cause: String = format!("cannot multiply {}x{} matrix by vector of {}", self.rows, self.cols, v.len());
            error!("mul_vec(): {}", cause);
            return Err(Fail::new(FailKind::NumericalError, &cause));
        }
        Ok((0..self.rows)
            .map(|r| self.row(r).iter().zip(v.iter()).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Raises a square matrix to a non-negative integer power by repeated squaring.
    pub fn pow(&self, exponent: usize) -> Result<Self, Fail> {
        self.ensure_square("pow")?;
        let mut result: DenseMatrix = Self::identity(self.rows);
        let mut base: DenseMatrix = self.clone();
        let mut e: usize = exponent;
        while e > 0 {
            if e & 1 == 1 {
                result = result.mul(&base)?;
            }
            e >>= 1;
            if e > 0 {
                base = base.mul(&base)?;
            }
        }
        Ok(result)
    }

    /// Inverts a square matrix with Gauss-Jordan elimination and partial pivoting.
    pub fn inverse(&self) -> Result<Self, Fail> {
        self.ensure_square("inverse")?;
        let n: usize = self.rows;
        let scale: Real = self.data.iter().fold(0.0, |acc: Real, x| acc.max(x.abs())).max(1.0);
        let mut a: DenseMatrix = self.clone();
        let mut inv: DenseMatrix = Self::identity(n);

        for col in 0..n {
            let mut pivot_row: usize = col;
            for r in col + 1..n {
                if a[(r, col)].abs() > a[(pivot_row, col)].abs() {
                    pivot_row = r;
                }
            }
            let pivot: Real = a[(pivot_row, col)];
            if pivot.abs() < SINGULAR_PIVOT * scale {
                let cause: String = format!("singular matrix (pivot {:e} in column {})", pivot, col);
                error!("inverse(): {}", cause);
                return Err(Fail::new(FailKind::NumericalError, &cause));
            }
            if pivot_row != col {
                a.swap_rows(pivot_row, col);
                inv.swap_rows(pivot_row, col);
            }
            let inv_pivot: Real = 1.0 / pivot;
            for c in 0..n {
                a[(col, c)] *= inv_pivot;
                inv[(col, c)] *= inv_pivot;
            }
            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor: Real = a[(r, col)];
                if factor == 0.0 {
                    continue;
                }
                for c in 0..n {
                    let a_rc: Real = a[(col, c)];
                    let inv_rc: Real = inv[(col, c)];
                    a[(r, c)] -= factor * a_rc;
                    inv[(r, c)] -= factor * inv_rc;
                }
            }
        }
        Ok(inv)
    }

    /// Checks whether every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Smallest entry, or zero for an empty matrix.
    pub fn min_entry(&self) -> Real {
        match self.data.iter().cloned().reduce(Real::min) {
            Some(min) => min,
            None => 0.0,
        }
    }

    /// Largest absolute diagonal entry.
    pub fn max_abs_diagonal(&self) -> Real {
        (0..self.rows.min(self.cols)).fold(0.0, |acc: Real, i| acc.max(self[(i, i)].abs()))
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        for c in 0..self.cols {
            self.data.swap(a * self.cols + c, b * self.cols + c);
        }
    }

    fn ensure_square(&self, op: &str) -> Result<(), Fail> {
        if !self.is_square() {
            let cause: String = format!("{} needs a square matrix, got {}x{}", op, self.rows, self.cols);
            error!("ensure_square(): {}", cause);
            return Err(Fail::new(FailKind::NumericalError, &cause));
        }
        Ok(())
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Index<(usize, usize)> for DenseMatrix {
    type Output = Real;

    fn index(&self, (r, c): (usize, usize)) -> &Real {
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut Real {
        &mut self.data[r * self.cols + c]
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
