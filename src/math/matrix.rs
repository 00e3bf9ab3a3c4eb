use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Mul, MulAssign};

use crate::error::{NetError, Result};

/// Dense `rows x cols` matrix of `f64` stored flat in row-major order.
///
/// The dimensions are fixed once the matrix is built and `data.len()` is
/// always `rows * cols`; the buffer is private so that invariant cannot be
/// broken from outside. Deserialization goes through `from_vec`, so a
/// payload whose `data` does not hold `rows * cols` values is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix", into = "RawMatrix")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

// Serialized form of `Matrix`.
#[derive(Serialize, Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = NetError;

    fn try_from(raw: RawMatrix) -> Result<Matrix> {
        Matrix::from_vec(raw.rows, raw.cols, raw.data)
    }
}

impl From<Matrix> for RawMatrix {
    fn from(m: Matrix) -> RawMatrix {
        RawMatrix { rows: m.rows, cols: m.cols, data: m.data }
    }
}

fn check_dims(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(NetError::config(format!(
            "matrix dimensions must be positive, got {rows}x{cols}"
        )));
    }
    Ok(())
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Result<Matrix> {
        check_dims(rows, cols)?;
        Ok(Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        })
    }

    /// Copies a flat row-major buffer of length `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Matrix> {
        check_dims(rows, cols)?;
        if data.len() != rows * cols {
            return Err(NetError::DimensionMismatch {
                op: "from_vec",
                left: (rows, cols),
                right: (data.len(), 1),
            });
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Builds a matrix from nested rows. Every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Matrix> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        check_dims(n_rows, n_cols)?;

        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(NetError::DimensionMismatch {
                    op: "from_rows",
                    left: (1, n_cols),
                    right: (1, row.len()),
                });
            }
            data.extend(row);
        }
        Ok(Matrix { rows: n_rows, cols: n_cols, data })
    }

    /// Column vector (`values.len() x 1`).
    pub fn column(values: &[f64]) -> Result<Matrix> {
        Matrix::from_vec(values.len(), 1, values.to_vec())
    }

    /// Uniform samples on [0, 1).
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Result<Matrix> {
        let mut res = Matrix::zeros(rows, cols)?;
        for x in res.data.iter_mut() {
            *x = rng.gen::<f64>();
        }
        Ok(res)
    }

    /// He-uniform initialization: samples from U(-limit, limit) with
    /// `limit = sqrt(6 / cols)`.
    ///
    /// `cols` is the fan-in. The variance `2 / fan_in` compensates for ReLU
    /// zeroing roughly half of its inputs, which keeps activation magnitudes
    /// stable through deep stacks.
    pub fn he_uniform<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Result<Matrix> {
        let limit = (6.0 / cols as f64).sqrt();
        let mut res = Matrix::zeros(rows, cols)?;
        for x in res.data.iter_mut() {
            *x = rng.gen_range(-limit..limit);
        }
        Ok(res)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; zero-sized matrices cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.data[row * self.cols + col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(NetError::IndexOutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    fn same_shape(&self, other: &Matrix, op: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(NetError::DimensionMismatch {
                op,
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // In-place operations (write into `self`)
    // ---------------------------------------------------------------------

    /// Fills every entry with `value`.
    pub fn reset_with_val(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Overwrites `self` with the contents of a same-shape matrix.
    pub fn copy_from(&mut self, other: &Matrix) -> Result<()> {
        self.same_shape(other, "copy_from")?;
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    pub fn add_assign(&mut self, other: &Matrix) -> Result<()> {
        self.same_shape(other, "add_assign")?;
        for (x, y) in self.data.iter_mut().zip(other.data.iter()) {
            *x += y;
        }
        Ok(())
    }

    pub fn sub_assign(&mut self, other: &Matrix) -> Result<()> {
        self.same_shape(other, "sub_assign")?;
        for (x, y) in self.data.iter_mut().zip(other.data.iter()) {
            *x -= y;
        }
        Ok(())
    }

    /// `self += alpha * other`.
    pub fn scaled_add(&mut self, alpha: f64, other: &Matrix) -> Result<()> {
        self.same_shape(other, "scaled_add")?;
        for (x, y) in self.data.iter_mut().zip(other.data.iter()) {
            *x += alpha * y;
        }
        Ok(())
    }

    pub fn scale(&mut self, scalar: f64) {
        self.data.iter_mut().for_each(|x| *x *= scalar);
    }

    pub fn add_scalar(&mut self, scalar: f64) {
        self.data.iter_mut().for_each(|x| *x += scalar);
    }

    pub fn sub_scalar(&mut self, scalar: f64) {
        self.data.iter_mut().for_each(|x| *x -= scalar);
    }

    pub fn div_scalar(&mut self, scalar: f64) -> Result<()> {
        if scalar == 0.0 {
            return Err(NetError::DivisionByZero("div_scalar"));
        }
        self.data.iter_mut().for_each(|x| *x /= scalar);
        Ok(())
    }

    pub fn map_inplace<F>(&mut self, functor: F)
    where
        F: Fn(f64) -> f64,
    {
        self.data.iter_mut().for_each(|x| *x = functor(*x));
    }

    /// `self = a * b`. Requires `a.cols == b.rows` and `self` to already be
    /// `a.rows x b.cols`.
    pub fn matmul_into(&mut self, a: &Matrix, b: &Matrix) -> Result<()> {
        if a.cols != b.rows {
            return Err(NetError::DimensionMismatch {
                op: "matmul",
                left: a.shape(),
                right: b.shape(),
            });
        }
        if self.rows != a.rows || self.cols != b.cols {
            return Err(NetError::DimensionMismatch {
                op: "matmul_into (result)",
                left: self.shape(),
                right: (a.rows, b.cols),
            });
        }

        for i in 0..a.rows {
            for j in 0..b.cols {
                let mut sum = 0.0;
                for k in 0..a.cols {
                    sum += a.data[i * a.cols + k] * b.data[k * b.cols + j];
                }
                self.data[i * self.cols + j] = sum;
            }
        }
        Ok(())
    }

    /// Hadamard product `self = a ⊙ b`; all three shapes must agree.
    pub fn hadamard_into(&mut self, a: &Matrix, b: &Matrix) -> Result<()> {
        a.same_shape(b, "hadamard")?;
        self.same_shape(a, "hadamard_into (result)")?;
        for ((out, x), y) in self.data.iter_mut().zip(a.data.iter()).zip(b.data.iter()) {
            *out = x * y;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Allocating operations
    // ---------------------------------------------------------------------

    pub fn matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(NetError::DimensionMismatch {
                op: "matmul",
                left: self.shape(),
                right: rhs.shape(),
            });
        }
        let mut res = Matrix::zeros(self.rows, rhs.cols)?;
        res.matmul_into(self, rhs)?;
        Ok(res)
    }

    pub fn hadamard(&self, rhs: &Matrix) -> Result<Matrix> {
        let mut res = self.clone();
        res.hadamard_into(self, rhs)?;
        Ok(res)
    }

    pub fn add(&self, rhs: &Matrix) -> Result<Matrix> {
        let mut res = self.clone();
        res.add_assign(rhs)?;
        Ok(res)
    }

    pub fn sub(&self, rhs: &Matrix) -> Result<Matrix> {
        let mut res = self.clone();
        res.sub_assign(rhs)?;
        Ok(res)
    }

    pub fn scaled(&self, scalar: f64) -> Matrix {
        let mut res = self.clone();
        res.scale(scalar);
        res
    }

    pub fn transpose(&self) -> Matrix {
        let mut data = vec![0.0; self.data.len()];
        for i in 0..self.rows {
            for j in 0..self.cols {
                data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        Matrix {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Reductions
    // ---------------------------------------------------------------------

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn sum_of_squares(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum()
    }

    pub fn frobenius_norm(&self) -> f64 {
        self.sum_of_squares().sqrt()
    }

    /// Flat index of the largest entry (first one on ties).
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &x) in self.data.iter().enumerate() {
            if x > self.data[best] {
                best = i;
            }
        }
        best
    }
}

impl MulAssign<f64> for Matrix {
    fn mul_assign(&mut self, rhs: f64) {
        self.scale(rhs);
    }
}

impl Mul<f64> for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: f64) -> Matrix {
        self.scaled(rhs)
    }
}
