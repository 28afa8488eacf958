//! Constant-velocity Kalman filter over `[cx, cy, s, r]` box measurements,
//! using ndarray for the algebra and nalgebra for the 4x4 inverse.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// State layout: `[cx, cy, s, r, vcx, vcy, vs]`. The aspect ratio has no
/// velocity term.
pub const STATE_DIM: usize = 7;
pub const MEASUREMENT_DIM: usize = 4;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    process_noise: Array2<f64>,
    measurement_noise: Array2<f64>,
    initial_covariance: Array2<f64>,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion_mat = Array2::eye(STATE_DIM);
        for i in 0..3 {
            motion_mat[[i, MEASUREMENT_DIM + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((MEASUREMENT_DIM, STATE_DIM));
        for i in 0..MEASUREMENT_DIM {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            process_noise: diagonal(&[1.0, 1.0, 1.0, 1.0, 0.01, 0.01, 1e-4]),
            measurement_noise: diagonal(&[1.0, 1.0, 10.0, 10.0]),
            // Velocities are unobserved at creation, hence the large variance.
            initial_covariance: diagonal(&[10.0, 10.0, 10.0, 10.0, 1e4, 1e4, 1e4]),
        }
    }

    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(STATE_DIM);
        for i in 0..MEASUREMENT_DIM {
            mean[i] = measurement[i];
        }
        (mean, self.initial_covariance.clone())
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mut mean = mean.clone();
        if mean[6] + mean[2] <= 0.0 {
            mean[6] = 0.0;
        }

        let new_mean = self.motion_mat.dot(&mean);
        let new_covariance =
            self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + &self.process_noise;

        (new_mean, new_covariance)
    }

    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + &self.measurement_noise;

        (mean_proj, covariance_proj)
    }

    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let innovation = Array1::from_vec(measurement.to_vec()) - projected_mean;

        // K = P * H^T * S^-1
        let s_inv = invert_4x4(&projected_cov)?;
        let pht = covariance.dot(&self.update_mat.t()); // 7x4
        let kalman_gain = pht.dot(&s_inv); // 7x4

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Ok((new_mean, new_covariance))
    }
}

fn diagonal(values: &[f64]) -> Array2<f64> {
    Array2::from_diag(&Array1::from_vec(values.to_vec()))
}

/// Invert a 4x4 matrix through nalgebra (pure Rust, no LAPACK). A
/// non-finite inverse counts as singular.
fn invert_4x4(m: &Array2<f64>) -> Result<Array2<f64>> {
    let nm = nalgebra::Matrix4::from_fn(|i, j| m[[i, j]]);
    let inv = nm
        .try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
        .ok_or(Error::Singular)?;
    Ok(Array2::from_shape_fn((4, 4), |(i, j)| inv[(i, j)]))
}
