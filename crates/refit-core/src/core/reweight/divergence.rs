use nalgebra::DVector;

/// Kullback-Leibler divergence of a tilted ensemble from its reference.
///
/// For posterior weights `P` obtained by tilting the reference with
/// `exp(-correction/temperature)` and normalization `log_z`, the divergence
/// reduces to `-<correction>_P / temperature - log_z`. It is exactly zero for
/// a uniformly zero correction.
///
/// Domain requirement: `weights` must sum to one and must be the tilted
/// posterior matching `correction` and `log_z`; no re-normalization happens
/// here.
pub fn kl_divergence(
    weights: &DVector<f64>,
    correction: &DVector<f64>,
    temperature: f64,
    log_z: f64,
) -> f64 {
    -weights.dot(correction) / temperature - log_z
}
