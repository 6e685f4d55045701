use std::collections::BTreeMap;

use argmin::core::{CostFunction, Error, Gradient};
use nalgebra::{DMatrix, DVector};

use crate::core::models::DataError;
use crate::core::models::system::System;
use crate::core::reweight::tilt::reweight;

/// A system's observable groups flattened into single predicted/experimental
/// vectors, with per-group slice boundaries for splitting multiplier vectors
/// back apart.
///
/// Groups are flattened in lexicographic name order, so the layout is
/// deterministic for a given system.
#[derive(Debug, Clone)]
pub struct FlattenedConstraints {
    pub predicted: DMatrix<f64>,
    pub targets: DVector<f64>,
    pub sigmas: DVector<f64>,
    slices: Vec<(String, usize, usize)>,
}

impl FlattenedConstraints {
    pub fn from_system(system: &System) -> Self {
        let frames = system.frames();
        let total = system.total_observables();

        let mut predicted = DMatrix::zeros(frames, total);
        let mut targets = DVector::zeros(total);
        let mut sigmas = DVector::zeros(total);
        let mut slices = Vec::with_capacity(system.groups().len());

        let mut offset = 0;
        for (name, group) in system.groups() {
            let table = &system.tables()[name];
            let len = group.len();
            predicted.view_mut((0, offset), (frames, len)).copy_from(table);
            targets.rows_mut(offset, len).copy_from(&group.values);
            sigmas.rows_mut(offset, len).copy_from(&group.uncertainties);
            slices.push((name.clone(), offset, len));
            offset += len;
        }

        Self {
            predicted,
            targets,
            sigmas,
            slices,
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Splits a flattened multiplier vector back into per-group vectors.
    pub fn split(&self, flat: &DVector<f64>) -> BTreeMap<String, DVector<f64>> {
        self.slices
            .iter()
            .map(|(name, offset, len)| (name.clone(), flat.rows(*offset, *len).clone_owned()))
            .collect()
    }
}

/// Full evaluation of the dual at one multiplier vector.
#[derive(Debug, Clone)]
pub struct DualEval {
    pub value: f64,
    pub gradient: DVector<f64>,
    /// Ensemble averages of the flattened observables under the reweighted
    /// distribution.
    pub averages: DVector<f64>,
    pub weights: DVector<f64>,
    pub log_z: f64,
}

/// The Lagrangian dual of the constrained reweighting problem.
///
/// For multipliers `lambda` the reweighted ensemble is
/// `w(lambda) = reweight(prior, -G * lambda)` and the objective is
///
/// ```text
/// gamma(lambda) = alpha * log_z(lambda)
///               + 1/2 * sum_k (alpha * lambda_k * sigma_k)^2
///               - alpha * lambda . targets
/// ```
///
/// the convex dual of minimizing `1/2 * chi^2 + alpha * D_KL` subject to the
/// experimental constraints: log-sum-exp plus a quadratic, hence convex in
/// `lambda` with a unique minimum for fixed data and `alpha`. The analytic
/// gradient is `alpha * (<g_k> - target_k + alpha * lambda_k * sigma_k^2)`,
/// zero exactly when the reweighted averages match the targets up to the
/// regularization term.
///
/// The objective is a pure function of its inputs; it is re-evaluated from
/// scratch at every optimizer iteration and holds no state between calls.
pub struct DualObjective<'a> {
    constraints: &'a FlattenedConstraints,
    prior: &'a DVector<f64>,
    alpha: f64,
}

impl<'a> DualObjective<'a> {
    pub fn new(constraints: &'a FlattenedConstraints, prior: &'a DVector<f64>, alpha: f64) -> Self {
        Self {
            constraints,
            prior,
            alpha,
        }
    }

    fn penalty(&self, lambdas: &DVector<f64>) -> f64 {
        0.5 * lambdas
            .iter()
            .zip(self.constraints.sigmas.iter())
            .map(|(l, s)| (self.alpha * l * s).powi(2))
            .sum::<f64>()
    }

    /// Scalar objective only, for line-search evaluations.
    pub fn value(&self, lambdas: &DVector<f64>) -> Result<f64, DataError> {
        let correction = -(&self.constraints.predicted * lambdas);
        let tilted = reweight(self.prior, &correction)?;
        Ok(self.alpha * tilted.log_z + self.penalty(lambdas)
            - self.alpha * lambdas.dot(&self.constraints.targets))
    }

    /// Objective, analytic gradient, and the reweighted ensemble behind them.
    pub fn evaluate(&self, lambdas: &DVector<f64>) -> Result<DualEval, DataError> {
        let correction = -(&self.constraints.predicted * lambdas);
        let tilted = reweight(self.prior, &correction)?;

        let averages = self.constraints.predicted.transpose() * &tilted.weights;
        let gradient = DVector::from_iterator(
            lambdas.len(),
            lambdas
                .iter()
                .zip(averages.iter())
                .zip(self.constraints.targets.iter())
                .zip(self.constraints.sigmas.iter())
                .map(|(((l, av), target), sigma)| {
                    self.alpha * (av - target + self.alpha * l * sigma * sigma)
                }),
        );
        let value = self.alpha * tilted.log_z + self.penalty(lambdas)
            - self.alpha * lambdas.dot(&self.constraints.targets);

        Ok(DualEval {
            value,
            gradient,
            averages,
            weights: tilted.weights,
            log_z: tilted.log_z,
        })
    }
}

impl CostFunction for DualObjective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        let lambdas = DVector::from_column_slice(param);
        Ok(self.value(&lambdas)?)
    }
}

impl Gradient for DualObjective<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, Error> {
        let lambdas = DVector::from_column_slice(param);
        let eval = self.evaluate(&lambdas)?;
        Ok(eval.gradient.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::observable::{BoundKind, ObservableGroup};
    use approx::assert_relative_eq;

    fn two_group_system() -> System {
        let mut tables = BTreeMap::new();
        tables.insert(
            "j3".to_string(),
            DMatrix::from_row_slice(3, 2, &[1.0, 0.5, 2.0, 1.5, 3.0, 2.5]),
        );
        tables.insert(
            "noe".to_string(),
            DMatrix::from_row_slice(3, 1, &[0.1, 0.4, 0.9]),
        );
        let mut groups = BTreeMap::new();
        groups.insert(
            "j3".to_string(),
            ObservableGroup::new(
                DVector::from_vec(vec![1.8, 1.2]),
                DVector::from_vec(vec![0.4, 0.3]),
                BoundKind::Equality,
            ),
        );
        groups.insert(
            "noe".to_string(),
            ObservableGroup::new(
                DVector::from_vec(vec![0.5]),
                DVector::from_vec(vec![0.2]),
                BoundKind::Upper,
            ),
        );
        System::new(
            "test",
            DVector::from_vec(vec![0.2, 0.3, 0.5]),
            tables,
            groups,
        )
        .unwrap()
    }

    #[test]
    fn flattening_is_lexicographic_and_splittable() {
        let system = two_group_system();
        let flat = FlattenedConstraints::from_system(&system);

        assert_eq!(flat.len(), 3);
        // "j3" sorts before "noe".
        assert_relative_eq!(flat.targets[0], 1.8);
        assert_relative_eq!(flat.targets[2], 0.5);
        assert_relative_eq!(flat.predicted[(2, 2)], 0.9);

        let split = flat.split(&DVector::from_vec(vec![10.0, 20.0, 30.0]));
        assert_eq!(split["j3"].as_slice(), &[10.0, 20.0]);
        assert_eq!(split["noe"].as_slice(), &[30.0]);
    }

    #[test]
    fn dual_vanishes_at_zero_multipliers() {
        let system = two_group_system();
        let flat = FlattenedConstraints::from_system(&system);
        let objective = DualObjective::new(&flat, system.weights(), 1.5);

        let zero = DVector::zeros(flat.len());
        let eval = objective.evaluate(&zero).unwrap();

        assert_relative_eq!(eval.value, 0.0, epsilon = 1e-12);
        assert_relative_eq!(eval.log_z, 0.0, epsilon = 1e-12);
        // At lambda = 0 the gradient reduces to alpha * (prior average - target).
        let prior_av = flat.predicted.transpose() * system.weights();
        for k in 0..flat.len() {
            assert_relative_eq!(
                eval.gradient[k],
                1.5 * (prior_av[k] - flat.targets[k]),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let system = two_group_system();
        let flat = FlattenedConstraints::from_system(&system);
        let objective = DualObjective::new(&flat, system.weights(), 0.7);

        let lambdas = DVector::from_vec(vec![0.3, -0.2, 0.8]);
        let eval = objective.evaluate(&lambdas).unwrap();

        let h = 1e-6;
        for k in 0..flat.len() {
            let mut shifted = lambdas.clone();
            shifted[k] += h;
            let plus = objective.value(&shifted).unwrap();
            shifted[k] -= 2.0 * h;
            let minus = objective.value(&shifted).unwrap();
            let numeric = (plus - minus) / (2.0 * h);
            assert_relative_eq!(eval.gradient[k], numeric, epsilon = 1e-5);
        }
    }

    #[test]
    fn objective_is_convex_along_a_segment() {
        let system = two_group_system();
        let flat = FlattenedConstraints::from_system(&system);
        let objective = DualObjective::new(&flat, system.weights(), 1.0);

        let a = DVector::from_vec(vec![-0.5, 0.4, 0.1]);
        let b = DVector::from_vec(vec![0.9, -0.3, 0.6]);
        let mid = (&a + &b).scale(0.5);

        let va = objective.value(&a).unwrap();
        let vb = objective.value(&b).unwrap();
        let vm = objective.value(&mid).unwrap();
        assert!(vm <= 0.5 * (va + vb) + 1e-12);
    }

    #[test]
    fn value_and_evaluate_agree() {
        let system = two_group_system();
        let flat = FlattenedConstraints::from_system(&system);
        let objective = DualObjective::new(&flat, system.weights(), 2.0);

        let lambdas = DVector::from_vec(vec![0.1, 0.2, -0.3]);
        let value = objective.value(&lambdas).unwrap();
        let eval = objective.evaluate(&lambdas).unwrap();
        assert_relative_eq!(value, eval.value, epsilon = 1e-14);
        assert_relative_eq!(eval.weights.sum(), 1.0, epsilon = 1e-12);
    }
}
