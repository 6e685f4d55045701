use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {parameter}: {message}")]
    InvalidParameter {
        parameter: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationConfig {
    /// Hard cap on optimizer iterations per system; exceeding it is reported
    /// as non-convergence, never as an error.
    pub max_iterations: u64,
    /// Gradient-norm tolerance at which the minimizer terminates.
    pub gradient_tolerance: f64,
    /// Number of curvature pairs retained by the quasi-Newton minimizer.
    pub memory: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementConfig {
    /// Regularization strength trading fit-to-experiment against divergence
    /// from the prior ensemble.
    pub alpha: f64,
    pub optimization: OptimizationConfig,
}

const DEFAULT_MAX_ITERATIONS: u64 = 500;
const DEFAULT_GRADIENT_TOLERANCE: f64 = 1e-8;
const DEFAULT_MEMORY: usize = 7;

#[derive(Default)]
pub struct RefinementConfigBuilder {
    alpha: Option<f64>,
    max_iterations: Option<u64>,
    gradient_tolerance: Option<f64>,
    memory: Option<usize>,
}

impl RefinementConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }
    pub fn max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = Some(tolerance);
        self
    }
    pub fn memory(mut self, memory: usize) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn build(self) -> Result<RefinementConfig, ConfigError> {
        let alpha = self.alpha.ok_or(ConfigError::MissingParameter("alpha"))?;
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "alpha",
                message: format!("must be a positive finite number, got {alpha}"),
            });
        }
        let gradient_tolerance = self.gradient_tolerance.unwrap_or(DEFAULT_GRADIENT_TOLERANCE);
        if !gradient_tolerance.is_finite() || gradient_tolerance <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "gradient_tolerance",
                message: format!("must be a positive finite number, got {gradient_tolerance}"),
            });
        }
        let memory = self.memory.unwrap_or(DEFAULT_MEMORY);
        if memory == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "memory",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(RefinementConfig {
            alpha,
            optimization: OptimizationConfig {
                max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
                gradient_tolerance,
                memory,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_alpha() {
        let err = RefinementConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("alpha"));
    }

    #[test]
    fn builder_fills_optimizer_defaults() {
        let config = RefinementConfigBuilder::new().alpha(1.5).build().unwrap();
        assert_eq!(config.alpha, 1.5);
        assert_eq!(config.optimization.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(
            config.optimization.gradient_tolerance,
            DEFAULT_GRADIENT_TOLERANCE
        );
        assert_eq!(config.optimization.memory, DEFAULT_MEMORY);
    }

    #[test]
    fn non_positive_alpha_is_rejected() {
        let err = RefinementConfigBuilder::new().alpha(0.0).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                parameter: "alpha",
                ..
            }
        ));
    }

    #[test]
    fn overrides_are_kept() {
        let config = RefinementConfigBuilder::new()
            .alpha(0.1)
            .max_iterations(50)
            .gradient_tolerance(1e-6)
            .memory(10)
            .build()
            .unwrap();
        assert_eq!(config.optimization.max_iterations, 50);
        assert_eq!(config.optimization.gradient_tolerance, 1e-6);
        assert_eq!(config.optimization.memory, 10);
    }
}
