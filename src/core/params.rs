//! Training parameters
//!
//! [`Parameter`] is the configuration bag shared by training, prediction and
//! model persistence. It can be built in code with the `with_*` setters or
//! deserialized from a JSON file, where missing fields take their defaults.

use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Formulation of the SVM problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvmType {
    CSvc,
    NuSvc,
    OneClass,
    EpsilonSvr,
    NuSvr,
}

impl SvmType {
    const ALL: [SvmType; 5] = [
        SvmType::CSvc,
        SvmType::NuSvc,
        SvmType::OneClass,
        SvmType::EpsilonSvr,
        SvmType::NuSvr,
    ];

    /// Name used in model files
    pub fn name(self) -> &'static str {
        match self {
            SvmType::CSvc => "c_svc",
            SvmType::NuSvc => "nu_svc",
            SvmType::OneClass => "one_class",
            SvmType::EpsilonSvr => "epsilon_svr",
            SvmType::NuSvr => "nu_svr",
        }
    }

    pub fn is_classification(self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    pub fn is_regression(self) -> bool {
        matches!(self, SvmType::EpsilonSvr | SvmType::NuSvr)
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SvmType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| SVMError::UnsupportedSvmType(s.to_string()))
    }
}

impl TryFrom<i32> for SvmType {
    type Error = SVMError;

    /// Numeric codes as accepted by `-s` on the command line
    fn try_from(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| SVMError::UnsupportedSvmType(code.to_string()))
    }
}

/// Kernel function family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
    Precomputed,
}

impl KernelType {
    const ALL: [KernelType; 5] = [
        KernelType::Linear,
        KernelType::Polynomial,
        KernelType::Rbf,
        KernelType::Sigmoid,
        KernelType::Precomputed,
    ];

    /// Name used in model files
    pub fn name(self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "polynomial",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
            KernelType::Precomputed => "precomputed",
        }
    }

    /// Whether the kernel reads `gamma`
    pub fn uses_gamma(self) -> bool {
        matches!(
            self,
            KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
        )
    }

    /// Whether the kernel reads `coef0`
    pub fn uses_coef0(self) -> bool {
        matches!(self, KernelType::Polynomial | KernelType::Sigmoid)
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KernelType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| SVMError::UnsupportedKernel(s.to_string()))
    }
}

impl TryFrom<i32> for KernelType {
    type Error = SVMError;

    /// Numeric codes as accepted by `-t` on the command line
    fn try_from(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| SVMError::UnsupportedKernel(code.to_string()))
    }
}

/// How the one-class solver seeds its initial alpha budget of `nu * l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneClassInit {
    /// `n = floor(nu * l)` alphas start at 1, alpha[n] takes the remainder.
    #[default]
    Scaled,
    /// `n = floor(nu) * l`. For `nu < 1` this puts the whole budget on the
    /// first example, which can exceed the upper bound of 1.
    Truncated,
}

/// Penalty multiplier for one class label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeight {
    pub label: i32,
    pub weight: f64,
}

/// SVM training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    /// Polynomial degree
    pub degree: i32,
    /// Kernel scale; 0 means "derive from the problem as 1/max_index"
    pub gamma: f64,
    pub coef0: f64,
    /// Stopping tolerance on the duality gap
    pub eps: f64,
    /// Penalty for C-SVC, epsilon-SVR and nu-SVR
    pub c: f64,
    /// Per-class multipliers applied to `c` for classification
    pub weights: Vec<ClassWeight>,
    /// nu for nu-SVC, one-class and nu-SVR
    pub nu: f64,
    /// Width of the epsilon-insensitive tube for epsilon-SVR
    pub p: f64,
    /// Train probability calibration alongside the model
    pub probability: bool,
    /// Row cache budget in megabytes
    pub cache_size: usize,
    /// Worker count for parallel loops; 0 uses every available CPU
    pub workers: usize,
    /// Overrides the solver's iteration cap
    pub max_iterations: Option<usize>,
    /// Seed for cross-validation and calibration shuffles
    pub seed: Option<u64>,
    pub one_class_init: OneClassInit,
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel_type: KernelType::Rbf,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            eps: 1e-3,
            c: 1.0,
            weights: Vec::new(),
            nu: 0.5,
            p: 0.1,
            probability: false,
            cache_size: 100,
            workers: 0,
            max_iterations: None,
            seed: None,
            one_class_init: OneClassInit::default(),
        }
    }
}

impl Parameter {
    pub fn new(svm_type: SvmType, kernel_type: KernelType) -> Self {
        Self {
            svm_type,
            kernel_type,
            ..Self::default()
        }
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.svm_type = svm_type;
        self
    }

    pub fn with_kernel(mut self, kernel_type: KernelType) -> Self {
        self.kernel_type = kernel_type;
        self
    }

    pub fn with_degree(mut self, degree: i32) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.coef0 = coef0;
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.nu = nu;
        self
    }

    /// Set convergence tolerance
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_p(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    /// Multiply C by `weight` for examples labeled `label`
    pub fn with_weight(mut self, label: i32, weight: f64) -> Self {
        self.weights.push(ClassWeight { label, weight });
        self
    }

    pub fn with_probability(mut self, probability: bool) -> Self {
        self.probability = probability;
        self
    }

    /// Set row cache size in megabytes
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set maximum number of solver iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_one_class_init(mut self, rule: OneClassInit) -> Self {
        self.one_class_init = rule;
        self
    }

    /// Replace a zero gamma by `1 / max_index`
    pub fn derive_gamma(&mut self, max_index: usize) {
        if self.gamma == 0.0 && max_index > 0 {
            self.gamma = 1.0 / max_index as f64;
        }
    }

    /// Reject settings the solver cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(SVMError::InvalidParameter(msg.to_string()));

        if self.kernel_type.uses_gamma() && self.gamma < 0.0 {
            return invalid("gamma < 0");
        }
        if self.kernel_type == KernelType::Polynomial && self.degree < 0 {
            return invalid("degree of polynomial kernel < 0");
        }
        if self.cache_size == 0 {
            return invalid("cache_size <= 0");
        }
        if self.eps <= 0.0 {
            return invalid("eps <= 0");
        }
        if matches!(
            self.svm_type,
            SvmType::CSvc | SvmType::EpsilonSvr | SvmType::NuSvr
        ) && self.c <= 0.0
        {
            return invalid("C <= 0");
        }
        if matches!(
            self.svm_type,
            SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr
        ) && (self.nu <= 0.0 || self.nu > 1.0)
        {
            return invalid("nu <= 0 or nu > 1");
        }
        if self.svm_type == SvmType::EpsilonSvr && self.p < 0.0 {
            return invalid("p < 0");
        }
        if self.probability && self.svm_type == SvmType::OneClass {
            return invalid("one-class SVM probability output not supported");
        }
        if let Some(w) = self.weights.iter().find(|w| w.weight <= 0.0) {
            return Err(SVMError::InvalidParameter(format!(
                "weight for label {} must be positive",
                w.label
            )));
        }
        Ok(())
    }

    /// nu-SVC needs `nu * (n1 + n2) / 2 <= min(n1, n2)` for every class pair
    pub fn check_feasibility(&self, labels: &[f64]) -> Result<()> {
        if self.svm_type != SvmType::NuSvc {
            return Ok(());
        }

        let mut counts: Vec<(f64, usize)> = Vec::new();
        for &y in labels {
            match counts.iter_mut().find(|(label, _)| *label == y) {
                Some((_, n)) => *n += 1,
                None => counts.push((y, 1)),
            }
        }

        for (i, &(_, n1)) in counts.iter().enumerate() {
            for &(_, n2) in &counts[i + 1..] {
                if self.nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                    return Err(SVMError::InvalidParameter(
                        "specified nu is infeasible".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_default() {
        let param = Parameter::default();
        assert_eq!(param.svm_type, SvmType::CSvc);
        assert_eq!(param.kernel_type, KernelType::Rbf);
        assert_eq!(param.degree, 3);
        assert_eq!(param.gamma, 0.0);
        assert_eq!(param.nu, 0.5);
        assert_eq!(param.c, 1.0);
        assert_eq!(param.eps, 1e-3);
        assert_eq!(param.p, 0.1);
        assert_eq!(param.cache_size, 100);
        assert!(!param.probability);
        assert!(param.validate().is_ok());
    }

    #[test]
    fn test_type_names_round_trip() {
        for t in SvmType::ALL {
            assert_eq!(t.name().parse::<SvmType>().unwrap(), t);
        }
        for k in KernelType::ALL {
            assert_eq!(k.name().parse::<KernelType>().unwrap(), k);
        }
        assert!(matches!(
            "laplacian".parse::<KernelType>(),
            Err(SVMError::UnsupportedKernel(_))
        ));
        assert!(matches!(
            "c_svr".parse::<SvmType>(),
            Err(SVMError::UnsupportedSvmType(_))
        ));
    }

    #[test]
    fn test_numeric_codes() {
        assert_eq!(KernelType::try_from(2).unwrap(), KernelType::Rbf);
        assert_eq!(SvmType::try_from(3).unwrap(), SvmType::EpsilonSvr);
        assert!(KernelType::try_from(5).is_err());
        assert!(KernelType::try_from(-1).is_err());
        assert!(SvmType::try_from(7).is_err());
    }

    #[test]
    fn test_derive_gamma() {
        let mut param = Parameter::default();
        param.derive_gamma(4);
        assert_eq!(param.gamma, 0.25);

        // An explicit gamma is left alone
        param.derive_gamma(10);
        assert_eq!(param.gamma, 0.25);

        let mut param = Parameter::default();
        param.derive_gamma(0);
        assert_eq!(param.gamma, 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(Parameter::default().with_c(0.0).validate().is_err());
        assert!(Parameter::default().with_eps(0.0).validate().is_err());
        assert!(Parameter::default().with_cache_size(0).validate().is_err());
        assert!(Parameter::default().with_gamma(-1.0).validate().is_err());
        assert!(Parameter::new(SvmType::NuSvc, KernelType::Linear)
            .with_nu(1.5)
            .validate()
            .is_err());
        assert!(Parameter::new(SvmType::EpsilonSvr, KernelType::Linear)
            .with_p(-0.1)
            .validate()
            .is_err());
        assert!(Parameter::new(SvmType::OneClass, KernelType::Rbf)
            .with_probability(true)
            .validate()
            .is_err());
        assert!(Parameter::default()
            .with_weight(1, -2.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_config_with_defaults() {
        let json = r#"{ "svm_type": "nu_svr", "kernel_type": "linear", "nu": 0.3 }"#;
        let param: Parameter = serde_json::from_str(json).unwrap();
        assert_eq!(param.svm_type, SvmType::NuSvr);
        assert_eq!(param.kernel_type, KernelType::Linear);
        assert_eq!(param.nu, 0.3);
        assert_eq!(param.c, 1.0);
        assert_eq!(param.cache_size, 100);
    }

    #[test]
    fn test_nu_feasibility() {
        // 2 positives, 6 negatives: nu * 8 / 2 must not exceed 2
        let labels = [1.0, 1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0];
        let param = Parameter::new(SvmType::NuSvc, KernelType::Linear);

        assert!(param.clone().with_nu(0.5).check_feasibility(&labels).is_ok());
        assert!(matches!(
            param.with_nu(0.6).check_feasibility(&labels),
            Err(SVMError::InvalidParameter(_))
        ));
        assert!(Parameter::default()
            .with_nu(0.9)
            .check_feasibility(&labels)
            .is_ok());
    }
}
