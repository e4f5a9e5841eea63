//! parsvm Command Line Interface
//!
//! Trains models on libsvm-format data, runs cross-validation, predicts
//! with saved models and prints model summaries.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{debug, error, info};
use parsvm::utils::metrics::{accuracy, RegressionStats};
use parsvm::{
    cross_validation_report, ClassWeight, KernelType, Model, Parameter, Problem, Result,
    SVMError, SvmType,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "parsvm")]
#[command(about = "Parallel Support Vector Machine training and prediction")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model, or cross-validate with -v
    Train(TrainArgs),
    /// Predict a data file with a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (libsvm format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file [default: <data>.model]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON parameter file; command line options override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// SVM type: 0 c_svc, 1 nu_svc, 2 one_class, 3 epsilon_svr, 4 nu_svr
    #[arg(short = 's', long, value_parser = parse_svm_type)]
    svm_type: Option<SvmType>,

    /// Kernel: 0 linear, 1 polynomial, 2 rbf, 3 sigmoid, 4 precomputed
    #[arg(short = 't', long, value_parser = parse_kernel_type)]
    kernel_type: Option<KernelType>,

    /// Degree of the polynomial kernel
    #[arg(short = 'd', long)]
    degree: Option<i32>,

    /// Kernel gamma [default: 1/max feature index]
    #[arg(short = 'g', long)]
    gamma: Option<f64>,

    /// Kernel coef0
    #[arg(short = 'r', long)]
    coef0: Option<f64>,

    /// Penalty C of C-SVC, epsilon-SVR and nu-SVR
    #[arg(short = 'C', long)]
    c: Option<f64>,

    /// nu of nu-SVC, one-class and nu-SVR
    #[arg(short = 'n', long)]
    nu: Option<f64>,

    /// Epsilon of the epsilon-SVR loss
    #[arg(short = 'p', long)]
    p: Option<f64>,

    /// Stopping tolerance
    #[arg(short = 'e', long)]
    eps: Option<f64>,

    /// Row cache size in MB
    #[arg(short = 'm', long)]
    cache_size: Option<usize>,

    /// Train probability estimates
    #[arg(short = 'b', long)]
    probability: bool,

    /// Class weight as label:weight; multiplies C for that class
    #[arg(
        short = 'w',
        long = "weight",
        value_parser = parse_weight,
        allow_hyphen_values = true
    )]
    weights: Vec<ClassWeight>,

    /// n-fold cross-validation instead of training a model
    #[arg(short = 'v', long)]
    folds: Option<usize>,

    /// Worker threads (0 = all CPUs)
    #[arg(long)]
    workers: Option<usize>,

    /// Seed for cross-validation and calibration shuffles
    #[arg(long)]
    seed: Option<u64>,

    /// Cap on solver iterations
    #[arg(long)]
    max_iterations: Option<usize>,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output class probabilities (classification models trained with -b)
    #[arg(short = 'b', long)]
    probability: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn parse_svm_type(s: &str) -> std::result::Result<SvmType, String> {
    match s.parse::<i32>() {
        Ok(code) => SvmType::try_from(code),
        Err(_) => s.parse(),
    }
    .map_err(|e| e.to_string())
}

fn parse_kernel_type(s: &str) -> std::result::Result<KernelType, String> {
    match s.parse::<i32>() {
        Ok(code) => KernelType::try_from(code),
        Err(_) => s.parse(),
    }
    .map_err(|e| e.to_string())
}

fn parse_weight(s: &str) -> std::result::Result<ClassWeight, String> {
    let (label, weight) = s
        .split_once(|c| c == ':' || c == ',')
        .ok_or_else(|| format!("expected label:weight, got `{s}`"))?;
    let label = label
        .trim()
        .parse()
        .map_err(|_| format!("invalid class label `{label}`"))?;
    let weight = weight
        .trim()
        .parse()
        .map_err(|_| format!("invalid weight `{weight}`"))?;
    Ok(ClassWeight { label, weight })
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

impl TrainArgs {
    /// Parameters from the config file, overridden by explicit options
    fn parameter(&self) -> Result<Parameter> {
        let mut param = match &self.config {
            Some(path) => {
                let reader = BufReader::new(File::open(path)?);
                serde_json::from_reader(reader).map_err(|e| {
                    SVMError::InvalidParameter(format!("config {}: {e}", path.display()))
                })?
            }
            None => Parameter::default(),
        };

        if let Some(v) = self.svm_type {
            param.svm_type = v;
        }
        if let Some(v) = self.kernel_type {
            param.kernel_type = v;
        }
        if let Some(v) = self.degree {
            param.degree = v;
        }
        if let Some(v) = self.gamma {
            param.gamma = v;
        }
        if let Some(v) = self.coef0 {
            param.coef0 = v;
        }
        if let Some(v) = self.c {
            param.c = v;
        }
        if let Some(v) = self.nu {
            param.nu = v;
        }
        if let Some(v) = self.p {
            param.p = v;
        }
        if let Some(v) = self.eps {
            param.eps = v;
        }
        if let Some(v) = self.cache_size {
            param.cache_size = v;
        }
        if let Some(v) = self.workers {
            param.workers = v;
        }
        if self.seed.is_some() {
            param.seed = self.seed;
        }
        if self.max_iterations.is_some() {
            param.max_iterations = self.max_iterations;
        }
        if self.probability {
            param.probability = true;
        }
        param.weights.extend(self.weights.iter().copied());

        param.validate()?;
        Ok(param)
    }
}

fn default_model_path(data: &Path) -> PathBuf {
    let mut name = data.file_name().unwrap_or_default().to_os_string();
    name.push(".model");
    PathBuf::from(name)
}

fn train_command(args: TrainArgs) -> Result<()> {
    let mut param = args.parameter()?;
    info!("Loading training data from: {:?}", args.data);
    let problem = Problem::load(&args.data, &mut param)?;
    info!(
        "Loaded {} examples, max feature index {}",
        problem.len(),
        problem.max_index()
    );
    debug!("Parameters: {param:?}");

    if let Some(folds) = args.folds {
        return cross_validate(&problem, &param, folds);
    }

    let model = Model::train(&problem, &param)?;
    let output = args
        .output
        .unwrap_or_else(|| default_model_path(&args.data));
    model.dump(&output)?;
    info!(
        "Model with {} support vectors saved to: {:?}",
        model.total_sv(),
        output
    );

    Ok(())
}

fn cross_validate(problem: &Problem, param: &Parameter, folds: usize) -> Result<()> {
    let report = cross_validation_report(problem, param, folds)?;
    for (fold, acc) in report.fold_accuracies.iter().enumerate() {
        debug!("Fold {fold}: accuracy {:.4}", acc);
    }

    if param.svm_type.is_regression() {
        let stats: RegressionStats = report
            .predictions
            .iter()
            .copied()
            .zip(problem.labels().iter().copied())
            .collect();
        println!(
            "Cross Validation Mean squared error = {:.6}",
            stats.mean_squared_error()
        );
        println!(
            "Cross Validation Squared correlation coefficient = {:.6}",
            stats.squared_correlation()
        );
    } else {
        let acc = accuracy(&report.predictions, problem.labels());
        println!("Cross Validation Accuracy = {:.4}%", acc * 100.0);
        for (actual, row) in &report.confusion {
            debug!("Actual {actual}: {row:?}");
        }
    }

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = Model::load(&args.model)?;
    info!("Loading prediction data from: {:?}", args.data);
    let problem = Problem::from_file(&args.data)?;

    let with_probability = if !args.probability {
        false
    } else if model.has_probability() {
        true
    } else if let Some(sigma) = model.svr_sigma() {
        info!(
            "Prob. model for test data: target value = predicted value + z, \
             z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {sigma}"
        );
        false
    } else {
        return Err(SVMError::ProbabilityUnavailable);
    };

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    if with_probability {
        write!(writer, "labels")?;
        for label in model.labels() {
            write!(writer, " {label}")?;
        }
        writeln!(writer)?;
    }

    let mut predictions = Vec::with_capacity(problem.len());
    for i in 0..problem.len() {
        let x = problem.x(i);
        let predicted = if with_probability {
            let (label, probs) = model.predict_probability(x)?;
            write!(writer, "{label}")?;
            for p in probs {
                write!(writer, " {p}")?;
            }
            writeln!(writer)?;
            label
        } else {
            let label = model.predict(x);
            writeln!(writer, "{label}")?;
            label
        };
        predictions.push(predicted);
    }
    writer.flush()?;
    drop(writer);

    if let Some(path) = &args.output {
        info!("Predictions saved to: {path:?}");
    }

    if model.svm_type().is_regression() {
        let stats: RegressionStats = predictions
            .iter()
            .copied()
            .zip(problem.labels().iter().copied())
            .collect();
        println!(
            "Mean squared error = {:.6} (regression)",
            stats.mean_squared_error()
        );
        println!(
            "Squared correlation coefficient = {:.6} (regression)",
            stats.squared_correlation()
        );
    } else {
        let correct = predictions
            .iter()
            .zip(problem.labels())
            .filter(|(p, y)| p == y)
            .count();
        println!(
            "Accuracy = {:.4}% ({}/{}) (classification)",
            accuracy(&predictions, problem.labels()) * 100.0,
            correct,
            problem.len()
        );
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = Model::load(&args.model)?;
    let param = model.param();

    println!("=== SVM Model Summary ===");
    println!("SVM Type: {}", param.svm_type);
    println!("Kernel Type: {}", param.kernel_type);
    if param.kernel_type == KernelType::Polynomial {
        println!("  Degree: {}", param.degree);
    }
    if param.kernel_type.uses_gamma() {
        println!("  Gamma: {}", param.gamma);
    }
    if param.kernel_type.uses_coef0() {
        println!("  Coef0: {}", param.coef0);
    }
    println!("Classes: {}", model.nr_class());
    if !model.labels().is_empty() {
        println!("  Labels: {:?}", model.labels());
        println!("  Support vectors per class: {:?}", model.n_sv());
    }
    println!("Support Vectors: {}", model.total_sv());
    println!("Rho: {:?}", model.rho());
    println!(
        "Probability: {}",
        if model.has_probability() || model.svr_sigma().is_some() {
            "yes"
        } else {
            "no"
        }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_codes_and_names() {
        assert_eq!(parse_svm_type("0").unwrap(), SvmType::CSvc);
        assert_eq!(parse_svm_type("nu_svr").unwrap(), SvmType::NuSvr);
        assert!(parse_svm_type("9").is_err());
        assert_eq!(parse_kernel_type("2").unwrap(), KernelType::Rbf);
        assert_eq!(parse_kernel_type("linear").unwrap(), KernelType::Linear);
        assert!(parse_kernel_type("laplace").is_err());
    }

    #[test]
    fn test_parse_weight() {
        let w = parse_weight("-1:2.5").unwrap();
        assert_eq!((w.label, w.weight), (-1, 2.5));
        let w = parse_weight("3,0.5").unwrap();
        assert_eq!((w.label, w.weight), (3, 0.5));
        assert!(parse_weight("3").is_err());
        assert!(parse_weight("a:1").is_err());
    }

    #[test]
    fn test_default_model_path() {
        assert_eq!(
            default_model_path(Path::new("/data/heart_scale")),
            PathBuf::from("heart_scale.model")
        );
    }
}
