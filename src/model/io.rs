//! Model text format
//!
//! The libsvm model layout: a header of `key value...` lines, a line
//! holding `SV`, then one line per support vector with its `nr_class - 1`
//! coefficients followed by its `index:value` pairs.
//!
//! ```text
//! svm_type c_svc
//! kernel_type rbf
//! gamma 0.5
//! nr_class 2
//! total_sv 3
//! rho 0.125
//! label 1 -1
//! nr_sv 2 1
//! SV
//! 1 1:0.5 3:1
//! 0.25 2:-1
//! -1 1:-0.5
//! ```
//!
//! Floats are written in their shortest round-trip form, so a dumped model
//! loads back bit-for-bit.

use super::Model;
use crate::core::{
    FeatureSpace, KernelType, Parameter, Result, SVMError, SparseVector, SvmType,
};
use crate::data::parse_feature;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

impl Model {
    /// Write the model to `path`
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.dump_to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn dump_to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
        write!(writer, "{}", self)?;
        Ok(())
    }

    pub fn dump_to_string(&self) -> String {
        self.to_string()
    }

    /// Read a model written by [`Model::dump`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_from_reader(BufReader::new(File::open(path)?))
    }

    pub fn load_from_str(text: &str) -> Result<Self> {
        Self::load_from_reader(text.as_bytes())
    }

    /// Parse a model, rejecting unknown header keys, count mismatches and
    /// a missing `SV` section.
    pub fn load_from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines().enumerate();
        let mut header = Header::default();

        loop {
            let Some((n, line)) = lines.next() else {
                return Err(SVMError::ModelFormat("missing SV section".to_string()));
            };
            let line = line?;
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            if key == "SV" {
                break;
            }
            header.read(n + 1, key, tokens.collect())?;
        }

        let layout = header.validate()?;
        let n_coef = layout.nr_class - 1;
        // Rows grow as lines arrive; total_sv is untrusted until counted
        let mut sv_coef: Vec<Vec<f64>> = vec![Vec::new(); n_coef];
        let mut sv_space = FeatureSpace::new();

        for (n, line) in lines {
            let line = line?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if sv_space.len() == layout.total_sv {
                return Err(SVMError::ModelFormat(format!(
                    "more than total_sv = {} support vectors",
                    layout.total_sv
                )));
            }
            if tokens.len() < n_coef {
                return Err(SVMError::ModelFormat(format!(
                    "line {}: expected {} coefficients",
                    n + 1,
                    n_coef
                )));
            }

            for (row, token) in sv_coef.iter_mut().zip(&tokens[..n_coef]) {
                row.push(parse_number(n + 1, token)?);
            }
            let pairs = tokens[n_coef..]
                .iter()
                .map(|token| parse_feature(n + 1, token))
                .collect::<Result<Vec<_>>>()?;
            let x = SparseVector::try_from_pairs(pairs)
                .map_err(|e| SVMError::parse(n + 1, line.trim(), e.to_string()))?;
            sv_space.push_row(x.view());
        }

        if sv_space.len() != layout.total_sv {
            return Err(SVMError::ModelFormat(format!(
                "total_sv is {} but {} support vectors follow",
                layout.total_sv,
                sv_space.len()
            )));
        }

        Ok(Model {
            param: layout.param,
            nr_class: layout.nr_class,
            labels: header.label,
            rho: header.rho,
            n_sv: header.nr_sv,
            sv_space,
            sv_coef,
            sv_indices: Vec::new(),
            prob_a: header.prob_a,
            prob_b: header.prob_b,
        })
    }
}

impl FromStr for Model {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        Self::load_from_str(s)
    }
}

fn write_row<T: fmt::Display>(f: &mut fmt::Formatter<'_>, key: &str, values: &[T]) -> fmt::Result {
    write!(f, "{}", key)?;
    for v in values {
        write!(f, " {}", v)?;
    }
    writeln!(f)
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let param = &self.param;
        let kernel = param.kernel_type;

        writeln!(f, "svm_type {}", param.svm_type)?;
        writeln!(f, "kernel_type {}", kernel)?;
        if kernel == KernelType::Polynomial {
            writeln!(f, "degree {}", param.degree)?;
        }
        if kernel.uses_gamma() {
            writeln!(f, "gamma {}", param.gamma)?;
        }
        if kernel.uses_coef0() {
            writeln!(f, "coef0 {}", param.coef0)?;
        }
        writeln!(f, "nr_class {}", self.nr_class)?;
        writeln!(f, "total_sv {}", self.total_sv())?;
        write_row(f, "rho", &self.rho)?;
        if !self.labels.is_empty() {
            write_row(f, "label", &self.labels)?;
        }
        if !self.prob_a.is_empty() {
            write_row(f, "probA", &self.prob_a)?;
        }
        if !self.prob_b.is_empty() {
            write_row(f, "probB", &self.prob_b)?;
        }
        if !self.n_sv.is_empty() {
            write_row(f, "nr_sv", &self.n_sv)?;
        }

        writeln!(f, "SV")?;
        for s in 0..self.total_sv() {
            let mut sep = "";
            for row in &self.sv_coef {
                write!(f, "{}{}", sep, row[s])?;
                sep = " ";
            }
            let sv = self.support_vector(s);
            if kernel == KernelType::Precomputed {
                if let Some(id) = sv.values.first() {
                    write!(f, "{}0:{}", sep, id)?;
                }
            } else {
                for (index, value) in sv.iter() {
                    write!(f, "{}{}:{}", sep, index, value)?;
                    sep = " ";
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(line: usize, token: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| SVMError::parse(line, token, "invalid number"))
}

fn parse_all<T: FromStr>(line: usize, tokens: &[&str]) -> Result<Vec<T>> {
    tokens.iter().map(|t| parse_number(line, t)).collect()
}

/// Header fields as read, before their counts are checked
#[derive(Debug, Default)]
struct Header {
    svm_type: Option<SvmType>,
    kernel_type: Option<KernelType>,
    degree: Option<i32>,
    gamma: Option<f64>,
    coef0: Option<f64>,
    nr_class: Option<usize>,
    total_sv: Option<usize>,
    rho: Vec<f64>,
    label: Vec<i32>,
    prob_a: Vec<f64>,
    prob_b: Vec<f64>,
    nr_sv: Vec<usize>,
}

/// Shape of the support vector section implied by a valid header
struct Layout {
    param: Parameter,
    nr_class: usize,
    total_sv: usize,
}

impl Header {
    fn read(&mut self, line: usize, key: &str, values: Vec<&str>) -> Result<()> {
        let single = || match values.as_slice() {
            [value] => Ok(*value),
            _ => Err(SVMError::ModelFormat(format!(
                "line {}: `{}` takes exactly one value",
                line, key
            ))),
        };

        match key {
            "svm_type" => self.svm_type = Some(single()?.parse()?),
            "kernel_type" => self.kernel_type = Some(single()?.parse()?),
            "degree" => self.degree = Some(parse_number(line, single()?)?),
            "gamma" => self.gamma = Some(parse_number(line, single()?)?),
            "coef0" => self.coef0 = Some(parse_number(line, single()?)?),
            "nr_class" => self.nr_class = Some(parse_number(line, single()?)?),
            "total_sv" => self.total_sv = Some(parse_number(line, single()?)?),
            "rho" => self.rho = parse_all(line, &values)?,
            "label" => self.label = parse_all(line, &values)?,
            "probA" => self.prob_a = parse_all(line, &values)?,
            "probB" => self.prob_b = parse_all(line, &values)?,
            "nr_sv" => self.nr_sv = parse_all(line, &values)?,
            other => {
                return Err(SVMError::ModelFormat(format!(
                    "unknown key `{}` at line {}",
                    other, line
                )))
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<Layout> {
        let missing = |key: &str| SVMError::ModelFormat(format!("missing `{}`", key));
        let svm_type = self.svm_type.ok_or_else(|| missing("svm_type"))?;
        let kernel_type = self.kernel_type.ok_or_else(|| missing("kernel_type"))?;
        let nr_class = self.nr_class.ok_or_else(|| missing("nr_class"))?;
        let total_sv = self.total_sv.ok_or_else(|| missing("total_sv"))?;

        if nr_class == 0 || (!svm_type.is_classification() && nr_class != 2) {
            return Err(SVMError::ModelFormat(format!(
                "nr_class {} is invalid for {}",
                nr_class, svm_type
            )));
        }

        let pairs = nr_class * (nr_class - 1) / 2;
        let check = |key: &str, found: usize, expected: usize| {
            if found == expected {
                Ok(())
            } else {
                Err(SVMError::ModelFormat(format!(
                    "`{}` has {} values, expected {}",
                    key, found, expected
                )))
            }
        };

        check("rho", self.rho.len(), pairs)?;
        if !self.prob_a.is_empty() {
            check("probA", self.prob_a.len(), pairs)?;
        }
        if !self.prob_b.is_empty() {
            check("probB", self.prob_b.len(), pairs)?;
        }
        if svm_type.is_classification() {
            check("label", self.label.len(), nr_class)?;
            check("nr_sv", self.nr_sv.len(), nr_class)?;
            check("total_sv", total_sv, self.nr_sv.iter().sum())?;
        }

        let mut param = Parameter::new(svm_type, kernel_type);
        if let Some(degree) = self.degree {
            param.degree = degree;
        }
        if let Some(gamma) = self.gamma {
            param.gamma = gamma;
        }
        if let Some(coef0) = self.coef0 {
            param.coef0 = coef0;
        }

        Ok(Layout {
            param,
            nr_class,
            total_sv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Problem;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    const MODEL: &str = "svm_type c_svc
kernel_type rbf
gamma 0.5
nr_class 2
total_sv 3
rho 0.125
label 1 -1
nr_sv 2 1
SV
1 1:0.5 3:1
0.25 2:-1
-1.25 1:-0.5
";

    #[test]
    fn test_load_from_str() {
        let model = Model::load_from_str(MODEL).unwrap();
        assert_eq!(model.svm_type(), SvmType::CSvc);
        assert_eq!(model.param().kernel_type, KernelType::Rbf);
        assert_eq!(model.param().gamma, 0.5);
        assert_eq!(model.labels(), &[1, -1]);
        assert_eq!(model.n_sv(), &[2, 1]);
        assert_eq!(model.sv_coef(), &[vec![1.0, 0.25, -1.25]]);
        assert_eq!(model.support_vector(2).indices, &[1]);
        assert!(model.sv_indices().is_empty());
        assert_eq!(model.dump_to_string(), MODEL);
    }

    #[test]
    fn test_dump_load_is_exact() {
        let data = "1 1:0.1 2:0.3\n1 1:0.7 2:0.2\n-1 1:-0.3 2:-0.9\n-1 1:-0.6 2:0.1\n2 1:3 2:3\n";
        let problem = Problem::from_reader(Cursor::new(data)).unwrap();
        let param = Parameter::new(SvmType::CSvc, KernelType::Polynomial)
            .with_gamma(1.0 / 3.0)
            .with_coef0(0.1)
            .with_degree(2);
        let model = Model::train(&problem, &param).unwrap();

        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        model.dump(temp_file.path()).unwrap();
        let loaded = Model::load(temp_file.path()).unwrap();

        assert_eq!(loaded.rho(), model.rho());
        assert_eq!(loaded.sv_coef(), model.sv_coef());
        assert_eq!(loaded.param().gamma, 1.0 / 3.0);
        assert_eq!(loaded.dump_to_string(), model.dump_to_string());
        for i in 0..problem.len() {
            assert_eq!(loaded.predict_values(problem.x(i)), model.predict_values(problem.x(i)));
        }
    }

    #[test]
    fn test_regression_header_has_no_labels() {
        let problem = Problem::from_reader(Cursor::new("0.5 1:1\n1.5 1:2\n2.5 1:3\n")).unwrap();
        let param = Parameter::new(SvmType::NuSvr, KernelType::Linear);
        let text = Model::train(&problem, &param).unwrap().dump_to_string();

        assert!(text.starts_with("svm_type nu_svr\nkernel_type linear\nnr_class 2\n"));
        assert!(!text.contains("label"));
        assert!(!text.contains("nr_sv"));
        assert!(text.parse::<Model>().is_ok());
    }

    #[test]
    fn test_rejects_malformed_models() {
        let cases = [
            MODEL.replace("gamma 0.5\n", "gamma 0.5\nshrinking 1\n"),
            MODEL.replace("SV\n", ""),
            MODEL.replace("rho 0.125", "rho 0.125 0.5"),
            MODEL.replace("label 1 -1", "label 1"),
            MODEL.replace("total_sv 3", "total_sv 4"),
            MODEL.replace("nr_class 2\n", ""),
            MODEL.replace("-1.25 1:-0.5\n", ""),
            format!("{}0.5 1:2\n", MODEL),
        ];
        for text in &cases {
            assert!(
                matches!(Model::load_from_str(text), Err(SVMError::ModelFormat(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn test_huge_total_sv_is_a_format_error() {
        let text = "svm_type epsilon_svr\nkernel_type linear\nnr_class 2\n\
                    total_sv 1000000000000000000\nrho 0\nSV\n";
        assert!(matches!(
            Model::load_from_reader(Cursor::new(text)),
            Err(SVMError::ModelFormat(_))
        ));

        let one_class = "svm_type one_class\nkernel_type rbf\ngamma 1\nnr_class 2\n\
                         total_sv 1000000000000000000\nrho 0\nSV\n1 1:0.5\n";
        assert!(matches!(
            Model::load_from_str(one_class),
            Err(SVMError::ModelFormat(_))
        ));
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let text = MODEL.replace("0.25 2:-1", "0.25 2:x");
        assert!(matches!(
            Model::load_from_str(&text),
            Err(SVMError::ParseError { line: 11, .. })
        ));
        assert!(matches!(
            Model::load_from_str(&MODEL.replace("rbf", "laplace")),
            Err(SVMError::UnsupportedKernel(_))
        ));
    }

    #[test]
    fn test_precomputed_sv_lines_hold_ids() {
        let data = "1 0:1 1:4 2:1 3:0\n1 0:2 1:1 2:4 3:0\n-1 0:3 1:0 2:0 3:4\n";
        let problem = Problem::from_reader(Cursor::new(data)).unwrap();
        let param = Parameter::new(SvmType::CSvc, KernelType::Precomputed);
        let model = Model::train(&problem, &param).unwrap();

        let text = model.dump_to_string();
        let sv_lines: Vec<&str> = text.lines().skip_while(|l| *l != "SV").skip(1).collect();
        assert_eq!(sv_lines.len(), model.total_sv());
        for line in sv_lines {
            let features: Vec<&str> = line.split_whitespace().skip(1).collect();
            assert_eq!(features.len(), 1);
            assert!(features[0].starts_with("0:"));
        }

        let loaded = Model::load_from_str(&text).unwrap();
        for i in 0..problem.len() {
            assert_eq!(loaded.predict(problem.x(i)), model.predict(problem.x(i)));
        }
    }
}
