use crate::error::{PipelineError, Result};
use crate::features::{FeatureSchema, FeatureVector, TOTAL_INJURY_IMPACT, pts_for_name};

/// Maps a feature vector to a raw combined-score estimate.
pub trait Predictor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Version tag of the feature schema this predictor was built for.
    fn feature_version(&self) -> &str;

    fn estimate(&self, features: &FeatureVector) -> Result<f64>;

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if features.version != self.feature_version() {
            return Err(PipelineError::FeatureSchemaMismatch {
                expected: self.feature_version().to_string(),
                found: features.version.clone(),
            });
        }
        self.estimate(features)
    }
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn feature_version(&self) -> &str {
        (**self).feature_version()
    }

    fn estimate(&self, features: &FeatureVector) -> Result<f64> {
        (**self).estimate(features)
    }
}

fn required(features: &FeatureVector, name: &str) -> Result<f64> {
    features
        .get(name)
        .ok_or_else(|| PipelineError::FeatureSchemaMismatch {
            expected: format!("feature `{name}`"),
            found: features.version.clone(),
        })
}

/// Sum of both teams' recent scoring averages, less the combined injury impact.
#[derive(Debug, Clone)]
pub struct BaselinePredictor {
    version: String,
    home_pts: String,
    away_pts: String,
}

impl BaselinePredictor {
    /// Uses the shortest window in the schema.
    pub fn new(schema: &FeatureSchema) -> Self {
        let window = schema.windows().iter().copied().min().unwrap_or(5);
        Self {
            version: schema.version().to_string(),
            home_pts: pts_for_name("home", window),
            away_pts: pts_for_name("away", window),
        }
    }
}

impl Predictor for BaselinePredictor {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn feature_version(&self) -> &str {
        &self.version
    }

    fn estimate(&self, features: &FeatureVector) -> Result<f64> {
        let home = required(features, &self.home_pts)?;
        let away = required(features, &self.away_pts)?;
        let injuries = required(features, TOTAL_INJURY_IMPACT)?;
        Ok(home + away - injuries)
    }
}

/// Ridge regression over standardized features.
#[derive(Debug, Clone)]
pub struct LinearPredictor {
    version: String,
    means: Vec<f64>,
    scales: Vec<f64>,
    coefficients: Vec<f64>,
    intercept: f64,
}

pub struct TrainingRow<'a> {
    pub features: &'a FeatureVector,
    pub actual_total: f64,
}

impl LinearPredictor {
    pub fn fit(schema: &FeatureSchema, rows: &[TrainingRow<'_>], l2: f64) -> Result<Self> {
        let dims = schema.len();
        if rows.len() < 2 {
            return Err(PipelineError::InvalidRecord(format!(
                "ridge fit needs at least 2 training rows, got {}",
                rows.len()
            )));
        }
        let mut matrix: Vec<Vec<f64>> = Vec::with_capacity(rows.len());
        for row in rows {
            schema.check(row.features)?;
            matrix.push(row.features.values());
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; dims];
        for x in &matrix {
            for (m, v) in means.iter_mut().zip(x) {
                *m += v / n;
            }
        }
        let mut scales = vec![0.0; dims];
        for x in &matrix {
            for j in 0..dims {
                scales[j] += (x[j] - means[j]).powi(2) / n;
            }
        }
        for s in scales.iter_mut() {
            *s = if *s > 1e-12 { s.sqrt() } else { 1.0 };
        }

        let y_mean = rows.iter().map(|r| r.actual_total).sum::<f64>() / n;

        // Normal equations: (ZᵀZ + λI) β = Zᵀ(y - ȳ)
        let mut gram = vec![vec![0.0; dims]; dims];
        let mut rhs = vec![0.0; dims];
        for (x, row) in matrix.iter().zip(rows) {
            let z: Vec<f64> = (0..dims).map(|j| (x[j] - means[j]) / scales[j]).collect();
            let target = row.actual_total - y_mean;
            for i in 0..dims {
                rhs[i] += z[i] * target;
                for j in i..dims {
                    gram[i][j] += z[i] * z[j];
                }
            }
        }
        for i in 0..dims {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
            gram[i][i] += l2;
        }

        let coefficients = solve(gram, rhs)?;
        Ok(Self {
            version: schema.version().to_string(),
            means,
            scales,
            coefficients,
            intercept: y_mean,
        })
    }
}

impl Predictor for LinearPredictor {
    fn name(&self) -> &'static str {
        "ridge"
    }

    fn feature_version(&self) -> &str {
        &self.version
    }

    fn estimate(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            return Err(PipelineError::FeatureSchemaMismatch {
                expected: self.version.clone(),
                found: features.version.clone(),
            });
        }
        let mut total = self.intercept;
        for (j, f) in features.features.iter().enumerate() {
            total += self.coefficients[j] * (f.value - self.means[j]) / self.scales[j];
        }
        Ok(total)
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(PipelineError::InvalidConfig(
                "ridge system is singular; raise ridge_l2".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in row + 1..n {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    Ok(x)
}

/// Builds a predictor from the training rows of one walk-forward fold.
pub trait PredictorTrainer: Sync {
    type Model: Predictor;

    fn name(&self) -> &'static str;

    fn fit(&self, schema: &FeatureSchema, rows: &[TrainingRow<'_>]) -> Result<Self::Model>;
}

/// Ignores the training rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineTrainer;

impl PredictorTrainer for BaselineTrainer {
    type Model = BaselinePredictor;

    fn name(&self) -> &'static str {
        "baseline"
    }

    fn fit(&self, schema: &FeatureSchema, _rows: &[TrainingRow<'_>]) -> Result<BaselinePredictor> {
        Ok(BaselinePredictor::new(schema))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RidgeTrainer {
    pub l2: f64,
}

impl PredictorTrainer for RidgeTrainer {
    type Model = LinearPredictor;

    fn name(&self) -> &'static str {
        "ridge"
    }

    fn fit(&self, schema: &FeatureSchema, rows: &[TrainingRow<'_>]) -> Result<LinearPredictor> {
        LinearPredictor::fit(schema, rows, self.l2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Baseline,
    Ridge,
}

impl ModelKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "baseline" => Some(ModelKind::Baseline),
            "ridge" | "linear" => Some(ModelKind::Ridge),
            _ => None,
        }
    }
}
