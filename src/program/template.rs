//! Procedure templates.
//!
//! Each [`ProcedureKind`] owns one closed R template and one ordered list of
//! declared outputs. The trailing `list(...)` of every program is rendered from
//! that same list, so the names a [`ProgramPayload`] declares are exactly the
//! names the engine is asked to produce.

use std::fmt;

use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};

use super::serializer::serialize_matrix;
use crate::dataset::Dataset;
use crate::error::{StatError, StatResult};

/// Declared output names, grouped by procedure.
pub mod outputs {
    pub mod reliability {
        pub const RAW_ALPHA: &str = "raw_alpha";
        pub const STD_ALPHA: &str = "std_alpha";
        pub const N_ITEMS: &str = "n_items";
        pub const SCALE_MEAN_DELETED: &str = "scale_mean_deleted";
        pub const SCALE_VAR_DELETED: &str = "scale_var_deleted";
        pub const CORRECTED_ITEM_TOTAL: &str = "corrected_item_total";
        pub const ALPHA_IF_DELETED: &str = "alpha_if_deleted";
    }

    pub mod factor {
        pub const KMO: &str = "kmo";
        pub const BARTLETT_P: &str = "bartlett_p";
        pub const N_FACTORS: &str = "n_factors";
        pub const N_VARS: &str = "n_vars";
        pub const LOADINGS: &str = "loadings";
        pub const SS_LOADINGS: &str = "ss_loadings";
        pub const PROPORTION_VAR: &str = "proportion_var";
        pub const CUMULATIVE_VAR: &str = "cumulative_var";
        pub const COMMUNALITIES: &str = "communalities";
    }

    pub mod correlation {
        pub const CORRELATION: &str = "correlation";
        pub const P_VALUES: &str = "p_values";
        pub const N_COLS: &str = "n_cols";
        pub const N_OBS: &str = "n_obs";
    }

    pub mod descriptive {
        pub const MEAN: &str = "mean";
        pub const SD: &str = "sd";
        pub const MIN: &str = "min";
        pub const MAX: &str = "max";
        pub const MEDIAN: &str = "median";
        pub const N: &str = "n";
    }
}

/// Supported statistical procedures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Reliability,
    FactorAnalysis,
    Correlation,
    Descriptive,
}

impl ProcedureKind {
    pub const ALL: [ProcedureKind; 4] = [
        ProcedureKind::Reliability,
        ProcedureKind::FactorAnalysis,
        ProcedureKind::Correlation,
        ProcedureKind::Descriptive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureKind::Reliability => "reliability",
            ProcedureKind::FactorAnalysis => "factor_analysis",
            ProcedureKind::Correlation => "correlation",
            ProcedureKind::Descriptive => "descriptive",
        }
    }

    /// Ordered output names the procedure's program declares.
    pub fn declared_outputs(&self) -> Vec<&'static str> {
        template_for(*self).outputs.iter().map(|o| o.name).collect()
    }

    fn min_columns(&self) -> usize {
        match self {
            ProcedureKind::Descriptive => 1,
            _ => 2,
        }
    }

    fn min_rows(&self) -> usize {
        match self {
            ProcedureKind::Descriptive => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Factor rotation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    Varimax,
    Promax,
    Oblimin,
    None,
}

impl Rotation {
    fn as_r_str(&self) -> &'static str {
        match self {
            Rotation::Varimax => "varimax",
            Rotation::Promax => "promax",
            Rotation::Oblimin => "oblimin",
            Rotation::None => "none",
        }
    }
}

/// Factor extraction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extraction {
    /// Maximum likelihood
    #[default]
    Ml,
    /// Minimum residual
    Minres,
    /// Principal axis
    Pa,
}

impl Extraction {
    fn as_r_str(&self) -> &'static str {
        match self {
            Extraction::Ml => "ml",
            Extraction::Minres => "minres",
            Extraction::Pa => "pa",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorAnalysisOptions {
    pub factor_count: u32,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub extraction: Extraction,
}

impl FactorAnalysisOptions {
    pub fn new(factor_count: u32) -> Self {
        Self {
            factor_count,
            rotation: Rotation::default(),
            extraction: Extraction::default(),
        }
    }

    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn extraction(mut self, extraction: Extraction) -> Self {
        self.extraction = extraction;
        self
    }
}

/// Procedure-specific parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcedureParameters {
    pub factor_analysis: Option<FactorAnalysisOptions>,
}

/// A single procedure invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureRequest {
    kind: ProcedureKind,
    dataset: Dataset,
    parameters: ProcedureParameters,
}

impl ProcedureRequest {
    pub fn new(kind: ProcedureKind, dataset: Dataset, parameters: ProcedureParameters) -> Self {
        Self {
            kind,
            dataset,
            parameters,
        }
    }

    pub fn reliability(dataset: Dataset) -> Self {
        Self::new(ProcedureKind::Reliability, dataset, ProcedureParameters::default())
    }

    pub fn factor_analysis(dataset: Dataset, options: FactorAnalysisOptions) -> Self {
        Self::new(
            ProcedureKind::FactorAnalysis,
            dataset,
            ProcedureParameters {
                factor_analysis: Some(options),
            },
        )
    }

    pub fn correlation(dataset: Dataset) -> Self {
        Self::new(ProcedureKind::Correlation, dataset, ProcedureParameters::default())
    }

    pub fn descriptive(dataset: Dataset) -> Self {
        Self::new(ProcedureKind::Descriptive, dataset, ProcedureParameters::default())
    }

    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn parameters(&self) -> &ProcedureParameters {
        &self.parameters
    }
}

/// Program text plus the outputs it promises to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramPayload {
    kind: ProcedureKind,
    program: String,
    outputs: Vec<&'static str>,
}

impl ProgramPayload {
    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn outputs(&self) -> &[&'static str] {
        &self.outputs
    }

    pub fn declares(&self, name: &str) -> bool {
        self.outputs.contains(&name)
    }
}

#[derive(Serialize)]
struct OutputSpec {
    name: &'static str,
    expr: &'static str,
}

struct ProcedureTemplate {
    body: &'static str,
    outputs: &'static [OutputSpec],
}

const OUTPUT_LIST: &str = "list(\n{% for output in outputs %}  {{ output.name }} = {{ output.expr }}{% if not loop.last %},{% endif %}\n{% endfor %})";

const RELIABILITY_BODY: &str = r#"library(psych)
data <- {{ matrix }}
result <- alpha(data, warnings = FALSE)
item_stats <- result$item.stats
alpha_drop <- result$alpha.drop
"#;

const RELIABILITY_OUTPUTS: &[OutputSpec] = &[
    OutputSpec { name: outputs::reliability::RAW_ALPHA, expr: "result$total$raw_alpha" },
    OutputSpec { name: outputs::reliability::STD_ALPHA, expr: "result$total$std.alpha" },
    OutputSpec { name: outputs::reliability::N_ITEMS, expr: "ncol(data)" },
    OutputSpec {
        name: outputs::reliability::SCALE_MEAN_DELETED,
        expr: "sum(colMeans(data)) - colMeans(data)",
    },
    OutputSpec {
        name: outputs::reliability::SCALE_VAR_DELETED,
        expr: "sapply(seq_len(ncol(data)), function(i) var(rowSums(data[, -i, drop = FALSE])))",
    },
    OutputSpec { name: outputs::reliability::CORRECTED_ITEM_TOTAL, expr: "item_stats$r.drop" },
    OutputSpec { name: outputs::reliability::ALPHA_IF_DELETED, expr: "alpha_drop$raw_alpha" },
];

const FACTOR_BODY: &str = r#"library(psych)
data <- {{ matrix }}
nfactors <- {{ factor_count }}
kmo_result <- KMO(data)
bart_result <- cortest.bartlett(cor(data), n = nrow(data))
efa_result <- fa(data, nfactors = nfactors, rotate = "{{ rotation }}", fm = "{{ extraction }}")
vacc <- efa_result$Vaccounted
"#;

const FACTOR_OUTPUTS: &[OutputSpec] = &[
    OutputSpec { name: outputs::factor::KMO, expr: "kmo_result$MSA" },
    OutputSpec { name: outputs::factor::BARTLETT_P, expr: "bart_result$p.value" },
    OutputSpec { name: outputs::factor::N_FACTORS, expr: "nfactors" },
    OutputSpec { name: outputs::factor::N_VARS, expr: "ncol(data)" },
    OutputSpec { name: outputs::factor::LOADINGS, expr: "as.vector(unclass(efa_result$loadings))" },
    OutputSpec { name: outputs::factor::SS_LOADINGS, expr: "vacc[\"SS loadings\", ]" },
    OutputSpec { name: outputs::factor::PROPORTION_VAR, expr: "vacc[\"Proportion Var\", ]" },
    OutputSpec {
        name: outputs::factor::CUMULATIVE_VAR,
        expr: "if (\"Cumulative Var\" %in% rownames(vacc)) vacc[\"Cumulative Var\", ] else cumsum(vacc[\"Proportion Var\", ])",
    },
    OutputSpec { name: outputs::factor::COMMUNALITIES, expr: "efa_result$communality" },
];

const CORRELATION_BODY: &str = r#"data <- {{ matrix }}
n <- nrow(data)
ncols <- ncol(data)
corr_matrix <- cor(data, use = "pairwise.complete.obs")
p_matrix <- matrix(0, ncols, ncols)
for (i in 1:ncols) {
  for (j in 1:ncols) {
    if (i != j) {
      r <- corr_matrix[i, j]
      t_stat <- r * sqrt((n - 2) / (1 - r^2))
      p_matrix[i, j] <- 2 * pt(-abs(t_stat), df = n - 2)
    }
  }
}
"#;

const CORRELATION_OUTPUTS: &[OutputSpec] = &[
    OutputSpec { name: outputs::correlation::CORRELATION, expr: "as.vector(corr_matrix)" },
    OutputSpec { name: outputs::correlation::P_VALUES, expr: "as.vector(p_matrix)" },
    OutputSpec { name: outputs::correlation::N_COLS, expr: "ncols" },
    OutputSpec { name: outputs::correlation::N_OBS, expr: "n" },
];

const DESCRIPTIVE_BODY: &str = "data <- {{ matrix }}\n";

const DESCRIPTIVE_OUTPUTS: &[OutputSpec] = &[
    OutputSpec { name: outputs::descriptive::MEAN, expr: "colMeans(data, na.rm = TRUE)" },
    OutputSpec { name: outputs::descriptive::SD, expr: "apply(data, 2, sd, na.rm = TRUE)" },
    OutputSpec { name: outputs::descriptive::MIN, expr: "apply(data, 2, min, na.rm = TRUE)" },
    OutputSpec { name: outputs::descriptive::MAX, expr: "apply(data, 2, max, na.rm = TRUE)" },
    OutputSpec { name: outputs::descriptive::MEDIAN, expr: "apply(data, 2, median, na.rm = TRUE)" },
    OutputSpec { name: outputs::descriptive::N, expr: "nrow(data)" },
];

fn template_for(kind: ProcedureKind) -> ProcedureTemplate {
    match kind {
        ProcedureKind::Reliability => ProcedureTemplate {
            body: RELIABILITY_BODY,
            outputs: RELIABILITY_OUTPUTS,
        },
        ProcedureKind::FactorAnalysis => ProcedureTemplate {
            body: FACTOR_BODY,
            outputs: FACTOR_OUTPUTS,
        },
        ProcedureKind::Correlation => ProcedureTemplate {
            body: CORRELATION_BODY,
            outputs: CORRELATION_OUTPUTS,
        },
        ProcedureKind::Descriptive => ProcedureTemplate {
            body: DESCRIPTIVE_BODY,
            outputs: DESCRIPTIVE_OUTPUTS,
        },
    }
}

/// Check a request before anything is serialized or sent to the engine.
pub fn validate_request(request: &ProcedureRequest) -> StatResult<()> {
    let kind = request.kind();
    let dataset = request.dataset();
    dataset.require_columns(kind.min_columns(), kind.as_str())?;
    dataset.require_rows(kind.min_rows(), kind.as_str())?;

    if kind == ProcedureKind::FactorAnalysis {
        let options = request.parameters().factor_analysis.ok_or_else(|| {
            StatError::Validation("factor analysis requires a factor count".into())
        })?;
        if options.factor_count == 0 {
            return Err(StatError::Validation(
                "factor count must be a positive integer, got 0".into(),
            ));
        }
        if options.factor_count as usize >= dataset.column_count() {
            return Err(StatError::Validation(format!(
                "factor count {} must be less than the number of variables ({})",
                options.factor_count,
                dataset.column_count()
            )));
        }
    }
    Ok(())
}

/// Render the program for a request.
pub fn build_payload(request: &ProcedureRequest) -> StatResult<ProgramPayload> {
    validate_request(request)?;

    let kind = request.kind();
    let template = template_for(kind);
    let matrix = serialize_matrix(request.dataset())?;
    let options = request.parameters().factor_analysis;

    let source = format!("{}{}", template.body, OUTPUT_LIST);
    let env = Environment::new();
    let program = env
        .render_str(
            &source,
            context! {
                matrix => matrix,
                factor_count => options.map(|o| o.factor_count),
                rotation => options.map(|o| o.rotation.as_r_str()),
                extraction => options.map(|o| o.extraction.as_r_str()),
                outputs => template.outputs,
            },
        )
        .map_err(|e| StatError::Format(format!("{} template render error: {}", kind, e)))?;

    Ok(ProgramPayload {
        kind,
        program,
        outputs: template.outputs.iter().map(|o| o.name).collect(),
    })
}
