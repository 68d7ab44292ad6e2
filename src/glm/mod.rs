//! Generalized Linear Model fitting for negative binomial data

mod design;
mod fitting;
pub(crate) mod linalg;
mod negative_binomial;

pub use design::{check_full_rank, create_design_matrix, dataset_design, intercept_design, DesignInfo};
pub use fitting::{fit_glm, fit_single_gene, GlmFitParams, GlmFitResult};
pub use negative_binomial::{nb_log_likelihood, nb_mean, nb_weight, MAX_BETA, MAX_ETA, MIN_MU};
