//! Negative binomial distribution helpers
//!
//! Parameterised by mean `mu` and dispersion `alpha`, so that
//! `Var(Y) = mu + alpha * mu^2`.

use statrs::function::gamma::ln_gamma;

/// Floor applied to fitted means before computing IRLS weights
pub const MIN_MU: f64 = 0.5;

/// Any |beta| beyond this (natural log scale) aborts IRLS for the gene
pub const MAX_BETA: f64 = 30.0;

/// Clamp for the linear predictor so `exp` cannot overflow
pub const MAX_ETA: f64 = 700.0;

/// mu = size_factor * exp(eta)
pub fn nb_mean(eta: f64, size_factor: f64) -> f64 {
    size_factor * eta.clamp(-MAX_ETA, MAX_ETA).exp()
}

/// IRLS working weight `mu / (1 + alpha * mu)`
pub fn nb_weight(mu: f64, alpha: f64) -> f64 {
    mu / (1.0 + alpha * mu)
}

/// log P(Y = y) for NB(mu, alpha)
pub fn nb_log_likelihood(y: f64, mu: f64, alpha: f64) -> f64 {
    if mu <= 0.0 || alpha <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let size = 1.0 / alpha;
    let prob = size / (size + mu);
    ln_gamma(y + size) - ln_gamma(size) - ln_gamma(y + 1.0)
        + size * prob.ln()
        + y * (1.0 - prob).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_dispersion_approaches_poisson() {
        // Poisson(4) at y = 2: exp(-4) * 16 / 2
        let poisson = (-4.0f64).exp() * 8.0;
        let nb = nb_log_likelihood(2.0, 4.0, 1e-8).exp();
        assert!((nb - poisson).abs() < 1e-6);
    }

    #[test]
    fn test_mean_clamped() {
        assert!(nb_mean(1e6, 1.0).is_finite());
        assert!((nb_mean(0.0, 2.0) - 2.0).abs() < 1e-12);
    }
}
