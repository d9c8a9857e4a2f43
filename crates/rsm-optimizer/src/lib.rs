//! # rsm-optimizer
//!
//! The optimization role of the RSM workbench.
//!
//! Provides full-factorial DoE generation, least-squares fitting of the
//! quadratic response surface, projected gradient descent on the fitted
//! surface, and refinement sampling around the predicted optimum. Every
//! function here is pure.

mod descent;
mod doe;
mod refinement;
mod surface;

pub use descent::{minimize_quadratic, optimize_from_model, DescentSettings};
pub use doe::{grid_size, levels, suggest_doe_points, MAX_GRID_POINTS};
pub use refinement::{
    suggest_refinement_points, DEFAULT_REFINEMENT_POINTS, DEFAULT_REFINEMENT_RADIUS,
};
pub use surface::{fit_response_surface, r_squared};
