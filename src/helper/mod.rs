pub mod heuristic_helpers;
pub mod normalizer_helpers;
pub mod sanitization_helpers;
