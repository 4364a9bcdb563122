pub mod causal_lm;
pub mod model;
