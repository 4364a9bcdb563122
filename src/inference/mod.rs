pub mod client;
pub mod model_config;
pub mod models;
pub mod text_pipeline;
pub mod token_output_stream;
