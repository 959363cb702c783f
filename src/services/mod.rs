pub mod calibration;
pub mod classifier;
pub mod data_fetcher;
pub mod feature_builder;
pub mod form_window;
pub mod head_to_head;
pub mod history;
pub mod model_registry;
pub mod predictor;
pub mod rating_engine;
pub mod snapshot;
pub mod trainer;

pub use calibration::*;
pub use classifier::*;
pub use data_fetcher::*;
pub use feature_builder::*;
pub use form_window::*;
pub use head_to_head::*;
pub use history::*;
pub use model_registry::*;
pub use predictor::*;
pub use rating_engine::*;
pub use snapshot::*;
pub use trainer::*;
