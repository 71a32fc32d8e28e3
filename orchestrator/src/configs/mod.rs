mod backbone;
mod finetune;

pub use backbone::Backbone;
pub use finetune::FinetuneConfig;
