pub mod binding_context;
pub mod controller;
pub mod executor;
pub mod manager;

pub use binding_context::{BindingContext, BindingExecutionInfo, BindingType};
pub use controller::{
    ConversionBindingToWebhookLink, ConversionBindingsController, ConversionConfig,
    DefaultConversionBindingsController,
};
pub use executor::{CommandExecutor, ExecutionError, HookExecutor};
pub use manager::{Hook, HookManager};
