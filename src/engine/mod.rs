pub mod dispatcher;
pub mod handlers;

pub use dispatcher::{completion_backend, Dispatcher, Outcome, Reply};
pub use handlers::{HandlerTable, IntentHandler, PromptHandler};
