pub mod rest;
pub mod state;
pub mod webhook;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::study_assistant_handler;
pub use webhook::paystack_webhook_handler;
