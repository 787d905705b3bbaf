#[path = "integration/serial_execution.rs"]
mod serial_execution;
#[path = "integration/graceful_shutdown.rs"]
mod graceful_shutdown;
