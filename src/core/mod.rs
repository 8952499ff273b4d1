//! Core process state shared across the codebase.

mod state;

pub use state::{
    finish_signal, is_shutdown, register_server, request_shutdown, set_loop_active,
    setup_shutdown_handler,
};
