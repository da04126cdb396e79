pub mod support_handler;
