pub mod board;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod validation;
