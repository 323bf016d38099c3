mod common;
mod consent;
mod coordinator;
mod session;
