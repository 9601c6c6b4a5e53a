pub mod ai;
pub mod auth;
pub mod backend;
pub mod calendar;
pub mod controller;
pub mod flow;
pub mod receipt;
