#![allow(dead_code)]

pub mod helpers;
pub mod http_server;
pub mod mock_transport;
