//! Core infrastructure shared by the API surfaces.

pub mod http_client;
