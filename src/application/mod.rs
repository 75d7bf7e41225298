//! Application Layer
//!
//! Contains the quota, write guard and room services plus the data transfer
//! objects (DTOs) of the HTTP surface. This layer orchestrates the flow of
//! data between the presentation and domain layers.

pub mod dto;
pub mod services;
