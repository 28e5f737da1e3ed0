pub mod client;

pub use client::{input_subject, output_subject, NatsTransport};
