//! Bots shipped with the `bottastic` binary.

pub mod ping_pong;

pub use ping_pong::PingPongBot;
