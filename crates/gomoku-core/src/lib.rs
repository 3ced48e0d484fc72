pub mod frames;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod turn;

#[cfg(feature = "native")]
pub mod ws_transport;
