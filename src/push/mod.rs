pub mod domain;
pub mod logic;
pub mod websocket;

#[cfg(test)]
pub mod testing;
