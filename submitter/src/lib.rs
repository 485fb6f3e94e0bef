pub mod client;
pub mod prelude;
pub mod session;

#[cfg(test)]
mod test;
