pub mod build;
pub mod input;
pub mod inspect;
pub mod merge;
pub mod validate;
#[cfg(test)]
mod tests;
