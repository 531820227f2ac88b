pub mod errors;
pub mod schemas;
pub mod util;
pub mod writer;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
