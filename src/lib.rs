pub mod helpers;

pub mod test_utils;
